use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use linkboard_adapters::{filter_sheet_prices, PriceFilterError, PriceFilterOptions};
use linkboard_anchors::AnchorChecker;
use linkboard_core::price::{extract_spreadsheet_id, MAX_SHEET_COLUMNS};
use linkboard_core::Period;
use linkboard_storage::{is_access_error, SheetsClient};
use linkboard_sync::{report_daily_markdown, report_runs_csv, SnapshotQuery, SyncConfig, SyncPipeline};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "linkboard")]
#[command(about = "Link placement dashboard, anchor checker and price filter")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load all sources and write a run report under reports/<run_id>/.
    Sync {
        #[command(flatten)]
        period: PeriodArgs,
        /// Header-addressed CSV exports to use instead of the configured sources.
        #[arg(long = "csv")]
        csv: Vec<PathBuf>,
    },
    /// Summarize past runs, or the given CSV exports for one period.
    Report {
        #[arg(long, default_value_t = 5)]
        runs: usize,
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
        #[arg(long = "csv")]
        csv: Vec<PathBuf>,
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Check a Page URL / Target URL / Exact Anchor CSV and fill in Found.
    CheckAnchors {
        #[arg(long, default_value = "links.csv")]
        input: PathBuf,
        /// Defaults to rewriting the input file.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Seconds to wait between fetched pages.
        #[arg(long, default_value_t = 1.0)]
        delay: f64,
    },
    /// Same check against a Google Sheet, writing the Found column back.
    CheckAnchorsSheet {
        /// Spreadsheet URL or id.
        #[arg(env = "SPREADSHEET_URL")]
        spreadsheet: String,
        /// Worksheet name; the first one when omitted.
        #[arg(long, env = "SHEET_NAME")]
        sheet: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        delay: f64,
    },
    /// Delete rows priced over the limit from the first worksheet.
    FilterPrices {
        /// Spreadsheet URL or id.
        spreadsheet: String,
        /// Zero-based price column.
        #[arg(
            long,
            default_value_t = linkboard_adapters::price_filter::DEFAULT_PRICE_COLUMN,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(0..MAX_SHEET_COLUMNS as u64)
        )]
        column: usize,
        #[arg(long, default_value_t = linkboard_adapters::price_filter::DEFAULT_MAX_PRICE)]
        max: f64,
    },
    /// Print the service account email the spreadsheets must be shared with.
    ShareEmail,
    /// Run the dashboard.
    Serve {
        #[arg(long, env = "LINKBOARD_WEB_PORT", default_value_t = 8000)]
        port: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Markdown,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PeriodKind {
    Week,
    Month,
    Custom,
}

#[derive(Debug, Clone, Args)]
struct PeriodArgs {
    #[arg(long, value_enum, default_value_t = PeriodKind::Week)]
    period: PeriodKind,
    #[arg(long, requires = "month")]
    year: Option<i32>,
    #[arg(long, requires = "year")]
    month: Option<u32>,
    /// YYYY-MM-DD, inclusive.
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl PeriodArgs {
    fn to_period(&self) -> Period {
        match self.period {
            PeriodKind::Week => Period::Week,
            PeriodKind::Month => match (self.year, self.month) {
                (Some(year), Some(month)) => Period::Month { year, month },
                _ => Period::CurrentMonth,
            },
            PeriodKind::Custom => Period::Custom {
                from: self.from,
                to: self.to,
            },
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_json = std::env::var("LINKBOARD_LOG_JSON")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn delay_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| anyhow!("invalid delay {secs}"))
}

async fn sheets_client(config: &SyncConfig) -> Result<SheetsClient> {
    Ok(config.credentials.sheets_client(config.http_timeout()).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return linkboard_web::serve_from_env().await;
    };

    match command {
        Commands::Sync { period, csv } => {
            let pipeline = SyncPipeline::new(SyncConfig::from_env()).with_uploads(csv);
            let summary = pipeline.run_once(period.to_period()).await?;
            println!(
                "sync complete: run_id={} period={} records={} loaded={} failed_sources={} reports={}",
                summary.run_id,
                summary.range,
                summary.period_records,
                summary.loaded_records,
                summary.failed_sources,
                summary.reports_dir
            );
        }
        Commands::Report {
            runs,
            format,
            csv,
            period,
        } => {
            if !csv.is_empty() {
                let pipeline = SyncPipeline::new(SyncConfig::from_env()).with_uploads(csv);
                let query = SnapshotQuery {
                    period: period.to_period(),
                    ..SnapshotQuery::default()
                };
                let snapshot = pipeline.snapshot(&query, Local::now().date_naive()).await?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }
            let root = Some(SyncConfig::from_env().workspace_root);
            let text = match format {
                ReportFormat::Markdown => report_daily_markdown(runs, root)?,
                ReportFormat::Csv => report_runs_csv(runs, root)?,
            };
            println!("{text}");
        }
        Commands::CheckAnchors {
            input,
            output,
            delay,
        } => {
            if !input.exists() {
                return Err(anyhow!(
                    "{} not found; expected columns: Page URL, Target URL, Exact Anchor",
                    input.display()
                ));
            }
            let config = SyncConfig::from_env();
            let checker = AnchorChecker::from_config(config.http_client_config())?.with_delay(delay_from_secs(delay)?);
            let summary = checker.check_csv_file(&input, output.as_deref()).await?;
            println!(
                "checked {} rows: Yes={} No={} Error={}",
                summary.total, summary.yes, summary.no, summary.error
            );
        }
        Commands::CheckAnchorsSheet {
            spreadsheet,
            sheet,
            delay,
        } => {
            let config = SyncConfig::from_env();
            let client = sheets_client(&config).await?;
            let checker = AnchorChecker::from_config(config.http_client_config())?.with_delay(delay_from_secs(delay)?);
            let id = extract_spreadsheet_id(&spreadsheet);
            let result = checker.check_sheet(&client, &id, sheet.as_deref()).await?;
            println!(
                "{} / {}: Yes={} No={} Error={} written to {}",
                result.spreadsheet_title,
                result.sheet,
                result.summary.yes,
                result.summary.no,
                result.summary.error,
                result.range.as_deref().unwrap_or("nothing")
            );
        }
        Commands::FilterPrices {
            spreadsheet,
            column,
            max,
        } => {
            let config = SyncConfig::from_env();
            let client = sheets_client(&config).await?;
            let id = extract_spreadsheet_id(&spreadsheet);
            let options = PriceFilterOptions {
                price_col: column,
                max_price: max,
            };
            match filter_sheet_prices(&client, &id, options).await {
                Ok(outcome) if outcome.changed() => println!(
                    "{}: removed {} rows over {max}, {} rows left",
                    outcome.sheet, outcome.removed, outcome.kept
                ),
                Ok(outcome) => println!("{}: nothing over {max}", outcome.sheet),
                Err(PriceFilterError::Sheets(err)) if is_access_error(&err) => {
                    let share = config
                        .credentials
                        .service_account_email()
                        .unwrap_or_else(|| "the service account client_email".to_string());
                    return Err(anyhow!(err)).context(format!(
                        "spreadsheet {id} is not reachable; share it with {share} as Editor"
                    ));
                }
                Err(err) => return Err(err).context("filtering prices"),
            }
        }
        Commands::ShareEmail => {
            let config = SyncConfig::from_env();
            match config.credentials.service_account_email() {
                Some(email) => println!("{email}"),
                None => {
                    return Err(anyhow!(
                        "no readable service account key found\n{}",
                        config.credentials.guidance()
                    ))
                }
            }
        }
        Commands::Serve { port } => {
            let state = linkboard_web::AppState::new(SyncPipeline::new(SyncConfig::from_env()));
            linkboard_web::serve(state, port).await?;
        }
    }

    Ok(())
}
