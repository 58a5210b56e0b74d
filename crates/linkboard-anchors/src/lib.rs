//! Anchor-link verification: does a page link to a target URL with the
//! expected visible text?

pub mod checker;
pub mod matcher;
pub mod normalize;

pub use checker::{
    AnchorChecker, AnchorRow, BatchSummary, RowOutcome, SheetBatchSummary, COL_EXACT_ANCHOR,
    COL_FOUND, COL_PAGE_URL, COL_TARGET_URL, DEFAULT_REQUEST_DELAY,
};
pub use matcher::{check_page, find_anchor_link, AnchorError, LINK_NOT_FOUND};
pub use normalize::{normalize_anchor, normalize_url};

pub const CRATE_NAME: &str = "linkboard-anchors";
