use linkboard_adapters::{load_sources, CsvDirRowSource};
use linkboard_core::{count_by_employee, SourceTable};

#[tokio::test]
async fn builtin_sources_load_from_csv_exports() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Основная РФ и СНГ.csv"),
        "№,Проект,Версия,Сотрудник,Донор,Анкор,Дата\n\
         1,Acme,ru,Ann,donor.ru,купить,01.03.2024\n\
         2,Acme,,Bob,donor2.ru,тут,02.03.2024\n\
         3,Beta,,Ann,donor3.ru,здесь,\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("TelecomAsia.csv"),
        "Date,Project,Version,Linkbuilder,Status,Posted\n\
         ,Gamma,,Ann,Готово,2024-03-05\n\
         ,Gamma,,Cid,Pending,2024-03-05\n",
    )
    .unwrap();

    let table = SourceTable::builtin();
    let outcome = load_sources(&CsvDirRowSource::new(dir.path()), &table, None).await;

    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.failed_sources().count(), 0);
    let totals = outcome.totals();
    assert_eq!(totals.undated, 1);
    assert_eq!(totals.rejected, 1);

    let by_employee = count_by_employee(&outcome.records);
    assert_eq!(by_employee[0].key, "Ann");
    assert_eq!(by_employee[0].count, 2);
    assert!(outcome.records.iter().any(|r| r.project == "Acme ru" && r.source == "Основная РФ и СНГ"));
}
