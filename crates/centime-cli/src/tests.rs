//! CLI command tests
//!
//! End-to-end command tests against temp databases and CSV files.

use std::fs;

use crate::commands::{self, truncate, ColumnOverrides};

fn temp_paths() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("centime.db");
    let config = dir.path().join("centime.toml");
    (dir, db, config)
}

#[test]
fn test_cmd_init_seeds_defaults() {
    let (_dir, db_path, config_path) = temp_paths();
    commands::cmd_init(&db_path, &config_path).unwrap();

    let db = centime_core::Database::new(&db_path).unwrap();
    let categories = db.list_categories().unwrap();
    assert!(!categories.is_empty());
    assert!(categories.iter().any(|c| c.name == "groceries"));

    // Running init again is harmless
    commands::cmd_init(&db_path, &config_path).unwrap();
    assert_eq!(db.list_categories().unwrap().len(), categories.len());
}

#[test]
fn test_cmd_init_honors_seed_confidence() {
    let (_dir, db_path, config_path) = temp_paths();
    fs::write(&config_path, "global_pattern_confidence = 0.85\n").unwrap();
    commands::cmd_init(&db_path, &config_path).unwrap();

    let db = centime_core::Database::new(&db_path).unwrap();
    let matches = db.find_global_matches("NETFLIX.COM/BILL", 0.3).unwrap();
    assert_eq!(matches.len(), 1);
    assert!((matches[0].confidence - 0.85).abs() < 1e-9);
}

#[test]
fn test_cmd_import_and_classify() {
    let (dir, db_path, config_path) = temp_paths();
    commands::cmd_init(&db_path, &config_path).unwrap();

    let csv_path = dir.path().join("export.csv");
    fs::write(
        &csv_path,
        "Date;Libelle;Montant\n\
         01/12/2023;CB CARREFOUR PARIS;-65,20\n\
         02/12/2023;NETFLIX.COM;-13,49\n",
    )
    .unwrap();

    commands::cmd_import(
        &db_path,
        &config_path,
        "default",
        &csv_path,
        "main",
        ColumnOverrides::default(),
        false,
    )
    .unwrap();

    let db = centime_core::Database::new(&db_path).unwrap();
    let user_id = db.ensure_user("default").unwrap();
    let counts = db.count_by_status(user_id).unwrap();
    assert_eq!(counts.total(), 2);
    assert_eq!(counts.auto_assigned, 2);

    // Importing the same file again adds nothing
    commands::cmd_import(
        &db_path,
        &config_path,
        "default",
        &csv_path,
        "main",
        ColumnOverrides::default(),
        true,
    )
    .unwrap();
    assert_eq!(db.count_by_status(user_id).unwrap().total(), 2);
}

#[test]
fn test_cmd_import_with_column_overrides() {
    let (dir, db_path, config_path) = temp_paths();
    commands::cmd_init(&db_path, &config_path).unwrap();

    let csv_path = dir.path().join("odd.csv");
    fs::write(
        &csv_path,
        "Jour;Texte;Sortie;Entree\n01/12/2023;LOYER DECEMBRE;800,00;\n",
    )
    .unwrap();

    commands::cmd_import(
        &db_path,
        &config_path,
        "default",
        &csv_path,
        "main",
        ColumnOverrides {
            date: Some(0),
            description: Some(1),
            debit: Some(2),
            credit: Some(3),
            ..Default::default()
        },
        true,
    )
    .unwrap();

    let db = centime_core::Database::new(&db_path).unwrap();
    let user_id = db.ensure_user("default").unwrap();
    assert_eq!(db.count_by_status(user_id).unwrap().unassigned, 1);
}

#[test]
fn test_cmd_import_unknown_layout_fails() {
    let (dir, db_path, config_path) = temp_paths();
    commands::cmd_init(&db_path, &config_path).unwrap();

    let csv_path = dir.path().join("mystery.csv");
    fs::write(&csv_path, "A;B;C\nx;y;z\n").unwrap();

    let result = commands::cmd_import(
        &db_path,
        &config_path,
        "default",
        &csv_path,
        "main",
        ColumnOverrides::default(),
        true,
    );
    assert!(result.is_err());
}

#[test]
fn test_cmd_learn_and_patterns() {
    let (dir, db_path, config_path) = temp_paths();
    commands::cmd_init(&db_path, &config_path).unwrap();

    let csv_path = dir.path().join("export.csv");
    fs::write(
        &csv_path,
        "Date;Libelle;Montant\n\
         01/12/2023;EPICERIE DUPONT;-21,00\n\
         08/12/2023;EPICERIE DUPONT;-34,50\n\
         15/12/2023;EPICERIE DUPONT;-28,10\n",
    )
    .unwrap();
    commands::cmd_import(
        &db_path,
        &config_path,
        "default",
        &csv_path,
        "main",
        ColumnOverrides::default(),
        true,
    )
    .unwrap();

    let db = centime_core::Database::new(&db_path).unwrap();
    let user_id = db.ensure_user("default").unwrap();
    let groceries = db.get_category_by_name("groceries").unwrap().unwrap();
    for tx in db
        .list_transactions_by_status(user_id, centime_core::AssignmentStatus::Unassigned, 10)
        .unwrap()
    {
        db.assign_manually(tx.id, groceries.id).unwrap();
    }

    commands::cmd_learn(&db_path, &config_path, "default").unwrap();
    assert_eq!(db.list_personal_patterns(user_id).unwrap().len(), 1);

    commands::cmd_patterns(&db_path, "default", false).unwrap();
    commands::cmd_patterns(&db_path, "default", true).unwrap();
}

#[test]
fn test_cmd_status_runs() {
    let (_dir, db_path, config_path) = temp_paths();
    // Before init: prints a hint, still succeeds
    commands::cmd_status(&db_path, "default").unwrap();

    commands::cmd_init(&db_path, &config_path).unwrap();
    commands::cmd_status(&db_path, "default").unwrap();
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a much longer string", 10), "a much ...");
    // Multibyte text must cut on character boundaries
    assert_eq!(truncate("SUPERMARCHÉ MONTPARNASSE", 14), "SUPERMARCHÉ...");
    assert_eq!(truncate("ÉÉÉÉ", 4), "ÉÉÉÉ");
}
