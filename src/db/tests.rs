mod database_tests {
    use crate::db::{Database, DbConfig, DbState};
    use crate::error::StoreError;
    use crate::types::Encoding;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"{
  "!schema.json": [{"Id": 0}],
  "boxes": [
    {"Id": 1, "Key": "t", "Title": "Table t",
     "Cases": [[{"Id": 1, "Key": "c", "FieldType": "u-id"}]]},
    {"Id": 0}
  ]
}"#;

    const TABLE_T: &str = r#"{"!h.json":[{"Id":0}], "c":[{"Id":1,"Name":"x"},{"Id":0}]}"#;

    fn write(dir: &Path, file: &str, text: &str) {
        fs::write(dir.join(file), text).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "schema.json", SCHEMA);
        write(dir.path(), "t.json", TABLE_T);
        dir
    }

    fn open(dir: &Path) -> Database {
        Database::open(dir, DbConfig::default()).unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Discovery and loading
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_open_valid_database() {
        let dir = fixture();
        let mut db = open(dir.path());

        assert_eq!(db.state(), DbState::Loaded);
        assert!(db.has_schema());
        assert_eq!(db.table_names().collect::<Vec<_>>(), vec!["t"]);
        assert!(db.valid_schema());
        assert_eq!(db.state(), DbState::Valid);
        assert_eq!(db.message(), "");
    }

    #[test]
    fn test_duplicate_id_invalidates_with_table_and_case() {
        let dir = fixture();
        let mut db = open(dir.path());

        let table = db.table_mut(Some("t")).unwrap();
        table.jbox_mut().value_mut()["c"][1]["Id"] = json!(1);

        assert!(!db.valid_schema());
        assert_eq!(db.state(), DbState::Invalid);
        assert!(db.message().contains("('t', 'c')"), "{}", db.message());
        assert!(db.message().contains(": 1,"), "{}", db.message());
    }

    #[test]
    fn test_open_from_file_inside_directory() {
        let dir = fixture();
        let db = open(&dir.path().join("t.json"));
        assert_eq!(db.dir(), dir.path());
        assert_eq!(db.table_names().count(), 1);
    }

    #[test]
    fn test_open_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let res = Database::open(dir.path().join("nowhere"), DbConfig::default());
        assert!(matches!(res, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_discovery_is_flat_and_json_only() {
        let dir = fixture();
        write(dir.path(), "notes.txt", "hello");
        fs::create_dir(dir.path().join("sub")).unwrap();
        write(&dir.path().join("sub"), "inner.json", "{}");
        fs::create_dir(dir.path().join("folder.json")).unwrap();

        let db = open(dir.path());
        assert_eq!(db.table_names().collect::<Vec<_>>(), vec!["t"]);
    }

    #[test]
    fn test_malformed_table_does_not_abort_discovery() {
        let dir = fixture();
        write(dir.path(), "broken.json", "{\"!h\": [");
        write(dir.path(), "other.json", "{\"!h\": []}");

        let db = open(dir.path());
        let broken = db.table(Some("broken")).unwrap();
        assert!(!broken.is_ok());
        assert!(broken.load_error().unwrap().contains("JSON"));
        assert!(db.table(Some("other")).unwrap().is_ok());
        assert!(db.table(Some("t")).unwrap().is_ok());
    }

    #[test]
    fn test_schema_referencing_faulty_table() {
        let dir = fixture();
        write(dir.path(), "t.json", "not json");
        let mut db = open(dir.path());
        assert!(!db.valid_schema());
        assert_eq!(db.message(), "Faulty 't'");
    }

    #[test]
    fn test_schema_referencing_absent_table() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "schema.json", SCHEMA);
        let mut db = open(dir.path());
        assert!(!db.valid_schema());
        assert_eq!(db.message(), "Faulty 't'");
    }

    #[test]
    fn test_missing_schema_is_permanently_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "t.json", TABLE_T);

        let mut db = open(dir.path());
        assert!(!db.has_schema());
        assert!(!db.basic_ok());
        assert!(!db.valid_schema());
        assert!(db.message().starts_with("No schema at:"));
        assert!(matches!(db.save(None), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_missing_schema_allowed_when_not_expected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "t.json", TABLE_T);
        let config = DbConfig { expect_schema: false, ..DbConfig::default() };

        let mut db = Database::open(dir.path(), config).unwrap();
        assert!(db.basic_ok());
        assert!(db.valid_schema());
    }

    #[test]
    fn test_unreadable_schema_does_not_abort_open() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "schema.json", "{\"!s\": [");
        write(dir.path(), "t.json", TABLE_T);

        let mut db = open(dir.path());
        assert!(!db.has_schema());
        assert!(!db.basic_ok());
        assert!(db.message().starts_with("Unable to read schema:"), "{}", db.message());
        assert!(db.table(Some("t")).unwrap().is_ok());

        assert!(matches!(db.save(None), Err(StoreError::Validation(msg)) if msg.starts_with("Unable to read schema:")));
        assert_eq!(fs::read_to_string(dir.path().join("t.json")).unwrap(), TABLE_T);
    }

    #[test]
    fn test_unreadable_schema_blocks_even_when_not_expected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "schema.json", "not json");
        write(dir.path(), "t.json", TABLE_T);
        let config = DbConfig { expect_schema: false, ..DbConfig::default() };

        let mut db = Database::open(dir.path(), config).unwrap();
        assert!(!db.valid_schema());
        assert!(db.message().starts_with("Unable to read schema:"));
    }

    #[test]
    fn test_structurally_broken_schema_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "schema.json",
            r#"{"!s": [], "boxes": [{"Id": 1, "Key": "t", "Title": "", "Cases": []}, {"Id": 0}]}"#,
        );
        let res = Database::open(dir.path(), DbConfig::default());
        assert!(matches!(res, Err(StoreError::MalformedSchema(_))));
    }

    #[test]
    fn test_auto_validate_on_open() {
        let dir = fixture();
        write(dir.path(), "t.json", r#"{"!h":[], "c":[{"Id":2},{"Id":2},{"Id":0}]}"#);
        let config = DbConfig { auto_validate: true, ..DbConfig::default() };

        let db = Database::open(dir.path(), config).unwrap();
        assert_eq!(db.state(), DbState::Invalid);
        assert!(db.message().starts_with("Duplicate key ('t', 'c'): 2"));
    }

    #[test]
    fn test_explicit_state_transitions() {
        let dir = fixture();
        let mut db = Database::new(DbConfig::default());
        assert_eq!(db.state(), DbState::Uninitialized);
        db.discover(dir.path()).unwrap();
        assert_eq!(db.state(), DbState::Discovered);
        assert!(!db.table(None).unwrap().is_ok());
        db.load_tables();
        assert_eq!(db.state(), DbState::Loaded);
        assert!(db.table(None).unwrap().is_ok());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Table lookup
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_table_resolution() {
        let dir = fixture();
        write(dir.path(), "a.json", "{\"!h\": []}");
        write(dir.path(), "z.json", "{\"!h\": []}");

        let db = open(dir.path());
        assert_eq!(db.table(None).unwrap().name(), "a");
        assert_eq!(db.table(Some("z")).unwrap().name(), "z");
        assert!(matches!(db.table(Some("nope")), Err(StoreError::TableNotFound(_))));

        let config = DbConfig { default_table: Some("t".into()), ..DbConfig::default() };
        let db = Database::open(dir.path(), config).unwrap();
        assert_eq!(db.table(None).unwrap().name(), "t");
    }

    #[test]
    fn test_table_without_any_tables() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "schema.json", SCHEMA);
        let db = open(dir.path());
        assert!(matches!(db.table(None), Err(StoreError::NoTables)));
    }

    #[test]
    fn test_id_hash_through_database() {
        let dir = fixture();
        let db = open(dir.path());
        let hash = db.id_hash("t", "c").unwrap().unwrap();
        assert_eq!(hash.name_of(1), Some("x"));
        assert!(db.id_hash("t", "header").is_err());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Save
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_save_refuses_invalid_database() {
        let dir = fixture();
        let mut db = open(dir.path());
        db.table_mut(Some("t")).unwrap().jbox_mut().value_mut()["c"][1]["Id"] = json!(1);

        let res = db.save(Some("t"));
        assert!(matches!(&res, Err(StoreError::Validation(msg)) if msg.contains("('t', 'c')")));
        assert_eq!(fs::read_to_string(dir.path().join("t.json")).unwrap(), TABLE_T);
    }

    #[test]
    fn test_skip_save_validation_writes_anyway() {
        let dir = fixture();
        let config = DbConfig { skip_save_validation: true, ..DbConfig::default() };
        let mut db = Database::open(dir.path(), config).unwrap();
        db.table_mut(Some("t")).unwrap().jbox_mut().value_mut()["c"][1]["Id"] = json!(1);

        db.save(Some("t")).unwrap();
        let text = fs::read_to_string(dir.path().join("t.json")).unwrap();
        assert_eq!(text.matches("\"Id\": 1").count(), 2);
    }

    #[test]
    fn test_save_all_writes_canonical_text() {
        let dir = fixture();
        write(dir.path(), "u.json", r#"{"!h": [], "b": 2, "a": 1}"#);
        let mut db = open(dir.path());

        db.save(None).unwrap();
        let text = fs::read_to_string(dir.path().join("u.json")).unwrap();
        assert_eq!(text, "{\n  \"!h\": [],\n  \"a\": 1,\n  \"b\": 2\n}\n");
        let t = fs::read_to_string(dir.path().join("t.json")).unwrap();
        assert!(t.starts_with("{\n  \"!h.json\": [\n"));
        assert!(t.ends_with("}\n"));
    }

    #[test]
    fn test_save_all_is_best_effort() {
        let dir = fixture();
        write(dir.path(), "a.json", r#"{"!h": [], "x": 1}"#);
        write(dir.path(), "b.json", r#"{"!h": [], "y": 1}"#);
        let mut db = open(dir.path());

        // b.json becomes a directory: its save must fail, the others still happen.
        fs::remove_file(dir.path().join("b.json")).unwrap();
        fs::create_dir(dir.path().join("b.json")).unwrap();

        match db.save(None) {
            Err(StoreError::PartialSave { failed, message }) => {
                assert_eq!(failed.iter().map(|s| s.as_str()).collect::<Vec<_>>(), vec!["b"]);
                assert_eq!(message, "Failed Save(s): b");
            }
            other => panic!("Expected a partial save, got {other:?}"),
        }
        assert_eq!(db.message(), "Failed Save(s): b");
        let a = fs::read_to_string(dir.path().join("a.json")).unwrap();
        assert!(a.ends_with("\"x\": 1\n}\n"));
    }

    #[test]
    fn test_save_all_skips_unloaded_tables() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ok.json", "{\"!h\": []}");
        write(dir.path(), "broken.json", "{{");
        let config = DbConfig { expect_schema: false, ..DbConfig::default() };
        let mut db = Database::open(dir.path(), config).unwrap();

        db.save(None).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("broken.json")).unwrap(), "{{");
        assert!(db.save(Some("broken")).is_err());
    }

    #[test]
    fn test_save_modified_only_writes_changed_tables() {
        let dir = fixture();
        write(dir.path(), "other.json", "{\"!h\": [], \"k\": 1}");
        let mut db = open(dir.path());

        db.table_mut(Some("t")).unwrap().jbox_mut().add_to("c", serde_json::Map::new()).unwrap();
        write(dir.path(), "other.json", "{\"!h\": [], \"k\": 2}");

        db.save_modified().unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("other.json")).unwrap(),
            "{\"!h\": [], \"k\": 2}"
        );
        let t = fs::read_to_string(dir.path().join("t.json")).unwrap();
        assert!(t.contains("\"Id\": 2"));
        assert!(!db.table(Some("t")).unwrap().jbox().is_modified());
    }

    #[test]
    fn test_reload_reads_disk_again() {
        let dir = fixture();
        let mut db = open(dir.path());
        write(dir.path(), "t.json", r#"{"!h":[], "c":[{"Id":1},{"Id":1},{"Id":0}]}"#);

        assert!(db.valid_schema());
        assert!(db.reload("t").unwrap());
        assert!(!db.valid_schema());
        assert!(db.reload("missing").is_err());
    }

    #[test]
    fn test_per_table_encoding() {
        let dir = fixture();
        fs::write(dir.path().join("l.json"), b"{\"!h\": [], \"n\": \"\xe9\"}").unwrap();
        let mut config = DbConfig::default();
        config.table_encodings.insert("l".into(), Encoding::Latin1);

        let db = Database::open(dir.path(), config).unwrap();
        let l = db.table(Some("l")).unwrap();
        assert!(l.is_ok());
        assert_eq!(l.jbox().encoding(), Encoding::Latin1);
        assert_eq!(l.jbox().value()["n"], json!("\u{e9}"));
        assert_eq!(db.table(Some("t")).unwrap().jbox().encoding(), Encoding::Utf8);
    }

    #[test]
    fn test_resave_schema_canonical() {
        let dir = fixture();
        let mut db = open(dir.path());
        db.resave_schema().unwrap();

        let text = fs::read_to_string(dir.path().join("schema.json")).unwrap();
        assert!(text.starts_with("{\n  \"!schema.json\": [\n"));
        assert!(text.contains("\"FieldType\": \"u-id\""));
        assert!(text.ends_with("}\n"));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Config
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_config_from_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts.json");
        write(dir.path(), "opts.json", r#"{"encoding": "latin-1", "default_table": "t"}"#);

        let config = DbConfig::from_file(&path).unwrap();
        assert_eq!(config.encoding, Encoding::Latin1);
        assert_eq!(config.default_table.as_deref(), Some("t"));
        assert!(config.expect_schema);
        assert!(config.ensure_ascii);
        assert_eq!(config.name.as_str(), "dbx");
    }

    #[test]
    fn test_config_rejects_unknown_encoding() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "opts.json", r#"{"encoding": "ebcdic"}"#);
        assert!(DbConfig::from_file(dir.path().join("opts.json")).is_err());
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("UTF8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("latin1".parse::<Encoding>().unwrap().name(), "ISO-8859-1");
        assert_eq!(Encoding::Latin1.to_string(), "ISO-8859-1");
        assert!("cp1252".parse::<Encoding>().is_err());
    }
}
