use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use askguard::error::IntrospectionError;
use askguard::schema::{SchemaProvider, SqliteSchemaProvider, describe};
use askguard::sqlite::{ensure_audit_table, init_demo_database, open_sqlite_connection};

fn temp_db_path(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("askguard-schema-{label}-{nanos}.sqlite"))
}

#[test]
fn demo_schema_lists_tables_and_masked_view() {
    let db_path = temp_db_path("demo");
    init_demo_database(&db_path, false).expect("demo database should initialize");

    let schema = describe(&SqliteSchemaProvider::new(&db_path)).expect("schema should describe");

    let names = schema.tables.keys().map(String::as_str).collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "accounts",
            "branches",
            "customers",
            "transactions",
            "viewer_customers"
        ]
    );
    assert!(schema.tables["customers"].contains("national_id"));
    assert!(!schema.tables["viewer_customers"].contains("gender"));
    assert!(!schema.text.contains("logs"));
    assert!(!schema.text.contains("sqlite_sequence"));
    assert_eq!(schema.fingerprint.as_str().len(), 64);
}

#[test]
fn fingerprint_tracks_schema_changes() {
    let db_path = temp_db_path("fingerprint");
    init_demo_database(&db_path, false).expect("demo database should initialize");
    let provider = SqliteSchemaProvider::new(&db_path);

    let before = describe(&provider).expect("schema should describe");
    let again = describe(&provider).expect("schema should describe twice");
    assert_eq!(before.fingerprint, again.fingerprint);
    assert_eq!(before.text, again.text);

    let connection = open_sqlite_connection(&db_path).expect("connection should open");
    connection
        .execute_batch("CREATE TABLE loans (id INTEGER PRIMARY KEY, principal REAL);")
        .expect("schema change should apply");
    drop(connection);

    let after = describe(&provider).expect("changed schema should describe");
    assert_ne!(before.fingerprint, after.fingerprint);
    assert!(after.tables.contains_key("loans"));
}

#[test]
fn audit_rows_never_change_the_fingerprint() {
    let db_path = temp_db_path("audit-hidden");
    let connection = open_sqlite_connection(&db_path).expect("connection should open");
    connection
        .execute_batch("CREATE TABLE branches (id INTEGER PRIMARY KEY, name TEXT);")
        .expect("table should be created");
    let provider = SqliteSchemaProvider::new(&db_path);
    let before = describe(&provider).expect("schema should describe");

    ensure_audit_table(&connection).expect("audit table should be created");
    drop(connection);

    let after = describe(&provider).expect("schema should describe");
    assert_eq!(before.fingerprint, after.fingerprint);
}

#[test]
fn missing_database_is_an_introspection_error() {
    let provider = SqliteSchemaProvider::new(temp_db_path("missing"));

    let err = provider
        .introspect()
        .expect_err("missing database should not introspect");
    assert!(matches!(err, IntrospectionError::Unavailable(_)));
}
