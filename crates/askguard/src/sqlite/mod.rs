use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::audit::CREATE_AUDIT_TABLE_SQL;

pub const MASKED_CUSTOMERS_VIEW: &str = "viewer_customers";

const CREATE_BRANCHES_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS branches (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL
);
"#;

const CREATE_CUSTOMERS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL,
    gender TEXT NOT NULL,
    national_id TEXT NOT NULL,
    branch_id INTEGER NOT NULL REFERENCES branches(id)
);
"#;

const CREATE_ACCOUNTS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES customers(id),
    account_type TEXT NOT NULL,
    balance REAL NOT NULL,
    opened_at TEXT NOT NULL
);
"#;

const CREATE_TRANSACTIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL REFERENCES accounts(id),
    amount REAL NOT NULL,
    type TEXT NOT NULL,
    transaction_date TEXT NOT NULL,
    description TEXT
);
"#;

const CREATE_MASKED_CUSTOMERS_VIEW_SQL: &str = r#"
DROP VIEW IF EXISTS viewer_customers;
CREATE VIEW viewer_customers AS
SELECT
    id,
    first_name,
    last_name,
    email,
    'XXXX-XXXX-' || substr(national_id, -4, 4) AS national_id,
    branch_id
FROM customers;
"#;

const BRANCHES: &[(i64, &str, &str, &str)] = &[
    (1, "Downtown", "New York", "NY"),
    (2, "Uptown", "Chicago", "IL"),
    (3, "Midtown", "New York", "NY"),
];

const CUSTOMERS: &[(i64, &str, &str, &str, &str, &str, i64)] = &[
    (1, "John", "Doe", "john.doe@example.com", "male", "1234-5678-9012", 1),
    (2, "Jane", "Smith", "jane.smith@example.com", "female", "2345-6789-0123", 2),
    (3, "Peter", "Jones", "peter.jones@example.com", "male", "3456-7890-1234", 1),
    (4, "Mary", "Johnson", "mary.johnson@example.com", "female", "4567-8901-2345", 3),
    (5, "Alex", "Kim", "alex.kim@example.com", "other", "5678-9012-3456", 2),
];

const ACCOUNTS: &[(i64, i64, &str, f64, &str)] = &[
    (1, 1, "savings", 1000.0, "2022-03-01"),
    (2, 2, "checking", 2500.0, "2022-04-12"),
    (3, 3, "savings", 5000.0, "2022-06-30"),
    (4, 4, "checking", 100.0, "2022-08-15"),
    (5, 1, "checking", 750.0, "2023-01-02"),
    (6, 5, "savings", 320.0, "2023-02-20"),
];

const TRANSACTIONS: &[(i64, i64, f64, &str, &str, &str)] = &[
    (1, 1, 500.0, "deposit", "2023-01-15T10:00:00Z", "Initial deposit"),
    (2, 2, 1000.0, "deposit", "2023-01-16T11:00:00Z", "Paycheck"),
    (3, 3, 2000.0, "deposit", "2023-01-18T13:00:00Z", "Transfer"),
    (4, 2, 1500.0, "deposit", "2023-01-19T14:00:00Z", "Paycheck"),
    (5, 4, 50.0, "deposit", "2023-01-20T15:00:00Z", "Cash deposit"),
    (6, 1, -200.0, "withdrawal", "2023-01-21T16:00:00Z", "Bill payment"),
    (7, 5, -45.5, "withdrawal", "2023-01-22T09:30:00Z", "Groceries"),
    (8, 6, 320.0, "deposit", "2023-02-20T12:00:00Z", "Opening deposit"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DemoDatabaseStats {
    pub branches: usize,
    pub customers: usize,
    pub accounts: usize,
    pub transactions: usize,
}

#[must_use]
pub fn schema_statements() -> &'static [&'static str] {
    &[
        CREATE_BRANCHES_TABLE_SQL,
        CREATE_CUSTOMERS_TABLE_SQL,
        CREATE_ACCOUNTS_TABLE_SQL,
        CREATE_TRANSACTIONS_TABLE_SQL,
        CREATE_AUDIT_TABLE_SQL,
        CREATE_MASKED_CUSTOMERS_VIEW_SQL,
    ]
}

pub fn open_sqlite_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create sqlite parent directory: {}",
                parent.display()
            )
        })?;
    }

    Connection::open(path)
        .with_context(|| format!("failed to open sqlite database: {}", path.display()))
}

/// Create the audit table if it is missing; safe to call on any database.
pub fn ensure_audit_table(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(CREATE_AUDIT_TABLE_SQL)
        .context("failed to create audit table")
}

/// Write the demo banking database to `path`.
///
/// An existing file is only replaced when `overwrite` is set.
pub fn init_demo_database(path: &Path, overwrite: bool) -> Result<DemoDatabaseStats> {
    if path.exists() {
        if !overwrite {
            bail!(
                "database already exists: {} (pass --force to replace it)",
                path.display()
            );
        }
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove existing database: {}", path.display()))?;
    }

    let mut connection = open_sqlite_connection(path)?;
    connection
        .execute_batch(&schema_statements().join("\n"))
        .context("failed to create demo schema")?;

    let tx = connection
        .transaction()
        .context("failed to start seed transaction")?;
    for (id, name, city, state) in BRANCHES {
        tx.execute(
            "INSERT INTO branches (id, name, city, state) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, city, state],
        )
        .context("failed to seed branches")?;
    }
    for (id, first_name, last_name, email, gender, national_id, branch_id) in CUSTOMERS {
        tx.execute(
            "INSERT INTO customers (id, first_name, last_name, email, gender, national_id, branch_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, first_name, last_name, email, gender, national_id, branch_id],
        )
        .context("failed to seed customers")?;
    }
    for (id, customer_id, account_type, balance, opened_at) in ACCOUNTS {
        tx.execute(
            "INSERT INTO accounts (id, customer_id, account_type, balance, opened_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, customer_id, account_type, balance, opened_at],
        )
        .context("failed to seed accounts")?;
    }
    for (id, account_id, amount, kind, transaction_date, description) in TRANSACTIONS {
        tx.execute(
            "INSERT INTO transactions (id, account_id, amount, type, transaction_date, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, account_id, amount, kind, transaction_date, description],
        )
        .context("failed to seed transactions")?;
    }
    tx.commit().context("failed to commit demo seed")?;

    tracing::info!(path = %path.display(), "demo database initialized");
    Ok(DemoDatabaseStats {
        branches: BRANCHES.len(),
        customers: CUSTOMERS.len(),
        accounts: ACCOUNTS.len(),
        transactions: TRANSACTIONS.len(),
    })
}
