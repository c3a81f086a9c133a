//! Live schema introspection.
//!
//! Produces the table→columns map the guard qualifies against, the text the
//! generator is prompted with, and a fingerprint of that text which
//! partitions the generation cache.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;

use crate::error::IntrospectionError;
use crate::utils::hash::sha256_hex;

pub type TableColumnMap = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SchemaFingerprint(String);

impl SchemaFingerprint {
    #[must_use]
    pub fn of(schema_text: &str) -> Self {
        Self(sha256_hex(schema_text))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SchemaFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaObject {
    pub name: String,
    pub kind: String,
    pub columns: Vec<ColumnDescriptor>,
}

/// Raw catalog contents as read from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSnapshot {
    pub objects: Vec<SchemaObject>,
}

impl SchemaSnapshot {
    #[must_use]
    pub fn table_columns(&self) -> TableColumnMap {
        self.objects
            .iter()
            .map(|object| {
                let columns = object
                    .columns
                    .iter()
                    .map(|column| column.name.clone())
                    .collect();
                (object.name.clone(), columns)
            })
            .collect()
    }

    /// One line per object: `name(col TYPE, ...)`, views suffixed with `-- view`.
    #[must_use]
    pub fn schema_text(&self) -> String {
        self.objects
            .iter()
            .map(|object| {
                let columns = object
                    .columns
                    .iter()
                    .map(|column| match &column.declared_type {
                        Some(declared) if !declared.is_empty() => {
                            format!("{} {declared}", column.name)
                        }
                        _ => column.name.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                if object.kind == "view" {
                    format!("{}({columns}) -- view", object.name)
                } else {
                    format!("{}({columns})", object.name)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Everything the pipeline needs to know about the schema for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescription {
    pub tables: TableColumnMap,
    pub text: String,
    pub fingerprint: SchemaFingerprint,
}

pub trait SchemaProvider: Send + Sync {
    fn introspect(&self) -> Result<SchemaSnapshot, IntrospectionError>;
}

pub fn describe(provider: &dyn SchemaProvider) -> Result<SchemaDescription, IntrospectionError> {
    let snapshot = provider.introspect()?;
    let text = snapshot.schema_text();
    Ok(SchemaDescription {
        tables: snapshot.table_columns(),
        fingerprint: SchemaFingerprint::of(&text),
        text,
    })
}

/// Reads `sqlite_schema` through a read-only connection.
#[derive(Debug, Clone)]
pub struct SqliteSchemaProvider {
    db_path: PathBuf,
    hidden_objects: BTreeSet<String>,
}

impl SqliteSchemaProvider {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            hidden_objects: BTreeSet::from([crate::audit::AUDIT_TABLE.to_string()]),
        }
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn is_hidden(&self, object_name: &str) -> bool {
        object_name.starts_with("sqlite_") || self.hidden_objects.contains(object_name)
    }
}

impl SchemaProvider for SqliteSchemaProvider {
    fn introspect(&self) -> Result<SchemaSnapshot, IntrospectionError> {
        let connection = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|error| {
            IntrospectionError::Unavailable(format!("{}: {error}", self.db_path.display()))
        })?;

        let mut objects = Vec::new();
        for (name, kind) in load_object_names(&connection)? {
            if self.is_hidden(&name) {
                continue;
            }
            let columns = load_columns(&connection, &name)?;
            objects.push(SchemaObject {
                name,
                kind,
                columns,
            });
        }

        tracing::debug!(objects = objects.len(), "schema introspected");
        Ok(SchemaSnapshot { objects })
    }
}

fn load_object_names(connection: &Connection) -> Result<Vec<(String, String)>, IntrospectionError> {
    let catalog_error = |error: rusqlite::Error| IntrospectionError::Catalog(error.to_string());
    let mut statement = connection
        .prepare(
            "SELECT name, type
             FROM sqlite_schema
             WHERE type IN ('table', 'view')
             ORDER BY name ASC",
        )
        .map_err(catalog_error)?;

    let rows = statement
        .query_map([], |row| {
            Ok((row.get::<usize, String>(0)?, row.get::<usize, String>(1)?))
        })
        .map_err(catalog_error)?;

    rows.collect::<Result<Vec<_>, _>>().map_err(catalog_error)
}

fn load_columns(
    connection: &Connection,
    object_name: &str,
) -> Result<Vec<ColumnDescriptor>, IntrospectionError> {
    let catalog_error = |error: rusqlite::Error| {
        IntrospectionError::Catalog(format!("columns of `{object_name}`: {error}"))
    };
    let mut statement = connection
        .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
        .map_err(catalog_error)?;

    let rows = statement
        .query_map([object_name], |row| {
            Ok(ColumnDescriptor {
                name: row.get::<usize, String>(0)?,
                declared_type: row.get::<usize, Option<String>>(1)?,
            })
        })
        .map_err(catalog_error)?;

    rows.collect::<Result<Vec<_>, _>>().map_err(catalog_error)
}

/// Fixed schema, for tests and for callers that already know the catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    snapshot: SchemaSnapshot,
}

impl StaticSchemaProvider {
    #[must_use]
    pub fn new(snapshot: SchemaSnapshot) -> Self {
        Self { snapshot }
    }

    /// Build from `(table, [columns])` pairs; every object is a table.
    #[must_use]
    pub fn from_tables(tables: &[(&str, &[&str])]) -> Self {
        let objects = tables
            .iter()
            .map(|(name, columns)| SchemaObject {
                name: (*name).to_string(),
                kind: "table".to_string(),
                columns: columns
                    .iter()
                    .map(|column| ColumnDescriptor {
                        name: (*column).to_string(),
                        declared_type: None,
                    })
                    .collect(),
            })
            .collect();
        Self::new(SchemaSnapshot { objects })
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn introspect(&self) -> Result<SchemaSnapshot, IntrospectionError> {
        Ok(self.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{SchemaFingerprint, StaticSchemaProvider, describe};

    #[test]
    fn description_maps_tables_to_columns() {
        let provider = StaticSchemaProvider::from_tables(&[
            ("branches", &["id", "name", "city"]),
            ("customers", &["id", "first_name", "branch_id"]),
        ]);
        let description = describe(&provider).expect("static schema should describe");

        assert_eq!(description.tables.len(), 2);
        assert!(description.tables["branches"].contains("city"));
        assert_eq!(
            description.text,
            "branches(id, name, city)\ncustomers(id, first_name, branch_id)"
        );
        assert_eq!(description.fingerprint, SchemaFingerprint::of(&description.text));
        assert_eq!(description.fingerprint.as_str().len(), 64);
    }

    #[test]
    fn fingerprint_changes_with_schema_text() {
        assert_ne!(
            SchemaFingerprint::of("branches(id)"),
            SchemaFingerprint::of("branches(id, name)")
        );
    }
}
