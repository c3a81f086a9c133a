//! Validation and rewriting of a single candidate query.
//!
//! The guard is a pure function of its inputs: it never touches the store.
//! Steps run in a fixed order (artifact stripping, mutation scan, role
//! substitution, parse, column qualification, row cap) so that schema
//! lookups only ever see post-substitution table names.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, TokenizerError};

use crate::config::RoleMappings;
use crate::error::GuardError;
use crate::models::{GuardReason, GuardedQuery, Role};
use crate::schema::TableColumnMap;
use crate::sql::{
    OuterLimit, first_mutating_keyword, has_multiple_statements, is_clause_keyword, lex,
    replace_identifier, starts_with_select, strip_generator_artifacts, trim_statement_tail,
};

/// Guard `candidate` for `role`, resolving the role's substitutions from `mappings`.
pub fn guard(
    candidate: &str,
    role: Role,
    mappings: &RoleMappings,
    schema: &TableColumnMap,
    default_limit: u64,
) -> Result<GuardedQuery, GuardError> {
    guard_with_substitutions(candidate, &mappings.for_role(role), schema, default_limit)
}

pub fn guard_with_substitutions(
    candidate: &str,
    substitutions: &BTreeMap<String, String>,
    schema: &TableColumnMap,
    default_limit: u64,
) -> Result<GuardedQuery, GuardError> {
    let cleaned = strip_generator_artifacts(candidate);
    let mut sql = trim_statement_tail(&cleaned).to_string();

    if let Some(keyword) = first_mutating_keyword(&sql) {
        tracing::warn!(%keyword, "blocked mutating statement");
        return Err(GuardError::NonReadOnly { keyword });
    }

    for (table, replacement) in substitutions {
        sql = replace_identifier(&sql, table, replacement).map_err(parse_failure)?;
    }

    ensure_single_select(&sql)?;
    let sql = qualify_columns(&sql, schema);
    let guarded = enforce_row_cap(&sql, default_limit)?;

    tracing::debug!(sql = %guarded.sql, reason = %guarded.reason_message(), "query guarded");
    Ok(guarded)
}

fn parse_failure(error: TokenizerError) -> GuardError {
    GuardError::ParseFailure(error.to_string())
}

/// Parse `sql` and require exactly one plain `SELECT`.
fn ensure_single_select(sql: &str) -> Result<(), GuardError> {
    if has_multiple_statements(sql) {
        return Err(GuardError::MultipleStatements);
    }

    let mut statements = Parser::parse_sql(&SQLiteDialect {}, sql)
        .map_err(|error| GuardError::ParseFailure(error.to_string()))?;
    if statements.len() > 1 {
        return Err(GuardError::MultipleStatements);
    }
    let Some(statement) = statements.pop() else {
        return Err(GuardError::ParseFailure("no SQL statement found".to_string()));
    };

    let Statement::Query(query) = statement else {
        return Err(GuardError::NotASelect);
    };
    if !matches!(*query.body, SetExpr::Select(_)) || !starts_with_select(sql) {
        return Err(GuardError::NotASelect);
    }
    Ok(())
}

/// Rewrite bare column names owned by exactly one table as `table.column`.
///
/// Ambiguous names are left alone. When the owning table carries an alias in
/// the query, the alias is used as the qualifier. Quoted identifiers are
/// never qualified.
#[must_use]
pub fn qualify_columns(sql: &str, schema: &TableColumnMap) -> String {
    let Ok(lexed) = lex(sql) else {
        return sql.to_string();
    };

    let mut owners: HashMap<String, Vec<&str>> = HashMap::new();
    for (table, columns) in schema {
        for column in columns {
            owners.entry(column.to_lowercase()).or_default().push(table);
        }
    }

    let references = lexed.table_references();
    let table_names: BTreeSet<String> = schema.keys().map(|table| table.to_lowercase()).collect();
    let mut skipped: BTreeSet<String> = lexed.declared_aliases().into_iter().collect();
    skipped.extend(
        references
            .iter()
            .filter_map(|reference| reference.alias.as_ref())
            .map(|alias| alias.to_lowercase()),
    );

    let qualifier_for = |table: &str| -> String {
        references
            .iter()
            .find(|reference| reference.table.eq_ignore_ascii_case(table))
            .and_then(|reference| reference.alias.clone())
            .unwrap_or_else(|| table.to_string())
    };

    lexed.splice(|index, lexeme| {
        let Token::Word(word) = &lexeme.token else {
            return None;
        };
        let lowered = word.value.to_lowercase();
        let candidate = word.quote_style.is_none()
            && lexed.is_unqualified(index)
            && !is_clause_keyword(&word.value)
            && !lexed.is_function_call(index)
            && !table_names.contains(&lowered)
            && !skipped.contains(&lowered);
        if !candidate {
            return None;
        }

        match owners.get(&lowered) {
            Some(tables) if tables.len() == 1 => {
                Some(format!("{}.{}", qualifier_for(tables[0]), word.value))
            }
            Some(tables) => {
                tracing::debug!(column = %word.value, owners = tables.len(), "ambiguous column left unqualified");
                None
            }
            None => None,
        }
    })
}

/// Inject, keep or lower the outermost `LIMIT` so the query never exceeds `default_limit` rows.
fn enforce_row_cap(sql: &str, default_limit: u64) -> Result<GuardedQuery, GuardError> {
    let lexed = lex(sql).map_err(parse_failure)?;

    match lexed.outer_limit() {
        OuterLimit::Missing => Ok(GuardedQuery {
            // the tail is trimmed so a trailing comment cannot swallow the clause
            sql: format!("{} LIMIT {default_limit}", lexed.statement_body()),
            reason: GuardReason::LimitInjected {
                limit: default_limit,
            },
        }),
        OuterLimit::Expression(expression) => Err(GuardError::UnverifiableLimit(expression)),
        OuterLimit::Literal { value, .. } if value <= default_limit => Ok(GuardedQuery {
            sql: sql.to_string(),
            reason: GuardReason::Ok,
        }),
        OuterLimit::Literal { value, lexeme } => Ok(GuardedQuery {
            sql: lexed.splice(|index, _| (index == lexeme).then(|| default_limit.to_string())),
            reason: GuardReason::LimitReduced {
                from: value,
                to: default_limit,
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::{guard_with_substitutions, qualify_columns};
    use crate::error::GuardError;
    use crate::models::GuardReason;
    use crate::schema::TableColumnMap;

    fn bank_schema() -> TableColumnMap {
        let mut schema = TableColumnMap::new();
        schema.insert(
            "branches".to_string(),
            BTreeSet::from(["id".to_string(), "name".to_string(), "city".to_string()]),
        );
        schema.insert(
            "customers".to_string(),
            BTreeSet::from([
                "id".to_string(),
                "first_name".to_string(),
                "gender".to_string(),
                "branch_id".to_string(),
            ]),
        );
        schema
    }

    #[test]
    fn qualifies_only_unambiguous_columns() {
        let sql = qualify_columns("SELECT id, city FROM branches", &bank_schema());
        assert_eq!(sql, "SELECT id, branches.city FROM branches");
    }

    #[test]
    fn qualification_uses_table_alias_and_skips_literals() {
        let sql = qualify_columns(
            "SELECT c.first_name, gender FROM customers c WHERE gender = 'city'",
            &bank_schema(),
        );
        assert_eq!(
            sql,
            "SELECT c.first_name, c.gender FROM customers c WHERE c.gender = 'city'"
        );
    }

    #[test]
    fn qualification_skips_output_aliases_and_functions() {
        let sql = qualify_columns(
            "SELECT COUNT(*) AS city FROM branches ORDER BY city",
            &bank_schema(),
        );
        assert_eq!(sql, "SELECT COUNT(*) AS city FROM branches ORDER BY city");
    }

    #[test]
    fn lowers_only_the_outer_limit() {
        let guarded = guard_with_substitutions(
            "SELECT * FROM (SELECT * FROM branches LIMIT 9000) b LIMIT 9000 OFFSET 2",
            &BTreeMap::new(),
            &TableColumnMap::new(),
            50,
        )
        .expect("outer limit should be lowered");
        assert_eq!(
            guarded.sql,
            "SELECT * FROM (SELECT * FROM branches LIMIT 9000) b LIMIT 50 OFFSET 2"
        );
        assert_eq!(
            guarded.reason,
            GuardReason::LimitReduced { from: 9000, to: 50 }
        );
    }

    #[test]
    fn inner_limit_does_not_count_as_row_cap() {
        let guarded = guard_with_substitutions(
            "SELECT * FROM (SELECT name FROM branches LIMIT 3) b",
            &BTreeMap::new(),
            &TableColumnMap::new(),
            100,
        )
        .expect("subquery should guard");
        assert_eq!(
            guarded.sql,
            "SELECT * FROM (SELECT name FROM branches LIMIT 3) b LIMIT 100"
        );
        assert_eq!(guarded.reason, GuardReason::LimitInjected { limit: 100 });
    }

    #[test]
    fn rejects_placeholder_limit() {
        let err = guard_with_substitutions(
            "SELECT * FROM branches LIMIT ?",
            &BTreeMap::new(),
            &TableColumnMap::new(),
            100,
        )
        .expect_err("non-literal limit must fail");
        assert!(matches!(err, GuardError::UnverifiableLimit(_)));
    }

    #[test]
    fn rejects_empty_candidate() {
        let err = guard_with_substitutions("```sql\n```", &BTreeMap::new(), &TableColumnMap::new(), 100)
            .expect_err("empty candidate must fail");
        assert!(matches!(err, GuardError::ParseFailure(_)));
    }
}
