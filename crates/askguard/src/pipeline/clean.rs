use sqlparser::tokenizer::Token;

use crate::error::GenerationError;
use crate::sql::{lex, starts_with_select, strip_generator_artifacts, trim_statement_tail};

/// Normalize raw generator output into a single candidate `SELECT`.
pub fn clean_candidate(raw: &str) -> Result<String, GenerationError> {
    let stripped = strip_generator_artifacts(raw);
    let Some(first) = first_statement(&stripped) else {
        return Err(GenerationError::Empty);
    };
    if !starts_with_select(first) {
        return Err(GenerationError::NotASelect);
    }

    let candidate = trim_statement_tail(first);
    if candidate.is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(candidate.to_string())
}

/// First `;`-separated piece that holds anything besides whitespace and comments.
///
/// Text that does not tokenize is returned whole; the guard reports it.
fn first_statement(sql: &str) -> Option<&str> {
    let Ok(lexed) = lex(sql) else {
        return Some(sql.trim()).filter(|text| !text.is_empty());
    };
    let mut start = 0usize;
    let mut substantive = false;

    for lexeme in lexed.lexemes() {
        if lexeme.token == Token::SemiColon {
            if substantive {
                return Some(sql[start..lexeme.start].trim());
            }
            start = lexeme.end;
        } else if !lexeme.is_trivia() {
            substantive = true;
        }
    }

    substantive.then(|| sql[start..].trim())
}

#[cfg(test)]
mod tests {
    use super::clean_candidate;
    use crate::error::GenerationError;

    #[test]
    fn keeps_first_non_empty_statement() {
        assert_eq!(
            clean_candidate("```sql\n; SELECT name FROM branches; DROP TABLE branches;\n```"),
            Ok("SELECT name FROM branches".to_string())
        );
    }

    #[test]
    fn semicolons_inside_literals_do_not_split() {
        assert_eq!(
            clean_candidate("SELECT * FROM branches WHERE name = 'a;b';"),
            Ok("SELECT * FROM branches WHERE name = 'a;b'".to_string())
        );
    }

    #[test]
    fn drops_trailing_comments() {
        assert_eq!(
            clean_candidate("SELECT name FROM branches -- every branch"),
            Ok("SELECT name FROM branches".to_string())
        );
    }

    #[test]
    fn rejects_non_select_and_empty_output() {
        assert_eq!(
            clean_candidate("SQLResult: UPDATE branches SET name = 'x'"),
            Err(GenerationError::NotASelect)
        );
        assert_eq!(clean_candidate("```sql\n```"), Err(GenerationError::Empty));
        assert_eq!(clean_candidate("  ;; "), Err(GenerationError::Empty));
        assert_eq!(
            clean_candidate("-- nothing to run\n;"),
            Err(GenerationError::Empty)
        );
    }
}
