//! Token-level SQL helpers on top of `sqlparser`'s tokenizer.
//!
//! Rewrites splice replacement text into the source at token spans, so
//! literals, comments and spacing stay exactly as written.

use sqlparser::dialect::SQLiteDialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer, TokenizerError};

/// Wrapper text that code-generation models put around the query.
pub const GENERATOR_ARTIFACTS: &[&str] = &["SQLResult:", "```sql", "```", "\"\"\""];

pub const MUTATING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "truncate", "replace", "attach",
    "detach",
];

/// Words that can follow a table reference without being its alias.
const CLAUSE_KEYWORDS: &[&str] = &[
    "on", "using", "where", "group", "order", "having", "limit", "offset", "window", "union",
    "intersect", "except", "join", "inner", "left", "right", "full", "outer", "cross", "natural",
    "select", "from", "as", "and", "or", "not", "by", "asc", "desc", "when", "then", "else",
    "end", "case", "in", "is", "like", "between", "exists", "null", "with", "values", "set",
];

/// A token and the byte range it covers in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

impl Lexeme {
    /// Whitespace and comments.
    #[must_use]
    pub fn is_trivia(&self) -> bool {
        matches!(self.token, Token::Whitespace(_))
    }

    /// Unquoted word equal to `keyword`, in any case.
    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(
            &self.token,
            Token::Word(word) if word.quote_style.is_none() && word.value.eq_ignore_ascii_case(keyword)
        )
    }

    /// Identifier text with any quoting removed. Clause keywords are not identifiers.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match &self.token {
            Token::Word(word) if word.quote_style.is_some() || !is_clause_keyword(&word.value) => {
                Some(&word.value)
            }
            _ => None,
        }
    }
}

/// SQL text split into spanned tokens.
#[derive(Debug, Clone)]
pub struct Lexed<'a> {
    source: &'a str,
    lexemes: Vec<Lexeme>,
}

pub fn lex(sql: &str) -> Result<Lexed<'_>, TokenizerError> {
    let tokens = Tokenizer::new(&SQLiteDialect {}, sql).tokenize_with_location()?;
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(index, _)| index + 1))
        .collect();

    let lexemes = tokens
        .into_iter()
        .filter(|spanned| spanned.token != Token::EOF)
        .map(|spanned| Lexeme {
            start: byte_offset(sql, &line_starts, spanned.span.start),
            end: byte_offset(sql, &line_starts, spanned.span.end),
            token: spanned.token,
        })
        .collect();
    Ok(Lexed {
        source: sql,
        lexemes,
    })
}

/// Tokenizer locations are 1-based lines and character columns.
fn byte_offset(source: &str, line_starts: &[usize], location: Location) -> usize {
    let line = usize::try_from(location.line).unwrap_or(usize::MAX);
    let Some(&line_start) = line_starts.get(line.saturating_sub(1)) else {
        return source.len();
    };
    let column = usize::try_from(location.column).unwrap_or(usize::MAX);
    source[line_start..]
        .char_indices()
        .nth(column.saturating_sub(1))
        .map_or(source.len(), |(offset, _)| line_start + offset)
}

impl<'a> Lexed<'a> {
    #[must_use]
    pub fn source(&self) -> &'a str {
        self.source
    }

    #[must_use]
    pub fn lexemes(&self) -> &[Lexeme] {
        &self.lexemes
    }

    #[must_use]
    pub fn text(&self, index: usize) -> &'a str {
        let lexeme = &self.lexemes[index];
        &self.source[lexeme.start..lexeme.end]
    }

    /// Index of the next non-trivia token after `index`.
    #[must_use]
    pub fn next_significant(&self, index: usize) -> Option<usize> {
        (index + 1..self.lexemes.len()).find(|candidate| !self.lexemes[*candidate].is_trivia())
    }

    /// Index of the closest non-trivia token before `index`.
    #[must_use]
    pub fn prev_significant(&self, index: usize) -> Option<usize> {
        (0..index)
            .rev()
            .find(|candidate| !self.lexemes[*candidate].is_trivia())
    }

    /// Source text up to the end of the last token that is neither trivia nor a terminator.
    #[must_use]
    pub fn statement_body(&self) -> &'a str {
        let end = self
            .lexemes
            .iter()
            .rev()
            .find(|lexeme| !lexeme.is_trivia() && lexeme.token != Token::SemiColon)
            .map_or(0, |lexeme| lexeme.end);
        self.source[..end].trim()
    }

    /// Rebuild the source, swapping in text for every token `replace` returns `Some` for.
    pub fn splice(&self, mut replace: impl FnMut(usize, &Lexeme) -> Option<String>) -> String {
        let mut rewritten = String::with_capacity(self.source.len() + 16);
        let mut cursor = 0usize;
        for (index, lexeme) in self.lexemes.iter().enumerate() {
            if let Some(replacement) = replace(index, lexeme) {
                rewritten.push_str(&self.source[cursor..lexeme.start]);
                rewritten.push_str(&replacement);
                cursor = lexeme.end;
            }
        }
        rewritten.push_str(&self.source[cursor..]);
        rewritten
    }

    /// True for a word that is not part of a dotted `x.word` or `word.x` path.
    #[must_use]
    pub fn is_unqualified(&self, index: usize) -> bool {
        let is_period = |position: Option<usize>| {
            position
                .and_then(|position| self.lexemes.get(position))
                .is_some_and(|lexeme| lexeme.token == Token::Period)
        };
        matches!(self.lexemes[index].token, Token::Word(_))
            && !is_period(index.checked_sub(1))
            && !is_period(Some(index + 1))
    }

    #[must_use]
    pub fn is_function_call(&self, index: usize) -> bool {
        self.next_significant(index)
            .is_some_and(|next| self.lexemes[next].token == Token::LParen)
    }

    /// Tables read by the query, in order of appearance.
    ///
    /// An identifier counts as a table reference when it directly follows
    /// `FROM`, `JOIN` or a comma inside a `FROM` list. Quoted names count too.
    #[must_use]
    pub fn table_references(&self) -> Vec<TableReference> {
        let mut references = Vec::new();
        let mut in_from_list = false;

        for (index, lexeme) in self.lexemes.iter().enumerate() {
            if lexeme.is_trivia() {
                continue;
            }
            if matches!(&lexeme.token, Token::Word(_)) && lexeme.identifier().is_none() {
                in_from_list = lexeme.is_keyword("from") || lexeme.is_keyword("join");
                continue;
            }
            if matches!(lexeme.token, Token::LParen | Token::RParen) {
                in_from_list = false;
                continue;
            }

            let introduced = self.prev_significant(index).is_some_and(|prev| {
                let prev = &self.lexemes[prev];
                prev.is_keyword("from")
                    || prev.is_keyword("join")
                    || (in_from_list && prev.token == Token::Comma)
            });
            if !introduced || !self.is_unqualified(index) {
                continue;
            }
            let Some(table) = lexeme.identifier() else {
                continue;
            };

            references.push(TableReference {
                table: table.to_string(),
                alias: self.alias_after(index),
            });
        }

        references
    }

    fn alias_after(&self, table_index: usize) -> Option<String> {
        let mut next = self.next_significant(table_index)?;
        if self.lexemes[next].is_keyword("as") {
            next = self.next_significant(next)?;
        }
        self.lexemes[next].identifier().map(str::to_string)
    }

    /// Output aliases declared with `AS`, lower-cased and unquoted.
    #[must_use]
    pub fn declared_aliases(&self) -> Vec<String> {
        self.lexemes
            .iter()
            .enumerate()
            .filter(|(_, lexeme)| lexeme.is_keyword("as"))
            .filter_map(|(index, _)| self.next_significant(index))
            .filter_map(|next| self.lexemes[next].identifier())
            .map(str::to_lowercase)
            .collect()
    }

    /// The row count of the outermost `LIMIT` clause.
    #[must_use]
    pub fn outer_limit(&self) -> OuterLimit {
        let mut depth = 0usize;
        let mut keyword = None;
        for (index, lexeme) in self.lexemes.iter().enumerate() {
            match &lexeme.token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                _ if depth == 0 && lexeme.is_keyword("limit") => keyword = Some(index),
                _ => {}
            }
        }

        let Some(keyword) = keyword else {
            return OuterLimit::Missing;
        };
        let Some(count) = self.next_significant(keyword) else {
            return OuterLimit::Expression(String::new());
        };

        let literal = match &self.lexemes[count].token {
            Token::Number(digits, _) => digits.parse::<u64>().ok(),
            _ => None,
        };
        let ends_clause = self
            .next_significant(count)
            .is_none_or(|next| self.lexemes[next].is_keyword("offset"));
        match literal {
            Some(value) if ends_clause => OuterLimit::Literal {
                value,
                lexeme: count,
            },
            _ => OuterLimit::Expression(self.source[self.lexemes[count].start..].trim().to_string()),
        }
    }
}

/// Row count found after the outermost `LIMIT` keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OuterLimit {
    Missing,
    /// A plain integer; `lexeme` indexes its token.
    Literal { value: u64, lexeme: usize },
    Expression(String),
}

/// A table named in a `FROM`/`JOIN` position, with the alias it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    pub table: String,
    pub alias: Option<String>,
}

#[must_use]
pub fn strip_generator_artifacts(raw: &str) -> String {
    let mut cleaned = raw.to_string();
    for artifact in GENERATOR_ARTIFACTS {
        cleaned = cleaned.replace(artifact, "");
    }
    cleaned.trim().to_string()
}

/// Drop trailing terminators along with any comments and whitespace after the last clause.
pub fn trim_statement_tail(raw_sql: &str) -> &str {
    let trimmed = raw_sql.trim();
    match lex(trimmed) {
        Ok(lexed) => lexed.statement_body(),
        Err(_) => {
            let mut candidate = trimmed;
            while let Some(stripped) = candidate.strip_suffix(';') {
                candidate = stripped.trim_end();
            }
            candidate
        }
    }
}

/// True when the first word of the text is `SELECT`, in any case.
#[must_use]
pub fn starts_with_select(sql: &str) -> bool {
    match lex(sql) {
        Ok(lexed) => lexed
            .lexemes()
            .iter()
            .find(|lexeme| !lexeme.is_trivia())
            .is_some_and(|lexeme| lexeme.is_keyword("select")),
        Err(_) => {
            let text = sql.trim_start();
            let end = text.find(|ch: char| !is_word_char(ch)).unwrap_or(text.len());
            text[..end].eq_ignore_ascii_case("select")
        }
    }
}

/// True when a statement terminator is followed by more SQL.
#[must_use]
pub fn has_multiple_statements(sql: &str) -> bool {
    match lex(sql) {
        Ok(lexed) => lexed.lexemes().iter().enumerate().any(|(index, lexeme)| {
            lexeme.token == Token::SemiColon && lexed.next_significant(index).is_some()
        }),
        Err(_) => sql
            .split_once(';')
            .is_some_and(|(_, rest)| !trim_statement_tail(rest).is_empty()),
    }
}

pub fn first_mutating_keyword(sql: &str) -> Option<String> {
    let normalized = sql.to_lowercase();
    normalized
        .split(|ch: char| !is_word_char(ch))
        .find_map(|token| {
            MUTATING_KEYWORDS
                .contains(&token)
                .then_some(token.to_string())
        })
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

#[must_use]
pub fn is_clause_keyword(word: &str) -> bool {
    CLAUSE_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(word))
}

/// Tables read by the query; empty when the text does not tokenize.
#[must_use]
pub fn table_references(sql: &str) -> Vec<TableReference> {
    lex(sql)
        .map(|lexed| lexed.table_references())
        .unwrap_or_default()
}

/// Replace every identifier equal to `from` (case-insensitive) with `to`.
///
/// Quoted identifiers are matched on their unquoted text and keep their
/// quoting. Literals and comments stay as written.
pub fn replace_identifier(sql: &str, from: &str, to: &str) -> Result<String, TokenizerError> {
    let lexed = lex(sql)?;
    Ok(lexed.splice(|_, lexeme| match &lexeme.token {
        Token::Word(word) if word.value.eq_ignore_ascii_case(from) => {
            Some(match word.quote_style {
                Some('[') => format!("[{to}]"),
                Some(quote) => format!("{quote}{to}{quote}"),
                None => to.to_string(),
            })
        }
        _ => None,
    }))
}
