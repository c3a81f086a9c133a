use std::sync::OnceLock;

use regex::Regex;

use crate::sql::table_references;

/// Low-information fallbacks a model emits when it cannot answer, compared
/// against the lower-cased candidate without trailing terminators.
pub const DEGENERATE_SIGNATURES: &[&str] = &[
    "select t.id, t.amount, t.type, t.transaction_date from transactions t order by t.transaction_date desc limit 25",
];

pub const DEGENERATE_GUIDANCE: &[&str] = &[
    "Do NOT return the generic 'latest transactions' query.",
    "Answer the user's question using only relevant tables and attributes.",
    "Avoid using transactions unless explicitly requested by the question.",
];

/// Table the relevance detector watches, and the question words that justify reading it.
pub const WATCHED_TABLE: &str = "transactions";
pub const WATCHED_TABLE_KEYWORDS: &[&str] = &[
    "transaction",
    "transactions",
    "transaction_date",
    "weekend",
    "today",
    "recent",
];

pub const RELEVANCE_GUIDANCE: &[&str] = &[
    "Do NOT use the transactions table unless explicitly asked.",
    "Use customers (c) and accounts (a) tables to compute counts per customer attributes.",
    "For 'accounts per gender', join customers c to accounts a on a.customer_id = c.id, then GROUP BY c.gender and COUNT(a.id).",
    "Return a single SELECT with GROUP BY, and ORDER BY count descending when appropriate.",
];

const RECENCY_WORDS: &[&str] = &["latest", "recent", "today", "weekend", "last", "newest"];
const GROUPING_PHRASES: &[&str] = &[" per ", " for each", "each "];

/// One question-signal → guidance line mapping. Both inputs arrive lower-cased.
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub name: &'static str,
    pub guidance: &'static str,
    matches: fn(question: &str, sql: &str) -> bool,
}

impl IntentRule {
    #[must_use]
    pub fn matches(&self, question: &str, sql: &str) -> bool {
        (self.matches)(question, sql)
    }
}

pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        name: "missing_withdrawal_filter",
        guidance: "When question references withdrawals, include a predicate or CASE using t.type = 'withdrawal'.",
        matches: |question, sql| question.contains("withdrawal") && !sql.contains("withdrawal"),
    },
    IntentRule {
        name: "never_withdrew",
        guidance: "Return accounts with zero withdrawals using LEFT JOIN transactions t ON a.id = t.account_id AND t.type = 'withdrawal' and filter WHERE t.id IS NULL, or use NOT EXISTS.",
        matches: |question, _| question.contains("never") && question.contains("withdrawal"),
    },
    IntentRule {
        name: "missing_group_by",
        guidance: "Use GROUP BY on the attribute being summarized and appropriate aggregates like COUNT().",
        matches: |question, sql| {
            GROUPING_PHRASES.iter().any(|phrase| question.contains(phrase))
                && !group_by_regex().is_match(sql)
        },
    },
    IntentRule {
        name: "unrequested_recency_order",
        guidance: "Do NOT ORDER BY transaction_date unless the question asks for recency; prefer ORDER BY aggregate when relevant.",
        matches: |question, sql| {
            order_by_date_regex().is_match(sql)
                && !RECENCY_WORDS.iter().any(|word| question.contains(word))
        },
    },
];

#[must_use]
pub fn is_degenerate(candidate: &str) -> bool {
    let normalized = candidate
        .trim()
        .trim_end_matches(|ch: char| ch == ';' || ch.is_whitespace())
        .to_lowercase();
    DEGENERATE_SIGNATURES.contains(&normalized.as_str())
}

/// The candidate reads the watched table but the question never mentions it.
#[must_use]
pub fn reads_unrequested_table(candidate: &str, question: &str) -> bool {
    let question = question.to_lowercase();
    let mentioned = WATCHED_TABLE_KEYWORDS
        .iter()
        .any(|keyword| question.contains(keyword));
    !mentioned
        && table_references(candidate)
            .iter()
            .any(|reference| reference.table.eq_ignore_ascii_case(WATCHED_TABLE))
}

/// Guidance lines of every intent rule the pair triggers, in rule order.
#[must_use]
pub fn intent_guidance(candidate: &str, question: &str) -> Vec<&'static IntentRule> {
    let question = question.to_lowercase();
    let sql = candidate.to_lowercase();
    INTENT_RULES
        .iter()
        .filter(|rule| rule.matches(&question, &sql))
        .collect()
}

fn group_by_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\bgroup\s+by\b").expect("group by regex should compile"))
}

fn order_by_date_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\border\s+by\s+(?:\w+\.)?transaction_date\b")
            .expect("order by date regex should compile")
    })
}
