//! Best-effort repair of plausible but wrong candidates.
//!
//! Three detectors run in order; each may issue one guided re-ask. A re-ask
//! result replaces the candidate only when it is a `SELECT`. Failures of the
//! re-ask collaborator are logged and absorbed here.

pub mod rules;

use serde::Serialize;

use crate::error::GenerationError;
use crate::sql::{starts_with_select, strip_generator_artifacts, trim_statement_tail};

/// Regenerates a query for `question` with extra instructions appended to the prompt.
pub trait GuidedAsk {
    fn ask_with_guidance(&self, question: &str, guidance: &str) -> Result<String, GenerationError>;
}

/// Whether the current generator can be re-asked at all.
#[derive(Clone, Copy)]
pub enum Reask<'a> {
    Available(&'a dyn GuidedAsk),
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    DegeneratePattern,
    Relevance,
    IntentConsistency,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub candidate: String,
    /// Detectors whose re-ask result was adopted, in the order they ran.
    pub adopted: Vec<Detector>,
}

impl Correction {
    /// Any adopted rewrite makes cached generations for this question suspect.
    #[must_use]
    pub fn invalidates_cache(&self) -> bool {
        !self.adopted.is_empty()
    }
}

pub fn correct(candidate: &str, question: &str, reask: Reask<'_>) -> Correction {
    let mut correction = Correction {
        candidate: candidate.to_string(),
        adopted: Vec::new(),
    };
    let Reask::Available(asker) = reask else {
        return correction;
    };

    if rules::is_degenerate(&correction.candidate) {
        attempt(
            &mut correction,
            asker,
            question,
            Detector::DegeneratePattern,
            &rules::DEGENERATE_GUIDANCE.join("\n"),
        );
    }

    if rules::reads_unrequested_table(&correction.candidate, question) {
        attempt(
            &mut correction,
            asker,
            question,
            Detector::Relevance,
            &rules::RELEVANCE_GUIDANCE.join("\n"),
        );
    }

    let intent = rules::intent_guidance(&correction.candidate, question);
    if !intent.is_empty() {
        let guidance = intent
            .iter()
            .map(|rule| rule.guidance)
            .collect::<Vec<_>>()
            .join("\n");
        attempt(
            &mut correction,
            asker,
            question,
            Detector::IntentConsistency,
            &guidance,
        );
    }

    correction
}

fn attempt(
    correction: &mut Correction,
    asker: &dyn GuidedAsk,
    question: &str,
    detector: Detector,
    guidance: &str,
) {
    tracing::info!(?detector, "defect detected; re-asking generator");
    match asker.ask_with_guidance(question, guidance) {
        Ok(reply) => match adoptable(&reply) {
            Some(sql) => {
                tracing::debug!(?detector, %sql, "corrected candidate adopted");
                correction.candidate = sql;
                correction.adopted.push(detector);
            }
            None => tracing::debug!(?detector, "re-ask reply was not a SELECT; keeping candidate"),
        },
        Err(error) => tracing::warn!(?detector, %error, "guided re-ask failed; keeping candidate"),
    }
}

fn adoptable(reply: &str) -> Option<String> {
    let cleaned = strip_generator_artifacts(reply);
    let sql = trim_statement_tail(&cleaned);
    (!sql.is_empty() && starts_with_select(sql)).then(|| sql.to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::{Detector, GuidedAsk, Reask, correct};
    use crate::error::GenerationError;

    struct Scripted {
        replies: RefCell<Vec<Result<String, GenerationError>>>,
        guidance_seen: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                guidance_seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl GuidedAsk for Scripted {
        fn ask_with_guidance(&self, _question: &str, guidance: &str) -> Result<String, GenerationError> {
            self.guidance_seen.borrow_mut().push(guidance.to_string());
            self.replies.borrow_mut().remove(0)
        }
    }

    #[test]
    fn unavailable_reask_leaves_candidate_untouched() {
        let degenerate = "SELECT t.id, t.amount, t.type, t.transaction_date FROM transactions t ORDER BY t.transaction_date DESC LIMIT 25";
        let correction = correct(degenerate, "Accounts per gender", Reask::Unavailable);
        assert_eq!(correction.candidate, degenerate);
        assert!(!correction.invalidates_cache());
    }

    #[test]
    fn non_select_reply_is_ignored() {
        let asker = Scripted::new(vec![Ok("I cannot answer that".to_string())]);
        let correction = correct(
            "SELECT c.gender FROM customers c JOIN transactions t ON t.customer_id = c.id GROUP BY c.gender",
            "Customers by gender",
            Reask::Available(&asker),
        );
        assert!(correction.candidate.contains("transactions"));
        assert!(correction.adopted.is_empty());
        assert_eq!(asker.guidance_seen.borrow().len(), 1);
    }

    #[test]
    fn failed_reask_is_absorbed() {
        let asker = Scripted::new(vec![Err(GenerationError::Unavailable("offline".to_string()))]);
        let correction = correct(
            "SELECT a.id FROM accounts a",
            "Accounts that had a withdrawal",
            Reask::Available(&asker),
        );
        assert_eq!(correction.candidate, "SELECT a.id FROM accounts a");
        assert!(!correction.invalidates_cache());
    }

    #[test]
    fn intent_rules_share_one_reask() {
        let asker = Scripted::new(vec![Ok(
            "```sql\nSELECT a.id FROM accounts a WHERE NOT EXISTS (SELECT 1 FROM transactions t WHERE t.account_id = a.id AND t.type = 'withdrawal');\n```"
                .to_string(),
        )]);
        let correction = correct(
            "SELECT a.id FROM accounts a",
            "Which accounts never made a withdrawal?",
            Reask::Available(&asker),
        );

        assert_eq!(correction.adopted, vec![Detector::IntentConsistency]);
        assert!(correction.candidate.starts_with("SELECT a.id FROM accounts a WHERE NOT EXISTS"));
        assert!(!correction.candidate.ends_with(';'));
        let seen = asker.guidance_seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].lines().count(), 2);
    }
}
