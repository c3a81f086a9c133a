use std::fmt::{Display, Formatter};
use std::str::FromStr;

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Analyst,
    Viewer,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Analyst, Role::Viewer, Role::Admin];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Analyst => "analyst",
            Self::Viewer => "viewer",
            Self::Admin => "admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| {
                format!("Invalid role `{raw}`. Must be one of: analyst, viewer, admin")
            })
    }
}

/// One incoming request: the free-text question and who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub role: Role,
    pub user: String,
}

impl Question {
    #[must_use]
    pub fn new(text: impl Into<String>, role: Role, user: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role,
            user: user.into(),
        }
    }

    #[must_use]
    pub fn anonymous(text: impl Into<String>) -> Self {
        Self::new(text, Role::default(), ANONYMOUS_USER)
    }
}

#[cfg(test)]
mod tests {
    use super::{Question, Role};

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Viewer".parse::<Role>(), Ok(Role::Viewer));
        assert_eq!(" admin ".parse::<Role>(), Ok(Role::Admin));
        let err = "root".parse::<Role>().expect_err("unknown role must fail");
        assert!(err.contains("Must be one of"));
    }

    #[test]
    fn anonymous_question_defaults_to_analyst() {
        let question = Question::anonymous("How many branches?");
        assert_eq!(question.role, Role::Analyst);
        assert_eq!(question.user, "anonymous");
    }
}
