//! Operations and the stdin answer scripts their external scripts expect.
//!
//! | Operation         | Answers                                   | Mode      |
//! |-------------------|-------------------------------------------|-----------|
//! | create            | confirm                                   | detached  |
//! | delete            | bare name, `BORRAR<full name>`            | attached  |
//! | update-database   | confirm, neutralize flag                  | detached  |
//! | update-files      | confirm                                   | detached  |
//! | sync-filestore    | confirm                                   | detached  |
//! | restart           | (no script)                               | attached  |
//! | regenerate-assets | (none, `--force`)                         | detached  |
//!
//! When a script's prompts change, bump its protocol number and adjust the
//! answer list here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// "Yes" answer to the scripts' `[s/n]` prompts.
pub const CONFIRM_TOKEN: &str = "s";
pub const DECLINE_TOKEN: &str = "n";
/// Keyword the removal script wants in front of the full instance name.
pub const DELETE_KEYWORD: &str = "BORRAR";
/// Prefix of development instance directory names.
pub const DEV_PREFIX: &str = "dev-";

const CREATE_PROTOCOL: u16 = 1;
const DELETE_PROTOCOL: u16 = 1;
const UPDATE_DATABASE_PROTOCOL: u16 = 1;
const CONFIRM_ONLY_PROTOCOL: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Create,
    Delete,
    UpdateDatabase,
    UpdateFiles,
    SyncFilestore,
    Restart,
    RegenerateAssets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Launched in its own session; the caller never waits.
    Detached,
    /// The caller waits up to a ceiling and inspects the exit code.
    Attached,
}

impl Operation {
    pub const ALL: [Self; 7] = [
        Self::Create,
        Self::Delete,
        Self::UpdateDatabase,
        Self::UpdateFiles,
        Self::SyncFilestore,
        Self::Restart,
        Self::RegenerateAssets,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::UpdateDatabase => "update-database",
            Self::UpdateFiles => "update-files",
            Self::SyncFilestore => "sync-filestore",
            Self::Restart => "restart",
            Self::RegenerateAssets => "regenerate-assets",
        }
    }

    /// Name fragment of the operation's log file.
    pub fn log_slug(self) -> &'static str {
        match self {
            Self::Create => "create-dev",
            Self::UpdateDatabase => "update-db",
            other => other.as_str(),
        }
    }

    pub fn mode(self) -> ExecutionMode {
        match self {
            Self::Delete | Self::Restart => ExecutionMode::Attached,
            _ => ExecutionMode::Detached,
        }
    }

    /// Whether the operation writes a log file at all.
    pub fn has_log(self) -> bool {
        self != Self::Restart
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s || op.log_slug() == s)
            .ok_or_else(|| AppError::invalid_request(format!("Unknown operation: {}", s)))
    }
}

/// One typed line of an answer script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// Confirmation prompt, answered with [`CONFIRM_TOKEN`].
    Confirm,
    /// Yes/no prompt.
    Flag(bool),
    /// Free text (names, keyword tokens).
    Text(String),
}

impl Answer {
    fn render(&self) -> &str {
        match self {
            Self::Confirm | Self::Flag(true) => CONFIRM_TOKEN,
            Self::Flag(false) => DECLINE_TOKEN,
            Self::Text(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerScript {
    pub protocol: u16,
    pub answers: Vec<Answer>,
}

impl AnswerScript {
    pub fn create() -> Self {
        Self {
            protocol: CREATE_PROTOCOL,
            answers: vec![Answer::Confirm],
        }
    }

    /// `remove-dev-instance.sh` asks for the name without the `dev-` prefix,
    /// then for `BORRAR` followed by the full name.
    pub fn delete(instance_name: &str) -> Self {
        Self {
            protocol: DELETE_PROTOCOL,
            answers: vec![
                Answer::Text(bare_name(instance_name).to_string()),
                Answer::Text(format!("{}{}", DELETE_KEYWORD, instance_name)),
            ],
        }
    }

    pub fn update_database(neutralize: bool) -> Self {
        Self {
            protocol: UPDATE_DATABASE_PROTOCOL,
            answers: vec![Answer::Confirm, Answer::Flag(neutralize)],
        }
    }

    /// update-files and sync-filestore only ask to continue.
    pub fn confirm_only() -> Self {
        Self {
            protocol: CONFIRM_ONLY_PROTOCOL,
            answers: vec![Answer::Confirm],
        }
    }

    /// Newline-terminated lines, ready for a single stdin write.
    pub fn render(&self) -> String {
        self.answers
            .iter()
            .map(|answer| format!("{}\n", answer.render()))
            .collect()
    }
}

/// Instance name with the development prefix stripped once.
pub fn bare_name(instance_name: &str) -> &str {
    instance_name
        .strip_prefix(DEV_PREFIX)
        .unwrap_or(instance_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_answers_strip_prefix_and_append_keyword() {
        assert_eq!(
            AnswerScript::delete("dev-foo").render(),
            "foo\nBORRARdev-foo\n"
        );
        // Only the leading prefix goes.
        assert_eq!(
            AnswerScript::delete("dev-my-dev-box").render(),
            "my-dev-box\nBORRARdev-my-dev-box\n"
        );
    }

    #[test]
    fn update_database_encodes_neutralize_flag() {
        assert_eq!(AnswerScript::update_database(true).render(), "s\ns\n");
        assert_eq!(AnswerScript::update_database(false).render(), "s\nn\n");
    }

    #[test]
    fn confirm_scripts() {
        assert_eq!(AnswerScript::create().render(), "s\n");
        assert_eq!(AnswerScript::confirm_only().render(), "s\n");
    }

    #[test]
    fn operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
            assert_eq!(op.log_slug().parse::<Operation>().unwrap(), op);
        }
        assert!("bogus".parse::<Operation>().is_err());
    }

    #[test]
    fn modes_and_logs() {
        assert_eq!(Operation::Delete.mode(), ExecutionMode::Attached);
        assert_eq!(Operation::Restart.mode(), ExecutionMode::Attached);
        assert_eq!(Operation::UpdateFiles.mode(), ExecutionMode::Detached);
        assert!(!Operation::Restart.has_log());
        assert_eq!(Operation::Create.log_slug(), "create-dev");
        assert_eq!(Operation::UpdateDatabase.log_slug(), "update-db");
    }
}
