//! Application error types.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Application error carrying a kind and a key/value context payload.
#[derive(Debug)]
pub struct AppError {
    payload: HashMap<String, String>,
    kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Instance not found in any root directory
    InstanceNotFound,
    /// Instance exists but lacks a resource derived from its descriptor
    ResourceNotFound,
    /// Expected external script is absent
    ScriptMissing,
    /// Another mutating operation holds the instance
    OperationInProgress,
    /// Bounded wait exceeded
    Timeout,
    /// External process reported failure
    NonZeroExit,
    /// Unsupported caller input
    InvalidRequest,
    /// Service status query failed
    ProbeFailure,
    /// Configuration error
    Config,
    /// File system or spawn error
    Io,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            Self::InstanceNotFound => 1001,
            Self::ResourceNotFound => 1002,
            Self::OperationInProgress => 1003,
            Self::InvalidRequest => 1004,
            Self::Config => 2001,
            Self::Io => 2002,
            Self::ScriptMissing => 3001,
            Self::Timeout => 3002,
            Self::NonZeroExit => 3003,
            Self::ProbeFailure => 3004,
        }
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, payload: HashMap<String, String>) -> Self {
        Self { payload, kind }
    }

    /// Create an error with a single "detail" key from a non-empty string,
    /// or an empty payload if the string is empty.
    fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let payload = if detail.is_empty() {
            HashMap::new()
        } else {
            HashMap::from([("detail".to_string(), detail)])
        };
        Self::new(kind, payload)
    }

    pub fn instance_not_found(name: &str) -> Self {
        Self::new(
            ErrorKind::InstanceNotFound,
            HashMap::from([("instance".to_string(), name.to_string())]),
        )
    }

    pub fn resource_not_found(instance: &str, resource: &str) -> Self {
        Self::new(
            ErrorKind::ResourceNotFound,
            HashMap::from([
                ("instance".to_string(), instance.to_string()),
                ("resource".to_string(), resource.to_string()),
            ]),
        )
    }

    pub fn script_missing(script: &Path, instance: &str) -> Self {
        Self::new(
            ErrorKind::ScriptMissing,
            HashMap::from([
                ("script".to_string(), script.display().to_string()),
                ("instance".to_string(), instance.to_string()),
            ]),
        )
    }

    pub fn operation_in_progress(instance: &str, running: &str) -> Self {
        Self::new(
            ErrorKind::OperationInProgress,
            HashMap::from([
                ("instance".to_string(), instance.to_string()),
                ("running".to_string(), running.to_string()),
            ]),
        )
    }

    pub fn timeout(command: &str, secs: u64) -> Self {
        Self::new(
            ErrorKind::Timeout,
            HashMap::from([
                ("command".to_string(), command.to_string()),
                ("timeout_secs".to_string(), secs.to_string()),
            ]),
        )
    }

    pub fn non_zero_exit(command: &str, code: Option<i32>, detail: impl Into<String>) -> Self {
        let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
        let mut err = Self::with_detail(ErrorKind::NonZeroExit, detail);
        err.payload.insert("command".to_string(), command.to_string());
        err.payload.insert("exit_code".to_string(), code);
        err
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::InvalidRequest, message)
    }

    pub fn probe_failure(unit: &str, detail: impl Into<String>) -> Self {
        let mut err = Self::with_detail(ErrorKind::ProbeFailure, detail);
        err.payload.insert("unit".to_string(), unit.to_string());
        err
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Io, message)
    }

    /// Attach an extra context entry, e.g. the log file of a failed launch.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            let mut pairs: Vec<String> = self
                .payload
                .iter()
                .filter(|(k, _)| k.as_str() != "log")
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            pairs.sort();
            write!(f, "{:?}: {}", self.kind, pairs.join(", "))
        }
    }
}

impl std::error::Error for AppError {}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct as _;
        let mut s = serializer.serialize_struct("AppError", 3)?;
        s.serialize_field("code", &self.kind.code())?;
        s.serialize_field("kind", &self.kind)?;
        s.serialize_field("payload", &self.payload)?;
        s.end()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_carries_code_and_command() {
        let err = AppError::non_zero_exit("remove-dev-instance.sh", Some(1), "boom");
        assert_eq!(err.kind(), ErrorKind::NonZeroExit);
        assert_eq!(err.get("exit_code"), Some("1"));
        assert_eq!(err.get("command"), Some("remove-dev-instance.sh"));
        assert_eq!(err.get("detail"), Some("boom"));
    }

    #[test]
    fn display_omits_inlined_log() {
        let err = AppError::non_zero_exit("x", None, "").with("log", "very long log");
        let shown = err.to_string();
        assert!(shown.contains("exit_code=signal"));
        assert!(!shown.contains("very long log"));
    }

    #[test]
    fn serializes_code_kind_and_payload() {
        let err = AppError::instance_not_found("dev-foo");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], 1001);
        assert_eq!(value["kind"], "instance_not_found");
        assert_eq!(value["payload"]["instance"], "dev-foo");
    }
}
