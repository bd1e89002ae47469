#![forbid(unsafe_code)]

//! Error types.
//!
//! Two families:
//!
//! - [`ConnectError`]: setup faults. Raised synchronously while a component is
//!   wrapped or mounted and never retried.
//! - [`DeriveError`]: a derivation stage failed during a selector run. The
//!   selector captures it and the controller hands it back from `render`
//!   until a later run succeeds.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConnectError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error(
        "invalid value of type {kind} for {argument} argument when connecting component {component}"
    )]
    InvalidStageArgument {
        argument: &'static str,
        kind: &'static str,
        component: String,
    },

    #[error(
        "could not find a store in either the tree context or the mount arguments of \"{component}\"; \
         provide a root context or pass a store explicitly"
    )]
    MissingStore { component: String },

    #[error(
        "to access the wrapped component of \"{component}\", enable `forward_ref` in the options passed to {method}()"
    )]
    ForwardRefDisabled { component: String, method: String },
}

impl ConnectError {
    #[must_use]
    pub fn component(&self) -> &str {
        match self {
            Self::InvalidStageArgument { component, .. }
            | Self::MissingStore { component }
            | Self::ForwardRefDisabled { component, .. } => component,
        }
    }
}

/// Failure raised by a derivation stage.
///
/// Cloneable so the selector can keep its copy while `render` hands one out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DeriveError {
    message: String,
}

impl DeriveError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for DeriveError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for DeriveError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for DeriveError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_stage_message_names_argument_and_component() {
        let err = ConnectError::InvalidStageArgument {
            argument: "map_state",
            kind: "action map",
            component: "Connect(Counter)".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("map_state"));
        assert!(msg.contains("action map"));
        assert!(msg.contains("Connect(Counter)"));
        assert_eq!(err.component(), "Connect(Counter)");
    }

    #[test]
    fn missing_store_names_component() {
        let err = ConnectError::MissingStore {
            component: "Connect(List)".into(),
        };
        assert!(err.to_string().contains("\"Connect(List)\""));
    }

    #[test]
    fn derive_error_conversions() {
        let err: DeriveError = "boom".into();
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "boom");

        let json_err = serde_json::from_str::<u32>("nope").err().map(DeriveError::from);
        assert!(json_err.is_some_and(|e| e.message().starts_with("JSON error")));
    }
}
