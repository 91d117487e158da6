//! Application-wide error types.
//!
//! Each component owns a narrow error enum; [`AppError`] is the top-level
//! error that `main` reports before exiting.

use thiserror::Error;

/// A multibase/multicodec key string could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing multibase marker 'z'")]
    MissingMultibase,

    #[error("invalid base58btc payload: {0}")]
    InvalidBase58(String),

    #[error("payload too short for a multicodec tag ({0} bytes)")]
    TooShort(usize),

    #[error("unknown multicodec tag 0x{0:02x}{1:02x}")]
    UnknownMulticodec(u8, u8),

    #[error("{kind} key must be {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("expected {expected} key, found {found}")]
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },
}

/// The identifier resolver rejected an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("not a DID: '{0}'")]
    NotADid(String),

    #[error("unsupported DID method: '{0}'")]
    UnsupportedMethod(String),

    #[error("malformed DID: {0}")]
    Malformed(String),

    #[error("invalid key in DID: {0}")]
    InvalidKey(#[from] DecodeError),

    #[error("invalid service in DID: {0}")]
    InvalidService(String),
}

/// A user-supplied target identifier failed resolution.
#[derive(Debug, Clone, Error)]
#[error("invalid target DID '{candidate}'")]
pub struct InvalidTargetError {
    pub candidate: String,
    #[source]
    pub cause: ResolutionError,
}

/// Writing the secrets record failed. Never fatal: the in-memory identity
/// stays valid for the current session.
#[derive(Debug, Error)]
#[error("could not persist secrets to {path}: {source}")]
pub struct PersistenceWarning {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

/// Top-level error reported by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("prompt error: {0}")]
    Prompt(String),

    #[error(transparent)]
    InvalidTarget(#[from] InvalidTargetError),

    #[error("session aborted: {0}")]
    Aborted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render an error followed by every source that adds new information.
pub fn chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn unknown_tag_renders_hex() {
        let e = DecodeError::UnknownMulticodec(0xab, 0x01);
        assert_eq!(e.to_string(), "unknown multicodec tag 0xab01");
    }

    #[test]
    fn invalid_target_keeps_resolution_cause() {
        let e: AppError = InvalidTargetError {
            candidate: "did:web:example.com".into(),
            cause: ResolutionError::UnsupportedMethod("web".into()),
        }
        .into();
        assert!(e.to_string().contains("did:web:example.com"));
        let source = e.source().expect("resolution cause is exposed");
        assert!(source.to_string().contains("unsupported DID method"));
    }

    #[test]
    fn chain_appends_new_causes_only() {
        let e = ResolutionError::InvalidKey(DecodeError::MissingMultibase);
        // The cause is already part of the message.
        assert_eq!(chain(&e), "invalid key in DID: missing multibase marker 'z'");

        let target = InvalidTargetError {
            candidate: "nope".into(),
            cause: ResolutionError::NotADid("nope".into()),
        };
        assert_eq!(chain(&target), "invalid target DID 'nope': not a DID: 'nope'");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }
}
