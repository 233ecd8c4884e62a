use thiserror::Error;

use crate::store::StoreError;
use crate::tokens::{PairConfigError, TokenError};
use crate::worker::ReplaceError;

/// Errors returned by the admin call entry point
#[derive(Error, Debug)]
pub enum AdminError {
    // ========================================================================
    // Authorization
    // ========================================================================
    #[error("no admin is configured")]
    NoAdminConfigured,

    #[error("malformed admin envelope: {0}")]
    MalformedEnvelope(String),

    #[error("bad signature: {0}")]
    BadSignature(String),

    #[error("malformed admin call: {0}")]
    MalformedCall(String),

    #[error("sender {0} is not admin")]
    NotAdmin(String),

    // ========================================================================
    // Validation
    // ========================================================================
    #[error("unknown admin method '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of params, have {have} want {want}")]
    WrongArity { have: usize, want: &'static str },

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("unknown direction '{0}'")]
    UnknownDirection(String),

    #[error("wrong force flag {0}, must be --force")]
    WrongForceFlag(String),

    #[error("wrong nonce value, {0}")]
    InvalidNonce(String),

    #[error(transparent)]
    PairConfig(#[from] PairConfigError),

    // ========================================================================
    // Capability
    // ========================================================================
    #[error("nonce setter not supported")]
    NonceSetterUnsupported,

    // ========================================================================
    // Collaborators
    // ========================================================================
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Replace(#[from] ReplaceError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Error taxonomy of admin calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Validation,
    Capability,
    Store,
    Chain,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authorization => "authorization",
            ErrorKind::Validation => "validation",
            ErrorKind::Capability => "capability",
            ErrorKind::Store => "store",
            ErrorKind::Chain => "chain",
        }
    }
}

impl AdminError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdminError::NoAdminConfigured
            | AdminError::MalformedEnvelope(_)
            | AdminError::BadSignature(_)
            | AdminError::MalformedCall(_)
            | AdminError::NotAdmin(_) => ErrorKind::Authorization,

            AdminError::UnknownCommand(_)
            | AdminError::WrongArity { .. }
            | AdminError::UnknownOperation(_)
            | AdminError::UnknownDirection(_)
            | AdminError::WrongForceFlag(_)
            | AdminError::InvalidNonce(_)
            | AdminError::PairConfig(_) => ErrorKind::Validation,

            AdminError::NonceSetterUnsupported => ErrorKind::Capability,

            AdminError::Store(_) => ErrorKind::Store,
            AdminError::Replace(e) => match e {
                ReplaceError::InvalidGasPrice(_) => ErrorKind::Validation,
                ReplaceError::Store(_) => ErrorKind::Store,
                _ => ErrorKind::Chain,
            },
            AdminError::Token(_) => ErrorKind::Chain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_echo_input() {
        assert_eq!(
            AdminError::UnknownCommand("drop".to_string()).to_string(),
            "unknown admin method 'drop'"
        );
        assert_eq!(
            AdminError::WrongArity { have: 2, want: "4 or 5" }.to_string(),
            "wrong number of params, have 2 want 4 or 5"
        );
        assert_eq!(
            AdminError::WrongForceFlag("-f".to_string()).to_string(),
            "wrong force flag -f, must be --force"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(AdminError::NoAdminConfigured.kind(), ErrorKind::Authorization);
        assert_eq!(
            AdminError::UnknownOperation("x".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(AdminError::NonceSetterUnsupported.kind(), ErrorKind::Capability);
        assert_eq!(
            AdminError::Replace(ReplaceError::InvalidGasPrice("0".to_string())).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AdminError::Token(TokenError::Rpc("down".to_string())).kind(),
            ErrorKind::Chain
        );
    }
}
