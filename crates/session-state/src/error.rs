//! Session command errors.

use identity_gateway::GatewayError;
use std::fmt;
use thiserror::Error;

/// Commands sharing one in-flight slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandFamily {
    Initialize,
    /// Sign-in and sign-up.
    Credentials,
    SignOut,
}

impl fmt::Display for CommandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandFamily::Initialize => "initialize",
            CommandFamily::Credentials => "sign-in/sign-up",
            CommandFamily::SignOut => "sign-out",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// The gateway rejected the command or could not be reached.
    #[error("{0}")]
    Auth(#[from] GatewayError),

    /// The gateway accepted the command but reports no active identity.
    #[error("{0}")]
    NoSession(String),

    /// A command of the same family is still pending.
    #[error("{0} is already in progress")]
    AlreadyInFlight(CommandFamily),
}

pub type SessionResult<T> = Result<T, SessionError>;
