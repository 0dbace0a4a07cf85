use conquest_core::ActionError;
use conquest_protocol::{ErrorCode, ErrorKind, ErrorPayload, SessionId};

/// Failure of a [`GameService`](crate::GameService) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    #[error("Session {0} is busy, try again")]
    Busy(SessionId),

    #[error("No free session codes")]
    NoFreeCodes,

    #[error("{0}")]
    Action(#[from] ActionError),
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SessionNotFound(_) => ErrorCode::SessionNotFound,
            Self::Busy(_) => ErrorCode::SessionBusy,
            Self::NoFreeCodes => ErrorCode::Full,
            Self::Action(err) => err.code(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    /// Client-facing form: stable code plus this error's message.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.code(), self.to_string())
    }
}
