use super::states::SessionState;
use crate::persistence::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("Cannot {event} a session in state {from}")]
    InvalidTransition { from: SessionState, event: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

pub(crate) fn invalid_transition(from: SessionState, event: &str) -> StateMachineError {
    StateMachineError::InvalidTransition {
        from,
        event: event.to_string(),
    }
}
