use thiserror::Error;

/// Errors surfaced by oracle sessions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The remote session could not be created.
    #[error("failed to start oracle session: {0}")]
    SessionStart(String),

    /// The oracle rejected or failed to carry out an instruction.
    #[error("instruction failed: {0}")]
    Instruction(String),

    /// An instruction exceeded its wall-clock budget.
    #[error("instruction timed out: {0}")]
    Timeout(String),

    /// Network or HTTP-level failure talking to the oracle service.
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// The oracle answered with a payload that could not be decoded.
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
}

impl AgentError {
    pub fn instruction(message: impl Into<String>) -> Self {
        Self::Instruction(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn session_start(message: impl Into<String>) -> Self {
        Self::SessionStart(message.into())
    }
}
