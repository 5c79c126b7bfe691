use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreenPilotError {
    /// Invalid settings or an unreachable native display. Fatal; raised
    /// before any task starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport, auth or rate-limit failure talking to the planning
    /// service. Retriable: the agent leaves task state untouched so the
    /// caller may repeat the same `continue_task` input.
    #[error("Planning service error: {0}")]
    Service(String),

    /// The service answered with something outside the declared vocabulary
    /// (unknown action kind, malformed items). Aborts the current turn;
    /// history already committed is retained.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A computer primitive failed. The agent does not assume the action
    /// succeeded and does not advance history for it.
    #[error("Action execution failed: {0}")]
    ActionExecution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type ScreenPilotResult<T> = Result<T, ScreenPilotError>;
