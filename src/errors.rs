use thiserror::Error;

#[derive(Debug, Error)]
pub enum MobiClawError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("Resolution degraded: {0}")]
    ResolutionDegraded(String),

    #[error("Element not found: {locator} (waited {timeout_ms}ms)")]
    ElementNotFound { locator: String, timeout_ms: u64 },

    #[error("Invalid value '{value}' for {action}: {reason}")]
    InvalidActionValue {
        action: String,
        value: String,
        reason: String,
    },

    #[error("Driver operation failed: {0}")]
    DriverOperationFailed(String),

    #[error("Driver session error: {0}")]
    DriverSession(String),

    #[error("Evidence capture failed: {0}")]
    EvidenceCaptureFailed(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Instruction deadline exceeded")]
    DeadlineExceeded,

    #[error("Instruction cancelled")]
    Cancelled,
}

pub type MobiClawResult<T> = Result<T, MobiClawError>;
