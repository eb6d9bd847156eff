use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Recognition unavailable: {0}")]
    RecognitionUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeterError {
    /// True for failures of the OCR engine, including timeouts and an engine
    /// that never initialized.
    pub fn is_recognition(&self) -> bool {
        matches!(
            self,
            MeterError::Recognition(_) | MeterError::RecognitionUnavailable(_)
        )
    }
}

impl From<rumqttc::ClientError> for MeterError {
    fn from(e: rumqttc::ClientError) -> Self {
        MeterError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MeterError>;
