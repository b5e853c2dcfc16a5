use thiserror::Error;

#[derive(Debug, Error)]
pub enum WapiError {
    #[error("grid address is empty")]
    MissingAddress,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("grid rejected request: {status} {text}")]
    Rejected { status: u16, text: String },
    #[error("not connected")]
    NotConnected,
}

impl From<reqwest::Error> for WapiError {
    fn from(err: reqwest::Error) -> Self {
        WapiError::Transport(err.to_string())
    }
}
