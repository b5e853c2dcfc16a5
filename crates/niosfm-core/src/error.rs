use niosfm_wapi::WapiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Wapi(#[from] WapiError),
    #[error("grid returned {status}: {text}")]
    Rejected { status: u16, text: String },
    #[error("invalid data: {0}")]
    Invalid(String),
    #[error("not connected")]
    NotConnected,
    #[error("no files loaded")]
    NoFiles,
    #[error("a selection is already open")]
    SelectionActive,
    #[error("no selection is open")]
    NoSelection,
    #[error("not found")]
    NotFound,
}
