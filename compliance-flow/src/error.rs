use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Carries the comma-separated names of the rejected files
    #[error("Invalid file type for: {0}. Only .txt, .md, and .pdf are allowed.")]
    UnsupportedMediaType(String),

    #[error("Failed to read document {name}: {reason}")]
    DocumentRead { name: String, reason: String },

    #[error("Language model call failed: {0}")]
    Llm(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Speech synthesis failed: {0}")]
    Speech(String),

    #[error("PDF rendering failed: {0}")]
    PdfRender(String),

    #[error("An analysis is already in progress")]
    Busy,
}

pub type Result<T> = std::result::Result<T, FlowError>;

impl From<lopdf::Error> for FlowError {
    fn from(err: lopdf::Error) -> Self {
        FlowError::PdfRender(err.to_string())
    }
}

impl From<base64::DecodeError> for FlowError {
    fn from(err: base64::DecodeError) -> Self {
        FlowError::Speech(format!("invalid base64 audio payload: {}", err))
    }
}
