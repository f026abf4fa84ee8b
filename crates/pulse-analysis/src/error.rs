use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("llm error: {0}")]
    Llm(#[from] pulse_llm::LlmError),

    #[error("attempt timed out")]
    Timeout,

    #[error("structured output did not validate after retries: {0}")]
    ValidationFailed(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
