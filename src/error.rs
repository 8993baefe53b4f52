use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecallError {
    #[error("LlmErr: {0}")]
    Llm(String),
    #[error("EmptyCompletion")]
    EmptyCompletion,
    #[error("SendErr: {0}")]
    Send(String),
    #[error("ApiErr: {0}")]
    Api(String),
}
