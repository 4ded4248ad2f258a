use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("no viewer node attached")]
    NoViewer,
    #[error("invalid output parameters: {0}")]
    InvalidParams(String),
    #[error("graph error: {0}")]
    Graph(String),
    #[error("worker error: {0}")]
    Worker(String),
}
