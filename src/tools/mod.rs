/// Tools module for folio function calling
///
/// Tools are declared to the model as function definitions. The model answers
/// with a function call naming one of them, and the caller runs it.
pub mod image;

pub use image::{GenerateImageArgs, GenerateImageTool, GeneratedImage};

/// Common error type for all tools
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}
