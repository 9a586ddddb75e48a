/// Error types for the construction boundary of the pipeline.
/// Per-pixel and per-triangle work never fails; degenerate input simply
/// produces no fragments.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid framebuffer dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("invalid render config: {0}")]
    InvalidConfig(String),

    #[error("invalid texture: {0}")]
    InvalidTexture(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("background task panicked: {0}")]
    TaskPanicked(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;
