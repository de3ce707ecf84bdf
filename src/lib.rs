pub mod config;
pub mod identity;
pub mod matcher;
pub mod storage;

// Re-export vision types for convenience
pub use facematch_vision::{
    embedding, error, pipeline, preprocess, vector, Embedding, Pipeline, SessionState,
    VisionError,
};
