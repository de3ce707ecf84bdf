pub mod embedding;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod vector;

// Re-export commonly used types
pub use embedding::Embedding;
pub use error::{ErrorKind, PreprocessError, VisionError};
pub use model::{ModelLoader, SessionConfig, SessionManager, SessionState};
pub use pipeline::Pipeline;
pub use preprocess::{PixelScale, Tensor};
