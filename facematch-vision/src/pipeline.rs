use log::debug;

use crate::embedding::Embedding;
use crate::error::Result;
use crate::model::{ModelLoader, OrtLoader, SessionConfig, SessionManager, SessionState};
use crate::preprocess::{self, PixelScale};

/// Full pipeline: decode → tensor → forward pass.
pub struct Pipeline<L: ModelLoader = OrtLoader> {
    sessions: SessionManager<L>,
    scale: PixelScale,
}

impl Pipeline<OrtLoader> {
    pub fn new(config: SessionConfig, scale: PixelScale) -> Self {
        Self::with_loader(OrtLoader::new(config), scale)
    }
}

impl<L: ModelLoader> Pipeline<L> {
    pub fn with_loader(loader: L, scale: PixelScale) -> Self {
        Self {
            sessions: SessionManager::new(loader),
            scale,
        }
    }

    pub fn scale(&self) -> PixelScale {
        self.scale
    }

    pub fn state(&self) -> SessionState {
        self.sessions.state()
    }

    /// Load the model now instead of on the first request.
    pub fn warm_up(&self) -> Result<()> {
        self.sessions.session().map(|_| ())
    }

    /// Raw embedding of `image`, not normalized.
    pub fn generate_embedding(&self, image: &[u8]) -> Result<Vec<f32>> {
        let session = self.sessions.session()?;
        let tensor = preprocess::preprocess(image, self.scale)?;
        debug!("input tensor {:?} in {:?}", tensor.shape(), tensor.scale);
        self.sessions.run(&session, &tensor)
    }

    /// Normalized embedding of `image`.
    pub fn embed(&self, image: &[u8]) -> Result<Embedding> {
        let raw = self.generate_embedding(image)?;
        Ok(Embedding::normalize(&raw))
    }
}
