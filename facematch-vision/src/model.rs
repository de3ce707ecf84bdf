use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use log::{debug, error, info};
use once_cell::sync::OnceCell;
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session as OrtSession,
    },
    value::Value,
};

use crate::error::{Result, SharedError, VisionError};
use crate::preprocess::Tensor;

pub const DEFAULT_MODEL_PATH: &str = "models/arcface.onnx";

/// Loaded network able to run a forward pass.
pub trait Model: Send {
    /// Returns the first output flattened to a vector.
    fn forward(&mut self, input: &Tensor) -> Result<Vec<f32>>;
}

/// Builds the network. Called at most once per [`SessionManager`].
pub trait ModelLoader: Send + Sync {
    type Model: Model;

    fn load(&self) -> anyhow::Result<Self::Model>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Loading,
            2 => SessionState::Ready,
            3 => SessionState::Failed,
            _ => SessionState::Unloaded,
        }
    }

    pub fn is_ready(self) -> bool {
        self == SessionState::Ready
    }
}

/// A ready model. Forward passes take the inner lock since the backend needs
/// exclusive access while running.
pub struct Session<M> {
    model: Mutex<M>,
}

impl<M: Model> Session<M> {
    pub fn new(model: M) -> Self {
        Self {
            model: Mutex::new(model),
        }
    }

    /// Run a forward pass and return the raw, unnormalized embedding.
    pub fn run(&self, tensor: &Tensor) -> Result<Vec<f32>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| VisionError::inference("session lock poisoned"))?;
        let output = model.forward(tensor)?;
        if output.is_empty() {
            return Err(VisionError::inference("model produced an empty output"));
        }
        debug!("forward pass produced {} values", output.len());
        Ok(output)
    }
}

/// Owns the process-wide inference session.
///
/// `Unloaded -> Loading -> Ready`, or `Loading -> Failed`. The loader runs at
/// most once: concurrent first callers wait on the same load and share its
/// result. A failed load is terminal.
pub struct SessionManager<L: ModelLoader> {
    loader: L,
    cell: OnceCell<std::result::Result<Arc<Session<L::Model>>, SharedError>>,
    state: AtomicU8,
}

impl<L: ModelLoader> SessionManager<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cell: OnceCell::new(),
            state: AtomicU8::new(SessionState::Unloaded as u8),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Get the session, loading it on first use.
    pub fn session(&self) -> Result<Arc<Session<L::Model>>> {
        let loaded = self.cell.get_or_init(|| {
            self.set_state(SessionState::Loading);
            match self.loader.load() {
                Ok(model) => {
                    self.set_state(SessionState::Ready);
                    Ok(Arc::new(Session::new(model)))
                }
                Err(e) => {
                    error!("model load failed: {:#}", e);
                    self.set_state(SessionState::Failed);
                    let cause: Box<dyn std::error::Error + Send + Sync> = e.into();
                    Err(SharedError::from(cause))
                }
            }
        });

        match loaded {
            Ok(session) => Ok(Arc::clone(session)),
            Err(cause) => Err(VisionError::ModelLoadFailed(Arc::clone(cause))),
        }
    }

    pub fn run(&self, session: &Session<L::Model>, tensor: &Tensor) -> Result<Vec<f32>> {
        session.run(tensor)
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Thread counts and model location for the ONNX Runtime CPU backend.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model_path: PathBuf,
    pub intra_threads: usize,
    pub inter_threads: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            intra_threads: 1,
            inter_threads: 1,
        }
    }
}

pub fn session_builder(cfg: &SessionConfig) -> anyhow::Result<SessionBuilder> {
    let builder = OrtSession::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(cfg.intra_threads)?
        .with_inter_threads(cfg.inter_threads)?;
    Ok(builder)
}

/// Loads the recognition model from disk with ONNX Runtime.
#[derive(Debug, Clone, Default)]
pub struct OrtLoader {
    pub config: SessionConfig,
}

impl OrtLoader {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn model_path(&self) -> &Path {
        &self.config.model_path
    }
}

impl ModelLoader for OrtLoader {
    type Model = OrtModel;

    fn load(&self) -> anyhow::Result<OrtModel> {
        let path = self.model_path();
        info!("loading recognition model from {}", path.display());
        let session = session_builder(&self.config)?
            .commit_from_file(path)
            .with_context(|| format!("load recognition model {}", path.display()))?;
        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .context("recognition model declares no inputs")?;
        anyhow::ensure!(
            !session.outputs().is_empty(),
            "recognition model declares no outputs"
        );
        info!("recognition model ready, input `{}`", input_name);
        Ok(OrtModel {
            session,
            input_name,
        })
    }
}

pub struct OrtModel {
    session: OrtSession,
    input_name: String,
}

impl Model for OrtModel {
    fn forward(&mut self, input: &Tensor) -> Result<Vec<f32>> {
        let value = Value::from_array(input.data.clone()).map_err(VisionError::inference)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => value])
            .map_err(VisionError::inference)?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(VisionError::inference)?;
        debug!("model output shape {:?}", shape);
        Ok(data.to_vec())
    }
}
