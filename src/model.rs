//! Inference provider seam and the dense-head tumor detector.
//!
//! The service never trains anything. A provider is built once at startup from
//! an externally produced artifact and shared read-only by every request.
//!
//! The bundled provider is a small dense head over a pooled image: the 224x224x3
//! input is average-pooled into a `grid x grid x 3` feature map, scaled,
//! dotted with the exported weights, and squashed with a sigmoid. Artifacts are
//! JSON:
//!
//! ```json
//! { "name": "vgg16-head", "grid": 7, "scale": 255.0, "bias": -0.4, "weights": [ ... ] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::imaging::{ImageTensor, MODEL_INPUT_CHANNELS, MODEL_INPUT_SIZE};

/// Version prefix for model hashes. Bump when the artifact layout changes.
const MODEL_HASH_VERSION: &str = "v1";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact: {0}")]
    Format(#[from] serde_json::Error),

    #[error("grid size {0} must be non-zero and divide the input size {MODEL_INPUT_SIZE}")]
    Grid(usize),

    #[error("expected {expected} weights for grid {grid}, got {actual}")]
    WeightCount {
        grid: usize,
        expected: usize,
        actual: usize,
    },

    #[error("model returned {actual} outputs for a batch of {expected}")]
    OutputCount { expected: usize, actual: usize },
}

/// Opaque binary classifier: one tumor probability per input, in order.
pub trait InferenceProvider: Send + Sync {
    /// Short identifier for logs and `/health`.
    fn name(&self) -> &str;

    /// Content hash of the loaded artifact (`sha256:<hex>`).
    fn fingerprint(&self) -> &str;

    fn predict(&self, batch: &[ImageTensor]) -> Result<Vec<f32>, ModelError>;
}

/// Run a provider and check it honoured the one-output-per-input contract.
pub fn predict_checked(
    provider: &dyn InferenceProvider,
    batch: &[ImageTensor],
) -> Result<Vec<f32>, ModelError> {
    let out = provider.predict(batch)?;
    if out.len() != batch.len() {
        return Err(ModelError::OutputCount {
            expected: batch.len(),
            actual: out.len(),
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseHeadArtifact {
    pub name: String,
    pub grid: usize,
    #[serde(default = "default_scale")]
    pub scale: f32,
    pub bias: f32,
    pub weights: Vec<f32>,
}

fn default_scale() -> f32 {
    255.0
}

pub struct DenseHeadModel {
    artifact: DenseHeadArtifact,
    fingerprint: String,
}

impl std::fmt::Debug for DenseHeadModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseHeadModel")
            .field("name", &self.artifact.name)
            .field("grid", &self.artifact.grid)
            .field("weights", &self.artifact.weights.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl DenseHeadModel {
    /// Load and validate an artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_bytes(&bytes)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: DenseHeadArtifact = serde_json::from_slice(bytes)?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: DenseHeadArtifact) -> Result<Self, ModelError> {
        let grid = artifact.grid;
        if grid == 0 || MODEL_INPUT_SIZE as usize % grid != 0 {
            return Err(ModelError::Grid(grid));
        }
        let expected = grid * grid * MODEL_INPUT_CHANNELS;
        if artifact.weights.len() != expected {
            return Err(ModelError::WeightCount {
                grid,
                expected,
                actual: artifact.weights.len(),
            });
        }
        let fingerprint = fingerprint_artifact(&artifact);
        tracing::debug!(
            name = %artifact.name,
            grid,
            fingerprint = %fingerprint,
            "dense head model ready"
        );
        Ok(Self {
            artifact,
            fingerprint,
        })
    }

    /// Pool one tensor into `grid x grid x 3` averages, scaled.
    fn pooled_features(&self, tensor: &ImageTensor) -> Vec<f32> {
        let grid = self.artifact.grid;
        let side = MODEL_INPUT_SIZE as usize;
        let cell = side / grid;
        let norm = (cell * cell) as f32 * self.artifact.scale;

        let mut features = vec![0.0f32; grid * grid * MODEL_INPUT_CHANNELS];
        for y in 0..side {
            for x in 0..side {
                let base = ((y / cell) * grid + (x / cell)) * MODEL_INPUT_CHANNELS;
                for c in 0..MODEL_INPUT_CHANNELS {
                    features[base + c] += tensor.at(y, x, c);
                }
            }
        }
        for f in &mut features {
            *f /= norm;
        }
        features
    }

    fn score(&self, tensor: &ImageTensor) -> f32 {
        let logit: f32 = self
            .pooled_features(tensor)
            .iter()
            .zip(&self.artifact.weights)
            .map(|(f, w)| f * w)
            .sum::<f32>()
            + self.artifact.bias;
        sigmoid(logit)
    }
}

impl InferenceProvider for DenseHeadModel {
    fn name(&self) -> &str {
        &self.artifact.name
    }

    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn predict(&self, batch: &[ImageTensor]) -> Result<Vec<f32>, ModelError> {
        Ok(batch.iter().map(|t| self.score(t)).collect())
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// SHA-256 over the canonical JSON form of an artifact.
pub fn fingerprint_artifact(artifact: &DenseHeadArtifact) -> String {
    let serialized =
        serde_json::to_vec(artifact).unwrap_or_else(|_| format!("{:?}", artifact).into_bytes());
    let mut hasher = Sha256::new();
    hasher.update(MODEL_HASH_VERSION.as_bytes());
    hasher.update(&serialized);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
