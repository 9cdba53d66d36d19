//! # Sentence embeddings
//!
//! The [`Embedder`] trait is the seam between the retrieval pipeline and the
//! model that maps text to a dense vector. The production implementation is
//! [`SentenceEmbeddingsModel`], a BERT sentence encoder run with Candle, by
//! default `sentence-transformers/all-MiniLM-L6-v2`
//! producing 384-d vectors.
//!
//! Index building and querying must use the same model identifier; a different
//! model still loads but silently degrades recall.
//!
//! ## Pipeline
//! 1. Tokenize (truncated to `max_sequence_length` tokens).
//! 2. Run the BERT forward pass.
//! 3. Mean-pool token embeddings under the attention mask.
//! 4. Optionally L2-normalize (the sentence-transformers pipeline for
//!    MiniLM ends with a normalize stage).
//!
//! The model is read-only after load; [`Embedder::embed`] takes `&self` and
//! the type is `Send + Sync`, so concurrent queries share one instance.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use serde::Deserialize;
use std::path::PathBuf;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::error::{RecommendError, Result};

/// Maps text to a fixed-length vector.
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, recorded for diagnostics.
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Encode one string.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Where model files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Download (or reuse the cached copy) from the Hugging Face Hub.
    Hub { model_id: String, revision: String },
    /// A directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    Local(PathBuf),
}

impl ModelSource {
    pub fn label(&self) -> String {
        match self {
            ModelSource::Hub { model_id, .. } => model_id.clone(),
            ModelSource::Local(dir) => dir.display().to_string(),
        }
    }
}

/// Options applied on top of the model files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub normalize: bool,
    pub max_sequence_length: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            max_sequence_length: 256,
        }
    }
}

#[derive(Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

fn resolve_files(source: &ModelSource) -> Result<ModelFiles> {
    match source {
        ModelSource::Hub { model_id, revision } => {
            let repo = Repo::with_revision(model_id.clone(), RepoType::Model, revision.clone());
            let api = Api::new().map_err(|e| RecommendError::model(e.to_string()))?;
            let api_repo = api.repo(repo);
            let get = |name: &str| {
                api_repo
                    .get(name)
                    .map_err(|e| RecommendError::model(format!("{model_id}/{name}: {e}")))
            };
            Ok(ModelFiles {
                config: get("config.json")?,
                tokenizer: get("tokenizer.json")?,
                weights: get("model.safetensors")?,
            })
        }
        ModelSource::Local(dir) => {
            let file = |name: &str| -> Result<PathBuf> {
                let path = dir.join(name);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(RecommendError::model(format!("missing {}", path.display())))
                }
            };
            Ok(ModelFiles {
                config: file("config.json")?,
                tokenizer: file("tokenizer.json")?,
                weights: file("model.safetensors")?,
            })
        }
    }
}

/// Sentence embeddings model using Candle (pure Rust)
pub struct SentenceEmbeddingsModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dimension: usize,
    normalize: bool,
}

impl SentenceEmbeddingsModel {
    /// Load the model files and weights.
    ///
    /// # Errors
    /// [`RecommendError::Model`] when files cannot be fetched or parsed.
    pub fn load(source: &ModelSource, options: EncodeOptions) -> Result<Self> {
        let device = Device::Cpu;
        info!("Loading embedding model: {}", source.label());
        let files = resolve_files(source)?;

        let raw_config = std::fs::read_to_string(&files.config)?;
        let config: Config = serde_json::from_str(&raw_config)?;
        let HiddenSize { hidden_size: dimension } = serde_json::from_str(&raw_config)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| RecommendError::model(format!("Failed to load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: options.max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| RecommendError::model(format!("Failed to configure truncation: {e}")))?;
        tokenizer.with_padding(None);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DTYPE, &device)
                .map_err(|e| RecommendError::model(e.to_string()))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| RecommendError::model(e.to_string()))?;
        debug!("Embedding model ready ({dimension} dimensions)");

        Ok(Self {
            model,
            tokenizer,
            device,
            model_id: source.label(),
            dimension,
            normalize: options.normalize,
        })
    }

    fn forward(&self, text: &str) -> candle_core::Result<Vec<f32>> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| candle_core::Error::Msg(format!("Tokenization error: {e}")))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let output = self.model.forward(&token_ids, &token_type_ids, None)?;
        let mut embedding = self.mean_pooling(&output, tokens.get_attention_mask())?;
        if self.normalize {
            embedding = normalize(&embedding)?;
        }
        embedding.to_vec1::<f32>()
    }

    /// Mean pooling over token embeddings, considering attention mask
    fn mean_pooling(&self, embeddings: &Tensor, attention_mask: &[u32]) -> candle_core::Result<Tensor> {
        // embeddings: [1, seq_len, hidden]; mask broadcast as [1, seq_len, 1]
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;
        sum.broadcast_div(&count)?.squeeze(0)
    }
}

fn normalize(tensor: &Tensor) -> candle_core::Result<Tensor> {
    let norm = tensor.sqr()?.sum_all()?.sqrt()?;
    tensor.broadcast_div(&norm)
}

impl Embedder for SentenceEmbeddingsModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.forward(text)
            .map_err(|e| RecommendError::embedding(e.to_string()))
    }
}

/// Squared Euclidean distance, the metric reported by the flat index.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
