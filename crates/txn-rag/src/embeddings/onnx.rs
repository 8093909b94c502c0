//! ONNX sentence-transformer backend
//!
//! Runs all-MiniLM-L6-v2 (384 dimensions) locally: mean pooling over the last
//! hidden state followed by L2 normalisation. Token sequences are cut to the
//! first 256 tokens. The session is driven by one call at a time.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Upper bound on tokens per input (model position limit)
const MAX_TOKENS: usize = 256;

struct OnnxModel {
    session: Session,
    tokenizer: Tokenizer,
    dimensions: usize,
}

/// Local ONNX embedder
pub struct OnnxEmbedder {
    model: Arc<Mutex<OnnxModel>>,
    dimensions: usize,
}

impl OnnxEmbedder {
    /// Load (downloading on first use) the configured model
    pub async fn new(config: &EmbeddingConfig) -> Result<Self> {
        tracing::info!("Initializing ONNX embedder with model: {}", config.model);

        std::fs::create_dir_all(&config.cache_dir).map_err(|e| {
            Error::Config(format!("Failed to create cache directory: {}", e))
        })?;

        let model_path = config.cache_dir.join("model.onnx");
        let tokenizer_path = config.cache_dir.join("tokenizer.json");

        if !model_path.exists() {
            download(&config.model, "onnx/model.onnx", &model_path).await?;
        }
        if !tokenizer_path.exists() {
            download(&config.model, "tokenizer.json", &tokenizer_path).await?;
        }

        let session = Session::builder()
            .map_err(|e| Error::embedding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::embedding(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| Error::embedding(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| Error::embedding(format!("Failed to load model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::embedding(format!("Failed to load tokenizer: {}", e)))?;

        tracing::info!("ONNX embedder initialized");

        Ok(Self {
            model: Arc::new(Mutex::new(OnnxModel {
                session,
                tokenizer,
                dimensions: config.dimensions,
            })),
            dimensions: config.dimensions,
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.lock().encode(&texts))
            .await
            .map_err(|e| Error::internal(format!("Embedding task failed: {}", e)))?
    }
}

impl OnnxModel {
    fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::embedding(format!("Tokenization failed: {}", e)))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_TOKENS);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            for col in 0..ids.len().min(seq_len) {
                let at = row * seq_len + col;
                input_ids[at] = ids[col] as i64;
                attention_mask[at] = mask[col] as i64;
                token_type_ids[at] = types[col] as i64;
            }
        }

        let shape = vec![batch_size, seq_len];
        let tensor = |data: Vec<i64>, what: &str| {
            Tensor::from_array((shape.clone(), data.into_boxed_slice()))
                .map_err(|e| Error::embedding(format!("{} tensor creation failed: {}", what, e)))
        };

        let inputs = vec![
            ("input_ids", tensor(input_ids, "Input")?.into_dyn()),
            ("attention_mask", tensor(attention_mask.clone(), "Attention mask")?.into_dyn()),
            ("token_type_ids", tensor(token_type_ids, "Token type")?.into_dyn()),
        ];

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| Error::embedding(format!("Inference failed: {}", e)))?;

        let output = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| outputs.iter().next())
            .map(|(_, value)| value)
            .ok_or_else(|| Error::embedding("No output tensor"))?;

        let (tensor_shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::embedding(format!("Failed to extract tensor: {}", e)))?;

        let hidden = tensor_shape
            .get(2)
            .map(|&d| d as usize)
            .unwrap_or(self.dimensions);

        let mut embeddings = Vec::with_capacity(batch_size);

        for row in 0..batch_size {
            let mut pooled = vec![0.0f32; hidden];
            let mut count = 0.0f32;

            for col in 0..seq_len {
                if attention_mask[row * seq_len + col] == 0 {
                    continue;
                }
                let offset = (row * seq_len + col) * hidden;
                for (k, value) in pooled.iter_mut().enumerate() {
                    if let Some(x) = data.get(offset + k) {
                        *value += x;
                    }
                }
                count += 1.0;
            }

            if count > 0.0 {
                pooled.iter_mut().for_each(|v| *v /= count);
            }

            let norm = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                pooled.iter_mut().for_each(|v| *v /= norm);
            }

            embeddings.push(pooled);
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.run(texts.to_vec()).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn concurrent_safe(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Fetch a model artifact from the sentence-transformers hub
async fn download(model_name: &str, file: &str, path: &Path) -> Result<()> {
    let url = format!(
        "https://huggingface.co/sentence-transformers/{}/resolve/main/{}",
        model_name, file
    );

    tracing::info!("Downloading {}", url);

    let response = reqwest::get(&url)
        .await
        .map_err(|e| Error::embedding(format!("Failed to download {}: {}", file, e)))?;

    if !response.status().is_success() {
        return Err(Error::embedding(format!(
            "Download of {} failed: HTTP {}",
            file,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::embedding(format!("Failed to read {}: {}", file, e)))?;

    tokio::fs::write(path, &bytes).await?;

    tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
