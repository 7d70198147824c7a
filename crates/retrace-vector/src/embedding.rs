//! Embedding backend contract and implementations.
//!
//! - `OnnxEmbeddingBackend` loads a sentence-transformer ONNX model (e.g.
//!   all-MiniLM-L6-v2) via ort and tokenizes with the HuggingFace
//!   tokenizers crate. This is the production embedding backend.
//! - `MockEmbedding` provides deterministic token-hash vectors so tests
//!   and offline runs need no model files.
//!
//! The core treats backends as opaque capabilities behind
//! [`EmbeddingBackend`]; availability is probed up front and modeled as
//! a value ([`BackendProbe`]), never as a panic.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::{info, warn};

use retrace_core::error::RetraceError;
use retrace_core::types::TaskType;

/// Default dimensionality when a model does not declare one.
const DEFAULT_DIMENSIONS: usize = 384;

/// One embedding request: the text, the role it plays, and optional
/// page-title context that is folded in ahead of the text.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingRequest<'a> {
    pub text: &'a str,
    pub task: TaskType,
    /// Page title, concatenated before `text` so the vector reflects
    /// page topic. Ignored when empty.
    pub title: Option<&'a str>,
    /// Requested output dimensionality. Backends with a fixed native
    /// size reject mismatches with `InvalidArgs`.
    pub dim: Option<usize>,
}

impl<'a> EmbeddingRequest<'a> {
    /// A user query embedding request.
    pub fn query(text: &'a str) -> Self {
        Self {
            text,
            task: TaskType::Query,
            title: None,
            dim: None,
        }
    }

    /// A document-passage embedding request with optional title context.
    pub fn document(text: &'a str, title: Option<&'a str>) -> Self {
        Self {
            text,
            task: TaskType::Document,
            title,
            dim: None,
        }
    }

    /// The full text a backend should embed: title (when present) joined
    /// ahead of the passage text.
    pub fn composed_text(&self) -> String {
        match self.title {
            Some(title) if !title.trim().is_empty() => format!("{}\n{}", title.trim(), self.text),
            _ => self.text.to_string(),
        }
    }

    /// Task prefix for models trained with asymmetric query/document
    /// prompts.
    pub fn task_prefix(&self) -> &'static str {
        match self.task {
            TaskType::Query => "search_query: ",
            TaskType::Document => "search_document: ",
        }
    }
}

/// Backend for generating text embeddings.
///
/// Implementations must return L2-normalized vectors of a fixed
/// dimension, deterministically per (text, task, title, dim).
pub trait EmbeddingBackend: Send + Sync {
    /// Generate an embedding vector for the given request.
    fn embed(
        &self,
        request: EmbeddingRequest<'_>,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, RetraceError>> + Send;

    /// Return the dimensionality of vectors produced by this backend.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingBackend`] for dynamic dispatch.
///
/// Because `EmbeddingBackend::embed` returns `impl Future` it is not
/// object-safe. This trait uses a boxed future instead, allowing
/// `Arc<dyn DynEmbeddingBackend>` to be stored in structs without
/// generics. A blanket implementation covers every `EmbeddingBackend`.
pub trait DynEmbeddingBackend: Send + Sync {
    /// Generate an embedding vector for the given request (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        request: EmbeddingRequest<'a>,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, RetraceError>> + Send + 'a>,
    >;

    /// Return the dimensionality of vectors produced by this backend.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingBackend> DynEmbeddingBackend for T {
    fn embed_boxed<'a>(
        &'a self,
        request: EmbeddingRequest<'a>,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, RetraceError>> + Send + 'a>,
    > {
        Box::pin(self.embed(request))
    }

    fn dimensions(&self) -> usize {
        EmbeddingBackend::dimensions(self)
    }
}

/// Result of probing for an embedding capability.
///
/// A missing model is a value to branch on, not an error to catch.
pub enum BackendProbe {
    Available(Arc<dyn DynEmbeddingBackend>),
    Unavailable(String),
}

impl std::fmt::Debug for BackendProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendProbe::Available(backend) => f
                .debug_struct("Available")
                .field("dimensions", &backend.dimensions())
                .finish(),
            BackendProbe::Unavailable(reason) => {
                f.debug_tuple("Unavailable").field(reason).finish()
            }
        }
    }
}

/// True if the vector's L2 norm is within 1% of unit length.
pub fn is_normalized(vector: &[f32]) -> bool {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    (0.99..=1.01).contains(&norm)
}

/// Warn (but do not fail) when a backend returns a denormalized vector.
pub fn verify_normalized(vector: &[f32], context: &str) {
    if !is_normalized(vector) {
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        warn!(norm, context, "Embedding deviates from unit norm by more than 1%");
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingBackend - real ONNX Runtime inference
// ---------------------------------------------------------------------------

/// ONNX Runtime-backed embedding service using a sentence-transformer
/// model.
///
/// Expects a model directory containing:
/// - `model.onnx`  — the sentence-transformer ONNX export
/// - `tokenizer.json` — the HuggingFace fast-tokenizer file
///
/// The task prefix and title context are prepended to the input before
/// tokenization; masked mean pooling and L2 normalization produce a
/// single unit vector per request.
pub struct OnnxEmbeddingBackend {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
}

// ort::Session is Send + Sync internally (uses Arc<SharedSessionInner>).
unsafe impl Send for OnnxEmbeddingBackend {}
unsafe impl Sync for OnnxEmbeddingBackend {}

impl std::fmt::Debug for OnnxEmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingBackend")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OnnxEmbeddingBackend {
    /// Probe a model directory for the embedding capability.
    ///
    /// Returns `Unavailable` (with the reason) instead of an error so
    /// callers can branch or degrade without exception-driven flow.
    pub fn probe(model_dir: &Path) -> BackendProbe {
        match Self::from_directory(model_dir) {
            Ok(backend) => BackendProbe::Available(Arc::new(backend)),
            Err(e) => BackendProbe::Unavailable(e.to_string()),
        }
    }

    /// Load a sentence-transformer model from the given directory.
    pub fn from_directory(model_dir: &Path) -> Result<Self, RetraceError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
        )
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, RetraceError> {
        if !model_path.exists() {
            return Err(RetraceError::EmbeddingUnavailable(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(RetraceError::EmbeddingUnavailable(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| RetraceError::EmbeddingUnavailable(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| RetraceError::EmbeddingUnavailable(format!("ONNX set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| RetraceError::EmbeddingUnavailable(format!("ONNX load model: {}", e)))?;

        // Detect output dimensions from the model output type.
        // Sentence-transformer output is typically [batch, seq_len, hidden_dim].
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|d| {
                if d > 0 {
                    d as usize
                } else {
                    DEFAULT_DIMENSIONS
                }
            })
            .unwrap_or(DEFAULT_DIMENSIONS);

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            RetraceError::EmbeddingUnavailable(format!("Failed to load tokenizer: {}", e))
        })?;

        info!(
            model = %model_path.display(),
            dimensions,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
        })
    }

    /// Tokenize, run inference, and mean-pool the output.
    fn embed_sync(&self, input: &str) -> Result<Vec<f32>, RetraceError> {
        let encoding = self
            .tokenizer
            .encode(input, true)
            .map_err(|e| RetraceError::EmbeddingUnavailable(format!("Tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .map(|&t| t as i64)
            .collect();

        let seq_len = input_ids.len();

        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| RetraceError::EmbeddingUnavailable(format!("input_ids array: {}", e)))?;
        let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| {
                RetraceError::EmbeddingUnavailable(format!("attention_mask array: {}", e))
            })?;
        let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| {
                RetraceError::EmbeddingUnavailable(format!("token_type_ids array: {}", e))
            })?;

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| RetraceError::EmbeddingUnavailable(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array).map_err(|e| {
            RetraceError::EmbeddingUnavailable(format!("TensorRef attention_mask: {}", e))
        })?;
        let type_ref = TensorRef::from_array_view(&type_array).map_err(|e| {
            RetraceError::EmbeddingUnavailable(format!("TensorRef token_type_ids: {}", e))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| RetraceError::EmbeddingUnavailable(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| RetraceError::EmbeddingUnavailable(format!("ONNX inference failed: {}", e)))?;

        // Token embeddings as flat slice: [1, seq_len, hidden_dim].
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RetraceError::EmbeddingUnavailable(format!("Extract embeddings: {}", e)))?;

        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        if shape_dims.len() < 2 {
            return Err(RetraceError::EmbeddingUnavailable(format!(
                "Unexpected output shape: {:?}",
                shape_dims
            )));
        }

        let hidden_dim = *shape_dims.last().unwrap() as usize;

        // Mean pooling over the sequence dimension, masked by attention_mask.
        let mut pooled = vec![0.0f32; hidden_dim];
        let mut count = 0.0f32;

        for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
            if mask_val > 0 {
                let offset = tok_idx * hidden_dim;
                for dim in 0..hidden_dim {
                    pooled[dim] += data[offset + dim];
                }
                count += 1.0;
            }
        }

        if count > 0.0 {
            for val in &mut pooled {
                *val /= count;
            }
        }

        l2_normalize(&mut pooled);
        Ok(pooled)
    }
}

impl EmbeddingBackend for OnnxEmbeddingBackend {
    async fn embed(&self, request: EmbeddingRequest<'_>) -> Result<Vec<f32>, RetraceError> {
        if request.text.trim().is_empty() {
            return Err(RetraceError::InvalidArgs("Cannot embed empty text".into()));
        }
        if let Some(dim) = request.dim {
            if dim != self.dimensions {
                return Err(RetraceError::InvalidArgs(format!(
                    "Requested dimension {} but model produces {}",
                    dim, self.dimensions
                )));
            }
        }

        let input = format!("{}{}", request.task_prefix(), request.composed_text());

        // ONNX Runtime inference is CPU-bound; run on a blocking thread.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let dims = self.dimensions;

        tokio::task::spawn_blocking(move || {
            let backend = OnnxEmbeddingBackend {
                session,
                tokenizer,
                dimensions: dims,
            };
            backend.embed_sync(&input)
        })
        .await
        .map_err(|e| RetraceError::EmbeddingUnavailable(format!("Embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic token-hash vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding backend producing deterministic unit vectors.
///
/// Each token of the (title + text) input is hashed into a
/// pseudo-random direction and the directions are summed and
/// L2-normalized. Identical inputs always produce identical vectors,
/// and inputs sharing tokens land measurably closer than unrelated
/// inputs, which is enough to exercise ranking end to end without a
/// model. The task type does not perturb the vector, so a query and a
/// passage with the same wording score ~1.0.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// A mock with a non-default dimensionality, for dimension-mismatch
    /// tests.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn token_bag_vector(&self, input: &str, dims: usize) -> Vec<f32> {
        let mut vector = vec![0.0f32; dims];
        for token in input
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            for (dim, slot) in vector.iter_mut().enumerate() {
                let mut hasher = DefaultHasher::new();
                token.hash(&mut hasher);
                dim.hash(&mut hasher);
                let h = hasher.finish();
                *slot += (((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0) as f32;
            }
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingBackend for MockEmbedding {
    async fn embed(&self, request: EmbeddingRequest<'_>) -> Result<Vec<f32>, RetraceError> {
        if request.text.trim().is_empty() {
            return Err(RetraceError::InvalidArgs("Cannot embed empty text".into()));
        }
        let dims = request.dim.unwrap_or(self.dimensions);
        Ok(self.token_bag_vector(&request.composed_text(), dims))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left as-is.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vector.iter_mut() {
            *val /= norm;
        }
    }
}
