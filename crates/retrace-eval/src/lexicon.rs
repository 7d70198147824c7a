//! Deterministic lexicon embedder for offline evaluation.
//!
//! Maps tokens through a small synonym lexicon onto topic concepts, then
//! hashes each concept into a pseudo-random unit direction. Text about
//! the same topic lands close in vector space even with different
//! wording ("docker containers" vs "kubernetes pods"), which is what the
//! semantic ranker needs to be evaluated against without a real model.
//! Tokens outside the lexicon still contribute, at reduced weight, so
//! unrelated pages stay near-orthogonal.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use retrace_core::error::RetraceError;
use retrace_vector::embedding::{l2_normalize, EmbeddingBackend, EmbeddingRequest};

/// Output dimensionality of the lexicon embedder.
const DIMENSIONS: usize = 384;

/// Weight of tokens that are not in the lexicon.
const OFF_TOPIC_WEIGHT: f32 = 0.3;

/// Synonym groups: every token in a group maps to the same concept.
const CONCEPT_GROUPS: &[(&str, &[&str])] = &[
    (
        "react",
        &[
            "react", "hooks", "hook", "usestate", "useeffect", "state", "effects", "effect",
            "component", "components", "jsx", "props", "render", "rendering",
        ],
    ),
    (
        "python",
        &["python", "cpython", "pip", "interpreter", "pythonic"],
    ),
    (
        "docs",
        &[
            "docs", "documentation", "reference", "manual", "guide", "tutorial", "tutorials",
        ],
    ),
    (
        "containers",
        &[
            "kubernetes", "k8s", "docker", "container", "containers", "containerized", "pod",
            "pods", "orchestration", "cluster", "clusters",
        ],
    ),
    (
        "operations",
        &[
            "manage", "managing", "management", "orchestrate", "orchestrating", "deploy",
            "deployment", "deployments", "scaling", "rollout", "rollouts",
        ],
    ),
    (
        "rust",
        &[
            "rust", "ownership", "borrow", "borrowing", "borrowed", "lifetimes", "lifetime",
            "cargo",
        ],
    ),
    (
        "git",
        &[
            "git", "commit", "commits", "branch", "branches", "merge", "rebase", "stash",
        ],
    ),
    (
        "postgres",
        &[
            "postgres", "postgresql", "sql", "transaction", "transactions", "isolation",
        ],
    ),
    (
        "css",
        &[
            "css", "flexbox", "grid", "selector", "selectors", "styles", "styling", "layout",
        ],
    ),
    (
        "ml",
        &[
            "neural", "networks", "training", "pytorch", "tensorflow", "gradient", "gradients",
            "learning",
        ],
    ),
];

/// Deterministic concept-hash embedding backend.
#[derive(Debug, Clone)]
pub struct LexiconEmbedding {
    concept_of: HashMap<&'static str, &'static str>,
}

impl Default for LexiconEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconEmbedding {
    pub fn new() -> Self {
        let mut concept_of = HashMap::new();
        for (concept, tokens) in CONCEPT_GROUPS {
            for token in *tokens {
                concept_of.insert(*token, *concept);
            }
        }
        Self { concept_of }
    }

    fn embed_text(&self, input: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIMENSIONS];
        for token in input
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (direction_seed, weight) = match self.concept_of.get(token) {
                Some(concept) => (*concept, 1.0f32),
                None => (token, OFF_TOPIC_WEIGHT),
            };
            add_direction(&mut vector, direction_seed, weight);
        }
        l2_normalize(&mut vector);
        vector
    }
}

/// Accumulate the pseudo-random unit direction for a seed string.
fn add_direction(vector: &mut [f32], seed: &str, weight: f32) {
    for (dim, slot) in vector.iter_mut().enumerate() {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        dim.hash(&mut hasher);
        let h = hasher.finish();
        *slot += weight * (((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0) as f32;
    }
}

impl EmbeddingBackend for LexiconEmbedding {
    async fn embed(&self, request: EmbeddingRequest<'_>) -> Result<Vec<f32>, RetraceError> {
        if request.text.trim().is_empty() {
            return Err(RetraceError::InvalidArgs("Cannot embed empty text".into()));
        }
        Ok(self.embed_text(&request.composed_text()))
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}
