use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;

/// Maps text to a fixed-length vector.
///
/// Implementations are CPU-bound and synchronous. Callers running on the async
/// runtime go through `VectorStoreManager::embed`, which moves the call onto the
/// blocking pool.
pub trait TextEmbedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A struct responsible for generating text embeddings using a pre-initialized fastembed model.
pub struct EmbeddingGenerator {
    model: TextEmbedding,
    dimension: usize,
}

impl EmbeddingGenerator {
    /// Creates a new EmbeddingGenerator, downloading the model into `cache_dir` on first use.
    ///
    /// # Arguments
    ///
    /// * `model_name` - The embedding model to use (e.g., EmbeddingModel::AllMiniLML6V2).
    /// * `cache_dir` - The cache directory for the model files (None for fastembed's default).
    pub fn new(model_name: EmbeddingModel, cache_dir: Option<PathBuf>) -> Result<Self> {
        let dimension = TextEmbedding::list_supported_models()
            .iter()
            .find(|info| info.model == model_name)
            .map(|info| info.dim)
            .ok_or_else(|| anyhow!("Embedding model {:?} is not supported", model_name))?;

        let mut opts = InitOptions::new(model_name);
        if let Some(dir) = cache_dir {
            opts = opts.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(opts)?;
        Ok(EmbeddingGenerator { model, dimension })
    }

    /// Generates embeddings for a batch of documents.
    pub fn generate_embeddings(&self, documents: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.model.embed(documents.to_vec(), None)
    }
}

impl TextEmbedder for EmbeddingGenerator {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.generate_embeddings(&[text])?
            .pop()
            .ok_or_else(|| anyhow!("Embedding model returned no vector"))
    }
}

/// Offline embedder based on feature hashing of lower-cased word tokens.
///
/// Deterministic across builds and platforms (64-bit FNV-1a over the token bytes),
/// L2-normalised, no model download. Texts sharing
/// vocabulary end up close in cosine space, which is enough for exact-repeat lookups.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let hash = fnv1a(token.as_bytes());
        let index = (hash % self.dimension as u64) as usize;
        // top bit picks the sign
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

impl TextEmbedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            return Err(anyhow!("Embedding dimension must be greater than zero"));
        }
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let tokens = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty());
        for token in tokens {
            let (index, sign) = self.bucket(token);
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        } else {
            // blank input still needs a valid, comparable vector
            vector[0] = 1.0;
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn hashing_embedder_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(384);
        let first = embedder.embed("Total sales in 2020").unwrap();
        let second = embedder.embed("Total sales in 2020").unwrap();
        assert_eq!(first.len(), 384);
        assert_eq!(first, second);
        let norm: f32 = first.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hashing_embedder_ranks_shared_vocabulary_higher() {
        let embedder = HashingEmbedder::new(384);
        let query = embedder.embed("which year had the highest sales").unwrap();
        let close = embedder.embed("the highest sales year").unwrap();
        let far = embedder.embed("weather forecast tomorrow").unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[test]
    fn token_hash_is_fixed() {
        // Stored vectors must stay comparable across toolchain upgrades.
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x8594_4171_f739_67e8);

        let embedder = HashingEmbedder::new(384);
        let vector = embedder.embed("sales").unwrap();
        let index = (fnv1a(b"sales") % 384) as usize;
        assert!(vector[index].abs() > 0.99);
    }

    #[test]
    fn hashing_embedder_handles_blank_text() {
        let embedder = HashingEmbedder::new(8);
        let vector = embedder.embed("   ").unwrap();
        assert_eq!(vector.len(), 8);
        assert_eq!(vector[0], 1.0);
    }

    // Downloads model data on first run.
    #[test]
    #[ignore = "downloads the all-MiniLM-L6-v2 model"]
    fn test_embedding_generator_init_and_embed() -> Result<()> {
        let generator = EmbeddingGenerator::new(EmbeddingModel::AllMiniLML6V2, None)?;
        assert_eq!(generator.dimension(), 384);

        let embeddings = generator.generate_embeddings(&["This is a test document.", "Another document."])?;
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 384);

        let single = generator.embed("This is a test document.")?;
        assert_eq!(single.len(), 384);
        Ok(())
    }
}
