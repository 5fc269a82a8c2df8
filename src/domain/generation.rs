use anyhow::Result;
use async_trait::async_trait;

/// Sampling parameters forwarded to the generation service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 500,
        }
    }
}

/// Opaque text-completion service.
///
/// `Ok(None)` means the service answered but produced no content.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<Option<String>>;
}
