use async_trait::async_trait;
use mentora_rs_memory::Embedder;

/// Deterministic bag-of-words embedder. Identical text embeds at distance
/// zero from itself, so stored questions recall themselves with full
/// similarity.
#[derive(Default)]
pub struct StubEmbedder;

impl StubEmbedder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let mut vector = vec![0.0f32; 32];
        for word in text.split_whitespace() {
            let mut hash: u32 = 2166136261;
            for byte in word.to_lowercase().bytes() {
                hash ^= byte as u32;
                hash = hash.wrapping_mul(16777619);
            }
            vector[(hash % 32) as usize] += 1.0;
        }
        Some(vector)
    }
}
