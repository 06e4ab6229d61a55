/// Builder-style configuration for [`HttpEmbedder`](crate::HttpEmbedder).
///
/// Empty fields fall back to the embedder's defaults.
#[derive(Debug, Clone, Default)]
pub struct EmbedConfig {
    pub model: String,
    pub detector: String,
    pub dimension: usize,
    pub base_url: String,
}

impl EmbedConfig {
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_detector(mut self, detector: &str) -> Self {
        self.detector = detector.to_string();
        self
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}
