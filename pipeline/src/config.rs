use std::time::Duration;

use facesort_album::PublishMode;
use facesort_cluster::DEFAULT_EPS;

const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Controls processor behavior.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Maximum cosine distance for two faces to be neighbors. Default: 0.5.
    pub eps: f32,

    /// Images embedded concurrently. Default: 4.
    pub concurrency: usize,

    /// Upper bound for a single embedding call. Default: 30s.
    pub embed_timeout: Duration,

    /// Whether albums from earlier runs are kept. Default: additive.
    pub publish_mode: PublishMode,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            concurrency: DEFAULT_CONCURRENCY,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            publish_mode: PublishMode::default(),
        }
    }
}

impl ProcessorConfig {
    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn with_publish_mode(mut self, mode: PublishMode) -> Self {
        self.publish_mode = mode;
        self
    }
}
