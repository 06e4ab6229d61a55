//! Service configuration loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use facesort_album::PublishMode;
use facesort_embed::EmbedConfig;
use facesort_pipeline::ProcessorConfig;
use serde::Deserialize;

/// Configuration file format (YAML or JSON).
///
/// Every field is optional; missing fields take the defaults below.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address, `host:port` or `:port`.
    pub listen: String,
    /// Root directory holding `uploads/` and `clustered/`.
    pub data_dir: PathBuf,
    /// Maximum cosine distance between faces of the same person.
    pub eps: f32,
    /// Images embedded concurrently per request.
    pub concurrency: usize,
    /// Timeout for one embedding call, in seconds.
    pub embed_timeout_secs: u64,
    /// `additive` keeps albums from earlier runs, `replace` drops them.
    pub publish_mode: PublishMode,
    /// Upper bound for one `/process` request body, in megabytes.
    pub max_upload_mb: usize,
    pub embedder: EmbedderConfig,
}

/// Face representation service settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub base_url: String,
    /// Supports `$VAR` / `${VAR}` environment references.
    pub api_key: String,
    pub model: String,
    pub detector: String,
    pub dimension: usize,
}

impl Default for Config {
    fn default() -> Self {
        let processor = ProcessorConfig::default();
        Self {
            listen: ":5000".to_string(),
            data_dir: PathBuf::from("data"),
            eps: processor.eps,
            concurrency: processor.concurrency,
            embed_timeout_secs: processor.embed_timeout.as_secs(),
            publish_mode: processor.publish_mode,
            max_upload_mb: 256,
            embedder: EmbedderConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config file at `path`, or the defaults when `path` is None.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg: Config = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_slice(&data)?,
            _ => serde_yaml::from_slice(&data)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.eps) {
            anyhow::bail!("eps must be within [0, 2], got {}", self.eps);
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be positive");
        }
        Ok(())
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig::default()
            .with_eps(self.eps)
            .with_concurrency(self.concurrency)
            .with_embed_timeout(Duration::from_secs(self.embed_timeout_secs.max(1)))
            .with_publish_mode(self.publish_mode)
    }

    pub fn embed_config(&self) -> EmbedConfig {
        EmbedConfig::default()
            .with_base_url(&self.embedder.base_url)
            .with_model(&self.embedder.model)
            .with_detector(&self.embedder.detector)
            .with_dimension(self.embedder.dimension)
    }

    pub fn api_key(&self) -> String {
        expand_env(&self.embedder.api_key)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// Expand a `$VAR` or `${VAR}` reference. Other strings are returned as is.
fn expand_env(s: &str) -> String {
    let Some(rest) = s.strip_prefix('$') else {
        return s.to_string();
    };
    let var_name = rest
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .unwrap_or(rest);
    std::env::var(var_name).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let cfg = Config::load(None).unwrap();
        assert_eq!(cfg.listen, ":5000");
        assert_eq!(cfg.eps, 0.5);
        assert_eq!(cfg.publish_mode, PublishMode::Additive);
        assert_eq!(cfg.processor_config().embed_timeout, Duration::from_secs(30));
    }

    #[test]
    fn load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facesort.yaml");
        std::fs::write(
            &path,
            r#"
listen: "127.0.0.1:8080"
data_dir: /srv/faces
eps: 0.4
publish_mode: replace
embedder:
  base_url: http://faces:5005
  model: ArcFace
  dimension: 512
"#,
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.listen, "127.0.0.1:8080");
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/faces"));
        assert_eq!(cfg.publish_mode, PublishMode::Replace);
        assert_eq!(cfg.concurrency, 4);

        let pc = cfg.processor_config();
        assert_eq!(pc.eps, 0.4);
        let ec = cfg.embed_config();
        assert_eq!(ec.model, "ArcFace");
        assert_eq!(ec.dimension, 512);
        assert_eq!(ec.detector, "");
    }

    #[test]
    fn load_rejects_bad_eps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "eps: 3.0\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn expand_env_forms() {
        assert_eq!(expand_env("plain"), "plain");
        assert_eq!(expand_env(""), "");
        assert_eq!(expand_env("$FACESORT_SURELY_UNSET_VAR"), "");
        assert_eq!(expand_env("${FACESORT_SURELY_UNSET_VAR}"), "");
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(expand_env("$PATH"), path);
        assert_eq!(expand_env("${PATH}"), path);
    }
}
