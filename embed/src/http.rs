use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbedConfig;
use crate::embed::FaceEmbedder;
use crate::error::EmbedError;

/// Face representation models understood by the service.
pub const MODEL_FACENET: &str = "Facenet";
pub const MODEL_FACENET_512: &str = "Facenet512";
pub const MODEL_ARCFACE: &str = "ArcFace";

/// Face detector backends understood by the service.
pub const DETECTOR_RETINAFACE: &str = "retinaface";
pub const DETECTOR_OPENCV: &str = "opencv";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5005";
const FACENET_DIM: usize = 128;

/// Representation request body.
#[derive(Serialize)]
struct RepresentRequest<'a> {
    model: &'a str,
    detector: &'a str,
    image: String,
}

/// Representation response: one entry per detected face.
#[derive(Deserialize)]
struct RepresentResponse {
    #[serde(default)]
    faces: Vec<FaceData>,
}

#[derive(Deserialize)]
struct FaceData {
    embedding: Vec<f64>,
}

/// Embedder backed by an HTTP face-representation service.
///
/// Sends the image base64-encoded to `POST {base_url}/represent` and uses
/// the embedding of the first detected face.
pub struct HttpEmbedder {
    client: Client,
    api_key: String,
    model: String,
    detector: String,
    dim: usize,
    base_url: String,
}

impl HttpEmbedder {
    pub fn new(base_url: &str) -> Self {
        Self::with_config("", EmbedConfig::default().with_base_url(base_url))
    }

    pub fn with_config(api_key: &str, cfg: EmbedConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: if cfg.model.is_empty() {
                MODEL_FACENET.to_string()
            } else {
                cfg.model
            },
            detector: if cfg.detector.is_empty() {
                DETECTOR_RETINAFACE.to_string()
            } else {
                cfg.detector
            },
            dim: if cfg.dimension == 0 {
                FACENET_DIM
            } else {
                cfg.dimension
            },
            base_url: if cfg.base_url.is_empty() {
                DEFAULT_BASE_URL.to_string()
            } else {
                cfg.base_url.trim_end_matches('/').to_string()
            },
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call_api(&self, image: &[u8]) -> Result<Vec<FaceData>, EmbedError> {
        let url = format!("{}/represent", self.base_url);
        let body = RepresentRequest {
            model: &self.model,
            detector: &self.detector,
            image: base64::engine::general_purpose::STANDARD.encode(image),
        };

        let mut req = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }
        let resp = req.send().await.map_err(|e| EmbedError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::Api(format!("HTTP {status}: {body}")));
        }

        let data: RepresentResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::Api(e.to_string()))?;
        Ok(data.faces)
    }
}

#[async_trait::async_trait]
impl FaceEmbedder for HttpEmbedder {
    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>, EmbedError> {
        if image.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let faces = self.call_api(image).await?;
        debug!(faces = faces.len(), model = %self.model, "embed: representation received");
        let face = faces.into_iter().next().ok_or(EmbedError::NoFace)?;

        // float64 -> f32 conversion.
        let emb: Vec<f32> = face.embedding.iter().map(|&v| v as f32).collect();
        if emb.len() != self.dim {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dim,
                got: emb.len(),
            });
        }
        Ok(emb)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn represent(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let image = body["image"].as_str().unwrap_or_default();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(image)
            .unwrap_or_default();
        match raw.as_slice() {
            b"face" => (
                StatusCode::OK,
                Json(json!({"faces": [{"embedding": [1.0, 0.0, 0.0]}, {"embedding": [0.0, 1.0, 0.0]}]})),
            ),
            b"landscape" => (StatusCode::OK, Json(json!({"faces": []}))),
            b"wide" => (StatusCode::OK, Json(json!({"faces": [{"embedding": [1.0, 0.0]}]}))),
            _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "cannot decode"}))),
        }
    }

    async fn spawn_service() -> String {
        let app = Router::new().route("/represent", post(represent));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn embedder(base_url: &str) -> HttpEmbedder {
        HttpEmbedder::with_config(
            "secret",
            EmbedConfig::default()
                .with_base_url(base_url)
                .with_dimension(3),
        )
    }

    #[test]
    fn config_defaults() {
        let e = HttpEmbedder::new("");
        assert_eq!(e.model(), MODEL_FACENET);
        assert_eq!(e.dimension(), FACENET_DIM);
        assert_eq!(e.base_url, DEFAULT_BASE_URL);

        let e = HttpEmbedder::with_config(
            "",
            EmbedConfig::default()
                .with_model(MODEL_ARCFACE)
                .with_detector(DETECTOR_OPENCV)
                .with_dimension(512)
                .with_base_url("http://faces:9000/"),
        );
        assert_eq!(e.model(), MODEL_ARCFACE);
        assert_eq!(e.detector, DETECTOR_OPENCV);
        assert_eq!(e.dimension(), 512);
        assert_eq!(e.base_url, "http://faces:9000");
    }

    #[tokio::test]
    async fn embed_uses_first_face() {
        let url = spawn_service().await;
        let emb = embedder(&url).embed(b"face").await.unwrap();
        assert_eq!(emb, vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn embed_without_face() {
        let url = spawn_service().await;
        let err = embedder(&url).embed(b"landscape").await.unwrap_err();
        assert!(matches!(err, EmbedError::NoFace));
    }

    #[tokio::test]
    async fn embed_wrong_dimension() {
        let url = spawn_service().await;
        let err = embedder(&url).embed(b"wide").await.unwrap_err();
        assert!(matches!(
            err,
            EmbedError::DimensionMismatch { expected: 3, got: 2 }
        ));
    }

    #[tokio::test]
    async fn embed_http_error() {
        let url = spawn_service().await;
        let err = embedder(&url).embed(b"garbage").await.unwrap_err();
        match err {
            EmbedError::Api(msg) => assert!(msg.contains("400"), "got {msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn embed_empty_image() {
        let err = embedder("http://127.0.0.1:1").embed(b"").await.unwrap_err();
        assert!(matches!(err, EmbedError::EmptyInput));
    }
}
