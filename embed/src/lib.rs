pub mod config;
pub mod embed;
pub mod error;
pub mod http;

pub use config::EmbedConfig;
pub use embed::FaceEmbedder;
pub use error::EmbedError;
pub use http::HttpEmbedder;
