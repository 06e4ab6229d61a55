use crate::error::EmbedError;

/// FaceEmbedder converts an encoded image into a dense float32 vector
/// describing the face it contains.
///
/// Implementations must be safe for concurrent use (Send + Sync).
/// A failure is scoped to the one image passed in; callers skip that
/// image and carry on with the rest of the batch.
#[async_trait::async_trait]
pub trait FaceEmbedder: Send + Sync {
    /// Return the embedding of the first face found in `image`
    /// (raw JPEG or PNG bytes).
    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>, EmbedError>;

    /// Return the dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
