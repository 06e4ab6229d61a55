use serde::{Deserialize, Serialize};

/// One uploaded file as received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Why an image was left out of clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnsupportedExtension,
    UnsafeFilename,
    /// The reference points outside the tenant's intake area; never read.
    ForeignImage,
    DuplicateFilename,
    ReadFailed,
    ExtractionFailed,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedImage {
    pub filename: String,
    pub reason: SkipReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SkippedImage {
    pub fn new(filename: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            filename: filename.into(),
            reason,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Album an image was placed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub filename: String,
    pub album: String,
}

/// Result of one successful processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub tenant: String,
    /// Number of images that were embedded and clustered.
    pub processed: usize,
    pub skipped: Vec<SkippedImage>,
    /// Albums written by this run, in label order.
    pub albums: Vec<String>,
    /// Album of every processed image, in input order.
    pub assignments: Vec<Assignment>,
}

impl ProcessingReport {
    /// True when some images were skipped but albums were still produced.
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}
