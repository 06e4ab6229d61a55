use std::path::{Path, PathBuf};

use crate::tenant::TenantKey;

/// Image formats accepted for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Classifies a filename by extension, case-insensitively.
    /// Returns `None` for anything other than `.jpg`, `.jpeg` or `.png`.
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
            Some(Self::Jpeg)
        } else if ext.eq_ignore_ascii_case("png") {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// One uploaded file in a tenant's intake area.
///
/// Workspace operations only accept a reference whose `path` is exactly
/// `<intake>/<tenant>/<filename>`; see [`Workspace::check_image`].
///
/// [`Workspace::check_image`]: crate::Workspace::check_image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Tenant that uploaded the file.
    pub tenant: TenantKey,
    /// Original filename, preserved when the image is published.
    pub filename: String,
    /// Location of the stored upload.
    pub path: PathBuf,
}

impl ImageRef {
    pub fn new(tenant: TenantKey, filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            tenant,
            filename: filename.into(),
            path: path.into(),
        }
    }

    pub fn kind(&self) -> Option<ImageKind> {
        ImageKind::from_filename(&self.filename)
    }
}

/// Name of the album published for a cluster label (`Person_<label+1>`).
pub fn album_name(label: usize) -> String {
    format!("Person_{}", label + 1)
}

/// A named group of images belonging to one cluster label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub name: String,
    pub images: Vec<ImageRef>,
}

impl Album {
    pub fn for_label(label: usize, images: Vec<ImageRef>) -> Self {
        Self {
            name: album_name(label),
            images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(ImageKind::from_filename("a.jpg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_filename("a.JPEG"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_filename("a.b.Png"), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_filename("a.gif"), None);
        assert_eq!(ImageKind::from_filename("jpg"), None);
        assert_eq!(ImageKind::from_filename("a.jpg.txt"), None);
    }

    #[test]
    fn album_names_are_one_based() {
        assert_eq!(album_name(0), "Person_1");
        assert_eq!(Album::for_label(4, vec![]).name, "Person_5");
    }
}
