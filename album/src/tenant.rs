use std::fmt;

use crate::AlbumError;

const MAX_TENANT_LEN: usize = 128;
const MAX_FILENAME_LEN: usize = 255;

/// A validated tenant identifier, safe to use as one path segment.
///
/// Only ASCII alphanumerics plus `-`, `_` and `.` are allowed, the key must
/// not start with `.`, and it is at most 128 bytes long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantKey(String);

impl TenantKey {
    pub fn parse(key: &str) -> Result<Self, AlbumError> {
        let invalid = |reason| AlbumError::InvalidTenantKey {
            key: key.to_string(),
            reason,
        };
        if key.is_empty() {
            return Err(invalid("empty"));
        }
        if key.len() > MAX_TENANT_LEN {
            return Err(invalid("too long"));
        }
        if key.starts_with('.') {
            return Err(invalid("must not start with '.'"));
        }
        if !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            return Err(invalid("only [A-Za-z0-9._-] allowed"));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Checks that `name` is usable as a single file or directory name.
///
/// Rejects empty names, names starting with `.` (which also covers `.`
/// and `..`), path separators, `:` and control characters.
pub fn validate_name(name: &str) -> Result<(), AlbumError> {
    let invalid = |reason| AlbumError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(invalid("too long"));
    }
    if name.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if name
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
    {
        return Err(invalid("contains a path separator or control character"));
    }
    Ok(())
}

/// Reduces a client-supplied upload filename to its final component and
/// validates it.
///
/// Browsers on some platforms send full paths (`C:\fakepath\a.jpg`); only
/// `a.jpg` is kept.
pub fn sanitize_filename(raw: &str) -> Result<String, AlbumError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    validate_name(base)?;
    Ok(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_key_accepts_safe_keys() {
        for key in ["u1", "user-42", "a.b_c", "X"] {
            assert_eq!(TenantKey::parse(key).unwrap().as_str(), key);
        }
    }

    #[test]
    fn tenant_key_rejects_unsafe_keys() {
        let long = "a".repeat(129);
        for key in ["", ".", "..", ".hidden", "a/b", "a\\b", "../etc", "a b", "ü", long.as_str()] {
            assert!(
                matches!(TenantKey::parse(key), Err(AlbumError::InvalidTenantKey { .. })),
                "{key:?} should be rejected"
            );
        }
    }

    #[test]
    fn validate_name_rules() {
        assert!(validate_name("IMG 0001 (1).jpg").is_ok());
        assert!(validate_name("照片.png").is_ok());
        assert!(validate_name("Person_3").is_ok());
        for name in ["", ".", "..", ".DS_Store", "a/b.jpg", "a\\b.jpg", "c:x.jpg", "a\0.jpg"] {
            assert!(validate_name(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn sanitize_keeps_last_component() {
        assert_eq!(sanitize_filename("C:\\fakepath\\a.jpg").unwrap(), "a.jpg");
        assert_eq!(sanitize_filename("../../etc/b.png").unwrap(), "b.png");
        assert_eq!(sanitize_filename("c.jpeg").unwrap(), "c.jpeg");
        assert!(sanitize_filename("photos/").is_err());
        assert!(sanitize_filename("..").is_err());
    }
}
