//! Tenant-scoped photo storage.
//!
//! Each tenant owns an intake directory holding its raw uploads and a
//! published directory holding one sub-directory per album:
//!
//! ```text
//! <data>/uploads/<tenant>/<filename>
//! <data>/clustered/<tenant>/Person_<n>/<filename>
//! ```
//!
//! Tenant keys are validated ([`TenantKey`]) before any path is built.
//! [`Workspace`] serializes publish, teardown and album reads per tenant.

mod error;
mod image;
mod tenant;
mod workspace;

pub use error::AlbumError;
pub use image::{album_name, Album, ImageKind, ImageRef};
pub use tenant::{sanitize_filename, validate_name, TenantKey};
pub use workspace::{
    PublishMode, Removal, TeardownReport, Workspace, DEFAULT_INTAKE_DIR, DEFAULT_PUBLISHED_DIR,
};
