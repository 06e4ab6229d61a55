use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::image::{Album, ImageKind, ImageRef};
use crate::tenant::{sanitize_filename, validate_name, TenantKey};
use crate::AlbumError;

/// Default intake directory name under the data root.
pub const DEFAULT_INTAKE_DIR: &str = "uploads";
/// Default published directory name under the data root.
pub const DEFAULT_PUBLISHED_DIR: &str = "clustered";

/// Albums are copied here first and only moved into place once every
/// member was copied. Hidden, so listings never see it.
const STAGING_DIR: &str = ".staging";

/// In replace mode the previous albums wait here until the new set is in
/// place, and are moved back if placing it fails.
const RETIRED_DIR: &str = ".retired";

/// Lock map entries are pruned once the map grows past this size.
const LOCK_PRUNE_THRESHOLD: usize = 64;

/// How [`Workspace::publish`] treats albums from earlier runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Keep every existing album; new members are added next to old ones.
    #[default]
    Additive,
    /// Swap the tenant's whole album set for the new one. If the swap
    /// fails, the previous albums are restored.
    Replace,
}

/// Outcome of removing one tenant directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Removal {
    Removed,
    Absent,
    Failed(String),
}

impl Removal {
    pub fn is_failed(&self) -> bool {
        matches!(self, Removal::Failed(_))
    }
}

/// Per-directory result of [`Workspace::teardown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub intake: Removal,
    pub published: Removal,
}

impl TeardownReport {
    /// True when neither removal failed.
    pub fn is_complete(&self) -> bool {
        !self.intake.is_failed() && !self.published.is_failed()
    }
}

/// One async mutex per tenant.
///
/// Guards own an `Arc` of their mutex, so an entry whose strong count is 1
/// is neither held nor awaited and can be dropped from the map.
#[derive(Default)]
struct TenantLocks {
    inner: parking_lot::Mutex<HashMap<TenantKey, Arc<Mutex<()>>>>,
}

impl TenantLocks {
    async fn acquire(&self, tenant: &TenantKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock();
            if map.len() > LOCK_PRUNE_THRESHOLD {
                map.retain(|_, m| Arc::strong_count(m) > 1);
            }
            map.entry(tenant.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Owns the on-disk layout of every tenant:
///
/// ```text
/// <intake_root>/<tenant>/<filename>
/// <published_root>/<tenant>/<album>/<filename>
/// ```
///
/// Every mutation of a tenant's directories, and every read of its
/// published albums, runs under that tenant's lock. Publishing and teardown
/// therefore never interleave file-by-file, and a listing never observes a
/// half-written album. Different tenants never contend.
pub struct Workspace {
    intake_root: PathBuf,
    published_root: PathBuf,
    locks: TenantLocks,
}

impl Workspace {
    /// Creates a workspace using `<data_root>/uploads` and `<data_root>/clustered`.
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        let root = data_root.as_ref();
        Self::with_dirs(root.join(DEFAULT_INTAKE_DIR), root.join(DEFAULT_PUBLISHED_DIR))
    }

    pub fn with_dirs(intake_root: impl Into<PathBuf>, published_root: impl Into<PathBuf>) -> Self {
        Self {
            intake_root: intake_root.into(),
            published_root: published_root.into(),
            locks: TenantLocks::default(),
        }
    }

    pub fn intake_dir(&self, tenant: &TenantKey) -> PathBuf {
        self.intake_root.join(tenant.as_str())
    }

    pub fn published_dir(&self, tenant: &TenantKey) -> PathBuf {
        self.published_root.join(tenant.as_str())
    }

    /// Creates the tenant's intake and published directories if absent.
    /// Never removes existing content.
    pub async fn ensure(&self, tenant: &str) -> Result<(PathBuf, PathBuf), AlbumError> {
        let tenant = TenantKey::parse(tenant)?;
        let _guard = self.locks.acquire(&tenant).await;

        let intake = self.intake_dir(&tenant);
        let published = self.published_dir(&tenant);
        fs::create_dir_all(&intake)
            .await
            .map_err(AlbumError::storage(&intake))?;
        fs::create_dir_all(&published)
            .await
            .map_err(AlbumError::storage(&published))?;
        Ok((intake, published))
    }

    /// Stores one uploaded file in the tenant's intake directory, replacing
    /// a previous upload with the same name.
    pub async fn save_upload(
        &self,
        tenant: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<ImageRef, AlbumError> {
        let tenant = TenantKey::parse(tenant)?;
        let filename = sanitize_filename(filename)?;
        let _guard = self.locks.acquire(&tenant).await;

        let dir = self.intake_dir(&tenant);
        fs::create_dir_all(&dir)
            .await
            .map_err(AlbumError::storage(&dir))?;
        let path = dir.join(&filename);
        fs::write(&path, data)
            .await
            .map_err(AlbumError::storage(&path))?;
        debug!(tenant = %tenant, file = %filename, bytes = data.len(), "album: upload saved");
        Ok(ImageRef::new(tenant, filename, path))
    }

    /// Verifies that `image` is a safely named upload of `tenant`, stored
    /// where [`save_upload`](Workspace::save_upload) puts it.
    ///
    /// Does not touch the file system.
    pub fn check_image(&self, tenant: &TenantKey, image: &ImageRef) -> Result<(), AlbumError> {
        validate_name(&image.filename)?;
        if image.tenant != *tenant || image.path != self.intake_dir(tenant).join(&image.filename) {
            return Err(AlbumError::ForeignImage {
                tenant: tenant.to_string(),
                path: image.path.clone(),
            });
        }
        Ok(())
    }

    /// Copies every album member into `published/<tenant>/<album>/`.
    ///
    /// Every image must be an upload of `tenant` (see
    /// [`check_image`](Workspace::check_image)); nothing is read otherwise.
    ///
    /// Each album is first copied completely into a hidden staging directory
    /// and then moved into place, so a failed copy never leaves a partial
    /// album behind. In additive mode, albums already moved into place before
    /// a failure stay published. In replace mode a failure restores the
    /// previous album set. Returns the names of the albums written.
    pub async fn publish(
        &self,
        tenant: &str,
        albums: &[Album],
        mode: PublishMode,
    ) -> Result<Vec<String>, AlbumError> {
        let tenant = TenantKey::parse(tenant)?;
        for album in albums {
            validate_name(&album.name)?;
            for image in &album.images {
                self.check_image(&tenant, image)?;
            }
        }

        let _guard = self.locks.acquire(&tenant).await;
        let root = self.published_dir(&tenant);
        let staging = root.join(STAGING_DIR);
        let retired = root.join(RETIRED_DIR);

        // Leftovers of an interrupted publish.
        remove_dir_if_exists(&staging).await?;
        remove_dir_if_exists(&retired).await?;
        fs::create_dir_all(&staging)
            .await
            .map_err(AlbumError::storage(&staging))?;

        let result = match mode {
            PublishMode::Additive => publish_additive(&root, &staging, albums).await,
            PublishMode::Replace => publish_replace(&root, &staging, &retired, albums).await,
        };
        for dir in [&staging, &retired] {
            if let Err(e) = remove_dir_if_exists(dir).await {
                warn!(tenant = %tenant, error = %e, "album: failed to clean publish directory");
            }
        }

        let names = result?;
        info!(tenant = %tenant, albums = names.len(), ?mode, "album: published");
        Ok(names)
    }

    /// Maps each published album to its image filenames (sorted).
    ///
    /// Albums without any accepted image file are omitted. A tenant with no
    /// published directory yields an empty map.
    pub async fn list_albums(
        &self,
        tenant: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, AlbumError> {
        let tenant = TenantKey::parse(tenant)?;
        let _guard = self.locks.acquire(&tenant).await;

        let root = self.published_dir(&tenant);
        let mut result = BTreeMap::new();
        for name in list_album_dirs(&root).await? {
            let images = list_images(&root.join(&name)).await?;
            if !images.is_empty() {
                result.insert(name, images);
            }
        }
        Ok(result)
    }

    /// Resolves the path of one published image.
    pub async fn album_image(
        &self,
        tenant: &str,
        album: &str,
        filename: &str,
    ) -> Result<(PathBuf, ImageKind), AlbumError> {
        let tenant = TenantKey::parse(tenant)?;
        validate_name(album)?;
        validate_name(filename)?;
        let not_found = || AlbumError::NotFound(format!("{tenant}/{album}/{filename}"));
        let kind = ImageKind::from_filename(filename).ok_or_else(not_found)?;

        let path = self.published_dir(&tenant).join(album).join(filename);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok((path, kind)),
            Ok(_) => Err(not_found()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(AlbumError::Storage { path, source: e }),
        }
    }

    /// Reads every image of one album, for packaging.
    pub async fn album_files(
        &self,
        tenant: &str,
        album: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, AlbumError> {
        let tenant = TenantKey::parse(tenant)?;
        validate_name(album)?;
        let _guard = self.locks.acquire(&tenant).await;

        let dir = self.published_dir(&tenant).join(album);
        if !is_dir(&dir).await? {
            return Err(AlbumError::NotFound(format!("{tenant}/{album}")));
        }
        let mut files = Vec::new();
        for name in list_images(&dir).await? {
            let path = dir.join(&name);
            let data = fs::read(&path).await.map_err(AlbumError::storage(&path))?;
            files.push((name, data));
        }
        Ok(files)
    }

    /// Removes the tenant's intake and published directories.
    ///
    /// Missing directories count as [`Removal::Absent`]. A failure on one
    /// directory does not stop the other from being removed; both outcomes
    /// are reported. Only an invalid tenant key is an error.
    pub async fn teardown(&self, tenant: &str) -> Result<TeardownReport, AlbumError> {
        let tenant = TenantKey::parse(tenant)?;
        let _guard = self.locks.acquire(&tenant).await;

        let report = TeardownReport {
            intake: remove_tree(&self.intake_dir(&tenant)).await,
            published: remove_tree(&self.published_dir(&tenant)).await,
        };
        if report.is_complete() {
            info!(tenant = %tenant, "album: tenant data removed");
        } else {
            warn!(tenant = %tenant, ?report, "album: partial teardown");
        }
        Ok(report)
    }
}

async fn remove_tree(path: &Path) -> Removal {
    match fs::remove_dir_all(path).await {
        Ok(()) => Removal::Removed,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Removal::Absent,
        Err(e) => Removal::Failed(e.to_string()),
    }
}

async fn remove_dir_if_exists(path: &Path) -> Result<(), AlbumError> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AlbumError::Storage {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

async fn is_dir(path: &Path) -> Result<bool, AlbumError> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AlbumError::Storage {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

async fn publish_additive(
    root: &Path,
    staging: &Path,
    albums: &[Album],
) -> Result<Vec<String>, AlbumError> {
    stage_albums(staging, albums).await?;
    let mut placed = Vec::with_capacity(albums.len());
    place_albums(root, staging, albums, &mut placed).await?;
    Ok(placed)
}

/// Swaps the tenant's album set, restoring the previous one on failure.
async fn publish_replace(
    root: &Path,
    staging: &Path,
    retired: &Path,
    albums: &[Album],
) -> Result<Vec<String>, AlbumError> {
    stage_albums(staging, albums).await?;
    fs::create_dir_all(retired)
        .await
        .map_err(AlbumError::storage(retired))?;
    let previous = retire_albums(root, retired).await?;

    let mut placed = Vec::with_capacity(albums.len());
    if let Err(e) = place_albums(root, staging, albums, &mut placed).await {
        for name in &placed {
            if let Err(e) = remove_dir_if_exists(&root.join(name)).await {
                warn!(album = %name, error = %e, "album: failed to withdraw new album");
            }
        }
        restore_albums(root, retired, &previous).await;
        return Err(e);
    }
    Ok(placed)
}

/// Copies every album member into `staging/<album>/`.
async fn stage_albums(staging: &Path, albums: &[Album]) -> Result<(), AlbumError> {
    for album in albums {
        let dir = staging.join(&album.name);
        fs::create_dir_all(&dir)
            .await
            .map_err(AlbumError::storage(&dir))?;
        for image in &album.images {
            let dst = dir.join(&image.filename);
            fs::copy(&image.path, &dst)
                .await
                .map_err(AlbumError::storage(&image.path))?;
        }
    }
    Ok(())
}

/// Moves staged albums into `root`, recording each one placed.
async fn place_albums(
    root: &Path,
    staging: &Path,
    albums: &[Album],
    placed: &mut Vec<String>,
) -> Result<(), AlbumError> {
    for album in albums {
        move_album(&staging.join(&album.name), &root.join(&album.name)).await?;
        debug!(album = %album.name, images = album.images.len(), "album: moved into place");
        placed.push(album.name.clone());
    }
    Ok(())
}

/// Moves every visible album of `root` into `retired` and returns their
/// names. On failure the albums already moved are put back.
async fn retire_albums(root: &Path, retired: &Path) -> Result<Vec<String>, AlbumError> {
    let names = list_album_dirs(root).await?;
    for (i, name) in names.iter().enumerate() {
        let src = root.join(name);
        if let Err(e) = fs::rename(&src, retired.join(name)).await {
            restore_albums(root, retired, &names[..i]).await;
            return Err(AlbumError::Storage { path: src, source: e });
        }
    }
    Ok(names)
}

async fn restore_albums(root: &Path, retired: &Path, names: &[String]) {
    for name in names {
        if let Err(e) = fs::rename(retired.join(name), root.join(name)).await {
            warn!(album = %name, error = %e, "album: failed to restore previous album");
        }
    }
}

/// Moves a staged album into place. A new album is renamed as a whole;
/// into an existing one the files are moved individually, replacing
/// same-named files.
async fn move_album(src: &Path, dst: &Path) -> Result<(), AlbumError> {
    if !is_dir(dst).await? {
        return fs::rename(src, dst).await.map_err(AlbumError::storage(dst));
    }
    let mut entries = fs::read_dir(src).await.map_err(AlbumError::storage(src))?;
    while let Some(entry) = entries.next_entry().await.map_err(AlbumError::storage(src))? {
        let target = dst.join(entry.file_name());
        fs::rename(entry.path(), &target)
            .await
            .map_err(AlbumError::storage(&target))?;
    }
    Ok(())
}

/// Names of the visible subdirectories of `root`, sorted. Missing root → empty.
async fn list_album_dirs(root: &Path) -> Result<Vec<String>, AlbumError> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AlbumError::Storage {
                path: root.to_path_buf(),
                source: e,
            });
        }
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(AlbumError::storage(root))? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(AlbumError::storage(entry.path()))?;
        if file_type.is_dir() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Accepted image files directly inside `dir`, sorted.
async fn list_images(dir: &Path) -> Result<Vec<String>, AlbumError> {
    let mut entries = fs::read_dir(dir).await.map_err(AlbumError::storage(dir))?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(AlbumError::storage(dir))? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || ImageKind::from_filename(&name).is_none() {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(AlbumError::storage(entry.path()))?;
        if file_type.is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
