use std::collections::HashSet;
use std::sync::Arc;

use facesort_album::{Album, AlbumError, ImageRef, TenantKey, Workspace};
use facesort_cluster::{cluster, group_by_label};
use facesort_embed::FaceEmbedder;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::ProcessorConfig;
use crate::error::ProcessError;
use crate::report::{Assignment, ProcessingReport, SkipReason, SkippedImage, Upload};

/// Turns a tenant's images into per-person albums.
///
/// Thread-safe: concurrent calls, including for the same tenant, are
/// allowed. Storage isolation is provided by the [`Workspace`].
pub struct Processor {
    embedder: Arc<dyn FaceEmbedder>,
    workspace: Arc<Workspace>,
    cfg: ProcessorConfig,
}

impl Processor {
    pub fn new(
        embedder: Arc<dyn FaceEmbedder>,
        workspace: Arc<Workspace>,
        cfg: ProcessorConfig,
    ) -> Self {
        Self {
            embedder,
            workspace,
            cfg,
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.cfg
    }

    /// Stores the uploads in the tenant's intake area, then runs [`process`]
    /// on them. Uploads whose filename is unsafe are reported as skipped.
    ///
    /// [`process`]: Processor::process
    pub async fn process_uploads(
        &self,
        tenant: &str,
        uploads: Vec<Upload>,
    ) -> Result<ProcessingReport, ProcessError> {
        self.workspace.ensure(tenant).await?;

        let mut rejected = Vec::new();
        let mut images = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self
                .workspace
                .save_upload(tenant, &upload.filename, &upload.data)
                .await
            {
                Ok(image) => images.push(image),
                Err(AlbumError::InvalidName { reason, .. }) => {
                    warn!(tenant, file = %upload.filename, reason, "process: unsafe filename skipped");
                    rejected.push(
                        SkippedImage::new(upload.filename, SkipReason::UnsafeFilename)
                            .with_detail(reason),
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        match self.process(tenant, images).await {
            Ok(mut report) => {
                rejected.append(&mut report.skipped);
                report.skipped = rejected;
                Ok(report)
            }
            Err(ProcessError::NoValidInput { mut skipped }) => {
                rejected.append(&mut skipped);
                Err(ProcessError::NoValidInput { skipped: rejected })
            }
            Err(e) => Err(e),
        }
    }

    /// Embeds, clusters and publishes `images` for `tenant`.
    ///
    /// Per-image problems (unsafe name, image of another tenant, unsupported
    /// extension, duplicate name, unreadable file, extraction failure,
    /// timeout) skip that image and are listed in the report. The run fails
    /// as a whole only if no image produced an embedding, if the embeddings
    /// cannot be clustered, or on storage errors.
    pub async fn process(
        &self,
        tenant: &str,
        images: Vec<ImageRef>,
    ) -> Result<ProcessingReport, ProcessError> {
        let key = TenantKey::parse(tenant)?;
        self.workspace.ensure(tenant).await?;
        info!(tenant, images = images.len(), "process: started");

        let mut skipped = Vec::new();
        let mut accepted = Vec::with_capacity(images.len());
        let mut seen = HashSet::new();
        for image in images {
            match self.workspace.check_image(&key, &image) {
                Ok(()) => {}
                Err(AlbumError::InvalidName { reason, .. }) => {
                    skipped.push(
                        SkippedImage::new(image.filename, SkipReason::UnsafeFilename)
                            .with_detail(reason),
                    );
                    continue;
                }
                Err(e @ AlbumError::ForeignImage { .. }) => {
                    skipped.push(
                        SkippedImage::new(image.filename, SkipReason::ForeignImage)
                            .with_detail(e.to_string()),
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            if image.kind().is_none() {
                skipped.push(SkippedImage::new(
                    image.filename,
                    SkipReason::UnsupportedExtension,
                ));
                continue;
            }
            // Albums key members by filename; a second file with the same
            // name would silently overwrite the first.
            if !seen.insert(image.filename.clone()) {
                skipped.push(SkippedImage::new(
                    image.filename,
                    SkipReason::DuplicateFilename,
                ));
                continue;
            }
            accepted.push(image);
        }

        let embeds: Vec<_> = accepted.iter().map(|image| self.embed_one(image)).collect();
        let results: Vec<Result<Vec<f32>, SkippedImage>> = stream::iter(embeds)
            .buffered(self.cfg.concurrency.max(1))
            .collect()
            .await;

        let mut embedded = Vec::with_capacity(accepted.len());
        let mut embeddings = Vec::with_capacity(accepted.len());
        for (image, result) in accepted.into_iter().zip(results) {
            match result {
                Ok(emb) => {
                    embedded.push(image);
                    embeddings.push(emb);
                }
                Err(skip) => skipped.push(skip),
            }
        }
        for skip in &skipped {
            warn!(tenant, file = %skip.filename, reason = ?skip.reason, detail = ?skip.detail, "process: image skipped");
        }

        if embeddings.is_empty() {
            warn!(tenant, skipped = skipped.len(), "process: no valid face embeddings");
            return Err(ProcessError::NoValidInput { skipped });
        }

        let labels = cluster(&embeddings, self.cfg.eps)?;
        let groups = group_by_label(&labels);
        debug!(tenant, faces = labels.len(), clusters = groups.len(), "process: clustered");

        let albums: Vec<Album> = groups
            .iter()
            .enumerate()
            .map(|(label, members)| {
                Album::for_label(label, members.iter().map(|&i| embedded[i].clone()).collect())
            })
            .collect();
        let names = self
            .workspace
            .publish(tenant, &albums, self.cfg.publish_mode)
            .await?;

        let assignments = embedded
            .iter()
            .zip(&labels)
            .map(|(image, &label)| Assignment {
                filename: image.filename.clone(),
                album: albums[label].name.clone(),
            })
            .collect();

        info!(
            tenant,
            processed = embedded.len(),
            skipped = skipped.len(),
            albums = names.len(),
            "process: done"
        );
        Ok(ProcessingReport {
            tenant: tenant.to_string(),
            processed: embedded.len(),
            skipped,
            albums: names,
            assignments,
        })
    }

    async fn embed_one(&self, image: &ImageRef) -> Result<Vec<f32>, SkippedImage> {
        let data = tokio::fs::read(&image.path).await.map_err(|e| {
            SkippedImage::new(&image.filename, SkipReason::ReadFailed).with_detail(e.to_string())
        })?;

        match tokio::time::timeout(self.cfg.embed_timeout, self.embedder.embed(&data)).await {
            Ok(Ok(emb)) => {
                debug!(file = %image.filename, dim = emb.len(), "process: embedded");
                Ok(emb)
            }
            Ok(Err(e)) => Err(SkippedImage::new(&image.filename, SkipReason::ExtractionFailed)
                .with_detail(e.to_string())),
            Err(_) => Err(SkippedImage::new(&image.filename, SkipReason::Timeout).with_detail(
                format!("no embedding within {:?}", self.cfg.embed_timeout),
            )),
        }
    }
}
