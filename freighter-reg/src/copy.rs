//  COPY.rs
//    by Lut99
//
//  Created:
//    14 Feb 2023, 11:28:54
//  Last edited:
//    06 Apr 2023, 10:02:23
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the transfer job itself: the pipeline that moves one
//!   tag from its source repository to its target repository, manifest
//!   and blobs.
//

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::debug;
use parking_lot::Mutex;
use reqwest::Body;
use sha2::{Digest, Sha256};

use specifications::errors::TransferError;
use specifications::transfer::TransferJob;

use crate::image::RegistryImage;
use crate::spec::Manifest;

pub use crate::errors::RegistryError as Error;


/***** LIBRARY *****/
/// Defines one concrete transfer: one source tag that has to end up at one target tag.
#[derive(Debug)]
pub struct RegistryJob {
    /// The handle to pull from.
    source : RegistryImage,
    /// The handle to push to.
    target : RegistryImage,
}

impl RegistryJob {
    /// Constructor for the RegistryJob.
    ///
    /// # Arguments
    /// - `source`: The handle to pull from. Must be pinned to a tag.
    /// - `target`: The handle to push to. Must be pinned to a tag.
    ///
    /// # Returns
    /// A new RegistryJob instance.
    #[inline]
    pub fn new(source: RegistryImage, target: RegistryImage) -> Self {
        Self {
            source,
            target,
        }
    }



    /// Performs the transfer: pull the manifest, copy every blob it references that the target misses, then push the manifest.
    ///
    /// For a multi-platform index, every referenced sub-manifest is transferred first (by digest), then the index itself is pushed under the target tag.
    async fn transfer(&self) -> Result<(), Error> {
        debug!("Pulling manifest of '{}'...", self.source.full_reference());
        let (raw, media_type): (Vec<u8>, String) = self.source.pull_manifest(self.source.tag()).await?;
        let manifest: Manifest = Manifest::parse(&media_type, &raw)?;

        match &manifest {
            Manifest::Index(index) => {
                debug!("'{}' is a multi-platform index with {} sub-manifest(s)", self.source.full_reference(), index.manifests.len());
                for child in &index.manifests {
                    let (child_raw, child_type): (Vec<u8>, String) = self.source.pull_manifest(&child.digest).await?;
                    let child_manifest: Manifest = Manifest::parse(&child_type, &child_raw)?;
                    self.copy_blobs(&child_manifest).await?;
                    self.target.push_manifest(&child.digest, &child_type, child_raw).await?;
                }
            },
            manifest => self.copy_blobs(manifest).await?,
        }

        debug!("Pushing manifest to '{}'...", self.target.full_reference());
        self.target.push_manifest(self.target.tag(), &media_type, raw).await
    }

    /// Copies every blob the given manifest references that the target does not already store.
    async fn copy_blobs(&self, manifest: &Manifest) -> Result<(), Error> {
        for (digest, size) in manifest.blob_digests() {
            if self.target.has_blob(&digest).await? {
                debug!("Blob '{}' already present at '{}', skipping", digest, self.target.full_reference());
                continue;
            }
            self.copy_blob(&digest, size).await?;
        }
        Ok(())
    }

    /// Streams one blob from the source into the target, hashing it on the way through.
    async fn copy_blob(&self, digest: &str, size: Option<u64>) -> Result<(), Error> {
        debug!("Copying blob '{}' ({} bytes)...", digest, size.map(|s| s.to_string()).unwrap_or_else(|| "?".into()));
        let res: reqwest::Response = self.source.pull_blob(digest).await?;

        // The blob is not buffered: the download stream becomes the upload body, with a hasher watching the bytes go by
        let hasher: Arc<Mutex<Sha256>> = Arc::new(Mutex::new(Sha256::new()));
        let watcher: Arc<Mutex<Sha256>> = hasher.clone();
        let stream = res.bytes_stream().inspect_ok(move |chunk| watcher.lock().update(chunk));
        self.target.push_blob(digest, Body::wrap_stream(stream), size).await?;

        // The registry verifies the digest on its side too, but a mismatch here means the source fed us a corrupt blob
        let result: String = format!("sha256:{}", hex::encode(hasher.lock().finalize_reset()));
        if digest.starts_with("sha256:") && result != digest {
            return Err(Error::BlobDigestMismatch{ digest: digest.into(), got: result });
        }
        Ok(())
    }
}

#[async_trait]
impl TransferJob for RegistryJob {
    #[inline]
    fn source(&self) -> String { self.source.full_reference() }

    #[inline]
    fn target(&self) -> String { self.target.full_reference() }

    async fn run(&self) -> Result<(), TransferError> {
        self.transfer().await.map_err(TransferError::new)
    }
}
