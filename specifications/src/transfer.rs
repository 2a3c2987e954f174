//  TRANSFER.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 11:40:19
//  Last edited:
//    04 Apr 2023, 11:09:33
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the interface between the transfer engine and the registry
//!   client that does the actual pulling and pushing. The engine only
//!   ever talks to these traits, which is what allows it to be tested
//!   against stub clients.
//

use async_trait::async_trait;

use crate::errors::TransferError;
use crate::reference::{RegistryAuth, RepoRef};


/***** LIBRARY *****/
/// Defines the read-side handle on an image repository: something we can enumerate tags of and pull from.
#[async_trait]
pub trait ImageSource: Send + Sync + 'static {
    /// Returns the full reference of this source (`registry/namespace/repository[:tag]`), for logging and reporting.
    fn reference(&self) -> String;

    /// Lists all tags that the source repository currently serves.
    ///
    /// # Returns
    /// The tags, in whatever order the registry returns them.
    ///
    /// # Errors
    /// This function errors if the registry could not be reached, refused our credentials or returned an ill-formed response.
    async fn list_tags(&self) -> Result<Vec<String>, TransferError>;
}

/// Defines the write-side handle on an image repository: something we can push to.
pub trait ImageTarget: Send + Sync + 'static {
    /// Returns the full reference of this target (`registry/namespace/repository[:tag]`), for logging and reporting.
    fn reference(&self) -> String;
}

/// Defines a single transfer unit: one source tag that has to end up at one target tag.
#[async_trait]
pub trait TransferJob: Send + Sync + 'static {
    /// Returns the reference of the job's source side.
    fn source(&self) -> String;

    /// Returns the reference of the job's target side.
    fn target(&self) -> String;

    /// Performs the transfer.
    ///
    /// # Errors
    /// This function errors if any part of the transfer (manifest pull, blob copies, manifest push) failed. The job itself stays valid, so a failed job may simply be run again.
    async fn run(&self) -> Result<(), TransferError>;
}

/// Defines the factory with which the engine builds sources, targets and jobs.
#[async_trait]
pub trait ImageClient: Send + Sync + 'static {
    /// The type of source handles this client hands out.
    type Source: ImageSource;
    /// The type of target handles this client hands out.
    type Target: ImageTarget;
    /// The type of jobs this client assembles.
    type Job: TransferJob;


    /// Opens a read-side handle on the given image.
    ///
    /// # Arguments
    /// - `image`: The reference of the repository to open.
    /// - `tag`: The concrete tag to bind the handle to. May be empty, in which case the handle is only good for [`ImageSource::list_tags()`].
    /// - `auth`: The credentials with which to access the registry.
    ///
    /// # Errors
    /// This function errors if the handle could not be constructed, e.g., because the registry is unreachable or the credentials are refused.
    async fn open_source(&self, image: &RepoRef, tag: &str, auth: RegistryAuth) -> Result<Self::Source, TransferError>;

    /// Opens a write-side handle on the given image.
    ///
    /// # Arguments
    /// - `image`: The reference of the repository to open.
    /// - `tag`: The concrete tag to bind the handle to.
    /// - `auth`: The credentials with which to access the registry.
    ///
    /// # Errors
    /// This function errors if the handle could not be constructed.
    async fn open_target(&self, image: &RepoRef, tag: &str, auth: RegistryAuth) -> Result<Self::Target, TransferError>;

    /// Combines a source and a target handle into a runnable transfer job.
    fn assemble(&self, source: Self::Source, target: Self::Target) -> Self::Job;
}
