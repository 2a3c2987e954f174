//  CLIENT.rs
//    by Lut99
//
//  Created:
//    14 Feb 2023, 13:50:36
//  Last edited:
//    06 Apr 2023, 10:06:57
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the client factory with which the engine opens image
//!   handles and assembles transfer jobs.
//

use async_trait::async_trait;
use reqwest::Client;

use specifications::errors::TransferError;
use specifications::reference::{RegistryAuth, RepoRef};
use specifications::transfer::ImageClient;

use crate::copy::RegistryJob;
use crate::image::{RegistryImage, Scope};

pub use crate::errors::RegistryError as Error;


/***** LIBRARY *****/
/// Defines the real registry client. All handles it hands out share one HTTP client (and thus one connection pool).
#[derive(Clone, Debug)]
pub struct RegistryClient {
    /// The shared HTTP client.
    client : Client,
}

impl RegistryClient {
    /// Constructor for the RegistryClient.
    ///
    /// # Returns
    /// A new RegistryClient instance.
    ///
    /// # Errors
    /// This function errors if the backing HTTP client could not be built.
    pub fn new() -> Result<Self, Error> {
        match Client::builder().build() {
            Ok(client) => Ok(Self{ client }),
            Err(err)   => Err(Error::ClientBuildError{ err }),
        }
    }
}

#[async_trait]
impl ImageClient for RegistryClient {
    type Source = RegistryImage;
    type Target = RegistryImage;
    type Job    = RegistryJob;

    async fn open_source(&self, image: &RepoRef, tag: &str, auth: RegistryAuth) -> Result<Self::Source, TransferError> {
        RegistryImage::connect(self.client.clone(), image, tag, auth, Scope::Pull).await.map_err(TransferError::new)
    }

    async fn open_target(&self, image: &RepoRef, tag: &str, auth: RegistryAuth) -> Result<Self::Target, TransferError> {
        RegistryImage::connect(self.client.clone(), image, tag, auth, Scope::PullPush).await.map_err(TransferError::new)
    }

    fn assemble(&self, source: Self::Source, target: Self::Target) -> Self::Job {
        RegistryJob::new(source, target)
    }
}
