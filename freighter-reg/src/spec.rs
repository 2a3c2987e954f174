//  SPEC.rs
//    by Lut99
//
//  Created:
//    13 Feb 2023, 10:09:47
//  Last edited:
//    05 Apr 2023, 13:31:28
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the wire shapes of the OCI distribution protocol as far as
//!   freighter needs them: the manifest flavours we can transfer and
//!   the tag list.
//

use serde::Deserialize;

pub use crate::errors::RegistryError as Error;


/***** CONSTANTS *****/
/// The media type of a Docker schema 2 image manifest.
pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
/// The media type of a Docker schema 2 manifest list.
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
/// The media type of a legacy Docker schema 1 manifest.
pub const DOCKER_MANIFEST_LEGACY: &str = "application/vnd.docker.distribution.manifest.v1+json";
/// The media type of a signed legacy Docker schema 1 manifest.
pub const DOCKER_MANIFEST_LEGACY_SIGNED: &str = "application/vnd.docker.distribution.manifest.v1+prettyjws";
/// The media type of an OCI image manifest.
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
/// The media type of an OCI image index.
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// The `Accept` header value with which we ask registries for manifests.
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, application/vnd.docker.distribution.manifest.list.v2+json, application/vnd.oci.image.manifest.v1+json, application/vnd.oci.image.index.v1+json, application/vnd.docker.distribution.manifest.v1+prettyjws, application/vnd.docker.distribution.manifest.v1+json";


/***** TESTS *****/





/***** LIBRARY *****/
/// A reference to another object in a registry, as manifests embed them.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// The media type of the referenced object.
    pub media_type : Option<String>,
    /// The digest under which the object can be fetched.
    pub digest     : String,
    /// The size of the object, in bytes.
    pub size       : Option<u64>,
}

/// A single-platform image manifest (Docker schema 2 or OCI).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    /// The descriptor of the image's config blob.
    pub config : Descriptor,
    /// The descriptors of the image's layer blobs.
    pub layers : Vec<Descriptor>,
}

/// A multi-platform index (Docker manifest list or OCI index).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestIndex {
    /// The descriptors of the per-platform sub-manifests.
    pub manifests : Vec<Descriptor>,
}

/// A legacy Docker schema 1 manifest. Only the layer digests matter to us.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyManifest {
    /// The layer blobs, newest first.
    pub fs_layers : Vec<LegacyLayer>,
}

/// One layer entry of a legacy schema 1 manifest.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyLayer {
    /// The digest of the layer blob.
    pub blob_sum : String,
}



/// The manifest flavours freighter can transfer.
#[derive(Clone, Debug)]
pub enum Manifest {
    /// A single-platform image manifest.
    Image(ImageManifest),
    /// A multi-platform index; its sub-manifests are transferred separately, by digest.
    Index(ManifestIndex),
    /// A legacy schema 1 manifest.
    Legacy(LegacyManifest),
}

impl Manifest {
    /// Parses raw manifest bytes according to their media type.
    ///
    /// # Arguments
    /// - `media_type`: The `Content-Type` under which the registry served the manifest.
    /// - `raw`: The manifest bytes themselves.
    ///
    /// # Returns
    /// The parsed manifest.
    ///
    /// # Errors
    /// This function errors if the media type is one we cannot transfer, or if the bytes do not parse as that type.
    pub fn parse(media_type: &str, raw: &[u8]) -> Result<Self, Error> {
        match media_type {
            DOCKER_MANIFEST | OCI_MANIFEST => match serde_json::from_slice(raw) {
                Ok(manifest) => Ok(Self::Image(manifest)),
                Err(err)     => Err(Error::ManifestParseError{ media_type: media_type.into(), err }),
            },
            DOCKER_MANIFEST_LIST | OCI_INDEX => match serde_json::from_slice(raw) {
                Ok(index) => Ok(Self::Index(index)),
                Err(err)  => Err(Error::ManifestParseError{ media_type: media_type.into(), err }),
            },
            DOCKER_MANIFEST_LEGACY | DOCKER_MANIFEST_LEGACY_SIGNED => match serde_json::from_slice(raw) {
                Ok(legacy) => Ok(Self::Legacy(legacy)),
                Err(err)   => Err(Error::ManifestParseError{ media_type: media_type.into(), err }),
            },
            _ => Err(Error::UnsupportedManifestType{ media_type: media_type.into() }),
        }
    }

    /// Returns the digests (and sizes, where known) of every blob this manifest references directly.
    ///
    /// Note that an index references no blobs itself; its sub-manifests do.
    pub fn blob_digests(&self) -> Vec<(String, Option<u64>)> {
        match self {
            Self::Image(manifest) => {
                let mut digests: Vec<(String, Option<u64>)> = Vec::with_capacity(1 + manifest.layers.len());
                digests.push((manifest.config.digest.clone(), manifest.config.size));
                digests.extend(manifest.layers.iter().map(|l| (l.digest.clone(), l.size)));
                digests
            },
            Self::Index(_)       => vec![],
            Self::Legacy(legacy) => legacy.fs_layers.iter().map(|l| (l.blob_sum.clone(), None)).collect(),
        }
    }
}



/// The body of a registry's `tags/list` response.
#[derive(Clone, Debug, Deserialize)]
pub struct TagList {
    /// The tags themselves. Registries serve `null` for repositories without any.
    pub tags : Option<Vec<String>>,
}
