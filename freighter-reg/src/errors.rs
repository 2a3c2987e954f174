//  ERRORS.rs
//    by Lut99
//
//  Created:
//    13 Feb 2023, 10:01:18
//  Last edited:
//    05 Apr 2023, 13:24:40
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines errors that occur in the `freighter-reg` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use reqwest::StatusCode;


/***** LIBRARY *****/
/// Defines errors that may occur when talking to an image registry.
#[derive(Debug)]
pub enum RegistryError {
    /// Could not build the HTTP client itself.
    ClientBuildError{ err: reqwest::Error },

    /// Could not send a request to the given address.
    RequestError{ address: String, err: reqwest::Error },
    /// The registry answered with a non-success status code.
    ResponseError{ address: String, status: StatusCode },
    /// Could not download the body of the registry's response.
    ResponseBodyError{ address: String, err: reqwest::Error },
    /// Could not parse the registry's response as the expected JSON.
    ResponseJsonParseError{ address: String, raw: String, err: serde_json::Error },

    /// The registry requires authentication but we have no way of providing it.
    NotAuthenticated{ registry: String },
    /// The token endpoint's response did not carry a token.
    MissingToken{ address: String },
    /// The registry did not tell us where to upload a blob.
    MissingUploadLocation{ address: String },

    /// Could not parse a downloaded manifest.
    ManifestParseError{ media_type: String, err: serde_json::Error },
    /// The manifest is of a type we cannot transfer.
    UnsupportedManifestType{ media_type: String },
    /// A downloaded blob did not hash to the digest it was advertised under.
    BlobDigestMismatch{ digest: String, got: String },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use RegistryError::*;
        match self {
            ClientBuildError{ err }                   => write!(f, "Could not build the HTTP client: {}", err),

            RequestError{ address, err }              => write!(f, "Could not send request to '{}': {}", address, err),
            ResponseError{ address, status }          => write!(f, "Registry at '{}' answered with status {} ({})", address, status.as_u16(), status.canonical_reason().unwrap_or("unknown")),
            ResponseBodyError{ address, err }         => write!(f, "Could not download response body from '{}': {}", address, err),
            ResponseJsonParseError{ address, err, .. } => write!(f, "Could not parse response from '{}' as JSON: {}", address, err),

            NotAuthenticated{ registry }              => write!(f, "Registry '{}' requires authentication, but no credentials are configured for it", registry),
            MissingToken{ address }                   => write!(f, "Token endpoint '{}' answered without a token", address),
            MissingUploadLocation{ address }          => write!(f, "Registry at '{}' started a blob upload without telling us its location", address),

            ManifestParseError{ media_type, err }     => write!(f, "Could not parse manifest of type '{}': {}", media_type, err),
            UnsupportedManifestType{ media_type }     => write!(f, "Cannot transfer manifest of unsupported type '{}'", media_type),
            BlobDigestMismatch{ digest, got }         => write!(f, "Blob advertised as '{}' hashed to '{}' instead", digest, got),
        }
    }
}

impl Error for RegistryError {}
