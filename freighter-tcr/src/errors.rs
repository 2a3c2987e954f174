//  ERRORS.rs
//    by Lut99
//
//  Created:
//    20 Feb 2023, 14:16:08
//  Last edited:
//    06 Apr 2023, 11:19:25
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines errors that occur in the `freighter-tcr` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};


/***** LIBRARY *****/
/// Carries any error that crosses the vendor trait boundary.
///
/// The same construction as [`specifications::errors::TransferError`]: vendor implementations raise their own error types, and this type erases them so the preset (and its test stubs) can treat them uniformly.
#[derive(Debug)]
pub struct VendorError {
    /// The underlying error raised by the vendor implementation.
    err : Box<dyn Error + Send + Sync>,
}

impl VendorError {
    /// Constructor for the VendorError that wraps the given vendor error.
    ///
    /// # Arguments
    /// - `err`: The implementation-specific error to erase.
    ///
    /// # Returns
    /// A new VendorError instance.
    #[inline]
    pub fn new(err: impl Error + Send + Sync + 'static) -> Self {
        Self {
            err : Box::new(err),
        }
    }
}

impl Display for VendorError {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}", self.err)
    }
}

impl Error for VendorError {
    #[inline]
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.err.as_ref())
    }
}



/// Defines errors that may occur when calling the vendor's cloud API.
#[derive(Debug)]
pub enum ApiError {
    /// Could not send the request for the given action.
    RequestError{ action: String, err: reqwest::Error },
    /// Could not download the body of the API's response.
    ResponseBodyError{ action: String, err: reqwest::Error },
    /// Could not parse the API's response as the expected JSON.
    ResponseJsonParseError{ action: String, raw: String, err: serde_json::Error },
    /// The API's response did not carry the `Response` envelope.
    MissingResponse{ action: String },
    /// The API processed the request but reported an error of its own.
    ApiFailure{ action: String, code: String, message: String },
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ApiError::*;
        match self {
            RequestError{ action, err }               => write!(f, "Could not send '{}' request: {}", action, err),
            ResponseBodyError{ action, err }          => write!(f, "Could not download response body of '{}': {}", action, err),
            ResponseJsonParseError{ action, err, .. } => write!(f, "Could not parse response of '{}' as JSON: {}", action, err),
            MissingResponse{ action }                 => write!(f, "Response of '{}' does not carry a response envelope", action),
            ApiFailure{ action, code, message }       => write!(f, "API refused '{}' with code '{}': {}", action, code, message),
        }
    }
}

impl Error for ApiError {}



/// Defines the (fatal) errors that may occur while running the migration preset.
///
/// Note that failing to create individual namespaces is _not_ among these; those namespaces are retried, then skipped and reported.
#[derive(Debug)]
pub enum PresetError {
    /// Could not enumerate the source registry's namespaces.
    ListSourceNamespacesError{ err: VendorError },
    /// Could not enumerate the target registry's namespaces.
    ListTargetNamespacesError{ err: VendorError },
    /// Could not generate the transfer rules.
    GenerateRulesError{ err: VendorError },
}

impl Display for PresetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use PresetError::*;
        match self {
            ListSourceNamespacesError{ err } => write!(f, "Could not enumerate source registry namespaces: {}", err),
            ListTargetNamespacesError{ err } => write!(f, "Could not enumerate target registry namespaces: {}", err),
            GenerateRulesError{ err }        => write!(f, "Could not generate transfer rules: {}", err),
        }
    }
}

impl Error for PresetError {}
