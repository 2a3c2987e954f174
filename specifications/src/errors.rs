//  ERRORS.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 10:11:02
//  Last edited:
//    21 Mar 2023, 09:15:31
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines errors that occur in the `specifications` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};


/***** LIBRARY *****/
/// Defines errors that may occur when parsing an image reference into a [`crate::reference::RepoRef`].
#[derive(Debug)]
pub enum ReferenceParseError {
    /// The given reference was the empty string.
    EmptyReference,
    /// The given reference did not have enough segments to name a registry and a repository.
    MissingSegments{ raw: String },
    /// The registry segment of the reference turned out empty.
    EmptyRegistry{ raw: String },
    /// The repository segment of the reference turned out empty.
    EmptyRepository{ raw: String },
}

impl Display for ReferenceParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ReferenceParseError::*;
        match self {
            EmptyReference          => write!(f, "Cannot parse an empty image reference"),
            MissingSegments{ raw }  => write!(f, "Image reference '{}' should at least name a registry and a repository (i.e., 'registry/repository')", raw),
            EmptyRegistry{ raw }    => write!(f, "Image reference '{}' has an empty registry segment", raw),
            EmptyRepository{ raw }  => write!(f, "Image reference '{}' has an empty repository segment", raw),
        }
    }
}

impl Error for ReferenceParseError {}



/// Carries any error that crosses the [`crate::transfer`] trait boundary.
///
/// Client implementations raise their own error types; this type erases them so that the engine
/// (and any stub used to test it) can treat all client failures uniformly.
#[derive(Debug)]
pub struct TransferError {
    /// The underlying error raised by the client implementation.
    err : Box<dyn Error + Send + Sync>,
}

impl TransferError {
    /// Constructor for the TransferError that wraps the given client error.
    ///
    /// # Arguments
    /// - `err`: The implementation-specific error to erase.
    ///
    /// # Returns
    /// A new TransferError instance.
    #[inline]
    pub fn new(err: impl Error + Send + Sync + 'static) -> Self {
        Self {
            err : Box::new(err),
        }
    }
}

impl Display for TransferError {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}", self.err)
    }
}

impl Error for TransferError {
    #[inline]
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.err.as_ref())
    }
}
