//  ERRORS.rs
//    by Lut99
//
//  Created:
//    07 Feb 2023, 09:41:55
//  Last edited:
//    21 Mar 2023, 09:30:02
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines errors that occur in the `freighter-cfg` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;


/***** LIBRARY *****/
/// Defines errors that may occur when loading a transfer plan file.
#[derive(Debug)]
pub enum TransferPlanError {
    /// Could not open the target file.
    FileOpenError{ path: PathBuf, err: std::io::Error },
    /// Could not parse the target file as YAML.
    FileParseError{ path: PathBuf, err: serde_yaml::Error },
}

impl Display for TransferPlanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use TransferPlanError::*;
        match self {
            FileOpenError{ path, err }  => write!(f, "Could not open transfer plan file '{}': {}", path.display(), err),
            FileParseError{ path, err } => write!(f, "Could not read & parse transfer plan file '{}': {}", path.display(), err),
        }
    }
}

impl Error for TransferPlanError {}
