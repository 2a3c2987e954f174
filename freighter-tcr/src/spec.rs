//  SPEC.rs
//    by Lut99
//
//  Created:
//    20 Feb 2023, 14:22:51
//  Last edited:
//    06 Apr 2023, 11:23:10
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the vendor trait boundaries: what the preset needs from
//!   the source and target registry APIs, without tying it to one
//!   vendor (or to the network at all, which is what makes it
//!   testable).
//

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::errors::VendorError;


/***** LIBRARY *****/
/// Defines what the preset needs from the registry it migrates _from_.
#[async_trait]
pub trait SourceVendor: Send + Sync {
    /// Lists the namespaces that currently exist in the source registry.
    ///
    /// # Errors
    /// This function errors if the vendor API could not be reached or refused the request.
    async fn list_namespaces(&self) -> Result<Vec<String>, VendorError>;

    /// Generates the transfer rules for every repository in the source registry, excluding the given namespaces.
    ///
    /// # Arguments
    /// - `skip`: The namespaces to exclude (because they could not be created at the target).
    ///
    /// # Returns
    /// A map of _target_ references to _source_ references; i.e., the seed map for an inverted engine run.
    ///
    /// # Errors
    /// This function errors if the vendor API could not be reached or refused the request.
    async fn generate_rules(&self, skip: &HashSet<String>) -> Result<HashMap<String, String>, VendorError>;
}

/// Defines what the preset needs from the registry it migrates _to_.
#[async_trait]
pub trait TargetVendor: Send + Sync {
    /// Lists the namespaces that currently exist in the target registry.
    ///
    /// # Errors
    /// This function errors if the vendor API could not be reached or refused the request.
    async fn list_namespaces(&self) -> Result<Vec<String>, VendorError>;

    /// Creates the given namespace in the target registry.
    ///
    /// # Arguments
    /// - `name`: The name of the namespace to create.
    ///
    /// # Errors
    /// This function errors if the namespace could not be created. The preset collects these failures and retries them; it does not abort on them.
    async fn create_namespace(&self, name: &str) -> Result<(), VendorError>;
}
