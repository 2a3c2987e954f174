//  PLAN.rs
//    by Lut99
//
//  Created:
//    07 Feb 2023, 09:48:33
//  Last edited:
//    04 Apr 2023, 13:51:06
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the transfer plan file: which images to copy where, with
//!   which credentials, and the knobs of the pipeline that does the
//!   copying.
//

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use specifications::reference::RegistryAuth;

pub use crate::errors::TransferPlanError as Error;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"
images:
  "registry.example.com/library/ubuntu:22.04": "registry.other.com/mirror/ubuntu:22.04"

auth:
  "registry.example.com":
    username: alice
    password: hunter2
  "registry.example.com/private":
    username: bob
    password: secret
    insecure: true

routine_nums: 3
default_registry: registry.other.com
default_namespace: mirror
"#;

    /// Test that a plan parses with partial keys and sane defaults
    #[test]
    fn plan_parse() {
        let plan: TransferPlan = serde_yaml::from_str(PLAN).unwrap();
        assert_eq!(plan.images.len(), 1);
        assert_eq!(plan.routine_nums, 3);
        assert_eq!(plan.retry_nums, 2);
        assert_eq!(plan.default_registry, "registry.other.com");
        assert_eq!(plan.default_namespace, "mirror");
        assert!(plan.has_default_target());
    }

    /// Test that the most specific auth entry wins
    #[test]
    fn plan_auth_lookup() {
        let plan: TransferPlan = serde_yaml::from_str(PLAN).unwrap();

        // Namespace-level beats registry-level
        let auth: RegistryAuth = plan.auth_for("registry.example.com", "private");
        assert_eq!(auth.username, "bob");
        assert!(auth.insecure);

        // Registry-level catches everything else
        let auth: RegistryAuth = plan.auth_for("registry.example.com", "library");
        assert_eq!(auth.username, "alice");
        assert!(!auth.insecure);

        // Unknown registries are anonymous
        let auth: RegistryAuth = plan.auth_for("registry.unknown.com", "library");
        assert!(auth.is_anonymous());
        assert!(!auth.insecure);
    }
}





/***** HELPER FUNCTIONS *****/
/// Returns the default number of workers per pool.
#[inline]
fn default_routine_nums() -> usize { 5 }

/// Returns the default number of retry rounds.
#[inline]
fn default_retry_nums() -> usize { 2 }





/***** LIBRARY *****/
/// Defines the transfer plan file.
///
/// Note that this struct is designed to act as a "handle"; i.e., keep it only around when using it but otherwise refer to it only by path.
#[derive(Clone, Debug, Deserialize)]
pub struct TransferPlan {
    /// The seed rules: a map of source references to target references. A target may be left empty to fall back to `default_registry`/`default_namespace`.
    #[serde(default)]
    pub images            : HashMap<String, String>,
    /// The credentials per registry or per `registry/namespace`. Anything not listed here is accessed anonymously.
    #[serde(default)]
    pub auth              : HashMap<String, RegistryAuth>,

    /// The number of workers to spawn in each of the two pipeline pools.
    #[serde(default = "default_routine_nums")]
    pub routine_nums      : usize,
    /// The maximum number of retry rounds over the failure queues.
    #[serde(default = "default_retry_nums")]
    pub retry_nums        : usize,

    /// The registry to synthesise a target from when a rule has none.
    #[serde(default)]
    pub default_registry  : String,
    /// The namespace to synthesise a target from when a rule has none.
    #[serde(default)]
    pub default_namespace : String,
}

impl TransferPlan {
    /// Creates a new TransferPlan by loading it from the given path.
    ///
    /// # Arguments
    /// - `path`: The path to load the TransferPlan from.
    ///
    /// # Returns
    /// A new TransferPlan instance.
    ///
    /// # Errors
    /// This function may error if the TransferPlan was missing, unreadable or incorrectly formatted.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path: &Path = path.as_ref();
        debug!("Loading transfer plan from '{}'...", path.display());

        // Open the file
        let handle: File = match File::open(path) {
            Ok(handle) => handle,
            Err(err)   => { return Err(Error::FileOpenError{ path: path.into(), err }); },
        };

        // Read it with serde
        match serde_yaml::from_reader(handle) {
            Ok(result) => Ok(result),
            Err(err)   => Err(Error::FileParseError{ path: path.into(), err }),
        }
    }



    /// Resolves the credentials for the given registry and namespace.
    ///
    /// The most specific entry wins: `registry/namespace` is tried before the bare `registry`. If neither is present, the anonymous credentials are returned.
    ///
    /// # Arguments
    /// - `registry`: The registry to find credentials for.
    /// - `namespace`: The namespace within that registry. May be empty.
    ///
    /// # Returns
    /// The credentials to use for this registry/namespace pair.
    pub fn auth_for(&self, registry: &str, namespace: &str) -> RegistryAuth {
        if !namespace.is_empty() {
            if let Some(auth) = self.auth.get(&format!("{}/{}", registry, namespace)) { return auth.clone(); }
        }
        if let Some(auth) = self.auth.get(registry) { return auth.clone(); }
        RegistryAuth::default()
    }

    /// Returns whether this plan can synthesise a target for a rule that has none (i.e., whether both the default registry and the default namespace are set).
    #[inline]
    pub fn has_default_target(&self) -> bool { !self.default_registry.is_empty() && !self.default_namespace.is_empty() }
}
