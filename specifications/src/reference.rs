//  REFERENCE.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 10:17:26
//  Last edited:
//    04 Apr 2023, 11:02:58
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the parsed form of an image reference
//!   (`registry/namespace/repository[:tag]`), together with the
//!   credentials used to access the registry that hosts it.
//

use std::fmt::{Display, Formatter, Result as FResult};
use std::str::FromStr;

use serde::Deserialize;

pub use crate::errors::ReferenceParseError as Error;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    /// Test the full, three-segment form of a reference
    #[test]
    fn reporef_full() {
        let r: RepoRef = RepoRef::from_str("registry.example.com/library/ubuntu:22.04").unwrap();
        assert_eq!(r.registry, "registry.example.com");
        assert_eq!(r.namespace, "library");
        assert_eq!(r.repository, "ubuntu");
        assert_eq!(r.tag, "22.04");

        assert_eq!(r.repo_with_namespace(), "library/ubuntu");
        assert_eq!(r.url_without_tag(), "registry.example.com/library/ubuntu");
        assert_eq!(r.repo_with_tag(), "library/ubuntu:22.04");
        assert_eq!(r.to_string(), "registry.example.com/library/ubuntu:22.04");
    }

    /// Test that the namespace may be omitted or nested
    #[test]
    fn reporef_namespaces() {
        let r: RepoRef = RepoRef::from_str("registry.example.com/ubuntu").unwrap();
        assert_eq!(r.namespace, "");
        assert_eq!(r.repository, "ubuntu");
        assert_eq!(r.repo_with_namespace(), "ubuntu");
        assert_eq!(r.url_without_tag(), "registry.example.com/ubuntu");

        let r: RepoRef = RepoRef::from_str("registry.example.com/it/is/nested:v1").unwrap();
        assert_eq!(r.namespace, "it/is");
        assert_eq!(r.repository, "nested");
        assert_eq!(r.repo_with_tag(), "it/is/nested:v1");
    }

    /// Test that a registry port is not mistaken for a tag
    #[test]
    fn reporef_registry_port() {
        let r: RepoRef = RepoRef::from_str("localhost:5000/library/ubuntu").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.tag, "");

        let r: RepoRef = RepoRef::from_str("localhost:5000/library/ubuntu:v1").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.tag, "v1");
    }

    /// Test that an empty tag means all tags and a comma list is kept verbatim
    #[test]
    fn reporef_tags() {
        let r: RepoRef = RepoRef::from_str("r/ns/repo").unwrap();
        assert!(r.is_all_tags());
        assert!(!r.is_tag_list());

        let r: RepoRef = RepoRef::from_str("r/ns/repo:v1,v2,v3").unwrap();
        assert!(!r.is_all_tags());
        assert!(r.is_tag_list());
        assert_eq!(r.tag, "v1,v2,v3");
    }

    /// Test the rejected shapes
    #[test]
    fn reporef_illegal() {
        assert!(matches!(RepoRef::from_str(""), Err(Error::EmptyReference)));
        assert!(matches!(RepoRef::from_str("ubuntu"), Err(Error::MissingSegments{ .. })));
        assert!(matches!(RepoRef::from_str("ubuntu:v1"), Err(Error::MissingSegments{ .. })));
        assert!(matches!(RepoRef::from_str("/ubuntu"), Err(Error::EmptyRegistry{ .. })));
        assert!(matches!(RepoRef::from_str("registry.example.com/:v1"), Err(Error::EmptyRepository{ .. })));
    }
}





/***** LIBRARY *****/
/// Specifies a parsed image reference: which registry hosts it, under which namespace, which repository it is and (optionally) which tag(s) of it we mean.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RepoRef {
    /// The registry hosting the image (possibly with a port).
    pub registry   : String,
    /// The namespace under which the repository lives. May be empty, or nested (`a/b`).
    pub namespace  : String,
    /// The repository itself.
    pub repository : String,
    /// The tag part. May be empty (meaning: all tags of the repository), a single tag or a comma-separated list of tags.
    pub tag        : String,
}

impl RepoRef {
    /// Returns the repository prefixed with its namespace (if any), i.e., `namespace/repository`.
    #[inline]
    pub fn repo_with_namespace(&self) -> String {
        if self.namespace.is_empty() { self.repository.clone() } else { format!("{}/{}", self.namespace, self.repository) }
    }

    /// Returns the full reference without any tag, i.e., `registry/namespace/repository`.
    #[inline]
    pub fn url_without_tag(&self) -> String { format!("{}/{}", self.registry, self.repo_with_namespace()) }

    /// Returns the in-registry part of the reference with the tag re-attached, i.e., `namespace/repository[:tag]`.
    #[inline]
    pub fn repo_with_tag(&self) -> String {
        format!("{}{}", self.repo_with_namespace(), if !self.tag.is_empty() { format!(":{}", self.tag) } else { String::new() })
    }

    /// Returns whether this reference means all tags of the repository (i.e., carries no tag at all).
    #[inline]
    pub fn is_all_tags(&self) -> bool { self.tag.is_empty() }

    /// Returns whether the tag part is a comma-separated list of tags.
    #[inline]
    pub fn is_tag_list(&self) -> bool { self.tag.contains(',') }
}

impl Display for RepoRef {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}/{}", self.registry, self.repo_with_tag())
    }
}

impl FromStr for RepoRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() { return Err(Error::EmptyReference); }

        // Split the tag off of the final path segment; a colon _before_ the last slash belongs to the registry's port, not to a tag.
        let last_slash: usize = match s.rfind('/') {
            Some(pos) => pos,
            None      => { return Err(Error::MissingSegments{ raw: s.into() }); },
        };
        let (rest, tag): (&str, &str) = match s[last_slash + 1..].find(':') {
            Some(pos) => (&s[..last_slash + 1 + pos], &s[last_slash + 1 + pos + 1..]),
            None      => (s, ""),
        };

        // The first segment is the registry, the last the repository and anything in between the namespace.
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.len() < 2 { return Err(Error::MissingSegments{ raw: s.into() }); }
        let registry   : &str   = segments[0];
        let repository : &str   = segments[segments.len() - 1];
        let namespace  : String = segments[1..segments.len() - 1].join("/");
        if registry.is_empty() { return Err(Error::EmptyRegistry{ raw: s.into() }); }
        if repository.is_empty() { return Err(Error::EmptyRepository{ raw: s.into() }); }

        // Done, return the reference
        Ok(Self {
            registry   : registry.into(),
            namespace,
            repository : repository.into(),
            tag        : tag.into(),
        })
    }
}



/// Specifies the credentials with which to access a particular registry (or a particular namespace within it).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegistryAuth {
    /// The username to present to the registry.
    #[serde(default)]
    pub username : String,
    /// The password (or access token) to present to the registry.
    #[serde(default)]
    pub password : String,
    /// Whether to talk plain HTTP to this registry instead of HTTPS.
    #[serde(default)]
    pub insecure : bool,
}

impl RegistryAuth {
    /// Returns whether these credentials are the anonymous ones (i.e., both the username and the password are empty).
    #[inline]
    pub fn is_anonymous(&self) -> bool { self.username.is_empty() && self.password.is_empty() }
}
