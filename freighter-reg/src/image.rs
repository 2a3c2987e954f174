//  IMAGE.rs
//    by Lut99
//
//  Created:
//    13 Feb 2023, 10:36:05
//  Last edited:
//    06 Apr 2023, 09:44:12
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the per-image registry handle: one authenticated view
//!   on one repository (optionally pinned to one tag), with the raw
//!   distribution-protocol operations the transfer needs.
//

use async_trait::async_trait;
use log::debug;
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, LINK, LOCATION, WWW_AUTHENTICATE};
use serde::Deserialize;
use tokio::sync::Mutex;

use specifications::errors::TransferError;
use specifications::reference::{RegistryAuth, RepoRef};
use specifications::transfer::{ImageSource, ImageTarget};

use crate::spec::{TagList, MANIFEST_ACCEPT};

pub use crate::errors::RegistryError as Error;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    /// Test that a Docker Hub-style challenge parses
    #[test]
    fn challenge_dockerhub() {
        let (realm, service): (String, String) = parse_bearer_challenge(r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io""#).unwrap();
        assert_eq!(realm, "https://auth.docker.io/token");
        assert_eq!(service, "registry.docker.io");
    }

    /// Test that non-Bearer challenges are ignored
    #[test]
    fn challenge_basic() {
        assert!(parse_bearer_challenge(r#"Basic realm="Registry Realm""#).is_none());
    }

    /// Test the next-page extraction from a `Link` header
    #[test]
    fn link_next_page() {
        let mut headers: HeaderMap = HeaderMap::new();
        headers.insert(LINK, r#"</v2/library/ubuntu/tags/list?last=v9&n=100>; rel="next""#.parse().unwrap());
        assert_eq!(parse_next_link(&headers), Some("/v2/library/ubuntu/tags/list?last=v9&n=100".into()));

        let headers: HeaderMap = HeaderMap::new();
        assert_eq!(parse_next_link(&headers), None);
    }
}





/***** HELPER STRUCTS *****/
/// The body of a token endpoint's response. Some endpoints call the field `token`, others `access_token`.
#[derive(Clone, Debug, Deserialize)]
struct TokenResponse {
    /// The token under its usual name.
    token        : Option<String>,
    /// The token under its OAuth2 name.
    access_token : Option<String>,
}

/// The registry actions a handle needs to be authorized for.
#[derive(Clone, Copy, Debug)]
pub enum Scope {
    /// Read-only access (sources).
    Pull,
    /// Read/write access (targets).
    PullPush,
}

impl Scope {
    /// Returns the scope's actions as they appear in a token request.
    #[inline]
    fn actions(&self) -> &'static str {
        match self {
            Self::Pull     => "pull",
            Self::PullPush => "pull,push",
        }
    }
}





/***** HELPER FUNCTIONS *****/
/// Parses a `WWW-Authenticate` Bearer challenge into its realm and service.
///
/// # Arguments
/// - `header`: The raw header value.
///
/// # Returns
/// The `(realm, service)` pair, or `None` if this is not a (well-formed) Bearer challenge.
fn parse_bearer_challenge(header: &str) -> Option<(String, String)> {
    let rest: &str = header.trim().strip_prefix("Bearer ")?;

    let mut realm   : Option<String> = None;
    let mut service : String         = String::new();
    for part in rest.split(',') {
        let (key, value): (&str, &str) = part.trim().split_once('=')?;
        let value: &str = value.trim_matches('"');
        match key {
            "realm"   => { realm = Some(value.into()); },
            "service" => { service = value.into(); },
            _         => {},
        }
    }
    realm.map(|realm| (realm, service))
}

/// Extracts the URL of the next page from a paginated response's `Link` header, if any.
fn parse_next_link(headers: &HeaderMap) -> Option<String> {
    let link: &str = headers.get(LINK)?.to_str().ok()?;
    for part in link.split(',') {
        let part: &str = part.trim();
        if !part.contains(r#"rel="next""#) { continue; }
        let start: usize = part.find('<')?;
        let end: usize = part.find('>')?;
        if start + 1 < end { return Some(part[start + 1..end].into()); }
    }
    None
}





/***** LIBRARY *****/
/// Defines one authenticated handle on one repository in one registry.
///
/// The same type serves as the source and as the target side of a transfer; only the requested scope differs.
#[derive(Debug)]
pub struct RegistryImage {
    /// The HTTP client all requests go through.
    client   : Client,
    /// The scheme with which to talk to the registry (`https`, or `http` for registries marked insecure).
    scheme   : &'static str,
    /// The registry host (possibly with port).
    registry : String,
    /// The repository, including its namespace.
    name     : String,
    /// The tag this handle is pinned to. May be empty for handles that only list tags.
    tag      : String,
    /// The credentials for this registry.
    auth     : RegistryAuth,
    /// The scope we authenticate for.
    scope    : Scope,
    /// The cached Bearer token, once the registry has challenged us for one.
    token    : Mutex<Option<String>>,
}

impl RegistryImage {
    /// Connects a new handle to its registry.
    ///
    /// This pings the registry's `/v2/` endpoint and performs the token dance if the registry asks for it, so a handle that constructs successfully is known to be reachable and authorized.
    ///
    /// # Arguments
    /// - `client`: The HTTP client to send requests through.
    /// - `image`: The reference of the repository to open.
    /// - `tag`: The tag to pin the handle to. May be empty for list-only handles.
    /// - `auth`: The credentials for this registry.
    /// - `scope`: Whether this handle needs pull or pull/push access.
    ///
    /// # Returns
    /// A new RegistryImage instance.
    ///
    /// # Errors
    /// This function errors if the registry is unreachable, or if it requires authentication we cannot provide.
    pub async fn connect(client: Client, image: &RepoRef, tag: &str, auth: RegistryAuth, scope: Scope) -> Result<Self, Error> {
        let this: Self = Self {
            client,
            scheme   : if auth.insecure { "http" } else { "https" },
            registry : image.registry.clone(),
            name     : image.repo_with_namespace(),
            tag      : tag.into(),
            auth,
            scope,
            token    : Mutex::new(None),
        };
        this.authenticate().await?;
        Ok(this)
    }

    /// Pings the registry and, if it challenges us, fetches a Bearer token for this handle's repository and scope.
    async fn authenticate(&self) -> Result<(), Error> {
        let address: String = format!("{}://{}/v2/", self.scheme, self.registry);
        let mut req: RequestBuilder = self.client.get(&address);
        if !self.auth.is_anonymous() { req = req.basic_auth(&self.auth.username, Some(&self.auth.password)); }
        let res: Response = match req.send().await {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ address, err }); },
        };

        // Anything but a 401 means our current credentials (or lack thereof) are good enough
        if res.status() != StatusCode::UNAUTHORIZED { return Ok(()); }

        // Examine the challenge
        let challenge: Option<(String, String)> = res.headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer_challenge);
        match challenge {
            Some((realm, service)) => {
                let token: String = self.fetch_token(&realm, &service).await?;
                *self.token.lock().await = Some(token);
                Ok(())
            },
            // A 401 without a Bearer challenge means Basic-only; if we sent credentials already, keep sending them, otherwise there is nothing we can do
            None => {
                if self.auth.is_anonymous() { Err(Error::NotAuthenticated{ registry: self.registry.clone() }) } else { Ok(()) }
            },
        }
    }

    /// Fetches a Bearer token from the given realm for this handle's repository and scope.
    async fn fetch_token(&self, realm: &str, service: &str) -> Result<String, Error> {
        let address: String = format!("{}?service={}&scope=repository:{}:{}", realm, service, self.name, self.scope.actions());
        debug!("Fetching token from '{}'...", address);

        let mut req: RequestBuilder = self.client.get(&address);
        if !self.auth.is_anonymous() { req = req.basic_auth(&self.auth.username, Some(&self.auth.password)); }
        let res: Response = match req.send().await {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ address, err }); },
        };
        if !res.status().is_success() { return Err(Error::ResponseError{ address, status: res.status() }); }

        let raw: String = match res.text().await {
            Ok(raw)  => raw,
            Err(err) => { return Err(Error::ResponseBodyError{ address, err }); },
        };
        let token: TokenResponse = match serde_json::from_str(&raw) {
            Ok(token) => token,
            Err(err)  => { return Err(Error::ResponseJsonParseError{ address, raw, err }); },
        };
        match token.token.or(token.access_token) {
            Some(token) => Ok(token),
            None        => Err(Error::MissingToken{ address }),
        }
    }



    /// Returns the URL of the given path under this handle's repository.
    #[inline]
    fn url(&self, path: impl AsRef<str>) -> String { format!("{}://{}/v2/{}/{}", self.scheme, self.registry, self.name, path.as_ref()) }

    /// Builds a request with this handle's credentials attached.
    async fn request(&self, method: Method, address: &str) -> RequestBuilder {
        let req: RequestBuilder = self.client.request(method, address);
        match self.token.lock().await.as_ref() {
            Some(token) => req.bearer_auth(token),
            None        => if !self.auth.is_anonymous() { req.basic_auth(&self.auth.username, Some(&self.auth.password)) } else { req },
        }
    }



    /// Returns the full reference of this handle, for logging and reporting.
    #[inline]
    pub fn full_reference(&self) -> String {
        format!("{}/{}{}", self.registry, self.name, if !self.tag.is_empty() { format!(":{}", self.tag) } else { String::new() })
    }

    /// Returns the tag this handle is pinned to.
    #[inline]
    pub fn tag(&self) -> &str { &self.tag }



    /// Lists all tags of this handle's repository, following pagination.
    ///
    /// # Returns
    /// The tags, in registry order.
    ///
    /// # Errors
    /// This function errors if any page could not be fetched or parsed.
    pub async fn tags(&self) -> Result<Vec<String>, Error> {
        let mut tags: Vec<String> = Vec::new();
        let mut address: String = self.url("tags/list");
        loop {
            let res: Response = match self.request(Method::GET, &address).await.send().await {
                Ok(res)  => res,
                Err(err) => { return Err(Error::RequestError{ address, err }); },
            };
            if !res.status().is_success() { return Err(Error::ResponseError{ address, status: res.status() }); }
            let next: Option<String> = parse_next_link(res.headers());

            let raw: String = match res.text().await {
                Ok(raw)  => raw,
                Err(err) => { return Err(Error::ResponseBodyError{ address, err }); },
            };
            let list: TagList = match serde_json::from_str(&raw) {
                Ok(list) => list,
                Err(err) => { return Err(Error::ResponseJsonParseError{ address, raw, err }); },
            };
            tags.extend(list.tags.unwrap_or_default());

            match next {
                Some(link) => { address = if link.starts_with('/') { format!("{}://{}{}", self.scheme, self.registry, link) } else { link }; },
                None       => { break; },
            }
        }
        Ok(tags)
    }

    /// Pulls a manifest by tag or digest.
    ///
    /// # Arguments
    /// - `reference`: The tag or digest to pull.
    ///
    /// # Returns
    /// The raw manifest bytes and the `Content-Type` under which the registry served them. The bytes are kept raw so the push is byte-identical and the digest stays stable.
    ///
    /// # Errors
    /// This function errors if the manifest could not be fetched.
    pub async fn pull_manifest(&self, reference: &str) -> Result<(Vec<u8>, String), Error> {
        let address: String = self.url(format!("manifests/{}", reference));
        let res: Response = match self.request(Method::GET, &address).await.header(ACCEPT, MANIFEST_ACCEPT).send().await {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ address, err }); },
        };
        if !res.status().is_success() { return Err(Error::ResponseError{ address, status: res.status() }); }

        let media_type: String = res.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok()).unwrap_or("").into();
        match res.bytes().await {
            Ok(raw)  => Ok((raw.to_vec(), media_type)),
            Err(err) => Err(Error::ResponseBodyError{ address, err }),
        }
    }

    /// Pushes a manifest under the given tag or digest.
    ///
    /// # Arguments
    /// - `reference`: The tag or digest to push under.
    /// - `media_type`: The `Content-Type` to push with. Must be the one the manifest was pulled under, or its digest changes.
    /// - `raw`: The raw manifest bytes.
    ///
    /// # Errors
    /// This function errors if the registry did not accept the manifest.
    pub async fn push_manifest(&self, reference: &str, media_type: &str, raw: Vec<u8>) -> Result<(), Error> {
        let address: String = self.url(format!("manifests/{}", reference));
        let res: Response = match self.request(Method::PUT, &address).await.header(CONTENT_TYPE, media_type).body(raw).send().await {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ address, err }); },
        };
        if !res.status().is_success() { return Err(Error::ResponseError{ address, status: res.status() }); }
        Ok(())
    }

    /// Checks whether this handle's repository already stores the given blob.
    ///
    /// # Errors
    /// This function errors if the registry answered with anything but "yes" or "no".
    pub async fn has_blob(&self, digest: &str) -> Result<bool, Error> {
        let address: String = self.url(format!("blobs/{}", digest));
        let res: Response = match self.request(Method::HEAD, &address).await.send().await {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ address, err }); },
        };
        match res.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND         => Ok(false),
            status                        => Err(Error::ResponseError{ address, status }),
        }
    }

    /// Starts downloading the given blob.
    ///
    /// # Returns
    /// The successful response; the caller decides how to consume its body.
    ///
    /// # Errors
    /// This function errors if the download could not be started.
    pub async fn pull_blob(&self, digest: &str) -> Result<Response, Error> {
        let address: String = self.url(format!("blobs/{}", digest));
        let res: Response = match self.request(Method::GET, &address).await.send().await {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ address, err }); },
        };
        if !res.status().is_success() { return Err(Error::ResponseError{ address, status: res.status() }); }
        Ok(res)
    }

    /// Uploads a blob under the given digest.
    ///
    /// Uses the two-step monolithic upload: a POST to open the upload session, then a PUT of the body to the location the registry hands back.
    ///
    /// # Arguments
    /// - `digest`: The digest to store the blob under.
    /// - `body`: The blob bytes (typically a stream straight out of [`Self::pull_blob()`]).
    /// - `size`: The size of the blob, if known.
    ///
    /// # Errors
    /// This function errors if the upload could not be opened or the registry did not accept the blob.
    pub async fn push_blob(&self, digest: &str, body: Body, size: Option<u64>) -> Result<(), Error> {
        // Open the upload session
        let address: String = self.url("blobs/uploads/");
        let res: Response = match self.request(Method::POST, &address).await.send().await {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ address, err }); },
        };
        if !res.status().is_success() { return Err(Error::ResponseError{ address, status: res.status() }); }
        let location: String = match res.headers().get(LOCATION).and_then(|value| value.to_str().ok()) {
            Some(location) => location.into(),
            None           => { return Err(Error::MissingUploadLocation{ address }); },
        };

        // Complete it with a single PUT of the body
        let mut address: String = if location.starts_with('/') { format!("{}://{}{}", self.scheme, self.registry, location) } else { location };
        address.push_str(if address.contains('?') { "&" } else { "?" });
        address.push_str(&format!("digest={}", digest));
        let mut req: RequestBuilder = self.request(Method::PUT, &address).await.header(CONTENT_TYPE, "application/octet-stream").body(body);
        if let Some(size) = size { req = req.header(CONTENT_LENGTH, size); }
        let res: Response = match req.send().await {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ address, err }); },
        };
        if !res.status().is_success() { return Err(Error::ResponseError{ address, status: res.status() }); }
        Ok(())
    }
}

#[async_trait]
impl ImageSource for RegistryImage {
    #[inline]
    fn reference(&self) -> String { self.full_reference() }

    async fn list_tags(&self) -> Result<Vec<String>, TransferError> {
        self.tags().await.map_err(TransferError::new)
    }
}

impl ImageTarget for RegistryImage {
    #[inline]
    fn reference(&self) -> String { self.full_reference() }
}
