//  API.rs
//    by Lut99
//
//  Created:
//    20 Feb 2023, 15:03:17
//  Last edited:
//    06 Apr 2023, 13:42:55
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the concrete vendor API clients: the personal source
//!   registry (CCR) and the enterprise target registry (TCR), both
//!   spoken to through the vendor's JSON-over-HTTPS cloud API with
//!   TC3-HMAC-SHA256 request signing.
//

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::debug;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::errors::VendorError;
use crate::spec::{SourceVendor, TargetVendor};

pub use crate::errors::ApiError as Error;


/***** CONSTANTS *****/
/// The host of the vendor's container registry API.
const API_HOST: &str = "tcr.tencentcloudapi.com";
/// The service name of the container registry API, as it appears in the signature scope.
const API_SERVICE: &str = "tcr";
/// The version of the container registry API we speak.
const API_VERSION: &str = "2019-09-24";
/// The pull domain of the personal source registry.
const CCR_DOMAIN: &str = "ccr.ccs.tencentyun.com";
/// How many entries we ask for per page when enumerating.
const PAGE_SIZE: u64 = 100;


/***** TESTS *****/





/***** HELPER FUNCTIONS *****/
/// Computes a raw HMAC-SHA256 over the given message.
fn hmac_sha256(key: &[u8], message: &str) -> Vec<u8> {
    let mut mac: Hmac<Sha256> = Hmac::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Computes the lowercase-hex SHA256 of the given bytes.
#[inline]
fn sha256_hex(data: &[u8]) -> String { hex::encode(Sha256::digest(data)) }

/// Builds the TC3-HMAC-SHA256 `Authorization` header for one API call.
///
/// # Arguments
/// - `creds`: The secret id/key pair to sign with.
/// - `host`: The API host the request goes to.
/// - `service`: The service name in the signature scope.
/// - `payload`: The exact JSON body that will be sent.
/// - `now`: The timestamp the request is signed for.
///
/// # Returns
/// The complete header value.
fn sign(creds: &VendorCredentials, host: &str, service: &str, payload: &str, now: DateTime<Utc>) -> String {
    let date: String = now.format("%Y-%m-%d").to_string();

    // Phase 1: the canonical request (method, path, query, headers, signed headers, hashed payload)
    let canonical_request: String = format!("POST\n/\n\ncontent-type:application/json; charset=utf-8\nhost:{}\n\ncontent-type;host\n{}", host, sha256_hex(payload.as_bytes()));

    // Phase 2: the string to sign
    let scope: String = format!("{}/{}/tc3_request", date, service);
    let string_to_sign: String = format!("TC3-HMAC-SHA256\n{}\n{}\n{}", now.timestamp(), scope, sha256_hex(canonical_request.as_bytes()));

    // Phase 3: the derived key chain and the signature itself
    let secret_date: Vec<u8> = hmac_sha256(format!("TC3{}", creds.secret_key).as_bytes(), &date);
    let secret_service: Vec<u8> = hmac_sha256(&secret_date, service);
    let secret_signing: Vec<u8> = hmac_sha256(&secret_service, "tc3_request");
    let signature: String = hex::encode(hmac_sha256(&secret_signing, &string_to_sign));

    format!("TC3-HMAC-SHA256 Credential={}/{}, SignedHeaders=content-type;host, Signature={}", creds.secret_id, scope, signature)
}





/***** HELPER STRUCTS *****/
/// One signed endpoint of the vendor's cloud API; both concrete clients wrap one.
struct CloudEndpoint {
    /// The HTTP client requests go through.
    client : Client,
    /// The credentials to sign with.
    creds  : VendorCredentials,
    /// The region the API calls are scoped to.
    region : String,
}

impl CloudEndpoint {
    /// Calls the given action with the given payload and deserializes its response envelope.
    ///
    /// # Arguments
    /// - `action`: The API action to call.
    /// - `payload`: The request body, as JSON.
    ///
    /// # Returns
    /// The deserialized contents of the `Response` envelope.
    ///
    /// # Errors
    /// This function errors if the call could not be made, the API reported an error of its own, or the response did not have the expected shape.
    async fn call<R: DeserializeOwned>(&self, action: &str, payload: serde_json::Value) -> Result<R, Error> {
        let payload: String = payload.to_string();
        let now: DateTime<Utc> = Utc::now();
        debug!("Calling '{}' on '{}'...", action, API_HOST);

        let res: reqwest::Response = match self.client
            .post(format!("https://{}/", API_HOST))
            .header(AUTHORIZATION, sign(&self.creds, API_HOST, API_SERVICE, &payload, now))
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(HOST, API_HOST)
            .header("X-TC-Action", action)
            .header("X-TC-Timestamp", now.timestamp().to_string())
            .header("X-TC-Version", API_VERSION)
            .header("X-TC-Region", &self.region)
            .body(payload)
            .send().await
        {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ action: action.into(), err }); },
        };

        let raw: String = match res.text().await {
            Ok(raw)  => raw,
            Err(err) => { return Err(Error::ResponseBodyError{ action: action.into(), err }); },
        };
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err)  => { return Err(Error::ResponseJsonParseError{ action: action.into(), raw, err }); },
        };
        let response: &serde_json::Value = match value.get("Response") {
            Some(response) => response,
            None           => { return Err(Error::MissingResponse{ action: action.into() }); },
        };

        // The API reports its own failures inside the envelope, with status 200
        if let Some(error) = response.get("Error") {
            return Err(Error::ApiFailure {
                action  : action.into(),
                code    : error.get("Code").and_then(|c| c.as_str()).unwrap_or("unknown").into(),
                message : error.get("Message").and_then(|m| m.as_str()).unwrap_or("").into(),
            });
        }

        match serde_json::from_value(response.clone()) {
            Ok(response) => Ok(response),
            Err(err)     => Err(Error::ResponseJsonParseError{ action: action.into(), raw, err }),
        }
    }
}



/// The page shape of the personal registry's namespace enumeration.
#[derive(Clone, Debug, Deserialize)]
struct PersonalNamespacesResponse {
    #[serde(rename = "Data")]
    data : PersonalNamespacesData,
}
#[derive(Clone, Debug, Deserialize)]
struct PersonalNamespacesData {
    #[serde(rename = "NamespaceCount", default)]
    count      : u64,
    #[serde(rename = "NamespaceInfo", default)]
    namespaces : Vec<PersonalNamespace>,
}
#[derive(Clone, Debug, Deserialize)]
struct PersonalNamespace {
    #[serde(rename = "Namespace")]
    name : String,
}

/// The page shape of the personal registry's repository enumeration.
#[derive(Clone, Debug, Deserialize)]
struct PersonalRepositoriesResponse {
    #[serde(rename = "Data")]
    data : PersonalRepositoriesData,
}
#[derive(Clone, Debug, Deserialize)]
struct PersonalRepositoriesData {
    #[serde(rename = "TotalCount", default)]
    count        : u64,
    #[serde(rename = "RepoInfo", default)]
    repositories : Vec<PersonalRepository>,
}
#[derive(Clone, Debug, Deserialize)]
struct PersonalRepository {
    #[serde(rename = "RepoName")]
    name : String,
}

/// The page shape of the enterprise registry's namespace enumeration.
#[derive(Clone, Debug, Deserialize)]
struct NamespacesResponse {
    #[serde(rename = "TotalCount", default)]
    count      : u64,
    #[serde(rename = "NamespaceList", default)]
    namespaces : Vec<Namespace>,
}
#[derive(Clone, Debug, Deserialize)]
struct Namespace {
    #[serde(rename = "Name")]
    name : String,
}

/// The responses we only care about succeeding.
#[derive(Clone, Debug, Deserialize)]
struct EmptyResponse {}





/***** LIBRARY *****/
/// Specifies the secret id/key pair with which cloud API calls are signed.
#[derive(Clone)]
pub struct VendorCredentials {
    /// The secret id (goes into the credential scope in plain text).
    pub secret_id  : String,
    /// The secret key (never leaves the signing chain).
    pub secret_key : String,
}

impl VendorCredentials {
    /// Constructor for the VendorCredentials.
    #[inline]
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id  : secret_id.into(),
            secret_key : secret_key.into(),
        }
    }
}



/// The client for the personal source registry (CCR).
pub struct CcrApi {
    /// The signed API endpoint.
    endpoint        : CloudEndpoint,
    /// The pull domain of the target registry, for the target side of generated rules.
    target_registry : String,
}

impl CcrApi {
    /// Constructor for the CcrApi.
    ///
    /// # Arguments
    /// - `client`: The HTTP client to send requests through.
    /// - `creds`: The credentials to sign API calls with.
    /// - `region`: The region the source registry lives in.
    /// - `target_registry`: The pull domain of the target registry (e.g., `myinstance.tencentcloudcr.com`); generated rules are keyed by it.
    ///
    /// # Returns
    /// A new CcrApi instance.
    #[inline]
    pub fn new(client: Client, creds: VendorCredentials, region: impl Into<String>, target_registry: impl Into<String>) -> Self {
        Self {
            endpoint        : CloudEndpoint{ client, creds, region: region.into() },
            target_registry : target_registry.into(),
        }
    }
}

#[async_trait]
impl SourceVendor for CcrApi {
    async fn list_namespaces(&self) -> Result<Vec<String>, VendorError> {
        let mut namespaces: Vec<String> = Vec::new();
        let mut offset: u64 = 0;
        loop {
            let page: PersonalNamespacesResponse = self.endpoint
                .call("DescribeNamespacePersonal", json!({ "Namespace": "", "Limit": PAGE_SIZE, "Offset": offset }))
                .await
                .map_err(VendorError::new)?;
            let n_page: usize = page.data.namespaces.len();
            namespaces.extend(page.data.namespaces.into_iter().map(|ns| ns.name));
            offset += n_page as u64;
            if n_page == 0 || offset >= page.data.count { break; }
        }
        Ok(namespaces)
    }

    async fn generate_rules(&self, skip: &HashSet<String>) -> Result<HashMap<String, String>, VendorError> {
        let mut rules: HashMap<String, String> = HashMap::new();
        let mut offset: u64 = 0;
        loop {
            let page: PersonalRepositoriesResponse = self.endpoint
                .call("DescribeRepositoryOwnerPersonal", json!({ "RepoName": "", "Limit": PAGE_SIZE, "Offset": offset }))
                .await
                .map_err(VendorError::new)?;
            let n_page: usize = page.data.repositories.len();
            for repo in page.data.repositories {
                // Repositories in namespaces that have no home at the target are left out
                let namespace: &str = match repo.name.split_once('/') {
                    Some((namespace, _)) => namespace,
                    None                 => "",
                };
                if skip.contains(namespace) { continue; }
                rules.insert(format!("{}/{}", self.target_registry, repo.name), format!("{}/{}", CCR_DOMAIN, repo.name));
            }
            offset += n_page as u64;
            if n_page == 0 || offset >= page.data.count { break; }
        }
        Ok(rules)
    }
}



/// The client for the enterprise target registry (TCR).
pub struct TcrApi {
    /// The signed API endpoint.
    endpoint : CloudEndpoint,
    /// The registry instance the namespace calls are scoped to.
    instance : String,
}

impl TcrApi {
    /// Constructor for the TcrApi.
    ///
    /// # Arguments
    /// - `client`: The HTTP client to send requests through.
    /// - `creds`: The credentials to sign API calls with.
    /// - `region`: The region the target registry lives in.
    /// - `instance`: The registry instance to create namespaces in.
    ///
    /// # Returns
    /// A new TcrApi instance.
    #[inline]
    pub fn new(client: Client, creds: VendorCredentials, region: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            endpoint : CloudEndpoint{ client, creds, region: region.into() },
            instance : instance.into(),
        }
    }
}

#[async_trait]
impl TargetVendor for TcrApi {
    async fn list_namespaces(&self) -> Result<Vec<String>, VendorError> {
        let mut namespaces: Vec<String> = Vec::new();
        let mut offset: u64 = 0;
        loop {
            let page: NamespacesResponse = self.endpoint
                .call("DescribeNamespaces", json!({ "RegistryId": self.instance, "Limit": PAGE_SIZE, "Offset": offset }))
                .await
                .map_err(VendorError::new)?;
            let n_page: usize = page.namespaces.len();
            namespaces.extend(page.namespaces.into_iter().map(|ns| ns.name));
            offset += n_page as u64;
            if n_page == 0 || offset >= page.count { break; }
        }
        Ok(namespaces)
    }

    async fn create_namespace(&self, name: &str) -> Result<(), VendorError> {
        let _: EmptyResponse = self.endpoint
            .call("CreateNamespace", json!({ "RegistryId": self.instance, "NamespaceName": name, "IsPublic": false }))
            .await
            .map_err(VendorError::new)?;
        Ok(())
    }
}
