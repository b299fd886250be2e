//! Repository contents backend.
//!
//! Documents live as files in a hosted git repository and are read and
//! written through the repository contents REST API. Every write is a
//! commit; the blob SHA returned by the service is the version token, and
//! the service rejects a write whose `sha` no longer matches the file.
//!
//! The HTTP client is abstracted via a trait so the backend does not tie
//! the crate to one HTTP library.

use crate::backend::{Document, DocumentBackend, Version};
use crate::error::{StorageError, StorageResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// HTTP methods used by the contents API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Read a file.
    Get,
    /// Create or replace a file.
    Put,
}

/// An HTTP request handed to an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Vec<u8>>,
}

/// An HTTP response returned by an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Returning
/// `Err` means no response was received at all (connection refused, reset,
/// timeout); any response, including error statuses, is `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Location and credentials of the repository holding the documents.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch the documents are committed to.
    pub branch: String,
    /// Directory inside the repository holding the documents.
    pub directory: String,
    /// Bearer token.
    pub token: String,
    /// API base URL.
    pub api_base: String,
}

impl RepoConfig {
    /// Creates a configuration for `owner/repo` on branch `main`, directory `data`.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: "main".into(),
            directory: "data".into(),
            token: token.into(),
            api_base: "https://api.github.com".into(),
        }
    }

    /// Sets the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets the directory holding the documents.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Creates a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REMISION_REPO_OWNER` (required)
    /// - `REMISION_REPO_NAME` (required)
    /// - `REMISION_REPO_TOKEN` (required)
    /// - `REMISION_REPO_BRANCH` (default: `main`)
    /// - `REMISION_REPO_DIR` (default: `data`)
    /// - `REMISION_REPO_API` (default: `https://api.github.com`)
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if a required variable is missing.
    pub fn from_env() -> StorageResult<Self> {
        let required = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| StorageError::Config(format!("{key} is not set")))
        };
        let mut config = Self::new(
            required("REMISION_REPO_OWNER")?,
            required("REMISION_REPO_NAME")?,
            required("REMISION_REPO_TOKEN")?,
        );
        if let Ok(branch) = std::env::var("REMISION_REPO_BRANCH") {
            config.branch = branch;
        }
        if let Ok(directory) = std::env::var("REMISION_REPO_DIR") {
            config.directory = directory;
        }
        if let Ok(api_base) = std::env::var("REMISION_REPO_API") {
            config.api_base = api_base;
        }
        Ok(config)
    }

    fn blob_url(&self, sha: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{base}/repos/{}/{}/git/blobs/{sha}", self.owner, self.repo)
    }

    fn contents_url(&self, name: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        let directory = self.directory.trim_matches('/');
        if directory.is_empty() {
            format!("{base}/repos/{}/{}/contents/{name}", self.owner, self.repo)
        } else {
            format!(
                "{base}/repos/{}/{}/contents/{directory}/{name}",
                self.owner, self.repo
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileBody {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    size: u64,
    sha: String,
}

impl FileBody {
    /// Files over 1 MB are listed without inline content.
    fn is_detached(&self) -> bool {
        self.encoding.as_deref() == Some("none") || (self.content.trim().is_empty() && self.size > 0)
    }
}

#[derive(Debug, Deserialize)]
struct BlobBody {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutBody<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct PutResult {
    content: CommittedFile,
}

#[derive(Debug, Deserialize)]
struct CommittedFile {
    sha: String,
}

/// A document backend over a repository contents API.
///
/// # Example
///
/// ```ignore
/// let config = RepoConfig::from_env()?;
/// let backend = RepoContentsBackend::new(config, MyHttpClient::default());
/// let doc = backend.get("secuencia.json")?;
/// ```
pub struct RepoContentsBackend<C: HttpClient> {
    config: RepoConfig,
    client: C,
}

impl<C: HttpClient> RepoContentsBackend<C> {
    /// Creates a new backend.
    pub fn new(config: RepoConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the repository configuration.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    fn headers(&self, with_body: bool) -> Vec<(String, String)> {
        let mut headers = vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.config.token),
            ),
            (
                "Accept".to_string(),
                "application/vnd.github.v3+json".to_string(),
            ),
        ];
        if with_body {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers
    }

    fn send(&self, request: HttpRequest) -> StorageResult<HttpResponse> {
        self.client
            .send(&request)
            .map_err(StorageError::Transport)
    }

    /// Reads a file too large for the contents endpoint through the git
    /// blobs endpoint.
    fn fetch_blob(&self, name: &str, file: &FileBody) -> StorageResult<Vec<u8>> {
        tracing::debug!(name, size = file.size, "content not inline, reading blob");
        let response = self.send(HttpRequest {
            method: HttpMethod::Get,
            url: self.config.blob_url(&file.sha),
            headers: self.headers(false),
            body: None,
        })?;
        if response.status != 200 {
            return Err(remote_error(&response));
        }

        let blob: BlobBody = serde_json::from_slice(&response.body)
            .map_err(|e| StorageError::Corrupted(format!("blob response: {e}")))?;
        if blob.encoding.as_deref() != Some("base64") || blob.content.trim().is_empty() {
            return Err(StorageError::Corrupted(format!(
                "{name}: blob {} of {} bytes came back without base64 content",
                file.sha, file.size
            )));
        }
        decode_content(name, &blob.content)
    }
}

fn decode_content(name: &str, encoded: &str) -> StorageResult<Vec<u8>> {
    // The API wraps base64 at 60 columns.
    let packed: String = encoded.split_whitespace().collect();
    BASE64
        .decode(packed)
        .map_err(|e| StorageError::Corrupted(format!("{name}: {e}")))
}

fn remote_error(response: &HttpResponse) -> StorageError {
    StorageError::Remote {
        status: response.status,
        message: String::from_utf8_lossy(&response.body).into_owned(),
    }
}

impl<C: HttpClient> DocumentBackend for RepoContentsBackend<C> {
    fn get(&self, name: &str) -> StorageResult<Option<Document>> {
        let url = format!("{}?ref={}", self.config.contents_url(name), self.config.branch);
        let response = self.send(HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: self.headers(false),
            body: None,
        })?;

        match response.status {
            200 => {
                let file: FileBody = serde_json::from_slice(&response.body)
                    .map_err(|e| StorageError::Corrupted(format!("contents response: {e}")))?;
                let content = if file.is_detached() {
                    self.fetch_blob(name, &file)?
                } else {
                    decode_content(name, &file.content)?
                };
                Ok(Some(Document {
                    content,
                    version: Version::new(file.sha),
                }))
            }
            404 => Ok(None),
            _ => Err(remote_error(&response)),
        }
    }

    fn put(
        &self,
        name: &str,
        content: &[u8],
        expected: Option<&Version>,
    ) -> StorageResult<Version> {
        let body = PutBody {
            message: format!("Update {name}"),
            content: BASE64.encode(content),
            sha: expected.map(Version::as_str),
            branch: &self.config.branch,
        };
        let body = serde_json::to_vec(&body)
            .map_err(|e| StorageError::Corrupted(format!("request body: {e}")))?;

        let response = self.send(HttpRequest {
            method: HttpMethod::Put,
            url: self.config.contents_url(name),
            headers: self.headers(true),
            body: Some(body),
        })?;

        match response.status {
            200 | 201 => {
                let result: PutResult = serde_json::from_slice(&response.body)
                    .map_err(|e| StorageError::Corrupted(format!("commit response: {e}")))?;
                Ok(Version::new(result.content.sha))
            }
            // 409: sha does not match; 422: sha missing for an existing file.
            409 | 422 => Err(StorageError::conflict(
                name,
                expected.map(Version::as_str),
                None,
            )),
            _ => Err(remote_error(&response)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct ScriptedClient {
        responses: Mutex<Vec<HttpResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedClient {
        fn new(mut responses: Vec<HttpResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for ScriptedClient {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
            self.requests.lock().push(request.clone());
            self.responses
                .lock()
                .pop()
                .ok_or_else(|| "connection refused".to_string())
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    fn backend(responses: Vec<HttpResponse>) -> RepoContentsBackend<ScriptedClient> {
        RepoContentsBackend::new(
            RepoConfig::new("acme", "notas", "secret"),
            ScriptedClient::new(responses),
        )
    }

    #[test]
    fn get_decodes_wrapped_base64() {
        let encoded = BASE64.encode(br#"{"ultima":"00000042"}"#);
        let wrapped = format!("{}\n{}", &encoded[..10], &encoded[10..]);
        let body = format!(r#"{{"content":"{wrapped}","sha":"abc123","encoding":"base64"}}"#)
            .replace('\n', "\\n");
        let backend = backend(vec![response(200, &body)]);

        let doc = backend.get("secuencia.json").unwrap().unwrap();
        assert_eq!(doc.content, br#"{"ultima":"00000042"}"#);
        assert_eq!(doc.version.as_str(), "abc123");

        let requests = backend.client.requests.lock();
        assert_eq!(
            requests[0].url,
            "https://api.github.com/repos/acme/notas/contents/data/secuencia.json?ref=main"
        );
        assert!(requests[0]
            .headers
            .contains(&("Authorization".to_string(), "Bearer secret".to_string())));
    }

    #[test]
    fn get_missing_is_none() {
        let backend = backend(vec![response(404, r#"{"message":"Not Found"}"#)]);
        assert!(backend.get("historial.json").unwrap().is_none());
    }

    #[test]
    fn put_sends_expected_sha() {
        let backend = backend(vec![response(200, r#"{"content":{"sha":"def456"}}"#)]);

        let version = backend
            .put("historial.json", b"[]", Some(&Version::new("abc123")))
            .unwrap();
        assert_eq!(version.as_str(), "def456");

        let requests = backend.client.requests.lock();
        assert_eq!(requests[0].method, HttpMethod::Put);
        let body: serde_json::Value =
            serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["sha"], "abc123");
        assert_eq!(body["branch"], "main");
        assert_eq!(body["content"], BASE64.encode(b"[]"));
    }

    #[test]
    fn put_create_omits_sha() {
        let backend = backend(vec![response(201, r#"{"content":{"sha":"new"}}"#)]);
        backend.put("historial.json", b"[]", None).unwrap();

        let requests = backend.client.requests.lock();
        let body: serde_json::Value =
            serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert!(body.get("sha").is_none());
    }

    #[test]
    fn put_sha_mismatch_is_conflict() {
        for status in [409, 422] {
            let backend = backend(vec![response(status, r#"{"message":"sha mismatch"}"#)]);
            let err = backend
                .put("historial.json", b"[]", Some(&Version::new("stale")))
                .unwrap_err();
            assert!(err.is_conflict(), "status {status}");
        }
    }

    #[test]
    fn server_errors_are_remote_and_transport_failures_retryable() {
        let backend = backend(vec![response(500, "boom")]);
        let err = backend.get("historial.json").unwrap_err();
        assert!(matches!(err, StorageError::Remote { status: 500, .. }));

        let err = backend.get("historial.json").unwrap_err();
        assert!(matches!(err, StorageError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn large_file_is_read_from_blob() {
        let content = vec![b'7'; 64];
        let listing = r#"{"content":"","encoding":"none","size":2000000,"sha":"big1"}"#;
        let blob = format!(
            r#"{{"content":"{}","encoding":"base64","sha":"big1"}}"#,
            BASE64.encode(&content)
        );
        let backend = backend(vec![response(200, listing), response(200, &blob)]);

        let doc = backend.get("historial.json").unwrap().unwrap();
        assert_eq!(doc.content, content);
        assert_eq!(doc.version.as_str(), "big1");

        let requests = backend.client.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].url,
            "https://api.github.com/repos/acme/notas/git/blobs/big1"
        );
    }

    #[test]
    fn blob_without_content_is_reported() {
        let listing = r#"{"content":"","size":2000000,"sha":"big1"}"#;
        let blob = r#"{"content":"","encoding":"none","sha":"big1"}"#;
        let backend = backend(vec![response(200, listing), response(200, blob)]);

        match backend.get("historial.json").unwrap_err() {
            StorageError::Corrupted(message) => {
                assert!(message.contains("historial.json"), "{message}");
                assert!(message.contains("big1"), "{message}");
            }
            other => panic!("expected Corrupted, got {other}"),
        }
    }

    #[test]
    fn blob_status_errors_are_remote() {
        let listing = r#"{"content":"","encoding":"none","size":2000000,"sha":"big1"}"#;
        let backend = backend(vec![response(200, listing), response(403, "too large")]);
        assert!(matches!(
            backend.get("historial.json").unwrap_err(),
            StorageError::Remote { status: 403, .. }
        ));
    }

    #[test]
    fn empty_file_needs_no_blob() {
        let listing = r#"{"content":"","encoding":"base64","size":0,"sha":"e0"}"#;
        let backend = backend(vec![response(200, listing)]);
        let doc = backend.get("historial.json").unwrap().unwrap();
        assert!(doc.content.is_empty());
        assert_eq!(backend.client.requests.lock().len(), 1);
    }

    #[test]
    fn contents_url_without_directory() {
        let config = RepoConfig::new("acme", "notas", "t")
            .with_directory("")
            .with_api_base("http://localhost:9000/");
        assert_eq!(
            config.contents_url("ledger.json"),
            "http://localhost:9000/repos/acme/notas/contents/ledger.json"
        );
    }
}
