//! In-process fake of the repository contents API.
//!
//! [`FakeContentsApi`] implements [`HttpClient`] by keeping files in memory
//! and answering like the hosted service: base64 content wrapped at 60
//! columns, a blob SHA per file, 409 on a stale SHA and 422 when an
//! existing file is written without one. Files over the inline limit are
//! listed without content and served from the git blobs endpoint.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use remision_storage::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutBody {
    message: String,
    content: String,
    #[serde(default)]
    sha: Option<String>,
    branch: String,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, StoredFile>,
    commits: Vec<String>,
    next_sha: u64,
    injected: VecDeque<Result<u16, String>>,
    inline_limit: Option<usize>,
}

/// A fake contents API.
///
/// Cloning shares the underlying state, so one clone can be handed to a
/// backend while the test inspects another.
#[derive(Debug, Clone, Default)]
pub struct FakeContentsApi {
    state: Arc<Mutex<State>>,
}

impl FakeContentsApi {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` at `path` (relative to the repository root) without
    /// a commit message.
    pub fn insert(&self, path: &str, content: &[u8]) {
        let mut state = self.state.lock();
        let sha = state.mint_sha();
        state.files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_vec(),
                sha,
            },
        );
    }

    /// Returns the content stored at `path`.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).map(|f| f.content.clone())
    }

    /// Commit messages of successful writes, oldest first.
    pub fn commits(&self) -> Vec<String> {
        self.state.lock().commits.clone()
    }

    /// Lists files larger than `bytes` without inline content, the way the
    /// hosted service treats files over 1 MB.
    pub fn set_inline_limit(&self, bytes: usize) {
        self.state.lock().inline_limit = Some(bytes);
    }

    /// Answers the next request with `status` and an error body instead of
    /// handling it.
    pub fn inject_status(&self, status: u16) {
        self.state.lock().injected.push_back(Ok(status));
    }

    /// Fails the next request at the transport level.
    pub fn inject_transport_error(&self, message: &str) {
        self.state
            .lock()
            .injected
            .push_back(Err(message.to_string()));
    }
}

impl State {
    fn mint_sha(&mut self) -> String {
        self.next_sha += 1;
        format!("{:040x}", self.next_sha)
    }

    fn get(&self, path: &str) -> HttpResponse {
        match self.files.get(path) {
            Some(file) if self.inline_limit.is_some_and(|limit| file.content.len() > limit) => {
                json_response(
                    200,
                    &serde_json::json!({
                        "content": "",
                        "encoding": "none",
                        "size": file.content.len(),
                        "sha": file.sha,
                        "path": path,
                    }),
                )
            }
            Some(file) => json_response(
                200,
                &serde_json::json!({
                    "content": wrapped_base64(&file.content),
                    "encoding": "base64",
                    "size": file.content.len(),
                    "sha": file.sha,
                    "path": path,
                }),
            ),
            None => json_response(404, &serde_json::json!({"message": "Not Found"})),
        }
    }

    fn blob(&self, sha: &str) -> HttpResponse {
        match self.files.values().find(|f| f.sha == sha) {
            Some(file) => json_response(
                200,
                &serde_json::json!({
                    "content": wrapped_base64(&file.content),
                    "encoding": "base64",
                    "size": file.content.len(),
                    "sha": file.sha,
                }),
            ),
            None => json_response(404, &serde_json::json!({"message": "Not Found"})),
        }
    }

    fn put(&mut self, path: &str, body: Option<&[u8]>) -> HttpResponse {
        let Some(body) = body else {
            return json_response(400, &serde_json::json!({"message": "missing body"}));
        };
        let body: PutBody = match serde_json::from_slice(body) {
            Ok(body) => body,
            Err(e) => return json_response(400, &serde_json::json!({"message": e.to_string()})),
        };
        if body.branch.is_empty() {
            return json_response(422, &serde_json::json!({"message": "branch required"}));
        }
        let content = match BASE64.decode(body.content.as_bytes()) {
            Ok(content) => content,
            Err(e) => return json_response(400, &serde_json::json!({"message": e.to_string()})),
        };

        let current = self.files.get(path).map(|f| f.sha.clone());
        match (&current, &body.sha) {
            (Some(_), None) => {
                return json_response(
                    422,
                    &serde_json::json!({"message": "\"sha\" wasn't supplied."}),
                )
            }
            (Some(current), Some(given)) if current != given => {
                return json_response(
                    409,
                    &serde_json::json!({"message": format!("{path} does not match {given}")}),
                )
            }
            (None, Some(_)) => {
                return json_response(409, &serde_json::json!({"message": "file does not exist"}))
            }
            _ => {}
        }

        let sha = self.mint_sha();
        let created = current.is_none();
        self.files.insert(
            path.to_string(),
            StoredFile {
                content,
                sha: sha.clone(),
            },
        );
        self.commits.push(body.message);
        json_response(
            if created { 201 } else { 200 },
            &serde_json::json!({"content": {"sha": sha, "path": path}}),
        )
    }
}

fn wrapped_base64(content: &[u8]) -> String {
    BASE64
        .encode(content)
        .as_bytes()
        .chunks(60)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

fn json_response(status: u16, body: &serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        body: body.to_string().into_bytes(),
    }
}

/// Extracts the repository-relative path from a contents URL.
fn contents_path(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("/contents/")?;
    Some(rest.split('?').next().unwrap_or(rest))
}

impl HttpClient for FakeContentsApi {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let mut state = self.state.lock();
        if let Some(injected) = state.injected.pop_front() {
            return injected.map(|status| {
                json_response(status, &serde_json::json!({"message": "injected"}))
            });
        }
        if let Some((_, sha)) = request.url.split_once("/git/blobs/") {
            return Ok(match request.method {
                HttpMethod::Get => state.blob(sha),
                HttpMethod::Put => json_response(404, &serde_json::json!({"message": "Not Found"})),
            });
        }
        let Some(path) = contents_path(&request.url) else {
            return Ok(json_response(404, &serde_json::json!({"message": "Not Found"})));
        };
        Ok(match request.method {
            HttpMethod::Get => state.get(path),
            HttpMethod::Put => state.put(path, request.body.as_deref()),
        })
    }
}
