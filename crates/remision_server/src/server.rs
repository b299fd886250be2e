//! Transport-agnostic API server.

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::handler::{HandlerContext, RequestHandler, UpdateRequest};
use remision_core::{LedgerAdapter, RecordDraft};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// HTTP method of an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// OPTIONS (preflight)
    Options,
    /// Anything else.
    Other(String),
}

impl Method {
    /// Parses a method name, case-insensitively.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "OPTIONS" => Method::Options,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
            Method::Options => f.write_str("OPTIONS"),
            Method::Other(name) => f.write_str(name),
        }
    }
}

/// A request as handed over by the embedding HTTP layer.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Request method.
    pub method: Method,
    /// Request path, e.g. `/api/get-history`. A query string is ignored.
    pub path: String,
    /// Raw body.
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Creates a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: Vec::new(),
        }
    }

    /// Creates a POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: body.into(),
        }
    }
}

/// A JSON response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body; `Null` means no body.
    pub body: serde_json::Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(value: &T) -> ApiResult<Self> {
        let body = serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(Self { status: 200, body })
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            body: serde_json::Value::Null,
        }
    }

    fn from_error(err: &ApiError) -> Self {
        Self {
            status: err.status(),
            body: err.to_body(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    GetSequence,
    SaveRemision,
    UpdateRemision,
    GetHistory,
    GetClientes,
}

impl Endpoint {
    fn route(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or(path).trim_end_matches('/');
        match path {
            "/api/get-sequence" => Some(Self::GetSequence),
            "/api/save-remision" => Some(Self::SaveRemision),
            "/api/update-remision" => Some(Self::UpdateRemision),
            "/api/get-history" => Some(Self::GetHistory),
            "/api/get-clientes" => Some(Self::GetClientes),
            _ => None,
        }
    }

    fn method(self) -> Method {
        match self {
            Self::SaveRemision | Self::UpdateRemision => Method::Post,
            Self::GetSequence | Self::GetHistory | Self::GetClientes => Method::Get,
        }
    }
}

/// The API server.
///
/// Maps the endpoints of the original web application onto the ledger.
/// It owns no socket; an HTTP layer converts its requests into
/// [`ApiRequest`]s and writes back the [`ApiResponse`].
///
/// # Example
///
/// ```
/// use remision_core::DocumentLedger;
/// use remision_server::{ApiRequest, ApiServer, ServerConfig};
/// use remision_storage::InMemoryBackend;
///
/// let server = ApiServer::new(ServerConfig::default(), DocumentLedger::split(InMemoryBackend::new()));
/// let response = server.handle(&ApiRequest::get("/api/get-sequence"));
/// assert_eq!(response.status, 200);
/// assert_eq!(response.body["next"], "00000001");
/// ```
pub struct ApiServer<A> {
    handler: RequestHandler<A>,
    context: Arc<HandlerContext<A>>,
}

impl<A: LedgerAdapter> ApiServer<A> {
    /// Creates a server over `ledger`.
    pub fn new(config: ServerConfig, ledger: A) -> Self {
        Self::with_ledger(config, Arc::new(ledger))
    }

    /// Creates a server over a shared ledger.
    pub fn with_ledger(config: ServerConfig, ledger: Arc<A>) -> Self {
        let context = Arc::new(HandlerContext::new(config, ledger));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// Returns the handler for typed calls.
    pub fn handler(&self) -> &RequestHandler<A> {
        &self.handler
    }

    /// Returns the shared ledger.
    pub fn ledger(&self) -> &Arc<A> {
        &self.context.ledger
    }

    /// Handles one request. Never fails: errors become error responses.
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let response = match self.dispatch(request) {
            Ok(response) => response,
            Err(err) => {
                if err.is_server_error() {
                    tracing::error!(path = %request.path, error = %err, "request failed");
                } else {
                    tracing::debug!(path = %request.path, error = %err, "request rejected");
                }
                ApiResponse::from_error(&err)
            }
        };
        tracing::info!(method = %request.method, path = %request.path, status = response.status, "handled");
        response
    }

    fn dispatch(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let endpoint = Endpoint::route(&request.path)
            .ok_or_else(|| ApiError::UnknownEndpoint(request.path.clone()))?;

        if request.method == Method::Options {
            return Ok(ApiResponse::no_content());
        }
        if request.method != endpoint.method() {
            return Err(ApiError::MethodNotAllowed {
                method: request.method.to_string(),
                path: request.path.clone(),
            });
        }

        match endpoint {
            Endpoint::GetSequence => ApiResponse::ok(&self.handler.handle_get_sequence()?),
            Endpoint::SaveRemision => {
                let draft: RecordDraft = self.parse(request)?;
                ApiResponse::ok(&self.handler.handle_save(draft)?)
            }
            Endpoint::UpdateRemision => {
                let update: UpdateRequest = self.parse(request)?;
                ApiResponse::ok(&self.handler.handle_update(update)?)
            }
            Endpoint::GetHistory => ApiResponse::ok(&self.handler.handle_get_history()?),
            Endpoint::GetClientes => ApiResponse::ok(&self.handler.handle_get_customers()?),
        }
    }

    fn parse<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        let limit = self.context.config.max_body_bytes;
        if request.body.len() > limit {
            return Err(ApiError::PayloadTooLarge {
                size: request.body.len(),
                limit,
            });
        }
        Ok(serde_json::from_slice(&request.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remision_core::DocumentLedger;
    use remision_storage::InMemoryBackend;

    fn server() -> ApiServer<DocumentLedger<InMemoryBackend>> {
        ApiServer::new(
            ServerConfig::default(),
            DocumentLedger::split(InMemoryBackend::new()),
        )
    }

    #[test]
    fn method_parsing() {
        assert_eq!(Method::parse("get"), Method::Get);
        assert_eq!(Method::parse("DELETE"), Method::Other("DELETE".into()));
    }

    #[test]
    fn routing() {
        assert_eq!(Endpoint::route("/api/get-history"), Some(Endpoint::GetHistory));
        assert_eq!(Endpoint::route("/api/get-history/"), Some(Endpoint::GetHistory));
        assert_eq!(Endpoint::route("/api/get-history?x=1"), Some(Endpoint::GetHistory));
        assert_eq!(Endpoint::route("/api/nope"), None);
    }

    #[test]
    fn wrong_method_is_405() {
        let response = server().handle(&ApiRequest::get("/api/save-remision"));
        assert_eq!(response.status, 405);
        assert!(response.body["error"].is_string());
    }

    #[test]
    fn unknown_path_is_404() {
        assert_eq!(server().handle(&ApiRequest::get("/api/other")).status, 404);
    }

    #[test]
    fn preflight_is_204() {
        let request = ApiRequest {
            method: Method::Options,
            path: "/api/save-remision".into(),
            body: Vec::new(),
        };
        let response = server().handle(&request);
        assert_eq!(response.status, 204);
        assert!(response.is_success());
    }

    #[test]
    fn malformed_body_is_400() {
        let response = server().handle(&ApiRequest::post("/api/save-remision", "{not json"));
        assert_eq!(response.status, 400);
    }

    #[test]
    fn oversized_body_is_413() {
        let server = ApiServer::new(
            ServerConfig::new().with_max_body_bytes(8),
            DocumentLedger::split(InMemoryBackend::new()),
        );
        let response = server.handle(&ApiRequest::post(
            "/api/update-remision",
            r#"{"remisionNumber":"00000001","deleted":true}"#,
        ));
        assert_eq!(response.status, 413);
    }
}
