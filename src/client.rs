use std::env;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::chat::AssistantBackend;
use crate::error::{Error, Result};
use crate::observability::{BACKEND_REQUEST_DURATION, BACKEND_REQUEST_ERRORS, BACKEND_REQUESTS};
use crate::report::{ReportBackend, ReportQuery};
use crate::types::{AssistantQuery, AssistantReply, ReportResponse};

/// Environment variable consulted when no base URL is given explicitly.
pub const BASE_URL_ENV: &str = "REPORTCHAT_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ASSISTANT_ENDPOINT: &str = "api/asistente_consulta";
const REPORT_ENDPOINT: &str = "api/buscar_correos";

/// HTTP client for the report backend.
#[derive(Debug, Clone)]
pub struct Backend {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl Backend {
    /// Create a client for the default backend.
    ///
    /// The base URL is read from `REPORTCHAT_BASE_URL` when set.
    pub fn new() -> Result<Self> {
        Self::with_options(None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url,
            None => env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let base_url = parse_base_url(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The per-request timeout configured on the HTTP client.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    /// Process backend error responses and convert to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let error_message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| {
                if error_body.trim().is_empty() {
                    format!("status {status_code}")
                } else {
                    error_body.clone()
                }
            });

        match status_code {
            400 => Error::bad_request(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message),
            _ => Error::api(status_code, error_message),
        }
    }

    async fn finish<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// Send a question to the assistant endpoint.
    pub async fn consult(&self, query: &AssistantQuery) -> Result<AssistantReply> {
        let url = self.endpoint(ASSISTANT_ENDPOINT)?;
        BACKEND_REQUESTS.click();
        let start = Instant::now();
        tracing::debug!(%url, context_len = query.context.len(), "consulting assistant");

        let result = match self
            .client
            .post(url)
            .headers(Self::default_headers())
            .json(query)
            .send()
            .await
        {
            Ok(response) => Self::finish::<AssistantReply>(response).await,
            Err(e) => Err(self.map_send_error(e)),
        };

        BACKEND_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if result.is_err() {
            BACKEND_REQUEST_ERRORS.click();
        }
        result
    }

    /// Ask the backend to search emails and build a consolidated report.
    pub async fn search_emails(&self, query: &ReportQuery) -> Result<ReportResponse> {
        let mut url = self.endpoint(REPORT_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("asunto", query.subject())
            .append_pair("fecha_desde", &query.from_param())
            .append_pair("fecha_hasta", &query.to_param());
        BACKEND_REQUESTS.click();
        let start = Instant::now();
        tracing::debug!(%url, "searching emails");

        let result = match self
            .client
            .get(url)
            .header(header::ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
        {
            Ok(response) => Self::finish::<ReportResponse>(response).await,
            Err(e) => Err(self.map_send_error(e)),
        };

        BACKEND_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if result.is_err() {
            BACKEND_REQUEST_ERRORS.click();
        }
        result
    }
}

#[async_trait::async_trait]
impl AssistantBackend for Backend {
    async fn consult(&self, query: &AssistantQuery) -> Result<AssistantReply> {
        Backend::consult(self, query).await
    }
}

#[async_trait::async_trait]
impl ReportBackend for Backend {
    async fn search_emails(&self, query: &ReportQuery) -> Result<ReportResponse> {
        Backend::search_emails(self, query).await
    }
}

/// Parse a base URL, forcing a trailing slash so relative joins append to it.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let url = Url::parse(&raw)?;
    if url.cannot_be_a_base() {
        return Err(Error::url(format!("{raw} cannot be used as a base URL"), None));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let backend = Backend::with_options(
            Some("http://localhost:8080".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(backend.base_url().as_str(), "http://localhost:8080/");
        assert_eq!(backend.timeout(), Duration::from_secs(5));

        let backend = Backend::with_options(Some(DEFAULT_BASE_URL.to_string()), None).unwrap();
        assert_eq!(backend.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn endpoints_join_under_base_path() {
        let backend =
            Backend::with_options(Some("http://example.com/reports".to_string()), None).unwrap();
        assert_eq!(
            backend.endpoint(ASSISTANT_ENDPOINT).unwrap().as_str(),
            "http://example.com/reports/api/asistente_consulta"
        );
    }

    #[test]
    fn invalid_base_url() {
        let err = Backend::with_options(Some("not a url".to_string()), None).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));

        let err = Backend::with_options(Some("mailto:someone@example.com".to_string()), None)
            .unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[tokio::test]
    async fn connection_refused_maps_to_connection_error() {
        // Port 9 (discard) is essentially never listening on loopback.
        let backend = Backend::with_options(
            Some("http://127.0.0.1:9/".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        let query = AssistantQuery::new("hi", Vec::new(), None);
        let err = backend.consult(&query).await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {err:?}");
    }
}
