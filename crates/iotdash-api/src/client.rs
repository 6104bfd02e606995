// Async HTTP client for the dashboard backend.
//
// Base path: configured backend root (e.g. http://gateway:5000/)
// Errors: non-2xx bodies are `{"error": "..."}`
//
// Transport mechanics live here; the per-resource endpoints are inherent
// methods in sibling modules (devices, relays, motion, system).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::listing::decode_error;
use crate::transport::TransportConfig;

// ── Error response shape ─────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the dashboard REST backend.
///
/// Every failure is mapped into [`Error`] before it is returned; nothing
/// from `reqwest` escapes as a panic or an unclassified error.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client for `base_url` using the given transport settings.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, base_url)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Ensure the base path ends with `/` so relative joins append.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    /// The backend root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"api/devices"`) onto the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let body = self.get_text(path).await?;
        serde_json::from_str(&body).map_err(|e| decode_error(&e, &body))
    }

    /// GET and return the raw 2xx body, for callers that decode leniently.
    pub(crate) async fn get_text(&self, path: &str) -> Result<String, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        Self::handle_text(resp).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        key: &str,
    ) -> Result<Option<T>, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        Self::handle_echo(resp, key).await
    }

    pub(crate) async fn post_no_response<B: Serialize + Sync>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let mut builder = self.http.post(url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        Self::handle_text(resp).await.map(drop)
    }

    pub(crate) async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        key: &str,
    ) -> Result<Option<T>, Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let resp = self.http.put(url).json(body).send().await?;
        Self::handle_echo(resp, key).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        let resp = self.http.delete(url).send().await?;
        Self::handle_text(resp).await.map(drop)
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_text(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp.text().await?)
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    /// Decode the record a mutating call echoes back, if there is one.
    ///
    /// Accepts the record itself or the record under `key`. Bodies such as
    /// `{"msg": "ok"}` yield `None`.
    async fn handle_echo<T: DeserializeOwned>(
        resp: reqwest::Response,
        key: &str,
    ) -> Result<Option<T>, Error> {
        let body = Self::handle_text(resp).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let mut value: Value = serde_json::from_str(&body).map_err(|e| decode_error(&e, &body))?;
        if let Some(inner) = value.get_mut(key).map(Value::take) {
            if let Ok(record) = serde_json::from_value(inner) {
                return Ok(Some(record));
            }
        }
        match serde_json::from_value(value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                debug!(error = %e, "mutation response carried no record");
                Ok(None)
            }
        }
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<ErrorResponse>(&raw) {
            Ok(err) => err.error.or(err.message),
            Err(_) if raw.trim().is_empty() || raw.trim_start().starts_with('<') => None,
            Err(_) => Some(raw.chars().take(200).collect()),
        };

        debug!(status = status.as_u16(), message = ?message, "backend returned an error");
        Error::from_status(status.as_u16(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = ApiClient::with_client(reqwest::Client::new(), "http://gateway:5000/backend")
            .expect("valid url");
        assert_eq!(
            client.url("api/devices").expect("joins").as_str(),
            "http://gateway:5000/backend/api/devices"
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        assert!(matches!(
            ApiClient::with_client(reqwest::Client::new(), "not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
