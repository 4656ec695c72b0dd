//! Thin XRPC wrapper over reqwest.
//!
//! Endpoints are identified by method NSID and accept query parameters;
//! responses are JSON envelopes. Non-2xx statuses are mapped to
//! [`SkeinError::UpstreamHttp`] with the body attached so callers can make
//! fallback decisions.

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Result, SkeinError};
use crate::session::Session;

/// Unauthenticated AppView for public read endpoints.
pub const PUBLIC_APPVIEW: &str = "https://public.api.bsky.app";

/// Default PDS entrypoint for session creation.
pub const DEFAULT_PDS: &str = "https://bsky.social";

/// A reqwest client with the skein user-agent and sane timeouts.
pub fn skein_reqwest_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("skein/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap() // panics for the same reasons Client::new() would: https://docs.rs/reqwest/latest/reqwest/struct.Client.html#panics
}

/// XRPC client bound to one service, optionally carrying a session.
#[derive(Debug, Clone)]
pub struct XrpcClient {
    http: reqwest::Client,
    service: Url,
    session: Option<Session>,
}

impl XrpcClient {
    pub fn new(service: &str) -> Result<Self> {
        let service = Url::parse(service)
            .map_err(|e| SkeinError::Config(format!("invalid service URL {}: {}", service, e)))?;
        Ok(Self {
            http: skein_reqwest_client(),
            service,
            session: None,
        })
    }

    /// Client against the public AppView, no credentials.
    pub fn public() -> Self {
        Self {
            http: skein_reqwest_client(),
            // The constant is known-valid
            service: Url::parse(PUBLIC_APPVIEW).unwrap_or_else(|_| unreachable!()),
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn clear_session(&mut self) {
        self.session = None;
    }

    fn endpoint_url(&self, nsid: &str) -> Result<Url> {
        self.service
            .join(&format!("/xrpc/{}", nsid))
            .map_err(|e| SkeinError::Config(format!("bad endpoint {}: {}", nsid, e)))
    }

    /// GET an XRPC query endpoint, returning the raw JSON envelope.
    pub async fn get(&self, nsid: &str, params: &[(String, String)]) -> Result<Value> {
        let url = self.endpoint_url(nsid)?;
        debug!("GET {} ({} params)", nsid, params.len());

        let mut request = self.http.get(url).query(params);
        if let Some(session) = &self.session {
            request = request.bearer_auth(session.bearer());
        }

        let response = request.send().await.map_err(|e| SkeinError::Transport {
            endpoint: nsid.to_string(),
            source: e,
        })?;

        Self::decode(nsid, response).await
    }

    /// POST an XRPC procedure endpoint with a JSON body.
    pub async fn post(&self, nsid: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint_url(nsid)?;
        debug!("POST {}", nsid);

        let mut request = self.http.post(url).json(body);
        if let Some(session) = &self.session {
            request = request.bearer_auth(session.bearer());
        }

        let response = request.send().await.map_err(|e| SkeinError::Transport {
            endpoint: nsid.to_string(),
            source: e,
        })?;

        Self::decode(nsid, response).await
    }

    async fn decode(nsid: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await.map_err(|e| SkeinError::Transport {
            endpoint: nsid.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(SkeinError::UpstreamHttp {
                endpoint: nsid.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| SkeinError::Decode {
            endpoint: nsid.to_string(),
            source: e,
        })
    }

    /// Log in with a handle (or DID) and app password, storing the session
    /// on this client.
    pub async fn login(&mut self, identifier: &str, app_password: &str) -> Result<&Session> {
        let body = serde_json::json!({
            "identifier": identifier,
            "password": app_password,
        });
        let value = self
            .post("com.atproto.server.createSession", &body)
            .await
            .map_err(|e| SkeinError::AuthFailed {
                identifier: identifier.to_string(),
                cause: e.to_string(),
            })?;

        let session: Session =
            serde_json::from_value(value).map_err(|e| SkeinError::AuthFailed {
                identifier: identifier.to_string(),
                cause: format!("unexpected session shape: {}", e),
            })?;

        Ok(self.session.insert(session))
    }

    /// Resolve a handle to its DID via the identity directory.
    pub async fn resolve_handle(&self, handle: &str) -> Result<String> {
        let value = self
            .get(
                "com.atproto.identity.resolveHandle",
                &[("handle".to_string(), handle.to_string())],
            )
            .await?;
        value
            .get("did")
            .and_then(|d| d.as_str())
            .map(str::to_owned)
            .ok_or_else(|| SkeinError::Decode {
                endpoint: "com.atproto.identity.resolveHandle".to_string(),
                source: serde_json::Error::io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "response missing did",
                )),
            })
    }
}
