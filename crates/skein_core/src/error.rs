use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkeinError>;

#[derive(Error, Diagnostic, Debug)]
pub enum SkeinError {
    #[error("invalid input: {message}")]
    #[diagnostic(
        code(skein_core::invalid_input),
        help("Check the URL, handle, or query you provided before retrying")
    )]
    InvalidInput { message: String },

    #[error("upstream returned HTTP {status} from {endpoint}")]
    #[diagnostic(
        code(skein_core::upstream_http),
        help("The Bluesky API rejected the request. Inspect the body for details.")
    )]
    UpstreamHttp {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("request to {endpoint} failed")]
    #[diagnostic(
        code(skein_core::transport),
        help("Check network connectivity and the configured service URL")
    )]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode response from {endpoint}")]
    #[diagnostic(code(skein_core::decode))]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("authentication failed for {identifier}")]
    #[diagnostic(
        code(skein_core::auth_failed),
        help("App passwords can be created at https://bsky.app/settings/app-passwords")
    )]
    AuthFailed { identifier: String, cause: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(skein_core::config))]
    Config(String),
}

impl SkeinError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
