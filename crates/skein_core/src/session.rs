//! Explicit authentication session.
//!
//! A `Session` is an ordinary value threaded into the client rather than
//! ambient global state. It lives for the process only; nothing here is
//! persisted.

use serde::Deserialize;

/// Bearer credentials plus the authenticated profile, as returned by
/// `com.atproto.server.createSession`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_jwt: String,
    pub refresh_jwt: Option<String>,
    pub handle: String,
    pub did: String,
}

impl Session {
    /// The bearer token value for the Authorization header.
    pub fn bearer(&self) -> &str {
        &self.access_jwt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_from_create_session_response() {
        let session: Session = serde_json::from_value(json!({
            "accessJwt": "access-token",
            "refreshJwt": "refresh-token",
            "handle": "alice.bsky.social",
            "did": "did:plc:alice",
            "email": "ignored@example.com"
        }))
        .unwrap();
        assert_eq!(session.bearer(), "access-token");
        assert_eq!(session.handle, "alice.bsky.social");
        assert_eq!(session.did, "did:plc:alice");
    }
}
