//! Caller identity resolution.
//!
//! First match wins:
//! 1. identity headers injected by a tailnet reverse proxy (`tailscale serve`)
//! 2. a whois lookup of the caller's address on the tailnet client

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use thiserror::Error;

use crate::net::ServeMode;
use crate::tailnet::{NetworkClient, NetworkError};

/// Login of the authenticated caller, set by the reverse proxy.
pub const USER_LOGIN_HEADER: &str = "tailscale-user-login";

/// Display name of the authenticated caller, set by the reverse proxy.
pub const USER_NAME_HEADER: &str = "tailscale-user-name";

/// A resolved human identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub login_name: String,
    pub display_name: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("tagged nodes do not have a user identity")]
    NoUserIdentity,

    #[error("failed to identify remote user")]
    UnresolvedIdentity,

    #[error("failed to identify user via embedded tailnet node: {source}")]
    EmbeddedUnavailable {
        #[source]
        source: NetworkError,
    },

    #[error("not accessed via the tailnet - use 'tailscale serve' or set TS_AUTHKEY to run as a tailnet node")]
    NotOnTailnet {
        #[source]
        source: NetworkError,
    },
}

impl IdentityError {
    /// The lookup itself failed, as opposed to finding no usable identity.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            IdentityError::EmbeddedUnavailable { .. } | IdentityError::NotOnTailnet { .. }
        )
    }

    /// Whether the failure points at a broken identity subsystem rather than
    /// a caller who simply did not come in over the tailnet.
    pub fn is_fault(&self) -> bool {
        matches!(self, IdentityError::EmbeddedUnavailable { .. })
    }

    fn unavailable(mode: ServeMode, source: NetworkError) -> Self {
        match mode {
            ServeMode::Embedded => IdentityError::EmbeddedUnavailable { source },
            ServeMode::Standard => IdentityError::NotOnTailnet { source },
        }
    }
}

/// Resolves callers against headers first, then the tailnet client.
#[derive(Clone)]
pub struct IdentityResolver {
    client: Arc<dyn NetworkClient>,
    mode: ServeMode,
}

impl IdentityResolver {
    pub fn new(client: Arc<dyn NetworkClient>, mode: ServeMode) -> Self {
        Self { client, mode }
    }

    pub async fn resolve(
        &self,
        remote_addr: SocketAddr,
        headers: &HeaderMap,
    ) -> Result<Identity, IdentityError> {
        if let Some(identity) = from_headers(headers) {
            return Ok(identity);
        }

        let whois = self
            .client
            .whois(remote_addr)
            .await
            .map_err(|e| IdentityError::unavailable(self.mode, e))?;

        if whois.is_tagged() {
            return Err(IdentityError::NoUserIdentity);
        }
        match whois.user_profile {
            Some(profile) if !profile.login_name.is_empty() => Ok(Identity {
                login_name: profile.login_name,
                display_name: profile.display_name,
            }),
            _ => Err(IdentityError::UnresolvedIdentity),
        }
    }
}

/// Identity headers are trusted verbatim; the proxy already authenticated.
/// Values are raw bytes on the wire, so non-ASCII names are decoded as UTF-8.
fn from_headers(headers: &HeaderMap) -> Option<Identity> {
    let login = header_text(headers, USER_LOGIN_HEADER).filter(|v| !v.is_empty())?;
    Some(Identity {
        login_name: login,
        display_name: header_text(headers, USER_NAME_HEADER).unwrap_or_default(),
    })
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tailnet::{Status, UserProfile, WhoIs, WhoIsNode};
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeClient {
        whois: fn() -> Result<WhoIs, NetworkError>,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn new(whois: fn() -> Result<WhoIs, NetworkError>) -> Arc<Self> {
            Arc::new(Self {
                whois,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl NetworkClient for FakeClient {
        async fn status(&self) -> Result<Status, NetworkError> {
            Err(NetworkError::Unavailable("fake".into()))
        }

        async fn whois(&self, _remote_addr: SocketAddr) -> Result<WhoIs, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.whois)()
        }
    }

    fn person() -> Result<WhoIs, NetworkError> {
        Ok(WhoIs {
            node: Some(WhoIsNode::default()),
            user_profile: Some(UserProfile {
                login_name: "ana@example.com".into(),
                display_name: "Ana Lima".into(),
            }),
        })
    }

    fn tagged() -> Result<WhoIs, NetworkError> {
        Ok(WhoIs {
            node: Some(WhoIsNode {
                name: "ci".into(),
                tags: vec!["tag:ci".into()],
            }),
            user_profile: Some(UserProfile {
                login_name: "tagged-devices".into(),
                display_name: String::new(),
            }),
        })
    }

    fn anonymous() -> Result<WhoIs, NetworkError> {
        Ok(WhoIs {
            node: Some(WhoIsNode::default()),
            user_profile: None,
        })
    }

    fn absent() -> Result<WhoIs, NetworkError> {
        Err(NetworkError::Unavailable("no such socket".into()))
    }

    fn caller() -> SocketAddr {
        "100.64.0.20:51000".parse().unwrap()
    }

    #[tokio::test]
    async fn headers_take_precedence() {
        let client = FakeClient::new(tagged);
        let resolver = IdentityResolver::new(client.clone(), ServeMode::Embedded);
        let mut headers = HeaderMap::new();
        headers.insert(USER_LOGIN_HEADER, "bo@example.com".parse().unwrap());
        headers.insert(USER_NAME_HEADER, "Bo".parse().unwrap());

        let identity = resolver.resolve(caller(), &headers).await.unwrap();
        assert_eq!(identity.login_name, "bo@example.com");
        assert_eq!(identity.display_name, "Bo");
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_ascii_headers_are_kept_verbatim() {
        let client = FakeClient::new(person);
        let resolver = IdentityResolver::new(client.clone(), ServeMode::Standard);
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_LOGIN_HEADER,
            HeaderValue::from_bytes("josé@example.com".as_bytes()).unwrap(),
        );
        headers.insert(
            USER_NAME_HEADER,
            HeaderValue::from_bytes("José Núñez".as_bytes()).unwrap(),
        );

        let identity = resolver.resolve(caller(), &headers).await.unwrap();
        assert_eq!(identity.login_name, "josé@example.com");
        assert_eq!(identity.display_name, "José Núñez");
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_login_header_falls_through() {
        let client = FakeClient::new(person);
        let resolver = IdentityResolver::new(client.clone(), ServeMode::Embedded);
        let mut headers = HeaderMap::new();
        headers.insert(USER_LOGIN_HEADER, "".parse().unwrap());

        let identity = resolver.resolve(caller(), &headers).await.unwrap();
        assert_eq!(identity.login_name, "ana@example.com");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn whois_resolves_person() {
        let resolver = IdentityResolver::new(FakeClient::new(person), ServeMode::Embedded);
        let identity = resolver.resolve(caller(), &HeaderMap::new()).await.unwrap();
        assert_eq!(
            identity,
            Identity {
                login_name: "ana@example.com".into(),
                display_name: "Ana Lima".into(),
            }
        );
    }

    #[tokio::test]
    async fn tagged_node_has_no_user() {
        let resolver = IdentityResolver::new(FakeClient::new(tagged), ServeMode::Embedded);
        let err = resolver.resolve(caller(), &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, IdentityError::NoUserIdentity));
        assert!(!err.is_unavailable());
    }

    #[tokio::test]
    async fn missing_profile_is_unresolved() {
        let resolver = IdentityResolver::new(FakeClient::new(anonymous), ServeMode::Standard);
        let err = resolver.resolve(caller(), &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, IdentityError::UnresolvedIdentity));
    }

    #[tokio::test]
    async fn unavailable_client_depends_on_mode() {
        let embedded = IdentityResolver::new(FakeClient::new(absent), ServeMode::Embedded);
        let err = embedded.resolve(caller(), &HeaderMap::new()).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.is_fault());
        assert!(err.to_string().contains("embedded tailnet node"));

        let standard = IdentityResolver::new(FakeClient::new(absent), ServeMode::Standard);
        let err = standard.resolve(caller(), &HeaderMap::new()).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(!err.is_fault());
        assert!(err.to_string().starts_with("not accessed via the tailnet"));
    }
}
