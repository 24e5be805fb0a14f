//! ICE relay descriptors handed to clients for peer-connection setup.
//!
//! The list is built once from static public STUN/TURN defaults plus an
//! optional deployment-supplied TURN relay (see [`crate::config::TurnServerConfig`]).

use crate::config::TurnServerConfig;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// Public STUN servers.
const DEFAULT_STUN_URLS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
    "stun:stun4.l.google.com:19302",
    "stun:stun.stunprotocol.org:3478",
    "stun:stun.voiparound.com",
    "stun:stun.voipbuster.com",
    "stun:stun.voipstunt.com",
    "stun:stun.voxgratia.org",
];

/// Free OpenRelay TURN servers (rate limited, shared credentials).
const DEFAULT_TURN_URLS: &[&str] = &[
    "turn:openrelay.metered.ca:80",
    "turn:openrelay.metered.ca:443",
    "turn:openrelay.metered.ca:443?transport=tcp",
];

const OPENRELAY_USERNAME: &str = "openrelayproject";
const OPENRELAY_CREDENTIAL: &str = "openrelayproject";

/// One `RTCIceServer` entry as the browser expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// STUN entry (no credentials).
    #[must_use]
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: url.into(),
            username: None,
            credential: None,
        }
    }

    /// TURN entry with credentials.
    #[must_use]
    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: url.into(),
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }
}

/// Build the relay list: static defaults, then the configured TURN relay if any.
#[must_use]
pub fn build_ice_servers(turn: Option<&TurnServerConfig>) -> Vec<IceServer> {
    let mut servers: Vec<IceServer> = DEFAULT_STUN_URLS
        .iter()
        .map(|url| IceServer::stun(*url))
        .collect();

    servers.extend(
        DEFAULT_TURN_URLS
            .iter()
            .map(|url| IceServer::turn(*url, OPENRELAY_USERNAME, OPENRELAY_CREDENTIAL)),
    );

    if let Some(turn) = turn {
        servers.push(IceServer::turn(
            turn.url.clone(),
            turn.username.clone(),
            turn.credential.expose_secret(),
        ));
    }

    servers
}
