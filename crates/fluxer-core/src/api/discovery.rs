//! The `/.well-known/fluxer` discovery document and how endpoints are derived from it.

use serde::{Deserialize, Serialize};

pub const DISCOVERY_PATH: &str = "/v1/.well-known/fluxer";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DiscoveryDocument {
    #[serde(default)]
    pub endpoints: Endpoints,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Endpoints {
    pub api: Option<String>,
    pub api_client: Option<String>,
    pub gateway: Option<String>,
    pub webapp: Option<String>,
    pub marketing: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl DiscoveryDocument {
    /// What to assume when the server publishes no discovery document
    pub fn fallback(base: &str) -> Self {
        Self {
            endpoints: Endpoints {
                api: Some(base.to_string()),
                api_client: Some(base.to_string()),
                gateway: Some(gateway_for(base)),
                webapp: None,
                marketing: None,
            },
        }
    }

    /// Base URL for client (non-auth) requests
    pub fn client_base<'a>(&'a self, base: &'a str) -> &'a str {
        non_empty(&self.endpoints.api_client)
            .or_else(|| non_empty(&self.endpoints.api))
            .unwrap_or(base)
    }

    /// The web origin client requests claim to come from
    pub fn origin<'a>(&'a self, default: &'a str) -> &'a str {
        non_empty(&self.endpoints.webapp)
            .or_else(|| non_empty(&self.endpoints.marketing))
            .unwrap_or(default)
    }
}

/// The websocket form of an http(s) base URL
// Plain prefix rewriting: `Url::set_scheme` refuses to turn http(s) into ws(s)
pub fn gateway_for(base: &str) -> String {
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    }
}

/// Client bases already end in `/api`, so `/api/v1/...` paths lose their prefix
pub fn normalize_client_endpoint(path: &str) -> &str {
    if path.starts_with("/api/") {
        &path[4..]
    } else {
        path
    }
}
