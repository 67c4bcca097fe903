//! OIDC discovery.
//!
//! When [`BridgeConfig::configure_url`](crate::config::BridgeConfig::configure_url) is set, the
//! bridge fetches the discovery document once at startup and swaps in a new configuration
//! snapshot with the three endpoints filled. A failed fetch is fatal; the bridge refuses to
//! start on a half-configured IdP.

// self
use crate::{
	_prelude::*,
	config::BridgeConfig,
	error::{ConfigError, DiscoveryErrorKind},
};

/// The subset of the OIDC discovery document the bridge consumes.
#[derive(Clone, Debug, Deserialize)]
pub struct DiscoveryDocument {
	/// Authorization endpoint.
	pub authorization_endpoint: Url,
	/// Token endpoint.
	pub token_endpoint: Url,
	/// User-info endpoint.
	pub userinfo_endpoint: Url,
}

/// Fetches the discovery document from `uri`. Single GET, no retry.
pub async fn fetch(http: &ReqwestClient, uri: &Url) -> Result<DiscoveryDocument, ConfigError> {
	let discovery = |source: DiscoveryErrorKind| ConfigError::Discovery {
		uri: uri.as_str().into(),
		source,
	};
	let response = http
		.get(uri.clone())
		.send()
		.await
		.and_then(reqwest::Response::error_for_status)
		.map_err(|e| discovery(e.into()))?;
	let body = response.bytes().await.map_err(|e| discovery(e.into()))?;
	let mut deserializer = serde_json::Deserializer::from_slice(&body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|e| discovery(e.into()))
}

/// Produces a new configuration snapshot with the discovered endpoints filled in.
///
/// Discovered endpoints win over any explicitly configured ones; the IdP's published metadata is
/// authoritative.
pub fn apply(config: &BridgeConfig, document: DiscoveryDocument) -> BridgeConfig {
	let mut config = config.clone();

	config.authorize_url = Some(document.authorization_endpoint);
	config.token_url = Some(document.token_endpoint);
	config.user_info_url = Some(document.userinfo_endpoint);

	config
}
