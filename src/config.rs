//! Bridge configuration.
//!
//! A [`BridgeConfig`] snapshot is immutable once built; runtime updates happen by swapping a new
//! snapshot into the shared [`ConfigHandle`], so in-flight logins keep the snapshot they started
//! with.

// self
use crate::{_prelude::*, error::ConfigError};

/// Path the IdP redirects back to after user consent.
pub const CALLBACK_PATH: &str = "/auth/openid/callback";

/// Static configuration of the bridge.
#[derive(Clone, Debug, Deserialize)]
pub struct BridgeConfig {
	/// OAuth2 client identifier registered at the IdP.
	pub client_id: String,
	/// OAuth2 client secret registered at the IdP.
	pub client_secret: String,
	/// OIDC discovery document URI; when set, the three endpoint fields below are filled from it
	/// at startup.
	#[serde(default)]
	pub configure_url: Option<Url>,
	/// Authorization endpoint of the IdP.
	#[serde(default)]
	pub authorize_url: Option<Url>,
	/// Token endpoint of the IdP.
	#[serde(default)]
	pub token_url: Option<Url>,
	/// User-info endpoint of the IdP.
	#[serde(default)]
	pub user_info_url: Option<Url>,
	/// Space-separated scopes requested from the IdP.
	#[serde(default = "default_scope")]
	pub scope: String,
	/// User-info claim holding the username to map onto a host user.
	#[serde(default = "default_username_field")]
	pub username_field: String,
	/// Whether unknown usernames should be provisioned on first login; rejected at validation, the
	/// bridge only maps onto pre-existing host users.
	#[serde(default)]
	pub create_user: bool,
	/// Hide the host's native login form and leave the IdP button as the only way in.
	#[serde(default)]
	pub block_login: bool,
	/// Label of the IdP button injected into the host login page.
	#[serde(default = "default_openid_text")]
	pub openid_text: String,
	/// Send client credentials to the token endpoint via HTTP Basic auth rather than as form
	/// fields.
	#[serde(default = "default_use_header_auth")]
	pub use_header_auth: bool,
}
impl BridgeConfig {
	/// Rejects option combinations the bridge cannot serve.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.create_user {
			return Err(ConfigError::UnsupportedCreateUser);
		}
		if self.configure_url.is_none() && !self.has_explicit_endpoints() {
			return Err(ConfigError::MissingEndpoints);
		}

		Ok(())
	}

	/// Resolved IdP endpoint set; fails until discovery or explicit configuration filled all
	/// three endpoints.
	pub fn endpoints(&self) -> Result<IdpEndpoints, ConfigError> {
		match (&self.authorize_url, &self.token_url, &self.user_info_url) {
			(Some(authorize_url), Some(token_url), Some(user_info_url)) => Ok(IdpEndpoints {
				authorize_url: authorize_url.clone(),
				token_url: token_url.clone(),
				user_info_url: user_info_url.clone(),
			}),
			_ => Err(ConfigError::MissingEndpoints),
		}
	}

	fn has_explicit_endpoints(&self) -> bool {
		self.authorize_url.is_some() && self.token_url.is_some() && self.user_info_url.is_some()
	}
}

/// Fully resolved IdP endpoints.
#[derive(Clone, Debug)]
pub struct IdpEndpoints {
	/// Authorization endpoint.
	pub authorize_url: Url,
	/// Token endpoint.
	pub token_url: Url,
	/// User-info endpoint.
	pub user_info_url: Url,
}

/// Shared handle over the active configuration snapshot.
///
/// Readers [`load`](Self::load) an [`Arc`] of the current snapshot and never observe partial
/// updates; writers [`swap`](Self::swap) in a complete replacement.
#[derive(Clone, Debug)]
pub struct ConfigHandle(Arc<RwLock<Arc<BridgeConfig>>>);
impl ConfigHandle {
	/// Wraps an initial snapshot.
	pub fn new(config: BridgeConfig) -> Self {
		Self(Arc::new(RwLock::new(Arc::new(config))))
	}

	/// Current snapshot.
	pub fn load(&self) -> Arc<BridgeConfig> {
		self.0.read().clone()
	}

	/// Replaces the active snapshot; in-flight logins keep the one they loaded.
	pub fn swap(&self, config: BridgeConfig) {
		*self.0.write() = Arc::new(config);
	}
}

fn default_scope() -> String {
	"openid profile email".into()
}

fn default_username_field() -> String {
	"preferred_username".into()
}

fn default_openid_text() -> String {
	"OpenID / OAuth2 Authentication".into()
}

fn default_use_header_auth() -> bool {
	true
}
