//! Session issuance.
//!
//! Once a host user is resolved, the bridge asks the host to mint a refresh token and derive an
//! access token from it, then packages both into the JSON bundle the bundled client script stores
//! in the browser.

// crates.io
use base64::Engine;
// self
use crate::{
	_prelude::*,
	error::IdentityError,
	identity::{HostIdentity, HostUser},
};

/// Auth-provider identifier the bridge reports in issued session bundles.
pub const PROVIDER_ID: &str = "openid";

/// Host session credentials packaged for the client script.
#[derive(Clone, Debug)]
pub struct SessionBundle {
	/// Host access token.
	pub access_token: String,
	/// Host refresh token.
	pub refresh_token: String,
	/// Base URL of the host, echoed from the original authorize request.
	pub host_url: String,
	/// Client identifier echoed from the original authorize request.
	pub client_id: Option<String>,
	/// Access-token lifetime in whole seconds.
	pub expires: i64,
}
impl SessionBundle {
	/// JSON document the token-landing page hands to the client script.
	pub fn to_json(&self) -> String {
		serde_json::json!({
			"access_token": self.access_token,
			"token_type": "Bearer",
			"refresh_token": self.refresh_token,
			"ha_auth_provider": PROVIDER_ID,
			"hassUrl": self.host_url,
			"client_id": self.client_id,
			"expires": self.expires,
		})
		.to_string()
	}
}

/// Mints a refresh/access token pair for `user` through the host boundary.
///
/// The refresh token is bound to [`PROVIDER_ID`], not to the browser-echoed `client_id`; the
/// echoed value only travels onward inside the bundle for the client script.
pub async fn issue_session(
	identity: &dyn HostIdentity,
	user: &HostUser,
	host_url: &str,
	client_id: Option<&str>,
) -> Result<SessionBundle, IdentityError> {
	let refresh_token = identity.create_refresh_token(&user.id, Some(PROVIDER_ID)).await?;
	let access_token = identity.create_access_token(&refresh_token).await?;

	Ok(SessionBundle {
		access_token: access_token.token,
		refresh_token: refresh_token.token,
		host_url: host_url.to_owned(),
		client_id: client_id.map(ToOwned::to_owned),
		expires: access_token.expires_in.whole_seconds(),
	})
}

/// Opaque `state` value appended to the final redirect, a base64 JSON object the client script
/// decodes to finish login.
pub fn redirect_state(host_url: &str, client_id: Option<&str>) -> String {
	let state = serde_json::json!({ "hassUrl": host_url, "clientId": client_id }).to_string();

	base64::engine::general_purpose::STANDARD.encode(state)
}
