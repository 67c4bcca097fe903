//! Token exchange client.
//!
//! Talks to the IdP's token and user-info endpoints. One bounded-timeout request per operation,
//! no retry; any failure is terminal for the login attempt.

// std
use std::{borrow::Cow, time::Duration as StdDuration};
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId, ClientSecret, RedirectUrl, TokenResponse as _,
	TokenUrl, basic::BasicClient,
};
// self
use crate::{
	_prelude::*,
	config::{BridgeConfig, IdpEndpoints},
	error::ExchangeError,
};

/// Timeout applied to every outbound IdP request.
pub const IDP_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Redacted token wrapper keeping IdP-issued material out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Tokens returned by the IdP's token endpoint; in-memory only, never persisted.
#[derive(Clone, Debug)]
pub struct TokenResponse {
	/// Access token presented to the user-info endpoint.
	pub access_token: TokenSecret,
}

/// Claims returned by the IdP's user-info endpoint.
#[derive(Clone, Debug)]
pub struct UserInfo(HashMap<String, serde_json::Value>);
impl UserInfo {
	/// Username claim under `field`; empty and non-string values count as absent.
	pub fn username(&self, field: &str) -> Option<&str> {
		self.0.get(field).and_then(serde_json::Value::as_str).filter(|u| !u.is_empty())
	}
}

/// HTTP client facade over the IdP's token and user-info endpoints.
#[derive(Clone, Debug)]
pub struct ExchangeClient {
	http: ReqwestClient,
}
impl ExchangeClient {
	/// Builds the facade with its bounded-timeout, redirect-free HTTP client.
	pub fn new() -> Result<Self> {
		let http = ReqwestClient::builder()
			.timeout(IDP_TIMEOUT)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(crate::error::ConfigError::HttpClient)?;

		Ok(Self { http })
	}

	/// Shared HTTP client, reused for discovery fetches.
	pub(crate) fn http(&self) -> &ReqwestClient {
		&self.http
	}

	/// Exchanges an authorization code for tokens at the IdP's token endpoint.
	///
	/// Client credentials travel as HTTP Basic auth or as form fields per
	/// [`BridgeConfig::use_header_auth`].
	pub async fn exchange_code(
		&self,
		config: &BridgeConfig,
		endpoints: &IdpEndpoints,
		code: &str,
		redirect_uri: &str,
	) -> Result<TokenResponse, ExchangeError> {
		let auth_type =
			if config.use_header_auth { AuthType::BasicAuth } else { AuthType::RequestBody };
		let redirect_uri =
			RedirectUrl::new(redirect_uri.to_owned()).map_err(ExchangeError::InvalidRedirect)?;
		let client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.clone()))
			.set_token_uri(TokenUrl::from_url(endpoints.token_url.clone()))
			.set_auth_type(auth_type);
		let response = client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_uri))
			.request_async(&self.http)
			.await?;

		Ok(TokenResponse {
			access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		})
	}

	/// Fetches the authenticated subject's claims with a bearer GET.
	pub async fn fetch_user_info(
		&self,
		endpoints: &IdpEndpoints,
		access_token: &TokenSecret,
	) -> Result<UserInfo, ExchangeError> {
		let response = self
			.http
			.get(endpoints.user_info_url.clone())
			.bearer_auth(access_token.expose())
			.send()
			.await
			.map_err(ExchangeError::UserInfoTransport)?;
		let status = response.status();

		if !status.is_success() {
			return Err(ExchangeError::UserInfoStatus { status: status.as_u16() });
		}

		let body = response.bytes().await.map_err(ExchangeError::UserInfoTransport)?;
		let mut deserializer = serde_json::Deserializer::from_slice(&body);
		let claims = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(ExchangeError::UserInfoDecode)?;

		Ok(UserInfo(claims))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn user_info(value: serde_json::Value) -> UserInfo {
		UserInfo(serde_json::from_value(value).unwrap())
	}

	#[test]
	fn token_secret_formatters_should_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.expose(), "super-secret");
	}

	#[test]
	fn username_should_treat_empty_and_non_string_claims_as_absent() {
		let info = user_info(serde_json::json!({
			"preferred_username": "alice",
			"nickname": "",
			"sub": 42,
		}));

		assert_eq!(info.username("preferred_username"), Some("alice"));
		assert_eq!(info.username("nickname"), None);
		assert_eq!(info.username("sub"), None);
		assert_eq!(info.username("email"), None);
	}
}
