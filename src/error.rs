//! Error taxonomy of the bridge.

// crates.io
use oauth2::{
	HttpClientError, RequestTokenError, StandardErrorResponse, basic::BasicErrorResponseType,
};
// self
use crate::_prelude::*;

/// Result alias defaulting to the crate-level [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error of this crate.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Configuration was incomplete or unresolvable.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// A login attempt failed at one of the callback stages.
	#[error(transparent)]
	Flow(#[from] FlowError),
	/// The code-for-token exchange or user-info fetch failed.
	#[error(transparent)]
	Exchange(#[from] ExchangeError),
	/// The host identity backend failed.
	#[error(transparent)]
	Identity(#[from] IdentityError),
	/// The pending-request store failed.
	#[error(transparent)]
	PendingStore(#[from] PendingStoreError),
}

/// Configuration errors.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// None of discovery and explicit endpoints yielded a usable endpoint set.
	#[error("no authorize/token/user-info endpoints available; set `configure_url` or the explicit endpoint fields")]
	MissingEndpoints,
	/// Provisioning unknown users on first login is not supported.
	#[error("`create_user` is not supported; map IdP usernames onto pre-existing host users instead")]
	UnsupportedCreateUser,
	/// The outbound HTTP client could not be constructed.
	#[error("failed to construct the IdP HTTP client")]
	HttpClient(#[source] reqwest::Error),
	/// The discovery document could not be fetched or decoded.
	#[error("failed to load the discovery document from {uri}")]
	Discovery {
		/// Discovery document URI.
		uri: Box<str>,
		/// Underlying transport or decode failure.
		#[source]
		source: DiscoveryErrorKind,
	},
}

/// What went wrong while loading a discovery document.
#[derive(Debug, ThisError)]
pub enum DiscoveryErrorKind {
	/// Transport-level failure.
	#[error(transparent)]
	Transport(#[from] reqwest::Error),
	/// The response body was not a valid discovery document.
	#[error(transparent)]
	Decode(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// Terminal failures of an individual login attempt; each maps onto a browser-facing alert.
#[derive(Debug, ThisError)]
pub enum FlowError {
	/// The callback request lacked a required query parameter.
	#[error("callback request lacked the `{name}` parameter")]
	MissingParameter {
		/// Name of the missing parameter.
		name: Box<str>,
	},
	/// The callback carried no recognized `state` or the pending request expired.
	#[error("invalid or expired `state` token")]
	InvalidState,
	/// The code-for-token exchange or user-info fetch failed.
	#[error("authorization code exchange failed")]
	ExchangeFailure(#[source] ExchangeError),
	/// The user-info response lacked the configured username claim.
	#[error("user-info response carried no `{claim}` claim")]
	NoUsernameClaim {
		/// The configured username claim.
		claim: Box<str>,
	},
	/// No host user carries a credential matching the asserted username.
	#[error("no host user matches username `{username}`")]
	UserNotFound {
		/// Username asserted by the IdP.
		username: Box<str>,
	},
}
impl FlowError {
	/// Browser-facing alert text for the error page.
	pub fn alert_message(&self) -> String {
		match self {
			Self::MissingParameter { .. } =>
				"OpenID login failed! Missing code or state parameter.".into(),
			Self::InvalidState => "OpenID login failed! Invalid state parameter.".into(),
			Self::ExchangeFailure(_) =>
				"OpenID login failed! Could not exchange code for tokens or fetch user info.".into(),
			Self::NoUsernameClaim { .. } =>
				"OpenID login failed! No username found in user info.".into(),
			Self::UserNotFound { username } => format!(
				"OpenID login succeeded, but user not found! Please ensure the user '{username}' exists and is enabled for login."
			),
		}
	}
}

/// Errors raised while talking to the IdP's token or user-info endpoint.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// The token endpoint returned an OAuth2 error response.
	///
	/// `StandardErrorResponse` is not a `std::error::Error`; the response is surfaced through
	/// `Display` instead of a source chain.
	#[error("token endpoint returned an error response: {0}")]
	TokenEndpoint(Box<StandardErrorResponse<BasicErrorResponseType>>),
	/// Transport-level failure while reaching the token endpoint.
	#[error("token request transport failure")]
	TokenTransport(#[source] HttpClientError<reqwest::Error>),
	/// The token response could not be decoded.
	#[error("token response decode failure")]
	TokenDecode(#[source] serde_path_to_error::Error<serde_json::Error>),
	/// The token endpoint returned an unexpected response shape.
	#[error("token endpoint returned an unexpected response: {0}")]
	TokenUnexpected(String),
	/// The recomputed redirect URI was not a valid absolute URL.
	#[error("redirect URI is not a valid URL")]
	InvalidRedirect(#[source] url::ParseError),
	/// Transport-level failure while reaching the user-info endpoint.
	#[error("user-info request transport failure")]
	UserInfoTransport(#[source] reqwest::Error),
	/// The user-info endpoint returned a non-success status.
	#[error("user-info endpoint returned status {status}")]
	UserInfoStatus {
		/// HTTP status of the user-info response.
		status: u16,
	},
	/// The user-info response was not a JSON object.
	#[error("user-info response decode failure")]
	UserInfoDecode(#[source] serde_path_to_error::Error<serde_json::Error>),
}
impl
	From<
		RequestTokenError<
			HttpClientError<reqwest::Error>,
			StandardErrorResponse<BasicErrorResponseType>,
		>,
	> for ExchangeError
{
	fn from(
		e: RequestTokenError<
			HttpClientError<reqwest::Error>,
			StandardErrorResponse<BasicErrorResponseType>,
		>,
	) -> Self {
		match e {
			RequestTokenError::ServerResponse(r) => Self::TokenEndpoint(Box::new(r)),
			RequestTokenError::Request(e) => Self::TokenTransport(e),
			RequestTokenError::Parse(e, _) => Self::TokenDecode(e),
			RequestTokenError::Other(message) => Self::TokenUnexpected(message),
		}
	}
}

/// Errors raised by a host identity backend.
#[derive(Debug, ThisError)]
pub enum IdentityError {
	/// The backend could not enumerate users.
	#[error("failed to enumerate host users")]
	Enumerate(#[source] Box<dyn StdError + Send + Sync>),
	/// The backend refused to mint a credential for the resolved user.
	#[error("failed to issue host credentials for user {user_id}")]
	Issue {
		/// The resolved host user.
		user_id: Box<str>,
		/// Underlying backend failure.
		#[source]
		source: Box<dyn StdError + Send + Sync>,
	},
}

/// Errors raised by a pending-request store backend.
#[derive(Debug, ThisError)]
pub enum PendingStoreError {
	/// The backing storage failed.
	#[error("pending-request store backend failure")]
	Backend(#[source] Box<dyn StdError + Send + Sync>),
}
