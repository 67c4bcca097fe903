//! Flow orchestration.
//!
//! [`Bridge`] owns the whole login round trip: it builds the outbound redirect to the IdP and
//! registers the pending request, then drives the callback through state validation, token
//! exchange, user-info fetch, user resolution, and session issuance. Every step can fail the
//! attempt; failures surface as the browser-facing error page while infrastructure errors bubble
//! up to the HTTP layer.

// crates.io
use tracing::Instrument;
// self
use crate::{
	_prelude::*,
	config::{BridgeConfig, CALLBACK_PATH, ConfigHandle},
	discovery,
	error::FlowError,
	exchange::ExchangeClient,
	identity::{self, HostIdentity, random_token},
	obs::{self, FlowKind, FlowOutcome},
	pages,
	pending::{PendingAuthRequest, PendingStore},
	session,
};

/// Length of generated `state` tokens; 32 alphanumeric chars carry over 128 bits of randomness.
pub const STATE_LEN: usize = 32;

/// How a finished callback is answered.
#[derive(Clone, Debug)]
pub enum CallbackOutcome {
	/// 302 straight into a native app's custom URI scheme.
	NativeRedirect(String),
	/// 200 with the token-landing page; client script stores the session and navigates.
	TokenPage(String),
	/// 200 with the error page; the attempt is over.
	ErrorPage(String),
}

/// The login bridge.
pub struct Bridge {
	config: ConfigHandle,
	pending: Arc<dyn PendingStore>,
	exchange: ExchangeClient,
	identity: Arc<dyn HostIdentity>,
}
impl Bridge {
	/// Builds a bridge over an already resolvable configuration.
	pub fn new(
		config: BridgeConfig,
		pending: Arc<dyn PendingStore>,
		identity: Arc<dyn HostIdentity>,
	) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			config: ConfigHandle::new(config),
			pending,
			exchange: ExchangeClient::new()?,
			identity,
		})
	}

	/// Builds a bridge, running OIDC discovery first when `configure_url` is set.
	///
	/// A failed discovery fetch is fatal; the caller must not serve login traffic on the
	/// half-configured result.
	pub async fn initialize(
		config: BridgeConfig,
		pending: Arc<dyn PendingStore>,
		identity: Arc<dyn HostIdentity>,
	) -> Result<Self> {
		let bridge = Self::new(config, pending, identity)?;
		let snapshot = bridge.config.load();

		if let Some(uri) = &snapshot.configure_url {
			let document = discovery::fetch(bridge.exchange.http(), uri).await?;

			bridge.config.swap(discovery::apply(&snapshot, document));

			tracing::info!("OpenID configuration loaded successfully");
		}

		Ok(bridge)
	}

	/// Shared handle over the active configuration snapshot.
	pub fn config_handle(&self) -> ConfigHandle {
		self.config.clone()
	}

	/// Begins a login: registers a pending request and returns the IdP authorize redirect.
	pub async fn begin_authorization(&self, params: HashMap<String, String>) -> Result<Url> {
		obs::record_flow_outcome(FlowKind::Authorize, FlowOutcome::Attempt);

		let config = self.config.load();
		let endpoints = config.endpoints()?;
		let state = random_token(STATE_LEN);
		let base_url = params.get("base_url").map(String::as_str).unwrap_or_default();
		let redirect_uri = callback_redirect_uri(base_url);
		let mut url = endpoints.authorize_url;

		url.query_pairs_mut()
			.append_pair("response_type", "code")
			.append_pair("client_id", &config.client_id)
			.append_pair("redirect_uri", &redirect_uri)
			.append_pair("scope", &config.scope)
			.append_pair("state", &state);
		self.pending
			.insert(PendingAuthRequest {
				state,
				original_params: params,
				created_at: OffsetDateTime::now_utc(),
			})
			.await?;

		tracing::debug!(url = %url, "redirecting to IdP authorize endpoint");
		obs::record_flow_outcome(FlowKind::Authorize, FlowOutcome::Success);

		Ok(url)
	}

	/// Runs the callback state machine for one IdP redirect.
	///
	/// Terminal flow failures come back as [`CallbackOutcome::ErrorPage`]; only infrastructure
	/// failures (store, identity backend, unresolved configuration) are `Err`.
	pub async fn handle_callback(
		&self,
		params: HashMap<String, String>,
	) -> Result<CallbackOutcome> {
		obs::record_flow_outcome(FlowKind::Callback, FlowOutcome::Attempt);

		let span = tracing::info_span!("openid_bridge.flow", flow = %FlowKind::Callback);

		match self.run_callback(params).instrument(span).await {
			Ok(outcome) => {
				obs::record_flow_outcome(FlowKind::Callback, FlowOutcome::Success);

				Ok(outcome)
			},
			Err(CallbackFailure::Flow { error, params }) => {
				obs::record_flow_outcome(FlowKind::Callback, FlowOutcome::Failure);

				let redirect =
					params.get("redirect_uri").map(String::as_str).unwrap_or("/");

				Ok(CallbackOutcome::ErrorPage(pages::render_error_page(
					"error",
					&error.alert_message(),
					redirect,
				)))
			},
			Err(CallbackFailure::Internal(e)) => {
				obs::record_flow_outcome(FlowKind::Callback, FlowOutcome::Failure);

				Err(e)
			},
		}
	}

	async fn run_callback(
		&self,
		mut params: HashMap<String, String>,
	) -> Result<CallbackOutcome, CallbackFailure> {
		let Some(code) = params.get("code").cloned().filter(|v| !v.is_empty()) else {
			tracing::warn!("missing code query parameter");

			return Err(flow(FlowError::MissingParameter { name: "code".into() }, params));
		};
		let Some(state) = params.get("state").cloned().filter(|v| !v.is_empty()) else {
			tracing::warn!("missing state query parameter");

			return Err(flow(FlowError::MissingParameter { name: "state".into() }, params));
		};
		let Some(pending) =
			self.pending.take(&state).await.map_err(|e| internal(e.into()))?
		else {
			tracing::warn!(state = %state, "invalid state parameter received");

			return Err(flow(FlowError::InvalidState, params));
		};

		// The original authorize-time parameters win over whatever came back on the callback.
		params.extend(pending.original_params);

		let config = self.config.load();
		let endpoints = config.endpoints().map_err(|e| internal(e.into()))?;
		let base_url = params.get("base_url").cloned().unwrap_or_default();
		let redirect_uri = callback_redirect_uri(&base_url);
		let tokens = match self
			.exchange
			.exchange_code(&config, &endpoints, &code, &redirect_uri)
			.await
		{
			Ok(tokens) => tokens,
			Err(e) => {
				tracing::error!(error = ?e, "token exchange failed");

				return Err(flow(FlowError::ExchangeFailure(e), params));
			},
		};
		let user_info = match self.exchange.fetch_user_info(&endpoints, &tokens.access_token).await
		{
			Ok(user_info) => user_info,
			Err(e) => {
				tracing::error!(error = ?e, "user info fetch failed");

				return Err(flow(FlowError::ExchangeFailure(e), params));
			},
		};
		let Some(username) =
			user_info.username(&config.username_field).map(ToOwned::to_owned)
		else {
			tracing::warn!("no username found in user info");

			return Err(flow(
				FlowError::NoUsernameClaim { claim: config.username_field.clone().into() },
				params,
			));
		};
		let users = self.identity.users().await.map_err(|e| internal(e.into()))?;
		let Some(user) = identity::resolve_user(&users, &username) else {
			tracing::warn!(username = %username, "user not found in host identity store");

			return Err(flow(FlowError::UserNotFound { username: username.into() }, params));
		};
		// A resolved user matched on a credential, so one must exist.
		let Some(credential) = user.credentials.first() else {
			return Err(flow(FlowError::UserNotFound { username: username.into() }, params));
		};
		let client_id = params.get("client_id").cloned();
		let bundle =
			session::issue_session(self.identity.as_ref(), user, &base_url, client_id.as_deref())
				.await
				.map_err(|e| internal(e.into()))?;
		let login_code = self
			.identity
			.create_login_code(credential, client_id.as_deref())
			.await
			.map_err(|e| internal(e.into()))?;
		let redirect = params.get("redirect_uri").cloned().unwrap_or_else(|| "/".into());
		let redirect_state = session::redirect_state(&bundle.host_url, bundle.client_id.as_deref());
		let target = append_auth_query(&redirect, &[
			("auth_callback", "1"),
			("code", &login_code),
			("state", &redirect_state),
			("storeToken", "true"),
		]);

		tracing::debug!(username = %username, "user logged in successfully");

		if is_native_scheme(&target) {
			Ok(CallbackOutcome::NativeRedirect(target))
		} else {
			Ok(CallbackOutcome::TokenPage(pages::render_token_page(&bundle.to_json(), &target)))
		}
	}
}
impl Debug for Bridge {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Bridge").field("config", &self.config).finish_non_exhaustive()
	}
}

enum CallbackFailure {
	Flow { error: FlowError, params: HashMap<String, String> },
	Internal(Error),
}

fn flow(error: FlowError, params: HashMap<String, String>) -> CallbackFailure {
	CallbackFailure::Flow { error, params }
}

fn internal(error: Error) -> CallbackFailure {
	CallbackFailure::Internal(error)
}

/// Rewrites `base_url`'s path to the fixed callback path, dropping any query and fragment.
///
/// The origin is taken as supplied; callers sit behind the documented trust boundary of the
/// authorize surface. An unparseable or absent `base_url` degrades to the bare callback path.
pub fn callback_redirect_uri(base_url: &str) -> String {
	match Url::parse(base_url) {
		Ok(mut url) => {
			url.set_path(CALLBACK_PATH);
			url.set_query(None);
			url.set_fragment(None);

			url.into()
		},
		Err(_) => CALLBACK_PATH.into(),
	}
}

fn append_auth_query(redirect: &str, pairs: &[(&str, &str)]) -> String {
	match Url::parse(redirect) {
		Ok(mut url) => {
			url.query_pairs_mut().extend_pairs(pairs);

			url.into()
		},
		// Relative targets keep working; encode the pairs by hand.
		Err(_) => {
			let mut serializer = url::form_urlencoded::Serializer::new(String::new());

			serializer.extend_pairs(pairs);

			let query = serializer.finish();
			let separator = if redirect.contains('?') { '&' } else { '?' };

			format!("{redirect}{separator}{query}")
		},
	}
}

fn is_native_scheme(target: &str) -> bool {
	Url::parse(target).map(|url| !matches!(url.scheme(), "http" | "https")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn callback_redirect_uri_should_rewrite_path_and_drop_query() {
		assert_eq!(
			callback_redirect_uri("https://ha.example"),
			"https://ha.example/auth/openid/callback"
		);
		assert_eq!(
			callback_redirect_uri("https://ha.example/lovelace?x=1#tab"),
			"https://ha.example/auth/openid/callback"
		);
		assert_eq!(callback_redirect_uri(""), "/auth/openid/callback");
	}

	#[test]
	fn append_auth_query_should_handle_absolute_relative_and_native_targets() {
		let pairs = [("auth_callback", "1"), ("code", "C"), ("storeToken", "true")];

		assert_eq!(
			append_auth_query("https://ha.example/", &pairs),
			"https://ha.example/?auth_callback=1&code=C&storeToken=true"
		);
		assert_eq!(
			append_auth_query("/profile", &pairs),
			"/profile?auth_callback=1&code=C&storeToken=true"
		);
		assert_eq!(
			append_auth_query("/profile?a=b", &pairs),
			"/profile?a=b&auth_callback=1&code=C&storeToken=true"
		);
		assert_eq!(
			append_auth_query("homeassistant://auth-callback", &pairs),
			"homeassistant://auth-callback?auth_callback=1&code=C&storeToken=true"
		);
	}

	#[test]
	fn native_scheme_detection_should_only_match_custom_schemes() {
		assert!(is_native_scheme("homeassistant://auth-callback?code=C"));
		assert!(!is_native_scheme("https://ha.example/?code=C"));
		assert!(!is_native_scheme("/profile?code=C"));
	}

	#[test]
	fn generated_states_should_be_distinct_and_url_safe() {
		let states = (0..64).map(|_| random_token(STATE_LEN)).collect::<Vec<_>>();

		for (i, state) in states.iter().enumerate() {
			assert_eq!(state.len(), STATE_LEN);
			assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
			assert!(!states[..i].contains(state));
		}
	}
}
