//! HTTP surface.
//!
//! Builds the axum router hosts mount to expose the bridge: the authorize/callback pair, the
//! bundled client script, and the wrapped host login routes.

// crates.io
use axum::{
	Json, Router,
	extract::{Query, State},
	http::{StatusCode, header},
	response::{Html, IntoResponse, Response},
	routing::{get, post},
};
// self
use crate::{
	_prelude::*,
	flow::{Bridge, CallbackOutcome},
	pages,
	surface::LoginSurface,
};

/// Shared state behind every bridge route.
#[derive(Clone, Debug)]
pub struct BridgeState {
	/// Flow orchestrator.
	pub bridge: Arc<Bridge>,
	/// Wrapped host login surface.
	pub surface: Arc<LoginSurface>,
}

/// Builds the bridge router.
pub fn router(state: BridgeState) -> Router {
	Router::new()
		.route("/auth/openid/authorize", get(authorize))
		.route("/auth/openid/callback", get(callback))
		.route("/openid/authorize.js", get(client_script))
		.route("/auth/authorize", get(login_page))
		.route("/auth/login_flow", post(login_flow))
		.with_state(state)
}

async fn authorize(
	State(state): State<BridgeState>,
	Query(params): Query<HashMap<String, String>>,
) -> Response {
	match state.bridge.begin_authorization(params).await {
		Ok(url) => found(url.as_str()),
		Err(e) => {
			tracing::error!(error = ?e, "failed to begin authorization");

			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		},
	}
}

async fn callback(
	State(state): State<BridgeState>,
	Query(params): Query<HashMap<String, String>>,
) -> Response {
	match state.bridge.handle_callback(params).await {
		Ok(CallbackOutcome::NativeRedirect(location)) => found(&location),
		Ok(CallbackOutcome::TokenPage(html) | CallbackOutcome::ErrorPage(html)) =>
			Html(html).into_response(),
		Err(e) => {
			tracing::error!(error = ?e, "callback handling failed");

			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		},
	}
}

async fn client_script() -> impl IntoResponse {
	(
		[
			(header::CONTENT_TYPE, "application/javascript"),
			(header::CACHE_CONTROL, "public, max-age=31536000"),
		],
		pages::AUTHORIZE_SCRIPT,
	)
}

async fn login_page(State(state): State<BridgeState>) -> Html<String> {
	Html(state.surface.login_page().await)
}

async fn login_flow(
	State(state): State<BridgeState>,
	Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
	Json(state.surface.login_flow(body).await)
}

// Built by hand; axum's `Redirect::temporary` answers 307 and the flow's contract is a literal
// 302 Found.
fn found(location: &str) -> Response {
	(StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}
