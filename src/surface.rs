//! Login-surface interception.
//!
//! Rather than patching the host's router in place, the host hands the bridge its login-page
//! renderer and login-flow handler as a [`HostLoginSurface`]; [`LoginSurface`] wraps both exactly
//! once with a fixed composition order (original handler wrapped by the bridge override).

// self
use crate::{_prelude::*, config::ConfigHandle};

/// Script tag injected into the host's login page.
pub const SCRIPT_TAG: &str = r#"<script src="/openid/authorize.js"></script>"#;

/// Boxed future returned by [`HostLoginSurface`] operations.
pub type SurfaceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// The host's native login entry points.
pub trait HostLoginSurface
where
	Self: Send + Sync,
{
	/// Renders the host's login page HTML.
	fn render_login_page(&self) -> SurfaceFuture<'_, String>;

	/// Handles a login-flow submission, returning the host's JSON form document.
	fn handle_login_flow(&self, body: serde_json::Value) -> SurfaceFuture<'_, serde_json::Value>;
}

/// Bridge override around a [`HostLoginSurface`].
#[derive(Clone)]
pub struct LoginSurface {
	host: Arc<dyn HostLoginSurface>,
	config: ConfigHandle,
}
impl LoginSurface {
	/// Wraps the host's login surface.
	pub fn new(host: Arc<dyn HostLoginSurface>, config: ConfigHandle) -> Self {
		Self { host, config }
	}

	/// The host's login page with the bridge's client script injected before `</head>`.
	///
	/// Injection is idempotent; a page already carrying the tag is returned unchanged, so
	/// wrapping an already-wrapped surface cannot double-inject.
	pub async fn login_page(&self) -> String {
		inject_script(self.host.render_login_page().await)
	}

	/// The host's login-flow response, augmented with the bridge's `block_login` and
	/// `openid_text` fields.
	///
	/// With `block_login` enabled the host handler is never invoked; a synthetic "no input
	/// required" form document takes its place.
	pub async fn login_flow(&self, body: serde_json::Value) -> serde_json::Value {
		let config = self.config.load();
		let mut content = if config.block_login {
			synthetic_form()
		} else {
			self.host.handle_login_flow(body).await
		};

		if let Some(fields) = content.as_object_mut() {
			fields.insert("block_login".into(), config.block_login.into());
			fields.insert("openid_text".into(), config.openid_text.clone().into());
		}

		content
	}
}
impl Debug for LoginSurface {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginSurface").field("config", &self.config).finish_non_exhaustive()
	}
}

fn inject_script(html: String) -> String {
	if html.contains(SCRIPT_TAG) {
		return html;
	}

	html.replace("</head>", &format!("{SCRIPT_TAG}</head>"))
}

fn synthetic_form() -> serde_json::Value {
	serde_json::json!({
		"type": "form",
		"flow_id": null,
		"handler": [null],
		"data_schema": [],
		"errors": {},
		"description_placeholders": null,
		"last_step": null,
		"preview": null,
		"step_id": "init",
	})
}
