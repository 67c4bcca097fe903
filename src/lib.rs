//! Embeddable OpenID Connect login bridge—steer a host application's login surface into an
//! external IdP's Authorization Code flow and hand the host's own session credentials back to
//! the browser or native app.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod identity;
pub mod obs;
pub mod pages;
pub mod pending;
pub mod server;
pub mod session;
pub mod surface;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience fixtures and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::BridgeConfig,
		flow::Bridge,
		identity::{HostCredential, HostUser, MemoryHostIdentity},
		pending::MemoryPendingStore,
		server::{self, BridgeState},
		surface::{HostLoginSurface, LoginSurface, SurfaceFuture},
	};

	/// Builds a configuration fixture pointing at the provided IdP endpoints.
	pub fn test_config(authorize_url: &str, token_url: &str, user_info_url: &str) -> BridgeConfig {
		BridgeConfig {
			client_id: "abc".into(),
			client_secret: "shhh".into(),
			authorize_url: Some(parse_url(authorize_url)),
			token_url: Some(parse_url(token_url)),
			user_info_url: Some(parse_url(user_info_url)),
			configure_url: None,
			scope: "openid profile email".into(),
			username_field: "preferred_username".into(),
			create_user: false,
			block_login: false,
			openid_text: "OpenID / OAuth2 Authentication".into(),
			use_header_auth: true,
		}
	}

	/// Host identity fixture holding a single user with one username credential.
	pub fn test_identity(user_id: &str, username: &str) -> Arc<MemoryHostIdentity> {
		Arc::new(MemoryHostIdentity::with_users(vec![HostUser {
			id: user_id.into(),
			credentials: vec![HostCredential {
				id: format!("{user_id}-cred"),
				username: Some(username.into()),
			}],
		}]))
	}

	/// Minimal host login surface backed by static fixtures.
	pub struct StaticLoginSurface {
		/// HTML returned by the host's login page renderer.
		pub page: String,
		/// JSON document returned by the host's login-flow handler.
		pub flow_response: serde_json::Value,
	}
	impl HostLoginSurface for StaticLoginSurface {
		fn render_login_page(&self) -> SurfaceFuture<'_, String> {
			let page = self.page.clone();

			Box::pin(async move { page })
		}

		fn handle_login_flow(&self, _body: serde_json::Value) -> SurfaceFuture<'_, serde_json::Value> {
			let response = self.flow_response.clone();

			Box::pin(async move { response })
		}
	}

	/// Constructs a [`Bridge`] plus router over in-memory stores and a static login surface.
	pub fn build_test_bridge(
		config: BridgeConfig,
		identity: Arc<MemoryHostIdentity>,
	) -> (Arc<Bridge>, Arc<MemoryPendingStore>, axum::Router) {
		let pending = Arc::new(MemoryPendingStore::default());
		let bridge = Arc::new(
			Bridge::new(config, pending.clone(), identity)
				.expect("Test bridge should build from a resolvable configuration."),
		);
		let surface = Arc::new(LoginSurface::new(
			Arc::new(StaticLoginSurface {
				page: "<html><head><title>Login</title></head><body></body></html>".into(),
				flow_response: serde_json::json!({ "type": "form", "step_id": "init" }),
			}),
			bridge.config_handle(),
		));
		let router = server::router(BridgeState { bridge: bridge.clone(), surface });

		(bridge, pending, router)
	}

	fn parse_url(value: &str) -> Url {
		Url::parse(value).expect("Test endpoint URL should parse successfully.")
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	pub use reqwest::Client as ReqwestClient;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
#[cfg(test)] use {http_body_util as _, httpmock as _, openid_bridge as _, tokio as _, tower as _};
