// crates.io
use httpmock::prelude::*;
// self
use openid_bridge::{
	_preludet::*,
	error::{ConfigError, Error},
	flow::Bridge,
	pending::MemoryPendingStore,
};

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

fn discovery_only_config(server: &MockServer) -> openid_bridge::config::BridgeConfig {
	let mut config = test_config(
		&server.url("/unused-authorize"),
		&server.url("/unused-token"),
		&server.url("/unused-userinfo"),
	);

	config.configure_url =
		Some(Url::parse(&server.url(DISCOVERY_PATH)).expect("Discovery URL should parse."));
	config.authorize_url = None;
	config.token_url = None;
	config.user_info_url = None;

	config
}

#[tokio::test]
async fn initialize_fills_endpoints_from_the_discovery_document() {
	let server = MockServer::start_async().await;
	let discovery_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(DISCOVERY_PATH);
			then.status(200).header("content-type", "application/json").body(
				serde_json::json!({
					"issuer": server.base_url(),
					"authorization_endpoint": server.url("/authorize"),
					"token_endpoint": server.url("/token"),
					"userinfo_endpoint": server.url("/userinfo"),
				})
				.to_string(),
			);
		})
		.await;
	let bridge = Bridge::initialize(
		discovery_only_config(&server),
		Arc::new(MemoryPendingStore::default()),
		test_identity("user-1", "alice"),
	)
	.await
	.expect("Initialization should succeed against a healthy discovery endpoint.");
	let endpoints = bridge
		.config_handle()
		.load()
		.endpoints()
		.expect("Discovered configuration should resolve all endpoints.");

	assert_eq!(endpoints.authorize_url.as_str(), server.url("/authorize"));
	assert_eq!(endpoints.token_url.as_str(), server.url("/token"));
	assert_eq!(endpoints.user_info_url.as_str(), server.url("/userinfo"));
	discovery_mock.assert_async().await;
}

#[tokio::test]
async fn initialize_fails_when_the_discovery_endpoint_errors() {
	let server = MockServer::start_async().await;
	let discovery_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(DISCOVERY_PATH);
			then.status(500);
		})
		.await;
	let result = Bridge::initialize(
		discovery_only_config(&server),
		Arc::new(MemoryPendingStore::default()),
		test_identity("user-1", "alice"),
	)
	.await;

	assert!(matches!(result, Err(Error::Config(ConfigError::Discovery { .. }))));
	assert_eq!(discovery_mock.hits_async().await, 1);
}

#[tokio::test]
async fn initialize_fails_when_the_discovery_document_is_malformed() {
	let server = MockServer::start_async().await;
	let _discovery_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(DISCOVERY_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"issuer":"https://idp.example"}"#);
		})
		.await;
	let result = Bridge::initialize(
		discovery_only_config(&server),
		Arc::new(MemoryPendingStore::default()),
		test_identity("user-1", "alice"),
	)
	.await;

	assert!(matches!(result, Err(Error::Config(ConfigError::Discovery { .. }))));
}
