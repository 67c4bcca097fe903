// crates.io
use axum::{
	Router,
	body::Body,
	http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use tower::ServiceExt;
// self
use openid_bridge::_preludet::*;

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Request should build successfully.")
}

async fn send(router: &Router, uri: &str) -> Response<axum::body::Body> {
	router.clone().oneshot(get(uri)).await.expect("Request should be routable.")
}

async fn body_string(response: Response<axum::body::Body>) -> String {
	let bytes = response
		.into_body()
		.collect()
		.await
		.expect("Response body should be collectable.")
		.to_bytes();

	String::from_utf8(bytes.to_vec()).expect("Response body should be valid UTF-8.")
}

async fn begin(router: &Router, authorize_uri: &str) -> String {
	let response = send(router, authorize_uri).await;

	assert_eq!(response.status(), StatusCode::FOUND);

	let location = response
		.headers()
		.get(header::LOCATION)
		.expect("Authorize response should carry a Location header.")
		.to_str()
		.expect("Location header should be valid UTF-8.")
		.to_owned();

	Url::parse(&location)
		.expect("Location header should be a valid URL.")
		.query_pairs()
		.find_map(|(k, v)| (k == "state").then_some(v.into_owned()))
		.expect("Authorize redirect should carry a state.")
}

async fn mock_token_endpoint(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.header("authorization", "Basic YWJjOnNoaGg=")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=C-123");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"T","token_type":"Bearer","expires_in":3600}"#);
		})
		.await
}

async fn mock_user_info_endpoint<'s>(server: &'s MockServer, body: &str) -> httpmock::Mock<'s> {
	let body = body.to_owned();

	server
		.mock_async(move |when, then| {
			when.method(GET).path("/userinfo").header("authorization", "Bearer T");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

#[tokio::test]
async fn callback_with_valid_state_issues_a_session() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token_endpoint(&server).await;
	let user_info_mock = mock_user_info_endpoint(&server, r#"{"preferred_username":"alice"}"#).await;
	let config = test_config(
		&server.url("/authorize"),
		&server.url("/token"),
		&server.url("/userinfo"),
	);
	let identity = test_identity("user-1", "alice");
	let (_bridge, pending, router) = build_test_bridge(config, identity);
	let state = begin(
		&router,
		"/auth/openid/authorize?base_url=https://ha.example&redirect_uri=%2Fprofile&client_id=cid",
	)
	.await;
	let response = send(&router, &format!("/auth/openid/callback?code=C-123&state={state}")).await;

	assert_eq!(response.status(), StatusCode::OK);

	let html = body_string(response).await;

	assert!(html.contains(r#""refresh_token""#));
	assert!(html.contains(r#""ha_auth_provider":"openid""#));
	assert!(html.contains(r#""hassUrl":"https://ha.example""#));
	assert!(html.contains("/profile?auth_callback=1&code="));
	assert!(html.contains("storeToken=true"));
	assert!(pending.is_empty());
	token_mock.assert_async().await;
	user_info_mock.assert_async().await;
}

#[tokio::test]
async fn replayed_state_is_rejected_after_a_successful_login() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token_endpoint(&server).await;
	let _user_info_mock = mock_user_info_endpoint(&server, r#"{"preferred_username":"alice"}"#).await;
	let config = test_config(
		&server.url("/authorize"),
		&server.url("/token"),
		&server.url("/userinfo"),
	);
	let identity = test_identity("user-1", "alice");
	let (_bridge, _pending, router) = build_test_bridge(config, identity);
	let state = begin(&router, "/auth/openid/authorize?base_url=https://ha.example").await;
	let first = send(&router, &format!("/auth/openid/callback?code=C-123&state={state}")).await;

	assert_eq!(first.status(), StatusCode::OK);

	let replay = send(&router, &format!("/auth/openid/callback?code=C-123&state={state}")).await;

	assert_eq!(replay.status(), StatusCode::OK);

	let html = body_string(replay).await;

	assert!(html.contains("Invalid state parameter."));
	assert!(!html.contains(r#""refresh_token""#));
	assert_eq!(token_mock.hits_async().await, 1);
}

#[tokio::test]
async fn callback_without_state_short_circuits_before_any_lookup() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token_endpoint(&server).await;
	let config = test_config(
		&server.url("/authorize"),
		&server.url("/token"),
		&server.url("/userinfo"),
	);
	let identity = test_identity("user-1", "alice");
	let (_bridge, pending, router) = build_test_bridge(config, identity);
	let _state = begin(&router, "/auth/openid/authorize?base_url=https://ha.example").await;
	let response = send(&router, "/auth/openid/callback?code=C-123").await;

	assert_eq!(response.status(), StatusCode::OK);

	let html = body_string(response).await;

	assert!(html.contains("Missing code or state parameter."));
	// The pending entry stays untouched and the IdP is never contacted.
	assert_eq!(pending.len(), 1);
	assert_eq!(token_mock.hits_async().await, 0);
}

#[tokio::test]
async fn callback_without_a_username_claim_renders_the_error_page() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let _user_info_mock = mock_user_info_endpoint(&server, r#"{"email":"alice@example.com"}"#).await;
	let config = test_config(
		&server.url("/authorize"),
		&server.url("/token"),
		&server.url("/userinfo"),
	);
	let identity = test_identity("user-1", "alice");
	let (_bridge, pending, router) = build_test_bridge(config, identity);
	let state = begin(
		&router,
		"/auth/openid/authorize?base_url=https://ha.example&redirect_uri=%2Fprofile%3Fauth_callback%3D1%26x%3D1",
	)
	.await;
	let response = send(&router, &format!("/auth/openid/callback?code=C-123&state={state}")).await;

	assert_eq!(response.status(), StatusCode::OK);

	let html = body_string(response).await;

	assert!(html.contains("No username found in user info."));
	// The echoed redirect survives with the callback marker stripped to avoid loops.
	assert!(html.contains("window.location.href = '/profile?&x=1';"));
	assert!(!html.contains("auth_callback=1"));
	// The state was still consumed; the attempt is over.
	assert!(pending.is_empty());
}

#[tokio::test]
async fn callback_for_an_unknown_user_renders_the_error_page() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let _user_info_mock = mock_user_info_endpoint(&server, r#"{"preferred_username":"mallory"}"#).await;
	let config = test_config(
		&server.url("/authorize"),
		&server.url("/token"),
		&server.url("/userinfo"),
	);
	let identity = test_identity("user-1", "alice");
	let (_bridge, _pending, router) = build_test_bridge(config, identity);
	let state = begin(&router, "/auth/openid/authorize?base_url=https://ha.example").await;
	let response = send(&router, &format!("/auth/openid/callback?code=C-123&state={state}")).await;
	let html = body_string(response).await;

	assert!(html.contains("user not found"));
	assert!(html.contains("&#39;mallory&#39;"));
}

#[tokio::test]
async fn token_endpoint_failure_renders_the_exchange_error_page() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(500);
		})
		.await;
	let config = test_config(
		&server.url("/authorize"),
		&server.url("/token"),
		&server.url("/userinfo"),
	);
	let identity = test_identity("user-1", "alice");
	let (_bridge, pending, router) = build_test_bridge(config, identity);
	let state = begin(&router, "/auth/openid/authorize?base_url=https://ha.example").await;
	let response = send(&router, &format!("/auth/openid/callback?code=C-123&state={state}")).await;

	assert_eq!(response.status(), StatusCode::OK);

	let html = body_string(response).await;

	assert!(html.contains("Could not exchange code for tokens or fetch user info."));
	assert!(!html.contains(r#""refresh_token""#));
	// The state was still consumed; a retry has to start over.
	assert!(pending.is_empty());
	assert_eq!(token_mock.hits_async().await, 1);
}

#[tokio::test]
async fn user_info_failure_renders_the_exchange_error_page() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let user_info_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/userinfo");
			then.status(401);
		})
		.await;
	let config = test_config(
		&server.url("/authorize"),
		&server.url("/token"),
		&server.url("/userinfo"),
	);
	let identity = test_identity("user-1", "alice");
	let (_bridge, pending, router) = build_test_bridge(config, identity);
	let state = begin(&router, "/auth/openid/authorize?base_url=https://ha.example").await;
	let response = send(&router, &format!("/auth/openid/callback?code=C-123&state={state}")).await;
	let html = body_string(response).await;

	assert!(html.contains("Could not exchange code for tokens or fetch user info."));
	assert!(pending.is_empty());
	assert_eq!(user_info_mock.hits_async().await, 1);
}

#[tokio::test]
async fn form_post_client_auth_sends_credentials_in_the_body() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=C-123")
				.body_includes("client_id=abc")
				.body_includes("client_secret=shhh");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"T","token_type":"Bearer","expires_in":3600}"#);
		})
		.await;
	let _user_info_mock = mock_user_info_endpoint(&server, r#"{"preferred_username":"alice"}"#).await;
	let mut config = test_config(
		&server.url("/authorize"),
		&server.url("/token"),
		&server.url("/userinfo"),
	);

	config.use_header_auth = false;

	let identity = test_identity("user-1", "alice");
	let (_bridge, _pending, router) = build_test_bridge(config, identity);
	let state = begin(&router, "/auth/openid/authorize?base_url=https://ha.example").await;
	let response = send(&router, &format!("/auth/openid/callback?code=C-123&state={state}")).await;

	assert_eq!(response.status(), StatusCode::OK);

	let html = body_string(response).await;

	assert!(html.contains(r#""refresh_token""#));
	token_mock.assert_async().await;
}

#[tokio::test]
async fn native_redirect_targets_get_a_302_instead_of_the_token_page() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token_endpoint(&server).await;
	let _user_info_mock = mock_user_info_endpoint(&server, r#"{"preferred_username":"alice"}"#).await;
	let config = test_config(
		&server.url("/authorize"),
		&server.url("/token"),
		&server.url("/userinfo"),
	);
	let identity = test_identity("user-1", "alice");
	let (_bridge, _pending, router) = build_test_bridge(config, identity.clone());
	let state = begin(
		&router,
		"/auth/openid/authorize?base_url=https://ha.example&redirect_uri=homeassistant%3A%2F%2Fauth-callback",
	)
	.await;
	let response = send(&router, &format!("/auth/openid/callback?code=C-123&state={state}")).await;

	assert_eq!(response.status(), StatusCode::FOUND);

	let location = response
		.headers()
		.get(header::LOCATION)
		.expect("Native callback response should carry a Location header.")
		.to_str()
		.expect("Location header should be valid UTF-8.");

	assert!(location.starts_with("homeassistant://auth-callback?auth_callback=1&code="));
	assert!(location.contains("&state="));
	assert!(location.contains("&storeToken=true"));

	let issued = identity.issued_codes();

	assert_eq!(issued.len(), 1);
	assert!(location.contains(&format!("code={}", issued[0].1)));
}
