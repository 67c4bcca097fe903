//! Browser-facing HTML.
//!
//! The token-landing page hands the freshly minted session bundle to client-side script via
//! literal placeholder substitution; the error page stores an alert in local storage and
//! navigates back to the login surface.

/// Client script injected into the host's login page.
pub const AUTHORIZE_SCRIPT: &str = include_str!("../assets/authorize.js");

const TOKEN_TEMPLATE: &str = include_str!("../assets/token.html");

/// Escapes quote characters only.
///
/// Matches the narrow escaping the bundled client script undoes on display; this is not a full
/// HTML sanitizer.
pub fn escape_quotes(value: &str) -> String {
	value.replace('\'', "&#39;").replace('"', "&quot;")
}

/// Token-landing page with the session bundle JSON and redirect URL substituted in.
pub fn render_token_page(bundle_json: &str, redirect: &str) -> String {
	TOKEN_TEMPLATE.replace("<<hassTokens>>", bundle_json).replace("<<redirect>>", redirect)
}

/// Error page storing `alert_type`/`alert_message` into local storage and navigating back to
/// `redirect_uri`, with any `auth_callback=1` marker stripped to avoid redirect loops.
pub fn render_error_page(alert_type: &str, alert_message: &str, redirect_uri: &str) -> String {
	let alert_type = escape_quotes(alert_type);
	let alert_message = escape_quotes(alert_message);
	let redirect_url = redirect_uri.replace("auth_callback=1", "");

	format!(
		"<html><body><script>\
		localStorage.setItem('alertType', '{alert_type}');\
		localStorage.setItem('alertMessage', '{alert_message}');\
		window.location.href = '{redirect_url}';\
		</script>\
		<h1>{alert_type}</h1>\
		<p>{alert_message}</p>\
		<p>Redirecting to {redirect_url}...</p>\
		<p><a href='{redirect_url}'>Click here if not redirected</a></p>\
		</body></html>"
	)
}
