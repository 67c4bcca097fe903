//! Host identity backend.
//!
//! The bridge never owns user accounts; it maps the username asserted by the IdP onto a
//! pre-existing host user and asks the host to mint its own session credentials. Hosts embed the
//! bridge by implementing [`HostIdentity`].

// self
use crate::{_prelude::*, error::IdentityError};

/// Boxed future returned by [`HostIdentity`] operations.
pub type IdentityFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, IdentityError>> + 'a + Send>>;

/// A login credential attached to a host user.
#[derive(Clone, Debug)]
pub struct HostCredential {
	/// Credential identifier.
	pub id: String,
	/// Username of this credential, if the backing auth provider has one.
	pub username: Option<String>,
}

/// A user account owned by the host application.
#[derive(Clone, Debug)]
pub struct HostUser {
	/// User identifier.
	pub id: String,
	/// Credentials attached to this user across the host's auth providers.
	pub credentials: Vec<HostCredential>,
}

/// A host-issued refresh token.
#[derive(Clone, Debug)]
pub struct HostRefreshToken {
	/// Token identifier.
	pub id: String,
	/// The refresh token itself.
	pub token: String,
	/// Client the token was issued to.
	pub client_id: Option<String>,
}

/// A host-issued access token derived from a refresh token.
#[derive(Clone, Debug)]
pub struct HostAccessToken {
	/// The access token itself.
	pub token: String,
	/// Token lifetime.
	pub expires_in: Duration,
}

/// Session-credential surface of the host application.
pub trait HostIdentity
where
	Self: Send + Sync,
{
	/// All user accounts known to the host.
	fn users(&self) -> IdentityFuture<'_, Vec<HostUser>>;

	/// Mints a refresh token for `user_id` on behalf of `client_id`.
	fn create_refresh_token<'a>(
		&'a self,
		user_id: &'a str,
		client_id: Option<&'a str>,
	) -> IdentityFuture<'a, HostRefreshToken>;

	/// Mints an access token from a previously issued refresh token.
	fn create_access_token<'a>(
		&'a self,
		refresh_token: &'a HostRefreshToken,
	) -> IdentityFuture<'a, HostAccessToken>;

	/// Mints a one-time login code bound to `credential`, redeemable once through the host's own
	/// login-code exchange.
	fn create_login_code<'a>(
		&'a self,
		credential: &'a HostCredential,
		client_id: Option<&'a str>,
	) -> IdentityFuture<'a, String>;
}

/// Picks the host user carrying a credential whose username equals `username`.
///
/// When several users match, the first one in enumeration order wins and the ambiguity is logged.
pub fn resolve_user<'a>(users: &'a [HostUser], username: &str) -> Option<&'a HostUser> {
	let mut matches = users
		.iter()
		.filter(|u| u.credentials.iter().any(|c| c.username.as_deref() == Some(username)));
	let resolved = matches.next()?;

	if matches.next().is_some() {
		tracing::warn!(
			username,
			resolved = %resolved.id,
			"multiple host users share this username; using the first match",
		);
	}

	Some(resolved)
}

/// In-memory [`HostIdentity`] backed by a fixed user list; token material is random.
#[derive(Debug, Default)]
pub struct MemoryHostIdentity {
	users: Vec<HostUser>,
	issued_codes: RwLock<Vec<(String, String)>>,
}
impl MemoryHostIdentity {
	/// Builds a backend over the given accounts.
	pub fn with_users(users: Vec<HostUser>) -> Self {
		Self { users, issued_codes: RwLock::new(Vec::new()) }
	}

	/// Login codes issued so far, as `(credential_id, code)` pairs.
	pub fn issued_codes(&self) -> Vec<(String, String)> {
		self.issued_codes.read().clone()
	}
}
impl HostIdentity for MemoryHostIdentity {
	fn users(&self) -> IdentityFuture<'_, Vec<HostUser>> {
		Box::pin(async move { Ok(self.users.clone()) })
	}

	fn create_refresh_token<'a>(
		&'a self,
		user_id: &'a str,
		client_id: Option<&'a str>,
	) -> IdentityFuture<'a, HostRefreshToken> {
		Box::pin(async move {
			Ok(HostRefreshToken {
				id: format!("{user_id}-refresh"),
				token: random_token(32),
				client_id: client_id.map(ToOwned::to_owned),
			})
		})
	}

	fn create_access_token<'a>(
		&'a self,
		_refresh_token: &'a HostRefreshToken,
	) -> IdentityFuture<'a, HostAccessToken> {
		Box::pin(
			async move { Ok(HostAccessToken { token: random_token(32), expires_in: Duration::minutes(30) }) },
		)
	}

	fn create_login_code<'a>(
		&'a self,
		credential: &'a HostCredential,
		_client_id: Option<&'a str>,
	) -> IdentityFuture<'a, String> {
		Box::pin(async move {
			let code = random_token(8);

			self.issued_codes.write().push((credential.id.clone(), code.clone()));

			Ok(code)
		})
	}
}

pub(crate) fn random_token(len: usize) -> String {
	// crates.io
	use rand::{Rng, distr::Alphanumeric};

	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
