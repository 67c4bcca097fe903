//! Pending-request store.
//!
//! Holds the authorization requests currently out with the IdP, keyed by their `state` token.
//! Entries are single-use; the callback removes its entry atomically so a replayed `state` finds
//! nothing.

// self
use crate::{_prelude::*, error::PendingStoreError};

/// How long a pending request may wait for its callback before it is dropped.
pub const PENDING_TTL: Duration = Duration::minutes(10);

/// Boxed future returned by [`PendingStore`] operations.
pub type StoreFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, PendingStoreError>> + 'a + Send>>;

/// An authorization request waiting for its IdP callback.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingAuthRequest {
	/// Opaque `state` token carried through the IdP round trip.
	pub state: String,
	/// Query parameters of the original login-surface request, replayed onto the final redirect.
	pub original_params: HashMap<String, String>,
	/// Insertion timestamp used for expiry.
	pub created_at: OffsetDateTime,
}
impl PendingAuthRequest {
	/// Whether this request outlived [`PENDING_TTL`] as of `now`.
	pub fn is_expired(&self, now: OffsetDateTime) -> bool {
		now - self.created_at > PENDING_TTL
	}
}

/// Storage backend for pending authorization requests.
///
/// [`take`](Self::take) must be atomic with respect to concurrent callers so a `state` token is
/// honored at most once.
pub trait PendingStore
where
	Self: Send + Sync,
{
	/// Records a new pending request under its `state` token.
	fn insert(&self, request: PendingAuthRequest) -> StoreFuture<'_, ()>;

	/// Removes and returns the pending request for `state`, if a live one exists.
	fn take<'a>(&'a self, state: &'a str) -> StoreFuture<'a, Option<PendingAuthRequest>>;
}

/// In-memory [`PendingStore`] over a [`RwLock`]ed map.
///
/// Expired entries are swept opportunistically on every write-locking access; there is no
/// background task.
#[derive(Debug, Default)]
pub struct MemoryPendingStore {
	requests: RwLock<HashMap<String, PendingAuthRequest>>,
}
impl MemoryPendingStore {
	/// Live entry count, sweeping expired entries first.
	pub fn len(&self) -> usize {
		let mut requests = self.requests.write();

		sweep(&mut requests, OffsetDateTime::now_utc());

		requests.len()
	}

	/// Whether no live entries remain.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl PendingStore for MemoryPendingStore {
	fn insert(&self, request: PendingAuthRequest) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut requests = self.requests.write();

			sweep(&mut requests, OffsetDateTime::now_utc());
			requests.insert(request.state.clone(), request);

			Ok(())
		})
	}

	fn take<'a>(&'a self, state: &'a str) -> StoreFuture<'a, Option<PendingAuthRequest>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let mut requests = self.requests.write();

			sweep(&mut requests, now);

			Ok(requests.remove(state))
		})
	}
}

fn sweep(requests: &mut HashMap<String, PendingAuthRequest>, now: OffsetDateTime) {
	requests.retain(|_, r| !r.is_expired(now));
}
