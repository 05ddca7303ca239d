//! Capture grants: the single-use, OS-issued authorization behind a session.
//!
//! A raw [`CaptureGrant`] arrives from the consent flow. [`GrantHolder::acquire`]
//! turns it into a [`HeldGrant`] exactly once per issuance; the held grant is
//! move-only and is consumed by [`HeldGrant::release`], so a released grant
//! cannot be reached again.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::error::GrantError;

/// Issuance identifier of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantId(Uuid);

impl GrantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for GrantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of the user-consent flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantStatus {
    Granted,
    Denied,
}

/// Opaque token handed over by the grant provider.
///
/// Deliberately not `Clone`.
#[derive(Debug)]
pub struct CaptureGrant {
    id: GrantId,
    status: GrantStatus,
    issued_at: DateTime<Utc>,
}

impl CaptureGrant {
    pub fn new(id: GrantId, status: GrantStatus) -> Self {
        Self {
            id,
            status,
            issued_at: Utc::now(),
        }
    }

    pub fn granted() -> Self {
        Self::new(GrantId::new(), GrantStatus::Granted)
    }

    pub fn denied() -> Self {
        Self::new(GrantId::new(), GrantStatus::Denied)
    }

    pub fn id(&self) -> GrantId {
        self.id
    }

    pub fn status(&self) -> GrantStatus {
        self.status
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn is_granted(&self) -> bool {
        self.status == GrantStatus::Granted
    }
}

/// The host side of a grant: knows whether an issuance is still honored and
/// tears down the OS authorization when the session is done with it.
pub trait GrantAuthority: Send + Sync {
    /// Whether the host still honors this grant.
    fn is_live(&self, _id: GrantId) -> bool {
        true
    }

    /// Revoke the OS-side authorization. Called exactly once per held grant.
    fn revoke(&self, id: GrantId);
}

/// Tracks which issuances were consumed and hands out held grants.
pub struct GrantHolder {
    authority: Arc<dyn GrantAuthority>,
    /// Every id ever offered, kept for the holder's lifetime (one controller)
    /// so a reuse is caught however late it comes. Grows by one id per start
    /// attempt; a host that restarts capture indefinitely should replace the
    /// controller rather than keep one forever.
    consumed: Mutex<HashSet<GrantId>>,
}

impl GrantHolder {
    pub fn new(authority: Arc<dyn GrantAuthority>) -> Self {
        Self {
            authority,
            consumed: Mutex::new(HashSet::new()),
        }
    }

    /// Consume `grant`. Any issuance is accepted at most once, whether or not
    /// the acquisition (or the device open that follows it) succeeds.
    pub fn acquire(&self, grant: CaptureGrant) -> Result<HeldGrant, GrantError> {
        let id = grant.id();
        if !self.consumed.lock().insert(id) {
            log::warn!("Rejecting stale capture grant {}", id);
            return Err(GrantError::Stale(id));
        }
        if !grant.is_granted() {
            return Err(GrantError::Denied);
        }
        if !self.authority.is_live(id) {
            return Err(GrantError::Revoked(id));
        }

        log::info!("Acquired capture grant {}", id);
        Ok(HeldGrant {
            id,
            issued_at: grant.issued_at(),
            authority: Some(Arc::clone(&self.authority)),
        })
    }

    pub fn was_consumed(&self, id: GrantId) -> bool {
        self.consumed.lock().contains(&id)
    }
}

/// A grant owned by a session.
///
/// Released explicitly through [`HeldGrant::release`]. Dropping an unreleased
/// grant still revokes it, so an unwinding session cannot leak the OS
/// authorization.
pub struct HeldGrant {
    id: GrantId,
    issued_at: DateTime<Utc>,
    authority: Option<Arc<dyn GrantAuthority>>,
}

impl HeldGrant {
    pub fn id(&self) -> GrantId {
        self.id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Re-check with the host that the grant is still honored.
    pub fn validate(&self) -> Result<(), GrantError> {
        match &self.authority {
            Some(authority) if authority.is_live(self.id) => Ok(()),
            _ => Err(GrantError::Revoked(self.id)),
        }
    }

    pub fn release(mut self) {
        if let Some(authority) = self.authority.take() {
            authority.revoke(self.id);
            log::info!("Released capture grant {}", self.id);
        }
    }
}

impl fmt::Debug for HeldGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeldGrant")
            .field("id", &self.id)
            .field("issued_at", &self.issued_at)
            .field("released", &self.authority.is_none())
            .finish()
    }
}

impl Drop for HeldGrant {
    fn drop(&mut self) {
        if let Some(authority) = self.authority.take() {
            log::warn!("Capture grant {} dropped without release; revoking", self.id);
            authority.revoke(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingAuthority;

    #[test]
    fn acquire_and_release_revokes_once() {
        let authority = CountingAuthority::new();
        let holder = GrantHolder::new(authority.clone());

        let held = holder.acquire(CaptureGrant::granted()).unwrap();
        assert!(held.validate().is_ok());
        held.release();

        assert_eq!(authority.revocations(), 1);
    }

    #[test]
    fn second_acquisition_of_same_issuance_is_stale() {
        let authority = CountingAuthority::new();
        let holder = GrantHolder::new(authority.clone());
        let id = GrantId::new();

        holder
            .acquire(CaptureGrant::new(id, GrantStatus::Granted))
            .unwrap()
            .release();
        let err = holder.acquire(CaptureGrant::new(id, GrantStatus::Granted)).unwrap_err();

        assert_eq!(err, GrantError::Stale(id));
        assert_eq!(authority.revocations(), 1);
    }

    #[test]
    fn consumed_ids_are_scoped_to_the_holder() {
        let authority = CountingAuthority::new();
        let id = GrantId::new();

        let first = GrantHolder::new(authority.clone());
        first.acquire(CaptureGrant::new(id, GrantStatus::Granted)).unwrap().release();
        assert!(first.was_consumed(id));
        assert_eq!(
            first.acquire(CaptureGrant::new(id, GrantStatus::Granted)).unwrap_err(),
            GrantError::Stale(id)
        );
        drop(first);

        let second = GrantHolder::new(authority.clone());
        assert!(!second.was_consumed(id));
        second.acquire(CaptureGrant::new(id, GrantStatus::Granted)).unwrap().release();
        assert_eq!(authority.revocations(), 2);
    }

    #[test]
    fn denied_grant_is_consumed_and_rejected() {
        let authority = CountingAuthority::new();
        let holder = GrantHolder::new(authority.clone());
        let grant = CaptureGrant::denied();
        let id = grant.id();

        assert_eq!(holder.acquire(grant).unwrap_err(), GrantError::Denied);
        assert!(holder.was_consumed(id));
        assert_eq!(authority.revocations(), 0);
    }

    #[test]
    fn revoked_grant_is_rejected() {
        let authority = CountingAuthority::new();
        let holder = GrantHolder::new(authority.clone());
        let grant = CaptureGrant::granted();
        let id = grant.id();
        authority.kill(id);

        assert_eq!(holder.acquire(grant).unwrap_err(), GrantError::Revoked(id));
    }

    #[test]
    fn validate_notices_host_revocation() {
        let authority = CountingAuthority::new();
        let holder = GrantHolder::new(authority.clone());
        let held = holder.acquire(CaptureGrant::granted()).unwrap();

        authority.kill(held.id());
        assert_eq!(held.validate(), Err(GrantError::Revoked(held.id())));
        held.release();
    }

    #[test]
    fn dropping_unreleased_grant_revokes() {
        let authority = CountingAuthority::new();
        let holder = GrantHolder::new(authority.clone());

        drop(holder.acquire(CaptureGrant::granted()).unwrap());

        assert_eq!(authority.revocations(), 1);
    }
}
