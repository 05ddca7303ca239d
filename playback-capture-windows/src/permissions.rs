//! Grant issuance for system audio (loopback) capture.
//!
//! WASAPI loopback is unrestricted on Windows: there is no per-app consent
//! dialog, so a grant is issued on request. Grants are still single-use and
//! tracked, so the controller's consume-once and release rules hold.

use std::collections::HashSet;

use parking_lot::Mutex;
use playback_capture_core::grant::{CaptureGrant, GrantAuthority, GrantId};

#[derive(Debug, Default)]
pub struct LoopbackGrantAuthority {
    live: Mutex<HashSet<GrantId>>,
}

impl LoopbackGrantAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh grant for one capture session.
    pub fn issue(&self) -> CaptureGrant {
        let grant = CaptureGrant::granted();
        self.live.lock().insert(grant.id());
        log::debug!("Issued loopback grant {}", grant.id());
        grant
    }

    /// Withdraw every outstanding grant, e.g. when the host is shutting down.
    pub fn revoke_all(&self) {
        let mut live = self.live.lock();
        if !live.is_empty() {
            log::info!("Revoking {} outstanding loopback grant(s)", live.len());
        }
        live.clear();
    }

    pub fn outstanding(&self) -> usize {
        self.live.lock().len()
    }
}

impl GrantAuthority for LoopbackGrantAuthority {
    fn is_live(&self, id: GrantId) -> bool {
        self.live.lock().contains(&id)
    }

    fn revoke(&self, id: GrantId) {
        if self.live.lock().remove(&id) {
            log::info!("Loopback grant {} released", id);
        }
    }
}
