//! Network reachability.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the remote rate source is currently reachable.
pub trait ConnectivityProbe: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Probe with a manually controlled status.
///
/// Used for forced-offline sessions and in tests.
#[derive(Debug)]
pub struct StaticConnectivity {
    reachable: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::online()
    }
}

impl ConnectivityProbe for StaticConnectivity {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
