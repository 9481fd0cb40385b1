//! Per-execution-unit session storage.
//!
//! Each concurrently running test (an execution unit) owns at most one live
//! session. The registry keys entries by [`UnitId`] and every unit only ever
//! touches its own key, so no cross-unit visibility exists by construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::session::SessionHandle;

/// Identity of one concurrently-running test instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub u64);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Holds at most one active session per execution unit.
pub struct SessionRegistry<S: SessionHandle> {
    slots: Mutex<HashMap<UnitId, Arc<S>>>,
}

impl<S: SessionHandle> SessionRegistry<S> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Register the unit's session. A unit never holds two sessions, so a
    /// previous entry for the same unit would be a lifecycle bug; it is
    /// replaced and logged.
    pub fn set(&self, unit: UnitId, session: Arc<S>) {
        let mut slots = self.slots.lock().expect("registry lock poisoned");
        if slots.insert(unit, session).is_some() {
            log::warn!("{} replaced a still-registered session", unit);
        }
    }

    /// The session registered by this unit, if any. Never returns another
    /// unit's session.
    pub fn get(&self, unit: UnitId) -> Option<Arc<S>> {
        let slots = self.slots.lock().expect("registry lock poisoned");
        slots.get(&unit).cloned()
    }

    /// Close and drop the unit's session. A close failure is logged, never
    /// fatal to the run.
    pub async fn clear(&self, unit: UnitId) {
        let session = {
            let mut slots = self.slots.lock().expect("registry lock poisoned");
            slots.remove(&unit)
        };
        if let Some(session) = session {
            if let Err(e) = session.close().await {
                log::warn!("{} failed to close session: {:#}", unit, e);
            }
        }
    }
}

impl<S: SessionHandle> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
