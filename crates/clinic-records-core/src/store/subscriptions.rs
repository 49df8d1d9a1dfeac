//! Listener registry for real-time listings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::models::{Patient, Session, SessionIndexEntry};

pub type PatientsCallback = Arc<dyn Fn(&[Patient]) + Send + Sync>;
pub type SessionsCallback = Arc<dyn Fn(&[Session]) + Send + Sync>;
pub type IndexCallback = Arc<dyn Fn(&[SessionIndexEntry]) + Send + Sync>;

/// Filter and cap for patient listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientQuery {
    pub search: Option<String>,
    pub limit: usize,
}

impl Default for PatientQuery {
    fn default() -> Self {
        Self {
            search: None,
            limit: 100,
        }
    }
}

impl PatientQuery {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// What a registered listener watches.
#[derive(Clone)]
pub(crate) enum Watch {
    Patients {
        query: PatientQuery,
        callback: PatientsCallback,
    },
    Sessions {
        patient_id: String,
        callback: SessionsCallback,
    },
    AllSessions {
        callback: IndexCallback,
    },
}

/// A registered watch plus its delivery state, shared between clones.
#[derive(Clone)]
pub(crate) struct Listener {
    pub watch: Watch,
    pub delivery: Arc<Delivery>,
}

impl Listener {
    pub fn new(watch: Watch) -> Self {
        Self {
            watch,
            delivery: Arc::new(Delivery::default()),
        }
    }
}

#[derive(Debug, Default)]
struct DeliveryState {
    delivering: bool,
    dirty: bool,
}

/// Serializes deliveries to one listener.
///
/// At most one thread delivers at a time. A change notified while a delivery
/// is running marks the listener dirty and the running deliverer reads the
/// listing again, so each callback sees a snapshot read after the previous one.
#[derive(Debug, Default)]
pub(crate) struct Delivery {
    state: Mutex<DeliveryState>,
}

impl Delivery {
    /// Claim the listener, or mark it dirty when another delivery runs.
    pub fn claim(&self) -> Option<DeliveryClaim<'_>> {
        let mut state = self.lock();
        if state.delivering {
            state.dirty = true;
            return None;
        }
        state.delivering = true;
        Some(DeliveryClaim {
            delivery: self,
            released: false,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeliveryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exclusive right to deliver to a listener. Released on drop.
pub(crate) struct DeliveryClaim<'a> {
    delivery: &'a Delivery,
    released: bool,
}

impl DeliveryClaim<'_> {
    /// Call before reading the listing for a pass.
    pub fn start_pass(&self) {
        self.delivery.lock().dirty = false;
    }

    /// Release the claim unless a change arrived during the pass.
    /// Returns `true` when another pass is needed.
    pub fn needs_another_pass(&mut self) -> bool {
        let mut state = self.delivery.lock();
        if state.dirty {
            return true;
        }
        state.delivering = false;
        self.released = true;
        false
    }
}

impl Drop for DeliveryClaim<'_> {
    fn drop(&mut self) {
        if !self.released {
            let mut state = self.delivery.lock();
            state.delivering = false;
            state.dirty = false;
        }
    }
}

/// Per-patient session listings touched by a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum SessionScope {
    #[default]
    Untouched,
    Patient(String),
    Every,
}

/// Listings touched by a committed mutation.
#[derive(Debug, Clone, Default)]
pub(crate) struct Affected {
    pub patients: bool,
    pub sessions: SessionScope,
    pub all_sessions: bool,
}

impl Affected {
    pub fn everything() -> Self {
        Self {
            patients: true,
            sessions: SessionScope::Every,
            all_sessions: true,
        }
    }

    fn touches(&self, watch: &Watch) -> bool {
        match watch {
            Watch::Patients { .. } => self.patients,
            Watch::Sessions { patient_id, .. } => match &self.sessions {
                SessionScope::Untouched => false,
                SessionScope::Patient(id) => id == patient_id,
                SessionScope::Every => true,
            },
            Watch::AllSessions { .. } => self.all_sessions,
        }
    }
}

#[derive(Default)]
pub(crate) struct SubscriptionHub {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Listener>>,
}

impl SubscriptionHub {
    pub fn register(self: &Arc<Self>, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, listener);
        tracing::debug!(subscription_id = id, "Subscription registered");
        Subscription {
            id,
            hub: Arc::downgrade(self),
        }
    }

    /// Listeners interested in `affected`, cloned out of the registry.
    pub fn interested(&self, affected: &Affected) -> Vec<Listener> {
        self.lock()
            .values()
            .filter(|listener| affected.touches(&listener.watch))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn remove(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            tracing::debug!(subscription_id = id, "Subscription removed");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle for a live subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    hub: Weak<SubscriptionHub>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_sessions_listener() -> Listener {
        Listener::new(Watch::AllSessions {
            callback: Arc::new(|_: &[SessionIndexEntry]| {}),
        })
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = Arc::new(SubscriptionHub::default());
        let first = hub.register(all_sessions_listener());
        let second = hub.register(all_sessions_listener());
        assert_ne!(first.id(), second.id());
        assert_eq!(hub.len(), 2);

        drop(first);
        assert_eq!(hub.len(), 1);
        second.unsubscribe();
        assert_eq!(hub.len(), 0);
    }

    #[test]
    fn test_interest_filtering() {
        let hub = Arc::new(SubscriptionHub::default());
        let _a = hub.register(Listener::new(Watch::Sessions {
            patient_id: "p1".into(),
            callback: Arc::new(|_: &[Session]| {}),
        }));
        let _b = hub.register(Listener::new(Watch::Sessions {
            patient_id: "p2".into(),
            callback: Arc::new(|_: &[Session]| {}),
        }));
        let _c = hub.register(all_sessions_listener());

        let affected = Affected {
            sessions: SessionScope::Patient("p1".into()),
            all_sessions: true,
            ..Default::default()
        };
        assert_eq!(hub.interested(&affected).len(), 2);
        assert_eq!(hub.interested(&Affected::default()).len(), 0);
        assert_eq!(hub.interested(&Affected::everything()).len(), 3);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let delivery = Delivery::default();
        let mut claim = delivery.claim().unwrap();
        claim.start_pass();

        // A change during the pass is handed to the running deliverer
        assert!(delivery.claim().is_none());
        assert!(claim.needs_another_pass());

        claim.start_pass();
        assert!(!claim.needs_another_pass());
        drop(claim);
        assert!(delivery.claim().is_some());
    }

    #[test]
    fn test_abandoned_claim_is_released() {
        let delivery = Delivery::default();
        {
            let claim = delivery.claim().unwrap();
            claim.start_pass();
        }
        assert!(delivery.claim().is_some());
    }
}
