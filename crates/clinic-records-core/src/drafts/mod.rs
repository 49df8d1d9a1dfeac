//! Draft manager: debounced local autosave of in-progress form input.
//!
//! A [`DraftSession`] lives as long as one form instance. The host forwards
//! user edits through [`DraftSession::update`] and calls
//! [`DraftSession::poll`] when the deadline from
//! [`DraftSession::next_deadline`] passes. Initial population and draft
//! restoration never trigger a save on their own.

mod clock;
mod keys;
mod storage;

pub use clock::*;
pub use keys::*;
pub use storage::*;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// Form field values keyed by field name.
pub type FormData = serde_json::Map<String, Value>;

/// Quiet period before an edit is persisted.
pub const DEFAULT_DEBOUNCE_MS: i64 = 800;

/// Whether any field holds a non-blank string or a positive number.
pub fn has_meaningful_content(data: &FormData) -> bool {
    data.values().any(|value| match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(n) => n.as_f64().map(|n| n > 0.0).unwrap_or(false),
        _ => false,
    })
}

/// Lifecycle of a single form's draft handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftPhase {
    /// No stored draft found and no edits yet
    Idle,
    /// A stored draft was found; waiting for restore or discard
    PendingDecision,
    /// Edits are being autosaved
    Active,
    /// Form submitted and draft cleared
    Submitted,
    /// Form closed; no further writes
    Closed,
}

/// Result of a [`DraftSession::poll`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveOutcome {
    /// Nothing scheduled, or the quiet period has not elapsed
    NotDue,
    /// Data matched the last persisted snapshot
    Unchanged,
    /// Draft written
    Saved,
    /// Data had no meaningful content; stored draft removed
    Cleared,
    /// Storage failed; the save was skipped
    Failed,
}

/// Draft handling for one form instance.
pub struct DraftSession {
    store: DraftStore,
    /// `None` disables drafting entirely
    key: Option<DraftKey>,
    clock: Arc<dyn Clock>,
    debounce: Duration,
    initial: FormData,
    data: FormData,
    /// Snapshot last persisted (or restored)
    last_saved: FormData,
    phase: DraftPhase,
    deadline: Option<DateTime<Utc>>,
    has_draft: bool,
    show_restore_prompt: bool,
}

impl DraftSession {
    /// Begin a form session, checking for a previously stored draft.
    ///
    /// A found draft is surfaced as a pending decision; it is never merged
    /// automatically.
    pub fn start(store: DraftStore, key: Option<DraftKey>, initial: FormData) -> Self {
        let has_draft = match &key {
            Some(key) => store.has_draft(key).unwrap_or_else(|e| {
                tracing::warn!(key = %key, error = %e, "Draft lookup failed");
                false
            }),
            None => false,
        };

        Self {
            store,
            key,
            clock: Arc::new(SystemClock),
            debounce: Duration::milliseconds(DEFAULT_DEBOUNCE_MS),
            data: initial.clone(),
            last_saved: initial.clone(),
            initial,
            phase: if has_draft {
                DraftPhase::PendingDecision
            } else {
                DraftPhase::Idle
            },
            deadline: None,
            has_draft,
            show_restore_prompt: has_draft,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn data(&self) -> &FormData {
        &self.data
    }

    pub fn phase(&self) -> DraftPhase {
        self.phase
    }

    pub fn key(&self) -> Option<&DraftKey> {
        self.key.as_ref()
    }

    pub fn has_draft(&self) -> bool {
        self.has_draft
    }

    pub fn show_restore_prompt(&self) -> bool {
        self.show_restore_prompt
    }

    /// When the pending autosave becomes due, if one is scheduled.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Record a user edit.
    ///
    /// Restarts the quiet period when the data differs from the last
    /// persisted snapshot, and cancels a pending save when it does not.
    /// Edits made while a restore decision is pending, or after the form was
    /// submitted or closed, are kept in memory but never scheduled.
    pub fn update(&mut self, data: FormData) {
        self.data = data;

        if self.key.is_none() {
            return;
        }
        match self.phase {
            DraftPhase::PendingDecision | DraftPhase::Submitted | DraftPhase::Closed => return,
            DraftPhase::Idle => self.phase = DraftPhase::Active,
            DraftPhase::Active => {}
        }

        if self.data != self.last_saved {
            self.deadline = Some(self.clock.now() + self.debounce);
        } else {
            self.deadline = None;
        }
    }

    /// Run the debounced save if its quiet period has elapsed.
    pub fn poll(&mut self) -> AutosaveOutcome {
        let (Some(key), Some(deadline)) = (self.key.clone(), self.deadline) else {
            return AutosaveOutcome::NotDue;
        };
        let now = self.clock.now();
        if now < deadline {
            return AutosaveOutcome::NotDue;
        }
        self.deadline = None;

        if self.data == self.last_saved {
            return AutosaveOutcome::Unchanged;
        }
        self.last_saved = self.data.clone();

        if has_meaningful_content(&self.data) {
            match self.store.save(&key, &self.data, now) {
                Ok(()) => {
                    tracing::debug!(key = %key, fields = self.data.len(), "Draft autosaved");
                    self.has_draft = true;
                    AutosaveOutcome::Saved
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Draft save skipped");
                    AutosaveOutcome::Failed
                }
            }
        } else {
            match self.store.remove(&key) {
                Ok(()) => {
                    tracing::debug!(key = %key, "Form emptied, draft removed");
                    self.has_draft = false;
                    AutosaveOutcome::Cleared
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Draft removal failed");
                    AutosaveOutcome::Failed
                }
            }
        }
    }

    /// Merge the stored draft over the initial data and consume it.
    ///
    /// Without a usable draft this only closes the prompt.
    pub fn restore(&mut self) -> FormData {
        self.show_restore_prompt = false;
        let Some(key) = self.key.clone() else {
            return self.data.clone();
        };

        let draft = self.store.load(&key).unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "Draft load failed");
            None
        });

        match draft {
            Some(draft) if !draft.data.is_empty() => {
                let mut merged = self.initial.clone();
                merged.extend(draft.data);
                self.data = merged.clone();
                self.last_saved = merged.clone();
                self.deadline = None;
                self.phase = DraftPhase::Active;
                self.remove_stored(&key);
                tracing::debug!(key = %key, "Draft restored");
                merged
            }
            _ => {
                self.has_draft = false;
                if self.phase == DraftPhase::PendingDecision {
                    self.phase = DraftPhase::Idle;
                }
                self.data.clone()
            }
        }
    }

    /// Drop the stored draft and return the initial data for repopulation.
    pub fn discard(&mut self) -> FormData {
        if let Some(key) = self.key.clone() {
            self.remove_stored(&key);
        }
        self.has_draft = false;
        self.show_restore_prompt = false;
        self.data = self.initial.clone();
        self.last_saved = self.initial.clone();
        self.deadline = None;
        if self.phase == DraftPhase::PendingDecision {
            self.phase = DraftPhase::Active;
        }
        self.initial.clone()
    }

    /// Remove the stored draft after a successful submit.
    pub fn clear(&mut self) {
        if let Some(key) = self.key.clone() {
            self.remove_stored(&key);
        }
        self.has_draft = false;
        self.deadline = None;
        self.phase = DraftPhase::Submitted;
    }

    /// Cancel any pending save; the session performs no further writes.
    pub fn close(&mut self) {
        self.deadline = None;
        self.phase = DraftPhase::Closed;
    }

    fn remove_stored(&mut self, key: &DraftKey) {
        match self.store.remove(key) {
            Ok(()) => self.has_draft = false,
            Err(e) => tracing::warn!(key = %key, error = %e, "Draft removal failed"),
        }
    }
}
