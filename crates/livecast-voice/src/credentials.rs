//! API key pool with round-robin selection and cooldown handling.
//!
//! Every slot transition happens under one mutex. Transitions are rare next
//! to the generation calls they guard, so a single narrow lock is enough to
//! keep two tasks from promoting and demoting the same key at once.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use livecast_types::CredentialState;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::VoiceError;

/// Longest a rate-limited key is kept out of rotation, whatever the
/// provider's hint or the configured default says.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// An upstream API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::from(key.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Last four characters, prefixed with `...`.
    pub fn hint(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("...{tail}")
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey({})", self.hint())
    }
}

/// Why an attempt made with a key failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The provider asked us to back off, optionally saying for how long.
    RateLimited { retry_after: Option<Duration> },
    /// The provider rejected the key outright.
    Invalid,
    /// Network or server trouble unrelated to the key.
    Transient,
}

#[derive(Debug)]
struct Slot {
    key: ApiKey,
    state: CredentialState,
    cooldown_until: Option<Instant>,
    soft_failures: u32,
}

#[derive(Debug)]
struct Slots {
    slots: Vec<Slot>,
    cursor: usize,
}

impl Slots {
    fn sweep(&mut self, now: Instant) -> usize {
        let mut promoted = 0;
        for slot in &mut self.slots {
            if slot.state == CredentialState::Cooling
                && slot.cooldown_until.is_some_and(|until| until <= now)
            {
                slot.state = CredentialState::Active;
                slot.cooldown_until = None;
                promoted += 1;
                tracing::info!(
                    key = %slot.key.hint(),
                    "credential cooldown elapsed, key active again"
                );
            }
        }
        promoted
    }

    fn find(&mut self, key: &ApiKey) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.key == *key)
    }
}

/// Point-in-time view of one credential slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    pub key_hint: String,
    pub state: CredentialState,
    pub cooldown_remaining_ms: Option<u64>,
    pub soft_failures: u32,
}

/// Hands out API keys and tracks which ones are usable.
#[derive(Debug)]
pub struct CredentialRotator {
    inner: Mutex<Slots>,
    default_cooldown: Duration,
}

impl CredentialRotator {
    /// Creates a rotator with every key active. Blank keys are skipped.
    pub fn new(keys: impl IntoIterator<Item = String>, default_cooldown: Duration) -> Self {
        let slots = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| Slot {
                key: ApiKey::new(k),
                state: CredentialState::Active,
                cooldown_until: None,
                soft_failures: 0,
            })
            .collect();

        Self {
            inner: Mutex::new(Slots { slots, cursor: 0 }),
            default_cooldown,
        }
    }

    /// Builds the pool from a comma-separated key list.
    pub fn from_comma_separated(keys: &str, default_cooldown: Duration) -> Self {
        Self::new(keys.split(',').map(str::to_string), default_cooldown)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.inner.lock().unwrap_or_else(|e| {
            tracing::error!("credential table lock poisoned, recovering");
            e.into_inner()
        })
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the next active key in round-robin order.
    ///
    /// Keys whose cooldown has elapsed are promoted first, so a caller never
    /// depends on the background sweep having run.
    pub fn acquire(&self) -> Result<ApiKey, VoiceError> {
        let mut table = self.lock();
        table.sweep(Instant::now());

        let n = table.slots.len();
        for offset in 0..n {
            let idx = (table.cursor + offset) % n;
            if table.slots[idx].state == CredentialState::Active {
                table.cursor = (idx + 1) % n;
                return Ok(table.slots[idx].key.clone());
            }
        }

        Err(VoiceError::NoCredentialsAvailable)
    }

    /// Records a failed attempt made with `key`.
    pub fn report_failure(&self, key: &ApiKey, reason: FailureReason) {
        let default_cooldown = self.default_cooldown;
        let mut table = self.lock();
        let Some(slot) = table.find(key) else {
            return;
        };
        if slot.state == CredentialState::Dead {
            return;
        }

        match reason {
            FailureReason::RateLimited { retry_after } => {
                let wait = retry_after.unwrap_or(default_cooldown).min(MAX_COOLDOWN);
                let now = Instant::now();
                let until = now.checked_add(wait).unwrap_or(now);
                // A later hint extends the cooldown; an earlier one never shortens it.
                let until = slot.cooldown_until.map_or(until, |current| current.max(until));
                slot.state = CredentialState::Cooling;
                slot.cooldown_until = Some(until);
                tracing::warn!(
                    key = %slot.key.hint(),
                    cooldown_ms = until.saturating_duration_since(now).as_millis() as u64,
                    "credential rate limited, cooling down"
                );
            }
            FailureReason::Invalid => {
                slot.state = CredentialState::Dead;
                slot.cooldown_until = None;
                tracing::warn!(key = %slot.key.hint(), "credential rejected, marked dead");
            }
            FailureReason::Transient => {
                slot.soft_failures = slot.soft_failures.saturating_add(1);
                tracing::debug!(
                    key = %slot.key.hint(),
                    soft_failures = slot.soft_failures,
                    "transient failure recorded"
                );
            }
        }
    }

    /// Records a successful attempt. Clears soft-failure counters.
    pub fn report_success(&self, key: &ApiKey) {
        let mut table = self.lock();
        if let Some(slot) = table.find(key) {
            slot.soft_failures = 0;
        }
    }

    /// Promotes every cooling key whose deadline has passed. Returns how many
    /// were promoted.
    pub fn sweep(&self) -> usize {
        self.lock().sweep(Instant::now())
    }

    pub fn snapshot(&self) -> Vec<CredentialSnapshot> {
        let now = Instant::now();
        self.lock()
            .slots
            .iter()
            .map(|slot| CredentialSnapshot {
                key_hint: slot.key.hint(),
                state: slot.state,
                cooldown_remaining_ms: slot
                    .cooldown_until
                    .map(|until| until.saturating_duration_since(now).as_millis() as u64),
                soft_failures: slot.soft_failures,
            })
            .collect()
    }
}
