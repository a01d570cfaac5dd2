//! Interrupt priority and queue bounding policy.

use crate::InterruptKind;
use serde::{Deserialize, Serialize};

/// Relative priority of each interrupt kind. Higher is serviced first.
///
/// Deployments can reorder gifts and superchats freely; nothing in the
/// queue assumes a particular ordering between kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityWeights {
    #[serde(default = "default_chat_weight")]
    pub chat: i64,
    #[serde(default = "default_superchat_weight")]
    pub superchat: i64,
    #[serde(default = "default_gift_weight")]
    pub gift: i64,
}

fn default_chat_weight() -> i64 {
    10
}

fn default_superchat_weight() -> i64 {
    20
}

fn default_gift_weight() -> i64 {
    30
}

impl PriorityWeights {
    pub fn weight_for(&self, kind: InterruptKind) -> i64 {
        match kind {
            InterruptKind::Chat => self.chat,
            InterruptKind::Superchat => self.superchat,
            InterruptKind::Gift => self.gift,
        }
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            chat: default_chat_weight(),
            superchat: default_superchat_weight(),
            gift: default_gift_weight(),
        }
    }
}

/// Bounds and ordering rules applied by the interrupt queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuePolicy {
    /// Maximum number of pending events before the overflow policy applies.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Upper bound on a single dequeue round-trip, in milliseconds.
    #[serde(default = "default_dequeue_timeout_ms")]
    pub dequeue_timeout_ms: u64,

    /// Whether a larger monetary amount is serviced first within one weight class.
    #[serde(default = "default_amount_tiebreak")]
    pub amount_tiebreak: bool,

    #[serde(default)]
    pub weights: PriorityWeights,
}

fn default_capacity() -> usize {
    256
}

fn default_dequeue_timeout_ms() -> u64 {
    500
}

fn default_amount_tiebreak() -> bool {
    true
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            dequeue_timeout_ms: default_dequeue_timeout_ms(),
            amount_tiebreak: default_amount_tiebreak(),
            weights: PriorityWeights::default(),
        }
    }
}
