use std::collections::VecDeque;

use livecast_types::ScriptSegment;

/// Bounded window of recent narration, oldest first.
#[derive(Debug, Clone)]
pub struct NarrationHistory {
    entries: VecDeque<ScriptSegment>,
    limit: usize,
}

impl NarrationHistory {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Seeds the window, keeping only the newest `limit` entries.
    pub fn seeded(limit: usize, segments: impl IntoIterator<Item = ScriptSegment>) -> Self {
        let mut history = Self::new(limit);
        for segment in segments {
            history.push(segment);
        }
        history
    }

    pub fn push(&mut self, segment: ScriptSegment) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(segment);
    }

    pub fn context(&mut self) -> &[ScriptSegment] {
        self.entries.make_contiguous()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
