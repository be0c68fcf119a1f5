//! Analysis task result cache.
//!
//! Holds the last result of each analysis task for the active transcript and
//! the set of task types currently being computed. Every `clear_all` starts a
//! new epoch; completions tagged with an older epoch are rejected.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::types::{AgentType, AnalysisResult};

#[derive(Debug, Default)]
struct CacheInner {
    results: HashMap<AgentType, AnalysisResult>,
    in_flight: HashSet<AgentType>,
    epoch: u64,
}

/// Task-type keyed cache with single-flight bookkeeping.
#[derive(Debug, Default)]
pub struct AnalysisTaskCache {
    inner: Mutex<CacheInner>,
}

impl AnalysisTaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, agent_type: AgentType) -> Option<AnalysisResult> {
        self.lock().results.get(&agent_type).cloned()
    }

    pub fn has(&self, agent_type: AgentType) -> bool {
        self.lock().results.contains_key(&agent_type)
    }

    /// Store a result under its own task type, replacing any previous one.
    pub fn put(&self, result: AnalysisResult) {
        self.lock().results.insert(result.agent_type(), result);
    }

    /// Store a result only if no `clear_all` happened since `epoch`.
    pub fn put_if_current(&self, epoch: u64, result: AnalysisResult) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        inner.results.insert(result.agent_type(), result);
        true
    }

    /// Drop every result and in-flight marker and start a new epoch.
    pub fn clear_all(&self) {
        let mut inner = self.lock();
        inner.results.clear();
        inner.in_flight.clear();
        inner.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Claim the in-flight slot for a task type.
    ///
    /// Returns the current epoch on success, `None` if the task is already
    /// being computed.
    pub fn try_begin(&self, agent_type: AgentType) -> Option<u64> {
        let mut inner = self.lock();
        if inner.in_flight.insert(agent_type) {
            Some(inner.epoch)
        } else {
            None
        }
    }

    /// Release an in-flight slot claimed in `epoch`. Stale releases are ignored.
    pub fn finish(&self, epoch: u64, agent_type: AgentType) {
        let mut inner = self.lock();
        if inner.epoch == epoch {
            inner.in_flight.remove(&agent_type);
        }
    }

    pub fn is_in_flight(&self, agent_type: AgentType) -> bool {
        self.lock().in_flight.contains(&agent_type)
    }

    /// Task types with no cached result, in tie-break order.
    pub fn missing(&self) -> Vec<AgentType> {
        let inner = self.lock();
        AgentType::ALL
            .into_iter()
            .filter(|a| !inner.results.contains_key(a))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Entries are plain values, so a poisoned lock still has consistent data.
    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HighlightItem, ViolationItem};

    fn summary(text: &str) -> AnalysisResult {
        AnalysisResult::Summary(text.to_string())
    }

    #[test]
    fn test_empty_cache() {
        let cache = AnalysisTaskCache::new();
        assert!(cache.is_empty());
        assert!(!cache.has(AgentType::Summarize));
        assert_eq!(cache.get(AgentType::Summarize), None);
        assert_eq!(cache.missing(), AgentType::ALL.to_vec());
    }

    #[test]
    fn test_put_then_get() {
        let cache = AnalysisTaskCache::new();
        cache.put(summary("S"));
        assert!(cache.has(AgentType::Summarize));
        assert_eq!(cache.get(AgentType::Summarize), Some(summary("S")));
        assert!(!cache.has(AgentType::Highlight));
    }

    #[test]
    fn test_put_overwrites_same_task_type() {
        let cache = AnalysisTaskCache::new();
        cache.put(summary("first"));
        cache.put(summary("second"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(AgentType::Summarize), Some(summary("second")));
    }

    #[test]
    fn test_put_keys_by_result_kind() {
        let cache = AnalysisTaskCache::new();
        cache.put(AnalysisResult::Highlights(vec![HighlightItem {
            timestamp: "00:10".to_string(),
            text: "Opening".to_string(),
            reason: None,
        }]));
        cache.put(AnalysisResult::Violations(vec![ViolationItem {
            violation: "Profanity".to_string(),
            explanation: "Strong language".to_string(),
            timestamp: None,
        }]));
        assert!(cache.has(AgentType::Highlight));
        assert!(cache.has(AgentType::Violation));
        assert_eq!(cache.missing(), vec![AgentType::Summarize]);
    }

    #[test]
    fn test_clear_all_removes_results() {
        let cache = AnalysisTaskCache::new();
        cache.put(summary("S"));
        cache.clear_all();
        assert!(!cache.has(AgentType::Summarize));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_single_flight_per_task_type() {
        let cache = AnalysisTaskCache::new();
        let epoch = cache.try_begin(AgentType::Highlight).unwrap();
        assert!(cache.try_begin(AgentType::Highlight).is_none());
        assert!(cache.try_begin(AgentType::Violation).is_some());
        assert!(cache.is_in_flight(AgentType::Highlight));

        cache.finish(epoch, AgentType::Highlight);
        assert!(!cache.is_in_flight(AgentType::Highlight));
        assert!(cache.try_begin(AgentType::Highlight).is_some());
    }

    #[test]
    fn test_stale_epoch_is_rejected() {
        let cache = AnalysisTaskCache::new();
        let epoch = cache.try_begin(AgentType::Summarize).unwrap();
        cache.clear_all();

        assert!(!cache.put_if_current(epoch, summary("old transcript")));
        assert!(!cache.has(AgentType::Summarize));
        // The new epoch starts with nothing in flight.
        assert!(!cache.is_in_flight(AgentType::Summarize));
    }

    #[test]
    fn test_stale_finish_does_not_release_new_claim() {
        let cache = AnalysisTaskCache::new();
        let old = cache.try_begin(AgentType::Summarize).unwrap();
        cache.clear_all();
        let new = cache.try_begin(AgentType::Summarize).unwrap();
        assert_ne!(old, new);

        cache.finish(old, AgentType::Summarize);
        assert!(cache.is_in_flight(AgentType::Summarize));
        cache.finish(new, AgentType::Summarize);
        assert!(!cache.is_in_flight(AgentType::Summarize));
    }

    #[test]
    fn test_put_if_current_accepts_current_epoch() {
        let cache = AnalysisTaskCache::new();
        let epoch = cache.epoch();
        assert!(cache.put_if_current(epoch, summary("S")));
        assert!(cache.has(AgentType::Summarize));
    }
}
