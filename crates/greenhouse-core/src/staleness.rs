use crate::store::{SnapshotDiff, StateStore};
use crate::GroupId;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Delayed,
}

/// Seconds left before a group's next expected push. `None` means the server
/// never declared an interval; such groups are never flagged delayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Countdown {
    remaining: Option<u32>,
}

impl Countdown {
    pub fn from_interval(interval_ms: Option<u64>) -> Self {
        Self {
            remaining: interval_ms.map(ticks_for_interval),
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub fn staleness(&self) -> Staleness {
        match self.remaining {
            Some(0) => Staleness::Delayed,
            _ => Staleness::Fresh,
        }
    }

    pub fn is_delayed(&self) -> bool {
        self.staleness() == Staleness::Delayed
    }

    fn advance(&mut self) -> bool {
        match self.remaining.as_mut() {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

pub fn ticks_for_interval(interval_ms: u64) -> u32 {
    u32::try_from(interval_ms.div_ceil(1000)).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Countdowns that moved this tick.
    pub advanced: BTreeSet<GroupId>,
    /// Countdowns that reached zero this tick.
    pub became_delayed: BTreeSet<GroupId>,
}

/// One fixed-period countdown per tracked group, driven by store diffs.
#[derive(Debug, Clone, Default)]
pub struct StalenessScheduler {
    countdowns: BTreeMap<GroupId, Countdown>,
}

impl StalenessScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every id the snapshot mentioned and drops evicted ids.
    pub fn observe_snapshot(&mut self, diff: &SnapshotDiff, store: &StateStore) {
        for id in &diff.removed {
            self.countdowns.remove(id);
        }
        for id in diff.touched() {
            let interval_ms = store.get(id).and_then(|entry| entry.update_interval_ms);
            self.countdowns
                .insert(id.clone(), Countdown::from_interval(interval_ms));
        }
    }

    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        for (id, countdown) in self.countdowns.iter_mut() {
            if !countdown.advance() {
                continue;
            }
            report.advanced.insert(id.clone());
            if countdown.is_delayed() {
                report.became_delayed.insert(id.clone());
            }
        }
        report
    }

    pub fn countdown(&self, id: &str) -> Option<Countdown> {
        self.countdowns.get(id).copied()
    }

    pub fn is_tracking(&self, id: &str) -> bool {
        self.countdowns.contains_key(id)
    }

    pub fn delayed_count(&self) -> usize {
        self.countdowns
            .values()
            .filter(|countdown| countdown.is_delayed())
            .count()
    }

    pub fn len(&self) -> usize {
        self.countdowns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countdowns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PartialGroupData;

    fn store_with(items: Vec<(&str, Option<u64>)>) -> (StateStore, SnapshotDiff) {
        let mut store = StateStore::new();
        let snapshot = items
            .into_iter()
            .map(|(id, interval)| {
                let mut data = PartialGroupData::new().with_field("temperature", 20.0);
                data.interval_ms = interval;
                (id.to_string(), data)
            })
            .collect();
        let diff = store.apply_snapshot(snapshot);
        (store, diff)
    }

    #[test]
    fn countdown_starts_at_interval_seconds() {
        assert_eq!(ticks_for_interval(5000), 5);
        assert_eq!(ticks_for_interval(1500), 2);
        assert_eq!(ticks_for_interval(0), 0);
    }

    #[test]
    fn countdown_reaches_delayed_and_clamps_at_zero() {
        let (store, diff) = store_with(vec![("g1", Some(3000))]);
        let mut scheduler = StalenessScheduler::new();
        scheduler.observe_snapshot(&diff, &store);

        assert_eq!(scheduler.countdown("g1").and_then(|c| c.remaining()), Some(3));
        scheduler.tick();
        scheduler.tick();
        let report = scheduler.tick();
        assert!(report.became_delayed.contains("g1"));

        for _ in 0..5 {
            let report = scheduler.tick();
            assert!(report.advanced.is_empty());
        }
        let countdown = scheduler.countdown("g1").expect("tracked");
        assert_eq!(countdown.remaining(), Some(0));
        assert_eq!(countdown.staleness(), Staleness::Delayed);
    }

    #[test]
    fn fresh_push_resets_countdown() {
        let (mut store, diff) = store_with(vec![("g1", Some(2000))]);
        let mut scheduler = StalenessScheduler::new();
        scheduler.observe_snapshot(&diff, &store);
        scheduler.tick();
        scheduler.tick();
        assert!(scheduler.countdown("g1").expect("tracked").is_delayed());

        let mut snapshot = BTreeMap::new();
        snapshot.insert(
            "g1".to_string(),
            PartialGroupData::new().with_field("humidity", 50.0),
        );
        let diff = store.apply_snapshot(snapshot);
        scheduler.observe_snapshot(&diff, &store);

        let countdown = scheduler.countdown("g1").expect("tracked");
        assert_eq!(countdown.remaining(), Some(2));
        assert_eq!(countdown.staleness(), Staleness::Fresh);
    }

    #[test]
    fn groups_without_interval_never_become_delayed() {
        let (store, diff) = store_with(vec![("g1", None)]);
        let mut scheduler = StalenessScheduler::new();
        scheduler.observe_snapshot(&diff, &store);
        for _ in 0..30 {
            scheduler.tick();
        }
        let countdown = scheduler.countdown("g1").expect("tracked");
        assert_eq!(countdown.remaining(), None);
        assert_eq!(countdown.staleness(), Staleness::Fresh);
        assert_eq!(scheduler.delayed_count(), 0);
    }

    #[test]
    fn evicted_groups_lose_their_countdown() {
        let (mut store, diff) = store_with(vec![("g1", Some(5000)), ("g2", Some(5000))]);
        let mut scheduler = StalenessScheduler::new();
        scheduler.observe_snapshot(&diff, &store);

        let mut snapshot = BTreeMap::new();
        snapshot.insert("g1".to_string(), PartialGroupData::new());
        let diff = store.apply_snapshot(snapshot);
        scheduler.observe_snapshot(&diff, &store);

        assert!(scheduler.is_tracking("g1"));
        assert!(!scheduler.is_tracking("g2"));
        assert_eq!(scheduler.len(), 1);
    }
}
