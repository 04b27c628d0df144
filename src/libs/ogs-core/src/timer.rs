//! Timer manager
//!
//! Timers live in an [`OgsPool`] and running timers are ordered in a
//! BTreeMap by deadline, giving O(log n) start/stop like a red-black tree.
//! A timer carries a payload instead of a callback: expiry hands the
//! payload back to the caller, who turns it into an event.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::pool::{OgsPool, OgsPoolId};

/// Timer handle (generation-tagged, stale handles never resolve)
pub type OgsTimerId = OgsPoolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TimerKey {
    deadline: Instant,
    /// Tie-breaker for equal deadlines, preserves start order
    seq: u64,
}

#[derive(Debug)]
struct OgsTimer<T> {
    data: T,
    key: Option<TimerKey>,
}

/// Timer manager
#[derive(Debug)]
pub struct OgsTimerMgr<T> {
    timers: OgsPool<OgsTimer<T>>,
    tree: BTreeMap<TimerKey, OgsTimerId>,
    seq: u64,
}

impl<T> OgsTimerMgr<T> {
    /// Create a timer manager holding at most `capacity` timers
    pub fn new(capacity: usize) -> Self {
        OgsTimerMgr {
            timers: OgsPool::new("timer", capacity),
            tree: BTreeMap::new(),
            seq: 0,
        }
    }

    /// Add a stopped timer carrying `data`
    pub fn add(&mut self, data: T) -> Option<OgsTimerId> {
        self.timers.alloc(OgsTimer { data, key: None })
    }

    /// Delete a timer, stopping it first; returns its payload
    pub fn delete(&mut self, id: OgsTimerId) -> Option<T> {
        self.stop(id);
        self.timers.free(id).map(|timer| timer.data)
    }

    /// (Re)start a timer relative to now
    pub fn start(&mut self, id: OgsTimerId, duration: Duration) -> bool {
        self.start_at(id, Instant::now(), duration)
    }

    /// (Re)start a timer relative to `now`
    ///
    /// Durations beyond `MAX_DELAY`, or past what `Instant` can hold, are
    /// clamped.
    pub fn start_at(&mut self, id: OgsTimerId, now: Instant, duration: Duration) -> bool {
        let Some(timer) = self.timers.find_mut(id) else {
            return false;
        };
        if let Some(old) = timer.key.take() {
            self.tree.remove(&old);
        }

        self.seq += 1;
        let key = TimerKey {
            deadline: deadline_after(now, duration),
            seq: self.seq,
        };
        timer.key = Some(key);
        self.tree.insert(key, id);
        true
    }

    /// Stop a running timer; the timer itself stays allocated
    pub fn stop(&mut self, id: OgsTimerId) {
        if let Some(timer) = self.timers.find_mut(id) {
            if let Some(key) = timer.key.take() {
                self.tree.remove(&key);
            }
        }
    }

    pub fn is_running(&self, id: OgsTimerId) -> bool {
        self.timers
            .find(id)
            .map(|timer| timer.key.is_some())
            .unwrap_or(false)
    }

    /// Payload of a timer
    pub fn data(&self, id: OgsTimerId) -> Option<&T> {
        self.timers.find(id).map(|timer| &timer.data)
    }

    /// Time until the earliest deadline, None when nothing is running
    pub fn next(&self, now: Instant) -> Option<Duration> {
        self.tree
            .first_key_value()
            .map(|(key, _)| key.deadline.saturating_duration_since(now))
    }

    /// Stop every timer whose deadline is at or before `now`
    ///
    /// Returns the expired handles in deadline order. The timers stay
    /// allocated; their owners delete them.
    pub fn expire(&mut self, now: Instant) -> Vec<OgsTimerId> {
        let mut expired = Vec::new();
        while let Some((key, id)) = self.tree.first_key_value() {
            if key.deadline > now {
                break;
            }
            let (key, id) = (*key, *id);
            self.tree.remove(&key);
            if let Some(timer) = self.timers.find_mut(id) {
                timer.key = None;
            }
            expired.push(id);
        }
        expired
    }

    /// Number of running timers
    pub fn count(&self) -> usize {
        self.tree.len()
    }

    /// Number of allocated timers, running or not
    pub fn allocated(&self) -> usize {
        self.timers.allocated()
    }

    pub fn available(&self) -> usize {
        self.timers.available()
    }

    pub fn capacity(&self) -> usize {
        self.timers.capacity()
    }
}

impl<T> Default for OgsTimerMgr<T> {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Longest delay a timer is armed with
pub const MAX_DELAY: Duration = Duration::from_secs(u32::MAX as u64);

fn deadline_after(now: Instant, duration: Duration) -> Instant {
    let mut delay = duration.min(MAX_DELAY);
    loop {
        if let Some(deadline) = now.checked_add(delay) {
            return deadline;
        }
        delay /= 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_add_delete() {
        let mut mgr: OgsTimerMgr<&str> = OgsTimerMgr::new(2);
        let t1 = mgr.add("a").unwrap();
        let t2 = mgr.add("b").unwrap();
        assert!(mgr.add("c").is_none());
        assert_eq!(mgr.available(), 0);

        assert_eq!(mgr.delete(t1), Some("a"));
        assert_eq!(mgr.delete(t1), None);
        assert_eq!(mgr.data(t2), Some(&"b"));
        assert_eq!(mgr.allocated(), 1);
    }

    #[test]
    fn test_timer_expire_order() {
        let mut mgr = OgsTimerMgr::new(8);
        let now = Instant::now();
        let slow = mgr.add(2).unwrap();
        let fast = mgr.add(1).unwrap();
        mgr.start_at(slow, now, Duration::from_millis(200));
        mgr.start_at(fast, now, Duration::from_millis(100));
        assert_eq!(mgr.count(), 2);
        assert_eq!(mgr.next(now), Some(Duration::from_millis(100)));

        assert!(mgr.expire(now + Duration::from_millis(50)).is_empty());
        let expired = mgr.expire(now + Duration::from_millis(300));
        assert_eq!(expired, vec![fast, slow]);
        assert_eq!(mgr.count(), 0);
        assert!(!mgr.is_running(fast));
        assert_eq!(mgr.allocated(), 2);
    }

    #[test]
    fn test_timer_restart_replaces_deadline() {
        let mut mgr = OgsTimerMgr::new(4);
        let now = Instant::now();
        let t = mgr.add(()).unwrap();
        mgr.start_at(t, now, Duration::from_millis(10));
        mgr.start_at(t, now, Duration::from_secs(10));
        assert_eq!(mgr.count(), 1);
        assert!(mgr.expire(now + Duration::from_secs(1)).is_empty());
        assert!(mgr.is_running(t));
    }

    #[test]
    fn test_timer_stop() {
        let mut mgr = OgsTimerMgr::new(4);
        let now = Instant::now();
        let t = mgr.add(()).unwrap();
        assert!(mgr.start_at(t, now, Duration::ZERO));
        mgr.stop(t);
        assert!(mgr.expire(now + Duration::from_secs(1)).is_empty());
        assert_eq!(mgr.next(now), None);
    }

    #[test]
    fn test_timer_huge_duration_is_clamped() {
        let mut mgr = OgsTimerMgr::new(4);
        let now = Instant::now();
        let t = mgr.add(()).unwrap();
        assert!(mgr.start_at(t, now, Duration::MAX));
        assert!(mgr.is_running(t));
        let next = mgr.next(now).unwrap();
        assert!(next <= MAX_DELAY);
        assert!(next > Duration::from_secs(3600));
        assert!(mgr.expire(now + Duration::from_secs(3600)).is_empty());
    }

    #[test]
    fn test_timer_deleted_never_fires() {
        let mut mgr = OgsTimerMgr::new(4);
        let now = Instant::now();
        let t = mgr.add(()).unwrap();
        mgr.start_at(t, now, Duration::from_millis(1));
        mgr.delete(t);
        assert!(!mgr.start_at(t, now, Duration::from_millis(1)));
        assert!(mgr.expire(now + Duration::from_secs(1)).is_empty());
    }
}
