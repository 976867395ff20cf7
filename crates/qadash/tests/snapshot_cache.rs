use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use qadash::adapters::FallbackSource;
use qadash::cache::{FetchContext, FetchError, RefreshPolicy, SnapshotCache, SnapshotSource};
use qadash::models::{RecordSet, SprintSummary};

/// Counts loads; every load after the first `fast_loads` sleeps for `delay`.
struct CountingSource {
    calls: AtomicUsize,
    fast_loads: usize,
    delay: Duration,
}

impl CountingSource {
    fn new(fast_loads: usize, delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fast_loads,
            delay,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for CountingSource {
    fn describe(&self) -> String {
        "counting".to_string()
    }

    fn load(&self, _ctx: &FetchContext) -> Result<RecordSet> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fast_loads {
            thread::sleep(self.delay);
        }
        Ok(RecordSet {
            sprints: vec![SprintSummary::empty(format!("Sprint {}", call + 1))],
            ..RecordSet::default()
        })
    }
}

struct Broken(&'static str);

impl SnapshotSource for Broken {
    fn describe(&self) -> String {
        format!("broken:{}", self.0)
    }

    fn load(&self, _ctx: &FetchContext) -> Result<RecordSet> {
        bail!("{} is unreachable", self.0)
    }
}

/// Sleeps through every load without polling the context and tracks how many
/// loads overlap.
struct OverlapSource {
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl OverlapSource {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
        }
    }
}

impl SnapshotSource for OverlapSource {
    fn describe(&self) -> String {
        "overlap".to_string()
    }

    fn load(&self, _ctx: &FetchContext) -> Result<RecordSet> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(RecordSet {
            sprints: vec![SprintSummary::empty(format!("Sprint {}", call + 1))],
            ..RecordSet::default()
        })
    }
}

/// Fails every load and counts the attempts.
struct FailingSource {
    calls: AtomicUsize,
}

impl SnapshotSource for FailingSource {
    fn describe(&self) -> String {
        "failing".to_string()
    }

    fn load(&self, _ctx: &FetchContext) -> Result<RecordSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("store offline")
    }
}

fn policy(max_age: Duration, fetch_timeout: Duration) -> RefreshPolicy {
    RefreshPolicy {
        max_age,
        fetch_timeout,
        ..RefreshPolicy::default()
    }
}

#[test]
fn concurrent_readers_share_one_fetch() {
    let cache = SnapshotCache::new(
        CountingSource::new(0, Duration::from_millis(200)),
        policy(Duration::from_secs(300), Duration::from_secs(5)),
    );

    thread::scope(|scope| {
        let readers = (0..4)
            .map(|_| scope.spawn(|| cache.get()))
            .collect::<Vec<_>>();
        for reader in readers {
            let view = reader.join().expect("reader thread should finish");
            assert!(!view.stale);
            assert_eq!(view.records.sprints[0].sprint_id, "Sprint 1");
        }
    });

    assert_eq!(cache.source().calls(), 1);
}

#[test]
fn fresh_snapshot_is_served_without_refetching() {
    let cache = SnapshotCache::new(
        CountingSource::new(usize::MAX, Duration::ZERO),
        RefreshPolicy::default(),
    );

    let first = cache.get();
    let second = cache.get();

    assert_eq!(cache.source().calls(), 1);
    assert_eq!(first.loaded_at_unix_ms, second.loaded_at_unix_ms);
}

#[test]
fn zero_max_age_refetches_every_read() {
    let cache = SnapshotCache::new(
        CountingSource::new(usize::MAX, Duration::ZERO),
        policy(Duration::ZERO, Duration::from_secs(5)),
    );

    cache.get();
    let view = cache.get();

    assert_eq!(cache.source().calls(), 2);
    assert_eq!(view.records.sprints[0].sprint_id, "Sprint 2");
}

#[test]
fn invalidate_forces_the_next_read_to_refetch() {
    let cache = SnapshotCache::new(
        CountingSource::new(usize::MAX, Duration::ZERO),
        RefreshPolicy::default(),
    );

    cache.get();
    cache.invalidate();
    let view = cache.get();

    assert_eq!(cache.source().calls(), 2);
    assert_eq!(view.records.sprints[0].sprint_id, "Sprint 2");
    assert!(!view.stale);
}

#[test]
fn slow_refresh_times_out_and_keeps_last_good_snapshot() {
    let cache = SnapshotCache::new(
        CountingSource::new(1, Duration::from_millis(500)),
        policy(Duration::from_secs(300), Duration::from_millis(50)),
    );

    let good = cache.get();
    assert!(!good.stale);

    cache.invalidate();
    let view = cache.get();

    assert!(view.stale);
    assert_eq!(view.records.sprints[0].sprint_id, "Sprint 1");
    assert_eq!(view.loaded_at_unix_ms, good.loaded_at_unix_ms);
    match view.error {
        Some(FetchError::TimedOut { timeout_ms, .. }) => assert_eq!(timeout_ms, 50),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(
        view.error.as_ref().map(FetchError::code),
        Some("fetch_timed_out")
    );
}

#[test]
fn reads_after_a_timeout_join_the_running_fetch() {
    let cache = SnapshotCache::new(
        OverlapSource::new(Duration::from_millis(500)),
        policy(Duration::from_secs(300), Duration::from_millis(50)),
    );

    for _ in 0..4 {
        let view = cache.get();
        assert!(view.stale);
        assert!(view.records.is_empty());
        assert!(matches!(view.error, Some(FetchError::TimedOut { .. })));
    }
    assert!(cache.is_fetching());

    thread::sleep(Duration::from_millis(600));
    let view = cache.get();

    assert!(!cache.is_fetching());
    assert!(!view.stale);
    assert!(view.error.is_none());
    assert_eq!(view.records.sprints[0].sprint_id, "Sprint 1");
    assert_eq!(cache.source().calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.source().peak.load(Ordering::SeqCst), 1);
}

#[test]
fn last_snapshot_is_served_at_once_while_a_refresh_runs() {
    let cache = SnapshotCache::new(
        CountingSource::new(1, Duration::from_millis(300)),
        policy(Duration::from_secs(300), Duration::from_millis(50)),
    );
    let good = cache.get();

    cache.invalidate();
    let timed_out = cache.get();
    assert!(timed_out.stale);

    let started = Instant::now();
    let during = cache.get();
    assert!(started.elapsed() < Duration::from_millis(50));
    assert!(during.stale);
    assert_eq!(during.records.sprints[0].sprint_id, "Sprint 1");
    assert_eq!(during.loaded_at_unix_ms, good.loaded_at_unix_ms);

    thread::sleep(Duration::from_millis(400));
    let after = cache.get();

    assert!(!after.stale);
    assert_eq!(after.records.sprints[0].sprint_id, "Sprint 2");
    assert_eq!(cache.source().calls(), 2);
}

#[test]
fn failed_fetch_is_not_retried_until_the_backoff_passes() {
    let cache = SnapshotCache::new(
        FailingSource {
            calls: AtomicUsize::new(0),
        },
        RefreshPolicy {
            retry_backoff: Duration::from_secs(60),
            ..RefreshPolicy::default()
        },
    );

    for _ in 0..3 {
        let view = cache.get();
        assert!(view.stale);
        assert_eq!(view.error.as_ref().map(FetchError::code), Some("fetch_failed"));
    }
    assert_eq!(cache.source().calls.load(Ordering::SeqCst), 1);

    cache.refresh();
    assert_eq!(cache.source().calls.load(Ordering::SeqCst), 2);
}

#[test]
fn fallback_uses_next_source_and_records_the_skip() {
    let source = FallbackSource::new(vec![
        Box::new(Broken("primary")),
        Box::new(CountingSource::new(usize::MAX, Duration::ZERO)),
    ]);
    assert_eq!(source.describe(), "fallback[broken:primary, counting]");

    let record_set = source
        .load(&FetchContext::new(Duration::from_secs(5)))
        .expect("second source should load");

    assert_eq!(record_set.sprints.len(), 1);
    assert_eq!(record_set.warnings.len(), 1);
    assert!(record_set.warnings[0].starts_with("skipped source: broken:primary"));
    assert!(record_set.warnings[0].contains("primary is unreachable"));
}

#[test]
fn fallback_fails_when_every_source_fails() {
    let cache = SnapshotCache::new(
        FallbackSource::new(vec![Box::new(Broken("json")), Box::new(Broken("sqlite"))]),
        RefreshPolicy::default(),
    );

    let view = cache.get();

    assert!(view.stale);
    assert!(view.records.is_empty());
    match view.error {
        Some(FetchError::Source { message, .. }) => {
            assert!(message.contains("no data source could be loaded"));
            assert!(message.contains("json is unreachable"));
            assert!(message.contains("sqlite is unreachable"));
        }
        other => panic!("expected source failure, got {other:?}"),
    }
}
