//! Local-first sync policy: merge-on-fetch resolution and debounced
//! refresh signals.
//!
//! Mutations commit locally first and propagate to the remote store
//! afterwards, so a locally-cached snapshot and a remotely-fetched one can
//! disagree. The resolution rules, in priority order:
//!
//! 1. a remote record flagged soft-deleted always wins;
//! 2. a remote record missing a round-count value the local copy has is a
//!    lossy partial write — the local copy wins;
//! 3. otherwise the later `last_updated` wins.

use std::time::{Duration, Instant};

use studio_tracker_sdk::{Phase, Project};

/// Resolve a disagreement between the locally-cached and remotely-fetched
/// copy of the same project.
pub fn resolve_conflict(local: Project, remote: Project) -> Project {
    if remote.is_deleted() {
        return remote;
    }
    for phase in [Phase::Design, Phase::Review, Phase::Build] {
        if remote.round_counts.stored(phase).is_none()
            && local.round_counts.stored(phase).is_some()
        {
            tracing::warn!(
                project = %local.id,
                phase = phase.number(),
                "원격 라운드 수 누락, 로컬 스냅샷 유지"
            );
            return local;
        }
    }
    if remote.last_updated >= local.last_updated {
        remote
    } else {
        local
    }
}

/// Coalesces bursts of "something changed" signals into a single refresh.
///
/// Callers feed every incoming notification to [`signal`](Self::signal) and
/// poll on their own tick; a refresh is due once the window has elapsed
/// since the last signal. The `_at` variants take an explicit clock so the
/// behavior is testable.
#[derive(Debug)]
pub struct RefreshDebouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl RefreshDebouncer {
    pub fn new(window: Duration) -> RefreshDebouncer {
        RefreshDebouncer {
            window,
            deadline: None,
        }
    }

    pub fn signal(&mut self) {
        self.signal_at(Instant::now());
    }

    pub fn signal_at(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// True exactly once per settled burst.
    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use studio_tracker_sdk::ProjectStatus;

    fn pair() -> (Project, Project) {
        let local = Project::new("테스트", "스튜디오");
        let mut remote = local.clone();
        remote.last_updated = remote.last_updated + ChronoDuration::seconds(10);
        (local, remote)
    }

    #[test]
    fn later_timestamp_wins() {
        let (local, remote) = pair();
        let resolved = resolve_conflict(local.clone(), remote.clone());
        assert_eq!(resolved.last_updated, remote.last_updated);

        let mut newer_local = local;
        newer_local.name = "로컬 수정".into();
        newer_local.last_updated = remote.last_updated + ChronoDuration::seconds(10);
        let resolved = resolve_conflict(newer_local.clone(), remote);
        assert_eq!(resolved.name, "로컬 수정");
    }

    #[test]
    fn remote_soft_delete_always_wins() {
        let (mut local, mut remote) = pair();
        remote.status = ProjectStatus::Deleted {
            deleted_at: chrono::Local::now(),
        };
        // even against a newer local copy
        local.last_updated = remote.last_updated + ChronoDuration::seconds(60);
        assert!(resolve_conflict(local, remote).is_deleted());
    }

    #[test]
    fn lossy_remote_round_count_loses() {
        let (mut local, remote) = pair();
        local.round_counts.set(Phase::Design, 4);
        // remote is newer but lost the round count
        let resolved = resolve_conflict(local, remote);
        assert_eq!(resolved.round_counts.stored(Phase::Design), Some(4));
    }

    #[test]
    fn debouncer_coalesces_bursts() {
        let window = Duration::from_millis(300);
        let mut debouncer = RefreshDebouncer::new(window);
        let start = Instant::now();

        assert!(!debouncer.poll_at(start));
        debouncer.signal_at(start);
        debouncer.signal_at(start + Duration::from_millis(100));
        debouncer.signal_at(start + Duration::from_millis(200));
        // each signal pushes the deadline out
        assert!(!debouncer.poll_at(start + Duration::from_millis(400)));
        assert!(debouncer.poll_at(start + Duration::from_millis(500)));
        // fires once per burst
        assert!(!debouncer.poll_at(start + Duration::from_millis(600)));
        assert!(!debouncer.pending());
    }
}
