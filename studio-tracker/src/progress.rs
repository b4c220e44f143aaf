//! Progress aggregation over the materialized task lists.
//!
//! Counts always come from materialization, never from the raw completion
//! set: deleted tasks and tasks of a hidden phase must not count.

use std::collections::BTreeSet;

use studio_tracker_sdk::{Phase, Project, TaskId};

use crate::materialize::materialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
}

impl Progress {
    /// Rounded percentage, clamped to `[0, 100]`; 0 when there is nothing
    /// to count.
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.completed as f64 / self.total as f64 * 100.0).round() as i64;
        pct.clamp(0, 100) as u32
    }
}

/// Sum materialized tasks across all visible phases. `completed_override`
/// substitutes the completion set, for optimistic pre-commit calculations.
pub fn compute_progress(project: &Project, completed_override: Option<&BTreeSet<TaskId>>) -> Progress {
    let done = completed_override.unwrap_or(&project.completed_tasks);
    let mut progress = Progress::default();
    for phase in Phase::all() {
        if phase == Phase::Build && project.build_phase_hidden {
            continue;
        }
        let tasks = materialize(project, phase);
        progress.total += tasks.len();
        progress.completed += tasks.iter().filter(|t| done.contains(&t.id)).count();
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_tracker_sdk::TaskId;

    #[test]
    fn percentage_bounds() {
        assert_eq!(Progress { total: 0, completed: 0 }.percentage(), 0);
        assert_eq!(Progress { total: 3, completed: 3 }.percentage(), 100);
        assert_eq!(Progress { total: 3, completed: 1 }.percentage(), 33);
        assert_eq!(Progress { total: 3, completed: 2 }.percentage(), 67);
        // defensive clamp if counts ever disagree
        assert_eq!(Progress { total: 2, completed: 5 }.percentage(), 100);
    }

    #[test]
    fn deleted_tasks_do_not_count() {
        let mut p = Project::new("테스트", "스튜디오");
        let before = compute_progress(&p, None);
        let id = TaskId::new_static(Phase::Planning, 1);
        p.completed_tasks.insert(id.clone());
        p.deleted_tasks.insert(id);
        let after = compute_progress(&p, None);
        assert_eq!(after.total, before.total - 1);
        assert_eq!(after.completed, 0);
    }

    #[test]
    fn hidden_build_phase_is_skipped() {
        let mut p = Project::new("테스트", "스튜디오");
        let visible = compute_progress(&p, None);
        p.build_phase_hidden = true;
        let hidden = compute_progress(&p, None);
        // default build phase: 2 statics + 1 round pair
        assert_eq!(visible.total - hidden.total, 4);
    }

    #[test]
    fn override_set_replaces_completions() {
        let mut p = Project::new("테스트", "스튜디오");
        p.completed_tasks.insert(TaskId::new_static(Phase::Planning, 1));
        let mut optimistic = BTreeSet::new();
        optimistic.insert(TaskId::new_static(Phase::Planning, 1));
        optimistic.insert(TaskId::new_static(Phase::Planning, 2));
        let progress = compute_progress(&p, Some(&optimistic));
        assert_eq!(progress.completed, 2);
    }
}
