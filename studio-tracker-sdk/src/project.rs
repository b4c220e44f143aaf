//! The project aggregate: one full snapshot of a tracked project.
//!
//! Snapshots are replaced, never mutated in place: every engine operation
//! clones the current snapshot, edits the clone, stamps `last_updated` and
//! hands the new snapshot back for persistence.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phases::Phase;
use crate::task::{Task, TaskId, TaskLink};

/// Per-phase round counters for the three round-bearing phases.
///
/// `None` means the value was never written or was lost in a partial remote
/// write; the effective count falls back to the phase minimum. The merge
/// policy relies on this distinction to detect lossy partial writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<u32>,
}

impl RoundCounts {
    /// Effective round count for a phase: the stored value clamped to the
    /// phase minimum, or the minimum itself when nothing is stored. Fixed
    /// phases report 0.
    pub fn get(&self, phase: Phase) -> u32 {
        let Some(min) = phase.min_rounds() else {
            return 0;
        };
        self.stored(phase).unwrap_or(min).max(min)
    }

    /// The raw stored value, with `None` preserved.
    pub fn stored(&self, phase: Phase) -> Option<u32> {
        match phase {
            Phase::Design => self.design,
            Phase::Review => self.review,
            Phase::Build => self.build,
            Phase::Planning | Phase::Delivery => None,
        }
    }

    pub fn set(&mut self, phase: Phase, count: u32) {
        match phase {
            Phase::Design => self.design = Some(count),
            Phase::Review => self.review = Some(count),
            Phase::Build => self.build = Some(count),
            Phase::Planning | Phase::Delivery => {}
        }
    }
}

/// A named group of tasks within one phase. A task belongs to at most one
/// group per phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub name: String,
    pub members: Vec<TaskId>,
}

/// Soft-delete status. Deletion is a sentinel plus timestamp, never a
/// physical erase, so projects can be restored with their state intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Deleted { deleted_at: DateTime<Local> },
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::Active
    }
}

/// The root aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub client: String,
    pub created_at: DateTime<Local>,
    /// Advanced on every mutation; drives merge/conflict resolution against
    /// a remote copy.
    pub last_updated: DateTime<Local>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub round_counts: RoundCounts,
    /// The build phase can be hidden for design-only projects.
    #[serde(default)]
    pub build_phase_hidden: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub phase_titles: BTreeMap<Phase, String>,
    /// Per-phase task definitions that override generated/base tasks of the
    /// same ID, or introduce wholly new ad-hoc tasks.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_overrides: BTreeMap<Phase, Vec<Task>>,
    /// Authoritative display/export order when present; unlisted tasks sort
    /// after, in materialization order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_order: BTreeMap<Phase, Vec<TaskId>>,
    /// Suppressed task IDs, regardless of origin.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub deleted_tasks: BTreeSet<TaskId>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub completed_tasks: BTreeSet<TaskId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<TaskId, TaskLink>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<Phase, Vec<TaskGroup>>,
    /// Tasks exposed to the external read-only client audience.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub client_visible: BTreeSet<TaskId>,
    /// When set, every mutation except unlock is refused.
    #[serde(default)]
    pub locked: bool,
    /// Last folder path reported by the NAS naming service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
}

impl Project {
    /// A blank snapshot over the phase templates.
    pub fn new(name: impl Into<String>, client: impl Into<String>) -> Project {
        let now = Local::now();
        Project {
            id: Uuid::new_v4(),
            name: name.into(),
            client: client.into(),
            created_at: now,
            last_updated: now,
            status: ProjectStatus::Active,
            round_counts: RoundCounts::default(),
            build_phase_hidden: false,
            phase_titles: BTreeMap::new(),
            task_overrides: BTreeMap::new(),
            task_order: BTreeMap::new(),
            deleted_tasks: BTreeSet::new(),
            completed_tasks: BTreeSet::new(),
            links: BTreeMap::new(),
            groups: BTreeMap::new(),
            client_visible: BTreeSet::new(),
            locked: false,
            folder_path: None,
        }
    }

    /// Clone this project's structure (rounds, overrides, order, groups,
    /// deletions, titles, hidden flag) into a fresh project, leaving the
    /// work state (completions, links, visibility, lock, folder) behind.
    pub fn clone_as_template(&self, name: impl Into<String>, client: impl Into<String>) -> Project {
        let mut next = Project::new(name, client);
        next.round_counts = self.round_counts;
        next.build_phase_hidden = self.build_phase_hidden;
        next.phase_titles = self.phase_titles.clone();
        next.task_overrides = self.task_overrides.clone();
        next.task_order = self.task_order.clone();
        next.deleted_tasks = self.deleted_tasks.clone();
        next.groups = self.groups.clone();
        next
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.status, ProjectStatus::Deleted { .. })
    }

    /// The phase title to display/export: the per-project override when one
    /// exists, the template default otherwise.
    pub fn phase_title(&self, phase: Phase) -> &str {
        self.phase_titles
            .get(&phase)
            .map(String::as_str)
            .unwrap_or_else(|| phase.default_title())
    }

    pub fn overrides(&self, phase: Phase) -> &[Task] {
        self.task_overrides.get(&phase).map_or(&[], Vec::as_slice)
    }

    pub fn find_override(&self, id: &TaskId) -> Option<&Task> {
        self.overrides(id.phase()).iter().find(|t| &t.id == id)
    }

    /// The group a task belongs to in a phase, if any.
    pub fn group_of(&self, phase: Phase, id: &TaskId) -> Option<&TaskGroup> {
        self.groups
            .get(&phase)?
            .iter()
            .find(|g| g.members.contains(id))
    }

    pub fn touch(&mut self) {
        self.last_updated = Local::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Role;

    #[test]
    fn round_counts_clamp_to_minimum() {
        let mut counts = RoundCounts::default();
        assert_eq!(counts.get(Phase::Design), 2);
        assert_eq!(counts.get(Phase::Build), 1);
        assert_eq!(counts.get(Phase::Planning), 0);
        counts.set(Phase::Design, 5);
        assert_eq!(counts.get(Phase::Design), 5);
        counts.design = Some(1); // below minimum, e.g. a corrupt remote write
        assert_eq!(counts.get(Phase::Design), 2);
        assert_eq!(counts.stored(Phase::Design), Some(1));
    }

    #[test]
    fn template_clone_keeps_structure_not_state() {
        let mut source = Project::new("브랜딩 A", "한빛");
        source.round_counts.set(Phase::Design, 4);
        source.build_phase_hidden = true;
        let id = TaskId::new_static(Phase::Planning, 1);
        source.completed_tasks.insert(id.clone());
        source.deleted_tasks.insert(TaskId::new_static(Phase::Planning, 2));
        source.locked = true;

        let clone = source.clone_as_template("브랜딩 B", "한빛");
        assert_ne!(clone.id, source.id);
        assert_eq!(clone.round_counts.get(Phase::Design), 4);
        assert!(clone.build_phase_hidden);
        assert!(clone.deleted_tasks.contains(&TaskId::new_static(Phase::Planning, 2)));
        assert!(clone.completed_tasks.is_empty());
        assert!(!clone.locked);
    }

    #[test]
    fn project_json_roundtrip() {
        let mut project = Project::new("리뉴얼", "모던하우스");
        project.task_overrides.insert(
            Phase::Design,
            vec![Task::new(
                TaskId::new_adhoc(Phase::Design, 7),
                "로고 리디자인",
                vec![Role::Designer],
            )],
        );
        project
            .links
            .insert(
                TaskId::new_static(Phase::Planning, 1),
                TaskLink { url: "https://example.com".into(), label: "회의록".into() },
            );
        let json = serde_json::to_string(&project).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(back, project);
    }
}
