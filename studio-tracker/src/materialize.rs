//! Task materialization: turning a project snapshot into the visible,
//! ordered task list for a phase.
//!
//! This is the central query everything else builds on. The contract:
//!
//! 1. Start from the phase's generated set (templates plus expanded rounds).
//! 2. Substitute overrides by ID.
//! 3. Drop anything in the deletion set.
//! 4. Append non-deleted, purely ad-hoc overrides; overrides for rounds
//!    beyond the current count are retained but stay invisible.
//! 5. If an explicit order list exists, stable-sort by its indices; unknown
//!    IDs keep their relative position after the listed ones.
//!
//! Stale order entries (deleted or no-longer-generated IDs) are tolerated —
//! they simply match nothing.

use std::collections::{HashMap, HashSet};

use studio_tracker_sdk::{generated_tasks, Phase, Project, Task, TaskId};

/// Compute the final ordered, deduplicated task list for one phase.
pub fn materialize(project: &Project, phase: Phase) -> Vec<Task> {
    let generated = generated_tasks(phase, project.round_counts.get(phase));
    let generated_ids: HashSet<TaskId> = generated.iter().map(|t| t.id.clone()).collect();

    let mut tasks: Vec<Task> = Vec::with_capacity(generated.len());
    for task in generated {
        if project.deleted_tasks.contains(&task.id) {
            continue;
        }
        match project.find_override(&task.id) {
            Some(overridden) => tasks.push(overridden.clone()),
            None => tasks.push(task),
        }
    }

    // only purely ad-hoc overrides are appended; an override for a round
    // beyond the current count stays dormant until the count rises again
    for task in project.overrides(phase) {
        if !matches!(task.id, TaskId::AdHoc { .. })
            || generated_ids.contains(&task.id)
            || project.deleted_tasks.contains(&task.id)
        {
            continue;
        }
        tasks.push(task.clone());
    }

    if let Some(order) = project.task_order.get(&phase) {
        let index: HashMap<TaskId, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        tasks.sort_by_key(|t| index.get(&t.id).copied().unwrap_or(usize::MAX));
    }

    tasks
}

/// One row of the grouped view: the materialized task plus the group it
/// renders under, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRow {
    pub group_index: Option<usize>,
    pub group_name: Option<String>,
    pub task: Task,
}

/// The materialized list with group members pulled together: all members of
/// a group are emitted contiguously at the position of the group's first
/// member, preserving their materialized relative order. This is the row
/// sequence the spreadsheet export and the reorder logic both walk.
pub fn grouped_rows(project: &Project, phase: Phase) -> Vec<GroupedRow> {
    let tasks = materialize(project, phase);
    let groups = project.groups.get(&phase).map_or(&[][..], Vec::as_slice);

    let mut membership: HashMap<TaskId, usize> = HashMap::new();
    for (index, group) in groups.iter().enumerate() {
        for id in &group.members {
            // first group wins if data ever disagrees
            membership.entry(id.clone()).or_insert(index);
        }
    }

    let mut rows = Vec::with_capacity(tasks.len());
    let mut emitted: HashSet<usize> = HashSet::new();
    for task in &tasks {
        match membership.get(&task.id) {
            Some(&index) => {
                if emitted.insert(index) {
                    for member in &tasks {
                        if membership.get(&member.id) == Some(&index) {
                            rows.push(GroupedRow {
                                group_index: Some(index),
                                group_name: Some(groups[index].name.clone()),
                                task: member.clone(),
                            });
                        }
                    }
                }
            }
            None => rows.push(GroupedRow {
                group_index: None,
                group_name: None,
                task: task.clone(),
            }),
        }
    }
    rows
}

/// The unit the reorder operation moves: a single task, a grouped block, or
/// a contiguous round pair. Moving a block never splits it.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalBlock {
    Single(Task),
    Group { name: String, tasks: Vec<Task> },
    RoundPair { round: u32, tasks: Vec<Task> },
}

impl LogicalBlock {
    pub fn len(&self) -> usize {
        match self {
            LogicalBlock::Single(_) => 1,
            LogicalBlock::Group { tasks, .. } | LogicalBlock::RoundPair { tasks, .. } => {
                tasks.len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        match self {
            LogicalBlock::Single(task) => vec![task.id.clone()],
            LogicalBlock::Group { tasks, .. } | LogicalBlock::RoundPair { tasks, .. } => {
                tasks.iter().map(|t| t.id.clone()).collect()
            }
        }
    }
}

/// Partition the grouped row sequence into logical blocks.
pub fn logical_blocks(project: &Project, phase: Phase) -> Vec<LogicalBlock> {
    let rows = grouped_rows(project, phase);
    let mut blocks: Vec<LogicalBlock> = Vec::new();
    let mut i = 0;
    while i < rows.len() {
        let row = &rows[i];
        if let Some(index) = row.group_index {
            let name = row.group_name.clone().unwrap_or_default();
            let mut tasks = Vec::new();
            while i < rows.len() && rows[i].group_index == Some(index) {
                tasks.push(rows[i].task.clone());
                i += 1;
            }
            blocks.push(LogicalBlock::Group { name, tasks });
            continue;
        }
        // ungrouped: pair up adjacent halves of the same round
        if let Some(round) = row.task.id.round() {
            let mut tasks = vec![row.task.clone()];
            let mut j = i + 1;
            while j < rows.len()
                && rows[j].group_index.is_none()
                && rows[j].task.id.round() == Some(round)
            {
                tasks.push(rows[j].task.clone());
                j += 1;
            }
            if tasks.len() > 1 {
                blocks.push(LogicalBlock::RoundPair { round, tasks });
                i = j;
                continue;
            }
        }
        blocks.push(LogicalBlock::Single(row.task.clone()));
        i += 1;
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_tracker_sdk::{Role, Task, TaskGroup, TaskId};

    fn project() -> Project {
        Project::new("테스트", "스튜디오")
    }

    #[test]
    fn materialization_is_deterministic() {
        let mut p = project();
        p.round_counts.set(Phase::Design, 3);
        p.task_overrides.insert(
            Phase::Design,
            vec![Task::new(TaskId::new_adhoc(Phase::Design, 9), "추가 업무", vec![Role::Pm])],
        );
        assert_eq!(materialize(&p, Phase::Design), materialize(&p, Phase::Design));
    }

    #[test]
    fn review_phase_with_three_rounds_has_eight_tasks() {
        let mut p = project();
        p.round_counts.set(Phase::Review, 3);
        assert_eq!(materialize(&p, Phase::Review).len(), 8);
    }

    #[test]
    fn overrides_substitute_by_id() {
        let mut p = project();
        let id = TaskId::new_static(Phase::Planning, 2);
        let mut edited = Task::new(id.clone(), "요구사항 상세 정리", vec![Role::Pm, Role::Client]);
        edited.due = Some("25-09-15".into());
        p.task_overrides.insert(Phase::Planning, vec![edited.clone()]);

        let tasks = materialize(&p, Phase::Planning);
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[1], edited);
    }

    #[test]
    fn deletion_suppresses_every_origin() {
        let mut p = project();
        let round_id = TaskId::new_round(Phase::Design, 1, "client");
        let adhoc_id = TaskId::new_adhoc(Phase::Design, 3);
        p.task_overrides.insert(
            Phase::Design,
            vec![Task::new(adhoc_id.clone(), "임시 업무", vec![Role::Pm])],
        );
        p.deleted_tasks.insert(round_id.clone());
        p.deleted_tasks.insert(adhoc_id.clone());
        // deleted id present in the override map must still be suppressed
        p.task_overrides
            .get_mut(&Phase::Design)
            .unwrap()
            .push(Task::new(round_id.clone(), "수정된 라운드", vec![Role::Client]));

        let tasks = materialize(&p, Phase::Design);
        assert!(tasks.iter().all(|t| t.id != round_id && t.id != adhoc_id));
    }

    #[test]
    fn order_list_is_authoritative() {
        let mut p = project();
        let a = TaskId::new_static(Phase::Planning, 3);
        let b = TaskId::new_static(Phase::Planning, 1);
        let c = TaskId::new_static(Phase::Planning, 4);
        p.task_order
            .insert(Phase::Planning, vec![a.clone(), b.clone(), c.clone()]);

        let ids: Vec<TaskId> = materialize(&p, Phase::Planning)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids[0], a);
        assert_eq!(ids[1], b);
        assert_eq!(ids[2], c);
        // the unlisted t1-2 sorts after, keeping assembly order
        assert_eq!(ids[3], TaskId::new_static(Phase::Planning, 2));
    }

    #[test]
    fn stale_order_entries_are_tolerated() {
        let mut p = project();
        p.task_order.insert(
            Phase::Planning,
            vec![
                TaskId::new_round(Phase::Planning, 9, "ghost"),
                TaskId::new_static(Phase::Planning, 2),
            ],
        );
        let tasks = materialize(&p, Phase::Planning);
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].id, TaskId::new_static(Phase::Planning, 2));
    }

    #[test]
    fn grouped_rows_pull_members_together() {
        let mut p = project();
        let first = TaskId::new_static(Phase::Planning, 1);
        let last = TaskId::new_static(Phase::Planning, 4);
        p.groups.insert(
            Phase::Planning,
            vec![TaskGroup { name: "계약 준비".into(), members: vec![first.clone(), last.clone()] }],
        );

        let rows = grouped_rows(&p, Phase::Planning);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].task.id, first);
        assert_eq!(rows[1].task.id, last);
        assert_eq!(rows[0].group_name.as_deref(), Some("계약 준비"));
        assert_eq!(rows[1].group_name.as_deref(), Some("계약 준비"));
        assert!(rows[2].group_name.is_none());
    }

    #[test]
    fn blocks_pair_rounds_and_keep_groups_whole() {
        let mut p = project();
        p.round_counts.set(Phase::Review, 2);
        let blocks = logical_blocks(&p, Phase::Review);
        // base, round 1 pair, round 2 pair, final
        assert_eq!(blocks.len(), 4);
        assert!(matches!(blocks[0], LogicalBlock::Single(_)));
        assert!(matches!(blocks[1], LogicalBlock::RoundPair { round: 1, .. }));
        assert!(matches!(blocks[2], LogicalBlock::RoundPair { round: 2, .. }));
        assert_eq!(blocks[1].len(), 2);

        // grouping one half of a round pulls it out of the pair
        p.groups.insert(
            Phase::Review,
            vec![TaskGroup {
                name: "검수 묶음".into(),
                members: vec![
                    TaskId::new_round(Phase::Review, 1, "pm"),
                    TaskId::new_round(Phase::Review, 2, "pm"),
                ],
            }],
        );
        let blocks = logical_blocks(&p, Phase::Review);
        assert!(blocks
            .iter()
            .any(|b| matches!(b, LogicalBlock::Group { name, .. } if name == "검수 묶음")));
    }
}
