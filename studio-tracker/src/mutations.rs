//! The mutation catalogue: every state transition a project snapshot can
//! undergo.
//!
//! All operations follow the same shape: refuse if the project is locked,
//! clone the snapshot, apply the change, stamp `last_updated`, return the
//! new snapshot for the caller to persist. Nothing here mutates in place.

use chrono::Local;
use thiserror::Error;

use studio_tracker_sdk::{
    today_stamp, ChecklistItem, Phase, Project, ProjectStatus, Role, Task, TaskGroup, TaskId,
    TaskLink,
};

use crate::materialize::{logical_blocks, materialize, LogicalBlock};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("잠긴 프로젝트는 수정할 수 없습니다")]
    Locked,
    #[error("그룹은 2개 이상의 업무를 선택해야 합니다")]
    GroupTooSmall,
    #[error("다른 단계의 업무는 한 그룹으로 묶을 수 없습니다")]
    GroupSpansPhases,
    #[error("'{0}' 업무는 이미 다른 그룹에 속해 있습니다")]
    AlreadyGrouped(String),
    #[error("{phase}단계 라운드는 최소 {min}회입니다")]
    RoundBelowMinimum { phase: u8, min: u32 },
    #[error("라운드가 없는 단계입니다")]
    RoundsUnsupported,
    #[error("업무를 찾을 수 없습니다: {0}")]
    UnknownTask(String),
    #[error("잘못된 행 위치입니다")]
    RowOutOfRange,
}

pub type MutationResult = Result<Project, MutationError>;

fn ensure_unlocked(project: &Project) -> Result<(), MutationError> {
    if project.locked {
        Err(MutationError::Locked)
    } else {
        Ok(())
    }
}

fn committed(mut next: Project) -> Project {
    next.touch();
    next
}

/// Insert or replace the override entry for `task` in its phase's list.
fn upsert_override(project: &mut Project, task: Task) {
    let list = project.task_overrides.entry(task.id.phase()).or_default();
    match list.iter_mut().find(|t| t.id == task.id) {
        Some(slot) => *slot = task,
        None => list.push(task),
    }
}

/// The task as currently materialized, looked up by ID in its own phase.
fn resolve_task(project: &Project, id: &TaskId) -> Option<Task> {
    materialize(project, id.phase())
        .into_iter()
        .find(|t| &t.id == id)
}

/// Toggle a task's membership in the completion set.
///
/// Completing a task that has no real completion date yet also stamps
/// today's date into its override entry, before progress is recomputed.
/// Un-completing never clears the date.
pub fn toggle_task(project: &Project, id: &TaskId) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    if next.completed_tasks.contains(id) {
        next.completed_tasks.remove(id);
        return Ok(committed(next));
    }

    let mut task = resolve_task(project, id)
        .ok_or_else(|| MutationError::UnknownTask(id.to_string()))?;
    next.completed_tasks.insert(id.clone());
    if !task.has_completion_stamp() {
        task.completed_at = Some(today_stamp());
        upsert_override(&mut next, task);
    }
    Ok(committed(next))
}

/// Add an ad-hoc task to a phase. Returns the new snapshot and the ID that
/// was minted for the task.
pub fn add_task(
    project: &Project,
    phase: Phase,
    title: impl Into<String>,
    roles: Vec<Role>,
) -> Result<(Project, TaskId), MutationError> {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    let mut stamp = Local::now().timestamp_millis();
    // ids must stay unique even when tasks are added within one millisecond
    while next.find_override(&TaskId::new_adhoc(phase, stamp)).is_some() {
        stamp += 1;
    }
    let id = TaskId::new_adhoc(phase, stamp);
    next.task_overrides
        .entry(phase)
        .or_default()
        .push(Task::new(id.clone(), title, roles));
    if let Some(order) = next.task_order.get_mut(&phase) {
        order.push(id.clone());
    }
    Ok((committed(next), id))
}

/// Replace a task's definition (title, roles, description, due date,
/// checklist) with an edited copy.
pub fn update_task(project: &Project, mut task: Task) -> MutationResult {
    ensure_unlocked(project)?;
    resolve_task(project, &task.id)
        .ok_or_else(|| MutationError::UnknownTask(task.id.to_string()))?;
    if let Some(due) = task.due.take() {
        task.due = studio_tracker_sdk::normalize_due(&due);
    }
    let mut next = project.clone();
    upsert_override(&mut next, task);
    Ok(committed(next))
}

/// Remove a task. Template-generated IDs (static or round) can only be
/// suppressed via the deletion set — the template keeps generating them —
/// while ad-hoc IDs are removed outright.
pub fn delete_task(project: &Project, id: &TaskId) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    for list in next.task_overrides.values_mut() {
        list.retain(|t| &t.id != id);
    }
    for order in next.task_order.values_mut() {
        order.retain(|entry| entry != id);
    }
    if id.is_static() || id.is_round() {
        next.deleted_tasks.insert(id.clone());
    }
    Ok(committed(next))
}

/// Move one logical item (task, group block, or round pair) within a phase.
///
/// `from_row` and `to_row` are raw row indices into the grouped view; the
/// move relocates the whole block each of them falls inside, so a group or
/// round pair is never split.
pub fn reorder_tasks(
    project: &Project,
    phase: Phase,
    from_row: usize,
    to_row: usize,
) -> MutationResult {
    ensure_unlocked(project)?;
    let mut blocks = logical_blocks(project, phase);
    let source = block_at_row(&blocks, from_row).ok_or(MutationError::RowOutOfRange)?;
    let target = block_at_row(&blocks, to_row).ok_or(MutationError::RowOutOfRange)?;
    if source == target {
        return Ok(project.clone());
    }

    let moved = blocks.remove(source);
    blocks.insert(target.min(blocks.len()), moved);

    let order: Vec<TaskId> = blocks.iter().flat_map(|b| b.task_ids()).collect();
    let mut next = project.clone();
    next.task_order.insert(phase, order);
    Ok(committed(next))
}

fn block_at_row(blocks: &[LogicalBlock], row: usize) -> Option<usize> {
    let mut offset = 0;
    for (index, block) in blocks.iter().enumerate() {
        offset += block.len();
        if row < offset {
            return Some(index);
        }
    }
    None
}

/// Change a round-bearing phase's round count.
///
/// Lowering the count stops generating rounds above it; overrides and
/// completions for now-out-of-range rounds are retained untouched, inert
/// until the count is raised again.
pub fn set_round_count(project: &Project, phase: Phase, count: u32) -> MutationResult {
    ensure_unlocked(project)?;
    let min = phase.min_rounds().ok_or(MutationError::RoundsUnsupported)?;
    if count < min {
        return Err(MutationError::RoundBelowMinimum {
            phase: phase.number(),
            min,
        });
    }
    let mut next = project.clone();
    next.round_counts.set(phase, count);
    Ok(committed(next))
}

/// Create a named group from the selected tasks.
///
/// All tasks must resolve to the same phase under materialization, at least
/// two must be selected, and none may already belong to another group in
/// that phase. Each violation gets its own rejection.
pub fn group_tasks(project: &Project, name: impl Into<String>, ids: &[TaskId]) -> MutationResult {
    ensure_unlocked(project)?;
    if ids.len() < 2 {
        return Err(MutationError::GroupTooSmall);
    }

    let mut selected_phase: Option<Phase> = None;
    for id in ids {
        let task = resolve_task(project, id)
            .ok_or_else(|| MutationError::UnknownTask(id.to_string()))?;
        let task_phase = id.phase();
        match selected_phase {
            None => selected_phase = Some(task_phase),
            Some(p) if p != task_phase => return Err(MutationError::GroupSpansPhases),
            Some(_) => {}
        }
        if project.group_of(task_phase, id).is_some() {
            return Err(MutationError::AlreadyGrouped(task.title));
        }
    }
    let Some(phase) = selected_phase else {
        return Err(MutationError::GroupTooSmall);
    };

    // member order follows the materialized order, not selection order
    let members: Vec<TaskId> = materialize(project, phase)
        .into_iter()
        .map(|t| t.id)
        .filter(|id| ids.contains(id))
        .collect();

    let mut next = project.clone();
    next.groups.entry(phase).or_default().push(TaskGroup {
        name: name.into(),
        members,
    });
    Ok(committed(next))
}

/// Dissolve every group that contains at least one of the selected tasks.
pub fn ungroup_tasks(project: &Project, ids: &[TaskId]) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    for groups in next.groups.values_mut() {
        groups.retain(|g| !g.members.iter().any(|m| ids.contains(m)));
    }
    Ok(committed(next))
}

/// Hide or restore the build phase.
pub fn set_build_phase_hidden(project: &Project, hidden: bool) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    next.build_phase_hidden = hidden;
    Ok(committed(next))
}

/// Whether the phase preceding `phase` is fully complete. With the build
/// phase hidden, the delivery phase's check is redirected to the review
/// phase instead.
pub fn previous_phase_complete(project: &Project, phase: Phase) -> bool {
    let mut previous = phase.number() - 1;
    if previous == Phase::Build.number() && project.build_phase_hidden {
        previous -= 1;
    }
    let Some(previous) = Phase::from_number(previous) else {
        return true;
    };
    materialize(project, previous)
        .iter()
        .all(|t| project.completed_tasks.contains(&t.id))
}

/// Attach, replace or clear a task's external link.
pub fn set_link(project: &Project, id: &TaskId, link: Option<TaskLink>) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    match link {
        Some(link) => {
            next.links.insert(id.clone(), link);
        }
        None => {
            next.links.remove(id);
        }
    }
    Ok(committed(next))
}

/// Replace a task's sub-checklist.
pub fn set_checklist(project: &Project, id: &TaskId, items: Vec<ChecklistItem>) -> MutationResult {
    ensure_unlocked(project)?;
    let mut task = resolve_task(project, id)
        .ok_or_else(|| MutationError::UnknownTask(id.to_string()))?;
    task.checklist = items;
    let mut next = project.clone();
    upsert_override(&mut next, task);
    Ok(committed(next))
}

/// Toggle a task's exposure to the read-only client audience.
pub fn toggle_client_visible(project: &Project, id: &TaskId) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    if !next.client_visible.remove(id) {
        next.client_visible.insert(id.clone());
    }
    Ok(committed(next))
}

/// Override or reset a phase's display title.
pub fn set_phase_title(project: &Project, phase: Phase, title: Option<String>) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    match title {
        Some(title) if !title.trim().is_empty() && title != phase.default_title() => {
            next.phase_titles.insert(phase, title);
        }
        _ => {
            next.phase_titles.remove(&phase);
        }
    }
    Ok(committed(next))
}

/// Rename the project. Identity-affecting: the caller should follow up with
/// a folder sync through the folder collaborator.
pub fn rename_project(
    project: &Project,
    name: impl Into<String>,
    client: impl Into<String>,
) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    next.name = name.into();
    next.client = client.into();
    Ok(committed(next))
}

pub fn lock_project(project: &Project) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    next.locked = true;
    Ok(committed(next))
}

/// Unlock bypasses the lock, as does [`restore_project`]; everything else
/// is refused while locked.
pub fn unlock_project(project: &Project) -> Project {
    let mut next = project.clone();
    next.locked = false;
    committed(next)
}

/// Soft-delete: status sentinel plus timestamp, reversible via
/// [`restore_project`]. Task state is left untouched so restore brings the
/// project back exactly as it was.
pub fn soft_delete_project(project: &Project) -> MutationResult {
    ensure_unlocked(project)?;
    let mut next = project.clone();
    next.status = ProjectStatus::Deleted {
        deleted_at: Local::now(),
    };
    Ok(committed(next))
}

/// Restore bypasses the lock, like [`unlock_project`]: a snapshot that was
/// locked and then soft-deleted (locally or by a fetched remote copy) must
/// not be stuck in the trash.
pub fn restore_project(project: &Project) -> Project {
    let mut next = project.clone();
    next.status = ProjectStatus::Active;
    committed(next)
}
