//! Workbook → project snapshot reconciliation.
//!
//! The sheet is the source of truth for every phase it touches: the first
//! row claiming a phase wipes that phase's override, order and group lists
//! before any row is applied, which is what prevents duplication when a
//! phase is only partially represented. Rows are matched to existing tasks
//! through a priority chain (edited-title override, round-title pattern,
//! static template title, else a fresh ad-hoc task) and each row is
//! consumed at most once so duplicate titles never collide onto one task.
//! Malformed rows are logged and skipped; the import is best-effort per row.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{anyhow, bail, Result};
use chrono::Local;

use studio_tracker_sdk::{
    normalize_due, parse_round_title, static_tasks, Phase, Project, Task, TaskGroup, TaskId,
    TaskLink,
};

use crate::mutations::MutationError;
use crate::progress::{compute_progress, Progress};

use super::{is_marked, parse_checklist, parse_roles, TaskRow, Workbook, DITTO};

/// What happened during one import, for the closing toast.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub applied: usize,
    pub skipped: usize,
    /// Rows that matched nothing and minted a new ad-hoc task.
    pub created: usize,
    pub phases: BTreeSet<Phase>,
    pub progress: Progress,
}

/// Apply a workbook to a snapshot. Only the lock check is fatal; row-level
/// failures are logged, counted and skipped.
pub fn apply_workbook(
    project: &Project,
    workbook: &Workbook,
) -> Result<(Project, ImportReport), MutationError> {
    if project.locked {
        return Err(MutationError::Locked);
    }

    let mut importer = Importer::new(project);
    let mut report = ImportReport::default();
    for (index, row) in workbook.tasks.iter().enumerate() {
        match importer.apply_row(row) {
            Ok(()) => report.applied += 1,
            Err(error) => {
                // +2: header row plus 1-based sheet numbering
                tracing::warn!(row = index + 2, %error, "행 가져오기 실패, 건너뜀");
                report.skipped += 1;
            }
        }
    }

    let (mut next, phases, created) = importer.finish();
    report.phases = phases;
    report.created = created;
    report.progress = compute_progress(&next, None);
    next.touch();
    Ok((next, report))
}

#[derive(Default)]
struct PhaseState {
    order: Vec<TaskId>,
    matched_static: BTreeSet<TaskId>,
    groups: Vec<TaskGroup>,
    /// Resolved group name of the previous row; contiguity is the only
    /// merge signal.
    prev_group: Option<String>,
}

struct Importer {
    next: Project,
    /// Overrides as they were before any wipe, for title matching and for
    /// carrying completion stamps across the round trip.
    prior_overrides: BTreeMap<Phase, Vec<Task>>,
    consumed: HashSet<TaskId>,
    current_phase: Option<Phase>,
    /// Phase of the last successfully applied row. Group contiguity is a
    /// property of adjacent sheet rows, so a run interrupted by rows of
    /// another phase does not continue.
    prev_row_phase: Option<Phase>,
    wiped: HashSet<Phase>,
    phases: BTreeMap<Phase, PhaseState>,
    adhoc_stamp: i64,
    created: usize,
}

impl Importer {
    fn new(project: &Project) -> Importer {
        Importer {
            next: project.clone(),
            prior_overrides: project.task_overrides.clone(),
            consumed: HashSet::new(),
            current_phase: None,
            prev_row_phase: None,
            wiped: HashSet::new(),
            phases: BTreeMap::new(),
            adhoc_stamp: Local::now().timestamp_millis(),
            created: 0,
        }
    }

    fn apply_row(&mut self, row: &TaskRow) -> Result<()> {
        let phase_cell = row.phase.trim();
        let explicit_phase = if !phase_cell.is_empty() && phase_cell != DITTO {
            let number: u8 = phase_cell
                .parse()
                .map_err(|_| anyhow!("알 수 없는 단계: {phase_cell}"))?;
            let phase =
                Phase::from_number(number).ok_or_else(|| anyhow!("알 수 없는 단계: {number}"))?;
            self.current_phase = Some(phase);
            true
        } else {
            false
        };
        let phase = self
            .current_phase
            .ok_or_else(|| anyhow!("단계가 지정되지 않은 행"))?;

        let title = row.title.trim();
        if title.is_empty() {
            bail!("업무명이 비어 있습니다");
        }

        if explicit_phase {
            let phase_title = row.phase_title.trim();
            if !phase_title.is_empty() && phase_title != DITTO {
                if phase_title == phase.default_title() {
                    self.next.phase_titles.remove(&phase);
                } else {
                    self.next.phase_titles.insert(phase, phase_title.to_string());
                }
            }
        }

        // the sheet owns this phase from here on
        if self.wiped.insert(phase) {
            self.next.task_overrides.remove(&phase);
            self.next.task_order.remove(&phase);
            self.next.groups.remove(&phase);
        }

        let id = self.match_task(phase, title);
        self.consumed.insert(id.clone());

        let mut task = Task::new(id.clone(), title, parse_roles(&row.roles));
        task.description = non_empty(&row.description);
        task.due = normalize_due(&row.due);
        task.checklist = parse_checklist(&row.checklist);
        task.completed_at = self
            .prior_overrides
            .get(&phase)
            .and_then(|list| list.iter().find(|t| t.id == id))
            .and_then(|t| t.completed_at.clone());
        self.next
            .task_overrides
            .entry(phase)
            .or_default()
            .push(task);

        if is_marked(&row.done) {
            self.next.completed_tasks.insert(id.clone());
        } else {
            self.next.completed_tasks.remove(&id);
        }

        let url = row.link_url.trim();
        if url.is_empty() {
            self.next.links.remove(&id);
        } else {
            self.next.links.insert(
                id.clone(),
                TaskLink {
                    url: url.to_string(),
                    label: row.link_label.trim().to_string(),
                },
            );
        }

        if is_marked(&row.client_visible) {
            self.next.client_visible.insert(id.clone());
        } else {
            self.next.client_visible.remove(&id);
        }

        let state = self.phases.entry(phase).or_default();
        if self.prev_row_phase != Some(phase) {
            state.prev_group = None;
        }
        self.prev_row_phase = Some(phase);
        if id.is_static() {
            state.matched_static.insert(id.clone());
        }

        let raw_group = row.group.trim();
        let group = if raw_group == DITTO {
            state.prev_group.clone()
        } else {
            non_empty(raw_group)
        };
        if let Some(name) = &group {
            if state.prev_group.as_deref() == Some(name.as_str()) {
                if let Some(last) = state.groups.last_mut() {
                    last.members.push(id.clone());
                }
            } else {
                // a new name always starts a new group, even one textually
                // equal to an earlier group in the same phase
                state.groups.push(TaskGroup {
                    name: name.clone(),
                    members: vec![id.clone()],
                });
            }
        }
        state.prev_group = group;

        state.order.push(id);
        Ok(())
    }

    /// Priority chain: edited-title override, round-pattern ID, static
    /// template title, fresh ad-hoc. Consumed IDs are never reused, so
    /// duplicate titles fall through to the next step.
    fn match_task(&mut self, phase: Phase, title: &str) -> TaskId {
        if let Some(task) = self
            .prior_overrides
            .get(&phase)
            .into_iter()
            .flatten()
            .find(|t| t.title == title && !self.consumed.contains(&t.id))
        {
            return task.id.clone();
        }

        if let Some((round, suffix)) = parse_round_title(phase, title) {
            let id = TaskId::new_round(phase, round, suffix);
            if !self.consumed.contains(&id) {
                // a row naming a round beyond the current count raises the
                // count; otherwise the row would vanish from the
                // materialized list
                if round > self.next.round_counts.get(phase) {
                    self.next.round_counts.set(phase, round);
                }
                return id;
            }
        }

        if let Some(task) = static_tasks(phase)
            .into_iter()
            .find(|t| t.title == title && !self.consumed.contains(&t.id))
        {
            return task.id;
        }

        // favor over-creation over silent data loss
        self.created += 1;
        self.adhoc_stamp += 1;
        TaskId::new_adhoc(phase, self.adhoc_stamp)
    }

    fn finish(mut self) -> (Project, BTreeSet<Phase>, usize) {
        let mut touched = BTreeSet::new();
        for (phase, state) in self.phases {
            touched.insert(phase);
            // spreadsheet omission of a static task means deletion; a
            // matched static is explicitly undeleted
            for stub in static_tasks(phase) {
                if state.matched_static.contains(&stub.id) {
                    self.next.deleted_tasks.remove(&stub.id);
                } else {
                    self.next.deleted_tasks.insert(stub.id);
                }
            }
            self.next.task_order.insert(phase, state.order);
            self.next.groups.insert(phase, state.groups);
        }
        (self.next, touched, self.created)
    }
}

fn non_empty(cell: &str) -> Option<String> {
    let cell = cell.trim();
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}
