//! Project snapshot → workbook.

use std::collections::BTreeSet;

use studio_tracker_sdk::{Phase, Project};

use crate::materialize::grouped_rows;
use crate::progress::{compute_progress, Progress};

use super::{format_checklist, format_roles, TaskRow, Workbook, DITTO, DONE_MARK};

/// What the export produced, for the closing toast.
#[derive(Debug, Clone, Default)]
pub struct ExportStats {
    pub rows: usize,
    pub phases: BTreeSet<Phase>,
    pub progress: Progress,
}

/// Walk the phases in fixed order (skipping a hidden build phase) and emit
/// the grouped row sequence per phase. The phase columns are populated only
/// on the first row of each phase; the group column is repeated on every
/// row of its group so re-import has an unambiguous row-to-group mapping.
pub fn export_workbook(project: &Project) -> (Workbook, ExportStats) {
    let progress = compute_progress(project, None);
    let mut info = vec![
        ("프로젝트명".to_string(), project.name.clone()),
        ("클라이언트".to_string(), project.client.clone()),
        (
            "생성일".to_string(),
            project.created_at.format("%Y-%m-%d").to_string(),
        ),
        (
            "최종 수정".to_string(),
            project.last_updated.format("%Y-%m-%d %H:%M").to_string(),
        ),
        ("진행률".to_string(), format!("{}%", progress.percentage())),
    ];
    for phase in [Phase::Design, Phase::Review, Phase::Build] {
        info.push((
            format!("{} 라운드", phase.default_title()),
            project.round_counts.get(phase).to_string(),
        ));
    }
    if let Some(path) = &project.folder_path {
        info.push(("폴더 경로".to_string(), path.clone()));
    }

    let mut tasks = Vec::new();
    let mut phases = BTreeSet::new();
    for phase in Phase::all() {
        if phase == Phase::Build && project.build_phase_hidden {
            continue;
        }
        let mut first = true;
        for row in grouped_rows(project, phase) {
            phases.insert(phase);
            let task = row.task;
            let link = project.links.get(&task.id);
            tasks.push(TaskRow {
                phase: if first {
                    phase.number().to_string()
                } else {
                    DITTO.to_string()
                },
                phase_title: if first {
                    project.phase_title(phase).to_string()
                } else {
                    DITTO.to_string()
                },
                group: row.group_name.unwrap_or_default(),
                title: task.title.clone(),
                description: task.description.clone().unwrap_or_default(),
                roles: format_roles(&task.roles),
                due: task.due.clone().unwrap_or_default(),
                done: if project.completed_tasks.contains(&task.id) {
                    DONE_MARK.to_string()
                } else {
                    String::new()
                },
                link_url: link.map(|l| l.url.clone()).unwrap_or_default(),
                link_label: link.map(|l| l.label.clone()).unwrap_or_default(),
                checklist: format_checklist(&task.checklist),
                client_visible: if project.client_visible.contains(&task.id) {
                    DONE_MARK.to_string()
                } else {
                    String::new()
                },
            });
            first = false;
        }
    }

    let stats = ExportStats {
        rows: tasks.len(),
        phases,
        progress,
    };
    (Workbook { info, tasks }, stats)
}
