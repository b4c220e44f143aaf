//! The two-sheet spreadsheet representation and its cell conventions.
//!
//! Sheet 1 carries project metadata as field/value pairs; sheet 2 is the
//! flat task table. Round-tripping an unmodified export through
//! [`import::apply_workbook`] must reproduce an equivalent materialized
//! state — that compatibility contract is what the cell conventions below
//! pin down.

use serde::{Deserialize, Serialize};

use studio_tracker_sdk::{ChecklistItem, Role};

mod export;
mod import;

pub use export::{export_workbook, ExportStats};
pub use import::{apply_workbook, ImportReport};

/// Column headers of the task sheet, in order.
pub const TASK_SHEET_HEADERS: [&str; 12] = [
    "단계",
    "단계명",
    "그룹",
    "업무",
    "설명",
    "담당",
    "마감일",
    "완료",
    "링크 URL",
    "링크 제목",
    "체크리스트",
    "클라이언트 공개",
];

/// Continuation marker: repeated phase columns, and the legacy "same group
/// as the row above" sugar in the group column.
pub const DITTO: &str = "〃";

/// Truthy cell for the 완료 and 클라이언트 공개 columns.
pub const DONE_MARK: &str = "O";

/// One row of the task sheet. Everything is a string — this mirrors the
/// cells exactly as they appear in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    /// Phase number on the first row of each phase, `〃` after.
    pub phase: String,
    /// Phase display title, same first-row convention.
    pub phase_title: String,
    /// Group name, repeated on every row of the group.
    pub group: String,
    pub title: String,
    pub description: String,
    /// Localized role labels, comma separated.
    pub roles: String,
    pub due: String,
    pub done: String,
    pub link_url: String,
    pub link_label: String,
    pub checklist: String,
    pub client_visible: String,
}

impl TaskRow {
    /// The row's cells in task-sheet column order. This is the grid a
    /// spreadsheet writer lays out under [`TASK_SHEET_HEADERS`].
    pub fn cells(&self) -> [&str; 12] {
        [
            &self.phase,
            &self.phase_title,
            &self.group,
            &self.title,
            &self.description,
            &self.roles,
            &self.due,
            &self.done,
            &self.link_url,
            &self.link_label,
            &self.checklist,
            &self.client_visible,
        ]
    }
}

/// The whole two-sheet file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    /// Sheet 1: metadata field/value pairs.
    pub info: Vec<(String, String)>,
    /// Sheet 2: the task table.
    pub tasks: Vec<TaskRow>,
}

/// `디자이너, PM` style cell from a role list.
pub fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a 담당 cell; unrecognized labels are dropped rather than failing
/// the row.
pub fn parse_roles(cell: &str) -> Vec<Role> {
    let mut roles: Vec<Role> = Vec::new();
    for part in cell.split(',') {
        if let Some(role) = Role::from_label(part) {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
    }
    roles
}

/// One `[x] `/`[ ] `-prefixed line per checklist item.
pub fn format_checklist(items: &[ChecklistItem]) -> String {
    items
        .iter()
        .map(|item| {
            if item.done {
                format!("[x] {}", item.text)
            } else {
                format!("[ ] {}", item.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_checklist(cell: &str) -> Vec<ChecklistItem> {
    cell.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let (done, text) = if let Some(rest) = line.strip_prefix("[x]") {
                (true, rest)
            } else if let Some(rest) = line.strip_prefix("[X]") {
                (true, rest)
            } else if let Some(rest) = line.strip_prefix("[ ]") {
                (false, rest)
            } else {
                (false, line)
            };
            Some(ChecklistItem {
                text: text.trim().to_string(),
                done,
            })
        })
        .collect()
}

/// Truthiness of a flag cell (완료, 클라이언트 공개).
pub fn is_marked(cell: &str) -> bool {
    let cell = cell.trim();
    cell.eq_ignore_ascii_case(DONE_MARK) || cell.eq_ignore_ascii_case("true") || cell == "완료"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_cell_roundtrip() {
        let roles = vec![Role::Designer, Role::Pm];
        let cell = format_roles(&roles);
        assert_eq!(cell, "디자이너, PM");
        assert_eq!(parse_roles(&cell), roles);
    }

    #[test]
    fn roles_cell_drops_unknown_labels() {
        assert_eq!(parse_roles("디자이너, 외부업체"), vec![Role::Designer]);
        assert!(parse_roles("").is_empty());
    }

    #[test]
    fn checklist_cell_roundtrip() {
        let items = vec![
            ChecklistItem { text: "시안 3종".into(), done: true },
            ChecklistItem { text: "폰트 확정".into(), done: false },
        ];
        let cell = format_checklist(&items);
        assert_eq!(cell, "[x] 시안 3종\n[ ] 폰트 확정");
        assert_eq!(parse_checklist(&cell), items);
    }

    #[test]
    fn bare_checklist_lines_default_to_open() {
        assert_eq!(
            parse_checklist("수량 확인"),
            vec![ChecklistItem { text: "수량 확인".into(), done: false }]
        );
    }

    #[test]
    fn row_cells_line_up_with_headers() {
        let row = TaskRow {
            title: "킥오프 미팅".into(),
            done: DONE_MARK.into(),
            ..TaskRow::default()
        };
        let cells = row.cells();
        assert_eq!(cells.len(), TASK_SHEET_HEADERS.len());
        let column = |header| TASK_SHEET_HEADERS.iter().position(|h| *h == header).unwrap();
        assert_eq!(cells[column("업무")], "킥오프 미팅");
        assert_eq!(cells[column("완료")], DONE_MARK);
    }

    #[test]
    fn marked_cells() {
        assert!(is_marked("O"));
        assert!(is_marked("o"));
        assert!(is_marked("완료"));
        assert!(!is_marked(""));
        assert!(!is_marked("X"));
    }
}
