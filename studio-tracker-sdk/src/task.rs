//! Task identity, roles and the task structure.
//!
//! Task IDs carry their origin in their string form (`t3-1`,
//! `t3-round-2-designer`, `custom-3-1719820800000`). They are parsed exactly
//! once, at ingestion, into the closed [`TaskId`] type; everything downstream
//! reads the phase/round/role fields instead of re-parsing strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::phases::Phase;

/// Placeholder date used before a real date is assigned.
pub const DATE_SENTINEL: &str = "000000";

/// Who a task is assigned to. Labels are the client-facing Korean strings
/// used in the spreadsheet's 담당 column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    All,
    Client,
    Pm,
    Designer,
    Manager,
    Developer,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::All => "전체",
            Role::Client => "클라이언트",
            Role::Pm => "PM",
            Role::Designer => "디자이너",
            Role::Manager => "실장",
            Role::Developer => "개발자",
        }
    }

    /// Parse a spreadsheet cell label back into a role. Accepts the Korean
    /// label or the snake_case serialization, case-insensitively.
    pub fn from_label(label: &str) -> Option<Role> {
        let label = label.trim();
        for role in Role::all_roles() {
            if label == role.label() {
                return Some(role);
            }
        }
        match label.to_ascii_lowercase().as_str() {
            "all" => Some(Role::All),
            "client" => Some(Role::Client),
            "pm" => Some(Role::Pm),
            "designer" => Some(Role::Designer),
            "manager" => Some(Role::Manager),
            "developer" => Some(Role::Developer),
            _ => None,
        }
    }

    pub fn all_roles() -> [Role; 6] {
        [
            Role::All,
            Role::Client,
            Role::Pm,
            Role::Designer,
            Role::Manager,
            Role::Developer,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized task id: {0}")]
pub struct IdParseError(pub String);

/// Task identity. `Static` tasks come from the phase template, `Round` tasks
/// are synthesized from a phase's round count, `AdHoc` tasks were added by
/// hand (the stamp is the creation time in epoch milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskId {
    Static { phase: Phase, seq: u32 },
    Round { phase: Phase, round: u32, suffix: String },
    AdHoc { phase: Phase, stamp: i64 },
}

impl TaskId {
    pub fn new_static(phase: Phase, seq: u32) -> TaskId {
        TaskId::Static { phase, seq }
    }

    pub fn new_round(phase: Phase, round: u32, suffix: &str) -> TaskId {
        TaskId::Round {
            phase,
            round,
            suffix: suffix.to_string(),
        }
    }

    pub fn new_adhoc(phase: Phase, stamp: i64) -> TaskId {
        TaskId::AdHoc { phase, stamp }
    }

    pub fn phase(&self) -> Phase {
        match self {
            TaskId::Static { phase, .. }
            | TaskId::Round { phase, .. }
            | TaskId::AdHoc { phase, .. } => *phase,
        }
    }

    /// True for template tasks, which can only ever be suppressed, not
    /// removed from the template itself.
    pub fn is_static(&self) -> bool {
        matches!(self, TaskId::Static { .. })
    }

    pub fn is_round(&self) -> bool {
        matches!(self, TaskId::Round { .. })
    }

    pub fn round(&self) -> Option<u32> {
        match self {
            TaskId::Round { round, .. } => Some(*round),
            _ => None,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Static { phase, seq } => write!(f, "t{}-{}", phase.number(), seq),
            TaskId::Round {
                phase,
                round,
                suffix,
            } => write!(f, "t{}-round-{}-{}", phase.number(), round, suffix),
            TaskId::AdHoc { phase, stamp } => write!(f, "custom-{}-{}", phase.number(), stamp),
        }
    }
}

impl FromStr for TaskId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<TaskId, IdParseError> {
        let err = || IdParseError(s.to_string());

        if let Some(rest) = s.strip_prefix("custom-") {
            let (phase, stamp) = rest.split_once('-').ok_or_else(err)?;
            let phase = phase
                .parse::<u8>()
                .ok()
                .and_then(Phase::from_number)
                .ok_or_else(err)?;
            let stamp = stamp.parse::<i64>().map_err(|_| err())?;
            return Ok(TaskId::AdHoc { phase, stamp });
        }

        let rest = s.strip_prefix('t').ok_or_else(err)?;
        let (phase, tail) = rest.split_once('-').ok_or_else(err)?;
        let phase = phase
            .parse::<u8>()
            .ok()
            .and_then(Phase::from_number)
            .ok_or_else(err)?;

        if let Some(round_tail) = tail.strip_prefix("round-") {
            let (round, suffix) = round_tail.split_once('-').ok_or_else(err)?;
            let round = round.parse::<u32>().map_err(|_| err())?;
            if suffix.is_empty() {
                return Err(err());
            }
            return Ok(TaskId::Round {
                phase,
                round,
                suffix: suffix.to_string(),
            });
        }

        let seq = tail.parse::<u32>().map_err(|_| err())?;
        Ok(TaskId::Static { phase, seq })
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<TaskId, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One item of a task's sub-checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// Optional external reference attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLink {
    pub url: String,
    #[serde(default)]
    pub label: String,
}

/// The atomic unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<ChecklistItem>,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>, roles: Vec<Role>) -> Task {
        Task {
            id,
            title: title.into(),
            roles,
            description: None,
            due: None,
            completed_at: None,
            checklist: Vec::new(),
        }
    }

    /// Whether the task already carries a real completion date, as opposed
    /// to nothing or the placeholder.
    pub fn has_completion_stamp(&self) -> bool {
        match &self.completed_at {
            Some(date) => !date.is_empty() && date != DATE_SENTINEL,
            None => false,
        }
    }
}

/// Normalize a due-date cell: 6-digit `YYMMDD` becomes dashed `YY-MM-DD`,
/// already-dashed values pass through, empty becomes `None`. The sentinel
/// and free-text values are kept verbatim.
pub fn normalize_due(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw == DATE_SENTINEL {
        return Some(DATE_SENTINEL.to_string());
    }
    if raw.len() == 6 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("{}-{}-{}", &raw[0..2], &raw[2..4], &raw[4..6]));
    }
    Some(raw.to_string())
}

/// Today's date in the dashed `YY-MM-DD` form used for completion stamps.
pub fn today_stamp() -> String {
    chrono::Local::now().format("%y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_roundtrip_through_display() {
        let ids = [
            "t1-3",
            "t2-round-1-designer",
            "t3-round-12-pm",
            "custom-4-1719820800000",
        ];
        for raw in ids {
            let parsed: TaskId = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
    }

    #[test]
    fn id_parse_extracts_fields() {
        let id: TaskId = "t3-round-2-designer".parse().unwrap();
        assert_eq!(id.phase(), Phase::Review);
        assert_eq!(id.round(), Some(2));
        assert!(id.is_round());
        assert!(!id.is_static());

        let id: TaskId = "custom-2-42".parse().unwrap();
        assert_eq!(id.phase(), Phase::Design);
        assert_eq!(id, TaskId::new_adhoc(Phase::Design, 42));
    }

    #[test]
    fn id_parse_rejects_garbage() {
        for raw in ["", "x1-1", "t9-1", "t3-round-2", "t3-", "custom-abc-1"] {
            assert!(raw.parse::<TaskId>().is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn id_serializes_as_string() {
        let id = TaskId::new_round(Phase::Design, 1, "client");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"t2-round-1-client\"");
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn due_date_normalization() {
        assert_eq!(normalize_due("250901"), Some("25-09-01".to_string()));
        assert_eq!(normalize_due("25-09-01"), Some("25-09-01".to_string()));
        assert_eq!(normalize_due("000000"), Some("000000".to_string()));
        assert_eq!(normalize_due("  "), None);
        assert_eq!(normalize_due("미정"), Some("미정".to_string()));
    }

    #[test]
    fn role_labels_roundtrip() {
        for role in Role::all_roles() {
            assert_eq!(Role::from_label(role.label()), Some(role));
        }
        assert_eq!(Role::from_label("Designer"), Some(Role::Designer));
        assert_eq!(Role::from_label("담당없음"), None);
    }

    #[test]
    fn completion_stamp_sentinel() {
        let mut task = Task::new(TaskId::new_static(Phase::Planning, 1), "킥오프 미팅", vec![Role::Pm]);
        assert!(!task.has_completion_stamp());
        task.completed_at = Some(DATE_SENTINEL.to_string());
        assert!(!task.has_completion_stamp());
        task.completed_at = Some("25-08-27".to_string());
        assert!(task.has_completion_stamp());
    }
}
