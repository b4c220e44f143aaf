//! The static phase template registry and round expansion.
//!
//! Five fixed phases. Three of them (시안, 상세 디자인, 개발) carry a
//! variable number of repeated round pairs; the pairing scheme differs per
//! phase and is defined here, in one place, as reference data.

use serde::{Deserialize, Serialize};

use crate::task::{Role, Task, TaskId};

/// One of the five fixed pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Design,
    Review,
    Build,
    Delivery,
}

impl Phase {
    pub fn all() -> [Phase; 5] {
        [
            Phase::Planning,
            Phase::Design,
            Phase::Review,
            Phase::Build,
            Phase::Delivery,
        ]
    }

    pub fn number(self) -> u8 {
        match self {
            Phase::Planning => 1,
            Phase::Design => 2,
            Phase::Review => 3,
            Phase::Build => 4,
            Phase::Delivery => 5,
        }
    }

    pub fn from_number(n: u8) -> Option<Phase> {
        match n {
            1 => Some(Phase::Planning),
            2 => Some(Phase::Design),
            3 => Some(Phase::Review),
            4 => Some(Phase::Build),
            5 => Some(Phase::Delivery),
            _ => None,
        }
    }

    pub fn default_title(self) -> &'static str {
        match self {
            Phase::Planning => "기획",
            Phase::Design => "시안",
            Phase::Review => "상세 디자인",
            Phase::Build => "개발",
            Phase::Delivery => "마감",
        }
    }

    /// Minimum round count for round-bearing phases, `None` for fixed ones.
    pub fn min_rounds(self) -> Option<u32> {
        match self {
            Phase::Design | Phase::Review => Some(2),
            Phase::Build => Some(1),
            Phase::Planning | Phase::Delivery => None,
        }
    }

    pub fn is_round_bearing(self) -> bool {
        self.min_rounds().is_some()
    }
}

struct StaticDef {
    seq: u32,
    title: &'static str,
    roles: &'static [Role],
}

/// One half of a round pair. `keyword` is what the spreadsheet importer
/// looks for in a `<n>차 …` row title to map it back onto this slot.
struct RoundSlot {
    suffix: &'static str,
    title: &'static str,
    keyword: &'static str,
    roles: &'static [Role],
}

struct PhaseTemplate {
    pre: &'static [StaticDef],
    rounds: &'static [RoundSlot],
    post: &'static [StaticDef],
}

static PLANNING: PhaseTemplate = PhaseTemplate {
    pre: &[
        StaticDef { seq: 1, title: "킥오프 미팅", roles: &[Role::Pm] },
        StaticDef { seq: 2, title: "요구사항 정리", roles: &[Role::Pm] },
        StaticDef { seq: 3, title: "견적·계약", roles: &[Role::Manager] },
        StaticDef { seq: 4, title: "일정 수립", roles: &[Role::Pm] },
    ],
    rounds: &[],
    post: &[],
};

static DESIGN: PhaseTemplate = PhaseTemplate {
    pre: &[StaticDef { seq: 1, title: "무드보드 조사", roles: &[Role::Designer] }],
    rounds: &[
        RoundSlot { suffix: "designer", title: "시안 제출", keyword: "시안", roles: &[Role::Designer] },
        RoundSlot { suffix: "client", title: "피드백 정리", keyword: "피드백", roles: &[Role::Client, Role::Pm] },
    ],
    post: &[StaticDef { seq: 2, title: "시안 확정", roles: &[Role::All] }],
};

static REVIEW: PhaseTemplate = PhaseTemplate {
    pre: &[StaticDef { seq: 1, title: "상세 페이지 구성", roles: &[Role::Designer] }],
    rounds: &[
        RoundSlot { suffix: "pm", title: "PM 검수", keyword: "검수", roles: &[Role::Pm] },
        RoundSlot { suffix: "designer", title: "수정 반영", keyword: "수정", roles: &[Role::Designer] },
    ],
    post: &[StaticDef { seq: 2, title: "최종 시안 승인", roles: &[Role::Client] }],
};

static BUILD: PhaseTemplate = PhaseTemplate {
    pre: &[
        StaticDef { seq: 1, title: "개발 환경 셋업", roles: &[Role::Developer] },
        StaticDef { seq: 2, title: "퍼블리싱", roles: &[Role::Developer] },
    ],
    rounds: &[
        RoundSlot { suffix: "pm", title: "QA 리포트", keyword: "QA", roles: &[Role::Pm] },
        RoundSlot { suffix: "developer", title: "버그 수정", keyword: "버그", roles: &[Role::Developer] },
    ],
    post: &[],
};

static DELIVERY: PhaseTemplate = PhaseTemplate {
    pre: &[
        StaticDef { seq: 1, title: "최종 산출물 정리", roles: &[Role::Designer] },
        StaticDef { seq: 2, title: "파일 납품", roles: &[Role::Pm] },
        StaticDef { seq: 3, title: "검수 완료 확인", roles: &[Role::Client] },
        StaticDef { seq: 4, title: "프로젝트 회고", roles: &[Role::All] },
    ],
    rounds: &[],
    post: &[],
};

fn template(phase: Phase) -> &'static PhaseTemplate {
    match phase {
        Phase::Planning => &PLANNING,
        Phase::Design => &DESIGN,
        Phase::Review => &REVIEW,
        Phase::Build => &BUILD,
        Phase::Delivery => &DELIVERY,
    }
}

fn static_task(phase: Phase, def: &StaticDef) -> Task {
    Task::new(
        TaskId::new_static(phase, def.seq),
        def.title,
        def.roles.to_vec(),
    )
}

/// All static template tasks of a phase, in template order. Used by the
/// importer's title matching and omission-equals-deletion rule.
pub fn static_tasks(phase: Phase) -> Vec<Task> {
    let template = template(phase);
    template
        .pre
        .iter()
        .chain(template.post.iter())
        .map(|def| static_task(phase, def))
        .collect()
}

/// Synthesize the round tasks for rounds `1..=count`. Pure function of
/// `(phase, count)`; fixed phases yield nothing.
pub fn expand_rounds(phase: Phase, count: u32) -> Vec<Task> {
    let template = template(phase);
    let mut tasks = Vec::with_capacity(template.rounds.len() * count as usize);
    for round in 1..=count {
        for slot in template.rounds {
            tasks.push(Task::new(
                TaskId::new_round(phase, round, slot.suffix),
                format!("{}차 {}", round, slot.title),
                slot.roles.to_vec(),
            ));
        }
    }
    tasks
}

/// The full generated set for a phase: pre-round statics, then the expanded
/// rounds, then post-round statics. This is the materializer's step-1 input.
pub fn generated_tasks(phase: Phase, round_count: u32) -> Vec<Task> {
    let template = template(phase);
    let mut tasks: Vec<Task> = template
        .pre
        .iter()
        .map(|def| static_task(phase, def))
        .collect();
    tasks.extend(expand_rounds(phase, round_count));
    tasks.extend(template.post.iter().map(|def| static_task(phase, def)));
    tasks
}

/// Recognize a round task from its row title: `<n>차` prefix plus the
/// phase-specific keyword. Returns the round number and the slot suffix.
pub fn parse_round_title(phase: Phase, title: &str) -> Option<(u32, &'static str)> {
    let title = title.trim();
    let marker = title.find('차')?;
    let round: u32 = title[..marker].trim().parse().ok()?;
    if round == 0 {
        return None;
    }
    let rest = &title[marker + '차'.len_utf8()..];
    template(phase)
        .rounds
        .iter()
        .find(|slot| rest.contains(slot.keyword))
        .map(|slot| (round, slot.suffix))
}
