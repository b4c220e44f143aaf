//! SQLite persistence for project snapshots.
//!
//! Narrow fields (name, status, progress, lock, folder path, round counts)
//! live in their own columns so list views and partial writes stay cheap.
//! The full snapshot is additionally serialized into a JSON `meta` column —
//! a redundant backup bag. If a narrow column write fails or lags behind
//! (round-count columns in particular), the meta bag is the recovery source
//! of truth on the next load.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use studio_tracker_sdk::{Phase, Project, ProjectStatus};

use crate::progress::compute_progress;

/// Database wrapper for project persistence.
pub struct Store {
    conn: Connection,
}

/// Row shape returned by [`Store::list_projects`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub client: String,
    pub status: ProjectStatus,
    pub progress: u32,
    pub updated_at: DateTime<Local>,
}

const SCHEMA_VERSION: i64 = 1;

impl Store {
    /// Open (or create) the database at the given path.
    pub fn new(path: PathBuf) -> Result<Store> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Store { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub fn in_memory() -> Result<Store> {
        let store = Store {
            conn: Connection::open_in_memory()?,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Default on-disk location under the per-user data directory.
    pub fn default_path() -> PathBuf {
        use directories::ProjectDirs;

        if let Some(dirs) = ProjectDirs::from("com", "studio-tracker", "studio-tracker") {
            dirs.data_dir().join("projects.db")
        } else {
            PathBuf::from(".studio-tracker.db")
        }
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                client TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active',
                deleted_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                locked INTEGER NOT NULL DEFAULT 0,
                folder_path TEXT,
                design_rounds INTEGER,
                review_rounds INTEGER,
                build_rounds INTEGER,
                meta TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);
            CREATE INDEX IF NOT EXISTS idx_projects_updated ON projects(updated_at);
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );
            "#,
        )?;
        let version: Option<i64> = self
            .conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .optional()?;
        if version.is_none() {
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }
        Ok(())
    }

    /// Write the full snapshot: every narrow column plus the meta bag. The
    /// progress column is derived from materialization here.
    pub fn save_project(&self, project: &Project) -> Result<()> {
        let meta = serde_json::to_string(project).context("failed to serialize project meta")?;
        let (status, deleted_at) = status_columns(&project.status);
        self.conn.execute(
            "INSERT OR REPLACE INTO projects
             (id, name, client, status, deleted_at, created_at, updated_at,
              progress, locked, folder_path, design_rounds, review_rounds, build_rounds, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                project.id.to_string(),
                project.name,
                project.client,
                status,
                deleted_at,
                project.created_at.to_rfc3339(),
                project.last_updated.to_rfc3339(),
                compute_progress(project, None).percentage(),
                project.locked,
                project.folder_path,
                project.round_counts.stored(Phase::Design),
                project.round_counts.stored(Phase::Review),
                project.round_counts.stored(Phase::Build),
                meta,
            ],
        )?;
        Ok(())
    }

    /// Partial-field update: only the narrow summary columns, leaving the
    /// meta bag untouched. Used to avoid clobbering complex fields written
    /// concurrently from elsewhere.
    pub fn update_summary(&self, project: &Project) -> Result<()> {
        let (status, deleted_at) = status_columns(&project.status);
        let changed = self.conn.execute(
            "UPDATE projects
             SET name = ?2, client = ?3, status = ?4, deleted_at = ?5, updated_at = ?6,
                 progress = ?7, locked = ?8, folder_path = ?9
             WHERE id = ?1",
            params![
                project.id.to_string(),
                project.name,
                project.client,
                status,
                deleted_at,
                project.last_updated.to_rfc3339(),
                compute_progress(project, None).percentage(),
                project.locked,
                project.folder_path,
            ],
        )?;
        if changed == 0 {
            return Err(anyhow!("project {} not found", project.id));
        }
        Ok(())
    }

    pub fn load_project(&self, id: &Uuid) -> Result<Option<Project>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, client, status, deleted_at, created_at, updated_at,
                        locked, folder_path, design_rounds, review_rounds, build_rounds, meta
                 FROM projects WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, bool>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, Option<u32>>(8)?,
                        row.get::<_, Option<u32>>(9)?,
                        row.get::<_, Option<u32>>(10)?,
                        row.get::<_, String>(11)?,
                    ))
                },
            )
            .optional()?;
        let Some((
            name,
            client,
            status,
            deleted_at,
            created_at,
            updated_at,
            locked,
            folder_path,
            design_rounds,
            review_rounds,
            build_rounds,
            meta,
        )) = row
        else {
            return Ok(None);
        };

        // the meta bag carries the complex fields; narrow columns win for
        // the fields they own
        let mut project: Project =
            serde_json::from_str(&meta).context("corrupt project meta bag")?;
        project.id = *id;
        project.name = name;
        project.client = client;
        project.status = parse_status(&status, deleted_at.as_deref())?;
        project.created_at = parse_ts(&created_at)?;
        project.last_updated = parse_ts(&updated_at)?;
        project.locked = locked;
        project.folder_path = folder_path;

        for (phase, column) in [
            (Phase::Design, design_rounds),
            (Phase::Review, review_rounds),
            (Phase::Build, build_rounds),
        ] {
            match column {
                Some(count) => project.round_counts.set(phase, count),
                // column lost in a partial write: keep the meta bag's value
                None => {
                    if project.round_counts.stored(phase).is_some() {
                        tracing::debug!(
                            project = %id,
                            phase = phase.number(),
                            "라운드 수 컬럼 누락, meta 백업에서 복구"
                        );
                    }
                }
            }
        }

        Ok(Some(project))
    }

    pub fn list_projects(&self, include_deleted: bool) -> Result<Vec<ProjectSummary>> {
        let sql = if include_deleted {
            "SELECT id, name, client, status, deleted_at, progress, updated_at
             FROM projects ORDER BY updated_at DESC"
        } else {
            "SELECT id, name, client, status, deleted_at, progress, updated_at
             FROM projects WHERE status = 'active' ORDER BY updated_at DESC"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, u32>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, name, client, status, deleted_at, progress, updated_at) = row?;
            summaries.push(ProjectSummary {
                id: Uuid::parse_str(&id).context("corrupt project id")?,
                name,
                client,
                status: parse_status(&status, deleted_at.as_deref())?,
                progress,
                updated_at: parse_ts(&updated_at)?,
            });
        }
        Ok(summaries)
    }

    /// Soft-delete at the store level: status sentinel plus timestamp. The
    /// meta bag is deliberately left alone — restore brings the snapshot
    /// back exactly as it was.
    pub fn mark_deleted(&self, id: &Uuid) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE projects SET status = 'deleted', deleted_at = ?2, updated_at = ?2 WHERE id = ?1",
            params![id.to_string(), now],
        )?;
        if changed == 0 {
            return Err(anyhow!("project {id} not found"));
        }
        Ok(())
    }

    pub fn restore(&self, id: &Uuid) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE projects SET status = 'active', deleted_at = NULL, updated_at = ?2 WHERE id = ?1",
            params![id.to_string(), now],
        )?;
        if changed == 0 {
            return Err(anyhow!("project {id} not found"));
        }
        Ok(())
    }
}

fn status_columns(status: &ProjectStatus) -> (&'static str, Option<String>) {
    match status {
        ProjectStatus::Active => ("active", None),
        ProjectStatus::Deleted { deleted_at } => ("deleted", Some(deleted_at.to_rfc3339())),
    }
}

fn parse_status(status: &str, deleted_at: Option<&str>) -> Result<ProjectStatus> {
    match status {
        "active" => Ok(ProjectStatus::Active),
        "deleted" => {
            let deleted_at = match deleted_at {
                Some(raw) => parse_ts(raw)?,
                None => Local::now(),
            };
            Ok(ProjectStatus::Deleted { deleted_at })
        }
        other => Err(anyhow!("unknown project status: {other}")),
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Local>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("bad timestamp: {raw}"))?
        .with_timezone(&Local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_tracker_sdk::{Role, Task, TaskId};

    fn sample() -> Project {
        let mut project = Project::new("브랜딩", "한빛");
        project.round_counts.set(Phase::Design, 4);
        project.task_overrides.insert(
            Phase::Design,
            vec![Task::new(
                TaskId::new_adhoc(Phase::Design, 1),
                "로고 스케치",
                vec![Role::Designer],
            )],
        );
        project
            .completed_tasks
            .insert(TaskId::new_static(Phase::Planning, 1));
        project
    }

    #[test]
    fn save_load_roundtrip() {
        let store = Store::in_memory().unwrap();
        let project = sample();
        store.save_project(&project).unwrap();
        let loaded = store.load_project(&project.id).unwrap().unwrap();
        assert_eq!(loaded, project);
    }

    #[test]
    fn missing_round_column_recovers_from_meta() {
        let store = Store::in_memory().unwrap();
        let project = sample();
        store.save_project(&project).unwrap();
        // simulate a lossy partial write that dropped the column
        store
            .conn
            .execute(
                "UPDATE projects SET design_rounds = NULL WHERE id = ?1",
                params![project.id.to_string()],
            )
            .unwrap();
        let loaded = store.load_project(&project.id).unwrap().unwrap();
        assert_eq!(loaded.round_counts.stored(Phase::Design), Some(4));
    }

    #[test]
    fn summary_update_keeps_complex_fields() {
        let store = Store::in_memory().unwrap();
        let mut project = sample();
        store.save_project(&project).unwrap();

        project.name = "브랜딩 2차".to_string();
        project.touch();
        store.update_summary(&project).unwrap();

        let loaded = store.load_project(&project.id).unwrap().unwrap();
        assert_eq!(loaded.name, "브랜딩 2차");
        assert_eq!(loaded.task_overrides, project.task_overrides);
        assert_eq!(loaded.completed_tasks, project.completed_tasks);
    }

    #[test]
    fn soft_delete_and_restore() {
        let store = Store::in_memory().unwrap();
        let project = sample();
        store.save_project(&project).unwrap();

        store.mark_deleted(&project.id).unwrap();
        assert!(store.list_projects(false).unwrap().is_empty());
        let all = store.list_projects(true).unwrap();
        assert_eq!(all.len(), 1);
        assert!(matches!(all[0].status, ProjectStatus::Deleted { .. }));

        store.restore(&project.id).unwrap();
        let active = store.list_projects(false).unwrap();
        assert_eq!(active.len(), 1);
        // pre-delete progress preserved
        assert_eq!(
            active[0].progress,
            compute_progress(&project, None).percentage()
        );
        let restored = store.load_project(&project.id).unwrap().unwrap();
        assert_eq!(restored.completed_tasks, project.completed_tasks);
    }

    #[test]
    fn update_summary_requires_existing_row() {
        let store = Store::in_memory().unwrap();
        let project = sample();
        assert!(store.update_summary(&project).is_err());
    }
}
