//! Seam to the NAS folder-naming service.
//!
//! The service is invoked after identity-affecting mutations (name, client,
//! dates) and after the delivery-phase lock. Its failure never rolls back
//! the already-committed local mutation; the error is logged for the UI to
//! report and the snapshot keeps its previous folder path.

use anyhow::Result;
use chrono::{DateTime, Local};
use uuid::Uuid;

use studio_tracker_sdk::Project;

/// The identity parts the naming service builds a folder path from.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderRequest {
    pub project_id: Uuid,
    pub name: String,
    pub client: String,
    pub created_at: DateTime<Local>,
    pub locked: bool,
}

impl FolderRequest {
    pub fn from_project(project: &Project) -> FolderRequest {
        FolderRequest {
            project_id: project.id,
            name: project.name.clone(),
            client: project.client.clone(),
            created_at: project.created_at,
            locked: project.locked,
        }
    }
}

/// Narrow interface to the external folder-lifecycle collaborator.
pub trait FolderService {
    /// Ensure the project folder matches the identity parts; returns the
    /// (possibly changed) folder path.
    fn sync_folder(&self, request: &FolderRequest) -> Result<String>;
}

/// Ask the service for the current folder path and persist it onto the
/// snapshot. On failure the snapshot is returned unchanged — the mutation
/// that triggered the sync has already committed.
pub fn sync_project_folder(project: &Project, service: &dyn FolderService) -> Project {
    let request = FolderRequest::from_project(project);
    match service.sync_folder(&request) {
        Ok(path) => {
            let mut next = project.clone();
            if next.folder_path.as_deref() != Some(path.as_str()) {
                next.folder_path = Some(path);
                next.touch();
            }
            next
        }
        Err(error) => {
            tracing::warn!(project = %project.id, %error, "폴더 동기화 실패");
            project.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FakeNas {
        fail: bool,
    }

    impl FolderService for FakeNas {
        fn sync_folder(&self, request: &FolderRequest) -> Result<String> {
            if self.fail {
                return Err(anyhow!("NAS unreachable"));
            }
            Ok(format!("/projects/{}_{}", request.client, request.name))
        }
    }

    #[test]
    fn folder_path_is_persisted() {
        let project = Project::new("리브랜딩", "한빛");
        let synced = sync_project_folder(&project, &FakeNas { fail: false });
        assert_eq!(synced.folder_path.as_deref(), Some("/projects/한빛_리브랜딩"));
    }

    #[test]
    fn failure_keeps_committed_state() {
        let mut project = Project::new("리브랜딩", "한빛");
        project.folder_path = Some("/projects/old".into());
        let synced = sync_project_folder(&project, &FakeNas { fail: true });
        assert_eq!(synced, project);
    }
}
