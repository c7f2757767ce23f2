//! Folder hierarchy: creation, recursive tree and directory-style listings.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::ArchiveService;
use super::persons::DocumentSummary;
use crate::db::Folder;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewFolder {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderSummary {
    pub id: String,
    pub name: String,
}

impl From<&Folder> for FolderSummary {
    fn from(folder: &Folder) -> Self {
        Self {
            id: folder.id.clone(),
            name: folder.name.clone(),
        }
    }
}

/// One node of a person's folder tree. Root folders are level 0.
#[derive(Debug, Clone, Serialize)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    pub level: usize,
    pub subfolders: Vec<FolderNode>,
}

/// Immediate children of a folder (or of a person's root)
#[derive(Debug, Clone, Serialize)]
pub struct FolderContents {
    pub subfolders: Vec<FolderSummary>,
    pub documents: Vec<DocumentSummary>,
}

impl ArchiveService {
    /// Create a folder under a person, optionally nested in one of the same
    /// person's folders
    pub fn create_folder(&self, person_id: &str, new: NewFolder) -> ServiceResult<Folder> {
        self.require_person(person_id)?;

        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "Folder name is required".to_string(),
            });
        }

        let parent_id = new.parent_folder_id.filter(|id| !id.trim().is_empty());
        if let Some(parent_id) = &parent_id {
            self.require_folder_of(person_id, parent_id)?;
        }

        let folder = Folder {
            id: uuid::Uuid::new_v4().to_string(),
            person_id: person_id.to_string(),
            parent_id,
            name,
            description: new.description,
            created_at: Utc::now(),
        };
        self.db.insert_folder(&folder)?;

        info!(
            folder_id = %folder.id,
            person_id = %person_id,
            parent_id = ?folder.parent_id,
            "Folder created"
        );
        Ok(folder)
    }

    pub fn require_folder(&self, folder_id: &str) -> ServiceResult<Folder> {
        self.db
            .get_folder(folder_id)?
            .ok_or_else(|| ServiceError::FolderNotFound {
                folder_id: folder_id.to_string(),
            })
    }

    /// Look up a folder, treating one owned by another person as missing
    pub fn require_folder_of(&self, person_id: &str, folder_id: &str) -> ServiceResult<Folder> {
        let folder = self.require_folder(folder_id)?;
        if folder.person_id != person_id {
            return Err(ServiceError::FolderNotFound {
                folder_id: folder_id.to_string(),
            });
        }
        Ok(folder)
    }

    /// The person's full folder hierarchy
    pub fn folder_tree(&self, person_id: &str) -> ServiceResult<Vec<FolderNode>> {
        self.require_person(person_id)?;

        let mut children: HashMap<Option<String>, Vec<Folder>> = HashMap::new();
        for folder in self.db.list_folders_for_person(person_id)? {
            children
                .entry(folder.parent_id.clone())
                .or_default()
                .push(folder);
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Ok(build_level(&children, None, 0))
    }

    /// Root folders and documents outside any folder
    pub fn root_contents(&self, person_id: &str) -> ServiceResult<FolderContents> {
        self.require_person(person_id)?;
        self.contents(person_id, None)
    }

    pub fn folder_contents(&self, folder_id: &str) -> ServiceResult<FolderContents> {
        let folder = self.require_folder(folder_id)?;
        self.contents(&folder.person_id, Some(&folder.id))
    }

    fn contents(&self, person_id: &str, folder_id: Option<&str>) -> ServiceResult<FolderContents> {
        let subfolders = self.db.list_child_folders(person_id, folder_id)?;
        let documents = self.db.list_documents_in_folder(person_id, folder_id)?;

        Ok(FolderContents {
            subfolders: subfolders.iter().map(FolderSummary::from).collect(),
            documents: documents.iter().map(DocumentSummary::from).collect(),
        })
    }
}

fn build_level(
    children: &HashMap<Option<String>, Vec<Folder>>,
    parent_id: Option<String>,
    level: usize,
) -> Vec<FolderNode> {
    let Some(siblings) = children.get(&parent_id) else {
        return Vec::new();
    };

    siblings
        .iter()
        .map(|folder| FolderNode {
            id: folder.id.clone(),
            name: folder.name.clone(),
            level,
            subfolders: build_level(children, Some(folder.id.clone()), level + 1),
        })
        .collect()
}
