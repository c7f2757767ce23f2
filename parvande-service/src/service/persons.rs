//! Person records and the per-person archive overview.

use serde::Serialize;
use tracing::info;

use super::ArchiveService;
use super::folders::FolderSummary;
use crate::db::{Document, NewPerson, Person};
use crate::error::{ServiceError, ServiceResult};

/// Compact document entry used in folder listings
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub processed: bool,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.file_name.clone(),
            processed: doc.ocr_processed,
        }
    }
}

/// A person with their root folders and the documents kept outside any folder
#[derive(Debug, Clone, Serialize)]
pub struct PersonDetail {
    pub person: Person,
    pub folders: Vec<FolderSummary>,
    pub documents: Vec<DocumentSummary>,
    pub document_count: usize,
}

impl ArchiveService {
    /// Create a person, or return the existing one with the same national id.
    /// The flag is true when a new record was created.
    pub fn create_person(&self, new: NewPerson) -> ServiceResult<(Person, bool)> {
        let new = NewPerson {
            employee_id: new
                .employee_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            national_id: new.national_id.trim().to_string(),
            case_description: new.case_description,
        };

        for (field, value) in [
            ("first_name", &new.first_name),
            ("last_name", &new.last_name),
            ("national_id", &new.national_id),
        ] {
            if value.is_empty() {
                return Err(ServiceError::InvalidRequest {
                    message: format!("{} is required", field),
                });
            }
        }

        let (person, created) = self.db.get_or_create_person(&new)?;
        if created {
            info!(person_id = %person.id, "Person created");
        }
        Ok((person, created))
    }

    pub fn list_persons(&self) -> ServiceResult<Vec<Person>> {
        self.db.list_persons()
    }

    pub fn require_person(&self, person_id: &str) -> ServiceResult<Person> {
        self.db
            .get_person(person_id)?
            .ok_or_else(|| ServiceError::PersonNotFound {
                person_id: person_id.to_string(),
            })
    }

    pub fn person_detail(&self, person_id: &str) -> ServiceResult<PersonDetail> {
        let person = self.require_person(person_id)?;
        let contents = self.root_contents(person_id)?;
        let document_count = self.db.count_documents_for_person(person_id)?;

        Ok(PersonDetail {
            person,
            folders: contents.subfolders,
            documents: contents.documents,
            document_count,
        })
    }
}
