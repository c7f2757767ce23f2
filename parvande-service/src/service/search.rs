//! Archive search over persons and documents.
//!
//! A lone `q` runs the simple search across both collections. Any field
//! filter switches to the advanced form, where person filters narrow the
//! person list and document filters narrow the document list independently.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ArchiveService;
use crate::db::{Document, DocumentFilter, Person, PersonFilter};
use crate::error::ServiceResult;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub national_id: Option<String>,
    pub document_text: Option<String>,
    /// `processed` or `pending`; other values apply no status filter
    pub processing_status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentHit {
    pub id: String,
    pub person_id: String,
    pub person_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    pub file_name: String,
    pub description: String,
    pub processed: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    /// Echo of the effective query for display
    pub query: String,
    pub persons: Vec<Person>,
    pub documents: Vec<DocumentHit>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ArchiveService {
    pub fn search(&self, params: &SearchParams) -> ServiceResult<SearchResults> {
        let q = non_empty(&params.q);
        let first_name = non_empty(&params.first_name);
        let last_name = non_empty(&params.last_name);
        let national_id = non_empty(&params.national_id);
        let document_text = non_empty(&params.document_text);
        let processed = match non_empty(&params.processing_status).as_deref() {
            Some("processed") => Some(true),
            Some("pending") => Some(false),
            _ => None,
        };

        let advanced = first_name.is_some()
            || last_name.is_some()
            || national_id.is_some()
            || document_text.is_some()
            || processed.is_some();

        let (person_filter, document_filter, query) = match q {
            Some(q) if !advanced => (
                PersonFilter {
                    any: Some(q.clone()),
                    ..Default::default()
                },
                DocumentFilter {
                    any: Some(q.clone()),
                    ..Default::default()
                },
                q,
            ),
            _ => {
                let names = format!(
                    "{} {}",
                    first_name.as_deref().unwrap_or(""),
                    last_name.as_deref().unwrap_or("")
                );
                let query = document_text
                    .clone()
                    .or_else(|| Some(names.trim().to_string()).filter(|n| !n.is_empty()))
                    .or_else(|| national_id.clone())
                    .unwrap_or_default();

                (
                    PersonFilter {
                        any: None,
                        first_name,
                        last_name,
                        national_id,
                    },
                    DocumentFilter {
                        any: None,
                        text: document_text,
                        processed,
                    },
                    query,
                )
            }
        };

        let persons = self.db.search_persons(&person_filter)?;
        let documents = self.db.search_documents(&document_filter)?;
        let documents = self.document_hits(documents)?;

        Ok(SearchResults {
            query,
            persons,
            documents,
        })
    }

    fn document_hits(&self, documents: Vec<Document>) -> ServiceResult<Vec<DocumentHit>> {
        let mut names: HashMap<String, String> = HashMap::new();
        let mut hits = Vec::with_capacity(documents.len());

        for doc in documents {
            let person_name = match names.get(&doc.person_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .db
                        .get_person(&doc.person_id)?
                        .map(|p| p.full_name())
                        .unwrap_or_default();
                    names.insert(doc.person_id.clone(), name.clone());
                    name
                }
            };

            hits.push(DocumentHit {
                id: doc.id,
                person_id: doc.person_id,
                person_name,
                folder_id: doc.folder_id,
                file_name: doc.file_name,
                description: doc.description,
                processed: doc.ocr_processed,
                confidence: doc.extraction_confidence,
            });
        }

        Ok(hits)
    }
}
