//! Person operations.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::models::{NewPerson, Person, format_timestamp};
use super::{Database, like_pattern};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// Person search criteria. `any` matches names, national id and case
/// description; the field filters are combined with AND.
#[derive(Debug, Clone, Default)]
pub struct PersonFilter {
    pub any: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub national_id: Option<String>,
}

impl Database {
    /// Return the person with the given national id, creating it if absent.
    /// The flag is true when a new row was inserted.
    pub fn get_or_create_person(&self, new: &NewPerson) -> ServiceResult<(Person, bool)> {
        let conn = self.conn.lock().unwrap();

        let existing = conn
            .query_row(
                &format!(
                    "SELECT {} FROM persons p WHERE p.national_id = ?1",
                    Person::COLUMNS
                ),
                params![new.national_id],
                Person::from_row,
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        if let Some(person) = existing {
            return Ok((person, false));
        }

        let now = Utc::now();
        let person = Person {
            id: uuid::Uuid::new_v4().to_string(),
            employee_id: new.employee_id.clone().filter(|e| !e.trim().is_empty()),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            national_id: new.national_id.clone(),
            case_description: new.case_description.clone(),
            created_at: now,
            updated_at: now,
        };

        let ts = format_timestamp(&now);
        conn.execute(
            "INSERT INTO persons (id, employee_id, first_name, last_name, national_id, case_description, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                person.id,
                person.employee_id,
                person.first_name,
                person.last_name,
                person.national_id,
                person.case_description,
                ts,
                ts,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ServiceError::Conflict {
                    message: format!(
                        "Employee id '{}' is already assigned",
                        person.employee_id.as_deref().unwrap_or_default()
                    ),
                }
            }
            e => DatabaseError::Query(e).into(),
        })?;

        Ok((person, true))
    }

    /// Get a person by ID
    pub fn get_person(&self, id: &str) -> ServiceResult<Option<Person>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {} FROM persons p WHERE p.id = ?1", Person::COLUMNS),
            params![id],
            Person::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// List all persons, newest first
    pub fn list_persons(&self) -> ServiceResult<Vec<Person>> {
        self.search_persons(&PersonFilter::default())
    }

    /// Search persons by substring (case-insensitive for ASCII)
    pub fn search_persons(&self, filter: &PersonFilter) -> ServiceResult<Vec<Person>> {
        let conn = self.conn.lock().unwrap();

        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(any) = &filter.any {
            clauses.push(
                "(p.first_name LIKE ? ESCAPE '\\' OR p.last_name LIKE ? ESCAPE '\\' \
                 OR p.national_id LIKE ? ESCAPE '\\' OR p.case_description LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(any);
            values.extend(std::iter::repeat_n(pattern, 4));
        }
        for (column_clause, value) in [
            ("p.first_name LIKE ? ESCAPE '\\'", &filter.first_name),
            ("p.last_name LIKE ? ESCAPE '\\'", &filter.last_name),
            ("p.national_id LIKE ? ESCAPE '\\'", &filter.national_id),
        ] {
            if let Some(value) = value {
                clauses.push(column_clause);
                values.push(like_pattern(value));
            }
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM persons p {} ORDER BY p.created_at DESC, p.rowid DESC",
                Person::COLUMNS,
                where_clause
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), Person::from_row)
            .map_err(DatabaseError::Query)?;

        let mut persons = Vec::new();
        for row in rows {
            persons.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(persons)
    }
}
