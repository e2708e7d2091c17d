use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::websoc_sections;
use crate::db::models::StoredSection;
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{Quarter, Term};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = websoc_sections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)] // updated_at is only read by operators
pub struct SectionRow {
    pub year: i32,
    pub quarter: String,
    pub section_code: String,
    pub department: String,
    pub course_number: String,
    pub ge_categories: Value,
    pub checksum: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = websoc_sections)]
pub struct NewSectionRow {
    pub year: i32,
    pub quarter: String,
    pub section_code: String,
    pub department: String,
    pub course_number: String,
    pub ge_categories: Value,
    pub checksum: String,
    pub data: Value,
}

impl NewSectionRow {
    pub fn from_stored(row: &StoredSection) -> RepositoryResult<Self> {
        Ok(Self {
            year: i32::from(row.term.year),
            quarter: row.term.quarter.as_str().to_string(),
            section_code: row.section_code.clone(),
            department: row.department.clone(),
            course_number: row.course_number.clone(),
            ge_categories: serde_json::to_value(&row.ge_categories)?,
            checksum: row.checksum.clone(),
            data: serde_json::to_value(&row.data)?,
        })
    }
}

pub fn term_from_columns(year: i32, quarter: &str) -> RepositoryResult<Term> {
    let year = u16::try_from(year).map_err(|_| {
        RepositoryError::internal_with_context(
            format!("Stored year out of range: {}", year),
            ErrorContext::new("decode_term"),
        )
    })?;
    let quarter = quarter.parse::<Quarter>().map_err(|e| {
        RepositoryError::internal_with_context(e, ErrorContext::new("decode_term"))
    })?;
    Ok(Term::new(year, quarter))
}

impl TryFrom<SectionRow> for StoredSection {
    type Error = RepositoryError;

    fn try_from(row: SectionRow) -> Result<Self, Self::Error> {
        let term = term_from_columns(row.year, &row.quarter)?;
        let with_id = |e: serde_json::Error| {
            RepositoryError::internal_with_context(
                e.to_string(),
                ErrorContext::new("decode_section")
                    .with_entity("section")
                    .with_entity_id(&row.section_code),
            )
        };
        Ok(StoredSection {
            term,
            department: row.department.clone(),
            course_number: row.course_number.clone(),
            section_code: row.section_code.clone(),
            ge_categories: serde_json::from_value(row.ge_categories.clone()).map_err(with_id)?,
            checksum: row.checksum.clone(),
            data: serde_json::from_value(row.data.clone()).map_err(with_id)?,
        })
    }
}
