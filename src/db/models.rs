//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::SectionError;
use crate::sections::Section;

/// Case study model
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudy {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub cover_image_url: Option<String>,
    pub category: Option<String>,
    pub layout: Option<String>,
    pub intro: Option<String>,
    pub intro_image_url: Option<String>,
    pub challenge: Option<String>,
    pub challenge_image_url: Option<String>,
    pub approach: Option<String>,
    pub approach_image_url: Option<String>,
    pub solution: Option<String>,
    pub solution_image_url: Option<String>,
    pub results: Option<String>,
    pub results_image_url: Option<String>,
    pub conclusion: Option<String>,
    pub conclusion_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns selected for a full case study row.
pub const CASE_STUDY_COLUMNS: &str = "id, slug, title, summary, cover_image_url, category, layout, \
     intro, intro_image_url, challenge, challenge_image_url, approach, approach_image_url, \
     solution, solution_image_url, results, results_image_url, conclusion, conclusion_image_url, \
     created_at, updated_at";

/// Editable case study fields. Used for both creation and partial update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudyFields {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub cover_image_url: Option<String>,
    pub category: Option<String>,
    pub layout: Option<String>,
    pub intro: Option<String>,
    pub intro_image_url: Option<String>,
    pub challenge: Option<String>,
    pub challenge_image_url: Option<String>,
    pub approach: Option<String>,
    pub approach_image_url: Option<String>,
    pub solution: Option<String>,
    pub solution_image_url: Option<String>,
    pub results: Option<String>,
    pub results_image_url: Option<String>,
    pub conclusion: Option<String>,
    pub conclusion_image_url: Option<String>,
}

impl CaseStudyFields {
    /// Overlay these fields onto an existing record, keeping absent ones.
    pub fn apply_to(self, existing: &mut CaseStudy) {
        fn merge(target: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *target = value;
            }
        }
        if let Some(title) = self.title {
            existing.title = title;
        }
        merge(&mut existing.summary, self.summary);
        merge(&mut existing.cover_image_url, self.cover_image_url);
        merge(&mut existing.category, self.category);
        merge(&mut existing.layout, self.layout);
        merge(&mut existing.intro, self.intro);
        merge(&mut existing.intro_image_url, self.intro_image_url);
        merge(&mut existing.challenge, self.challenge);
        merge(&mut existing.challenge_image_url, self.challenge_image_url);
        merge(&mut existing.approach, self.approach);
        merge(&mut existing.approach_image_url, self.approach_image_url);
        merge(&mut existing.solution, self.solution);
        merge(&mut existing.solution_image_url, self.solution_image_url);
        merge(&mut existing.results, self.results);
        merge(&mut existing.results_image_url, self.results_image_url);
        merge(&mut existing.conclusion, self.conclusion);
        merge(&mut existing.conclusion_image_url, self.conclusion_image_url);
    }
}

/// Case study summary (for list view)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudySummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: Option<String>,
    pub cover_image_url: Option<String>,
    pub category: Option<String>,
}

/// Raw section row; `component_type` is stored as TEXT.
#[derive(Debug, Clone, FromRow)]
pub struct SectionRow {
    pub id: Uuid,
    pub case_study_id: Uuid,
    pub component_type: String,
    pub title: String,
    pub content: String,
    pub sort_order: i32,
    pub published: bool,
    pub metadata: Value,
    pub image_url: Option<String>,
}

impl TryFrom<SectionRow> for Section {
    type Error = SectionError;

    fn try_from(row: SectionRow) -> Result<Self, Self::Error> {
        Ok(Section {
            id: row.id,
            case_study_id: row.case_study_id,
            component_type: row.component_type.parse()?,
            title: row.title,
            content: row.content,
            sort_order: row.sort_order,
            published: row.published,
            metadata: row.metadata,
            image_url: row.image_url,
        })
    }
}
