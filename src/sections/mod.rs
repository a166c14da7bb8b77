//! Case study sections: typed, orderable, publishable content blocks.
//!
//! The editor works on an in-memory collection of [`Section`]s that mirrors
//! the `case_study_sections` table. Ordering is carried by `sort_order`
//! rather than by position in the collection.

pub mod editor;
pub mod fetch;
pub mod memory;
pub mod notice;
pub mod open_state;
pub mod order;
pub mod session;
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SectionError;

pub use editor::{SectionEditor, SectionPatch};
pub use fetch::{
    fetch_admin_sections, fetch_public_sections, fetch_sections, FetchState, SectionFetcher,
};
pub use memory::MemorySectionStore;
pub use notice::{Notice, NoticeLevel, Notices};
pub use open_state::{MemorySessionStorage, OpenSections, SessionStorage};
pub use order::{plan_move, MovePlan, MoveRejection};
pub use session::{EditorSession, SessionRegistry, SharedEditor};
pub use store::{PgSectionStore, SectionQuery, SectionStore};

/// Closed set of section component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Introduction,
    Alignment,
    Carousel,
    FourParagraphs,
    Hero,
    // Flat-field types carried over from the legacy layout
    Intro,
    Challenge,
    Approach,
    Solution,
    Results,
    Conclusion,
    /// Editor-only bookkeeping row; never shown by any fetch.
    EditorState,
}

impl ComponentType {
    pub const ALL: [ComponentType; 12] = [
        ComponentType::Introduction,
        ComponentType::Alignment,
        ComponentType::Carousel,
        ComponentType::FourParagraphs,
        ComponentType::Hero,
        ComponentType::Intro,
        ComponentType::Challenge,
        ComponentType::Approach,
        ComponentType::Solution,
        ComponentType::Results,
        ComponentType::Conclusion,
        ComponentType::EditorState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Introduction => "introduction",
            ComponentType::Alignment => "alignment",
            ComponentType::Carousel => "carousel",
            ComponentType::FourParagraphs => "four_paragraphs",
            ComponentType::Hero => "hero",
            ComponentType::Intro => "intro",
            ComponentType::Challenge => "challenge",
            ComponentType::Approach => "approach",
            ComponentType::Solution => "solution",
            ComponentType::Results => "results",
            ComponentType::Conclusion => "conclusion",
            ComponentType::EditorState => "editor_state",
        }
    }

    /// Title given to a freshly added section of this type.
    pub fn default_title(&self) -> &'static str {
        match self {
            ComponentType::Introduction => "Introduction",
            ComponentType::Alignment => "Alignment",
            ComponentType::Carousel => "Carousel",
            ComponentType::FourParagraphs => "Four Paragraphs",
            ComponentType::Hero => "Hero",
            ComponentType::Intro => "Intro",
            ComponentType::Challenge => "Challenge",
            ComponentType::Approach => "Approach",
            ComponentType::Solution => "Solution",
            ComponentType::Results => "Results",
            ComponentType::Conclusion => "Conclusion",
            ComponentType::EditorState => "Editor State",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = SectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SectionError::UnknownComponentType(s.to_string()))
    }
}

/// Reorder direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Up,
    Down,
}

/// A content section belonging to one case study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    pub case_study_id: Uuid,
    pub component_type: ComponentType,
    pub title: String,
    pub content: String,
    pub sort_order: i32,
    pub published: bool,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
    pub image_url: Option<String>,
}

fn empty_metadata() -> Value {
    Value::Object(Default::default())
}

impl Section {
    /// Build a draft section of `component_type` with default title and content.
    pub fn draft(case_study_id: Uuid, component_type: ComponentType, sort_order: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_study_id,
            component_type,
            title: component_type.default_title().to_string(),
            content: String::new(),
            sort_order,
            published: false,
            metadata: empty_metadata(),
            image_url: None,
        }
    }
}

/// Sort a collection in place by `sort_order`, ties broken by id.
pub fn sort_sections(sections: &mut [Section]) {
    sections.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_round_trips_through_str() {
        for t in ComponentType::ALL {
            assert_eq!(t.as_str().parse::<ComponentType>().unwrap(), t);
        }
    }

    #[test]
    fn test_component_type_serde_matches_as_str() {
        let json = serde_json::to_string(&ComponentType::FourParagraphs).unwrap();
        assert_eq!(json, "\"four_paragraphs\"");
    }

    #[test]
    fn test_unknown_component_type_rejected() {
        let err = "timeline".parse::<ComponentType>().unwrap_err();
        assert_eq!(err, SectionError::UnknownComponentType("timeline".into()));
    }

    #[test]
    fn test_draft_section_defaults() {
        let cs = Uuid::new_v4();
        let s = Section::draft(cs, ComponentType::Carousel, 4);
        assert_eq!(s.case_study_id, cs);
        assert_eq!(s.title, "Carousel");
        assert!(s.content.is_empty());
        assert!(!s.published);
        assert_eq!(s.sort_order, 4);
        assert!(s.metadata.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_sort_sections_orders_by_sort_order() {
        let cs = Uuid::new_v4();
        let mut sections = vec![
            Section::draft(cs, ComponentType::Alignment, 2),
            Section::draft(cs, ComponentType::Introduction, 0),
            Section::draft(cs, ComponentType::Carousel, 1),
        ];
        sort_sections(&mut sections);
        let orders: Vec<i32> = sections.iter().map(|s| s.sort_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }
}
