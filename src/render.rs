//! Case study render sequence.
//!
//! Pure projection of a case study and its resolved sections into an ordered
//! list of blocks. Which sections arrive here is decided upstream by the
//! admin or public fetch.

use serde::Serialize;

use crate::db::models::CaseStudy;
use crate::sections::{sort_sections, ComponentType, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Public,
    /// Admin preview; drafts are shown and flagged.
    Preview,
}

/// Fixed blocks of the legacy layout, in render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyBlock {
    Intro,
    Research,
    Needs,
    Flow,
    Iteration,
    Prototyping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "block", rename_all = "camelCase")]
pub enum RenderBlock {
    #[serde(rename_all = "camelCase")]
    Hero {
        title: String,
        subtitle: Option<String>,
        image_url: Option<String>,
    },
    Section {
        section: Section,
        draft: bool,
    },
    #[serde(rename_all = "camelCase")]
    Legacy {
        kind: LegacyBlock,
        content: String,
        image_url: Option<String>,
    },
    Contact,
    Footer,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn legacy_blocks(case_study: &CaseStudy) -> Vec<RenderBlock> {
    let fields = [
        (LegacyBlock::Intro, &case_study.intro, &case_study.intro_image_url),
        (LegacyBlock::Research, &case_study.challenge, &case_study.challenge_image_url),
        (LegacyBlock::Needs, &case_study.approach, &case_study.approach_image_url),
        (LegacyBlock::Flow, &case_study.solution, &case_study.solution_image_url),
        (LegacyBlock::Iteration, &case_study.results, &case_study.results_image_url),
        (LegacyBlock::Prototyping, &case_study.conclusion, &case_study.conclusion_image_url),
    ];

    fields
        .into_iter()
        .filter_map(|(kind, content, image)| {
            non_empty(content).map(|content| RenderBlock::Legacy {
                kind,
                content: content.to_string(),
                image_url: image.clone(),
            })
        })
        .collect()
}

fn hero_block(case_study: &CaseStudy, hero: Option<&Section>) -> RenderBlock {
    match hero {
        Some(section) => RenderBlock::Hero {
            title: section.title.clone(),
            subtitle: Some(section.content.clone()).filter(|c| !c.trim().is_empty()),
            image_url: section
                .image_url
                .clone()
                .or_else(|| case_study.cover_image_url.clone()),
        },
        None => RenderBlock::Hero {
            title: case_study.title.clone(),
            subtitle: case_study.summary.clone(),
            image_url: case_study.cover_image_url.clone(),
        },
    }
}

/// Build the ordered block list for a case study page.
pub fn render_case_study(
    case_study: &CaseStudy,
    sections: &[Section],
    mode: RenderMode,
) -> Vec<RenderBlock> {
    let mut visible: Vec<Section> = sections
        .iter()
        .filter(|s| s.component_type != ComponentType::EditorState)
        .filter(|s| mode == RenderMode::Preview || s.published)
        .cloned()
        .collect();
    sort_sections(&mut visible);

    let mut blocks = Vec::with_capacity(visible.len() + 3);

    if visible.is_empty() {
        // The legacy layout opens with the intro; it has no hero.
        blocks.extend(legacy_blocks(case_study));
    } else {
        let hero = visible.iter().find(|s| s.component_type == ComponentType::Hero);
        blocks.push(hero_block(case_study, hero));
        blocks.extend(
            visible
                .iter()
                .filter(|s| s.component_type != ComponentType::Hero)
                .map(|s| RenderBlock::Section {
                    section: s.clone(),
                    draft: !s.published,
                }),
        );
    }

    blocks.push(RenderBlock::Contact);
    blocks.push(RenderBlock::Footer);
    blocks
}
