//! Move planning: a move swaps the `sort_order` of a section and its
//! neighbour in the requested direction. Positions in the collection are
//! never used as the ordering key.

use uuid::Uuid;

use super::{sort_sections, Section, SortDirection};

/// The two rows a move rewrites, with their new `sort_order` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub moved: Uuid,
    pub moved_order: i32,
    pub neighbour: Uuid,
    pub neighbour_order: i32,
}

/// Why a move was not planned. None of these change any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    TooFewSections,
    NotFound,
    AtBoundary(SortDirection),
    /// The section and its neighbour share a `sort_order`; swapping would
    /// change nothing.
    TiedOrder,
}

impl MoveRejection {
    pub fn message(&self) -> &'static str {
        match self {
            MoveRejection::TooFewSections => "Add more sections to reorder them",
            MoveRejection::NotFound => "Section not found",
            MoveRejection::AtBoundary(SortDirection::Up) => "Section is already at the top",
            MoveRejection::AtBoundary(SortDirection::Down) => "Section is already at the bottom",
            MoveRejection::TiedOrder => "Sections share a position; refresh to reorder them",
        }
    }
}

pub fn plan_move(
    sections: &[Section],
    id: Uuid,
    direction: SortDirection,
) -> Result<MovePlan, MoveRejection> {
    if sections.len() < 2 {
        return Err(MoveRejection::TooFewSections);
    }

    let mut ordered = sections.to_vec();
    sort_sections(&mut ordered);

    let index = ordered
        .iter()
        .position(|s| s.id == id)
        .ok_or(MoveRejection::NotFound)?;

    let neighbour_index = match direction {
        SortDirection::Up if index == 0 => return Err(MoveRejection::AtBoundary(direction)),
        SortDirection::Down if index == ordered.len() - 1 => {
            return Err(MoveRejection::AtBoundary(direction))
        }
        SortDirection::Up => index - 1,
        SortDirection::Down => index + 1,
    };

    let current = &ordered[index];
    let neighbour = &ordered[neighbour_index];
    if current.sort_order == neighbour.sort_order {
        return Err(MoveRejection::TiedOrder);
    }

    Ok(MovePlan {
        moved: current.id,
        moved_order: neighbour.sort_order,
        neighbour: neighbour.id,
        neighbour_order: current.sort_order,
    })
}

/// Apply a plan's two `sort_order` values to a collection in place.
pub fn apply_plan(sections: &mut [Section], plan: &MovePlan) {
    for section in sections.iter_mut() {
        if section.id == plan.moved {
            section.sort_order = plan.moved_order;
        } else if section.id == plan.neighbour {
            section.sort_order = plan.neighbour_order;
        }
    }
}
