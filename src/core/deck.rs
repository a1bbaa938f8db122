//! Fixed deck geometry.  These constants describe physical hardware and are
//! never edited by the user; they parameterize drawing and snapping.

use super::geometry::{Coordinate, Rect};

/// Distance between neighbouring rails.
pub const RAIL_SPACING: f64 = 22.5;
/// Bottom edge of the rail area, relative to the deck origin.
pub const RAIL_AREA_Y: f64 = 63.0;
/// Height of the rail area.
pub const RAIL_AREA_HEIGHT: f64 = 497.0;
/// Length of the tick drawn below each rail.
pub const RAIL_TICK: f64 = 10.0;

/// First rail x offset on a Hamilton STAR(let) deck.
pub const STAR_RAIL_OFFSET: f64 = 100.0;
/// First rail x offset on a Vantage deck.
pub const VANTAGE_RAIL_OFFSET: f64 = 32.5;
/// Rail count of the only supported Vantage size (1.3).
pub const VANTAGE_13_RAILS: u32 = 54;

/// OT decks sit at a fixed place regardless of the description.
pub const OT_DECK_LOCATION: Coordinate = Coordinate {
    x: 115.65,
    y: 68.03,
    z: 0.0,
};
pub const OT_SLOT_WIDTH: f64 = 128.0;
pub const OT_SLOT_HEIGHT: f64 = 86.0;

/// Slot origins relative to the OT deck, slot 1 first.
pub const OT_SLOT_LOCATIONS: [Coordinate; 12] = [
    Coordinate { x: 0.0, y: 0.0, z: 0.0 },
    Coordinate { x: 132.5, y: 0.0, z: 0.0 },
    Coordinate { x: 265.0, y: 0.0, z: 0.0 },
    Coordinate { x: 0.0, y: 90.5, z: 0.0 },
    Coordinate { x: 132.5, y: 90.5, z: 0.0 },
    Coordinate { x: 265.0, y: 90.5, z: 0.0 },
    Coordinate { x: 0.0, y: 181.0, z: 0.0 },
    Coordinate { x: 132.5, y: 181.0, z: 0.0 },
    Coordinate { x: 265.0, y: 181.0, z: 0.0 },
    Coordinate { x: 0.0, y: 271.5, z: 0.0 },
    Coordinate { x: 132.5, y: 271.5, z: 0.0 },
    Coordinate { x: 265.0, y: 271.5, z: 0.0 },
];

/// Deck flavours.  Rail decks share one drawing and snapping scheme that only
/// differs by the first rail offset.
#[derive(Debug, Clone, PartialEq)]
pub enum DeckKind {
    /// A deck without fixed docking geometry.
    Plain,
    HamiltonStar { num_rails: u32 },
    /// `size` is the Vantage model size (only 1.3 is known).
    Vantage { size: f64, num_rails: u32 },
    Ot,
}

impl DeckKind {
    /// Rail count for a Vantage of the given size; unsupported sizes have none.
    pub fn vantage(size: f64) -> Self {
        let num_rails = if (size - 1.3).abs() < f64::EPSILON {
            VANTAGE_13_RAILS
        } else {
            tracing::warn!("unsupported Vantage deck size {size}; only 1.3 is supported");
            0
        };
        DeckKind::Vantage { size, num_rails }
    }

    /// `(first rail offset, rail count)` for rail decks.
    pub fn rails(&self) -> Option<(f64, u32)> {
        match self {
            DeckKind::HamiltonStar { num_rails } => Some((STAR_RAIL_OFFSET, *num_rails)),
            DeckKind::Vantage { num_rails, .. } => Some((VANTAGE_RAIL_OFFSET, *num_rails)),
            DeckKind::Plain | DeckKind::Ot => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DeckKind::Plain => "Deck",
            DeckKind::HamiltonStar { .. } => "HamiltonSTARDeck",
            DeckKind::Vantage { .. } => "VantageDeck",
            DeckKind::Ot => "OTDeck",
        }
    }
}

/// Local x of rail `index` (0-based) for a deck whose first rail is at `offset`.
pub fn rail_x(offset: f64, index: u32) -> f64 {
    offset + RAIL_SPACING * f64::from(index)
}

/// Absolute rectangles of the OT slots for a deck at `deck_origin`.
pub fn ot_slot_rects(deck_origin: Coordinate) -> impl Iterator<Item = (Coordinate, Rect)> {
    OT_SLOT_LOCATIONS.into_iter().map(move |slot| {
        let rect = Rect::new(
            deck_origin.x + slot.x,
            deck_origin.y + slot.y,
            OT_SLOT_WIDTH,
            OT_SLOT_HEIGHT,
        );
        (slot, rect)
    })
}
