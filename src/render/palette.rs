//! Colours: the per-type resource table and the per-session liquid palette.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::deck::DeckKind;
use crate::core::kind::{CarrierKind, HolderKind, ResourceKind};

/// 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Opaque colour from `0xRRGGBB`.
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as u8,
            g: ((rgb >> 8) & 0xFF) as u8,
            b: (rgb & 0xFF) as u8,
            a: 0xFF,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

pub const WHITE: Rgba = Rgba::hex(0xFFFFFF);
pub const BLACK: Rgba = Rgba::hex(0x000000);
pub const TIP_PRESENT: Rgba = Rgba::hex(0x40CDA1);
pub const CONTAINER_BACKGROUND: Rgba = Rgba::hex(0xE0EAEE);
/// Fallback for unnamed liquids.
pub const DEFAULT_LIQUID: Rgba = Rgba::hex(0xFF5733);

const RESOURCE: Rgba = Rgba::hex(0xBDB163);

/// Fill colour of a resource's main shape.
pub fn resource_color(kind: &ResourceKind) -> Rgba {
    match kind {
        ResourceKind::Deck(DeckKind::HamiltonStar { .. }) => Rgba::hex(0xF5FAFC),
        ResourceKind::Carrier(c) => match c {
            CarrierKind::Generic | CarrierKind::Plate => Rgba::hex(0x5C6C8F),
            CarrierKind::Mfx => Rgba::hex(0x536181),
            CarrierKind::Tip => Rgba::hex(0x64405D),
            CarrierKind::Trough | CarrierKind::Tube => Rgba::hex(0x756793),
        },
        ResourceKind::Plate(_) => Rgba::hex(0x3A3A3A),
        ResourceKind::Well { .. } => Rgba::hex(0xF5FAFC),
        ResourceKind::TipRack(_) => Rgba::hex(0x8F5C85),
        ResourceKind::TubeRack(_) => Rgba::hex(0x122D42),
        ResourceKind::Holder { kind: HolderKind::Resource, .. } => Rgba::hex(0x5B6277),
        ResourceKind::Holder { kind: HolderKind::Plate, .. } => Rgba::hex(0x8D99AE),
        _ => RESOURCE,
    }
}

const LIQUID_CYCLE: [Rgba; 12] = [
    Rgba::hex(0xFF5733),
    Rgba::hex(0x33FF57),
    Rgba::hex(0x3357FF),
    Rgba::hex(0xFF33F5),
    Rgba::hex(0xFFD433),
    Rgba::hex(0x33FFF5),
    Rgba::hex(0xD433FF),
    Rgba::hex(0xFF8F33),
    Rgba::hex(0x8FFF33),
    Rgba::hex(0x338FFF),
    Rgba::hex(0xFF33A1),
    Rgba::hex(0xA1FF33),
];

/// Stable liquid → colour assignment.  Colours are handed out in first-seen
/// order and cycle after twelve liquids.
#[derive(Debug, Default, Clone)]
pub struct LiquidPalette {
    assigned: HashMap<String, Rgba>,
    next: usize,
}

impl LiquidPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&mut self, liquid: Option<&str>) -> Rgba {
        let name = match liquid {
            None | Some("") | Some("Unknown liquid") | Some("None") => return DEFAULT_LIQUID,
            Some(name) => name,
        };
        if let Some(&c) = self.assigned.get(name) {
            return c;
        }
        let c = LIQUID_CYCLE[self.next % LIQUID_CYCLE.len()];
        self.next += 1;
        self.assigned.insert(name.to_string(), c);
        c
    }
}
