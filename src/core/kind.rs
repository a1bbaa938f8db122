//! The closed set of resource kinds and their per-kind data.
//!
//! Every behaviour that differs between hardware types (which JSON fields are
//! read and written, drag/delete permission, grid child naming, liquid and tip
//! state) dispatches on [`ResourceKind`].  Unknown type tags become
//! [`ResourceKind::Generic`] and render as a plain box.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::container::{ContainerState, Liquid};
use super::deck::DeckKind;
use super::error::LoadError;

// ───────────────────────────────────────── view mode ─────────

/// Interaction mode.  In visualizer mode nothing can be dragged or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Visualizer,
    Gui,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Visualizer => "visualizer",
            ViewMode::Gui => "gui",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "visualizer" => Some(ViewMode::Visualizer),
            "gui" => Some(ViewMode::Gui),
            _ => None,
        }
    }
}

// ───────────────────────────────────────── sub-kinds ─────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierKind {
    Generic,
    Plate,
    Tip,
    Trough,
    Tube,
    Mfx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderKind {
    Resource,
    Plate,
}

/// Rows × columns of a grid container.  Child `i * num_items_y + j` sits at
/// column `i`, row `j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Grid {
    pub num_items_x: usize,
    pub num_items_y: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossSection {
    Circle,
    Rectangle,
    /// Unrecognized tag, drawn as a rectangle and exported unchanged.
    Other(String),
}

impl CrossSection {
    fn parse(s: &str) -> Self {
        match s {
            "circle" => CrossSection::Circle,
            "rectangle" => CrossSection::Rectangle,
            other => {
                tracing::warn!("unknown cross section `{other}`, drawing as rectangle");
                CrossSection::Other(other.to_string())
            }
        }
    }

    fn as_str(&self) -> &str {
        match self {
            CrossSection::Circle => "circle",
            CrossSection::Rectangle => "rectangle",
            CrossSection::Other(tag) => tag,
        }
    }
}

/// Tip presence plus the descriptor of the tip this spot holds.
#[derive(Debug, Clone, PartialEq)]
pub struct TipState {
    pub has_tip: bool,
    /// Opaque tip description as sent by the protocol side.
    pub prototype_tip: Value,
}

impl TipState {
    /// Apply a `tip` payload: `null` clears the spot, anything else fills it.
    pub fn set_tip(&mut self, tip: Value) {
        self.has_tip = !tip.is_null();
        if self.has_tip && self.prototype_tip.is_null() {
            self.prototype_tip = tip;
        }
    }
}

// ───────────────────────────────────────── kind ──────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceKind {
    /// Unrecognized hardware; keeps the original type tag for export.
    Generic { type_name: String },
    Deck(DeckKind),
    Carrier(CarrierKind),
    Holder { kind: HolderKind, spot: Value },
    Plate(Grid),
    TipRack(Grid),
    TubeRack(Grid),
    Well {
        container: ContainerState,
        cross_section: Option<CrossSection>,
    },
    Trough(ContainerState),
    Tube(ContainerState),
    Container(ContainerState),
    TipSpot(TipState),
    Trash,
    LiquidHandler,
}

impl ResourceKind {
    /// Build the kind for `type_tag`, consuming the fields it understands from
    /// `fields`.  Whatever is left over is preserved on the node by the caller.
    pub fn from_fields(
        type_tag: &str,
        resource: &str,
        fields: &mut Map<String, Value>,
    ) -> Result<Self, LoadError> {
        let kind = match type_tag {
            "Deck" => ResourceKind::Deck(DeckKind::Plain),
            "HamiltonSTARDeck" | "HamiltonDeck" => {
                // The trash flags only matter to the protocol side; the trash
                // itself arrives as a regular child.
                take::<bool>(fields, "with_trash", resource)?;
                take::<bool>(fields, "with_trash96", resource)?;
                ResourceKind::Deck(DeckKind::HamiltonStar {
                    num_rails: take(fields, "num_rails", resource)?.unwrap_or(0),
                })
            }
            "VantageDeck" => {
                ResourceKind::Deck(DeckKind::vantage(take(fields, "size", resource)?.unwrap_or(1.3)))
            }
            "OTDeck" => {
                take::<bool>(fields, "with_trash", resource)?;
                ResourceKind::Deck(DeckKind::Ot)
            }
            "Carrier" => ResourceKind::Carrier(CarrierKind::Generic),
            "PlateCarrier" => ResourceKind::Carrier(CarrierKind::Plate),
            "TipCarrier" => ResourceKind::Carrier(CarrierKind::Tip),
            "TroughCarrier" => ResourceKind::Carrier(CarrierKind::Trough),
            "TubeCarrier" => ResourceKind::Carrier(CarrierKind::Tube),
            "MFXCarrier" => ResourceKind::Carrier(CarrierKind::Mfx),
            "ResourceHolder" | "PlateHolder" => ResourceKind::Holder {
                kind: if type_tag == "PlateHolder" {
                    HolderKind::Plate
                } else {
                    HolderKind::Resource
                },
                spot: take(fields, "spot", resource)?.unwrap_or(Value::Null),
            },
            "Plate" => ResourceKind::Plate(take_grid(fields, resource)?),
            "TipRack" => ResourceKind::TipRack(take_grid(fields, resource)?),
            "TubeRack" => ResourceKind::TubeRack(take_grid(fields, resource)?),
            "Well" => ResourceKind::Well {
                container: take_container(fields, resource)?,
                cross_section: take::<String>(fields, "cross_section_type", resource)?
                    .map(|s| CrossSection::parse(&s)),
            },
            "Trough" => ResourceKind::Trough(take_container(fields, resource)?),
            "Tube" => ResourceKind::Tube(take_container(fields, resource)?),
            "Container" => ResourceKind::Container(take_container(fields, resource)?),
            "TipSpot" => ResourceKind::TipSpot(TipState {
                has_tip: false,
                prototype_tip: take(fields, "prototype_tip", resource)?.unwrap_or(Value::Null),
            }),
            "Trash" => ResourceKind::Trash,
            "LiquidHandler" => ResourceKind::LiquidHandler,
            other => {
                tracing::debug!("unknown resource type `{other}` for {resource}; using a plain box");
                ResourceKind::Generic {
                    type_name: other.to_string(),
                }
            }
        };
        Ok(kind)
    }

    /// Write the kind-specific export fields.
    pub fn write_fields(&self, out: &mut Map<String, Value>) {
        match self {
            ResourceKind::Deck(DeckKind::HamiltonStar { num_rails }) => {
                out.insert("num_rails".into(), Value::from(*num_rails));
                out.insert("with_trash".into(), Value::Bool(false));
                out.insert("with_trash96".into(), Value::Bool(false));
            }
            ResourceKind::Deck(DeckKind::Vantage { size, .. }) => {
                out.insert("size".into(), Value::from(*size));
            }
            ResourceKind::Deck(DeckKind::Ot) => {
                out.insert("with_trash".into(), Value::Bool(false));
            }
            ResourceKind::Holder { spot, .. } => {
                out.insert("spot".into(), spot.clone());
            }
            ResourceKind::Plate(grid) | ResourceKind::TipRack(grid) | ResourceKind::TubeRack(grid) => {
                out.insert("num_items_x".into(), Value::from(grid.num_items_x));
                out.insert("num_items_y".into(), Value::from(grid.num_items_y));
            }
            ResourceKind::Well {
                container,
                cross_section,
            } => {
                out.insert("max_volume".into(), volume_value(container.max_volume));
                if let Some(cs) = cross_section {
                    out.insert("cross_section_type".into(), Value::from(cs.as_str()));
                }
            }
            ResourceKind::Trough(c) | ResourceKind::Tube(c) | ResourceKind::Container(c) => {
                out.insert("max_volume".into(), volume_value(c.max_volume));
            }
            ResourceKind::TipSpot(tip) => {
                out.insert("prototype_tip".into(), tip.prototype_tip.clone());
            }
            ResourceKind::Generic { .. }
            | ResourceKind::Deck(DeckKind::Plain)
            | ResourceKind::Carrier(_)
            | ResourceKind::Trash
            | ResourceKind::LiquidHandler => {}
        }
    }

    /// Type tag used in the JSON description.
    pub fn type_name(&self) -> &str {
        match self {
            ResourceKind::Generic { type_name } => type_name,
            ResourceKind::Deck(deck) => deck.type_name(),
            ResourceKind::Carrier(c) => match c {
                CarrierKind::Generic => "Carrier",
                CarrierKind::Plate => "PlateCarrier",
                CarrierKind::Tip => "TipCarrier",
                CarrierKind::Trough => "TroughCarrier",
                CarrierKind::Tube => "TubeCarrier",
                CarrierKind::Mfx => "MFXCarrier",
            },
            ResourceKind::Holder { kind: HolderKind::Resource, .. } => "ResourceHolder",
            ResourceKind::Holder { kind: HolderKind::Plate, .. } => "PlateHolder",
            ResourceKind::Plate(_) => "Plate",
            ResourceKind::TipRack(_) => "TipRack",
            ResourceKind::TubeRack(_) => "TubeRack",
            ResourceKind::Well { .. } => "Well",
            ResourceKind::Trough(_) => "Trough",
            ResourceKind::Tube(_) => "Tube",
            ResourceKind::Container(_) => "Container",
            ResourceKind::TipSpot(_) => "TipSpot",
            ResourceKind::Trash => "Trash",
            ResourceKind::LiquidHandler => "LiquidHandler",
        }
    }

    /// Grid dimensions plus the token used in derived child names.
    pub fn grid(&self) -> Option<(Grid, &'static str)> {
        match self {
            ResourceKind::Plate(g) => Some((*g, "well")),
            ResourceKind::TipRack(g) => Some((*g, "tipspot")),
            ResourceKind::TubeRack(g) => Some((*g, "tube")),
            _ => None,
        }
    }

    pub fn container(&self) -> Option<&ContainerState> {
        match self {
            ResourceKind::Well { container, .. }
            | ResourceKind::Trough(container)
            | ResourceKind::Tube(container)
            | ResourceKind::Container(container) => Some(container),
            _ => None,
        }
    }

    pub fn container_mut(&mut self) -> Option<&mut ContainerState> {
        match self {
            ResourceKind::Well { container, .. }
            | ResourceKind::Trough(container)
            | ResourceKind::Tube(container)
            | ResourceKind::Container(container) => Some(container),
            _ => None,
        }
    }

    pub fn tip_state(&self) -> Option<&TipState> {
        match self {
            ResourceKind::TipSpot(tip) => Some(tip),
            _ => None,
        }
    }

    pub fn tip_state_mut(&mut self) -> Option<&mut TipState> {
        match self {
            ResourceKind::TipSpot(tip) => Some(tip),
            _ => None,
        }
    }

    pub fn is_deck(&self) -> bool {
        matches!(self, ResourceKind::Deck(_))
    }

    pub fn deck(&self) -> Option<&DeckKind> {
        match self {
            ResourceKind::Deck(deck) => Some(deck),
            _ => None,
        }
    }

    /// Parts that are fixed to their parent never move on their own.
    fn is_fixed(&self) -> bool {
        matches!(
            self,
            ResourceKind::Deck(_)
                | ResourceKind::Holder { .. }
                | ResourceKind::Well { .. }
                | ResourceKind::TipSpot(_)
                | ResourceKind::Tube(_)
        )
    }

    pub fn draggable(&self, mode: ViewMode) -> bool {
        mode == ViewMode::Gui && !self.is_fixed()
    }

    pub fn deletable(&self, mode: ViewMode) -> bool {
        mode == ViewMode::Gui && !self.is_fixed()
    }
}

// ───────────────────────────────────────── field helpers ─────

fn take<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    field: &'static str,
    resource: &str,
) -> Result<Option<T>, LoadError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| LoadError::Field {
                resource: resource.to_string(),
                field,
                source,
            }),
    }
}

fn take_grid(fields: &mut Map<String, Value>, resource: &str) -> Result<Grid, LoadError> {
    Ok(Grid {
        num_items_x: take(fields, "num_items_x", resource)?.unwrap_or(0),
        num_items_y: take(fields, "num_items_y", resource)?.unwrap_or(0),
    })
}

fn take_container(fields: &mut Map<String, Value>, resource: &str) -> Result<ContainerState, LoadError> {
    // A missing capacity means the protocol side does not track it.
    let max_volume = take(fields, "max_volume", resource)?.unwrap_or(f64::INFINITY);
    let liquids: Vec<Liquid> = take(fields, "liquids", resource)?.unwrap_or_default();
    ContainerState::with_liquids(max_volume, liquids).map_err(|source| LoadError::Volume {
        resource: resource.to_string(),
        source,
    })
}

/// JSON has no infinity; unbounded capacity exports as `null`.
fn volume_value(volume: f64) -> Value {
    if volume.is_finite() {
        Value::from(volume)
    } else {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn plate_consumes_grid_fields() {
        let mut f = fields(json!({"num_items_x": 12, "num_items_y": 8, "model": "Cor_96"}));
        let kind = ResourceKind::from_fields("Plate", "p", &mut f).unwrap();
        assert_eq!(kind.grid(), Some((Grid { num_items_x: 12, num_items_y: 8 }, "well")));
        assert_eq!(f.len(), 1);
        assert!(f.contains_key("model"));
    }

    #[test]
    fn unknown_type_degrades_to_generic() {
        let mut f = Map::new();
        let kind = ResourceKind::from_fields("PetriDish", "dish", &mut f).unwrap();
        assert_eq!(kind.type_name(), "PetriDish");
        assert!(kind.container().is_none());
    }

    #[test]
    fn malformed_field_is_an_error() {
        let mut f = fields(json!({"num_items_x": "twelve"}));
        let err = ResourceKind::from_fields("Plate", "p", &mut f).unwrap_err();
        assert!(matches!(err, LoadError::Field { field: "num_items_x", .. }));
    }

    #[test]
    fn unknown_cross_section_is_kept_for_export() {
        let mut f = fields(json!({"max_volume": 50, "cross_section_type": "hexagon"}));
        let kind = ResourceKind::from_fields("Well", "w", &mut f).unwrap();
        assert!(matches!(
            &kind,
            ResourceKind::Well { cross_section: Some(CrossSection::Other(tag)), .. } if tag == "hexagon"
        ));
        let mut out = Map::new();
        kind.write_fields(&mut out);
        assert_eq!(out["cross_section_type"], "hexagon");
    }

    #[test]
    fn permissions_follow_mode() {
        let plate = ResourceKind::Plate(Grid::default());
        let well = ResourceKind::Well {
            container: ContainerState::new(100.0),
            cross_section: None,
        };
        assert!(!plate.draggable(ViewMode::Visualizer));
        assert!(plate.draggable(ViewMode::Gui));
        assert!(!well.draggable(ViewMode::Gui));
        assert!(!well.deletable(ViewMode::Gui));
    }

    #[test]
    fn tip_state_keeps_prototype() {
        let mut tip = TipState {
            has_tip: false,
            prototype_tip: json!({"type": "HamiltonTip"}),
        };
        tip.set_tip(json!({"type": "Other"}));
        assert!(tip.has_tip);
        assert_eq!(tip.prototype_tip, json!({"type": "HamiltonTip"}));
        tip.set_tip(Value::Null);
        assert!(!tip.has_tip);
    }
}
