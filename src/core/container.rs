//! Liquid-bearing state shared by wells, troughs, tubes and plain containers.

use serde::{Deserialize, Serialize};

use super::error::VolumeError;

// ───────────────────────────────────────── liquid ────────────

/// One layer of liquid in a container.  Layers are ordered bottom-up, so the
/// last entry is the top of the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Liquid {
    /// Liquid identifier; `None` when the protocol did not name it.
    pub name: Option<String>,
    pub volume: f64,
}

impl Liquid {
    pub fn new(name: impl Into<String>, volume: f64) -> Self {
        Self {
            name: Some(name.into()),
            volume,
        }
    }

    pub fn unnamed(volume: f64) -> Self {
        Self { name: None, volume }
    }
}

/// Wire forms accepted for a liquid entry: `["water", 50.0]` or
/// `{"name": "water", "volume": 50.0}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum LiquidRepr {
    Pair(Option<String>, f64),
    Object { name: Option<String>, volume: f64 },
}

impl<'de> Deserialize<'de> for Liquid {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        Ok(match LiquidRepr::deserialize(de)? {
            LiquidRepr::Pair(name, volume) | LiquidRepr::Object { name, volume } => {
                Liquid { name, volume }
            }
        })
    }
}

impl Serialize for Liquid {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        (&self.name, self.volume).serialize(ser)
    }
}

// ───────────────────────────────────────── container ─────────

/// Liquid list plus capacity.  The sum of volumes never exceeds
/// `max_volume`; every mutator validates before touching the list.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerState {
    pub max_volume: f64,
    liquids: Vec<Liquid>,
}

impl ContainerState {
    pub fn new(max_volume: f64) -> Self {
        Self {
            max_volume,
            liquids: Vec::new(),
        }
    }

    pub fn with_liquids(max_volume: f64, liquids: Vec<Liquid>) -> Result<Self, VolumeError> {
        let mut state = Self::new(max_volume);
        state.set_liquids(liquids)?;
        Ok(state)
    }

    pub fn liquids(&self) -> &[Liquid] {
        &self.liquids
    }

    /// Total volume over all layers.
    pub fn volume(&self) -> f64 {
        self.liquids.iter().map(|l| l.volume).sum()
    }

    /// Fraction of capacity in use, in `0.0..=1.0`.
    pub fn fill_ratio(&self) -> f64 {
        if self.max_volume <= 0.0 || !self.max_volume.is_finite() {
            return 0.0;
        }
        (self.volume() / self.max_volume).clamp(0.0, 1.0)
    }

    /// Name of the layer with the largest volume (first one on ties).
    pub fn predominant_liquid(&self) -> Option<&Liquid> {
        let mut best: Option<&Liquid> = None;
        for liquid in &self.liquids {
            if best.map_or(true, |b| liquid.volume > b.volume) {
                best = Some(liquid);
            }
        }
        best
    }

    /// Remove `volume` from the top of the stack downwards.
    pub fn aspirate(&mut self, volume: f64) -> Result<(), VolumeError> {
        check_volume(volume)?;
        let available = self.volume();
        if volume > available {
            return Err(VolumeError::InsufficientVolume {
                requested: volume,
                available,
            });
        }

        let mut remaining = volume;
        while remaining > 0.0 {
            let Some(top) = self.liquids.last_mut() else {
                break;
            };
            if remaining >= top.volume {
                remaining -= top.volume;
                self.liquids.pop();
            } else {
                top.volume -= remaining;
                remaining = 0.0;
            }
        }
        Ok(())
    }

    /// Add a layer on top of the stack.
    pub fn dispense(&mut self, liquid: Liquid) -> Result<(), VolumeError> {
        check_volume(liquid.volume)?;
        let total = self.volume() + liquid.volume;
        if total > self.max_volume {
            return Err(VolumeError::CapacityExceeded {
                requested: total,
                capacity: self.max_volume,
            });
        }
        self.liquids.push(liquid);
        Ok(())
    }

    /// Replace the whole liquid list.
    pub fn set_liquids(&mut self, liquids: Vec<Liquid>) -> Result<(), VolumeError> {
        let mut total = 0.0;
        for liquid in &liquids {
            check_volume(liquid.volume)?;
            total += liquid.volume;
        }
        if total > self.max_volume {
            return Err(VolumeError::CapacityExceeded {
                requested: total,
                capacity: self.max_volume,
            });
        }
        self.liquids = liquids;
        Ok(())
    }
}

fn check_volume(volume: f64) -> Result<(), VolumeError> {
    if volume.is_nan() || volume < 0.0 {
        return Err(VolumeError::InvalidVolume(volume));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layers() -> ContainerState {
        ContainerState::with_liquids(100.0, vec![Liquid::new("A", 50.0), Liquid::new("B", 30.0)])
            .unwrap()
    }

    #[test]
    fn aspirate_removes_top_down() {
        let mut c = two_layers();
        c.aspirate(60.0).unwrap();
        assert_eq!(c.volume(), 20.0);
        assert_eq!(c.liquids(), &[Liquid::new("A", 20.0)]);
    }

    #[test]
    fn aspirate_partial_top_layer() {
        let mut c = two_layers();
        c.aspirate(10.0).unwrap();
        assert_eq!(c.liquids(), &[Liquid::new("A", 50.0), Liquid::new("B", 20.0)]);
    }

    #[test]
    fn aspirate_everything_empties() {
        let mut c = two_layers();
        c.aspirate(80.0).unwrap();
        assert!(c.liquids().is_empty());
    }

    #[test]
    fn aspirate_too_much_is_rejected_without_change() {
        let mut c = two_layers();
        let err = c.aspirate(81.0).unwrap_err();
        assert_eq!(
            err,
            VolumeError::InsufficientVolume {
                requested: 81.0,
                available: 80.0
            }
        );
        assert_eq!(c, two_layers());
    }

    #[test]
    fn dispense_respects_capacity() {
        let mut c = two_layers();
        assert!(c.dispense(Liquid::new("C", 20.0)).is_ok());
        assert!(matches!(
            c.dispense(Liquid::new("C", 0.5)),
            Err(VolumeError::CapacityExceeded { .. })
        ));
        assert_eq!(c.volume(), 100.0);
    }

    #[test]
    fn negative_volumes_are_invalid() {
        let mut c = two_layers();
        assert_eq!(c.aspirate(-1.0), Err(VolumeError::InvalidVolume(-1.0)));
        assert!(c.set_liquids(vec![Liquid::unnamed(-2.0)]).is_err());
        assert_eq!(c, two_layers());
    }

    #[test]
    fn predominant_prefers_first_on_ties() {
        let c = ContainerState::with_liquids(
            100.0,
            vec![Liquid::new("A", 10.0), Liquid::new("B", 10.0)],
        )
        .unwrap();
        assert_eq!(c.predominant_liquid().and_then(|l| l.name.as_deref()), Some("A"));
    }

    #[test]
    fn liquid_accepts_pair_and_object_forms() {
        let pair: Liquid = serde_json::from_str(r#"["water", 12.5]"#).unwrap();
        let object: Liquid = serde_json::from_str(r#"{"name": "water", "volume": 12.5}"#).unwrap();
        let unnamed: Liquid = serde_json::from_str(r#"[null, 3]"#).unwrap();
        assert_eq!(pair, object);
        assert_eq!(unnamed, Liquid::unnamed(3.0));
        assert_eq!(serde_json::to_string(&pair).unwrap(), r#"["water",12.5]"#);
    }
}
