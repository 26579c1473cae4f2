//! Detonation event data model.
//!
//! A [`DetonationRecord`] is one discrete detonation event, either parsed
//! from the federation agreement document or decoded from a wire payload.
//! Records are immutable once constructed; the event identifier is the
//! sole join key between reference and observed sets.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Globally unique key for one detonation event.
///
/// Combines the originating site, the issuing application and the event
/// sequence number, DIS-style.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EventIdentifier {
    pub site: u16,
    pub application: u16,
    pub number: u16,
}

impl EventIdentifier {
    /// Creates an event identifier from its components.
    pub fn new(site: u16, application: u16, number: u16) -> Self {
        Self {
            site,
            application,
            number,
        }
    }
}

impl std::fmt::Display for EventIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.site, self.application, self.number)
    }
}

/// Opaque identifier of a simulated entity (firing object, target, munition).
///
/// The all-zero identifier means "no entity"; targets and munitions may
/// legitimately be absent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EntityIdentifier {
    pub site: u16,
    pub application: u16,
    pub entity: u16,
}

impl EntityIdentifier {
    /// Creates an entity identifier from its components.
    pub fn new(site: u16, application: u16, entity: u16) -> Self {
        Self {
            site,
            application,
            entity,
        }
    }

    /// The "no entity" identifier.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if this is the "no entity" identifier.
    pub fn is_none(&self) -> bool {
        self.site == 0 && self.application == 0 && self.entity == 0
    }
}

impl std::fmt::Display for EntityIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.site, self.application, self.entity)
    }
}

/// Enumerated kind descriptor for a munition (DIS entity type record).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EntityTypeCode {
    pub kind: u8,
    pub domain: u8,
    pub country: u16,
    pub category: u8,
    pub subcategory: u8,
    pub specific: u8,
    pub extra: u8,
}

impl std::fmt::Display for EntityTypeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}.{}",
            self.kind,
            self.domain,
            self.country,
            self.category,
            self.subcategory,
            self.specific,
            self.extra
        )
    }
}

/// Result code announced with a detonation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetonationResult {
    /// No result / other.
    None,
    /// Direct hit on an entity.
    EntityImpact,
    /// Detonation close to an entity.
    EntityProximateDetonation,
    /// Ground impact.
    GroundImpact,
    /// Detonation in the air.
    Detonation,
    /// Munition failed to detonate.
    Dud,
    /// Code outside the enumerated set, preserved losslessly.
    Other(u8),
}

impl DetonationResult {
    /// Maps a wire code to the enumeration.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::EntityImpact,
            2 => Self::EntityProximateDetonation,
            3 => Self::GroundImpact,
            5 => Self::Detonation,
            6 => Self::Dud,
            other => Self::Other(other),
        }
    }

    /// Maps the enumeration back to its wire code.
    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::EntityImpact => 1,
            Self::EntityProximateDetonation => 2,
            Self::GroundImpact => 3,
            Self::Detonation => 5,
            Self::Dud => 6,
            Self::Other(code) => *code,
        }
    }
}

impl Default for DetonationResult {
    fn default() -> Self {
        Self::None
    }
}

/// One articulated part state attached to a detonation.
///
/// Sequences of these compare order-insensitively; the value compares
/// bit-exact (no tolerance).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArticulatedPart {
    /// Identifier of the part on the munition.
    pub part_id: u16,
    /// Parameter type designator for the value.
    pub parameter_type: u32,
    /// Parameter value.
    pub value: f64,
}

impl ArticulatedPart {
    /// Creates an articulated part triple.
    pub fn new(part_id: u16, parameter_type: u32, value: f64) -> Self {
        Self {
            part_id,
            parameter_type,
            value,
        }
    }

    /// Sort key for order-insensitive multiset comparison.
    pub(crate) fn sort_key(&self) -> (u16, u32, u64) {
        (self.part_id, self.parameter_type, self.value.to_bits())
    }
}

/// One detonation event as announced on the interaction bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetonationRecord {
    /// Sole join key between reference and observed records.
    pub event_id: EventIdentifier,
    /// Entity that fired the munition.
    pub firing_object: EntityIdentifier,
    /// Intended target; may be none.
    pub target_object: EntityIdentifier,
    /// The munition entity itself; may be none.
    pub munition_object: EntityIdentifier,
    /// Munition kind descriptor.
    pub munition_type: EntityTypeCode,
    /// Warhead enumeration code.
    pub warhead_type: u16,
    /// Fuse enumeration code.
    pub fuse_type: u16,
    /// Rounds represented by this detonation.
    pub quantity_fired: u16,
    /// Rounds per minute.
    pub rate_of_fire: u16,
    /// Announced detonation outcome.
    pub result: DetonationResult,
    /// World-frame detonation coordinate.
    pub detonation_location: Vector3<f64>,
    /// Detonation coordinate relative to the target.
    pub relative_location: Vector3<f32>,
    /// Munition velocity at detonation.
    pub final_velocity: Vector3<f32>,
    /// Articulated part states; order-insensitive for comparison.
    pub articulated_parts: Vec<ArticulatedPart>,
}

impl DetonationRecord {
    /// Returns the articulated parts sorted for multiset comparison.
    pub(crate) fn sorted_parts(&self) -> Vec<ArticulatedPart> {
        let mut parts = self.articulated_parts.clone();
        parts.sort_by_key(ArticulatedPart::sort_key);
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_identifier_display() {
        assert_eq!(EventIdentifier::new(1, 2, 37).to_string(), "1.2.37");
    }

    #[test]
    fn test_entity_identifier_none() {
        assert!(EntityIdentifier::none().is_none());
        assert!(!EntityIdentifier::new(1, 1, 5).is_none());
    }

    #[test]
    fn test_detonation_result_roundtrip() {
        for code in 0..=u8::MAX {
            assert_eq!(DetonationResult::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_articulated_part_sort_key_orders_by_value_bits() {
        let a = ArticulatedPart::new(1, 4, 0.25);
        let b = ArticulatedPart::new(1, 4, 0.5);
        assert!(a.sort_key() < b.sort_key());
    }
}
