//! Common types for the bus abstraction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque handle for a resolved interaction class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InteractionClassHandle(pub u64);

/// Opaque handle for a resolved parameter of an interaction class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterHandle(pub u64);

/// Raw wire representation of one interaction instance: resolved parameter
/// handles mapped to opaque byte payloads. Decoding the payloads is the
/// codec's job, not the bus's.
pub type ParameterMap = HashMap<ParameterHandle, Vec<u8>>;

/// Describes how to reach the bus relay.
///
/// For a real RTI this is the local settings designator; for the loopback
/// bus any non-empty designator is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Relay settings designator (e.g. "crcAddress=localhost:8989").
    pub designator: String,
}

impl EndpointDescriptor {
    /// Creates an endpoint descriptor from a settings designator.
    pub fn new(designator: impl Into<String>) -> Self {
        Self {
            designator: designator.into(),
        }
    }
}

/// One object model module supplied when creating or joining a federation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FomModule {
    /// Module designator (file name or logical module name).
    pub name: String,
}

impl FomModule {
    /// Creates a module descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Identity granted by the bus after a successful join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederateIdentity {
    /// The federate name actually granted (may carry a collision suffix).
    pub name: String,
    /// The federation execution that was joined.
    pub federation: String,
}

impl std::fmt::Display for FederateIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.federation)
    }
}
