//! Fedrecon Core - Interaction Reconciliation Engine
//!
//! This library verifies that a simulated participant announces the
//! detonation interactions a federation agreement document (FAD) says it
//! must, by:
//! 1. **Session Manager**: bus bring-up/tear-down and interaction bindings
//! 2. **Wire Codec**: detonation records <-> parameter/byte-array wire form
//! 3. **Observation Collector**: keyed accumulation of decoded interactions
//! 4. **Reconciliation Comparator**: reference vs. observed -> verdict

pub mod detonation;
pub mod codec;
pub mod session;
pub mod collector;
pub mod reconcile;

// Re-export key types for convenience
pub use detonation::{ArticulatedPart, DetonationRecord, EntityIdentifier, EventIdentifier};
pub use collector::{ObservationCollector, ObservedSet};
pub use reconcile::{reconcile, SpatialToleranceConfig, Verdict, VerdictStatus};
pub use session::{InteractionBinding, SessionError, SessionHandle, SessionManager};
