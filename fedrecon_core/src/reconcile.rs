//! Reference-vs-observed reconciliation.
//!
//! [`reconcile`] is a pure mapping from the reference record sequence, the
//! observed set and a tolerance configuration to a [`Verdict`]. Checks run
//! in three diagnosable phases per record: identity (join on event
//! identifier), parameters (exact equality), spatial (Euclidean distance
//! within tolerance). A failed final-velocity check is downgraded to a
//! warning and never affects the verdict; this mirrors the upstream test
//! suite, which attributes such mismatches to coordinate-frame noise
//! between representations rather than to the system under test.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::collector::ObservedSet;
use crate::detonation::{DetonationRecord, EventIdentifier};

/// Named spatial tolerance thresholds, in meters (and meters/second for
/// velocity). Loaded from external configuration; never mutated here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialToleranceConfig {
    /// Allowed world-frame detonation location deviation.
    #[serde(rename = "worldLocation")]
    pub world_location: f64,
    /// Allowed target-relative detonation location deviation.
    #[serde(rename = "relativePosition")]
    pub relative_location: f64,
    /// Allowed final velocity deviation.
    #[serde(rename = "velocity")]
    pub velocity: f64,
}

impl SpatialToleranceConfig {
    /// Creates a tolerance configuration from the three thresholds.
    pub fn new(world_location: f64, relative_location: f64, velocity: f64) -> Self {
        Self {
            world_location,
            relative_location,
            velocity,
        }
    }
}

/// Overall outcome of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    /// Sizes match and every reference record matched.
    Passed,
    /// At least one mismatch; see the per-record outcomes and diagnostics.
    Failed,
    /// The run could not be meaningfully evaluated (empty observed set).
    Inconclusive,
}

/// Per-reference-record reconciliation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    /// Identity, parameters and spatial checks all passed.
    Matched,
    /// No observed record carries this event identifier.
    IdentityMissing,
    /// Identity matched but a descriptive parameter differs.
    ParameterMismatch { fields: Vec<String> },
    /// Parameters matched but a toleranced spatial field is out of range.
    SpatialMismatch { fields: Vec<String> },
}

/// Outcome for one reference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReport {
    pub event_id: EventIdentifier,
    pub outcome: RecordOutcome,
}

/// Result of one reconciliation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    /// Populated when the status is `Inconclusive`.
    pub inconclusive_reason: Option<String>,
    /// One report per reference record, in input order.
    pub records: Vec<RecordReport>,
    /// Human-readable trail of every mismatch found.
    pub diagnostics: Vec<String>,
    /// Downgraded findings that do not affect the status.
    pub warnings: Vec<String>,
}

impl Verdict {
    /// Returns true iff the run passed.
    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Passed
    }

    fn inconclusive(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            status: VerdictStatus::Inconclusive,
            inconclusive_reason: Some(reason.clone()),
            records: Vec::new(),
            diagnostics: vec![reason],
            warnings: Vec::new(),
        }
    }
}

fn distance_f64(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (a - b).norm()
}

fn distance_f32(a: &Vector3<f32>, b: &Vector3<f32>) -> f64 {
    (a.map(f64::from) - b.map(f64::from)).norm()
}

/// Inclusive tolerance rule: a deviation exactly at the threshold passes.
fn within(distance: f64, tolerance: f64) -> bool {
    distance <= tolerance
}

/// Exact-equality check over the descriptive (non-spatial) parameters.
/// Returns the names of every mismatching field.
fn parameter_mismatches(reference: &DetonationRecord, observed: &DetonationRecord) -> Vec<String> {
    let mut fields = Vec::new();
    if reference.firing_object != observed.firing_object {
        fields.push("FiringObjectIdentifier".to_string());
    }
    if reference.target_object != observed.target_object {
        fields.push("TargetObjectIdentifier".to_string());
    }
    if reference.munition_object != observed.munition_object {
        fields.push("MunitionObjectIdentifier".to_string());
    }
    if reference.munition_type != observed.munition_type {
        fields.push("MunitionType".to_string());
    }
    if reference.warhead_type != observed.warhead_type {
        fields.push("WarheadType".to_string());
    }
    if reference.fuse_type != observed.fuse_type {
        fields.push("FuseType".to_string());
    }
    if reference.quantity_fired != observed.quantity_fired {
        fields.push("QuantityFired".to_string());
    }
    if reference.rate_of_fire != observed.rate_of_fire {
        fields.push("RateOfFire".to_string());
    }
    if reference.result != observed.result {
        fields.push("DetonationResultCode".to_string());
    }
    if reference.sorted_parts() != observed.sorted_parts() {
        fields.push("ArticulatedPartData".to_string());
    }
    fields
}

/// Reconciles the reference records against the observed set.
///
/// Pure: identical inputs always produce an identical verdict. A size
/// mismatch fails the run but never short-circuits the per-record checks,
/// so one run yields the complete diagnostic picture.
pub fn reconcile(
    reference: &[DetonationRecord],
    observed: &ObservedSet,
    tolerance: &SpatialToleranceConfig,
) -> Verdict {
    if observed.is_empty() {
        return Verdict::inconclusive(
            "No detonation interactions were observed on the bus. A system under test \
             must announce discoverable detonation interactions before the run can be evaluated.",
        );
    }

    let mut diagnostics = Vec::new();
    let mut warnings = Vec::new();
    let mut failed = false;

    if reference.len() != observed.len() {
        failed = true;
        diagnostics.push(format!(
            "FAIL: reference and observed detonation counts do not match: {} | {}",
            reference.len(),
            observed.len()
        ));
    }

    let mut records = Vec::with_capacity(reference.len());
    for reference_record in reference {
        let event_id = reference_record.event_id;
        let outcome = match observed.get(&event_id) {
            None => {
                diagnostics.push(format!(
                    "FAIL: reference detonation {} found no match among observed interactions",
                    event_id
                ));
                RecordOutcome::IdentityMissing
            }
            Some(observed_record) => {
                let mismatched = parameter_mismatches(reference_record, observed_record);
                if !mismatched.is_empty() {
                    diagnostics.push(format!(
                        "FAIL: detonation {} parameter mismatch: {}",
                        event_id,
                        mismatched.join(", ")
                    ));
                    RecordOutcome::ParameterMismatch { fields: mismatched }
                } else {
                    let mut spatial_fields = Vec::new();

                    let world_distance = distance_f64(
                        &reference_record.detonation_location,
                        &observed_record.detonation_location,
                    );
                    if !within(world_distance, tolerance.world_location) {
                        spatial_fields.push("DetonationLocation".to_string());
                        diagnostics.push(format!(
                            "FAIL: detonation {} world location deviates {:.3} m (allowed {:.3})",
                            event_id, world_distance, tolerance.world_location
                        ));
                    }

                    let relative_distance = distance_f32(
                        &reference_record.relative_location,
                        &observed_record.relative_location,
                    );
                    if !within(relative_distance, tolerance.relative_location) {
                        spatial_fields.push("RelativeDetonationLocation".to_string());
                        diagnostics.push(format!(
                            "FAIL: detonation {} relative location deviates {:.3} m (allowed {:.3})",
                            event_id, relative_distance, tolerance.relative_location
                        ));
                    }

                    // The velocity check runs, but a failure is downgraded:
                    // it never contributes to the verdict.
                    let velocity_distance = distance_f32(
                        &reference_record.final_velocity,
                        &observed_record.final_velocity,
                    );
                    if !within(velocity_distance, tolerance.velocity) {
                        warnings.push(format!(
                            "WARNING: detonation {} final velocity deviates {:.3} m/s \
                             (allowed {:.3}); downgraded, does not affect the verdict",
                            event_id, velocity_distance, tolerance.velocity
                        ));
                    }

                    if spatial_fields.is_empty() {
                        diagnostics.push(format!(
                            "OKAY: detonation {} matched identity, parameters and spatial checks",
                            event_id
                        ));
                        RecordOutcome::Matched
                    } else {
                        RecordOutcome::SpatialMismatch {
                            fields: spatial_fields,
                        }
                    }
                }
            }
        };

        if outcome != RecordOutcome::Matched {
            failed = true;
        }
        records.push(RecordReport { event_id, outcome });
    }

    Verdict {
        status: if failed {
            VerdictStatus::Failed
        } else {
            VerdictStatus::Passed
        },
        inconclusive_reason: None,
        records,
        diagnostics,
        warnings,
    }
}
