//! Passive accumulation of observed detonation interactions.
//!
//! The collector sits on the bus dispatch path: every inbound interaction
//! is type-checked against the bound detonation class, decoded, and folded
//! into an [`ObservedSet`] keyed by event identifier. A malformed message
//! is logged and dropped without aborting collection.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use fedrecon_env::{InteractionClassHandle, InteractionSink, ParameterMap};

use crate::codec::{self, EncodedInteraction};
use crate::detonation::{DetonationRecord, EventIdentifier};
use crate::session::InteractionBinding;

/// Observed detonation records keyed by event identifier.
///
/// Backed by a `BTreeMap` so iteration order is deterministic. Inserts are
/// first-seen-wins: later duplicates for the same key are dropped, not
/// merged.
#[derive(Debug, Clone, Default)]
pub struct ObservedSet {
    records: BTreeMap<EventIdentifier, DetonationRecord>,
}

impl ObservedSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record unless its event identifier is already present.
    /// Returns true if the record was retained.
    pub fn insert_first(&mut self, record: DetonationRecord) -> bool {
        match self.records.entry(record.event_id) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Looks up the record for an event identifier.
    pub fn get(&self, event_id: &EventIdentifier) -> Option<&DetonationRecord> {
        self.records.get(event_id)
    }

    /// Number of distinct observed events.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in event-identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&EventIdentifier, &DetonationRecord)> {
        self.records.iter()
    }
}

impl FromIterator<DetonationRecord> for ObservedSet {
    fn from_iter<I: IntoIterator<Item = DetonationRecord>>(iter: I) -> Self {
        let mut set = Self::new();
        for record in iter {
            set.insert_first(record);
        }
        set
    }
}

/// Accumulates decoded detonation interactions from the bus dispatch.
///
/// Registered as the session's [`InteractionSink`] at connect time, before
/// the interaction type can be resolved; traffic arriving before [`bind`]
/// is ignored. The internal set is mutex-guarded since the host bus does
/// not guarantee a single dispatch thread.
///
/// [`bind`]: ObservationCollector::bind
#[derive(Default)]
pub struct ObservationCollector {
    binding: Mutex<Option<InteractionBinding>>,
    observed: Mutex<ObservedSet>,
}

impl ObservationCollector {
    /// Creates an unbound collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the detonation interaction binding to collect against.
    pub fn bind(&self, binding: InteractionBinding) {
        *self.binding.lock().unwrap() = Some(binding);
    }

    /// Returns a point-in-time copy of the accumulated set.
    pub fn snapshot(&self) -> ObservedSet {
        self.observed.lock().unwrap().clone()
    }

    /// Number of distinct events accumulated so far.
    pub fn observed_count(&self) -> usize {
        self.observed.lock().unwrap().len()
    }
}

fn translate(binding: &InteractionBinding, parameters: &ParameterMap) -> EncodedInteraction {
    let mut named = EncodedInteraction::with_capacity(parameters.len());
    for (handle, payload) in parameters {
        if let Some(name) = binding.name_of(*handle) {
            named.insert(name.to_string(), payload.clone());
        }
    }
    named
}

impl InteractionSink for ObservationCollector {
    fn receive_interaction(&self, class: InteractionClassHandle, parameters: &ParameterMap) {
        let named = {
            let guard = self.binding.lock().unwrap();
            match guard.as_ref() {
                // Foreign interaction types (and traffic before binding)
                // are ignored, not errored.
                Some(binding) if binding.class() == class => translate(binding, parameters),
                _ => return,
            }
        };
        match codec::decode(&named) {
            Ok(record) => {
                let event_id = record.event_id;
                let retained = self.observed.lock().unwrap().insert_first(record);
                if retained {
                    debug!("Observed detonation interaction {}", event_id);
                } else {
                    debug!("Dropped duplicate detonation interaction {}", event_id);
                }
            }
            Err(e) => {
                // Per-message failure: discard and keep collecting.
                warn!("Discarding malformed detonation interaction: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::detonation::{
        ArticulatedPart, DetonationResult, EntityIdentifier, EntityTypeCode, EventIdentifier,
    };
    use async_trait::async_trait;
    use fedrecon_env::{
        BusClient, BusError, EndpointDescriptor, FederateIdentity, FomModule, ParameterHandle,
    };
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn record(number: u16, quantity: u16) -> DetonationRecord {
        DetonationRecord {
            event_id: EventIdentifier::new(1, 1, number),
            firing_object: EntityIdentifier::new(1, 1, 10),
            target_object: EntityIdentifier::new(2, 1, 20),
            munition_object: EntityIdentifier::none(),
            munition_type: EntityTypeCode::default(),
            warhead_type: 0,
            fuse_type: 0,
            quantity_fired: quantity,
            rate_of_fire: 0,
            result: DetonationResult::GroundImpact,
            detonation_location: Vector3::new(100.0, 200.0, 300.0),
            relative_location: Vector3::zeros(),
            final_velocity: Vector3::zeros(),
            articulated_parts: vec![ArticulatedPart::new(1, 4096, 1.0)],
        }
    }

    /// Resolves the full detonation parameter table with dense handles.
    struct SchemaOnlyBus;

    #[async_trait]
    impl BusClient for SchemaOnlyBus {
        async fn connect(
            &self,
            _endpoint: &EndpointDescriptor,
            _sink: Arc<dyn InteractionSink>,
        ) -> Result<(), BusError> {
            Ok(())
        }
        async fn create_federation(&self, _n: &str, _m: &[FomModule]) -> Result<(), BusError> {
            Ok(())
        }
        async fn destroy_federation(&self, _n: &str) -> Result<(), BusError> {
            Ok(())
        }
        async fn join(
            &self,
            name: &str,
            _kind: &str,
            federation: &str,
            _m: &[FomModule],
        ) -> Result<FederateIdentity, BusError> {
            Ok(FederateIdentity {
                name: name.to_string(),
                federation: federation.to_string(),
            })
        }
        async fn resign(&self) -> Result<(), BusError> {
            Ok(())
        }
        async fn disconnect(&self) -> Result<(), BusError> {
            Ok(())
        }
        async fn interaction_class_handle(
            &self,
            _name: &str,
        ) -> Result<InteractionClassHandle, BusError> {
            Ok(InteractionClassHandle(7))
        }
        async fn parameter_handle(
            &self,
            _class: InteractionClassHandle,
            name: &str,
        ) -> Result<ParameterHandle, BusError> {
            let index = codec::PARAMETER_NAMES
                .iter()
                .position(|n| *n == name)
                .ok_or_else(|| BusError::UnknownParameter(name.to_string()))?;
            Ok(ParameterHandle(index as u64))
        }
        async fn publish_interaction(&self, _c: InteractionClassHandle) -> Result<(), BusError> {
            Ok(())
        }
        async fn subscribe_interaction(&self, _c: InteractionClassHandle) -> Result<(), BusError> {
            Ok(())
        }
        async fn send_interaction(
            &self,
            _c: InteractionClassHandle,
            _p: &ParameterMap,
        ) -> Result<(), BusError> {
            Ok(())
        }
    }

    async fn bound_collector() -> (ObservationCollector, InteractionBinding) {
        let mut session = crate::session::SessionManager::new(SchemaOnlyBus);
        session
            .connect(&EndpointDescriptor::new("local"), Arc::new(fedrecon_env::NullSink))
            .await
            .unwrap();
        let binding = session
            .bind_interaction_type(codec::INTERACTION_CLASS, &codec::PARAMETER_NAMES)
            .await
            .unwrap();
        let collector = ObservationCollector::new();
        collector.bind(binding.clone());
        (collector, binding)
    }

    fn to_wire(binding: &InteractionBinding, record: &DetonationRecord) -> ParameterMap {
        codec::encode(record)
            .into_iter()
            .map(|(name, payload)| (binding.handle_of(&name).unwrap(), payload))
            .collect()
    }

    #[tokio::test]
    async fn test_first_seen_wins() {
        let (collector, binding) = bound_collector().await;
        let first = record(5, 1);
        let duplicate = record(5, 99);

        collector.receive_interaction(binding.class(), &to_wire(&binding, &first));
        collector.receive_interaction(binding.class(), &to_wire(&binding, &duplicate));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get(&EventIdentifier::new(1, 1, 5)).unwrap().quantity_fired,
            1
        );
    }

    #[tokio::test]
    async fn test_foreign_interaction_type_ignored() {
        let (collector, binding) = bound_collector().await;
        let wire = to_wire(&binding, &record(1, 1));

        collector.receive_interaction(InteractionClassHandle(99), &wire);
        assert!(collector.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_traffic_before_binding_ignored() {
        let (_, binding) = bound_collector().await;
        let unbound = ObservationCollector::new();
        unbound.receive_interaction(binding.class(), &to_wire(&binding, &record(1, 1)));
        assert!(unbound.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_dropped_without_aborting() {
        let (collector, binding) = bound_collector().await;

        let mut wire = to_wire(&binding, &record(1, 1));
        let event_handle = binding.handle_of(codec::EVENT_IDENTIFIER).unwrap();
        wire.insert(event_handle, vec![0, 1]); // truncated
        collector.receive_interaction(binding.class(), &wire);
        assert!(collector.snapshot().is_empty());

        // Collection continues after the bad message.
        collector.receive_interaction(binding.class(), &to_wire(&binding, &record(2, 1)));
        assert_eq!(collector.observed_count(), 1);
    }

    #[test]
    fn test_observed_set_iterates_in_key_order() {
        let set: ObservedSet = vec![record(9, 1), record(2, 1), record(5, 1)]
            .into_iter()
            .collect();
        let numbers: Vec<u16> = set.iter().map(|(id, _)| id.number).collect();
        assert_eq!(numbers, vec![2, 5, 9]);
    }
}
