//! Fedrecon Bus Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the Fedrecon
//! reconciliation engine to run against both a **real interaction bus**
//! (an RTI relay) and a **Loopback** in-process bus for deterministic
//! verification runs.
//!
//! # Core Concept
//!
//! The engine never talks to a concrete transport. All bus traffic goes
//! through the [`BusClient`] capability trait:
//! - Session lifecycle (`connect`, `join`, `resign`, `disconnect`)
//! - Federation management (`create_federation`, `destroy_federation`)
//! - Interaction schema lookup (`interaction_class_handle`, `parameter_handle`)
//! - Declarations and traffic (`publish_interaction`, `subscribe_interaction`,
//!   `send_interaction`)
//!
//! Inbound interactions are pushed into an [`InteractionSink`] registered
//! at connect time, on the bus's own dispatch context.
//!
//! # Example
//!
//! ```ignore
//! use fedrecon_env::{BusClient, EndpointDescriptor, NullSink};
//! use std::sync::Arc;
//!
//! async fn bring_up<B: BusClient>(bus: &B) {
//!     let endpoint = EndpointDescriptor::new("local");
//!     bus.connect(&endpoint, Arc::new(NullSink)).await.unwrap();
//! }
//! ```

mod bus;
mod types;
mod error;

pub use bus::{BusClient, InteractionSink, NullSink};
pub use types::{
    EndpointDescriptor, FederateIdentity, FomModule, InteractionClassHandle, ParameterHandle,
    ParameterMap,
};
pub use error::BusError;
