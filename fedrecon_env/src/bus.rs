//! Bus client capability trait for Fedrecon sessions.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::BusError;
use crate::types::{
    EndpointDescriptor, FederateIdentity, FomModule, InteractionClassHandle, ParameterHandle,
    ParameterMap,
};

/// Receiver for inbound interactions.
///
/// The bus invokes `receive_interaction` on its own dispatch context
/// (single dispatch thread in the immediate-callback model). Implementations
/// must be safe to call repeatedly and rapidly from that one context and
/// must not block it.
pub trait InteractionSink: Send + Sync {
    /// Delivers one inbound interaction instance.
    fn receive_interaction(&self, class: InteractionClassHandle, parameters: &ParameterMap);
}

/// A sink that drops everything. Producer-only federates register this.
pub struct NullSink;

impl InteractionSink for NullSink {
    fn receive_interaction(&self, _class: InteractionClassHandle, _parameters: &ParameterMap) {}
}

/// Abstraction over the interaction-distribution middleware.
///
/// # Implementations
///
/// - **Production**: wraps an RTI relay connection
/// - **Verification**: `LoopbackBus` — deterministic in-process exchange
///
/// # Call Flow
///
/// ```text
/// Session                     Bus                        Peers
///   |                          |                           |
///   |-- connect(sink) -------->|                           |
///   |-- join(name) ----------->|                           |
///   |-- subscribe(class) ----->|                           |
///   |                          |<----- send(class, params) |
///   |   sink.receive_interaction(class, params)            |
/// ```
#[async_trait]
pub trait BusClient: Send + Sync + 'static {
    /// Establishes the client connection and registers the inbound sink.
    ///
    /// # Errors
    /// * `BusError::AlreadyConnected` - a connection already exists
    /// * `BusError::InvalidEndpoint` - the descriptor is unusable
    /// * `BusError::ConnectionFailed` - the relay is unreachable
    async fn connect(
        &self,
        endpoint: &EndpointDescriptor,
        sink: Arc<dyn InteractionSink>,
    ) -> Result<(), BusError>;

    /// Creates a federation execution from the given module set.
    async fn create_federation(&self, name: &str, modules: &[FomModule]) -> Result<(), BusError>;

    /// Destroys a federation execution.
    ///
    /// # Errors
    /// * `BusError::FederationDoesNotExist` - nothing to destroy
    /// * `BusError::FederatesStillJoined` - members are still joined
    async fn destroy_federation(&self, name: &str) -> Result<(), BusError>;

    /// Joins a federation execution under the given federate name.
    ///
    /// # Errors
    /// * `BusError::NameAlreadyInUse` - another member holds the name
    /// * `BusError::AlreadyMember` - this client is already joined
    async fn join(
        &self,
        federate_name: &str,
        federate_kind: &str,
        federation: &str,
        modules: &[FomModule],
    ) -> Result<FederateIdentity, BusError>;

    /// Resigns from the joined federation, divesting ownership.
    async fn resign(&self) -> Result<(), BusError>;

    /// Drops the client connection.
    async fn disconnect(&self) -> Result<(), BusError>;

    /// Resolves an interaction class name to its handle.
    async fn interaction_class_handle(
        &self,
        name: &str,
    ) -> Result<InteractionClassHandle, BusError>;

    /// Resolves a parameter name on an interaction class to its handle.
    async fn parameter_handle(
        &self,
        class: InteractionClassHandle,
        name: &str,
    ) -> Result<ParameterHandle, BusError>;

    /// Declares intent to send the interaction class. Idempotent.
    async fn publish_interaction(&self, class: InteractionClassHandle) -> Result<(), BusError>;

    /// Declares intent to receive the interaction class. Idempotent.
    async fn subscribe_interaction(&self, class: InteractionClassHandle) -> Result<(), BusError>;

    /// Transmits one interaction instance.
    ///
    /// # Errors
    /// * `BusError::NotPublished` - `publish_interaction` was never called
    /// * `BusError::UndefinedParameter` - a handle is foreign to the class
    async fn send_interaction(
        &self,
        class: InteractionClassHandle,
        parameters: &ParameterMap,
    ) -> Result<(), BusError>;
}
