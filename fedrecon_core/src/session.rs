//! Bus session lifecycle management.
//!
//! The [`SessionManager`] owns the bus client for its lifetime and drives
//! connect -> federation bring-up -> join -> bind -> publish/subscribe ->
//! send -> resign -> disconnect. Lifecycle failures other than the
//! explicitly tolerated conditions are fatal to the session; teardown is
//! best-effort and safe to call after a partially failed setup.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fedrecon_env::{
    BusClient, BusError, EndpointDescriptor, FederateIdentity, FomModule, InteractionClassHandle,
    InteractionSink, ParameterHandle, ParameterMap,
};

use crate::codec::EncodedInteraction;
use crate::detonation::DetonationRecord;

/// Errors raised by the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A non-tolerated bus failure.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// The join retry loop ran out of candidate federate names.
    #[error("Federate name space exhausted for '{base}' after {attempts} attempts")]
    NameExhausted { base: String, attempts: u32 },

    /// An operation requires a connected session.
    #[error("Session is not connected")]
    NotConnected,
}

/// Handle identifying one established session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub Uuid);

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short prefix for log readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Resolved handles for one interaction type and its parameters.
///
/// Owns the name<->handle mapping both ways so the codec layer can stay
/// handle-free.
#[derive(Debug, Clone)]
pub struct InteractionBinding {
    class: InteractionClassHandle,
    class_name: String,
    by_name: HashMap<String, ParameterHandle>,
    by_handle: HashMap<ParameterHandle, String>,
}

impl InteractionBinding {
    /// Returns the bound interaction class handle.
    pub fn class(&self) -> InteractionClassHandle {
        self.class
    }

    /// Returns the logical interaction class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Looks up the handle for a wire parameter name.
    pub fn handle_of(&self, name: &str) -> Option<ParameterHandle> {
        self.by_name.get(name).copied()
    }

    /// Looks up the wire parameter name for a handle.
    pub fn name_of(&self, handle: ParameterHandle) -> Option<&str> {
        self.by_handle.get(&handle).map(String::as_str)
    }
}

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on join attempts when federate names collide.
    pub max_join_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_join_attempts: 64,
        }
    }
}

/// Owns the bus connection and interaction bindings for one federate.
pub struct SessionManager<B: BusClient> {
    bus: B,
    config: SessionConfig,
    handle: Option<SessionHandle>,
    identity: Option<FederateIdentity>,
}

impl<B: BusClient> SessionManager<B> {
    /// Creates a session manager over the given bus client.
    pub fn new(bus: B) -> Self {
        Self::with_config(bus, SessionConfig::default())
    }

    /// Creates a session manager with explicit tuning.
    pub fn with_config(bus: B, config: SessionConfig) -> Self {
        Self {
            bus,
            config,
            handle: None,
            identity: None,
        }
    }

    /// Returns the identity granted at join time, if joined.
    pub fn identity(&self) -> Option<&FederateIdentity> {
        self.identity.as_ref()
    }

    /// Establishes the client connection. Idempotent: connecting an
    /// already-connected session returns the existing handle.
    pub async fn connect(
        &mut self,
        endpoint: &EndpointDescriptor,
        sink: Arc<dyn InteractionSink>,
    ) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.handle {
            debug!("connect: session {} already established", handle);
            return Ok(handle);
        }

        match self.bus.connect(endpoint, sink).await {
            Ok(()) => {}
            Err(BusError::AlreadyConnected) => {
                warn!("connect: bus reports an existing connection, reusing it");
            }
            Err(e) => return Err(e.into()),
        }

        let handle = SessionHandle(Uuid::new_v4());
        self.handle = Some(handle);
        info!("Session {} connected via '{}'", handle, endpoint.designator);
        Ok(handle)
    }

    /// Brings the federation execution into existence.
    ///
    /// Destroys any stale execution first (a missing execution is fine; one
    /// with active members is surfaced as a warning), then creates it from
    /// the module set, tolerating a concurrent creation.
    pub async fn ensure_federation(
        &self,
        name: &str,
        modules: &[FomModule],
    ) -> Result<(), SessionError> {
        self.require_connected()?;

        match self.bus.destroy_federation(name).await {
            Ok(()) => info!("Destroyed stale federation execution '{}'", name),
            Err(BusError::FederationDoesNotExist(_)) => {}
            Err(BusError::FederatesStillJoined(_)) => {
                warn!(
                    "Tried to destroy federation '{}' but it still has active federates",
                    name
                );
            }
            Err(e) => return Err(e.into()),
        }

        match self.bus.create_federation(name, modules).await {
            Ok(()) => info!("Created federation execution '{}'", name),
            Err(BusError::FederationAlreadyExists(_)) => {
                warn!(
                    "Tried to create federation '{}' but the federation already exists",
                    name
                );
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Joins the federation under `preferred_name`, retrying with numeric
    /// suffixes (`-1`, `-2`, ...) while the name is taken.
    ///
    /// The retry loop is bounded by `SessionConfig::max_join_attempts`;
    /// exhaustion raises [`SessionError::NameExhausted`].
    pub async fn join(
        &mut self,
        preferred_name: &str,
        federate_kind: &str,
        federation: &str,
        modules: &[FomModule],
    ) -> Result<FederateIdentity, SessionError> {
        self.require_connected()?;

        for attempt in 0..self.config.max_join_attempts {
            let candidate = if attempt == 0 {
                preferred_name.to_string()
            } else {
                format!("{}-{}", preferred_name, attempt)
            };

            match self
                .bus
                .join(&candidate, federate_kind, federation, modules)
                .await
            {
                Ok(identity) => {
                    info!("Joined federation '{}' as '{}'", federation, identity.name);
                    self.identity = Some(identity.clone());
                    return Ok(identity);
                }
                Err(BusError::NameAlreadyInUse(_)) => {
                    debug!("Federate name '{}' already in use, retrying", candidate);
                }
                Err(BusError::AlreadyMember) => {
                    warn!("join: already a federation member, continuing as '{}'", candidate);
                    let identity = FederateIdentity {
                        name: candidate,
                        federation: federation.to_string(),
                    };
                    self.identity = Some(identity.clone());
                    return Ok(identity);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SessionError::NameExhausted {
            base: preferred_name.to_string(),
            attempts: self.config.max_join_attempts,
        })
    }

    /// Resolves an interaction type and its parameter names into handles.
    pub async fn bind_interaction_type(
        &self,
        type_name: &str,
        parameter_names: &[&str],
    ) -> Result<InteractionBinding, SessionError> {
        self.require_connected()?;

        let class = self.bus.interaction_class_handle(type_name).await?;
        let mut by_name = HashMap::with_capacity(parameter_names.len());
        let mut by_handle = HashMap::with_capacity(parameter_names.len());
        for name in parameter_names {
            let handle = self.bus.parameter_handle(class, name).await?;
            by_name.insert((*name).to_string(), handle);
            by_handle.insert(handle, (*name).to_string());
        }

        debug!(
            "Bound interaction type '{}' with {} parameters",
            type_name,
            by_name.len()
        );
        Ok(InteractionBinding {
            class,
            class_name: type_name.to_string(),
            by_name,
            by_handle,
        })
    }

    /// Declares intent to send the bound interaction type.
    pub async fn publish(&self, binding: &InteractionBinding) -> Result<(), SessionError> {
        self.require_connected()?;
        self.bus.publish_interaction(binding.class()).await?;
        Ok(())
    }

    /// Declares intent to receive the bound interaction type.
    pub async fn subscribe(&self, binding: &InteractionBinding) -> Result<(), SessionError> {
        self.require_connected()?;
        self.bus.subscribe_interaction(binding.class()).await?;
        Ok(())
    }

    /// Transmits one encoded interaction instance.
    pub async fn send(
        &self,
        binding: &InteractionBinding,
        encoded: &EncodedInteraction,
    ) -> Result<(), SessionError> {
        self.require_connected()?;

        let mut parameters = ParameterMap::with_capacity(encoded.len());
        for (name, payload) in encoded {
            let handle = binding
                .handle_of(name)
                .ok_or_else(|| BusError::UndefinedParameter(name.clone()))?;
            parameters.insert(handle, payload.clone());
        }
        self.bus.send_interaction(binding.class(), &parameters).await?;
        Ok(())
    }

    /// Encodes and announces one detonation record (producer side).
    pub async fn publish_record(
        &self,
        binding: &InteractionBinding,
        record: &DetonationRecord,
    ) -> Result<(), SessionError> {
        self.send(binding, &crate::codec::encode(record)).await
    }

    /// Resigns from the federation. Best-effort: not being a member is
    /// not an error, anything else is logged but never escalated.
    pub async fn leave(&mut self) {
        match self.bus.resign().await {
            Ok(()) => info!("Resigned from federation"),
            Err(BusError::NotMember) | Err(BusError::NotConnected) => {
                debug!("leave: nothing to resign from");
            }
            Err(e) => warn!("leave: resign failed: {}", e),
        }
        self.identity = None;
    }

    /// Drops the bus connection. Best-effort, like `leave`.
    pub async fn disconnect(&mut self) {
        match self.bus.disconnect().await {
            Ok(()) => info!("Disconnected from bus"),
            Err(BusError::NotConnected) => debug!("disconnect: already disconnected"),
            Err(e) => warn!("disconnect: failed: {}", e),
        }
        self.handle = None;
    }

    /// Full defensive teardown: resign, then disconnect. Safe to call even
    /// if earlier setup steps partially failed.
    pub async fn teardown(&mut self) {
        self.leave().await;
        self.disconnect().await;
    }

    fn require_connected(&self) -> Result<(), SessionError> {
        if self.handle.is_none() {
            return Err(SessionError::NotConnected);
        }
        Ok(())
    }
}
