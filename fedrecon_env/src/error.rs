//! Error types for the bus abstraction layer.

use thiserror::Error;

/// Errors that can occur while talking to the interaction bus.
///
/// Several variants are *tolerated conditions* for the session layer:
/// `AlreadyConnected`, `FederationAlreadyExists`, `FederationDoesNotExist`
/// (on destroy), `AlreadyMember`, `NotMember` and `NotConnected` (on
/// teardown) are swallowed with a warning rather than surfaced as failures.
#[derive(Debug, Error)]
pub enum BusError {
    /// The relay could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The endpoint descriptor is not usable.
    #[error("Invalid endpoint descriptor: {0}")]
    InvalidEndpoint(String),

    /// A connection already exists for this client.
    #[error("Already connected")]
    AlreadyConnected,

    /// The client is not connected.
    #[error("Not connected")]
    NotConnected,

    /// A federation execution with this name already exists.
    #[error("Federation '{0}' already exists")]
    FederationAlreadyExists(String),

    /// No federation execution with this name exists.
    #[error("Federation '{0}' does not exist")]
    FederationDoesNotExist(String),

    /// The federation cannot be destroyed while members remain joined.
    #[error("Federation '{0}' still has joined federates")]
    FederatesStillJoined(String),

    /// The requested federate name is taken by another member.
    #[error("Federate name '{0}' already in use")]
    NameAlreadyInUse(String),

    /// This client is already a member of a federation.
    #[error("Already a federation member")]
    AlreadyMember,

    /// This client is not a member of any federation.
    #[error("Not a federation member")]
    NotMember,

    /// The bus schema does not define this interaction type.
    #[error("Unknown interaction type: {0}")]
    UnknownInteractionType(String),

    /// The bus schema does not define this parameter on the type.
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// `send` was called without a prior successful `publish`.
    #[error("Interaction class '{0}' is not published")]
    NotPublished(String),

    /// A supplied parameter handle is not part of the interaction class.
    #[error("Parameter not defined on interaction class: {0}")]
    UndefinedParameter(String),

    /// Unclassified bus failure.
    #[error("Bus internal error: {0}")]
    Internal(String),
}

impl BusError {
    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
