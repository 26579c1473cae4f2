//! Deterministic in-process interaction bus.
//!
//! The [`LoopbackExchange`] is the shared fabric: a federation registry, a
//! schema table and the connected client slots. Each [`LoopbackBus`] is one
//! client connection attached to the exchange. Delivery is synchronous on
//! the sender's thread (the immediate-callback dispatch model) and fans out
//! only to federates of the same federation that subscribed to the class —
//! never back to the sender.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

use fedrecon_env::{
    BusClient, BusError, EndpointDescriptor, FederateIdentity, FomModule, InteractionClassHandle,
    InteractionSink, ParameterHandle, ParameterMap,
};

/// Interaction classes and their parameter names, as the bus enforces them.
#[derive(Debug, Clone, Default)]
pub struct BusSchema {
    classes: BTreeMap<String, Vec<String>>,
}

impl BusSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an interaction class with its parameter names.
    pub fn with_class(mut self, name: &str, parameters: &[&str]) -> Self {
        self.classes.insert(
            name.to_string(),
            parameters.iter().map(|p| (*p).to_string()).collect(),
        );
        self
    }

    /// The schema carrying the detonation interaction class.
    pub fn detonation() -> Self {
        Self::new().with_class(
            fedrecon_core::codec::INTERACTION_CLASS,
            &fedrecon_core::codec::PARAMETER_NAMES,
        )
    }
}

struct ClientSlot {
    sink: Arc<dyn InteractionSink>,
    joined: Option<(String, String)>, // (federation, federate name)
    published: HashSet<InteractionClassHandle>,
    subscribed: HashSet<InteractionClassHandle>,
}

#[derive(Default)]
struct Federation {
    members: BTreeMap<String, u64>, // federate name -> client id
}

struct ExchangeState {
    class_handles: HashMap<String, InteractionClassHandle>,
    class_names: HashMap<InteractionClassHandle, String>,
    parameter_handles: HashMap<(InteractionClassHandle, String), ParameterHandle>,
    parameter_owners: HashMap<ParameterHandle, InteractionClassHandle>,
    federations: BTreeMap<String, Federation>,
    clients: BTreeMap<u64, ClientSlot>,
    next_client: u64,
}

/// Shared bus fabric for one verification run.
pub struct LoopbackExchange {
    state: Mutex<ExchangeState>,
}

impl LoopbackExchange {
    /// Creates an exchange enforcing the given schema. Handles are assigned
    /// densely at construction, so resolution is pure lookup.
    pub fn new(schema: BusSchema) -> Arc<Self> {
        let mut class_handles = HashMap::new();
        let mut class_names = HashMap::new();
        let mut parameter_handles = HashMap::new();
        let mut parameter_owners = HashMap::new();

        let mut next_handle = 1u64;
        for (class_name, parameters) in &schema.classes {
            let class = InteractionClassHandle(next_handle);
            next_handle += 1;
            class_handles.insert(class_name.clone(), class);
            class_names.insert(class, class_name.clone());
            for parameter in parameters {
                let handle = ParameterHandle(next_handle);
                next_handle += 1;
                parameter_handles.insert((class, parameter.clone()), handle);
                parameter_owners.insert(handle, class);
            }
        }

        Arc::new(Self {
            state: Mutex::new(ExchangeState {
                class_handles,
                class_names,
                parameter_handles,
                parameter_owners,
                federations: BTreeMap::new(),
                clients: BTreeMap::new(),
                next_client: 1,
            }),
        })
    }

    /// Attaches a new client connection to this exchange.
    pub fn client(self: &Arc<Self>) -> LoopbackBus {
        LoopbackBus {
            exchange: Arc::clone(self),
            client_id: Mutex::new(None),
        }
    }
}

/// One client connection to a [`LoopbackExchange`].
pub struct LoopbackBus {
    exchange: Arc<LoopbackExchange>,
    client_id: Mutex<Option<u64>>,
}

impl LoopbackBus {
    fn current_client(&self) -> Result<u64, BusError> {
        self.client_id.lock().unwrap().ok_or(BusError::NotConnected)
    }
}

#[async_trait]
impl BusClient for LoopbackBus {
    async fn connect(
        &self,
        endpoint: &EndpointDescriptor,
        sink: Arc<dyn InteractionSink>,
    ) -> Result<(), BusError> {
        if endpoint.designator.trim().is_empty() {
            return Err(BusError::InvalidEndpoint(
                "empty settings designator".to_string(),
            ));
        }

        let mut client_id = self.client_id.lock().unwrap();
        if client_id.is_some() {
            return Err(BusError::AlreadyConnected);
        }

        let mut state = self.exchange.state.lock().unwrap();
        let id = state.next_client;
        state.next_client += 1;
        state.clients.insert(
            id,
            ClientSlot {
                sink,
                joined: None,
                published: HashSet::new(),
                subscribed: HashSet::new(),
            },
        );
        *client_id = Some(id);
        debug!("loopback: client {} connected", id);
        Ok(())
    }

    async fn create_federation(&self, name: &str, _modules: &[FomModule]) -> Result<(), BusError> {
        self.current_client()?;
        let mut state = self.exchange.state.lock().unwrap();
        if state.federations.contains_key(name) {
            return Err(BusError::FederationAlreadyExists(name.to_string()));
        }
        state.federations.insert(name.to_string(), Federation::default());
        debug!("loopback: federation '{}' created", name);
        Ok(())
    }

    async fn destroy_federation(&self, name: &str) -> Result<(), BusError> {
        self.current_client()?;
        let mut state = self.exchange.state.lock().unwrap();
        let federation = state
            .federations
            .get(name)
            .ok_or_else(|| BusError::FederationDoesNotExist(name.to_string()))?;
        if !federation.members.is_empty() {
            return Err(BusError::FederatesStillJoined(name.to_string()));
        }
        state.federations.remove(name);
        debug!("loopback: federation '{}' destroyed", name);
        Ok(())
    }

    async fn join(
        &self,
        federate_name: &str,
        _federate_kind: &str,
        federation: &str,
        _modules: &[FomModule],
    ) -> Result<FederateIdentity, BusError> {
        let id = self.current_client()?;
        let mut state = self.exchange.state.lock().unwrap();

        if state.clients[&id].joined.is_some() {
            return Err(BusError::AlreadyMember);
        }
        let fed = state
            .federations
            .get_mut(federation)
            .ok_or_else(|| BusError::FederationDoesNotExist(federation.to_string()))?;
        if fed.members.contains_key(federate_name) {
            return Err(BusError::NameAlreadyInUse(federate_name.to_string()));
        }

        fed.members.insert(federate_name.to_string(), id);
        state.clients.get_mut(&id).unwrap().joined =
            Some((federation.to_string(), federate_name.to_string()));
        debug!("loopback: '{}' joined '{}'", federate_name, federation);
        Ok(FederateIdentity {
            name: federate_name.to_string(),
            federation: federation.to_string(),
        })
    }

    async fn resign(&self) -> Result<(), BusError> {
        let id = self.current_client()?;
        let mut state = self.exchange.state.lock().unwrap();
        let (federation, federate_name) = state
            .clients
            .get_mut(&id)
            .and_then(|slot| slot.joined.take())
            .ok_or(BusError::NotMember)?;
        if let Some(fed) = state.federations.get_mut(&federation) {
            fed.members.remove(&federate_name);
        }
        debug!("loopback: '{}' resigned from '{}'", federate_name, federation);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        let mut client_id = self.client_id.lock().unwrap();
        let id = client_id.ok_or(BusError::NotConnected)?;

        let mut state = self.exchange.state.lock().unwrap();
        if state.clients[&id].joined.is_some() {
            return Err(BusError::internal(
                "client is still a federation member; resign first",
            ));
        }
        state.clients.remove(&id);
        *client_id = None;
        debug!("loopback: client {} disconnected", id);
        Ok(())
    }

    async fn interaction_class_handle(
        &self,
        name: &str,
    ) -> Result<InteractionClassHandle, BusError> {
        self.current_client()?;
        let state = self.exchange.state.lock().unwrap();
        state
            .class_handles
            .get(name)
            .copied()
            .ok_or_else(|| BusError::UnknownInteractionType(name.to_string()))
    }

    async fn parameter_handle(
        &self,
        class: InteractionClassHandle,
        name: &str,
    ) -> Result<ParameterHandle, BusError> {
        self.current_client()?;
        let state = self.exchange.state.lock().unwrap();
        if !state.class_names.contains_key(&class) {
            return Err(BusError::UnknownInteractionType(format!(
                "handle {:?}",
                class
            )));
        }
        state
            .parameter_handles
            .get(&(class, name.to_string()))
            .copied()
            .ok_or_else(|| BusError::UnknownParameter(name.to_string()))
    }

    async fn publish_interaction(&self, class: InteractionClassHandle) -> Result<(), BusError> {
        let id = self.current_client()?;
        let mut state = self.exchange.state.lock().unwrap();
        if !state.class_names.contains_key(&class) {
            return Err(BusError::UnknownInteractionType(format!(
                "handle {:?}",
                class
            )));
        }
        state.clients.get_mut(&id).unwrap().published.insert(class);
        Ok(())
    }

    async fn subscribe_interaction(&self, class: InteractionClassHandle) -> Result<(), BusError> {
        let id = self.current_client()?;
        let mut state = self.exchange.state.lock().unwrap();
        if !state.class_names.contains_key(&class) {
            return Err(BusError::UnknownInteractionType(format!(
                "handle {:?}",
                class
            )));
        }
        state.clients.get_mut(&id).unwrap().subscribed.insert(class);
        Ok(())
    }

    async fn send_interaction(
        &self,
        class: InteractionClassHandle,
        parameters: &ParameterMap,
    ) -> Result<(), BusError> {
        let id = self.current_client()?;

        // Resolve receivers under the lock, dispatch outside it so a sink
        // may call back into the bus.
        let receivers: Vec<Arc<dyn InteractionSink>> = {
            let state = self.exchange.state.lock().unwrap();
            let slot = &state.clients[&id];

            let class_name = state
                .class_names
                .get(&class)
                .ok_or_else(|| BusError::UnknownInteractionType(format!("handle {:?}", class)))?
                .clone();
            if !slot.published.contains(&class) {
                return Err(BusError::NotPublished(class_name));
            }
            for handle in parameters.keys() {
                if state.parameter_owners.get(handle) != Some(&class) {
                    return Err(BusError::UndefinedParameter(format!("handle {:?}", handle)));
                }
            }

            let (federation, _) = slot
                .joined
                .as_ref()
                .ok_or(BusError::NotMember)?
                .clone();
            state.federations[&federation]
                .members
                .values()
                .filter(|member| **member != id)
                .filter_map(|member| state.clients.get(member))
                .filter(|peer| peer.subscribed.contains(&class))
                .map(|peer| Arc::clone(&peer.sink))
                .collect()
        };

        for sink in receivers {
            sink.receive_interaction(class, parameters);
        }
        Ok(())
    }
}
