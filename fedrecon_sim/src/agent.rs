//! Publisher federate for verification runs.
//!
//! The agent plays the "system under test" role: it joins the federation
//! and announces every reference detonation on the bus, so the verifier
//! side has traffic to reconcile against.

use std::sync::Arc;
use tracing::{error, info};

use fedrecon_core::codec;
use fedrecon_core::detonation::DetonationRecord;
use fedrecon_core::session::{InteractionBinding, SessionError, SessionManager};
use fedrecon_env::{BusClient, EndpointDescriptor, FomModule, NullSink};

/// Announces reference detonations over a bus session.
pub struct PublisherAgent<B: BusClient> {
    session: SessionManager<B>,
    binding: Option<InteractionBinding>,
}

impl<B: BusClient> PublisherAgent<B> {
    /// Creates an agent over the given bus client.
    pub fn new(bus: B) -> Self {
        Self {
            session: SessionManager::new(bus),
            binding: None,
        }
    }

    /// Connects, joins the federation and declares the detonation type.
    pub async fn start(
        &mut self,
        endpoint: &EndpointDescriptor,
        preferred_name: &str,
        federation: &str,
        modules: &[FomModule],
    ) -> Result<(), SessionError> {
        self.session.connect(endpoint, Arc::new(NullSink)).await?;
        self.session.ensure_federation(federation, modules).await?;
        let identity = self
            .session
            .join(preferred_name, "fedrecon", federation, modules)
            .await?;
        info!("Publisher agent running as {}", identity);

        let binding = self
            .session
            .bind_interaction_type(codec::INTERACTION_CLASS, &codec::PARAMETER_NAMES)
            .await?;
        self.session.publish(&binding).await?;
        self.binding = Some(binding);
        Ok(())
    }

    /// Announces every record, returning how many were sent. A failed send
    /// is logged and skipped so the remaining records still go out.
    pub async fn announce_all(&self, records: &[DetonationRecord]) -> Result<usize, SessionError> {
        let binding = self.binding.as_ref().ok_or(SessionError::NotConnected)?;

        let mut sent = 0;
        for record in records {
            match self.session.publish_record(binding, record).await {
                Ok(()) => {
                    info!("Announced detonation {}", record.event_id);
                    sent += 1;
                }
                Err(e) => error!("Error announcing detonation {}: {}", record.event_id, e),
            }
        }
        Ok(sent)
    }

    /// Resigns and disconnects, best-effort.
    pub async fn stop(&mut self) {
        self.binding = None;
        self.session.teardown().await;
    }
}
