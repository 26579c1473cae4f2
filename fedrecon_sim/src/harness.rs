//! Integrity test driver.
//!
//! Drives the verifier federate through the canonical phase sequence:
//! preamble (connect, federation bring-up, join, bind, subscribe), observe
//! (countdown window while the system under test announces), perform
//! (snapshot + reconcile) and postamble (best-effort teardown). The phases
//! are separate so a host can interleave its own work — for a self-
//! contained run the publisher agent announces between preamble and
//! observe.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use fedrecon_core::codec;
use fedrecon_core::collector::ObservationCollector;
use fedrecon_core::detonation::DetonationRecord;
use fedrecon_core::reconcile::{reconcile, SpatialToleranceConfig, Verdict, VerdictStatus};
use fedrecon_core::session::{SessionError, SessionManager};
use fedrecon_env::{BusClient, EndpointDescriptor, FomModule};

use crate::countdown::CountdownTimer;
use crate::fad::FadError;

const LINE_SEPARATOR: &str =
    "---------------------------------------------------------------------";

/// Errors that prevent a run from producing a verdict.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Reference data error: {0}")]
    Fad(#[from] FadError),

    #[error("The federation agreement document is empty")]
    EmptyFad,
}

/// Run parameters for one integrity test.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Bus endpoint for the verifier session.
    pub endpoint: EndpointDescriptor,
    /// Federation execution to verify against.
    pub federation: String,
    /// Preferred verifier federate name.
    pub federate_name: String,
    /// Object model modules for federation bring-up.
    pub fom_modules: Vec<FomModule>,
    /// Observation window length.
    pub wait: Duration,
}

/// One integrity test case over a bus client.
pub struct IntegrityTestCase<B: BusClient> {
    session: SessionManager<B>,
    collector: Arc<ObservationCollector>,
    config: HarnessConfig,
}

impl<B: BusClient> IntegrityTestCase<B> {
    /// Creates a test case; nothing touches the bus until `preamble`.
    pub fn new(bus: B, config: HarnessConfig) -> Self {
        Self {
            session: SessionManager::new(bus),
            collector: Arc::new(ObservationCollector::new()),
            config,
        }
    }

    /// Logs what this test verifies.
    pub fn log_test_purpose(&self) {
        info!("{}", LINE_SEPARATOR);
        info!("TEST PURPOSE");
        info!("Verifies that the system under test announces detonation interactions");
        info!("whose identifiers match the federation agreement document (FAD), then");
        info!("checks the descriptive parameters and finally the spatial information.");
        info!("{}", LINE_SEPARATOR);
    }

    /// Brings up the verifier session and subscribes to detonations.
    pub async fn preamble(&mut self) -> Result<(), HarnessError> {
        info!(
            "Connecting verifier federate '{}' to federation '{}'",
            self.config.federate_name, self.config.federation
        );

        let sink: Arc<ObservationCollector> = Arc::clone(&self.collector);
        self.session.connect(&self.config.endpoint, sink).await?;
        self.session
            .ensure_federation(&self.config.federation, &self.config.fom_modules)
            .await?;
        self.session
            .join(
                &self.config.federate_name,
                "fedrecon",
                &self.config.federation,
                &self.config.fom_modules,
            )
            .await?;

        let binding = self
            .session
            .bind_interaction_type(codec::INTERACTION_CLASS, &codec::PARAMETER_NAMES)
            .await?;
        self.session.subscribe(&binding).await?;
        self.collector.bind(binding);
        Ok(())
    }

    /// Holds the observation window open for discovery.
    pub async fn observe(&self) {
        CountdownTimer::new(self.config.wait).run().await;
        info!(
            "Observation window closed with {} detonation interaction(s) discovered",
            self.collector.observed_count()
        );
    }

    /// Reconciles the observed interactions against the FAD.
    pub async fn perform(
        &self,
        fad: &[DetonationRecord],
        tolerance: &SpatialToleranceConfig,
    ) -> Result<Verdict, HarnessError> {
        if fad.is_empty() {
            return Err(HarnessError::EmptyFad);
        }

        info!("Executing reconciliation over {} reference detonations", fad.len());
        let observed = self.collector.snapshot();
        let verdict = reconcile(fad, &observed, tolerance);

        for line in &verdict.diagnostics {
            info!("{}", line);
        }
        for line in &verdict.warnings {
            warn!("{}", line);
        }
        match verdict.status {
            VerdictStatus::Passed => {
                info!("{}", LINE_SEPARATOR);
                info!("TEST IS COMPLETED SUCCESSFULLY.");
                info!("{}", LINE_SEPARATOR);
            }
            VerdictStatus::Failed => {
                info!("{}", LINE_SEPARATOR);
                info!("TEST FAILED due to discrepancies between the FAD and the observed interactions.");
                info!("{}", LINE_SEPARATOR);
            }
            VerdictStatus::Inconclusive => {
                warn!(
                    "TEST INCONCLUSIVE: {}",
                    verdict
                        .inconclusive_reason
                        .as_deref()
                        .unwrap_or("no reason recorded")
                );
            }
        }
        Ok(verdict)
    }

    /// Best-effort teardown of the verifier session.
    pub async fn postamble(&mut self) {
        self.session.teardown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::PublisherAgent;
    use crate::bus::{BusSchema, LoopbackExchange};
    use crate::fad::parse_fad_csv;

    const FAD_CSV: &str = "\
event,firing,target,munition,munition_type,warhead,fuse,quantity,rate,result,world_x,world_y,world_z,rel_x,rel_y,rel_z,vel_x,vel_y,vel_z,articulated
1.1.1,1.1.10,2.1.20,none,2.1.39.2.14.1.0,1000,100,1,0,1,3126019.2,5459132.7,-1260434.5,0.5,-1.25,2.0,121.0,-14.5,3.75,1:4096:0.75
1.1.2,1.1.10,none,1.1.30,2.1.39.2.14.1.0,1000,100,1,0,3,3126020.0,5459133.0,-1260435.0,0.0,0.0,0.0,80.0,0.0,0.0,
";

    fn config(endpoint: &str) -> HarnessConfig {
        HarnessConfig {
            endpoint: EndpointDescriptor::new(endpoint),
            federation: "HarnessFederation".to_string(),
            federate_name: "Verifier".to_string(),
            fom_modules: vec![FomModule::new("RPR-Warfare")],
            wait: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_pass() {
        let fad = parse_fad_csv(FAD_CSV.as_bytes()).unwrap();
        let tolerance = SpatialToleranceConfig::new(0.5, 0.5, 0.5);
        let exchange = LoopbackExchange::new(BusSchema::detonation());

        let mut harness = IntegrityTestCase::new(exchange.client(), config("loopback"));
        harness.preamble().await.unwrap();

        let mut agent = PublisherAgent::new(exchange.client());
        agent
            .start(
                &EndpointDescriptor::new("loopback"),
                "MunitionDetonationAgent",
                "HarnessFederation",
                &[],
            )
            .await
            .unwrap();
        assert_eq!(agent.announce_all(&fad).await.unwrap(), 2);

        harness.observe().await;
        let verdict = harness.perform(&fad, &tolerance).await.unwrap();
        assert!(verdict.passed(), "diagnostics: {:?}", verdict.diagnostics);

        agent.stop().await;
        harness.postamble().await;
    }

    #[tokio::test]
    async fn test_end_to_end_detects_missing_announcement() {
        let fad = parse_fad_csv(FAD_CSV.as_bytes()).unwrap();
        let tolerance = SpatialToleranceConfig::new(0.5, 0.5, 0.5);
        let exchange = LoopbackExchange::new(BusSchema::detonation());

        let mut harness = IntegrityTestCase::new(exchange.client(), config("loopback"));
        harness.preamble().await.unwrap();

        let mut agent = PublisherAgent::new(exchange.client());
        agent
            .start(
                &EndpointDescriptor::new("loopback"),
                "MunitionDetonationAgent",
                "HarnessFederation",
                &[],
            )
            .await
            .unwrap();
        // Announce only the first reference detonation.
        agent.announce_all(&fad[..1]).await.unwrap();

        harness.observe().await;
        let verdict = harness.perform(&fad, &tolerance).await.unwrap();
        assert_eq!(verdict.status, VerdictStatus::Failed);

        agent.stop().await;
        harness.postamble().await;
    }

    #[tokio::test]
    async fn test_silent_bus_is_inconclusive() {
        let fad = parse_fad_csv(FAD_CSV.as_bytes()).unwrap();
        let tolerance = SpatialToleranceConfig::new(0.5, 0.5, 0.5);
        let exchange = LoopbackExchange::new(BusSchema::detonation());

        let mut harness = IntegrityTestCase::new(exchange.client(), config("loopback"));
        harness.preamble().await.unwrap();
        harness.observe().await;

        let verdict = harness.perform(&fad, &tolerance).await.unwrap();
        assert_eq!(verdict.status, VerdictStatus::Inconclusive);
        harness.postamble().await;
    }

    #[tokio::test]
    async fn test_empty_fad_is_a_precondition_error() {
        let tolerance = SpatialToleranceConfig::new(0.5, 0.5, 0.5);
        let exchange = LoopbackExchange::new(BusSchema::detonation());
        let mut harness = IntegrityTestCase::new(exchange.client(), config("loopback"));
        harness.preamble().await.unwrap();

        let result = harness.perform(&[], &tolerance).await;
        assert!(matches!(result, Err(HarnessError::EmptyFad)));
        harness.postamble().await;
    }
}
