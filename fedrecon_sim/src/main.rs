//! Fedrecon Verification CLI
//!
//! Runs one detonation integrity test end-to-end over the loopback bus:
//! the publisher agent announces every FAD detonation, the verifier
//! federate collects them during the observation window, and the
//! reconciliation comparator produces the verdict.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fedrecon_core::reconcile::{SpatialToleranceConfig, VerdictStatus};
use fedrecon_env::{EndpointDescriptor, FomModule};
use fedrecon_sim::{
    load_fad_csv, load_tolerance_json, BusSchema, HarnessConfig, IntegrityTestCase,
    LoopbackExchange, PublisherAgent,
};

#[derive(Parser, Debug)]
#[command(name = "fedrecon-sim")]
#[command(about = "Run a detonation integrity verification over the loopback bus", long_about = None)]
struct Args {
    /// Federation agreement document (CSV)
    #[arg(long)]
    fad: PathBuf,

    /// Spatial tolerance configuration (JSON); defaults to 0.5 everywhere
    #[arg(long)]
    tolerance: Option<PathBuf>,

    /// Federation execution name
    #[arg(long, default_value = "FedreconFederation")]
    federation: String,

    /// Preferred verifier federate name
    #[arg(long, default_value = "FedreconVerifier")]
    federate: String,

    /// Preferred publisher agent federate name
    #[arg(long, default_value = "MunitionDetonationAgent")]
    agent_name: String,

    /// Observation window in seconds
    #[arg(short, long, default_value = "5")]
    wait: u64,

    /// Bus endpoint designator
    #[arg(long, default_value = "loopback")]
    endpoint: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Fedrecon verification run v0.1.0");

    let fad = load_fad_csv(&args.fad)?;
    let tolerance = match &args.tolerance {
        Some(path) => load_tolerance_json(path)?,
        None => SpatialToleranceConfig::new(0.5, 0.5, 0.5),
    };

    let endpoint = EndpointDescriptor::new(&args.endpoint);
    let modules = vec![FomModule::new("RPR-Warfare")];
    let exchange = LoopbackExchange::new(BusSchema::detonation());

    // Verifier side up first so no announcement is missed.
    let mut harness = IntegrityTestCase::new(
        exchange.client(),
        HarnessConfig {
            endpoint: endpoint.clone(),
            federation: args.federation.clone(),
            federate_name: args.federate.clone(),
            fom_modules: modules.clone(),
            wait: Duration::from_secs(args.wait),
        },
    );
    harness.log_test_purpose();
    harness.preamble().await?;

    // System-under-test side.
    let mut agent = PublisherAgent::new(exchange.client());
    agent
        .start(&endpoint, &args.agent_name, &args.federation, &modules)
        .await?;
    let announced = agent.announce_all(&fad).await?;
    info!("Publisher agent announced {} detonation(s)", announced);

    harness.observe().await;
    let verdict = harness.perform(&fad, &tolerance).await;

    agent.stop().await;
    harness.postamble().await;

    let verdict = verdict?;
    match verdict.status {
        VerdictStatus::Passed => {
            println!("PASSED: all {} reference detonations matched", verdict.records.len());
            Ok(())
        }
        VerdictStatus::Failed => {
            println!("FAILED:");
            for line in &verdict.diagnostics {
                println!("  {}", line);
            }
            std::process::exit(1);
        }
        VerdictStatus::Inconclusive => {
            println!(
                "INCONCLUSIVE: {}",
                verdict
                    .inconclusive_reason
                    .as_deref()
                    .unwrap_or("no reason recorded")
            );
            std::process::exit(2);
        }
    }
}
