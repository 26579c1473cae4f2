//! Fedrecon Verification Harness
//!
//! This crate provides the controlled environment where the reconciliation
//! engine runs end-to-end without a real RTI relay:
//!
//! - **Loopback bus**: a deterministic in-process exchange implementing the
//!   `BusClient` capability, with a federation registry, a schema table and
//!   synchronous single-dispatch delivery
//! - **Publisher agent**: the counterpart federate that announces every
//!   reference detonation on the bus
//! - **Loaders**: federation agreement document (CSV) and spatial tolerance
//!   (JSON) parsing
//! - **Test driver**: the preamble -> observe -> perform -> postamble
//!   sequence that yields the final verdict
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    LoopbackExchange                      │
//! │   federation registry · schema table · dispatch fan-out  │
//! └──────────────────────────────────────────────────────────┘
//!        ▲                                      ▲
//!   ┌────┴──────┐                        ┌──────┴──────┐
//!   │ Publisher │ ──MunitionDetonation─► │  Integrity  │
//!   │   Agent   │                        │  TestCase   │
//!   └───────────┘                        └─────────────┘
//!                                               │
//!                                           Verdict
//! ```

mod agent;
mod bus;
mod countdown;
mod fad;
mod harness;

pub use agent::PublisherAgent;
pub use bus::{BusSchema, LoopbackBus, LoopbackExchange};
pub use countdown::CountdownTimer;
pub use fad::{load_fad_csv, load_tolerance_json, parse_fad_csv, FadError};
pub use harness::{HarnessConfig, HarnessError, IntegrityTestCase};
