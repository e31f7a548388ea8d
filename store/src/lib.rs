//! Host side of the rental backend client.
//!
//! # Overview
//! `rental-core` builds and parses requests; this crate executes them and
//! strings them into the shop's workflows: loading everything, renting a
//! bike, taking payments, processing returns and keeping the cash ledger.
//!
//! # Design
//! - `Backend` is decided once from configuration. An unconfigured store
//!   still constructs, and every operation on it fails with `NotConfigured`.
//! - `Transport` is the only I/O seam; tests swap in scripted transports.
//! - No retries and no cross-request transactions. Failures propagate
//!   unchanged, except per-collection read failures in `load_all`.

pub mod config;
pub mod store;
pub mod transport;

pub use config::Backend;
pub use store::RentalStore;
pub use transport::{Transport, UreqTransport};
