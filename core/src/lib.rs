//! Synchronous client core for the bike-rental backend.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values for the five
//! rental collections without touching the network (host-does-IO pattern).
//! Next to the record codec live the pieces of business logic that need no
//! I/O at all: return pricing, payment-history assembly and the bike status
//! consistency check.
//!
//! # Design
//! - `RentalClient` is stateless; it holds the endpoint and access key.
//! - Each record operation is split into `build_*` and `parse_*`, so the I/O
//!   boundary is explicit and the store crate owns every round-trip.
//! - Money is `rust_decimal::Decimal`, time is `chrono`.

pub mod aggregate;
pub mod client;
pub mod error;
pub mod http;
pub mod pricing;
pub mod reconcile;
pub mod types;

pub use aggregate::{attach_payments, RentalView, Snapshot};
pub use client::RentalClient;
pub use error::{ApiError, StoreError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use reconcile::{status_mismatches, StatusMismatch};
pub use types::{
    Bike, BikeStatus, BikeStatusUpdate, Client, MoneyEntry, MoneyRecord, NewBike, NewClient,
    NewMoneyRecord, NewPayment, NewRental, Order, Payment, RecordId, Rental, RentalReturn,
    RentRequest, ReturnSummary, Table,
};
