//! Denormalized view assembled from the five collections.
//!
//! Payment history is joined on read and never written back. The join is a
//! plain nested filter; rental and payment counts for a single shop stay
//! small enough that an index would not pay for itself.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::reconcile::{status_mismatches, StatusMismatch};
use crate::types::{Bike, Client, MoneyRecord, Payment, RecordId, Rental, Table};

/// A rental together with every payment that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalView {
    #[serde(flatten)]
    pub rental: Rental,
    #[serde(rename = "paymentsHistory")]
    pub payments_history: Vec<Payment>,
}

impl RentalView {
    /// Amount received through recorded payments.
    ///
    /// `add_payment` never touches the rental's `paid` column, so this is
    /// the figure to trust while the rental is open.
    pub fn paid_from_history(&self) -> Decimal {
        self.payments_history.iter().map(|p| p.amount).sum()
    }
}

impl AsRef<Rental> for RentalView {
    fn as_ref(&self) -> &Rental {
        &self.rental
    }
}

/// Attach to each rental the payments whose `rental_id` matches, keeping
/// the order of `payments`.
pub fn attach_payments(rentals: Vec<Rental>, payments: &[Payment]) -> Vec<RentalView> {
    rentals
        .into_iter()
        .map(|rental| {
            let payments_history = payments
                .iter()
                .filter(|p| p.rental_id == rental.id)
                .cloned()
                .collect();
            RentalView {
                rental,
                payments_history,
            }
        })
        .collect()
}

/// Everything the application needs on start-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub bikes: Vec<Bike>,
    pub clients: Vec<Client>,
    pub rentals: Vec<RentalView>,
    pub payments: Vec<Payment>,
    pub money: Vec<MoneyRecord>,
    /// Collections that failed to load and stand in as empty.
    #[serde(skip)]
    pub degraded: Vec<Table>,
}

impl Snapshot {
    pub fn new(
        bikes: Vec<Bike>,
        clients: Vec<Client>,
        rentals: Vec<Rental>,
        payments: Vec<Payment>,
        money: Vec<MoneyRecord>,
    ) -> Self {
        let rentals = attach_payments(rentals, &payments);
        Self {
            bikes,
            clients,
            rentals,
            payments,
            money,
            degraded: Vec::new(),
        }
    }

    /// Mark `tables` as loaded empty after a failed read.
    pub fn with_degraded(mut self, tables: Vec<Table>) -> Self {
        self.degraded = tables;
        self
    }

    pub fn is_degraded(&self, table: Table) -> bool {
        self.degraded.contains(&table)
    }

    /// Whether both sides of the bike status check were actually loaded.
    pub fn can_reconcile(&self) -> bool {
        !self.is_degraded(Table::Bikes) && !self.is_degraded(Table::Rentals)
    }

    pub fn rental(&self, id: RecordId) -> Option<&RentalView> {
        self.rentals.iter().find(|r| r.rental.id == id)
    }

    pub fn bike(&self, id: RecordId) -> Option<&Bike> {
        self.bikes.iter().find(|b| b.id == id)
    }

    /// Bikes whose status disagrees with the open rentals in this snapshot.
    ///
    /// Empty when bikes or rentals are degraded: an empty stand-in would
    /// make every rented bike or every open rental look inconsistent.
    pub fn status_mismatches(&self) -> Vec<StatusMismatch> {
        if !self.can_reconcile() {
            return Vec::new();
        }
        status_mismatches(&self.bikes, &self.rentals)
    }
}
