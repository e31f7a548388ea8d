//! Consistency check between bike status and open rentals.
//!
//! Renting and returning each take two independent writes, so a failure
//! between them leaves a bike whose status no longer matches its rentals.
//! This module only reports such bikes; nothing is repaired here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Bike, BikeStatus, RecordId, Rental};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusMismatch {
    /// The bike's stored status disagrees with its rentals.
    BikeStatus {
        bike_id: RecordId,
        recorded: BikeStatus,
        expected: BikeStatus,
        open_rental: Option<RecordId>,
    },
    /// An open rental points at a bike that does not exist.
    MissingBike { rental_id: RecordId, bike_id: RecordId },
}

/// Compare every bike against the open rentals that reference it.
pub fn status_mismatches<R: AsRef<Rental>>(bikes: &[Bike], rentals: &[R]) -> Vec<StatusMismatch> {
    let mut open: HashMap<RecordId, RecordId> = HashMap::new();
    let mut found = Vec::new();

    for rental in rentals.iter().map(AsRef::as_ref).filter(|r| r.is_open()) {
        open.entry(rental.bike_id).or_insert(rental.id);
        if !bikes.iter().any(|b| b.id == rental.bike_id) {
            found.push(StatusMismatch::MissingBike {
                rental_id: rental.id,
                bike_id: rental.bike_id,
            });
        }
    }

    for bike in bikes {
        let open_rental = open.get(&bike.id).copied();
        let expected = if open_rental.is_some() {
            BikeStatus::Rented
        } else {
            BikeStatus::Free
        };
        if bike.status != expected {
            found.push(StatusMismatch::BikeStatus {
                bike_id: bike.id,
                recorded: bike.status,
                expected,
                open_rental,
            });
        }
    }

    found
}
