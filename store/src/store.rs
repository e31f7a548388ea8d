//! Business workflows over the remote rental store.
//!
//! # Design
//! `RentalStore` pairs a `Backend` with a `Transport`. Every public method
//! asks the backend for its `RentalClient` first, so an unconfigured store
//! fails with `NotConfigured` before any request exists.
//!
//! Renting and returning are two independent writes each (rental row, then
//! bike status). When the second write fails the first is not undone: the
//! error is logged with both ids and returned, and the next `load_all`
//! reports the bike through the reconciliation check.

use std::thread::{self, ScopedJoinHandle};

use chrono::{DateTime, Utc};
use rental_core::pricing::quote_return;
use rental_core::{
    ApiError, Bike, BikeStatus, Client, HttpRequest, HttpResponse, MoneyEntry, MoneyRecord,
    NewBike, NewClient, NewMoneyRecord, NewPayment, NewRental, Payment, RecordId, Rental,
    RentalClient, RentalReturn, RentRequest, ReturnSummary, Snapshot, Table,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::config::Backend;
use crate::transport::{Transport, UreqTransport};

#[derive(Debug, Clone)]
pub struct RentalStore<T = UreqTransport> {
    backend: Backend,
    transport: T,
}

impl RentalStore<UreqTransport> {
    /// Store configured from the environment, talking HTTP through ureq.
    pub fn from_env() -> Self {
        Self::new(Backend::from_env(), UreqTransport::new())
    }
}

impl<T: Transport> RentalStore<T> {
    pub fn new(backend: Backend, transport: T) -> Self {
        Self { backend, transport }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), path = %request.path, "store request");
        Ok(self.transport.execute(request)?)
    }

    fn fetch<R: DeserializeOwned>(&self, client: &RentalClient, table: Table) -> Result<Vec<R>, ApiError> {
        let response = self.send(client.build_list(table))?;
        client.parse_list(response)
    }

    fn set_bike_status(&self, client: &RentalClient, bike_id: RecordId, status: BikeStatus) -> Result<(), ApiError> {
        let response = self.send(client.build_set_bike_status(bike_id, status)?)?;
        client.parse_updated(response)
    }

    /// Read all five collections at once and join payments onto rentals.
    ///
    /// A collection that fails to load is logged, comes back empty and is
    /// listed in `Snapshot::degraded`; only a missing configuration fails
    /// the whole call.
    pub fn load_all(&self) -> Result<Snapshot, ApiError> {
        let client = self.client()?;

        let (bikes, clients, rentals, payments, money) = thread::scope(|s| {
            let bikes = s.spawn(|| self.fetch::<Bike>(client, Table::Bikes));
            let clients = s.spawn(|| self.fetch::<Client>(client, Table::Clients));
            let rentals = s.spawn(|| self.fetch::<Rental>(client, Table::Rentals));
            let payments = s.spawn(|| self.fetch::<Payment>(client, Table::Payments));
            let money = s.spawn(|| self.fetch::<MoneyRecord>(client, Table::MoneyRecords));
            (join(bikes), join(clients), join(rentals), join(payments), join(money))
        });

        let mut degraded = Vec::new();
        let bikes = or_empty(Table::Bikes, bikes, &mut degraded);
        let clients = or_empty(Table::Clients, clients, &mut degraded);
        let rentals = or_empty(Table::Rentals, rentals, &mut degraded);
        let payments = or_empty(Table::Payments, payments, &mut degraded);
        let money = or_empty(Table::MoneyRecords, money, &mut degraded);

        let snapshot = Snapshot::new(bikes, clients, rentals, payments, money).with_degraded(degraded);
        if !snapshot.can_reconcile() {
            debug!("bikes or rentals missing; status check skipped");
        }
        for mismatch in snapshot.status_mismatches() {
            warn!(?mismatch, "bike status disagrees with open rentals");
        }
        Ok(snapshot)
    }

    pub fn add_bike(&self, bike: &NewBike) -> Result<Bike, ApiError> {
        let client = self.client()?;
        let response = self.send(client.build_insert_bike(bike)?)?;
        client.parse_created(response)
    }

    /// Id of the client with exactly this name and phone, inserting one if
    /// none exists. Two concurrent calls for a new client can both insert.
    pub fn add_client_if_needed(&self, candidate: &NewClient) -> Result<RecordId, ApiError> {
        let client = self.client()?;
        let response = self.send(client.build_find_client(candidate))?;
        if let Some(id) = client.parse_find_client(response)? {
            return Ok(id);
        }
        let response = self.send(client.build_insert_client(candidate)?)?;
        let created: Client = client.parse_created(response)?;
        info!(client_id = created.id, "client created");
        Ok(created.id)
    }

    /// Resolve the client, record the rental, then mark the bike rented.
    pub fn rent_bike(&self, request: &RentRequest) -> Result<Rental, ApiError> {
        let client = self.client()?;
        let client_id = self.add_client_if_needed(&request.client)?;

        let new_rental = NewRental {
            bike_id: request.bike_id,
            client_id,
            start: request.start.unwrap_or_else(Utc::now),
            deposit: request.deposit.unwrap_or(Decimal::ZERO),
        };
        let response = self.send(client.build_insert_rental(&new_rental)?)?;
        let rental: Rental = client.parse_created(response)?;

        if let Err(err) = self.set_bike_status(client, rental.bike_id, BikeStatus::Rented) {
            error!(
                rental_id = rental.id,
                bike_id = rental.bike_id,
                error = %err,
                "rental recorded but bike status not updated"
            );
            return Err(err);
        }
        info!(rental_id = rental.id, bike_id = rental.bike_id, client_id, "bike rented");
        Ok(rental)
    }

    /// Record a payment against a rental.
    ///
    /// The rental's `paid` column is left alone; read the total from
    /// `RentalView::paid_from_history` after the next `load_all`.
    pub fn add_payment(&self, rental_id: RecordId, amount: Decimal, note: Option<&str>) -> Result<Payment, ApiError> {
        let client = self.client()?;
        let payment = NewPayment {
            rental_id,
            amount,
            note: note.map(str::to_string),
        };
        let response = self.send(client.build_insert_payment(&payment)?)?;
        client.parse_created(response)
    }

    /// Close a rental now. See [`RentalStore::process_return_at`].
    pub fn process_return<R: AsRef<Rental>>(
        &self,
        rental_id: RecordId,
        extra_paid: Option<Decimal>,
        bikes: &[Bike],
        rentals: &[R],
    ) -> Result<ReturnSummary, ApiError> {
        self.process_return_at(rental_id, extra_paid, bikes, rentals, Utc::now())
    }

    /// Close a rental at `now`: bill whole started days, add `extra_paid`
    /// to what was paid, write the rental, then free the bike.
    ///
    /// `bikes` and `rentals` are the caller's last loaded state; the rental
    /// is looked up there, not re-read from the backend.
    pub fn process_return_at<R: AsRef<Rental>>(
        &self,
        rental_id: RecordId,
        extra_paid: Option<Decimal>,
        bikes: &[Bike],
        rentals: &[R],
        now: DateTime<Utc>,
    ) -> Result<ReturnSummary, ApiError> {
        let client = self.client()?;
        let rental = rentals
            .iter()
            .map(AsRef::as_ref)
            .find(|r| r.id == rental_id)
            .ok_or(ApiError::NotFound {
                entity: "rental",
                id: rental_id,
            })?;

        let bike = bikes.iter().find(|b| b.id == rental.bike_id);
        if bike.is_none() {
            warn!(rental_id, bike_id = rental.bike_id, "bike not in loaded list; pricing at zero");
        }
        let summary = quote_return(rental, bike, extra_paid, now)?;

        let patch = RentalReturn {
            end: summary.end,
            price_total: summary.price_total,
            paid: summary.paid_now,
        };
        let response = self.send(client.build_close_rental(rental_id, &patch)?)?;
        client.parse_updated(response)?;

        if let Err(err) = self.set_bike_status(client, rental.bike_id, BikeStatus::Free) {
            error!(
                rental_id,
                bike_id = rental.bike_id,
                error = %err,
                "rental closed but bike still marked rented"
            );
            return Err(err);
        }
        info!(
            rental_id,
            price_total = %summary.price_total,
            paid = %summary.paid_now,
            "rental returned"
        );
        Ok(summary)
    }

    /// Append a ledger line. `kind` is stored as given.
    pub fn add_money_record(&self, kind: &str, entry: &MoneyEntry) -> Result<MoneyRecord, ApiError> {
        let client = self.client()?;
        let record = NewMoneyRecord::new(kind, entry);
        let response = self.send(client.build_insert_money_record(&record)?)?;
        client.parse_created(response)
    }

    fn client(&self) -> Result<&RentalClient, ApiError> {
        self.backend.client()
    }
}

fn join<R>(handle: ScopedJoinHandle<'_, R>) -> R {
    handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

fn or_empty<R>(table: Table, result: Result<Vec<R>, ApiError>, degraded: &mut Vec<Table>) -> Vec<R> {
    result.unwrap_or_else(|err| {
        warn!(table = table.as_str(), error = %err, "load failed; continuing with no rows");
        degraded.push(table);
        Vec::new()
    })
}
