//! Stateless HTTP request builder and response parser for the rental backend.
//!
//! # Design
//! `RentalClient` holds the REST endpoint and the access key and carries no
//! mutable state between calls. Every record operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`. The host executes the round-trip.
//!
//! The backend speaks the PostgREST dialect: one resource per table under
//! `/rest/v1`, filters as `column=eq.value` query parameters, inserts that
//! echo the created row when asked with `Prefer: return=representation`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{ApiError, StoreError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    Bike, BikeStatus, BikeStatusUpdate, Client, MoneyRecord, NewBike, NewClient, NewMoneyRecord,
    NewPayment, NewRental, Payment, RecordId, Rental, RentalReturn, Table,
};

const REST_PREFIX: &str = "/rest/v1";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Synchronous, stateless client for the rental backend.
#[derive(Clone)]
pub struct RentalClient {
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for RentalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RentalClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl RentalClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -- generic builders --------------------------------------------------

    /// Read a whole table in its default order.
    pub fn build_list(&self, table: Table) -> HttpRequest {
        let query = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), table.default_order().to_param()),
        ];
        self.request(HttpMethod::Get, table, query, None)
    }

    /// Insert one row and ask for it back as a single object.
    pub fn build_insert<T: Serialize>(&self, table: Table, row: &T) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(row).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut req = self.request(
            HttpMethod::Post,
            table,
            vec![("select".to_string(), "*".to_string())],
            Some(body),
        );
        req.headers.push(("content-type".to_string(), "application/json".to_string()));
        req.headers.push(("prefer".to_string(), "return=representation".to_string()));
        req.headers.push(("accept".to_string(), SINGLE_OBJECT.to_string()));
        Ok(req)
    }

    /// Patch the row with the given id. The backend answers without a body.
    pub fn build_update<T: Serialize>(
        &self,
        table: Table,
        id: RecordId,
        patch: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(patch).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut req = self.request(
            HttpMethod::Patch,
            table,
            vec![("id".to_string(), format!("eq.{id}"))],
            Some(body),
        );
        req.headers.push(("content-type".to_string(), "application/json".to_string()));
        req.headers.push(("prefer".to_string(), "return=minimal".to_string()));
        Ok(req)
    }

    // -- per-record builders -----------------------------------------------

    /// Look up at most one client with exactly this name and phone.
    pub fn build_find_client(&self, client: &NewClient) -> HttpRequest {
        let query = vec![
            ("select".to_string(), "*".to_string()),
            ("phone".to_string(), format!("eq.{}", client.phone)),
            ("name".to_string(), format!("eq.{}", client.name)),
            ("limit".to_string(), "1".to_string()),
        ];
        self.request(HttpMethod::Get, Table::Clients, query, None)
    }

    pub fn build_insert_bike(&self, bike: &NewBike) -> Result<HttpRequest, ApiError> {
        self.build_insert(Table::Bikes, bike)
    }

    pub fn build_insert_client(&self, client: &NewClient) -> Result<HttpRequest, ApiError> {
        self.build_insert(Table::Clients, client)
    }

    pub fn build_insert_rental(&self, rental: &NewRental) -> Result<HttpRequest, ApiError> {
        self.build_insert(Table::Rentals, rental)
    }

    pub fn build_insert_payment(&self, payment: &NewPayment) -> Result<HttpRequest, ApiError> {
        self.build_insert(Table::Payments, payment)
    }

    pub fn build_insert_money_record(&self, record: &NewMoneyRecord) -> Result<HttpRequest, ApiError> {
        self.build_insert(Table::MoneyRecords, record)
    }

    pub fn build_set_bike_status(&self, bike_id: RecordId, status: BikeStatus) -> Result<HttpRequest, ApiError> {
        self.build_update(Table::Bikes, bike_id, &BikeStatusUpdate { status })
    }

    pub fn build_close_rental(&self, rental_id: RecordId, patch: &RentalReturn) -> Result<HttpRequest, ApiError> {
        self.build_update(Table::Rentals, rental_id, patch)
    }

    // -- parsers -----------------------------------------------------------

    /// Rows are decoded one by one; a row that does not fit `T` is logged
    /// and skipped so the rest of the table still loads. A body that is not
    /// a JSON array fails as a whole.
    pub fn parse_list<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<Vec<T>, ApiError> {
        check_status(&response, &[200])?;
        let rows: Vec<Value> = decode(&response.body)?;
        let total = rows.len();
        let parsed: Vec<T> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value(row) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed row");
                    None
                }
            })
            .collect();
        if parsed.len() < total {
            warn!(kept = parsed.len(), total, "list loaded with rows skipped");
        }
        Ok(parsed)
    }

    pub fn parse_created<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        check_status(&response, &[201])?;
        decode(&response.body)
    }

    pub fn parse_updated(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, &[204, 200])
    }

    pub fn parse_list_bikes(&self, response: HttpResponse) -> Result<Vec<Bike>, ApiError> {
        self.parse_list(response)
    }

    pub fn parse_list_clients(&self, response: HttpResponse) -> Result<Vec<Client>, ApiError> {
        self.parse_list(response)
    }

    pub fn parse_list_rentals(&self, response: HttpResponse) -> Result<Vec<Rental>, ApiError> {
        self.parse_list(response)
    }

    pub fn parse_list_payments(&self, response: HttpResponse) -> Result<Vec<Payment>, ApiError> {
        self.parse_list(response)
    }

    pub fn parse_list_money_records(&self, response: HttpResponse) -> Result<Vec<MoneyRecord>, ApiError> {
        self.parse_list(response)
    }

    /// The id of the matching client, if the lookup found one.
    pub fn parse_find_client(&self, response: HttpResponse) -> Result<Option<RecordId>, ApiError> {
        let found: Vec<Client> = self.parse_list(response)?;
        Ok(found.first().map(|c| c.id))
    }

    fn request(
        &self,
        method: HttpMethod,
        table: Table,
        query: Vec<(String, String)>,
        body: Option<String>,
    ) -> HttpRequest {
        HttpRequest {
            method,
            path: format!("{}{REST_PREFIX}/{}", self.base_url, table.as_str()),
            query,
            headers: vec![
                ("apikey".to_string(), self.api_key.clone()),
                ("authorization".to_string(), format!("Bearer {}", self.api_key)),
            ],
            body,
        }
    }
}

/// Map any status outside `expected` to a `StoreError` carrying the body.
fn check_status(response: &HttpResponse, expected: &[u16]) -> Result<(), ApiError> {
    if expected.contains(&response.status) {
        return Ok(());
    }
    Err(StoreError::from_response(response.status, &response.body).into())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}
