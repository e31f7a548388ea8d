//! Domain DTOs for the rental backend.
//!
//! # Design
//! Row types (`Bike`, `Rental`, ...) mirror what the backend returns;
//! `New*` types are insert payloads and carry no `id`. Patch payloads for
//! the two update paths are separate structs so a status flip can never
//! accidentally serialize a rental column.
//!
//! Columns the backend may leave `null` are `Option`s with `#[serde(default)]`
//! so both a missing key and an explicit `null` deserialize.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Integer primary key used by every table.
pub type RecordId = i64;

/// The five collections the store reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Bikes,
    Clients,
    Rentals,
    Payments,
    MoneyRecords,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Bikes,
        Table::Clients,
        Table::Rentals,
        Table::Payments,
        Table::MoneyRecords,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Table::Bikes => "bikes",
            Table::Clients => "clients",
            Table::Rentals => "rentals",
            Table::Payments => "payments",
            Table::MoneyRecords => "money_records",
        }
    }

    /// Order used when listing the whole table.
    pub fn default_order(self) -> Order {
        match self {
            Table::Bikes | Table::Clients | Table::Rentals => Order::asc("id"),
            Table::Payments => Order::asc("created_at"),
            Table::MoneyRecords => Order::desc("date"),
        }
    }
}

/// Sort clause for a list read, rendered as `column.asc` / `column.desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self { column, ascending: true }
    }

    pub fn desc(column: &'static str) -> Self {
        Self { column, ascending: false }
    }

    pub fn to_param(&self) -> String {
        let dir = if self.ascending { "asc" } else { "desc" };
        format!("{}.{dir}", self.column)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BikeStatus {
    #[default]
    Free,
    Rented,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bike {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    pub price_per_day: Decimal,
    #[serde(default)]
    pub status: BikeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBike {
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    pub price_per_day: Decimal,
    #[serde(default)]
    pub status: BikeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: RecordId,
    pub name: String,
    pub phone: String,
}

/// A client as entered at the counter. Identity is the exact (name, phone) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    pub id: RecordId,
    pub bike_id: RecordId,
    pub client_id: RecordId,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deposit: Option<Decimal>,
    #[serde(default)]
    pub paid: Option<Decimal>,
    #[serde(default)]
    pub price_total: Option<Decimal>,
}

impl Rental {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// The `paid` column, with a missing value read as zero.
    pub fn paid_or_zero(&self) -> Decimal {
        self.paid.unwrap_or(Decimal::ZERO)
    }
}

impl AsRef<Rental> for Rental {
    fn as_ref(&self) -> &Rental {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRental {
    pub bike_id: RecordId,
    pub client_id: RecordId,
    pub start: DateTime<Utc>,
    pub deposit: Decimal,
}

/// Patch written to a rental when the bike comes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalReturn {
    pub end: DateTime<Utc>,
    pub price_total: Decimal,
    pub paid: Decimal,
}

/// Patch written to a bike when it leaves or returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BikeStatusUpdate {
    pub status: BikeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: RecordId,
    pub rental_id: RecordId,
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a payment; `created_at` is assigned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub rental_id: RecordId,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyRecord {
    pub id: RecordId,
    pub kind: String,
    pub date: NaiveDate,
    pub name: String,
    pub amount: Decimal,
}

/// A ledger line before it is tagged with a kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyEntry {
    pub date: NaiveDate,
    pub name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMoneyRecord {
    pub kind: String,
    pub date: NaiveDate,
    pub name: String,
    pub amount: Decimal,
}

impl NewMoneyRecord {
    pub fn new(kind: &str, entry: &MoneyEntry) -> Self {
        Self {
            kind: kind.to_string(),
            date: entry.date,
            name: entry.name.clone(),
            amount: entry.amount,
        }
    }
}

/// Input to the rent workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct RentRequest {
    pub bike_id: RecordId,
    pub client: NewClient,
    /// Missing deposit is recorded as zero.
    pub deposit: Option<Decimal>,
    /// Defaults to the time the rental is recorded.
    pub start: Option<DateTime<Utc>>,
}

/// Outcome of processing a return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSummary {
    pub end: DateTime<Utc>,
    pub price_total: Decimal,
    pub paid_now: Decimal,
}

/// Accepts RFC 3339 timestamps and offset-less ones (`timestamp` columns),
/// which are taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_timestamp(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn bike_status_is_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_value(BikeStatus::Rented).unwrap(), "rented");
        let status: BikeStatus = serde_json::from_str(r#""free""#).unwrap();
        assert_eq!(status, BikeStatus::Free);
    }

    #[test]
    fn new_bike_defaults_to_free() {
        let bike: NewBike =
            serde_json::from_str(r#"{"name":"Gazelle","price_per_day":20}"#).unwrap();
        assert_eq!(bike.status, BikeStatus::Free);
        assert!(bike.model.is_none());
    }

    #[test]
    fn bike_accepts_numeric_and_string_prices() {
        let a: Bike = serde_json::from_str(
            r#"{"id":1,"name":"A","model":"City","price_per_day":12.5,"status":"free"}"#,
        )
        .unwrap();
        let b: Bike = serde_json::from_str(
            r#"{"id":2,"name":"B","model":null,"price_per_day":"12.5","status":"rented"}"#,
        )
        .unwrap();
        assert_eq!(a.price_per_day, dec!(12.5));
        assert_eq!(b.price_per_day, dec!(12.5));
        assert_eq!(b.status, BikeStatus::Rented);
    }

    #[test]
    fn open_rental_reads_nulls() {
        let rental: Rental = serde_json::from_str(
            r#"{"id":3,"bike_id":1,"client_id":2,"start":"2024-05-01T10:00:00+00:00",
                "end":null,"deposit":50,"paid":null,"price_total":null}"#,
        )
        .unwrap();
        assert!(rental.is_open());
        assert_eq!(rental.paid_or_zero(), Decimal::ZERO);
        assert_eq!(rental.deposit, Some(dec!(50)));
        assert_eq!(rental.start, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn rental_without_optional_columns() {
        let rental: Rental = serde_json::from_str(
            r#"{"id":3,"bike_id":1,"client_id":2,"start":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert!(rental.end.is_none());
        assert!(rental.deposit.is_none());
        assert!(rental.price_total.is_none());
    }

    #[test]
    fn timestamps_without_offset_are_utc() {
        let payment: Payment = serde_json::from_str(
            r#"{"id":1,"rental_id":3,"amount":10,"note":null,"created_at":"2024-05-01T10:00:00.123456"}"#,
        )
        .unwrap();
        assert_eq!(
            payment.created_at.timestamp(),
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap().timestamp()
        );

        let payment: Payment = serde_json::from_str(
            r#"{"id":1,"rental_id":3,"amount":10,"created_at":"2024-05-01 12:30:00"}"#,
        )
        .unwrap();
        assert_eq!(payment.created_at, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let result: Result<Payment, _> = serde_json::from_str(
            r#"{"id":1,"rental_id":3,"amount":10,"created_at":"yesterday"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn new_payment_omits_missing_note() {
        let payment = NewPayment {
            rental_id: 4,
            amount: dec!(15),
            note: None,
        };
        let json = serde_json::to_value(&payment).unwrap();
        assert!(json.get("note").is_none());
        assert_eq!(json["rental_id"], 4);
    }

    #[test]
    fn money_record_keeps_any_kind() {
        let entry = MoneyEntry {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            name: "Chain oil".to_string(),
            amount: dec!(7.90),
        };
        let record = NewMoneyRecord::new("maintenance", &entry);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "maintenance");
        assert_eq!(json["date"], "2024-06-01");
        assert_eq!(json["name"], "Chain oil");
    }

    #[test]
    fn default_orders() {
        assert_eq!(Table::Bikes.default_order().to_param(), "id.asc");
        assert_eq!(Table::Payments.default_order().to_param(), "created_at.asc");
        assert_eq!(Table::MoneyRecords.default_order().to_param(), "date.desc");
    }
}
