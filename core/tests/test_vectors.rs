//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results. Request bodies are compared as parsed JSON so
//! field order does not matter.

use rental_core::{
    ApiError, Bike, BikeStatusUpdate, Client, HttpMethod, HttpRequest, HttpResponse, MoneyRecord,
    NewBike, NewClient, NewMoneyRecord, NewPayment, Payment, RentalClient, RentalReturn, Table,
};

const BASE_URL: &str = "http://localhost:3000";
const KEY: &str = "test-anon-key";

fn client() -> RentalClient {
    RentalClient::new(BASE_URL, KEY)
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PATCH" => HttpMethod::Patch,
        other => panic!("unknown method: {other}"),
    }
}

fn parse_table(s: &str) -> Table {
    Table::ALL
        .into_iter()
        .find(|t| t.as_str() == s)
        .unwrap_or_else(|| panic!("unknown table: {s}"))
}

fn simulated(case: &serde_json::Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

/// Check method, path, query and (if present) body against `expected_request`.
fn assert_request(name: &str, req: &HttpRequest, expected: &serde_json::Value) {
    assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(req.path, format!("{BASE_URL}{}", expected["path"].as_str().unwrap()), "{name}: path");

    let expected_query: Vec<(String, String)> = serde_json::from_value(expected["query"].clone()).unwrap();
    assert_eq!(req.query, expected_query, "{name}: query");

    assert_eq!(req.header("apikey"), Some(KEY), "{name}: apikey");
    assert_eq!(req.header("authorization"), Some(format!("Bearer {KEY}").as_str()), "{name}: bearer");

    match expected.get("body") {
        Some(expected_body) => {
            let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&body, expected_body, "{name}: body");
        }
        None => assert!(req.body.is_none(), "{name}: body should be None"),
    }
}

fn assert_store_error(name: &str, err: ApiError, expected: &serde_json::Value) {
    assert_eq!(expected["kind"], "Store", "{name}: only Store errors are vectored");
    match err {
        ApiError::Store(e) => {
            assert_eq!(e.status, expected["status"].as_u64().map(|s| s as u16), "{name}: status");
            assert_eq!(e.message, expected["message"].as_str().unwrap(), "{name}: message");
        }
        other => panic!("{name}: expected Store error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[test]
fn list_test_vectors() {
    let raw = include_str!("../../test-vectors/list.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let table = parse_table(case["table"].as_str().unwrap());

        let req = c.build_list(table);
        assert_request(name, &req, &case["expected_request"]);

        let response = simulated(case);
        let result: Result<usize, ApiError> = match table {
            Table::Bikes => c.parse_list_bikes(response).map(|v| v.len()),
            Table::Clients => c.parse_list_clients(response).map(|v| v.len()),
            Table::Rentals => c.parse_list_rentals(response).map(|v| v.len()),
            Table::Payments => c.parse_list_payments(response).map(|v| v.len()),
            Table::MoneyRecords => c.parse_list_money_records(response).map(|v| v.len()),
        };

        if let Some(expected_error) = case.get("expected_error") {
            assert_store_error(name, result.unwrap_err(), expected_error);
        } else {
            assert_eq!(result.unwrap() as u64, case["expected_count"].as_u64().unwrap(), "{name}: count");
        }
    }
}

// ---------------------------------------------------------------------------
// Insert
// ---------------------------------------------------------------------------

#[test]
fn insert_test_vectors() {
    let raw = include_str!("../../test-vectors/insert.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = case["input"].clone();

        let (req, created_id) = match parse_table(case["table"].as_str().unwrap()) {
            Table::Bikes => {
                let row: NewBike = serde_json::from_value(input).unwrap();
                let req = c.build_insert_bike(&row).unwrap();
                let bike: Bike = c.parse_created(simulated(case)).unwrap();
                (req, bike.id)
            }
            Table::Clients => {
                let row: NewClient = serde_json::from_value(input).unwrap();
                let req = c.build_insert_client(&row).unwrap();
                let client: Client = c.parse_created(simulated(case)).unwrap();
                (req, client.id)
            }
            Table::Payments => {
                let row: NewPayment = serde_json::from_value(input).unwrap();
                let req = c.build_insert_payment(&row).unwrap();
                let payment: Payment = c.parse_created(simulated(case)).unwrap();
                (req, payment.id)
            }
            Table::MoneyRecords => {
                let row: NewMoneyRecord = serde_json::from_value(input).unwrap();
                let req = c.build_insert_money_record(&row).unwrap();
                let record: MoneyRecord = c.parse_created(simulated(case)).unwrap();
                (req, record.id)
            }
            Table::Rentals => panic!("{name}: rental inserts are covered by unit tests"),
        };

        assert_request(name, &req, &case["expected_request"]);
        assert_eq!(req.header("prefer"), Some("return=representation"), "{name}: prefer");
        assert_eq!(created_id, case["expected_id"].as_i64().unwrap(), "{name}: id");
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[test]
fn update_test_vectors() {
    let raw = include_str!("../../test-vectors/update.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let id = case["input_id"].as_i64().unwrap();
        let input = case["input"].clone();

        let req = match parse_table(case["table"].as_str().unwrap()) {
            Table::Bikes => {
                let patch: BikeStatusUpdate = serde_json::from_value(input).unwrap();
                c.build_set_bike_status(id, patch.status).unwrap()
            }
            Table::Rentals => {
                let patch: RentalReturn = serde_json::from_value(input).unwrap();
                c.build_close_rental(id, &patch).unwrap()
            }
            other => panic!("{name}: {} is never updated", other.as_str()),
        };
        assert_request(name, &req, &case["expected_request"]);
        assert_eq!(req.header("prefer"), Some("return=minimal"), "{name}: prefer");

        let result = c.parse_updated(simulated(case));
        if let Some(expected_error) = case.get("expected_error") {
            assert_store_error(name, result.unwrap_err(), expected_error);
        } else {
            assert!(result.is_ok(), "{name}: expected success");
        }
    }
}
