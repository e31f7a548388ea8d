//! In-memory stand-in for the hosted REST backend.
//!
//! Serves `GET`, `POST` and `PATCH` on `/rest/v1/{table}` for the five rental
//! tables with the slice of PostgREST behavior the store relies on:
//! `select=*`, `column=eq.value` filters, `order=column.asc|desc`, `limit`,
//! `Prefer: return=representation|minimal` and the single-object `Accept`
//! type. Errors use PostgREST's `{code, message, details, hint}` body.
//!
//! Rows are kept as plain JSON objects; the server does not know about
//! decimals or timestamps beyond assigning `created_at` on payments.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub type Row = Map<String, Value>;

/// Table name and its columns, `id` first.
pub const SCHEMA: [(&str, &[&str]); 5] = [
    ("bikes", &["id", "name", "model", "price_per_day", "status"]),
    ("clients", &["id", "name", "phone"]),
    (
        "rentals",
        &["id", "bike_id", "client_id", "start", "end", "deposit", "paid", "price_total"],
    ),
    ("payments", &["id", "rental_id", "amount", "note", "created_at"]),
    ("money_records", &["id", "kind", "date", "name", "amount"]),
];

fn columns(table: &str) -> Option<&'static [&'static str]> {
    SCHEMA.iter().find(|(name, _)| *name == table).map(|(_, cols)| *cols)
}

/// Rows per table plus the next id each table hands out.
#[derive(Debug, Default)]
pub struct Tables {
    rows: HashMap<String, Vec<Row>>,
    last_id: HashMap<String, i64>,
}

impl Tables {
    /// Store a row, filling absent columns with `null`, and return it as stored.
    pub fn insert(&mut self, table: &str, mut row: Row) -> Row {
        let last = self.last_id.entry(table.to_string()).or_insert(0);
        *last += 1;
        row.insert("id".to_string(), Value::from(*last));
        if table == "payments" && row.get("created_at").map_or(true, Value::is_null) {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            row.insert("created_at".to_string(), Value::String(now));
        }
        for col in columns(table).unwrap_or_default() {
            row.entry(col.to_string()).or_insert(Value::Null);
        }
        self.rows.entry(table.to_string()).or_default().push(row.clone());
        row
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.rows.get(table).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Knobs for tests: an access key to enforce and tables to fail on purpose.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub api_key: Option<String>,
    pub unavailable: HashSet<String>,
}

impl ServerConfig {
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Every request to `table` answers 503.
    pub fn with_unavailable(mut self, table: &str) -> Self {
        self.unavailable.insert(table.to_string());
        self
    }
}

#[derive(Clone)]
struct AppState {
    db: Arc<RwLock<Tables>>,
    config: Arc<ServerConfig>,
}

#[derive(Debug, Serialize)]
struct PgError {
    code: &'static str,
    message: String,
    details: Option<String>,
    hint: Option<String>,
}

fn pg_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    let body = PgError {
        code,
        message: message.into(),
        details: None,
        hint: None,
    };
    (status, Json(body)).into_response()
}

pub fn app() -> Router {
    app_with(ServerConfig::default())
}

pub fn app_with(config: ServerConfig) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Tables::default())),
        config: Arc::new(config),
    };
    Router::new()
        .route(
            "/rest/v1/{table}",
            get(select_rows).post(insert_rows).patch(update_rows),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, ServerConfig::default()).await
}

pub async fn run_with(listener: TcpListener, config: ServerConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

/// Key check, table lookup and forced outages, in that order.
fn guard(state: &AppState, table: &str, headers: &HeaderMap) -> Result<&'static [&'static str], Response> {
    if let Some(expected) = &state.config.api_key {
        let given = headers.get("apikey").and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            return Err(pg_error(StatusCode::UNAUTHORIZED, "PGRST301", "Invalid API key"));
        }
    }
    let Some(cols) = columns(table) else {
        return Err(pg_error(
            StatusCode::NOT_FOUND,
            "PGRST205",
            format!("Could not find the table 'public.{table}' in the schema cache"),
        ));
    };
    if state.config.unavailable.contains(table) {
        return Err(pg_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "PGRST002",
            format!("table '{table}' is temporarily unavailable"),
        ));
    }
    Ok(cols)
}

fn header_contains(headers: &HeaderMap, name: impl header::AsHeaderName, needle: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(needle))
}

/// Parsed query string of a table request.
#[derive(Debug, Default, PartialEq)]
pub struct Filters {
    pub eq: Vec<(String, String)>,
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
}

impl Filters {
    pub fn parse(params: &[(String, String)]) -> Result<Self, String> {
        let mut filters = Filters::default();
        for (key, value) in params {
            match key.as_str() {
                "select" => {}
                "order" => {
                    let (col, dir) = value.split_once('.').unwrap_or((value.as_str(), "asc"));
                    let ascending = match dir {
                        "asc" => true,
                        "desc" => false,
                        other => return Err(format!("unsupported order direction '{other}'")),
                    };
                    filters.order = Some((col.to_string(), ascending));
                }
                "limit" => {
                    let n = value.parse().map_err(|_| format!("invalid limit '{value}'"))?;
                    filters.limit = Some(n);
                }
                col => {
                    let Some(expected) = value.strip_prefix("eq.") else {
                        return Err(format!("unsupported filter '{col}={value}'"));
                    };
                    filters.eq.push((col.to_string(), expected.to_string()));
                }
            }
        }
        Ok(filters)
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.eq
            .iter()
            .all(|(col, expected)| row.get(col).map(render) == Some(expected.clone()))
    }
}

/// How a column value reads inside an `eq.` filter.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Nulls sort after everything else; mixed types compare equal.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn unknown_column(table: &str, cols: &[&str], row: &Row) -> Option<Response> {
    row.keys().find(|k| !cols.contains(&k.as_str())).map(|k| {
        pg_error(
            StatusCode::BAD_REQUEST,
            "PGRST204",
            format!("Could not find the '{k}' column of '{table}' in the schema cache"),
        )
    })
}

async fn select_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    if let Err(rejection) = guard(&state, &table, &headers) {
        return rejection;
    }
    let filters = match Filters::parse(&params) {
        Ok(f) => f,
        Err(msg) => return pg_error(StatusCode::BAD_REQUEST, "PGRST100", msg),
    };

    let db = state.db.read().await;
    let mut rows: Vec<Row> = db
        .rows(&table)
        .iter()
        .filter(|row| filters.matches(row))
        .cloned()
        .collect();
    if let Some((col, ascending)) = &filters.order {
        rows.sort_by(|a, b| {
            let ord = compare(a.get(col), b.get(col));
            if *ascending {
                ord
            } else {
                ord.reverse()
            }
        });
    }
    if let Some(limit) = filters.limit {
        rows.truncate(limit);
    }
    tracing::debug!(table = %table, count = rows.len(), "select");
    Json(rows).into_response()
}

async fn insert_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let cols = match guard(&state, &table, &headers) {
        Ok(cols) => cols,
        Err(rejection) => return rejection,
    };

    let incoming: Vec<Row> = match body {
        Value::Object(row) => vec![row],
        Value::Array(items) => {
            let mut rows = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(row) => rows.push(row),
                    _ => return pg_error(StatusCode::BAD_REQUEST, "PGRST102", "All object keys must match"),
                }
            }
            rows
        }
        _ => return pg_error(StatusCode::BAD_REQUEST, "PGRST102", "Empty or invalid json"),
    };
    for row in &incoming {
        if let Some(rejection) = unknown_column(&table, cols, row) {
            return rejection;
        }
    }

    let single = header_contains(&headers, header::ACCEPT, "vnd.pgrst.object");
    if single && incoming.len() != 1 {
        return pg_error(
            StatusCode::NOT_ACCEPTABLE,
            "PGRST116",
            "JSON object requested, multiple (or no) rows returned",
        );
    }

    let mut db = state.db.write().await;
    let created: Vec<Row> = incoming.into_iter().map(|row| db.insert(&table, row)).collect();
    tracing::debug!(table = %table, count = created.len(), "insert");

    if !header_contains(&headers, "prefer", "return=representation") {
        return StatusCode::CREATED.into_response();
    }
    if single {
        (StatusCode::CREATED, Json(Value::Object(created[0].clone()))).into_response()
    } else {
        (StatusCode::CREATED, Json(created)).into_response()
    }
}

async fn update_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
    Json(body): Json<Value>,
) -> Response {
    let cols = match guard(&state, &table, &headers) {
        Ok(cols) => cols,
        Err(rejection) => return rejection,
    };
    let filters = match Filters::parse(&params) {
        Ok(f) => f,
        Err(msg) => return pg_error(StatusCode::BAD_REQUEST, "PGRST100", msg),
    };
    let Value::Object(patch) = body else {
        return pg_error(StatusCode::BAD_REQUEST, "PGRST102", "Empty or invalid json");
    };
    if let Some(rejection) = unknown_column(&table, cols, &patch) {
        return rejection;
    }

    let mut db = state.db.write().await;
    let mut updated = Vec::new();
    if let Some(rows) = db.rows.get_mut(&table) {
        for row in rows.iter_mut().filter(|row| filters.matches(row)) {
            for (col, value) in &patch {
                if col != "id" {
                    row.insert(col.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
    }
    tracing::debug!(table = %table, count = updated.len(), "update");

    if header_contains(&headers, "prefer", "return=representation") {
        (StatusCode::OK, Json(updated)).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}
