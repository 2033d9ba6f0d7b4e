//! Connection provider and SQL plumbing
//!
//! Owns the two connection strategies (a bounded pool built once at startup,
//! or a fresh connection per call), row-to-JSON serialization for arbitrary
//! query results, and the statement builders for the DDL/DML tools.
//! Identifiers are always double-quoted; values always travel as binds.

use serde_json::{json, Value};
use sqlx::postgres::{PgArguments, PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{pool::PoolConnection, query::Query, Column, Connection, Postgres, Row, TypeInfo};

use crate::config::ConnectionConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::params::ColumnDefinition;

// ============================================================================
// Connection Provider
// ============================================================================

/// Supplies database connections for tool and resource handlers
pub enum ConnectionProvider {
    /// Bounded pool created once from the fixed startup config
    Pooled(PgPool),
    /// A brand-new connection per operation, from per-call credentials
    PerCall,
}

impl ConnectionProvider {
    /// Build the pooled variant, connecting eagerly so bad startup
    /// credentials fail before the server starts serving
    pub async fn pooled(config: &ConnectionConfig, pool_size: u32) -> AdapterResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect_with(config.pg_options()?)
            .await
            .map_err(AdapterError::Connection)?;
        tracing::info!(pool_size, "created PostgreSQL connection pool");
        Ok(ConnectionProvider::Pooled(pool))
    }

    /// Check out a connection for one operation
    ///
    /// The pooled variant ignores `config` (credentials were fixed at
    /// startup); the per-call variant dials a fresh connection from it.
    pub async fn acquire(&self, config: &ConnectionConfig) -> AdapterResult<DbHandle> {
        match self {
            ConnectionProvider::Pooled(pool) => {
                let conn = pool.acquire().await.map_err(AdapterError::Connection)?;
                Ok(DbHandle::Pooled(conn))
            }
            ConnectionProvider::PerCall => {
                let conn = PgConnection::connect_with(&config.pg_options()?)
                    .await
                    .map_err(AdapterError::Connection)?;
                Ok(DbHandle::Direct(conn))
            }
        }
    }
}

/// One checked-out connection, exclusively owned by the current invocation
pub enum DbHandle {
    Pooled(PoolConnection<Postgres>),
    Direct(PgConnection),
}

impl DbHandle {
    /// The underlying connection, for running statements
    pub fn conn(&mut self) -> &mut PgConnection {
        match self {
            DbHandle::Pooled(conn) => &mut **conn,
            DbHandle::Direct(conn) => conn,
        }
    }

    /// Return the connection to its origin
    ///
    /// Pooled connections go back to the pool; direct connections are closed
    /// with a proper termination message. Dropping the handle instead of
    /// calling this still releases the connection, just less gracefully for
    /// the direct variant.
    pub async fn release(self) {
        match self {
            DbHandle::Pooled(_) => {}
            DbHandle::Direct(conn) => {
                if let Err(e) = conn.close().await {
                    tracing::debug!("error closing connection: {}", e);
                }
            }
        }
    }
}

// ============================================================================
// Query execution
// ============================================================================

/// Run one SQL statement inside a read-only transaction
///
/// The transaction is always rolled back, so even statements that slip past
/// `READ ONLY` enforcement (DDL on temp objects, say) leave nothing behind.
pub async fn read_only_query(conn: &mut PgConnection, sql: &str) -> AdapterResult<Vec<Value>> {
    let mut tx = conn.begin().await?;
    sqlx::query("SET TRANSACTION READ ONLY")
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query(sql).fetch_all(&mut *tx).await;
    if let Err(e) = tx.rollback().await {
        tracing::warn!("rollback after read-only query failed: {}", e);
    }
    let rows = result?;
    Ok(rows.iter().map(row_to_json).collect())
}

/// Insert records one statement at a time
///
/// Inserts are not wrapped in a transaction: a failure part-way through
/// leaves the earlier rows committed, and the error reports the first
/// record that failed.
pub async fn insert_records(
    conn: &mut PgConnection,
    table: &str,
    records: &[serde_json::Map<String, Value>],
) -> AdapterResult<u64> {
    let mut inserted = 0u64;
    for record in records {
        let columns: Vec<&String> = record.keys().collect();
        let sql = insert_sql(table, &columns);
        let mut query = sqlx::query(&sql);
        for (_, value) in record.iter() {
            query = bind_json_value(query, value);
        }
        query.execute(&mut *conn).await?;
        inserted += 1;
    }
    Ok(inserted)
}

// ============================================================================
// Row serialization
// ============================================================================

/// Convert a result row into a JSON object keyed by column name
///
/// Columns are decoded by postgres type name; NULLs and types we cannot
/// decode become JSON null rather than failing the whole result.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut map = serde_json::Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_to_json(row, idx, column.type_info().name());
        map.insert(column.name().to_string(), value);
    }
    Value::Object(map)
}

fn column_to_json(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "INT2" => decode(row.try_get::<Option<i16>, _>(idx)),
        "INT4" => decode(row.try_get::<Option<i32>, _>(idx)),
        "INT8" => decode(row.try_get::<Option<i64>, _>(idx)),
        "FLOAT4" => decode(row.try_get::<Option<f32>, _>(idx)),
        "FLOAT8" => decode(row.try_get::<Option<f64>, _>(idx)),
        "BOOL" => decode(row.try_get::<Option<bool>, _>(idx)),
        "NUMERIC" => match row.try_get::<Option<rust_decimal::Decimal>, _>(idx) {
            Ok(Some(d)) => json!(d.to_string()),
            _ => Value::Null,
        },
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx).ok().flatten().unwrap_or(Value::Null),
        "UUID" => match row.try_get::<Option<uuid::Uuid>, _>(idx) {
            Ok(Some(u)) => json!(u.to_string()),
            _ => Value::Null,
        },
        "TIMESTAMPTZ" => match row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            Ok(Some(ts)) => json!(ts.to_rfc3339()),
            _ => Value::Null,
        },
        "TIMESTAMP" => match row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            Ok(Some(ts)) => json!(ts.to_string()),
            _ => Value::Null,
        },
        "DATE" => match row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            Ok(Some(d)) => json!(d.to_string()),
            _ => Value::Null,
        },
        // TEXT, VARCHAR, CHAR, NAME, and anything else with a textual decode
        _ => decode(row.try_get::<Option<String>, _>(idx)),
    }
}

fn decode<T: serde::Serialize>(value: Result<Option<T>, sqlx::Error>) -> Value {
    match value {
        Ok(Some(v)) => json!(v),
        _ => Value::Null,
    }
}

// ============================================================================
// Statement building
// ============================================================================

/// Double-quote an identifier, escaping embedded quotes
///
/// This is the injection guard for table and column names, which cannot be
/// sent as bind parameters.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Build the `CREATE TABLE` statement for `create_table`
///
/// Identifiers are quoted; column type text is passed through for the
/// database itself to validate.
pub fn create_table_sql(table: &str, columns: &[ColumnDefinition]) -> String {
    let definitions: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.data_type))
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(table),
        definitions.join(", ")
    )
}

/// Build a parameterized `INSERT` statement for one record's columns
pub fn insert_sql(table: &str, columns: &[&String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        quoted.join(", "),
        placeholders.join(", ")
    )
}

/// How a JSON number travels to the database
#[derive(Debug, PartialEq)]
enum NumberBind {
    /// Fits in a signed 64-bit integer
    Int(i64),
    /// Unsigned value above `i64::MAX`; sent as NUMERIC to keep it exact
    Big(rust_decimal::Decimal),
    Float(f64),
}

fn classify_number(n: &serde_json::Number) -> Option<NumberBind> {
    if let Some(i) = n.as_i64() {
        Some(NumberBind::Int(i))
    } else if let Some(u) = n.as_u64() {
        Some(NumberBind::Big(rust_decimal::Decimal::from(u)))
    } else {
        n.as_f64().map(NumberBind::Float)
    }
}

/// Attach one JSON value to a query as a typed bind parameter
pub fn bind_json_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match classify_number(n) {
            Some(NumberBind::Int(i)) => query.bind(i),
            Some(NumberBind::Big(d)) => query.bind(d),
            Some(NumberBind::Float(f)) => query.bind(f),
            None => query.bind(None::<f64>),
        },
        Value::String(s) => query.bind(s.as_str()),
        // Arrays and objects travel as jsonb
        other => query.bind(other),
    }
}
