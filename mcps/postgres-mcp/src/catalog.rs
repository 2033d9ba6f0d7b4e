//! Schema catalog queries backing the resource surface
//!
//! Every resource read goes straight to `information_schema`; nothing is
//! cached, so callers always see the live catalog.

use serde::Serialize;
use sqlx::postgres::PgConnection;
use sqlx::Row;

use crate::error::{AdapterError, AdapterResult};

/// Tables visible to resource listing (user tables in the default schema)
const LIST_TABLES_SQL: &str =
    "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'";

/// Column name and type for one table, in declaration order
const TABLE_SCHEMA_SQL: &str = "SELECT column_name, data_type \
     FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position";

/// One column as exposed in a schema resource document
#[derive(Debug, Serialize)]
pub struct TableColumn {
    pub column_name: String,
    pub data_type: String,
}

/// Build the resource URI for a table's schema
pub fn schema_uri(table: &str) -> String {
    format!("postgres://{}/schema", table)
}

/// Extract the table name from a `postgres://<table>/schema` URI
pub fn parse_table_uri(uri: &str) -> AdapterResult<&str> {
    let parts: Vec<&str> = uri.split('/').collect();
    match parts.as_slice() {
        ["postgres:", "", table, "schema"] if !table.is_empty() => Ok(table),
        _ => Err(AdapterError::InvalidUri(uri.to_string())),
    }
}

/// Names of all tables in the `public` schema
pub async fn list_tables(conn: &mut PgConnection) -> AdapterResult<Vec<String>> {
    let rows = sqlx::query(LIST_TABLES_SQL).fetch_all(conn).await?;
    let mut tables = Vec::with_capacity(rows.len());
    for row in rows {
        tables.push(row.try_get("table_name")?);
    }
    Ok(tables)
}

/// Columns of one table, ordered by ordinal position
///
/// An unknown table yields an empty list, mirroring what the catalog itself
/// returns.
pub async fn table_schema(conn: &mut PgConnection, table: &str) -> AdapterResult<Vec<TableColumn>> {
    let rows = sqlx::query(TABLE_SCHEMA_SQL)
        .bind(table)
        .fetch_all(conn)
        .await?;
    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        columns.push(TableColumn {
            column_name: row.try_get("column_name")?,
            data_type: row.try_get("data_type")?,
        });
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_uri_round_trips_through_parse() {
        let uri = schema_uri("users");
        assert_eq!(uri, "postgres://users/schema");
        assert_eq!(parse_table_uri(&uri).unwrap(), "users");
    }

    #[test]
    fn parse_rejects_wrong_scheme() {
        assert!(parse_table_uri("mysql://users/schema").is_err());
    }

    #[test]
    fn parse_rejects_missing_schema_suffix() {
        assert!(parse_table_uri("postgres://users").is_err());
        assert!(parse_table_uri("postgres://users/data").is_err());
    }

    #[test]
    fn parse_rejects_extra_path_segments() {
        assert!(parse_table_uri("postgres://users/schema/extra").is_err());
    }

    #[test]
    fn parse_rejects_empty_table() {
        assert!(parse_table_uri("postgres:///schema").is_err());
    }
}
