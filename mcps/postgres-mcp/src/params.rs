//! Parameter types for PostgreSQL MCP tools
//!
//! Field names follow the wire contract: `tableName`, `columns[].type` and
//! `records` arrive camelCase from callers, connection credentials arrive as
//! plain `url` / `username` / `password`.

use serde::Deserialize;

/// Optional per-call connection credentials
///
/// Present on every tool's arguments in per-call credential mode; ignored in
/// fixed-credential mode. The two deployment modes are never combined.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectionArgs {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Arguments for the `test_connection` tool
#[derive(Debug, Default, Deserialize)]
pub struct TestConnectionParams {
    #[serde(flatten)]
    pub conn: ConnectionArgs,
}

/// Arguments for the `execute_query` tool (and its `query` alias)
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    /// SQL statement to run inside a read-only transaction
    pub sql: String,

    #[serde(flatten)]
    pub conn: ConnectionArgs,
}

/// A single column in a `create_table` request
#[derive(Debug, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Arguments for the `create_table` tool
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableParams {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,

    #[serde(flatten)]
    pub conn: ConnectionArgs,
}

/// Arguments for the `insert_data` tool
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertDataParams {
    pub table_name: String,
    /// One JSON object per row; keys are column names
    pub records: Vec<serde_json::Map<String, serde_json::Value>>,

    #[serde(flatten)]
    pub conn: ConnectionArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_params_require_sql() {
        let err = serde_json::from_value::<QueryParams>(json!({})).unwrap_err();
        assert!(err.to_string().contains("sql"));
    }

    #[test]
    fn create_table_params_are_camel_case() {
        let params: CreateTableParams = serde_json::from_value(json!({
            "tableName": "users",
            "columns": [{"name": "id", "type": "integer"}]
        }))
        .unwrap();
        assert_eq!(params.table_name, "users");
        assert_eq!(params.columns[0].name, "id");
        assert_eq!(params.columns[0].data_type, "integer");
        assert!(params.conn.url.is_none());
    }

    #[test]
    fn connection_args_flatten_from_top_level() {
        let params: QueryParams = serde_json::from_value(json!({
            "sql": "SELECT 1",
            "url": "postgres://db/app",
            "username": "app",
            "password": "secret"
        }))
        .unwrap();
        assert_eq!(params.conn.url.as_deref(), Some("postgres://db/app"));
        assert_eq!(params.conn.username.as_deref(), Some("app"));
        assert_eq!(params.conn.password.as_deref(), Some("secret"));
    }

    #[test]
    fn insert_data_params_take_record_objects() {
        let params: InsertDataParams = serde_json::from_value(json!({
            "tableName": "t",
            "records": [{"a": 1}, {"a": 2, "b": "x"}]
        }))
        .unwrap();
        assert_eq!(params.records.len(), 2);
        assert_eq!(params.records[1]["b"], json!("x"));
    }

    #[test]
    fn insert_data_params_require_records() {
        let err =
            serde_json::from_value::<InsertDataParams>(json!({"tableName": "t"})).unwrap_err();
        assert!(err.to_string().contains("records"));
    }
}
