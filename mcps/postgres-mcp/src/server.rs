//! MCP server implementation for the PostgreSQL adapter
//!
//! Exposes four tools (`test_connection`, `execute_query` with a `query`
//! alias, `create_table`, `insert_data`) and one resource family
//! (`postgres://<table>/schema`). Tool failures are reported inside
//! error-flagged tool results; only unknown tool names and malformed
//! resource URIs surface as protocol errors.

use std::sync::Arc;

use mcp_common::{
    invalid_params, json_success, method_not_found, text_error, text_success, CallToolResult,
    McpError, Tool,
};
use rmcp::{
    model::{
        AnnotateAble, CallToolRequestParam, JsonObject, ListResourcesResult, ListToolsResult,
        PaginatedRequestParam, RawResource, ReadResourceRequestParam, ReadResourceResult,
        ResourceContents, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    RoleServer, ServerHandler,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::catalog;
use crate::config::{ConnectionConfig, CredentialSource};
use crate::db::{self, ConnectionProvider};
use crate::error::{AdapterError, AdapterResult};
use crate::params::{
    ConnectionArgs, CreateTableParams, InsertDataParams, QueryParams, TestConnectionParams,
};

/// The PostgreSQL MCP Server
pub struct PostgresMcpServer {
    credentials: CredentialSource,
    provider: ConnectionProvider,
}

impl PostgresMcpServer {
    /// Fixed-credential mode: one pool built from the startup config
    pub async fn fixed(config: ConnectionConfig, pool_size: u32) -> AdapterResult<Self> {
        let provider = ConnectionProvider::pooled(&config, pool_size).await?;
        Ok(Self {
            credentials: CredentialSource::Fixed(config),
            provider,
        })
    }

    /// Per-call mode: every tool call carries its own credentials
    pub fn per_call() -> Self {
        Self {
            credentials: CredentialSource::PerCall,
            provider: ConnectionProvider::PerCall,
        }
    }

    fn per_call_mode(&self) -> bool {
        matches!(self.credentials, CredentialSource::PerCall)
    }
}

// ============================================================================
// Tool definitions
// ============================================================================

/// Wrap a JSON schema object for a tool definition
fn schema(value: Value) -> Arc<JsonObject> {
    match value {
        Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    }
}

/// Add `url` / `username` / `password` to a tool schema in per-call mode
fn with_credentials(base: Value, per_call: bool) -> Arc<JsonObject> {
    if !per_call {
        return schema(base);
    }
    let mut root = match base {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    if let Some(Value::Object(props)) = root.get_mut("properties") {
        props.insert(
            "url".into(),
            json!({"type": "string", "description": "PostgreSQL connection URL"}),
        );
        props.insert(
            "username".into(),
            json!({"type": "string", "description": "Database username"}),
        );
        props.insert(
            "password".into(),
            json!({"type": "string", "description": "Database password"}),
        );
    }
    if let Some(Value::Array(required)) = root.get_mut("required") {
        required.push(json!("url"));
        required.push(json!("username"));
        required.push(json!("password"));
    }
    Arc::new(root)
}

impl PostgresMcpServer {
    fn tool_definitions(&self) -> Vec<Tool> {
        let per_call = self.per_call_mode();

        let query_schema = json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "SQL query to run. Executed inside a read-only transaction; writes are rejected or rolled back."
                }
            },
            "required": ["sql"]
        });

        vec![
            Tool::new(
                "test_connection",
                "Verify that the server can reach the PostgreSQL database. Returns a confirmation message on success.",
                with_credentials(
                    json!({"type": "object", "properties": {}, "required": []}),
                    per_call,
                ),
            ),
            // dispatch also accepts "query" as an unlisted back-compat alias
            Tool::new(
                "execute_query",
                "Execute a read-only SQL query and return the rows as JSON.",
                with_credentials(query_schema, per_call),
            ),
            Tool::new(
                "create_table",
                "Create a new table from a list of column definitions.",
                with_credentials(
                    json!({
                        "type": "object",
                        "properties": {
                            "tableName": {"type": "string", "description": "Name of the table to create"},
                            "columns": {
                                "type": "array",
                                "description": "Column definitions",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "name": {"type": "string", "description": "Column name"},
                                        "type": {"type": "string", "description": "PostgreSQL column type, e.g. 'integer' or 'text not null'"}
                                    },
                                    "required": ["name", "type"]
                                }
                            }
                        },
                        "required": ["tableName", "columns"]
                    }),
                    per_call,
                ),
            ),
            Tool::new(
                "insert_data",
                "Insert one or more records into a table. Each record is a JSON object keyed by column name. Records are inserted one at a time; on failure, earlier records stay inserted.",
                with_credentials(
                    json!({
                        "type": "object",
                        "properties": {
                            "tableName": {"type": "string", "description": "Name of the target table"},
                            "records": {
                                "type": "array",
                                "description": "Rows to insert, one JSON object per row",
                                "items": {"type": "object"}
                            }
                        },
                        "required": ["tableName", "records"]
                    }),
                    per_call,
                ),
            ),
        ]
    }
}

// ============================================================================
// Tool execution
// ============================================================================

fn parse_args<T: DeserializeOwned>(args: Value) -> AdapterResult<T> {
    serde_json::from_value(args).map_err(|e| AdapterError::InvalidArguments(e.to_string()))
}

impl PostgresMcpServer {
    /// Route one tool call; unknown names are a protocol error
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let args = Value::Object(arguments.unwrap_or_default());
        match name {
            "test_connection" => Ok(self.run_test_connection(args).await),
            "execute_query" | "query" => Ok(self.run_query(args).await),
            "create_table" => Ok(self.run_create_table(args).await),
            "insert_data" => Ok(self.run_insert_data(args).await),
            other => Err(method_not_found(other)),
        }
    }

    /// Resolve credentials for one call and check out a connection
    async fn connect(&self, args: &ConnectionArgs) -> AdapterResult<db::DbHandle> {
        let config = self.credentials.resolve(args)?;
        self.provider.acquire(&config).await
    }

    async fn run_test_connection(&self, args: Value) -> CallToolResult {
        match self.try_test_connection(args).await {
            Ok(()) => text_success("Database connection successful"),
            Err(e) => text_error(format!("Connection failed: {}", e)),
        }
    }

    async fn try_test_connection(&self, args: Value) -> AdapterResult<()> {
        let params: TestConnectionParams = parse_args(args)?;
        let mut handle = self.connect(&params.conn).await?;
        let result = sqlx::query("SELECT 1").execute(handle.conn()).await;
        handle.release().await;
        result?;
        Ok(())
    }

    async fn run_query(&self, args: Value) -> CallToolResult {
        match self.try_query(args).await {
            Ok(rows) => json_success(&rows)
                .unwrap_or_else(|e| text_error(format!("Query failed: {}", e.message))),
            Err(e) => text_error(format!("Query failed: {}", e)),
        }
    }

    async fn try_query(&self, args: Value) -> AdapterResult<Vec<Value>> {
        let params: QueryParams = parse_args(args)?;
        let mut handle = self.connect(&params.conn).await?;
        let result = db::read_only_query(handle.conn(), &params.sql).await;
        handle.release().await;
        result
    }

    async fn run_create_table(&self, args: Value) -> CallToolResult {
        match self.try_create_table(args).await {
            Ok(table) => text_success(format!("Table {} created successfully", table)),
            Err(e) => text_error(format!("Failed to create table: {}", e)),
        }
    }

    async fn try_create_table(&self, args: Value) -> AdapterResult<String> {
        let params: CreateTableParams = parse_args(args)?;
        if params.columns.is_empty() {
            return Err(AdapterError::InvalidArguments(
                "columns must not be empty".to_string(),
            ));
        }
        let sql = db::create_table_sql(&params.table_name, &params.columns);
        tracing::debug!(table = %params.table_name, "creating table");
        let mut handle = self.connect(&params.conn).await?;
        let result = sqlx::query(&sql).execute(handle.conn()).await;
        handle.release().await;
        result?;
        Ok(params.table_name)
    }

    async fn run_insert_data(&self, args: Value) -> CallToolResult {
        match self.try_insert_data(args).await {
            Ok((count, table)) => text_success(format!(
                "Successfully inserted {} record(s) into table {}",
                count, table
            )),
            Err(e) => text_error(format!("Failed to insert data: {}", e)),
        }
    }

    async fn try_insert_data(&self, args: Value) -> AdapterResult<(u64, String)> {
        let params: InsertDataParams = parse_args(args)?;
        if params.records.is_empty() {
            return Err(AdapterError::InvalidArguments(
                "records must not be empty".to_string(),
            ));
        }
        if params.records.iter().any(|record| record.is_empty()) {
            return Err(AdapterError::InvalidArguments(
                "records must not contain empty objects".to_string(),
            ));
        }
        let mut handle = self.connect(&params.conn).await?;
        let result = db::insert_records(handle.conn(), &params.table_name, &params.records).await;
        handle.release().await;
        let count = result?;
        Ok((count, params.table_name))
    }
}

// ============================================================================
// Resource handlers
// ============================================================================

impl PostgresMcpServer {
    /// Schema resources for every table in the public schema
    ///
    /// Per-call mode has no credentials to browse with, so the listing is
    /// empty there. Listing failures also degrade to an empty list rather
    /// than failing the request.
    pub async fn schema_resources(&self) -> Vec<rmcp::model::Resource> {
        let Some(config) = self.credentials.fixed() else {
            return Vec::new();
        };
        let tables = match self.load_tables(config).await {
            Ok(tables) => tables,
            Err(e) => {
                tracing::warn!("failed to list tables for resources: {}", e);
                Vec::new()
            }
        };
        tables
            .into_iter()
            .map(|table| {
                let mut resource = RawResource::new(
                    catalog::schema_uri(&table),
                    format!("\"{}\" database schema", table),
                );
                resource.description = Some(format!("Schema for table {}", table));
                resource.mime_type = Some("application/json".to_string());
                resource.no_annotation()
            })
            .collect()
    }

    async fn load_tables(&self, config: &ConnectionConfig) -> AdapterResult<Vec<String>> {
        let mut handle = self.provider.acquire(config).await?;
        let result = catalog::list_tables(handle.conn()).await;
        handle.release().await;
        result
    }

    /// Read one table's schema, fresh from the catalog on every call
    pub async fn read_schema_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let table = catalog::parse_table_uri(uri).map_err(|e| invalid_params(e.to_string()))?;
        let Some(config) = self.credentials.fixed() else {
            return Err(invalid_params(
                "schema resources require fixed startup credentials",
            ));
        };

        let mut handle = self
            .provider
            .acquire(config)
            .await
            .map_err(|e| mcp_common::internal_error(e.to_string()))?;
        let result = catalog::table_schema(handle.conn(), table).await;
        handle.release().await;
        let columns = result.map_err(|e| mcp_common::internal_error(e.to_string()))?;

        let text = serde_json::to_string_pretty(&columns)
            .map_err(|e| mcp_common::internal_error(e.to_string()))?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri: uri.to_string(),
                mime_type: Some("application/json".to_string()),
                text,
                meta: None,
            }],
        })
    }
}

// ============================================================================
// Protocol handler
// ============================================================================

impl ServerHandler for PostgresMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mode = if self.per_call_mode() {
            "per-call credential"
        } else {
            "fixed credential"
        };
        ServerInfo {
            instructions: Some(format!(
                "PostgreSQL MCP server in {} mode. Use test_connection to verify \
                connectivity, execute_query (or its query alias) to run read-only SQL, \
                create_table to define tables, and insert_data to add records. \
                Table schemas are exposed as postgres://<table>/schema resources.",
                mode
            )),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: self.tool_definitions(),
                ..Default::default()
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            tracing::debug!(tool = %request.name, "tool call");
            self.dispatch(&request.name, request.arguments).await
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            Ok(ListResourcesResult {
                resources: self.schema_resources().await,
                ..Default::default()
            })
        }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move { self.read_schema_resource(&request.uri).await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    fn per_call_server() -> PostgresMcpServer {
        PostgresMcpServer::per_call()
    }

    fn args(value: Value) -> Option<JsonObject> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_a_protocol_error() {
        let server = per_call_server();
        let err = server
            .dispatch("drop_database", None)
            .await
            .expect_err("unknown tool must not produce a tool result");
        assert_eq!(err.code, ErrorCode::METHOD_NOT_FOUND);
        assert!(err.message.contains("drop_database"));
    }

    #[tokio::test]
    async fn missing_sql_yields_error_envelope() {
        let server = per_call_server();
        let result = server
            .dispatch("execute_query", args(json!({})))
            .await
            .expect("data-path failure stays inside the envelope");
        assert!(result.is_error.unwrap_or(false));
        let text = &result.content[0].as_text().unwrap().text;
        assert!(text.starts_with("Query failed:"));
        assert!(text.contains("sql"));
    }

    #[tokio::test]
    async fn query_alias_routes_like_execute_query() {
        let server = per_call_server();
        let result = server
            .dispatch("query", args(json!({})))
            .await
            .expect("alias dispatches to the query handler");
        assert!(result.is_error.unwrap_or(false));
        assert!(result.content[0]
            .as_text()
            .unwrap()
            .text
            .starts_with("Query failed:"));
    }

    #[tokio::test]
    async fn per_call_mode_requires_credentials() {
        let server = per_call_server();
        let result = server
            .dispatch("test_connection", args(json!({})))
            .await
            .expect("missing credentials stay inside the envelope");
        assert!(result.is_error.unwrap_or(false));
        let text = &result.content[0].as_text().unwrap().text;
        assert!(text.starts_with("Connection failed:"));
        assert!(text.contains("url"));
        assert!(text.contains("username"));
        assert!(text.contains("password"));
    }

    #[tokio::test]
    async fn create_table_rejects_empty_columns() {
        let server = per_call_server();
        let result = server
            .dispatch(
                "create_table",
                args(json!({"tableName": "t", "columns": []})),
            )
            .await
            .expect("validation failure stays inside the envelope");
        assert!(result.is_error.unwrap_or(false));
        assert!(result.content[0]
            .as_text()
            .unwrap()
            .text
            .starts_with("Failed to create table:"));
    }

    #[tokio::test]
    async fn insert_data_rejects_empty_records() {
        let server = per_call_server();
        let result = server
            .dispatch(
                "insert_data",
                args(json!({"tableName": "t", "records": []})),
            )
            .await
            .expect("validation failure stays inside the envelope");
        assert!(result.is_error.unwrap_or(false));
        assert!(result.content[0]
            .as_text()
            .unwrap()
            .text
            .starts_with("Failed to insert data:"));
    }

    #[tokio::test]
    async fn insert_data_rejects_empty_record_objects() {
        let server = per_call_server();
        let result = server
            .dispatch(
                "insert_data",
                args(json!({"tableName": "t", "records": [{"id": 1}, {}]})),
            )
            .await
            .expect("validation failure stays inside the envelope");
        assert!(result.is_error.unwrap_or(false));
        let text = &result.content[0].as_text().unwrap().text;
        assert!(text.starts_with("Failed to insert data:"));
        assert!(text.contains("empty objects"));
    }

    #[test]
    fn per_call_schemas_require_credentials() {
        let server = per_call_server();
        let tools = server.tool_definitions();
        let query = tools
            .iter()
            .find(|t| t.name == "execute_query")
            .expect("execute_query is always defined");
        let required = query.input_schema["required"]
            .as_array()
            .expect("required array present");
        for field in ["sql", "url", "username", "password"] {
            assert!(
                required.iter().any(|v| v.as_str() == Some(field)),
                "missing {}",
                field
            );
        }
    }

    #[test]
    fn fixed_schemas_omit_credentials() {
        let schema = with_credentials(
            json!({"type": "object", "properties": {}, "required": []}),
            false,
        );
        assert!(schema["properties"].as_object().map(|p| p.is_empty()).unwrap_or(false));
    }

    #[test]
    fn tool_catalog_covers_all_operations() {
        let server = per_call_server();
        let names: Vec<_> = server
            .tool_definitions()
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        for name in ["test_connection", "execute_query", "create_table", "insert_data"] {
            assert!(names.contains(&name.to_string()), "missing tool {}", name);
        }
        // the alias dispatches but is not a separate catalog entry
        assert!(!names.contains(&"query".to_string()));
    }

    #[tokio::test]
    async fn read_resource_rejects_foreign_uri() {
        let server = per_call_server();
        let err = server
            .read_schema_resource("mysql://users/schema")
            .await
            .expect_err("foreign scheme is invalid");
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn per_call_mode_lists_no_resources() {
        let server = per_call_server();
        assert!(server.schema_resources().await.is_empty());
    }
}
