//! PostgreSQL MCP Library
//!
//! MCP server that exposes a PostgreSQL database as tools and resources:
//! connection checks, read-only queries, table creation, record insertion,
//! and live table schemas as `postgres://<table>/schema` resources.
//!
//! Credentials come from exactly one of two places, chosen at startup:
//! the environment (fixed mode, with a shared connection pool) or each
//! individual tool call (per-call mode, one connection per operation).
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use postgres_mcp::PostgresMcpServer;
//!
//! let server = PostgresMcpServer::per_call();
//! // Use with in-memory transport or serve via stdio
//! ```

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod params;
pub mod server;

// Re-export main server type
pub use server::PostgresMcpServer;

// Re-export configuration and parameter types for direct API usage
pub use config::{ConnectionConfig, CredentialSource};
pub use error::{AdapterError, AdapterResult};
pub use params::*;
