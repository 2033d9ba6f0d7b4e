//! MCP Common - Shared utilities for MCP servers
//!
//! This crate provides common functionality used across MCP servers:
//!
//! - **Initialization**: `init_tracing` for stderr logging setup
//! - **Results**: Helper functions for creating `CallToolResult` envelopes
//! - **Errors**: Traits for converting errors to MCP-compatible format
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{json_success, text_error};
//!
//! // In tool implementations - replaces 3-4 lines each
//! fn my_tool(&self) -> Result<CallToolResult, McpError> {
//!     match get_some_data() {
//!         Ok(data) => json_success(&data),
//!         Err(e) => Ok(text_error(format!("lookup failed: {}", e))),
//!     }
//! }
//! ```

pub mod error;
pub mod init;
pub mod result;

// Re-export commonly used items at crate root
pub use error::{internal_error, invalid_params, method_not_found, IntoMcpError, McpResult, ResultExt};
pub use init::init_tracing;
pub use result::{json_success, text_error, text_success};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content, Tool},
    ErrorData as McpError,
};
