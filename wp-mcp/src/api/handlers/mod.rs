// API handlers for the MCP server
//
// This module contains the request handlers for the MCP server API endpoints.
// Handlers process incoming requests and return appropriate responses.

pub mod mcp;
