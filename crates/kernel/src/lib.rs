//! Tessera Kernel Library
//!
//! Multi-tenant content management: tenant-scoped content services, the
//! section and block content model, tenant cloning and deployment helpers.
//! The server and CLI entry point is the `tessera` binary.

pub mod cache;
pub mod config;
pub mod content;
pub mod db;
pub mod deploy;
pub mod error;
pub mod file;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod tenant;
