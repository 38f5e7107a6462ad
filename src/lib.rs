//! homerelay - bridges a home-automation hub's WebSocket API to lightweight
//! display clients.
//!
//! The crate is organized as a small set of modules wired together by a
//! dependency-aware loader:
//! - `modules`: descriptor parsing, registry and lifecycle contract
//! - `upstream`: the single authenticated hub connection (WebSocket + HTTP)
//! - `relay`: the downstream WebSocket server the displays connect to
//! - `logger`, `config`, `arguments`: shared infrastructure

pub mod arguments;
pub mod config;
pub mod logger;
pub mod modules;
pub mod relay;
pub mod upstream;
