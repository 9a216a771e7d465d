//! Infrastructure adapters. Implement outbound ports and serve the inbound HTTP surface.
//!
//! Ad platform APIs, analysis service, chat delivery, SQLite. Map errors to DomainError.

pub mod ads;
pub mod ai;
pub mod chat;
pub mod http;
pub mod persistence;
