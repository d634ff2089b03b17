//! Ports for the event log service.

pub mod inbound;

pub use inbound::EventLogApi;
