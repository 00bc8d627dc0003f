//! HTTP surface of the proxy.

pub mod chat;
pub mod health;
pub mod request_id;
