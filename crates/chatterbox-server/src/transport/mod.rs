//! Transport layer.

pub mod websocket;
