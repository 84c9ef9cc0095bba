//! Core data model: addresses, decoded messages, and fetch windows.

pub mod address;
pub mod email;
pub mod window;
