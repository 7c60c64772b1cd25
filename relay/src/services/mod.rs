//! Relay services: pure-ish business logic shared by the WS and HTTP routes.

pub mod object;
pub mod project;
pub mod room;
