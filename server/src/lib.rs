pub mod auth;
pub mod connection;
mod outbox;
pub mod room;
pub mod server;
