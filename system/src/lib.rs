mod client_board;
mod document;
mod message;
mod presence;
mod types;

pub use client_board::*;
pub use document::*;
pub use message::*;
pub use presence::*;
pub use types::*;

pub extern crate serde;
pub extern crate serde_json;
