#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate async_trait;

/// Users, roles and path allow-lists
pub mod auth;
mod buf;
/// Client side
pub mod client;
pub mod config;
pub mod content;
pub mod error;
/// File system the server exposes
pub mod fs;
/// Protocol implementation
pub mod protocol;
/// Server side
pub mod server;
mod utils;

pub use error::Error;
pub use utils::{read_packet, write_packet, MAX_FRAME_LEN};
