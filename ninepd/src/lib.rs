#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate ninepd_constants;

pub mod backend;
pub mod proto;
pub mod server;
