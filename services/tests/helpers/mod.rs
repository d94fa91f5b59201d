#![allow(dead_code)]

pub mod mock;
pub mod server;

pub use mock::{MockNotifications, MockSubmissions};
pub use server::spawn_server;
