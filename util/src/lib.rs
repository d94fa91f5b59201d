pub mod bus;
pub mod http;
pub mod ws;
