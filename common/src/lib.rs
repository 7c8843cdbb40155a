#![forbid(unsafe_code)]

pub mod bus;
pub mod clients;
pub mod config;
pub mod context;
pub mod events;
pub mod http;
pub mod logging;
pub mod pagination;
pub mod signal;
