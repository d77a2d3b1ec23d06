#[macro_use]
pub mod macros;

pub mod api;
pub mod config;
pub mod differ;
pub mod extract;
pub mod filter;
pub mod notify;
pub mod record;
pub mod run;
pub mod seen_store;
