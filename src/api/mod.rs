//! HTTP/JSON interface over the ledger.

mod handlers;
mod response;
mod server;

pub use server::serve;
