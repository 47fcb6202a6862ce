mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod memory;
    pub mod postgres;
    pub mod reconcile;
    pub mod schema;
    pub mod store;
}
mod authentication {
    pub mod accounts;
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
}
mod constants;

pub mod api;
pub mod config;
pub mod media;
pub mod state;

pub use authentication::*;
pub use constants::*;
pub use database::*;
