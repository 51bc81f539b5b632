mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod reconcile;
    pub mod schema;
    pub mod store;
}
mod authentication {
    pub mod permissions;
    pub mod session;
}
mod shopping {
    pub mod download;
    pub mod list;
}
mod config;
mod constants;
mod setup;

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use setup::*;
pub use shopping::*;
