pub mod api;
pub mod clients;
pub mod common;
pub mod reconcile;

pub use clients::Services;
pub use common::config::Settings;
pub use common::errors::Error;
pub use common::{Record, Status};
