pub mod cache;
pub mod db;
pub mod knowledge;
pub mod models;
pub mod schema;

mod error;

pub use error::{Error, Result};
