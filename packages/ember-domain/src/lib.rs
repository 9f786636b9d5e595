pub mod freshness;
pub mod identity;
pub mod query;
pub mod source;
pub mod text;
pub mod video;
