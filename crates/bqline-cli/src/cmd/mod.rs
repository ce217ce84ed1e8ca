pub mod schema;
pub mod tweets;
