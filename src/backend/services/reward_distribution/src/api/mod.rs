pub mod routes;

pub use routes::{admin_routes, health};
