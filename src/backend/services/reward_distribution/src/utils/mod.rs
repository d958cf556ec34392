pub mod crypto;
pub mod errors;
pub mod fixed_point;
pub mod merkle;
pub mod retry;
