pub mod context;
pub mod error;
pub mod hub;
pub mod logger;

pub use error::{AppError, Result};
