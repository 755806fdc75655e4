pub mod confirmation;
pub mod error;
pub mod token;

pub use error::Error;
