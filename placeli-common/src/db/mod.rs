//! Database initialization and place storage

pub mod init;
pub mod places;

pub use init::*;
pub use places::*;
