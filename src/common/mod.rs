//! Types, errors and collaborator traits shared across the crate

pub mod channels;
pub mod errors;
pub mod events;
pub mod symbol;
pub mod traits;
pub mod types;
