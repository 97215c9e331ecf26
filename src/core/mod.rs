pub mod detector;
pub mod executor;
pub mod grid;
pub mod parser;
pub mod service;
pub mod session;
pub mod workflow;

pub use crate::domain::ports::{EntityStore, ImportApi, Storage, VolunteerDirectory};
pub use crate::utils::error::Result;
