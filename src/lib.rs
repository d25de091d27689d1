//! Feature Admin — task orchestration and progress tracking for loading a
//! farm's locations and feature definitions.

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod model;
pub mod tasks;
pub mod workers;
