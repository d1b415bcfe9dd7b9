//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Pool Monitor: Logs pool health and cache occupancy at configured intervals

mod monitor;

pub use monitor::spawn_pool_monitor;
