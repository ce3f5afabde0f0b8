//! Background Tasks Module
//!
//! Contains the deferred tasks the cache spawns on its runtime.
//!
//! # Tasks
//! - Entry expiration: removes one entry once its max age has elapsed

mod expiry;

pub(crate) use expiry::spawn_expiry_task;
