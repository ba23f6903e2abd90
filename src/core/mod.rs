// src/core/mod.rs — Core loop engine

pub mod adaptive;
pub mod cost;
pub mod feedback_loop;
pub mod quality;
pub mod stats;
pub mod termination;
pub mod types;

pub use feedback_loop::FeedbackLoop;
