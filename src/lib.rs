// src/lib.rs — Library root for designloop

pub mod cli;
pub mod core;
pub mod generator;
pub mod infra;
pub mod provider;
pub mod render;
pub mod strategy;
pub mod util;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;
