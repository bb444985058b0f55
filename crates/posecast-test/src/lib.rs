//! Posecast Test Harness - scripted capture and session validation
//!
//! This crate provides:
//! - A scripted capture backend that records which sources it opened
//! - Endless and gated sources for lifecycle tests
//! - A UDP receiver standing in for the consumer
//! - End-to-end session tests

pub mod harness;

#[cfg(test)]
mod integration;

pub use harness::*;
