//! Integration test crate for PawCam.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every library crate to verify they work together.

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod camera;

#[cfg(test)]
mod model;
