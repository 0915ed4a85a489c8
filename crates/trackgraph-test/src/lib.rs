//! Shared test fixtures for trackgraph crates.
//!
//! This crate provides assembled hypothesis graphs for testing. It does
//! NOT depend on `trackgraph-solve`, so solver crates can consume it as
//! a dev-dependency without cycles.
//!
//! - [`two_frame_division`] - two parent detections feeding three
//!   children, with division/appearance/disappearance variables and
//!   shared weights
//! - [`fork`] - one detection with two outgoing links
//! - [`appearance_only`] - a single detection explained by appearance
//! - [`exclusion_pair`] - two detections that exclude each other

pub mod scenarios;

pub use scenarios::{
    appearance_only, exclusion_pair, fork, two_frame_division, TWO_FRAME_DIVISION_WEIGHTS,
};
