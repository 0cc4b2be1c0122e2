// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

#![warn(missing_docs)]

//! dcpipe allocates display pipes and validates display bandwidth.
//!
//! This crate provides a library to map display streams and planes onto the pipes of a display
//! engine, and to decide whether the resulting configuration fits the clock and bandwidth limits
//! of the hardware.
//!
//! A configuration is built in 3 steps.  The mapping step assigns pipes, stream encoders, clock
//! sources, and compressors to streams and planes.  The validation step evaluates the
//! configuration at every operating point, splits or combines pipes as needed, and picks the
//! lowest operating point that works.  The commit step makes the validated configuration the
//! current one.

mod adapter;
mod bounding_box;
mod clocks;
mod dc;
mod dml;
mod formats;
mod mapper;
mod pipe;
mod resource;
mod smu;
mod state;
mod stream;
#[cfg(test)]
mod testing;
mod types;
mod validator;
mod writeback;

pub use bounding_box::*;
pub use clocks::*;
pub use dc::*;
pub use dml::*;
pub use pipe::*;
pub use resource::*;
pub use smu::*;
pub use state::*;
pub use stream::*;
pub use types::*;
pub use writeback::*;
