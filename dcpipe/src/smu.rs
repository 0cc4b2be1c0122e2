// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Power-play firmware interface.
//!
//! The firmware reports the sustainable clock limits and the memory clock DPM states once at
//! construction, and receives the clock ranges each watermark set applies to.

use super::types::{Error, Result};

/// The maximum sustainable clocks reported by the firmware.
///
/// A zero clock means the firmware does not limit that clock.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MaxClocks {
    pub display_clock_khz: u32,
    pub dpp_clock_khz: u32,
    pub phy_clock_khz: u32,
    pub soc_clock_khz: u32,
    pub dsc_clock_khz: u32,
    pub dcf_clock_khz: u32,
    pub u_clock_khz: u32,
    pub fabric_clock_khz: u32,
}

/// The clock range a watermark set applies to.
///
/// `None` means unconstrained.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WatermarkRange {
    pub wm_inst: usize,
    pub min_drain_clk_mhz: Option<u32>,
    pub max_drain_clk_mhz: Option<u32>,
    pub min_fill_clk_mhz: Option<u32>,
    pub max_fill_clk_mhz: Option<u32>,
}

/// The watermark range sets sent to the firmware.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WatermarkRanges {
    /// Reader (display fetch) sets, at most four.
    pub readers: Vec<WatermarkRange>,
    /// Writer (writeback) sets.
    pub writers: Vec<WatermarkRange>,
}

/// The power-play firmware.
///
/// Every method is optional.  The default implementations report `Error::Unsupported`.
pub trait PowerPlay: Send + Sync {
    /// Returns the maximum sustainable clocks.
    fn max_sustainable_clocks(&self) -> Result<MaxClocks> {
        Error::unsupported()
    }

    /// Returns the memory clock DPM states in kHz, lowest first.
    fn uclk_dpm_states(&self) -> Result<Vec<u32>> {
        Error::unsupported()
    }

    /// Notifies the firmware of the clock ranges of the watermark sets.
    fn set_wm_ranges(&self, _ranges: &WatermarkRanges) -> Result<()> {
        Error::unsupported()
    }
}
