// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Writeback arbitration.

use super::dml::Watermarks;
use super::stream::{ColorDepth, WritebackFormat};
use super::state::DcState;

/// The number of writeback pipes.
pub const MAX_DWB_PIPES: usize = 1;

const TOTAL_Y_FREE_ENTRY: u32 = 0x200;
const TOTAL_C_FREE_ENTRY: u32 = 0x140;

/// The memory interface mode of a writeback.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WbifMode {
    Packed444,
    Planar420_8,
    Planar420_10,
}

impl WbifMode {
    fn new(format: WritebackFormat, depth: ColorDepth) -> Self {
        match (format, depth) {
            (WritebackFormat::Rgb, _) => Self::Packed444,
            (WritebackFormat::Yuv420, ColorDepth::Bpc8) => Self::Planar420_8,
            (WritebackFormat::Yuv420, _) => Self::Planar420_10,
        }
    }
}

/// The memory interface arbitration parameters of a writeback pipe.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct McifArbParams {
    /// Urgent watermarks in ns, one per watermark set.
    pub cli_watermark: [u32; 4],
    /// DRAM clock change watermarks in ns, one per watermark set.
    pub pstate_watermark: [u32; 4],
    /// The time per pixel in ns, with a 4-bit fraction.
    pub time_per_pixel: u32,
    /// The slice size in lines.
    pub slice_lines: u32,
    /// The arbitration slice.
    pub arbitration_slice: u32,
    /// The time the writeback buffer can absorb, in ns with a 4-bit fraction.
    pub max_scaled_time: u32,
}

/// Returns the time the writeback buffer absorbs beyond the urgent watermark.
pub fn calc_max_scaled_time(time_per_pixel: u32, mode: WbifMode, urgent_watermark: u32) -> u32 {
    let time_per_byte = match mode {
        WbifMode::Packed444 => time_per_pixel / 4,
        WbifMode::Planar420_8 => time_per_pixel,
        WbifMode::Planar420_10 => (time_per_pixel as u64 * 819 / 1024) as u32,
    }
    .max(1);

    let small_free_entry = TOTAL_Y_FREE_ENTRY.min(TOTAL_C_FREE_ENTRY);
    let max_free_entry = match mode {
        WbifMode::Packed444 => TOTAL_Y_FREE_ENTRY + TOTAL_C_FREE_ENTRY,
        _ => small_free_entry,
    };

    let buf_lh_capability = max_free_entry as u64 * time_per_byte as u64 * 32 / 16;
    let max_scaled_time = buf_lh_capability.saturating_sub(urgent_watermark as u64);
    u32::try_from(max_scaled_time).unwrap_or(u32::MAX)
}

/// Computes the arbitration parameters of the writeback pipes of a state.
pub(crate) fn set_mcif_arb_params(state: &DcState, wm: &Watermarks) -> Vec<McifArbParams> {
    let cli = (wm.writeback_urgent * 1000.0) as u32;
    let pstate = (wm.writeback_dram_clock_change * 1000.0) as u32;

    state
        .pipes
        .iter()
        .filter(|pipe| pipe.is_head())
        .filter_map(|pipe| {
            let stream = pipe.stream.as_ref()?;
            let info = stream.writeback?;
            let phy_pix_clk = stream.phy_pix_clk_khz().max(1);
            let time_per_pixel = 16 * 1000000 / phy_pix_clk;

            Some(McifArbParams {
                cli_watermark: [cli; 4],
                pstate_watermark: [pstate; 4],
                time_per_pixel,
                slice_lines: 32,
                arbitration_slice: 2,
                max_scaled_time: calc_max_scaled_time(
                    time_per_pixel,
                    WbifMode::new(info.format, info.depth),
                    cli,
                ),
            })
        })
        .take(MAX_DWB_PIPES)
        .collect()
}
