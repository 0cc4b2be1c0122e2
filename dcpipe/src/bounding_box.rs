// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! SoC bounding box and IP parameters.
//!
//! The bounding box is the static input of the bandwidth model: the table of clock operating
//! points plus the memory subsystem latencies.  It is built once when the display core is created,
//! patched from firmware and overrides, and never mutated afterwards.
//!
//! Operating points are stored highest performance first.  Level 0 has the highest guaranteed
//! clocks.

use super::resource::ResourceCaps;
use super::smu::{MaxClocks, PowerPlay, WatermarkRange, WatermarkRanges};
use super::types::{Error, Result};
use log::{debug, warn};

/// One clock operating point.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClockLimits {
    pub dcfclk_mhz: f64,
    pub fabricclk_mhz: f64,
    pub dispclk_mhz: f64,
    pub dppclk_mhz: f64,
    pub phyclk_mhz: f64,
    pub socclk_mhz: f64,
    pub dscclk_mhz: f64,
    pub dram_speed_mts: f64,
}

impl ClockLimits {
    #[allow(clippy::too_many_arguments)]
    const fn new(
        dcfclk_mhz: f64,
        fabricclk_mhz: f64,
        dispclk_mhz: f64,
        dppclk_mhz: f64,
        phyclk_mhz: f64,
        socclk_mhz: f64,
        dscclk_mhz: f64,
        dram_speed_mts: f64,
    ) -> Self {
        Self {
            dcfclk_mhz,
            fabricclk_mhz,
            dispclk_mhz,
            dppclk_mhz,
            phyclk_mhz,
            socclk_mhz,
            dscclk_mhz,
            dram_speed_mts,
        }
    }

    fn cap(&mut self, max: &MaxClocks) {
        fn cap_one(clk: &mut f64, max_khz: u32) {
            let max_mhz = (max_khz / 1000) as f64;
            if max_khz != 0 && *clk > max_mhz {
                *clk = max_mhz;
            }
        }

        cap_one(&mut self.dcfclk_mhz, max.dcf_clock_khz);
        cap_one(&mut self.fabricclk_mhz, max.fabric_clock_khz);
        cap_one(&mut self.dispclk_mhz, max.display_clock_khz);
        cap_one(&mut self.dppclk_mhz, max.dpp_clock_khz);
        cap_one(&mut self.phyclk_mhz, max.phy_clock_khz);
        cap_one(&mut self.socclk_mhz, max.soc_clock_khz);
        cap_one(&mut self.dscclk_mhz, max.dsc_clock_khz);

        let max_dram = ((max.u_clock_khz / 1000) * 16) as f64;
        if max.u_clock_khz != 0 && self.dram_speed_mts > max_dram {
            self.dram_speed_mts = max_dram;
        }
    }
}

/// The SoC bounding box.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub struct SocBoundingBox {
    /// Operating points, highest performance first.
    pub clock_limits: Vec<ClockLimits>,
    pub sr_exit_time_us: f64,
    pub sr_enter_plus_exit_time_us: f64,
    pub urgent_latency_us: f64,
    pub writeback_latency_us: f64,
    pub dram_clock_change_latency_us: f64,
    pub writeback_dram_clock_change_latency_us: f64,
    pub round_trip_ping_latency_dcfclk_cycles: u32,
    pub urgent_out_of_order_return_per_channel_bytes: u32,
    pub num_chans: u32,
    pub dram_channel_width_bytes: u32,
    pub return_bus_width_bytes: u32,
    pub max_avg_sdp_bw_use_normal_percent: f64,
    pub max_avg_dram_bw_use_normal_percent: f64,
    pub dcn_downspread_percent: f64,
    pub dchub_refclk_mhz: f64,
}

impl SocBoundingBox {
    /// Returns the built-in bounding box of a DCN 2.0 part.
    pub fn nv10() -> Self {
        Self {
            clock_limits: vec![
                ClockLimits::new(1200.0, 1200.0, 1200.0, 1200.0, 810.0, 1200.0, 400.0, 16000.0),
                ClockLimits::new(1000.0, 1000.0, 1100.0, 1100.0, 810.0, 1000.0, 367.0, 16000.0),
                ClockLimits::new(875.0, 875.0, 1000.0, 1000.0, 810.0, 875.0, 333.0, 14000.0),
                ClockLimits::new(694.0, 694.0, 800.0, 800.0, 810.0, 694.0, 266.0, 11104.0),
                ClockLimits::new(506.0, 506.0, 640.0, 640.0, 600.0, 506.0, 213.0, 8000.0),
            ],
            sr_exit_time_us: 8.6,
            sr_enter_plus_exit_time_us: 10.9,
            urgent_latency_us: 4.0,
            writeback_latency_us: 12.0,
            dram_clock_change_latency_us: 404.0,
            writeback_dram_clock_change_latency_us: 23.0,
            round_trip_ping_latency_dcfclk_cycles: 131,
            urgent_out_of_order_return_per_channel_bytes: 256,
            num_chans: 16,
            dram_channel_width_bytes: 2,
            return_bus_width_bytes: 64,
            max_avg_sdp_bw_use_normal_percent: 40.0,
            max_avg_dram_bw_use_normal_percent: 40.0,
            dcn_downspread_percent: 0.5,
            dchub_refclk_mhz: 100.0,
        }
    }

    /// Returns the number of operating points.
    pub fn num_states(&self) -> usize {
        self.clock_limits.len()
    }

    /// Returns the lowest-performance level.
    pub fn lowest_level(&self) -> usize {
        self.clock_limits.len().saturating_sub(1)
    }

    pub(crate) fn is_valid(&self) -> bool {
        if self.clock_limits.is_empty() {
            return false;
        }

        self.clock_limits.windows(2).all(|w| {
            w[0].dcfclk_mhz >= w[1].dcfclk_mhz && w[0].dram_speed_mts >= w[1].dram_speed_mts
        })
    }

    /// Caps every operating point at the firmware limits and drops the resulting duplicates.
    pub(crate) fn cap_soc_clocks(&mut self, max: &MaxClocks) {
        for limits in self.clock_limits.iter_mut() {
            limits.cap(max);
        }

        self.clock_limits.dedup();
    }

    /// Rebuilds the operating points from the memory clock DPM states.
    pub(crate) fn update_from_uclk(
        &mut self,
        max: &MaxClocks,
        uclk_states_khz: &[u32],
        min_dcfclk_mhz: u32,
    ) {
        if uclk_states_khz.is_empty() {
            return;
        }

        let max_soc = (max.soc_clock_khz / 1000) as f64;
        let max_dcf = (max.dcf_clock_khz / 1000) as f64;
        let dispclk = (max.display_clock_khz / 1000) as f64;

        // the DPM states are lowest first
        self.clock_limits = uclk_states_khz
            .iter()
            .rev()
            .map(|&uclk| {
                let min_fclk_required_by_uclk = (uclk as u64 * 1008 / 1000000) as f64;
                let fabricclk_mhz = min_fclk_required_by_uclk.max(min_dcfclk_mhz as f64);

                ClockLimits {
                    dcfclk_mhz: fabricclk_mhz.min(max_dcf),
                    fabricclk_mhz,
                    dispclk_mhz: dispclk,
                    dppclk_mhz: dispclk,
                    phyclk_mhz: (max.phy_clock_khz / 1000) as f64,
                    socclk_mhz: fabricclk_mhz.min(max_soc),
                    dscclk_mhz: (max.display_clock_khz / 3000) as f64,
                    dram_speed_mts: (uclk as u64 * 16 / 1000) as f64,
                }
            })
            .collect();
    }

    pub(crate) fn patch(&mut self, overrides: &BoundingBoxOverrides) {
        fn patch_one(val_us: &mut f64, override_ns: u32) {
            if override_ns != 0 && (*val_us * 1000.0) as u32 != override_ns {
                *val_us = override_ns as f64 / 1000.0;
            }
        }

        patch_one(&mut self.sr_exit_time_us, overrides.sr_exit_time_ns);
        patch_one(
            &mut self.sr_enter_plus_exit_time_us,
            overrides.sr_enter_plus_exit_time_ns,
        );
        patch_one(&mut self.urgent_latency_us, overrides.urgent_latency_ns);
        patch_one(
            &mut self.dram_clock_change_latency_us,
            overrides.dram_clock_change_latency_ns,
        );
    }

    /// Returns the clock ranges of the watermark sets.
    ///
    /// Reader set `k` covers the fill clocks between level `k + 1` and level `k`.  The highest
    /// range is unconstrained above and the lowest range is unconstrained below.
    pub fn wm_ranges(&self) -> WatermarkRanges {
        let mut readers = Vec::new();
        let count = self.clock_limits.len().saturating_sub(1).min(4);
        for k in 0..count {
            readers.push(WatermarkRange {
                wm_inst: k,
                min_drain_clk_mhz: None,
                max_drain_clk_mhz: None,
                min_fill_clk_mhz: Some((self.clock_limits[k + 1].dram_speed_mts / 16.0) as u32),
                max_fill_clk_mhz: Some((self.clock_limits[k].dram_speed_mts / 16.0) as u32),
            });
        }

        if readers.is_empty() {
            readers.push(WatermarkRange::default());
        }

        if let Some(first) = readers.first_mut() {
            first.max_drain_clk_mhz = None;
            first.max_fill_clk_mhz = None;
        }
        if let Some(last) = readers.last_mut() {
            last.min_drain_clk_mhz = None;
            last.min_fill_clk_mhz = None;
        }

        WatermarkRanges {
            readers,
            writers: vec![WatermarkRange::default()],
        }
    }
}

impl Default for SocBoundingBox {
    fn default() -> Self {
        Self::nv10()
    }
}

/// The IP parameters of the display engine.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IpParams {
    pub odm_capable: bool,
    pub num_dsc: usize,
    pub max_num_otg: usize,
    pub max_num_dpp: usize,
    pub max_num_wb: usize,
    pub max_dchub_pscl_bw_pix_per_clk: f64,
    pub max_pscl_lb_bw_pix_per_clk: f64,
    pub max_hscl_ratio: f64,
    pub max_vscl_ratio: f64,
    pub max_hscl_taps: u32,
    pub max_vscl_taps: u32,
    pub dispclk_ramp_margin_percent: f64,
    pub dppclk_delay_subtotal: u32,
    pub dispclk_delay_subtotal: u32,
    pub max_inter_dcn_tile_repeaters: u32,
}

impl IpParams {
    /// Returns the IP parameters of DCN 2.0.
    pub fn dcn20() -> Self {
        Self {
            odm_capable: true,
            num_dsc: if cfg!(feature = "dsc") { 6 } else { 0 },
            max_num_otg: 6,
            max_num_dpp: 6,
            max_num_wb: 1,
            max_dchub_pscl_bw_pix_per_clk: 4.0,
            max_pscl_lb_bw_pix_per_clk: 2.0,
            max_hscl_ratio: 8.0,
            max_vscl_ratio: 8.0,
            max_hscl_taps: 8,
            max_vscl_taps: 8,
            dispclk_ramp_margin_percent: 1.0,
            dppclk_delay_subtotal: 77,
            dispclk_delay_subtotal: 87,
            max_inter_dcn_tile_repeaters: 8,
        }
    }
}

impl Default for IpParams {
    fn default() -> Self {
        Self::dcn20()
    }
}

/// Latency overrides applied on top of the bounding box.
///
/// Zero leaves the corresponding value untouched.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BoundingBoxOverrides {
    pub sr_exit_time_ns: u32,
    pub sr_enter_plus_exit_time_ns: u32,
    pub urgent_latency_ns: u32,
    pub dram_clock_change_latency_ns: u32,
    pub min_dcfclk_mhz: u32,
}

pub(crate) fn init_soc_bounding_box(
    mut soc: SocBoundingBox,
    mut ip: IpParams,
    pp: Option<&dyn PowerPlay>,
    overrides: &BoundingBoxOverrides,
    caps: &ResourceCaps,
    pipe_count: usize,
) -> Result<(SocBoundingBox, IpParams)> {
    if !soc.is_valid() {
        return Err(Error::HardwareInitFailure);
    }

    if let Some(pp) = pp {
        let uclk_states = match pp.uclk_dpm_states() {
            Ok(states) => Some(states),
            Err(err) => {
                warn!("failed to query uclk dpm states: {err}");
                None
            }
        };
        let max_clocks = match pp.max_sustainable_clocks() {
            Ok(clocks) => Some(clocks),
            Err(err) => {
                warn!("failed to query max sustainable clocks: {err}");
                None
            }
        };

        match (max_clocks, uclk_states) {
            (Some(max), Some(states)) => {
                debug!("rebuilding bounding box from {} uclk states", states.len());
                soc.update_from_uclk(&max, &states, overrides.min_dcfclk_mhz);
            }
            (Some(max), None) => soc.cap_soc_clocks(&max),
            _ => (),
        }
    }

    ip.max_num_otg = caps.num_timing_generator;
    ip.max_num_dpp = pipe_count;
    ip.num_dsc = ip.num_dsc.min(caps.num_dsc);
    soc.patch(overrides);

    if !soc.is_valid() {
        return Err(Error::HardwareInitFailure);
    }

    Ok((soc, ip))
}
