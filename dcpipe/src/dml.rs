// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Display mode library.
//!
//! This module defines the per-pipe parameters consumed by a bandwidth feasibility calculator, the
//! calculator's result arrays, and the `ModeLib` trait.  `Dml` is a simplified analytic calculator
//! that makes the crate usable without a hardware-exact model.
//!
//! Feasibility levels index `SocBoundingBox::clock_limits`.  Level 0 is the highest-performance
//! operating point.

use super::bounding_box::{IpParams, SocBoundingBox};
use super::stream::SwizzleMode;
use log::debug;

/// The source pixel format of a pipe.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SourceFormat {
    Rgb444_8,
    Rgb444_16,
    #[default]
    Rgb444_32,
    Rgb444_64,
    Yuv420_8,
    Yuv420_10,
}

impl SourceFormat {
    /// Returns true for the planar 4:2:0 formats.
    pub fn is_420(self) -> bool {
        matches!(self, Self::Yuv420_8 | Self::Yuv420_10)
    }

    fn bytes_per_pixel(self) -> (f64, f64) {
        match self {
            Self::Rgb444_8 => (1.0, 0.0),
            Self::Rgb444_16 => (2.0, 0.0),
            Self::Rgb444_32 => (4.0, 0.0),
            Self::Rgb444_64 => (8.0, 0.0),
            Self::Yuv420_8 => (1.0, 2.0),
            Self::Yuv420_10 => (4.0 / 3.0, 8.0 / 3.0),
        }
    }
}

/// The macro tile size of a tiling mode.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum MacroTileSize {
    Tile4k,
    #[default]
    Tile64k,
    TileVar,
}

/// The scan direction of a source surface.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SourceScan {
    #[default]
    Horizontal,
    Vertical,
}

/// The output type of a pipe.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum OutputType {
    #[default]
    Dp,
    Edp,
    Hdmi,
}

/// The output pixel format of a pipe.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum OutputFormat {
    #[default]
    Rgb444,
    Yuv420,
    /// Simple 4:2:2.
    S422,
    /// Native 4:2:2.
    N422,
}

/// The line buffer depth.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum LbDepth {
    #[default]
    Lb10,
    Lb16,
}

/// Source surface parameters.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SrcParams {
    pub source_scan: SourceScan,
    pub sw_mode: SwizzleMode,
    pub macro_tile_size: MacroTileSize,
    pub source_format: SourceFormat,
    pub viewport_y_y: i32,
    pub viewport_y_c: i32,
    pub viewport_width: u32,
    pub viewport_width_c: u32,
    pub viewport_height: u32,
    pub viewport_height_c: u32,
    pub data_pitch: u32,
    pub data_pitch_c: u32,
    pub meta_pitch: u32,
    pub meta_pitch_c: u32,
    pub dcc: bool,
    pub dcc_rate: u32,
    pub immediate_flip: bool,
    pub is_hsplit: bool,
    pub hsplit_grp: usize,
    pub dynamic_metadata_enable: bool,
    pub dynamic_metadata_lines_before_active: u32,
    pub dynamic_metadata_xmit_bytes: u32,
    pub num_cursors: u32,
    pub cur0_src_width: u32,
    pub cur0_bpp: u32,
    pub cur1_src_width: u32,
    pub cur1_bpp: u32,
}

/// Destination timing parameters.
///
/// The last four fields are outputs written back after validation.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DestParams {
    pub recout_width: u32,
    pub recout_height: u32,
    pub full_recout_width: u32,
    pub full_recout_height: u32,
    pub hblank_start: u32,
    pub hblank_end: u32,
    pub vblank_start: u32,
    pub vblank_end: u32,
    pub htotal: u32,
    pub vtotal: u32,
    pub hactive: u32,
    pub vactive: u32,
    pub interlaced: bool,
    pub pixel_rate_mhz: f64,
    pub synchronized_vblank_all_planes: bool,
    pub otg_inst: usize,
    pub odm_combine: bool,
    pub vstartup_start: u32,
    pub vupdate_offset: u32,
    pub vupdate_width: u32,
    pub vready_offset: u32,
}

/// Scaler parameters.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScaleParams {
    pub lb_depth: LbDepth,
    pub hscl_ratio: f64,
    pub hscl_ratio_c: f64,
    pub vscl_ratio: f64,
    pub vscl_ratio_c: f64,
    pub scl_enable: bool,
    pub htaps: u32,
    pub htaps_c: u32,
    pub vtaps: u32,
    pub vtaps_c: u32,
}

/// Writeback parameters.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WritebackParams {
    pub src_width: u32,
    pub src_height: u32,
    pub dst_width: u32,
    pub dst_height: u32,
    pub htaps_luma: u32,
    pub vtaps_luma: u32,
    pub htaps_chroma: u32,
    pub vtaps_chroma: u32,
    pub hratio: f64,
    pub vratio: f64,
    pub pixel_format: SourceFormat,
}

/// Output parameters.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OutputParams {
    pub dp_lanes: u32,
    /// The display color depth in bits per component.
    pub output_bpp: u32,
    pub output_type: OutputType,
    pub output_format: OutputFormat,
    pub output_bpc: u32,
    pub dsc_enable: bool,
    pub dsc_slices: u32,
    /// The compressed bits per pixel, in 1/16 bpp.
    pub dsc_bpp: u32,
    pub wb_enable: bool,
    pub num_active_wb: u32,
    pub wb: WritebackParams,
}

/// Clock inputs of a pipe.
///
/// Only pipe 0's voltage level and DCF/SOC clocks are read when computing watermarks.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClockConfig {
    pub voltage: usize,
    pub dcfclk_mhz: f64,
    pub socclk_mhz: f64,
    pub dispclk_mhz: f64,
    pub dppclk_mhz: f64,
    pub refclk_mhz: f64,
}

/// The calculator parameters of one pipe.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PipeParams {
    pub src: SrcParams,
    pub dest: DestParams,
    pub scale: ScaleParams,
    pub dout: OutputParams,
    pub clks_cfg: ClockConfig,
}

/// The calculator's result arrays.
///
/// Per-level arrays are indexed `[level][combine][pipe]`, where `combine` 0 disallows and 1 allows
/// multi-pipe combine.  Pipe indices count the populated parameter records.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vba {
    pub no_of_dpp: Vec<[Vec<u32>; 2]>,
    pub required_dppclk: Vec<[Vec<f64>; 2]>,
    pub required_dispclk: Vec<[f64; 2]>,
    pub odm_combine_per_state: Vec<Vec<bool>>,
    pub mode_support: Vec<[bool; 2]>,
    pub dram_clock_change_support: Vec<[bool; 2]>,
    pub prefetch_mode: Vec<[u32; 2]>,
    pub odm_combine_enabled: Vec<bool>,
    pub blending_and_timing: Vec<usize>,
    pub max_mpc_comb: usize,
    pub voltage_level: usize,

    pub vstartup: Vec<u32>,
    pub vupdate_offset_pix: Vec<u32>,
    pub vupdate_width_pix: Vec<u32>,
    pub vready_offset_pix: Vec<u32>,
    pub dscclk_calculated: Vec<f64>,

    pub dispclk: f64,
    pub dcfclk: f64,
    pub socclk: f64,
    pub dram_speed: f64,
    pub dcfclk_deep_sleep: f64,
    pub fabric_clock: f64,
}

impl Vba {
    /// Clears the arrays and sizes them for `levels` levels and `pipes` pipes.
    pub fn reset(&mut self, levels: usize, pipes: usize) {
        *self = Self {
            no_of_dpp: vec![[vec![0; pipes], vec![0; pipes]]; levels],
            required_dppclk: vec![[vec![0.0; pipes], vec![0.0; pipes]]; levels],
            required_dispclk: vec![[0.0; 2]; levels],
            odm_combine_per_state: vec![vec![false; pipes]; levels],
            mode_support: vec![[false; 2]; levels],
            dram_clock_change_support: vec![[false; 2]; levels],
            prefetch_mode: vec![[2; 2]; levels],
            odm_combine_enabled: vec![false; pipes],
            blending_and_timing: (0..pipes).collect(),
            vstartup: vec![0; pipes],
            vupdate_offset_pix: vec![0; pipes],
            vupdate_width_pix: vec![0; pipes],
            vready_offset_pix: vec![0; pipes],
            dscclk_calculated: vec![0.0; pipes],
            ..Default::default()
        };
    }
}

/// Watermarks in microseconds.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Watermarks {
    pub urgent: f64,
    pub stutter_enter_exit: f64,
    pub stutter_exit: f64,
    pub dram_clock_change: f64,
    pub memory_trip: f64,
    pub writeback_urgent: f64,
    pub writeback_dram_clock_change: f64,
}

/// A bandwidth feasibility calculator.
pub trait ModeLib: Send + Sync {
    /// Evaluates mode support at every level and returns the chosen level.
    ///
    /// `vba` is reset and filled with the per-level results.  Returns `None` when no level
    /// supports the configuration.
    fn voltage_level(
        &self,
        soc: &SocBoundingBox,
        ip: &IpParams,
        pipes: &[PipeParams],
        vba: &mut Vba,
    ) -> Option<usize>;

    /// Programs the mode at the clocks of `pipes[0].clks_cfg` and returns the watermarks.
    ///
    /// This also updates the final clocks and the per-pipe timing offsets in `vba`.
    fn watermarks(
        &self,
        soc: &SocBoundingBox,
        ip: &IpParams,
        pipes: &[PipeParams],
        vba: &mut Vba,
    ) -> Watermarks;
}

const DP_HBR3_MBPS: f64 = 8100.0;
const DP_CHANNEL_EFFICIENCY: f64 = 0.8;

/// The built-in analytic calculator.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dml;

impl Dml {
    fn dppclk_single(ip: &IpParams, pipe: &PipeParams) -> f64 {
        fn plane(
            ip: &IpParams,
            pixel_rate: f64,
            hratio: f64,
            vratio: f64,
            htaps: u32,
            vtaps: u32,
        ) -> f64 {
            let htaps = htaps.max(1);
            let vtaps = vtaps.max(1);
            let pscl_throughput = if hratio > 1.0 {
                ip.max_dchub_pscl_bw_pix_per_clk.min(
                    ip.max_pscl_lb_bw_pix_per_clk * hratio / (htaps as f64 / 6.0).ceil(),
                )
            } else {
                ip.max_dchub_pscl_bw_pix_per_clk
                    .min(ip.max_pscl_lb_bw_pix_per_clk)
            };

            let mut clk = pixel_rate
                * (vtaps as f64 / 6.0 * hratio.min(1.0))
                    .max(hratio * vratio / pscl_throughput)
                    .max(1.0);
            if (htaps > 6 || vtaps > 6) && clk < 2.0 * pixel_rate {
                clk = 2.0 * pixel_rate;
            }
            clk
        }

        let pixel_rate = pipe.dest.pixel_rate_mhz;
        let scale = &pipe.scale;
        let luma = plane(
            ip,
            pixel_rate,
            scale.hscl_ratio,
            scale.vscl_ratio,
            scale.htaps,
            scale.vtaps,
        );

        if pipe.src.source_format.is_420() {
            let chroma = plane(
                ip,
                pixel_rate,
                scale.hscl_ratio_c,
                scale.vscl_ratio_c,
                scale.htaps_c,
                scale.vtaps_c,
            );
            luma.max(chroma)
        } else {
            luma
        }
    }

    fn scale_supported(ip: &IpParams, pipe: &PipeParams) -> bool {
        let scale = &pipe.scale;
        let ratio_ok = |ratio: f64, taps: u32, max_ratio: f64, max_taps: u32| {
            ratio <= max_ratio && taps <= max_taps && (taps > 1 || ratio <= 1.0)
        };

        let luma = ratio_ok(
            scale.hscl_ratio,
            scale.htaps,
            ip.max_hscl_ratio,
            ip.max_hscl_taps,
        ) && ratio_ok(
            scale.vscl_ratio,
            scale.vtaps,
            ip.max_vscl_ratio,
            ip.max_vscl_taps,
        );

        if !pipe.src.source_format.is_420() {
            return luma;
        }

        luma && ratio_ok(
            scale.hscl_ratio_c,
            scale.htaps_c,
            ip.max_hscl_ratio,
            ip.max_hscl_taps,
        ) && ratio_ok(
            scale.vscl_ratio_c,
            scale.vtaps_c,
            ip.max_vscl_ratio,
            ip.max_vscl_taps,
        )
    }

    /// Returns the required output bandwidth in Mbps.
    fn output_mbps(pipe: &PipeParams) -> f64 {
        let dout = &pipe.dout;
        let bpp = if dout.dsc_enable && dout.dsc_bpp != 0 {
            dout.dsc_bpp as f64 / 16.0
        } else {
            let bpc = dout.output_bpp as f64;
            match dout.output_format {
                OutputFormat::Rgb444 => bpc * 3.0,
                OutputFormat::Yuv420 => bpc * 1.5,
                OutputFormat::S422 | OutputFormat::N422 => bpc * 2.0,
            }
        };

        pipe.dest.pixel_rate_mhz * bpp
    }

    fn link_supported(pipe: &PipeParams, phyclk_mhz: f64) -> bool {
        let dout = &pipe.dout;
        match dout.output_type {
            OutputType::Dp | OutputType::Edp => {
                let lane_mbps = DP_HBR3_MBPS.min(phyclk_mhz * 10.0);
                let avail = lane_mbps * DP_CHANNEL_EFFICIENCY * dout.dp_lanes.max(1) as f64;
                Self::output_mbps(pipe) <= avail
            }
            OutputType::Hdmi => {
                // TMDS character clock
                let mut clk = pipe.dest.pixel_rate_mhz * dout.output_bpp as f64 / 8.0;
                if dout.output_format == OutputFormat::Yuv420 {
                    clk /= 2.0;
                }
                clk <= phyclk_mhz
            }
        }
    }

    /// Returns the read bandwidth of a pipe in MB/s.
    fn read_bw(pipe: &PipeParams) -> f64 {
        if pipe.dest.htotal == 0 {
            return 0.0;
        }

        let (bpp_y, bpp_c) = pipe.src.source_format.bytes_per_pixel();
        let src = &pipe.src;
        let scale = &pipe.scale;
        let bytes_per_line = src.viewport_width as f64 * bpp_y * scale.vscl_ratio.max(1.0)
            + src.viewport_width_c as f64 * bpp_c * scale.vscl_ratio_c.max(1.0);

        bytes_per_line * pipe.dest.pixel_rate_mhz / pipe.dest.htotal as f64
    }

    fn vblank_us(pipe: &PipeParams) -> f64 {
        let dest = &pipe.dest;
        if dest.pixel_rate_mhz <= 0.0 {
            return 0.0;
        }

        dest.vtotal.saturating_sub(dest.vactive) as f64 * dest.htotal as f64
            / dest.pixel_rate_mhz
    }

    fn dsc_count(pipes: &[PipeParams], odm: &[bool]) -> usize {
        pipes
            .iter()
            .zip(odm)
            .filter(|(p, _)| p.dout.dsc_enable)
            .map(|(_, &odm)| if odm { 2 } else { 1 })
            .sum()
    }

    fn otg_count(pipes: &[PipeParams]) -> usize {
        let mut otgs: Vec<usize> = pipes.iter().map(|p| p.dest.otg_inst).collect();
        otgs.sort_unstable();
        otgs.dedup();
        otgs.len()
    }
}

impl ModeLib for Dml {
    fn voltage_level(
        &self,
        soc: &SocBoundingBox,
        ip: &IpParams,
        pipes: &[PipeParams],
        vba: &mut Vba,
    ) -> Option<usize> {
        let levels = soc.num_states();
        vba.reset(levels, pipes.len());

        let margin = 1.0 + ip.dispclk_ramp_margin_percent / 100.0;
        let downspread = 1.0 + soc.dcn_downspread_percent / 100.0;

        let scale_ok = pipes.iter().all(|p| Self::scale_supported(ip, p));
        let wb_ok = pipes.iter().filter(|p| p.dout.wb_enable).count() <= ip.max_num_wb;
        let otg_ok = Self::otg_count(pipes) <= ip.max_num_otg;
        let dram_change_ok = pipes
            .iter()
            .all(|p| Self::vblank_us(p) > soc.dram_clock_change_latency_us + soc.urgent_latency_us);
        let stutter_ok = pipes
            .iter()
            .all(|p| Self::vblank_us(p) > soc.sr_enter_plus_exit_time_us);
        let read_bw: f64 = pipes.iter().map(Self::read_bw).sum();

        for (level, limits) in soc.clock_limits.iter().enumerate() {
            for (k, pipe) in pipes.iter().enumerate() {
                let dispclk_single = pipe.dest.pixel_rate_mhz * margin * downspread;
                vba.odm_combine_per_state[level][k] =
                    ip.odm_capable && dispclk_single > limits.dispclk_mhz;
            }

            let odm = vba.odm_combine_per_state[level].clone();
            let return_bw = soc.return_bus_width_bytes as f64
                * limits.dcfclk_mhz
                * soc.max_avg_sdp_bw_use_normal_percent
                / 100.0;
            let dram_bw = limits.dram_speed_mts
                * soc.num_chans as f64
                * soc.dram_channel_width_bytes as f64
                * soc.max_avg_dram_bw_use_normal_percent
                / 100.0;
            let bw_ok = read_bw <= return_bw.min(dram_bw);
            let dsc_ok = Self::dsc_count(pipes, &odm) <= ip.num_dsc;

            for comb in 0..2 {
                let mut dispclk = 0.0f64;
                let mut supported = scale_ok && wb_ok && otg_ok && bw_ok && dsc_ok;
                let mut total_dpp = 0;

                for (k, pipe) in pipes.iter().enumerate() {
                    let dpp = if odm[k] || comb == 1 { 2 } else { 1 };
                    let dppclk = Self::dppclk_single(ip, pipe) * margin / dpp as f64;
                    let pixel_clk = pipe.dest.pixel_rate_mhz * margin * downspread;
                    let pipe_dispclk = if odm[k] { pixel_clk / 2.0 } else { pixel_clk };

                    vba.no_of_dpp[level][comb][k] = dpp;
                    vba.required_dppclk[level][comb][k] = dppclk;
                    dispclk = dispclk.max(pipe_dispclk);
                    total_dpp += dpp as usize;

                    supported &= dppclk <= limits.dppclk_mhz;
                    supported &= Self::link_supported(pipe, limits.phyclk_mhz);
                    if pipe.dout.dsc_enable {
                        let div = if odm[k] { 2.0 } else { 1.0 };
                        let dscclk = pipe.dest.pixel_rate_mhz / div / 3.0;
                        supported &= dscclk <= limits.dscclk_mhz;
                    }
                }

                supported &= dispclk <= limits.dispclk_mhz;
                supported &= total_dpp <= ip.max_num_dpp;

                vba.required_dispclk[level][comb] = dispclk;
                vba.mode_support[level][comb] = supported;
                vba.dram_clock_change_support[level][comb] = dram_change_ok;
                vba.prefetch_mode[level][comb] = if dram_change_ok {
                    0
                } else if stutter_ok {
                    1
                } else {
                    2
                };
            }
        }

        // prefer the lowest-performance level, then no combine
        let level = (0..levels)
            .rev()
            .find(|&l| vba.mode_support[l][0] || vba.mode_support[l][1])?;

        vba.voltage_level = level;
        vba.max_mpc_comb = if vba.mode_support[level][0] { 0 } else { 1 };
        vba.odm_combine_enabled = vba.odm_combine_per_state[level].clone();

        debug!(
            "mode supported at level {} with combine {}",
            level, vba.max_mpc_comb
        );

        Some(level)
    }

    fn watermarks(
        &self,
        soc: &SocBoundingBox,
        ip: &IpParams,
        pipes: &[PipeParams],
        vba: &mut Vba,
    ) -> Watermarks {
        let Some(first) = pipes.first() else {
            return Watermarks::default();
        };

        let level = first.clks_cfg.voltage.min(soc.lowest_level());
        let limits = soc.clock_limits.get(level).copied().unwrap_or_default();
        let dcfclk = if first.clks_cfg.dcfclk_mhz > 0.0 {
            first.clks_cfg.dcfclk_mhz
        } else {
            limits.dcfclk_mhz
        };

        // mode programming
        vba.dcfclk = dcfclk;
        vba.socclk = first.clks_cfg.socclk_mhz;
        vba.dram_speed = limits.dram_speed_mts;
        vba.fabric_clock = limits.fabricclk_mhz;
        vba.dispclk = pipes
            .iter()
            .map(|p| p.clks_cfg.dispclk_mhz)
            .fold(0.0, f64::max);

        let deep_sleep = pipes
            .iter()
            .map(|p| {
                let (bpp_y, _) = p.src.source_format.bytes_per_pixel();
                1.15 * p.dest.pixel_rate_mhz * bpp_y / 64.0 / p.scale.hscl_ratio.max(1.0)
            })
            .fold(8.0, f64::max);
        vba.dcfclk_deep_sleep = deep_sleep;

        let resize = |v: &mut Vec<u32>| v.resize(pipes.len(), 0);
        resize(&mut vba.vstartup);
        resize(&mut vba.vupdate_offset_pix);
        resize(&mut vba.vupdate_width_pix);
        resize(&mut vba.vready_offset_pix);
        vba.dscclk_calculated.resize(pipes.len(), 0.0);

        for (k, pipe) in pipes.iter().enumerate() {
            let dest = &pipe.dest;
            let dppclk = if pipe.clks_cfg.dppclk_mhz > 0.0 {
                pipe.clks_cfg.dppclk_mhz
            } else {
                limits.dppclk_mhz
            };
            let dispclk = if vba.dispclk > 0.0 {
                vba.dispclk
            } else {
                limits.dispclk_mhz
            };

            let repeater_delay =
                ip.max_inter_dcn_tile_repeaters as f64 * (2.0 / dppclk + 3.0 / dispclk);
            let vupdate_width =
                (14.0 / deep_sleep + 12.0 / dppclk + repeater_delay) * dest.pixel_rate_mhz;
            let vready_offset = (150.0 / dppclk)
                .max(repeater_delay + 20.0 / deep_sleep + 10.0 / dppclk)
                * dest.pixel_rate_mhz;

            let dst_x_after_scaler = ip.dppclk_delay_subtotal as f64 * dest.pixel_rate_mhz
                / dppclk
                + ip.dispclk_delay_subtotal as f64 * dest.pixel_rate_mhz / dispclk;
            let min_vstartup = if dest.htotal != 0 {
                (dst_x_after_scaler / dest.htotal as f64).ceil() as u32 + 1
            } else {
                1
            };
            let max_vstartup = dest.vtotal.saturating_sub(dest.vactive).saturating_sub(1);

            vba.vstartup[k] = max_vstartup.max(min_vstartup);
            vba.vupdate_offset_pix[k] = (dest.htotal as f64 / 4.0).ceil() as u32;
            vba.vupdate_width_pix[k] = vupdate_width as u32;
            vba.vready_offset_pix[k] = vready_offset as u32;
            vba.dscclk_calculated[k] = if pipe.dout.dsc_enable {
                dest.pixel_rate_mhz / if dest.odm_combine { 2.0 } else { 1.0 } / 3.0
            } else {
                0.0
            };
        }

        let return_bw = soc.return_bus_width_bytes as f64 * dcfclk;
        let extra_latency = (soc.round_trip_ping_latency_dcfclk_cycles as f64 + 32.0) / dcfclk
            + (soc.urgent_out_of_order_return_per_channel_bytes * soc.num_chans) as f64
                / return_bw;
        let urgent = soc.urgent_latency_us + extra_latency;

        Watermarks {
            urgent,
            stutter_enter_exit: soc.sr_enter_plus_exit_time_us + extra_latency,
            stutter_exit: soc.sr_exit_time_us + extra_latency,
            dram_clock_change: soc.dram_clock_change_latency_us + urgent,
            memory_trip: soc.urgent_latency_us,
            writeback_urgent: soc.writeback_latency_us,
            writeback_dram_clock_change: soc.writeback_latency_us
                + soc.writeback_dram_clock_change_latency_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe(h: u32, v: u32, htotal: u32, vtotal: u32, pixel_rate_mhz: f64) -> PipeParams {
        let mut pipe = PipeParams::default();
        pipe.src.viewport_width = h;
        pipe.src.viewport_height = v;
        pipe.dest.hactive = h;
        pipe.dest.vactive = v;
        pipe.dest.htotal = htotal;
        pipe.dest.vtotal = vtotal;
        pipe.dest.pixel_rate_mhz = pixel_rate_mhz;
        pipe.scale.hscl_ratio = 1.0;
        pipe.scale.vscl_ratio = 1.0;
        pipe.scale.htaps = 1;
        pipe.scale.vtaps = 1;
        pipe.dout.dp_lanes = 4;
        pipe.dout.output_bpp = 8;
        pipe
    }

    #[test]
    fn test_uhd60() {
        let soc = SocBoundingBox::nv10();
        let ip = IpParams::dcn20();
        let mut vba = Vba::default();
        let pipes = [pipe(3840, 2160, 4400, 2250, 594.0)];

        let level = Dml.voltage_level(&soc, &ip, &pipes, &mut vba);
        assert_eq!(level, Some(soc.lowest_level()));
        assert_eq!(vba.max_mpc_comb, 0);
        assert_eq!(vba.no_of_dpp[4][0][0], 1);
        assert!(!vba.odm_combine_enabled[0]);
        assert!(vba.dram_clock_change_support[4][0]);
    }

    #[test]
    fn test_odm() {
        let soc = SocBoundingBox::nv10();
        let mut ip = IpParams::dcn20();
        let mut vba = Vba::default();
        let mut uhd8k = pipe(7680, 4320, 9000, 4400, 1188.0);
        uhd8k.dout.dsc_enable = true;
        uhd8k.dout.dsc_bpp = 12 * 16;
        let pipes = [uhd8k];

        let level = Dml.voltage_level(&soc, &ip, &pipes, &mut vba);
        assert!(level.is_some());
        assert!(vba.odm_combine_enabled[0]);
        assert_eq!(vba.no_of_dpp[level.unwrap()][0][0], 2);

        ip.odm_capable = false;
        assert_eq!(Dml.voltage_level(&soc, &ip, &pipes, &mut vba), None);
    }

    #[test]
    fn test_downscale_split() {
        let soc = SocBoundingBox::nv10();
        let ip = IpParams::dcn20();
        let mut vba = Vba::default();
        let mut scaled = pipe(3840, 2160, 4400, 2250, 594.0);
        scaled.scale.hscl_ratio = 3.0;
        scaled.scale.vscl_ratio = 3.0;
        scaled.scale.htaps = 4;
        scaled.scale.vtaps = 4;

        let level = Dml.voltage_level(&soc, &ip, &[scaled], &mut vba).unwrap();
        assert_eq!(level, 3);
        assert_eq!(vba.max_mpc_comb, 1);
        assert_eq!(vba.no_of_dpp[level][1][0], 2);
        assert!(!vba.mode_support[level][0]);

        // taps must cover the ratio
        scaled.scale.htaps = 1;
        assert_eq!(Dml.voltage_level(&soc, &ip, &[scaled], &mut vba), None);
    }

    #[test]
    fn test_watermarks() {
        let soc = SocBoundingBox::nv10();
        let ip = IpParams::dcn20();
        let mut vba = Vba::default();
        let mut pipes = [pipe(1920, 1080, 2200, 1125, 148.5)];
        pipes[0].clks_cfg.dppclk_mhz = 150.0;
        pipes[0].clks_cfg.dispclk_mhz = 150.0;

        let mut prev: Option<Watermarks> = None;
        for level in 0..soc.num_states() {
            pipes[0].clks_cfg.voltage = level;
            pipes[0].clks_cfg.dcfclk_mhz = soc.clock_limits[level].dcfclk_mhz;
            pipes[0].clks_cfg.socclk_mhz = soc.clock_limits[level].socclk_mhz;
            let wm = Dml.watermarks(&soc, &ip, &pipes, &mut vba);
            if let Some(prev) = prev {
                assert!(wm.urgent >= prev.urgent);
                assert!(wm.dram_clock_change >= prev.dram_clock_change);
            }
            prev = Some(wm);
        }

        assert_eq!(vba.vupdate_offset_pix[0], 550);
        assert!(vba.vstartup[0] > 0);
        assert!(vba.vready_offset_pix[0] > 0);
        assert_eq!(vba.dcfclk, soc.clock_limits[4].dcfclk_mhz);
        assert_eq!(vba.dispclk, 150.0);
    }
}
