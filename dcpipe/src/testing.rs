// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Shared test fixtures.

use super::bounding_box::{IpParams, SocBoundingBox};
use super::dml::{Dml, ModeLib, PipeParams, Vba, Watermarks};
use super::formats;
use super::stream::{DscConfig, Plane, Timing, TimingFlags};
use super::types::Rect;
use std::sync::Arc;

/// 3840x2160@60.
pub(crate) fn uhd60() -> Timing {
    Timing::from_mode(594000, 3840, 4016, 4104, 4400, 2160, 2168, 2178, 2250)
}

/// 1920x1080@60.
pub(crate) fn fhd60() -> Timing {
    Timing::from_mode(148500, 1920, 2008, 2052, 2200, 1080, 1084, 1089, 1125)
}

/// 7680x4320@60 with compression.
pub(crate) fn uhd8k60_dsc() -> Timing {
    let mut timing =
        Timing::from_mode(1188000, 7680, 7800, 7900, 9000, 4320, 4328, 4336, 4400);
    timing.flags |= TimingFlags::DSC;
    timing.dsc_cfg = DscConfig {
        num_slices_h: 4,
        num_slices_v: 1,
        bits_per_pixel: 12 * 16,
        ycbcr422_simple: false,
    };
    timing
}

/// An unscaled ARGB plane covering the whole timing.
pub(crate) fn full_plane(timing: &Timing) -> Arc<Plane> {
    let rect = Rect::new(
        0,
        0,
        timing.h_addressable as i32,
        timing.v_addressable as i32,
    );
    Arc::new(Plane::new(formats::ARGB8888, rect, rect))
}

/// A calculator that overrides the split and combine decisions of `Dml`.
///
/// When either decision is scripted, every level is reported as supported and the lowest level is
/// chosen.
#[derive(Default)]
pub(crate) struct ScriptedModeLib {
    pub(crate) dpp: Option<u32>,
    pub(crate) odm: Option<bool>,
    pub(crate) infeasible: bool,
}

impl ModeLib for ScriptedModeLib {
    fn voltage_level(
        &self,
        soc: &SocBoundingBox,
        ip: &IpParams,
        pipes: &[PipeParams],
        vba: &mut Vba,
    ) -> Option<usize> {
        if self.infeasible {
            vba.reset(soc.num_states(), pipes.len());
            return None;
        }

        let level = Dml.voltage_level(soc, ip, pipes, vba);
        if self.dpp.is_none() && self.odm.is_none() {
            return level;
        }

        for l in 0..soc.num_states() {
            if let Some(dpp) = self.dpp {
                for comb in vba.no_of_dpp[l].iter_mut() {
                    comb.fill(dpp);
                }
            }
            if let Some(odm) = self.odm {
                vba.odm_combine_per_state[l].fill(odm);
            }
            vba.mode_support[l] = [true; 2];
        }

        let level = soc.lowest_level();
        vba.voltage_level = level;
        vba.max_mpc_comb = 0;
        vba.odm_combine_enabled = vba.odm_combine_per_state[level].clone();

        Some(level)
    }

    fn watermarks(
        &self,
        soc: &SocBoundingBox,
        ip: &IpParams,
        pipes: &[PipeParams],
        vba: &mut Vba,
    ) -> Watermarks {
        Dml.watermarks(soc, ip, pipes, vba)
    }
}
