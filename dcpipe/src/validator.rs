// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Bandwidth validation and pipe split resolution.
//!
//! A validation pass folds stale splits back into their primary pipes, asks the calculator for
//! the lowest-power feasible level, then splits pipes where that level requires more than one
//! scaler or output combine.  Finally the clocks and the four watermark sets are computed against
//! the resulting pipe arrangement.

use super::adapter;
use super::bounding_box::{IpParams, SocBoundingBox};
use super::clocks::{self, WatermarkSet, WatermarkSets};
use super::dc::{DebugOptions, PipeSplitPolicy};
use super::dml::{ModeLib, Vba, Watermarks};
use super::mapper;
use super::pipe::{PairKind, PipeBandwidth};
use super::state::{BwContext, DcState};
use super::stream::{same_plane, Timing3dFormat, ViewFormat};
use super::types::{Error, Result};
use super::writeback;
use log::debug;

/// The number of watermark sets.
const NUM_WM_SETS: usize = 4;

/// The immutable inputs of a validation pass.
pub(crate) struct ValidationEnv<'a> {
    pub(crate) soc: &'a SocBoundingBox,
    pub(crate) ip: &'a IpParams,
    pub(crate) mode_lib: &'a dyn ModeLib,
    pub(crate) debug: &'a DebugOptions,
    /// The stream count of the committed state.
    pub(crate) current_stream_count: usize,
}

fn needs_split_3d(state: &DcState, idx: usize) -> bool {
    let Some(stream) = state.pipes[idx].stream.as_ref() else {
        return false;
    };

    matches!(
        stream.view_format,
        ViewFormat::SideBySide | ViewFormat::TopAndBottom
    ) && matches!(
        stream.timing().timing_3d_format,
        Timing3dFormat::SideBySide | Timing3dFormat::TopAndBottom
    )
}

fn merge_splits(state: &mut DcState) {
    for idx in 0..state.pipes.len() {
        let pipe = &state.pipes[idx];
        if pipe.bottom().is_some() && pipe.pair_kind() != Some(PairKind::Overlay) {
            state.merge_pair(idx);
        }
    }
}

/// Returns the highest-power level not above `vlevel` where no pipe needs a split.
fn find_unsplit_level(vba: &Vba, vlevel: usize) -> Option<usize> {
    (0..=vlevel)
        .rev()
        .find(|&l| vba.mode_support[l][0] && vba.no_of_dpp[l][0].iter().all(|&dpp| dpp == 1))
}

/// Validates the bandwidth of a state, splitting pipes as required.
///
/// With `fast`, only feasibility is decided and the watermark and clock results are reset.  On
/// error, the state must be discarded.
pub(crate) fn validate_bandwidth(
    env: &ValidationEnv,
    state: &mut DcState,
    fast: bool,
) -> Result<()> {
    let split_threshold = state.pipes.len() / 2;
    let stream_count = state.streams.len();
    state.hints.full_update_needed =
        (stream_count > split_threshold) != (env.current_stream_count > split_threshold);

    // mode support decides the splits from scratch
    merge_splits(state);

    let mut pipes = adapter::populate_parameters(state, env.debug.always_scale);
    if pipes.is_empty() {
        state.bw = BwContext::default();
        return Ok(());
    }

    let mut vba = Vba::default();
    let unsplit_ip = IpParams {
        odm_capable: false,
        ..*env.ip
    };
    let mut vlevel = env
        .mode_lib
        .voltage_level(env.soc, &unsplit_ip, &pipes, &mut vba);
    if vlevel.is_none() && env.ip.odm_capable {
        vlevel = env.mode_lib.voltage_level(env.soc, env.ip, &pipes, &mut vba);
    }
    let Some(mut vlevel) = vlevel.filter(|&l| l < env.soc.num_states()) else {
        debug!("no feasible level for {} pipes", pipes.len());
        return Err(Error::BandwidthExceeded);
    };

    let pipe_count = state.pipes.len();

    let single_display = state.pipes.iter().filter(|p| p.is_head()).count() == 1;
    let force_split = env.debug.force_single_disp_pipe_split && single_display;
    let avoid_split = stream_count > split_threshold
        || match env.debug.pipe_split_policy {
            PipeSplitPolicy::Dynamic => false,
            PipeSplitPolicy::Avoid => true,
            PipeSplitPolicy::AvoidMultDisp => !single_display,
        };
    let vlevel_unsplit = find_unsplit_level(&vba, vlevel);

    let mut split_from: Vec<Option<usize>> = vec![None; pipe_count];
    let mut k = 0;
    for idx in 0..pipe_count {
        if state.pipes[idx].is_free() || split_from[idx].is_some() {
            continue;
        }
        let pipe_idx = k;
        k += 1;

        let mut force = force_split;
        let tg = state.pipes[idx].stream_res.tg.unwrap_or(idx);
        if env.debug.forces_odm_combine(tg) {
            force = true;
            vba.odm_combine_enabled[pipe_idx] = true;
            vba.odm_combine_per_state[vlevel][pipe_idx] = true;
        }
        let comb = vba.max_mpc_comb;
        if force && vba.no_of_dpp[vlevel][comb][pipe_idx] == 1 {
            vba.required_dppclk[vlevel][comb][pipe_idx] /= 2.0;
        }

        let pipe = &state.pipes[idx];
        let blank_head = pipe.top().is_none() && pipe.plane.is_none();
        if blank_head && vba.odm_combine_per_state[vlevel][pipe_idx] {
            let secondary = state
                .find_idle_secondary_pipe(idx)
                .ok_or(Error::NoFreePipe)?;
            mapper::split_stream_for_combine(state, idx, secondary, true)?;
            split_from[secondary] = Some(pipe_idx);
        }

        let pipe = &state.pipes[idx];
        if pipe.plane.is_none() {
            continue;
        }
        if let Some(top) = pipe.top() {
            if same_plane(&state.pipes[top].plane, &pipe.plane) {
                continue;
            }
        }

        let need_split_3d = needs_split_3d(state, idx);
        let need_split = match vlevel_unsplit.filter(|_| avoid_split && !force && !need_split_3d) {
            Some(unsplit) => {
                vlevel = unsplit;
                vba.max_mpc_comb = 0;
                false
            }
            None => vba.no_of_dpp[vlevel][vba.max_mpc_comb][pipe_idx] > 1,
        };
        let odm = vba.odm_combine_per_state[vlevel][pipe_idx];

        let pipe = &state.pipes[idx];
        let bottom = pipe.bottom();
        let overlay = pipe.pair_kind() == Some(PairKind::Overlay);
        if bottom.is_some() && !overlay {
            unreachable!("pipe {idx} kept a split partner through the merge");
        }

        if need_split || need_split_3d || force {
            if overlay {
                // the overlay partner occupies the only secondary slot
                if need_split || need_split_3d || odm {
                    return Err(Error::UnsupportedSplitCombination);
                }
                continue;
            }

            let Some(secondary) = state.find_idle_secondary_pipe(idx) else {
                if !need_split && !need_split_3d {
                    continue;
                }
                return Err(Error::NoFreePipe);
            };
            mapper::split_stream_for_combine(state, idx, secondary, odm)?;
            split_from[secondary] = Some(pipe_idx);
        } else if overlay && odm {
            return Err(Error::UnsupportedSplitCombination);
        }
    }

    if state.pipes_in_use() != pipes.len() {
        pipes = adapter::populate_parameters(state, env.debug.always_scale);
    }

    let in_use: Vec<usize> = state
        .pipes
        .iter()
        .filter(|p| !p.is_free())
        .map(|p| p.idx)
        .collect();
    let comb = vba.max_mpc_comb;
    let mut k = 0;
    for (param, &idx) in pipes.iter_mut().zip(&in_use) {
        // split pipes share the results of their parent
        let parent = split_from[idx].unwrap_or_else(|| {
            k += 1;
            k - 1
        });

        param.clks_cfg.refclk_mhz = env.soc.dchub_refclk_mhz;
        param.clks_cfg.dispclk_mhz = vba.required_dispclk[vlevel][comb];
        param.clks_cfg.dppclk_mhz = vba.required_dppclk[vlevel][comb][parent];
        param.dest.odm_combine =
            vba.blending_and_timing[parent] == parent && vba.odm_combine_per_state[vlevel][parent];
    }

    debug!(
        "validated {} streams on {} pipes at level {vlevel}",
        stream_count,
        in_use.len()
    );

    if fast {
        for pipe in state.pipes.iter_mut() {
            pipe.bw = PipeBandwidth::default();
        }
        state.bw = BwContext {
            vba,
            voltage_level: Some(vlevel),
            ..Default::default()
        };
        return Ok(());
    }

    // only the first record carries the voltage and the DCF/SOC clocks
    let num_states = env.soc.num_states();
    let mut watermarks = WatermarkSets::default();
    let mut wm = Watermarks::default();
    for set in 0..NUM_WM_SETS {
        let level = vlevel.min((num_states + set).saturating_sub(NUM_WM_SETS));
        let limits = &env.soc.clock_limits[level];
        let clks = &mut pipes[0].clks_cfg;
        clks.voltage = level;
        clks.dcfclk_mhz = limits.dcfclk_mhz;
        clks.socclk_mhz = limits.socclk_mhz;

        wm = env.mode_lib.watermarks(env.soc, env.ip, &pipes, &mut vba);
        *watermarks.set_mut(set) = WatermarkSet::from(&wm);
    }

    let mcif_arb = writeback::set_mcif_arb_params(state, &wm);
    let mut clocks = clocks::extract_clocks(&vba, vlevel);

    for (k, (param, &idx)) in pipes.iter_mut().zip(&in_use).enumerate() {
        let at = |v: &[u32]| v.get(k).copied().unwrap_or(0);
        param.dest.vstartup_start = at(&vba.vstartup);
        param.dest.vupdate_offset = at(&vba.vupdate_offset_pix);
        param.dest.vupdate_width = at(&vba.vupdate_width_pix);
        param.dest.vready_offset = at(&vba.vready_offset_pix);

        let dppclk_khz = (param.clks_cfg.dppclk_mhz * 1000.0) as u32;
        let dscclk_mhz = vba.dscclk_calculated.get(k).copied().unwrap_or(0.0);
        clocks.dppclk_khz = clocks.dppclk_khz.max(dppclk_khz);

        let pipe = &mut state.pipes[idx];
        pipe.bw = PipeBandwidth {
            dppclk_khz,
            dscclk_khz: (dscclk_mhz * 1000.0) as u32,
        };
        pipe.dlg = param.dest;
    }

    state.bw = BwContext {
        vba,
        voltage_level: Some(vlevel),
        clocks,
        watermarks,
        mcif_arb,
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dml::Dml;
    use crate::resource::{ResourceCaps, ResourcePool, VirtualBlocks};
    use crate::stream::{Plane, Stream, WritebackInfo};
    use crate::testing::{self, ScriptedModeLib};
    use crate::types::Rect;
    use std::sync::Arc;

    fn state_with(caps: ResourceCaps) -> DcState {
        let pool = ResourcePool::new(caps, 6, Box::new(VirtualBlocks)).unwrap();
        DcState::new(&pool)
    }

    fn state() -> DcState {
        state_with(ResourceCaps::nv10())
    }

    fn no_force() -> DebugOptions {
        DebugOptions {
            force_single_disp_pipe_split: false,
            ..Default::default()
        }
    }

    fn run(
        state: &mut DcState,
        debug: &DebugOptions,
        mode_lib: &dyn ModeLib,
        fast: bool,
    ) -> Result<()> {
        let soc = SocBoundingBox::nv10();
        let ip = IpParams::dcn20();
        let env = ValidationEnv {
            soc: &soc,
            ip: &ip,
            mode_lib,
            debug,
            current_stream_count: 0,
        };
        validate_bandwidth(&env, state, fast)
    }

    fn add(state: &mut DcState, stream: &Arc<Stream>, plane: Option<Arc<Plane>>) {
        mapper::add_stream(state, stream.clone()).unwrap();
        if let Some(plane) = plane {
            mapper::add_plane(state, stream, plane).unwrap();
        }
    }

    #[test]
    fn test_empty() {
        let mut state = state();
        run(&mut state, &no_force(), &Dml, false).unwrap();
        assert_eq!(state.voltage_level(), None);
        assert_eq!(state.clocks().dispclk_khz, 0);
    }

    #[test]
    fn test_single_stream() {
        let mut state = state();
        let stream = Arc::new(Stream::new(testing::uhd60()));
        add(&mut state, &stream, Some(testing::full_plane(stream.timing())));

        run(&mut state, &no_force(), &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 1);
        assert_eq!(state.voltage_level(), Some(4));
        assert!(!state.vba().odm_combine_enabled[0]);

        let pipe = &state.pipes[0];
        assert!(pipe.bw.dppclk_khz > 0);
        assert_eq!(state.clocks().dppclk_khz, pipe.bw.dppclk_khz);
        assert_eq!(pipe.dlg.htotal, 4400);
        assert_eq!(pipe.dlg.vupdate_offset, 1100);
        assert!(pipe.dlg.vstartup_start > 0);
        assert!(state.clocks().p_state_change_support);
        assert!(state.mcif_arb_params().is_empty());
    }

    #[test]
    fn test_forced_single_display_split() {
        let mut state = state();
        let stream = Arc::new(Stream::new(testing::uhd60()));
        add(&mut state, &stream, Some(testing::full_plane(stream.timing())));

        run(&mut state, &DebugOptions::default(), &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 2);
        assert!(state.pipes[0].is_hsplit() && state.pipes[5].is_hsplit());
        assert!(!state.pipes[0].is_odm());
        assert_eq!(state.pipes[0].bw.dppclk_khz, state.pipes[5].bw.dppclk_khz);

        // a second display disables the forced split
        let other = Arc::new(Stream::new(testing::fhd60()));
        add(&mut state, &other, Some(testing::full_plane(other.timing())));
        run(&mut state, &DebugOptions::default(), &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 2);
        assert!(state.pipes[0].link == crate::pipe::PipeLink::Single);
    }

    #[test]
    fn test_scripted_split() {
        let mut state = state();
        let stream = Arc::new(Stream::new(testing::uhd60()));
        add(&mut state, &stream, Some(testing::full_plane(stream.timing())));

        let two_dpp = ScriptedModeLib {
            dpp: Some(2),
            ..Default::default()
        };
        run(&mut state, &no_force(), &two_dpp, false).unwrap();
        assert_eq!(state.pipes_in_use(), 2);
        assert_eq!(state.pipes[5].pair_kind(), Some(PairKind::PlaneSplit));
        assert!(state.pipes[0].is_hsplit() && state.pipes[5].is_hsplit());
        assert_eq!(state.pipes[0].dlg.full_recout_width, 3840);

        // the next pass merges the split back before deciding again
        run(&mut state, &no_force(), &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 1);
        assert!(state.pipes[5].is_free());
    }

    #[test]
    fn test_avoid_split() {
        let src = Rect::new(0, 0, 11520, 4320);
        let dst = Rect::new(0, 0, 3840, 2160);
        let plane = Arc::new(Plane::new(crate::formats::ARGB8888, src, dst));

        let mut state = self::state();
        let stream = Arc::new(Stream::new(testing::uhd60()));
        add(&mut state, &stream, Some(plane.clone()));
        run(&mut state, &no_force(), &Dml, false).unwrap();
        assert_eq!(state.voltage_level(), Some(4));
        assert_eq!(state.pipes_in_use(), 2);

        // a higher clock avoids the split
        let avoid = DebugOptions {
            pipe_split_policy: PipeSplitPolicy::Avoid,
            ..no_force()
        };
        run(&mut state, &avoid, &Dml, false).unwrap();
        assert_eq!(state.voltage_level(), Some(2));
        assert_eq!(state.pipes_in_use(), 1);
    }

    #[test]
    fn test_stereo_split() {
        for (view, format) in [
            (ViewFormat::SideBySide, Timing3dFormat::SideBySide),
            (ViewFormat::TopAndBottom, Timing3dFormat::TopAndBottom),
        ] {
            let mut timing = testing::uhd60();
            timing.timing_3d_format = format;
            let stream = Arc::new(Stream::new(timing).view_format(view));

            let mut state = state();
            add(&mut state, &stream, Some(testing::full_plane(stream.timing())));
            run(&mut state, &no_force(), &Dml, false).unwrap();
            assert_eq!(state.pipes_in_use(), 2);
            assert_eq!(state.pipes[5].pair_kind(), Some(PairKind::PlaneSplit));
            assert!(state.pipes[0].is_hsplit() && state.pipes[5].is_hsplit());

            // the split is required even when splits are avoided
            let avoid = DebugOptions {
                pipe_split_policy: PipeSplitPolicy::Avoid,
                ..no_force()
            };
            run(&mut state, &avoid, &Dml, false).unwrap();
            assert_eq!(state.pipes_in_use(), 2);
        }

        // stereo content on a 2D timing needs no split
        let stream = Arc::new(Stream::new(testing::uhd60()).view_format(ViewFormat::SideBySide));
        let mut state = state();
        add(&mut state, &stream, Some(testing::full_plane(stream.timing())));
        run(&mut state, &no_force(), &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 1);
    }

    #[test]
    fn test_avoid_split_multi_display() {
        let src = Rect::new(0, 0, 11520, 4320);
        let dst = Rect::new(0, 0, 3840, 2160);
        let plane = Arc::new(Plane::new(crate::formats::ARGB8888, src, dst));
        let avoid = DebugOptions {
            pipe_split_policy: PipeSplitPolicy::AvoidMultDisp,
            ..no_force()
        };

        // a single display still splits
        let mut state = self::state();
        let stream = Arc::new(Stream::new(testing::uhd60()));
        add(&mut state, &stream, Some(plane.clone()));
        run(&mut state, &avoid, &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 2);
        assert!(state.pipes[0].is_hsplit());

        let other = Arc::new(Stream::new(testing::fhd60()));
        add(&mut state, &other, None);
        run(&mut state, &avoid, &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 2);
        assert_eq!(state.stream_pipes(&stream).len(), 1);
        assert!(!state.pipes[0].is_hsplit());
        assert!(state.voltage_level().unwrap() < 4);
    }

    #[test]
    fn test_infeasible() {
        let mut state = state();
        let stream = Arc::new(Stream::new(testing::uhd60()));
        add(&mut state, &stream, None);

        let infeasible = ScriptedModeLib {
            infeasible: true,
            ..Default::default()
        };
        assert_eq!(
            run(&mut state, &no_force(), &infeasible, false),
            Err(Error::BandwidthExceeded)
        );
    }

    #[cfg(feature = "dsc")]
    #[test]
    fn test_output_combine() {
        let mut state = state();
        let stream = Arc::new(Stream::new(testing::uhd8k60_dsc()));
        add(&mut state, &stream, None);

        run(&mut state, &no_force(), &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 2);
        assert!(state.pipes[0].is_odm() && state.pipes[5].is_odm());
        assert!(state.pipes[0].dlg.odm_combine);
        assert!(state.pipes[5].dlg.odm_combine);
        assert_eq!(state.pipes[0].stream_res.dsc, Some(0));
        assert_eq!(state.pipes[5].stream_res.dsc, Some(1));
        assert!(state.pipes[0].bw.dscclk_khz > 0);
        assert_eq!(mapper::validate_global(&state), Ok(()));

        let caps = ResourceCaps {
            num_dsc: 1,
            ..ResourceCaps::nv10()
        };
        let mut state = state_with(caps);
        add(&mut state, &stream, None);
        assert_eq!(
            run(&mut state, &no_force(), &Dml, false),
            Err(Error::NoCompressorResource)
        );
    }

    #[test]
    fn test_forced_output_combine() {
        let mut state = state();
        let a = Arc::new(Stream::new(testing::fhd60()));
        let b = Arc::new(Stream::new(testing::fhd60()));
        add(&mut state, &a, None);
        add(&mut state, &b, None);

        let debug = DebugOptions {
            force_odm_combine: 1 << 1,
            ..no_force()
        };
        run(&mut state, &debug, &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 3);
        assert!(!state.pipes[0].is_odm());
        assert_eq!(state.pipes[1].bottom(), Some(4));
        assert!(state.pipes[4].is_odm());
        assert!(state.pipes[4].dlg.odm_combine);
        assert_eq!(state.pipes[4].stream_res.tg, Some(1));
        assert_eq!(state.pipes[4].stream_res.opp, Some(4));
    }

    #[test]
    fn test_overlay_combination() {
        let mut state = state();
        let stream = Arc::new(Stream::new(testing::uhd60()));
        let rect = Rect::new(0, 0, 640, 480);
        add(&mut state, &stream, Some(testing::full_plane(stream.timing())));
        mapper::add_plane(
            &mut state,
            &stream,
            Arc::new(Plane::new(crate::formats::ARGB8888, rect, rect)),
        )
        .unwrap();

        // the forced split yields to the overlay
        run(&mut state, &DebugOptions::default(), &Dml, false).unwrap();
        assert_eq!(state.pipes_in_use(), 2);

        let odm = ScriptedModeLib {
            odm: Some(true),
            ..Default::default()
        };
        assert_eq!(
            run(&mut state, &no_force(), &odm, false),
            Err(Error::UnsupportedSplitCombination)
        );

        let two_dpp = ScriptedModeLib {
            dpp: Some(2),
            ..Default::default()
        };
        let mut state = self::state();
        add(&mut state, &stream, Some(testing::full_plane(stream.timing())));
        mapper::add_plane(
            &mut state,
            &stream,
            Arc::new(Plane::new(crate::formats::ARGB8888, rect, rect)),
        )
        .unwrap();
        assert_eq!(
            run(&mut state, &no_force(), &two_dpp, false),
            Err(Error::UnsupportedSplitCombination)
        );
    }

    #[test]
    fn test_no_secondary_pipe() {
        let two_dpp = ScriptedModeLib {
            dpp: Some(2),
            ..Default::default()
        };
        let mut state = state();
        for _ in 0..6 {
            let stream = Arc::new(Stream::new(testing::fhd60()));
            add(&mut state, &stream, Some(testing::full_plane(stream.timing())));
        }
        assert_eq!(
            run(&mut state, &no_force(), &two_dpp, false),
            Err(Error::NoFreePipe)
        );
    }

    #[test]
    fn test_split_threshold_hint() {
        let mut state = state();
        for _ in 0..4 {
            add(&mut state, &Arc::new(Stream::new(testing::fhd60())), None);
        }

        run(&mut state, &no_force(), &Dml, false).unwrap();
        assert!(state.commit_hints().full_update_needed);

        let mut state = self::state();
        add(&mut state, &Arc::new(Stream::new(testing::fhd60())), None);
        run(&mut state, &no_force(), &Dml, false).unwrap();
        assert!(!state.commit_hints().full_update_needed);
    }

    #[test]
    fn test_fast_validate() {
        let mut state = state();
        let stream = Arc::new(Stream::new(testing::uhd60()));
        add(&mut state, &stream, Some(testing::full_plane(stream.timing())));

        run(&mut state, &no_force(), &Dml, false).unwrap();
        assert!(state.clocks().dispclk_khz > 0);

        // a fast pass resets the results of the previous full pass
        run(&mut state, &no_force(), &Dml, true).unwrap();
        assert_eq!(state.voltage_level(), Some(4));
        assert_eq!(state.watermarks().a.urgent_ns, 0);
        assert_eq!(state.clocks().dispclk_khz, 0);
        assert_eq!(state.pipes[0].bw.dppclk_khz, 0);
    }

    #[test]
    fn test_watermarks() {
        let mut state = state();
        let info = WritebackInfo {
            crop_width: 1920,
            crop_height: 1080,
            dest_width: 1920,
            dest_height: 1080,
            ..Default::default()
        };
        let stream = Arc::new(Stream::new(testing::fhd60()).writeback(info));
        add(&mut state, &stream, Some(testing::full_plane(stream.timing())));

        run(&mut state, &no_force(), &Dml, false).unwrap();
        let level = state.voltage_level().unwrap();
        let sets = state.watermarks().as_array();
        for pair in sets.windows(2) {
            assert!(pair[1].urgent_ns >= pair[0].urgent_ns);
            assert!(pair[1].pstate_change_ns >= pair[0].pstate_change_ns);
        }
        assert!(sets[0].urgent_ns > 0);

        let soc = SocBoundingBox::nv10();
        assert_eq!(
            state.clocks().dcfclk_khz,
            (soc.clock_limits[level].dcfclk_mhz * 1000.0) as u32
        );

        let mcif = state.mcif_arb_params();
        assert_eq!(mcif.len(), 1);
        assert_eq!(mcif[0].cli_watermark, [12000; 4]);
        assert_eq!(mcif[0].time_per_pixel, 107);
    }

    #[test]
    fn test_idempotent() {
        let mut state = state();
        let a = Arc::new(Stream::new(testing::uhd60()));
        let b = Arc::new(Stream::new(testing::fhd60()));
        add(&mut state, &a, Some(testing::full_plane(a.timing())));
        add(&mut state, &b, Some(testing::full_plane(b.timing())));

        run(&mut state, &DebugOptions::default(), &Dml, false).unwrap();
        let first = state.clone();
        run(&mut state, &DebugOptions::default(), &Dml, false).unwrap();

        assert_eq!(state.voltage_level(), first.voltage_level());
        assert_eq!(state.clocks(), first.clocks());
        assert_eq!(state.watermarks(), first.watermarks());
        for (a, b) in state.pipes.iter().zip(&first.pipes) {
            assert_eq!(a.link, b.link);
            assert_eq!(a.plane_res, b.plane_res);
            assert_eq!(a.stream_res, b.stream_res);
            assert_eq!(a.bw, b.bw);
        }
    }
}
