// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Stream and plane to pipe mapping.

use super::pipe::{ClockSourceId, PairKind, PipeContext, PipeLink, PlaneResources};
use super::state::DcState;
use super::stream::{same_plane, same_stream, Plane, Stream};
use super::types::{Error, Result};
use log::debug;
use std::sync::Arc;

/// The minimum width of each half of an output combine split.
const MIN_SPLIT_WIDTH: i32 = 16;

fn own_plane_resources(idx: usize) -> PlaneResources {
    PlaneResources {
        hubp: Some(idx),
        ipp: Some(idx),
        dpp: Some(idx),
        mpcc: Some(idx),
    }
}

fn acquire_stream_encoder(state: &mut DcState, stream: &Stream) -> Option<usize> {
    let acquired = &mut state.stream_enc_acquired;
    let inst = stream
        .link
        .preferred_engine
        .filter(|&inst| inst < acquired.len() && !acquired[inst])
        .or_else(|| acquired.iter().position(|a| !a))?;

    acquired[inst] = true;
    Some(inst)
}

fn acquire_audio(state: &mut DcState) -> Option<usize> {
    let inst = state.audio_acquired.iter().position(|a| !a)?;
    state.audio_acquired[inst] = true;
    Some(inst)
}

fn acquire_clock_source(state: &mut DcState, stream: &Stream) -> Option<ClockSourceId> {
    if stream.signal_type().is_dp() {
        state.dp_dto_refs += 1;
        return Some(ClockSourceId::DpDto);
    }

    let shared = state.pipes.iter().find_map(|p| {
        let other = p.stream.as_ref()?;
        match p.stream_res.clock_source {
            Some(ClockSourceId::Pll(inst)) if p.is_head() && stream.is_timing_shareable(other) => {
                Some(inst)
            }
            _ => None,
        }
    });

    let inst = match shared {
        Some(inst) => inst,
        None => state.pll_refs.iter().position(|&refs| refs == 0)?,
    };

    state.pll_refs[inst] += 1;
    Some(ClockSourceId::Pll(inst))
}

fn release_clock_source(state: &mut DcState, clock_source: ClockSourceId) {
    match clock_source {
        ClockSourceId::DpDto => state.dp_dto_refs = state.dp_dto_refs.saturating_sub(1),
        ClockSourceId::Pll(inst) => {
            if let Some(refs) = state.pll_refs.get_mut(inst) {
                *refs = refs.saturating_sub(1);
            }
        }
    }
}

fn release_stream_resources(state: &mut DcState, idx: usize) {
    let res = state.pipes[idx].stream_res;
    if let Some(inst) = res.stream_enc {
        state.stream_enc_acquired[inst] = false;
    }
    if let Some(inst) = res.audio {
        state.audio_acquired[inst] = false;
    }
    if let Some(clock_source) = res.clock_source {
        release_clock_source(state, clock_source);
    }
}

/// Maps a stream to a free pipe.
///
/// When the stream requests compression and no compressor is free, the stream stays mapped and
/// `Error::NoCompressorResource` is returned.  On any other error the stream is not mapped.
pub(crate) fn add_stream(state: &mut DcState, stream: Arc<Stream>) -> Result<()> {
    if state.has_stream(&stream) {
        return Error::user();
    }
    let timing = stream.timing();
    i32::try_from(timing.h_addressable)?;
    i32::try_from(timing.v_addressable)?;

    let idx = match state.find_free_pipe() {
        Some(idx) => idx,
        None => state.acquire_first_split_pipe().ok_or(Error::NoFreePipe)?,
    };

    {
        let pipe = &mut state.pipes[idx];
        pipe.stream = Some(stream.clone());
        pipe.plane_res = own_plane_resources(idx);
        pipe.stream_res.tg = Some(idx);
        pipe.stream_res.opp = Some(idx);
    }

    let Some(enc) = acquire_stream_encoder(state, &stream) else {
        state.pipes[idx].clear();
        return Err(Error::NoStreamEncoder);
    };
    state.pipes[idx].stream_res.stream_enc = Some(enc);

    if stream.audio {
        // streams map without audio when every endpoint is taken
        state.pipes[idx].stream_res.audio = acquire_audio(state);
    }

    let Some(clock_source) = acquire_clock_source(state, &stream) else {
        release_stream_resources(state, idx);
        state.pipes[idx].clear();
        return Err(Error::NoClockSource);
    };
    state.pipes[idx].stream_res.clock_source = Some(clock_source);

    state.pipes[idx].build_scaling_params();
    state.pipes[idx].update_pixel_clock();
    state.streams.push(stream.clone());

    debug!("mapped stream to pipe {idx} with {clock_source:?}");

    if stream.needs_dsc() {
        let dsc = state.acquire_dsc().ok_or(Error::NoCompressorResource)?;
        state.pipes[idx].stream_res.dsc = Some(dsc);
    }

    Ok(())
}

/// Removes a stream and frees its pipes.
pub(crate) fn remove_stream(state: &mut DcState, stream: &Arc<Stream>) -> Result<()> {
    let Some(pos) = state.streams.iter().position(|s| Arc::ptr_eq(s, stream)) else {
        return Error::user();
    };

    let pipes: Vec<usize> = state
        .pipes
        .iter()
        .filter(|p| same_stream(&p.stream, stream))
        .map(|p| p.idx)
        .collect();

    for &idx in &pipes {
        if let Some(dsc) = state.pipes[idx].stream_res.dsc {
            state.release_dsc(dsc);
        }
    }

    if let Some(head) = state.head_pipe(stream) {
        release_stream_resources(state, head);
    }

    for &idx in &pipes {
        state.pipes[idx].clear();
    }

    state.streams.remove(pos);

    debug!("removed stream from pipes {pipes:?}");

    Ok(())
}

/// Attaches a plane to a stream.
///
/// The first plane is scanned out by the head pipe.  A second plane takes an idle pipe that
/// borrows the head's timing generator and output processor.
pub(crate) fn add_plane(
    state: &mut DcState,
    stream: &Arc<Stream>,
    plane: Arc<Plane>,
) -> Result<()> {
    if !plane.is_valid() {
        return Error::user();
    }

    let head = state.head_pipe(stream).ok_or(Error::User)?;
    if state.pipes[head].pair_kind().is_some_and(|k| k != PairKind::Overlay) {
        state.merge_pair(head);
    }

    if state.pipes[head].plane.is_none() {
        let pipe = &mut state.pipes[head];
        pipe.plane = Some(plane);
        pipe.build_scaling_params();
        return Ok(());
    }

    if state.pipes[head].bottom().is_some() {
        return Error::unsupported();
    }

    let idx = state
        .find_idle_secondary_pipe(head)
        .ok_or(Error::NoFreePipe)?;
    acquire_idle_pipe_for_layer(state, head, idx, plane);

    debug!("added overlay plane on pipe {idx}");

    Ok(())
}

fn acquire_idle_pipe_for_layer(state: &mut DcState, head: usize, idx: usize, plane: Arc<Plane>) {
    let link = PipeLink::Pair {
        primary: head,
        secondary: idx,
        kind: PairKind::Overlay,
    };

    let head_pipe = &state.pipes[head];
    let mut pipe = PipeContext::new(idx);
    pipe.stream = head_pipe.stream.clone();
    pipe.plane = Some(plane);
    pipe.link = link;
    pipe.plane_res = own_plane_resources(idx);
    pipe.stream_res.tg = head_pipe.stream_res.tg;
    pipe.stream_res.opp = head_pipe.stream_res.opp;
    pipe.build_scaling_params();

    state.pipes[idx] = pipe;
    state.pipes[head].link = link;
}

/// Detaches a plane from a stream.
pub(crate) fn remove_plane(
    state: &mut DcState,
    stream: &Arc<Stream>,
    plane: &Arc<Plane>,
) -> Result<()> {
    let head = state.head_pipe(stream).ok_or(Error::User)?;
    if state.pipes[head].pair_kind().is_some_and(|k| k != PairKind::Overlay) {
        state.merge_pair(head);
    }

    let plane = Some(plane.clone());
    let overlay = state.pipes[head].bottom();

    if let Some(idx) = overlay.filter(|&idx| same_plane(&state.pipes[idx].plane, &plane)) {
        state.pipes[idx].clear();
        state.pipes[head].link = PipeLink::Single;
        return Ok(());
    }

    if !same_plane(&state.pipes[head].plane, &plane) {
        return Error::user();
    }

    // the overlay plane moves to the head
    let next = match overlay {
        Some(idx) => {
            let next = state.pipes[idx].plane.take();
            state.pipes[idx].clear();
            next
        }
        None => None,
    };

    let pipe = &mut state.pipes[head];
    pipe.plane = next;
    pipe.link = PipeLink::Single;
    pipe.build_scaling_params();

    Ok(())
}

/// Splits `primary` onto the idle pipe `secondary`.
///
/// With `odm`, the output timing is combined from both pipes and each pipe scans out one half of
/// the active area.  Otherwise the plane is split for scaler throughput.  On error, the state must
/// be discarded.
pub(crate) fn split_stream_for_combine(
    state: &mut DcState,
    primary: usize,
    secondary: usize,
    odm: bool,
) -> Result<()> {
    let kind = if odm {
        PairKind::OutputCombine
    } else {
        PairKind::PlaneSplit
    };
    let link = PipeLink::Pair {
        primary,
        secondary,
        kind,
    };

    let mut sec = state.pipes[primary].clone();
    sec.idx = secondary;
    sec.link = link;
    sec.plane_res = own_plane_resources(secondary);
    sec.stream_res.stream_enc = None;
    sec.stream_res.audio = None;
    sec.stream_res.clock_source = None;
    state.pipes[secondary] = sec;
    state.pipes[primary].link = link;

    debug!("splitting pipe {primary} onto pipe {secondary} ({kind:?})");

    if !odm {
        state.pipes[primary].build_scaling_params();
        state.pipes[secondary].build_scaling_params();
        return Ok(());
    }

    // a blank stream has no recout to divide, so the margin only binds a plane
    if state.pipes[primary].plane.is_some() {
        let pri = &mut state.pipes[primary].scl;
        pri.h_active /= 2;
        if pri.recout.x + MIN_SPLIT_WIDTH >= pri.h_active {
            return Err(Error::SplitInfeasible);
        }
        let new_width = pri.h_active - pri.recout.x;
        let removed = pri.recout.width - new_width;
        pri.viewport.width -= pri.ratios.horz.mul_int(removed).floor();
        pri.viewport_c.width -= pri.ratios.horz_c.mul_int(removed).floor();
        pri.recout.width = new_width;

        let sec = &mut state.pipes[secondary].scl;
        sec.h_active /= 2;
        let new_width = sec.recout.width + sec.recout.x - sec.h_active;
        if new_width <= MIN_SPLIT_WIDTH {
            return Err(Error::SplitInfeasible);
        }
        let removed = sec.recout.width - new_width;
        sec.viewport.width -= sec.ratios.horz.mul_int(removed).floor();
        sec.viewport_c.width -= sec.ratios.horz_c.mul_int(removed).floor();
        sec.recout.width = new_width;
        let skipped = sec.h_active - sec.recout.x;
        sec.viewport.x += sec.ratios.horz.mul_int(skipped).floor();
        sec.viewport_c.x += sec.ratios.horz_c.mul_int(skipped).floor();
        sec.recout.x = 0;
    }

    state.pipes[secondary].stream_res.opp = Some(secondary);
    state.pipes[secondary].stream_res.dsc = None;

    let needs_dsc = state.pipes[primary]
        .stream
        .as_ref()
        .is_some_and(|s| s.needs_dsc());
    if needs_dsc {
        let dsc = state.acquire_dsc().ok_or(Error::NoCompressorResource)?;
        state.pipes[secondary].stream_res.dsc = Some(dsc);
    }

    state.pipes[primary].update_pixel_clock();
    state.pipes[secondary].update_pixel_clock();

    Ok(())
}

/// Validates the resources of a state independently of bandwidth.
///
/// Every pipe of a compressed stream must hold a compressor, and the picture width of each pipe
/// must divide into the configured slices.
pub(crate) fn validate_global(state: &DcState) -> Result<()> {
    for stream in state.streams.iter().filter(|s| s.needs_dsc()) {
        let timing = stream.timing();
        let slices = timing.dsc_cfg.num_slices_h;
        if slices == 0 {
            return Error::user();
        }

        for pipe in state.pipes.iter().filter(|p| same_stream(&p.stream, stream)) {
            if pipe.stream_res.dsc.is_none() {
                return Err(Error::NoCompressorResource);
            }

            let mut pic_width = timing.h_addressable + timing.h_border_left + timing.h_border_right;
            if pipe.is_odm() {
                pic_width /= 2;
            }
            if pic_width % slices != 0 {
                return Error::ctx("picture width is not a multiple of the slice count");
            }
        }
    }

    Ok(())
}
