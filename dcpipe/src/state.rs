// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Validation contexts.
//!
//! A `DcState` is the working set of one configuration: the pipe contexts, the active streams,
//! the acquisition tables of the scarce resources, and the bandwidth results.  A state is created
//! by copying the committed state, mutated by the mapper and the validator, and either committed or
//! dropped.

use super::clocks::{ClockState, WatermarkSets};
use super::dml::Vba;
use super::pipe::{PairKind, PipeContext, PipeLink};
use super::resource::{BlockKind, ResourcePool};
use super::stream::{same_stream, Stream};
use super::writeback::McifArbParams;
use log::debug;
use std::sync::Arc;

/// The bandwidth results of a state.
#[derive(Clone, Debug, Default)]
pub(crate) struct BwContext {
    pub(crate) vba: Vba,
    pub(crate) voltage_level: Option<usize>,
    pub(crate) clocks: ClockState,
    pub(crate) watermarks: WatermarkSets,
    pub(crate) mcif_arb: Vec<McifArbParams>,
}

/// Hints for committing a state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommitHints {
    /// The pipe split policy changed and every pipe must be reprogrammed.
    pub full_update_needed: bool,
}

/// A display configuration.
#[derive(Clone, Debug)]
pub struct DcState {
    pub(crate) pipes: Vec<PipeContext>,
    pub(crate) streams: Vec<Arc<Stream>>,
    pub(crate) dsc_acquired: Vec<bool>,
    pub(crate) stream_enc_acquired: Vec<bool>,
    pub(crate) audio_acquired: Vec<bool>,
    pub(crate) pll_refs: Vec<u32>,
    pub(crate) dp_dto_refs: u32,
    pub(crate) bw: BwContext,
    pub(crate) hints: CommitHints,
}

impl DcState {
    pub(crate) fn new(pool: &ResourcePool) -> Self {
        Self {
            pipes: (0..pool.pipe_count()).map(PipeContext::new).collect(),
            streams: Vec::new(),
            dsc_acquired: vec![false; pool.count(BlockKind::Dsc)],
            stream_enc_acquired: vec![false; pool.count(BlockKind::StreamEncoder)],
            audio_acquired: vec![false; pool.count(BlockKind::Audio)],
            pll_refs: vec![0; pool.count(BlockKind::ClockSource)],
            dp_dto_refs: 0,
            bw: Default::default(),
            hints: Default::default(),
        }
    }

    /// Returns the pipe contexts.
    pub fn pipes(&self) -> &[PipeContext] {
        &self.pipes
    }

    /// Returns the active streams.
    pub fn streams(&self) -> &[Arc<Stream>] {
        &self.streams
    }

    /// Returns the number of pipes in use.
    pub fn pipes_in_use(&self) -> usize {
        self.pipes.iter().filter(|p| !p.is_free()).count()
    }

    /// Returns the pipes of a stream, head first.
    pub fn stream_pipes(&self, stream: &Arc<Stream>) -> Vec<&PipeContext> {
        let mut pipes: Vec<&PipeContext> = self
            .pipes
            .iter()
            .filter(|p| same_stream(&p.stream, stream))
            .collect();
        pipes.sort_by_key(|p| !p.is_head());
        pipes
    }

    /// Returns the chosen feasibility level of the last validation.
    pub fn voltage_level(&self) -> Option<usize> {
        self.bw.voltage_level
    }

    /// Returns the clocks of the last validation.
    pub fn clocks(&self) -> &ClockState {
        &self.bw.clocks
    }

    /// Returns the watermarks of the last validation.
    pub fn watermarks(&self) -> &WatermarkSets {
        &self.bw.watermarks
    }

    /// Returns the writeback arbitration parameters of the last validation.
    pub fn mcif_arb_params(&self) -> &[McifArbParams] {
        &self.bw.mcif_arb
    }

    /// Returns the commit hints.
    pub fn commit_hints(&self) -> CommitHints {
        self.hints
    }

    /// Returns the calculator state of the last validation.
    pub fn vba(&self) -> &Vba {
        &self.bw.vba
    }

    pub(crate) fn has_stream(&self, stream: &Arc<Stream>) -> bool {
        self.streams.iter().any(|s| Arc::ptr_eq(s, stream))
    }

    pub(crate) fn head_pipe(&self, stream: &Arc<Stream>) -> Option<usize> {
        self.pipes
            .iter()
            .position(|p| same_stream(&p.stream, stream) && p.top().is_none())
    }

    pub(crate) fn find_free_pipe(&self) -> Option<usize> {
        self.pipes.iter().position(|p| p.is_free())
    }

    /// Finds a free pipe to pair with `primary`.
    ///
    /// The mirrored index is preferred so that split pipes of different streams do not
    /// interleave.  Otherwise the highest free pipe is taken.
    pub(crate) fn find_idle_secondary_pipe(&self, primary: usize) -> Option<usize> {
        let count = self.pipes.len();
        let preferred = count.checked_sub(primary + 1)?;
        if preferred != primary && self.pipes[preferred].is_free() {
            return Some(preferred);
        }

        (0..count)
            .rev()
            .find(|&idx| idx != primary && self.pipes[idx].is_free())
    }

    pub(crate) fn acquire_dsc(&mut self) -> Option<usize> {
        let inst = self.dsc_acquired.iter().position(|acquired| !acquired)?;
        self.dsc_acquired[inst] = true;
        Some(inst)
    }

    pub(crate) fn release_dsc(&mut self, inst: usize) {
        if let Some(acquired) = self.dsc_acquired.get_mut(inst) {
            *acquired = false;
        }
    }

    /// Folds the bottom pipe of a split pair back into `primary`.
    pub(crate) fn merge_pair(&mut self, primary: usize) {
        let Some(secondary) = self.pipes[primary].bottom() else {
            return;
        };

        debug!("merging pipe {secondary} into pipe {primary}");

        if let Some(dsc) = self.pipes[secondary].stream_res.dsc {
            if self.pipes[primary].stream_res.dsc != Some(dsc) {
                self.release_dsc(dsc);
            }
        }

        self.pipes[secondary].clear();

        let pipe = &mut self.pipes[primary];
        pipe.link = PipeLink::Single;
        pipe.build_scaling_params();
        pipe.update_pixel_clock();
    }

    /// Steals the bottom pipe of the first split pair.
    pub(crate) fn acquire_first_split_pipe(&mut self) -> Option<usize> {
        let (primary, secondary) = self.pipes.iter().find_map(|p| match p.link {
            PipeLink::Pair {
                primary,
                secondary,
                kind,
            } if kind != PairKind::Overlay && secondary == p.idx => Some((primary, secondary)),
            _ => None,
        })?;

        self.merge_pair(primary);
        Some(secondary)
    }
}
