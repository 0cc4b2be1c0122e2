// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Display core.
//!
//! This module defines `Dc` and `Builder`.  A `Dc` owns the resource pool, the bounding box, and
//! the committed state.  Configurations are built on copies of the committed state and only
//! replace it once they validate.

use super::bounding_box::{init_soc_bounding_box, BoundingBoxOverrides, IpParams, SocBoundingBox};
use super::dml::{Dml, ModeLib};
use super::mapper;
use super::resource::{BlockFactory, ResourceCaps, ResourcePool, VirtualBlocks};
use super::smu::PowerPlay;
use super::state::DcState;
use super::stream::{Plane, Stream};
use super::types::Result;
use super::validator::{self, ValidationEnv};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};

/// The default number of pipes.
pub const DEFAULT_PIPE_COUNT: usize = 6;

/// When to split a plane across two pipes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum PipeSplitPolicy {
    /// Split whenever the calculator asks for it.
    #[default]
    Dynamic,
    /// Prefer a higher clock over a split.
    Avoid,
    /// Prefer a higher clock over a split when more than one display is active.
    AvoidMultDisp,
}

/// Debug options.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DebugOptions {
    /// The pipe split policy.
    pub pipe_split_policy: PipeSplitPolicy,
    /// Split the pipe of a single display even when not required.
    pub force_single_disp_pipe_split: bool,
    /// A mask of timing generators whose streams are always output-combined.
    pub force_odm_combine: u32,
    /// Always run the scaler, even for unscaled planes.
    pub always_scale: bool,
    /// Do not send the watermark clock ranges to the firmware.
    pub disable_pplib_wm_range: bool,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            pipe_split_policy: PipeSplitPolicy::Dynamic,
            force_single_disp_pipe_split: true,
            force_odm_combine: 0,
            always_scale: false,
            disable_pplib_wm_range: false,
        }
    }
}

impl DebugOptions {
    pub(crate) fn forces_odm_combine(&self, tg: usize) -> bool {
        tg < 32 && self.force_odm_combine & (1 << tg) != 0
    }
}

/// A display core.
pub struct Dc {
    pool: ResourcePool,
    soc: SocBoundingBox,
    ip: IpParams,
    debug: DebugOptions,
    mode_lib: Box<dyn ModeLib>,
    current: Mutex<DcState>,
}

impl Dc {
    /// Returns a copy of the committed state to build a new configuration on.
    pub fn create_state(&self) -> DcState {
        self.current.lock().unwrap().clone()
    }

    /// Returns a copy of the committed state.
    pub fn current_state(&self) -> DcState {
        self.create_state()
    }

    /// Maps a stream to a free pipe and acquires its back-end resources.
    pub fn add_stream(&self, state: &mut DcState, stream: Arc<Stream>) -> Result<()> {
        mapper::add_stream(state, stream)
    }

    /// Unmaps a stream and releases its resources.
    pub fn remove_stream(&self, state: &mut DcState, stream: &Arc<Stream>) -> Result<()> {
        mapper::remove_stream(state, stream)
    }

    /// Attaches a plane to a stream.
    ///
    /// The first plane of a stream goes to the head pipe.  A second plane takes an idle pipe as an
    /// overlay.
    pub fn add_plane(
        &self,
        state: &mut DcState,
        stream: &Arc<Stream>,
        plane: Arc<Plane>,
    ) -> Result<()> {
        mapper::add_plane(state, stream, plane)
    }

    /// Detaches a plane from a stream.
    pub fn remove_plane(
        &self,
        state: &mut DcState,
        stream: &Arc<Stream>,
        plane: &Arc<Plane>,
    ) -> Result<()> {
        mapper::remove_plane(state, stream, plane)
    }

    /// Checks the constraints that do not depend on bandwidth.
    pub fn validate_global(&self, state: &DcState) -> Result<()> {
        mapper::validate_global(state)
    }

    /// Validates the bandwidth of a state.
    ///
    /// This may split or merge pipes.  When `fast` is set, only the feasibility level is
    /// determined and the clocks and the watermarks are reset to zero.
    pub fn validate_bandwidth(&self, state: &mut DcState, fast: bool) -> Result<()> {
        let current_stream_count = self.current.lock().unwrap().streams.len();
        self.validate(state, fast, current_stream_count)
    }

    /// Validates a state and makes it the committed state.
    ///
    /// The committed state is left untouched on failure.
    pub fn commit_state(&self, mut state: DcState) -> Result<()> {
        let mut current = self.current.lock().unwrap();

        mapper::validate_global(&state)?;
        self.validate(&mut state, false, current.streams.len())?;

        debug!(
            "committing {} streams on {} pipes",
            state.streams.len(),
            state.pipes_in_use()
        );
        *current = state;

        Ok(())
    }

    /// Returns the number of pipes.
    pub fn pipe_count(&self) -> usize {
        self.pool.pipe_count()
    }

    /// Returns the resource pool.
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// Returns the bounding box.
    pub fn bounding_box(&self) -> &SocBoundingBox {
        &self.soc
    }

    /// Returns the IP parameters.
    pub fn ip_params(&self) -> &IpParams {
        &self.ip
    }

    /// Returns the debug options.
    pub fn debug_options(&self) -> &DebugOptions {
        &self.debug
    }

    fn validate(
        &self,
        state: &mut DcState,
        fast: bool,
        current_stream_count: usize,
    ) -> Result<()> {
        let env = ValidationEnv {
            soc: &self.soc,
            ip: &self.ip,
            mode_lib: self.mode_lib.as_ref(),
            debug: &self.debug,
            current_stream_count,
        };

        validator::validate_bandwidth(&env, state, fast)
    }
}

/// A display core builder.
pub struct Builder {
    pipe_count: usize,
    caps: ResourceCaps,
    factory: Box<dyn BlockFactory>,
    power_play: Option<Box<dyn PowerPlay>>,
    debug: DebugOptions,
    overrides: BoundingBoxOverrides,
    soc: SocBoundingBox,
    ip: IpParams,
    mode_lib: Box<dyn ModeLib>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            pipe_count: DEFAULT_PIPE_COUNT,
            caps: Default::default(),
            factory: Box::new(VirtualBlocks),
            power_play: None,
            debug: Default::default(),
            overrides: Default::default(),
            soc: Default::default(),
            ip: Default::default(),
            mode_lib: Box::new(Dml),
        }
    }
}

impl Builder {
    /// Creates a display core builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the number of pipes.
    pub fn pipe_count(mut self, pipe_count: usize) -> Self {
        self.pipe_count = pipe_count;
        self
    }

    /// Sets the resource caps.
    pub fn caps(mut self, caps: ResourceCaps) -> Self {
        self.caps = caps;
        self
    }

    /// Sets the factory of the hardware blocks.
    pub fn block_factory<T>(mut self, factory: T) -> Self
    where
        T: BlockFactory + 'static,
    {
        self.factory = Box::new(factory);
        self
    }

    /// Sets the power-play firmware.
    pub fn power_play<T>(mut self, pp: T) -> Self
    where
        T: PowerPlay + 'static,
    {
        self.power_play = Some(Box::new(pp));
        self
    }

    /// Sets the debug options.
    pub fn debug_options(mut self, debug: DebugOptions) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the bounding box overrides.
    pub fn bounding_box_overrides(mut self, overrides: BoundingBoxOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Sets the default bounding box and IP parameters.
    pub fn bounding_box(mut self, soc: SocBoundingBox, ip: IpParams) -> Self {
        self.soc = soc;
        self.ip = ip;
        self
    }

    /// Sets the bandwidth calculator.
    pub fn mode_lib<T>(mut self, mode_lib: T) -> Self
    where
        T: ModeLib + 'static,
    {
        self.mode_lib = Box::new(mode_lib);
        self
    }

    /// Builds a `Dc`.
    pub fn build(self) -> Result<Arc<Dc>> {
        let pool = ResourcePool::new(self.caps, self.pipe_count, self.factory)?;

        let pp = self.power_play.as_deref();
        let (soc, ip) = init_soc_bounding_box(
            self.soc,
            self.ip,
            pp,
            &self.overrides,
            &self.caps,
            self.pipe_count,
        )?;

        if let Some(pp) = pp.filter(|_| !self.debug.disable_pplib_wm_range) {
            if let Err(err) = pp.set_wm_ranges(&soc.wm_ranges()) {
                warn!("failed to set watermark ranges: {err}");
            }
        }

        info!(
            "display core with {} pipes and {} levels",
            self.pipe_count,
            soc.num_states()
        );

        let current = Mutex::new(DcState::new(&pool));
        let dc = Dc {
            pool,
            soc,
            ip,
            debug: self.debug,
            mode_lib: self.mode_lib,
            current,
        };

        Ok(Arc::new(dc))
    }
}
