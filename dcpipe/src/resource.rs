// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Resource inventory.
//!
//! The resource pool owns one instance of every hardware block declared by the chip capabilities.
//! Blocks are created once when the display core is built and destroyed together.  Pipe contexts
//! refer to blocks by instance index only.

use super::types::{Error, Result};
use log::{debug, error};

/// The per-chip resource counts.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ResourceCaps {
    pub num_timing_generator: usize,
    pub num_opp: usize,
    pub num_video_plane: usize,
    pub num_audio: usize,
    pub num_stream_encoder: usize,
    pub num_pll: usize,
    pub num_dwb: usize,
    pub num_ddc: usize,
    pub num_vmid: usize,
    pub num_dsc: usize,
}

impl ResourceCaps {
    /// Returns the counts of a six-pipe DCN 2.0 part.
    pub fn nv10() -> Self {
        Self {
            num_timing_generator: 6,
            num_opp: 6,
            num_video_plane: 6,
            num_audio: 7,
            num_stream_encoder: 6,
            num_pll: 6,
            num_dwb: 1,
            num_ddc: 6,
            num_vmid: 16,
            num_dsc: 6,
        }
    }
}

impl Default for ResourceCaps {
    fn default() -> Self {
        Self::nv10()
    }
}

/// The kind of a hardware block.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BlockKind {
    Hubp,
    Ipp,
    Dpp,
    Mpc,
    Opp,
    TimingGenerator,
    StreamEncoder,
    Audio,
    ClockSource,
    DpClockSource,
    Dccg,
    Dmcu,
    Hubbub,
    Dsc,
    Aux,
    I2c,
    Dwb,
    Mcif,
}

/// A created hardware block.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BlockHandle {
    /// The block kind.
    pub kind: BlockKind,
    /// The instance index.
    pub inst: usize,
    /// An opaque value owned by the block factory.
    pub token: u64,
}

/// The hardware block constructors.
///
/// The default implementations create virtual blocks that need no teardown.
pub trait BlockFactory: Send + Sync {
    /// Creates a block instance.
    fn create(&self, kind: BlockKind, inst: usize) -> Result<BlockHandle> {
        Ok(BlockHandle {
            kind,
            inst,
            token: 0,
        })
    }

    /// Destroys a block instance.
    fn destroy(&self, _handle: BlockHandle) {}
}

/// A block factory that creates virtual blocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct VirtualBlocks;

impl BlockFactory for VirtualBlocks {}

#[derive(Default)]
struct Slots {
    kind: Option<BlockKind>,
    handles: Vec<Option<BlockHandle>>,
}

/// The resource pool.
pub struct ResourcePool {
    caps: ResourceCaps,
    pipe_count: usize,
    factory: Box<dyn BlockFactory>,
    slots: Vec<Slots>,
}

impl ResourcePool {
    pub(crate) fn new(
        caps: ResourceCaps,
        pipe_count: usize,
        factory: Box<dyn BlockFactory>,
    ) -> Result<Self> {
        if pipe_count == 0 || pipe_count > caps.num_timing_generator || pipe_count > caps.num_opp
        {
            return Error::user();
        }

        let mut pool = Self {
            caps,
            pipe_count,
            factory,
            slots: Vec::new(),
        };

        // on failure, the partially created pool is dropped and destroys what it holds
        pool.create_blocks()?;

        debug!(
            "created resource pool with {} pipes and {} compressors",
            pipe_count,
            pool.count(BlockKind::Dsc)
        );

        Ok(pool)
    }

    fn create_blocks(&mut self) -> Result<()> {
        let caps = self.caps;

        self.create(BlockKind::ClockSource, caps.num_pll)?;
        self.create(BlockKind::DpClockSource, 1)?;
        self.create(BlockKind::Dccg, 1)?;
        self.create(BlockKind::Dmcu, 1)?;

        for inst in 0..self.pipe_count {
            self.create_one(BlockKind::Hubp, inst)?;
            self.create_one(BlockKind::Ipp, inst)?;
            self.create_one(BlockKind::Dpp, inst)?;
        }

        for inst in 0..caps.num_ddc {
            self.create_one(BlockKind::Aux, inst)?;
            self.create_one(BlockKind::I2c, inst)?;
        }

        self.create(BlockKind::Opp, caps.num_opp)?;
        self.create(BlockKind::TimingGenerator, caps.num_timing_generator)?;
        self.create(BlockKind::Mpc, self.pipe_count)?;
        self.create(BlockKind::Hubbub, 1)?;

        let num_dsc = if cfg!(feature = "dsc") {
            caps.num_dsc
        } else {
            0
        };
        self.create(BlockKind::Dsc, num_dsc)?;

        self.create(BlockKind::StreamEncoder, caps.num_stream_encoder)?;
        self.create(BlockKind::Audio, caps.num_audio)?;

        for inst in 0..caps.num_dwb {
            self.create_one(BlockKind::Dwb, inst)?;
            self.create_one(BlockKind::Mcif, inst)?;
        }

        Ok(())
    }

    fn slots_mut(&mut self, kind: BlockKind) -> &mut Slots {
        let idx = match self.slots.iter().position(|s| s.kind == Some(kind)) {
            Some(idx) => idx,
            None => {
                self.slots.push(Slots {
                    kind: Some(kind),
                    handles: Vec::new(),
                });
                self.slots.len() - 1
            }
        };

        &mut self.slots[idx]
    }

    fn create(&mut self, kind: BlockKind, count: usize) -> Result<()> {
        for inst in 0..count {
            self.create_one(kind, inst)?;
        }
        Ok(())
    }

    fn create_one(&mut self, kind: BlockKind, inst: usize) -> Result<()> {
        let handle = match self.factory.create(kind, inst) {
            Ok(handle) => handle,
            Err(err) => {
                error!("failed to create {kind:?} {inst}: {err}");
                return Err(err);
            }
        };

        let slots = self.slots_mut(kind);
        if slots.handles.len() <= inst {
            slots.handles.resize(inst + 1, None);
        }
        slots.handles[inst] = Some(handle);

        Ok(())
    }

    fn destroy(&mut self) {
        for slots in self.slots.iter_mut().rev() {
            for handle in slots.handles.iter_mut().rev() {
                if let Some(handle) = handle.take() {
                    self.factory.destroy(handle);
                }
            }
        }
    }

    /// Returns the number of created instances of a block kind.
    pub fn count(&self, kind: BlockKind) -> usize {
        self.slots
            .iter()
            .find(|s| s.kind == Some(kind))
            .map_or(0, |s| s.handles.iter().flatten().count())
    }

    /// Returns a created block.
    pub fn block(&self, kind: BlockKind, inst: usize) -> Option<BlockHandle> {
        self.slots
            .iter()
            .find(|s| s.kind == Some(kind))
            .and_then(|s| s.handles.get(inst).copied().flatten())
    }

    /// Returns the number of pipes.
    pub fn pipe_count(&self) -> usize {
        self.pipe_count
    }

    /// Returns the resource counts.
    pub fn caps(&self) -> &ResourceCaps {
        &self.caps
    }
}

impl Drop for ResourcePool {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter {
        created: AtomicUsize,
        destroyed: AtomicUsize,
    }

    struct CountingFactory {
        counter: Arc<Counter>,
        fail_kind: Option<BlockKind>,
    }

    impl BlockFactory for CountingFactory {
        fn create(&self, kind: BlockKind, inst: usize) -> Result<BlockHandle> {
            if self.fail_kind == Some(kind) {
                return Err(Error::OutOfMemory);
            }

            let token = self.counter.created.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(BlockHandle { kind, inst, token })
        }

        fn destroy(&self, _handle: BlockHandle) {
            self.counter.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_pool() {
        let pool = ResourcePool::new(ResourceCaps::nv10(), 6, Box::new(VirtualBlocks)).unwrap();
        assert_eq!(pool.pipe_count(), 6);
        assert_eq!(pool.count(BlockKind::Hubp), 6);
        assert_eq!(pool.count(BlockKind::Audio), 7);
        assert_eq!(pool.count(BlockKind::Dwb), 1);
        assert_eq!(pool.count(BlockKind::DpClockSource), 1);
        assert!(pool.block(BlockKind::TimingGenerator, 5).is_some());
        assert!(pool.block(BlockKind::TimingGenerator, 6).is_none());

        #[cfg(feature = "dsc")]
        assert_eq!(pool.count(BlockKind::Dsc), 6);
    }

    #[test]
    fn test_pool_bad_pipe_count() {
        let caps = ResourceCaps::nv10();
        assert!(ResourcePool::new(caps, 0, Box::new(VirtualBlocks)).is_err());
        assert!(ResourcePool::new(caps, 7, Box::new(VirtualBlocks)).is_err());
    }

    #[test]
    fn test_pool_teardown() {
        let counter = Arc::new(Counter::default());
        let factory = CountingFactory {
            counter: counter.clone(),
            fail_kind: None,
        };
        let pool = ResourcePool::new(ResourceCaps::nv10(), 4, Box::new(factory)).unwrap();
        let created = counter.created.load(Ordering::SeqCst);
        assert!(created > 0);
        drop(pool);
        assert_eq!(counter.destroyed.load(Ordering::SeqCst), created);

        // a failed construction unwinds what it created
        let counter = Arc::new(Counter::default());
        let factory = CountingFactory {
            counter: counter.clone(),
            fail_kind: Some(BlockKind::StreamEncoder),
        };
        let res = ResourcePool::new(ResourceCaps::nv10(), 4, Box::new(factory));
        assert_eq!(res.err(), Some(Error::OutOfMemory));
        let created = counter.created.load(Ordering::SeqCst);
        assert!(created > 0);
        assert_eq!(counter.destroyed.load(Ordering::SeqCst), created);
    }
}
