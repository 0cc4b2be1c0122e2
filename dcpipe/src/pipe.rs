// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Pipe contexts.
//!
//! A pipe context is one hardware data path slice.  Pipes of the same plane or stream are linked
//! in pairs by arena index.  The primary of a pair is the top pipe and the secondary is the bottom
//! pipe.

use super::dml::DestParams;
use super::formats;
use super::stream::{ColorDepth, PixelEncoding, Plane, Rotation, SignalType, Stream, Timing3dFormat};
use super::types::{Fixed31_32, Rect};
use std::sync::Arc;

/// The reason two pipes are linked.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PairKind {
    /// The plane is split horizontally for scaler throughput.
    PlaneSplit,
    /// The output timing is combined from two pipes.
    OutputCombine,
    /// The secondary pipe scans out another plane of the same stream.
    Overlay,
}

/// The link of a pipe to its partner.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum PipeLink {
    /// The pipe is not linked.
    #[default]
    Single,
    /// The pipe is one half of a pair.
    Pair {
        /// The index of the top pipe.
        primary: usize,
        /// The index of the bottom pipe.
        secondary: usize,
        /// The pair kind.
        kind: PairKind,
    },
}

/// The front-end resources of a pipe.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PlaneResources {
    pub hubp: Option<usize>,
    pub ipp: Option<usize>,
    pub dpp: Option<usize>,
    pub mpcc: Option<usize>,
}

/// A clock source.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ClockSourceId {
    /// A PLL instance.
    Pll(usize),
    /// The shared DisplayPort DTO.
    DpDto,
}

/// The parameters a clock source derives its dividers from.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PixelClockParams {
    pub requested_pix_clk_100hz: u32,
    pub controller_id: usize,
    pub requested_sym_clk_khz: u32,
    pub color_depth: ColorDepth,
    pub pixel_encoding: PixelEncoding,
    pub signal: SignalType,
}

const LINK_RATE_LOW: u32 = 0x06;
const LINK_RATE_REF_FREQ_KHZ: u32 = 27000;

/// The back-end resources of a pipe.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct StreamResources {
    pub tg: Option<usize>,
    pub opp: Option<usize>,
    pub stream_enc: Option<usize>,
    pub audio: Option<usize>,
    pub clock_source: Option<ClockSourceId>,
    pub dsc: Option<usize>,
    pub pix_clk: PixelClockParams,
}

/// Scaling ratios, source over destination.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ScalingRatios {
    pub horz: Fixed31_32,
    pub vert: Fixed31_32,
    pub horz_c: Fixed31_32,
    pub vert_c: Fixed31_32,
}

/// Scaler filter taps.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ScalingTaps {
    pub h_taps: u32,
    pub v_taps: u32,
    pub h_taps_c: u32,
    pub v_taps_c: u32,
}

/// The scaler data of a pipe.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ScalerData {
    pub h_active: i32,
    pub v_active: i32,
    /// The destination rectangle this pipe outputs, in timing coordinates.
    pub recout: Rect,
    /// The source rectangle this pipe fetches.
    pub viewport: Rect,
    pub viewport_c: Rect,
    pub ratios: ScalingRatios,
    pub taps: ScalingTaps,
}

/// Per-pipe clocks chosen by the validator.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PipeBandwidth {
    pub dppclk_khz: u32,
    pub dscclk_khz: u32,
}

/// A pipe context.
#[derive(Clone, Debug, Default)]
pub struct PipeContext {
    pub(crate) idx: usize,
    pub(crate) stream: Option<Arc<Stream>>,
    pub(crate) plane: Option<Arc<Plane>>,
    pub(crate) link: PipeLink,
    pub(crate) plane_res: PlaneResources,
    pub(crate) stream_res: StreamResources,
    pub(crate) scl: ScalerData,
    pub(crate) bw: PipeBandwidth,
    pub(crate) dlg: DestParams,
}

impl PipeContext {
    pub(crate) fn new(idx: usize) -> Self {
        Self {
            idx,
            ..Default::default()
        }
    }

    /// Returns the pipe index.
    pub fn index(&self) -> usize {
        self.idx
    }

    /// Returns the stream this pipe serves.
    pub fn stream(&self) -> Option<&Arc<Stream>> {
        self.stream.as_ref()
    }

    /// Returns the plane this pipe scans out.
    pub fn plane(&self) -> Option<&Arc<Plane>> {
        self.plane.as_ref()
    }

    /// Returns the link to the partner pipe.
    pub fn link(&self) -> PipeLink {
        self.link
    }

    /// Returns the front-end resources.
    pub fn plane_resources(&self) -> &PlaneResources {
        &self.plane_res
    }

    /// Returns the back-end resources.
    pub fn stream_resources(&self) -> &StreamResources {
        &self.stream_res
    }

    /// Returns the scaler data.
    pub fn scaler_data(&self) -> &ScalerData {
        &self.scl
    }

    /// Returns the per-pipe clocks.
    pub fn bandwidth(&self) -> &PipeBandwidth {
        &self.bw
    }

    /// Returns the destination timing written back by the validator.
    pub fn dest_params(&self) -> &DestParams {
        &self.dlg
    }

    /// Returns true when no stream uses this pipe.
    pub fn is_free(&self) -> bool {
        self.stream.is_none()
    }

    /// Returns the index of the top pipe, if this is the bottom of a pair.
    pub fn top(&self) -> Option<usize> {
        match self.link {
            PipeLink::Pair {
                primary, secondary, ..
            } if secondary == self.idx => Some(primary),
            _ => None,
        }
    }

    /// Returns the index of the bottom pipe, if this is the top of a pair.
    pub fn bottom(&self) -> Option<usize> {
        match self.link {
            PipeLink::Pair {
                primary, secondary, ..
            } if primary == self.idx => Some(secondary),
            _ => None,
        }
    }

    /// Returns the pair kind, if linked.
    pub fn pair_kind(&self) -> Option<PairKind> {
        match self.link {
            PipeLink::Pair { kind, .. } => Some(kind),
            PipeLink::Single => None,
        }
    }

    /// Returns true for the head pipe of a stream.
    pub fn is_head(&self) -> bool {
        self.stream.is_some() && self.top().is_none()
    }

    /// Returns true when the plane of this pipe is split across two pipes.
    pub fn is_hsplit(&self) -> bool {
        matches!(
            self.pair_kind(),
            Some(PairKind::PlaneSplit | PairKind::OutputCombine)
        ) && self.plane.is_some()
    }

    /// Returns true when the output timing is combined from this pipe and its partner.
    pub fn is_odm(&self) -> bool {
        self.pair_kind() == Some(PairKind::OutputCombine)
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::new(self.idx);
    }

    /// Rebuilds the scaler data from the stream and the plane.
    pub(crate) fn build_scaling_params(&mut self) {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        let timing = stream.timing();
        let h_active = timing.h_addressable as i32;
        let v_active = timing.v_addressable as i32;

        let Some(plane) = self.plane.as_ref() else {
            self.scl = ScalerData {
                h_active,
                v_active,
                recout: Rect::new(0, 0, h_active, v_active),
                ..Default::default()
            };
            return;
        };

        let src = plane.src_rect;
        let dst = plane.dst_rect;
        let clip = plane.clip_rect.unwrap_or(dst);
        let active = Rect::new(0, 0, h_active, v_active);
        let mut recout = dst.intersect(&clip).intersect(&active);

        let (src_w, src_h) = match plane.rotation {
            Rotation::Angle90 | Rotation::Angle270 => (src.height, src.width),
            Rotation::Angle0 | Rotation::Angle180 => (src.width, src.height),
        };
        let horz = Fixed31_32::from_fraction(src_w as i64, dst.width as i64);
        let vert = Fixed31_32::from_fraction(src_h as i64, dst.height as i64);
        let video = formats::is_video(plane.format);
        let ratios = if video {
            ScalingRatios {
                horz,
                vert,
                horz_c: horz.div_int(2),
                vert_c: vert.div_int(2),
            }
        } else {
            ScalingRatios {
                horz,
                vert,
                horz_c: horz,
                vert_c: vert,
            }
        };

        if self.pair_kind() == Some(PairKind::PlaneSplit) {
            let left = (recout.width + 1) / 2;
            if self.top().is_some() {
                recout.x += left;
                recout.width -= left;
            } else {
                recout.width = left;
            }
        }

        // map the recout back into the source so that split halves partition the viewport
        let offset_x = recout.x - dst.x;
        let offset_y = recout.y - dst.y;
        let scale = |pos: i32, src: i32, dst: i32| {
            if dst == 0 {
                0
            } else {
                (pos as i64 * src as i64).div_euclid(dst as i64) as i32
            }
        };
        let start_x = scale(offset_x, src_w, dst.width);
        let end_x = scale(offset_x + recout.width, src_w, dst.width);
        let start_y = scale(offset_y, src_h, dst.height);
        let end_y = scale(offset_y + recout.height, src_h, dst.height);
        let viewport = Rect::new(
            src.x + start_x,
            src.y + start_y,
            end_x - start_x,
            end_y - start_y,
        );

        let viewport_c = if video {
            let x = viewport.x / 2;
            let y = viewport.y / 2;
            Rect::new(
                x,
                y,
                (viewport.x + viewport.width) / 2 - x,
                (viewport.y + viewport.height) / 2 - y,
            )
        } else {
            viewport
        };

        let taps = |ratio: Fixed31_32, scaled: u32| if ratio.is_one() { 1 } else { scaled };
        let chroma_taps = if video { 2 } else { 4 };
        let taps = ScalingTaps {
            h_taps: taps(ratios.horz, 4),
            v_taps: taps(ratios.vert, 4),
            h_taps_c: taps(ratios.horz_c, chroma_taps),
            v_taps_c: taps(ratios.vert_c, chroma_taps),
        };

        self.scl = ScalerData {
            h_active,
            v_active,
            recout,
            viewport,
            viewport_c,
            ratios,
            taps,
        };
    }

    /// Rebuilds the pixel clock parameters from the stream timing.
    pub(crate) fn update_pixel_clock(&mut self) {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        let timing = stream.timing();

        let mut pix_clk = PixelClockParams {
            requested_pix_clk_100hz: timing.pix_clk_100hz,
            controller_id: self.stream_res.tg.map_or(0, |tg| tg + 1),
            requested_sym_clk_khz: LINK_RATE_LOW * LINK_RATE_REF_FREQ_KHZ,
            color_depth: timing.display_color_depth,
            pixel_encoding: timing.pixel_encoding,
            signal: stream.signal_type(),
        };

        if timing.pixel_encoding == PixelEncoding::YCbCr422 {
            pix_clk.color_depth = ColorDepth::Bpc8;
        }
        if timing.is_two_pixels_per_container() || self.is_odm() {
            pix_clk.requested_pix_clk_100hz /= 2;
        }
        if timing.timing_3d_format == Timing3dFormat::HwFramePacking {
            pix_clk.requested_pix_clk_100hz *= 2;
        }

        self.stream_res.pix_clk = pix_clk;
    }
}
