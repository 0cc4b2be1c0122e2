// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Stream and plane descriptions.
//!
//! A `Stream` describes one display output: its timing, signal and link.  A `Plane` describes a
//! surface scanned out on a stream.  Both are immutable once shared and are referenced by pipe
//! contexts through `Arc`.

use super::formats;
use super::types::{Format, Rect};
use std::sync::Arc;

/// The physical signal of a stream.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SignalType {
    /// No signal.  Treated as the most demanding DisplayPort configuration.
    #[default]
    None,
    /// DisplayPort SST.
    DisplayPort,
    /// DisplayPort MST.
    DisplayPortMst,
    /// Embedded DisplayPort.
    Edp,
    /// HDMI type A.
    Hdmi,
    /// Single-link DVI.
    DviSingleLink,
    /// Dual-link DVI.
    DviDualLink,
    /// A virtual sink.
    Virtual,
}

impl SignalType {
    /// Returns true for the DisplayPort family.
    pub fn is_dp(self) -> bool {
        matches!(self, Self::DisplayPort | Self::DisplayPortMst | Self::Edp)
    }
}

/// The pixel encoding on the wire.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum PixelEncoding {
    #[default]
    Rgb,
    YCbCr444,
    YCbCr422,
    YCbCr420,
}

/// The display color depth.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ColorDepth {
    Bpc6,
    #[default]
    Bpc8,
    Bpc10,
    Bpc12,
    Bpc16,
}

impl ColorDepth {
    /// Returns the bits per color component.
    pub fn bits(self) -> u32 {
        match self {
            Self::Bpc6 => 6,
            Self::Bpc8 => 8,
            Self::Bpc10 => 10,
            Self::Bpc12 => 12,
            Self::Bpc16 => 16,
        }
    }
}

/// The 3D format of a timing.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Timing3dFormat {
    #[default]
    None,
    HwFramePacking,
    SideBySide,
    TopAndBottom,
}

/// The 3D format of the content.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ViewFormat {
    #[default]
    None,
    SideBySide,
    TopAndBottom,
}

/// The rotation of a plane.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Rotation {
    #[default]
    Angle0,
    Angle90,
    Angle180,
    Angle270,
}

/// The tiling mode of a plane.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SwizzleMode {
    #[default]
    Linear,
    Sw4kbS,
    Sw4kbD,
    Sw64kbS,
    Sw64kbD,
    Sw64kbSX,
    Sw64kbDX,
    Sw64kbRX,
    SwVarS,
    SwVarD,
}

bitflags::bitflags! {
    /// Timing flags.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct TimingFlags: u32 {
        /// The timing is interlaced.
        const INTERLACE = 1 << 0;
        /// The horizontal sync is active high.
        const HSYNC_POSITIVE = 1 << 1;
        /// The vertical sync is active high.
        const VSYNC_POSITIVE = 1 << 2;
        /// The stream is compressed by a display stream compressor.
        const DSC = 1 << 3;
    }
}

/// Display stream compression settings.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct DscConfig {
    /// The number of horizontal slices.
    pub num_slices_h: u32,
    /// The number of vertical slices.
    pub num_slices_v: u32,
    /// The target bits per pixel, in 1/16 bpp.
    pub bits_per_pixel: u32,
    /// Whether 4:2:2 is sent as simple 4:2:2 rather than native 4:2:2.
    pub ycbcr422_simple: bool,
}

/// A CRTC timing.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Timing {
    pub h_total: u32,
    pub h_border_left: u32,
    pub h_addressable: u32,
    pub h_border_right: u32,
    pub h_front_porch: u32,
    pub h_sync_width: u32,
    pub v_total: u32,
    pub v_border_top: u32,
    pub v_addressable: u32,
    pub v_border_bottom: u32,
    pub v_front_porch: u32,
    pub v_sync_width: u32,
    /// The pixel clock in 100Hz units.
    pub pix_clk_100hz: u32,
    pub pixel_encoding: PixelEncoding,
    pub display_color_depth: ColorDepth,
    pub timing_3d_format: Timing3dFormat,
    pub flags: TimingFlags,
    pub dsc_cfg: DscConfig,
}

impl Timing {
    /// Creates a timing from a DRM-style mode line.
    ///
    /// `hsync_start` etc. are absolute positions as in a modeline, `clock_khz` is the pixel clock.
    #[allow(clippy::too_many_arguments)]
    pub fn from_mode(
        clock_khz: u32,
        hdisplay: u32,
        hsync_start: u32,
        hsync_end: u32,
        htotal: u32,
        vdisplay: u32,
        vsync_start: u32,
        vsync_end: u32,
        vtotal: u32,
    ) -> Self {
        Self {
            h_total: htotal,
            h_addressable: hdisplay,
            h_front_porch: hsync_start.saturating_sub(hdisplay),
            h_sync_width: hsync_end.saturating_sub(hsync_start),
            v_total: vtotal,
            v_addressable: vdisplay,
            v_front_porch: vsync_start.saturating_sub(vdisplay),
            v_sync_width: vsync_end.saturating_sub(vsync_start),
            pix_clk_100hz: clock_khz * 10,
            ..Default::default()
        }
    }

    /// Returns true when two pixels are packed per container on the wire.
    pub fn is_two_pixels_per_container(&self) -> bool {
        self.pixel_encoding == PixelEncoding::YCbCr420
    }

    /// Returns the number of blank lines between active regions.
    pub fn v_blank_lines(&self) -> u32 {
        self.v_total
            .saturating_sub(self.v_addressable)
            .saturating_sub(self.v_border_top)
            .saturating_sub(self.v_border_bottom)
    }
}

/// Negotiated or verified link settings.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct LinkSettings {
    /// The currently trained lane count, if known.
    pub cur_lane_count: Option<u32>,
    /// The lane count verified during link detection, if known.
    pub verified_lane_count: Option<u32>,
    /// The stream encoder instance preferred by the link, if any.
    pub preferred_engine: Option<usize>,
}

/// The output format of a writeback.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum WritebackFormat {
    /// Packed 4:4:4 RGB.
    #[default]
    Rgb,
    /// Planar 4:2:0 YCbCr.
    Yuv420,
}

/// Writeback (display capture) parameters.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct WritebackInfo {
    pub crop_width: u32,
    pub crop_height: u32,
    pub dest_width: u32,
    pub dest_height: u32,
    pub h_taps_c: u32,
    pub v_taps_c: u32,
    pub format: WritebackFormat,
    pub depth: ColorDepth,
}

/// A display stream.
#[derive(Clone, Debug, Default)]
pub struct Stream {
    pub(crate) timing: Timing,
    pub(crate) signal: SignalType,
    pub(crate) link: LinkSettings,
    pub(crate) view_format: ViewFormat,
    pub(crate) audio: bool,
    pub(crate) use_dynamic_meta: bool,
    pub(crate) writeback: Option<WritebackInfo>,
}

impl Stream {
    /// Creates a stream description.
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            ..Default::default()
        }
    }

    /// Sets the signal type.
    pub fn signal(mut self, signal: SignalType) -> Self {
        self.signal = signal;
        self
    }

    /// Sets the link settings.
    pub fn link(mut self, link: LinkSettings) -> Self {
        self.link = link;
        self
    }

    /// Sets the 3D format of the content.
    pub fn view_format(mut self, view_format: ViewFormat) -> Self {
        self.view_format = view_format;
        self
    }

    /// Requests an audio endpoint.
    pub fn audio(mut self) -> Self {
        self.audio = true;
        self
    }

    /// Enables HDR dynamic metadata.
    pub fn dynamic_metadata(mut self) -> Self {
        self.use_dynamic_meta = true;
        self
    }

    /// Enables writeback.
    pub fn writeback(mut self, info: WritebackInfo) -> Self {
        self.writeback = Some(info);
        self
    }

    /// Returns the timing.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Returns the signal type.
    pub fn signal_type(&self) -> SignalType {
        self.signal
    }

    pub(crate) fn needs_dsc(&self) -> bool {
        self.timing.flags.contains(TimingFlags::DSC)
    }

    /// Returns the physical pixel clock in kHz.
    pub(crate) fn phy_pix_clk_khz(&self) -> u32 {
        let mut clk = self.timing.pix_clk_100hz / 10;
        if self.timing.is_two_pixels_per_container() {
            clk /= 2;
        }
        if self.timing.timing_3d_format == Timing3dFormat::HwFramePacking {
            clk *= 2;
        }
        clk
    }

    /// Returns true when the two streams can share vertical blanks.
    pub(crate) fn is_synchronizable(&self, other: &Stream) -> bool {
        let a = &self.timing;
        let b = &other.timing;

        a.h_total == b.h_total
            && a.v_total == b.v_total
            && a.h_addressable == b.h_addressable
            && a.v_addressable == b.v_addressable
            && a.pix_clk_100hz == b.pix_clk_100hz
    }

    /// Returns true when the two streams can share a PLL.
    pub(crate) fn is_timing_shareable(&self, other: &Stream) -> bool {
        self.is_synchronizable(other)
            && self.timing.pixel_encoding == other.timing.pixel_encoding
            && self.timing.display_color_depth == other.timing.display_color_depth
            && self.signal == other.signal
    }
}

/// A plane scanned out on a stream.
#[derive(Clone, Debug, Default)]
pub struct Plane {
    pub(crate) format: Format,
    pub(crate) src_rect: Rect,
    pub(crate) dst_rect: Rect,
    pub(crate) clip_rect: Option<Rect>,
    pub(crate) rotation: Rotation,
    pub(crate) swizzle: SwizzleMode,
    pub(crate) flip_immediate: bool,
    pub(crate) dcc: bool,
    pub(crate) pitch: u32,
    pub(crate) chroma_pitch: u32,
    pub(crate) meta_pitch: u32,
    pub(crate) meta_pitch_c: u32,
}

impl Plane {
    /// Creates a plane description.
    ///
    /// The pitch defaults to the source width and the tiling mode to the default for the format.
    pub fn new(format: Format, src_rect: Rect, dst_rect: Rect) -> Self {
        let pitch = src_rect.width.max(0) as u32;
        Self {
            format,
            src_rect,
            dst_rect,
            swizzle: formats::default_swizzle(format),
            pitch,
            chroma_pitch: pitch,
            ..Default::default()
        }
    }

    /// Sets the clip rectangle in timing coordinates.
    pub fn clip_rect(mut self, rect: Rect) -> Self {
        self.clip_rect = Some(rect);
        self
    }

    /// Sets the rotation.
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets the tiling mode.
    pub fn swizzle(mut self, swizzle: SwizzleMode) -> Self {
        self.swizzle = swizzle;
        self
    }

    /// Requests immediate flips.
    pub fn flip_immediate(mut self) -> Self {
        self.flip_immediate = true;
        self
    }

    /// Enables delta color compression with the given meta pitches.
    pub fn dcc(mut self, meta_pitch: u32, meta_pitch_c: u32) -> Self {
        self.dcc = true;
        self.meta_pitch = meta_pitch;
        self.meta_pitch_c = meta_pitch_c;
        self
    }

    /// Sets the pitches in pixels.  `chroma_pitch` is ignored for non-video formats.
    pub fn pitch(mut self, pitch: u32, chroma_pitch: u32) -> Self {
        self.pitch = pitch;
        self.chroma_pitch = chroma_pitch;
        self
    }

    /// Returns the format.
    pub fn format(&self) -> Format {
        self.format
    }

    pub(crate) fn is_valid(&self) -> bool {
        !self.format.is_invalid() && !self.src_rect.is_empty() && !self.dst_rect.is_empty()
    }
}

pub(crate) fn same_stream(a: &Option<Arc<Stream>>, b: &Arc<Stream>) -> bool {
    a.as_ref().is_some_and(|s| Arc::ptr_eq(s, b))
}

pub(crate) fn same_plane(a: &Option<Arc<Plane>>, b: &Option<Arc<Plane>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing() {
        let timing = Timing::from_mode(594000, 3840, 4016, 4104, 4400, 2160, 2168, 2178, 2250);
        assert_eq!(timing.h_front_porch, 176);
        assert_eq!(timing.h_sync_width, 88);
        assert_eq!(timing.pix_clk_100hz, 5940000);
        assert_eq!(timing.v_blank_lines(), 90);
        assert!(!timing.is_two_pixels_per_container());
    }

    #[test]
    fn test_stream() {
        let timing = Timing::from_mode(148500, 1920, 2008, 2052, 2200, 1080, 1084, 1089, 1125);
        let a = Stream::new(timing).signal(SignalType::Hdmi);
        let b = Stream::new(timing).signal(SignalType::DisplayPort);
        assert!(a.is_synchronizable(&b));
        assert!(!a.is_timing_shareable(&b));
        assert_eq!(a.phy_pix_clk_khz(), 148500);
        assert!(!a.needs_dsc());

        let mut packed = timing;
        packed.timing_3d_format = Timing3dFormat::HwFramePacking;
        assert_eq!(Stream::new(packed).phy_pix_clk_khz(), 297000);
    }

    #[test]
    fn test_plane() {
        let rect = Rect::new(0, 0, 1920, 1080);
        let plane = Plane::new(formats::ARGB8888, rect, rect);
        assert!(plane.is_valid());
        assert_eq!(plane.swizzle, SwizzleMode::Sw64kbS);
        assert_eq!(plane.pitch, 1920);

        let plane = Plane::new(formats::INVALID, rect, rect);
        assert!(!plane.is_valid());

        let a = Some(Arc::new(Plane::new(formats::ARGB8888, rect, rect)));
        let b = Some(Arc::new(Plane::new(formats::ARGB8888, rect, rect)));
        assert!(same_plane(&a, &a.clone()));
        assert!(!same_plane(&a, &b));
        assert!(!same_plane(&None, &None));
    }
}
