// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Translation of pipe contexts into calculator parameters.

use super::dml::{
    DestParams, LbDepth, MacroTileSize, OutputFormat, OutputParams, OutputType, PipeParams,
    ScaleParams, SourceFormat, SourceScan, SrcParams, WritebackParams,
};
use super::formats;
use super::pipe::{PairKind, PipeContext};
use super::state::DcState;
use super::stream::{
    ColorDepth, PixelEncoding, Rotation, SignalType, Stream, SwizzleMode, Timing3dFormat,
    TimingFlags, WritebackFormat, WritebackInfo,
};
use super::types::Fixed31_32;

const BLANK_MAX_WIDTH: u32 = 1920;
const BLANK_MAX_HEIGHT: u32 = 1080;
const DEFAULT_DP_LANES: u32 = 4;
const OUTPUT_BPC: u32 = 12;
const CURSOR_WIDTH: u32 = 128;
const CURSOR_BPP: u32 = 64;

fn px(val: i32) -> u32 {
    val.max(0) as u32
}

fn ratio(val: Fixed31_32) -> f64 {
    val.to_f64()
}

fn synchronized_vblank(state: &DcState) -> bool {
    let mut streams = state.pipes.iter().filter_map(|p| p.stream.as_ref());
    let Some(first) = streams.next() else {
        return true;
    };

    streams.all(|s| first.is_synchronizable(s))
}

fn dest_params(stream: &Stream, pipe: &PipeContext, synchronized: bool) -> DestParams {
    let timing = stream.timing();
    let hblank_start = timing.h_total.saturating_sub(timing.h_front_porch);
    let vblank_start = timing.v_total.saturating_sub(timing.v_front_porch);

    let mut pixel_rate_mhz = timing.pix_clk_100hz as f64 / 10000.0;
    if timing.timing_3d_format == Timing3dFormat::HwFramePacking {
        pixel_rate_mhz *= 2.0;
    }

    DestParams {
        hblank_start,
        hblank_end: hblank_start
            .saturating_sub(timing.h_addressable)
            .saturating_sub(timing.h_border_left)
            .saturating_sub(timing.h_border_right),
        vblank_start,
        vblank_end: vblank_start
            .saturating_sub(timing.v_addressable)
            .saturating_sub(timing.v_border_top)
            .saturating_sub(timing.v_border_bottom),
        htotal: timing.h_total,
        vtotal: timing.v_total,
        hactive: timing.h_addressable,
        vactive: timing.v_addressable,
        interlaced: timing.flags.contains(TimingFlags::INTERLACE),
        pixel_rate_mhz,
        synchronized_vblank_all_planes: synchronized,
        otg_inst: pipe.stream_res.tg.unwrap_or(pipe.idx),
        ..Default::default()
    }
}

fn output_params(stream: &Stream) -> OutputParams {
    let timing = stream.timing();
    let link = &stream.link;
    let dsc_enable = cfg!(feature = "dsc") && stream.needs_dsc();

    let mut dp_lanes = link
        .cur_lane_count
        .or(link.verified_lane_count)
        .unwrap_or(DEFAULT_DP_LANES);
    let output_type = match stream.signal_type() {
        SignalType::DisplayPort | SignalType::DisplayPortMst => OutputType::Dp,
        SignalType::Edp => OutputType::Edp,
        SignalType::Hdmi | SignalType::DviSingleLink | SignalType::DviDualLink => OutputType::Hdmi,
        SignalType::None | SignalType::Virtual => {
            // the most demanding configuration
            dp_lanes = DEFAULT_DP_LANES;
            OutputType::Dp
        }
    };

    let output_format = match timing.pixel_encoding {
        PixelEncoding::Rgb | PixelEncoding::YCbCr444 => OutputFormat::Rgb444,
        PixelEncoding::YCbCr420 => OutputFormat::Yuv420,
        PixelEncoding::YCbCr422 => {
            if dsc_enable && !timing.dsc_cfg.ycbcr422_simple {
                OutputFormat::N422
            } else {
                OutputFormat::S422
            }
        }
    };

    let mut dout = OutputParams {
        dp_lanes,
        output_bpp: timing.display_color_depth.bits(),
        output_type,
        output_format,
        output_bpc: OUTPUT_BPC,
        dsc_enable,
        dsc_slices: timing.dsc_cfg.num_slices_h,
        dsc_bpp: timing.dsc_cfg.bits_per_pixel,
        ..Default::default()
    };

    if let Some(info) = stream.writeback {
        dout.wb_enable = true;
        dout.num_active_wb = 1;
        dout.wb = writeback_params(&info);
    }

    dout
}

fn writeback_params(info: &WritebackInfo) -> WritebackParams {
    let pixel_format = match (info.format, info.depth) {
        (WritebackFormat::Yuv420, ColorDepth::Bpc8) => SourceFormat::Yuv420_8,
        (WritebackFormat::Yuv420, _) => SourceFormat::Yuv420_10,
        (WritebackFormat::Rgb, _) => SourceFormat::Rgb444_32,
    };

    WritebackParams {
        src_width: info.crop_width,
        src_height: info.crop_height,
        dst_width: info.dest_width,
        dst_height: info.dest_height,
        htaps_luma: 1,
        vtaps_luma: 1,
        htaps_chroma: info.h_taps_c,
        vtaps_chroma: info.v_taps_c,
        hratio: 1.0,
        vratio: 1.0,
        pixel_format,
    }
}

fn blank_params(stream: &Stream, src: &mut SrcParams, dest: &mut DestParams) -> ScaleParams {
    let timing = stream.timing();
    let width = timing.h_addressable.min(BLANK_MAX_WIDTH);
    let height = timing.v_addressable.min(BLANK_MAX_HEIGHT);

    src.source_scan = SourceScan::Horizontal;
    src.sw_mode = SwizzleMode::Linear;
    src.macro_tile_size = MacroTileSize::Tile64k;
    src.source_format = SourceFormat::Rgb444_32;
    src.viewport_width = width;
    src.viewport_height = height;
    src.data_pitch = width.div_ceil(64) * 64;
    src.is_hsplit = false;

    dest.recout_width = width;
    dest.recout_height = height;
    dest.full_recout_width = width;
    dest.full_recout_height = height;
    dest.odm_combine = false;

    ScaleParams {
        lb_depth: LbDepth::Lb16,
        hscl_ratio: 1.0,
        vscl_ratio: 1.0,
        scl_enable: false,
        htaps: 1,
        vtaps: 1,
        ..Default::default()
    }
}

fn plane_params(
    state: &DcState,
    pipe: &PipeContext,
    always_scale: bool,
    src: &mut SrcParams,
    dest: &mut DestParams,
) -> Option<ScaleParams> {
    let plane = pipe.plane.as_ref()?;
    let scl = &pipe.scl;

    src.macro_tile_size = formats::macro_tile_size(plane.swizzle);
    src.sw_mode = plane.swizzle;
    src.immediate_flip = plane.flip_immediate;
    src.is_hsplit = pipe.is_hsplit();
    src.source_scan = match plane.rotation {
        Rotation::Angle90 | Rotation::Angle270 => SourceScan::Vertical,
        Rotation::Angle0 | Rotation::Angle180 => SourceScan::Horizontal,
    };
    src.source_format = formats::source_format(plane.format);
    src.viewport_y_y = scl.viewport.y;
    src.viewport_y_c = scl.viewport_c.y;
    src.viewport_width = px(scl.viewport.width);
    src.viewport_width_c = px(scl.viewport_c.width);
    src.viewport_height = px(scl.viewport.height);
    src.viewport_height_c = px(scl.viewport_c.height);
    src.data_pitch = plane.pitch;
    src.meta_pitch = plane.meta_pitch;
    if formats::is_video(plane.format) {
        src.data_pitch_c = plane.chroma_pitch;
        src.meta_pitch_c = plane.meta_pitch_c;
    }
    src.dcc = plane.dcc;

    dest.odm_combine = pipe.is_odm();
    dest.recout_width = px(scl.recout.width);
    dest.recout_height = px(scl.recout.height);
    dest.full_recout_width = dest.recout_width;
    dest.full_recout_height = dest.recout_height;

    // a split plane is described by its full output width
    let partner = pipe.top().or_else(|| pipe.bottom());
    if let Some(partner) = partner.filter(|_| pipe.is_hsplit()) {
        dest.full_recout_width += px(state.pipes[partner].scl.recout.width);
    }

    let ratios = &scl.ratios;
    let scl_enable = !ratios.horz.is_one()
        || !ratios.vert.is_one()
        || !ratios.horz_c.is_one()
        || !ratios.vert_c.is_one()
        || always_scale;

    Some(ScaleParams {
        lb_depth: LbDepth::Lb10,
        hscl_ratio: ratio(ratios.horz),
        hscl_ratio_c: ratio(ratios.horz_c),
        vscl_ratio: ratio(ratios.vert),
        vscl_ratio_c: ratio(ratios.vert_c),
        scl_enable,
        htaps: scl.taps.h_taps,
        htaps_c: scl.taps.h_taps_c,
        vtaps: scl.taps.v_taps,
        vtaps_c: scl.taps.v_taps_c,
    })
}

/// Builds one calculator parameter record per pipe in use, in pipe index order.
pub(crate) fn populate_parameters(state: &DcState, always_scale: bool) -> Vec<PipeParams> {
    let synchronized = synchronized_vblank(state);

    state
        .pipes
        .iter()
        .filter_map(|pipe| {
            let stream = pipe.stream.as_ref()?;
            let timing = stream.timing();

            let mut src = SrcParams {
                dcc_rate: 1,
                hsplit_grp: pipe.idx,
                num_cursors: 2,
                cur0_src_width: CURSOR_WIDTH,
                cur0_bpp: CURSOR_BPP,
                cur1_src_width: CURSOR_WIDTH,
                cur1_bpp: CURSOR_BPP,
                ..Default::default()
            };
            if stream.use_dynamic_meta {
                src.dynamic_metadata_enable = true;
                src.dynamic_metadata_lines_before_active = timing.v_blank_lines() / 2;
                src.dynamic_metadata_xmit_bytes =
                    if stream.signal_type().is_dp() { 36 } else { 32 };
            }
            if let Some(top) = pipe.top() {
                if pipe.pair_kind() != Some(PairKind::Overlay) {
                    src.hsplit_grp = top;
                }
            }

            let mut dest = dest_params(stream, pipe, synchronized);
            let scale = match plane_params(state, pipe, always_scale, &mut src, &mut dest) {
                Some(scale) => scale,
                None => blank_params(stream, &mut src, &mut dest),
            };

            Some(PipeParams {
                src,
                dest,
                scale,
                dout: output_params(stream),
                clks_cfg: Default::default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper;
    use crate::resource::{ResourceCaps, ResourcePool, VirtualBlocks};
    use crate::stream::{LinkSettings, Plane, Timing};
    use crate::types::Rect;
    use std::sync::Arc;

    fn state() -> DcState {
        let pool = ResourcePool::new(ResourceCaps::nv10(), 6, Box::new(VirtualBlocks)).unwrap();
        DcState::new(&pool)
    }

    fn uhd() -> Timing {
        Timing::from_mode(594000, 3840, 4016, 4104, 4400, 2160, 2168, 2178, 2250)
    }

    fn fhd() -> Timing {
        Timing::from_mode(148500, 1920, 2008, 2052, 2200, 1080, 1084, 1089, 1125)
    }

    #[test]
    fn test_blank_pipe() {
        let mut state = state();
        let stream = Arc::new(Stream::new(uhd()).signal(SignalType::Hdmi));
        mapper::add_stream(&mut state, stream).unwrap();

        let params = populate_parameters(&state, false);
        assert_eq!(params.len(), 1);

        let p = &params[0];
        assert_eq!(p.src.viewport_width, 1920);
        assert_eq!(p.src.viewport_height, 1080);
        assert_eq!(p.src.data_pitch, 1920);
        assert_eq!(p.src.sw_mode, SwizzleMode::Linear);
        assert_eq!(p.scale.lb_depth, LbDepth::Lb16);
        assert_eq!(p.scale.htaps, 1);
        assert_eq!(p.dest.recout_width, 1920);
        assert_eq!(p.dest.htotal, 4400);
        assert_eq!(p.dest.hblank_start, 4224);
        assert_eq!(p.dest.hblank_end, 384);
        assert_eq!(p.dest.vblank_start, 2242);
        assert_eq!(p.dest.vblank_end, 82);
        assert_eq!(p.dest.pixel_rate_mhz, 594.0);
        assert_eq!(p.dout.output_type, OutputType::Hdmi);
        assert_eq!(p.dout.output_bpp, 8);
        assert_eq!(p.dout.output_bpc, 12);
        assert_eq!(p.src.num_cursors, 2);
        assert!(!p.dout.wb_enable);

        let mut narrow = fhd();
        narrow.h_addressable = 1000;
        let mut state = self::state();
        mapper::add_stream(&mut state, Arc::new(Stream::new(narrow))).unwrap();
        assert_eq!(populate_parameters(&state, false)[0].src.data_pitch, 1024);
    }

    #[test]
    fn test_frame_packing() {
        let mut packed = fhd();
        packed.timing_3d_format = Timing3dFormat::HwFramePacking;
        let a = Arc::new(Stream::new(packed));
        let b = Arc::new(Stream::new(fhd()));

        let mut state = state();
        mapper::add_stream(&mut state, a).unwrap();
        mapper::add_stream(&mut state, b).unwrap();

        let params = populate_parameters(&state, false);
        assert_eq!(params[0].dest.pixel_rate_mhz, 297.0);
        assert_eq!(params[0].dest.htotal, 2200);
        assert_eq!(params[0].dest.vtotal, 1125);
        assert_eq!(params[1].dest.pixel_rate_mhz, 148.5);
    }

    #[test]
    fn test_output_params() {
        let link = LinkSettings {
            cur_lane_count: None,
            verified_lane_count: Some(2),
            preferred_engine: None,
        };
        let dp = Stream::new(fhd()).signal(SignalType::DisplayPort).link(link);
        assert_eq!(output_params(&dp).dp_lanes, 2);
        assert_eq!(output_params(&dp).output_type, OutputType::Dp);

        let link = LinkSettings {
            cur_lane_count: Some(1),
            ..link
        };
        let edp = Stream::new(fhd()).signal(SignalType::Edp).link(link);
        assert_eq!(output_params(&edp).dp_lanes, 1);
        assert_eq!(output_params(&edp).output_type, OutputType::Edp);

        // no signal assumes the widest link
        let virt = Stream::new(fhd()).signal(SignalType::Virtual).link(link);
        assert_eq!(output_params(&virt).dp_lanes, 4);
        assert_eq!(output_params(&virt).output_type, OutputType::Dp);

        let mut timing = fhd();
        timing.pixel_encoding = PixelEncoding::YCbCr422;
        assert_eq!(
            output_params(&Stream::new(timing)).output_format,
            OutputFormat::S422
        );
        timing.pixel_encoding = PixelEncoding::YCbCr420;
        assert_eq!(
            output_params(&Stream::new(timing)).output_format,
            OutputFormat::Yuv420
        );
    }

    #[cfg(feature = "dsc")]
    #[test]
    fn test_output_params_dsc() {
        use crate::stream::DscConfig;

        let mut timing = fhd();
        timing.pixel_encoding = PixelEncoding::YCbCr422;
        timing.flags |= TimingFlags::DSC;
        timing.dsc_cfg = DscConfig {
            num_slices_h: 2,
            num_slices_v: 1,
            bits_per_pixel: 8 * 16,
            ycbcr422_simple: false,
        };

        let dout = output_params(&Stream::new(timing));
        assert!(dout.dsc_enable);
        assert_eq!(dout.dsc_slices, 2);
        assert_eq!(dout.dsc_bpp, 128);
        assert_eq!(dout.output_format, OutputFormat::N422);

        timing.dsc_cfg.ycbcr422_simple = true;
        assert_eq!(
            output_params(&Stream::new(timing)).output_format,
            OutputFormat::S422
        );
    }

    #[test]
    fn test_writeback_and_metadata() {
        let info = WritebackInfo {
            crop_width: 1920,
            crop_height: 1080,
            dest_width: 960,
            dest_height: 540,
            h_taps_c: 4,
            v_taps_c: 2,
            format: WritebackFormat::Yuv420,
            depth: ColorDepth::Bpc10,
        };
        let stream = Stream::new(fhd())
            .signal(SignalType::Hdmi)
            .writeback(info)
            .dynamic_metadata();

        let dout = output_params(&stream);
        assert!(dout.wb_enable);
        assert_eq!(dout.num_active_wb, 1);
        assert_eq!(dout.wb.dst_width, 960);
        assert_eq!(dout.wb.htaps_chroma, 4);
        assert_eq!(dout.wb.pixel_format, SourceFormat::Yuv420_10);

        let mut state = state();
        mapper::add_stream(&mut state, Arc::new(stream)).unwrap();
        let p = &populate_parameters(&state, false)[0];
        assert!(p.src.dynamic_metadata_enable);
        assert_eq!(p.src.dynamic_metadata_lines_before_active, 22);
        assert_eq!(p.src.dynamic_metadata_xmit_bytes, 32);
    }

    #[test]
    fn test_planes() {
        let mut state = state();
        let a = Arc::new(Stream::new(uhd()));
        let b = Arc::new(Stream::new(fhd()));
        mapper::add_stream(&mut state, a.clone()).unwrap();
        mapper::add_stream(&mut state, b.clone()).unwrap();

        let src = Rect::new(0, 0, 1920, 1080);
        let dst = Rect::new(0, 0, 3840, 2160);
        let video = Plane::new(formats::NV12, src, dst).pitch(2048, 1024);
        mapper::add_plane(&mut state, &a, Arc::new(video)).unwrap();
        let overlay = Plane::new(formats::ARGB8888, src, src).dcc(64, 0);
        mapper::add_plane(&mut state, &a, Arc::new(overlay)).unwrap();

        let params = populate_parameters(&state, false);
        assert_eq!(params.len(), 3);

        let p = &params[0];
        assert_eq!(p.src.source_format, SourceFormat::Yuv420_8);
        assert_eq!(p.src.data_pitch, 2048);
        assert_eq!(p.src.data_pitch_c, 1024);
        assert_eq!(p.src.viewport_width_c, 960);
        assert_eq!(p.scale.hscl_ratio, 0.5);
        assert_eq!(p.scale.hscl_ratio_c, 0.25);
        assert!(p.scale.scl_enable);
        assert_eq!(p.scale.lb_depth, LbDepth::Lb10);
        assert!(!p.src.is_hsplit);
        assert!(!p.dest.synchronized_vblank_all_planes);

        // the overlay is its own split group on the head's timing generator
        let overlay = &params[2];
        assert_eq!(overlay.src.hsplit_grp, 5);
        assert_eq!(overlay.dest.otg_inst, 0);
        assert!(overlay.src.dcc);
        assert_eq!(overlay.src.meta_pitch, 64);
        assert_eq!(overlay.src.data_pitch_c, 0);
        assert!(!overlay.scale.scl_enable);
        assert!(populate_parameters(&state, true)[2].scale.scl_enable);
    }

    #[test]
    fn test_split_groups() {
        let mut state = state();
        let stream = Arc::new(Stream::new(uhd()));
        mapper::add_stream(&mut state, stream.clone()).unwrap();
        let rect = Rect::new(0, 0, 3840, 2160);
        mapper::add_plane(&mut state, &stream, Arc::new(Plane::new(formats::ARGB8888, rect, rect)))
            .unwrap();
        mapper::split_stream_for_combine(&mut state, 0, 5, true).unwrap();

        let params = populate_parameters(&state, false);
        assert_eq!(params.len(), 2);
        for p in &params {
            assert_eq!(p.src.hsplit_grp, 0);
            assert!(p.src.is_hsplit);
            assert!(p.dest.odm_combine);
            assert_eq!(p.dest.recout_width, 1920);
            assert_eq!(p.dest.full_recout_width, 3840);
            assert!(p.dest.synchronized_vblank_all_planes);
        }
    }
}
