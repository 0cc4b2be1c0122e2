// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

use super::dml::{MacroTileSize, SourceFormat};
use super::stream::SwizzleMode;
use super::types::Format;
use std::str;

// from drm_fourcc.h
mod consts {
    macro_rules! fourcc_code {
        ($a:literal, $b:literal, $c:literal, $d:literal) => {
            ($a as u32) | (($b as u32) << 8) | (($c as u32) << 16) | (($d as u32) << 24)
        };
    }

    pub const DRM_FORMAT_INVALID: u32 = 0;
    pub const DRM_FORMAT_C8: u32 = fourcc_code!('C', '8', ' ', ' ');
    pub const DRM_FORMAT_RGB565: u32 = fourcc_code!('R', 'G', '1', '6');
    pub const DRM_FORMAT_XRGB1555: u32 = fourcc_code!('X', 'R', '1', '5');
    pub const DRM_FORMAT_ARGB1555: u32 = fourcc_code!('A', 'R', '1', '5');
    pub const DRM_FORMAT_ABGR8888: u32 = fourcc_code!('A', 'B', '2', '4');
    pub const DRM_FORMAT_XBGR8888: u32 = fourcc_code!('X', 'B', '2', '4');
    pub const DRM_FORMAT_ARGB8888: u32 = fourcc_code!('A', 'R', '2', '4');
    pub const DRM_FORMAT_XRGB8888: u32 = fourcc_code!('X', 'R', '2', '4');
    pub const DRM_FORMAT_ABGR2101010: u32 = fourcc_code!('A', 'B', '3', '0');
    pub const DRM_FORMAT_XBGR2101010: u32 = fourcc_code!('X', 'B', '3', '0');
    pub const DRM_FORMAT_ARGB2101010: u32 = fourcc_code!('A', 'R', '3', '0');
    pub const DRM_FORMAT_XRGB2101010: u32 = fourcc_code!('X', 'R', '3', '0');
    pub const DRM_FORMAT_ARGB16161616: u32 = fourcc_code!('A', 'R', '4', '8');
    pub const DRM_FORMAT_ABGR16161616F: u32 = fourcc_code!('A', 'B', '4', 'H');
    pub const DRM_FORMAT_ARGB16161616F: u32 = fourcc_code!('A', 'R', '4', 'H');
    pub const DRM_FORMAT_YUYV: u32 = fourcc_code!('Y', 'U', 'Y', 'V');
    pub const DRM_FORMAT_NV12: u32 = fourcc_code!('N', 'V', '1', '2');
    pub const DRM_FORMAT_NV21: u32 = fourcc_code!('N', 'V', '2', '1');
    pub const DRM_FORMAT_P010: u32 = fourcc_code!('P', '0', '1', '0');
}

pub const INVALID: Format = Format(consts::DRM_FORMAT_INVALID);
#[cfg(test)]
pub const ARGB8888: Format = Format(consts::DRM_FORMAT_ARGB8888);
#[cfg(test)]
pub const NV12: Format = Format(consts::DRM_FORMAT_NV12);

pub fn fourcc(fmt: Format) -> String {
    let bytes = fmt.0.to_le_bytes();
    if let Ok(s) = str::from_utf8(&bytes) {
        format!("'{s}'")
    } else {
        format!("0x{:x}", fmt.0)
    }
}

pub fn name(fmt: Format) -> Option<&'static str> {
    let name = match fmt.0 {
        consts::DRM_FORMAT_C8 => "C8",
        consts::DRM_FORMAT_RGB565 => "RGB565",
        consts::DRM_FORMAT_XRGB1555 => "XRGB1555",
        consts::DRM_FORMAT_ARGB1555 => "ARGB1555",
        consts::DRM_FORMAT_ABGR8888 => "ABGR8888",
        consts::DRM_FORMAT_XBGR8888 => "XBGR8888",
        consts::DRM_FORMAT_ARGB8888 => "ARGB8888",
        consts::DRM_FORMAT_XRGB8888 => "XRGB8888",
        consts::DRM_FORMAT_ABGR2101010 => "ABGR2101010",
        consts::DRM_FORMAT_XBGR2101010 => "XBGR2101010",
        consts::DRM_FORMAT_ARGB2101010 => "ARGB2101010",
        consts::DRM_FORMAT_XRGB2101010 => "XRGB2101010",
        consts::DRM_FORMAT_ARGB16161616 => "ARGB16161616",
        consts::DRM_FORMAT_ABGR16161616F => "ABGR16161616F",
        consts::DRM_FORMAT_ARGB16161616F => "ARGB16161616F",
        consts::DRM_FORMAT_YUYV => "YUYV",
        consts::DRM_FORMAT_NV12 => "NV12",
        consts::DRM_FORMAT_NV21 => "NV21",
        consts::DRM_FORMAT_P010 => "P010",
        _ => {
            return None;
        }
    };

    Some(name)
}

/// Returns the size of a luma (or packed) pixel in bits.
pub fn bits_per_pixel(fmt: Format) -> Option<u32> {
    let bpp = match fmt.0 {
        consts::DRM_FORMAT_C8 | consts::DRM_FORMAT_NV12 | consts::DRM_FORMAT_NV21 => 8,
        consts::DRM_FORMAT_RGB565
        | consts::DRM_FORMAT_XRGB1555
        | consts::DRM_FORMAT_ARGB1555
        | consts::DRM_FORMAT_P010 => 16,
        consts::DRM_FORMAT_ABGR8888
        | consts::DRM_FORMAT_XBGR8888
        | consts::DRM_FORMAT_ARGB8888
        | consts::DRM_FORMAT_XRGB8888
        | consts::DRM_FORMAT_ABGR2101010
        | consts::DRM_FORMAT_XBGR2101010
        | consts::DRM_FORMAT_ARGB2101010
        | consts::DRM_FORMAT_XRGB2101010
        | consts::DRM_FORMAT_YUYV => 32,
        consts::DRM_FORMAT_ARGB16161616
        | consts::DRM_FORMAT_ABGR16161616F
        | consts::DRM_FORMAT_ARGB16161616F => 64,
        _ => return None,
    };

    Some(bpp)
}

/// Returns true for the semi-planar 4:2:0 video formats.
pub fn is_video(fmt: Format) -> bool {
    matches!(
        fmt.0,
        consts::DRM_FORMAT_NV12 | consts::DRM_FORMAT_NV21 | consts::DRM_FORMAT_P010
    )
}

/// Maps a format to the source format of the bandwidth model.
///
/// Unknown formats are treated as 32-bit packed 4:4:4.
pub fn source_format(fmt: Format) -> SourceFormat {
    match fmt.0 {
        consts::DRM_FORMAT_NV12 | consts::DRM_FORMAT_NV21 => SourceFormat::Yuv420_8,
        consts::DRM_FORMAT_P010 => SourceFormat::Yuv420_10,
        consts::DRM_FORMAT_ARGB16161616
        | consts::DRM_FORMAT_ABGR16161616F
        | consts::DRM_FORMAT_ARGB16161616F => SourceFormat::Rgb444_64,
        consts::DRM_FORMAT_ARGB1555 | consts::DRM_FORMAT_RGB565 => SourceFormat::Rgb444_16,
        consts::DRM_FORMAT_C8 => SourceFormat::Rgb444_8,
        _ => SourceFormat::Rgb444_32,
    }
}

pub fn default_swizzle(fmt: Format) -> SwizzleMode {
    if bits_per_pixel(fmt) == Some(64) {
        SwizzleMode::Sw64kbD
    } else {
        SwizzleMode::Sw64kbS
    }
}

pub fn macro_tile_size(swizzle: SwizzleMode) -> MacroTileSize {
    match swizzle {
        SwizzleMode::Linear => MacroTileSize::Tile64k,
        SwizzleMode::Sw4kbS | SwizzleMode::Sw4kbD => MacroTileSize::Tile4k,
        SwizzleMode::Sw64kbS
        | SwizzleMode::Sw64kbD
        | SwizzleMode::Sw64kbSX
        | SwizzleMode::Sw64kbDX
        | SwizzleMode::Sw64kbRX => MacroTileSize::Tile64k,
        SwizzleMode::SwVarS | SwizzleMode::SwVarD => MacroTileSize::TileVar,
    }
}
