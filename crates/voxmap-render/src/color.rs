//! Packed ARGB colors.
//!
//! Colors travel through the map as `i32` values laid out `0xAARRGGBB`, the
//! same packing chunk providers hand out. `-1` doubles as the "no pixel"
//! sentinel of [`PixelBuffer::get_color`](crate::PixelBuffer::get_color).

/// Packs channels into an ARGB color.
#[must_use]
pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> i32 {
    ((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32) as i32
}

/// Alpha channel.
#[must_use]
pub const fn alpha(color: i32) -> u8 {
    ((color as u32) >> 24) as u8
}

/// Red channel.
#[must_use]
pub const fn red(color: i32) -> u8 {
    ((color as u32) >> 16) as u8
}

/// Green channel.
#[must_use]
pub const fn green(color: i32) -> u8 {
    ((color as u32) >> 8) as u8
}

/// Blue channel.
#[must_use]
pub const fn blue(color: i32) -> u8 {
    color as u32 as u8
}

/// Opaque black; initial contents of base and composite buffers.
pub const BLACK: i32 = argb(0xFF, 0, 0, 0);
/// Fully transparent; initial contents of overlay buffers.
pub const TRANSPARENT: i32 = 0;
/// Opaque white.
pub const WHITE: i32 = argb(0xFF, 0xFF, 0xFF, 0xFF);
/// Color of columns the provider knows nothing about.
pub const UNKNOWN: i32 = BLACK;
/// Highlight for column groups currently loaded by the host.
pub const LOADED_OVERLAY: i32 = argb(0x66, 0x2E, 0x7D, 0x32);
/// Highlight for column groups with a special feature.
pub const FEATURE_OVERLAY: i32 = argb(0x88, 0x00, 0xFF, 0x55);
/// Column group grid lines.
pub const GRID: i32 = argb(0x99, 0x55, 0x55, 0x55);
/// Tamed creatures.
pub const GREEN: i32 = argb(0xFF, 0x00, 0xFF, 0x00);
/// Passive creatures.
pub const YELLOW: i32 = argb(0xFF, 0xFF, 0xFF, 0x00);
/// Hostile creatures.
pub const DARK_RED: i32 = argb(0xFF, 0xAA, 0x00, 0x00);
/// Player icon outline.
pub const LIGHT_GRAY: i32 = argb(0xFF, 0xAA, 0xAA, 0xAA);

/// Multiplies the RGB channels of `color` by `tint`, keeping the alpha.
#[must_use]
pub fn apply_tint(color: i32, tint: i32) -> i32 {
    let mul = |c: u8, t: u8| ((u16::from(c) * u16::from(t)) / 255) as u8;
    argb(
        alpha(color),
        mul(red(color), red(tint)),
        mul(green(color), green(tint)),
        mul(blue(color), blue(tint)),
    )
}

/// Brightens (positive `diff`) or darkens (negative `diff`) a color for
/// relief shading. Each step of height difference moves the channels by
/// roughly six percent.
#[must_use]
pub fn shade(color: i32, diff: i32) -> i32 {
    if diff == 0 {
        return color;
    }
    let factor = (1.0 + f64::from(diff) * 0.06).clamp(0.0, 2.0);
    let scale = |c: u8| (f64::from(c) * factor).round().clamp(0.0, 255.0) as u8;
    argb(
        alpha(color),
        scale(red(color)),
        scale(green(color)),
        scale(blue(color)),
    )
}
