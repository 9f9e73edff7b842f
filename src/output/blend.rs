use image::{Rgb, RgbImage, RgbaImage};

/// Source-over blend of a straight-alpha overlay onto a frame of the same size
///
/// Overlays of another size should be scaled first with `MaskPipeline::overlay_scaled`.
pub fn blend_overlay(frame: &RgbImage, overlay: &RgbaImage) -> RgbImage {
    debug_assert_eq!(frame.dimensions(), overlay.dimensions());

    let mut out = frame.clone();
    for (dst, src) in out.pixels_mut().zip(overlay.pixels()) {
        let a = src[3] as u16;
        if a == 0 {
            continue;
        }
        let mix = |f: u8, o: u8| ((o as u16 * a + f as u16 * (255 - a) + 127) / 255) as u8;
        *dst = Rgb([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2])]);
    }
    out
}
