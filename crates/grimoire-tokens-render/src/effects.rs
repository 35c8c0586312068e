//! Per-pixel effects: tonal adjustment, edge overlays and circular clipping.

use image::Rgba;

use crate::image_buffer::{ImageBlendMode, ImageBuffer, blend_pixels};
use crate::style::{EffectSettings, LightSettings};
use crate::types::{Color, Point};

/// Where the vignette starts, as a fraction of the radius.
pub const VIGNETTE_START: f32 = 0.7;

// ============================================================================
// LIGHT
// ============================================================================

/// Apply brightness, contrast, saturation and vibrance in place.
///
/// Neutral settings leave the image untouched.
pub fn apply_light(img: &mut ImageBuffer, light: &LightSettings) {
    if light.is_neutral() {
        return;
    }

    let brightness = light.brightness.max(0.0) / 100.0;
    let contrast = light.contrast.max(0.0) / 100.0;
    let saturation = light.saturation.max(0.0) / 100.0;
    let vibrance = light.vibrance.clamp(-100.0, 100.0) / 100.0;

    img.map_pixels_in_place(|_, _, p| {
        let [r, g, b, a] = p.0;
        let mut rgb = [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0];

        for c in &mut rgb {
            *c = ((*c * brightness - 0.5) * contrast + 0.5).clamp(0.0, 1.0);
        }

        if saturation != 1.0 || vibrance != 0.0 {
            let (h, s, v) = rgb_to_hsv(rgb);
            let mut s = s * saturation;
            // Vibrance favours muted colors.
            s *= 1.0 + vibrance * (1.0 - s.min(1.0));
            rgb = hsv_to_rgb(h, s.clamp(0.0, 1.0), v);
        }

        let q = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgba([q(rgb[0]), q(rgb[1]), q(rgb[2]), a])
    });
}

/// RGB (0-1) to HSV (h: 0-360, s: 0-1, v: 0-1).
fn rgb_to_hsv([r, g, b]: [f32; 3]) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (h, s, max)
}

/// HSV back to RGB (0-1).
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let h = h.rem_euclid(360.0);
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [r + m, g + m, b + m]
}

// ============================================================================
// EDGE OVERLAYS
// ============================================================================

/// Blend `color` over a ring that fades in from `inner_radius` to the edge
/// of the circle inscribed in `img`. `strength` (0-1) scales the alpha.
pub fn radial_edge_overlay(img: &mut ImageBuffer, inner_radius: f32, color: Color, strength: f32) {
    if !(strength > 0.0) || !(color.a > 0.0) {
        return;
    }
    let strength = strength.min(1.0);

    let (w, h) = img.dimensions();
    let radius = w.min(h) as f32 / 2.0;
    let centre = Point::new(w as f32 / 2.0, h as f32 / 2.0);
    let inner = if inner_radius.is_nan() { radius } else { inner_radius.clamp(0.0, radius) };
    let span = (radius - inner).max(f32::EPSILON);
    let src = color.to_pixel();

    img.map_pixels_in_place(|x, y, dst| {
        let d = Point::new(x as f32 + 0.5, y as f32 + 0.5).distance(centre);
        if d <= inner {
            return dst;
        }
        let ramp = ((d - inner) / span).min(1.0);
        blend_pixels(dst, src, ImageBlendMode::Normal, ramp * strength)
    });
}

/// Apply the enabled vignette and inner glow, in that order.
pub fn apply_effects(img: &mut ImageBuffer, effects: &EffectSettings) {
    let radius = img.width().min(img.height()) as f32 / 2.0;

    if effects.vignette_enabled {
        radial_edge_overlay(
            img,
            radius * VIGNETTE_START,
            effects.vignette_color,
            effects.vignette_intensity / 100.0,
        );
    }

    if effects.inner_glow_enabled {
        let fraction = effects.inner_glow_radius.clamp(0.0, 100.0) / 100.0;
        radial_edge_overlay(
            img,
            radius * (1.0 - fraction),
            effects.inner_glow_color,
            effects.inner_glow_intensity / 100.0,
        );
    }
}

// ============================================================================
// CLIPPING
// ============================================================================

/// Coverage of the pixel at (x, y) by the circle inscribed in a
/// `size` × `size` square, with a one-pixel anti-aliased edge.
#[inline]
pub fn circle_coverage(x: u32, y: u32, size: u32) -> f32 {
    let radius = size as f32 / 2.0;
    let d = Point::new(x as f32 + 0.5, y as f32 + 0.5).distance(Point::new(radius, radius));
    (radius - d + 0.5).clamp(0.0, 1.0)
}

/// Clip to the inscribed circle: alpha is capped by edge coverage.
///
/// Capping rather than scaling makes repeated clips a no-op, so layers
/// placed later can be clipped without eroding the rim.
pub fn clip_to_circle(img: &mut ImageBuffer) {
    let size = img.width().min(img.height());
    img.map_pixels_in_place(|x, y, p| {
        let coverage = circle_coverage(x, y, size);
        if coverage >= 1.0 {
            return p;
        }
        let [r, g, b, a] = p.0;
        let cap = (coverage * 255.0).round() as u8;
        Rgba([r, g, b, a.min(cap)])
    });
}
