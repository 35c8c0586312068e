//! Gradient rasterisation for styled backgrounds.

use std::f32::consts::TAU;

use crate::image_buffer::ImageBuffer;
use crate::style::{GradientSettings, GradientType};
use crate::types::{Color, Point};

/// A color stop at a normalized offset (0.0 to 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Color,
}

impl GradientStop {
    /// Create a stop.
    pub const fn new(offset: f32, color: Color) -> Self {
        Self { offset, color }
    }
}

/// Sample a color at `t` from stops sorted by offset.
///
/// Values of `t` outside the stop range take the nearest end color.
pub fn sample_gradient(stops: &[GradientStop], t: f32) -> Color {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Color::TRANSPARENT;
    };
    let t = t.clamp(0.0, 1.0);

    if t <= first.offset {
        return first.color;
    }
    if t >= last.offset {
        return last.color;
    }

    for pair in stops.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.offset <= t && t <= next.offset {
            let range = next.offset - prev.offset;
            if range < 0.0001 {
                return prev.color;
            }
            return prev.color.lerp(next.color, (t - prev.offset) / range);
        }
    }
    last.color
}

/// Gradient parameter for a pixel centre in a `diameter`-sized square.
///
/// - Linear: projection onto the rotation direction, 0 at one edge of the
///   circle and 1 at the opposite edge.
/// - Radial: distance from the centre over the radius.
/// - Conic: angle past the rotation, as a fraction of a full turn.
pub fn gradient_t(gradient_type: GradientType, rotation_deg: f32, p: Point, diameter: f32) -> f32 {
    let radius = diameter / 2.0;
    let centre = Point::new(radius, radius);
    let dx = p.x - centre.x;
    let dy = p.y - centre.y;

    match gradient_type {
        GradientType::Linear => {
            let angle = rotation_deg.to_radians();
            (dx * angle.cos() + dy * angle.sin()) / diameter + 0.5
        }
        GradientType::Radial => {
            if radius <= 0.0 {
                0.0
            } else {
                p.distance(centre) / radius
            }
        }
        GradientType::Conic => {
            let angle = dy.atan2(dx) - rotation_deg.to_radians();
            angle.rem_euclid(TAU) / TAU
        }
    }
}

/// Rasterise a two-color gradient into a `diameter` × `diameter` square.
pub fn render_gradient(settings: &GradientSettings, diameter: u32) -> ImageBuffer {
    let stops = [
        GradientStop::new(0.0, settings.color_start),
        GradientStop::new(1.0, settings.color_end),
    ];
    let size = diameter as f32;

    let mut out = ImageBuffer::new(diameter, diameter);
    out.map_pixels_in_place(|x, y, _| {
        let p = Point::new(x as f32 + 0.5, y as f32 + 0.5);
        let t = gradient_t(settings.gradient_type, settings.rotation, p, size);
        sample_gradient(&stops, t).to_pixel()
    });
    out
}
