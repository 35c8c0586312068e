//! Procedural surface textures.
//!
//! Tiles are grayscale, opaque and fully determined by (kind, seed, scale,
//! size), so they can be memoised and re-used across tokens.

use std::collections::HashMap;
use std::sync::Arc;

use image::Rgba;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::image_buffer::ImageBuffer;
use crate::logging::targets::COMPOSITOR as TARGET;
use crate::style::{TextureSettings, TextureType};

/// Tiles kept by a [`TextureCache`] before it starts over.
const MAX_CACHED_TILES: usize = 32;

/// Periodic 2D value noise on a square lattice.
struct ValueNoise {
    cells: usize,
    values: Vec<f32>,
}

impl ValueNoise {
    fn new(rng: &mut StdRng, cells: usize) -> Self {
        let cells = cells.max(1);
        let values = (0..cells * cells).map(|_| rng.r#gen::<f32>()).collect();
        Self { cells, values }
    }

    fn at(&self, ix: usize, iy: usize) -> f32 {
        self.values[(iy % self.cells) * self.cells + (ix % self.cells)]
    }

    /// Sample at (u, v) in lattice units, smoothly interpolated.
    fn sample(&self, u: f32, v: f32) -> f32 {
        let (x0, y0) = (u.floor(), v.floor());
        let (fx, fy) = (smooth(u - x0), smooth(v - y0));
        let n = self.cells as f32;
        let ix = x0.rem_euclid(n) as usize;
        let iy = y0.rem_euclid(n) as usize;

        let top = lerp(self.at(ix, iy), self.at(ix + 1, iy), fx);
        let bottom = lerp(self.at(ix, iy + 1), self.at(ix + 1, iy + 1), fx);
        lerp(top, bottom, fy)
    }
}

#[inline]
fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Fractal sum of `octaves` noise layers, normalised to 0..1.
fn fbm(layers: &[ValueNoise], u: f32, v: f32) -> f32 {
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    let mut total = 0.0;
    let mut freq = 1.0;
    for layer in layers {
        sum += layer.sample(u * freq, v * freq) * amplitude;
        total += amplitude;
        amplitude *= 0.5;
        freq *= 2.0;
    }
    sum / total
}

/// Generate a `size` × `size` tile.
///
/// `scale` stretches the features; 1.0 is the natural size.
pub fn generate_tile(kind: TextureType, seed: u64, scale: f32, size: u32) -> Option<ImageBuffer> {
    if kind == TextureType::None || size == 0 {
        return None;
    }

    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tile = ImageBuffer::new(size, size);

    let shade = |v: f32| {
        let g = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([g, g, g, 255])
    };

    match kind {
        TextureType::None => return None,
        TextureType::Noise => {
            let grain = scale.max(1.0);
            let cells = (size as f32 / grain).ceil() as usize;
            let noise = ValueNoise::new(&mut rng, cells);
            tile.map_pixels_in_place(|x, y, _| {
                shade(noise.sample(x as f32 / grain, y as f32 / grain))
            });
        }
        TextureType::Paper => {
            let feature = 24.0 * scale;
            let cells = ((size as f32 / feature).ceil() as usize).max(2);
            let layers: Vec<_> = (0..4)
                .map(|octave| ValueNoise::new(&mut rng, cells << octave))
                .collect();
            tile.map_pixels_in_place(|x, y, _| {
                let v = fbm(&layers, x as f32 / feature, y as f32 / feature);
                // Low contrast around mid gray.
                shade(0.5 + (v - 0.5) * 0.6)
            });
        }
        TextureType::Linen => {
            let pitch = 4.0 * scale;
            let rows: Vec<f32> = (0..size).map(|_| rng.gen_range(-0.15..0.15)).collect();
            let cols: Vec<f32> = (0..size).map(|_| rng.gen_range(-0.15..0.15)).collect();
            tile.map_pixels_in_place(|x, y, _| {
                let warp = (x as f32 / pitch * std::f32::consts::TAU).sin();
                let weft = (y as f32 / pitch * std::f32::consts::TAU).sin();
                let jitter = rows[y as usize] + cols[x as usize];
                shade(0.5 + 0.2 * (warp.max(weft)) + jitter)
            });
        }
        TextureType::Marble => {
            let feature = 48.0 * scale;
            let cells = ((size as f32 / feature).ceil() as usize).max(2);
            let layers: Vec<_> = (0..5)
                .map(|octave| ValueNoise::new(&mut rng, cells << octave))
                .collect();
            let angle: f32 = rng.gen_range(0.0..std::f32::consts::PI);
            let (dx, dy) = (angle.cos(), angle.sin());
            tile.map_pixels_in_place(|x, y, _| {
                let (u, v) = (x as f32 / feature, y as f32 / feature);
                let turbulence = fbm(&layers, u, v) * 6.0;
                let vein = ((u * dx + v * dy) * std::f32::consts::PI + turbulence).sin();
                // Thin dark veins on a light body.
                shade(0.75 - 0.45 * (1.0 - vein.abs()).powi(6))
            });
        }
    }

    Some(tile)
}

/// Memoised tile key. Scale is keyed by its bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TileKey {
    kind: TextureType,
    seed: u64,
    scale_bits: u32,
    size: u32,
}

/// Memo of generated tiles.
#[derive(Debug, Default)]
pub struct TextureCache {
    tiles: HashMap<TileKey, Arc<ImageBuffer>>,
    generated: u64,
}

impl TextureCache {
    /// An empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or generate a tile.
    pub fn tile(&mut self, kind: TextureType, seed: u64, scale: f32, size: u32) -> Option<Arc<ImageBuffer>> {
        let key = TileKey {
            kind,
            seed,
            scale_bits: scale.to_bits(),
            size,
        };
        if let Some(tile) = self.tiles.get(&key) {
            return Some(tile.clone());
        }

        let tile = Arc::new(generate_tile(kind, seed, scale, size)?);
        if self.tiles.len() >= MAX_CACHED_TILES {
            self.tiles.clear();
        }
        self.tiles.insert(key, tile.clone());
        self.generated += 1;
        tracing::trace!(target: TARGET, ?kind, seed, size, "generated texture tile");
        Some(tile)
    }

    /// Number of tiles generated so far (cache misses).
    pub fn generated(&self) -> u64 {
        self.generated
    }

    /// Number of memoised tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether nothing is memoised.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Composite the texture described by `settings` onto `img` using `seed`.
///
/// Does nothing, and allocates nothing, for [`TextureType::None`] or an
/// intensity that is not positive (NaN included).
pub fn apply_texture(img: &mut ImageBuffer, settings: &TextureSettings, seed: u64, cache: &mut TextureCache) {
    if settings.texture_type == TextureType::None || !(settings.intensity > 0.0) {
        return;
    }

    let size = img.width().max(img.height());
    let Some(tile) = cache.tile(settings.texture_type, seed, settings.scale, size) else {
        return;
    };

    // Keep the surface's alpha; the texture only changes color.
    let original = img.clone();
    img.composite(&tile, 0, 0, settings.blend_mode, settings.intensity / 100.0);
    for (out, before) in img.as_rgba_mut().pixels_mut().zip(original.as_rgba().pixels()) {
        out.0[3] = before.0[3];
    }
}
