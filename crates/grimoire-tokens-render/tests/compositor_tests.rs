//! Integration tests for token compositing.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use grimoire_tokens_render::effects::clip_to_circle;
use grimoire_tokens_render::gradient::render_gradient;
use grimoire_tokens_render::{
    AssetError, AssetType, BackgroundSlot, BackgroundStyle, Color, CompositingEngine,
    CompositorConfig, EffectSettings, FetchTarget, GradientType, ImageBlendMode, ImageBuffer,
    ImageFetcher, ImageLoader, LightSettings, Measurement, MeasurementUnit, NetworkError,
    ProxyEndpoint, TextureSettings, TextureType, token_diameter_px,
};

fn linear_black_to_white() -> BackgroundStyle {
    BackgroundStyle::gradient(GradientType::Linear, Color::BLACK, Color::WHITE, 0.0)
}

#[test]
fn test_linear_gradient_is_strictly_monotonic_left_to_right() {
    let engine = CompositingEngine::default();
    let diameter = 200;
    let surface = engine
        .render(&linear_black_to_white(), diameter, &BackgroundSlot::Styled)
        .unwrap();

    for y in [diameter / 2, diameter / 3, diameter * 2 / 3] {
        let inside: Vec<f32> = (0..diameter)
            .filter_map(|x| surface.canvas().get_pixel(x, y))
            .filter(|c| c.a == 1.0)
            .map(|c| c.luminance())
            .collect();

        assert!(inside.len() > diameter as usize / 2, "row {y}");
        for pair in inside.windows(2) {
            assert!(pair[1] > pair[0], "row {y}: {} then {}", pair[0], pair[1]);
        }
    }
}

#[test]
fn test_print_size_drives_canvas_size() {
    let print_size = Measurement::new(1.75, MeasurementUnit::Inches);
    let diameter = token_diameter_px(print_size, 300.0).unwrap();
    assert_eq!(diameter, 525);

    let surface = CompositingEngine::default()
        .render(&linear_black_to_white(), diameter, &BackgroundSlot::Styled)
        .unwrap();
    assert_eq!(surface.canvas().dimensions(), (525, 525));
}

#[test]
fn test_texture_none_matches_skipped_texture_step() {
    let engine = CompositingEngine::default();
    let style = linear_black_to_white();

    let reference = {
        let mut canvas = render_gradient(&style.gradient, 128);
        clip_to_circle(&mut canvas);
        canvas
    };

    for texture in [
        TextureSettings::default(),
        TextureSettings {
            texture_type: TextureType::None,
            intensity: 100.0,
            seed: 12345,
            blend_mode: ImageBlendMode::Multiply,
            randomize_seed_per_token: true,
            ..Default::default()
        },
    ] {
        let surface = engine
            .render(&style.clone().with_texture(texture), 128, &BackgroundSlot::Styled)
            .unwrap();
        assert_eq!(surface.canvas().as_raw(), reference.as_raw());
    }
    assert_eq!(engine.textures_generated(), 0);
}

#[test]
fn test_every_texture_and_blend_mode_renders() {
    let engine = CompositingEngine::default();
    let plain = engine
        .render(&BackgroundStyle::solid(Color::GRAY), 64, &BackgroundSlot::Styled)
        .unwrap();

    for texture_type in [
        TextureType::Noise,
        TextureType::Paper,
        TextureType::Linen,
        TextureType::Marble,
    ] {
        for blend_mode in [
            ImageBlendMode::Normal,
            ImageBlendMode::Multiply,
            ImageBlendMode::Screen,
            ImageBlendMode::Overlay,
            ImageBlendMode::SoftLight,
        ] {
            let style = BackgroundStyle::solid(Color::GRAY).with_texture(TextureSettings {
                texture_type,
                blend_mode,
                intensity: 100.0,
                seed: 3,
                ..Default::default()
            });
            let textured = engine.render(&style, 64, &BackgroundSlot::Styled).unwrap();
            assert_ne!(textured, plain, "{texture_type:?} / {blend_mode:?}");
            // Transparent corners stay transparent.
            assert_eq!(textured.canvas().get_pixel(0, 0).unwrap().a, 0.0);
        }
    }
    // One tile per texture kind, shared across blend modes.
    assert_eq!(engine.textures_generated(), 4);
}

#[test]
fn test_randomized_seed_varies_between_tokens() {
    let engine = CompositingEngine::default();
    let style = BackgroundStyle::solid(Color::GRAY).with_texture(TextureSettings {
        texture_type: TextureType::Noise,
        intensity: 100.0,
        blend_mode: ImageBlendMode::Normal,
        randomize_seed_per_token: true,
        ..Default::default()
    });

    let a = engine.render(&style, 48, &BackgroundSlot::Styled).unwrap();
    let b = engine.render(&style, 48, &BackgroundSlot::Styled).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_identical_inputs_give_identical_output() {
    let engine = CompositingEngine::default();
    let art = Arc::new(ImageBuffer::from_color(30, 60, Color::from_rgba8(90, 140, 30, 255)));
    let style = BackgroundStyle::image("https://example.com/bg.png")
        .with_light(LightSettings {
            brightness: 110.0,
            contrast: 120.0,
            saturation: 80.0,
            vibrance: 25.0,
        })
        .with_effects(EffectSettings {
            vignette_enabled: true,
            inner_glow_enabled: true,
            ..Default::default()
        })
        .with_texture(TextureSettings {
            texture_type: TextureType::Paper,
            ..Default::default()
        });

    let first = engine.render(&style, 96, &BackgroundSlot::Ready(art.clone())).unwrap();
    let second = engine.render(&style, 96, &BackgroundSlot::Ready(art)).unwrap();
    assert_eq!(first.canvas().as_raw(), second.canvas().as_raw());
}

struct Offline;

impl ImageFetcher for Offline {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, NetworkError>> {
        async move { Err(NetworkError::Connection(format!("unreachable: {url}"))) }.boxed()
    }
}

#[tokio::test]
async fn test_failed_direct_url_renders_placeholder_and_reports() {
    let placeholder = Color::from_rgba8(0x44, 0x22, 0x11, 255);
    let engine = CompositingEngine::new(CompositorConfig::default().with_placeholder_color(placeholder));
    let proxy = ProxyEndpoint::new("https://proxy.example.com/fetch").unwrap();
    let loader = ImageLoader::builder()
        .fetcher(Arc::new(Offline))
        .proxy(proxy.clone())
        .build();

    let url = "https://art.example.com/missing-bg.png";
    let style = BackgroundStyle::image(url);
    let result = loader.load(&FetchTarget::url(url, AssetType::TokenBackground)).await;

    let error = result.unwrap_err();
    assert_eq!(
        error,
        AssetError::LoadFailed {
            direct_url: url.to_string(),
            proxy_url: proxy.mirror_url(url),
            reason: format!("Connection error: unreachable: {}", proxy.mirror_url(url)),
        }
    );

    let surface = engine.render(&style, 64, &BackgroundSlot::Failed).unwrap();
    assert_eq!(
        surface.canvas().get_pixel(32, 32).unwrap().to_rgba8(),
        placeholder.to_rgba8()
    );
}
