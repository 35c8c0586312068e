//! Grimoire Tokens: printable token artwork for tabletop scripts.
//!
//! This is the umbrella crate. It re-exports the rendering and networking
//! crates and adds the pieces an application needs on top of them:
//!
//! - [`TokenConfig`]: TOML configuration for cache bounds, DPI, token sizes
//!   and asset locations.
//! - [`TokenGenerator`]: renders character, reminder and meta tokens,
//!   reporting unavailable art instead of failing.
//! - [`logging::targets`]: the `tracing` targets used across the workspace.
//!
//! # Example
//!
//! ```no_run
//! use grimoire_tokens::{Character, OutputFormat, Team, TokenConfig, TokenGenerator, TokenOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TokenConfig::from_toml_str("[render]\ndpi = 300.0")?;
//! let generator = TokenGenerator::from_config(&config).await?;
//!
//! let script = vec![
//!     Character::new("washerwoman", "Washerwoman", Team::Townsfolk)
//!         .with_image("washerwoman")
//!         .with_reminder("Townsfolk")
//!         .with_reminder("Wrong"),
//!     Character::new("imp", "Imp", Team::Demon).with_image("imp"),
//! ];
//!
//! for render in generator.render_all(&script, &TokenOptions::default()).await? {
//!     let (bytes, format) = render.token.encode(OutputFormat::WebP)?;
//!     std::fs::write(render.token.file_name(format), bytes)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod generator;
pub mod logging;
pub mod token;

pub use config::{AssetSettings, CacheSettings, PreloadSettings, RenderSettings, TokenConfig};
pub use error::{ConfigError, ConfigResult, TokenError, TokenResult};
pub use generator::{
    OverlayLayer, TokenGenerator, TokenOptions, TokenPreview, TokenRender, TokenSizes,
};
pub use token::{Character, Team, Token, TokenType, slugify};

pub use grimoire_tokens_render::{
    AssetError, AssetType, BackgroundStyle, Color, FetchTarget, IconSettings, ImageBuffer,
    MeasurementUnit, OutputFormat, PreloadTick,
};

/// Asset resolution, caching and compositing.
pub mod render {
    pub use grimoire_tokens_render::*;
}

/// HTTP fetching and proxy endpoints.
pub mod net {
    pub use grimoire_tokens_net::*;
}
