//! The token generation pipeline.
//!
//! [`TokenGenerator`] ties the resolver, loader, cache and compositor
//! together. Every art reference is resolved and loaded independently; a
//! reference that cannot be loaded degrades to a placeholder and is
//! reported on the returned [`TokenRender`] instead of failing the token.
//!
//! # Example
//!
//! ```ignore
//! use grimoire_tokens::{Character, Team, TokenConfig, TokenGenerator, TokenOptions};
//!
//! let config = TokenConfig::load("grimoire.toml")?;
//! let generator = TokenGenerator::from_config(&config).await?;
//!
//! let imp = Character::new("imp", "Imp", Team::Demon).with_image("imp");
//! let render = generator.render_character(&imp, &TokenOptions::default()).await?;
//! for issue in &render.issues {
//!     eprintln!("{}: {issue}", render.token.filename);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use grimoire_tokens_net::HttpClient;
use grimoire_tokens_render::{
    AssetError, AssetResolver, AssetType, BackgroundSlot, BackgroundStyle, Bitmap,
    CompositingEngine, CompositorConfig, DiskSyncedStore, FetchTarget, IconSettings,
    ImageBlendMode, ImageBuffer, ImageCache, ImageLoader, InMemoryAssetStore, PreloadQueue,
    PreloadTick, SharedImageCache, SourceType, TokenSurface, UserAssetStore, token_diameter_px,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::TokenConfig;
use crate::error::{TokenError, TokenResult};
use crate::logging::targets;
use crate::token::{
    Character, Team, Token, TokenType, character_filename, meta_filename, reminder_filename,
};

/// A pre-rasterised layer (name text, frame, accent) drawn over a token.
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub image: Bitmap,
    /// Top-left corner, in pixels from the token's top-left.
    pub x: i64,
    pub y: i64,
    pub blend_mode: ImageBlendMode,
    pub opacity: f32,
}

impl OverlayLayer {
    /// A layer centred on a token of `diameter` pixels.
    pub fn centered(image: Bitmap, diameter: u32) -> Self {
        let x = (i64::from(diameter) - i64::from(image.width())) / 2;
        let y = (i64::from(diameter) - i64::from(image.height())) / 2;
        Self {
            image,
            x,
            y,
            blend_mode: ImageBlendMode::Normal,
            opacity: 1.0,
        }
    }
}

/// Per-kind styling of generated tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenOptions {
    pub character_background: BackgroundStyle,
    pub reminder_background: BackgroundStyle,
    pub meta_background: BackgroundStyle,
    pub character_icon: IconSettings,
    pub reminder_icon: IconSettings,
    pub meta_icon: IconSettings,
    /// Drawn over every character token, in order.
    #[serde(skip)]
    pub character_overlays: Vec<OverlayLayer>,
}

/// A rendered token plus every art reference that had to be replaced by a
/// placeholder.
#[derive(Debug, Clone)]
pub struct TokenRender {
    pub token: Token,
    pub issues: Vec<AssetError>,
}

impl TokenRender {
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// A cache-only preview and the targets it was missing.
#[derive(Debug, Clone)]
pub struct TokenPreview {
    pub token: Token,
    /// References not yet in the cache. Feed them to
    /// [`TokenGenerator::enqueue_targets`] to have them warmed.
    pub missing: Vec<FetchTarget>,
}

/// Pixel diameters for each token kind at the configured DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSizes {
    pub character: u32,
    pub reminder: u32,
    pub meta: u32,
}

impl TokenSizes {
    pub fn from_config(config: &TokenConfig) -> TokenResult<Self> {
        let render = &config.render;
        Ok(Self {
            character: token_diameter_px(render.character_diameter(), render.dpi)?,
            reminder: token_diameter_px(render.reminder_diameter(), render.dpi)?,
            meta: token_diameter_px(render.meta_diameter(), render.dpi)?,
        })
    }

    fn for_type(&self, token_type: TokenType) -> u32 {
        match token_type {
            TokenType::Character => self.character,
            TokenType::Reminder => self.reminder,
            TokenType::Meta => self.meta,
        }
    }
}

/// Where art is looked up during one token render.
#[derive(Clone, Copy)]
enum Fetch {
    /// Load through the loader, recording failures.
    Load,
    /// Cache only; misses become placeholders.
    CacheOnly,
}

/// Everything that varies between the three token kinds.
struct TokenJob<'a> {
    token_type: TokenType,
    background: &'a BackgroundStyle,
    icon_ref: &'a str,
    icon_type: AssetType,
    icon: &'a IconSettings,
    overlays: &'a [OverlayLayer],
    filename: String,
    team: Option<Team>,
    character: Option<String>,
}

#[derive(Default)]
struct JobOutcome {
    issues: Vec<AssetError>,
    missing: Vec<FetchTarget>,
}

/// Renders character, reminder and meta tokens.
pub struct TokenGenerator {
    loader: ImageLoader,
    resolver: AssetResolver,
    engine: CompositingEngine,
    sizes: TokenSizes,
    dpi: f64,
    preload: Mutex<PreloadQueue>,
    tick_budget: Duration,
}

impl TokenGenerator {
    /// Assemble a generator from explicitly constructed parts.
    ///
    /// The loader's cache is the one the generator reads and clears.
    pub fn new(
        loader: ImageLoader,
        resolver: AssetResolver,
        engine: CompositingEngine,
        config: &TokenConfig,
    ) -> TokenResult<Self> {
        config.validate()?;
        Ok(Self {
            loader,
            resolver,
            engine,
            sizes: TokenSizes::from_config(config)?,
            dpi: config.render.dpi,
            preload: Mutex::new(PreloadQueue::new(config.preload.capacity)),
            tick_budget: config.preload.tick_budget(),
        })
    }

    /// Build every part from configuration: HTTP client, proxy, synced
    /// store, cache and the bundled built-in catalog.
    ///
    /// User assets come from an empty in-memory library; use
    /// [`TokenGenerator::from_config_with_assets`] to attach a real one.
    pub async fn from_config(config: &TokenConfig) -> TokenResult<Self> {
        Self::from_config_with_assets(config, Arc::new(InMemoryAssetStore::new())).await
    }

    pub async fn from_config_with_assets(
        config: &TokenConfig,
        user_assets: Arc<dyn UserAssetStore>,
    ) -> TokenResult<Self> {
        config.validate()?;

        let client = HttpClient::builder()
            .timeout(config.assets.fetch_timeout())
            .build()?;
        let cache = ImageCache::shared(config.cache.to_cache_config());

        let mut builder = ImageLoader::builder()
            .cache(cache)
            .fetcher(Arc::new(client))
            .user_assets(user_assets)
            .static_root(&config.assets.static_root);
        if let Some(base) = &config.assets.proxy_base {
            builder = builder.proxy_base(base)?;
        }
        if let Some(dir) = &config.assets.synced_store_dir {
            builder = builder.synced_store(Arc::new(DiskSyncedStore::open(dir.clone()).await?));
        }

        tracing::info!(
            target: targets::PIPELINE,
            static_root = %config.assets.static_root.display(),
            proxy = config.assets.proxy_base.as_deref().unwrap_or("none"),
            dpi = config.render.dpi,
            "token generator ready"
        );

        Self::new(
            builder.build(),
            AssetResolver::bundled(),
            CompositingEngine::new(CompositorConfig::default()),
            config,
        )
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn cache(&self) -> &SharedImageCache {
        self.loader.cache()
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    pub fn engine(&self) -> &CompositingEngine {
        &self.engine
    }

    pub fn sizes(&self) -> TokenSizes {
        self.sizes
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    /// Render the character token for `character`.
    pub async fn render_character(
        &self,
        character: &Character,
        options: &TokenOptions,
    ) -> TokenResult<TokenRender> {
        let job = character_job(character, options);
        let mut outcome = JobOutcome::default();
        let token = self.render_job(job, Fetch::Load, &mut outcome).await?;
        Ok(finish(token, outcome))
    }

    /// Render one reminder token per reminder text of `character`.
    pub async fn render_reminders(
        &self,
        character: &Character,
        options: &TokenOptions,
    ) -> TokenResult<Vec<TokenRender>> {
        let mut renders = Vec::with_capacity(character.reminders.len());
        for (index, text) in character.reminders.iter().enumerate() {
            let job = TokenJob {
                token_type: TokenType::Reminder,
                background: &options.reminder_background,
                icon_ref: &character.image,
                icon_type: AssetType::CharacterIcon,
                icon: &options.reminder_icon,
                overlays: &[],
                filename: reminder_filename(&character.id, index + 1, text),
                team: Some(character.team),
                character: Some(character.id.clone()),
            };
            let mut outcome = JobOutcome::default();
            let token = self.render_job(job, Fetch::Load, &mut outcome).await?;
            renders.push(finish(token, outcome));
        }
        Ok(renders)
    }

    /// Render a meta token (script logo, info sheets).
    pub async fn render_meta(
        &self,
        name: &str,
        image_ref: &str,
        options: &TokenOptions,
    ) -> TokenResult<TokenRender> {
        let job = TokenJob {
            token_type: TokenType::Meta,
            background: &options.meta_background,
            icon_ref: image_ref,
            icon_type: AssetType::Logo,
            icon: &options.meta_icon,
            overlays: &[],
            filename: meta_filename(name),
            team: None,
            character: None,
        };
        let mut outcome = JobOutcome::default();
        let token = self.render_job(job, Fetch::Load, &mut outcome).await?;
        Ok(finish(token, outcome))
    }

    /// Render character and reminder tokens for a whole script.
    ///
    /// Characters render concurrently; identical art shared between them
    /// is fetched once.
    pub async fn render_all(
        &self,
        characters: &[Character],
        options: &TokenOptions,
    ) -> TokenResult<Vec<TokenRender>> {
        let per_character = join_all(characters.iter().map(|character| async move {
            let mut renders = vec![self.render_character(character, options).await?];
            renders.extend(self.render_reminders(character, options).await?);
            Ok::<_, TokenError>(renders)
        }))
        .await;

        let mut renders = Vec::new();
        for result in per_character {
            renders.extend(result?);
        }

        let degraded = renders.iter().filter(|r| r.is_degraded()).count();
        tracing::info!(
            target: targets::PIPELINE,
            characters = characters.len(),
            tokens = renders.len(),
            degraded,
            "rendered script"
        );
        Ok(renders)
    }

    /// Drop every cached bitmap, forget in-flight loads and render the
    /// script again from scratch.
    pub async fn regenerate_all(
        &self,
        characters: &[Character],
        options: &TokenOptions,
    ) -> TokenResult<Vec<TokenRender>> {
        let dropped = self.cache().lock().len();
        self.loader.clear_cache();
        tracing::info!(target: targets::PIPELINE, dropped, "cleared image cache for regeneration");
        self.render_all(characters, options).await
    }

    /// Render a character token from cached art only.
    ///
    /// Never waits on I/O. Art that is not cached yet is drawn as a
    /// placeholder and listed in [`TokenPreview::missing`].
    pub async fn preview_character(
        &self,
        character: &Character,
        options: &TokenOptions,
    ) -> TokenResult<TokenPreview> {
        let job = character_job(character, options);
        let mut outcome = JobOutcome::default();
        let token = self.render_job(job, Fetch::CacheOnly, &mut outcome).await?;
        Ok(TokenPreview {
            token,
            missing: outcome.missing,
        })
    }

    // ========================================================================
    // PRELOADING
    // ========================================================================

    /// Resolve references and queue them for background loading.
    ///
    /// Returns how many were queued; `none`, duplicates and overflow are
    /// not.
    pub async fn preload<'a, I>(&self, refs: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, AssetType)>,
    {
        let targets: Vec<FetchTarget> = refs
            .into_iter()
            .filter_map(|(value, asset_type)| self.resolver.resolve(value, asset_type))
            .collect();
        self.enqueue_targets(targets).await
    }

    /// Queue already resolved targets for background loading.
    pub async fn enqueue_targets<I>(&self, targets: I) -> usize
    where
        I: IntoIterator<Item = FetchTarget>,
    {
        self.preload.lock().await.extend(targets)
    }

    /// Drain the preload queue for at most `budget`, or the configured
    /// tick budget when `None`.
    pub async fn preload_tick(&self, budget: Option<Duration>) -> PreloadTick {
        let budget = budget.unwrap_or(self.tick_budget);
        self.preload.lock().await.tick(&self.loader, budget).await
    }

    /// Targets waiting in the preload queue.
    pub async fn preload_pending(&self) -> usize {
        self.preload.lock().await.len()
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    async fn render_job(
        &self,
        job: TokenJob<'_>,
        fetch: Fetch,
        outcome: &mut JobOutcome,
    ) -> TokenResult<Token> {
        let diameter = self.sizes.for_type(job.token_type);

        let slot = match job.background.source_type {
            SourceType::Styled => BackgroundSlot::Styled,
            SourceType::Image => {
                match self
                    .art(&job.background.image_url, AssetType::TokenBackground, fetch, outcome)
                    .await
                {
                    Art::Ready(bitmap) => BackgroundSlot::Ready(bitmap),
                    Art::Pending => BackgroundSlot::Pending,
                    Art::Failed | Art::Absent => BackgroundSlot::Failed,
                }
            }
        };
        let mut surface = self.engine.render(job.background, diameter, &slot)?;

        match self.art(job.icon_ref, job.icon_type, fetch, outcome).await {
            Art::Ready(icon) => {
                self.engine.place_icon(&mut surface, &icon, job.icon, self.dpi)?;
            }
            Art::Failed | Art::Pending => {
                let placeholder =
                    ImageBuffer::from_color(1, 1, self.engine.config().placeholder_color);
                self.engine.place_icon(&mut surface, &placeholder, job.icon, self.dpi)?;
            }
            Art::Absent => {}
        }

        for layer in job.overlays {
            self.engine.place_layer(
                &mut surface,
                &layer.image,
                layer.x,
                layer.y,
                layer.blend_mode,
                layer.opacity,
            );
        }

        tracing::debug!(
            target: targets::PIPELINE,
            filename = %job.filename,
            token_type = job.token_type.as_str(),
            diameter,
            issues = outcome.issues.len(),
            "rendered token"
        );
        Ok(into_token(surface, job))
    }

    async fn art(&self, value: &str, asset_type: AssetType, fetch: Fetch, outcome: &mut JobOutcome) -> Art {
        let Some(target) = self.resolver.resolve(value, asset_type) else {
            return Art::Absent;
        };

        match fetch {
            Fetch::Load => match self.loader.load(&target).await {
                Ok(bitmap) => Art::Ready(bitmap),
                Err(error) => {
                    tracing::warn!(
                        target: targets::PIPELINE,
                        reference = %target,
                        %error,
                        "using placeholder for unavailable art"
                    );
                    outcome.issues.push(error);
                    Art::Failed
                }
            },
            Fetch::CacheOnly => match self.loader.peek(&target) {
                Some(bitmap) => Art::Ready(bitmap),
                None => {
                    outcome.missing.push(target);
                    Art::Pending
                }
            },
        }
    }
}

impl std::fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("loader", &self.loader)
            .field("sizes", &self.sizes)
            .field("dpi", &self.dpi)
            .finish_non_exhaustive()
    }
}

enum Art {
    Ready(Bitmap),
    /// Not cached yet (previews only).
    Pending,
    Failed,
    /// The reference is `none` or empty.
    Absent,
}

fn character_job<'a>(character: &'a Character, options: &'a TokenOptions) -> TokenJob<'a> {
    TokenJob {
        token_type: TokenType::Character,
        background: &options.character_background,
        icon_ref: &character.image,
        icon_type: AssetType::CharacterIcon,
        icon: &options.character_icon,
        overlays: &options.character_overlays,
        filename: character_filename(&character.id),
        team: Some(character.team),
        character: Some(character.id.clone()),
    }
}

fn into_token(surface: TokenSurface, job: TokenJob<'_>) -> Token {
    Token {
        diameter: surface.diameter(),
        canvas: surface.into_canvas(),
        team: job.team,
        token_type: job.token_type,
        filename: job.filename,
        character: job.character,
    }
}

fn finish(token: Token, outcome: JobOutcome) -> TokenRender {
    TokenRender {
        token,
        issues: outcome.issues,
    }
}
