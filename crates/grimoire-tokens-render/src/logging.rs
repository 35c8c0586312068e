//! `tracing` targets for this crate's components.

/// Target names, one per component.
pub mod targets {
    /// Asset reference classification.
    pub const RESOLVER: &str = "grimoire_tokens_render::resolver";
    /// Image loading, proxy fallback and in-flight de-duplication.
    pub const LOADER: &str = "grimoire_tokens_render::loader";
    /// Cache insertions, evictions and rejections.
    pub const CACHE: &str = "grimoire_tokens_render::cache";
    /// Persistent synced character art.
    pub const SYNCED_STORE: &str = "grimoire_tokens_render::synced_store";
    /// Token background drawing, textures included.
    pub const COMPOSITOR: &str = "grimoire_tokens_render::compositor";
    /// Background cache warming.
    pub const PRELOAD: &str = "grimoire_tokens_render::preload";
}
