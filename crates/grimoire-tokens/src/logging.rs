//! `tracing` targets used across the workspace.
//!
//! The libraries never install a subscriber. Applications pick one and can
//! filter on these targets, for example
//! `RUST_LOG=grimoire_tokens_render::loader=debug,grimoire_tokens=info`.

/// Target names, one per component.
///
/// Render and network targets are defined next to the code that logs
/// under them and re-exported here.
pub mod targets {
    pub use grimoire_tokens_render::logging::targets::{
        CACHE, COMPOSITOR, LOADER, PRELOAD, RESOLVER, SYNCED_STORE,
    };

    /// HTTP downloads.
    pub const HTTP: &str = grimoire_tokens_net::LOG_TARGET;
    /// Configuration loading.
    pub const CONFIG: &str = "grimoire_tokens::config";
    /// Token generation.
    pub const PIPELINE: &str = "grimoire_tokens::pipeline";

    /// Every target above.
    pub const ALL: [&str; 9] = [
        RESOLVER,
        LOADER,
        CACHE,
        SYNCED_STORE,
        COMPOSITOR,
        PRELOAD,
        HTTP,
        CONFIG,
        PIPELINE,
    ];
}

#[cfg(test)]
mod tests {
    use super::targets;

    #[test]
    fn test_targets_are_module_paths() {
        for target in targets::ALL {
            let (crate_name, module) = target.split_once("::").unwrap();
            assert!(crate_name.starts_with("grimoire_tokens"), "{target}");
            assert!(!module.is_empty() && !module.contains(' '), "{target}");
        }
    }

    #[test]
    fn test_targets_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        assert!(targets::ALL.iter().all(|target| seen.insert(*target)));
    }
}
