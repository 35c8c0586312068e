//! Components log under the targets exported from `grimoire_tokens::logging`.

use std::io;
use std::sync::{Arc, Mutex};

use grimoire_tokens::logging::targets;
use grimoire_tokens::render::{AssetResolver, CompositingEngine, ImageLoader};
use grimoire_tokens::{Character, Color, ImageBuffer, Team, TokenConfig, TokenGenerator, TokenOptions};
use tracing_subscriber::EnvFilter;

/// Log sink shared with the test body.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_filtering_on_exported_targets() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "{}=debug,{}=info",
            targets::LOADER,
            targets::PIPELINE
        )))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("character-icons/imp.webp");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, ImageBuffer::from_color(8, 8, Color::WHITE).to_png().unwrap()).unwrap();

    let generator = TokenGenerator::new(
        ImageLoader::builder().static_root(root.path()).build(),
        AssetResolver::bundled(),
        CompositingEngine::default(),
        &TokenConfig::from_toml_str("[render]\ndpi = 40.0").unwrap(),
    )
    .unwrap();
    let script = vec![Character::new("imp", "Imp", Team::Demon).with_image("imp")];
    generator
        .regenerate_all(&script, &TokenOptions::default())
        .await
        .unwrap();

    let text = captured.text();
    assert!(text.contains(targets::LOADER), "{text}");
    assert!(text.contains(targets::PIPELINE), "{text}");
    // Filtered out: the cache logs its clear at debug.
    assert!(!text.contains(targets::CACHE), "{text}");
}
