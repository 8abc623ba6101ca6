//! Render orchestration
//!
//! Renders are looked up in the artifact cache first. Rasterization is CPU
//! bound and runs on the blocking pool.

use std::{fmt, path::Path, sync::Arc};

use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    cache::{ArtifactCache, GeneratedArtifact},
    cache_keys::{card_key, map_key},
    error::Error,
    model::{Chain, TokenAnalysis},
    render::{BubbleMapRenderer, CardRenderer},
};

use super::AnalysisStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Map,
    Card,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArtifactKind::Map => write!(f, "map"),
            ArtifactKind::Card => write!(f, "card"),
        }
    }
}

/// An analysis with the outcome of rendering its map. A failed render never
/// hides the analysis itself.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub analysis: TokenAnalysis,
    pub map: Option<GeneratedArtifact>,
    pub render_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Artifacts {
    cache: Arc<ArtifactCache>,
    bubble_map: BubbleMapRenderer,
    card: CardRenderer,
}

impl Artifacts {
    pub fn new(cache: Arc<ArtifactCache>, bubble_map: BubbleMapRenderer, card: CardRenderer) -> Self {
        Artifacts {
            cache,
            bubble_map,
            card,
        }
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    pub async fn render(
        &self,
        analysis: &TokenAnalysis,
        kind: ArtifactKind,
    ) -> Result<GeneratedArtifact, Error> {
        let key = match kind {
            ArtifactKind::Map => map_key(&analysis.address, analysis.chain, analysis.last_analysis),
            ArtifactKind::Card => card_key(analysis.chain, &analysis.address),
        };

        if let Some(artifact) = self.cache.get(&key) {
            debug!("Serving cached {} for {} on {}", kind, analysis.address, analysis.chain);
            return Ok(artifact);
        }

        let owned = analysis.clone();
        let artifact = match kind {
            ArtifactKind::Map => {
                let renderer = self.bubble_map.clone();
                spawn_blocking(move || renderer.render(&owned)).await??
            },
            ArtifactKind::Card => {
                let renderer = self.card.clone();
                spawn_blocking(move || renderer.render(&owned)).await??
            },
        };

        self.cache.set(&artifact.cache_key, artifact.clone());
        Ok(artifact)
    }

    /// Fetches the analysis through the store and renders its bubble map.
    pub async fn report(
        &self,
        store: &AnalysisStore,
        address: &str,
        chain: Chain,
    ) -> Result<RenderReport, Error> {
        let analysis = store.get_analysis(address, chain).await?;

        let report = match self.render(&analysis, ArtifactKind::Map).await {
            Ok(map) => RenderReport {
                analysis,
                map: Some(map),
                render_error: None,
            },
            Err(e) => {
                warn!(
                    "Failed to render map for {} on {}: {}",
                    analysis.address, analysis.chain, e
                );
                RenderReport {
                    analysis,
                    map: None,
                    render_error: Some(e.to_string()),
                }
            },
        };

        Ok(report)
    }

    /// Renders `kind` to `destination` and records the file as the token's
    /// latest screenshot.
    pub async fn export(
        &self,
        store: &AnalysisStore,
        analysis: &TokenAnalysis,
        kind: ArtifactKind,
        destination: &Path,
    ) -> Result<Url, Error> {
        let artifact = self.render(analysis, kind).await?;
        tokio::fs::write(destination, &artifact.bytes).await?;

        let absolute = tokio::fs::canonicalize(destination).await?;
        let url = Url::from_file_path(&absolute).map_err(|_| {
            Error::ValidationError(format!(
                "cannot express {} as a file URL",
                absolute.display()
            ))
        })?;

        store
            .update_screenshot(&analysis.address, analysis.chain, url.as_str())
            .await?;
        info!(
            "Wrote {} for {} on {} to {}",
            kind, analysis.address, analysis.chain, url
        );

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::{AnalysisRepository, MemoryRepository},
        handler::StoreSettings,
        render::{BubbleMapOptions, CardOptions, Rasterizer},
        test_support::{ts, ManualClock, ScriptedProvider, ADDRESS, PNG_MAGIC},
    };

    struct Fixture {
        repository: Arc<MemoryRepository>,
        clock: Arc<ManualClock>,
        store: AnalysisStore,
        artifacts: Artifacts,
    }

    fn fixture(options: BubbleMapOptions) -> Fixture {
        let repository = Arc::new(MemoryRepository::new());
        let clock = Arc::new(ManualClock::new(ts(0)));
        let store = AnalysisStore::new(
            repository.clone(),
            Arc::new(ScriptedProvider::new()),
            clock.clone(),
            StoreSettings::default(),
        );

        let rasterizer = Arc::new(Rasterizer::new());
        let artifacts = Artifacts::new(
            Arc::new(ArtifactCache::new(Duration::from_secs(60))),
            BubbleMapRenderer::new(options, rasterizer.clone()),
            CardRenderer::new(CardOptions::default(), rasterizer),
        );

        Fixture {
            repository,
            clock,
            store,
            artifacts,
        }
    }

    #[tokio::test]
    async fn second_render_is_served_from_cache() {
        let fixture = fixture(BubbleMapOptions::default());
        let analysis = fixture.store.get_analysis(ADDRESS, Chain::Eth).await.unwrap();

        let first = fixture.artifacts.render(&analysis, ArtifactKind::Map).await.unwrap();
        let second = fixture.artifacts.render(&analysis, ArtifactKind::Map).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.bytes[..8], PNG_MAGIC);
        let stats = fixture.artifacts.cache().stats();
        assert_eq!((stats.hits, stats.misses, stats.keys), (1, 1, 1));
    }

    #[tokio::test]
    async fn refreshed_analysis_gets_a_new_map_key() {
        let fixture = fixture(BubbleMapOptions::default());
        let before = fixture.store.get_analysis(ADDRESS, Chain::Eth).await.unwrap();
        let old = fixture.artifacts.render(&before, ArtifactKind::Map).await.unwrap();

        fixture.clock.set(ts(25));
        let after = fixture.store.get_analysis(ADDRESS, Chain::Eth).await.unwrap();
        let new = fixture.artifacts.render(&after, ArtifactKind::Map).await.unwrap();

        assert_ne!(old.cache_key, new.cache_key);
        assert_eq!(fixture.artifacts.cache().len(), 2);
    }

    #[tokio::test]
    async fn render_failure_is_reported_beside_the_analysis() {
        // a zero-sized canvas cannot be rasterized
        let options = BubbleMapOptions {
            width: 0,
            height: 0,
            ..BubbleMapOptions::default()
        };
        let fixture = fixture(options);

        let report = fixture
            .artifacts
            .report(&fixture.store, ADDRESS, Chain::Eth)
            .await
            .unwrap();

        assert_eq!(report.analysis.address, ADDRESS);
        assert!(report.map.is_none());
        assert!(report.render_error.is_some());
    }

    #[tokio::test]
    async fn report_includes_map_on_success() {
        let fixture = fixture(BubbleMapOptions::default());
        let report = fixture
            .artifacts
            .report(&fixture.store, ADDRESS, Chain::Eth)
            .await
            .unwrap();

        assert!(report.render_error.is_none());
        let map = report.map.unwrap();
        assert_eq!(
            map.cache_key,
            map_key(ADDRESS, Chain::Eth, report.analysis.last_analysis)
        );
    }

    #[tokio::test]
    async fn export_writes_file_and_records_screenshot() {
        let fixture = fixture(BubbleMapOptions::default());
        let analysis = fixture.store.get_analysis(ADDRESS, Chain::Eth).await.unwrap();

        let destination = std::env::temp_dir().join(format!(
            "holdermap-card-{}.png",
            std::process::id()
        ));
        let url = fixture
            .artifacts
            .export(&fixture.store, &analysis, ArtifactKind::Card, &destination)
            .await
            .unwrap();

        let written = tokio::fs::read(&destination).await.unwrap();
        assert_eq!(written[..8], PNG_MAGIC);
        assert_eq!(url.scheme(), "file");

        let stored = fixture
            .repository
            .find(ADDRESS, Chain::Eth)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.screenshot_url.as_deref(), Some(url.as_str()));
        assert_eq!(stored.screenshot_last_update, Some(ts(0)));

        tokio::fs::remove_file(&destination).await.unwrap();
    }
}
