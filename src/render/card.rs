use std::sync::Arc;

use tracing::debug;

use crate::{
    cache::GeneratedArtifact, cache_keys::card_key, error::Error, helpers::short_address,
    model::TokenAnalysis,
};

use super::{Rasterizer, SvgDocument, TextStyle};

const MARGIN: f64 = 20.0;
const BAR_Y: f64 = 80.0;
const BAR_HEIGHT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardOptions {
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub text: String,
    pub accent: String,
    pub muted: String,
    pub track: String,
    pub font_family: String,
}

impl Default for CardOptions {
    fn default() -> Self {
        CardOptions {
            width: 400,
            height: 300,
            background: String::from("#ffffff"),
            text: String::from("#000000"),
            accent: String::from("#0066ff"),
            muted: String::from("#666666"),
            track: String::from("#eeeeee"),
            font_family: String::from("Arial"),
        }
    }
}

/// Compact per-token summary: score bar, supply split and a footer.
#[derive(Debug, Clone)]
pub struct CardRenderer {
    options: CardOptions,
    rasterizer: Arc<Rasterizer>,
}

impl CardRenderer {
    pub fn new(options: CardOptions, rasterizer: Arc<Rasterizer>) -> Self {
        CardRenderer {
            options,
            rasterizer,
        }
    }

    pub fn render(&self, analysis: &TokenAnalysis) -> Result<GeneratedArtifact, Error> {
        let svg = self.render_svg(analysis);
        let bytes = self.rasterizer.rasterize(&svg, &self.options.font_family)?;
        debug!(
            "Rendered card for {} on {} ({} bytes)",
            analysis.address,
            analysis.chain,
            bytes.len()
        );

        Ok(GeneratedArtifact::png(
            bytes,
            card_key(analysis.chain, &analysis.address),
        ))
    }

    pub fn render_svg(&self, analysis: &TokenAnalysis) -> String {
        let options = &self.options;
        let (width, height) = (f64::from(options.width), f64::from(options.height));

        let mut svg = SvgDocument::new(options.width, options.height);
        svg.rect(0.0, 0.0, width, height, &options.background);

        let score = analysis.decentralization_score;
        let title = style(options, 24.0, true, &options.text);
        svg.text((MARGIN, 40.0), "Decentralization Score", &title);
        svg.text((MARGIN, 70.0), &format!("{:.2}%", score), &title);

        let bar_width = width - 2.0 * MARGIN;
        svg.rect(MARGIN, BAR_Y, bar_width, BAR_HEIGHT, &options.track);
        svg.rect(
            MARGIN,
            BAR_Y,
            bar_width * score.clamp(0.0, 100.0) / 100.0,
            BAR_HEIGHT,
            &options.accent,
        );

        let supply = &analysis.supply_distribution;
        let body = style(options, 18.0, false, &options.text);
        svg.text(
            (MARGIN, 130.0),
            &format!("{:.2}% in CEX", supply.percent_in_cex),
            &body,
        );
        svg.text(
            (MARGIN, 160.0),
            &format!("{:.2}% in Contracts", supply.percent_in_contracts),
            &body,
        );

        svg.text(
            (MARGIN, height - 30.0),
            &format!("{} • {}", analysis.chain, short_address(&analysis.address)),
            &style(options, 14.0, false, &options.muted),
        );
        svg.text(
            (width - 120.0, height - 20.0),
            "Powered by Bubblemaps",
            &style(options, 12.0, false, &options.muted),
        );

        svg.finish()
    }
}

fn style<'a>(options: &'a CardOptions, size: f64, bold: bool, fill: &'a str) -> TextStyle<'a> {
    TextStyle {
        font_family: &options.font_family,
        size,
        bold,
        anchor: "start",
        fill,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_analysis, ts, PNG_MAGIC};

    fn renderer() -> CardRenderer {
        CardRenderer::new(CardOptions::default(), Arc::new(Rasterizer::new()))
    }

    #[test]
    fn shows_score_and_supply_split() {
        let svg = renderer().render_svg(&sample_analysis(ts(0)));

        assert!(svg.contains(">42.00%<"));
        assert!(svg.contains(">12.00% in CEX<"));
        assert!(svg.contains(">30.00% in Contracts<"));
        assert!(svg.contains(">eth • 0xa0b8...eb48<"));
        assert!(svg.contains(">Powered by Bubblemaps<"));
    }

    #[test]
    fn progress_bar_tracks_score() {
        let mut analysis = sample_analysis(ts(0));
        analysis.decentralization_score = 50.0;
        let svg = renderer().render_svg(&analysis);

        assert!(svg.contains(
            r##"<rect x="20.00" y="80.00" width="360.00" height="10.00" fill="#eeeeee"/>"##
        ));
        assert!(svg.contains(
            r##"<rect x="20.00" y="80.00" width="180.00" height="10.00" fill="#0066ff"/>"##
        ));
    }

    #[test]
    fn card_key_ignores_refresh_time() {
        let renderer = renderer();
        let first = renderer.render(&sample_analysis(ts(0))).unwrap();
        let second = renderer.render(&sample_analysis(ts(48))).unwrap();

        assert_eq!(first.bytes[..8], PNG_MAGIC);
        assert_eq!(first.cache_key, second.cache_key);
        assert!(first.cache_key.starts_with("card:"));
    }
}
