use std::sync::Arc;

use tracing::debug;

use crate::{
    cache::GeneratedArtifact,
    cache_keys::map_key,
    error::Error,
    helpers::short_address,
    layout::{ForceLayout, LayoutConfig, LayoutGraph, LayoutNode, ScaleConfig},
    model::{Holder, TokenAnalysis},
};

use super::{Palette, Rasterizer, SvgDocument, TextStyle, BURN_ADDRESS, ZERO_ADDRESS};

const ARROW_OFFSET: f64 = 15.0;
const LABEL_OFFSET: f64 = 15.0;
const NODE_OUTLINE_WIDTH: f64 = 2.0;
const LEGEND_ITEM_HEIGHT: f64 = 25.0;
const LEGEND_SWATCH: f64 = 15.0;
const HEADER_LINE_HEIGHT: f64 = 25.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BubbleMapOptions {
    pub width: u32,
    pub height: u32,
    pub scale: ScaleConfig,
    pub layout: LayoutConfig,
    pub palette: Palette,
    pub font_family: String,
}

impl Default for BubbleMapOptions {
    fn default() -> Self {
        BubbleMapOptions {
            width: 1200,
            height: 800,
            scale: ScaleConfig::default(),
            layout: LayoutConfig::default(),
            palette: Palette::default(),
            font_family: String::from("Arial"),
        }
    }
}

/// Force-directed holder map
#[derive(Debug, Clone)]
pub struct BubbleMapRenderer {
    options: BubbleMapOptions,
    layout: ForceLayout,
    rasterizer: Arc<Rasterizer>,
}

impl BubbleMapRenderer {
    pub fn new(options: BubbleMapOptions, rasterizer: Arc<Rasterizer>) -> Self {
        BubbleMapRenderer {
            layout: ForceLayout::new(options.layout),
            options,
            rasterizer,
        }
    }

    /// Lays out the holder graph and rasterizes it. The artifact key follows
    /// `last_analysis`, so a refresh addresses a new image.
    pub fn render(&self, analysis: &TokenAnalysis) -> Result<GeneratedArtifact, Error> {
        let mut graph = LayoutGraph::from_analysis(analysis, &self.options.scale)?;
        self.layout.layout(
            &mut graph,
            f64::from(self.options.width),
            f64::from(self.options.height),
        )?;

        let svg = self.render_svg(analysis, &graph)?;
        let bytes = self.rasterizer.rasterize(&svg, &self.options.font_family)?;
        let key = map_key(&analysis.address, analysis.chain, analysis.last_analysis);

        debug!(
            "Rendered bubble map for {} on {} ({} nodes, {} bytes)",
            analysis.address,
            analysis.chain,
            graph.nodes.len(),
            bytes.len()
        );

        Ok(GeneratedArtifact::png(bytes, key))
    }

    /// Draws an already positioned graph, back to front.
    pub fn render_svg(&self, analysis: &TokenAnalysis, graph: &LayoutGraph) -> Result<String, Error> {
        let options = &self.options;
        let palette = &options.palette;

        let endpoints = graph
            .links
            .iter()
            .map(|link| {
                match (graph.nodes.get(link.source), graph.nodes.get(link.target)) {
                    (Some(source), Some(target)) => Ok((link, source, target)),
                    _ => Err(Error::RenderError(format!(
                        "link {} -> {} references a missing node",
                        link.source, link.target
                    ))),
                }
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut svg = SvgDocument::new(options.width, options.height);

        svg.open_group("background");
        svg.rect(
            0.0,
            0.0,
            f64::from(options.width),
            f64::from(options.height),
            &palette.background,
        );
        svg.close_group();

        svg.open_group("links");
        for (link, source, target) in &endpoints {
            svg.line(
                (source.x, source.y),
                (target.x, target.y),
                &palette.link,
                link.width,
            );
        }
        svg.close_group();

        svg.open_group("arrows");
        for (link, source, target) in &endpoints {
            if link.link.forward_amount > 0.0 {
                draw_arrow(&mut svg, source, target, &palette.link);
            }
            if link.link.backward_amount > 0.0 {
                draw_arrow(&mut svg, target, source, &palette.link);
            }
        }
        svg.close_group();

        let label_style = TextStyle {
            font_family: &options.font_family,
            size: 12.0,
            bold: false,
            anchor: "middle",
            fill: &palette.text,
        };
        svg.open_group("nodes");
        for node in &graph.nodes {
            svg.circle(
                (node.x, node.y),
                node.radius,
                node_color(&node.holder, palette),
                &palette.node_outline,
                NODE_OUTLINE_WIDTH,
            );
            svg.text(
                (node.x, node.y + node.radius + LABEL_OFFSET),
                &node_label(&node.holder),
                &label_style,
            );
        }
        svg.close_group();

        self.draw_legend(&mut svg);
        self.draw_header(&mut svg, analysis);

        Ok(svg.finish())
    }

    fn draw_legend(&self, svg: &mut SvgDocument) {
        let options = &self.options;
        let palette = &options.palette;
        let items = [
            (&palette.contract, "Contract"),
            (&palette.wallet, "Wallet"),
            (&palette.burn, "Burn Address"),
            (&palette.cex, "CEX"),
        ];
        let style = TextStyle {
            font_family: &options.font_family,
            size: 14.0,
            bold: false,
            anchor: "start",
            fill: &palette.text,
        };

        let x = 20.0;
        let top = f64::from(options.height) - 100.0;

        svg.open_group("legend");
        for (i, (color, label)) in items.iter().enumerate() {
            let y = top + i as f64 * LEGEND_ITEM_HEIGHT;
            svg.rect(x, y, LEGEND_SWATCH, LEGEND_SWATCH, color);
            svg.text((x + 25.0, y + 12.0), label, &style);
        }
        svg.close_group();
    }

    fn draw_header(&self, svg: &mut SvgDocument, analysis: &TokenAnalysis) {
        let style = TextStyle {
            font_family: &self.options.font_family,
            size: 16.0,
            bold: true,
            anchor: "start",
            fill: &self.options.palette.text,
        };
        let lines = [
            format!("{} ({})", analysis.name, analysis.symbol),
            format!("Chain: {}", analysis.chain.as_str().to_uppercase()),
            format!("Address: {}", analysis.address),
            format!(
                "Updated: {}",
                analysis.last_analysis.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        ];

        svg.open_group("header");
        for (i, line) in lines.iter().enumerate() {
            svg.text((20.0, 30.0 + i as f64 * HEADER_LINE_HEIGHT), line, &style);
        }
        svg.close_group();
    }
}

/// Tip sits on the segment just short of `to`, clear of its outline.
fn draw_arrow(svg: &mut SvgDocument, from: &LayoutNode, to: &LayoutNode, fill: &str) {
    let angle = (to.y - from.y).atan2(to.x - from.x);
    let offset = to.radius + ARROW_OFFSET;
    let tip = (to.x - offset * angle.cos(), to.y - offset * angle.sin());
    svg.arrow(tip, angle, fill);
}

pub(crate) fn node_color<'a>(holder: &Holder, palette: &'a Palette) -> &'a str {
    let address = holder.address.to_lowercase();
    if address == BURN_ADDRESS || address == ZERO_ADDRESS {
        &palette.burn
    } else if holder.is_contract {
        &palette.contract
    } else {
        &palette.wallet
    }
}

pub(crate) fn node_label(holder: &Holder) -> String {
    match &holder.name {
        Some(name) => name.to_owned(),
        None => short_address(&holder.address),
    }
}
