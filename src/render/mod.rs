//! Raster rendering
//!
//! Renderers emit an SVG document and rasterize it to PNG. Output is a pure
//! function of the analysis and the options; renderers keep no mutable state.

use std::{fmt::Display, sync::Arc};

use resvg::{tiny_skia, usvg};

use crate::error::Error;

pub use self::{
    bubble_map::{BubbleMapOptions, BubbleMapRenderer},
    card::{CardOptions, CardRenderer},
};

mod bubble_map;
mod card;

pub const BURN_ADDRESS: &str = "0x000000000000000000000000000000000000dead";
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub contract: String,
    pub wallet: String,
    pub burn: String,
    pub cex: String,
    pub link: String,
    pub background: String,
    pub text: String,
    pub node_outline: String,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            contract: String::from("#ff4444"),
            wallet: String::from("#4444ff"),
            burn: String::from("#000000"),
            cex: String::from("#44ff44"),
            link: String::from("#999999"),
            background: String::from("#ffffff"),
            text: String::from("#000000"),
            node_outline: String::from("#ffffff"),
        }
    }
}

/// Shared SVG to PNG converter. System fonts are loaded once and reused by
/// every render.
#[derive(Clone)]
pub struct Rasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl Rasterizer {
    pub fn new() -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        Rasterizer {
            fontdb: Arc::new(fontdb),
        }
    }

    pub fn font_count(&self) -> usize {
        self.fontdb.len()
    }

    pub fn rasterize(&self, svg: &str, font_family: &str) -> Result<Vec<u8>, Error> {
        let mut options = usvg::Options::default();
        options.font_family = font_family.to_owned();
        options.fontdb = self.fontdb.clone();

        let tree = usvg::Tree::from_str(svg, &options)
            .map_err(|e| Error::RenderError(format!("invalid SVG document: {}", e)))?;

        let size = tree.size().to_int_size();
        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or_else(|| {
            Error::RenderError(format!(
                "failed to allocate {}x{} surface",
                size.width(),
                size.height()
            ))
        })?;

        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        pixmap
            .encode_png()
            .map_err(|e| Error::RenderError(format!("failed to encode PNG: {}", e)))
    }
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("fonts", &self.font_count())
            .finish()
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal SVG writer. Coordinates are written with two decimals so equal
/// inputs give byte-identical documents.
pub(crate) struct SvgDocument {
    body: String,
    width: u32,
    height: u32,
}

impl SvgDocument {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        SvgDocument {
            body: String::new(),
            width,
            height,
        }
    }

    pub(crate) fn open_group(&mut self, id: &str) {
        self.body.push_str(&format!(r#"<g id="{}">"#, id));
    }

    pub(crate) fn close_group(&mut self) {
        self.body.push_str("</g>");
    }

    pub(crate) fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: &str) {
        self.body.push_str(&format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
            n(x),
            n(y),
            n(width),
            n(height),
            escape_xml(fill)
        ));
    }

    pub(crate) fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: &str, width: f64) {
        self.body.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}"/>"#,
            n(from.0),
            n(from.1),
            n(to.0),
            n(to.1),
            escape_xml(stroke),
            n(width)
        ));
    }

    /// Arrowhead with its tip at `at`, pointing along `angle` (radians).
    pub(crate) fn arrow(&mut self, at: (f64, f64), angle: f64, fill: &str) {
        self.body.push_str(&format!(
            r#"<polygon points="0,0 -10,5 -10,-5" transform="translate({} {}) rotate({})" fill="{}"/>"#,
            n(at.0),
            n(at.1),
            n(angle.to_degrees()),
            escape_xml(fill)
        ));
    }

    pub(crate) fn circle(
        &mut self,
        center: (f64, f64),
        radius: f64,
        fill: &str,
        stroke: &str,
        stroke_width: f64,
    ) {
        self.body.push_str(&format!(
            r#"<circle cx="{}" cy="{}" r="{}" fill="{}" stroke="{}" stroke-width="{}"/>"#,
            n(center.0),
            n(center.1),
            n(radius),
            escape_xml(fill),
            escape_xml(stroke),
            n(stroke_width)
        ));
    }

    pub(crate) fn text(&mut self, at: (f64, f64), content: &str, style: &TextStyle) {
        self.body.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="{}" font-size="{}" font-weight="{}" text-anchor="{}" fill="{}">{}</text>"#,
            n(at.0),
            n(at.1),
            escape_xml(style.font_family),
            n(style.size),
            if style.bold { "bold" } else { "normal" },
            style.anchor,
            escape_xml(style.fill),
            escape_xml(content)
        ));
    }

    pub(crate) fn finish(self) -> String {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">{body}</svg>"#,
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

pub(crate) struct TextStyle<'a> {
    pub font_family: &'a str,
    pub size: f64,
    pub bold: bool,
    pub anchor: &'static str,
    pub fill: &'a str,
}

fn n(value: f64) -> impl Display {
    let value = if value.is_finite() { value } else { 0.0 };
    // avoid "-0.00"
    let rounded = (value * 100.0).round() / 100.0;
    format!("{:.2}", if rounded == 0.0 { 0.0 } else { rounded })
}

/// Escapes markup and drops characters XML 1.0 does not allow, so provider
/// supplied names cannot break the document.
pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if is_xml_char(c) => escaped.push(c),
            _ => {},
        }
    }
    escaped
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r')
        || (c >= '\u{20}' && c != '\u{fffe}' && c != '\u{ffff}')
}
