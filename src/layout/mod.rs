//! Force-directed placement of holder graphs
//!
//! A `LayoutGraph` is built fresh from a `TokenAnalysis` for every render and
//! dropped afterwards. `ForceLayout` holds only configuration, so one value can
//! lay out any number of graphs concurrently.

use std::collections::HashMap;

use crate::{
    error::Error,
    model::{Holder, HolderLink, TokenAnalysis},
};

pub use self::scale::ScaleConfig;

mod forces;
mod scale;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub holder: Holder,
    pub radius: f64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

/// A holder link with both endpoints resolved to node indices.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLink {
    pub link: HolderLink,
    pub source: usize,
    pub target: usize,
    pub width: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutGraph {
    pub nodes: Vec<LayoutNode>,
    pub links: Vec<LayoutLink>,
}

impl LayoutGraph {
    /// Resolves every link endpoint by address. A link naming an address that
    /// is not among the holders is a malformed graph.
    pub fn from_analysis(
        analysis: &TokenAnalysis,
        scale: &ScaleConfig,
    ) -> Result<LayoutGraph, Error> {
        let index = analysis
            .holders
            .iter()
            .enumerate()
            .map(|(i, holder)| (holder.address.as_str(), i))
            .collect::<HashMap<_, _>>();

        let resolve = |address: &str| {
            index.get(address).copied().ok_or_else(|| {
                Error::ValidationError(format!(
                    "holder link references unknown holder {}",
                    address
                ))
            })
        };

        let links = analysis
            .holder_links
            .iter()
            .map(|link| {
                Ok((
                    resolve(&link.source_address)?,
                    resolve(&link.target_address)?,
                    link.clone(),
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(LayoutGraph::new(analysis.holders.clone(), links, scale))
    }

    pub fn new(
        holders: Vec<Holder>,
        links: Vec<(usize, usize, HolderLink)>,
        scale: &ScaleConfig,
    ) -> LayoutGraph {
        let nodes = holders
            .into_iter()
            .map(|holder| LayoutNode {
                radius: scale.node_radius(holder.percentage),
                holder,
                x: 0.0,
                y: 0.0,
                vx: 0.0,
                vy: 0.0,
            })
            .collect();

        let links = links
            .into_iter()
            .map(|(source, target, link)| LayoutLink {
                width: scale.link_width(link.total_flow()),
                link,
                source,
                target,
            })
            .collect();

        LayoutGraph { nodes, links }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub link_distance: f64,
    pub charge_strength: f64,
    pub collision_padding: f64,
    pub iterations: usize,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f64,
    /// Alpha reached after `iterations` ticks.
    pub alpha_min: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            link_distance: 100.0,
            charge_strength: -400.0,
            collision_padding: 5.0,
            iterations: 300,
            velocity_decay: 0.4,
            alpha_min: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForceLayout {
    pub config: LayoutConfig,
}

impl ForceLayout {
    pub fn new(config: LayoutConfig) -> Self {
        ForceLayout { config }
    }

    /// Runs exactly `iterations` ticks and writes the final positions back
    /// onto `graph`. Identical graphs and canvases yield identical positions.
    pub fn layout(&self, graph: &mut LayoutGraph, width: f64, height: f64) -> Result<(), Error> {
        let node_count = graph.nodes.len();
        if let Some(link) = graph
            .links
            .iter()
            .find(|link| link.source >= node_count || link.target >= node_count)
        {
            return Err(Error::RenderError(format!(
                "link {} -> {} references a missing node",
                link.source, link.target
            )));
        }

        let config = &self.config;
        let iterations = config.iterations.max(1);
        let alpha_decay = 1.0 - config.alpha_min.powf(1.0 / iterations as f64);
        let velocity_keep = 1.0 - config.velocity_decay;
        let (cx, cy) = (width / 2.0, height / 2.0);

        let mut random = forces::Lcg::new();
        let link_force = forces::LinkForce::new(node_count, &graph.links, config.link_distance);
        forces::initialize_positions(&mut graph.nodes);

        let mut alpha = 1.0;
        for _ in 0..config.iterations {
            alpha += (0.0 - alpha) * alpha_decay;

            link_force.apply(&mut graph.nodes, &graph.links, alpha, &mut random);
            forces::apply_many_body(&mut graph.nodes, config.charge_strength, alpha, &mut random);
            forces::apply_center(&mut graph.nodes, cx, cy);
            forces::apply_collide(&mut graph.nodes, config.collision_padding, &mut random);

            for node in graph.nodes.iter_mut() {
                node.vx *= velocity_keep;
                node.vy *= velocity_keep;
                node.x += node.vx;
                node.y += node.vy;
            }
        }

        Ok(())
    }
}
