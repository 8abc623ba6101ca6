//! Simulation forces. Every force reads positions and writes velocities,
//! except centering which translates positions directly.

use std::f64::consts::PI;

use super::{LayoutLink, LayoutNode};

const INITIAL_RADIUS: f64 = 10.0;

/// Seeded linear congruential generator; only ever used to break exact ties.
#[derive(Debug, Clone)]
pub(super) struct Lcg(u32);

impl Lcg {
    pub(super) fn new() -> Self {
        Lcg(1)
    }

    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.0 as f64 / 4_294_967_296.0
    }

    pub(super) fn jiggle(&mut self) -> f64 {
        (self.next() - 0.5) * 1e-6
    }
}

/// Phyllotaxis spiral around the origin, so identical inputs always start
/// from identical positions.
pub(super) fn initialize_positions(nodes: &mut [LayoutNode]) {
    let initial_angle = PI * (3.0 - 5.0_f64.sqrt());

    for (index, node) in nodes.iter_mut().enumerate() {
        let radius = INITIAL_RADIUS * (0.5 + index as f64).sqrt();
        let angle = index as f64 * initial_angle;
        node.x = radius * angle.cos();
        node.y = radius * angle.sin();
        node.vx = 0.0;
        node.vy = 0.0;
    }
}

pub(super) struct LinkForce {
    distance: f64,
    bias: Vec<f64>,
    strength: Vec<f64>,
}

impl LinkForce {
    pub(super) fn new(node_count: usize, links: &[LayoutLink], distance: f64) -> Self {
        let mut degree = vec![0_usize; node_count];
        for link in links {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }

        let bias = links
            .iter()
            .map(|link| {
                let source = degree[link.source] as f64;
                source / (source + degree[link.target] as f64)
            })
            .collect();
        let strength = links
            .iter()
            .map(|link| 1.0 / degree[link.source].min(degree[link.target]) as f64)
            .collect();

        LinkForce {
            distance,
            bias,
            strength,
        }
    }

    pub(super) fn apply(
        &self,
        nodes: &mut [LayoutNode],
        links: &[LayoutLink],
        alpha: f64,
        random: &mut Lcg,
    ) {
        for (index, link) in links.iter().enumerate() {
            if link.source == link.target {
                continue;
            }

            let (source, target) = (&nodes[link.source], &nodes[link.target]);
            let mut x = non_zero(target.x + target.vx - source.x - source.vx, random);
            let mut y = non_zero(target.y + target.vy - source.y - source.vy, random);

            let length = (x * x + y * y).sqrt();
            let l = (length - self.distance) / length * alpha * self.strength[index];
            x *= l;
            y *= l;

            let bias = self.bias[index];
            let target = &mut nodes[link.target];
            target.vx -= x * bias;
            target.vy -= y * bias;

            let source = &mut nodes[link.source];
            source.vx += x * (1.0 - bias);
            source.vy += y * (1.0 - bias);
        }
    }
}

/// Exact pairwise repulsion; the velocity change per pair scales with
/// `strength / distance`.
pub(super) fn apply_many_body(
    nodes: &mut [LayoutNode],
    strength: f64,
    alpha: f64,
    random: &mut Lcg,
) {
    for i in 0..nodes.len() {
        let (xi, yi) = (nodes[i].x, nodes[i].y);
        let (mut dvx, mut dvy) = (0.0, 0.0);

        for (j, other) in nodes.iter().enumerate() {
            if i == j {
                continue;
            }

            let mut x = other.x - xi;
            let mut y = other.y - yi;
            let mut l = x * x + y * y;
            if x == 0.0 {
                x = random.jiggle();
                l += x * x;
            }
            if y == 0.0 {
                y = random.jiggle();
                l += y * y;
            }
            if l < 1.0 {
                l = l.sqrt();
            }

            let w = strength * alpha / l;
            dvx += x * w;
            dvy += y * w;
        }

        nodes[i].vx += dvx;
        nodes[i].vy += dvy;
    }
}

pub(super) fn apply_center(nodes: &mut [LayoutNode], cx: f64, cy: f64) {
    if nodes.is_empty() {
        return;
    }

    let count = nodes.len() as f64;
    let sx = nodes.iter().map(|node| node.x).sum::<f64>() / count - cx;
    let sy = nodes.iter().map(|node| node.y).sum::<f64>() / count - cy;

    for node in nodes.iter_mut() {
        node.x -= sx;
        node.y -= sy;
    }
}

/// Separates overlapping pairs, judged on positions one step ahead. Each
/// node's collision radius is its drawn radius plus `padding`.
pub(super) fn apply_collide(nodes: &mut [LayoutNode], padding: f64, random: &mut Lcg) {
    for i in 0..nodes.len() {
        let ri = nodes[i].radius + padding;
        let ri2 = ri * ri;
        let xi = nodes[i].x + nodes[i].vx;
        let yi = nodes[i].y + nodes[i].vy;

        for j in (i + 1)..nodes.len() {
            let rj = nodes[j].radius + padding;
            let r = ri + rj;
            let mut x = xi - nodes[j].x - nodes[j].vx;
            let mut y = yi - nodes[j].y - nodes[j].vy;
            let mut l = x * x + y * y;
            if l >= r * r {
                continue;
            }

            if x == 0.0 {
                x = random.jiggle();
                l += x * x;
            }
            if y == 0.0 {
                y = random.jiggle();
                l += y * y;
            }

            let length = l.sqrt();
            let l = (r - length) / length;
            x *= l;
            y *= l;

            let rj2 = rj * rj;
            let share = rj2 / (ri2 + rj2);
            nodes[i].vx += x * share;
            nodes[i].vy += y * share;
            nodes[j].vx -= x * (1.0 - share);
            nodes[j].vy -= y * (1.0 - share);
        }
    }
}

fn non_zero(value: f64, random: &mut Lcg) -> f64 {
    if value == 0.0 {
        random.jiggle()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcg_sequence_is_fixed() {
        let mut a = Lcg::new();
        let mut b = Lcg::new();
        let first = (0..5).map(|_| a.jiggle()).collect::<Vec<_>>();
        let second = (0..5).map(|_| b.jiggle()).collect::<Vec<_>>();

        assert_eq!(first, second);
        assert!(first.iter().all(|value| value.abs() <= 0.5e-6));
    }
}
