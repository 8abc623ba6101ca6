/// Linear maps from holder metrics to drawing sizes. Inputs outside the
/// domain are clamped, so outputs always stay inside the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleConfig {
    pub min_node_size: f64,
    pub max_node_size: f64,
    pub percentage_domain: (f64, f64),
    pub min_link_width: f64,
    pub max_link_width: f64,
    pub flow_domain: (f64, f64),
}

impl Default for ScaleConfig {
    fn default() -> Self {
        ScaleConfig {
            min_node_size: 10.0,
            max_node_size: 50.0,
            percentage_domain: (0.0, 100.0),
            min_link_width: 1.0,
            max_link_width: 8.0,
            flow_domain: (0.0, 1000.0),
        }
    }
}

impl ScaleConfig {
    pub fn node_radius(&self, percentage: f64) -> f64 {
        linear(
            percentage,
            self.percentage_domain,
            (self.min_node_size, self.max_node_size),
        )
    }

    pub fn link_width(&self, total_flow: f64) -> f64 {
        linear(
            total_flow,
            self.flow_domain,
            (self.min_link_width, self.max_link_width),
        )
    }
}

fn linear(value: f64, (d0, d1): (f64, f64), (r0, r1): (f64, f64)) -> f64 {
    if value.is_nan() || d1 <= d0 {
        return r0;
    }

    let t = ((value - d0) / (d1 - d0)).clamp(0.0, 1.0);
    r0 + (r1 - r0) * t
}
