use std::collections::BTreeMap;

use tracing::warn;

use crate::config::ConfigError;
use crate::sim::node::{NodeId, PhysicsNode};

pub const ATTRACTIVE_FORCE_CONST: f32 = 3000.0;
pub const MAX_ATTRACTIVE_FORCE: f32 = 80.0;
/// Only exact coincidence is excluded from the pairwise force. Kept at the
/// literal zero of the reference behavior; raise only if force spikes at very
/// small separations turn out to matter in practice.
pub const MIN_DIST_SQ: f32 = 0.0;

/// N-body attraction inside a reflecting rectangular boundary. O(n²) per
/// update, which is fine at the ~10 node counts this runs at.
pub struct ForceField {
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
    nodes: BTreeMap<NodeId, PhysicsNode>,
}

impl ForceField {
    pub fn new(origin_x: f32, origin_y: f32, width: f32, height: f32) -> Result<Self, ConfigError> {
        if !(width > 0.0 && height > 0.0) {
            return Err(ConfigError::InvalidFieldExtent { width, height });
        }
        Ok(Self {
            origin_x,
            origin_y,
            width,
            height,
            nodes: BTreeMap::new(),
        })
    }

    pub fn add_node(&mut self, node: PhysicsNode) {
        self.nodes.insert(node.id, node);
    }

    /// Returns false (and logs) when the id is unknown; never fatal.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if self.nodes.remove(&id).is_none() {
            warn!(id, "remove_node: no such node in the field");
            return false;
        }
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&PhysicsNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PhysicsNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// One simulation step: a full force/velocity pass over all nodes using
    /// this tick's positions, then a position pass with boundary reflection.
    pub fn update(&mut self, dt: f32) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in &ids {
            let (fx, fy) = self.force_on(*id);
            if let Some(node) = self.nodes.get_mut(id) {
                node.apply_force(fx, fy);
            }
        }
        for node in self.nodes.values_mut() {
            node.apply_velocity(dt);
            Self::reflect(
                node,
                self.origin_x,
                self.origin_y,
                self.width,
                self.height,
            );
        }
    }

    /// Pairwise attraction toward every other node, magnitude
    /// min(K/d², F_max), direction along the separation vector.
    pub fn force_on(&self, id: NodeId) -> (f32, f32) {
        let Some(node) = self.nodes.get(&id) else {
            return (0.0, 0.0);
        };
        let mut fx = 0.0;
        let mut fy = 0.0;
        for other in self.nodes.values() {
            if other.id == id {
                continue;
            }
            let dx = other.px - node.px;
            let dy = other.py - node.py;
            let dist_sq = dx * dx + dy * dy;
            if dist_sq <= MIN_DIST_SQ {
                continue;
            }
            let dist = dist_sq.sqrt();
            let attraction = (ATTRACTIVE_FORCE_CONST / dist_sq).min(MAX_ATTRACTIVE_FORCE);
            fx += attraction * dx / dist;
            fy += attraction * dy / dist;
        }
        (fx, fy)
    }

    fn reflect(node: &mut PhysicsNode, ox: f32, oy: f32, width: f32, height: f32) {
        if node.px < ox {
            node.px = ox;
            node.vx = -node.vx;
        }
        if node.px > ox + width {
            node.px = ox + width;
            node.vx = -node.vx;
        }
        if node.py < oy {
            node.py = oy;
            node.vy = -node.vy;
        }
        if node.py > oy + height {
            node.py = oy + height;
            node.vy = -node.vy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_with(nodes: &[(NodeId, f32, f32)]) -> ForceField {
        let mut field = ForceField::new(0.0, 0.0, 960.0, 960.0).unwrap();
        for &(id, x, y) in nodes {
            field.add_node(PhysicsNode::new(id, "layer", x, y, 10.0, 50.0).unwrap());
        }
        field
    }

    #[test]
    fn attraction_magnitude_is_capped_inverse_square() {
        let field = field_with(&[(0, 100.0, 100.0), (1, 100.0, 200.0)]);
        let (fx, fy) = field.force_on(0);
        assert_eq!(fx, 0.0);
        let expected = (ATTRACTIVE_FORCE_CONST / (100.0 * 100.0)).min(MAX_ATTRACTIVE_FORCE);
        assert!((fy - expected).abs() < 1e-5);

        // Close pair hits the cap.
        let field = field_with(&[(0, 100.0, 100.0), (1, 100.0, 101.0)]);
        let (_, fy) = field.force_on(0);
        assert_eq!(fy, MAX_ATTRACTIVE_FORCE);
    }

    #[test]
    fn attraction_decreases_with_distance() {
        let mut last = f32::MAX;
        for d in [10.0_f32, 20.0, 40.0, 80.0, 160.0, 320.0] {
            let field = field_with(&[(0, 0.0, 0.0), (1, d, 0.0)]);
            let (fx, _) = field.force_on(0);
            assert!(fx > 0.0);
            assert!(fx <= last, "force must not grow with distance");
            last = fx;
        }
    }

    #[test]
    fn coincident_nodes_contribute_no_force() {
        let field = field_with(&[(0, 50.0, 50.0), (1, 50.0, 50.0)]);
        assert_eq!(field.force_on(0), (0.0, 0.0));
    }

    #[test]
    fn remove_missing_node_is_nonfatal() {
        let mut field = field_with(&[(0, 10.0, 10.0)]);
        assert!(!field.remove_node(99));
        assert!(field.remove_node(0));
        assert!(field.is_empty());
    }

    #[test]
    fn positions_stay_inside_after_update() {
        let mut field = field_with(&[(0, 1.0, 1.0), (1, 2.0, 1.0), (2, 959.0, 959.0)]);
        for _ in 0..500 {
            field.update(5.0);
            for node in field.nodes() {
                assert!(node.px >= 0.0 && node.px <= 960.0, "px={}", node.px);
                assert!(node.py >= 0.0 && node.py <= 960.0, "py={}", node.py);
            }
        }
    }
}
