use crate::config::ConfigError;

pub type NodeId = u64;

pub const MAX_VELOCITY: f32 = 15.0;
pub const DAMPING: f32 = 0.99;

/// One moving body in the force field. Owned exclusively by the field's node
/// table; outside code refers to it by id.
#[derive(Clone, Debug)]
pub struct PhysicsNode {
    pub id: NodeId,
    pub layer: String,
    pub px: f32,
    pub py: f32,
    pub vx: f32,
    pub vy: f32,
    pub mass: f32,
    pub radius: f32,
}

impl PhysicsNode {
    pub fn new(
        id: NodeId,
        layer: impl Into<String>,
        px: f32,
        py: f32,
        mass: f32,
        radius: f32,
    ) -> Result<Self, ConfigError> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(ConfigError::InvalidMass { id, mass });
        }
        Ok(Self {
            id,
            layer: layer.into(),
            px,
            py,
            vx: 0.0,
            vy: 0.0,
            mass,
            radius,
        })
    }

    /// Accumulated force -> velocity, then damping, then per-component clamp.
    pub fn apply_force(&mut self, fx: f32, fy: f32) {
        self.vx += fx / self.mass;
        self.vy += fy / self.mass;
        self.vx *= DAMPING;
        self.vy *= DAMPING;
        self.vx = self.vx.clamp(-MAX_VELOCITY, MAX_VELOCITY);
        self.vy = self.vy.clamp(-MAX_VELOCITY, MAX_VELOCITY);
    }

    pub fn apply_velocity(&mut self, dt: f32) {
        self.px += self.vx * dt;
        self.py += self.vy * dt;
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::{PhysicsNode, MAX_VELOCITY};

    #[test]
    fn zero_mass_rejected() {
        assert!(PhysicsNode::new(0, "kick", 0.0, 0.0, 0.0, 50.0).is_err());
        assert!(PhysicsNode::new(0, "kick", 0.0, 0.0, -1.0, 50.0).is_err());
        assert!(PhysicsNode::new(0, "kick", 0.0, 0.0, f32::NAN, 50.0).is_err());
    }

    #[test]
    fn velocity_clamped() {
        let mut n = PhysicsNode::new(0, "kick", 0.0, 0.0, 1.0, 50.0).unwrap();
        n.apply_force(1e6, -1e6);
        assert_eq!(n.vx, MAX_VELOCITY);
        assert_eq!(n.vy, -MAX_VELOCITY);
    }
}
