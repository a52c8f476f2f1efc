//! Softened all-pairs gravity
//!
//! Each particle is a [`Vertex`] so the simulation state can be handed to the
//! viewer as-is. Velocities live in a parallel array.

use datviz::Vertex;
use nalgebra::Vector3;
use rand::Rng;

/// Gravitational constant used by [`NBodySystem::step`]
pub const GRAVITY: f32 = 1.0e-9;

/// Squared distance below which a pair exerts no force
pub const SMOOTHING: f32 = 1.0e-3;

/// A cloud of mutually attracting particles
#[derive(Debug, Clone)]
pub struct NBodySystem {
    particles: Vec<Vertex>,
    velocities: Vec<Vector3<f32>>,
}

impl NBodySystem {
    /// Scatter `count` particles uniformly in the `[-1, 1]` cube, at rest,
    /// in random shades between yellow and dark orange.
    pub fn new<R: Rng>(count: usize, rng: &mut R) -> Self {
        let particles = (0..count)
            .map(|_| {
                let position = [
                    rng.gen_range(-1.0..=1.0),
                    rng.gen_range(-1.0..=1.0),
                    rng.gen_range(-1.0..=1.0),
                ];
                let color = [rng.gen_range(127..=255), rng.gen_range(127..=255), 0, 255];
                Vertex::new(position, color)
            })
            .collect();

        Self {
            particles,
            velocities: vec![Vector3::zeros(); count],
        }
    }

    /// Particles, ready for `Viewer::render_points`
    pub fn vertices(&self) -> &[Vertex] {
        &self.particles
    }

    /// Number of particles
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the system has no particles
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Velocity of particle `index`
    pub fn velocity(&self, index: usize) -> Option<Vector3<f32>> {
        self.velocities.get(index).copied()
    }

    /// Advance by `dt` with the default constants
    pub fn step(&mut self, dt: f32) {
        self.step_with(dt, GRAVITY, SMOOTHING);
    }

    /// Advance by `dt`.
    ///
    /// Forces are computed from the positions at the start of the step.
    /// Pairs closer than `smoothing` (squared distance) are skipped; the
    /// others pull with `1 / (d² + smoothing²)`.
    pub fn step_with(&mut self, dt: f32, gravity: f32, smoothing: f32) {
        let positions: Vec<Vector3<f32>> = self
            .particles
            .iter()
            .map(|particle| Vector3::from(particle.position))
            .collect();

        for (i, position) in positions.iter().enumerate() {
            let mut force = Vector3::zeros();

            for (j, other) in positions.iter().enumerate() {
                if i == j {
                    continue;
                }

                let delta = other - position;
                let distance_squared = delta.norm_squared();
                if distance_squared < smoothing {
                    continue;
                }

                force += delta.normalize() / (distance_squared + smoothing * smoothing);
            }

            let acceleration = force * gravity;
            let displacement = acceleration * (0.5 * dt * dt) + self.velocities[i] * dt;

            self.velocities[i] += acceleration * dt;
            self.particles[i].position = (position + displacement).into();
        }
    }
}
