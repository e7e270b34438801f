use tracing::{trace, warn};

use crate::constraint::{mass_split, rp, ConstraintType, Projection, Resolution};
use crate::error::PbdError;
use crate::params::SolverParams;
use crate::particle::Particle;
use crate::particle_set::{ParticleId, ParticleSet};
use crate::V3;

/// Penetration depth of two spheres, negative while they overlap.
fn penetration(a: &Particle, b: &Particle) -> f32 {
	(b.p - a.p).norm() - (a.r + b.r)
}

/// Contact vector taken from SDF gradients, when either particle carries a
/// gradient long enough to trust. The longer gradient wins, ties go to `b`.
pub(crate) fn sdf_collision_vector(a: &Particle, b: &Particle, threshold: f32) -> Option<V3> {
	let max_grad = a.collision_grad_len.max(b.collision_grad_len);
	if max_grad < threshold {
		return None;
	}
	if a.collision_grad_len > b.collision_grad_len {
		Some(-a.collision_vector * a.collision_grad_len)
	} else {
		Some(b.collision_vector * b.collision_grad_len)
	}
}

// trusted SDF data wins, otherwise the depth along `dir`, which must have a
// direction
fn contact_vector(a: &Particle, b: &Particle, dir: V3, params: &SolverParams) -> Option<V3> {
	if params.use_sdf_collision {
		if let Some(v) = sdf_collision_vector(a, b, params.sdf_gradient_threshold) {
			return Some(v);
		}
	}
	let n = dir.try_normalize(0.0)?;
	Some(penetration(a, b) * n)
}

fn nudge(a: &mut Particle, b: &mut Particle) {
	if !a.is_immovable() {
		a.p += rp();
	}
	if !b.is_immovable() {
		b.p += rp();
	}
}

/// Sphere-sphere contact between two particles.
#[derive(Clone, Debug)]
pub struct ParticleParticleConstraint {
	p1: ParticleId,
	p2: ParticleId,
	d: f32,
	state: Resolution,
}

impl ParticleParticleConstraint {
	pub fn new(particles: &ParticleSet, p1: ParticleId, p2: ParticleId) -> Result<Self, PbdError> {
		if p1 == p2 {
			return Err(PbdError::SameParticle(p1));
		}
		let a = particles.get(p1).ok_or(PbdError::StaleParticle(p1))?;
		let b = particles.get(p2).ok_or(PbdError::StaleParticle(p2))?;
		Ok(Self::with_distance(p1, p2, penetration(a, b)))
	}

	pub fn with_distance(p1: ParticleId, p2: ParticleId, d: f32) -> Self {
		Self {
			p1,
			p2,
			d,
			state: Resolution::Pending,
		}
	}

	pub fn distance(&self) -> f32 {
		self.d
	}

	fn corrections(a: &Particle, b: &Particle, params: &SolverParams) -> Option<(V3, V3)> {
		let (k1, k2) = mass_split(a.w, b.w)?;
		let collision_normal = contact_vector(a, b, b.p - a.p, params)?;
		Some((k1 * collision_normal, k2 * -collision_normal))
	}
}

impl Projection for ParticleParticleConstraint {
	fn ty(&self) -> ConstraintType {
		ConstraintType::ParticleParticle
	}

	fn particles(&self) -> Vec<ParticleId> {
		vec![self.p1, self.p2]
	}

	fn resolution(&self) -> Resolution {
		self.state
	}

	fn set_resolution(&mut self, resolution: Resolution) {
		self.state = resolution;
	}

	fn constraint_function(&self, particles: &ParticleSet) -> Option<f32> {
		Some(penetration(particles.get(self.p1)?, particles.get(self.p2)?))
	}

	fn delta_p(&self, particles: &ParticleSet, params: &SolverParams) -> Option<V3> {
		let a = particles.get(self.p1)?;
		let b = particles.get(self.p2)?;
		Self::corrections(a, b, params).map(|(da, _)| da)
	}

	fn project(&mut self, particles: &mut ParticleSet, params: &SolverParams) {
		if self.state == Resolution::Resolved {
			return;
		}
		let Some((a, b)) = particles.get2_mut(self.p1, self.p2) else {
			return;
		};
		if mass_split(a.w, b.w).is_none() {
			trace!("contact {:?}-{:?} between immovable particles", self.p1, self.p2);
			self.state = Resolution::Resolved;
			return;
		}
		self.d = penetration(a, b);
		let Some((da, db)) = Self::corrections(a, b, params) else {
			warn!("coincident particles {} and {}, perturbing", a.id, b.id);
			nudge(a, b);
			return;
		};
		a.p += da;
		b.p += db;
		self.state = Resolution::Resolved;
	}
}

/// Contact on pre-step positions. Projection is switched off: it resolves
/// nothing and leaves the flag pending, only [`delta_p`] reports what the
/// correction would be.
///
/// [`delta_p`]: Projection::delta_p
#[derive(Clone, Debug)]
pub struct ParticleParticlePreConditionConstraint {
	p1: ParticleId,
	p2: ParticleId,
	d: f32,
	state: Resolution,
}

impl ParticleParticlePreConditionConstraint {
	pub fn new(particles: &ParticleSet, p1: ParticleId, p2: ParticleId) -> Result<Self, PbdError> {
		if p1 == p2 {
			return Err(PbdError::SameParticle(p1));
		}
		let a = particles.get(p1).ok_or(PbdError::StaleParticle(p1))?;
		let b = particles.get(p2).ok_or(PbdError::StaleParticle(p2))?;
		Ok(Self {
			p1,
			p2,
			d: penetration(a, b),
			state: Resolution::Pending,
		})
	}

	pub fn distance(&self) -> f32 {
		self.d
	}
}

impl Projection for ParticleParticlePreConditionConstraint {
	fn ty(&self) -> ConstraintType {
		ConstraintType::ParticleParticlePre
	}

	fn particles(&self) -> Vec<ParticleId> {
		vec![self.p1, self.p2]
	}

	fn resolution(&self) -> Resolution {
		self.state
	}

	fn set_resolution(&mut self, resolution: Resolution) {
		self.state = resolution;
	}

	fn constraint_function(&self, particles: &ParticleSet) -> Option<f32> {
		Some(penetration(particles.get(self.p1)?, particles.get(self.p2)?))
	}

	// normal from the pre-step positions, depth from the predictions
	fn delta_p(&self, particles: &ParticleSet, params: &SolverParams) -> Option<V3> {
		let a = particles.get(self.p1)?;
		let b = particles.get(self.p2)?;
		let (k1, _) = mass_split(a.w, b.w)?;
		Some(k1 * contact_vector(a, b, b.x - a.x, params)?)
	}

	fn project(&mut self, _particles: &mut ParticleSet, _params: &SolverParams) {}
}
