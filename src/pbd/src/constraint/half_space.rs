use crate::constraint::{ConstraintType, Projection, Resolution};
use crate::params::SolverParams;
use crate::particle_set::{ParticleId, ParticleSet};
use crate::V3;

fn plane_distance(pos: &V3, qc: &V3, n: &V3) -> f32 {
	if pos == qc {
		return 0.0;
	}
	(pos - qc).dot(n)
}

/// Keeps a particle's prediction on the positive side of a plane.
#[derive(Clone, Debug)]
pub struct HalfSpaceConstraint {
	particle: ParticleId,
	qc: V3,
	n: V3,
	state: Resolution,
}

impl HalfSpaceConstraint {
	/// `n` is expected to be unit length.
	pub fn new(particle: ParticleId, qc: V3, n: V3) -> Self {
		Self {
			particle,
			qc,
			n,
			state: Resolution::Pending,
		}
	}

	pub fn point(&self) -> V3 {
		self.qc
	}

	pub fn normal(&self) -> V3 {
		self.n
	}

	pub fn evaluate(&self, pos: &V3) -> f32 {
		plane_distance(pos, &self.qc, &self.n)
	}
}

impl Projection for HalfSpaceConstraint {
	fn ty(&self) -> ConstraintType {
		ConstraintType::HalfSpace
	}

	fn particles(&self) -> Vec<ParticleId> {
		vec![self.particle]
	}

	fn resolution(&self) -> Resolution {
		self.state
	}

	fn set_resolution(&mut self, resolution: Resolution) {
		self.state = resolution;
	}

	fn constraint_function(&self, particles: &ParticleSet) -> Option<f32> {
		particles.get(self.particle).map(|p| self.evaluate(&p.p))
	}

	fn delta_p(&self, particles: &ParticleSet, _params: &SolverParams) -> Option<V3> {
		self.constraint_function(particles).map(|c| c * -self.n)
	}

	fn project(&mut self, particles: &mut ParticleSet, _params: &SolverParams) {
		let Some(p) = particles.get_mut(self.particle) else {
			return;
		};
		self.state = Resolution::Resolved;
		if p.is_immovable() {
			return;
		}
		let c = self.evaluate(&p.p);
		if c > 0.0 {
			return;
		}
		p.p += c * -self.n;
	}
}

/// Plane constraint on the pre-step position, moves `x` and `p` together.
#[derive(Clone, Debug)]
pub struct HalfSpacePreConditionConstraint {
	particle: ParticleId,
	qc: V3,
	n: V3,
	state: Resolution,
}

impl HalfSpacePreConditionConstraint {
	pub fn new(particle: ParticleId, qc: V3, n: V3) -> Self {
		Self {
			particle,
			qc,
			n,
			state: Resolution::Pending,
		}
	}
}

impl Projection for HalfSpacePreConditionConstraint {
	fn ty(&self) -> ConstraintType {
		ConstraintType::HalfSpacePre
	}

	fn particles(&self) -> Vec<ParticleId> {
		vec![self.particle]
	}

	fn resolution(&self) -> Resolution {
		self.state
	}

	fn set_resolution(&mut self, resolution: Resolution) {
		self.state = resolution;
	}

	fn constraint_function(&self, particles: &ParticleSet) -> Option<f32> {
		particles
			.get(self.particle)
			.map(|p| plane_distance(&p.x, &self.qc, &self.n))
	}

	fn delta_p(&self, particles: &ParticleSet, _params: &SolverParams) -> Option<V3> {
		self.constraint_function(particles).map(|c| c * -self.n)
	}

	// applied on both sides of the plane, only built for penetrating particles
	fn project(&mut self, particles: &mut ParticleSet, _params: &SolverParams) {
		let Some(p) = particles.get_mut(self.particle) else {
			return;
		};
		self.state = Resolution::Resolved;
		if p.is_immovable() {
			return;
		}
		let dp = plane_distance(&p.x, &self.qc, &self.n) * -self.n;
		p.x += dp;
		p.p += dp;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::particle::Particle;
	use approx::assert_abs_diff_eq;

	#[test]
	fn test_non_penetration() {
		let params = SolverParams::default();
		let n = V3::new(0.0, 1.0, 1.0).normalize();
		let starts = [
			V3::new(0.3, -2.0, 0.1),
			V3::new(-4.0, 0.5, -1.5),
			V3::new(1.0, 0.0, 0.0),
		];
		for start in starts {
			let mut set = ParticleSet::default();
			let a = set.insert(Particle::new(0, start));
			let mut c = HalfSpaceConstraint::new(a, V3::new(0.0, 0.2, 0.0), n);
			assert!(c.constraint_function(&set).unwrap() <= 0.0);
			c.project(&mut set, &params);
			assert_abs_diff_eq!(c.constraint_function(&set).unwrap(), 0.0, epsilon = 1e-5);
		}
	}

	#[test]
	fn test_legal_side_untouched() {
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::new(0.0, 3.0, 0.0)));
		let mut c = HalfSpaceConstraint::new(a, V3::zeros(), V3::y());
		c.project(&mut set, &SolverParams::default());
		assert_eq!(set.get(a).unwrap().p, V3::new(0.0, 3.0, 0.0));
	}

	#[test]
	fn test_immovable_untouched() {
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::new(0.0, -1.0, 0.0)).with_mass(f32::INFINITY));
		let mut c = HalfSpaceConstraint::new(a, V3::zeros(), V3::y());
		c.project(&mut set, &SolverParams::default());
		assert_eq!(set.get(a).unwrap().p, V3::new(0.0, -1.0, 0.0));
	}

	#[test]
	fn test_pre_condition_moves_both() {
		let mut set = ParticleSet::default();
		let mut particle = Particle::new(0, V3::new(1.0, -0.25, 0.0));
		particle.p = V3::new(1.5, -1.0, 0.0);
		let a = set.insert(particle);
		let mut c = HalfSpacePreConditionConstraint::new(a, V3::zeros(), V3::y());
		let dp = c.delta_p(&set, &SolverParams::default()).unwrap();
		assert_abs_diff_eq!(dp, V3::new(0.0, 0.25, 0.0));
		c.project(&mut set, &SolverParams::default());
		let p = set.get(a).unwrap();
		assert_abs_diff_eq!(p.x, V3::new(1.0, 0.0, 0.0));
		assert_abs_diff_eq!(p.p, V3::new(1.5, -0.75, 0.0));
	}
}
