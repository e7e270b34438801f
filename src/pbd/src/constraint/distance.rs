use tracing::{trace, warn};

use crate::constraint::{mass_split, rp, Constraint, ConstraintType, Projection, Resolution};
use crate::error::PbdError;
use crate::params::SolverParams;
use crate::particle::Particle;
use crate::particle_set::{ParticleId, ParticleSet};
use crate::V3;

/// Spring between two particles with separate stretch and compress
/// resistance.
#[derive(Clone, Debug)]
pub struct DistanceEqualityConstraint {
	p1: ParticleId,
	p2: ParticleId,
	d: f32,
	spring_dir: V3,
	spring_length: f32,
	state: Resolution,
}

impl DistanceEqualityConstraint {
	pub fn new(p1: ParticleId, p2: ParticleId, rest_length: f32) -> Self {
		Self {
			p1,
			p2,
			d: rest_length,
			spring_dir: V3::zeros(),
			spring_length: 0.0,
			state: Resolution::Pending,
		}
	}

	/// Rest length taken from the particles' current predictions.
	pub fn from_particles(
		particles: &ParticleSet,
		p1: ParticleId,
		p2: ParticleId,
	) -> Result<Self, PbdError> {
		if p1 == p2 {
			return Err(PbdError::SameParticle(p1));
		}
		let a = particles.get(p1).ok_or(PbdError::StaleParticle(p1))?;
		let b = particles.get(p2).ok_or(PbdError::StaleParticle(p2))?;
		Ok(Self::new(p1, p2, (a.p - b.p).norm()))
	}

	pub fn with_rest_length(mut self, d: f32) -> Self {
		self.d = d;
		self
	}

	pub fn build(self) -> Constraint {
		Constraint::Distance(self)
	}

	pub fn set_rest_length(&mut self, d: f32) {
		self.d = d;
	}

	pub fn rest_length(&self) -> f32 {
		self.d
	}

	pub fn spring_dir(&self) -> V3 {
		self.spring_dir
	}

	pub fn spring_length(&self) -> f32 {
		self.spring_length
	}

	fn corrections(&self, a: &Particle, b: &Particle, params: &SolverParams) -> Option<(V3, V3)> {
		let (k1, k2) = mass_split(a.w, b.w)?;
		let spring_dir = a.p - b.p;
		let spring_length = spring_dir.norm();
		if !spring_length.is_normal() {
			return None;
		}
		let c = spring_length - self.d;
		let resistance = params.distance_resistance(spring_length, self.d);
		let change_dir = spring_dir / spring_length;
		let dp1 = -k1 * c * change_dir * resistance;
		let dp2 = k2 * c * change_dir * resistance;
		Some((dp1, dp2))
	}
}

impl Projection for DistanceEqualityConstraint {
	fn ty(&self) -> ConstraintType {
		ConstraintType::Distance
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
		let a = particles.get(self.p1)?;
		let b = particles.get(self.p2)?;
		Some((a.p - b.p).norm() - self.d)
	}

	fn delta_p(&self, particles: &ParticleSet, params: &SolverParams) -> Option<V3> {
		let a = particles.get(self.p1)?;
		let b = particles.get(self.p2)?;
		self.corrections(a, b, params).map(|(dp1, _)| dp1)
	}

	fn project(&mut self, particles: &mut ParticleSet, params: &SolverParams) {
		if self.state == Resolution::Resolved {
			return;
		}
		let Some((a, b)) = particles.get2_mut(self.p1, self.p2) else {
			return;
		};
		self.spring_dir = a.p - b.p;
		self.spring_length = self.spring_dir.norm();
		if mass_split(a.w, b.w).is_none() {
			trace!("spring {:?}-{:?} between immovable particles", self.p1, self.p2);
			self.state = Resolution::Resolved;
			return;
		}
		let Some((dp1, dp2)) = self.corrections(a, b, params) else {
			warn!("bad spring length {} between {} and {}", self.spring_length, a.id, b.id);
			if !a.is_immovable() {
				a.p += rp();
			}
			if !b.is_immovable() {
				b.p += rp();
			}
			return;
		};
		a.p += dp1;
		b.p += dp2;
		self.state = Resolution::Resolved;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use approx::assert_abs_diff_eq;

	fn stretched(set: &mut ParticleSet) -> (ParticleId, ParticleId) {
		let a = set.insert(Particle::new(0, V3::zeros()));
		let b = set.insert(Particle::new(1, V3::new(0.0, 3.0, 0.0)));
		(a, b)
	}

	#[test]
	fn test_rigid_rod() {
		let mut set = ParticleSet::default();
		let (a, b) = stretched(&mut set);
		let mut c = DistanceEqualityConstraint::new(a, b, 1.0);
		assert_eq!(c.constraint_function(&set), Some(2.0));
		c.project(&mut set, &SolverParams::default());
		assert_abs_diff_eq!(set.get(a).unwrap().p, V3::new(0.0, 1.0, 0.0));
		assert_abs_diff_eq!(set.get(b).unwrap().p, V3::new(0.0, 2.0, 0.0));
		assert_abs_diff_eq!(c.constraint_function(&set).unwrap(), 0.0);
		assert_eq!(c.spring_length(), 3.0);
		assert_eq!(c.spring_dir(), V3::new(0.0, -3.0, 0.0));
	}

	#[test]
	fn test_stretch_and_compress_resistance() {
		let params = SolverParams::default().with_distance_resistance(0.5, 0.25);

		let mut set = ParticleSet::default();
		let (a, b) = stretched(&mut set);
		let mut c = DistanceEqualityConstraint::new(a, b, 1.0);
		c.project(&mut set, &params);
		assert_abs_diff_eq!(c.constraint_function(&set).unwrap(), 1.0, epsilon = 1e-6);

		let mut set = ParticleSet::default();
		let (a, b) = stretched(&mut set);
		let mut c = DistanceEqualityConstraint::new(a, b, 5.0);
		c.project(&mut set, &params);
		assert_abs_diff_eq!(c.constraint_function(&set).unwrap(), -1.5, epsilon = 1e-6);
	}

	#[test]
	fn test_mass_weighted_conservation() {
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::new(1.0, 0.0, 2.0)).with_mass(2.0));
		let b = set.insert(Particle::new(1, V3::new(-1.0, 0.5, 0.0)).with_mass(7.0));
		let before = (set.get(a).unwrap().p, set.get(b).unwrap().p);
		let mut c = DistanceEqualityConstraint::new(a, b, 0.5);
		c.project(&mut set, &SolverParams::default());
		let (pa, pb) = (set.get(a).unwrap(), set.get(b).unwrap());
		let momentum = pa.m * (pa.p - before.0) + pb.m * (pb.p - before.1);
		assert_abs_diff_eq!(momentum, V3::zeros(), epsilon = 1e-5);
	}

	#[test]
	fn test_dirty_and_fixed_end() {
		let mut set = ParticleSet::default();
		let (a, b) = stretched(&mut set);
		set.get_mut(a).unwrap().set_mass(0.0);
		let mut c = DistanceEqualityConstraint::from_particles(&set, a, b)
			.unwrap()
			.with_rest_length(2.0);
		let dp = c.delta_p(&set, &SolverParams::default()).unwrap();
		assert_eq!(dp, V3::zeros());
		c.project(&mut set, &SolverParams::default());
		assert_eq!(set.get(a).unwrap().p, V3::zeros());
		assert_abs_diff_eq!(set.get(b).unwrap().p, V3::new(0.0, 2.0, 0.0));

		set.get_mut(b).unwrap().p = V3::new(0.0, 9.0, 0.0);
		c.project(&mut set, &SolverParams::default());
		assert_eq!(set.get(b).unwrap().p, V3::new(0.0, 9.0, 0.0));
	}

	#[test]
	fn test_measured_rest_length() {
		let mut set = ParticleSet::default();
		let (a, b) = stretched(&mut set);
		let c = DistanceEqualityConstraint::from_particles(&set, a, b).unwrap();
		assert_eq!(c.rest_length(), 3.0);
		assert!(DistanceEqualityConstraint::from_particles(&set, a, a).is_err());
		assert_eq!(c.build().ty(), ConstraintType::Distance);
	}
}
