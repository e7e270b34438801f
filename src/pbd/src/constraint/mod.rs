pub mod distance;
pub mod friction;
pub mod half_space;
pub mod particle_list;
pub mod particle_particle;
pub mod pin;
pub mod shape_matching;

use rand::Rng;

use crate::params::SolverParams;
use crate::particle_set::{ParticleId, ParticleSet};
use crate::V3;
use protocol::pr_model::PrConstraint;

use distance::DistanceEqualityConstraint;
use friction::{FrictionConstraint, HalfSpaceFrictionConstraint};
use half_space::{HalfSpaceConstraint, HalfSpacePreConditionConstraint};
use particle_particle::{
	ParticleParticleConstraint, ParticleParticlePreConditionConstraint,
};
use pin::{PinConstraint, PinTogetherConstraint};
use shape_matching::ShapeMatchingConstraint;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConstraintType {
	#[default]
	None,
	HalfSpace,
	HalfSpacePre,
	Pin,
	PinTogether,
	ParticleParticle,
	ParticleParticlePre,
	Distance,
	ShapeMatch,
	ShapeMatchRigid,
	Friction,
	FrictionHalfSpace,
}

impl ConstraintType {
	pub fn name(&self) -> &'static str {
		use ConstraintType::*;
		match self {
			None => "none",
			HalfSpace => "half_space",
			HalfSpacePre => "half_space_pre",
			Pin => "pin",
			PinTogether => "pin_together",
			ParticleParticle => "particle_particle",
			ParticleParticlePre => "particle_particle_pre",
			Distance => "distance",
			ShapeMatch => "shape_match",
			ShapeMatchRigid => "shape_match_rigid",
			Friction => "friction",
			FrictionHalfSpace => "friction_half_space",
		}
	}

	/// Kinds that act on the pre-step position `x` as well as `p`.
	pub fn is_pre_condition(&self) -> bool {
		matches!(
			self,
			ConstraintType::HalfSpacePre | ConstraintType::ParticleParticlePre
		)
	}
}

/// Dirty flag of a constraint within one substep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Resolution {
	#[default]
	Pending,
	Resolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub(crate) u64);

impl ConstraintId {
	pub fn raw(&self) -> u64 {
		self.0
	}
}

/// Shared contract of every constraint kind.
///
/// `project` mutates particle state in place and never fails: a particle
/// that no longer exists or a correction that is undefined is skipped.
pub trait Projection {
	fn ty(&self) -> ConstraintType;

	fn particles(&self) -> Vec<ParticleId>;

	fn resolution(&self) -> Resolution;

	fn set_resolution(&mut self, resolution: Resolution);

	/// Scalar violation, `None` when a particle is gone.
	fn constraint_function(&self, particles: &ParticleSet) -> Option<f32>;

	/// Correction `project` would apply to the first particle, if the kind
	/// has a single one.
	fn delta_p(&self, particles: &ParticleSet, params: &SolverParams) -> Option<V3>;

	fn project(&mut self, particles: &mut ParticleSet, params: &SolverParams);

	fn is_dirty(&self) -> bool {
		self.resolution() == Resolution::Pending
	}

	fn set_dirty(&mut self, dirty: bool) {
		self.set_resolution(if dirty {
			Resolution::Pending
		} else {
			Resolution::Resolved
		});
	}
}

#[derive(Clone, Debug)]
pub enum Constraint {
	HalfSpace(HalfSpaceConstraint),
	HalfSpacePre(HalfSpacePreConditionConstraint),
	Pin(PinConstraint),
	PinTogether(PinTogetherConstraint),
	ParticleParticle(ParticleParticleConstraint),
	ParticleParticlePre(ParticleParticlePreConditionConstraint),
	Distance(DistanceEqualityConstraint),
	ShapeMatching(ShapeMatchingConstraint),
	Friction(FrictionConstraint),
	HalfSpaceFriction(HalfSpaceFrictionConstraint),
}

macro_rules! dispatch {
	($self:expr, $c:ident => $body:expr) => {
		match $self {
			Constraint::HalfSpace($c) => $body,
			Constraint::HalfSpacePre($c) => $body,
			Constraint::Pin($c) => $body,
			Constraint::PinTogether($c) => $body,
			Constraint::ParticleParticle($c) => $body,
			Constraint::ParticleParticlePre($c) => $body,
			Constraint::Distance($c) => $body,
			Constraint::ShapeMatching($c) => $body,
			Constraint::Friction($c) => $body,
			Constraint::HalfSpaceFriction($c) => $body,
		}
	};
}

macro_rules! impl_from {
	($($variant:ident($ty:ty)),* $(,)?) => {
		$(impl From<$ty> for Constraint {
			fn from(c: $ty) -> Self {
				Constraint::$variant(c)
			}
		})*
	};
}

impl_from!(
	HalfSpace(HalfSpaceConstraint),
	HalfSpacePre(HalfSpacePreConditionConstraint),
	Pin(PinConstraint),
	PinTogether(PinTogetherConstraint),
	ParticleParticle(ParticleParticleConstraint),
	ParticleParticlePre(ParticleParticlePreConditionConstraint),
	Distance(DistanceEqualityConstraint),
	ShapeMatching(ShapeMatchingConstraint),
	Friction(FrictionConstraint),
	HalfSpaceFriction(HalfSpaceFrictionConstraint),
);

impl Projection for Constraint {
	fn ty(&self) -> ConstraintType {
		dispatch!(self, c => c.ty())
	}

	fn particles(&self) -> Vec<ParticleId> {
		dispatch!(self, c => c.particles())
	}

	fn resolution(&self) -> Resolution {
		dispatch!(self, c => c.resolution())
	}

	fn set_resolution(&mut self, resolution: Resolution) {
		dispatch!(self, c => c.set_resolution(resolution))
	}

	fn constraint_function(&self, particles: &ParticleSet) -> Option<f32> {
		dispatch!(self, c => c.constraint_function(particles))
	}

	fn delta_p(&self, particles: &ParticleSet, params: &SolverParams) -> Option<V3> {
		dispatch!(self, c => c.delta_p(particles, params))
	}

	fn project(&mut self, particles: &mut ParticleSet, params: &SolverParams) {
		dispatch!(self, c => c.project(particles, params))
	}
}

impl Constraint {
	pub fn render(&self, id: ConstraintId, particles: &ParticleSet) -> PrConstraint {
		PrConstraint {
			id: id.raw(),
			ty: self.ty().name(),
			particles: self
				.particles()
				.into_iter()
				.filter_map(|pid| particles.get(pid).map(|p| p.id))
				.collect(),
		}
	}
}

/// Inverse-mass shares of a pairwise correction, `None` when both
/// particles are immovable.
pub(crate) fn mass_split(w1: f32, w2: f32) -> Option<(f32, f32)> {
	let w = w1 + w2;
	if w == 0.0 {
		return None;
	}
	Some((w1 / w, w2 / w))
}

// random perturbation, splits particles stacked on the same point
pub(crate) fn rp() -> V3 {
	let mut rng = rand::thread_rng();
	V3::new(
		rng.gen_range(-1e-4..1e-4),
		rng.gen_range(-1e-4..1e-4),
		rng.gen_range(-1e-4..1e-4),
	)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::particle::Particle;

	#[test]
	fn test_mass_split() {
		assert_eq!(mass_split(1.0, 1.0), Some((0.5, 0.5)));
		assert_eq!(mass_split(0.0, 2.0), Some((0.0, 1.0)));
		assert_eq!(mass_split(0.0, 0.0), None);
	}

	#[test]
	fn test_dispatch_and_render() {
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(7, V3::zeros()));
		let mut c: Constraint = PinConstraint::new(a, V3::x()).into();
		assert_eq!(c.ty(), ConstraintType::Pin);
		assert!(c.is_dirty());
		c.set_dirty(false);
		assert_eq!(c.resolution(), Resolution::Resolved);
		let pr = c.render(ConstraintId(3), &set);
		assert_eq!(pr.id, 3);
		assert_eq!(pr.ty, "pin");
		assert_eq!(pr.particles, vec![7]);
		set.remove(a);
		assert!(c.render(ConstraintId(3), &set).particles.is_empty());
		assert!(c.constraint_function(&set).is_none());
	}

	#[test]
	fn test_pre_condition_tags() {
		assert!(ConstraintType::HalfSpacePre.is_pre_condition());
		assert!(!ConstraintType::HalfSpace.is_pre_condition());
		assert_eq!(ConstraintType::default().name(), "none");
	}
}
