use crate::constraint::{mass_split, ConstraintType, Projection, Resolution};
use crate::error::PbdError;
use crate::params::SolverParams;
use crate::particle::Particle;
use crate::particle_set::{ParticleId, ParticleSet};
use crate::V3;

/// Part of a tangential displacement `td` removed by Coulomb friction:
/// all of it while sticking, capped at `dynamic_f` while sliding.
fn friction_cancel(td: V3, static_f: f32, dynamic_f: f32) -> V3 {
	let td_length = td.norm();
	if td_length < static_f {
		td
	} else {
		td * (dynamic_f / td_length).min(1.0)
	}
}

fn tangential(displacement: V3, n: &V3) -> V3 {
	displacement - n * displacement.dot(n)
}

/// Friction between two particles in contact.
///
/// The contact normal is frozen at construction from the pre-step
/// positions, later motion does not rotate it.
#[derive(Clone, Debug)]
pub struct FrictionConstraint {
	p1: ParticleId,
	p2: ParticleId,
	collision_normal: V3,
	state: Resolution,
}

impl FrictionConstraint {
	pub fn new(particles: &ParticleSet, p1: ParticleId, p2: ParticleId) -> Result<Self, PbdError> {
		if p1 == p2 {
			return Err(PbdError::SameParticle(p1));
		}
		let a = particles.get(p1).ok_or(PbdError::StaleParticle(p1))?;
		let b = particles.get(p2).ok_or(PbdError::StaleParticle(p2))?;
		let n = (b.x - a.x)
			.try_normalize(0.0)
			.ok_or(PbdError::DegenerateNormal)?;
		Ok(Self::with_normal(p1, p2, n))
	}

	pub fn with_normal(p1: ParticleId, p2: ParticleId, collision_normal: V3) -> Self {
		Self {
			p1,
			p2,
			collision_normal,
			state: Resolution::Pending,
		}
	}

	pub fn normal(&self) -> V3 {
		self.collision_normal
	}

	fn relative(a: &Particle, b: &Particle) -> V3 {
		a.displacement() - b.displacement()
	}

	fn corrections(&self, a: &Particle, b: &Particle, params: &SolverParams) -> Option<(V3, V3)> {
		let (k1, k2) = mass_split(a.w, b.w)?;
		let td = tangential(Self::relative(a, b), &self.collision_normal);
		let xj = friction_cancel(td, params.friction_static, params.friction_dynamic);
		Some((k1 * -xj, k2 * xj))
	}
}

impl Projection for FrictionConstraint {
	fn ty(&self) -> ConstraintType {
		ConstraintType::Friction
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
		Some(Self::relative(a, b).dot(&self.collision_normal))
	}

	fn delta_p(&self, particles: &ParticleSet, params: &SolverParams) -> Option<V3> {
		let a = particles.get(self.p1)?;
		let b = particles.get(self.p2)?;
		self.corrections(a, b, params).map(|(da, _)| da)
	}

	fn project(&mut self, particles: &mut ParticleSet, params: &SolverParams) {
		if self.state == Resolution::Resolved {
			return;
		}
		let Some((a, b)) = particles.get2_mut(self.p1, self.p2) else {
			return;
		};
		if let Some((da, db)) = self.corrections(a, b, params) {
			a.p += da;
			b.p += db;
		}
		self.state = Resolution::Resolved;
	}
}

/// Friction of a single particle sliding on a static plane.
#[derive(Clone, Debug)]
pub struct HalfSpaceFrictionConstraint {
	particle: ParticleId,
	plane_origin: V3,
	collision_normal: V3,
	state: Resolution,
}

impl HalfSpaceFrictionConstraint {
	pub fn new(particle: ParticleId, plane_origin: V3, collision_normal: V3) -> Self {
		Self {
			particle,
			plane_origin,
			collision_normal,
			state: Resolution::Pending,
		}
	}

	pub fn plane_origin(&self) -> V3 {
		self.plane_origin
	}

	pub fn normal(&self) -> V3 {
		self.collision_normal
	}

	fn correction(&self, p: &Particle, params: &SolverParams) -> V3 {
		let td = tangential(p.displacement(), &self.collision_normal);
		-friction_cancel(
			td,
			params.half_space_friction_static,
			params.half_space_friction_dynamic,
		)
	}
}

impl Projection for HalfSpaceFrictionConstraint {
	fn ty(&self) -> ConstraintType {
		ConstraintType::FrictionHalfSpace
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
			.map(|p| p.displacement().dot(&self.collision_normal))
	}

	fn delta_p(&self, particles: &ParticleSet, params: &SolverParams) -> Option<V3> {
		let p = particles.get(self.particle)?;
		if p.is_immovable() {
			return Some(V3::zeros());
		}
		Some(self.correction(p, params))
	}

	fn project(&mut self, particles: &mut ParticleSet, params: &SolverParams) {
		if self.state == Resolution::Resolved {
			return;
		}
		let Some(p) = particles.get_mut(self.particle) else {
			return;
		};
		if !p.is_immovable() {
			let dp = self.correction(p, params);
			p.p += dp;
		}
		self.state = Resolution::Resolved;
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use approx::assert_abs_diff_eq;

	// a and b start touching along x, then a slides by `slide` in y/z
	fn sliding_pair(set: &mut ParticleSet, slide: V3) -> (ParticleId, ParticleId) {
		let mut pa = Particle::new(0, V3::zeros());
		pa.p = slide;
		let a = set.insert(pa);
		let b = set.insert(Particle::new(1, V3::new(1.0, 0.0, 0.0)));
		(a, b)
	}

	fn relative_tangential(set: &ParticleSet, a: ParticleId, b: ParticleId, n: &V3) -> V3 {
		let (pa, pb) = (set.get(a).unwrap(), set.get(b).unwrap());
		tangential(pa.displacement() - pb.displacement(), n)
	}

	#[test]
	fn test_static_friction_sticks() {
		let mut set = ParticleSet::default();
		let (a, b) = sliding_pair(&mut set, V3::new(0.05, 0.2, 0.1));
		let mut c = FrictionConstraint::new(&set, a, b).unwrap();
		assert_eq!(c.normal(), V3::x());
		assert_abs_diff_eq!(c.constraint_function(&set).unwrap(), 0.05);
		c.project(&mut set, &SolverParams::default().with_friction(0.5, 0.1));
		assert_abs_diff_eq!(relative_tangential(&set, a, b, &c.normal()), V3::zeros(), epsilon = 1e-6);
		// normal component is left alone
		assert_abs_diff_eq!(c.constraint_function(&set).unwrap(), 0.05, epsilon = 1e-6);
	}

	#[test]
	fn test_dynamic_friction_caps() {
		let mut set = ParticleSet::default();
		let slide = V3::new(0.0, 1.2, -1.6);
		let (a, b) = sliding_pair(&mut set, slide);
		let mut c = FrictionConstraint::new(&set, a, b).unwrap();
		c.project(&mut set, &SolverParams::default().with_friction(0.5, 0.4));
		let td = relative_tangential(&set, a, b, &c.normal());
		// |td| was 2.0, min(1, 0.4 / 2.0) * 2.0 = 0.4 removed
		assert_abs_diff_eq!(td.norm(), 1.6, epsilon = 1e-5);
		assert_abs_diff_eq!(td.normalize(), slide.normalize(), epsilon = 1e-5);
	}

	#[test]
	fn test_friction_conserves_momentum() {
		let mut set = ParticleSet::default();
		let (a, b) = sliding_pair(&mut set, V3::new(0.0, 0.3, 0.0));
		set.get_mut(a).unwrap().set_mass(3.0);
		let before = (set.get(a).unwrap().p, set.get(b).unwrap().p);
		let mut c = FrictionConstraint::new(&set, a, b).unwrap();
		c.project(&mut set, &SolverParams::default());
		let (pa, pb) = (set.get(a).unwrap(), set.get(b).unwrap());
		let momentum = pa.m * (pa.p - before.0) + pb.m * (pb.p - before.1);
		assert_abs_diff_eq!(momentum, V3::zeros(), epsilon = 1e-6);
	}

	#[test]
	fn test_coincident_start_rejected() {
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::zeros()));
		let b = set.insert(Particle::new(1, V3::zeros()));
		assert_eq!(
			FrictionConstraint::new(&set, a, b).unwrap_err(),
			PbdError::DegenerateNormal
		);
	}

	#[test]
	fn test_half_space_friction() {
		let params = SolverParams::default();
		let mut set = ParticleSet::default();
		let mut p = Particle::new(0, V3::new(0.0, 0.5, 0.0));
		p.p = V3::new(0.3, 0.4, 0.0);
		let a = set.insert(p);
		let mut c = HalfSpaceFrictionConstraint::new(a, V3::zeros(), V3::y());
		assert_abs_diff_eq!(c.constraint_function(&set).unwrap(), -0.1, epsilon = 1e-6);
		c.project(&mut set, &params);
		assert_abs_diff_eq!(set.get(a).unwrap().p, V3::new(0.0, 0.4, 0.0), epsilon = 1e-6);

		let mut p = Particle::new(1, V3::zeros());
		p.p = V3::new(2.0, 0.0, 0.0);
		let b = set.insert(p);
		let mut c = HalfSpaceFrictionConstraint::new(b, V3::zeros(), V3::y());
		c.project(&mut set, &params);
		assert_abs_diff_eq!(set.get(b).unwrap().p, V3::new(1.5, 0.0, 0.0), epsilon = 1e-6);
	}
}
