use std::collections::BTreeMap;

use tracing::debug;

use crate::constraint::{Constraint, ConstraintId, ConstraintType, Projection};
use crate::params::SolverParams;
use crate::particle_set::ParticleSet;
use crate::rigid_body::RigidBody;
use protocol::pr_model::{PrConstraint, PrModel};

/// Active constraint set of a world.
///
/// Persistent constraints are kept in insertion order, collision
/// constraints from the broad phase are replaced every substep. Projection
/// runs strictly in that order, each constraint seeing what the previous
/// ones did to the particles.
#[derive(Clone, Debug, Default)]
pub struct ConstraintGroup {
	id_alloc: u64,
	constraints: BTreeMap<ConstraintId, Constraint>,
	tmp_constraints: Vec<Constraint>,
}

impl ConstraintGroup {
	/// Adds a persistent constraint and records it in the constraint list of
	/// every particle it touches.
	pub fn add_constraint(
		&mut self,
		constraint: Constraint,
		particles: &mut ParticleSet,
	) -> ConstraintId {
		let id = ConstraintId(self.id_alloc);
		self.id_alloc += 1;
		for pid in constraint.particles() {
			if let Some(p) = particles.get_mut(pid) {
				p.constraints.push(id);
			}
		}
		debug!("add {} constraint {}", constraint.ty().name(), id.raw());
		self.constraints.insert(id, constraint);
		id
	}

	pub fn remove_constraint(
		&mut self,
		id: ConstraintId,
		particles: &mut ParticleSet,
	) -> Option<Constraint> {
		let constraint = self.constraints.remove(&id)?;
		for pid in constraint.particles() {
			if let Some(p) = particles.get_mut(pid) {
				p.constraints.retain(|c| *c != id);
			}
		}
		Some(constraint)
	}

	pub fn get(&self, id: ConstraintId) -> Option<&Constraint> {
		self.constraints.get(&id)
	}

	pub fn get_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
		self.constraints.get_mut(&id)
	}

	pub fn counts(&self) -> [usize; 2] {
		[self.constraints.len(), self.tmp_constraints.len()]
	}

	pub fn set_collision_constraints(&mut self, tmp_constraints: Vec<Constraint>) {
		self.tmp_constraints = tmp_constraints;
	}

	pub fn collision_constraints(&self) -> &[Constraint] {
		&self.tmp_constraints
	}

	/// Marks every constraint pending, once per substep.
	pub fn pre_iteration(&mut self) {
		for constraint in self
			.constraints
			.values_mut()
			.chain(self.tmp_constraints.iter_mut())
		{
			constraint.set_dirty(true);
		}
	}

	pub fn solve_constraints(&mut self, particles: &mut ParticleSet, params: &SolverParams) {
		self.constraints
			.values_mut()
			.chain(self.tmp_constraints.iter_mut())
			.for_each(|constraint| constraint.project(particles, params));
	}

	pub fn iter(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
		self.constraints.iter().map(|(id, c)| (*id, c))
	}

	pub fn filter_by_type(
		&self,
		ty: ConstraintType,
	) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
		self.iter().filter(move |(_, c)| c.ty() == ty)
	}

	pub fn pr_constraints(&self, particles: &ParticleSet) -> Vec<PrConstraint> {
		// NOTE: collision constraints have no id and are not drawn
		self.constraints
			.iter()
			.map(|(id, c)| c.render(*id, particles))
			.collect()
	}

	pub fn pr_model(&self, particles: &ParticleSet, bodies: &[RigidBody]) -> PrModel {
		PrModel {
			particles: particles.pr_particles(),
			constraints: self.pr_constraints(particles),
			rigid_bodies: bodies.iter().map(|b| b.render(particles, self)).collect(),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::constraint::distance::DistanceEqualityConstraint;
	use crate::constraint::half_space::HalfSpaceConstraint;
	use crate::constraint::particle_particle::ParticleParticleConstraint;
	use crate::constraint::pin::PinConstraint;
	use crate::particle::Particle;
	use crate::V3;
	use approx::assert_abs_diff_eq;

	#[test]
	fn test_back_references() {
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::zeros()));
		let b = set.insert(Particle::new(1, V3::x()));
		let mut group = ConstraintGroup::default();
		let pin = group.add_constraint(PinConstraint::new(a, V3::zeros()).into(), &mut set);
		let spring = group.add_constraint(DistanceEqualityConstraint::new(a, b, 1.0).build(), &mut set);
		assert_eq!(set.get(a).unwrap().constraints(), &[pin, spring]);
		assert_eq!(set.get(b).unwrap().constraints(), &[spring]);
		assert_eq!(group.filter_by_type(ConstraintType::Pin).count(), 1);

		assert!(group.remove_constraint(pin, &mut set).is_some());
		assert_eq!(set.get(a).unwrap().constraints(), &[spring]);
		assert!(group.get(pin).is_none());
		assert_eq!(group.pr_constraints(&set)[0].particles, vec![0, 1]);
		let model = group.pr_model(&set, &[]);
		assert_eq!(model.particle_len(), 2);
		assert_eq!(model.constraint_len(), 1);
	}

	// projection order decides the outcome, later constraints win
	#[test]
	fn test_gauss_seidel_order() {
		let params = SolverParams::default();
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::new(0.0, -1.0, 0.0)));
		let mut group = ConstraintGroup::default();
		group.add_constraint(PinConstraint::new(a, V3::new(0.0, -2.0, 0.0)).into(), &mut set);
		group.add_constraint(HalfSpaceConstraint::new(a, V3::zeros(), V3::y()).into(), &mut set);
		group.solve_constraints(&mut set, &params);
		assert_abs_diff_eq!(set.get(a).unwrap().p, V3::zeros());

		let mut group = ConstraintGroup::default();
		group.add_constraint(HalfSpaceConstraint::new(a, V3::zeros(), V3::y()).into(), &mut set);
		group.add_constraint(PinConstraint::new(a, V3::new(0.0, -2.0, 0.0)).into(), &mut set);
		group.solve_constraints(&mut set, &params);
		assert_eq!(set.get(a).unwrap().p, V3::new(0.0, -2.0, 0.0));
	}

	#[test]
	fn test_pre_iteration_resets_dirty() {
		let params = SolverParams::default();
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::zeros()).with_radius(1.0));
		let b = set.insert(Particle::new(1, V3::new(3.0, 0.0, 0.0)).with_radius(1.0));
		let mut group = ConstraintGroup::default();
		group.set_collision_constraints(vec![
			ParticleParticleConstraint::new(&set, a, b).unwrap().into(),
		]);
		assert_eq!(group.counts(), [0, 1]);
		group.solve_constraints(&mut set, &params);
		assert!(!group.collision_constraints()[0].is_dirty());

		set.get_mut(b).unwrap().p = V3::new(4.0, 0.0, 0.0);
		group.solve_constraints(&mut set, &params);
		assert_eq!(set.get(b).unwrap().p, V3::new(4.0, 0.0, 0.0));

		group.pre_iteration();
		group.solve_constraints(&mut set, &params);
		let gap = set.get(b).unwrap().p - set.get(a).unwrap().p;
		assert_abs_diff_eq!(gap.norm(), 2.0, epsilon = 1e-5);
	}
}
