use tracing::debug;

use crate::constraint::shape_matching::ShapeMatchingConstraint;
use crate::constraint::{Constraint, ConstraintId};
use crate::constraint_group::ConstraintGroup;
use crate::error::PbdError;
use crate::particle_set::{ParticleId, ParticleSet};
use crate::{M4, V3};
use protocol::pr_model::PrRigidBody;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
	Deformable,
	Rigid,
}

/// A point cloud kept close to its rest shape by one shape-matching
/// constraint.
#[derive(Clone, Debug)]
pub struct RigidBody {
	kind: BodyKind,
	particles: Vec<ParticleId>,
	rest_shape: Vec<V3>,
	constraint: Option<ConstraintId>,
}

impl RigidBody {
	pub fn new(kind: BodyKind) -> Self {
		Self {
			kind,
			particles: Vec::new(),
			rest_shape: Vec::new(),
			constraint: None,
		}
	}

	pub fn add_particle(&mut self, local: V3, particle: ParticleId) {
		self.rest_shape.push(local);
		self.particles.push(particle);
	}

	/// Builds the shape-matching constraint for the current members,
	/// replacing any previous one, and stops members from colliding with
	/// each other.
	pub fn create_constraint(
		&mut self,
		particles: &mut ParticleSet,
		group: &mut ConstraintGroup,
	) -> Result<ConstraintId, PbdError> {
		let constraint = ShapeMatchingConstraint::new(
			particles,
			&self.particles,
			&self.rest_shape,
			self.kind,
		)?;
		let num_particles = constraint.num_particles();
		if let Some(old) = self.constraint.take() {
			group.remove_constraint(old, particles);
		}
		let id = group.add_constraint(constraint.into(), particles);
		self.constraint = Some(id);

		let alive: Vec<ParticleId> = self
			.particles
			.iter()
			.copied()
			.filter(|id| particles.contains(*id))
			.collect();
		for member in alive.iter() {
			if let Some(p) = particles.get_mut(*member) {
				for sibling in alive.iter().filter(|s| *s != member) {
					p.add_non_collision_particle(*sibling);
				}
			}
		}
		debug!(
			"{:?} body with {} particles, shape matching {}",
			self.kind,
			num_particles,
			id.raw()
		);
		Ok(id)
	}

	fn shape_matching<'a>(&self, group: &'a ConstraintGroup) -> Option<&'a ShapeMatchingConstraint> {
		match group.get(self.constraint?)? {
			Constraint::ShapeMatching(c) => Some(c),
			_ => None,
		}
	}

	/// Rest-space to world transform of the last projection.
	pub fn transform(&self, group: &ConstraintGroup) -> M4 {
		if self.kind == BodyKind::Deformable {
			return M4::identity();
		}
		self.shape_matching(group)
			.map(|c| *c.transform())
			.unwrap_or_else(M4::identity)
	}

	pub fn vertex_positions(&self, particles: &ParticleSet) -> Vec<V3> {
		self.particles
			.iter()
			.filter_map(|id| particles.get(*id).map(|p| p.position()))
			.collect()
	}

	pub fn kind(&self) -> BodyKind {
		self.kind
	}

	pub fn particles(&self) -> &[ParticleId] {
		&self.particles
	}

	pub fn num_particles(&self) -> usize {
		self.particles.len()
	}

	pub fn rest_shape(&self) -> &[V3] {
		&self.rest_shape
	}

	pub fn constraint_id(&self) -> Option<ConstraintId> {
		self.constraint
	}

	pub fn render(&self, particles: &ParticleSet, group: &ConstraintGroup) -> PrRigidBody {
		let t = self.transform(group);
		let mut transform = [[0f32; 4]; 4];
		for (j, column) in transform.iter_mut().enumerate() {
			for (i, value) in column.iter_mut().enumerate() {
				*value = t[(i, j)];
			}
		}
		PrRigidBody {
			transform,
			vertices: self
				.vertex_positions(particles)
				.into_iter()
				.map(|v| [v[0], v[1], v[2]])
				.collect(),
		}
	}
}
