use fnv::FnvHashSet;

use crate::constraint::{Constraint, ConstraintId};
use crate::particle_set::ParticleId;
use crate::{C3, M4, V3};
use protocol::pr_model::PrParticle;

/// Point mass carried through one solver step.
///
/// `x` is the position at the start of the step, `p` the working prediction
/// that constraints move around. An inverse mass of zero marks the particle
/// as fixed for the step.
#[derive(Clone, Debug)]
pub struct Particle {
	pub id: i32,
	pub body_id: i32,

	pub x: V3,
	pub p: V3,
	pub pp: V3,
	pub v: V3,
	pub vt: V3,

	pub w: f32,
	pub r: f32,
	pub m: f32,

	// written by the broad phase
	pub collision_vector: V3,
	pub collision_grad_len: f32,
	pub cell: C3,
	pub hash: usize,

	pub(crate) non_collision: FnvHashSet<ParticleId>,
	pub(crate) pre_conditions: Vec<Constraint>,
	pub(crate) constraints: Vec<ConstraintId>,
	pinned_w: Option<f32>,
}

impl Particle {
	pub fn new(id: i32, pos: V3) -> Self {
		Self {
			id,
			body_id: 0,
			x: pos,
			p: pos,
			pp: pos,
			v: V3::zeros(),
			vt: V3::zeros(),
			w: 1.0,
			r: 0.5,
			m: 1.0,
			collision_vector: V3::zeros(),
			collision_grad_len: 0.0,
			cell: C3::zeros(),
			hash: 0,
			non_collision: FnvHashSet::default(),
			pre_conditions: Vec::new(),
			constraints: Vec::new(),
			pinned_w: None,
		}
	}

	pub fn with_radius(mut self, r: f32) -> Self {
		self.set_radius(r);
		self
	}

	pub fn with_mass(mut self, m: f32) -> Self {
		self.set_mass(m);
		self
	}

	pub fn with_body_id(mut self, body_id: i32) -> Self {
		self.body_id = body_id;
		self
	}

	pub fn set_radius(&mut self, r: f32) {
		self.r = r;
	}

	/// Infinite or non-positive mass makes the particle immovable.
	pub fn set_mass(&mut self, m: f32) {
		self.m = m;
		self.w = if m.is_finite() && m > 0.0 { 1.0 / m } else { 0.0 };
	}

	pub fn set_cell(&mut self, i: i32, j: i32, k: i32) {
		self.cell = C3::new(i, j, k);
	}

	pub fn set_hash(&mut self, hash: usize) {
		self.hash = hash;
	}

	pub fn position(&self) -> V3 {
		self.x
	}

	pub fn radius(&self) -> f32 {
		self.r
	}

	pub fn mass(&self) -> f32 {
		self.m
	}

	pub fn is_immovable(&self) -> bool {
		self.w == 0.0
	}

	/// Displacement of the prediction since the step began.
	pub fn displacement(&self) -> V3 {
		self.p - self.x
	}

	pub fn translation(&self) -> V3 {
		self.x
	}

	pub fn transform(&self) -> M4 {
		M4::new_translation(&self.x)
	}

	/// Holds the particle at `pos` until [`end_pin_to_position`] is called.
	///
	/// [`end_pin_to_position`]: Particle::end_pin_to_position
	pub fn pin_to_position(&mut self, pos: V3) {
		if self.pinned_w.is_none() {
			self.pinned_w = Some(self.w);
		}
		self.w = 0.0;
		self.x = pos;
		self.p = pos;
	}

	pub fn end_pin_to_position(&mut self) {
		if let Some(w) = self.pinned_w.take() {
			self.w = w;
		}
	}

	pub fn is_pinned(&self) -> bool {
		self.pinned_w.is_some()
	}

	/// Whether the broad phase should skip collisions against `other`.
	pub fn ignores_collision_with(&self, other: ParticleId) -> bool {
		self.non_collision.contains(&other)
	}

	pub fn non_collision_particles(&self) -> impl Iterator<Item = &ParticleId> {
		self.non_collision.iter()
	}

	pub fn add_non_collision_particle(&mut self, other: ParticleId) {
		self.non_collision.insert(other);
	}

	pub fn constraints(&self) -> &[ConstraintId] {
		&self.constraints
	}

	pub fn pre_conditions(&self) -> &[Constraint] {
		&self.pre_conditions
	}

	pub fn render(&self) -> PrParticle {
		PrParticle {
			id: self.id,
			body_id: self.body_id,
			pos: [self.x[0], self.x[1], self.x[2]],
			radius: self.r,
		}
	}
}
