// pr_model: Physical model for rendering

use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct PrParticle {
	pub id: i32,
	pub body_id: i32,
	pub pos: [f32; 3],
	pub radius: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PrConstraint {
	pub id: u64,
	pub ty: &'static str,
	pub particles: Vec<i32>,
}

// column-major, the layout mesh updaters upload
#[derive(Clone, Debug, Serialize)]
pub struct PrRigidBody {
	pub transform: [[f32; 4]; 4],
	pub vertices: Vec<[f32; 3]>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PrModel {
	pub particles: Vec<PrParticle>,
	pub constraints: Vec<PrConstraint>,
	pub rigid_bodies: Vec<PrRigidBody>,
}

impl PrModel {
	pub fn particle_len(&self) -> usize {
		self.particles.len()
	}

	pub fn constraint_len(&self) -> usize {
		self.constraints.len()
	}
}
