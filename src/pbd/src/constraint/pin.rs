use crate::constraint::particle_list::ParticleList;
use crate::constraint::{ConstraintType, Projection, Resolution};
use crate::params::SolverParams;
use crate::particle_set::{ParticleId, ParticleSet};
use crate::V3;

/// Infinitely stiff anchor, the prediction is set to the target outright.
#[derive(Clone, Debug)]
pub struct PinConstraint {
	particle: ParticleId,
	pin_position: V3,
	state: Resolution,
}

impl PinConstraint {
	pub fn new(particle: ParticleId, pin_position: V3) -> Self {
		Self {
			particle,
			pin_position,
			state: Resolution::Pending,
		}
	}

	pub fn set_position(&mut self, pos: V3) {
		self.pin_position = pos;
	}

	pub fn position(&self) -> V3 {
		self.pin_position
	}
}

impl Projection for PinConstraint {
	fn ty(&self) -> ConstraintType {
		ConstraintType::Pin
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
			.map(|p| (p.p - self.pin_position).norm())
	}

	fn delta_p(&self, particles: &ParticleSet, _params: &SolverParams) -> Option<V3> {
		particles.get(self.particle).map(|p| self.pin_position - p.p)
	}

	fn project(&mut self, particles: &mut ParticleSet, _params: &SolverParams) {
		if let Some(p) = particles.get_mut(self.particle) {
			p.p = self.pin_position;
			self.state = Resolution::Resolved;
		}
	}
}

/// Snaps every member onto the members' mean prediction.
#[derive(Clone, Debug)]
pub struct PinTogetherConstraint {
	particles: ParticleList,
	avrg_pos: V3,
	state: Resolution,
}

impl PinTogetherConstraint {
	pub fn new(particles: Vec<ParticleId>) -> Self {
		Self {
			particles: ParticleList::new(particles),
			avrg_pos: V3::zeros(),
			state: Resolution::Pending,
		}
	}

	pub fn average_position(&self) -> V3 {
		self.avrg_pos
	}
}

impl Projection for PinTogetherConstraint {
	fn ty(&self) -> ConstraintType {
		ConstraintType::PinTogether
	}

	fn particles(&self) -> Vec<ParticleId> {
		self.particles.to_vec()
	}

	fn resolution(&self) -> Resolution {
		self.state
	}

	fn set_resolution(&mut self, resolution: Resolution) {
		self.state = resolution;
	}

	// mean distance of the members from their centroid
	fn constraint_function(&self, particles: &ParticleSet) -> Option<f32> {
		let (cm, n) = self.particles.centroid(particles)?;
		let spread: f32 = self
			.particles
			.alive(particles)
			.map(|(_, p)| (p.p - cm).norm())
			.sum();
		Some(spread / n as f32)
	}

	fn delta_p(&self, _particles: &ParticleSet, _params: &SolverParams) -> Option<V3> {
		None
	}

	fn project(&mut self, particles: &mut ParticleSet, _params: &SolverParams) {
		let Some((cm, _)) = self.particles.centroid(particles) else {
			return;
		};
		self.avrg_pos = cm;
		for &id in self.particles.as_slice() {
			if let Some(p) = particles.get_mut(id) {
				if !p.is_immovable() {
					p.p = cm;
				}
			}
		}
		self.state = Resolution::Resolved;
	}
}
