use crate::particle::Particle;
use crate::particle_set::{ParticleId, ParticleSet};
use crate::V3;

#[derive(Clone, Debug, Default)]
pub struct ParticleList {
	particles: Vec<ParticleId>,
}

impl ParticleList {
	pub fn new(particles: Vec<ParticleId>) -> Self {
		Self { particles }
	}

	pub fn len(&self) -> usize {
		self.particles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.particles.is_empty()
	}

	pub fn as_slice(&self) -> &[ParticleId] {
		&self.particles
	}

	pub fn to_vec(&self) -> Vec<ParticleId> {
		self.particles.clone()
	}

	pub fn alive<'a>(
		&'a self,
		set: &'a ParticleSet,
	) -> impl Iterator<Item = (ParticleId, &'a Particle)> + 'a {
		self.particles
			.iter()
			.filter_map(move |&id| set.get(id).map(|p| (id, p)))
	}

	/// Mean predicted position of the live members and how many there are.
	pub fn centroid(&self, set: &ParticleSet) -> Option<(V3, usize)> {
		let (sum, n) = self
			.alive(set)
			.fold((V3::zeros(), 0usize), |(sum, n), (_, p)| (sum + p.p, n + 1));
		if n == 0 {
			return None;
		}
		Some((sum / n as f32, n))
	}
}

impl std::ops::Index<usize> for ParticleList {
	type Output = ParticleId;
	fn index(&self, idx: usize) -> &Self::Output {
		&self.particles[idx]
	}
}
