use crate::constraint::{Constraint, Projection};
use crate::error::PbdError;
use crate::particle::Particle;
use crate::params::SolverParams;
use protocol::pr_model::PrParticle;

/// Handle to a particle in a [`ParticleSet`].
///
/// Handles outlive the particle they point at; once the slot is reused the
/// generation no longer matches and lookups return `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId {
	index: u32,
	generation: u32,
}

impl ParticleId {
	pub fn index(&self) -> usize {
		self.index as usize
	}
}

#[derive(Clone, Debug, Default)]
struct Slot {
	generation: u32,
	particle: Option<Particle>,
}

/// Owner of every particle in the world.
#[derive(Clone, Debug, Default)]
pub struct ParticleSet {
	slots: Vec<Slot>,
	free: Vec<u32>,
	len: usize,
}

impl ParticleSet {
	pub fn insert(&mut self, particle: Particle) -> ParticleId {
		self.len += 1;
		if let Some(index) = self.free.pop() {
			let slot = &mut self.slots[index as usize];
			slot.particle = Some(particle);
			return ParticleId {
				index,
				generation: slot.generation,
			};
		}
		let index = self.slots.len() as u32;
		self.slots.push(Slot {
			generation: 0,
			particle: Some(particle),
		});
		ParticleId {
			index,
			generation: 0,
		}
	}

	/// Removes a particle and drops it from every non-collision set.
	pub fn remove(&mut self, id: ParticleId) -> Option<Particle> {
		let slot = self.slots.get_mut(id.index())?;
		if slot.generation != id.generation {
			return None;
		}
		let particle = slot.particle.take()?;
		slot.generation = slot.generation.wrapping_add(1);
		self.free.push(id.index);
		self.len -= 1;
		for p in self.slots.iter_mut().filter_map(|s| s.particle.as_mut()) {
			p.non_collision.remove(&id);
		}
		Some(particle)
	}

	pub fn contains(&self, id: ParticleId) -> bool {
		self.get(id).is_some()
	}

	pub fn get(&self, id: ParticleId) -> Option<&Particle> {
		let slot = self.slots.get(id.index())?;
		if slot.generation != id.generation {
			return None;
		}
		slot.particle.as_ref()
	}

	pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
		let slot = self.slots.get_mut(id.index())?;
		if slot.generation != id.generation {
			return None;
		}
		slot.particle.as_mut()
	}

	/// Both particles mutably, `None` if either is gone or `a == b`.
	pub fn get2_mut(
		&mut self,
		a: ParticleId,
		b: ParticleId,
	) -> Option<(&mut Particle, &mut Particle)> {
		if a.index == b.index || !self.contains(a) || !self.contains(b) {
			return None;
		}
		let (lo, hi, swapped) = if a.index < b.index {
			(a.index(), b.index(), false)
		} else {
			(b.index(), a.index(), true)
		};
		let (head, tail) = self.slots.split_at_mut(hi);
		let first = head[lo].particle.as_mut()?;
		let second = tail[0].particle.as_mut()?;
		if swapped {
			Some((second, first))
		} else {
			Some((first, second))
		}
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	pub fn iter(&self) -> impl Iterator<Item = (ParticleId, &Particle)> {
		self.slots.iter().enumerate().filter_map(|(index, slot)| {
			slot.particle.as_ref().map(|p| {
				(
					ParticleId {
						index: index as u32,
						generation: slot.generation,
					},
					p,
				)
			})
		})
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = (ParticleId, &mut Particle)> {
		self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
			let generation = slot.generation;
			slot.particle.as_mut().map(|p| {
				(
					ParticleId {
						index: index as u32,
						generation,
					},
					p,
				)
			})
		})
	}

	pub fn ids(&self) -> Vec<ParticleId> {
		self.iter().map(|(id, _)| id).collect()
	}

	/// Hands a pre-condition constraint to the particle that owns it.
	pub fn add_pre_condition(
		&mut self,
		owner: ParticleId,
		constraint: Constraint,
	) -> Result<(), PbdError> {
		let p = self.get_mut(owner).ok_or(PbdError::StaleParticle(owner))?;
		p.pre_conditions.push(constraint);
		Ok(())
	}

	pub fn clear_pre_conditions(&mut self) {
		for (_, p) in self.iter_mut() {
			p.pre_conditions.clear();
		}
	}

	/// Projects every particle's pre-condition constraints, particles in
	/// slot order and constraints in insertion order.
	pub fn project_pre_conditions(&mut self, params: &SolverParams) {
		for index in 0..self.slots.len() {
			let mut pre = match self.slots[index].particle.as_mut() {
				Some(p) if !p.pre_conditions.is_empty() => {
					std::mem::take(&mut p.pre_conditions)
				}
				_ => continue,
			};
			for constraint in pre.iter_mut() {
				constraint.project(self, params);
			}
			if let Some(p) = self.slots[index].particle.as_mut() {
				pre.append(&mut p.pre_conditions);
				p.pre_conditions = pre;
			}
		}
	}

	pub fn pr_particles(&self) -> Vec<PrParticle> {
		self.iter().map(|(_, p)| p.render()).collect()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::constraint::half_space::HalfSpacePreConditionConstraint;
	use crate::V3;

	#[test]
	fn test_stale_handle() {
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::zeros()));
		let b = set.insert(Particle::new(1, V3::x()));
		set.get_mut(a).unwrap().add_non_collision_particle(b);
		assert!(set.remove(b).is_some());
		assert!(set.get(b).is_none());
		assert!(set.remove(b).is_none());
		assert!(!set.get(a).unwrap().ignores_collision_with(b));

		let c = set.insert(Particle::new(2, V3::y()));
		assert_eq!(c.index(), b.index());
		assert!(set.get(b).is_none());
		assert_eq!(set.get(c).unwrap().id, 2);
		assert_eq!(set.len(), 2);
	}

	#[test]
	fn test_get2_mut_order() {
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::zeros()));
		let b = set.insert(Particle::new(1, V3::x()));
		let (pb, pa) = set.get2_mut(b, a).unwrap();
		assert_eq!(pb.id, 1);
		assert_eq!(pa.id, 0);
		assert!(set.get2_mut(a, a).is_none());
	}

	#[test]
	fn test_pre_conditions_stay_owned() {
		let mut set = ParticleSet::default();
		let a = set.insert(Particle::new(0, V3::new(0.0, -0.5, 0.0)));
		let pre = HalfSpacePreConditionConstraint::new(a, V3::zeros(), V3::y());
		set.add_pre_condition(a, pre.into()).unwrap();
		set.project_pre_conditions(&SolverParams::default());
		let p = set.get(a).unwrap();
		assert_eq!(p.x, V3::zeros());
		assert_eq!(p.p, V3::zeros());
		assert_eq!(p.pre_conditions().len(), 1);
		set.clear_pre_conditions();
		assert!(set.get(a).unwrap().pre_conditions().is_empty());
	}
}
