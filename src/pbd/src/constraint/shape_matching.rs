//! Shape matching after Müller et al.: the best-fit rotation between the
//! rest shape and the current cloud is the orthogonal part of
//! `Apq * Aqq^-1`, taken through an SVD.

use nalgebra::{Rotation3, UnitQuaternion};
use tracing::warn;

use crate::constraint::particle_list::ParticleList;
use crate::constraint::{ConstraintType, Projection, Resolution};
use crate::error::PbdError;
use crate::params::SolverParams;
use crate::particle_set::{ParticleId, ParticleSet};
use crate::rigid_body::BodyKind;
use crate::{M3, M4, V3};

// smallest to largest eigenvalue of Aqq below which the shape is flat or a line
const DEGENERATE_RATIO: f32 = 1e-6;

/// Transform sending a rest-space point through `r` about `pivot`, then
/// shifting the pivot onto `cm`.
pub fn rigid_transform(r: &M3, pivot: &V3, cm: &V3) -> M4 {
	let translation = cm - r * pivot;
	let mut t = M4::identity();
	for i in 0..3 {
		for j in 0..3 {
			t[(i, j)] = r[(i, j)];
		}
		t[(i, 3)] = translation[i];
	}
	t
}

fn aqq_inverse(offsets: impl Iterator<Item = V3>) -> Option<M3> {
	let aqq = offsets.fold(M3::zeros(), |acc, qi| acc + qi * qi.transpose());
	let (lo, hi) = aqq
		.symmetric_eigenvalues()
		.iter()
		.fold((f32::INFINITY, 0f32), |(lo, hi), e| (lo.min(*e), hi.max(*e)));
	if !(hi > 0.0 && lo > DEGENERATE_RATIO * hi) {
		return None;
	}
	aqq.try_inverse()
}

// rest frame of the members alive at the last projection
#[derive(Clone, Debug)]
struct LiveFrame {
	count: usize,
	// mean of the live rest offsets, zero while no member has expired
	mean: V3,
	aqq_inv: M3,
}

#[derive(Clone, Debug)]
pub struct ShapeMatchingConstraint {
	particles: ParticleList,
	// q_i, rest offsets from cm_origin, parallel to `particles`
	rest_offsets: Vec<V3>,
	cm_origin: V3,
	cm: V3,
	frame: LiveFrame,
	r: M3,
	q: UnitQuaternion<f32>,
	q_prev: UnitQuaternion<f32>,
	transform: M4,
	ty: ConstraintType,
	state: Resolution,
}

impl ShapeMatchingConstraint {
	/// Precomputes the rest centroid and `Aqq` from the members that are
	/// still alive; expired members are dropped for good.
	pub fn new(
		particles: &ParticleSet,
		members: &[ParticleId],
		rest_shape: &[V3],
		kind: BodyKind,
	) -> Result<Self, PbdError> {
		if members.len() != rest_shape.len() {
			return Err(PbdError::RestShapeMismatch {
				particles: members.len(),
				rest: rest_shape.len(),
			});
		}
		let (alive, rest): (Vec<ParticleId>, Vec<V3>) = members
			.iter()
			.zip(rest_shape)
			.filter(|(id, _)| particles.contains(**id))
			.map(|(id, x0)| (*id, *x0))
			.unzip();
		if alive.is_empty() {
			return Err(PbdError::EmptyBody);
		}

		let cm_origin = rest.iter().sum::<V3>() / rest.len() as f32;
		let rest_offsets: Vec<V3> = rest.iter().map(|x0| x0 - cm_origin).collect();
		let aqq_inv = aqq_inverse(rest_offsets.iter().copied())
			.ok_or(PbdError::DegenerateRestShape)?;

		let ty = match kind {
			BodyKind::Deformable => ConstraintType::ShapeMatch,
			BodyKind::Rigid => ConstraintType::ShapeMatchRigid,
		};
		Ok(Self {
			frame: LiveFrame {
				count: alive.len(),
				mean: V3::zeros(),
				aqq_inv,
			},
			particles: ParticleList::new(alive),
			rest_offsets,
			cm_origin,
			cm: cm_origin,
			r: M3::identity(),
			q: UnitQuaternion::identity(),
			q_prev: UnitQuaternion::identity(),
			transform: M4::identity(),
			ty,
			state: Resolution::Pending,
		})
	}

	pub fn num_particles(&self) -> usize {
		self.particles.len()
	}

	pub fn rotation(&self) -> &M3 {
		&self.r
	}

	pub fn transform(&self) -> &M4 {
		&self.transform
	}

	pub fn centroid(&self) -> V3 {
		self.cm
	}

	/// Rest centroid of the members alive at the last projection.
	pub fn rest_centroid(&self) -> V3 {
		self.cm_origin + self.frame.mean
	}

	pub fn orientation(&self) -> UnitQuaternion<f32> {
		self.q
	}

	pub fn previous_orientation(&self) -> UnitQuaternion<f32> {
		self.q_prev
	}

	fn live_rest<'a>(
		&'a self,
		particles: &'a ParticleSet,
	) -> impl Iterator<Item = (V3, V3)> + 'a {
		self.particles
			.as_slice()
			.iter()
			.zip(&self.rest_offsets)
			.filter_map(move |(id, qi)| particles.get(*id).map(|p| (p.p, *qi)))
	}

	fn live_mean(&self, particles: &ParticleSet) -> Option<V3> {
		let (sum, n) = self
			.live_rest(particles)
			.fold((V3::zeros(), 0usize), |(sum, n), (_, qi)| (sum + qi, n + 1));
		if n == 0 {
			return None;
		}
		Some(sum / n as f32)
	}

	// members never come back, so the live count identifies the live set
	fn refresh_frame(&mut self, particles: &ParticleSet, count: usize) -> bool {
		if count == self.frame.count {
			return true;
		}
		let Some(mean) = self.live_mean(particles) else {
			return false;
		};
		let Some(aqq_inv) = aqq_inverse(self.live_rest(particles).map(|(_, qi)| qi - mean)) else {
			warn!("shape matching survivors no longer span three dimensions");
			return false;
		};
		self.frame = LiveFrame {
			count,
			mean,
			aqq_inv,
		};
		true
	}
}

impl Projection for ShapeMatchingConstraint {
	fn ty(&self) -> ConstraintType {
		self.ty
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

	// RMS distance of the members from their goals under the last rotation
	fn constraint_function(&self, particles: &ParticleSet) -> Option<f32> {
		let (cm, n) = self.particles.centroid(particles)?;
		let mean = self.live_mean(particles)?;
		let sum: f32 = self
			.live_rest(particles)
			.map(|(pi, qi)| (pi - (self.r * (qi - mean) + cm)).norm_squared())
			.sum();
		Some((sum / n as f32).sqrt())
	}

	fn delta_p(&self, _particles: &ParticleSet, _params: &SolverParams) -> Option<V3> {
		None
	}

	fn project(&mut self, particles: &mut ParticleSet, _params: &SolverParams) {
		if self.state == Resolution::Resolved {
			return;
		}
		let Some((cm, count)) = self.particles.centroid(particles) else {
			return;
		};
		if !self.refresh_frame(particles, count) {
			return;
		}
		let mean = self.frame.mean;

		let apq = self
			.live_rest(particles)
			.fold(M3::zeros(), |acc, (pi, qi)| acc + (pi - cm) * (qi - mean).transpose());
		let a = apq * self.frame.aqq_inv;
		let svd = a.svd(true, true);
		let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
			warn!("shape matching svd did not converge");
			return;
		};
		let r = u * v_t;

		if self.ty == ConstraintType::ShapeMatchRigid {
			self.transform = rigid_transform(&r, &(self.cm_origin + mean), &cm);
		}
		self.q_prev = self.q;
		self.q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
		self.r = r;
		self.cm = cm;

		for (id, qi) in self.particles.as_slice().iter().zip(&self.rest_offsets) {
			if let Some(p) = particles.get_mut(*id) {
				if !p.is_immovable() {
					p.p = r * (qi - mean) + cm;
				}
			}
		}
		self.state = Resolution::Resolved;
	}
}
