use thiserror::Error;

use crate::particle_set::ParticleId;

/// Failures of structural edits: building constraints and rigid bodies.
///
/// Projection itself never fails, a constraint that cannot act skips its
/// correction instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PbdError {
	#[error("particle {0:?} no longer exists")]
	StaleParticle(ParticleId),
	#[error("constraint needs two distinct particles, got {0:?} twice")]
	SameParticle(ParticleId),
	#[error("contact normal is undefined for coincident particles")]
	DegenerateNormal,
	#[error("rest shape has {rest} offsets for {particles} particles")]
	RestShapeMismatch { particles: usize, rest: usize },
	#[error("rigid body has no live particles")]
	EmptyBody,
	#[error("rest shape does not span three dimensions")]
	DegenerateRestShape,
}
