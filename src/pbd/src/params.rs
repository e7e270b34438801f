use serde::{Deserialize, Serialize};

/// Tunables shared by every projection call.
///
/// The driver owns one of these and hands it to
/// [`ConstraintGroup::solve_constraints`](crate::constraint_group::ConstraintGroup::solve_constraints);
/// missing fields fall back to the defaults when deserialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
	// resistance is picked by `distance_resistance`
	pub distance_stretch_resistance: f32,
	pub distance_compress_resistance: f32,
	pub friction_static: f32,
	pub friction_dynamic: f32,
	/// Let SDF gradients override the sphere-sphere contact normal.
	pub use_sdf_collision: bool,
	pub sdf_gradient_threshold: f32,
	pub half_space_friction_static: f32,
	pub half_space_friction_dynamic: f32,
}

impl Default for SolverParams {
	fn default() -> Self {
		Self {
			distance_stretch_resistance: 1.0,
			distance_compress_resistance: 1.0,
			friction_static: 0.5,
			friction_dynamic: 0.5,
			use_sdf_collision: false,
			sdf_gradient_threshold: 0.01,
			half_space_friction_static: 0.5,
			half_space_friction_dynamic: 0.5,
		}
	}
}

impl SolverParams {
	pub fn with_distance_resistance(mut self, stretch: f32, compress: f32) -> Self {
		self.distance_stretch_resistance = stretch;
		self.distance_compress_resistance = compress;
		self
	}

	pub fn with_friction(mut self, static_f: f32, dynamic_f: f32) -> Self {
		self.friction_static = static_f;
		self.friction_dynamic = dynamic_f;
		self
	}

	pub fn with_half_space_friction(mut self, static_f: f32, dynamic_f: f32) -> Self {
		self.half_space_friction_static = static_f;
		self.half_space_friction_dynamic = dynamic_f;
		self
	}

	pub fn with_sdf_collision(mut self, on: bool) -> Self {
		self.use_sdf_collision = on;
		self
	}

	pub fn with_sdf_gradient_threshold(mut self, threshold: f32) -> Self {
		self.sdf_gradient_threshold = threshold;
		self
	}

	/// Resistance applied to a distance correction, picked by whether the
	/// spring is stretched past its rest length.
	pub fn distance_resistance(&self, length: f32, rest_length: f32) -> f32 {
		if length > rest_length {
			self.distance_stretch_resistance
		} else {
			self.distance_compress_resistance
		}
	}
}
