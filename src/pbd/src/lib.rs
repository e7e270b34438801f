pub mod constraint;
pub mod constraint_group;
pub mod error;
pub mod params;
pub mod particle;
pub mod particle_set;
pub mod rigid_body;

pub use error::PbdError;
pub use params::SolverParams;

pub type V3 = nalgebra::Vector3<f32>;
pub type C3 = nalgebra::Vector3<i32>;
pub type M3 = nalgebra::Matrix3<f32>;
pub type M4 = nalgebra::Matrix4<f32>;
