use std::time::SystemTime;

use pbd::constraint::half_space::HalfSpaceConstraint;
use pbd::constraint_group::ConstraintGroup;
use pbd::particle::Particle;
use pbd::particle_set::ParticleSet;
use pbd::rigid_body::{BodyKind, RigidBody};
use pbd::{SolverParams, V3};
use rand::{Rng, SeedableRng};

fn main() {
	let mut rng = rand::rngs::StdRng::seed_from_u64(0);
	let mut particles = ParticleSet::default();
	let mut group = ConstraintGroup::default();
	let params = SolverParams::default();

	let n = 8;
	let mut body = RigidBody::new(BodyKind::Rigid);
	for i in 0..n {
		for j in 0..n {
			for k in 0..n {
				let local = V3::new(i as f32, j as f32, k as f32);
				let id = particles.insert(
					Particle::new((i * n * n + j * n + k) as i32, local + V3::y() * 2.0)
						.with_body_id(1),
				);
				body.add_particle(local, id);
			}
		}
	}
	if let Err(e) = body.create_constraint(&mut particles, &mut group) {
		eprintln!("ERROR: {}", e);
		return;
	}
	for &id in body.particles() {
		group.add_constraint(HalfSpaceConstraint::new(id, V3::zeros(), V3::y()).into(), &mut particles);
	}

	let frames = 100;
	let iterations = 10;
	let start = SystemTime::now();
	for _ in 0..frames {
		for (_, p) in particles.iter_mut() {
			p.x = p.p;
			p.p += V3::new(
				rng.gen_range(-0.1..0.1),
				rng.gen_range(-0.3..0.1),
				rng.gen_range(-0.1..0.1),
			);
		}
		for _ in 0..iterations {
			group.pre_iteration();
			group.solve_constraints(&mut particles, &params);
		}
	}
	let duration = match SystemTime::now().duration_since(start) {
		Ok(d) => d.as_micros(),
		Err(e) => {
			eprintln!("ERROR: {}", e);
			return;
		}
	};
	eprintln!(
		"{} particles, {} constraints: {:.3}us per iteration",
		particles.len(),
		group.counts()[0],
		duration as f32 / (frames * iterations) as f32,
	);
}
