//! The constrained Lennard-Jones sample: particles between a floor and a
//! ceiling wall, warmed up and then integrated while particle 0 is watched.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::RunConfig;
use crate::core::engine::{ConstraintHandle, Dynamics, Engine, ParticleHandle, Session};
use crate::core::particle::ParticleSpec;
use crate::core::vector::{Vec3, DIM};
use crate::core::wall::{Wall, WallConstraint};
use crate::error::{Error, Result};
use crate::warmup::{WarmupController, WarmupReport};

/// Distance kept from the box faces when placing particles.
const PLACEMENT_MARGIN: f64 = 1.0;

/// Offset of both walls from the box faces along z.
const WALL_OFFSET: f64 = 0.1;

/// Particle type of every sample particle (and the type both walls act on).
const SAMPLE_TYPE: u32 = 0;

/// Handles created by [`ConstraintSample::setup`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSetup {
    pub particles: Vec<ParticleHandle>,
    pub floor: ConstraintHandle,
    pub ceiling: ConstraintHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleReport {
    pub warmup: WarmupReport,
    /// Position of the first particle after each production block.
    pub trajectory: Vec<Vec3>,
    /// Blocks after which the watched particle was outside the walls.
    pub violations: usize,
}

/// Scenario driver.
#[derive(Debug, Clone)]
pub struct ConstraintSample {
    config: RunConfig,
    floor: Wall,
    ceiling: Wall,
}

impl ConstraintSample {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let l = config.system.box_length;
        if l.iter().any(|&lk| lk <= 2.0 * PLACEMENT_MARGIN) {
            return Err(Error::InvalidParam(format!(
                "box_length must exceed {} in every dimension",
                2.0 * PLACEMENT_MARGIN
            )));
        }
        let floor = Wall::new([0.0, 0.0, 1.0], WALL_OFFSET)?;
        let ceiling = Wall::new([0.0, 0.0, -1.0], -(l[2] - WALL_OFFSET))?;
        Ok(Self {
            config,
            floor,
            ceiling,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Seeded uniform positions in `[margin, L - margin]` per axis.
    ///
    /// Overlaps are allowed; removing them is the warmup's job.
    pub fn random_positions(&self) -> Vec<Vec3> {
        let sys = &self.config.system;
        let mut rng = StdRng::seed_from_u64(sys.seed);
        (0..sys.num_particles)
            .map(|_| {
                let mut r = [0.0_f64; DIM];
                for (k, r_k) in r.iter_mut().enumerate() {
                    *r_k = rng.random_range(PLACEMENT_MARGIN..sys.box_length[k] - PLACEMENT_MARGIN);
                }
                r
            })
            .collect()
    }

    /// Add the particles and both walls to `engine`.
    pub fn setup<E: Engine>(&self, engine: &mut E) -> Result<SampleSetup> {
        let particles = self
            .random_positions()
            .into_iter()
            .map(|r| engine.create_particle(ParticleSpec::new(r).with_type(SAMPLE_TYPE)))
            .collect::<Result<Vec<_>>>()?;
        let floor =
            engine.add_constraint(WallConstraint::new(self.floor).for_type(SAMPLE_TYPE).into())?;
        let ceiling =
            engine.add_constraint(WallConstraint::new(self.ceiling).for_type(SAMPLE_TYPE).into())?;
        log::info!(
            "sample: {} particles in box {:?} (time step {}, skin {})",
            particles.len(),
            self.config.system.box_length,
            self.config.system.time_step,
            self.config.system.skin
        );
        Ok(SampleSetup {
            particles,
            floor,
            ceiling,
        })
    }

    /// Set up, warm up, run production. The engine is cleared afterwards.
    pub fn run<E: Engine>(&self, engine: &mut E) -> Result<SampleReport> {
        let mut session = Session::new(engine);
        let setup = self.setup(&mut *session)?;
        let mut warmup = WarmupController::new(
            self.config.warmup_config(),
            vec![setup.floor, setup.ceiling],
        )?;
        let warmup = warmup.run(&mut *session)?;

        let watched = setup.particles.first().copied().ok_or_else(|| {
            Error::InvalidParam("sample needs at least one particle".into())
        })?;
        let prod = &self.config.production;
        let mut trajectory = Vec::with_capacity(prod.blocks);
        let mut violations = 0usize;
        for block in 0..prod.blocks {
            session.run_integration(prod.steps_per_block)?;
            let pos = session.particle_position(watched)?;
            if !self.between_walls(&pos) {
                violations += 1;
                log::warn!("sample block {block}: particle left the walls at {pos:?}");
            } else {
                log::debug!("sample block {block}: particle at {pos:?}");
            }
            trajectory.push(pos);
        }
        log::info!(
            "sample: {} production blocks, {} wall violations",
            prod.blocks,
            violations
        );
        Ok(SampleReport {
            warmup,
            trajectory,
            violations,
        })
    }

    /// Whether `x` lies on the allowed side of both walls.
    pub fn between_walls(&self, x: &Vec3) -> bool {
        self.floor.signed_distance(x) >= 0.0 && self.ceiling.signed_distance(x) >= 0.0
    }
}
