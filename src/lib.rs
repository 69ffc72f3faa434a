//! # Particle Lab
//!
//! GPU particle simulation driven by four gravity wells.
//!
//! Particles are stored four to a 64-byte [`ParticleQuad`], in a single
//! page-aligned block that the compute kernel updates in place every frame.
//! Each frame the engine advances every particle under the selected
//! [`BehaviorType`], splats it into a simulation image, optionally decays
//! trails with a blur and erosion, and presents the image.
//!
//! ## Quick Start
//!
//! ```ignore
//! use particle_lab::prelude::*;
//!
//! struct Seeds;
//!
//! impl LabDelegate for Seeds {
//!     fn positions_for_reset(&mut self, count: usize) -> Vec<Vec2> {
//!         Rect::from_size(1024.0, 768.0).generate_points_inside(None, count)
//!     }
//! }
//!
//! let config = LabConfig::new(1024, 768).with_particle_count(ParticleCount::OneMillion);
//! let mut lab = ParticleLab::create(config, Some(Box::new(Seeds)))?;
//! Preset::Random.apply(lab.settings_mut());
//! lab.reset_particles(true);
//!
//! loop {
//!     lab.set_gravity_well_properties(GravityWell::One, 0.5, 0.5, 20.0, 5.0);
//!     lab.step(RenderTarget::Surface(&surface));
//! }
//! ```
//!
//! ## Behaviors
//!
//! | Behavior | Effect |
//! |----------|--------|
//! | [`BehaviorType::None`] | Integrate and damp only |
//! | [`BehaviorType::GravityWell`] | Attraction plus spin from all four wells |
//! | [`BehaviorType::Explosion`] | Radial push from the center or well one |
//! | [`BehaviorType::Follow`] | Attraction to well one only |
//!
//! ## Devices
//!
//! [`ParticleLab::create`] looks for a compute device once. Without one the
//! delegate hears [`LabDelegate::device_unavailable`] a single time and the
//! returned engine treats every step as a no-op.

pub mod attractor;
pub mod behavior;
pub mod config;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod particle;
pub mod points;
pub mod shaders;
pub mod store;
pub mod time;

pub use attractor::{AttractorSet, GravityWell};
pub use behavior::BehaviorType;
pub use config::{LabConfig, Preset, SimulationSettings};
pub use engine::{
    DisabledEngine, EngineState, FrameOutcome, LabDelegate, ParticleEngine, ParticleLab,
    RenderTarget, SkipReason,
};
pub use error::{EngineError, GpuError};
pub use glam::{Vec2, Vec4};
pub use gpu::GpuEngine;
pub use particle::{ParticleColor, ParticleCount, ParticleQuad};
pub use points::{Circle, Polygon, Rect, Shape};
pub use store::{ParticleStore, ResetSummary};
pub use time::{FrameClock, FrameInfo};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use particle_lab::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AttractorSet, BehaviorType, Circle, EngineError, EngineState, FrameInfo, FrameOutcome,
        GravityWell, GpuEngine, LabConfig, LabDelegate, ParticleColor, ParticleCount,
        ParticleEngine, ParticleLab, ParticleQuad, Polygon, Preset, Rect, RenderTarget, Shape,
        SimulationSettings, SkipReason, Vec2, Vec4,
    };
}
