//! Engine interface, lifecycle and runtime device discovery.
//!
//! [`ParticleLab::create`] looks for a compute device once. With a device
//! it returns a [`GpuEngine`]; without one it notifies the delegate a single
//! time and returns a [`DisabledEngine`] whose every step is a no-op. Both
//! implement [`ParticleEngine`], so hosts drive them identically.

use glam::Vec2;

use crate::attractor::{AttractorSet, GravityWell};
use crate::config::{LabConfig, SimulationSettings};
use crate::error::EngineError;
use crate::gpu::GpuEngine;
use crate::store::ResetSummary;
use crate::time::FrameInfo;

/// Lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not yet bound to a device.
    Uninitialized,
    /// Device and pipelines acquired, no frame stepped yet.
    Ready,
    /// At least one step has run.
    Stepping,
    /// Resources released; steps are no-ops.
    TornDown,
    /// No compute device was found; steps are no-ops forever.
    DeviceUnavailable,
}

/// Why a frame was skipped. Skips are transient; the next step tries afresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The surface had no texture to hand out this frame.
    Surface(wgpu::SurfaceError),
    /// The offscreen texture cannot be rendered into.
    IncompatibleTarget,
}

/// Result of one call to [`ParticleEngine::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented.
    Presented(FrameInfo),
    /// Nothing was submitted this frame.
    Skipped(SkipReason),
    /// The engine is torn down or has no device.
    Inactive,
}

impl FrameOutcome {
    pub fn is_presented(&self) -> bool {
        matches!(self, FrameOutcome::Presented(_))
    }
}

/// Where a frame is drawn.
#[derive(Clone, Copy)]
pub enum RenderTarget<'a> {
    /// A configured window surface; a fresh texture is acquired per frame.
    Surface(&'a wgpu::Surface<'static>),
    /// An offscreen texture with `RENDER_ATTACHMENT` usage.
    Texture(&'a wgpu::Texture),
}

/// Callbacks from the engine to its host.
///
/// All methods have empty defaults so hosts implement only what they use.
pub trait LabDelegate {
    /// Called after each presented frame. Wells may be updated here for the
    /// next frame.
    fn frame_completed(&mut self, _frame: &FrameInfo, _wells: &mut AttractorSet) {}

    /// Called once if no compute device could be acquired.
    fn device_unavailable(&mut self) {}

    /// Seed positions for a reset, one per visible particle, in image pixels.
    fn positions_for_reset(&mut self, _count: usize) -> Vec<Vec2> {
        Vec::new()
    }
}

/// The operations every engine offers its host.
pub trait ParticleEngine {
    fn state(&self) -> EngineState;

    fn settings(&self) -> &SimulationSettings;

    fn settings_mut(&mut self) -> &mut SimulationSettings;

    fn gravity_wells(&self) -> &AttractorSet;

    fn gravity_wells_mut(&mut self) -> &mut AttractorSet;

    /// Number of individually simulated particles.
    fn visible_count(&self) -> usize;

    /// Reseed particles. With `regenerate_positions`, fresh seeds are pulled
    /// from the delegate; otherwise the previous seeds are reused.
    fn reset_particles(&mut self, regenerate_positions: bool) -> ResetSummary;

    /// Advance and draw one frame. Never fails; see [`FrameOutcome`].
    fn step(&mut self, target: RenderTarget<'_>) -> FrameOutcome;

    /// Release device resources. Idempotent.
    fn teardown(&mut self);

    fn set_gravity_well_properties(&mut self, well: GravityWell, x: f32, y: f32, mass: f32, spin: f32) {
        self.gravity_wells_mut().set_properties(well, x, y, mass, spin);
    }

    /// Index-addressed variant; see [`GravityWell::from_legacy_index`].
    fn set_gravity_well_properties_by_index(&mut self, index: i32, x: f32, y: f32, mass: f32, spin: f32) {
        self.gravity_wells_mut()
            .set_properties_by_index(index, x, y, mass, spin);
    }

    fn gravity_well_normalized_position(&self, well: GravityWell) -> Vec2 {
        self.gravity_wells().normalized_position(well)
    }

    fn reset_gravity_well(&mut self, well: GravityWell) {
        self.gravity_wells_mut().reset(well);
    }

    fn reset_all_gravity_wells(&mut self) {
        self.gravity_wells_mut().reset_all();
    }
}

/// Stand-in used when no compute device exists.
///
/// Settings and wells remain readable and writable so hosts need no special
/// casing, but nothing is ever simulated or drawn.
pub struct DisabledEngine {
    settings: SimulationSettings,
    wells: AttractorSet,
    visible_count: usize,
}

impl DisabledEngine {
    pub fn new(config: &LabConfig) -> Self {
        Self {
            settings: SimulationSettings::default(),
            wells: AttractorSet::new(config.image_width, config.image_height),
            visible_count: config.particle_count.visible_count(),
        }
    }
}

impl ParticleEngine for DisabledEngine {
    fn state(&self) -> EngineState {
        EngineState::DeviceUnavailable
    }

    fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut SimulationSettings {
        &mut self.settings
    }

    fn gravity_wells(&self) -> &AttractorSet {
        &self.wells
    }

    fn gravity_wells_mut(&mut self) -> &mut AttractorSet {
        &mut self.wells
    }

    fn visible_count(&self) -> usize {
        self.visible_count
    }

    fn reset_particles(&mut self, _regenerate_positions: bool) -> ResetSummary {
        ResetSummary::default()
    }

    fn step(&mut self, _target: RenderTarget<'_>) -> FrameOutcome {
        FrameOutcome::Inactive
    }

    fn teardown(&mut self) {}
}

/// The engine a host gets back from [`ParticleLab::create`].
pub enum ParticleLab {
    Gpu(Box<GpuEngine>),
    Disabled(DisabledEngine),
}

impl ParticleLab {
    /// Look for a device with a fresh instance and build the matching engine.
    ///
    /// Suitable for offscreen use. Window hosts should create their surface
    /// first and call [`ParticleLab::create_for_surface`].
    pub fn create(config: LabConfig, delegate: Option<Box<dyn LabDelegate>>) -> Result<Self, EngineError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends(),
            ..Default::default()
        });
        Self::create_for_surface(instance, None, config, delegate)
    }

    /// Look for a device able to present to `surface` and build the engine.
    ///
    /// Only allocation and pipeline failures are returned as errors. A
    /// missing device yields [`ParticleLab::Disabled`] after a single
    /// [`LabDelegate::device_unavailable`] call.
    pub fn create_for_surface(
        instance: wgpu::Instance,
        surface: Option<&wgpu::Surface<'static>>,
        config: LabConfig,
        mut delegate: Option<Box<dyn LabDelegate>>,
    ) -> Result<Self, EngineError> {
        match GpuEngine::new(instance, surface, config.clone()) {
            Ok(mut engine) => {
                if let Some(delegate) = delegate.take() {
                    engine.set_delegate(delegate);
                }
                Ok(ParticleLab::Gpu(Box::new(engine)))
            }
            Err(EngineError::Gpu(e)) if e.is_device_unavailable() => {
                log::warn!("Compute device unavailable, particle lab disabled: {}", e);
                if let Some(delegate) = delegate.as_mut() {
                    delegate.device_unavailable();
                }
                Ok(ParticleLab::Disabled(DisabledEngine::new(&config)))
            }
            Err(e) => Err(e),
        }
    }

    pub fn as_gpu(&self) -> Option<&GpuEngine> {
        match self {
            ParticleLab::Gpu(engine) => Some(engine.as_ref()),
            ParticleLab::Disabled(_) => None,
        }
    }

    pub fn as_gpu_mut(&mut self) -> Option<&mut GpuEngine> {
        match self {
            ParticleLab::Gpu(engine) => Some(engine.as_mut()),
            ParticleLab::Disabled(_) => None,
        }
    }

    fn inner(&self) -> &dyn ParticleEngine {
        match self {
            ParticleLab::Gpu(engine) => engine.as_ref(),
            ParticleLab::Disabled(engine) => engine,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ParticleEngine {
        match self {
            ParticleLab::Gpu(engine) => engine.as_mut(),
            ParticleLab::Disabled(engine) => engine,
        }
    }
}

impl ParticleEngine for ParticleLab {
    fn state(&self) -> EngineState {
        self.inner().state()
    }

    fn settings(&self) -> &SimulationSettings {
        self.inner().settings()
    }

    fn settings_mut(&mut self) -> &mut SimulationSettings {
        self.inner_mut().settings_mut()
    }

    fn gravity_wells(&self) -> &AttractorSet {
        self.inner().gravity_wells()
    }

    fn gravity_wells_mut(&mut self) -> &mut AttractorSet {
        self.inner_mut().gravity_wells_mut()
    }

    fn visible_count(&self) -> usize {
        self.inner().visible_count()
    }

    fn reset_particles(&mut self, regenerate_positions: bool) -> ResetSummary {
        self.inner_mut().reset_particles(regenerate_positions)
    }

    fn step(&mut self, target: RenderTarget<'_>) -> FrameOutcome {
        self.inner_mut().step(target)
    }

    fn teardown(&mut self) {
        self.inner_mut().teardown()
    }
}
