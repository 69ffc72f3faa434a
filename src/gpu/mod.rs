//! Device acquisition and the GPU simulation engine.
//!
//! Per frame the engine writes a fresh parameter block, optionally clears
//! the simulation image, dispatches one kernel invocation per sub-particle,
//! decays trails when the image is not cleared, blits the image onto the
//! frame target, then submits and presents.
//!
//! The particle buffer is bound once as `read_write` storage. The kernel
//! updates each sub-particle in place and never reads another particle's
//! slot, so no second buffer is kept.

mod params;
mod post_process;
mod present;
mod readback;

use glam::{Vec2, Vec4};
use image::RgbaImage;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use wgpu::util::DeviceExt;

use crate::attractor::AttractorSet;
use crate::behavior::StepParams;
use crate::config::{LabConfig, SimulationSettings};
use crate::engine::{EngineState, FrameOutcome, LabDelegate, ParticleEngine, RenderTarget, SkipReason};
use crate::error::{EngineError, GpuError};
use crate::particle::ParticleQuad;
use crate::shaders::{PARTICLES, PARTICLE_WORKGROUP_SIZE};
use crate::store::{ParticleStore, ResetSummary};
use crate::time::FrameClock;

use params::ParamsUniform;
use post_process::PostProcessState;
use present::Presenter;

/// Format of the simulation image.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Largest workgroup count allowed in one dimension of a dispatch.
const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65_535;

/// Workgroup grid covering `invocations` with `workgroup_size`-wide groups.
///
/// Counts that do not fit in x spill into y; the kernel flattens the grid
/// back with `gid.x + gid.y * groups.x * workgroup_size`.
pub fn dispatch_dims(invocations: u32, workgroup_size: u32) -> (u32, u32) {
    let groups = invocations.div_ceil(workgroup_size);
    if groups <= MAX_WORKGROUPS_PER_DIMENSION {
        (groups, 1)
    } else {
        (MAX_WORKGROUPS_PER_DIMENSION, groups.div_ceil(MAX_WORKGROUPS_PER_DIMENSION))
    }
}

/// An adapter, device and queue.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Request a high-performance adapter (or the software fallback when
    /// `force_fallback_adapter` is set) and a device whose storage limits can
    /// hold `storage_bytes` in one binding.
    pub async fn acquire(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'static>>,
        storage_bytes: u64,
        force_fallback_adapter: bool,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let supported = adapter.limits();
        if storage_bytes > supported.max_storage_buffer_binding_size as u64
            || storage_bytes > supported.max_buffer_size
        {
            return Err(GpuError::BufferTooLarge {
                requested: storage_bytes,
                limit: (supported.max_storage_buffer_binding_size as u64).min(supported.max_buffer_size),
            });
        }

        let defaults = wgpu::Limits::default();
        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: defaults
                .max_storage_buffer_binding_size
                .max(storage_bytes as u32),
            max_buffer_size: defaults.max_buffer_size.max(storage_bytes),
            ..defaults
        }
        .using_resolution(supported);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Particle Lab Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// Everything bound to the device; dropped at teardown.
struct GpuResources {
    context: GpuContext,
    compute_pipeline: wgpu::ComputePipeline,
    compute_layout: wgpu::BindGroupLayout,
    compute_bind_group: wgpu::BindGroup,
    particle_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    seed_buffer: wgpu::Buffer,
    image: wgpu::Texture,
    image_view: wgpu::TextureView,
    post_process: PostProcessState,
    presenter: Presenter,
}

impl GpuResources {
    fn rebuild_seed_buffer(&mut self, seeds: &[Vec2]) {
        self.seed_buffer = create_seed_buffer(&self.context.device, seeds);
        self.compute_bind_group = create_compute_bind_group(
            &self.context.device,
            &self.compute_layout,
            &self.particle_buffer,
            &self.params_buffer,
            &self.seed_buffer,
            &self.image_view,
        );
    }
}

/// The GPU-backed particle engine.
pub struct GpuEngine {
    state: EngineState,
    store: ParticleStore,
    wells: AttractorSet,
    settings: SimulationSettings,
    config: LabConfig,
    clock: FrameClock,
    rng: SmallRng,
    salt: u32,
    delegate: Option<Box<dyn LabDelegate>>,
    resources: Option<GpuResources>,
}

impl GpuEngine {
    /// Allocate the particle store, acquire a device and build all pipelines.
    ///
    /// Blocks on adapter and device requests.
    pub fn new(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'static>>,
        config: LabConfig,
    ) -> Result<Self, EngineError> {
        let store = ParticleStore::allocate(config.particle_count)?;
        let context = pollster::block_on(GpuContext::acquire(
            instance,
            compatible_surface,
            store.byte_len() as u64,
            config.force_fallback_adapter,
        ))?;

        let mut rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let salt = rng.gen();

        let resources = build_resources(context, &store, &config)?;

        log::info!(
            "Particle lab ready: {} particles in {}x{} image",
            store.visible_count(),
            config.image_width,
            config.image_height
        );

        Ok(Self {
            state: EngineState::Ready,
            wells: AttractorSet::new(config.image_width, config.image_height),
            settings: SimulationSettings::default(),
            store,
            config,
            clock: FrameClock::new(),
            rng,
            salt,
            delegate: None,
            resources: Some(resources),
        })
    }

    pub fn set_delegate(&mut self, delegate: Box<dyn LabDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    /// Device in use, until teardown.
    pub fn device(&self) -> Option<&wgpu::Device> {
        self.resources.as_ref().map(|r| &r.context.device)
    }

    /// Configure `surface` for presenting this engine's frames and return
    /// the chosen format.
    pub fn configure_surface(
        &self,
        surface: &wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> Option<wgpu::TextureFormat> {
        let resources = self.resources.as_ref()?;
        let caps = surface.get_capabilities(&resources.context.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or(caps.formats.first())
            .copied()?;
        let alpha_mode = caps.alpha_modes.first().copied()?;

        surface.configure(
            &resources.context.device,
            &wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format,
                width: width.max(1),
                height: height.max(1),
                present_mode: wgpu::PresentMode::AutoVsync,
                alpha_mode,
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            },
        );
        Some(format)
    }

    /// Host copy of the particles, refreshed from the device.
    pub fn read_particles(&mut self) -> Result<&[ParticleQuad], EngineError> {
        if let Some(resources) = self.resources.as_ref() {
            readback::read_buffer_into(
                &resources.context.device,
                &resources.context.queue,
                &resources.particle_buffer,
                self.store.as_bytes_mut(),
            )?;
        }
        Ok(self.store.quads())
    }

    /// Edit the current particle state on the host and upload the result.
    ///
    /// `edit` sees the flat per-sub-particle view.
    pub fn edit_particles<F>(&mut self, edit: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut [Vec4]),
    {
        self.read_particles()?;
        edit(self.store.sub_particles_mut());
        if let Some(resources) = self.resources.as_ref() {
            resources
                .context
                .queue
                .write_buffer(&resources.particle_buffer, 0, self.store.as_bytes());
        }
        Ok(())
    }

    /// Copy of the simulation image as it stands after the last frame.
    pub fn capture_image(&self) -> Result<RgbaImage, EngineError> {
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| GpuError::BufferMapping("engine torn down".into()))?;
        Ok(readback::read_texture(
            &resources.context.device,
            &resources.context.queue,
            &resources.image,
        )?)
    }
}

impl ParticleEngine for GpuEngine {
    fn state(&self) -> EngineState {
        self.state
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
        self.store.visible_count()
    }

    fn reset_particles(&mut self, regenerate_positions: bool) -> ResetSummary {
        let Some(resources) = self.resources.as_mut() else {
            return ResetSummary::default();
        };

        let fresh_seeds = regenerate_positions.then(|| match self.delegate.as_mut() {
            Some(delegate) => delegate.positions_for_reset(self.store.visible_count()),
            None => Vec::new(),
        });
        let seeds_changed = fresh_seeds.is_some();

        let summary = self.store.reset(fresh_seeds, &mut self.rng);

        // Only the seeded prefix is written so unseeded particles keep their
        // device-side state.
        let seeded_bytes = summary.seeded * std::mem::size_of::<Vec4>();
        if seeded_bytes > 0 {
            resources.context.queue.write_buffer(
                &resources.particle_buffer,
                0,
                &self.store.as_bytes()[..seeded_bytes],
            );
        }
        if seeds_changed {
            resources.rebuild_seed_buffer(self.store.seeds());
        }
        summary
    }

    fn step(&mut self, target: RenderTarget<'_>) -> FrameOutcome {
        let Some(resources) = self.resources.as_mut() else {
            return FrameOutcome::Inactive;
        };

        // 1. Acquire this frame's render target.
        let surface_texture = match target {
            RenderTarget::Surface(surface) => match surface.get_current_texture() {
                Ok(texture) => Some(texture),
                Err(e) => {
                    log::debug!("Skipping frame, no surface texture: {}", e);
                    return FrameOutcome::Skipped(SkipReason::Surface(e));
                }
            },
            RenderTarget::Texture(texture) => {
                if !texture.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
                    log::debug!("Skipping frame, target texture is not renderable");
                    return FrameOutcome::Skipped(SkipReason::IncompatibleTarget);
                }
                None
            }
        };
        let target_texture = match (&surface_texture, target) {
            (Some(surface_texture), _) => &surface_texture.texture,
            (None, RenderTarget::Texture(texture)) => texture,
            (None, RenderTarget::Surface(_)) => return FrameOutcome::Inactive,
        };
        let target_format = target_texture.format();
        let target_view = target_texture.create_view(&wgpu::TextureViewDescriptor::default());
        resources.presenter.prepare(&resources.context.device, target_format);

        // 2. Snapshot the parameters for this dispatch.
        let step = StepParams::new(&self.settings, &self.wells, self.clock.frame() as u32, self.salt);
        let uniform = ParamsUniform::new(
            &step,
            self.settings.color,
            self.store.seeds().len() as u32,
            self.store.visible_count() as u32,
        );
        resources
            .context
            .queue
            .write_buffer(&resources.params_buffer, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = resources
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        // 3. Clear when trails are off.
        if self.settings.clear_on_step {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &resources.image_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        // 4. Update and rasterize every sub-particle.
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Particle Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&resources.compute_pipeline);
            compute_pass.set_bind_group(0, &resources.compute_bind_group, &[]);
            let (groups_x, groups_y) =
                dispatch_dims(self.store.visible_count() as u32, PARTICLE_WORKGROUP_SIZE);
            compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        // 5. Decay trails.
        if !self.settings.clear_on_step {
            resources.post_process.encode(&mut encoder);
        }

        resources
            .presenter
            .encode(&mut encoder, &target_view, target_format);

        // 6. Submit, present, notify.
        resources.context.queue.submit(std::iter::once(encoder.finish()));
        if let Some(surface_texture) = surface_texture {
            surface_texture.present();
        }

        self.state = EngineState::Stepping;
        let info = self.clock.tick();
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.frame_completed(&info, &mut self.wells);
        }
        FrameOutcome::Presented(info)
    }

    fn teardown(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.context.device.poll(wgpu::Maintain::Wait);
            resources.post_process.destroy();
            resources.image.destroy();
            resources.particle_buffer.destroy();
            resources.seed_buffer.destroy();
            log::debug!("Particle lab torn down");
        }
        self.state = EngineState::TornDown;
    }
}

impl Drop for GpuEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn build_resources(
    context: GpuContext,
    store: &ParticleStore,
    config: &LabConfig,
) -> Result<GpuResources, EngineError> {
    let device = &context.device;
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Particle Buffer"),
        contents: store.as_bytes(),
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
    });

    let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Params Buffer"),
        size: std::mem::size_of::<ParamsUniform>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let seed_buffer = create_seed_buffer(device, store.seeds());

    let image = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Simulation Image"),
        size: wgpu::Extent3d {
            width: config.image_width,
            height: config.image_height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: IMAGE_FORMAT,
        usage: wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let image_view = image.create_view(&wgpu::TextureViewDescriptor::default());

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Particle Shader"),
        source: wgpu::ShaderSource::Wgsl(PARTICLES.into()),
    });

    let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Particle Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: IMAGE_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Particle Pipeline Layout"),
        bind_group_layouts: &[&compute_layout],
        push_constant_ranges: &[],
    });

    let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Particle Pipeline"),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });

    let compute_bind_group = create_compute_bind_group(
        device,
        &compute_layout,
        &particle_buffer,
        &params_buffer,
        &seed_buffer,
        &image_view,
    );

    let post_process = PostProcessState::new(device, &image);
    let presenter = Presenter::new(device, &image);

    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(EngineError::Pipeline(error.to_string()));
    }

    Ok(GpuResources {
        context,
        compute_pipeline,
        compute_layout,
        compute_bind_group,
        particle_buffer,
        params_buffer,
        seed_buffer,
        image,
        image_view,
        post_process,
        presenter,
    })
}

fn create_seed_buffer(device: &wgpu::Device, seeds: &[Vec2]) -> wgpu::Buffer {
    // Storage bindings may not be empty.
    let placeholder = [Vec2::ZERO];
    let contents: &[Vec2] = if seeds.is_empty() { &placeholder } else { seeds };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Seed Buffer"),
        contents: bytemuck::cast_slice(contents),
        usage: wgpu::BufferUsages::STORAGE,
    })
}

fn create_compute_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    particle_buffer: &wgpu::Buffer,
    params_buffer: &wgpu::Buffer,
    seed_buffer: &wgpu::Buffer,
    image_view: &wgpu::TextureView,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Particle Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: particle_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: params_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: seed_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(image_view),
            },
        ],
    })
}
