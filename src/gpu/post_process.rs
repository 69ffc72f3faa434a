//! Trail decay for accumulated frames.
//!
//! Blurs the simulation image into a scratch texture, then erodes the
//! scratch texture back into the simulation image. Both passes are compute
//! dispatches over 16×16 tiles sharing one bind group layout.

use crate::shaders::{POST_PROCESS, POST_PROCESS_TILE};

/// GPU resources for the blur and erode passes.
pub(crate) struct PostProcessState {
    /// Intermediate image written by the blur pass.
    scratch: wgpu::Texture,
    blur_pipeline: wgpu::ComputePipeline,
    erode_pipeline: wgpu::ComputePipeline,
    /// Reads the simulation image, writes scratch.
    blur_bind_group: wgpu::BindGroup,
    /// Reads scratch, writes the simulation image.
    erode_bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

impl PostProcessState {
    pub fn new(device: &wgpu::Device, image: &wgpu::Texture) -> Self {
        let (width, height) = (image.width(), image.height());

        let scratch = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Trail Scratch Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: super::IMAGE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post-Process Shader"),
            source: wgpu::ShaderSource::Wgsl(POST_PROCESS.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post-Process Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: super::IMAGE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post-Process Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline = |label: &str, entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let blur_pipeline = make_pipeline("Blur Pipeline", "blur");
        let erode_pipeline = make_pipeline("Erode Pipeline", "erode");

        let image_view = image.create_view(&wgpu::TextureViewDescriptor::default());
        let scratch_view = scratch.create_view(&wgpu::TextureViewDescriptor::default());

        let make_bind_group = |label: &str, src: &wgpu::TextureView, dst: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(src),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(dst),
                    },
                ],
            })
        };
        let blur_bind_group = make_bind_group("Blur Bind Group", &image_view, &scratch_view);
        let erode_bind_group = make_bind_group("Erode Bind Group", &scratch_view, &image_view);

        Self {
            scratch,
            blur_pipeline,
            erode_pipeline,
            blur_bind_group,
            erode_bind_group,
            width,
            height,
        }
    }

    /// Record blur then erode into `encoder`.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        let groups_x = self.width.div_ceil(POST_PROCESS_TILE);
        let groups_y = self.height.div_ceil(POST_PROCESS_TILE);

        for (label, pipeline, bind_group) in [
            ("Blur Pass", &self.blur_pipeline, &self.blur_bind_group),
            ("Erode Pass", &self.erode_pipeline, &self.erode_bind_group),
        ] {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
    }

    pub fn destroy(&self) {
        self.scratch.destroy();
    }
}
