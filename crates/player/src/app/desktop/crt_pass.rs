use std::borrow::Cow;

use frontend::app::{
    UNIFORM_SCREEN_HEIGHT, UNIFORM_SCREEN_WIDTH, UNIFORM_TARGET_HEIGHT, UNIFORM_TARGET_WIDTH,
    UNIFORM_TARGET_X, UNIFORM_TARGET_Y,
};
use frontend::ShaderStage;
use pixels::{wgpu, PixelsContext};

const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

/// Uniform block layout shared with the WGSL `Uniforms` struct: six floats
/// padded to a 16-byte multiple.
const UNIFORM_SLOTS: usize = 8;
const UNIFORM_NAMES: [&str; 6] = [
    UNIFORM_TARGET_X,
    UNIFORM_TARGET_Y,
    UNIFORM_TARGET_WIDTH,
    UNIFORM_TARGET_HEIGHT,
    UNIFORM_SCREEN_WIDTH,
    UNIFORM_SCREEN_HEIGHT,
];

/// A linked CRT program: render pipeline plus its uniform values.
pub(crate) struct CrtProgram {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniforms: [f32; UNIFORM_SLOTS],
}

impl CrtProgram {
    /// Returns false for names the uniform block does not declare.
    pub(crate) fn set_uniform(&mut self, name: &str, value: f32) -> bool {
        match uniform_slot(name) {
            Some(slot) => {
                self.uniforms[slot] = value;
                true
            }
            None => false,
        }
    }
}

/// Shared wgpu state for CRT programs: one bind group layout (frame texture,
/// sampler, uniform block) and the surface format pipelines render into.
pub(crate) struct CrtPass {
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    target_format: wgpu::TextureFormat,
}

impl CrtPass {
    pub(crate) fn new(device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("crt_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("crt_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("crt_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            bind_group_layout,
            pipeline_layout,
            sampler,
            target_format,
        }
    }

    /// Validates one WGSL stage. The error text is wgpu's diagnostic.
    pub(crate) fn compile(
        &self,
        device: &wgpu::Device,
        stage: ShaderStage,
        source: &str,
    ) -> Result<wgpu::ShaderModule, String> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage.label()),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        });
        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(module),
        }
    }

    pub(crate) fn link(
        &self,
        device: &wgpu::Device,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
    ) -> Result<CrtProgram, String> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("crt_pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: VERTEX_ENTRY,
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: FRAGMENT_ENTRY,
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(error.to_string());
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("crt_uniforms"),
            size: (UNIFORM_SLOTS * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(CrtProgram {
            pipeline,
            uniform_buffer,
            uniforms: [0.0; UNIFORM_SLOTS],
        })
    }

    /// Draws the composed pixel buffer through `program` onto the surface.
    pub(crate) fn draw(
        &self,
        program: &CrtProgram,
        encoder: &mut wgpu::CommandEncoder,
        render_target: &wgpu::TextureView,
        context: &PixelsContext,
    ) {
        context
            .queue
            .write_buffer(&program.uniform_buffer, 0, &uniform_bytes(&program.uniforms));
        let frame_view = context
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("crt_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&frame_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: program.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("crt_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: render_target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn uniform_slot(name: &str) -> Option<usize> {
    UNIFORM_NAMES.iter().position(|candidate| *candidate == name)
}

fn uniform_bytes(values: &[f32; UNIFORM_SLOTS]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}
