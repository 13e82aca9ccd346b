use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;

use crate::shaders;

/// The fixed set of fragment programs the solver draws with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Pass {
    Copy,
    Clear,
    Splat,
    Curl,
    Vorticity,
    Divergence,
    Pressure,
    GradientSubtract,
    Advection,
    Display,
}

impl Pass {
    fn body(self) -> &'static str {
        match self {
            Pass::Copy => shaders::COPY_SHADER,
            Pass::Clear => shaders::CLEAR_SHADER,
            Pass::Splat => shaders::SPLAT_SHADER,
            Pass::Curl => shaders::CURL_SHADER,
            Pass::Vorticity => shaders::VORTICITY_SHADER,
            Pass::Divergence => shaders::DIVERGENCE_SHADER,
            Pass::Pressure => shaders::PRESSURE_SHADER,
            Pass::GradientSubtract => shaders::GRADIENT_SUBTRACT_SHADER,
            Pass::Advection => shaders::ADVECTION_SHADER,
            Pass::Display => shaders::DISPLAY_SHADER,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Pass::Copy => "copy",
            Pass::Clear => "clear",
            Pass::Splat => "splat",
            Pass::Curl => "curl",
            Pass::Vorticity => "vorticity",
            Pass::Divergence => "divergence",
            Pass::Pressure => "pressure",
            Pass::GradientSubtract => "gradient subtract",
            Pass::Advection => "advection",
            Pass::Display => "display",
        }
    }

    fn texture_count(self) -> usize {
        match self {
            Pass::Vorticity | Pass::Pressure | Pass::GradientSubtract | Pass::Advection => 2,
            _ => 1,
        }
    }

    fn blend(self) -> Option<wgpu::BlendState> {
        match self {
            // The composite draws the dye over the cleared surface with
            // straight alpha; every simulation pass overwrites its target.
            Pass::Display => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            _ => None,
        }
    }
}

/// Identity of a compiled variant. Keywords are kept sorted so two requests
/// for the same combination always hash alike, and distinct combinations can
/// never collide the way summed per-keyword hashes could.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ProgramKey {
    pass: Pass,
    format: wgpu::TextureFormat,
    keywords: Vec<&'static str>,
}

impl ProgramKey {
    fn new(pass: Pass, format: wgpu::TextureFormat, keywords: &[&'static str]) -> Self {
        let mut keywords = keywords.to_vec();
        keywords.sort_unstable();
        Self {
            pass,
            format,
            keywords,
        }
    }
}

/// Per-pass parameters, uploaded through a staging copy so each pass in a
/// frame's encoder sees its own values. Layout mirrors the `PassParams`
/// uniform block in the GLSL header: five std140 vec4 rows.
#[repr(C, align(16))]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct PassUniforms {
    /// xy: target grid texel size (drives the vertex neighbor offsets),
    /// zw: velocity grid texel size (advection backtrace).
    texel: [f32; 4],
    /// xy: source grid texel size for the manual bilinear path.
    source_texel: [f32; 4],
    /// rgb: splat color; x doubles as the clear scale factor.
    color: [f32; 4],
    /// xy: splat center, z: splat radius, w: aspect ratio.
    point: [f32; 4],
    /// x: dt, y: dissipation, z: curl strength.
    scalars: [f32; 4],
}

impl PassUniforms {
    pub fn new() -> Self {
        Self::zeroed()
    }

    pub fn set_target_texel(&mut self, texel: [f32; 2]) {
        self.texel[0] = texel[0];
        self.texel[1] = texel[1];
    }

    pub fn set_velocity_texel(&mut self, texel: [f32; 2]) {
        self.texel[2] = texel[0];
        self.texel[3] = texel[1];
    }

    pub fn set_source_texel(&mut self, texel: [f32; 2]) {
        self.source_texel[0] = texel[0];
        self.source_texel[1] = texel[1];
    }

    pub fn set_color(&mut self, color: [f32; 3]) {
        self.color[0] = color[0];
        self.color[1] = color[1];
        self.color[2] = color[2];
    }

    pub fn set_clear_scale(&mut self, scale: f32) {
        self.color[0] = scale;
    }

    pub fn set_point(&mut self, x: f32, y: f32) {
        self.point[0] = x;
        self.point[1] = y;
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.point[2] = radius;
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.point[3] = aspect;
    }

    pub fn set_dt(&mut self, dt: f32) {
        self.scalars[0] = dt;
    }

    pub fn set_dissipation(&mut self, dissipation: f32) {
        self.scalars[1] = dissipation;
    }

    pub fn set_curl_strength(&mut self, curl: f32) {
        self.scalars[2] = curl;
    }
}

/// Compiles and caches the pass pipelines, and owns the shared uniform buffer
/// plus bind group layouts. Variants specialize lazily on first request;
/// hitting a cached variant never recompiles.
pub(crate) struct ProgramCache {
    device: wgpu::Device,
    vertex_module: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    single_texture_layout: wgpu::BindGroupLayout,
    double_texture_layout: wgpu::BindGroupLayout,
    filterable: bool,
    pipelines: HashMap<ProgramKey, wgpu::RenderPipeline>,
}

impl ProgramCache {
    pub fn new(device: &wgpu::Device, filterable: bool) -> Self {
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fullscreen triangle vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(shaders::VERTEX_SHADER),
                stage: ShaderStage::Vertex,
                defines: &[],
            },
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pass uniform buffer"),
            size: std::mem::size_of::<PassUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pass uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let single_texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("single texture layout"),
            entries: &texture_layout_entries(1, filterable),
        });
        let double_texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("double texture layout"),
            entries: &texture_layout_entries(2, filterable),
        });

        Self {
            device: device.clone(),
            vertex_module,
            uniform_layout,
            uniform_buffer,
            uniform_bind_group,
            single_texture_layout,
            double_texture_layout,
            filterable,
            pipelines: HashMap::new(),
        }
    }

    fn texture_layout(&self, count: usize) -> &wgpu::BindGroupLayout {
        match count {
            1 => &self.single_texture_layout,
            _ => &self.double_texture_layout,
        }
    }

    fn pipeline(
        &mut self,
        pass: Pass,
        format: wgpu::TextureFormat,
        keywords: &[&'static str],
    ) -> wgpu::RenderPipeline {
        let key = ProgramKey::new(pass, format, keywords);
        if let Some(pipeline) = self.pipelines.get(&key) {
            return pipeline.clone();
        }

        tracing::debug!(
            pass = pass.label(),
            ?format,
            keywords = ?key.keywords,
            "compiling shader variant"
        );

        let source = format!("{}{}", shaders::FRAGMENT_HEADER, pass.body());
        let defines: Vec<(&str, &str)> =
            key.keywords.iter().map(|keyword| (*keyword, "1")).collect();
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(pass.label()),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(source),
                stage: ShaderStage::Fragment,
                defines: &defines,
            },
        });

        let texture_layout = self.texture_layout(pass.texture_count());
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(pass.label()),
                bind_group_layouts: &[&self.uniform_layout, texture_layout],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(pass.label()),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.vertex_module,
                    entry_point: Some("main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: pass.blend(),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });

        self.pipelines.insert(key, pipeline.clone());
        pipeline
    }

    /// Encodes one full-screen pass: stages the uniforms through a copy so
    /// the values stick to this draw, binds the input textures, and draws the
    /// triangle into `target_view`.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        pass: Pass,
        keywords: &[&'static str],
        uniforms: &PassUniforms,
        inputs: &[(&wgpu::TextureView, &wgpu::Sampler)],
        target_view: &wgpu::TextureView,
        target_format: wgpu::TextureFormat,
        clear: Option<wgpu::Color>,
    ) -> Result<()> {
        debug_assert_eq!(inputs.len(), pass.texture_count(), "pass input arity");

        let pipeline = self.pipeline(pass, target_format, keywords);

        let staging = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pass uniform staging"),
            contents: bytemuck::bytes_of(uniforms),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        encoder.copy_buffer_to_buffer(
            &staging,
            0,
            &self.uniform_buffer,
            0,
            std::mem::size_of::<PassUniforms>() as u64,
        );

        let mut entries = Vec::with_capacity(inputs.len() * 2);
        for (index, (view, sampler)) in inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: (index as u32) * 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (index as u32) * 2 + 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let texture_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(pass.label()),
            layout: self.texture_layout(pass.texture_count()),
            entries: &entries,
        });

        let load = match clear {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &texture_bind_group, &[]);
        render_pass.draw(0..3, 0..1);

        Ok(())
    }

    pub fn linear_filtering(&self) -> bool {
        self.filterable
    }
}

fn texture_layout_entries(count: usize, filterable: bool) -> Vec<wgpu::BindGroupLayoutEntry> {
    let sampler_type = if filterable {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };
    let mut entries = Vec::with_capacity(count * 2);
    for index in 0..count {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: (index as u32) * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: (index as u32) * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(sampler_type),
            count: None,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_keys_are_order_insensitive() {
        let a = ProgramKey::new(
            Pass::Display,
            wgpu::TextureFormat::Rgba16Float,
            &["SHADING", "MANUAL_FILTERING"],
        );
        let b = ProgramKey::new(
            Pass::Display,
            wgpu::TextureFormat::Rgba16Float,
            &["MANUAL_FILTERING", "SHADING"],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_keyword_sets_never_collide() {
        let shaded = ProgramKey::new(Pass::Display, wgpu::TextureFormat::Rgba16Float, &["SHADING"]);
        let plain = ProgramKey::new(Pass::Display, wgpu::TextureFormat::Rgba16Float, &[]);
        let manual = ProgramKey::new(
            Pass::Display,
            wgpu::TextureFormat::Rgba16Float,
            &["MANUAL_FILTERING"],
        );
        assert_ne!(shaded, plain);
        assert_ne!(shaded, manual);
        assert_ne!(plain, manual);
    }

    #[test]
    fn same_keywords_different_formats_are_distinct() {
        let rgba = ProgramKey::new(Pass::Splat, wgpu::TextureFormat::Rgba16Float, &[]);
        let rg = ProgramKey::new(Pass::Splat, wgpu::TextureFormat::Rg16Float, &[]);
        assert_ne!(rgba, rg);
    }

    #[test]
    fn uniforms_are_one_std140_block() {
        // Five vec4 rows; the GLSL block depends on this exact size.
        assert_eq!(std::mem::size_of::<PassUniforms>(), 80);
    }
}
