use std::{borrow::Cow, mem::offset_of};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use lib_geometry::{Camera, Projection};
use log::debug;
use wgpu::util::DeviceExt;

use crate::{Material, ModelNode};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Default)]
pub struct Vertex {
    pub position: Vec4,
    // ---- 16 byte alignment
    pub normal: Vec4,
}

impl Vertex {
    pub(crate) fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x4,
                    offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
                    shader_location: 0,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x4,
                    offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
                    shader_location: 1,
                },
            ],
        }
    }
}

/// Lights shared by all meshes of a frame. Colors are linear and already scaled by their
/// intensity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub ambient: Vec3,
    /// points from the scene towards the light
    pub direction: Vec3,
    pub directional: Vec3,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FrameUniforms {
    view: Mat4,
    projection: Mat4,
    ambient: Vec4,
    light_direction: Vec4,
    light_color: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MeshUniforms {
    model: Mat4,
    normal: Mat4,
    base_color: Vec4,
    /// metallic, roughness, shading mode, unused
    params: Vec4,
}

impl MeshUniforms {
    const NORMAL_SHADING: f32 = 0.0;
    const STANDARD_SHADING: f32 = 1.0;

    fn new(model: Mat4, material: Material) -> Self {
        let (base_color, params) = match material {
            Material::Normal => (Vec4::ONE, Vec4::new(0.0, 1.0, Self::NORMAL_SHADING, 0.0)),
            Material::Standard {
                base_color,
                metallic,
                roughness,
            } => (
                base_color,
                Vec4::new(metallic, roughness, Self::STANDARD_SHADING, 0.0),
            ),
        };
        Self {
            model,
            normal: model.inverse().transpose(),
            base_color,
            params,
        }
    }
}

/// The GPU side of one mesh.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GpuMesh {
    fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.uniform_buffer.destroy();
    }
}

/// Draws a [`ModelNode`] hierarchy.
///
/// Meshes are uploaded once with [`ModelRenderer::upload`] and stay on the GPU until the next
/// upload or until [`ModelRenderer::dispose`] is called.
pub struct ModelRenderer {
    pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    mesh_bind_group_layout: wgpu::BindGroupLayout,
    meshes: Vec<GpuMesh>,
}

impl ModelRenderer {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        view_format: wgpu::TextureFormat,
        depth_stencil_state: wgpu::DepthStencilState,
        sample_count: u32,
    ) -> Self {
        let uniform_layout_entry = |min_binding_size: usize| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(min_binding_size as u64),
            },
            count: None,
        };

        let frame_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("model frame bind group layout"),
                entries: &[uniform_layout_entry(size_of::<FrameUniforms>())],
            });
        let mesh_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("model mesh bind group layout"),
                entries: &[uniform_layout_entry(size_of::<MeshUniforms>())],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("model pipeline layout"),
            bind_group_layouts: &[&frame_bind_group_layout, &mesh_bind_group_layout],
            push_constant_ranges: &[],
        });

        let frame_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("model frame uniform buffer"),
            contents: &[0_u8; size_of::<FrameUniforms>()],
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("model frame bind group"),
            layout: &frame_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("model shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("../shaders/model.wgsl"))),
        });

        let pipeline = Self::create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            &[Vertex::buffer_layout()],
            view_format,
            depth_stencil_state,
            sample_count,
        );

        Self {
            pipeline,
            frame_buffer,
            frame_bind_group,
            mesh_bind_group_layout,
            meshes: Vec::new(),
        }
    }

    /// Replaces the meshes on the GPU with the ones of `model`. Passing `None` only releases the
    /// previous meshes.
    pub fn upload(&mut self, device: &wgpu::Device, model: Option<&ModelNode>) {
        self.release_meshes();

        let Some(model) = model else {
            return;
        };

        let mut meshes = Vec::with_capacity(model.mesh_count());
        model.visit_meshes(Mat4::IDENTITY, &mut |mesh, matrix| {
            let geometry = &mesh.geometry;
            let vertices = geometry
                .positions
                .iter()
                .zip(geometry.normals.iter().chain(std::iter::repeat(&Vec3::ZERO)))
                .map(|(&position, &normal)| Vertex {
                    position: position.extend(1.0),
                    normal: normal.extend(0.0),
                })
                .collect::<Vec<_>>();
            let indices = geometry.triangle_indices();
            let Ok(index_count) = u32::try_from(indices.len()) else {
                log::warn!("skipping mesh with {} indices", indices.len());
                return;
            };
            if index_count == 0 {
                return;
            }

            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("model vertex buffer"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("model index buffer"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            let uniforms = MeshUniforms::new(matrix, mesh.material);
            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("model mesh uniform buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("model mesh bind group"),
                layout: &self.mesh_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

            meshes.push(GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count,
                uniform_buffer,
                bind_group,
            });
        });

        debug!("uploaded {} meshes", meshes.len());
        self.meshes = meshes;
    }

    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn render<'pass>(
        &'pass self,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'pass>,
        camera: &Camera,
        projection: &Projection,
        lighting: &Lighting,
    ) {
        if self.meshes.is_empty() {
            return;
        }
        self.update_frame(queue, camera, projection, lighting);

        render_pass.push_debug_group("Prepare model data for draw.");
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
        render_pass.pop_debug_group();

        for mesh in &self.meshes {
            render_pass.set_bind_group(1, &mesh.bind_group, &[]);
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }

    /// Releases every GPU resource owned by the renderer. The renderer draws nothing afterwards.
    pub fn dispose(&mut self) {
        self.release_meshes();
        self.frame_buffer.destroy();
    }

    fn release_meshes(&mut self) {
        for mesh in self.meshes.drain(..) {
            mesh.destroy();
        }
    }

    fn update_frame(
        &self,
        queue: &wgpu::Queue,
        camera: &Camera,
        projection: &Projection,
        lighting: &Lighting,
    ) {
        let uniforms = FrameUniforms {
            view: camera.view_matrix(),
            projection: projection.matrix(),
            ambient: lighting.ambient.extend(1.0),
            light_direction: lighting.direction.normalize_or_zero().extend(0.0),
            light_color: lighting.directional.extend(1.0),
        };
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    fn create_pipeline(
        device: &wgpu::Device,
        pipeline_layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        vertex_buffers: &[wgpu::VertexBufferLayout<'_>; 1],
        view_format: wgpu::TextureFormat,
        depth_stencil_state: wgpu::DepthStencilState,
        sample_count: u32,
    ) -> wgpu::RenderPipeline {
        let vertex = wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: vertex_buffers,
        };

        let fragment_state = wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(view_format.into())],
        };

        // STL files often have inconsistent winding, the fragment shader flips back faces instead
        let primitive = wgpu::PrimitiveState {
            cull_mode: None,
            ..Default::default()
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("model pipeline"),
            layout: Some(pipeline_layout),
            vertex,
            fragment: Some(fragment_state),
            primitive,
            depth_stencil: Some(depth_stencil_state),
            multisample: wgpu::MultisampleState {
                count: sample_count,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        })
    }
}
