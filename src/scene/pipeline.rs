use anyhow::Result;
use log::debug;
use vulkanalia::prelude::v1_0::*;

use super::buffers::Vertex;
use super::shader::{QuadShaders, create_shader_module};
use crate::gpu::vulkan::VulkanDevice;
use crate::renderer::PipelineSource;

/// The quad's graphics pipeline. Shaders are compiled once; the pipeline
/// itself is rebuilt whenever the renderer hands over a new render pass.
pub struct QuadPipeline {
    shaders: QuadShaders,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
}

impl QuadPipeline {
    pub fn new(device: &VulkanDevice) -> Result<Self> {
        let shaders = QuadShaders::compile()?;
        let device = device.raw();

        let bindings = &[vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .build()];

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);
        let descriptor_set_layout =
            unsafe { device.create_descriptor_set_layout(&layout_info, None)? };

        let set_layouts = &[descriptor_set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
        let pipeline_layout = match unsafe { device.create_pipeline_layout(&layout_info, None) } {
            Ok(layout) => layout,
            Err(error) => {
                unsafe { device.destroy_descriptor_set_layout(descriptor_set_layout, None) };
                return Err(error.into());
            }
        };

        Ok(Self {
            shaders,
            descriptor_set_layout,
            pipeline_layout,
        })
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    /// # Safety
    /// No pipeline built from this source may still be alive.
    pub unsafe fn destroy(&mut self, device: &VulkanDevice) {
        let device = device.raw();
        unsafe {
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
    }
}

impl PipelineSource<VulkanDevice> for QuadPipeline {
    fn create_pipeline(
        &mut self,
        device: &VulkanDevice,
        render_pass: vk::RenderPass,
    ) -> Result<vk::Pipeline> {
        let device = device.raw();
        let vert_shader_module = create_shader_module(device, &self.shaders.vertex)?;
        let frag_shader_module = match create_shader_module(device, &self.shaders.fragment) {
            Ok(module) => module,
            Err(error) => {
                unsafe { device.destroy_shader_module(vert_shader_module, None) };
                return Err(error);
            }
        };

        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_shader_module)
            .name(b"main\0");

        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_shader_module)
            .name(b"main\0");

        let binding_descriptions = &[Vertex::binding_description()];
        let attribute_descriptions = &Vertex::attribute_descriptions();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(binding_descriptions)
            .vertex_attribute_descriptions(attribute_descriptions);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are set while recording.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::_1);

        let attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::all())
            .blend_enable(false);

        let attachments = &[attachment];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        let dynamic_states = &[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(dynamic_states);

        let stages = &[vert_stage, frag_stage];
        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(self.pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        let result =
            unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[info], None) };

        unsafe {
            device.destroy_shader_module(vert_shader_module, None);
            device.destroy_shader_module(frag_shader_module, None);
        }

        let pipeline = result?.0[0];
        debug!("Created quad pipeline {:?} for render pass {:?}.", pipeline, render_pass);
        Ok(pipeline)
    }

    fn destroy_pipeline(&mut self, device: &VulkanDevice, pipeline: vk::Pipeline) {
        unsafe { device.raw().destroy_pipeline(pipeline, None) };
    }

    fn layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }
}
