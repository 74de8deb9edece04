use anyhow::{Result, anyhow};
use vulkanalia::prelude::v1_0::*;

const QUAD_VERT: &str = include_str!("../../shaders/quad.vert");
const QUAD_FRAG: &str = include_str!("../../shaders/quad.frag");

/// SPIR-V for both stages of the quad pipeline.
#[derive(Clone, Debug)]
pub struct QuadShaders {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl QuadShaders {
    pub fn compile() -> Result<Self> {
        let compiler = shaderc::Compiler::new()
            .map_err(|e| anyhow!("Failed to initialise the shader compiler: {}", e))?;

        Ok(Self {
            vertex: compile(&compiler, QUAD_VERT, shaderc::ShaderKind::Vertex, "quad.vert")?,
            fragment: compile(&compiler, QUAD_FRAG, shaderc::ShaderKind::Fragment, "quad.frag")?,
        })
    }
}

fn compile(
    compiler: &shaderc::Compiler,
    source: &str,
    kind: shaderc::ShaderKind,
    name: &str,
) -> Result<Vec<u32>> {
    let compiled = compiler
        .compile_into_spirv(source, kind, name, "main", None)
        .map_err(|e| anyhow!("Failed to compile {}: {}", name, e))?;

    if compiled.get_num_warnings() > 0 {
        log::warn!("{}: {}", name, compiled.get_warning_messages());
    }

    Ok(compiled.as_binary().to_vec())
}

pub fn create_shader_module(device: &Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::builder()
        .code_size(std::mem::size_of_val(code))
        .code(code);

    Ok(unsafe { device.create_shader_module(&info, None)? })
}
