use std::time::Duration;

use anyhow::Result;
use log::{error, info};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;

use ferris_quad_vk::config::Config;
use ferris_quad_vk::device::{LogicalDevice, select_physical_device};
use ferris_quad_vk::gpu::DeviceApi;
use ferris_quad_vk::instance::VulkanInstance;
use ferris_quad_vk::renderer::{InitFailure, Renderer};
use ferris_quad_vk::scene::{QuadBuffers, QuadPipeline};
use ferris_quad_vk::window::{WindowSurface, WinitSurface};

/// Everything that lives on the GPU.
struct Gpu {
    renderer: Renderer<VulkanInstance, QuadPipeline>,
    buffers: QuadBuffers,
}

impl Gpu {
    fn create(surface: &WinitSurface, config: &Config) -> Result<Self> {
        let mut instance = VulkanInstance::create(surface.window(), config)?;

        let selected = match select_physical_device(&instance) {
            Ok(selected) => selected,
            Err(e) => {
                unsafe { instance.destroy() };
                return Err(e.into());
            }
        };

        let device = match LogicalDevice::open(&instance, &selected) {
            Ok(device) => device,
            Err(e) => {
                unsafe { instance.destroy() };
                return Err(e.into());
            }
        };

        let mut pipeline = match QuadPipeline::new(device.raw()) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                unsafe {
                    device.raw().destroy();
                    instance.destroy();
                }
                return Err(e);
            }
        };

        let mut buffers = match QuadBuffers::create(&device, pipeline.descriptor_set_layout()) {
            Ok(buffers) => buffers,
            Err(e) => {
                unsafe {
                    pipeline.destroy(device.raw());
                    device.raw().destroy();
                    instance.destroy();
                }
                return Err(e);
            }
        };

        let geometry = buffers.geometry();
        let size = surface.framebuffer_size();
        let renderer = match Renderer::initialize(
            instance, device, selected, size, pipeline, geometry,
        ) {
            Ok(renderer) => renderer,
            Err(InitFailure { error, mut parts }) => {
                unsafe {
                    let device = parts.device.raw();
                    let _ = device.wait_idle();
                    buffers.destroy(device);
                    parts.pipeline_source.destroy(device);
                    device.destroy();
                    parts.instance.destroy();
                }
                return Err(error.into());
            }
        };

        Ok(Self { renderer, buffers })
    }

    fn render(&mut self, surface: &mut WinitSurface) -> Result<()> {
        self.renderer.draw_frame(surface, &mut self.buffers)?;
        self.buffers.reclaim_staging(self.renderer.device().raw())?;
        Ok(())
    }

    fn destroy(self) -> Result<()> {
        let Self {
            renderer,
            mut buffers,
        } = self;
        let mut parts = renderer.shutdown()?;

        unsafe {
            let device = parts.device.raw();
            buffers.destroy(device);
            parts.pipeline_source.destroy(device);
            device.destroy();
            parts.instance.destroy();
        }

        Ok(())
    }
}

/// Idle time between frames while the window is minimized.
const MINIMIZED_WAIT: Duration = Duration::from_millis(16);

fn run(surface: &mut WinitSurface, gpu: &mut Gpu) -> Result<()> {
    while !surface.close_requested() {
        if surface.is_minimized() {
            surface.pump(Some(MINIMIZED_WAIT));
            continue;
        }

        surface.pump(Some(Duration::ZERO));
        if !surface.close_requested() {
            gpu.render(surface)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = Config::from_env()?;
    info!(
        "Starting `{}` at {}x{} (validation: {}).",
        config.title, config.width, config.height, config.validation
    );

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height))
        .build(&event_loop)?;

    let mut surface = WinitSurface::new(event_loop, window);
    let mut gpu = Gpu::create(&surface, &config)?;

    let result = run(&mut surface, &mut gpu);
    if let Err(e) = &result {
        error!("Frame failed: {e:#}");
    }

    match (result, gpu.destroy()) {
        (Err(e), _) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}
