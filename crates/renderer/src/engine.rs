//! Engine lifecycle.
//!
//! [`Engine::new`] brings the engine up in a fixed order:
//!
//! ```text
//! window → instance → surface → physical device → device → allocator
//!   → swapchain → frame command buffers → depth buffer → render pass
//!   → framebuffers → frame sync → pipelines → meshes → scene
//! ```
//!
//! Every object after the device registers its destruction in the
//! [`DeletionQueue`]. Teardown drains the frame fences, flushes the queue in
//! reverse, then drops the device, surface, instance and window.

use std::collections::HashMap;
use std::mem::ManuallyDrop;

use glam::{Mat4, Vec3, Vec4};
use tracing::{debug, error, info};
use vkengine_core::{DeletionQueue, EngineConfig};
use vkengine_platform::{ActiveEventLoop, InputState, KeyCode, Surface, Window};
use vkengine_resources::{Material, Mesh, Registry, green_triangle};
use vkengine_rhi::allocator::GpuAllocator;
use vkengine_rhi::device::Device;
use vkengine_rhi::instance::Instance;
use vkengine_rhi::physical_device::select_physical_device;
use vkengine_rhi::render_pass::{create_framebuffers, create_render_pass};
use vkengine_rhi::swapchain::Swapchain;
use vkengine_scene::{Camera, RenderObject, Scene};

use crate::depth_buffer::DepthBuffer;
use crate::dispatch::{DrawInputs, DrawStats, draw_objects};
use crate::error::{EngineError, EngineResult, FrameResult};
use crate::frame::{FrameCommands, FrameSync, FrameTargets, VulkanFrameBackend};
use crate::pipelines::build_mesh_materials;
use crate::scheduler::FrameScheduler;
use crate::shading::{ShadingMode, ShadingSelector};

/// Registry name of the OBJ mesh loaded from the configured path.
pub const MAIN_MESH: &str = "main";
/// Registry name of the single green triangle.
pub const TRIANGLE_MESH: &str = "triangle";
/// Registry name of the switchable mesh material.
pub const DEFAULT_MATERIAL: &str = "defaultmesh";

/// Half-width of the triangle grid, in cells.
const GRID_RADIUS: i32 = 20;
const GRID_TRIANGLE_SCALE: f32 = 0.2;

fn material_name(mode: ShadingMode) -> &'static str {
    match mode {
        ShadingMode::Colored => DEFAULT_MATERIAL,
        ShadingMode::Normals => "normals",
    }
}

/// Owns every GPU object and the scene drawn with them.
pub struct Engine {
    scheduler: FrameScheduler<VulkanFrameBackend>,
    meshes: Registry<Mesh>,
    materials: Registry<Material>,
    scene: Scene,
    camera: Camera,
    shading: ShadingSelector,
    allocator: GpuAllocator,
    deletion_queue: DeletionQueue,
    device: ManuallyDrop<Device>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,
    window: Window,
    torn_down: bool,
}

impl Engine {
    /// Creates the window and every GPU object, loads the meshes and
    /// populates the scene.
    ///
    /// If a step fails, whatever was already created is released in reverse
    /// order before the error is returned.
    ///
    /// # Errors
    ///
    /// Any failure is fatal to startup: window or surface creation, no
    /// suitable GPU, resource or pipeline creation, or the OBJ mesh failing
    /// to load.
    pub fn new(event_loop: &ActiveEventLoop, config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        info!("Initializing engine");

        // Declaration order is the reverse of drop order on early return.
        let window = Window::new(event_loop, config)?;
        let instance = Instance::new(&window.required_extensions()?, config.enable_validation)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let gpu = select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        info!("Using GPU: {} ({})", gpu.name(), gpu.device_type_name());

        let device = Device::new(&instance, &gpu)?;
        let mut deletion_queue = DeletionQueue::new();

        let allocator =
            GpuAllocator::new(instance.handle(), device.handle(), device.physical_device())?;
        let owner = allocator.clone();
        deletion_queue.push("gpu allocator", move || owner.shutdown());

        let swapchain = Swapchain::new(
            &instance,
            &device,
            surface.handle(),
            surface.loader(),
            window.width(),
            window.height(),
            &mut deletion_queue,
        )?;
        let extent = swapchain.extent();

        let commands = FrameCommands::create_all(
            device.handle(),
            device.queue_families().graphics,
            &mut deletion_queue,
        )?;

        let depth = DepthBuffer::new(device.handle(), &allocator, extent, &mut deletion_queue)?;
        let render_pass = create_render_pass(
            device.handle(),
            swapchain.format(),
            depth.format(),
            &mut deletion_queue,
        )?;
        let framebuffers = create_framebuffers(
            device.handle(),
            render_pass,
            swapchain.image_views(),
            depth.view(),
            extent,
            &mut deletion_queue,
        )?;

        let sync = FrameSync::create_all(device.handle(), &mut deletion_queue)?;

        let built = build_mesh_materials(
            device.handle(),
            &config.shader_dir,
            render_pass,
            extent,
            &mut deletion_queue,
        )?;
        let (materials, shading) = register_materials(built)?;

        let meshes = load_meshes(config, &allocator, &mut deletion_queue)?;
        let scene = populate_scene(&meshes, &materials)?;
        info!("Scene populated with {} objects", scene.len());

        let backend = VulkanFrameBackend::new(
            FrameTargets {
                swapchain,
                render_pass,
                framebuffers,
                graphics_queue: device.graphics_queue(),
                present_queue: device.present_queue(),
            },
            commands,
            sync,
        );
        let scheduler =
            FrameScheduler::new(backend, config.frame_timeout, config.heartbeat_period);

        info!("Engine initialized");

        Ok(Self {
            scheduler,
            meshes,
            materials,
            scene,
            camera: Camera::new(),
            shading,
            allocator,
            deletion_queue,
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
            window,
            torn_down: false,
        })
    }

    #[inline]
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Frames presented so far.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.scheduler.frame_number()
    }

    #[inline]
    pub fn shading_mode(&self) -> ShadingMode {
        self.shading.mode()
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Live GPU allocations, for diagnostics.
    pub fn allocation_count(&self) -> usize {
        self.allocator.allocation_count()
    }

    /// Applies one iteration of input: camera motion, and Space cycles the
    /// shading mode.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        self.camera.apply_motion(input.motion_intent(), dt);
        if input.is_key_just_pressed(KeyCode::Space) {
            self.shading.cycle();
        }
    }

    /// Renders and presents one frame.
    ///
    /// # Errors
    ///
    /// Every error is fatal; see [`FrameScheduler::draw_frame`].
    pub fn draw_frame(&mut self) -> FrameResult<DrawStats> {
        let extent = self.scheduler.backend().extent();
        let aspect = extent.width as f32 / extent.height.max(1) as f32;

        let Self {
            scheduler,
            meshes,
            materials,
            scene,
            camera,
            shading,
            ..
        } = self;

        scheduler.draw_frame(|recorder, frame| {
            let inputs = DrawInputs {
                camera: &*camera,
                aspect,
                objects: scene.objects(),
                meshes: &*meshes,
                materials: &*materials,
                shading: &*shading,
                data: Vec4::new(frame.heartbeat, 0.0, 0.0, 0.0),
            };
            draw_objects(recorder, &inputs)
        })
    }

    /// Waits for the GPU and releases everything.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        info!(
            "Shutting down after {} frames",
            self.scheduler.frame_number()
        );

        if let Err(e) = self.scheduler.drain() {
            error!("Frame slots did not drain: {}", e);
        }
        if let Err(e) = self.device.wait_idle() {
            error!("Device wait idle failed: {}", e);
        }

        self.deletion_queue.flush();

        // SAFETY: every object created from these handles was released by the
        // flush above, and teardown runs once.
        unsafe {
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Engine shut down");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Registers one material per shading mode and a selector switching between
/// them.
fn register_materials(
    built: Vec<(ShadingMode, Material)>,
) -> EngineResult<(Registry<Material>, ShadingSelector)> {
    let mut materials = Registry::new();
    let mut variants = HashMap::new();
    for (mode, material) in built {
        variants.insert(mode, materials.insert(material_name(mode), material));
    }

    let switchable = materials
        .handle(DEFAULT_MATERIAL)
        .ok_or_else(|| EngineError::MissingResource(DEFAULT_MATERIAL.to_string()))?;
    Ok((materials, ShadingSelector::new(switchable, variants)))
}

/// Loads the OBJ mesh and the triangle and uploads both.
fn load_meshes(
    config: &EngineConfig,
    allocator: &GpuAllocator,
    deletion_queue: &mut DeletionQueue,
) -> EngineResult<Registry<Mesh>> {
    let mut main_mesh = Mesh::default();
    let report = main_mesh.load_from_obj(&config.mesh_path)?;
    debug!(
        "{}: {} triangles, {} warnings",
        config.mesh_path.display(),
        report.triangle_count,
        report.warnings.len()
    );
    main_mesh.upload(allocator, deletion_queue)?;

    let mut triangle = green_triangle();
    triangle.upload(allocator, deletion_queue)?;

    let mut meshes = Registry::new();
    meshes.insert(MAIN_MESH, main_mesh);
    meshes.insert(TRIANGLE_MESH, triangle);
    Ok(meshes)
}

/// The OBJ mesh at the origin followed by a grid of small triangles.
fn populate_scene(
    meshes: &Registry<Mesh>,
    materials: &Registry<Material>,
) -> EngineResult<Scene> {
    let lookup_failed = |name: &str| EngineError::MissingResource(name.to_string());
    let main_mesh = meshes
        .handle(MAIN_MESH)
        .ok_or_else(|| lookup_failed(MAIN_MESH))?;
    let triangle = meshes
        .handle(TRIANGLE_MESH)
        .ok_or_else(|| lookup_failed(TRIANGLE_MESH))?;
    let material = materials
        .handle(DEFAULT_MATERIAL)
        .ok_or_else(|| lookup_failed(DEFAULT_MATERIAL))?;

    let mut scene = Scene::new();
    scene.push(RenderObject::new(main_mesh, material, Mat4::IDENTITY));

    for x in -GRID_RADIUS..=GRID_RADIUS {
        for z in -GRID_RADIUS..=GRID_RADIUS {
            let transform = Mat4::from_translation(Vec3::new(x as f32, 0.0, z as f32))
                * Mat4::from_scale(Vec3::splat(GRID_TRIANGLE_SCALE));
            scene.push(RenderObject::new(triangle, material, transform));
        }
    }

    Ok(scene)
}
