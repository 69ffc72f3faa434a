//! WGSL sources compiled into the crate.

/// Particle update and rasterization kernel (`main`).
pub const PARTICLES: &str = include_str!("shaders/particles.wgsl");

/// Trail blur (`blur`) and erosion (`erode`) kernels.
pub const POST_PROCESS: &str = include_str!("shaders/post_process.wgsl");

/// Fullscreen blit of the simulation image (`vs_main`, `fs_main`).
pub const PRESENT: &str = include_str!("shaders/present.wgsl");

/// Workgroup width of the particle kernel.
pub const PARTICLE_WORKGROUP_SIZE: u32 = 256;

/// Workgroup edge of the post-process kernels.
pub const POST_PROCESS_TILE: u32 = 16;
