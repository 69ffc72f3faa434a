//! Uniform block read by the particle kernel.

use bytemuck::{Pod, Zeroable};

use crate::behavior::StepParams;
use crate::particle::ParticleColor;

/// Mirror of `Params` in `particles.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct ParamsUniform {
    pub wells: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub width: f32,
    pub height: f32,
    pub drag: f32,
    pub respawn: u32,
    pub behavior: u32,
    pub should_move: u32,
    pub frame: u32,
    pub seed_count: u32,
    pub salt: u32,
    pub visible_count: u32,
    pub _pad: [u32; 2],
}

impl ParamsUniform {
    pub fn new(step: &StepParams, color: ParticleColor, seed_count: u32, visible_count: u32) -> Self {
        Self {
            wells: step.wells.subs().map(|w| w.to_array()),
            color: color.to_vec4().to_array(),
            width: step.width,
            height: step.height,
            drag: step.drag,
            respawn: step.respawn as u32,
            behavior: step.behavior.as_u32(),
            should_move: step.should_move as u32,
            frame: step.frame,
            seed_count,
            salt: step.salt,
            visible_count,
            _pad: [0; 2],
        }
    }
}
