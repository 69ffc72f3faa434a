//! Per-particle update rules.
//!
//! The GPU kernel in `shaders/particles.wgsl` is the production path. The
//! functions here are its host-side mirror: the same integration order,
//! force model, respawn hash and rasterization rule, in plain Rust. Tests
//! and headless tools use them to reason about motion without a device.
//!
//! Every rule reads and writes only its own sub-particle. The wells and
//! scalars are shared read-only inputs; no particle ever reads another
//! particle's slot, which is what makes the in-place update safe.

use glam::{UVec2, Vec2, Vec4};
use image::{Rgba, RgbaImage};

use crate::attractor::AttractorSet;
use crate::config::SimulationSettings;
use crate::particle::{pack, position, velocity, ParticleColor, ParticleQuad};
use crate::store::VELOCITY_JITTER;

/// Squared distance below which gravity stops growing.
pub const MIN_DISTANCE_SQ: f32 = 1.0;

/// Peak per-frame impulse of the explosion rule, in pixels per frame.
pub const EXPLOSION_STRENGTH: f32 = 0.5;

/// Which update rule the kernel applies.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BehaviorType {
    /// Integrate and damp; no external force.
    None = 0,
    /// Attraction and spin from all four wells.
    #[default]
    GravityWell = 1,
    /// Radial push away from the image center, or from well one when it has mass.
    Explosion = 2,
    /// Attraction to well one only.
    Follow = 3,
}

impl BehaviorType {
    /// Value written into the kernel's uniform block.
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    pub const ALL: [BehaviorType; 4] = [
        BehaviorType::None,
        BehaviorType::GravityWell,
        BehaviorType::Explosion,
        BehaviorType::Follow,
    ];
}

/// Snapshot of everything one kernel invocation reads besides its particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    pub wells: ParticleQuad,
    pub width: f32,
    pub height: f32,
    pub drag: f32,
    pub respawn: bool,
    pub behavior: BehaviorType,
    pub should_move: bool,
    pub frame: u32,
    pub salt: u32,
}

impl StepParams {
    /// Capture the current settings and wells for frame `frame`.
    pub fn new(settings: &SimulationSettings, wells: &AttractorSet, frame: u32, salt: u32) -> Self {
        let size = wells.image_size();
        Self {
            wells: wells.record(),
            width: size.x,
            height: size.y,
            drag: settings.drag_factor,
            respawn: settings.respawn_out_of_bounds,
            behavior: settings.behavior,
            should_move: settings.particles_should_move,
            frame,
            salt,
        }
    }

    fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Integer hash shared with the kernel (PCG output permutation).
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Acceleration one well applies to a particle at `pos`.
pub fn well_force(pos: Vec2, well: Vec4) -> Vec2 {
    let mass = well.z;
    let spin = well.w;
    if mass == 0.0 && spin == 0.0 {
        return Vec2::ZERO;
    }
    let d = Vec2::new(well.x, well.y) - pos;
    let dd = d.dot(d).max(MIN_DISTANCE_SQ);
    let radial = d * (1.0 / dd.sqrt()) * mass / dd;
    let tangential = d.perp() * spin / dd;
    radial + tangential
}

fn explosion_force(pos: Vec2, params: &StepParams) -> Vec2 {
    let well = params.wells.a;
    let origin = if well.z != 0.0 {
        Vec2::new(well.x, well.y)
    } else {
        params.size() * 0.5
    };
    let d = pos - origin;
    let dist = d.length();
    if dist <= 1e-6 {
        return Vec2::ZERO;
    }
    let half_diagonal = params.size().length() * 0.5;
    let falloff = 1.0 - (dist / half_diagonal).clamp(0.0, 1.0);
    d / dist * EXPLOSION_STRENGTH * falloff
}

/// Whether a position lies outside the image rectangle.
pub fn is_out_of_bounds(pos: Vec2, width: f32, height: f32) -> bool {
    pos.x < 0.0 || pos.x >= width || pos.y < 0.0 || pos.y >= height
}

/// Seed index and jitter velocity chosen for a respawning particle.
pub fn respawn(index: u32, params: &StepParams, seeds: &[Vec2]) -> (Vec2, Vec2) {
    let h = pcg_hash(index ^ pcg_hash(params.frame ^ params.salt));
    let pos = if seeds.is_empty() {
        params.size() * 0.5
    } else {
        seeds[(h % seeds.len() as u32) as usize]
    };
    let h2 = pcg_hash(h);
    let unit = |bits: u32| (bits as f32 / 65_536.0 - 0.5) * 2.0 * VELOCITY_JITTER;
    let vel = Vec2::new(unit(h2 & 0xffff), unit(h2 >> 16));
    (pos, vel)
}

/// Advance one sub-particle by one frame.
pub fn step_particle(index: u32, particle: Vec4, params: &StepParams, seeds: &[Vec2]) -> Vec4 {
    if !params.should_move {
        return particle;
    }

    let pos = position(particle);
    let vel = velocity(particle);

    let force = match params.behavior {
        BehaviorType::None => Vec2::ZERO,
        BehaviorType::GravityWell => params
            .wells
            .subs()
            .iter()
            .map(|w| well_force(pos, *w))
            .sum(),
        BehaviorType::Explosion => explosion_force(pos, params),
        BehaviorType::Follow => well_force(pos, params.wells.a),
    };

    let mut new_pos = pos + vel;
    let mut new_vel = vel * params.drag + force;

    if params.respawn && is_out_of_bounds(new_pos, params.width, params.height) {
        (new_pos, new_vel) = respawn(index, params, seeds);
    }

    pack(new_pos, new_vel)
}

/// Advance every sub-particle in `particles` by one frame.
pub fn step_all(particles: &mut [Vec4], params: &StepParams, seeds: &[Vec2]) {
    for (index, p) in particles.iter_mut().enumerate() {
        *p = step_particle(index as u32, *p, params, seeds);
    }
}

/// Population class (0, 1 or 2) of sub-particle `index` out of `total`.
pub fn color_class(index: u32, total: u32) -> u32 {
    ((index as u64 * 3) / total.max(1) as u64).min(2) as u32
}

/// Pixel a particle at `pos` lights, if it is on the image.
pub fn raster_pixel(pos: Vec2, width: u32, height: u32) -> Option<UVec2> {
    if is_out_of_bounds(pos, width as f32, height as f32) {
        return None;
    }
    Some(UVec2::new(pos.x as u32, pos.y as u32))
}

/// Draw `particles` onto a transparent image the way the kernel does.
///
/// Each on-image particle lights the single pixel under it with its class
/// color. Where particles share a pixel the later index wins.
pub fn rasterize(particles: &[Vec4], color: ParticleColor, width: u32, height: u32) -> RgbaImage {
    let mut image = RgbaImage::new(width, height);
    let total = particles.len() as u32;
    for (index, p) in particles.iter().enumerate() {
        if let Some(px) = raster_pixel(position(*p), width, height) {
            let class = color_class(index as u32, total);
            image.put_pixel(px.x, px.y, to_rgba8(color.for_class(class)));
        }
    }
    image
}

/// Unorm conversion used by the `Rgba8Unorm` simulation image.
fn to_rgba8(c: Vec4) -> Rgba<u8> {
    let c = (c.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attractor::GravityWell;

    fn params(behavior: BehaviorType) -> StepParams {
        let settings = SimulationSettings {
            behavior,
            drag_factor: 1.0,
            respawn_out_of_bounds: false,
            ..SimulationSettings::default()
        };
        StepParams::new(&settings, &AttractorSet::new(200, 100), 0, 0)
    }

    #[test]
    fn test_pcg_hash_is_deterministic_and_spreads() {
        assert_eq!(pcg_hash(0), pcg_hash(0));
        assert_ne!(pcg_hash(0), pcg_hash(1));
        assert_ne!(pcg_hash(1), pcg_hash(2));
    }

    #[test]
    fn test_none_without_velocity_is_static() {
        let p = params(BehaviorType::None);
        let mut particle = pack(Vec2::new(12.5, 40.0), Vec2::ZERO);
        for _ in 0..100 {
            particle = step_particle(3, particle, &p, &[]);
        }
        assert_eq!(position(particle), Vec2::new(12.5, 40.0));
    }

    #[test]
    fn test_none_applies_drag() {
        let mut p = params(BehaviorType::None);
        p.drag = 0.5;
        let particle = step_particle(0, pack(Vec2::new(10.0, 10.0), Vec2::new(2.0, 0.0)), &p, &[]);
        assert_eq!(position(particle), Vec2::new(12.0, 10.0));
        assert_eq!(velocity(particle), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_frozen_particles_do_not_move() {
        let mut p = params(BehaviorType::GravityWell);
        p.should_move = false;
        let particle = pack(Vec2::new(5.0, 5.0), Vec2::new(1.0, 1.0));
        assert_eq!(step_particle(0, particle, &p, &[]), particle);
    }

    #[test]
    fn test_gravity_attracts_and_stays_bounded() {
        let mut wells = AttractorSet::new(200, 100);
        wells.set_properties(GravityWell::One, 0.5, 0.5, 50.0, 0.0);
        let mut p = params(BehaviorType::GravityWell);
        p.wells = wells.record();

        let target = Vec2::new(100.0, 50.0);
        let start = target - Vec2::new(1e-4, 0.0);
        let mut particle = pack(start, Vec2::ZERO);
        particle = step_particle(0, particle, &p, &[]);
        assert!(velocity(particle).x > 0.0);
        assert!(velocity(particle).is_finite());

        let mut particle = pack(Vec2::new(60.0, 50.0), Vec2::ZERO);
        let mut last_speed = 0.0;
        for _ in 0..5 {
            particle = step_particle(0, particle, &p, &[]);
            let v = velocity(particle);
            assert!(v.x > 0.0);
            assert!(v.length() > last_speed);
            last_speed = v.length();
        }
    }

    #[test]
    fn test_force_at_zero_distance_is_finite() {
        let f = well_force(Vec2::new(1.0, 1.0), Vec4::new(1.0, 1.0, 1e6, 1e6));
        assert_eq!(f, Vec2::ZERO);
        let f = well_force(Vec2::new(1.0, 1.0), Vec4::new(1.0 + 1e-6, 1.0, 1e6, 0.0));
        assert!(f.is_finite());
    }

    #[test]
    fn test_spin_is_tangential() {
        let f = well_force(Vec2::ZERO, Vec4::new(10.0, 0.0, 0.0, 5.0));
        assert_eq!(f.x, 0.0);
        assert!(f.y > 0.0);
    }

    #[test]
    fn test_follow_ignores_other_wells() {
        let mut wells = AttractorSet::new(200, 100);
        wells.set_properties(GravityWell::Two, 0.9, 0.5, 1000.0, 0.0);
        let mut p = params(BehaviorType::Follow);
        p.wells = wells.record();
        let particle = step_particle(0, pack(Vec2::new(20.0, 50.0), Vec2::ZERO), &p, &[]);
        assert_eq!(velocity(particle), Vec2::ZERO);
    }

    #[test]
    fn test_explosion_pushes_outward() {
        let p = params(BehaviorType::Explosion);
        let particle = step_particle(0, pack(Vec2::new(150.0, 50.0), Vec2::ZERO), &p, &[]);
        assert!(velocity(particle).x > 0.0);
        assert!(velocity(particle).x <= EXPLOSION_STRENGTH);
        let center = step_particle(0, pack(Vec2::new(100.0, 50.0), Vec2::ZERO), &p, &[]);
        assert_eq!(velocity(center), Vec2::ZERO);
    }

    #[test]
    fn test_out_of_bounds_without_respawn_keeps_moving() {
        let p = params(BehaviorType::None);
        let particle = step_particle(0, pack(Vec2::new(-10.0, 20.0), Vec2::new(-1.0, 2.0)), &p, &[]);
        assert_eq!(position(particle), Vec2::new(-11.0, 22.0));
        assert_eq!(velocity(particle), Vec2::new(-1.0, 2.0));
    }

    #[test]
    fn test_out_of_bounds_respawns_onto_seed() {
        let mut p = params(BehaviorType::None);
        p.respawn = true;
        let seeds = [Vec2::new(10.0, 10.0), Vec2::new(20.0, 30.0), Vec2::new(190.0, 90.0)];
        let particle = step_particle(5, pack(Vec2::new(500.0, 20.0), Vec2::ZERO), &p, &seeds);
        assert!(seeds.contains(&position(particle)));
        let v = velocity(particle);
        assert!(v.x.abs() <= VELOCITY_JITTER && v.y.abs() <= VELOCITY_JITTER);
    }

    #[test]
    fn test_respawn_without_seeds_uses_center() {
        let mut p = params(BehaviorType::None);
        p.respawn = true;
        let particle = step_particle(0, pack(Vec2::new(-1.0, -1.0), Vec2::ZERO), &p, &[]);
        assert_eq!(position(particle), Vec2::new(100.0, 50.0));
    }

    #[test]
    fn test_color_classes_split_in_thirds() {
        assert_eq!(color_class(0, 2048), 0);
        assert_eq!(color_class(682, 2048), 0);
        assert_eq!(color_class(683, 2048), 1);
        assert_eq!(color_class(2047, 2048), 2);
    }

    #[test]
    fn test_raster_pixel_bounds() {
        assert_eq!(raster_pixel(Vec2::new(3.7, 4.2), 10, 10), Some(UVec2::new(3, 4)));
        assert_eq!(raster_pixel(Vec2::new(10.0, 4.0), 10, 10), None);
        assert_eq!(raster_pixel(Vec2::new(-0.1, 4.0), 10, 10), None);
    }

    #[test]
    fn test_rasterize_colors_by_class() {
        let particles = [
            pack(Vec2::new(0.5, 0.5), Vec2::ZERO),
            pack(Vec2::new(-3.0, 1.0), Vec2::ZERO),
            pack(Vec2::new(2.2, 1.9), Vec2::ZERO),
            pack(Vec2::new(3.9, 3.0), Vec2::ZERO),
        ];
        let image = rasterize(&particles, ParticleColor::new(1.0, 0.0, 0.0, 1.0), 4, 4);

        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(2, 1).0, [0, 255, 0, 255]);
        assert_eq!(image.get_pixel(3, 3).0, [0, 0, 255, 255]);
        let lit = image.pixels().filter(|p| p.0[3] > 0).count();
        assert_eq!(lit, 3);
    }

    #[test]
    fn test_rasterize_later_index_wins() {
        let particles = [
            pack(Vec2::new(1.1, 1.1), Vec2::ZERO),
            pack(Vec2::new(1.8, 1.4), Vec2::ZERO),
            pack(Vec2::new(1.5, 1.5), Vec2::ZERO),
        ];
        let color = ParticleColor::default();
        let image = rasterize(&particles, color, 2, 2);
        let expected = to_rgba8(color.for_class(2));
        assert_eq!(*image.get_pixel(1, 1), expected);
        assert_eq!(expected.0, [204, 153, 17, 255]);
    }
}
