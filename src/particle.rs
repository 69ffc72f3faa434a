//! Particle records, population sizes and colors.
//!
//! A [`ParticleQuad`] packs four independent sub-particles into one 64-byte
//! record. The GPU sees the same bytes as a flat `array<vec4<f32>>`, one
//! `vec4` per sub-particle, so sub-particle `k` of quad `q` lives at index
//! `4 * q + k`.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};

/// Number of sub-particles stored in one [`ParticleQuad`].
pub const SUB_PARTICLES: usize = 4;

/// Four sub-particles packed as `(x, y, vx, vy)` each.
///
/// When a quad-shaped record carries an attractor instead, the layout is
/// `(x, y, mass, spin)`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleQuad {
    pub a: Vec4,
    pub b: Vec4,
    pub c: Vec4,
    pub d: Vec4,
}

impl ParticleQuad {
    /// Size of one record in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Sub-particle `k` (0..4).
    ///
    /// # Panics
    ///
    /// Panics if `k >= 4`.
    #[inline]
    pub fn sub(&self, k: usize) -> Vec4 {
        match k {
            0 => self.a,
            1 => self.b,
            2 => self.c,
            3 => self.d,
            _ => panic!("sub-particle index {} out of range", k),
        }
    }

    /// Mutable access to sub-particle `k` (0..4).
    ///
    /// # Panics
    ///
    /// Panics if `k >= 4`.
    #[inline]
    pub fn sub_mut(&mut self, k: usize) -> &mut Vec4 {
        match k {
            0 => &mut self.a,
            1 => &mut self.b,
            2 => &mut self.c,
            3 => &mut self.d,
            _ => panic!("sub-particle index {} out of range", k),
        }
    }

    /// All four sub-particles in order.
    pub fn subs(&self) -> [Vec4; SUB_PARTICLES] {
        [self.a, self.b, self.c, self.d]
    }
}

/// Position component of a packed sub-particle.
#[inline]
pub fn position(p: Vec4) -> Vec2 {
    Vec2::new(p.x, p.y)
}

/// Velocity component of a packed sub-particle.
#[inline]
pub fn velocity(p: Vec4) -> Vec2 {
    Vec2::new(p.z, p.w)
}

/// Pack a position and velocity into one sub-particle.
#[inline]
pub fn pack(position: Vec2, velocity: Vec2) -> Vec4 {
    Vec4::new(position.x, position.y, velocity.x, velocity.y)
}

/// Supported population sizes, expressed as stored quads.
///
/// The number of particles a viewer actually sees is four times the quad
/// count; use [`ParticleCount::visible_count`] rather than multiplying at
/// call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParticleCount {
    Small,
    Medium,
    #[default]
    Large,
    SixteenthMillion,
    QuarterMillion,
    HalfMillion,
    OneMillion,
    TwoMillion,
    FourMillion,
    EightMillion,
    SixteenMillion,
}

impl ParticleCount {
    /// Every size, smallest first.
    pub const ALL: [ParticleCount; 11] = [
        ParticleCount::Small,
        ParticleCount::Medium,
        ParticleCount::Large,
        ParticleCount::SixteenthMillion,
        ParticleCount::QuarterMillion,
        ParticleCount::HalfMillion,
        ParticleCount::OneMillion,
        ParticleCount::TwoMillion,
        ParticleCount::FourMillion,
        ParticleCount::EightMillion,
        ParticleCount::SixteenMillion,
    ];

    /// Number of [`ParticleQuad`] records stored.
    pub const fn quad_count(self) -> usize {
        match self {
            ParticleCount::Small => 512,
            ParticleCount::Medium => 2048,
            ParticleCount::Large => 8192,
            ParticleCount::SixteenthMillion => 32_768,
            ParticleCount::QuarterMillion => 65_536,
            ParticleCount::HalfMillion => 131_072,
            ParticleCount::OneMillion => 262_144,
            ParticleCount::TwoMillion => 524_288,
            ParticleCount::FourMillion => 1_048_576,
            ParticleCount::EightMillion => 2_097_152,
            ParticleCount::SixteenMillion => 4_194_304,
        }
    }

    /// Number of individually simulated particles (`4 × quad_count`).
    pub const fn visible_count(self) -> usize {
        self.quad_count() * SUB_PARTICLES
    }

    /// Byte length of the store holding this many quads.
    pub const fn byte_len(self) -> usize {
        self.quad_count() * ParticleQuad::SIZE
    }
}

/// Base RGBA color shared by every rendered particle.
///
/// The population is split into thirds; the second and third thirds use
/// channel rotations of the base color so one setting yields three hues.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ParticleColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for ParticleColor {
    fn default() -> Self {
        Self::new(0.066666, 0.8, 0.6, 1.0)
    }
}

impl ParticleColor {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Channels as a vector, `(r, g, b, a)`.
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }

    /// Color for population class 0, 1 or 2.
    ///
    /// Class 1 is the `(b, r, g)` rotation and class 2 the `(g, b, r)`
    /// rotation; alpha is never rotated. Any class above 2 is treated as 2.
    pub fn for_class(self, class: u32) -> Vec4 {
        match class {
            0 => Vec4::new(self.r, self.g, self.b, self.a),
            1 => Vec4::new(self.b, self.r, self.g, self.a),
            _ => Vec4::new(self.g, self.b, self.r, self.a),
        }
    }
}
