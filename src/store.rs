//! Page-aligned particle storage.
//!
//! The store is a single contiguous block of [`ParticleQuad`] records whose
//! start address is aligned to [`STORE_ALIGNMENT`]. It is sized once and
//! never resized; resets rewrite it in place. The GPU copy of the particle
//! buffer is filled from [`ParticleStore::as_bytes`] and read back into
//! [`ParticleStore::as_bytes_mut`], so both sides always agree on layout.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};
use rand::Rng;

use crate::error::EngineError;
use crate::particle::{pack, ParticleCount, ParticleQuad, SUB_PARTICLES};

/// Alignment of the backing block, in bytes.
pub const STORE_ALIGNMENT: usize = 0x4000;

/// Half-width of the uniform velocity jitter applied on reset and respawn.
pub const VELOCITY_JITTER: f32 = 0.0025;

/// Pixel offsets forming the tetrad around each seed, indexed by sub-particle.
pub const TETRAD_OFFSETS: [Vec2; SUB_PARTICLES] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(-1.0, -1.0),
    Vec2::new(1.0, -1.0),
];

const QUADS_PER_PAGE: usize = STORE_ALIGNMENT / ParticleQuad::SIZE;

/// One alignment-sized page of quads. Size equals alignment, so pages pack
/// without padding and the whole `Vec` inherits the page alignment.
#[repr(C, align(16384))]
#[derive(Copy, Clone)]
struct QuadPage([ParticleQuad; QUADS_PER_PAGE]);

// SAFETY: `QuadPage` is `repr(C)`, contains only `Pod` data and has no padding
// because its size (256 * 64 bytes) equals its alignment.
unsafe impl Zeroable for QuadPage {}
unsafe impl Pod for QuadPage {}

const _: () = assert!(std::mem::size_of::<QuadPage>() == STORE_ALIGNMENT);

/// Outcome of a reset pass, counted in sub-particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetSummary {
    /// Sub-particles that received a seed position and fresh jitter.
    pub seeded: usize,
    /// Sub-particles left at their previous contents for lack of a seed.
    pub untouched: usize,
}

/// Owned, aligned block of particle quads.
pub struct ParticleStore {
    pages: Vec<QuadPage>,
    count: ParticleCount,
    seeds: Vec<Vec2>,
}

impl ParticleStore {
    /// Reserve a zeroed store for `count` quads.
    ///
    /// Returns [`EngineError::Allocation`] if the block cannot be reserved.
    pub fn allocate(count: ParticleCount) -> Result<Self, EngineError> {
        let page_count = count.quad_count().div_ceil(QUADS_PER_PAGE);
        let mut pages = Vec::new();
        pages
            .try_reserve_exact(page_count)
            .map_err(|_| EngineError::Allocation { quads: count.quad_count() })?;
        pages.resize(page_count, QuadPage::zeroed());

        log::debug!(
            "Allocated particle store: {} quads, {} bytes",
            count.quad_count(),
            count.byte_len()
        );

        Ok(Self {
            pages,
            count,
            seeds: Vec::new(),
        })
    }

    /// Population size this store was allocated for.
    pub fn count(&self) -> ParticleCount {
        self.count
    }

    /// Number of stored quads.
    pub fn quad_count(&self) -> usize {
        self.count.quad_count()
    }

    /// Number of sub-particles (`4 × quad_count`).
    pub fn visible_count(&self) -> usize {
        self.count.visible_count()
    }

    /// Byte length of the block, always `quad_count * 64`.
    pub fn byte_len(&self) -> usize {
        self.count.byte_len()
    }

    /// The quads, in order.
    pub fn quads(&self) -> &[ParticleQuad] {
        let all: &[ParticleQuad] = bytemuck::cast_slice(&self.pages);
        &all[..self.quad_count()]
    }

    /// Mutable view of the quads.
    pub fn quads_mut(&mut self) -> &mut [ParticleQuad] {
        let len = self.quad_count();
        let all: &mut [ParticleQuad] = bytemuck::cast_slice_mut(&mut self.pages);
        &mut all[..len]
    }

    /// Flat per-sub-particle view, matching the GPU's `array<vec4<f32>>`.
    pub fn sub_particles(&self) -> &[Vec4] {
        bytemuck::cast_slice(self.quads())
    }

    /// Mutable flat per-sub-particle view.
    pub fn sub_particles_mut(&mut self) -> &mut [Vec4] {
        bytemuck::cast_slice_mut(self.quads_mut())
    }

    /// Raw bytes of the block, as uploaded to the device.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.quads())
    }

    /// Mutable raw bytes, filled by device readback.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(self.quads_mut())
    }

    /// Seed positions used by the last reset, one per sub-particle.
    pub fn seeds(&self) -> &[Vec2] {
        &self.seeds
    }

    /// Reseed particles in place.
    ///
    /// With `fresh_seeds` set, the list replaces the remembered seeds;
    /// otherwise the previous list is reused. Sub-particle `k` of quad `i`
    /// takes seed `4i + k`, shifted by [`TETRAD_OFFSETS`]`[k]`, with velocity
    /// jitter in `±VELOCITY_JITTER`. Sub-particles beyond the end of the seed
    /// list keep whatever they held before.
    pub fn reset<R: Rng>(&mut self, fresh_seeds: Option<Vec<Vec2>>, rng: &mut R) -> ResetSummary {
        if let Some(seeds) = fresh_seeds {
            self.seeds = seeds;
        }

        let visible = self.visible_count();
        let seeded = self.seeds.len().min(visible);
        let seeds = std::mem::take(&mut self.seeds);

        for (index, (slot, seed)) in self
            .sub_particles_mut()
            .iter_mut()
            .zip(seeds.iter())
            .enumerate()
        {
            let offset = TETRAD_OFFSETS[index % SUB_PARTICLES];
            *slot = pack(*seed + offset, jitter(rng));
        }

        self.seeds = seeds;

        let summary = ResetSummary {
            seeded,
            untouched: visible - seeded,
        };
        if summary.untouched > 0 {
            log::warn!(
                "Seed list covers {} of {} particles; {} keep their previous state",
                summary.seeded,
                visible,
                summary.untouched
            );
        } else {
            log::debug!("Reset {} particles", summary.seeded);
        }
        summary
    }
}

/// Uniform velocity jitter in `[-VELOCITY_JITTER, VELOCITY_JITTER)` per axis.
pub fn jitter<R: Rng>(rng: &mut R) -> Vec2 {
    Vec2::new(
        (rng.gen::<f32>() - 0.5) * 2.0 * VELOCITY_JITTER,
        (rng.gen::<f32>() - 0.5) * 2.0 * VELOCITY_JITTER,
    )
}
