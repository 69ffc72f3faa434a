//! The four gravity wells.
//!
//! Wells are stored in a quad-shaped record, one sub-component per slot,
//! as `(x, y, mass, spin)` in image pixels. Callers address them in
//! normalized `[0, 1] × [0, 1]` coordinates.

use std::f32::consts::PI;

use glam::{Vec2, Vec4};

use crate::particle::ParticleQuad;

/// Mass given to well one by [`AttractorSet::follow`].
pub const FOLLOW_MASS: f32 = 200.0;
/// Mass given to each touch well by [`AttractorSet::set_touches`].
pub const TOUCH_MASS: f32 = 140.0;
/// Spin given to each touch well by [`AttractorSet::set_touches`].
pub const TOUCH_SPIN: f32 = 20.0;

/// A symbolic gravity well slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GravityWell {
    One,
    Two,
    Three,
    Four,
}

impl GravityWell {
    /// All slots in storage order.
    pub const ALL: [GravityWell; 4] = [
        GravityWell::One,
        GravityWell::Two,
        GravityWell::Three,
        GravityWell::Four,
    ];

    /// Storage position of this slot (One = 0 … Four = 3).
    pub const fn slot(self) -> usize {
        match self {
            GravityWell::One => 0,
            GravityWell::Two => 1,
            GravityWell::Three => 2,
            GravityWell::Four => 3,
        }
    }

    /// Legacy numeric addressing kept for callers that index wells by
    /// integer: 0 → Two, 1 → Three, 2 → Four, anything else → One.
    ///
    /// This is deliberately not the inverse of [`GravityWell::slot`].
    pub const fn from_legacy_index(index: i32) -> Self {
        match index {
            0 => GravityWell::Two,
            1 => GravityWell::Three,
            2 => GravityWell::Four,
            _ => GravityWell::One,
        }
    }
}

/// Four wells plus the image size used to (de)normalize them.
#[derive(Debug, Clone, PartialEq)]
pub struct AttractorSet {
    record: ParticleQuad,
    width: f32,
    height: f32,
}

impl AttractorSet {
    /// Create a set for an image of `width × height` pixels with every well
    /// centered and inert.
    pub fn new(width: u32, height: u32) -> Self {
        let mut set = Self {
            record: ParticleQuad::default(),
            width: width as f32,
            height: height as f32,
        };
        set.reset_all();
        set
    }

    /// Image size in pixels.
    pub fn image_size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Place `well` at normalized `(x, y)` with the given mass and spin.
    pub fn set_properties(&mut self, well: GravityWell, x: f32, y: f32, mass: f32, spin: f32) {
        *self.record.sub_mut(well.slot()) =
            Vec4::new(x * self.width, y * self.height, mass, spin);
    }

    /// [`set_properties`](Self::set_properties) addressed through
    /// [`GravityWell::from_legacy_index`].
    pub fn set_properties_by_index(&mut self, index: i32, x: f32, y: f32, mass: f32, spin: f32) {
        self.set_properties(GravityWell::from_legacy_index(index), x, y, mass, spin);
    }

    /// Position of `well` in normalized coordinates.
    pub fn normalized_position(&self, well: GravityWell) -> Vec2 {
        let w = self.record.sub(well.slot());
        Vec2::new(w.x / self.width, w.y / self.height)
    }

    /// Position of `well` in pixels.
    pub fn pixel_position(&self, well: GravityWell) -> Vec2 {
        let w = self.record.sub(well.slot());
        Vec2::new(w.x, w.y)
    }

    pub fn mass(&self, well: GravityWell) -> f32 {
        self.record.sub(well.slot()).z
    }

    pub fn spin(&self, well: GravityWell) -> f32 {
        self.record.sub(well.slot()).w
    }

    /// Center `well` and zero its mass and spin.
    pub fn reset(&mut self, well: GravityWell) {
        self.set_properties(well, 0.5, 0.5, 0.0, 0.0);
    }

    /// Center every well and zero all masses and spins.
    pub fn reset_all(&mut self) {
        for well in GravityWell::ALL {
            self.reset(well);
        }
    }

    /// Attract everything to a single point with well one.
    pub fn follow(&mut self, x: f32, y: f32) {
        self.set_properties(GravityWell::One, x, y, FOLLOW_MASS, 0.0);
    }

    /// One spinning well per touch point, up to four; remaining wells reset.
    ///
    /// Touch `i` is routed through [`GravityWell::from_legacy_index`], so the
    /// first touch drives well two and the fourth drives well one.
    pub fn set_touches(&mut self, touches: &[Vec2]) {
        let mut touched = [false; 4];
        for (i, t) in touches.iter().take(4).enumerate() {
            let well = GravityWell::from_legacy_index(i as i32);
            self.set_properties(well, t.x, t.y, TOUCH_MASS, TOUCH_SPIN);
            touched[well.slot()] = true;
        }
        for well in GravityWell::ALL {
            if !touched[well.slot()] {
                self.reset(well);
            }
        }
    }

    /// Drive all four wells along the looping orbits used by the random demo.
    ///
    /// Wells one and four circle the center on opposite sides of a small
    /// ring. Wells two and three do the same on a pulsing outer ring whose
    /// radius is `0.35 + sin(2.7a)`.
    pub fn animate_orbits(&mut self, angle: f32) {
        let inner = |phase: f32| (0.5 + 0.1 * phase.sin(), 0.5 + 0.1 * phase.cos());
        let radius = 0.35 + (angle * 2.7).sin();
        let outer = |phase: f32| {
            let theta = angle / 1.3 + phase;
            (0.5 + radius * theta.cos(), 0.5 + radius * theta.sin())
        };

        let mass_inner = 11.0 * (angle / 1.9).sin();
        let spin_inner = 23.0 * (angle / 2.1).cos();
        let spin_outer = -19.0 * (angle * 1.5).sin();

        let (x, y) = inner(angle + PI * 0.5);
        self.set_properties(GravityWell::One, x, y, mass_inner, spin_inner);
        let (x, y) = outer(0.0);
        self.set_properties(GravityWell::Two, x, y, 26.0, spin_outer);
        let (x, y) = outer(PI);
        self.set_properties(GravityWell::Three, x, y, 26.0, spin_outer);
        let (x, y) = inner(angle + PI * 1.5);
        self.set_properties(GravityWell::Four, x, y, mass_inner, spin_inner);
    }

    /// The packed `(x, y, mass, spin)` record the kernel reads.
    pub fn record(&self) -> ParticleQuad {
        self.record
    }
}
