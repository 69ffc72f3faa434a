//! Engine construction parameters and per-frame simulation settings.

use glam::Vec2;

use crate::attractor::AttractorSet;
use crate::behavior::BehaviorType;
use crate::particle::{ParticleColor, ParticleCount};

/// Fixed parameters chosen when an engine is created.
///
/// # Example
///
/// ```
/// use particle_lab::prelude::*;
///
/// let config = LabConfig::new(1024, 768)
///     .with_particle_count(ParticleCount::OneMillion)
///     .with_rng_seed(7);
/// assert_eq!(config.particle_count.visible_count(), 1_048_576);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LabConfig {
    /// Simulation image width in pixels.
    pub image_width: u32,
    /// Simulation image height in pixels.
    pub image_height: u32,
    /// Population size.
    pub particle_count: ParticleCount,
    /// Whether the image was sized at twice the logical resolution.
    pub high_density: bool,
    /// Seed for host-side jitter and the kernel's respawn hash.
    /// `None` draws one from the OS.
    pub rng_seed: Option<u64>,
    /// Ask for a software adapter across every backend instead of a
    /// hardware one. Lets headless machines without a GPU still run.
    pub force_fallback_adapter: bool,
}

impl LabConfig {
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            image_width,
            image_height,
            particle_count: ParticleCount::default(),
            high_density: false,
            rng_seed: None,
            force_fallback_adapter: false,
        }
    }

    /// Image sized from a logical (point) size. High density doubles both
    /// dimensions.
    pub fn for_logical_size(width: u32, height: u32, high_density: bool) -> Self {
        let scale = if high_density { 2 } else { 1 };
        Self {
            high_density,
            ..Self::new(width * scale, height * scale)
        }
    }

    pub fn with_particle_count(mut self, count: ParticleCount) -> Self {
        self.particle_count = count;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }

    /// Backends searched for an adapter under this configuration.
    pub fn backends(&self) -> wgpu::Backends {
        if self.force_fallback_adapter {
            wgpu::Backends::all()
        } else {
            wgpu::Backends::PRIMARY
        }
    }
}

/// Settings the host may change between any two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSettings {
    pub behavior: BehaviorType,
    /// Per-frame velocity multiplier, typically 0.5 to 0.98.
    pub drag_factor: f32,
    pub respawn_out_of_bounds: bool,
    /// Wipe the image every frame instead of accumulating trails.
    pub clear_on_step: bool,
    pub particles_should_move: bool,
    pub color: ParticleColor,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            behavior: BehaviorType::GravityWell,
            drag_factor: 0.97,
            respawn_out_of_bounds: true,
            clear_on_step: false,
            particles_should_move: true,
            color: ParticleColor::default(),
        }
    }
}

/// Ready-made demo configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Frozen formation, e.g. particles arranged as text.
    Text,
    /// Single well tracking a pointer.
    FollowTouch,
    /// Four wells on looping orbits.
    Random,
    /// One spinning well per touch.
    MultiTouch,
    /// Particles blown outward from the center.
    Explosion,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Text,
        Preset::FollowTouch,
        Preset::Random,
        Preset::MultiTouch,
        Preset::Explosion,
    ];

    /// Apply this preset on top of `settings`, keeping its color.
    pub fn apply(self, settings: &mut SimulationSettings) {
        let (behavior, drag, respawn, moving) = match self {
            Preset::Text => (BehaviorType::None, 0.82, false, false),
            Preset::FollowTouch => (BehaviorType::Follow, 0.82, true, true),
            Preset::Random => (BehaviorType::GravityWell, 0.8, false, true),
            Preset::MultiTouch => (BehaviorType::GravityWell, 0.95, false, true),
            Preset::Explosion => (BehaviorType::Explosion, 0.98, true, true),
        };
        settings.behavior = behavior;
        settings.drag_factor = drag;
        settings.respawn_out_of_bounds = respawn;
        settings.particles_should_move = moving;
        settings.clear_on_step = true;
    }

    /// Update the wells for one frame of this preset.
    ///
    /// `pointer` is the pressed pointer in normalized coordinates, `None` when
    /// released. `angle` drives the orbits of [`Preset::Random`].
    pub fn drive_wells(self, wells: &mut AttractorSet, pointer: Option<Vec2>, angle: f32) {
        match (self, pointer) {
            (Preset::Random, _) => wells.animate_orbits(angle),
            (Preset::FollowTouch | Preset::Explosion, Some(p)) => wells.follow(p.x, p.y),
            (Preset::MultiTouch, Some(p)) => wells.set_touches(&[p]),
            (Preset::Explosion | Preset::Text, None) => {}
            (Preset::FollowTouch | Preset::MultiTouch, None) => wells.reset_all(),
            (Preset::Text, Some(_)) => {}
        }
    }

    /// The preset after this one, wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = SimulationSettings::default();
        assert_eq!(s.drag_factor, 0.97);
        assert!(s.respawn_out_of_bounds);
        assert!(!s.clear_on_step);
        assert!(s.particles_should_move);
        assert_eq!(s.color, ParticleColor::new(0.066666, 0.8, 0.6, 1.0));
    }

    #[test]
    fn test_high_density_doubles_image() {
        let c = LabConfig::for_logical_size(375, 667, true);
        assert_eq!((c.image_width, c.image_height), (750, 1334));
        assert!(c.high_density);
        let c = LabConfig::for_logical_size(375, 667, false);
        assert_eq!((c.image_width, c.image_height), (375, 667));
    }

    #[test]
    fn test_fallback_adapter_widens_backends() {
        let c = LabConfig::new(64, 64);
        assert!(!c.force_fallback_adapter);
        assert_eq!(c.backends(), wgpu::Backends::PRIMARY);
        let c = c.with_fallback_adapter(true);
        assert!(c.force_fallback_adapter);
        assert_eq!(c.backends(), wgpu::Backends::all());
    }

    #[test]
    fn test_presets() {
        let mut s = SimulationSettings::default();
        Preset::Text.apply(&mut s);
        assert_eq!(s.behavior, BehaviorType::None);
        assert!(!s.particles_should_move);
        assert!(s.clear_on_step);

        Preset::Explosion.apply(&mut s);
        assert_eq!(s.behavior, BehaviorType::Explosion);
        assert_eq!(s.drag_factor, 0.98);
        assert!(s.respawn_out_of_bounds);
        assert!(s.particles_should_move);
    }

    #[test]
    fn test_explosion_follows_pressed_pointer() {
        use crate::attractor::{GravityWell, FOLLOW_MASS};

        let mut wells = AttractorSet::new(200, 100);
        Preset::Explosion.drive_wells(&mut wells, Some(Vec2::new(0.25, 0.75)), 0.0);
        assert_eq!(wells.normalized_position(GravityWell::One), Vec2::new(0.25, 0.75));
        assert_eq!(wells.mass(GravityWell::One), FOLLOW_MASS);

        // Releasing keeps the last blast origin in place.
        Preset::Explosion.drive_wells(&mut wells, None, 0.0);
        assert_eq!(wells.mass(GravityWell::One), FOLLOW_MASS);
    }

    #[test]
    fn test_drive_wells_per_preset() {
        use crate::attractor::{GravityWell, TOUCH_MASS};

        let mut wells = AttractorSet::new(100, 100);
        Preset::MultiTouch.drive_wells(&mut wells, Some(Vec2::new(0.1, 0.2)), 0.0);
        assert_eq!(wells.mass(GravityWell::Two), TOUCH_MASS);

        Preset::MultiTouch.drive_wells(&mut wells, None, 0.0);
        assert!(GravityWell::ALL.iter().all(|w| wells.mass(*w) == 0.0));

        Preset::Random.drive_wells(&mut wells, None, 0.0);
        assert_eq!(wells.mass(GravityWell::Two), 26.0);

        let before = wells.clone();
        Preset::Text.drive_wells(&mut wells, Some(Vec2::new(0.9, 0.9)), 1.0);
        assert_eq!(wells, before);
    }

    #[test]
    fn test_preset_cycle() {
        let mut p = Preset::Text;
        for _ in 0..Preset::ALL.len() {
            p = p.next();
        }
        assert_eq!(p, Preset::Text);
    }
}
