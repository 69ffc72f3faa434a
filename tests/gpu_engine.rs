//! Engine tests against a real device. A hardware adapter is tried first,
//! then the software fallback; each test returns early only when neither
//! exists.

use std::cell::RefCell;
use std::rc::Rc;

use particle_lab::behavior::rasterize;
use particle_lab::particle::{pack, position, velocity};
use particle_lab::prelude::*;

const SIZE: u32 = 128;

#[derive(Default)]
struct Recorded {
    frames: u64,
    unavailable: u32,
    requested: Vec<usize>,
}

struct TestDelegate {
    seeds: Vec<Vec2>,
    recorded: Rc<RefCell<Recorded>>,
}

impl LabDelegate for TestDelegate {
    fn frame_completed(&mut self, frame: &FrameInfo, _wells: &mut AttractorSet) {
        self.recorded.borrow_mut().frames = frame.frame;
    }

    fn device_unavailable(&mut self) {
        self.recorded.borrow_mut().unavailable += 1;
    }

    fn positions_for_reset(&mut self, count: usize) -> Vec<Vec2> {
        self.recorded.borrow_mut().requested.push(count);
        self.seeds.clone()
    }
}

fn seed_region() -> Rect {
    Rect::new(32.0, 32.0, 64.0, 64.0)
}

fn create_lab(seeds: Vec<Vec2>) -> Option<(ParticleLab, Rc<RefCell<Recorded>>)> {
    for fallback in [false, true] {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let delegate = TestDelegate {
            seeds: seeds.clone(),
            recorded: recorded.clone(),
        };
        let config = LabConfig::new(SIZE, SIZE)
            .with_particle_count(ParticleCount::Small)
            .with_rng_seed(42)
            .with_fallback_adapter(fallback);
        let lab = ParticleLab::create(config, Some(Box::new(delegate))).expect("engine creation");

        if lab.state() == EngineState::DeviceUnavailable {
            assert_eq!(recorded.borrow().unavailable, 1);
            continue;
        }
        return Some((lab, recorded));
    }
    eprintln!("skipping: no compute device, not even a fallback adapter");
    None
}

fn offscreen_target(lab: &ParticleLab) -> wgpu::Texture {
    let device = lab.as_gpu().and_then(|g| g.device()).expect("device");
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

#[test]
fn test_lifecycle_and_frame_notifications() {
    let seeds = seed_region().generate_points_inside(None, 2048);
    let Some((mut lab, recorded)) = create_lab(seeds) else {
        return;
    };
    assert_eq!(lab.state(), EngineState::Ready);
    let target = offscreen_target(&lab);

    let summary = lab.reset_particles(true);
    assert_eq!(summary.seeded, 2048);
    assert_eq!(recorded.borrow().requested, vec![2048]);

    for _ in 0..3 {
        assert!(lab.step(RenderTarget::Texture(&target)).is_presented());
    }
    assert_eq!(lab.state(), EngineState::Stepping);
    assert_eq!(recorded.borrow().frames, 3);

    lab.teardown();
    assert_eq!(lab.state(), EngineState::TornDown);
    assert_eq!(lab.step(RenderTarget::Texture(&target)), FrameOutcome::Inactive);
    assert_eq!(recorded.borrow().frames, 3);
}

#[test]
fn test_reset_without_regenerate_reuses_seeds() {
    let seeds = seed_region().generate_points_inside(None, 2048);
    let Some((mut lab, recorded)) = create_lab(seeds) else {
        return;
    };
    lab.reset_particles(true);
    lab.reset_particles(false);
    assert_eq!(recorded.borrow().requested.len(), 1);
}

#[test]
fn test_unrenderable_target_is_skipped() {
    let Some((mut lab, recorded)) = create_lab(Vec::new()) else {
        return;
    };
    let device = lab.as_gpu().and_then(|g| g.device()).expect("device");
    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Sampled Only"),
        size: wgpu::Extent3d {
            width: 4,
            height: 4,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });

    let outcome = lab.step(RenderTarget::Texture(&target));
    assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::IncompatibleTarget));
    assert_eq!(recorded.borrow().frames, 0);
    assert_eq!(lab.state(), EngineState::Ready);
}

#[test]
fn test_particles_are_drawn_into_image() {
    let seeds = seed_region().generate_points_inside(None, 2048);
    let Some((mut lab, _)) = create_lab(seeds) else {
        return;
    };
    let target = offscreen_target(&lab);
    lab.settings_mut().clear_on_step = true;
    lab.settings_mut().particles_should_move = false;
    lab.reset_particles(true);
    lab.step(RenderTarget::Texture(&target));

    let image = lab.as_gpu().unwrap().capture_image().unwrap();
    assert_eq!(image.dimensions(), (SIZE, SIZE));
    let lit = image.pixels().filter(|p| p.0[3] > 0).count();
    assert!(lit > 100, "only {} pixels lit", lit);
    assert_eq!(image.get_pixel(2, 2).0, [0, 0, 0, 0]);
}

#[test]
fn test_device_image_matches_host_raster() {
    let Some((mut lab, _)) = create_lab(Vec::new()) else {
        return;
    };
    let target = offscreen_target(&lab);
    lab.settings_mut().clear_on_step = true;
    lab.settings_mut().particles_should_move = false;
    lab.settings_mut().color = ParticleColor::new(0.9, 0.2, 0.4, 1.0);

    // One particle per pixel so every pixel has a single writer.
    lab.as_gpu_mut()
        .unwrap()
        .edit_particles(|particles| {
            for (i, p) in particles.iter_mut().enumerate() {
                let pos = Vec2::new((i % 64) as f32 + 32.5, (i / 64) as f32 + 32.5);
                *p = pack(pos, Vec2::ZERO);
            }
        })
        .unwrap();
    assert!(lab.step(RenderTarget::Texture(&target)).is_presented());

    let color = lab.settings().color;
    let engine = lab.as_gpu_mut().unwrap();
    let particles: Vec<Vec4> = engine
        .read_particles()
        .unwrap()
        .iter()
        .flat_map(|q| q.subs())
        .collect();
    let expected = rasterize(&particles, color, SIZE, SIZE);
    let image = engine.capture_image().unwrap();

    let lit = expected.pixels().filter(|p| p.0[3] > 0).count();
    assert_eq!(lit, 2048);
    for (x, y, pixel) in image.enumerate_pixels() {
        assert_eq!(pixel, expected.get_pixel(x, y), "pixel ({}, {})", x, y);
    }
}

#[test]
fn test_static_particles_stay_put_on_device() {
    let seeds = seed_region().generate_points_inside(None, 2048);
    let Some((mut lab, _)) = create_lab(seeds) else {
        return;
    };
    let target = offscreen_target(&lab);
    {
        let settings = lab.settings_mut();
        settings.behavior = BehaviorType::None;
        settings.drag_factor = 1.0;
    }
    lab.reset_particles(true);

    let engine = lab.as_gpu_mut().unwrap();
    engine
        .edit_particles(|particles| {
            for p in particles.iter_mut() {
                *p = pack(position(*p), Vec2::ZERO);
            }
        })
        .unwrap();
    let before = engine.read_particles().unwrap().to_vec();

    for _ in 0..5 {
        lab.step(RenderTarget::Texture(&target));
    }
    let after = lab.as_gpu_mut().unwrap().read_particles().unwrap().to_vec();
    assert_eq!(before, after);
}

#[test]
fn test_device_respawn_lands_on_seed() {
    let region = seed_region();
    let seeds = region.generate_points_inside(None, 2048);
    let Some((mut lab, _)) = create_lab(seeds) else {
        return;
    };
    let target = offscreen_target(&lab);
    {
        let settings = lab.settings_mut();
        settings.behavior = BehaviorType::None;
        settings.respawn_out_of_bounds = true;
    }
    lab.reset_particles(true);

    lab.as_gpu_mut()
        .unwrap()
        .edit_particles(|particles| {
            particles[100] = pack(Vec2::new(-50.0, 500.0), Vec2::new(-3.0, 0.0));
        })
        .unwrap();
    lab.step(RenderTarget::Texture(&target));

    let quads = lab.as_gpu_mut().unwrap().read_particles().unwrap();
    let respawned = quads[25].a;
    assert!(region.contains(position(respawned)), "respawned at {:?}", respawned);
    assert!(velocity(respawned).abs().max_element() <= 0.0025);
}

#[test]
fn test_device_coasting_without_respawn() {
    let seeds = seed_region().generate_points_inside(None, 2048);
    let Some((mut lab, _)) = create_lab(seeds) else {
        return;
    };
    let target = offscreen_target(&lab);
    {
        let settings = lab.settings_mut();
        settings.behavior = BehaviorType::GravityWell;
        settings.respawn_out_of_bounds = false;
    }
    lab.reset_particles(true);

    let prior_pos = Vec2::new(SIZE as f32 + 20.0, 10.0);
    let prior_vel = Vec2::new(1.5, -0.25);
    lab.as_gpu_mut()
        .unwrap()
        .edit_particles(|particles| particles[7] = pack(prior_pos, prior_vel))
        .unwrap();
    lab.step(RenderTarget::Texture(&target));

    let quads = lab.as_gpu_mut().unwrap().read_particles().unwrap();
    let moved = position(quads[1].d);
    assert!((moved - (prior_pos + prior_vel)).length() < 1e-4);
}

#[test]
fn test_short_seed_list_leaves_tail_untouched_on_device() {
    let seeds = seed_region().generate_points_inside(None, 10);
    let Some((mut lab, _)) = create_lab(seeds) else {
        return;
    };
    let summary = lab.reset_particles(true);
    assert_eq!(summary.seeded, 10);
    assert_eq!(summary.untouched, 2038);

    let quads = lab.as_gpu_mut().unwrap().read_particles().unwrap();
    assert_ne!(quads[2].b, Vec4::ZERO);
    assert!(quads[3..].iter().all(|q| *q == ParticleQuad::default()));
}

#[test]
fn test_wells_roundtrip_through_engine() {
    let Some((mut lab, _)) = create_lab(Vec::new()) else {
        return;
    };
    lab.set_gravity_well_properties_by_index(1, 0.3, 0.6, 12.0, 3.0);
    let p = lab.gravity_well_normalized_position(GravityWell::Three);
    assert!((p - Vec2::new(0.3, 0.6)).length() < 1e-6);
    lab.reset_all_gravity_wells();
    assert_eq!(lab.gravity_wells().mass(GravityWell::Three), 0.0);
}
