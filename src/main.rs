//! Interactive particle lab demo.
//!
//! Space cycles presets, `r` reseeds from the last positions, `c` toggles
//! trails, `s` saves a capture, Escape quits. Set `RUST_LOG=debug` for
//! frame-level logging.

mod demo;

use winit::event_loop::{ControlFlow, EventLoop};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = demo::App::new();
    event_loop.run_app(&mut app)?;
    Ok(())
}
