//! Crate-level tests that drive a whole [`Session`](crate::Session).
//!
//! Scenario tests follow one user story end to end; property tests check
//! invariants over a spread of inputs.

mod scenario_tests;

use crate::host::HostState;
use crate::model::{Config, Dimensions, LabelConfig};
use crate::session::{InputEvent, LogNotifier, Session};
use crate::settings::LabelerSettings;
use crate::state::{PointerEvent, PointerKind};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Image categories `cat/dog`, region categories `kind`.
fn pet_config() -> Config {
    Config::new(
        vec![LabelConfig::single("cat/dog", &["cat", "dog"])],
        vec![LabelConfig::multiple("kind", &["head", "tail"])],
    )
}

/// Session with `urls` pushed and the first item loaded at `size`.
fn open_session(urls: &[&str], size: Dimensions) -> Session<LogNotifier> {
    init_logging();
    let mut session = Session::new(LabelerSettings::default(), LogNotifier::default());
    session
        .sync_host(HostState::images(urls, pet_config()))
        .expect("sync host");
    for ticket in session.take_load_requests() {
        session.on_media_loaded(&ticket, Ok(size));
    }
    session
}

fn drag(from: (f64, f64), to: (f64, f64)) -> Vec<InputEvent> {
    let event = |kind, (x, y): (f64, f64)| InputEvent::Pointer(PointerEvent::new(kind, x, y));
    vec![
        event(PointerKind::Down, from),
        event(PointerKind::Move, ((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0)),
        event(PointerKind::Move, to),
        event(PointerKind::Up, to),
    ]
}

fn click(x: f64, y: f64) -> Vec<InputEvent> {
    vec![
        InputEvent::Pointer(PointerEvent::new(PointerKind::Down, x, y)),
        InputEvent::Pointer(PointerEvent::new(PointerKind::Up, x, y)),
    ]
}

fn run(session: &mut Session<LogNotifier>, events: Vec<InputEvent>) {
    for event in events {
        session.handle_input(event).expect("input");
    }
}
