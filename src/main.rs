//! Headless session driver.
//!
//! Reads a JSON script of host states, input events and explicit load results,
//! runs it through a [`Session`], and prints every emitted host update as one
//! JSON line on stdout.
//!
//! ```text
//! labeler-replay script.json [settings.json]
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Deserialize;

use labeler::model::{Dimensions, MediaType};
use labeler::state::{FileMediaSource, ResolverThread};
use labeler::{HostState, InputEvent, LabelerSettings, LogNotifier, Result, Session};

/// One step of a replay script.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Step {
    /// Push a host state.
    Host(Box<HostState>),
    /// Dispatch an input event.
    Input(InputEvent),
    /// Complete the most recent load with fixed dimensions instead of reading the file.
    Loaded(Dimensions),
}

#[derive(Debug, Deserialize)]
struct Script {
    /// Directory relative media URLs resolve against; defaults to the
    /// host's `base.serverRoot`, then to the script's directory.
    #[serde(default)]
    root: Option<PathBuf>,
    /// Read image headers from disk; scripts that only use `loaded` steps
    /// turn this off. Video items always need a `loaded` step.
    #[serde(default = "default_resolve")]
    resolve: bool,
    steps: Vec<Step>,
}

fn default_resolve() -> bool {
    true
}

/// Only image headers can be read from disk; video sizes come from the script.
fn reads_dimensions_from_disk(media_type: MediaType) -> bool {
    media_type == MediaType::Image
}

fn run(script_path: &Path, settings: LabelerSettings) -> Result<()> {
    let script: Script = serde_json::from_str(&std::fs::read_to_string(script_path)?)?;
    let root = script
        .root
        .clone()
        .or_else(|| {
            script.steps.iter().find_map(|step| match step {
                Step::Host(state) if !state.base.server_root.is_empty() => {
                    Some(PathBuf::from(&state.base.server_root))
                }
                _ => None,
            })
        })
        .or_else(|| script_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let mut resolver = if script.resolve {
        log::info!("Resolving media against {:?}", root);
        Some(ResolverThread::spawn(FileMediaSource::new(root))?)
    } else {
        None
    };
    let mut session = Session::new(settings, LogNotifier::default());
    let mut last_ticket = None;

    for (index, step) in script.steps.into_iter().enumerate() {
        log::debug!("Step {}", index);
        match step {
            Step::Host(state) => {
                if let Err(e) = session.sync_host(*state) {
                    log::warn!("Host state rejected: {}", e);
                }
            }
            Step::Input(event) => {
                for update in session.handle_input(event)? {
                    println!("{}", serde_json::to_string(&update)?);
                }
            }
            Step::Loaded(size) => {
                if let Some(ticket) = last_ticket.take() {
                    session.on_media_loaded(&ticket, Ok(size));
                } else {
                    log::warn!("Step {}: no load in flight", index);
                }
            }
        }

        for ticket in session.take_load_requests() {
            last_ticket = Some(ticket.clone());
            match resolver.as_mut() {
                Some(resolver) if reads_dimensions_from_disk(session.host().media_type) => {
                    resolver.request(ticket);
                }
                Some(_) => log::info!("Video {} waits for a `loaded` step", ticket.url),
                None => {}
            }
        }
        // Steps run in order, so every load finishes before the next step.
        if let Some(resolver) = resolver.as_mut() {
            while let Some(done) = resolver.wait() {
                if session.on_media_loaded(&done.ticket, done.result) {
                    last_ticket = None;
                }
            }
        }
    }

    for message in session.notifier().messages() {
        eprintln!("note: {}", message);
    }
    Ok(())
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(script) = args.next() else {
        eprintln!("usage: labeler-replay <script.json> [settings.json]");
        return ExitCode::from(2);
    };
    let settings_path = args.next().map(PathBuf::from).or_else(LabelerSettings::default_path);
    let settings = LabelerSettings::load_or_default(settings_path.as_deref());

    env_logger::Builder::new()
        .filter_level(settings.log_level.to_level_filter())
        .parse_default_env()
        .init();

    match run(Path::new(&script), settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Replay failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_steps_skip_disk_resolution() {
        assert!(reads_dimensions_from_disk(MediaType::Image));
        assert!(!reads_dimensions_from_disk(MediaType::Video));
    }

    #[test]
    fn test_video_script_parses_with_loaded_step() {
        let script: Script = serde_json::from_str(
            r#"{"steps": [
                {"host": {"urls": ["clip.mp4"], "type": "video"}},
                {"loaded": {"width": 640, "height": 360}}
            ]}"#,
        )
        .expect("parse script");
        assert!(script.resolve);
        assert!(matches!(
            &script.steps[0],
            Step::Host(state) if state.media_type == MediaType::Video
        ));
        assert!(matches!(script.steps[1], Step::Loaded(d) if d == Dimensions::new(640, 360)));
    }
}
