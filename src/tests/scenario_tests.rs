//! End-to-end labeling stories.

use super::{click, drag, open_session, pet_config, run};
use crate::host::{HostState, HostUpdate};
use crate::model::{Action, ConfigScope, Dimensions, HostLabels, Point, RegionKind};
use crate::session::{Command, InputEvent};
use crate::state::KeyCommand;

fn labels_of(updates: &[HostUpdate]) -> &HostLabels {
    updates
        .iter()
        .find_map(|u| match u {
            HostUpdate::Labels { labels, .. } => Some(labels),
            _ => None,
        })
        .expect("labels update")
}

#[test]
fn test_single_image_classification_save() {
    let mut session = open_session(&["cat.png"], Dimensions::new(640, 480));
    session
        .handle_input(InputEvent::Command(Command::ToggleLabel {
            scope: ConfigScope::Image,
            name: "cat/dog".into(),
            value: "dog".into(),
        }))
        .expect("toggle");

    let updates = session
        .handle_input(InputEvent::Command(Command::Save))
        .expect("save");
    let json = serde_json::to_value(labels_of(&updates)).expect("serialize");
    assert_eq!(json["image"]["cat/dog"], serde_json::json!(["dog"]));
    assert_eq!(json["boxes"], serde_json::json!([]));
    assert_eq!(json["dimensions"], serde_json::json!({"width": 640, "height": 480}));

    assert!(!session.draft().is_dirty());
    assert!(session.navigator().items()[0].state.labeled);
}

#[test]
fn test_box_on_tall_image() {
    let mut session = open_session(&["tall.png"], Dimensions::new(100, 200));
    run(
        &mut session,
        vec![InputEvent::Key(KeyCommand::SelectTool(Some(RegionKind::Box)))],
    );
    run(&mut session, drag((10.0, 10.0), (50.0, 80.0)));

    let updates = session
        .handle_input(InputEvent::Command(Command::Save))
        .expect("save");
    let HostLabels::Image(doc) = labels_of(&updates) else {
        panic!("expected image labels");
    };
    let b = &doc.boxes[0].geometry;
    assert!(b.pt1.distance_to(&Point::new(0.1, 0.05)) < 1e-9);
    assert!(b.pt2.distance_to(&Point::new(0.5, 0.4)) < 1e-9);
}

#[test]
fn test_batch_progress_ignores_ignored_items() {
    let mut session = open_session(&["a.png", "b.png", "c.png"], Dimensions::new(10, 10));
    let mut state = session.host().clone();
    state.states[1].ignored = true;
    session.sync_host(state).expect("sync");

    assert_eq!(session.progress(), Some(0.0));
    session
        .handle_input(InputEvent::Command(Command::Save))
        .expect("save");
    // One of the two non-ignored items is labeled.
    assert_eq!(session.progress(), Some(0.5));
}

#[test]
fn test_batch_save_targets_selection() {
    let mut session = open_session(&["a.png", "b.png", "c.png"], Dimensions::new(10, 10));
    for index in [0, 2] {
        session
            .handle_input(InputEvent::Command(Command::ToggleSelected(index)))
            .expect("select");
    }
    let updates = session
        .handle_input(InputEvent::Command(Command::Save))
        .expect("save");
    let states = updates
        .iter()
        .find_map(|u| match u {
            HostUpdate::States { states } => Some(states),
            _ => None,
        })
        .expect("states update");
    let labeled: Vec<bool> = states.iter().map(|s| s.labeled).collect();
    assert_eq!(labeled, vec![true, false, true]);
}

#[test]
fn test_polygon_with_region_labels() {
    let mut session = open_session(&["p.png"], Dimensions::new(200, 200));
    run(
        &mut session,
        vec![InputEvent::Key(KeyCommand::SelectTool(Some(RegionKind::Polygon)))],
    );
    let mut events = click(20.0, 20.0);
    events.extend(click(180.0, 20.0));
    events.extend(click(100.0, 150.0));
    events.push(InputEvent::Key(KeyCommand::ClosePolygon));
    for value in ["tail", "head"] {
        events.push(InputEvent::Command(Command::ToggleLabel {
            scope: ConfigScope::Regions,
            name: "kind".into(),
            value: value.into(),
        }));
    }
    run(&mut session, events);

    let updates = session
        .handle_input(InputEvent::Command(Command::Save))
        .expect("save");
    let HostLabels::Image(doc) = labels_of(&updates) else {
        panic!("expected image labels");
    };
    assert_eq!(doc.polygons.len(), 1);
    assert_eq!(doc.polygons[0].geometry.points.len(), 3);
    assert_eq!(
        doc.polygons[0].labels["kind"],
        vec!["head".to_string(), "tail".to_string()]
    );
}

#[test]
fn test_mask_committed_at_natural_resolution() {
    // 1024x512 media draws on a 512x256 canvas.
    let mut session = open_session(&["m.png"], Dimensions::new(1024, 512));
    run(
        &mut session,
        vec![InputEvent::Key(KeyCommand::SelectTool(Some(RegionKind::Mask)))],
    );
    run(&mut session, drag((100.0, 100.0), (140.0, 100.0)));
    assert_eq!(
        session.draft().labels().masks[0].geometry.dimensions,
        Dimensions::new(512, 256)
    );

    let updates = session
        .handle_input(InputEvent::Command(Command::Save))
        .expect("save");
    let HostLabels::Image(doc) = labels_of(&updates) else {
        panic!("expected image labels");
    };
    let mask = &doc.masks[0].geometry;
    assert_eq!(mask.dimensions, Dimensions::new(1024, 512));
    assert_eq!(mask.values.len(), 1024 * 512);
    assert!(mask.values.iter().all(|&v| v == 0 || v == 255));
    assert_eq!(mask.get(240, 200), Some(255));
    assert_eq!(mask.get(900, 500), Some(0));
}

#[test]
fn test_delete_region_then_save() {
    let mut session = open_session(&["d.png"], Dimensions::new(100, 100));
    run(
        &mut session,
        vec![InputEvent::Key(KeyCommand::SelectTool(Some(RegionKind::Box)))],
    );
    run(&mut session, drag((10.0, 10.0), (40.0, 40.0)));
    run(&mut session, drag((60.0, 60.0), (90.0, 90.0)));
    run(&mut session, vec![InputEvent::Key(KeyCommand::DeleteRegion)]);

    let updates = session
        .handle_input(InputEvent::Command(Command::Save))
        .expect("save");
    let HostLabels::Image(doc) = labels_of(&updates) else {
        panic!("expected image labels");
    };
    assert_eq!(doc.boxes.len(), 1);
    assert!(doc.boxes[0].geometry.pt2.x < 0.5);
}

#[test]
fn test_config_save_emits_config() {
    let mut session = open_session(&["c.png"], Dimensions::new(10, 10));
    let mut config = pet_config();
    config.regions.clear();
    let updates = session
        .handle_input(InputEvent::Command(Command::SaveConfig(config.clone())))
        .expect("save config");
    assert_eq!(updates, vec![HostUpdate::Config { config }]);
    assert!(!session.pointer_enabled());
}

#[test]
fn test_navigation_emits_action_and_reloads() {
    let mut session = open_session(&["a.png", "b.png"], Dimensions::new(10, 10));
    let updates = session
        .handle_input(InputEvent::Command(Command::Next))
        .expect("next");
    assert_eq!(
        updates,
        vec![HostUpdate::Action {
            action: Action::Next
        }]
    );
    assert_eq!(session.navigator().index(), 1);
}

#[test]
fn test_single_item_host_round_trip() {
    let json = r#"{
        "urls": ["files/x.png"],
        "states": [{"metadata": {"source": "camera"}}],
        "config": {"image": [{"name": "cat/dog", "options": [{"name": "cat"}, {"name": "dog"}]}]},
        "labels": {"image": {"cat/dog": ["cat"]}, "boxes": [{"pt1": {"x": 0.1, "y": 0.1}, "pt2": {"x": 0.2, "y": 0.3}}]}
    }"#;
    let state: HostState = serde_json::from_str(json).expect("parse");
    let mut session = open_session(&[], Dimensions::new(1, 1));
    session.sync_host(state).expect("sync");
    assert_eq!(session.draft().labels().boxes.len(), 1);
    assert_eq!(
        session.navigator().items()[0].state.metadata["source"],
        "camera"
    );
    assert_eq!(session.take_load_requests().len(), 1);
}
