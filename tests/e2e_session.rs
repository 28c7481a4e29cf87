//! End-to-end tests for the UI-facing session controller.

use anchor_sync::*;
use tracing_test::traced_test;

async fn started() -> MemorySession {
    // Nothing in here saves, so the map file never exists
    let config = SyncConfig {
        map_file: std::env::temp_dir().join("anchor-sync-e2e-session").join("map.arexperience"),
        capture_timeout_ms: 200,
        ..SyncConfig::default()
    };
    let mut session = open_memory(config).unwrap();
    session.controller.start().await.unwrap();
    session
}

#[tokio::test]
#[traced_test]
async fn test_start_and_switch_are_logged() {
    let mut session = started().await;
    assert!(logs_contain("session started"));

    session
        .controller
        .switch_configuration(TrackingConfiguration::ImageTracking { images: vec!["namecard".into()] })
        .await
        .unwrap();

    assert!(logs_contain("switching configuration"));
    assert_eq!(session.tracker.runs(), 2);
    assert_eq!(session.controller.configuration().name(), "image");
}

#[tokio::test]
#[traced_test]
async fn test_capture_failure_is_reported_not_raised() {
    let session = started().await;
    session.tracker.report_mapping(WorldMappingStatus::Limited);

    let status = session.controller.request_save().await;

    assert!(status.starts_with("Map not ready"), "{status}");
    assert!(logs_contain("world map capture failed"));
    assert!(!session.controller.load_available());
}

#[tokio::test]
#[traced_test]
async fn test_duplicate_add_is_absorbed() {
    let mut session = started().await;
    let face = AnchorKind::Face { mesh_version: 0 };
    session.tracker.add_anchor("F".into(), face.clone(), Transform::IDENTITY);
    session.tracker.add_anchor("F".into(), AnchorKind::Face { mesh_version: 1 }, Transform::IDENTITY);

    let outcomes = session.controller.process_frame();

    assert!(matches!(outcomes[1], SyncOutcome::Updated { geometry_changed: true, .. }));
    assert_eq!(session.controller.synchronizer().registry().len(), 1);
    assert!(logs_contain("duplicate add treated as update"));
}

#[tokio::test]
async fn test_face_configuration_keeps_faces() {
    let mut session = started().await;
    session.controller.switch_configuration(TrackingConfiguration::Face).await.unwrap();
    session.tracker.add_anchor("F".into(), AnchorKind::Face { mesh_version: 3 }, Transform::IDENTITY);
    session.controller.process_frame();

    let binding = session.controller.synchronizer().registry().lookup(&"F".into()).unwrap().clone();
    assert_eq!(
        session.scene.geometry(binding.representation).unwrap(),
        Some(Geometry::FaceMesh { mesh_version: 3, fill_mesh: false })
    );
    assert!(!session.controller.save_enabled());
}

#[tokio::test]
async fn test_export_state_json() {
    let mut session = started().await;
    session.tracker.report_tracking(TrackingState::Normal);
    session.tracker.add_anchor(
        "O".into(),
        AnchorKind::Object { extent: Vec3::new(0.1, 0.1, 0.1), center: Vec3::ZERO },
        Transform::IDENTITY,
    );
    session.controller.process_frame();

    let json = session.controller.export_state_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["anchors"][0]["id"], "O");
    assert_eq!(value["anchors"][0]["kind"]["type"], "Object");
    assert_eq!(value["tracking"], TrackingState::Normal.description());
    assert_eq!(value["epoch"], 1);
}
