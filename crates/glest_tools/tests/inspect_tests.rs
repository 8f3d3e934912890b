//! Model inspection tests.

use glest_test_utils::g3d::{standing_model, walking_model};
use glest_tools::inspect::inspect_model;

#[test]
fn test_inspect_standing_model() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("standing.g3d");
    standing_model().write_to(&path).expect("write model");

    let summary = inspect_model(&path).expect("inspect");
    assert_eq!(summary.version, 4);
    assert_eq!(summary.meshes.len(), 2);
    assert_eq!(summary.total_vertices, 406);
    assert_eq!(summary.total_triangles, 556);
    assert!(summary.textured);
    assert!(!summary.animated);
    assert!(summary.meshes[0].properties.is_empty());
    assert_eq!(summary.meshes[1].properties, vec!["two-sided"]);
    assert_eq!(summary.meshes[1].textures, vec!["staff.tga".to_string()]);
    assert!(summary.meshes.iter().all(|m| m.problems.is_empty()));

    let text = summary.to_string();
    assert!(text.contains("2 meshes, 406 vertices, 556 triangles"));
    assert!(text.contains("texture: body.tga"));
}

#[test]
fn test_inspect_walking_model_as_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("walking.g3d");
    walking_model().write_to(&path).expect("write model");

    let summary = inspect_model(&path).expect("inspect");
    assert!(summary.animated);
    assert_eq!(summary.meshes[0].frames, 8);

    let json: serde_json::Value = serde_json::to_value(&summary).expect("serialize");
    assert_eq!(json["meshes"][0]["triangles"], 180);
    assert_eq!(json["animated"], true);
}

#[test]
fn test_inspect_truncated_model_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.g3d");
    walking_model().truncate(40).write_to(&path).expect("write model");

    let err = inspect_model(&path).expect_err("truncated model");
    assert_eq!(err.kind(), "AssetCorrupt");
}
