//! Content-pack validator tests.
//!
//! Each test writes the magic pack to a temporary directory, breaks one
//! thing about it and checks that exactly the expected issue appears.

use std::path::{Path, PathBuf};

use glest_test_utils::fixtures::{classic_resources, magic_faction, magic_units, tech_tree, MAGIC};
use glest_test_utils::g3d::standing_model;
use glest_test_utils::pack::{
    faction_file, replace_in_file, unit_dir, write_magic_pack, write_pack, FactionFiles,
};
use glest_tools::validate::{
    category, Issue, LoadedPack, Severity, ValidationReport, ValidationRule, Validator,
    ValidatorConfig,
};

fn magic_pack() -> (tempfile::TempDir, PathBuf) {
    let techs = tempfile::tempdir().expect("tempdir");
    let pack = write_magic_pack(techs.path()).expect("write pack");
    (techs, pack)
}

fn validate(pack: &Path) -> ValidationReport {
    Validator::default().validate(pack)
}

fn errors(report: &ValidationReport) -> Vec<&Issue> {
    report.with_severity(Severity::Error).collect()
}

/// Issue identity without the timestamp.
fn key(issue: &Issue) -> (Severity, String, String, Option<String>, Option<String>) {
    (
        issue.severity,
        issue.category.clone(),
        issue.message.clone(),
        issue.file.clone(),
        issue.value.clone(),
    )
}

// ============================================================================
// Clean pack
// ============================================================================

#[test]
fn test_magic_pack_is_clean() {
    let (_techs, pack) = magic_pack();
    let report = validate(&pack);
    assert_eq!(report.errors, 0, "{}", report.to_text());
    assert_eq!(report.warnings, 0, "{}", report.to_text());
    assert_eq!(report.pack, "megapack");
}

#[test]
fn test_serial_and_parallel_reports_match() {
    let (_techs, pack) = magic_pack();
    replace_in_file(&faction_file(&pack, MAGIC), "gold", "gol").expect("edit");
    std::fs::remove_file(unit_dir(&pack, MAGIC, "golem").join("models/golem_walking.g3d"))
        .expect("remove model");

    let parallel = Validator::new(ValidatorConfig {
        skip_assets: false,
        parallel: true,
    })
    .validate(&pack);
    let serial = Validator::new(ValidatorConfig {
        skip_assets: false,
        parallel: false,
    })
    .validate(&pack);

    let parallel: Vec<_> = parallel.issues.iter().map(key).collect();
    let serial: Vec<_> = serial.issues.iter().map(key).collect();
    assert!(parallel.len() >= 2);
    assert_eq!(parallel, serial);
}

// ============================================================================
// Faction references
// ============================================================================

#[test]
fn test_misspelled_starting_resource() {
    let (_techs, pack) = magic_pack();
    replace_in_file(&faction_file(&pack, MAGIC), "gold", "gol").expect("edit");

    let report = validate(&pack);
    let errors = errors(&report);
    assert_eq!(errors.len(), 1, "{}", report.to_text());
    assert_eq!(errors[0].category, "XML Reference");
    assert_eq!(errors[0].value.as_deref(), Some("gol"));
    assert_eq!(errors[0].field.as_deref(), Some("starting_resources"));
    assert_eq!(
        errors[0].suggestion.as_deref(),
        Some("did you mean \"gold\"?")
    );
    assert_eq!(
        errors[0].file.as_deref(),
        Some(faction_file(&pack, MAGIC).display().to_string().as_str())
    );
}

#[test]
fn test_missing_starting_unit_file() {
    let (_techs, pack) = magic_pack();
    std::fs::remove_dir_all(unit_dir(&pack, MAGIC, "summoner")).expect("remove unit");

    let report = validate(&pack);
    let missing: Vec<_> = errors(&report)
        .into_iter()
        .filter(|i| i.value.as_deref() == Some("summoner"))
        .collect();
    assert!(!missing.is_empty(), "{}", report.to_text());
    assert!(missing
        .iter()
        .any(|i| i.category == category::XML_REFERENCE && i.field.as_deref() == Some("starting_units")));
}

// ============================================================================
// Unit definitions
// ============================================================================

#[test]
fn test_unknown_armor_type() {
    let (_techs, pack) = magic_pack();
    let file = unit_dir(&pack, MAGIC, "daemon").join("daemon.ron");
    replace_in_file(&file, "\"organic\"", "\"scales\"").expect("edit");

    let report = validate(&pack);
    let errors = errors(&report);
    assert_eq!(errors.len(), 1, "{}", report.to_text());
    assert_eq!(errors[0].category, category::XML_REFERENCE);
    assert_eq!(errors[0].field.as_deref(), Some("armor_type"));
    assert_eq!(errors[0].value.as_deref(), Some("scales"));
    assert_eq!(errors[0].context.as_deref(), Some("faction magic, unit daemon"));
}

#[test]
fn test_unknown_required_resource_and_attack_type() {
    let (_techs, pack) = magic_pack();
    let file = unit_dir(&pack, MAGIC, "golem").join("golem.ron");
    replace_in_file(&file, "\"siege\"", "\"catapult\"").expect("edit");
    replace_in_file(&file, "resource: \"stone\"", "resource: \"granite\"").expect("edit");

    let report = validate(&pack);
    let values: Vec<_> = errors(&report)
        .iter()
        .filter_map(|i| i.value.clone())
        .collect();
    assert!(values.contains(&"catapult".to_string()), "{}", report.to_text());
    assert!(values.contains(&"granite".to_string()), "{}", report.to_text());
}

#[test]
fn test_unparseable_unit_is_reported_and_other_rules_still_run() {
    let (_techs, pack) = magic_pack();
    let unit_file = unit_dir(&pack, MAGIC, "battlemage").join("battlemage.ron");
    replace_in_file(&unit_file, "parameters", "42").expect("edit");
    replace_in_file(&faction_file(&pack, MAGIC), "gold", "gol").expect("edit");

    let report = validate(&pack);
    let first = &report.issues[0];
    assert_eq!(first.category, category::XML_PARSE);
    assert_eq!(first.severity, Severity::Error);
    assert_eq!(first.file.as_deref(), Some(unit_file.display().to_string().as_str()));
    assert!(first.line.is_some());

    assert_eq!(report.in_category(category::XML_PARSE).count(), 1);
    assert!(report
        .in_category(category::XML_REFERENCE)
        .any(|i| i.value.as_deref() == Some("gol")));
}

// ============================================================================
// Tech tree and resources
// ============================================================================

#[test]
fn test_tech_tree_structure() {
    let techs = tempfile::tempdir().expect("tempdir");
    let tree = tech_tree(
        "broken",
        &["blade", "arrow", "magic", "siege", "blade"],
        &["leather", "wood", "stone", "organic"],
        &[("blade", "leather", 1.0), ("laser", "stone", 0.5)],
    );
    let pack = write_pack(
        techs.path(),
        "broken",
        &tree,
        &classic_resources(),
        &[FactionFiles {
            faction: magic_faction(),
            units: magic_units(),
        }],
    )
    .expect("write pack");

    let report = validate(&pack);
    let tree_errors: Vec<_> = report.in_category(category::TECH_TREE).collect();
    assert_eq!(tree_errors.len(), 2, "{}", report.to_text());
    assert_eq!(tree_errors[0].value.as_deref(), Some("blade"));
    assert_eq!(tree_errors[1].value.as_deref(), Some("laser"));
    assert_eq!(report.errors, 2);
}

#[test]
fn test_missing_well_known_resource_warns() {
    let techs = tempfile::tempdir().expect("tempdir");
    let resources: Vec<_> = classic_resources()
        .into_iter()
        .filter(|r| r.name != "wood")
        .collect();
    let tree = glest_test_utils::fixtures::classic_tech_tree();
    let pack = write_pack(
        techs.path(),
        "megapack",
        &tree,
        &resources,
        &[FactionFiles {
            faction: magic_faction(),
            units: magic_units(),
        }],
    )
    .expect("write pack");

    let report = validate(&pack);
    assert!(report
        .with_severity(Severity::Warning)
        .any(|i| i.category == category::RESOURCE && i.value.as_deref() == Some("wood")));
    // The faction and the units still mention wood.
    assert!(report
        .in_category(category::XML_REFERENCE)
        .all(|i| i.value.as_deref() == Some("wood")));
    assert!(report.has_errors());
}

// ============================================================================
// Assets
// ============================================================================

#[test]
fn test_corrupt_model() {
    let (_techs, pack) = magic_pack();
    let model = unit_dir(&pack, MAGIC, "daemon").join("models/daemon_standing.g3d");
    standing_model().truncate(12).write_to(&model).expect("write model");

    let report = validate(&pack);
    let errors = errors(&report);
    assert_eq!(errors.len(), 1, "{}", report.to_text());
    assert_eq!(errors[0].category, category::ASSET_CORRUPT);
    assert_eq!(errors[0].file.as_deref(), Some(model.display().to_string().as_str()));

    let skipped = Validator::new(ValidatorConfig {
        skip_assets: true,
        parallel: true,
    })
    .validate(&pack);
    assert_eq!(skipped.errors, 0);
}

#[test]
fn test_missing_model_texture_and_icon() {
    let (_techs, pack) = magic_pack();
    let initiate = unit_dir(&pack, MAGIC, "initiate");
    std::fs::remove_file(initiate.join("models/initiate_walking.g3d")).expect("remove model");
    std::fs::remove_file(initiate.join("images/initiate.bmp")).expect("remove icon");
    std::fs::remove_file(unit_dir(&pack, MAGIC, "golem").join("models/staff.tga"))
        .expect("remove texture");

    let report = validate(&pack);
    let missing: Vec<_> = report.in_category(category::ASSET_MISSING).collect();
    assert_eq!(missing.len(), 3, "{}", report.to_text());
    assert!(missing.iter().any(|i| i
        .file
        .as_deref()
        .is_some_and(|f| f.ends_with("initiate_walking.g3d"))));
    assert!(missing
        .iter()
        .any(|i| i.value.as_deref() == Some("images/initiate.bmp")));
    assert!(missing.iter().any(|i| i.value.as_deref() == Some("staff.tga")));
}

#[test]
fn test_missing_models_directory() {
    let (_techs, pack) = magic_pack();
    std::fs::remove_dir_all(unit_dir(&pack, MAGIC, "summoner").join("models"))
        .expect("remove models");

    let report = validate(&pack);
    assert!(report
        .in_category(category::ASSET_MISSING)
        .any(|i| i.message == "Models directory is missing"));
}

// ============================================================================
// Custom rules
// ============================================================================

struct NoGolems;

impl ValidationRule for NoGolems {
    fn name(&self) -> &'static str {
        "no-golems"
    }

    fn check(&self, pack: &LoadedPack) -> Vec<Issue> {
        pack.factions
            .iter()
            .filter(|f| f.has_unit("golem"))
            .map(|f| Issue::info(category::UNIT, "Faction fields golems").context(f.name()))
            .collect()
    }
}

#[test]
fn test_custom_rule_runs_last() {
    let (_techs, pack) = magic_pack();
    let validator = Validator::default().with_rule(NoGolems);
    assert_eq!(
        validator.rule_names(),
        vec!["tech-tree", "resources", "factions", "units", "assets", "no-golems"]
    );

    let report = validator.validate(&pack);
    assert_eq!(report.infos, 1);
    let last = report.issues.last().expect("one issue");
    assert_eq!(last.message, "Faction fields golems");
    assert_eq!(last.context.as_deref(), Some("magic"));
}
