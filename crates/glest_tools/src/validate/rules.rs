//! Built-in validation rules.
//!
//! Each rule is independent: it reads the loaded pack and reports what it
//! finds, and a failure in one rule never hides another rule's findings.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use glest_assets::definitions::{stem, unit_file, units_dir};
use glest_assets::error::AssetError;
use glest_assets::loader::CachedLoader;
use glest_core::data::{ResourceKind, UnitCommandKind, UnitDefinition, WELL_KNOWN_RESOURCES};

use super::loaded::{Loaded, LoadedFaction, LoadedPack};
use super::report::{category, Issue};
use super::ValidatorConfig;

/// Model file extension.
const MODEL_EXTENSION: &str = "g3d";

/// A check applied to a loaded pack.
pub trait ValidationRule: Send + Sync {
    /// Short rule name for logs.
    fn name(&self) -> &'static str;

    /// Whether the rule runs under this configuration.
    fn enabled(&self, _config: &ValidatorConfig) -> bool {
        true
    }

    /// Inspect the pack, returning issues in discovery order.
    fn check(&self, pack: &LoadedPack) -> Vec<Issue>;
}

/// Levenshtein distance between two short names.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}

/// Suggest the closest known name when it is close enough to be a typo.
fn did_you_mean<'a>(name: &str, known: impl IntoIterator<Item = &'a str>) -> Option<String> {
    known
        .into_iter()
        .map(|candidate| (edit_distance(name, candidate), candidate))
        .filter(|&(distance, _)| distance <= 2)
        .min()
        .map(|(_, candidate)| format!("did you mean \"{candidate}\"?"))
}

fn duplicates<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    let mut reported = BTreeSet::new();
    let mut found = Vec::new();
    for name in names {
        if !seen.insert(name) && reported.insert(name) {
            found.push(name);
        }
    }
    found
}

// ============================================================================
// Tech tree
// ============================================================================

/// Attack and armor types are present and unique; multipliers name defined types.
#[derive(Debug, Default)]
pub struct TechTreeRule;

impl ValidationRule for TechTreeRule {
    fn name(&self) -> &'static str {
        "tech-tree"
    }

    fn check(&self, pack: &LoadedPack) -> Vec<Issue> {
        let Some(Loaded { file, definition: tree }) = &pack.tech_tree else {
            return Vec::new();
        };
        let mut issues = Vec::new();

        for (field, names) in [
            ("attack_types", &tree.attack_types),
            ("armor_types", &tree.armor_types),
        ] {
            if names.is_empty() {
                issues.push(
                    Issue::error(category::TECH_TREE, format!("No {field} defined"))
                        .file(file)
                        .field(field),
                );
            }
            for name in duplicates(names.iter().map(String::as_str)) {
                issues.push(
                    Issue::error(category::TECH_TREE, format!("Duplicate name in {field}"))
                        .file(file)
                        .field(field)
                        .value(name),
                );
            }
        }

        for multiplier in &tree.damage_multipliers {
            let context = format!("{} vs {}", multiplier.attack, multiplier.armor);
            if !tree.has_attack_type(&multiplier.attack) {
                issues.push(
                    Issue::error(category::TECH_TREE, "Damage multiplier names an unknown attack type")
                        .file(file)
                        .field("damage_multipliers.attack")
                        .value(&multiplier.attack)
                        .context(context.clone())
                        .suggestion(did_you_mean(
                            &multiplier.attack,
                            tree.attack_types.iter().map(String::as_str),
                        )),
                );
            }
            if !tree.has_armor_type(&multiplier.armor) {
                issues.push(
                    Issue::error(category::TECH_TREE, "Damage multiplier names an unknown armor type")
                        .file(file)
                        .field("damage_multipliers.armor")
                        .value(&multiplier.armor)
                        .context(context.clone())
                        .suggestion(did_you_mean(
                            &multiplier.armor,
                            tree.armor_types.iter().map(String::as_str),
                        )),
                );
            }
            if multiplier.value < 0.0 {
                issues.push(
                    Issue::warning(category::TECH_TREE, "Negative damage multiplier")
                        .file(file)
                        .field("damage_multipliers.value")
                        .value(multiplier.value)
                        .context(context),
                );
            }
        }

        issues
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Resource names are unique; tech resources start non-negative; well-known names exist.
#[derive(Debug, Default)]
pub struct ResourceRule;

impl ValidationRule for ResourceRule {
    fn name(&self) -> &'static str {
        "resources"
    }

    fn check(&self, pack: &LoadedPack) -> Vec<Issue> {
        let mut issues = Vec::new();

        for name in duplicates(pack.resources.iter().map(|r| r.definition.name.as_str())) {
            issues.push(
                Issue::error(category::RESOURCE, "Duplicate resource name")
                    .field("name")
                    .value(name),
            );
        }

        for Loaded { file, definition } in &pack.resources {
            if definition.kind == ResourceKind::Tech {
                if let Some(amount) = definition.default_amount.filter(|&a| a < 0) {
                    issues.push(
                        Issue::error(category::RESOURCE, "Tech resource has a negative default amount")
                            .file(file)
                            .field("default_amount")
                            .value(amount)
                            .context(format!("resource {}", definition.name)),
                    );
                }
            }
            if definition.name != stem(file) {
                issues.push(
                    Issue::warning(category::RESOURCE, "Resource name differs from its file name")
                        .file(file)
                        .field("name")
                        .value(&definition.name),
                );
            }
        }

        let names = pack.resource_names();
        for well_known in WELL_KNOWN_RESOURCES {
            if !names.contains(well_known) {
                issues.push(
                    Issue::warning(category::RESOURCE, "Well-known resource is not defined")
                        .value(well_known)
                        .file(&pack.layout.resources_dir()),
                );
            }
        }

        issues
    }
}

// ============================================================================
// Factions
// ============================================================================

/// Starting resources and units resolve; counts are sensible; faction names are unique.
#[derive(Debug, Default)]
pub struct FactionRule;

impl ValidationRule for FactionRule {
    fn name(&self) -> &'static str {
        "factions"
    }

    fn check(&self, pack: &LoadedPack) -> Vec<Issue> {
        let mut issues = Vec::new();
        let resource_names = pack.resource_names();

        let headers: Vec<_> = pack.factions.iter().filter_map(|f| f.header.as_ref()).collect();
        for name in duplicates(headers.iter().map(|h| h.definition.name.as_str())) {
            issues.push(
                Issue::error(category::FACTION, "Duplicate faction name")
                    .field("name")
                    .value(name),
            );
        }

        for faction in &pack.factions {
            let Some(Loaded { file, definition }) = &faction.header else {
                continue;
            };
            let context = format!("faction {}", definition.name);

            if definition.starting_resources.is_empty() {
                issues.push(
                    Issue::warning(category::FACTION, "No starting resources")
                        .file(file)
                        .field("starting_resources")
                        .context(context.clone()),
                );
            }
            for entry in &definition.starting_resources {
                if !resource_names.contains(entry.resource.as_str()) {
                    issues.push(
                        Issue::error(category::XML_REFERENCE, "Starting resource is not defined")
                            .file(file)
                            .field("starting_resources")
                            .value(&entry.resource)
                            .context(context.clone())
                            .suggestion(did_you_mean(
                                &entry.resource,
                                resource_names.iter().copied(),
                            )),
                    );
                }
                if entry.amount < 0 {
                    issues.push(
                        Issue::warning(category::FACTION, "Negative starting amount")
                            .file(file)
                            .field("starting_resources")
                            .value(entry.amount)
                            .context(format!("{context}, resource {}", entry.resource)),
                    );
                }
            }

            if definition.starting_units.is_empty() {
                issues.push(
                    Issue::warning(category::FACTION, "No starting units")
                        .file(file)
                        .field("starting_units")
                        .context(context.clone()),
                );
            }
            for entry in &definition.starting_units {
                let expected = unit_file(&faction.unit_dir(&entry.unit));
                if !expected.is_file() {
                    issues.push(
                        Issue::error(category::XML_REFERENCE, "Starting unit has no definition file")
                            .file(file)
                            .field("starting_units")
                            .value(&entry.unit)
                            .context(context.clone())
                            .suggestion(did_you_mean(&entry.unit, faction.unit_names())),
                    );
                }
                if entry.count <= 0 {
                    issues.push(
                        Issue::warning(category::FACTION, "Starting unit count is not positive")
                            .file(file)
                            .field("starting_units")
                            .value(entry.count)
                            .context(format!("{context}, unit {}", entry.unit)),
                    );
                }
            }

            let hints = &definition.ai_hints;
            for unit in hints.worker_units.iter().chain(&hints.warrior_units) {
                if !faction.has_unit(unit) {
                    issues.push(
                        Issue::warning(category::XML_REFERENCE, "AI hint names an unknown unit")
                            .file(file)
                            .field("ai_hints")
                            .value(unit)
                            .context(context.clone()),
                    );
                }
            }
        }

        issues
    }
}

// ============================================================================
// Units
// ============================================================================

/// Unit parameters are sane and every name a unit mentions resolves.
#[derive(Debug, Default)]
pub struct UnitRule;

struct UnitCheck<'a> {
    pack: &'a LoadedPack,
    faction: &'a LoadedFaction,
    resource_names: &'a BTreeSet<&'a str>,
    file: &'a Path,
    context: String,
    issues: Vec<Issue>,
}

impl UnitCheck<'_> {
    fn issue(&mut self, issue: Issue) {
        let issue = issue.file(self.file).context(self.context.clone());
        self.issues.push(issue);
    }

    fn resource(&mut self, field: &str, name: &str) {
        if !self.resource_names.contains(name) {
            let suggestion = did_you_mean(name, self.resource_names.iter().copied());
            self.issue(
                Issue::error(category::XML_REFERENCE, "Resource is not defined")
                    .field(field)
                    .value(name)
                    .suggestion(suggestion),
            );
        }
    }

    fn unit(&mut self, field: &str, name: &str) {
        if !self.faction.has_unit(name) {
            let suggestion = did_you_mean(name, self.faction.unit_names());
            self.issue(
                Issue::error(category::XML_REFERENCE, "Unit type is not defined in this faction")
                    .field(field)
                    .value(name)
                    .suggestion(suggestion),
            );
        }
    }

    fn run(&mut self, unit: &UnitDefinition) {
        let parameters = &unit.parameters;

        for requirement in &unit.resource_requirements {
            self.resource("resource_requirements", &requirement.resource);
            if requirement.amount <= 0 {
                self.issue(
                    Issue::error(category::UNIT, "Required amount must be positive")
                        .field("resource_requirements")
                        .value(requirement.amount),
                );
            }
        }

        if let Some(tree) = self.pack.tech_tree() {
            if !tree.has_armor_type(&parameters.armor_type) {
                let suggestion =
                    did_you_mean(&parameters.armor_type, tree.armor_types.iter().map(String::as_str));
                self.issue(
                    Issue::error(category::XML_REFERENCE, "Armor type is not in the tech tree")
                        .field("armor_type")
                        .value(&parameters.armor_type)
                        .suggestion(suggestion),
                );
            }
            if let Some(attack_type) = &parameters.attack_type {
                if !tree.has_attack_type(attack_type) {
                    let suggestion =
                        did_you_mean(attack_type, tree.attack_types.iter().map(String::as_str));
                    self.issue(
                        Issue::error(category::XML_REFERENCE, "Attack type is not in the tech tree")
                            .field("attack_type")
                            .value(attack_type)
                            .suggestion(suggestion),
                    );
                }
            }
        }
        if parameters.attack_damage > 0 && parameters.attack_type.is_none() {
            self.issue(
                Issue::error(category::UNIT, "Unit deals damage but has no attack type")
                    .field("attack_type"),
            );
        }

        if parameters.max_hp <= 0 {
            self.issue(
                Issue::error(category::UNIT, "Max HP must be positive")
                    .field("max_hp")
                    .value(parameters.max_hp),
            );
        }
        if parameters.size <= 0 {
            self.issue(
                Issue::warning(category::UNIT, "Size should be positive")
                    .field("size")
                    .value(parameters.size),
            );
        }

        for building in &unit.builds {
            self.unit("builds", building);
        }
        if let Some(structure) = &unit.structure {
            for produced in &structure.produces {
                self.unit("structure.produces", produced);
            }
            for stored in &structure.stores {
                self.resource("structure.stores", stored);
            }
        }
        if let Some(harvest) = &unit.harvest {
            for resource in &harvest.resources {
                self.resource("harvest.resources", resource);
            }
        }
        for upgrade in &unit.upgrades {
            for cost in &upgrade.cost {
                self.resource("upgrades.cost", &cost.resource);
            }
        }

        if unit.has_command(UnitCommandKind::Gather) && unit.harvest.is_none() {
            self.issue(
                Issue::warning(category::UNIT, "Gather command without harvest parameters")
                    .field("commands"),
            );
        }
        if unit.has_command(UnitCommandKind::Build) && unit.builds.is_empty() {
            self.issue(
                Issue::warning(category::UNIT, "Build command without buildable types")
                    .field("commands"),
            );
        }
    }
}

impl ValidationRule for UnitRule {
    fn name(&self) -> &'static str {
        "units"
    }

    fn check(&self, pack: &LoadedPack) -> Vec<Issue> {
        let resource_names = pack.resource_names();
        let mut issues = Vec::new();

        for faction in &pack.factions {
            for Loaded { file, definition } in &faction.units {
                let mut check = UnitCheck {
                    pack,
                    faction,
                    resource_names: &resource_names,
                    file,
                    context: format!("faction {}, unit {}", faction.name(), definition.name),
                    issues: Vec::new(),
                };
                check.run(definition);
                issues.append(&mut check.issues);
            }
        }

        issues
    }
}

// ============================================================================
// Assets on disk
// ============================================================================

/// Unit directories, definition files and models exist; models parse.
#[derive(Debug)]
pub struct AssetRule {
    loader: CachedLoader,
}

impl AssetRule {
    /// Check models through a cache-backed loader.
    #[must_use]
    pub fn new(loader: CachedLoader) -> Self {
        Self { loader }
    }

    fn check_model(&self, path: &Path, context: &str, issues: &mut Vec<Issue>) {
        match self.loader.model(path) {
            Ok(model) => {
                for problem in model.meshes.iter().flat_map(|m| m.index_problems()) {
                    issues.push(
                        Issue::error(category::ASSET_CORRUPT, problem)
                            .file(path)
                            .context(context),
                    );
                }
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                for texture in model.texture_paths() {
                    if !dir.join(texture).is_file() {
                        issues.push(
                            Issue::error(category::ASSET_MISSING, "Texture referenced by model is missing")
                                .file(path)
                                .field("textures")
                                .value(texture)
                                .context(context),
                        );
                    }
                }
            }
            Err(AssetError::Missing(_)) => issues.push(
                Issue::error(category::ASSET_MISSING, "Model file is missing")
                    .file(path)
                    .context(context),
            ),
            Err(error) => issues.push(
                Issue::error(category::ASSET_CORRUPT, error.to_string())
                    .file(path)
                    .context(context),
            ),
        }
    }

    fn check_unit(
        &self,
        unit_dir: &Path,
        definition: Option<&UnitDefinition>,
        context: &str,
        issues: &mut Vec<Issue>,
    ) {
        if !unit_file(unit_dir).is_file() {
            issues.push(
                Issue::error(category::ASSET_MISSING, "Unit definition file is missing")
                    .file(&unit_file(unit_dir))
                    .context(context),
            );
        }

        let models_dir = unit_dir.join("models");
        let mut models: Vec<PathBuf> = match std::fs::read_dir(&models_dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == MODEL_EXTENSION))
                .collect(),
            Err(_) => {
                issues.push(
                    Issue::error(category::ASSET_MISSING, "Models directory is missing")
                        .file(&models_dir)
                        .context(context),
                );
                Vec::new()
            }
        };
        if models.is_empty() && models_dir.is_dir() {
            issues.push(
                Issue::error(category::ASSET_MISSING, "No model files")
                    .file(&models_dir)
                    .context(context),
            );
        }

        if let Some(definition) = definition {
            for referenced in definition.model_paths() {
                let path = unit_dir.join(referenced);
                if !models.contains(&path) {
                    models.push(path);
                }
            }
            if let Some(image) = &definition.image {
                if !unit_dir.join(image).is_file() {
                    issues.push(
                        Issue::error(category::ASSET_MISSING, "Icon image is missing")
                            .file(&unit_dir.join(image))
                            .field("image")
                            .value(image)
                            .context(context),
                    );
                }
            }
        }

        models.sort();
        for model in &models {
            self.check_model(model, context, issues);
        }
    }
}

impl ValidationRule for AssetRule {
    fn name(&self) -> &'static str {
        "assets"
    }

    fn enabled(&self, config: &ValidatorConfig) -> bool {
        !config.skip_assets
    }

    fn check(&self, pack: &LoadedPack) -> Vec<Issue> {
        let mut issues = Vec::new();

        for faction in &pack.factions {
            let units = units_dir(&faction.dir);
            if !units.is_dir() {
                issues.push(
                    Issue::error(category::ASSET_MISSING, "Faction has no units directory")
                        .file(&units)
                        .context(format!("faction {}", faction.name())),
                );
                continue;
            }
            for unit_dir in &faction.unit_dirs {
                let name = stem(unit_dir);
                let definition = faction
                    .units
                    .iter()
                    .find(|u| u.definition.name == name)
                    .map(|u| &u.definition);
                let context = format!("faction {}, unit {name}", faction.name());
                self.check_unit(unit_dir, definition, &context, &mut issues);
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("gol", "gold"), 1);
        assert_eq!(edit_distance("gold", "gold"), 0);
        assert_eq!(edit_distance("stone", "wood"), 4);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_did_you_mean_picks_closest() {
        let known = ["gold", "wood", "stone"];
        assert_eq!(
            did_you_mean("gol", known),
            Some("did you mean \"gold\"?".to_string())
        );
        assert_eq!(did_you_mean("mana", known), None);
    }

    #[test]
    fn test_duplicates_reported_once() {
        assert_eq!(duplicates(["a", "b", "a", "a", "c", "b"]), vec!["a", "b"]);
        assert!(duplicates(["a", "b"]).is_empty());
    }
}
