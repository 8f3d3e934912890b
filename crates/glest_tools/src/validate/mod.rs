//! Content-pack validation.
//!
//! The validator loads a pack leniently, then applies its rules. Rules may
//! run concurrently on the rayon pool, but the report is always ordered
//! the same way: load failures first, then each rule's issues in rule
//! registration order, each in discovery order.

mod loaded;
mod report;
mod rules;

use std::path::Path;
use std::sync::Arc;

use glest_assets::cache::{AssetCache, CacheConfig};
use glest_assets::loader::CachedLoader;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use loaded::{load_issue, Loaded, LoadedFaction, LoadedPack};
pub use report::{category, Issue, Severity, ValidationReport};
pub use rules::{AssetRule, FactionRule, ResourceRule, TechTreeRule, UnitRule, ValidationRule};

/// Validator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Skip checks that read assets other than definitions.
    pub skip_assets: bool,
    /// Run rules concurrently.
    pub parallel: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            skip_assets: false,
            parallel: true,
        }
    }
}

/// Applies an ordered set of rules to content packs.
pub struct Validator {
    config: ValidatorConfig,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("config", &self.config)
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

impl Validator {
    /// A validator with the built-in rules and a private model cache.
    #[must_use]
    pub fn new(config: ValidatorConfig) -> Self {
        let cache = Arc::new(AssetCache::new(CacheConfig::default()));
        Self::with_loader(config, CachedLoader::new(cache))
    }

    /// A validator with the built-in rules, loading models through `loader`.
    #[must_use]
    pub fn with_loader(config: ValidatorConfig, loader: CachedLoader) -> Self {
        Self {
            config,
            rules: vec![
                Box::new(TechTreeRule),
                Box::new(ResourceRule),
                Box::new(FactionRule),
                Box::new(UnitRule),
                Box::new(AssetRule::new(loader)),
            ],
        }
    }

    /// A validator with no rules.
    #[must_use]
    pub fn empty(config: ValidatorConfig) -> Self {
        Self {
            config,
            rules: Vec::new(),
        }
    }

    /// Append a rule; it runs after the ones already registered.
    #[must_use]
    pub fn with_rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> ValidatorConfig {
        self.config
    }

    /// Names of registered rules, in order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Load and validate the pack rooted at `pack_dir`.
    #[must_use]
    pub fn validate(&self, pack_dir: &Path) -> ValidationReport {
        let (pack, mut issues) = LoadedPack::load(pack_dir);
        debug!(
            pack = %pack.layout.name(),
            load_issues = issues.len(),
            "Loaded pack for validation"
        );
        issues.extend(self.run_rules(&pack));
        let report = ValidationReport::new(pack.layout.name(), issues);
        info!("Validated {}", report.summary());
        report
    }

    /// Apply the rules to an already loaded pack.
    #[must_use]
    pub fn run_rules(&self, pack: &LoadedPack) -> Vec<Issue> {
        let enabled: Vec<_> = self
            .rules
            .iter()
            .filter(|r| r.enabled(&self.config))
            .collect();

        let per_rule: Vec<Vec<Issue>> = if self.config.parallel {
            enabled.par_iter().map(|rule| rule.check(pack)).collect()
        } else {
            enabled.iter().map(|rule| rule.check(pack)).collect()
        };

        for (rule, issues) in enabled.iter().zip(&per_rule) {
            debug!(rule = rule.name(), issues = issues.len(), "Rule finished");
        }
        per_rule.into_iter().flatten().collect()
    }
}

/// Validate a pack with the default configuration.
#[must_use]
pub fn validate_pack(pack_dir: &Path) -> ValidationReport {
    Validator::default().validate(pack_dir)
}
