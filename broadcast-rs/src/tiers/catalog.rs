use crate::error::{EngineError, Result};
use crate::tiers::types::{CommandAccess, FeatureFlag, Metric, TierDefinition};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Immutable registry of subscription tiers
///
/// Constructed once at process start and injected behind an `Arc`; there is
/// no runtime mutation. Unknown tier names resolve to the lowest tier, so a
/// subject without an active subscription always lands somewhere valid.
pub struct TierCatalog {
    /// Sorted by ascending level
    tiers: Vec<TierDefinition>,
}

#[derive(Deserialize)]
struct CatalogFile {
    tiers: Vec<TierDefinition>,
}

impl TierCatalog {
    /// Build a catalog from tier definitions, validating as we go
    pub fn new(mut tiers: Vec<TierDefinition>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(EngineError::Catalog("catalog has no tiers".to_string()));
        }

        tiers.sort_by_key(|t| t.level);

        let mut names = std::collections::HashSet::new();
        for tier in &tiers {
            if !names.insert(tier.name.as_str()) {
                return Err(EngineError::Catalog(format!(
                    "duplicate tier name '{}'",
                    tier.name
                )));
            }
        }
        for pair in tiers.windows(2) {
            if pair[0].level == pair[1].level {
                return Err(EngineError::Catalog(format!(
                    "tiers '{}' and '{}' share level {}",
                    pair[0].name, pair[1].name, pair[0].level
                )));
            }
        }

        debug!("Tier catalog loaded with {} tiers", tiers.len());
        Ok(Self { tiers })
    }

    /// Load a catalog from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| EngineError::Catalog(e.to_string()))?;
        let file: CatalogFile =
            toml::from_str(&content).map_err(|e| EngineError::Catalog(e.to_string()))?;

        info!("Loading tier catalog from {}", path.as_ref().display());
        Self::new(file.tiers)
    }

    /// Get a tier by name, falling back to the lowest tier for unknown names
    pub fn get(&self, name: &str) -> &TierDefinition {
        self.tiers
            .iter()
            .find(|t| t.name == name)
            .unwrap_or_else(|| self.lowest())
    }

    /// Resolve an optional tier name; `None` means no active subscription
    pub fn resolve(&self, name: Option<&str>) -> &TierDefinition {
        match name {
            Some(name) => self.get(name),
            None => self.lowest(),
        }
    }

    /// The lowest-level tier (the free fallback)
    pub fn lowest(&self) -> &TierDefinition {
        // new() rejects empty catalogs
        &self.tiers[0]
    }

    /// The next-higher tier, or `None` at the top
    pub fn next_tier(&self, current: &TierDefinition) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.level > current.level)
    }

    /// The lowest tier granting a feature, for upgrade hints
    pub fn min_tier_with(&self, feature: FeatureFlag) -> Option<&TierDefinition> {
        self.tiers
            .iter()
            .find(|t| t.has_feature(feature) || t.commands.is_wildcard())
    }

    /// The lowest tier whose command set allows a command
    pub fn min_tier_allowing(&self, command: &str) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.allows_command(command))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TierDefinition> {
        self.tiers.iter()
    }
}

impl Default for TierCatalog {
    /// Built-in free / pro / enterprise catalog
    fn default() -> Self {
        let free = TierDefinition {
            name: "free".to_string(),
            level: 0,
            price_cents: 0,
            commands: CommandAccess::Explicit(
                ["post", "edit", "delete"].iter().map(|s| s.to_string()).collect(),
            ),
            limits: HashMap::from([
                (Metric::PostsPerDay, 3),
                (Metric::EditsPerDay, 10),
                (Metric::ScheduledPosts, 0),
                (Metric::ConnectedDestinations, 1),
                (Metric::BulkDestinations, 0),
                (Metric::ConcurrentOperations, 1),
            ]),
            features: HashMap::new(),
        };

        let pro = TierDefinition {
            name: "pro".to_string(),
            level: 1,
            price_cents: 999,
            commands: CommandAccess::Explicit(
                ["post", "edit", "delete", "schedule", "bulkpost"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            limits: HashMap::from([
                (Metric::PostsPerDay, 50),
                (Metric::EditsPerDay, 200),
                (Metric::ScheduledPosts, 25),
                (Metric::ConnectedDestinations, 10),
                (Metric::BulkDestinations, 20),
                (Metric::ConcurrentOperations, 3),
            ]),
            features: HashMap::from([
                (FeatureFlag::BulkPosting, true),
                (FeatureFlag::Scheduling, true),
                (FeatureFlag::PostEditing, true),
            ]),
        };

        let enterprise = TierDefinition {
            name: "enterprise".to_string(),
            level: 2,
            price_cents: 4999,
            commands: CommandAccess::All,
            limits: Metric::all().iter().map(|m| (*m, -1)).collect(),
            features: HashMap::from([
                (FeatureFlag::BulkPosting, true),
                (FeatureFlag::Scheduling, true),
                (FeatureFlag::PostEditing, true),
                (FeatureFlag::Analytics, true),
            ]),
        };

        // Already sorted by level; no validation needed for the built-ins
        Self {
            tiers: vec![free, pro, enterprise],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unknown_tier_falls_back_to_lowest() {
        let catalog = TierCatalog::default();
        assert_eq!(catalog.get("platinum").name, "free");
        assert_eq!(catalog.resolve(None).name, "free");
        assert_eq!(catalog.resolve(Some("pro")).name, "pro");
    }

    #[test]
    fn test_next_tier() {
        let catalog = TierCatalog::default();
        let free = catalog.get("free");
        let pro = catalog.next_tier(free).unwrap();
        assert_eq!(pro.name, "pro");
        let enterprise = catalog.next_tier(pro).unwrap();
        assert_eq!(enterprise.name, "enterprise");
        assert!(catalog.next_tier(enterprise).is_none());
    }

    #[test]
    fn test_min_tier_with_feature() {
        let catalog = TierCatalog::default();
        let hint = catalog.min_tier_with(FeatureFlag::BulkPosting).unwrap();
        assert_eq!(hint.name, "pro");
        let hint = catalog.min_tier_with(FeatureFlag::Analytics).unwrap();
        assert_eq!(hint.name, "enterprise");
    }

    #[test]
    fn test_min_tier_allowing_command() {
        let catalog = TierCatalog::default();
        assert_eq!(catalog.min_tier_allowing("post").unwrap().name, "free");
        assert_eq!(catalog.min_tier_allowing("bulkpost").unwrap().name, "pro");
        // Only the wildcard tier covers commands nobody lists explicitly
        assert_eq!(
            catalog.min_tier_allowing("export").unwrap().name,
            "enterprise"
        );
    }

    #[test]
    fn test_enterprise_is_unlimited_everywhere() {
        let catalog = TierCatalog::default();
        let enterprise = catalog.get("enterprise");
        for metric in Metric::all() {
            assert!(enterprise.is_unlimited(metric), "{:?}", metric);
        }
        assert!(enterprise.allows_command("anything"));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(TierCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_duplicate_level_rejected() {
        let catalog = TierCatalog::default();
        let mut a = catalog.get("free").clone();
        let mut b = catalog.get("pro").clone();
        a.level = 1;
        b.level = 1;
        assert!(TierCatalog::new(vec![a, b]).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[tiers]]
name = "basic"
level = 0
price_cents = 0
commands = ["post"]

[tiers.limits]
posts_per_day = 5

[[tiers]]
name = "max"
level = 1
price_cents = 1999
commands = ["*"]

[tiers.limits]
posts_per_day = -1
"#
        )
        .unwrap();

        let catalog = TierCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.lowest().name, "basic");
        assert_eq!(catalog.get("max").limit(Metric::PostsPerDay), -1);
        assert!(catalog.get("max").commands.is_wildcard());
    }
}
