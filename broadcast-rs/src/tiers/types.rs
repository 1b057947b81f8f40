use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Metered limit kinds
///
/// Closed enum so a typo in a catalog file fails at load time instead of
/// silently creating an unenforced limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Direct posts per day
    PostsPerDay,
    /// Post edits per day
    EditsPerDay,
    /// Currently pending scheduled posts
    ScheduledPosts,
    /// Currently connected destinations
    ConnectedDestinations,
    /// Destinations per bulk operation
    BulkDestinations,
    /// In-flight sends per batch
    ConcurrentOperations,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::PostsPerDay => "posts_per_day",
            Metric::EditsPerDay => "edits_per_day",
            Metric::ScheduledPosts => "scheduled_posts",
            Metric::ConnectedDestinations => "connected_destinations",
            Metric::BulkDestinations => "bulk_destinations",
            Metric::ConcurrentOperations => "concurrent_operations",
        }
    }

    /// All known metrics, used for catalog validation
    pub fn all() -> [Metric; 6] {
        [
            Metric::PostsPerDay,
            Metric::EditsPerDay,
            Metric::ScheduledPosts,
            Metric::ConnectedDestinations,
            Metric::BulkDestinations,
            Metric::ConcurrentOperations,
        ]
    }
}

/// Gated capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    BulkPosting,
    Scheduling,
    PostEditing,
    Analytics,
}

impl FeatureFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureFlag::BulkPosting => "bulk_posting",
            FeatureFlag::Scheduling => "scheduling",
            FeatureFlag::PostEditing => "post_editing",
            FeatureFlag::Analytics => "analytics",
        }
    }
}

/// Command access for a tier: an explicit set, or everything
///
/// Serialized as a list of command names where `"*"` means wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum CommandAccess {
    All,
    Explicit(HashSet<String>),
}

impl CommandAccess {
    pub fn allows(&self, command: &str) -> bool {
        match self {
            CommandAccess::All => true,
            CommandAccess::Explicit(commands) => commands.contains(command),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, CommandAccess::All)
    }
}

impl From<Vec<String>> for CommandAccess {
    fn from(raw: Vec<String>) -> Self {
        if raw.iter().any(|c| c == "*") {
            CommandAccess::All
        } else {
            CommandAccess::Explicit(raw.into_iter().collect())
        }
    }
}

impl From<CommandAccess> for Vec<String> {
    fn from(access: CommandAccess) -> Self {
        match access {
            CommandAccess::All => vec!["*".to_string()],
            CommandAccess::Explicit(commands) => {
                let mut list: Vec<String> = commands.into_iter().collect();
                list.sort();
                list
            }
        }
    }
}

/// One subscription tier
///
/// Immutable after catalog construction; tier changes are a redeploy-time
/// operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    pub name: String,
    /// Ordinal position; higher levels grant at least as much
    pub level: u32,
    pub price_cents: u32,
    pub commands: CommandAccess,
    /// `-1` means unlimited
    #[serde(default)]
    pub limits: HashMap<Metric, i64>,
    #[serde(default)]
    pub features: HashMap<FeatureFlag, bool>,
}

impl TierDefinition {
    /// Limit for a metric. An absent entry is treated as zero (denied);
    /// only an explicit `-1` grants unlimited use.
    pub fn limit(&self, metric: Metric) -> i64 {
        self.limits.get(&metric).copied().unwrap_or(0)
    }

    pub fn is_unlimited(&self, metric: Metric) -> bool {
        self.limit(metric) == -1
    }

    pub fn has_feature(&self, flag: FeatureFlag) -> bool {
        self.features.get(&flag).copied().unwrap_or(false)
    }

    pub fn allows_command(&self, command: &str) -> bool {
        self.commands.allows(command)
    }
}
