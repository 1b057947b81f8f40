use crate::admission::types::{Action, AuthorizationResult};
use crate::quota::QuotaTracker;
use crate::tiers::{TierCatalog, TierDefinition};
use std::sync::Arc;
use tracing::debug;

/// Single decision point for gated actions
///
/// Check order: command allowlist, then feature flag, then quota. Explicit
/// allowlisting (including the wildcard) skips the feature check entirely;
/// feature flags are a restrictive overlay, never a permissive override of
/// a disallowed command.
pub struct AdmissionController {
    catalog: Arc<TierCatalog>,
    quota: Arc<QuotaTracker>,
}

impl AdmissionController {
    pub fn new(catalog: Arc<TierCatalog>, quota: Arc<QuotaTracker>) -> Self {
        Self { catalog, quota }
    }

    /// Resolve a subject's tier; `None` (no active subscription) and unknown
    /// names both fall back to the lowest tier
    pub fn tier_for(&self, tier_name: Option<&str>) -> &TierDefinition {
        self.catalog.resolve(tier_name)
    }

    /// Authorize one action for a subject
    pub async fn authorize(
        &self,
        subject_id: &str,
        tier_name: Option<&str>,
        action: Action,
    ) -> AuthorizationResult {
        let tier = self.catalog.resolve(tier_name);

        if !tier.allows_command(action.command()) {
            match action.required_feature() {
                Some(flag) if tier.has_feature(flag) => {
                    // Feature grant stands in for the missing allowlist entry
                }
                Some(flag) => {
                    let hint = self
                        .catalog
                        .min_tier_with(flag)
                        .map(|t| t.name.clone());
                    debug!(
                        "Denied {} for {}: feature {} missing on tier {}",
                        action.command(),
                        subject_id,
                        flag.as_str(),
                        tier.name
                    );
                    return AuthorizationResult::feature_denied(
                        format!(
                            "{} requires the {} feature, not available on the {} tier",
                            action.command(),
                            flag.as_str(),
                            tier.name
                        ),
                        hint,
                    );
                }
                None => {
                    let hint = self
                        .catalog
                        .min_tier_allowing(action.command())
                        .map(|t| t.name.clone());
                    return AuthorizationResult::feature_denied(
                        format!(
                            "{} is not available on the {} tier",
                            action.command(),
                            tier.name
                        ),
                        hint,
                    );
                }
            }
        }

        if let Some((metric, kind)) = action.quota_metric() {
            let limit = tier.limit(metric);
            let decision = self
                .quota
                .check_and_consume(subject_id, metric, kind, limit, 1)
                .await;

            if !decision.allowed {
                let hint = self.catalog.next_tier(tier).map(|t| t.name.clone());
                return AuthorizationResult::quota_denied(&decision, hint);
            }
        }

        AuthorizationResult::allowed()
    }
}
