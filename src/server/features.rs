use super::AppState;
use super::response::{ApiError, StoreResultExt};
use crate::types::Caller;

/// Returns true if `feature` is on for at least one of the caller's organizations,
/// either globally through server config or through an organization feature row.
pub fn feature_enabled_for_any(
    state: &AppState,
    caller: &Caller,
    feature: &str,
) -> Result<bool, ApiError> {
    if caller.organizations.is_empty() {
        return Ok(false);
    }

    if state.enabled_features.iter().any(|f| f == feature) {
        return Ok(true);
    }

    state
        .store
        .has_feature_for_any(&caller.organization_ids(), feature)
        .api_err("Failed to check feature flags")
}

/// Guard for feature-gated handlers. A disabled feature looks like a missing route.
pub fn require_feature(state: &AppState, caller: &Caller, feature: &str) -> Result<(), ApiError> {
    if !feature_enabled_for_any(state, caller, feature)? {
        tracing::debug!(user = %caller.user.id, feature, "Feature not enabled for caller");
        return Err(ApiError::not_found("Not found"));
    }
    Ok(())
}
