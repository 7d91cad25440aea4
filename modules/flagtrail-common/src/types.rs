use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::FlagtrailError;

// --- Well-known actors ---

/// User id recorded for events produced by the system itself.
pub const SYSTEM_USER_ID: i64 = -1337;

/// User id recorded for events produced through an admin API token.
pub const ADMIN_TOKEN_USER_ID: i64 = -42;

/// Fallback `created_by` when the caller supplies none.
pub const DEFAULT_CREATED_BY: &str = "admin";

// --- Event type tag ---

/// Closed tag identifying what kind of change an event records.
///
/// The wire form is the kebab-case name (`feature-created`). Unknown strings
/// are a validation error at the boundary; stored rows always carry one of
/// these tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    // Feature lifecycle
    FeatureCreated,
    FeatureUpdated,
    FeatureMetadataUpdated,
    FeatureArchived,
    FeatureRevived,
    FeatureDeleted,
    FeatureStaleOn,
    FeatureStaleOff,
    FeatureCompleted,
    FeatureTagged,
    FeatureUntagged,
    FeatureVariantsUpdated,
    FeatureImport,
    FeaturesImported,

    // Per-environment feature state
    FeatureEnvironmentEnabled,
    FeatureEnvironmentDisabled,
    FeatureEnvironmentVariantsUpdated,

    // Strategies attached to a feature
    FeatureStrategyAdd,
    FeatureStrategyUpdate,
    FeatureStrategyRemove,
    StrategyOrderChanged,

    // Strategy definitions
    StrategyCreated,
    StrategyUpdated,
    StrategyDeleted,
    StrategyDeprecated,
    StrategyReactivated,

    // Projects
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    ProjectArchived,
    ProjectRevived,

    // Segments
    SegmentCreated,
    SegmentUpdated,
    SegmentDeleted,

    // Tags and tag types
    TagCreated,
    TagDeleted,
    TagTypeCreated,
    TagTypeUpdated,
    TagTypeDeleted,

    // Environments
    EnvironmentCreated,
    EnvironmentUpdated,
    EnvironmentDeleted,

    // Context fields
    ContextFieldCreated,
    ContextFieldUpdated,
    ContextFieldDeleted,

    // API tokens
    ApiTokenCreated,
    ApiTokenDeleted,
}

impl EventType {
    /// The kebab-case wire/database form of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::FeatureCreated => "feature-created",
            EventType::FeatureUpdated => "feature-updated",
            EventType::FeatureMetadataUpdated => "feature-metadata-updated",
            EventType::FeatureArchived => "feature-archived",
            EventType::FeatureRevived => "feature-revived",
            EventType::FeatureDeleted => "feature-deleted",
            EventType::FeatureStaleOn => "feature-stale-on",
            EventType::FeatureStaleOff => "feature-stale-off",
            EventType::FeatureCompleted => "feature-completed",
            EventType::FeatureTagged => "feature-tagged",
            EventType::FeatureUntagged => "feature-untagged",
            EventType::FeatureVariantsUpdated => "feature-variants-updated",
            EventType::FeatureImport => "feature-import",
            EventType::FeaturesImported => "features-imported",
            EventType::FeatureEnvironmentEnabled => "feature-environment-enabled",
            EventType::FeatureEnvironmentDisabled => "feature-environment-disabled",
            EventType::FeatureEnvironmentVariantsUpdated => {
                "feature-environment-variants-updated"
            }
            EventType::FeatureStrategyAdd => "feature-strategy-add",
            EventType::FeatureStrategyUpdate => "feature-strategy-update",
            EventType::FeatureStrategyRemove => "feature-strategy-remove",
            EventType::StrategyOrderChanged => "strategy-order-changed",
            EventType::StrategyCreated => "strategy-created",
            EventType::StrategyUpdated => "strategy-updated",
            EventType::StrategyDeleted => "strategy-deleted",
            EventType::StrategyDeprecated => "strategy-deprecated",
            EventType::StrategyReactivated => "strategy-reactivated",
            EventType::ProjectCreated => "project-created",
            EventType::ProjectUpdated => "project-updated",
            EventType::ProjectDeleted => "project-deleted",
            EventType::ProjectArchived => "project-archived",
            EventType::ProjectRevived => "project-revived",
            EventType::SegmentCreated => "segment-created",
            EventType::SegmentUpdated => "segment-updated",
            EventType::SegmentDeleted => "segment-deleted",
            EventType::TagCreated => "tag-created",
            EventType::TagDeleted => "tag-deleted",
            EventType::TagTypeCreated => "tag-type-created",
            EventType::TagTypeUpdated => "tag-type-updated",
            EventType::TagTypeDeleted => "tag-type-deleted",
            EventType::EnvironmentCreated => "environment-created",
            EventType::EnvironmentUpdated => "environment-updated",
            EventType::EnvironmentDeleted => "environment-deleted",
            EventType::ContextFieldCreated => "context-field-created",
            EventType::ContextFieldUpdated => "context-field-updated",
            EventType::ContextFieldDeleted => "context-field-deleted",
            EventType::ApiTokenCreated => "api-token-created",
            EventType::ApiTokenDeleted => "api-token-deleted",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = FlagtrailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| FlagtrailError::Validation(format!("unknown event type: {s}")))
    }
}

// --- Tags ---

/// A `{type, value}` label attached to an event, mirroring the tags on the
/// feature the event concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Tag {
    #[serde(rename = "type")]
    pub tag_type: String,
    pub value: String,
}

impl Tag {
    pub fn new(tag_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag_type: tag_type.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_wire_form() {
        for ty in [
            EventType::FeatureCreated,
            EventType::FeatureStrategyUpdate,
            EventType::SegmentDeleted,
            EventType::ApiTokenCreated,
        ] {
            let parsed: EventType = ty.as_str().parse().unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn event_type_serializes_kebab_case() {
        let json = serde_json::to_string(&EventType::FeatureEnvironmentEnabled).unwrap();
        assert_eq!(json, "\"feature-environment-enabled\"");
    }

    #[test]
    fn unknown_event_type_is_a_validation_error() {
        let err = "feature-exploded".parse::<EventType>().unwrap_err();
        assert!(err.to_string().contains("feature-exploded"));
    }

    #[test]
    fn tag_serializes_with_type_key() {
        let tag = Tag::new("simple", "beta");
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["type"], "simple");
        assert_eq!(json["value"], "beta");
    }
}
