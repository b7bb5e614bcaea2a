//! Managed resource model shared by the connector, the external client and
//! the reconciler.
//!
//! A managed resource is the desired-state object for one external resource:
//! object metadata, a user-supplied spec, and a status holding conditions and
//! whatever was last observed at the provider.

pub mod instance;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use instance::{
    CloudMemorystoreInstance, InstanceObservation, InstanceParameters, InstanceSpec, InstanceStatus,
    ProviderConfigReference, SecretReference,
};

/// Annotation holding the name of the resource at the provider.
pub const ANNOTATION_EXTERNAL_NAME: &str = "crossplane.io/external-name";

/// Connection detail key for the endpoint host.
pub const CONNECTION_ENDPOINT_KEY: &str = "endpoint";
/// Connection detail key for the endpoint port.
pub const CONNECTION_PORT_KEY: &str = "port";

/// Connection details handed to the secret writer of the caller.
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

// =============================================================================
// Managed Trait
// =============================================================================

/// A desired-state object the controller can reconcile.
///
/// The controller only ever receives `dyn Managed`; operations that need a
/// concrete kind downcast through [`Managed::as_any_mut`] and reject
/// anything else.
pub trait Managed: Any + Send + Sync + fmt::Debug {
    /// Kind name, used in logs.
    fn kind(&self) -> &'static str;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn conditions(&self) -> &ConditionedStatus;
    fn conditions_mut(&mut self) -> &mut ConditionedStatus;

    /// Lifecycle state last reported by the provider, if any.
    fn external_state(&self) -> Option<&str> {
        None
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// =============================================================================
// Object Metadata
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Set by the owner of the object once deletion was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub generation: i64,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// External name, if one has been assigned.
    pub fn external_name(&self) -> Option<&str> {
        self.annotations
            .get(ANNOTATION_EXTERNAL_NAME)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }

    pub fn set_external_name(&mut self, name: impl Into<String>) {
        self.annotations.insert(ANNOTATION_EXTERNAL_NAME.to_string(), name.into());
    }

    pub fn deletion_requested(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

// =============================================================================
// Conditions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    /// Whether the external resource is ready for use.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionReason {
    Available,
    Unavailable,
    Creating,
    Deleting,
}

impl fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionReason::Available => "Available",
            ConditionReason::Unavailable => "Unavailable",
            ConditionReason::Creating => "Creating",
            ConditionReason::Deleting => "Deleting",
        };
        f.write_str(s)
    }
}

/// One typed status flag with the time it last changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub status: ConditionStatus,
    pub last_transition_time: DateTime<Utc>,
    pub reason: ConditionReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    fn ready(status: ConditionStatus, reason: ConditionReason) -> Self {
        Self {
            kind: ConditionType::Ready,
            status,
            last_transition_time: Utc::now(),
            reason,
            message: None,
        }
    }

    /// The external resource is available for use.
    pub fn available() -> Self {
        Self::ready(ConditionStatus::True, ConditionReason::Available)
    }

    /// The external resource exists but is not usable.
    pub fn unavailable() -> Self {
        Self::ready(ConditionStatus::False, ConditionReason::Unavailable)
    }

    /// The external resource is being created.
    pub fn creating() -> Self {
        Self::ready(ConditionStatus::False, ConditionReason::Creating)
    }

    /// The external resource is being deleted.
    pub fn deleting() -> Self {
        Self::ready(ConditionStatus::False, ConditionReason::Deleting)
    }

    /// Attach a human-readable detail, e.g. the provider's status message.
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Equal in everything but the transition time.
    pub fn equal(&self, other: &Condition) -> bool {
        self.kind == other.kind
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Conditions of an object, at most one per type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionedStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ConditionedStatus {
    pub fn get(&self, kind: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }

    /// Set conditions by type.
    ///
    /// A condition equal to the one already present keeps the existing
    /// transition time, so re-applying the same condition is a no-op.
    pub fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        for new in conditions {
            match self.conditions.iter_mut().find(|c| c.kind == new.kind) {
                Some(existing) if existing.equal(&new) => {}
                Some(existing) => *existing = new,
                None => self.conditions.push(new),
            }
        }
    }

    /// Whether the Ready condition currently carries `reason`.
    pub fn has_reason(&self, reason: ConditionReason) -> bool {
        self.get(ConditionType::Ready).is_some_and(|c| c.reason == reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_set_conditions_overwrites_by_type() {
        let mut status = ConditionedStatus::default();
        status.set_conditions([Condition::creating()]);
        status.set_conditions([Condition::available()]);

        assert_eq!(status.conditions.len(), 1);
        assert!(status.has_reason(ConditionReason::Available));
    }

    #[test]
    fn test_set_equal_condition_keeps_transition_time() {
        let then = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut status = ConditionedStatus::default();
        let mut c = Condition::available();
        c.last_transition_time = then;
        status.set_conditions([c]);

        status.set_conditions([Condition::available()]);
        assert_eq!(status.conditions[0].last_transition_time, then);
    }

    #[test]
    fn test_external_name() {
        let mut meta = ObjectMeta::new("cache");
        assert_eq!(meta.external_name(), None);

        meta.set_external_name("");
        assert_eq!(meta.external_name(), None);

        meta.set_external_name("cache-8sdh3");
        assert_eq!(meta.external_name(), Some("cache-8sdh3"));
    }

    #[test]
    fn test_condition_serializes_type_field() {
        let c = Condition::deleting();
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["type"], "Ready");
        assert_eq!(v["status"], "False");
        assert_eq!(v["reason"], "Deleting");
        assert!(v.get("message").is_none());
    }
}
