//! CloudMemorystoreInstance - desired state for one Redis instance.

use std::any::Any;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ConditionedStatus, Managed, ObjectMeta};

/// Kind name of [`CloudMemorystoreInstance`].
pub const KIND: &str = "CloudMemorystoreInstance";

/// Provider config used when the spec names none.
pub const DEFAULT_PROVIDER_CONFIG: &str = "default";

/// A managed Cloud Memorystore for Redis instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudMemorystoreInstance {
    pub metadata: ObjectMeta,
    pub spec: InstanceSpec,
    #[serde(default)]
    pub status: InstanceStatus,
}

/// Reference to the provider config holding credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfigReference {
    pub name: String,
}

/// Where the caller should write connection details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_ref: Option<ProviderConfigReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,
    pub for_provider: InstanceParameters,
}

/// User-supplied instance parameters.
///
/// Optional fields left unset are late-initialized from the provider once
/// the instance has been observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceParameters {
    /// Region the instance lives in, e.g. `us-central1`.
    pub region: String,

    /// Service tier, `BASIC` or `STANDARD_HA`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,

    /// Redis memory size in GiB.
    #[serde(rename = "memorySizeGb")]
    pub memory_size_gb: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,

    /// Zone of the replica for `STANDARD_HA` instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_location_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_version: Option<String>,

    /// CIDR range of internal addresses reserved for the instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_ip_range: Option<String>,

    /// VPC network the instance is connected to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_network: Option<String>,

    /// `DIRECT_PEERING` or `PRIVATE_SERVICE_ACCESS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_mode: Option<String>,

    /// Whether Redis AUTH is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Redis configuration parameters, e.g. `maxmemory-policy`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub redis_configs: BTreeMap<String, String>,
}

/// Attributes observed at the provider. Never set from user input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceObservation {
    /// Fully qualified name, `projects/{p}/locations/{l}/instances/{n}`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_location_id: String,
    /// RFC 3339 creation time reported by the provider.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub create_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub persistence_iam_identity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
    #[serde(default)]
    pub at_provider: InstanceObservation,
}

impl CloudMemorystoreInstance {
    pub fn new(name: impl Into<String>, for_provider: InstanceParameters) -> Self {
        Self {
            metadata: ObjectMeta::new(name),
            spec: InstanceSpec {
                for_provider,
                ..Default::default()
            },
            status: InstanceStatus::default(),
        }
    }

    /// Name of the provider config holding credentials for this instance.
    pub fn provider_config_name(&self) -> &str {
        self.spec
            .provider_config_ref
            .as_ref()
            .map(|r| r.name.as_str())
            .unwrap_or(DEFAULT_PROVIDER_CONFIG)
    }
}

impl Managed for CloudMemorystoreInstance {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn conditions(&self) -> &ConditionedStatus {
        &self.status.conditioned
    }

    fn conditions_mut(&mut self) -> &mut ConditionedStatus {
        &mut self.status.conditioned
    }

    fn external_state(&self) -> Option<&str> {
        Some(self.status.at_provider.state.as_str()).filter(|s| !s.is_empty())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_manifest() {
        let json = r#"{
            "metadata": {
                "name": "cache",
                "annotations": {"crossplane.io/external-name": "cache-8sdh3"}
            },
            "spec": {
                "providerConfigRef": {"name": "gcp"},
                "forProvider": {
                    "region": "us-central1",
                    "tier": "BASIC",
                    "memorySizeGb": 1,
                    "redisConfigs": {"maxmemory-policy": "allkeys-lru"}
                }
            }
        }"#;

        let i: CloudMemorystoreInstance = serde_json::from_str(json).unwrap();
        assert_eq!(i.metadata.external_name(), Some("cache-8sdh3"));
        assert_eq!(i.provider_config_name(), "gcp");
        assert_eq!(i.spec.for_provider.memory_size_gb, 1);
        assert_eq!(i.spec.for_provider.tier.as_deref(), Some("BASIC"));
        assert!(i.status.conditioned.conditions.is_empty());
        assert_eq!(i.status.at_provider, InstanceObservation::default());
    }

    #[test]
    fn test_default_provider_config() {
        let i = CloudMemorystoreInstance::new("cache", InstanceParameters::default());
        assert_eq!(i.provider_config_name(), DEFAULT_PROVIDER_CONFIG);
    }

    #[test]
    fn test_downcast() {
        let mut i = CloudMemorystoreInstance::new("cache", InstanceParameters::default());
        let mg: &mut dyn Managed = &mut i;
        assert_eq!(mg.kind(), KIND);
        assert!(mg.as_any_mut().downcast_mut::<CloudMemorystoreInstance>().is_some());
    }
}
