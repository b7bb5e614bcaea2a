//! Translation between instance parameters and Redis API messages.
//!
//! Everything here is pure: no I/O, no clock, so repeated observations of
//! the same remote instance produce identical results.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::DateTime;
use prost_types::FieldMask;
use tracing::warn;

use crate::proto::instance::{ConnectMode, State, Tier};
use crate::proto::Instance;
use crate::resource::{
    ConnectionDetails, InstanceObservation, InstanceParameters, CONNECTION_ENDPOINT_KEY,
    CONNECTION_PORT_KEY,
};

/// Fields of an instance that can be changed after creation.
pub const MUTABLE_FIELDS: [&str; 4] = ["memory_size_gb", "display_name", "labels", "redis_configs"];

/// Lifecycle state reported by the provider.
///
/// The provider may add states at any time, so unrecognized values are kept
/// as [`InstanceState::Other`] instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceState {
    Unspecified,
    Creating,
    Ready,
    Updating,
    Deleting,
    Repairing,
    Maintenance,
    Importing,
    FailingOver,
    Other(String),
}

impl InstanceState {
    pub fn from_remote(value: i32) -> Self {
        match State::try_from(value) {
            Ok(State::Unspecified) => InstanceState::Unspecified,
            Ok(State::Creating) => InstanceState::Creating,
            Ok(State::Ready) => InstanceState::Ready,
            Ok(State::Updating) => InstanceState::Updating,
            Ok(State::Deleting) => InstanceState::Deleting,
            Ok(State::Repairing) => InstanceState::Repairing,
            Ok(State::Maintenance) => InstanceState::Maintenance,
            Ok(State::Importing) => InstanceState::Importing,
            Ok(State::FailingOver) => InstanceState::FailingOver,
            Err(_) => InstanceState::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Unspecified => State::Unspecified.as_str_name(),
            InstanceState::Creating => State::Creating.as_str_name(),
            InstanceState::Ready => State::Ready.as_str_name(),
            InstanceState::Updating => State::Updating.as_str_name(),
            InstanceState::Deleting => State::Deleting.as_str_name(),
            InstanceState::Repairing => State::Repairing.as_str_name(),
            InstanceState::Maintenance => State::Maintenance.as_str_name(),
            InstanceState::Importing => State::Importing.as_str_name(),
            InstanceState::FailingOver => State::FailingOver.as_str_name(),
            InstanceState::Other(s) => s,
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Names
// =============================================================================

/// `projects/{project}/locations/{region}`
pub fn parent(project: &str, region: &str) -> String {
    format!("projects/{project}/locations/{region}")
}

/// `projects/{project}/locations/{region}/instances/{name}`
pub fn qualified_name(project: &str, region: &str, name: &str) -> String {
    format!("{}/instances/{name}", parent(project, region))
}

// =============================================================================
// Spec -> API
// =============================================================================

/// Build the API representation of the desired instance.
pub fn generate_instance(qualified_name: &str, p: &InstanceParameters) -> Instance {
    Instance {
        name: qualified_name.to_string(),
        display_name: p.display_name.clone().unwrap_or_default(),
        labels: to_remote_map(&p.labels),
        location_id: p.location_id.clone().unwrap_or_default(),
        alternative_location_id: p.alternative_location_id.clone().unwrap_or_default(),
        redis_version: p.redis_version.clone().unwrap_or_default(),
        reserved_ip_range: p.reserved_ip_range.clone().unwrap_or_default(),
        redis_configs: to_remote_map(&p.redis_configs),
        tier: parse_enum("tier", p.tier.as_deref(), Tier::from_str_name)
            .unwrap_or(Tier::Unspecified) as i32,
        memory_size_gb: p.memory_size_gb,
        authorized_network: p.authorized_network.clone().unwrap_or_default(),
        connect_mode: parse_enum(
            "connect_mode",
            p.connect_mode.as_deref(),
            ConnectMode::from_str_name,
        )
        .unwrap_or(ConnectMode::Unspecified) as i32,
        auth_enabled: p.auth_enabled.unwrap_or_default(),
        ..Default::default()
    }
}

/// Build the update payload: the mutable subset of the desired instance and
/// the mask naming it.
pub fn generate_update(qualified_name: &str, p: &InstanceParameters) -> (Instance, FieldMask) {
    let instance = Instance {
        name: qualified_name.to_string(),
        display_name: p.display_name.clone().unwrap_or_default(),
        labels: to_remote_map(&p.labels),
        redis_configs: to_remote_map(&p.redis_configs),
        memory_size_gb: p.memory_size_gb,
        ..Default::default()
    };
    let mask = FieldMask {
        paths: MUTABLE_FIELDS.iter().map(|f| f.to_string()).collect(),
    };
    (instance, mask)
}

// =============================================================================
// API -> Status
// =============================================================================

/// Observed attributes of a remote instance.
pub fn generate_observation(i: &Instance) -> InstanceObservation {
    InstanceObservation {
        name: i.name.clone(),
        state: InstanceState::from_remote(i.state).to_string(),
        status_message: i.status_message.clone(),
        host: i.host.clone(),
        port: i.port,
        current_location_id: i.current_location_id.clone(),
        create_time: i
            .create_time
            .as_ref()
            .and_then(|t| DateTime::from_timestamp(t.seconds, u32::try_from(t.nanos).ok()?))
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
        persistence_iam_identity: i.persistence_iam_identity.clone(),
    }
}

/// Fill unset parameters from the remote instance. Returns whether anything
/// changed. Values the user set are never touched.
pub fn late_initialize(p: &mut InstanceParameters, i: &Instance) -> bool {
    let before = p.clone();

    if p.tier.is_none() {
        let tier = Tier::try_from(i.tier).unwrap_or(Tier::Unspecified);
        p.tier = Some(tier.as_str_name().to_string());
    }
    late_init_string(&mut p.location_id, &i.location_id);
    late_init_string(&mut p.alternative_location_id, &i.alternative_location_id);
    late_init_string(&mut p.redis_version, &i.redis_version);
    late_init_string(&mut p.reserved_ip_range, &i.reserved_ip_range);
    late_init_string(&mut p.authorized_network, &i.authorized_network);
    if p.connect_mode.is_none() {
        if let Ok(mode) = ConnectMode::try_from(i.connect_mode) {
            if mode != ConnectMode::Unspecified {
                p.connect_mode = Some(mode.as_str_name().to_string());
            }
        }
    }
    if p.redis_configs.is_empty() && !i.redis_configs.is_empty() {
        p.redis_configs = i.redis_configs.clone().into_iter().collect();
    }

    *p != before
}

fn late_init_string(field: &mut Option<String>, observed: &str) {
    if field.is_none() && !observed.is_empty() {
        *field = Some(observed.to_string());
    }
}

/// Whether the mutable parameters match the remote instance.
pub fn is_up_to_date(p: &InstanceParameters, i: &Instance) -> bool {
    p.memory_size_gb == i.memory_size_gb
        && p.display_name.as_deref().unwrap_or_default() == i.display_name
        && same_map(&p.labels, &i.labels)
        && same_map(&p.redis_configs, &i.redis_configs)
}

fn to_remote_map(m: &BTreeMap<String, String>) -> HashMap<String, String> {
    m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn same_map(want: &BTreeMap<String, String>, got: &HashMap<String, String>) -> bool {
    want.len() == got.len() && want.iter().all(|(k, v)| got.get(k) == Some(v))
}

/// Look up a proto enum by name. A value the user set that names no variant
/// is logged and treated as unset.
fn parse_enum<T>(
    field: &str,
    value: Option<&str>,
    from_str_name: fn(&str) -> Option<T>,
) -> Option<T> {
    let value = value?;
    let parsed = from_str_name(value);
    if parsed.is_none() {
        warn!(field, value, "Unknown enum value, sending unspecified");
    }
    parsed
}

/// Connection details, present only once the provider reports an endpoint.
pub fn connection_details(o: &InstanceObservation) -> ConnectionDetails {
    let mut cd = ConnectionDetails::new();
    if !o.host.is_empty() && o.port > 0 {
        cd.insert(CONNECTION_ENDPOINT_KEY.to_string(), o.host.clone().into_bytes());
        cd.insert(CONNECTION_PORT_KEY.to_string(), o.port.to_string().into_bytes());
    }
    cd
}
