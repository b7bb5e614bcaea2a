//! Shared test utilities for memstore-controller integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use memstore_controller::resource::{
    CloudMemorystoreInstance, Condition, ConditionedStatus, InstanceParameters, Managed,
    ObjectMeta,
};

pub const REGION: &str = "us-cool1";
pub const PROJECT: &str = "coolProject";
pub const INSTANCE_NAME: &str = "claimns-claimname-8sdh3";
pub const QUALIFIED_NAME: &str =
    "projects/coolProject/locations/us-cool1/instances/claimns-claimname-8sdh3";
pub const MEMORY_SIZE_GB: i32 = 1;
pub const HOST: &str = "172.16.0.1";
pub const PORT: i32 = 6379;

/// A managed resource of a kind the controller does not handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Strange {
    pub meta: ObjectMeta,
    pub status: ConditionedStatus,
}

impl Managed for Strange {
    fn kind(&self) -> &'static str {
        "Strange"
    }

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }

    fn conditions(&self) -> &ConditionedStatus {
        &self.status
    }

    fn conditions_mut(&mut self) -> &mut ConditionedStatus {
        &mut self.status
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub type Modifier = Box<dyn FnOnce(&mut CloudMemorystoreInstance)>;

pub fn with_conditions(c: Vec<Condition>) -> Modifier {
    Box::new(move |i| i.status.conditioned.set_conditions(c))
}

pub fn with_state(s: &str) -> Modifier {
    let s = s.to_string();
    Box::new(move |i| i.status.at_provider.state = s)
}

pub fn with_full_name(name: &str) -> Modifier {
    let name = name.to_string();
    Box::new(move |i| i.status.at_provider.name = name)
}

pub fn with_status_message(msg: &str) -> Modifier {
    let msg = msg.to_string();
    Box::new(move |i| i.status.at_provider.status_message = msg)
}

pub fn with_host(h: &str) -> Modifier {
    let h = h.to_string();
    Box::new(move |i| i.status.at_provider.host = h)
}

pub fn with_port(p: i32) -> Modifier {
    Box::new(move |i| i.status.at_provider.port = p)
}

pub fn with_tier(tier: &str) -> Modifier {
    let tier = tier.to_string();
    Box::new(move |i| i.spec.for_provider.tier = Some(tier))
}

pub fn with_deletion_requested() -> Modifier {
    Box::new(|i| i.metadata.deletion_timestamp = Some(Utc::now()))
}

pub fn without_external_name() -> Modifier {
    Box::new(|i| {
        i.metadata.annotations.clear();
    })
}

/// The instance every test starts from.
pub fn instance(modifiers: Vec<Modifier>) -> CloudMemorystoreInstance {
    let mut i = CloudMemorystoreInstance::new(
        INSTANCE_NAME,
        InstanceParameters {
            region: REGION.to_string(),
            memory_size_gb: MEMORY_SIZE_GB,
            redis_configs: BTreeMap::from([("cool".to_string(), "socool".to_string())]),
            authorized_network: Some("default".to_string()),
            connect_mode: Some("DIRECT_PEERING".to_string()),
            ..Default::default()
        },
    );
    i.metadata.set_external_name(INSTANCE_NAME);

    for m in modifiers {
        m(&mut i);
    }
    i
}

/// Zero every condition transition time so objects compare by content.
pub fn normalized(mut i: CloudMemorystoreInstance) -> CloudMemorystoreInstance {
    for c in &mut i.status.conditioned.conditions {
        c.last_transition_time = DateTime::<Utc>::default();
    }
    i.metadata.deletion_timestamp = i
        .metadata
        .deletion_timestamp
        .map(|_| DateTime::<Utc>::default());
    i
}

/// Assert two instances are equal, ignoring condition transition times.
#[track_caller]
pub fn assert_instance_eq(want: CloudMemorystoreInstance, got: &CloudMemorystoreInstance) {
    assert_eq!(normalized(want), normalized(got.clone()));
}
