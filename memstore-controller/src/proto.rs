//! Generated protobuf types for the Cloud Memorystore for Redis v1 API.
//!
//! Module nesting follows the proto packages so the generated code can
//! reach `google.longrunning.Operation` from `google.cloud.redis.v1`.

#![allow(clippy::enum_variant_names)]

pub mod google {
    /// Long-running operation handles returned by mutations.
    pub mod longrunning {
        tonic::include_proto!("google.longrunning");
    }

    pub mod cloud {
        pub mod redis {
            /// Redis instance service (CloudRedis)
            pub mod v1 {
                tonic::include_proto!("google.cloud.redis.v1");
            }
        }
    }
}

pub use google::cloud::redis::v1::cloud_redis_client::CloudRedisClient;
pub use google::cloud::redis::v1::{
    instance, CreateInstanceRequest, DeleteInstanceRequest, GetInstanceRequest, Instance,
    UpdateInstanceRequest,
};
pub use google::longrunning::Operation;

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_instance_wire_roundtrip_keeps_enums() {
        let i = Instance {
            name: "projects/p/locations/l/instances/n".to_string(),
            state: instance::State::Ready as i32,
            tier: instance::Tier::StandardHa as i32,
            port: 6379,
            ..Default::default()
        };
        let decoded = Instance::decode(i.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, i);
        assert_eq!(
            instance::State::try_from(decoded.state).unwrap(),
            instance::State::Ready
        );
    }

    #[test]
    fn test_unknown_state_is_not_an_enum_value() {
        assert!(instance::State::try_from(7).is_err());
        assert_eq!(instance::Tier::Unspecified.as_str_name(), "TIER_UNSPECIFIED");
        assert_eq!(
            instance::ConnectMode::from_str_name("DIRECT_PEERING"),
            Some(instance::ConnectMode::DirectPeering)
        );
    }
}
