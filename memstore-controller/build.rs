fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Client for google.cloud.redis.v1.CloudRedis; the service side is the provider.
    tonic_build::configure()
        .build_server(false) // Client only
        .build_client(true)
        .compile_protos(&["proto/google/cloud/redis/v1/cloud_redis.proto"], &["proto"])?;
    Ok(())
}
