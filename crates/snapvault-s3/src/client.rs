//! SDK client construction from a `Destination`.

use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use snapvault_core::Destination;

const CREDENTIALS_PROVIDER: &str = "snapvault-static";

/// Build a path-style client with static credentials for `destination`.
pub(crate) async fn build_client(destination: &Destination, max_attempts: u32) -> Client {
    let credentials = Credentials::new(
        destination.credentials.access_key_id(),
        destination.credentials.secret_access_key(),
        None,
        None,
        CREDENTIALS_PROVIDER,
    );
    let sdk = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(destination.region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(endpoint_url(destination))
        .retry_config(RetryConfig::standard().with_max_attempts(max_attempts.max(1)))
        .load()
        .await;
    let config = aws_sdk_s3::config::Builder::from(&sdk)
        .force_path_style(true)
        .build();
    Client::from_conf(config)
}

// The SDK appends `/{bucket}/{key}` itself.
fn endpoint_url(destination: &Destination) -> String {
    destination
        .endpoint
        .as_str()
        .trim_end_matches('/')
        .to_string()
}
