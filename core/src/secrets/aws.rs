use async_trait::async_trait;
use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, Region};
use aws_sdk_secretsmanager::{
    config::http::HttpResponse,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::get_secret_value::GetSecretValueError,
    Client,
};
use tracing::debug;

use super::{SecretError, SecretStore};

#[derive(Debug, Clone)]
pub struct AwsSecretsManager {
    client: Client,
}

impl AwsSecretsManager {
    /// Uses the default AWS region chain, falling back to `default_region` when nothing is set.
    pub async fn new(default_region: &str) -> Self {
        let region_provider = RegionProviderChain::default_provider()
            .or_else(Region::new(default_region.to_string()));
        let config =
            aws_config::defaults(BehaviorVersion::latest()).region(region_provider).load().await;
        let client = Client::new(&config);

        Self { client }
    }
}

fn map_get_secret_error(
    secret_id: &str,
    err: SdkError<GetSecretValueError, HttpResponse>,
) -> SecretError {
    match err.as_service_error() {
        Some(GetSecretValueError::ResourceNotFoundException(_)) => {
            SecretError::NotFound(secret_id.to_string())
        }
        Some(service_err) if service_err.code() == Some("AccessDeniedException") => {
            SecretError::AccessDenied(secret_id.to_string())
        }
        Some(service_err) => SecretError::Backend {
            secret_id: secret_id.to_string(),
            message: service_err.message().unwrap_or("unknown service error").to_string(),
        },
        None => SecretError::Backend {
            secret_id: secret_id.to_string(),
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    async fn fetch_secret_string(&self, secret_id: &str) -> Result<String, SecretError> {
        debug!("Requesting secret {} from AWS Secrets Manager", secret_id);
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| map_get_secret_error(secret_id, e))?;

        // binary secrets carry no SecretString
        output.secret_string().map(str::to_string).ok_or_else(|| SecretError::InvalidShape {
            secret_id: secret_id.to_string(),
            reason: "secret has no string value".to_string(),
        })
    }
}
