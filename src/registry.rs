//! Package registry access.
//!
//! [`RegistryClient`] is the seam the resolution pipeline queries for the
//! published versions of a package. [`NpmRegistry`] implements it against
//! the npm registry's packument endpoint.

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait RegistryClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns every published version of `package`, in no particular order.
    async fn versions(&self, package: &str) -> Result<Vec<String>>;
}

pub struct NpmRegistry {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Packument {
    #[serde(default)]
    versions: HashMap<String, IgnoredAny>,
}

impl NpmRegistry {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::config("user_agent", e.to_string()))?;

        let mut base_url = config.registry_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { client, base_url })
    }

    fn package_url(&self, package: &str) -> String {
        format!("{}{}", self.base_url, encode_package_name(package))
    }
}

#[async_trait]
impl RegistryClient for NpmRegistry {
    fn name(&self) -> &'static str {
        "npm registry"
    }

    async fn versions(&self, package: &str) -> Result<Vec<String>> {
        let url = self.package_url(package);
        debug!(package, %url, "querying registry");

        let registry_error = |reason: String| Error::Registry {
            package: package.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| registry_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(registry_error(status.to_string()));
        }

        let packument: Packument = response
            .json()
            .await
            .map_err(|e| registry_error(e.to_string()))?;

        Ok(packument.versions.into_keys().collect())
    }
}

/// Percent-encodes a package name so scoped names like `@scope/pkg`
/// become a single path segment.
pub fn encode_package_name(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

/// How often and how patiently a failed registry query is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Base delay; retry `n` waits `n * delay`.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Retries `operation` with linearly increasing backoff.
///
/// The operation runs once plus up to `max_retries` more times; the last
/// error is returned when every attempt fails.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_retries {
                    return Err(e);
                }
                attempt += 1;
                let backoff = policy.delay * attempt;
                warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "registry query failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
