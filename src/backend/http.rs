// src/backend/http.rs

//! HTTP backend (pull-only)
//!
//! Fetches bundles with plain GET from an artifact server or CDN. The URL
//! option is either a base URL (`<base>/<fingerprint>.tar.gz` is appended)
//! or a template containing a `{fingerprint}` placeholder. A 404 is a
//! miss; everything else that goes wrong is opaque.

use super::{opaque, Backend};
use crate::bundle;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default timeout for bundle downloads (5 minutes)
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

const FINGERPRINT_PLACEHOLDER: &str = "{fingerprint}";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HttpOptions {
    url: String,
    timeout_secs: Option<u64>,
}

pub struct HttpBackend {
    alias: String,
    url: String,
    timeout: Duration,
    client: Option<Client>,
}

impl HttpBackend {
    pub fn from_options(alias: &str, options: toml::Value) -> Result<Self> {
        let options: HttpOptions =
            options.try_into().map_err(|e| Error::InvalidOptions {
                backend: alias.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            alias: alias.to_string(),
            url: options.url,
            timeout: options.timeout_secs.map_or(HTTP_TIMEOUT, Duration::from_secs),
            client: None,
        })
    }

    fn bundle_url(&self, fingerprint: &Fingerprint) -> String {
        if self.url.contains(FINGERPRINT_PLACEHOLDER) {
            self.url.replace(FINGERPRINT_PLACEHOLDER, fingerprint.as_str())
        } else {
            format!("{}/{fingerprint}.tar.gz", self.url.trim_end_matches('/'))
        }
    }
}

impl Backend for HttpBackend {
    fn validate(&mut self) -> Result<()> {
        let probe = self.bundle_url(&Fingerprint::parse(&"0".repeat(64)).expect("probe value"));
        reqwest::Url::parse(&probe).map_err(|e| Error::InvalidOptions {
            backend: self.alias.clone(),
            reason: format!("bad url '{}': {e}", self.url),
        })?;

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::InvalidOptions {
                backend: self.alias.clone(),
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        self.client = Some(client);
        Ok(())
    }

    fn pull(&self, fingerprint: &Fingerprint, workdir: &Path, cache_dir: &Path) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::backend(&self.alias, "backend was not validated"))?;

        let url = self.bundle_url(fingerprint);
        debug!("GET {url}");
        let mut response = client
            .get(&url)
            .send()
            .map_err(|e| Error::backend(&self.alias, e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::BundleNotFound {
                backend: self.alias.clone(),
                fingerprint: fingerprint.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(Error::backend(
                &self.alias,
                format!("GET {url} returned {}", response.status()),
            ));
        }

        let archive = cache_dir.join(format!("{fingerprint}.tar.gz"));
        let mut file = File::create(&archive)?;
        response
            .copy_to(&mut file)
            .map_err(|e| Error::backend(&self.alias, e.to_string()))?;

        bundle::unpack(&archive, workdir).map_err(|e| opaque(&self.alias, e))
    }

    fn push(&self, fingerprint: &Fingerprint, _project_root: &Path, _cache_dir: &Path) -> Result<()> {
        // Config validation refuses push=true for http backends, so this is
        // unreachable through the orchestrator.
        Err(Error::backend(
            &self.alias,
            format!("http backend cannot push bundle {fingerprint}"),
        ))
    }

    fn supports_push(&self) -> bool {
        false
    }
}
