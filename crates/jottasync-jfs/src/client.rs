//! JFS HTTP client
//!
//! Wraps `reqwest::Client` with basic authentication, the API version
//! header and the URL layout `<base>/<username>/<remote path>`. Metadata
//! and delete requests go to the base URL, content uploads to the upload
//! URL.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use jottasync_core::config::RemoteConfig;
//! use jottasync_jfs::{Credentials, JfsClient};
//!
//! # fn example() -> Result<(), jottasync_jfs::JfsError> {
//! let config = RemoteConfig::default();
//! let credentials = Credentials::from_env(config.username.as_deref())?;
//! let client = JfsClient::new(&config, credentials)?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use jottasync_core::config::RemoteConfig;
use jottasync_core::domain::RemotePath;
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;
use url::Url;

use crate::request::HEADER_API_VERSION;
use crate::xml;
use crate::JfsError;

/// Environment variable holding the account name
pub const ENV_USERNAME: &str = "JOTTACLOUD_USERNAME";
/// Environment variable holding the account password
pub const ENV_PASSWORD: &str = "JOTTACLOUD_PASSWORD";

const USER_AGENT: &str = concat!("jottasync/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Credentials
// ============================================================================

/// Account name and password for basic authentication
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads the password (and, unless given, the username) from the environment
    ///
    /// # Errors
    ///
    /// Returns `JfsError::MissingCredentials` when either value is unset or empty.
    pub fn from_env(username: Option<&str>) -> Result<Self, JfsError> {
        let username = match username {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => non_empty_var(ENV_USERNAME)?,
        };
        let password = non_empty_var(ENV_PASSWORD)?;
        Ok(Self { username, password })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn non_empty_var(name: &str) -> Result<String, JfsError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(JfsError::MissingCredentials(format!("{name} is not set"))),
    }
}

// ============================================================================
// JfsClient
// ============================================================================

/// Authenticated client for one JFS account
#[derive(Debug, Clone)]
pub struct JfsClient {
    client: Client,
    base_url: Url,
    upload_url: Url,
    api_version: String,
    device_name: String,
    credentials: Credentials,
}

fn parse_base(url: &str) -> Result<Url, JfsError> {
    let parsed = Url::parse(url).map_err(|e| JfsError::InvalidUrl(format!("{url}: {e}")))?;
    if parsed.cannot_be_a_base() {
        return Err(JfsError::InvalidUrl(format!("{url}: not a base URL")));
    }
    Ok(parsed)
}

impl JfsClient {
    /// Creates a client for the endpoints in `config`
    ///
    /// # Errors
    ///
    /// Returns `JfsError::InvalidUrl` if either base URL does not parse.
    pub fn new(config: &RemoteConfig, credentials: Credentials) -> Result<Self, JfsError> {
        Ok(Self {
            client: Client::builder().user_agent(USER_AGENT).build()?,
            base_url: parse_base(&config.base_url)?,
            upload_url: parse_base(&config.upload_url)?,
            api_version: config.api_version.clone(),
            device_name: config.device_name.clone(),
            credentials,
        })
    }

    /// Creates a client sending both metadata and uploads to `base_url`
    ///
    /// Useful for testing against a mock server.
    ///
    /// # Errors
    ///
    /// Returns `JfsError::InvalidUrl` if `base_url` does not parse.
    pub fn with_base_url(
        credentials: Credentials,
        base_url: impl AsRef<str>,
    ) -> Result<Self, JfsError> {
        let config = RemoteConfig {
            base_url: base_url.as_ref().to_string(),
            upload_url: base_url.as_ref().to_string(),
            ..RemoteConfig::default()
        };
        Self::new(&config, credentials)
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn entity_url(&self, base: &Url, path: &RemotePath) -> Result<Url, JfsError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| JfsError::InvalidUrl(format!("{base}: not a base URL")))?
            .pop_if_empty()
            .push(self.credentials.username())
            .extend(path.segments());
        Ok(url)
    }

    /// Metadata URL of `path`
    ///
    /// # Errors
    ///
    /// Returns `JfsError::InvalidUrl` if the base URL cannot take segments.
    pub fn metadata_url(&self, path: &RemotePath) -> Result<Url, JfsError> {
        self.entity_url(&self.base_url, path)
    }

    /// Upload URL of `path`
    ///
    /// # Errors
    ///
    /// Returns `JfsError::InvalidUrl` if the upload URL cannot take segments.
    pub fn upload_url(&self, path: &RemotePath) -> Result<Url, JfsError> {
        self.entity_url(&self.upload_url, path)
    }

    /// Creates an authenticated request builder for `url`
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(HEADER_API_VERSION, &self.api_version)
    }

    /// Sends `request`, turning non-success statuses into `JfsError::Status`
    ///
    /// The message is taken from the `<error>` document in the body when
    /// there is one.
    ///
    /// # Errors
    ///
    /// Returns `JfsError::Network` on transport failure or
    /// `JfsError::Status` for any non-2xx answer.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, JfsError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = xml::error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
        debug!(status = status.as_u16(), %message, "JFS request failed");
        Err(JfsError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Fetches the metadata document of `path`
    ///
    /// # Errors
    ///
    /// See [`JfsClient::send`].
    pub async fn get_document(&self, path: &RemotePath) -> Result<String, JfsError> {
        let url = self.metadata_url(path)?;
        debug!(%url, "GET");
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.text().await?)
    }
}
