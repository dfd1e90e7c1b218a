//! Remote preset source.
//!
//! Presets live in a GitHub repository. One synchronization run makes three
//! kinds of request, all GET with a JSON body and a fixed timeout:
//!
//! 1. the version manifest, always from `manifest_ref`;
//! 2. the recursive file tree of the resolved commit;
//! 3. every file directly inside the presets directory of that tree.
//!
//! Any failure aborts the run. There is no retry and no partial success.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::RemoteConfig;
use crate::errors::FetchError;
use crate::merge::PresetEntry;
use crate::revision::{resolve_revision, RevisionMap};

// ---------------------------------------------------------------------------
// Fetch primitive
// ---------------------------------------------------------------------------

/// GET a URL and decode the body as JSON.
///
/// Implementations enforce their own timeout and report it as
/// [`FetchError::Timeout`].
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn get_json(&self, url: &Url) -> Result<Value, FetchError>;
}

/// [`RemoteSource`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpSource {
    http: reqwest::Client,
    timeout: Duration,
    /// Bearer token and the only host it is sent to.
    token: Option<(String, String)>,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json, application/json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("presetsync/", env!("CARGO_PKG_VERSION"))),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        debug!(timeout_ms = timeout.as_millis() as u64, "created HttpSource");
        Ok(Self {
            http,
            timeout,
            token: None,
        })
    }

    /// Build a source from the remote configuration, attaching the resolved
    /// token (if any) to requests for the API host.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, FetchError> {
        let source = Self::new(config.timeout())?;
        match &config.token {
            Some(token) => {
                let api = parse_base(&config.api_url)?;
                let host = api
                    .host_str()
                    .ok_or_else(|| FetchError::InvalidUrl(config.api_url.clone()))?
                    .to_string();
                Ok(source.with_token(host, token.clone()))
            }
            None => Ok(source),
        }
    }

    pub fn with_token(mut self, host: impl Into<String>, token: impl Into<String>) -> Self {
        self.token = Some((host.into(), token.into()));
        self
    }

    fn map_err(&self, url: &Url, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            FetchError::HttpError(e)
        }
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn get_json(&self, url: &Url) -> Result<Value, FetchError> {
        let mut req = self.http.get(url.clone());
        if let Some((host, token)) = &self.token {
            if url.host_str() == Some(host.as_str()) {
                req = req.bearer_auth(token);
            }
        }

        let resp = req.send().await.map_err(|e| self.map_err(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(|e| self.map_err(url, e))?;
        serde_json::from_slice(&body).map_err(|e| FetchError::ParseError {
            url: url.to_string(),
            detail: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// URL layout of the preset repository.
#[derive(Debug, Clone)]
pub struct Endpoints {
    raw_url: Url,
    api_url: Url,
    owner: String,
    name: String,
    manifest_ref: String,
    manifest_path: String,
    presets_dir: String,
}

impl Endpoints {
    pub fn from_config(config: &RemoteConfig) -> Result<Self, FetchError> {
        let (owner, name) = config
            .repo
            .split_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty())
            .ok_or_else(|| FetchError::InvalidUrl(format!("bad repository '{}'", config.repo)))?;
        Ok(Self {
            raw_url: parse_base(&config.raw_url)?,
            api_url: parse_base(&config.api_url)?,
            owner: owner.to_string(),
            name: name.to_string(),
            manifest_ref: config.manifest_ref.clone(),
            manifest_path: config.manifest_path.clone(),
            presets_dir: config.presets_dir.trim_matches('/').to_string(),
        })
    }

    pub fn presets_dir(&self) -> &str {
        &self.presets_dir
    }

    /// `<raw>/<owner>/<name>/<manifest_ref>/<manifest_path>`
    pub fn manifest_url(&self) -> Result<Url, FetchError> {
        join_segments(
            &self.raw_url,
            [self.owner.as_str(), self.name.as_str(), self.manifest_ref.as_str()]
                .into_iter()
                .chain(split_path(&self.manifest_path)),
        )
    }

    /// `<api>/repos/<owner>/<name>/git/trees/<commit>?recursive=1`
    pub fn tree_url(&self, commit: &str) -> Result<Url, FetchError> {
        let mut url = join_segments(
            &self.api_url,
            ["repos", self.owner.as_str(), self.name.as_str(), "git", "trees", commit],
        )?;
        url.query_pairs_mut().append_pair("recursive", "1");
        Ok(url)
    }

    /// `<raw>/<owner>/<name>/<commit>/<path>`, each path segment
    /// percent-encoded on its own.
    pub fn file_url(&self, commit: &str, path: &str) -> Result<Url, FetchError> {
        join_segments(
            &self.raw_url,
            [self.owner.as_str(), self.name.as_str(), commit]
                .into_iter()
                .chain(split_path(path)),
        )
    }
}

fn parse_base(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn join_segments<'a, I>(base: &Url, segments: I) -> Result<Url, FetchError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| FetchError::InvalidUrl(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

// ---------------------------------------------------------------------------
// Tree listing
// ---------------------------------------------------------------------------

/// Recursive tree listing of one commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    #[serde(default)]
    pub sha: Option<String>,
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    /// `blob` or `tree`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl Tree {
    /// Paths of files whose parent directory is exactly `dir`, in listing order.
    pub fn files_in(&self, dir: &str) -> Vec<String> {
        let dir = dir.trim_matches('/');
        self.tree
            .iter()
            .filter(|entry| entry.kind.as_deref() != Some("tree"))
            .filter(|entry| parent_dir(&entry.path) == dir)
            .map(|entry| entry.path.clone())
            .collect()
    }
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(".")
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Runs the manifest, tree and file round trips against a [`RemoteSource`].
#[derive(Clone)]
pub struct PresetFetcher {
    source: Arc<dyn RemoteSource>,
    endpoints: Endpoints,
}

impl PresetFetcher {
    pub fn new(source: Arc<dyn RemoteSource>, endpoints: Endpoints) -> Self {
        Self { source, endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetch the version -> commit manifest.
    #[instrument(skip(self))]
    pub async fn fetch_manifest(&self) -> Result<RevisionMap, FetchError> {
        let url = self.endpoints.manifest_url()?;
        let value = self.source.get_json(&url).await?;
        let manifest: RevisionMap =
            serde_json::from_value(value).map_err(|e| FetchError::UnexpectedPayload {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        debug!(entries = manifest.len(), "fetched preset manifest");
        Ok(manifest)
    }

    /// Fetch the manifest and pick the revision for `app_version`.
    pub async fn resolve(
        &self,
        app_version: &str,
        default_revision: &str,
    ) -> Result<String, FetchError> {
        let manifest = self.fetch_manifest().await?;
        Ok(resolve_revision(app_version, &manifest, default_revision))
    }

    /// Fetch the recursive tree of `commit`.
    #[instrument(skip(self))]
    pub async fn fetch_tree(&self, commit: &str) -> Result<Tree, FetchError> {
        let url = self.endpoints.tree_url(commit)?;
        let value = self.source.get_json(&url).await?;
        let tree: Tree =
            serde_json::from_value(value).map_err(|e| FetchError::UnexpectedPayload {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        if tree.truncated {
            warn!(commit, entries = tree.tree.len(), "tree listing was truncated by the remote");
        }
        debug!(commit, entries = tree.tree.len(), "fetched tree");
        Ok(tree)
    }

    /// Fetch every preset file of `commit`, in tree order.
    #[instrument(skip(self))]
    pub async fn fetch_presets(&self, commit: &str) -> Result<Vec<PresetEntry>, FetchError> {
        let tree = self.fetch_tree(commit).await?;
        let paths = tree.files_in(self.endpoints.presets_dir());

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let url = self.endpoints.file_url(commit, &path)?;
            match self.source.get_json(&url).await? {
                Value::Object(document) => entries.push(PresetEntry::new(path, document)),
                _ => return Err(FetchError::NotAnObject { path }),
            }
        }

        info!(commit, files = entries.len(), "fetched preset files");
        Ok(entries)
    }
}
