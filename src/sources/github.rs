use crate::config::GitHubConfig;
use crate::detector::Entity;
use crate::error::SourceError;
use crate::transport::{RateLimitPolicy, with_rate_limit};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, LINK, USER_AGENT};
use serde::Deserialize;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Hard stop for a misbehaving `Link` chain.
const MAX_PAGES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OwnerKind {
    #[default]
    Org,
    User,
}

#[derive(Debug, Deserialize)]
struct RepoRecord {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    archived: bool,
}

/// Repository listing client. Without a token only public repositories are
/// visible and the unauthenticated rate limit applies.
pub struct GitHubClient {
    token: Option<String>,
    api_base: String,
    per_page: u32,
    include_forks: bool,
    include_archived: bool,
    policy: RateLimitPolicy,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(token: Option<String>, policy: RateLimitPolicy) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            api_base: DEFAULT_API_BASE.to_string(),
            per_page: 100,
            include_forks: true,
            include_archived: false,
            policy,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &GitHubConfig, policy: RateLimitPolicy) -> Self {
        let mut client = Self::new(config.token.clone(), policy).with_base_url(&config.api_base);
        client.per_page = config.per_page.clamp(1, 100);
        client.include_forks = config.include_forks;
        client.include_archived = config.include_archived;
        client
    }

    #[must_use]
    pub fn with_base_url(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, 100);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn first_page_url(&self, owner: &str, kind: OwnerKind) -> Result<url::Url, SourceError> {
        let scope = match kind {
            OwnerKind::Org => "orgs",
            OwnerKind::User => "users",
        };
        let raw = format!("{}/{scope}/{owner}/repos", self.api_base);
        let mut url = url::Url::parse(&raw).map_err(|e| SourceError::Transport {
            endpoint: raw.clone(),
            message: e.to_string(),
        })?;
        let visibility = if self.is_authenticated() { "all" } else { "public" };
        url.query_pairs_mut()
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair("type", visibility);
        Ok(url)
    }

    /// List every repository of `owner`, following `Link: rel="next"` until exhausted.
    pub async fn list_repositories(
        &self,
        owner: &str,
        kind: OwnerKind,
    ) -> Result<Vec<Entity>, SourceError> {
        let endpoint = format!("{owner}/repos");
        let mut next = Some(self.first_page_url(owner, kind)?.to_string());
        let mut entities = Vec::new();
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                tracing::warn!(endpoint = endpoint.as_str(), "stopping pagination at page limit");
                break;
            }

            let (records, next_url) =
                with_rate_limit(self.policy, &endpoint, || self.fetch_page(&endpoint, &url))
                    .await?;

            entities.extend(
                records
                    .into_iter()
                    .filter(|r| self.include_forks || !r.fork)
                    .filter(|r| self.include_archived || !r.archived)
                    .map(|r| Entity {
                        name: r.name,
                        description: r.description.filter(|d| !d.trim().is_empty()),
                        url: r.html_url,
                    }),
            );
            next = next_url;
        }

        tracing::info!(
            owner,
            authenticated = self.is_authenticated(),
            pages,
            repositories = entities.len(),
            "repository listing complete"
        );
        Ok(entities)
    }

    async fn fetch_page(
        &self,
        endpoint: &str,
        url: &str,
    ) -> Result<(Vec<RepoRecord>, Option<String>), SourceError> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, concat!("onboard-relay/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| SourceError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        if is_rate_limited(status, resp.headers()) {
            return Err(SourceError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }

        let next = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));

        if !status.is_success() {
            return Err(SourceError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let records: Vec<RepoRecord> =
            serde_json::from_str(&body).map_err(|e| SourceError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        Ok((records, next))
    }
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|remaining| remaining.trim() == "0")
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(ToString::to_string)
    })
}
