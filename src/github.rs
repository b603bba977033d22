//! GitHub REST implementation of [`SourceControlClient`].
//!
//! - Repositories are listed from `orgs/{org}/repos`, or `users/{org}/repos` when
//!   `crawl_users_repo_instead_of_orgas_repos` is set. Repository, branch, commit and
//!   pull request listings follow `Link: rel="next"` pages.
//! - File contents are requested raw (`application/vnd.github.raw`); a 404 becomes
//!   [`SourceControlError::NoFileFound`].
//! - Any other transport or status failure becomes [`SourceControlError::Remote`], except on the
//!   first repository listing call where it is [`SourceControlError::NoReachableRepositories`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use repo_crawler_core::config::SourceControlConfig;
use repo_crawler_core::contract::SourceControlClient;
use repo_crawler_core::error::SourceControlError;
use repo_crawler_core::model::{
    Author, Branch, CommitRef, DetailedCommit, PullRequest, Repository, RepositoryConfig,
    SearchResult, Team, TeamMember,
};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

const APPLICATION_JSON: &str = "application/json";
const GITHUB_RAW: &str = "application/vnd.github.raw";
/// Needed for `topics` in the repository listing.
const GITHUB_MERCY_PREVIEW_JSON: &str = "application/vnd.github.mercy-preview+json";
const CONFIG_VALIDATION_REQUEST_HEADER: &str = "X-configValidationRequest";
const CRAWLER_USER_AGENT: &str = "repo-crawler";
/// Largest page GitHub serves.
const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    html_url: String,
    full_name: String,
    #[serde(default)]
    default_branch: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    topics: Vec<String>,
}

impl From<GitHubRepository> for Repository {
    fn from(repo: GitHubRepository) -> Self {
        let default_branch = repo.default_branch.unwrap_or_else(|| "master".to_string());
        Repository {
            creation_date: repo.created_at,
            last_update_date: repo.updated_at,
            topics: repo.topics,
            ..Repository::new(repo.html_url, repo.full_name, default_branch)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubBranch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubTeam {
    id: u64,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct GitHubCommitStats {
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
    #[serde(default)]
    author: Option<GitHubUser>,
    #[serde(default)]
    stats: Option<GitHubCommitStats>,
}

pub struct GitHubClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    users_repos_instead_of_orgas_repos: bool,
}

impl GitHubClient {
    pub fn new(config: &SourceControlConfig) -> Self {
        let api_token = config
            .api_token
            .as_ref()
            .filter(|token| !token.trim().is_empty())
            .cloned();
        info!(
            url = %config.url,
            token_set = api_token.is_some(),
            users_repos = config.crawl_users_repo_instead_of_orgas_repos,
            "Initialized GitHub client"
        );
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_token,
            users_repos_instead_of_orgas_repos: config.crawl_users_repo_instead_of_orgas_repos,
        }
    }

    fn get(&self, url: &str, accept: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(USER_AGENT, CRAWLER_USER_AGENT)
            .header(ACCEPT, accept);
        match &self.api_token {
            Some(token) => request.header(AUTHORIZATION, format!("token {token}")),
            None => request,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn repos_url(&self, organization: &str) -> String {
        let owner_kind = if self.users_repos_instead_of_orgas_repos {
            "users"
        } else {
            "orgs"
        };
        self.api_url(&format!("/{owner_kind}/{organization}/repos"))
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, SourceControlError> {
        let resp = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "GitHub request failed");
            SourceControlError::Remote(format!("GET {url} failed: {e}"))
        })?;
        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "GitHub returned an error status");
            return Err(SourceControlError::Remote(format!("GET {url} returned {status}")));
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceControlError> {
        let resp = self.send(self.get(url, APPLICATION_JSON), url).await?;
        resp.json::<T>().await.map_err(|e| {
            error!(error = %e, url = %url, "Unable to decode GitHub response");
            SourceControlError::Remote(format!("unable to decode response of {url}: {e}"))
        })
    }

    /// Every item of a paginated listing, following `Link: rel="next"` until the last page
    /// or until `limit` items were collected. A 409 on the first page (empty repository)
    /// gives an empty listing.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        first_url: String,
        limit: Option<usize>,
    ) -> Result<Vec<T>, SourceControlError> {
        let mut items: Vec<T> = Vec::new();
        let mut next = Some(first_url);
        let mut is_first_page = true;

        while let Some(url) = next {
            let resp = self
                .get(&url, APPLICATION_JSON)
                .send()
                .await
                .map_err(|e| {
                    error!(error = %e, url = %url, "GitHub request failed");
                    SourceControlError::Remote(format!("GET {url} failed: {e}"))
                })?;
            let status = resp.status();
            if is_first_page && status == StatusCode::CONFLICT {
                warn!(url = %url, "Empty repository, nothing to list");
                return Ok(Vec::new());
            }
            if !status.is_success() {
                error!(status = %status, url = %url, "GitHub returned an error status");
                return Err(SourceControlError::Remote(format!("GET {url} returned {status}")));
            }

            next = next_page_link(resp.headers());
            let page: Vec<T> = resp.json().await.map_err(|e| {
                SourceControlError::Remote(format!("unable to decode response of {url}: {e}"))
            })?;
            items.extend(page);
            is_first_page = false;

            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    break;
                }
            }
        }
        Ok(items)
    }

    /// First page of the repository listing. Any failure means the organization is unreachable.
    async fn first_repositories_page(
        &self,
        organization: &str,
        is_config_call: bool,
    ) -> Result<(Vec<Repository>, Option<String>), SourceControlError> {
        let url = self.repos_url(organization);
        let mut request = self.get(&url, GITHUB_MERCY_PREVIEW_JSON);
        if is_config_call {
            request = request.header(CONFIG_VALIDATION_REQUEST_HEADER, "true");
        }

        let resp = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "Unable to reach GitHub");
            SourceControlError::NoReachableRepositories(format!("Unable to perform the request: {e}"))
        })?;
        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "Repository listing failed");
            return Err(SourceControlError::NoReachableRepositories(format!(
                "GET call to {url} wasn't successful. Code : {status}"
            )));
        }

        let next = next_page_link(resp.headers());
        let body = resp.text().await.map_err(|e| {
            SourceControlError::NoReachableRepositories(format!("unable to read response: {e}"))
        })?;
        let repositories = parse_repositories(&body).map_err(|e| {
            SourceControlError::NoReachableRepositories(format!(
                "not able to parse response : {body} ({e})"
            ))
        })?;
        Ok((repositories, next))
    }
}

fn parse_repositories(body: &str) -> Result<Vec<Repository>, serde_json::Error> {
    let repos: Vec<GitHubRepository> = serde_json::from_str(body)?;
    Ok(repos.into_iter().map(Repository::from).collect())
}

/// URL of the next page announced in the `Link` header, if any.
fn next_page_link(headers: &HeaderMap) -> Option<String> {
    let links = headers.get(LINK)?.to_str().ok()?;
    links
        .split(',')
        .find(|link| link.contains("rel=\"next\""))
        .and_then(|link| {
            let start = link.find('<')? + 1;
            let end = link.rfind('>')?;
            (start <= end).then(|| link[start..end].to_string())
        })
}

#[async_trait]
impl SourceControlClient for GitHubClient {
    async fn fetch_repositories(
        &self,
        organization: &str,
    ) -> Result<Vec<Repository>, SourceControlError> {
        let (mut repositories, mut next) = self.first_repositories_page(organization, false).await?;
        let mut page = 1;

        while let Some(url) = next {
            page += 1;
            let resp = self.send(self.get(&url, GITHUB_MERCY_PREVIEW_JSON), &url).await?;
            next = next_page_link(resp.headers());
            let page_repositories: Vec<GitHubRepository> = resp.json().await.map_err(|e| {
                SourceControlError::Remote(format!("unable to decode response of {url}: {e}"))
            })?;
            info!(
                organization = %organization,
                page,
                count = page_repositories.len(),
                "Fetched page of repositories"
            );
            repositories.extend(page_repositories.into_iter().map(Repository::from));
        }

        info!(
            organization = %organization,
            total = repositories.len(),
            "Fetched all repositories"
        );
        Ok(repositories)
    }

    async fn fetch_repo_config(
        &self,
        full_name: &str,
        default_branch: &str,
    ) -> Result<RepositoryConfig, SourceControlError> {
        let content = self
            .fetch_file_content(full_name, default_branch, RepositoryConfig::FILE_NAME)
            .await?;
        RepositoryConfig::from_yaml(&content)
    }

    async fn fetch_repo_branches(&self, full_name: &str) -> Result<Vec<Branch>, SourceControlError> {
        let url = self.api_url(&format!("/repos/{full_name}/branches?per_page={MAX_PER_PAGE}"));
        let branches: Vec<GitHubBranch> = self.get_all_pages(url, None).await?;
        Ok(branches.into_iter().map(|b| Branch::new(b.name)).collect())
    }

    async fn fetch_file_content(
        &self,
        full_name: &str,
        branch: &str,
        file_path: &str,
    ) -> Result<String, SourceControlError> {
        let url = self.api_url(&format!("/repos/{full_name}/contents/{file_path}"));
        let request = self.get(&url, GITHUB_RAW).query(&[("ref", branch)]);

        let resp = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "GitHub request failed");
            SourceControlError::Remote(format!("GET {url} failed: {e}"))
        })?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!(repo = %full_name, branch = %branch, file = %file_path, "File not found");
            return Err(SourceControlError::NoFileFound(format!(
                "can't find {file_path} in repo {full_name}, in branch {branch}"
            )));
        }
        if !status.is_success() {
            error!(status = %status, url = %url, "GitHub returned an error status");
            return Err(SourceControlError::Remote(format!("GET {url} returned {status}")));
        }
        resp.text()
            .await
            .map_err(|e| SourceControlError::Remote(format!("unable to read {file_path}: {e}")))
    }

    async fn fetch_code_search_result(
        &self,
        full_name: &str,
        query: &str,
    ) -> Result<SearchResult, SourceControlError> {
        let url = self.api_url("/search/code");
        let q = format!("{query} repo:{full_name}");
        info!(repo = %full_name, query = %q, "Fetching code search result");

        let resp = self
            .send(self.get(&url, APPLICATION_JSON).query(&[("q", q.as_str())]), &url)
            .await?;
        let body = resp
            .text()
            .await
            .map_err(|e| SourceControlError::Remote(format!("unable to read search result: {e}")))?;
        match serde_json::from_str::<SearchResult>(&body) {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(error = %e, repo = %full_name, "Unable to parse search result, assuming no hit");
                Ok(SearchResult::default())
            }
        }
    }

    async fn fetch_commits(
        &self,
        full_name: &str,
        per_page: usize,
    ) -> Result<Vec<CommitRef>, SourceControlError> {
        // GitHub caps pages at 100 commits, more are read from the following pages
        let page_size = per_page.clamp(1, MAX_PER_PAGE);
        let url = self.api_url(&format!("/repos/{full_name}/commits?per_page={page_size}"));
        let commits: Vec<CommitRef> = self.get_all_pages(url, Some(per_page)).await?;
        debug!(repo = %full_name, nb_commits = commits.len(), "Fetched commits");
        Ok(commits)
    }

    async fn fetch_commit(
        &self,
        full_name: &str,
        sha: &str,
    ) -> Result<DetailedCommit, SourceControlError> {
        let url = self.api_url(&format!("/repos/{full_name}/commits/{sha}"));
        let commit: GitHubCommit = self.get_json(&url).await?;
        Ok(DetailedCommit {
            sha: commit.sha,
            author: commit.author.map(|a| Author {
                id: a.id.to_string(),
                login: a.login,
            }),
            changed_lines: commit.stats.unwrap_or_default().total,
        })
    }

    async fn fetch_teams(&self, organization: &str) -> Result<Vec<Team>, SourceControlError> {
        let url = self.api_url(&format!("/orgs/{organization}/teams"));
        let teams: Vec<GitHubTeam> = self.get_json(&url).await?;
        Ok(teams
            .into_iter()
            .map(|t| Team {
                id: t.id.to_string(),
                name: t.name,
            })
            .collect())
    }

    async fn fetch_teams_members(
        &self,
        team_id: &str,
    ) -> Result<Vec<TeamMember>, SourceControlError> {
        let url = self.api_url(&format!("/teams/{team_id}/members"));
        let members: Vec<GitHubUser> = self.get_json(&url).await?;
        Ok(members
            .into_iter()
            .map(|m| TeamMember {
                id: m.id.to_string(),
                login: m.login,
            })
            .collect())
    }

    async fn fetch_open_pull_requests(
        &self,
        full_name: &str,
    ) -> Result<Vec<PullRequest>, SourceControlError> {
        let url = self.api_url(&format!(
            "/repos/{full_name}/pulls?state=open&per_page={MAX_PER_PAGE}"
        ));
        self.get_all_pages(url, None).await
    }

    async fn validate_remote_config(&self, organization: &str) -> Result<(), SourceControlError> {
        self.first_repositories_page(organization, true).await?;
        Ok(())
    }
}
