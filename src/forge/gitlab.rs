//! forge::gitlab
//!
//! GitLab forge implementation over the v4 REST API.
//!
//! # Authentication
//!
//! Requests carry a personal access token in the `PRIVATE-TOKEN` header.
//!
//! # Pagination
//!
//! List endpoints are walked page by page following the `x-next-page`
//! response header until it comes back empty.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::traits::{Branch, ChangeRequest, ForgeError, SourceForge};
use crate::domain::TagRecord;

/// Header carrying the personal access token.
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Header naming the next page of a paginated listing.
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// Page size requested from list endpoints.
const PER_PAGE: &str = "100";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "bb-release";

/// GitLab forge bound to a single project.
pub struct GitLabForge {
    /// HTTP client for making requests
    client: Client,
    /// API base URL, e.g. `https://repo1.dso.mil/api/v4`
    api_base: Url,
    /// Numeric project id
    project_id: u64,
    /// Personal access token
    token: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitLabForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabForge")
            .field("api_base", &self.api_base.as_str())
            .field("project_id", &self.project_id)
            .field("has_token", &!self.token.is_empty())
            .finish()
    }
}

impl GitLabForge {
    /// Create a forge client for `project_id` on the instance at `instance_url`.
    pub fn new(
        instance_url: &str,
        project_id: u64,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ForgeError> {
        let api_base = api_base_url(instance_url)?;
        let client = Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(timeout)
            .build()
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        Ok(GitLabForge {
            client,
            api_base,
            project_id,
            token: token.into(),
        })
    }

    /// URL of a project resource, each segment percent-encoded.
    fn project_url(&self, segments: &[&str]) -> Result<Url, ForgeError> {
        let mut url = self.api_base.clone();
        let project_id = self.project_id.to_string();
        url.path_segments_mut()
            .map_err(|_| ForgeError::NetworkError("forge URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("projects")
            .push(&project_id)
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(TOKEN_HEADER, &self.token)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ForgeError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        check_status(response)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ForgeError> {
        let response = self.send(self.client.get(url))?;
        response
            .json()
            .map_err(|e| ForgeError::NetworkError(format!("invalid response body: {}", e)))
    }

    fn get_paginated<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ForgeError> {
        let mut items = Vec::new();
        let mut page = "1".to_string();

        loop {
            debug!(url = %url, page = %page, "fetching forge page");
            let request = self
                .client
                .get(url.clone())
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", page.as_str())]);
            let response = self.send(request)?;

            let next_page = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);

            let mut batch: Vec<T> = response
                .json()
                .map_err(|e| ForgeError::NetworkError(format!("invalid response body: {}", e)))?;
            items.append(&mut batch);

            match next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(items)
    }
}

impl SourceForge for GitLabForge {
    fn authenticate(&self) -> Result<bool, ForgeError> {
        let url = self.project_url(&[])?;
        match self.send(self.client.get(url)) {
            Ok(_) => Ok(true),
            Err(ForgeError::AuthFailed(_)) | Err(ForgeError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn list_releases(&self) -> Result<Vec<TagRecord>, ForgeError> {
        let url = self.project_url(&["releases"])?;
        let releases: Vec<ReleaseResponse> = self.get_paginated(url, &[])?;
        Ok(releases.into_iter().map(TagRecord::from).collect())
    }

    fn get_branch(&self, name: &str) -> Result<Option<Branch>, ForgeError> {
        let url = self.project_url(&["repository", "branches", name])?;
        match self.get_json::<BranchResponse>(url) {
            Ok(branch) => Ok(Some(branch.into())),
            Err(ForgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_branch(&self, name: &str, reference: &str) -> Result<Branch, ForgeError> {
        let url = self.project_url(&["repository", "branches"])?;
        let request = self
            .client
            .post(url)
            .query(&[("branch", name), ("ref", reference)]);

        let response = match self.send(request) {
            Err(ForgeError::ApiError { status: 400, .. }) => {
                return Err(ForgeError::AlreadyExists(format!("branch {}", name)))
            }
            other => other?,
        };

        let branch: BranchResponse = response
            .json()
            .map_err(|e| ForgeError::NetworkError(format!("invalid response body: {}", e)))?;
        Ok(branch.into())
    }

    fn list_merged_change_requests(
        &self,
        milestone: &str,
    ) -> Result<Vec<ChangeRequest>, ForgeError> {
        let url = self.project_url(&["merge_requests"])?;
        let merge_requests: Vec<MergeRequestResponse> = self.get_paginated(
            url,
            &[
                ("state", "merged"),
                ("order_by", "updated_at"),
                ("milestone", milestone),
            ],
        )?;
        Ok(merge_requests.into_iter().map(ChangeRequest::from).collect())
    }
}

/// `https://repo1.dso.mil` -> `https://repo1.dso.mil/api/v4`
fn api_base_url(instance_url: &str) -> Result<Url, ForgeError> {
    let base = format!("{}/api/v4", instance_url.trim_end_matches('/'));
    Url::parse(&base).map_err(|e| ForgeError::NetworkError(format!("invalid forge URL: {}", e)))
}

/// Map non-success responses to forge errors
fn check_status(response: Response) -> Result<Response, ForgeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let message = error_message(&response.text().unwrap_or_default());

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ForgeError::AuthFailed(format!("{} ({})", status, url))
        }
        StatusCode::NOT_FOUND => ForgeError::NotFound(url),
        StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
        _ => ForgeError::ApiError {
            status: status.as_u16(),
            message,
        },
    })
}

/// Error body returned by the API, e.g. `{"message": "403 Forbidden"}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: serde_json::Value,
}

/// Pull the `message` out of an error body; non-JSON bodies are returned as-is
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: serde_json::Value::String(message),
        }) => message,
        Ok(ErrorBody { message }) => message.to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    short_id: String,
    #[serde(default)]
    author_name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: String,
    commit: CommitResponse,
}

impl From<ReleaseResponse> for TagRecord {
    fn from(release: ReleaseResponse) -> Self {
        TagRecord::new(
            release.tag_name,
            release.commit.short_id,
            release.commit.author_name,
        )
    }
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    name: String,
    commit: CommitResponse,
}

impl From<BranchResponse> for Branch {
    fn from(branch: BranchResponse) -> Self {
        Branch {
            name: branch.name,
            commit_id: branch.commit.short_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthorResponse {
    username: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequestResponse {
    iid: u64,
    title: String,
    web_url: String,
    #[serde(default)]
    author: Option<AuthorResponse>,
}

impl From<MergeRequestResponse> for ChangeRequest {
    fn from(mr: MergeRequestResponse) -> Self {
        ChangeRequest {
            iid: mr.iid,
            title: mr.title,
            web_url: mr.web_url,
            author: mr.author.map(|author| author.username),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forge() -> GitLabForge {
        GitLabForge::new(
            "https://repo1.dso.mil/",
            2872,
            "token",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_project_url_encodes_segments() {
        let forge = forge();
        let url = forge
            .project_url(&["repository", "branches", "release/1.53.x"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://repo1.dso.mil/api/v4/projects/2872/repository/branches/release%2F1.53.x"
        );
    }

    #[test]
    fn test_project_url_root() {
        let url = forge().project_url(&[]).unwrap();
        assert_eq!(url.as_str(), "https://repo1.dso.mil/api/v4/projects/2872");
    }

    #[test]
    fn test_debug_hides_token() {
        let debug = format!("{:?}", forge());
        assert!(!debug.contains("\"token\""));
        assert!(debug.contains("has_token"));
    }

    #[test]
    fn test_release_response_into_tag_record() {
        let json = r#"[{
            "tag_name": "1.52.0",
            "released_at": "2023-02-14T00:00:00Z",
            "commit": {"id": "0123456789abcdef", "short_id": "01234567", "author_name": "Jane Doe"}
        }]"#;
        let releases: Vec<ReleaseResponse> = serde_json::from_str(json).unwrap();
        let record: TagRecord = releases.into_iter().next().unwrap().into();
        assert_eq!(record, TagRecord::new("1.52.0", "01234567", "Jane Doe"));
    }

    #[test]
    fn test_branch_response_into_branch() {
        let json = r#"{"name": "release-1.52.x", "commit": {"short_id": "89abcdef"}}"#;
        let branch: Branch = serde_json::from_str::<BranchResponse>(json).unwrap().into();
        assert_eq!(branch.name, "release-1.52.x");
        assert_eq!(branch.commit_id, "89abcdef");
    }

    #[test]
    fn test_merge_request_response_into_change_request() {
        let json = r#"{
            "iid": 2451,
            "title": "Update istio to 1.17.2",
            "web_url": "https://repo1.dso.mil/big-bang/bigbang/-/merge_requests/2451",
            "author": {"username": "jdoe"}
        }"#;
        let cr: ChangeRequest = serde_json::from_str::<MergeRequestResponse>(json)
            .unwrap()
            .into();
        assert_eq!(cr.iid, 2451);
        assert_eq!(cr.author.as_deref(), Some("jdoe"));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message": "403 Forbidden"}"#), "403 Forbidden");
        assert_eq!(
            error_message(r#"{"message": {"name": ["has already been taken"]}}"#),
            r#"{"name":["has already been taken"]}"#
        );
        assert_eq!(error_message("  Bad Gateway\n"), "Bad Gateway");
    }
}
