//! Webhook event kinds understood by the formatters.
use std::fmt;

use axum::http::HeaderMap;

/// Header carrying the GitHub event name.
pub const GITHUB_EVENT_HEADER: &str = "x-github-event";

/// Header carrying the GitLab event name.
pub const GITLAB_EVENT_HEADER: &str = "x-gitlab-event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CommitComment,
    Fork,
    Gollum,
    IssueComment,
    Issues,
    Ping,
    Public,
    PullRequest,
    PullRequestReviewComment,
    Push,
    Watch,
    GitlabPush,
    GitlabTagPush,
    GitlabIssue,
    GitlabMergeRequest,
    GitlabNote,
    GitlabPipeline,
    GitlabJob,
    GitlabWikiPage,
}

/// Why no event kind could be derived from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventHeaderError {
    Missing,
    Unsupported(String),
}

impl EventKind {
    const GITHUB: [Self; 11] = [
        Self::CommitComment,
        Self::Fork,
        Self::Gollum,
        Self::IssueComment,
        Self::Issues,
        Self::Ping,
        Self::Public,
        Self::PullRequest,
        Self::PullRequestReviewComment,
        Self::Push,
        Self::Watch,
    ];

    const GITLAB: [Self; 8] = [
        Self::GitlabPush,
        Self::GitlabTagPush,
        Self::GitlabIssue,
        Self::GitlabMergeRequest,
        Self::GitlabNote,
        Self::GitlabPipeline,
        Self::GitlabJob,
        Self::GitlabWikiPage,
    ];

    /// Name as sent by the provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommitComment => "commit_comment",
            Self::Fork => "fork",
            Self::Gollum => "gollum",
            Self::IssueComment => "issue_comment",
            Self::Issues => "issues",
            Self::Ping => "ping",
            Self::Public => "public",
            Self::PullRequest => "pull_request",
            Self::PullRequestReviewComment => "pull_request_review_comment",
            Self::Push => "push",
            Self::Watch => "watch",
            Self::GitlabPush => "Push Hook",
            Self::GitlabTagPush => "Tag Push Hook",
            Self::GitlabIssue => "Issue Hook",
            Self::GitlabMergeRequest => "Merge Request Hook",
            Self::GitlabNote => "Note Hook",
            Self::GitlabPipeline => "Pipeline Hook",
            Self::GitlabJob => "Job Hook",
            Self::GitlabWikiPage => "Wiki Page Hook",
        }
    }

    /// Parse an `X-GitHub-Event` value. Case-insensitive.
    pub fn from_github(name: &str) -> Option<Self> {
        Self::GITHUB
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Parse an `X-Gitlab-Event` value. Case-insensitive. Older GitLab
    /// releases send `Build Hook` for job events.
    pub fn from_gitlab(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("Build Hook") {
            return Some(Self::GitlabJob);
        }
        Self::GITLAB
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    /// Classify a request by its event header, preferring GitHub's.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, EventHeaderError> {
        let header = |name: &str| {
            headers
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        };
        if let Some(name) = header(GITHUB_EVENT_HEADER) {
            return Self::from_github(&name).ok_or(EventHeaderError::Unsupported(name));
        }
        if let Some(name) = header(GITLAB_EVENT_HEADER) {
            return Self::from_gitlab(&name).ok_or(EventHeaderError::Unsupported(name));
        }
        Err(EventHeaderError::Missing)
    }

    pub fn is_gitlab(self) -> bool {
        Self::GITLAB.contains(&self)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
