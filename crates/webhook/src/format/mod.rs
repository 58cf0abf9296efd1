//! Turn webhook payloads into IRC lines.
//!
//! Formatters read only the fields they print and tolerate anything missing:
//! an absent string renders empty, an absent number renders as `?`. An event
//! that is not worth announcing (an issue being labeled, a star removed)
//! yields no lines.

mod github;
mod gitlab;

use serde_json::Value;

use crate::{event::EventKind, style};

/// Longest commit or comment summary before it is cut.
pub const SUMMARY_LENGTH: usize = 100;

/// Format `payload` for `kind`. Every returned line starts with a formatting
/// reset so nothing leaks in from the channel.
pub fn format(kind: EventKind, payload: &Value) -> Vec<String> {
    let payload = Payload(payload);
    let lines = match kind {
        EventKind::CommitComment => github::commit_comment(&payload),
        EventKind::Fork => github::fork(&payload),
        EventKind::Gollum => github::gollum(&payload),
        EventKind::IssueComment => github::issue_comment(&payload),
        EventKind::Issues => github::issues(&payload),
        EventKind::Ping => github::ping(&payload),
        EventKind::Public => github::public(&payload),
        EventKind::PullRequest => github::pull_request(&payload),
        EventKind::PullRequestReviewComment => github::pull_request_review_comment(&payload),
        EventKind::Push => github::push(&payload),
        EventKind::Watch => github::watch(&payload),
        EventKind::GitlabPush => gitlab::push(&payload, false),
        EventKind::GitlabTagPush => gitlab::push(&payload, true),
        EventKind::GitlabIssue => gitlab::issue(&payload),
        EventKind::GitlabMergeRequest => gitlab::merge_request(&payload),
        EventKind::GitlabNote => gitlab::note(&payload),
        EventKind::GitlabPipeline => gitlab::pipeline(&payload),
        EventKind::GitlabJob => gitlab::job(&payload),
        EventKind::GitlabWikiPage => gitlab::wiki_page(&payload),
    };
    lines
        .into_iter()
        .map(|line| format!("{}{line}", style::RESET))
        .collect()
}

/// Lenient accessors over a JSON payload.
#[derive(Clone, Copy)]
pub(crate) struct Payload<'a>(&'a Value);

impl<'a> Payload<'a> {
    pub(crate) fn get(&self, path: &[&str]) -> Option<&'a Value> {
        path.iter().try_fold(self.0, |node, key| node.get(key))
    }

    pub(crate) fn str(&self, path: &[&str]) -> Option<&'a str> {
        self.get(path).and_then(Value::as_str)
    }

    /// String at `path`, or empty.
    pub(crate) fn text(&self, path: &[&str]) -> &'a str {
        self.str(path).unwrap_or_default()
    }

    /// Issue and pull request numbers.
    pub(crate) fn number(&self, path: &[&str]) -> String {
        match self.get(path) {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => "?".to_string(),
        }
    }

    pub(crate) fn array(&self, path: &[&str]) -> &'a [Value] {
        self.get(path)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn flag(&self, path: &[&str]) -> bool {
        self.get(path).and_then(Value::as_bool).unwrap_or(false)
    }

    pub(crate) fn action(&self) -> &'a str {
        self.text(&["action"])
    }

    pub(crate) fn repository_name(&self) -> &'a str {
        self.text(&["repository", "name"])
    }

    pub(crate) fn repository_url(&self) -> &'a str {
        self.text(&["repository", "html_url"])
    }

    pub(crate) fn sender_name(&self) -> &'a str {
        self.text(&["sender", "login"])
    }
}

/// `"[repo] user"`, the start of most summaries.
pub(crate) fn headline(repository: &str, user: &str) -> String {
    format!("[{}] {}", style::repository(repository), style::user(user))
}

/// Append the styled URL to a summary.
pub(crate) fn with_url(summary: String, url: &str) -> String {
    if url.is_empty() {
        summary
    } else {
        format!("{summary}: {}", style::url(url))
    }
}

/// First line of `text`, cut to [`SUMMARY_LENGTH`]. Elision is marked with
/// `...`.
pub(crate) fn prettify(text: &str) -> String {
    let text = text.trim();
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default().trim_end();
    let more = lines.any(|l| !l.trim().is_empty());

    if first.chars().count() > SUMMARY_LENGTH {
        let cut: String = first.chars().take(SUMMARY_LENGTH).collect();
        return format!("{}...", cut.trim_end());
    }
    if more {
        format!("{first} ...")
    } else {
        first.to_string()
    }
}

/// `"1 new commit"`, `"3 new commits"`.
pub(crate) fn count(n: usize, singular: &str, plural: &str) -> String {
    format!("{n} {}", if n == 1 { singular } else { plural })
}

/// `"a"`, `"a and b"`, `"a, b and c"`.
pub(crate) fn sentence(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn payload_accessors_are_lenient() {
        let value = json!({"issue": {"number": 7, "title": "t"}, "list": [1, 2]});
        let payload = Payload(&value);
        assert_eq!(payload.text(&["issue", "title"]), "t");
        assert_eq!(payload.text(&["issue", "missing"]), "");
        assert_eq!(payload.number(&["issue", "number"]), "7");
        assert_eq!(payload.number(&["nothing"]), "?");
        assert_eq!(payload.array(&["list"]).len(), 2);
        assert!(payload.array(&["issue"]).is_empty());
        assert!(!payload.flag(&["issue", "title"]));
    }

    #[test]
    fn prettify_keeps_first_line() {
        assert_eq!(prettify("fix readme"), "fix readme");
        assert_eq!(prettify("Update translation.\n\nDetails here"), "Update translation. ...");
        assert_eq!(prettify("one\n\n   \n"), "one");
        let long = "x".repeat(SUMMARY_LENGTH + 10);
        assert_eq!(prettify(&long), format!("{}...", "x".repeat(SUMMARY_LENGTH)));
    }

    #[test]
    fn sentences_and_counts() {
        assert_eq!(sentence(&[]), "");
        assert_eq!(sentence(&["a".into()]), "a");
        assert_eq!(sentence(&["a".into(), "b".into(), "c".into()]), "a, b and c");
        assert_eq!(count(1, "new commit", "new commits"), "1 new commit");
        assert_eq!(count(0, "new commit", "new commits"), "0 new commits");
    }

    #[test]
    fn every_line_starts_with_reset() {
        let value = json!({"zen": "Design for failure.", "hook": {"type": "Repository"}, "repository": {"name": "hookbot"}});
        let lines = format(EventKind::Ping, &value);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with(style::RESET));
    }
}
