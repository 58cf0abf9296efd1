use serde_json::Value;

use {
    super::{Payload, count, headline, prettify, sentence, with_url},
    crate::style,
};

const NULL_SHA: &str = "0000000000000000000000000000000000000000";

pub(super) fn ping(p: &Payload) -> Vec<String> {
    let scope = match p.text(&["hook", "type"]).to_ascii_lowercase().as_str() {
        "organization" => p.text(&["organization", "login"]),
        "repository" => p.repository_name(),
        _ => "",
    };
    vec![format!(
        "[{}] Received ping: {}",
        style::repository(scope),
        p.text(&["zen"])
    )]
}

pub(super) fn commit_comment(p: &Payload) -> Vec<String> {
    let summary = format!(
        "{} commented on commit {}: {}",
        headline(p.repository_name(), p.sender_name()),
        style::hash(p.text(&["comment", "commit_id"])),
        prettify(p.text(&["comment", "body"]))
    );
    vec![with_url(summary, p.text(&["comment", "html_url"]))]
}

pub(super) fn issue_comment(p: &Payload) -> Vec<String> {
    let summary = format!(
        "{} commented on issue #{}: {}",
        headline(p.repository_name(), p.sender_name()),
        p.number(&["issue", "number"]),
        prettify(p.text(&["comment", "body"]))
    );
    vec![with_url(summary, p.text(&["comment", "html_url"]))]
}

pub(super) fn pull_request_review_comment(p: &Payload) -> Vec<String> {
    let summary = format!(
        "{} commented on pull request #{} {}: {}",
        headline(p.repository_name(), p.sender_name()),
        p.number(&["pull_request", "number"]),
        style::hash(p.text(&["comment", "commit_id"])),
        prettify(p.text(&["comment", "body"]))
    );
    vec![with_url(summary, p.text(&["comment", "html_url"]))]
}

pub(super) fn issues(p: &Payload) -> Vec<String> {
    if !matches!(p.action(), "opened" | "closed") {
        return Vec::new();
    }
    let summary = format!(
        "{} {} issue #{}: {}",
        headline(p.repository_name(), p.sender_name()),
        p.action(),
        p.number(&["issue", "number"]),
        p.text(&["issue", "title"])
    );
    vec![with_url(summary, p.text(&["issue", "html_url"]))]
}

pub(super) fn pull_request(p: &Payload) -> Vec<String> {
    let action = match p.action() {
        "closed" if p.flag(&["pull_request", "merged"]) => "merged",
        action @ ("opened" | "closed") => action,
        _ => return Vec::new(),
    };

    let branch_of = |label: &str| label.rsplit(':').next().unwrap_or_default().to_string();
    let base = branch_of(p.text(&["pull_request", "base", "label"]));
    let head_label = p.text(&["pull_request", "head", "label"]);
    let head = branch_of(head_label);
    let head = if head == base {
        head
    } else {
        head_label.to_string()
    };

    let summary = format!(
        "{} {action} pull request #{}: {} ({}...{})",
        headline(p.repository_name(), p.sender_name()),
        p.number(&["pull_request", "number"]),
        p.text(&["pull_request", "title"]),
        style::branch(&base),
        style::branch(&head)
    );
    vec![with_url(summary, p.text(&["pull_request", "html_url"]))]
}

pub(super) fn watch(p: &Payload) -> Vec<String> {
    if p.action() != "started" {
        return Vec::new();
    }
    let summary = format!(
        "{} starred the repository",
        headline(p.repository_name(), p.sender_name())
    );
    vec![with_url(summary, &format!("{}/stargazers", p.repository_url()))]
}

pub(super) fn fork(p: &Payload) -> Vec<String> {
    let summary = format!(
        "{} created fork {}/{}",
        headline(p.repository_name(), p.sender_name()),
        style::user(p.text(&["forkee", "owner", "login"])),
        style::repository(p.text(&["forkee", "name"]))
    );
    vec![with_url(summary, p.text(&["forkee", "html_url"]))]
}

pub(super) fn public(p: &Payload) -> Vec<String> {
    let summary = format!(
        "{} open-sourced the repository",
        headline(p.repository_name(), p.sender_name())
    );
    vec![with_url(summary, p.repository_url())]
}

pub(super) fn gollum(p: &Payload) -> Vec<String> {
    let pages = p.array(&["pages"]);
    let page_text = |page: &Value, key: &str| {
        page.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let (summary, url) = match pages {
        [page] => {
            let short = prettify(&page_text(page, "summary"));
            let suffix = if short.is_empty() {
                String::new()
            } else {
                format!(": {short}")
            };
            let summary = format!(
                "{} wiki page {}{suffix}",
                page_text(page, "action"),
                page_text(page, "title")
            );
            (summary, page_text(page, "html_url"))
        },
        _ => {
            let mut counts: Vec<(String, usize)> = Vec::new();
            for page in pages {
                let action = page_text(page, "action");
                match counts.iter_mut().find(|(a, _)| *a == action) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((action, 1)),
                }
            }
            counts.sort();
            let actions: Vec<String> = counts.iter().map(|(a, n)| format!("{a} {n}")).collect();
            let changes = if actions.is_empty() {
                "pushed an empty commit that did not affect any".to_string()
            } else {
                sentence(&actions)
            };
            let noun = if counts.last().is_some_and(|(_, n)| *n == 1) {
                "page"
            } else {
                "pages"
            };
            (
                format!("{changes} wiki {noun}"),
                format!("{}/wiki", p.repository_url()),
            )
        },
    };

    let line = format!(
        "{} {summary}",
        headline(p.repository_name(), p.sender_name())
    );
    vec![with_url(line, &url)]
}

pub(super) fn push(p: &Payload) -> Vec<String> {
    let push = Push::new(p);
    let mut lines = vec![with_url(push.summary(), &push.summary_url())];
    lines.extend(push.distinct.iter().map(|commit| push.commit_line(commit)));
    lines
}

struct Push<'a> {
    payload: Payload<'a>,
    repository: &'a str,
    ref_name: &'a str,
    base_ref: Option<&'a str>,
    before: &'a str,
    after: &'a str,
    commits: &'a [Value],
    distinct: Vec<&'a Value>,
}

impl<'a> Push<'a> {
    fn new(p: &Payload<'a>) -> Self {
        let commits = p.array(&["commits"]);
        let distinct = match p.get(&["distinct_commits"]).and_then(Value::as_array) {
            Some(listed) => listed.iter().collect(),
            None => commits
                .iter()
                .filter(|c| {
                    c.get("distinct").and_then(Value::as_bool).unwrap_or(false)
                        && !commit_message(c).trim().is_empty()
                })
                .collect(),
        };
        Self {
            payload: *p,
            repository: p.repository_name(),
            ref_name: strip_ref(p.text(&["ref"])),
            base_ref: p.str(&["base_ref"]).map(strip_ref),
            before: p.text(&["before"]),
            after: p.text(&["after"]),
            commits,
            distinct,
        }
    }

    fn created(&self) -> bool {
        self.before == NULL_SHA
    }

    fn deleted(&self) -> bool {
        self.after == NULL_SHA
    }

    fn forced(&self) -> bool {
        self.payload.flag(&["forced"])
    }

    fn tag(&self) -> bool {
        self.payload.text(&["ref"]).starts_with("refs/tags/")
    }

    fn summary(&self) -> String {
        let pusher = self.payload.str(&["pusher", "name"]).unwrap_or("somebody");
        let mut msg = headline(self.repository, pusher);
        let branch = style::branch(self.ref_name);

        if self.created() {
            if self.tag() {
                let at = match self.base_ref {
                    Some(base) => style::branch(base),
                    None => style::hash(self.after),
                };
                msg.push_str(&format!(" tagged {branch} at {at}"));
            } else {
                msg.push_str(&format!(" created {branch}"));
                match self.base_ref {
                    Some(base) => msg.push_str(&format!(" from {}", style::branch(base))),
                    None => msg.push_str(&format!(" at {}", style::hash(self.after))),
                }
                msg.push_str(&format!(
                    " (+{})",
                    count(self.distinct.len(), "new commit", "new commits")
                ));
            }
        } else if self.deleted() {
            msg.push_str(&format!(
                " {} {branch} at {}",
                style::dangerous("deleted"),
                style::hash(self.before)
            ));
        } else if self.forced() {
            msg.push_str(&format!(
                " {} {branch} from {} to {}",
                style::dangerous("force-pushed"),
                style::hash(self.before),
                style::hash(self.after)
            ));
        } else if !self.commits.is_empty() && self.distinct.is_empty() {
            match self.base_ref {
                Some(base) => {
                    msg.push_str(&format!(" merged {} into {branch}", style::branch(base)));
                },
                None => msg.push_str(&format!(
                    " fast-forwarded {branch} from {} to {}",
                    style::hash(self.before),
                    style::hash(self.after)
                )),
            }
        } else {
            msg.push_str(&format!(
                " pushed {} to {branch}",
                count(self.distinct.len(), "new commit", "new commits")
            ));
        }
        msg
    }

    fn summary_url(&self) -> String {
        let repository_url = self.payload.repository_url();
        let compare = self.payload.text(&["compare"]).to_string();
        if self.created() {
            if self.distinct.is_empty() {
                format!("{repository_url}/commits/{}", self.ref_name)
            } else {
                compare
            }
        } else if self.deleted() {
            format!("{repository_url}/commits/{}", self.before)
        } else if self.forced() {
            format!("{repository_url}/commits/{}", self.ref_name)
        } else if let [only] = self.distinct.as_slice() {
            only.get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        } else {
            compare
        }
    }

    fn commit_line(&self, commit: &Value) -> String {
        let author = commit
            .get("author")
            .and_then(|a| a.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        format!(
            "{}/{} {} {}: {}",
            style::repository(self.repository),
            style::branch(self.ref_name),
            style::hash(commit.get("id").and_then(Value::as_str).unwrap_or_default()),
            style::user(author),
            prettify(commit_message(commit))
        )
    }
}

fn commit_message(commit: &Value) -> &str {
    commit
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// `refs/heads/main` → `main`, `refs/tags/v1` → `v1`.
pub(super) fn strip_ref(r: &str) -> &str {
    r.strip_prefix("refs/heads/")
        .or_else(|| r.strip_prefix("refs/tags/"))
        .unwrap_or(r)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{event::EventKind, format::format, style::strip},
        serde_json::json,
    };

    fn plain(kind: EventKind, payload: Value) -> Vec<String> {
        format(kind, &payload).iter().map(|l| strip(l)).collect()
    }

    fn repo() -> Value {
        json!({"name": "hookbot", "html_url": "https://github.com/octo/hookbot"})
    }

    fn commit(id: &str, message: &str, distinct: bool) -> Value {
        json!({
            "id": id,
            "message": message,
            "distinct": distinct,
            "url": format!("https://github.com/octo/hookbot/commit/{id}"),
            "author": {"name": "Octo Cat"}
        })
    }

    #[test]
    fn ping_names_repository_or_organization() {
        let lines = plain(
            EventKind::Ping,
            json!({"zen": "Speak like a human.", "hook": {"type": "Repository"}, "repository": repo()}),
        );
        assert_eq!(lines, ["[hookbot] Received ping: Speak like a human."]);

        let lines = plain(
            EventKind::Ping,
            json!({"zen": "z", "hook": {"type": "Organization"}, "organization": {"login": "octo"}}),
        );
        assert_eq!(lines, ["[octo] Received ping: z"]);
    }

    #[test]
    fn push_lists_distinct_commits() {
        let lines = plain(
            EventKind::Push,
            json!({
                "ref": "refs/heads/main",
                "before": "1111111111111111111111111111111111111111",
                "after": "2222222222222222222222222222222222222222",
                "compare": "https://github.com/octo/hookbot/compare/1111111...2222222",
                "repository": repo(),
                "pusher": {"name": "octo"},
                "commits": [
                    commit("aaaaaaaaaa", "Add relay\n\nLonger body", true),
                    commit("bbbbbbbbbb", "Merge already seen", false),
                    commit("cccccccccc", "Fix tests", true),
                ]
            }),
        );
        assert_eq!(lines, [
            "[hookbot] octo pushed 2 new commits to main: https://github.com/octo/hookbot/compare/1111111...2222222",
            "hookbot/main aaaaaaa Octo Cat: Add relay ...",
            "hookbot/main ccccccc Octo Cat: Fix tests",
        ]);
    }

    #[test]
    fn single_commit_links_to_commit() {
        let lines = plain(
            EventKind::Push,
            json!({
                "ref": "refs/heads/main",
                "before": "1111111111111111111111111111111111111111",
                "after": "2222222222222222222222222222222222222222",
                "repository": repo(),
                "pusher": {"name": "octo"},
                "commits": [commit("aaaaaaaaaa", "One", true)]
            }),
        );
        assert_eq!(
            lines[0],
            "[hookbot] octo pushed 1 new commit to main: https://github.com/octo/hookbot/commit/aaaaaaaaaa"
        );
    }

    #[test]
    fn push_special_cases() {
        let base = |before: &str, after: &str| {
            json!({
                "ref": "refs/heads/topic",
                "before": before,
                "after": after,
                "repository": repo(),
                "pusher": {"name": "octo"},
                "commits": []
            })
        };
        let sha = "3333333333333333333333333333333333333333";

        let deleted = plain(EventKind::Push, base(sha, NULL_SHA));
        assert_eq!(
            deleted,
            ["[hookbot] octo deleted topic at 3333333: https://github.com/octo/hookbot/commits/3333333333333333333333333333333333333333"]
        );

        let created = plain(EventKind::Push, base(NULL_SHA, sha));
        assert_eq!(
            created,
            ["[hookbot] octo created topic at 3333333 (+0 new commits): https://github.com/octo/hookbot/commits/topic"]
        );

        let mut forced = base("4444444444444444444444444444444444444444", sha);
        forced["forced"] = json!(true);
        assert_eq!(
            plain(EventKind::Push, forced)[0],
            "[hookbot] octo force-pushed topic from 4444444 to 3333333: https://github.com/octo/hookbot/commits/topic"
        );

        let mut tag = base(NULL_SHA, sha);
        tag["ref"] = json!("refs/tags/v1.0");
        assert!(plain(EventKind::Push, tag)[0].starts_with("[hookbot] octo tagged v1.0 at 3333333"));
    }

    #[test]
    fn issues_only_announce_open_and_close() {
        let payload = |action: &str| {
            json!({
                "action": action,
                "issue": {"number": 42, "title": "Crash on rehash", "html_url": "https://github.com/octo/hookbot/issues/42"},
                "repository": repo(),
                "sender": {"login": "octo"}
            })
        };
        assert_eq!(plain(EventKind::Issues, payload("opened")), [
            "[hookbot] octo opened issue #42: Crash on rehash: https://github.com/octo/hookbot/issues/42"
        ]);
        assert!(plain(EventKind::Issues, payload("labeled")).is_empty());
    }

    #[test]
    fn pull_request_shows_branches_and_merge() {
        let lines = plain(
            EventKind::PullRequest,
            json!({
                "action": "closed",
                "pull_request": {
                    "number": 7,
                    "title": "Add TLS",
                    "merged": true,
                    "html_url": "https://github.com/octo/hookbot/pull/7",
                    "base": {"label": "octo:main"},
                    "head": {"label": "fork:tls"}
                },
                "repository": repo(),
                "sender": {"login": "octo"}
            }),
        );
        assert_eq!(lines, [
            "[hookbot] octo merged pull request #7: Add TLS (main...fork:tls): https://github.com/octo/hookbot/pull/7"
        ]);
    }

    #[test]
    fn watch_and_fork() {
        let sender = json!({"login": "fan"});
        assert_eq!(
            plain(EventKind::Watch, json!({"action": "started", "repository": repo(), "sender": sender})),
            ["[hookbot] fan starred the repository: https://github.com/octo/hookbot/stargazers"]
        );
        assert_eq!(
            plain(
                EventKind::Fork,
                json!({
                    "forkee": {"name": "hookbot", "owner": {"login": "fan"}, "html_url": "https://github.com/fan/hookbot"},
                    "repository": repo(),
                    "sender": sender
                })
            ),
            ["[hookbot] fan created fork fan/hookbot: https://github.com/fan/hookbot"]
        );
    }

    #[test]
    fn gollum_summarises_pages() {
        let page = |action: &str, title: &str| {
            json!({"action": action, "title": title, "summary": null, "html_url": format!("https://wiki/{title}")})
        };
        let one = plain(
            EventKind::Gollum,
            json!({"pages": [page("created", "Home")], "repository": repo(), "sender": {"login": "octo"}}),
        );
        assert_eq!(one, ["[hookbot] octo created wiki page Home: https://wiki/Home"]);

        let many = plain(
            EventKind::Gollum,
            json!({
                "pages": [page("edited", "A"), page("created", "B"), page("edited", "C")],
                "repository": repo(),
                "sender": {"login": "octo"}
            }),
        );
        assert_eq!(many, [
            "[hookbot] octo created 1 and edited 2 wiki pages: https://github.com/octo/hookbot/wiki"
        ]);
    }

    #[test]
    fn missing_fields_do_not_panic() {
        for kind in [
            EventKind::CommitComment,
            EventKind::Fork,
            EventKind::Gollum,
            EventKind::IssueComment,
            EventKind::Ping,
            EventKind::Public,
            EventKind::PullRequestReviewComment,
            EventKind::Push,
        ] {
            assert!(!format(kind, &json!({})).is_empty(), "{kind}");
        }
        assert!(format(EventKind::Push, &json!([1, 2])).len() == 1);
    }
}
