use serde_json::Value;

use {
    super::{Payload, count, github::strip_ref, headline, prettify, with_url},
    crate::style,
};

/// `project.path_with_namespace`, or `repository.name` for older payloads.
fn project<'a>(p: &Payload<'a>) -> &'a str {
    p.str(&["project", "path_with_namespace"])
        .unwrap_or_else(|| p.repository_name())
}

/// `"repo/branch abc1234 author: first line"`.
fn commit_line(repository: &str, branch: &str, commit: &Value) -> String {
    let commit = Payload(commit);
    let id = match commit.str(&["id"]).or_else(|| commit.str(&["sha"])) {
        Some(id) => id.to_string(),
        None => commit.number(&["id"]),
    };
    let author = commit
        .str(&["author", "name"])
        .or_else(|| commit.str(&["author_name"]))
        .unwrap_or_default();
    format!(
        "{repository}/{} {} {}: {}",
        style::branch(branch),
        style::hash(&id),
        style::user(author),
        prettify(commit.text(&["message"]))
    )
}

/// Status phrase shared by pipeline and job events.
fn ci_status(status: &str, reason: &str) -> String {
    match status {
        "created" => "was created from commit".to_string(),
        "success" => "succeeded".to_string(),
        "skipped" => "was skipped".to_string(),
        s if s.starts_with("fail") || s.starts_with("err") => {
            if reason.is_empty() {
                style::dangerous("failed")
            } else {
                format!("{}: {reason}", style::dangerous("failed"))
            }
        },
        other => other.to_string(),
    }
}

pub(super) fn push(p: &Payload, tag: bool) -> Vec<String> {
    let repository = p.text(&["repository", "name"]);
    let homepage = p.text(&["repository", "homepage"]);
    let user = p.text(&["user_name"]);
    let ref_name = strip_ref(p.text(&["ref"]));

    if tag {
        let summary = format!(
            "[{}] {} pushed tag {}",
            style::repository(repository),
            style::user(user),
            style::branch(ref_name)
        );
        return vec![with_url(summary, &format!("{homepage}/tags/{ref_name}"))];
    }

    let total = p
        .get(&["total_commits_count"])
        .and_then(Value::as_u64)
        .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
    let compare = format!(
        "{homepage}/compare/{}...{}",
        p.text(&["before"]),
        p.text(&["after"])
    );
    let summary = format!(
        "[{}] {} pushed {} to {}",
        style::repository(repository),
        style::user(user),
        count(total, "new commit", "new commits"),
        style::branch(ref_name)
    );

    let mut lines = vec![with_url(summary, &compare)];
    lines.extend(
        p.array(&["commits"])
            .iter()
            .map(|commit| commit_line(repository, ref_name, commit)),
    );
    lines
}

pub(super) fn issue(p: &Payload) -> Vec<String> {
    let action = match p.text(&["object_attributes", "action"]) {
        "open" => "opened",
        "close" => "closed",
        "reopen" => "reopened",
        "update" => "updated",
        _ => return Vec::new(),
    };
    let number = match p.get(&["object_attributes", "iid"]) {
        Some(_) => p.number(&["object_attributes", "iid"]),
        None => p.number(&["object_attributes", "id"]),
    };
    let summary = format!(
        "{} {action} issue #{number}: {}",
        headline(project(p), p.text(&["user", "name"])),
        p.text(&["object_attributes", "title"])
    );
    vec![with_url(summary, p.text(&["object_attributes", "url"]))]
}

pub(super) fn merge_request(p: &Payload) -> Vec<String> {
    let action = match p.text(&["object_attributes", "action"]) {
        "open" => "opened",
        "close" => "closed",
        "reopen" => "reopened",
        "merge" => "merged",
        "update" | "" => "updated",
        other => other,
    };
    let summary = format!(
        "{} {action} merge request '{}'",
        headline(project(p), p.text(&["user", "name"])),
        p.text(&["object_attributes", "title"])
    );
    vec![with_url(summary, p.text(&["object_attributes", "url"]))]
}

/// Comments on issues, snippets, merge requests and commits.
pub(super) fn note(p: &Payload) -> Vec<String> {
    let target = match p.text(&["object_attributes", "noteable_type"]) {
        "Issue" => format!("issue #{}", p.number(&["issue", "iid"])),
        "Snippet" => format!("code snippet '{}'", p.text(&["snippet", "title"])),
        "MergeRequest" => format!("merge request '{}'", p.text(&["merge_request", "title"])),
        "Commit" => format!("commit {}", style::hash(p.text(&["commit", "id"]))),
        _ => return Vec::new(),
    };
    let summary = format!(
        "{} commented on {target}: {}",
        headline(project(p), p.text(&["user", "name"])),
        prettify(p.text(&["object_attributes", "note"]))
    );
    vec![with_url(summary, p.text(&["object_attributes", "url"]))]
}

pub(super) fn pipeline(p: &Payload) -> Vec<String> {
    let status = p.text(&["object_attributes", "status"]);
    let url = format!(
        "{}/pipelines/{}",
        p.text(&["project", "web_url"]),
        p.number(&["object_attributes", "id"])
    );
    let summary = format!(
        "[{}] pipeline {} ({})",
        style::repository(project(p)),
        ci_status(status, p.text(&["object_attributes", "detailed_status"])),
        style::url(&url)
    );
    match p.get(&["commit"]) {
        Some(commit) if status == "created" => vec![
            format!("{summary}:"),
            commit_line(project(p), p.text(&["object_attributes", "ref"]), commit),
        ],
        _ => vec![summary],
    }
}

pub(super) fn job(p: &Payload) -> Vec<String> {
    let status = p.text(&["build_status"]);
    let repository = p.repository_name();
    let url = format!(
        "{}/-/jobs/{}",
        p.text(&["repository", "homepage"]),
        p.number(&["build_id"])
    );
    let summary = format!(
        "[{}] job '{}' ({}) {}",
        style::repository(repository),
        p.text(&["build_name"]),
        style::url(&url),
        ci_status(status, p.text(&["build_failure_reason"]))
    );
    match p.get(&["commit"]) {
        Some(commit) if status == "created" => vec![
            format!("{summary}:"),
            commit_line(repository, p.text(&["ref"]), commit),
        ],
        _ => vec![summary],
    }
}

pub(super) fn wiki_page(p: &Payload) -> Vec<String> {
    let action = match p.text(&["object_attributes", "action"]) {
        "create" => "created",
        "delete" => "deleted",
        "update" | "" => "updated",
        other => other,
    };
    let summary = format!(
        "{} {action} page '{}'",
        headline(project(p), p.text(&["user", "name"])),
        p.text(&["object_attributes", "title"])
    );
    vec![with_url(summary, p.text(&["object_attributes", "url"]))]
}

#[cfg(test)]
mod tests {
    use {
        crate::{event::EventKind, format::format, style::strip},
        serde_json::json,
    };

    #[test]
    fn push_hook_lists_commits() {
        let payload = json!({
            "object_kind": "push",
            "before": "95790bf891e76fee5e1747ab589903a6a1f80f22",
            "after": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
            "ref": "refs/heads/master",
            "user_name": "John Smith",
            "total_commits_count": 2,
            "repository": {"name": "Diaspora", "homepage": "http://example.com/mike/diaspora"},
            "commits": [
                {"id": "b6568db1bc1dcd7f8b4d5a946b0b91f9dacd7327", "message": "Update Catalan translation to e38cb41.\n\nsee the log", "author": {"name": "Jordi Mallach"}},
                {"id": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7", "message": "fixed readme", "author": {"name": "GitLab dev user"}}
            ]
        });
        let lines: Vec<String> = format(EventKind::GitlabPush, &payload)
            .iter()
            .map(|l| strip(l))
            .collect();
        assert_eq!(lines, [
            "[Diaspora] John Smith pushed 2 new commits to master: http://example.com/mike/diaspora/compare/95790bf891e76fee5e1747ab589903a6a1f80f22...da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
            "Diaspora/master b6568db Jordi Mallach: Update Catalan translation to e38cb41. ...",
            "Diaspora/master da15608 GitLab dev user: fixed readme",
        ]);
    }

    #[test]
    fn tag_push_hook() {
        let payload = json!({
            "ref": "refs/tags/v1.0.0",
            "user_name": "John Smith",
            "repository": {"name": "Example", "homepage": "http://example.com/jsmith/example"}
        });
        assert_eq!(strip(&format(EventKind::GitlabTagPush, &payload)[0]),
            "[Example] John Smith pushed tag v1.0.0: http://example.com/jsmith/example/tags/v1.0.0");
    }

    #[test]
    fn issue_hook_uses_project_path_and_iid() {
        let payload = |action: &str| {
            json!({
                "object_kind": "issue",
                "user": {"name": "Administrator"},
                "project": {"path_with_namespace": "gitlabhq/gitlab-test"},
                "object_attributes": {
                    "id": 301,
                    "iid": 23,
                    "title": "New API: create/update/delete file",
                    "action": action,
                    "url": "http://example.com/diaspora/issues/23"
                }
            })
        };
        let lines = format(EventKind::GitlabIssue, &payload("open"));
        assert_eq!(strip(&lines[0]),
            "[gitlabhq/gitlab-test] Administrator opened issue #23: New API: create/update/delete file: http://example.com/diaspora/issues/23");
        assert!(format(EventKind::GitlabIssue, &payload("unknown")).is_empty());
    }

    fn plain(kind: EventKind, payload: &serde_json::Value) -> Vec<String> {
        format(kind, payload).iter().map(|l| strip(l)).collect()
    }

    #[test]
    fn merge_request_hook() {
        let payload = json!({
            "object_kind": "merge_request",
            "user": {"name": "Administrator"},
            "project": {"path_with_namespace": "gitlabhq/gitlab-test"},
            "object_attributes": {
                "iid": 1,
                "title": "MS-Viewport",
                "action": "open",
                "url": "http://example.com/diaspora/merge_requests/1"
            }
        });
        assert_eq!(plain(EventKind::GitlabMergeRequest, &payload), [
            "[gitlabhq/gitlab-test] Administrator opened merge request 'MS-Viewport': http://example.com/diaspora/merge_requests/1"
        ]);
    }

    #[test]
    fn note_hook_names_what_was_commented_on() {
        let note = |kind: &str, extra: serde_json::Value| {
            let mut payload = json!({
                "object_kind": "note",
                "user": {"name": "Administrator"},
                "project": {"path_with_namespace": "gitlab-org/gitlab-test"},
                "object_attributes": {
                    "noteable_type": kind,
                    "note": "This MR needs work.\n\nSee the pipeline.",
                    "url": "http://example.com/gitlab-org/gitlab-test/notes#note_1244"
                }
            });
            if let (Some(target), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
                target.extend(extra.clone());
            }
            plain(EventKind::GitlabNote, &payload)
        };

        assert_eq!(note("Issue", json!({"issue": {"iid": 17}})), [
            "[gitlab-org/gitlab-test] Administrator commented on issue #17: This MR needs work. ...: http://example.com/gitlab-org/gitlab-test/notes#note_1244"
        ]);
        assert!(note("Snippet", json!({"snippet": {"title": "test"}}))[0]
            .contains("commented on code snippet 'test': "));
        assert!(note("MergeRequest", json!({"merge_request": {"title": "Tempora et eos"}}))[0]
            .contains("commented on merge request 'Tempora et eos': "));
        assert!(note("Commit", json!({"commit": {"id": "cfe32cf61b73a0d5e9f13e774abde7ff789b1660"}}))[0]
            .contains("commented on commit cfe32cf: "));
        assert!(note("Epic", json!({})).is_empty());
    }

    #[test]
    fn pipeline_hook_reports_status() {
        let payload = |status: &str| {
            json!({
                "object_kind": "pipeline",
                "object_attributes": {"id": 31, "ref": "master", "status": status, "detailed_status": "failed"},
                "project": {
                    "path_with_namespace": "gitlab-org/gitlab-test",
                    "web_url": "http://192.168.64.1:3005/gitlab-org/gitlab-test"
                },
                "commit": {
                    "id": "bcbb5ec396a2c0f828686f14fac9b80b780504f2",
                    "message": "test\n",
                    "author": {"name": "User"}
                }
            })
        };
        assert_eq!(plain(EventKind::GitlabPipeline, &payload("success")), [
            "[gitlab-org/gitlab-test] pipeline succeeded (http://192.168.64.1:3005/gitlab-org/gitlab-test/pipelines/31)"
        ]);
        assert_eq!(plain(EventKind::GitlabPipeline, &payload("failed")), [
            "[gitlab-org/gitlab-test] pipeline failed: failed (http://192.168.64.1:3005/gitlab-org/gitlab-test/pipelines/31)"
        ]);
        assert_eq!(plain(EventKind::GitlabPipeline, &payload("created")), [
            "[gitlab-org/gitlab-test] pipeline was created from commit (http://192.168.64.1:3005/gitlab-org/gitlab-test/pipelines/31):",
            "gitlab-org/gitlab-test/master bcbb5ec User: test",
        ]);
    }

    #[test]
    fn job_hook_reports_status() {
        let payload = |status: &str| {
            json!({
                "object_kind": "build",
                "ref": "gitlab-script-trigger",
                "build_id": 1977,
                "build_name": "test",
                "build_status": status,
                "build_failure_reason": "script_failure",
                "repository": {
                    "name": "gitlab_test",
                    "homepage": "http://192.168.64.1:3005/gitlab-org/gitlab-test"
                },
                "commit": {"id": 2366, "sha": "2293ada6b400935a1378653304eaf6221e0fdb8f", "message": "test", "author_name": "User"}
            })
        };
        assert_eq!(plain(EventKind::GitlabJob, &payload("created")), [
            "[gitlab_test] job 'test' (http://192.168.64.1:3005/gitlab-org/gitlab-test/-/jobs/1977) was created from commit:",
            "gitlab_test/gitlab-script-trigger 2293ada User: test",
        ]);
        assert_eq!(plain(EventKind::GitlabJob, &payload("success")), [
            "[gitlab_test] job 'test' (http://192.168.64.1:3005/gitlab-org/gitlab-test/-/jobs/1977) succeeded"
        ]);
        assert!(plain(EventKind::GitlabJob, &payload("failed"))[0].ends_with("failed: script_failure"));
    }

    #[test]
    fn wiki_page_hook() {
        let payload = |action: &str| {
            json!({
                "object_kind": "wiki_page",
                "user": {"name": "Administrator"},
                "project": {"path_with_namespace": "root/awesome-project"},
                "object_attributes": {
                    "title": "Awesome",
                    "action": action,
                    "url": "http://example.com/root/awesome-project/wikis/awesome"
                }
            })
        };
        assert_eq!(plain(EventKind::GitlabWikiPage, &payload("create")), [
            "[root/awesome-project] Administrator created page 'Awesome': http://example.com/root/awesome-project/wikis/awesome"
        ]);
        assert!(plain(EventKind::GitlabWikiPage, &payload("update"))[0].contains("updated page"));
    }
}
