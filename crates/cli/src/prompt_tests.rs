// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tempfile::tempdir;

use super::*;

#[test]
fn substitutes_known_placeholders_only() {
    let rendered = substitute("hello {{SESSION_ID}}/{{MEMBER_ID}}/{{OTHER}}", "alice-dev", "m1");
    assert_eq!(rendered, "hello alice-dev/m1/{{OTHER}}");
}

#[test]
fn missing_member_id_substitutes_empty_string() {
    let rendered = substitute("id={{MEMBER_ID}}", "s", "");
    assert_eq!(rendered, "id=");
}

#[test]
fn render_system_prompt_reads_and_substitutes() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("developer.md");
    std::fs::write(&path, "You are {{SESSION_ID}} ({{MEMBER_ID}})").expect("write");

    let rendered = render_system_prompt(&path, "alice-dev", Some("m1")).expect("render");
    assert_eq!(rendered, "You are alice-dev (m1)");
}

#[test]
fn template_path_is_role_dot_md() {
    let dir = std::path::Path::new("/prompts");
    assert_eq!(template_path(dir, Role::Developer), dir.join("developer.md"));
    assert_eq!(template_path(dir, Role::Orchestrator), dir.join("orchestrator.md"));
}

#[test]
fn project_start_prompt_begins_with_fixed_header() {
    let prompt = ProjectStartPrompt {
        project_name: "demo".to_string(),
        project_path: "/work/demo".to_string(),
        team_name: "t1".to_string(),
        members: vec![
            RosterMember { name: "alice".to_string(), role: Role::Developer, skills: vec!["rust".to_string()] },
            RosterMember { name: "bob".to_string(), role: Role::Qa, skills: vec![] },
        ],
        requirements: "Build the thing.".to_string(),
    };
    let rendered = prompt.render();
    assert!(rendered.starts_with("## Project: demo\n"));
    assert!(rendered.contains("**Path:** /work/demo"));
    assert!(rendered.contains("**Team:** t1"));
    assert!(rendered.contains("- alice (developer) — rust"));
    assert!(rendered.contains("- bob (qa)\n"));
    assert!(rendered.contains("**Requirements:**\n\nBuild the thing."));
}
