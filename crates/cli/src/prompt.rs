// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt templates: role-specific system prompts loaded from Markdown
//! files with a tiny, fixed substitution set, plus the composed
//! project-start prompt delivered to the orchestrator.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::session::Role;

/// Substitute `{{SESSION_ID}}` and `{{MEMBER_ID}}` in `template`. No other
/// template syntax is recognised; a literal `{{` that doesn't match either
/// placeholder is preserved verbatim.
pub fn substitute(template: &str, session_id: &str, member_id: &str) -> String {
    template.replace("{{SESSION_ID}}", session_id).replace("{{MEMBER_ID}}", member_id)
}

/// Load the role's prompt template from `path` and substitute placeholders.
pub fn render_system_prompt(path: &Path, session_id: &str, member_id: Option<&str>) -> std::io::Result<String> {
    let template = std::fs::read_to_string(path)?;
    Ok(substitute(&template, session_id, member_id.unwrap_or("")))
}

/// Path a role's template is expected to live at, given the configured
/// template directory. Files are named `<role>.md`.
pub fn template_path(prompt_dir: &Path, role: Role) -> std::path::PathBuf {
    prompt_dir.join(format!("{role}.md"))
}

/// One member of the roster embedded in the project-start prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterMember {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Everything needed to compose the project-start prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStartPrompt {
    pub project_name: String,
    pub project_path: String,
    pub team_name: String,
    pub members: Vec<RosterMember>,
    pub requirements: String,
}

impl ProjectStartPrompt {
    /// Render the fixed-order Markdown payload: a `## Project:` header,
    /// path, team name, member roster, then the free-text requirements
    /// block. The header order is fixed so external tooling can grep for
    /// section headers.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("## Project: {}\n\n", self.project_name));
        out.push_str(&format!("**Path:** {}\n\n", self.project_path));
        out.push_str(&format!("**Team:** {}\n\n", self.team_name));
        out.push_str("**Members:**\n\n");
        for member in &self.members {
            if member.skills.is_empty() {
                out.push_str(&format!("- {} ({})\n", member.name, member.role));
            } else {
                out.push_str(&format!("- {} ({}) — {}\n", member.name, member.role, member.skills.join(", ")));
            }
        }
        out.push('\n');
        out.push_str("**Requirements:**\n\n");
        out.push_str(&self.requirements);
        out.push('\n');
        out
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
