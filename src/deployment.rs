//! Deployment metadata attached to process-startup alarms

use serde::{Deserialize, Serialize};

/// Commit messages are collapsed to one line and capped at this many chars
const COMMIT_MESSAGE_CAP: usize = 32;

/// Deployment info embedded in a process-startup alarm payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentInfo {
    #[serde(default)]
    pub process: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildInfo>,
}

impl DeploymentInfo {
    pub fn has_build_info(&self) -> bool {
        self.build
            .as_ref()
            .map(|b| !b.time.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitInfo>,
}

impl BuildInfo {
    pub fn has_git(&self) -> bool {
        self.git
            .as_ref()
            .map(|g| !g.branch.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitInfo {
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub commit: String,
    #[serde(default)]
    pub message: String,
}

impl GitInfo {
    /// Commit message trimmed for notification text: first non-empty line
    /// only, capped at 32 chars with an ellipsis.
    pub fn trimmed_message(&self) -> String {
        let line = self
            .message
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");

        let mut out: String = line.chars().take(COMMIT_MESSAGE_CAP).collect();
        if line.chars().count() > COMMIT_MESSAGE_CAP {
            out.push('…');
        }
        out
    }
}
