//! Session workspace: the local directory that owns every file of one run.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

const SESSION_PREFIX: &str = "Temp_";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex is valid"))
}

/// Folder name for a session: `Temp_<id>` with filesystem-unsafe characters replaced.
pub fn normalize_session_id(session_id: &str) -> String {
    let prefixed = if session_id.starts_with(SESSION_PREFIX) {
        session_id.to_string()
    } else {
        format!("{SESSION_PREFIX}{session_id}")
    };
    unsafe_chars().replace_all(&prefixed, "_").into_owned()
}

/// Reduce a requested file name to its final path component, so downloads stay inside the workspace.
pub fn sanitize_file_name(file_name: &str) -> Option<String> {
    let name = file_name.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SessionWorkspace {
    session_id: String,
    root: PathBuf,
}

impl SessionWorkspace {
    pub fn new(base_dir: impl AsRef<Path>, session_id: &str) -> Self {
        let root = base_dir.as_ref().join(normalize_session_id(session_id));
        Self {
            session_id: session_id.to_string(),
            root,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Create the directory tree; succeeds when it already exists.
    pub fn ensure(&self) -> Result<(), WorkspaceError> {
        std::fs::create_dir_all(&self.root).map_err(|source| WorkspaceError::Create {
            path: self.root.clone(),
            source,
        })?;
        debug!(path = %self.root.display(), "Session workspace ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_session_ids_once() {
        assert_eq!(normalize_session_id("abc123"), "Temp_abc123");
        assert_eq!(normalize_session_id("Temp_abc123"), "Temp_abc123");
    }

    #[test]
    fn replaces_path_separators_in_session_ids() {
        assert_eq!(normalize_session_id("../etc/x y"), "Temp_.._etc_x_y");
    }

    #[test]
    fn file_names_keep_only_the_last_component() {
        assert_eq!(sanitize_file_name("inventory.xlsx").as_deref(), Some("inventory.xlsx"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("dir\\gap.xlsx").as_deref(), Some("gap.xlsx"));
        assert_eq!(sanitize_file_name("reports/"), None);
        assert_eq!(sanitize_file_name(".."), None);
    }

    #[test]
    fn ensure_is_idempotent() {
        let base = tempfile::tempdir().unwrap();
        let ws = SessionWorkspace::new(base.path(), "s1");
        ws.ensure().unwrap();
        ws.ensure().unwrap();
        assert!(base.path().join("Temp_s1").is_dir());
        assert_eq!(ws.path_for("a.xlsx"), base.path().join("Temp_s1").join("a.xlsx"));
    }
}
