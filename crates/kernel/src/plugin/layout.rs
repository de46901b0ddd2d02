//! Directory conventions for plugins, agent profiles, projects and extensions.
//!
//! ```text
//! <root>/plugins/<plugin>/                      built-in plugins
//! <root>/agents/<profile>/                      built-in agent profiles
//! <root>/extensions/<point>/                    built-in extensions
//! <user>/plugins/<plugin>/                      user plugins
//! <user>/agents/<profile>/                      user agent profiles
//! <user>/extensions/<point>/                    user extensions
//! <user>/projects/<project>/.plexus/            project meta folder
//! ```

use std::path::{Path, PathBuf};

/// Directory holding plugins under any base.
pub const PLUGINS_DIR: &str = "plugins";
/// Directory holding agent profiles under any base.
pub const AGENTS_DIR: &str = "agents";
/// Directory holding extension trees under any base.
pub const EXTENSIONS_DIR: &str = "extensions";
/// Directory holding projects under the user dir.
pub const PROJECTS_DIR: &str = "projects";
/// Per-project metadata folder.
pub const PROJECT_META_DIR: &str = ".plexus";
/// Default user directory name under the root.
pub const USER_DIR: &str = "usr";

/// Plugin metadata file.
pub const META_FILE_NAME: &str = "plugin.yaml";
/// Scoped config override file.
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Config shipped with the plugin.
pub const CONFIG_DEFAULT_FILE_NAME: &str = "default_config.yaml";
/// Marker: plugin enabled at this level.
pub const TOGGLE_ENABLED_FILE_NAME: &str = ".toggle-1";
/// Marker: plugin disabled at this level.
pub const TOGGLE_DISABLED_FILE_NAME: &str = ".toggle-0";

/// Resolved directory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    user_dir: PathBuf,
}

impl Layout {
    /// Layout with the user directory at `<root>/usr`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let user_dir = root.join(USER_DIR);
        Self { root, user_dir }
    }

    /// Layout with an explicit user directory.
    pub fn with_user_dir(root: impl Into<PathBuf>, user_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            user_dir: user_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    /// Plugin roots in priority order (user first).
    pub fn plugin_roots(&self) -> [PathBuf; 2] {
        [self.user_plugins_dir(), self.builtin_plugins_dir()]
    }

    pub fn builtin_plugins_dir(&self) -> PathBuf {
        self.root.join(PLUGINS_DIR)
    }

    pub fn user_plugins_dir(&self) -> PathBuf {
        self.user_dir.join(PLUGINS_DIR)
    }

    pub fn builtin_agents_dir(&self) -> PathBuf {
        self.root.join(AGENTS_DIR)
    }

    pub fn user_agents_dir(&self) -> PathBuf {
        self.user_dir.join(AGENTS_DIR)
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.user_dir.join(PROJECTS_DIR)
    }

    /// `<user>/projects/<project>/.plexus`
    pub fn project_meta_dir(&self, project: &str) -> PathBuf {
        self.projects_dir().join(project).join(PROJECT_META_DIR)
    }

    /// `<user>/kvp`
    pub fn kvp_dir(&self) -> PathBuf {
        self.user_dir.join("kvp")
    }

    /// Directory a scoped write for `plugin` lands in.
    ///
    /// Base is the user dir or the project meta folder, narrowed by
    /// `agents/<profile>` when a profile is given.
    pub fn plugin_save_dir(&self, plugin: &str, project: &str, profile: &str) -> PathBuf {
        let mut base = if project.is_empty() {
            self.user_dir.clone()
        } else {
            self.project_meta_dir(project)
        };
        if !profile.is_empty() {
            base = base.join(AGENTS_DIR).join(profile);
        }
        base.join(PLUGINS_DIR).join(plugin)
    }

    /// Existing agent-owned directories for `subpath`, most specific first.
    ///
    /// Order: project + profile, project, user profile, built-in profile,
    /// user dir, root.
    pub fn agent_paths(&self, project: Option<&str>, profile: Option<&str>, subpath: &Path) -> Vec<PathBuf> {
        let mut bases = Vec::new();
        if let Some(project) = project {
            let meta = self.project_meta_dir(project);
            if let Some(profile) = profile {
                bases.push(meta.join(AGENTS_DIR).join(profile));
            }
            bases.push(meta);
        }
        if let Some(profile) = profile {
            bases.push(self.user_agents_dir().join(profile));
            bases.push(self.builtin_agents_dir().join(profile));
        }
        bases.push(self.user_dir.clone());
        bases.push(self.root.clone());

        let mut paths: Vec<PathBuf> = Vec::with_capacity(bases.len());
        for base in bases {
            let candidate = base.join(subpath);
            if candidate.is_dir() && !paths.contains(&candidate) {
                paths.push(candidate);
            }
        }
        paths
    }
}
