//! Path catalog: the ordered precedence levels probed for a plugin asset.
//!
//! Levels, most specific first:
//!
//! 1. `<project meta>/agents/<profile>/plugins/<plugin>`
//! 2. `<project meta>/plugins/<plugin>`
//! 3. `<user>/agents/<profile>/plugins/<plugin>`, then
//!    `{<user>,<root>}/plugins/*/agents/<profile>/plugins/<plugin>`, then
//!    `<root>/agents/<profile>/plugins/<plugin>`
//! 4. `<user>/plugins/<plugin>`
//! 5. `<root>/plugins/<plugin>`
//!
//! Scoped levels are only present when the scope was requested and the
//! plugin allows overrides for it. A wildcard scope turns its levels into
//! glob patterns; the concrete scope of each hit is read back from the
//! matched path.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use super::info_parser::PluginMeta;
use super::layout::{AGENTS_DIR, Layout, PLUGINS_DIR, PROJECT_META_DIR};

/// Wire value meaning "any scope".
pub const SCOPE_WILDCARD: &str = "*";

/// Filter on one scope axis (project or agent profile).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFilter {
    /// Not requested: levels for this axis are skipped.
    #[default]
    Unset,
    /// A concrete project or profile.
    Named(String),
    /// Every value on disk; inferred per match.
    Any,
}

impl ScopeFilter {
    /// `""` is unset, `"*"` is any, anything else is a name.
    pub fn parse(value: &str) -> Self {
        match value {
            "" => ScopeFilter::Unset,
            SCOPE_WILDCARD => ScopeFilter::Any,
            name => ScopeFilter::Named(name.to_string()),
        }
    }

    pub fn from_option(value: Option<&str>) -> Self {
        value.map(Self::parse).unwrap_or_default()
    }

    pub fn is_requested(&self) -> bool {
        !matches!(self, ScopeFilter::Unset)
    }

    fn segment(&self) -> Option<Segment> {
        match self {
            ScopeFilter::Unset => None,
            ScopeFilter::Named(name) => Some(Segment::Literal(name.clone())),
            ScopeFilter::Any => Some(Segment::Wildcard),
        }
    }
}

impl std::fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeFilter::Unset => Ok(()),
            ScopeFilter::Named(name) => f.write_str(name),
            ScopeFilter::Any => f.write_str(SCOPE_WILDCARD),
        }
    }
}

/// A concrete (project, profile) pair, as carried by an agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope {
    pub project: Option<String>,
    pub profile: Option<String>,
}

impl Scope {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn new(project: Option<&str>, profile: Option<&str>) -> Self {
        let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            project: non_empty(project),
            profile: non_empty(profile),
        }
    }

    pub fn project_filter(&self) -> ScopeFilter {
        self.project
            .as_deref()
            .map(|p| ScopeFilter::Named(p.to_string()))
            .unwrap_or_default()
    }

    pub fn profile_filter(&self) -> ScopeFilter {
        self.profile
            .as_deref()
            .map(|p| ScopeFilter::Named(p.to_string()))
            .unwrap_or_default()
    }
}

/// Which precedence level a candidate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    ProjectProfile,
    Project,
    UserProfile,
    PluginProfile,
    BuiltinProfile,
    User,
    Builtin,
}

impl LevelKind {
    pub fn has_project(self) -> bool {
        matches!(self, LevelKind::ProjectProfile | LevelKind::Project)
    }

    pub fn has_profile(self) -> bool {
        matches!(
            self,
            LevelKind::ProjectProfile
                | LevelKind::UserProfile
                | LevelKind::PluginProfile
                | LevelKind::BuiltinProfile
        )
    }

    /// Project- or profile-specific level.
    pub fn is_scoped(self) -> bool {
        self.has_project() || self.has_profile()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Dir(PathBuf),
    Pattern(String),
}

/// One precedence level: a directory, or a glob over directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLevel {
    pub kind: LevelKind,
    target: Target,
}

/// A concrete path found at a level, with its inferred scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelHit {
    pub path: PathBuf,
    pub project: Option<String>,
    pub profile: Option<String>,
}

impl CatalogLevel {
    fn new(kind: LevelKind, base: &Path, segments: Vec<Segment>) -> Self {
        let target = if segments.iter().any(|s| *s == Segment::Wildcard) {
            let mut pattern = glob::Pattern::escape(&base.to_string_lossy());
            for segment in &segments {
                pattern.push('/');
                match segment {
                    Segment::Literal(s) => pattern.push_str(&glob::Pattern::escape(s)),
                    Segment::Wildcard => pattern.push('*'),
                }
            }
            Target::Pattern(pattern)
        } else {
            let mut dir = base.to_path_buf();
            for segment in &segments {
                if let Segment::Literal(s) = segment {
                    dir.push(s);
                }
            }
            Target::Dir(dir)
        };
        Self { kind, target }
    }

    /// Whether this level enumerates many directories.
    pub fn is_pattern(&self) -> bool {
        matches!(self.target, Target::Pattern(_))
    }

    /// Existing paths for `subpath` at this level, sorted.
    pub fn probe(&self, layout: &Layout, subpath: &Path) -> Vec<LevelHit> {
        let mut paths = match &self.target {
            Target::Dir(dir) => {
                let candidate = join_subpath(dir, subpath);
                if candidate.exists() {
                    vec![candidate]
                } else {
                    Vec::new()
                }
            }
            Target::Pattern(pattern) => glob_paths(pattern, subpath),
        };
        paths.sort();

        let depth = subpath.components().count();
        paths
            .into_iter()
            .map(|path| {
                let dir = path.ancestors().nth(depth).unwrap_or(&path);
                let (project, profile) = infer_scope(layout, dir);
                LevelHit {
                    project: if self.kind.has_project() { project } else { None },
                    profile: if self.kind.has_profile() { profile } else { None },
                    path,
                }
            })
            .collect()
    }
}

fn join_subpath(dir: &Path, subpath: &Path) -> PathBuf {
    if subpath.as_os_str().is_empty() {
        dir.to_path_buf()
    } else {
        dir.join(subpath)
    }
}

fn glob_paths(pattern: &str, subpath: &Path) -> Vec<PathBuf> {
    let mut full = pattern.to_string();
    for component in subpath.components() {
        if let Component::Normal(part) = component {
            full.push('/');
            full.push_str(&glob::Pattern::escape(&part.to_string_lossy()));
        }
    }

    match glob::glob(&full) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(e) => {
            warn!(pattern = %full, error = %e, "invalid catalog pattern");
            Vec::new()
        }
    }
}

/// Read the project and profile names back out of a matched directory.
///
/// The project is the segment right after `<user>/projects/`; the profile is
/// the segment after the last `agents` component above the trailing
/// `plugins/<plugin>`. Matching is done on path
/// components relative to the layout so that a root living under some other
/// `projects` or `agents` folder does not confuse the inference.
pub fn infer_scope(layout: &Layout, dir: &Path) -> (Option<String>, Option<String>) {
    let projects_dir = layout.projects_dir();
    let project = dir
        .strip_prefix(&projects_dir)
        .ok()
        .and_then(|rest| rest.components().next())
        .and_then(component_str);

    let relative = dir
        .strip_prefix(&projects_dir)
        .or_else(|_| dir.strip_prefix(layout.user_dir()))
        .or_else(|_| dir.strip_prefix(layout.root()))
        .unwrap_or(dir);
    let mut components: Vec<_> = relative.components().collect();
    if components.len() >= 2 && components[components.len() - 2].as_os_str() == PLUGINS_DIR {
        components.truncate(components.len() - 2);
    }
    let profile = components
        .iter()
        .rposition(|c| c.as_os_str() == AGENTS_DIR)
        .and_then(|idx| components.get(idx + 1))
        .and_then(|c| component_str(*c));

    (project, profile)
}

fn component_str(component: Component<'_>) -> Option<String> {
    match component {
        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
        _ => None,
    }
}

/// Ordered, deduplicated precedence levels for one plugin and scope filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCatalog {
    levels: Vec<CatalogLevel>,
}

impl PathCatalog {
    /// Build the catalog for `plugin` under the given filters.
    pub fn build(
        layout: &Layout,
        plugin: &str,
        meta: &PluginMeta,
        project: &ScopeFilter,
        profile: &ScopeFilter,
    ) -> Self {
        let lit = |s: &str| Segment::Literal(s.to_string());
        let plugin_tail = || vec![lit(PLUGINS_DIR), lit(plugin)];
        let project_seg = project.segment().filter(|_| meta.per_project_config);
        let profile_seg = profile.segment().filter(|_| meta.per_agent_config);
        let projects_dir = layout.projects_dir();

        let mut levels = Vec::new();

        if let (Some(project_seg), Some(profile_seg)) = (&project_seg, &profile_seg) {
            let mut segments = vec![project_seg.clone(), lit(PROJECT_META_DIR), lit(AGENTS_DIR)];
            segments.push(profile_seg.clone());
            segments.extend(plugin_tail());
            levels.push(CatalogLevel::new(LevelKind::ProjectProfile, &projects_dir, segments));
        }

        if let Some(project_seg) = &project_seg {
            let mut segments = vec![project_seg.clone(), lit(PROJECT_META_DIR)];
            segments.extend(plugin_tail());
            levels.push(CatalogLevel::new(LevelKind::Project, &projects_dir, segments));
        }

        if let Some(profile_seg) = &profile_seg {
            let profile_dirs = |base: &Path, kind: LevelKind, prefix: Vec<Segment>| {
                let mut segments = prefix;
                segments.push(lit(AGENTS_DIR));
                segments.push(profile_seg.clone());
                segments.extend(plugin_tail());
                CatalogLevel::new(kind, base, segments)
            };

            levels.push(profile_dirs(layout.user_dir(), LevelKind::UserProfile, Vec::new()));
            for plugins_base in [layout.user_dir(), layout.root()] {
                levels.push(profile_dirs(
                    plugins_base,
                    LevelKind::PluginProfile,
                    vec![lit(PLUGINS_DIR), Segment::Wildcard],
                ));
            }
            levels.push(profile_dirs(layout.root(), LevelKind::BuiltinProfile, Vec::new()));
        }

        levels.push(CatalogLevel::new(LevelKind::User, layout.user_dir(), plugin_tail()));
        levels.push(CatalogLevel::new(LevelKind::Builtin, layout.root(), plugin_tail()));

        let mut deduped: Vec<CatalogLevel> = Vec::with_capacity(levels.len());
        for level in levels {
            if !deduped.iter().any(|l| l.target == level.target) {
                deduped.push(level);
            }
        }

        Self { levels: deduped }
    }

    pub fn levels(&self) -> &[CatalogLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
