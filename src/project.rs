//! Project metadata: what is being released and at which version.
//!
//! A directory with a `pyproject.toml` is a Python package; anything else is
//! treated as an application whose version lives in `package.json`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{CiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    PythonPackage,
    Application,
}

/// A releasable project rooted at a directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub kind: ProjectKind,
    /// Distribution name (`lamin_utils`) or application directory name.
    pub name: String,
    /// GitHub repository name, `_` replaced by `-`.
    pub repo_name: String,
    /// Version string as written in the project files.
    pub version: String,
    pub root: PathBuf,
}

impl Project {
    /// Import name of a Python package, `-` replaced by `_`.
    pub fn module_name(&self) -> String {
        self.name.replace('-', "_")
    }
}

/// The parts of `lamin-project.yaml` relkit reads.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProjectFile {
    #[serde(default)]
    pub project_slug: Option<String>,
    #[serde(default)]
    pub schema_handle: Option<String>,
}

pub fn load_project_file(path: &Path) -> Result<ProjectFile> {
    let content = fs::read_to_string(path).map_err(|e| {
        CiError::config(format!("Cannot read project file {}: {}", path.display(), e))
    })?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Last component of a path, used as the repository name.
pub fn dir_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| CiError::config(format!("Cannot name directory {}", path.display())))
}

fn version_assignment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^__version__\s*=\s*["']([^"']+)["']"#)
            .expect("version assignment pattern is valid")
    })
}

/// Reads the package name from `[project].name`, then `[tool.flit.module].name`.
fn python_package_name(pyproject: &toml::Value) -> Option<String> {
    pyproject
        .get("project")
        .and_then(|p| p.get("name"))
        .or_else(|| {
            pyproject
                .get("tool")
                .and_then(|t| t.get("flit"))
                .and_then(|f| f.get("module"))
                .and_then(|m| m.get("name"))
        })
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Reads `__version__` from the package's `__init__.py`.
fn module_version(root: &Path, module: &str) -> Result<Option<String>> {
    for candidate in [
        root.join(module).join("__init__.py"),
        root.join("src").join(module).join("__init__.py"),
    ] {
        if candidate.is_file() {
            let source = fs::read_to_string(&candidate)?;
            if let Some(captures) = version_assignment().captures(&source) {
                return Ok(Some(captures[1].to_string()));
            }
        }
    }
    Ok(None)
}

fn application_version(root: &Path) -> Result<String> {
    for candidate in [root.join("package.json"), root.join("ui").join("package.json")] {
        if candidate.is_file() {
            let manifest: serde_json::Value = serde_json::from_str(&fs::read_to_string(&candidate)?)?;
            return manifest
                .get("version")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    CiError::config(format!("No version field in {}", candidate.display()))
                });
        }
    }
    Err(CiError::config(format!(
        "No pyproject.toml, package.json or ui/package.json in {}",
        root.display()
    )))
}

/// Works out the project living in `root`.
pub fn detect_project(root: &Path) -> Result<Project> {
    let pyproject_path = root.join("pyproject.toml");
    if pyproject_path.is_file() {
        let pyproject: toml::Value = toml::from_str(&fs::read_to_string(&pyproject_path)?)?;
        let name = python_package_name(&pyproject).ok_or_else(|| {
            CiError::config("pyproject.toml has neither [project].name nor [tool.flit.module].name")
        })?;
        let module = name.replace('-', "_");

        let version = match module_version(root, &module)? {
            Some(version) => version,
            None => pyproject
                .get("project")
                .and_then(|p| p.get("version"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    CiError::config(format!(
                        "Cannot find __version__ in {}/__init__.py or [project].version",
                        module
                    ))
                })?,
        };

        return Ok(Project {
            kind: ProjectKind::PythonPackage,
            repo_name: name.replace('_', "-"),
            name,
            version,
            root: root.to_path_buf(),
        });
    }

    let name = dir_name(root)?;
    Ok(Project {
        kind: ProjectKind::Application,
        repo_name: name.clone(),
        name,
        version: application_version(root)?,
        root: root.to_path_buf(),
    })
}
