use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Represents the complete configuration for relkit.
///
/// Every section has defaults matching the organization's CI layout, so an
/// empty or missing file is a valid configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub release: ReleaseConfig,

    #[serde(default)]
    pub docs: DocsConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub test_users: TestUsersConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,
}

fn default_organization() -> String {
    "laminlabs".to_string()
}

fn default_changelog() -> String {
    "https://docs.lamin.ai/changelog".to_string()
}

fn default_require_changelog() -> Vec<String> {
    vec!["lamindb".to_string()]
}

fn default_publish_command() -> Vec<String> {
    vec!["flit".to_string(), "publish".to_string()]
}

/// Settings for the `release` subcommand.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReleaseConfig {
    /// GitHub owner the release repositories live under.
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Changelog link used when `--changelog` is not given.
    #[serde(default = "default_changelog")]
    pub default_changelog: String,

    /// Packages that must be released with an explicit `--changelog`.
    #[serde(default = "default_require_changelog")]
    pub require_changelog: Vec<String>,

    /// Program and arguments that publish to the package index.
    #[serde(default = "default_publish_command")]
    pub publish_command: Vec<String>,

    /// Public mirror released alongside an application repository.
    #[serde(default)]
    pub companion: Option<CompanionConfig>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            organization: default_organization(),
            default_changelog: default_changelog(),
            require_changelog: default_require_changelog(),
            publish_command: default_publish_command(),
            companion: None,
        }
    }
}

fn default_readme() -> String {
    "README.md".to_string()
}

/// A sibling repository that gets a README version bump and its own release.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CompanionConfig {
    /// Application repository (working directory name) this companion belongs to.
    pub for_repo: String,
    /// Directory name of the companion, cloned next to the application.
    pub repo: String,
    #[serde(default = "default_readme")]
    pub readme: String,
}

fn default_bucket() -> String {
    "s3://lamin-site-assets/docs".to_string()
}

fn default_extensions() -> Vec<String> {
    ["md", "ipynb", "png", "jpg", "svg", "py", "R"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_changelog_file() -> String {
    "docs/changelog.md".to_string()
}

fn default_project_file() -> String {
    "lamin-project.yaml".to_string()
}

/// Settings for docs packaging and upload.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DocsConfig {
    /// Object storage prefix docs archives are copied to.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// File suffixes (without the dot) included in the docs archive.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_changelog_file")]
    pub changelog_file: String,

    /// YAML file carrying `project_slug` and `schema_handle`.
    #[serde(default = "default_project_file")]
    pub project_file: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        DocsConfig {
            bucket: default_bucket(),
            extensions: default_extensions(),
            changelog_file: default_changelog_file(),
            project_file: default_project_file(),
        }
    }
}

fn default_git_install_url() -> String {
    "https://github.com/laminlabs/lamindb".to_string()
}

fn default_submodules() -> Vec<String> {
    ["sub/lamindb-setup", "sub/lamin-cli", "sub/bionty", "sub/wetlab"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_login_command() -> Vec<String> {
    vec!["lamin".to_string(), "login".to_string()]
}

fn default_api_key_env() -> String {
    "LAMIN_API_KEY".to_string()
}

fn default_init_command() -> Vec<String> {
    vec!["lamin".to_string(), "init".to_string()]
}

/// Settings for test-environment bootstrapping.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Repository cloned by `install-git`.
    #[serde(default = "default_git_install_url")]
    pub git_install_url: String,

    /// Submodule paths installed without dependencies on non-release branches.
    #[serde(default = "default_submodules")]
    pub submodules: Vec<String>,

    #[serde(default = "default_login_command")]
    pub login_command: Vec<String>,

    /// Environment variable the login command reads the API key from.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_init_command")]
    pub init_command: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            git_install_url: default_git_install_url(),
            submodules: default_submodules(),
            login_command: default_login_command(),
            api_key_env: default_api_key_env(),
            init_command: default_init_command(),
        }
    }
}

fn default_secret_id() -> String {
    "arn:aws:secretsmanager:us-east-1:586130067823:secret:laminlabs-internal-sZj1MU".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_user_keys() -> BTreeMap<String, String> {
    let mut keys = BTreeMap::new();
    keys.insert(
        "testuser1@lamin.ai".to_string(),
        "LAMIN_TESTUSER1_API_KEY".to_string(),
    );
    keys.insert(
        "testuser2@lamin.ai".to_string(),
        "LAMIN_TESTUSER2_API_KEY".to_string(),
    );
    keys
}

/// Where test user API keys are stored.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TestUsersConfig {
    #[serde(default = "default_secret_id")]
    pub secret_id: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Maps a user email to the key of its API key inside the secret.
    #[serde(default = "default_user_keys")]
    pub keys: BTreeMap<String, String>,
}

impl Default for TestUsersConfig {
    fn default() -> Self {
        TestUsersConfig {
            secret_id: default_secret_id(),
            region: default_region(),
            keys: default_user_keys(),
        }
    }
}

fn default_container_name() -> String {
    "pgtest".to_string()
}

fn default_image() -> String {
    "postgres".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PostgresConfig {
    #[serde(default = "default_container_name")]
    pub name: String,

    #[serde(default = "default_image")]
    pub image: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        PostgresConfig {
            name: default_container_name(),
            image: default_image(),
        }
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `relkit.toml` in current directory
/// 3. `.relkit.toml` in the user config directory
/// 4. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path)?
    } else if Path::new("./relkit.toml").exists() {
        fs::read_to_string("./relkit.toml")?
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join(".relkit.toml");
        if config_path.exists() {
            fs::read_to_string(config_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    let config: Config = toml::from_str(&config_str)?;
    Ok(config)
}
