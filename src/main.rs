use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use relkit::config;
use relkit::db;
use relkit::docs::{self, DocsLayout, UploadArgs};
use relkit::env::CiEnv;
use relkit::git::Git2Repository;
use relkit::process::SystemRunner;
use relkit::release::{self, ReleaseArgs, ReleaseOutcome};
use relkit::session::{self, Extras, GitInstall};
use relkit::ui::{self, AssumeYes, Prompt, TerminalPrompt};
use relkit::{changes, logging};

#[derive(Parser)]
#[command(
    name = "relkit",
    version,
    about = "CI helpers for releasing packages, uploading docs and bootstrapping test environments"
)]
struct Cli {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(long, global = true, help = "Print external commands instead of running them")]
    dry_run: bool,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tag, push and publish a release.
    ///
    /// Assumes you manually prepared the release commit! Please edit the
    /// version number in your package and prepare the release notes.
    Release {
        #[arg(long, help = "Publish to PyPI")]
        pypi: bool,

        #[arg(long, help = "Link to changelog entry")]
        changelog: Option<String>,

        #[arg(
            long,
            help = "Do not create a release. Used when you already created a release to get the changelog."
        )]
        no_release: bool,

        #[arg(short, long, help = "Skip the confirmation prompt")]
        yes: bool,
    },

    /// Write latest changes
    DocChanges,

    /// Zip the docs and upload the archive
    UploadDocs {
        #[arg(long, default_value = "./docs", help = "Docs source directory")]
        dir: PathBuf,

        #[arg(long, help = "Upload even though this is not a push event")]
        in_pr: bool,
    },

    /// Move built HTML below the project slug
    MoveDocs {
        #[arg(long, help = "Place the docs at _build/html/docs/<slug>")]
        under_docs: bool,
    },

    /// Run pytest with coverage
    Test {
        #[arg(long, help = "Skip writing coverage.xml")]
        no_coverage: bool,
    },

    /// Run pre-commit on all files
    Lint,

    /// Build the docs with lndocs
    BuildDocs {
        #[arg(long)]
        strict: bool,

        #[arg(long)]
        strip_prefix: bool,
    },

    /// Clone a package from git and install it
    InstallGit {
        #[arg(long, default_value = "release")]
        branch: String,

        #[arg(long, help = "Extras, comma separated")]
        extras: Option<String>,

        #[arg(long, default_value = "lamindb")]
        target_dir: String,
    },

    /// Log in a test user
    Login { email: String },

    /// Start a disposable postgres container
    SetupPostgres {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        pg_version: Option<String>,
    },

    /// Initialize a test instance from the base branch
    SetupTestInstance {
        #[arg(long)]
        schema: Option<String>,
    },

    /// Copy the last rows of every table from one database into another
    CloneDb {
        source: String,
        target: String,

        #[arg(long, default_value_t = 10_000)]
        n_rows: u64,
    },

    /// Execute notebooks in place
    RunNotebooks { path: PathBuf },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logger(cli.verbose) {
        eprintln!("{}", e);
    }

    if let Err(e) = run(cli) {
        ui::display_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref()).context("Error loading config")?;
    let runner = if cli.dry_run {
        SystemRunner::dry_run()
    } else {
        SystemRunner::new()
    };
    let ci_env = CiEnv::from_env();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Command::Release {
            pypi,
            changelog,
            no_release,
            yes,
        } => {
            let repo = Git2Repository::open(&cwd).context("Not in a git repository")?;
            let prompt: Box<dyn Prompt> = if yes {
                Box::new(AssumeYes)
            } else {
                Box::new(TerminalPrompt)
            };
            let args = ReleaseArgs {
                pypi,
                changelog,
                no_release,
            };
            match release::release(&repo, &runner, prompt.as_ref(), &ci_env, &config, &args)? {
                ReleaseOutcome::Cancelled => tracing::debug!("release cancelled"),
                ReleaseOutcome::Released { version, .. } => {
                    ui::display_success(&format!("Release {} done", version))
                }
            }
        }
        Command::DocChanges => {
            let repo = Git2Repository::open(&cwd).context("Not in a git repository")?;
            changes::doc_changes(&repo, Path::new(&config.docs.changelog_file))?;
        }
        Command::UploadDocs { dir, in_pr } => {
            let args = UploadArgs {
                docs_dir: dir,
                in_pr,
            };
            docs::upload_docs_artifact(&runner, &ci_env, &config.docs, &cwd, &args)?;
        }
        Command::MoveDocs { under_docs } => {
            let layout = if under_docs {
                DocsLayout::DocsSlug
            } else {
                DocsLayout::Slug
            };
            docs::move_built_docs(&ci_env, &config.docs, &cwd, layout)?;
        }
        Command::Test { no_coverage } => {
            session::run_pytest(&runner, &cwd, !no_coverage, &HashMap::new())?;
        }
        Command::Lint => session::run_pre_commit(&runner, &ci_env, &cwd)?,
        Command::BuildDocs {
            strict,
            strip_prefix,
        } => session::build_docs(&runner, &ci_env, &cwd, strict, strip_prefix)?,
        Command::InstallGit {
            branch,
            extras,
            target_dir,
        } => {
            let install = GitInstall {
                branch,
                extras: Extras::parse(extras.as_deref()),
                target_dir,
            };
            session::install_from_git(&runner, &ci_env, &config.session, &cwd, &install)?;
        }
        Command::Login { email } => session::login_test_user(&runner, &config, &email)?,
        Command::SetupPostgres { name, pg_version } => {
            let url = db::setup_local_test_postgres(
                &runner,
                &config.postgres,
                name.as_deref(),
                pg_version.as_deref(),
            )?;
            println!("{}", url);
        }
        Command::SetupTestInstance { schema } => {
            session::setup_test_instance(&runner, &ci_env, &config, &cwd, schema.as_deref())?;
        }
        Command::CloneDb {
            source,
            target,
            n_rows,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let report = runtime.block_on(db::clone_db(&source, &target, n_rows))?;
            ui::display_success(&format!(
                "Cloned {} rows across {} tables into {}",
                report.rows_copied(),
                report.tables.len(),
                target
            ));
        }
        Command::RunNotebooks { path } => {
            session::run_notebooks(&runner, &path)?;
        }
    }

    Ok(())
}
