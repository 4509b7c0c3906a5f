//! Build configuration. Settings come from the command line, then from an
//! optional `microblog.yaml` project file, then from defaults.

use crate::registry::RegistryOptions;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The project file looked up from the working directory upwards.
pub const PROJECT_FILE: &str = "microblog.yaml";

/// Command-line arguments for the `microblog-gen` binary.
#[derive(Debug, Default, Parser)]
#[command(
    name = "microblog-gen",
    version,
    about = "Renders a directory of markdown posts into a single HTML page"
)]
pub struct CliArgs {
    /// Path to a project file. Defaults to the nearest `microblog.yaml`.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Source directory with the page template and other assets [default: ./src].
    #[arg(short = 'i', long = "source", value_name = "DIR")]
    pub source_directory: Option<PathBuf>,

    /// Directory that contains blog posts as markdown files [default: ./blog].
    #[arg(short = 'b', long = "blog", value_name = "DIR")]
    pub blog_directory: Option<PathBuf>,

    /// Output directory for generated files [default: ./build].
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output_directory: Option<PathBuf>,

    /// Overwrite output directory contents.
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Path to an HTML template for generated blog posts.
    #[arg(short = 't', long = "template", value_name = "PATH")]
    pub post_template: Option<PathBuf>,

    /// Render posts concurrently.
    #[arg(long = "concurrent")]
    pub concurrent: bool,

    /// Date every post with today's date instead of its recorded publication date.
    #[arg(long = "no-tracking")]
    pub no_tracking: bool,

    /// Base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long = "log-json")]
    pub log_json: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: String::from("info"),
            format: LogFormat::default(),
        }
    }
}

/// The contents of a project file. Relative paths are relative to the
/// file's directory.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Project {
    source_directory: Option<PathBuf>,
    blog_directory: Option<PathBuf>,
    output_directory: Option<PathBuf>,
    post_template: Option<PathBuf>,
    tracking: Option<bool>,
    concurrent: Option<bool>,
    registry: RegistryOptions,
    logging: LoggingSettings,
}

/// Fully resolved build settings.
#[derive(Clone, Debug)]
pub struct Config {
    pub source_directory: PathBuf,
    pub blog_directory: PathBuf,
    pub output_directory: PathBuf,
    pub force: bool,
    pub post_template: Option<PathBuf>,
    pub tracking: bool,
    pub concurrent: bool,
    pub registry: RegistryOptions,
    pub logging: LoggingSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_directory: PathBuf::from("./src"),
            blog_directory: PathBuf::from("./blog"),
            output_directory: PathBuf::from("./build"),
            force: false,
            post_template: None,
            tracking: true,
            concurrent: false,
            registry: RegistryOptions::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Config {
    /// Resolves the configuration for `cli`, reading the project file given
    /// with `--config` or else the nearest one above the working directory.
    pub fn load(cli: &CliArgs) -> Result<Config> {
        let project_file = match &cli.config {
            Some(path) => Some(path.clone()),
            None => find_project_file(&std::env::current_dir()?),
        };
        let project = match &project_file {
            Some(path) => Some((load_project(path)?, project_root(path))),
            None => None,
        };
        Ok(Config::resolve(cli, project))
    }

    fn resolve(cli: &CliArgs, project: Option<(Project, PathBuf)>) -> Config {
        let mut config = Config::default();

        if let Some((project, root)) = project {
            let rooted = |path: Option<PathBuf>| path.map(|path| root.join(path));
            if let Some(dir) = rooted(project.source_directory) {
                config.source_directory = dir;
            }
            if let Some(dir) = rooted(project.blog_directory) {
                config.blog_directory = dir;
            }
            if let Some(dir) = rooted(project.output_directory) {
                config.output_directory = dir;
            }
            config.post_template = rooted(project.post_template);
            config.tracking = project.tracking.unwrap_or(config.tracking);
            config.concurrent = project.concurrent.unwrap_or(config.concurrent);
            config.registry = project.registry;
            config.logging = project.logging;
        }

        if let Some(dir) = &cli.source_directory {
            config.source_directory = dir.clone();
        }
        if let Some(dir) = &cli.blog_directory {
            config.blog_directory = dir.clone();
        }
        if let Some(dir) = &cli.output_directory {
            config.output_directory = dir.clone();
        }
        if let Some(template) = &cli.post_template {
            config.post_template = Some(template.clone());
        }
        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }
        config.force |= cli.force;
        config.concurrent |= cli.concurrent;
        config.tracking &= !cli.no_tracking;
        if cli.log_json {
            config.logging.format = LogFormat::Json;
        }
        config
    }
}

/// Searches `dir` and its ancestors for a [`PROJECT_FILE`].
pub fn find_project_file(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .map(|dir| dir.join(PROJECT_FILE))
        .find(|path| path.is_file())
}

fn project_root(path: &Path) -> PathBuf {
    path.parent().map(Path::to_owned).unwrap_or_default()
}

fn load_project(path: &Path) -> Result<Project> {
    let file = File::open(path)
        .map_err(|e| anyhow!("Opening project file `{}`: {}", path.display(), e))?;
    serde_yaml::from_reader(file)
        .with_context(|| format!("Loading configuration from `{}`", path.display()))
}
