//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output site: copying the static source directory
//! into the output directory, rendering the blog collection
//! ([`crate::collection`]), and wrapping the rendered posts in the page
//! template to produce `index.html`.

use crate::collection::{self, Collection};
use crate::config::Config;
use crate::pool::RegistryPool;
use crate::post::PostOptions;
use crate::template;
use gtmpl::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

/// Files with this suffix are templates; they are read but never copied.
const TEMPLATE_SUFFIX: &str = ".tmpl";

/// The suffix of the page template in the source directory.
const PAGE_TEMPLATE_SUFFIX: &str = ".html.tmpl";

const INDEX_FILE: &str = "index.html";

/// Builds the site from a [`Config`] object and returns the path of the
/// written page.
pub async fn build_site(config: &Config) -> Result<PathBuf> {
    let source = config.source_directory.clone();
    let blog = config.blog_directory.clone();
    let output = config.output_directory.clone();
    let force = config.force;
    tokio::task::spawn_blocking(move || publish_assets(&source, &blog, &output, force))
        .await??;

    let mut options = PostOptions::default();
    if let Some(template) = &config.post_template {
        options = options.with_template_file(template);
    }
    if config.tracking {
        options = options.with_publication_tracking();
    }

    let registries = Arc::new(RegistryPool::new(config.registry.clone()));
    let blog = config.blog_directory.clone();
    let collection = tokio::task::spawn_blocking(move || {
        Collection::open(blog, &options, registries)
    })
    .await??;
    let posts = match config.concurrent {
        true => collection.render_concurrent().await?,
        false => collection.render_sequential().await?,
    };
    tracing::info!(posts = collection.posts().len(), "rendered posts");

    let source = config.source_directory.clone();
    let page_source = tokio::task::spawn_blocking(move || -> Result<String> {
        let page_template = find_page_template(&source)?;
        Ok(template::TemplateSource::File(page_template).load()?)
    })
    .await??;
    let page = template::render(
        &page_source,
        Value::String(String::from_utf8_lossy(&posts).into_owned()),
    )?;

    let index = config.output_directory.join(INDEX_FILE);
    tokio::fs::write(&index, page)
        .await
        .map_err(|err| Error::Io {
            path: index.clone(),
            err,
        })?;
    tracing::info!(path = %index.display(), "wrote page");
    Ok(index)
}

/// Replaces the contents of `dst` with the files of `src`, skipping template
/// files. A non-empty `dst` is only replaced when `force` is set, and never
/// when it holds `src` or `blog`.
fn publish_assets(src: &Path, blog: &Path, dst: &Path, force: bool) -> Result<()> {
    if !src.is_dir() {
        return Err(Error::NotADirectory {
            path: src.to_owned(),
        });
    }
    check_overlap(src, blog, dst)?;

    match std::fs::read_dir(dst) {
        Ok(mut entries) => {
            if entries.next().is_some() && !force {
                return Err(Error::OutputNotEmpty {
                    path: dst.to_owned(),
                });
            }
            rmdir(dst)?;
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(Error::Io {
                path: dst.to_owned(),
                err,
            })
        }
    }

    copy_dir(src, dst)
}

/// Fails if removing `dst` would remove `src` or `blog`, or if `dst` lies
/// inside `src` and would be copied into itself.
fn check_overlap(src: &Path, blog: &Path, dst: &Path) -> Result<()> {
    let output = resolve(dst)?;
    for input in [src, blog] {
        let input_resolved = resolve(input)?;
        if input_resolved.starts_with(&output) {
            return Err(Error::OutputOverlapsInput {
                output: dst.to_owned(),
                input: input.to_owned(),
            });
        }
    }
    if output.starts_with(resolve(src)?) {
        return Err(Error::OutputOverlapsInput {
            output: dst.to_owned(),
            input: src.to_owned(),
        });
    }
    Ok(())
}

/// Canonicalizes `path`. Components that don't exist yet are appended to
/// the canonical form of their nearest existing ancestor.
fn resolve(path: &Path) -> Result<PathBuf> {
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            match (path.parent(), path.file_name()) {
                (Some(parent), Some(name)) => {
                    let parent = match parent.as_os_str().is_empty() {
                        true => Path::new("."),
                        false => parent,
                    };
                    Ok(resolve(parent)?.join(name))
                }
                _ => Err(Error::Io {
                    path: path.to_owned(),
                    err,
                }),
            }
        }
        Err(err) => Err(Error::Io {
            path: path.to_owned(),
            err,
        }),
    }
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    let io = |path: &Path| {
        let path = path.to_owned();
        move |err| Error::Io { path, err }
    };

    std::fs::create_dir_all(dst).map_err(io(dst))?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        // strip_prefix shouldn't fail since `src` is always an ancestor of
        // the entry's path
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(io(&target))?;
        } else if !entry.file_name().to_string_lossy().ends_with(TEMPLATE_SUFFIX) {
            std::fs::copy(entry.path(), &target).map_err(io(&target))?;
        }
    }

    Ok(())
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

/// Finds the single `*.html.tmpl` file at the top of `dir`.
fn find_page_template(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|err| Error::Io {
        path: dir.to_owned(),
        err,
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| Error::Io {
                path: dir.to_owned(),
                err,
            })?
            .path();
        let is_template = path.file_name().map_or(false, |name| {
            name.to_string_lossy().ends_with(PAGE_TEMPLATE_SUFFIX)
        });
        if is_template && path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        1 => Ok(matches.remove(0)),
        found => Err(Error::PageTemplateCount {
            directory: dir.to_owned(),
            found,
        }),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the source path isn't a directory.
    #[error("'{}' is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Returned when the output directory is, contains or lies inside an
    /// input directory.
    #[error(
        "output directory '{}' overlaps input directory '{}'",
        output.display(),
        input.display()
    )]
    OutputOverlapsInput { output: PathBuf, input: PathBuf },

    /// Returned when the output directory has contents and `force` is unset.
    #[error("directory '{}' is not empty; use --force to overwrite", path.display())]
    OutputNotEmpty { path: PathBuf },

    /// Returned for I/O problems while cleaning the output directory.
    #[error("cleaning directory '{}': {err}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned unless exactly one page template exists.
    #[error(
        "expected exactly 1 template file (*{PAGE_TEMPLATE_SUFFIX}) in '{}', got {found}",
        directory.display()
    )]
    PageTemplateCount { directory: PathBuf, found: usize },

    /// Returned for errors opening or rendering the blog.
    #[error(transparent)]
    Collection(#[from] collection::Error),

    /// Returned for errors loading or executing the page template.
    #[error("page template: {0}")]
    Template(#[from] template::Error),

    /// Returned for errors walking the source directory.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    /// Returned when a blocking filesystem task panicked.
    #[error("filesystem task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Returned for other I/O errors.
    #[error("'{}': {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}
