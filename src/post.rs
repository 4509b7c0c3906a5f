//! Defines the [`Post`] and [`PostOptions`] types and the logic for rendering
//! a single post's markdown file into an HTML fragment. See
//! [`Post::write_html`] for how a post's publication date is resolved.

use crate::markdown::{self, Document};
use crate::pool::RegistryPool;
use crate::registry;
use crate::template::{self, PostFields, TemplateSource};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// The textual form of publication dates in rendered posts.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Options shared by the posts of a collection.
#[derive(Clone, Debug, Default)]
pub struct PostOptions {
    /// The template each post is rendered with.
    pub template: TemplateSource,

    /// Whether publication dates are persisted and recalled. When disabled,
    /// every render is dated today.
    pub tracking: bool,
}

impl PostOptions {
    /// Overrides the default template with an inline string.
    pub fn with_template_string(mut self, template: impl Into<String>) -> Self {
        self.template = TemplateSource::Inline(template.into());
        self
    }

    /// Overrides the default template with a template file.
    pub fn with_template_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.template = TemplateSource::File(path.into());
        self
    }

    /// Enables publication tracking: the date of a post's first render is
    /// stored and reused by every later render.
    pub fn with_publication_tracking(mut self) -> Self {
        self.tracking = true;
        self
    }
}

/// A blog post backed by a markdown file. The file is read on every render.
#[derive(Clone, Debug)]
pub struct Post {
    path: PathBuf,
    name: String,
    template: Arc<str>,
    tracking: bool,
}

impl Post {
    /// Creates a post for the markdown file at `path`. The file must exist;
    /// a template file in `options` is read here.
    pub fn new(path: impl Into<PathBuf>, options: &PostOptions) -> Result<Post> {
        let path = path.into();
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(Error::NotAFile { path }),
            Err(err) => return Err(Error::Read { path, err }),
        }

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidFileName { path: path.clone() })?
            .to_owned();

        let template = options
            .template
            .load()
            .map_err(|err| Error::Template {
                path: path.clone(),
                err,
            })?;

        Ok(Post {
            path,
            name,
            template: Arc::from(template),
            tracking: options.tracking,
        })
    }

    /// The path of the markdown file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The post's file name. It identifies the post in the publication
    /// registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The directory holding the post; its registry is keyed by it.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn tracking(&self) -> bool {
        self.tracking
    }

    /// The raw markdown contents of the post.
    pub async fn markdown(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| Error::Read {
                path: self.path.clone(),
                err,
            })
    }

    /// Extracts the heading and paragraphs from the post's markdown.
    pub async fn document(&self) -> Result<Document> {
        let markdown = self.markdown().await?;
        markdown::extract(&markdown).map_err(|err| Error::Extract {
            path: self.path.clone(),
            err,
        })
    }

    /// Resolves the date the post is shown with. Without tracking this is
    /// today. With tracking, the stored date is used; a post that has none
    /// yet is stamped with today's date, which later renders then reuse.
    pub async fn publication_date(&self, registries: &RegistryPool) -> Result<NaiveDate> {
        if !self.tracking {
            return Ok(Utc::now().date_naive());
        }

        let annotate = |err: registry::Error| Error::Registry {
            path: self.path.clone(),
            err,
        };
        let registry = registries.acquire(self.directory()).await.map_err(annotate)?;
        if let Some(date) = registry.get(&self.name).await.map_err(annotate)? {
            return Ok(date);
        }

        let date = registry.set(&self.name, None).await.map_err(annotate)?;
        tracing::info!(post = %self.name, date = %date, "recorded publication date");
        Ok(date)
    }

    /// Renders the post as an HTML fragment using its template, with the
    /// heading as `Heading`, the publication date (`YYYY-MM-DD`) as
    /// `DtPosted` and the paragraphs as `Content`.
    pub async fn write_html(&self, registries: &RegistryPool) -> Result<Vec<u8>> {
        let document = self.document().await?;
        let date = self.publication_date(registries).await?;
        tracing::debug!(post = %self.name, "rendering post");
        self.render(&document, date)
    }

    fn render(&self, document: &Document, date: NaiveDate) -> Result<Vec<u8>> {
        let body = document.body();
        let dt_posted = date.format(DATE_FORMAT).to_string();
        let fields = PostFields {
            heading: &document.heading,
            dt_posted: &dt_posted,
            content: &body,
        };
        template::render(&self.template, &fields).map_err(|err| Error::Template {
            path: self.path.clone(),
            err,
        })
    }
}

/// Represents the result of a [`Post`] operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error creating or rendering a [`Post`]. Every variant names
/// the post's file.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the post file can't be read.
    #[error("reading post '{}': {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned when the post path isn't a regular file.
    #[error("post '{}' is not a file", path.display())]
    NotAFile { path: PathBuf },

    /// Returned when the post's file name isn't valid UTF-8.
    #[error("invalid file name: {}", path.display())]
    InvalidFileName { path: PathBuf },

    /// Returned when the markdown doesn't have the shape of a post.
    #[error("post '{}': {err}", path.display())]
    Extract {
        path: PathBuf,
        #[source]
        err: markdown::Error,
    },

    /// Returned when the publication date can't be read or stored.
    #[error("post '{}': {err}", path.display())]
    Registry {
        path: PathBuf,
        #[source]
        err: registry::Error,
    },

    /// Returned when the template can't be loaded, parsed or executed.
    #[error("post '{}': {err}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        err: template::Error,
    },
}
