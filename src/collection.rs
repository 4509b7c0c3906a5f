//! Defines the [`Collection`] type: the posts found in one directory, and the
//! sequential and concurrent ways of rendering all of them into a single HTML
//! string. Both render modes produce identical output in file-name order.

use crate::pool::RegistryPool;
use crate::post::{self, Post, PostOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const MARKDOWN_EXTENSION: &str = "md";

/// The posts of one directory, ordered by file name. Name the files with a
/// sortable prefix (`001_first.md`, `002_second.md`, ...) to control the
/// order.
pub struct Collection {
    directory: PathBuf,
    posts: Vec<Post>,
    registries: Arc<RegistryPool>,
}

impl Collection {
    /// Collects the `*.md` files directly inside `directory` as posts. Fails
    /// if the directory is missing or holds no markdown file.
    pub fn open(
        directory: impl Into<PathBuf>,
        options: &PostOptions,
        registries: Arc<RegistryPool>,
    ) -> Result<Collection> {
        let directory = directory.into();
        match std::fs::metadata(&directory) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(Error::NotADirectory { path: directory }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::DirectoryMissing { path: directory })
            }
            Err(err) => return Err(Error::Io { path: directory, err }),
        }

        let mut files = Vec::new();
        let entries = std::fs::read_dir(&directory).map_err(|err| Error::Io {
            path: directory.clone(),
            err,
        })?;
        for entry in entries {
            let path = entry
                .map_err(|err| Error::Io {
                    path: directory.clone(),
                    err,
                })?
                .path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == MARKDOWN_EXTENSION) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(Error::Empty { path: directory });
        }
        files.sort();

        let posts = files
            .into_iter()
            .map(|path| Post::new(path, options))
            .collect::<post::Result<Vec<Post>>>()?;
        tracing::debug!(
            directory = %directory.display(),
            posts = posts.len(),
            "opened collection"
        );

        Ok(Collection {
            directory,
            posts,
            registries,
        })
    }

    /// The directory the posts were collected from.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// The pool the posts look up their publication registry in.
    pub fn registries(&self) -> &Arc<RegistryPool> {
        &self.registries
    }

    /// Renders the posts one at a time and concatenates the results. Stops
    /// at the first post that fails.
    pub async fn render_sequential(&self) -> Result<Vec<u8>> {
        let mut html = Vec::new();
        for post in &self.posts {
            html.extend(post.write_html(&self.registries).await?);
        }
        Ok(html)
    }

    /// Renders every post in its own task and concatenates the results in
    /// collection order once all tasks are done. If any post fails, the
    /// first failure in collection order is returned and nothing else.
    pub async fn render_concurrent(&self) -> Result<Vec<u8>> {
        self.render_concurrent_with(|post, registries| async move {
            post.write_html(&registries).await
        })
        .await
    }

    /// Drives [`Collection::render_concurrent`] with the given per-post
    /// render function.
    async fn render_concurrent_with<F, Fut>(&self, render: F) -> Result<Vec<u8>>
    where
        F: Fn(Post, Arc<RegistryPool>) -> Fut,
        Fut: Future<Output = post::Result<Vec<u8>>> + Send + 'static,
    {
        let tasks: Vec<_> = self
            .posts
            .iter()
            .map(|post| tokio::spawn(render(post.clone(), Arc::clone(&self.registries))))
            .collect();

        // one slot per post; every task is awaited before any error is
        // reported
        let mut slots: Vec<Option<Vec<u8>>> = vec![None; tasks.len()];
        let mut first_error = None;
        for (index, task) in tasks.into_iter().enumerate() {
            let result = match task.await {
                Ok(result) => result.map_err(Error::from),
                Err(err) => Err(Error::Join {
                    path: self.posts[index].path().to_owned(),
                    err,
                }),
            };
            match result {
                Ok(html) => slots[index] = Some(html),
                Err(err) => {
                    tracing::warn!(error = %err, "rendering post failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        Ok(slots.into_iter().flatten().flatten().collect())
    }
}

/// Represents the result of a [`Collection`] operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error opening or rendering a [`Collection`].
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the collection directory doesn't exist.
    #[error("directory '{}' does not exist", path.display())]
    DirectoryMissing { path: PathBuf },

    /// Returned when the collection path isn't a directory.
    #[error("'{}' must be a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Returned when the directory holds no markdown file.
    #[error("there must be at least one .md file in '{}'", path.display())]
    Empty { path: PathBuf },

    /// Returned for I/O problems while listing the directory.
    #[error("listing '{}': {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned when a post can't be created or rendered.
    #[error("could not render post: {0}")]
    Post(#[from] post::Error),

    /// Returned when a render task panicked or was cancelled.
    #[error("render task for '{}' failed: {err}", path.display())]
    Join {
        path: PathBuf,
        #[source]
        err: tokio::task::JoinError,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::time::Duration;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn write_posts(dir: &Path, posts: &[(&str, &str)]) -> std::io::Result<()> {
        for (name, heading) in posts {
            fs::write(dir.join(name), format!("## {}\nBody of {}.", heading, heading))?;
        }
        Ok(())
    }

    fn open(dir: &Path) -> Result<Collection> {
        Collection::open(
            dir,
            &PostOptions::default().with_template_string("[{{.Heading}}]{{.Content}}"),
            Arc::new(RegistryPool::default()),
        )
    }

    #[test]
    fn test_open_sorts_and_filters() -> TestResult {
        let dir = tempfile::tempdir()?;
        write_posts(dir.path(), &[("003_c.md", "C"), ("001_a.md", "A"), ("002_b.md", "B")])?;
        fs::write(dir.path().join("notes.txt"), "not a post")?;
        fs::create_dir(dir.path().join("004_dir.md"))?;

        let collection = open(dir.path())?;
        let names: Vec<&str> = collection.posts().iter().map(|p| p.name()).collect();
        assert_eq!(vec!["001_a.md", "002_b.md", "003_c.md"], names);
        assert_eq!(dir.path(), collection.directory());
        Ok(())
    }

    #[test]
    fn test_open_errors() -> TestResult {
        let dir = tempfile::tempdir()?;
        assert!(matches!(open(dir.path()), Err(Error::Empty { .. })));
        assert!(matches!(
            open(&dir.path().join("missing")),
            Err(Error::DirectoryMissing { .. })
        ));
        fs::write(dir.path().join("file.md"), "## a\nb")?;
        assert!(matches!(
            open(&dir.path().join("file.md")),
            Err(Error::NotADirectory { .. })
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_modes_render_identically() -> TestResult {
        let dir = tempfile::tempdir()?;
        write_posts(dir.path(), &[("001_a.md", "A"), ("002_b.md", "B"), ("003_c.md", "C")])?;
        let collection = open(dir.path())?;

        let sequential = collection.render_sequential().await?;
        let concurrent = collection.render_concurrent().await?;
        assert_eq!(sequential, concurrent);
        assert_eq!(
            "[A]<p>Body of A.</p>\n[B]<p>Body of B.</p>\n[C]<p>Body of C.</p>\n",
            String::from_utf8(concurrent)?,
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_order_ignores_completion_order() -> TestResult {
        let dir = tempfile::tempdir()?;
        write_posts(dir.path(), &[("001_a.md", "A"), ("002_b.md", "B"), ("003_c.md", "C")])?;
        let collection = open(dir.path())?;

        // earlier posts finish last
        let delayed = collection
            .render_concurrent_with(|post, registries| async move {
                let delay = match post.name() {
                    "001_a.md" => 60,
                    "002_b.md" => 30,
                    _ => 0,
                };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                post.write_html(&registries).await
            })
            .await?;
        assert_eq!(collection.render_sequential().await?, delayed);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_abort_both_modes() -> TestResult {
        let dir = tempfile::tempdir()?;
        write_posts(dir.path(), &[("001_a.md", "A"), ("003_c.md", "C")])?;
        fs::write(dir.path().join("002_b.md"), "no heading here")?;
        let collection = open(dir.path())?;

        for result in [
            collection.render_sequential().await,
            collection.render_concurrent().await,
        ] {
            match result {
                Err(err @ Error::Post(_)) => assert!(err.to_string().contains("002_b.md")),
                other => panic!("expected a post error, got {:?}", other.map(String::from_utf8)),
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_first_error_in_collection_order() -> TestResult {
        let dir = tempfile::tempdir()?;
        write_posts(dir.path(), &[("001_a.md", "A")])?;
        fs::write(dir.path().join("002_b.md"), "## one\n\n## two\n\ntext")?;
        fs::write(dir.path().join("003_c.md"), "no heading")?;
        let collection = open(dir.path())?;

        match collection.render_concurrent().await {
            Err(Error::Post(post::Error::Extract { path, .. })) => {
                assert!(path.ends_with("002_b.md"))
            }
            other => panic!("expected an extract error, got {:?}", other.map(String::from_utf8)),
        }
        Ok(())
    }
}
