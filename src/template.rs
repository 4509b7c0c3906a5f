//! Go-style text templates (via [`gtmpl`]) for posts and for the page that
//! wraps them. Template output is not HTML-escaped; values are expected to be
//! rendered HTML already.

use gtmpl::{Context, Template, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The template used for a post unless another one is supplied. Posts are
/// rendered with the `Heading`, `DtPosted` and `Content` placeholders.
pub const DEFAULT_POST_TEMPLATE: &str = r#"
<div class="blog-post">
    <h2>{{.Heading}}</h2>
    <span class="dt-posted">{{.DtPosted}}</span>
    {{.Content}}
</div>
"#;

/// Where a template's source text comes from. Both forms resolve to the same
/// text and render identically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateSource {
    Inline(String),
    File(PathBuf),
}

impl Default for TemplateSource {
    fn default() -> Self {
        TemplateSource::Inline(DEFAULT_POST_TEMPLATE.to_owned())
    }
}

impl TemplateSource {
    /// Loads the template text, reading the file for [`TemplateSource::File`].
    pub fn load(&self) -> Result<String> {
        match self {
            TemplateSource::Inline(text) => Ok(text.clone()),
            TemplateSource::File(path) => read(path),
        }
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| Error::OpenTemplateFile {
        path: path.to_owned(),
        err,
    })
}

/// The values substituted into a post template.
#[derive(Clone, Debug)]
pub struct PostFields<'a> {
    pub heading: &'a str,
    pub dt_posted: &'a str,
    pub content: &'a str,
}

impl From<&PostFields<'_>> for Value {
    /// Converts [`PostFields`] into a [`Value::Object`] keyed by placeholder
    /// name, so that references to unknown placeholders fail.
    fn from(fields: &PostFields) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("Heading".to_owned(), Value::String(fields.heading.to_owned()));
        m.insert("DtPosted".to_owned(), Value::String(fields.dt_posted.to_owned()));
        m.insert("Content".to_owned(), Value::String(fields.content.to_owned()));
        Value::Object(m)
    }
}

/// Parses `source` and executes it against `value`.
pub fn render<V: Into<Value>>(source: &str, value: V) -> Result<Vec<u8>> {
    let mut template = Template::default();
    template.parse(source).map_err(Error::Parse)?;
    let context = Context::from(value.into()).map_err(Error::Execute)?;

    let mut out = Vec::new();
    template.execute(&mut out, &context).map_err(Error::Execute)?;
    Ok(out)
}

/// Represents the result of a templating operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a template that couldn't be loaded, parsed or executed.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    #[error("opening template file '{}': {err}", path.display())]
    OpenTemplateFile {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned when the template is malformed.
    #[error("parsing template: {0}")]
    Parse(String),

    /// Returned when executing the template fails, e.g. when it references
    /// an undefined placeholder.
    #[error("executing template: {0}")]
    Execute(String),
}

#[cfg(test)]
mod test {
    use super::*;

    fn fields() -> PostFields<'static> {
        PostFields {
            heading: "Title",
            dt_posted: "2024-01-01",
            content: "<p>a &amp; b</p>\n",
        }
    }

    #[test]
    fn test_render_default_template() -> Result<()> {
        let html = render(DEFAULT_POST_TEMPLATE, &fields())?;
        let html = String::from_utf8_lossy(&html).into_owned();
        assert!(html.contains("<h2>Title</h2>"));
        assert!(html.contains(r#"<span class="dt-posted">2024-01-01</span>"#));
        assert!(html.contains("<p>a &amp; b</p>"));
        Ok(())
    }

    #[test]
    fn test_inline_and_file_sources_match(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("post.tmpl");
        let text = "<h3>{{.Heading}}</h3>{{.Content}}";
        std::fs::write(&path, text)?;

        let inline = TemplateSource::Inline(text.to_owned()).load()?;
        let file = TemplateSource::File(path).load()?;
        assert_eq!(render(&inline, &fields())?, render(&file, &fields())?);
        Ok(())
    }

    #[test]
    fn test_missing_template_file() {
        assert!(matches!(
            TemplateSource::File(PathBuf::from("/does/not/exist.tmpl")).load(),
            Err(Error::OpenTemplateFile { .. })
        ));
    }

    #[test]
    fn test_malformed_template() {
        assert!(matches!(
            render("<h2>{{.Heading</h2>", &fields()),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_undefined_placeholder() {
        assert!(render("{{.Author}}", &fields()).is_err());
    }

    #[test]
    fn test_render_root_string() -> Result<()> {
        assert_eq!(
            b"<main><p>x</p></main>".to_vec(),
            render("<main>{{.}}</main>", Value::String(String::from("<p>x</p>")))?,
        );
        Ok(())
    }
}
