//! Implements a custom [`push_html`] so that rendering policy (currently the
//! target attribute for links) is decided once per renderer rather than
//! patched into the output afterwards.
//! [`pulldown_cmark::html::push_html`] offers no hook for link attributes.

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, LinkType, Tag};
use std::fmt::{self, Display};
use std::io;

struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T> Adaptor<'_, T> {
    fn handle_result(&mut self, result: fmt::Result) -> io::Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.result = result;
                Err(io::Error::new(io::ErrorKind::Other, e))
            }
        }
    }
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let result = self.formatter.write_str(s);
        self.handle_result(result)
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let result = self.formatter.write_fmt(args);
        self.handle_result(result)
    }
}

struct EscapeHref<'a>(&'a str);

impl Display for EscapeHref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_href(&mut adaptor, self.0);
        adaptor.result
    }
}

struct EscapeHtml<'a>(&'a str);

impl Display for EscapeHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };

        let _ = escape_html(&mut adaptor, self.0);
        adaptor.result
    }
}

/// Renders ` title="..."` for non-empty titles and nothing otherwise.
struct TitleAttr<'a>(&'a str);

impl Display for TitleAttr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.is_empty() {
            true => Ok(()),
            false => write!(f, r#" title="{}""#, EscapeHtml(self.0)),
        }
    }
}

/// Rendering policy shared by every node a renderer emits.
#[derive(Clone, Debug)]
pub struct RendererOptions {
    /// Value of the `target` attribute written on every link. `None` leaves
    /// links without a target.
    pub link_target: Option<String>,
}

impl Default for RendererOptions {
    /// Links open in a new browsing context by default.
    fn default() -> Self {
        RendererOptions {
            link_target: Some(String::from("_blank")),
        }
    }
}

/// Renders markdown [`Event`]s into HTML. This is largely modeled after
/// [`pulldown_cmark`]'s private `HtmlWriter` struct.
struct HtmlRenderer<'o> {
    options: &'o RendererOptions,

    /// Nesting depth of images currently open. While positive, text events
    /// belong to the `alt` attribute instead of the document.
    image_depth: usize,

    /// The title of each open image, written once its alt text is closed.
    image_titles: Vec<String>,
}

impl<'o> HtmlRenderer<'o> {
    fn new(options: &'o RendererOptions) -> Self {
        HtmlRenderer {
            options,
            image_depth: 0,
            image_titles: Vec::new(),
        }
    }

    fn on_event<W: StrWrite>(&mut self, w: &mut W, event: Event) -> io::Result<()> {
        if self.image_depth > 0 {
            return self.on_alt_event(w, event);
        }
        match event {
            Event::Start(tag) => self.on_start(w, tag),
            Event::End(tag) => self.on_end(w, tag),
            Event::Code(code) => write!(w, "<code>{}</code>", EscapeHtml(&code)),
            Event::FootnoteReference(name) => write!(
                w,
                r##"<sup class="footnote-reference"><a href="#{}">{}</a></sup>"##,
                EscapeHtml(&name),
                EscapeHtml(&name),
            ),
            Event::HardBreak => w.write_str("<br />\n"),
            Event::Html(html) => w.write_str(&html),
            Event::Rule => w.write_str("<hr />\n"),
            Event::SoftBreak => w.write_str("\n"),
            Event::TaskListMarker(checked) => write!(
                w,
                r#"<input disabled="" type="checkbox" {}/>"#,
                match checked {
                    true => r#"checked="" "#,
                    false => "",
                }
            ),
            Event::Text(text) => escape_html(w, &text),
        }
    }

    /// Handles events nested in an image: only their text survives, escaped
    /// into the `alt` attribute.
    fn on_alt_event<W: StrWrite>(&mut self, w: &mut W, event: Event) -> io::Result<()> {
        match event {
            Event::Start(Tag::Image(_, _, title)) => {
                self.image_depth += 1;
                self.image_titles.push(title.to_string());
                Ok(())
            }
            Event::End(Tag::Image(..)) => {
                self.image_depth -= 1;
                let title = self.image_titles.pop().unwrap_or_default();
                match self.image_depth {
                    0 => write!(w, r#""{} />"#, TitleAttr(&title)),
                    _ => Ok(()),
                }
            }
            Event::Text(text) | Event::Code(text) => escape_html(w, &text),
            Event::SoftBreak | Event::HardBreak => w.write_str(" "),
            _ => Ok(()),
        }
    }

    fn write_link_open<W: StrWrite>(
        &self,
        w: &mut W,
        scheme: &str,
        dest: &CowStr,
        title: &CowStr,
    ) -> io::Result<()> {
        write!(w, r#"<a href="{}{}""#, scheme, EscapeHref(dest))?;
        if let Some(target) = &self.options.link_target {
            write!(w, r#" target="{}""#, EscapeHtml(target))?;
        }
        write!(w, "{}>", TitleAttr(title))
    }

    fn on_start<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("<blockquote>\n"),
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                match info.split(' ').next().unwrap_or_default() {
                    "" => w.write_str("<pre><code>"),
                    lang => write!(w, r#"<pre><code class="language-{}">"#, EscapeHtml(lang)),
                }
            }
            Tag::CodeBlock(CodeBlockKind::Indented) => w.write_str("<pre><code>"),
            Tag::Emphasis => w.write_str("<em>"),
            Tag::FootnoteDefinition(name) => write!(
                w,
                r#"<div class="footnote-definition" id="{}">"#,
                EscapeHtml(&name),
            ),
            Tag::Heading(level) => write!(w, "<h{}>", level),
            Tag::Image(_link_type, dest, title) => {
                self.image_depth = 1;
                self.image_titles.push(title.to_string());
                write!(w, r#"<img src="{}" alt=""#, EscapeHref(&dest))
            }
            Tag::Item => w.write_str("<li>"),
            Tag::Link(LinkType::Email, dest, title) => {
                self.write_link_open(w, "mailto:", &dest, &title)
            }
            Tag::Link(_link_type, dest, title) => self.write_link_open(w, "", &dest, &title),
            Tag::List(None) => w.write_str("<ul>\n"),
            Tag::List(Some(1)) => w.write_str("<ol>\n"),
            Tag::List(Some(start)) => write!(w, "<ol start=\"{}\">\n", start),
            Tag::Paragraph => w.write_str("<p>"),
            Tag::Strikethrough => w.write_str("<del>"),
            Tag::Strong => w.write_str("<strong>"),
            Tag::Table(_) => w.write_str("<table>"),
            Tag::TableHead => w.write_str("<thead><tr>"),
            Tag::TableRow => w.write_str("<tr>"),
            Tag::TableCell => w.write_str("<td>"),
        }
    }

    fn on_end<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("</blockquote>\n"),
            Tag::CodeBlock(_) => w.write_str("</code></pre>\n"),
            Tag::Emphasis => w.write_str("</em>"),
            Tag::FootnoteDefinition(_) => w.write_str("</div>\n"),
            Tag::Heading(level) => write!(w, "</h{}>\n", level),
            // closed in `on_alt_event`
            Tag::Image(..) => Ok(()),
            Tag::Item => w.write_str("</li>\n"),
            Tag::Link(..) => w.write_str("</a>"),
            Tag::List(Some(_)) => w.write_str("</ol>\n"),
            Tag::List(None) => w.write_str("</ul>\n"),
            Tag::Paragraph => w.write_str("</p>\n"),
            Tag::Strikethrough => w.write_str("</del>"),
            Tag::Strong => w.write_str("</strong>"),
            Tag::Table(_) => w.write_str("</tbody></table>\n"),
            Tag::TableHead => w.write_str("</tr></thead><tbody>\n"),
            Tag::TableRow => w.write_str("</tr>\n"),
            Tag::TableCell => w.write_str("</td>"),
        }
    }
}

/// Converts [`Event`]s into an HTML string much like
/// `pulldown_cmark::html::push_html` except that every node is rendered under
/// the given [`RendererOptions`].
pub fn push_html<'a, I>(out: &mut String, events: I, options: &RendererOptions) -> io::Result<()>
where
    I: IntoIterator<Item = Event<'a>>,
{
    let mut renderer = HtmlRenderer::new(options);
    for event in events {
        renderer.on_event(out, event)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pulldown_cmark::Parser;

    fn render(markdown: &str, options: &RendererOptions) -> io::Result<String> {
        let mut out = String::new();
        push_html(&mut out, Parser::new(markdown), options)?;
        Ok(out)
    }

    #[test]
    fn test_links_open_in_new_context() -> io::Result<()> {
        assert_eq!(
            r#"<p>hey <a href="https://google.com" target="_blank">google</a>.</p>
"#,
            render("hey [google](https://google.com).", &RendererOptions::default())?,
        );
        Ok(())
    }

    #[test]
    fn test_link_title_and_no_target() -> io::Result<()> {
        let options = RendererOptions { link_target: None };
        assert_eq!(
            "<p><a href=\"/a\" title=\"The &quot;A&quot;\">a</a></p>\n",
            render(r#"[a](/a 'The "A"')"#, &options)?,
        );
        Ok(())
    }

    #[test]
    fn test_email_autolink() -> io::Result<()> {
        assert_eq!(
            "<p><a href=\"mailto:me@example.org\" target=\"_blank\">me@example.org</a></p>\n",
            render("<me@example.org>", &RendererOptions::default())?,
        );
        Ok(())
    }

    #[test]
    fn test_image_alt_text() -> io::Result<()> {
        assert_eq!(
            "<p><img src=\"cat.png\" alt=\"a *cat*\" title=\"Cat\" /></p>\n",
            render(r#"![a \*cat\*](cat.png "Cat")"#, &RendererOptions::default())?,
        );
        assert_eq!(
            "<p><img src=\"cat.png\" alt=\"a cat\" /></p>\n",
            render("![a *cat*](cat.png)", &RendererOptions::default())?,
        );
        Ok(())
    }

    #[test]
    fn test_inline_markup_is_escaped() -> io::Result<()> {
        assert_eq!(
            "<p><em>1 &lt; 2</em> and <code>a&amp;b</code></p>\n",
            render("*1 < 2* and `a&b`", &RendererOptions::default())?,
        );
        Ok(())
    }
}
