//! Splits a post's markdown into top-level blocks and extracts the single
//! heading and the paragraphs that make up a post body. Any other kind of
//! top-level block (lists, code blocks, tables, ...) is rejected.

use crate::htmlrenderer::{self, RendererOptions};
use pulldown_cmark::{Event, Options, Parser, Tag};
use std::io;
use thiserror::Error;

/// A top-level block of a markdown document. The events of headings and
/// paragraphs exclude their own start and end tags.
#[derive(Debug)]
pub enum Block<'a> {
    Heading(Vec<Event<'a>>),
    Paragraph(Vec<Event<'a>>),

    /// Any other block, named for error reporting.
    Other(&'static str),
}

/// The renderable parts of a post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// The heading's inner HTML. Inline markup such as links and emphasis is
    /// kept; the `<hN>` wrapper is not.
    pub heading: String,

    /// Each paragraph rendered to HTML independently, in source order.
    pub paragraphs: Vec<String>,
}

impl Document {
    /// The concatenated paragraph HTML, without separators.
    pub fn body(&self) -> String {
        self.paragraphs.concat()
    }
}

fn parser_options() -> Options {
    // Enabled so that these constructs are recognised as their own blocks
    // and rejected, instead of degrading into paragraph text.
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

fn block_kind(tag: &Tag) -> &'static str {
    match tag {
        Tag::Paragraph => "paragraph",
        Tag::Heading(_) => "heading",
        Tag::BlockQuote => "block quote",
        Tag::CodeBlock(_) => "code block",
        Tag::List(_) | Tag::Item => "list",
        Tag::FootnoteDefinition(_) => "footnote definition",
        Tag::Table(_) | Tag::TableHead | Tag::TableRow | Tag::TableCell => "table",
        Tag::Emphasis
        | Tag::Strong
        | Tag::Strikethrough
        | Tag::Link(..)
        | Tag::Image(..) => "inline element",
    }
}

/// Parses `markdown` and groups its events into top-level [`Block`]s in
/// document order.
pub fn split_blocks(markdown: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut current: Option<Block> = None;

    for event in Parser::new_ext(markdown, parser_options()) {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    current = Some(match tag {
                        Tag::Heading(_) => Block::Heading(Vec::new()),
                        Tag::Paragraph => Block::Paragraph(Vec::new()),
                        ref other => Block::Other(block_kind(other)),
                    });
                } else {
                    push_event(&mut current, Event::Start(tag));
                }
                depth += 1;
            }
            Event::End(tag) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    blocks.extend(current.take());
                } else {
                    push_event(&mut current, Event::End(tag));
                }
            }
            event if depth > 0 => push_event(&mut current, event),

            // leaf blocks without a start tag
            Event::Rule => blocks.push(Block::Other("thematic break")),
            Event::Html(_) => blocks.push(Block::Other("html block")),
            _ => blocks.push(Block::Other("text")),
        }
    }

    blocks
}

fn push_event<'a>(block: &mut Option<Block<'a>>, event: Event<'a>) {
    match block {
        Some(Block::Heading(events)) | Some(Block::Paragraph(events)) => events.push(event),
        Some(Block::Other(_)) | None => {}
    }
}

/// Extracts the [`Document`] from a post's markdown. The markdown must
/// contain exactly one heading, at least one paragraph and nothing else at
/// the top level.
pub fn extract(markdown: &str) -> Result<Document> {
    extract_with(markdown, &RendererOptions::default())
}

/// Like [`extract`], rendering with the given [`RendererOptions`].
pub fn extract_with(markdown: &str, options: &RendererOptions) -> Result<Document> {
    let mut heading = None;
    let mut paragraphs = Vec::new();

    for block in split_blocks(markdown) {
        match block {
            Block::Heading(events) => {
                if heading.is_some() {
                    return Err(Error::MultipleHeadings);
                }
                heading = Some(events);
            }
            Block::Paragraph(events) => paragraphs.push(events),
            Block::Other(kind) => return Err(Error::UnsupportedBlock { kind }),
        }
    }

    let heading = heading.ok_or(Error::NoHeading)?;
    if paragraphs.is_empty() {
        return Err(Error::NoParagraphs);
    }

    let mut heading_html = String::new();
    htmlrenderer::push_html(&mut heading_html, heading, options)?;

    let paragraphs = paragraphs
        .into_iter()
        .map(|events| -> Result<String> {
            let mut html = String::new();
            htmlrenderer::push_html(
                &mut html,
                std::iter::once(Event::Start(Tag::Paragraph))
                    .chain(events)
                    .chain(std::iter::once(Event::End(Tag::Paragraph))),
                options,
            )?;
            Ok(html)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Document {
        heading: heading_html,
        paragraphs,
    })
}

/// Represents the result of extracting a [`Document`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a post whose markdown doesn't have the shape of a post.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when more than one heading is found.
    #[error("more than one heading in blog post")]
    MultipleHeadings,

    /// Returned when no heading is found.
    #[error("no heading found")]
    NoHeading,

    /// Returned for a top-level block that is neither a heading nor a
    /// paragraph.
    #[error("unsupported {kind} in blog post; only a heading and paragraphs are allowed")]
    UnsupportedBlock { kind: &'static str },

    /// Returned when the heading isn't accompanied by any paragraph.
    #[error("no paragraphs in blog post")]
    NoParagraphs,

    /// Returned when rendering a block to HTML fails.
    #[error("rendering html: {0}")]
    Render(#[from] io::Error),
}
