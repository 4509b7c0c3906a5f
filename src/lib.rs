//! The library code for the `microblog` page generator. A build takes a
//! directory of markdown posts and produces a single HTML page:
//!
//! 1. Each post is reduced to one heading and a run of paragraphs
//!    ([`crate::markdown`]), with links rendered by [`crate::htmlrenderer`].
//! 2. Each post gets a publication date. With tracking enabled, the date a
//!    post was first rendered is recorded in a per-directory SQLite registry
//!    ([`crate::registry`]) shared through a [`crate::pool::RegistryPool`].
//! 3. Posts are rendered through a post template ([`crate::template`]) and
//!    concatenated in file-name order, either sequentially or concurrently
//!    ([`crate::collection`]).
//! 4. The concatenated posts are wrapped by the page template and written,
//!    together with the copied static assets, to the output directory
//!    ([`crate::build`]).

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod collection;
pub mod config;
pub mod htmlrenderer;
pub mod markdown;
pub mod pool;
pub mod post;
pub mod registry;
pub mod telemetry;
pub mod template;
