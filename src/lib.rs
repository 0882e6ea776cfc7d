//! # simple-md
//!
//! Converts trees of markdown files to standalone HTML pages, either in one
//! batch or through a live preview server that recompiles on every request.
//!
//! # Architecture
//!
//! A batch build is a straight pipeline driven by [`build`]:
//!
//! ```text
//! patterns ─▶ resolve ─▶ classify ─▶ compile ─▶ write
//!             (globs)    (convert /   (rules, markdown,
//!                         move/skip)   template, links)
//! ```
//!
//! The preview server ([`serve`]) reuses the same [`compile::Compiler`] per
//! request instead of writing to disk, and stops on its own once the browser
//! tab that was polling it goes away.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `simple-md.toml` loading, stock defaults, merging, validation, the frozen [`config::BuildConfig`] |
//! | [`rules`] | Ordered regex find/replace rules applied before parsing and after rendering |
//! | [`naming`] | Output names: extension swap, `README.md` → `index.html`, lexical path cleaning |
//! | [`resolve`] | Glob patterns → candidate files, plus the `stdin` pseudo-pattern |
//! | [`classify`] | Convert / move / skip decision and destination for each candidate |
//! | [`markdown`] | pulldown-cmark with feature switches |
//! | [`template`] | Page assembly: built-in maud page or a user minijinja template |
//! | [`compile`] | One document from source bytes to finished page |
//! | [`build`] | Sequential, continue-on-error batch over all patterns |
//! | [`serve`] | HTTP preview with on-demand compilation and idle shutdown |
//! | [`output`] | Terminal formatting of build and server events |
//!
//! # Design Decisions
//!
//! ## One Immutable Configuration
//!
//! Defaults, `simple-md.toml` and command-line flags are merged once at
//! startup. The result is frozen into a [`config::BuildConfig`] and a
//! [`compile::Compiler`], both passed by reference. Nothing reads global
//! state, so the server can share one compiler across request threads
//! without locking.
//!
//! ## Output Folder Exclusion
//!
//! Candidates inside the output folder are always skipped, so building
//! twice with `**/*` never feeds previous output back in. The test compares
//! whole path segments: with output folder `out`, `out2/a.md` is still
//! built.
//!
//! ## Sequential Builds
//!
//! Files are processed one at a time in pattern order. Logs come out in a
//! stable order, and writers into the shared output folder never race.
//!
//! ## Built-in Page via Maud, User Pages via Minijinja
//!
//! The default page is compile-time checked maud markup. Users who want
//! their own page write a Jinja-style template, read at startup from a file
//! or given inline, and fed the same typed [`template::PageData`].

pub mod build;
pub mod classify;
pub mod compile;
pub mod config;
pub mod markdown;
pub mod naming;
pub mod output;
pub mod resolve;
pub mod rules;
pub mod serve;
pub mod template;

#[cfg(test)]
pub(crate) mod test_helpers;
