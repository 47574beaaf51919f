//! Subprocess-backed AI provider layer for the Solar Router.
//!
//! Unlike an HTTP-API provider layer, every provider here is an opaque CLI
//! binary invoked as a subprocess with the prompt as its final positional
//! argument (see §4.1). This crate also hosts the Deferred Task Creator
//! (§4.5), which follows the same subprocess-with-timeout shape.
//!
//! # Modules
//! - [`runner::ProviderRunner`] — runs one named provider, typed failures.
//! - [`creator::DeferredTaskCreator`] — invokes the external task creator.
//! - [`cmdline`] — command tokenizing and `PATH`/fallback executable lookup.

pub mod cmdline;
pub mod creator;
pub mod runner;

pub use creator::{CreatorFailure, DeferredTaskCreator};
pub use runner::{ProviderFailure, ProviderRunner};
