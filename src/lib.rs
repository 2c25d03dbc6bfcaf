/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2024 The Clipowner contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

//! Puts data on the clipboard in several formats at once and serves each
//! format on demand.
//!
//! Content comes from [`ContentSource`]s, which bind [`ContentFormat`]s to
//! lazily evaluated producers. [`resolve`] picks one source per format, and a
//! [`SelectionOwner`] claims the selection and answers requests until another
//! client takes it over.
//!
//! ```no_run
//! use clipowner::{copy, Config, ContentFormat, ContentSource, TimestampPolicy};
//!
//! let files = ContentSource::files(&["/tmp/a.txt"], &TimestampPolicy::default())?;
//! // Blocks until somebody else owns the clipboard.
//! copy(&Config::default(), &[ContentFormat::UriList], vec![files])?;
//! # Ok::<(), clipowner::Error>(())
//! ```

pub mod backend;
mod common;
mod owner;
mod platform;
mod router;
mod source;
mod url;

pub use backend::{SelectionBackend, SelectionEvent, Target, Wake};
pub use common::{ContentFormat, Error, TARGETS};
pub use owner::{SelectionOwner, SessionEnd, SessionState, ShutdownHandle};
pub use platform::{LinuxClipboardKind, MockSelection};
#[cfg(all(
	unix,
	not(any(target_os = "macos", target_os = "android", target_os = "emscripten")),
))]
pub use platform::{X11Selection, X11Waker};
pub use router::{available_formats, resolve, ResolvedOffer};
pub use source::{ContentSource, Producer, TimestampPolicy, DEFAULT_TIMESTAMP};

/// The windowing system to serve the selection through.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Backend {
	#[default]
	X11,
}

/// Everything needed to pick and connect to a selection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
	pub backend: Backend,
	pub selection: LinuxClipboardKind,
	/// The display to connect to instead of the default one.
	pub display: Option<String>,
}

/// Offers `requested` formats from `sources` on the configured selection and
/// serves them until ownership is lost.
///
/// An empty `requested` list offers everything the sources can produce.
/// Formats are resolved before connecting, so an unresolved format never
/// causes a partially advertised selection.
pub fn copy(
	config: &Config,
	requested: &[ContentFormat],
	sources: Vec<ContentSource>,
) -> Result<SessionEnd, Error> {
	let offer = resolve(requested, sources)?;
	log::debug!("offering {:?}", offer.formats().collect::<Vec<_>>());

	match config.backend {
		#[cfg(all(
			unix,
			not(any(target_os = "macos", target_os = "android", target_os = "emscripten")),
		))]
		Backend::X11 => {
			let selection = X11Selection::connect(config.display.as_deref(), config.selection)?;
			SelectionOwner::new(selection, offer).run()
		}
		#[cfg(not(all(
			unix,
			not(any(target_os = "macos", target_os = "android", target_os = "emscripten")),
		)))]
		Backend::X11 => Err(Error::ClipboardNotSupported),
	}
}

/// Lists the target names offered by the current owner of the configured
/// selection.
pub fn query_targets(config: &Config) -> Result<Vec<String>, Error> {
	match config.backend {
		#[cfg(all(
			unix,
			not(any(target_os = "macos", target_os = "android", target_os = "emscripten")),
		))]
		Backend::X11 => {
			X11Selection::connect(config.display.as_deref(), config.selection)?.query_targets()
		}
		#[cfg(not(all(
			unix,
			not(any(target_os = "macos", target_os = "android", target_os = "emscripten")),
		)))]
		Backend::X11 => Err(Error::ClipboardNotSupported),
	}
}
