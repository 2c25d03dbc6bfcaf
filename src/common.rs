/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2024 The Clipowner contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

use std::{fmt, path::PathBuf, str::FromStr};

/// The name of the meta-format a peer asks for to enumerate the formats the
/// current owner can provide.
pub const TARGETS: &str = "TARGETS";

/// An error that might happen while claiming or serving a selection.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// One or more of the requested formats is not offered by any source.
	///
	/// Raised before any ownership claim is attempted.
	#[error("no source for format(s): {}", format_list(.formats))]
	UnresolvedTargets {
		/// The formats that could not be bound, in the order they were requested.
		formats: Vec<ContentFormat>,
	},

	/// The windowing system reported a different owner right after the claim.
	///
	/// Either another client won the race or the claim was refused. Claims
	/// are not retried.
	#[error("could not take ownership of the {selection} selection")]
	OwnershipClaim {
		/// The selection that could not be claimed.
		selection: String,
	},

	/// A source was asked for a format it has no producer for.
	///
	/// Sources are resolved before ownership is claimed, so this indicates a
	/// broken internal invariant rather than a user error.
	#[error("format {format} is not bound to this source")]
	Lookup {
		/// The format that was requested.
		format: ContentFormat,
	},

	/// The selection was claimed twice by the same owner.
	///
	/// An owner claims once; after the session ends a new owner is needed.
	#[error("the selection was already claimed by this owner")]
	AlreadyClaimed,

	/// The selection was served without owning it first.
	#[error("the selection is not owned by this process")]
	NotOwning,

	/// The selected backend is not available on this platform.
	#[error("the selected clipboard backend is not supported on this platform")]
	ClipboardNotSupported,

	/// Reading the metadata of a file failed.
	#[error("failed to read metadata of {}", .path.display())]
	Io {
		/// The file whose metadata could not be read.
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The native windowing system failed in an unexpected way.
	#[error("unknown error while interacting with the clipboard: {description}")]
	Unknown {
		/// A description of the failure.
		description: String,
	},
}

fn format_list(formats: &[ContentFormat]) -> String {
	formats.iter().map(ContentFormat::name).collect::<Vec<_>>().join(", ")
}

/// A content format a selection can be offered in.
///
/// The set is closed: both sides of a transfer have to agree on the name and
/// meaning of every format, so nothing is invented at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentFormat {
	/// Unformatted text.
	PlainText,
	/// HTML formatted text.
	FormattedText,
	/// The time the offered content was last modified.
	Timestamp,
	/// A newline separated list of `file://` URIs.
	UriList,
	/// The payload GNOME file managers use for copied files.
	GnomeCopiedFiles,
}

impl ContentFormat {
	/// Every supported format, in declaration order.
	pub const ALL: [ContentFormat; 5] = [
		ContentFormat::PlainText,
		ContentFormat::FormattedText,
		ContentFormat::Timestamp,
		ContentFormat::UriList,
		ContentFormat::GnomeCopiedFiles,
	];

	/// The stable external name, as used on the command line.
	pub const fn name(&self) -> &'static str {
		match self {
			ContentFormat::PlainText => "PLAINTEXT",
			ContentFormat::FormattedText => "FORMATTED_TEXT",
			ContentFormat::Timestamp => "TIMESTAMP",
			ContentFormat::UriList => "URI_LIST",
			ContentFormat::GnomeCopiedFiles => "GNOME_COPIED_FILES",
		}
	}

	/// The name peers use for this format on the wire.
	pub const fn target_name(&self) -> &'static str {
		match self {
			ContentFormat::PlainText => "STRING",
			ContentFormat::FormattedText => "text/html",
			ContentFormat::Timestamp => "TIMESTAMP",
			ContentFormat::UriList => "text/uri-list",
			ContentFormat::GnomeCopiedFiles => "x-special/gnome-copied-files",
		}
	}

	/// Looks up a format by its wire name.
	pub fn from_target_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|format| format.target_name() == name)
	}
}

impl fmt::Display for ContentFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for ContentFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|format| format.name() == s)
			.ok_or_else(|| format!("unknown content format `{s}`"))
	}
}
