/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2024 The Clipowner contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

//! The seam between the ownership engine and a windowing system.

use crate::{common::Error, ContentFormat};

/// A server timestamp, as handed out by the windowing system.
pub type Timestamp = u32;

/// What a peer asked the selection owner for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
	/// The list of formats the owner can provide.
	Formats,
	/// The content in one of the known formats.
	Content(ContentFormat),
	/// A format outside of the registry, by its wire name.
	Other(String),
}

/// Where the answer to a request has to go.
///
/// The values are opaque to the engine; a backend fills them in when it
/// receives a request and reads them back when responding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
	pub requestor: u32,
	pub property: u32,
	pub target: u32,
	pub selection: u32,
	pub time: Timestamp,
}

/// A single conversion request from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	pub target: Target,
	pub context: RequestContext,
}

/// The one answer every [`Request`] gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
	/// The advertised formats, without any content.
	Formats(Vec<ContentFormat>),
	/// The rendered content, tagged with the format that was asked for.
	Data { format: ContentFormat, bytes: Vec<u8> },
	/// The conversion is impossible.
	Refused,
}

impl Response {
	/// The size in bits of one transported unit, if anything is transported.
	///
	/// Identifier lists travel as 32 bit values while content travels as
	/// plain bytes.
	pub fn unit_width(&self) -> Option<u8> {
		match self {
			Response::Formats(_) => Some(32),
			Response::Data { .. } => Some(8),
			Response::Refused => None,
		}
	}
}

/// Something that happened to the owned selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
	/// A peer wants the selection converted to some target.
	Request(Request),
	/// Another client took the selection, or the system revoked it.
	OwnershipLost,
	/// The loop was woken up through a [`Wake`] handle.
	Wakeup,
}

/// Wakes a loop that is blocked in [`SelectionBackend::next_event`].
pub trait Wake: Send + Sync {
	fn wake(&self) -> Result<(), Error>;
}

/// The operations the ownership engine needs from a windowing system.
///
/// All methods except [`SelectionBackend::waker`] are called from the single
/// thread that serves the selection.
pub trait SelectionBackend {
	type Waker: Wake + 'static;

	/// A human readable name of the selection, for logs and errors.
	fn selection(&self) -> &str;

	/// Obtains a fresh server timestamp. Blocks for a round trip.
	fn timestamp(&mut self) -> Result<Timestamp, Error>;

	/// Asserts ownership of the selection as of `time`.
	fn claim(&mut self, time: Timestamp) -> Result<(), Error>;

	/// Whether the windowing system currently considers us the owner.
	fn is_owner(&mut self) -> Result<bool, Error>;

	/// Blocks until the next event concerning the owned selection.
	fn next_event(&mut self) -> Result<SelectionEvent, Error>;

	/// Sends `response` back to whoever made `request`.
	fn respond(&mut self, request: &Request, response: Response) -> Result<(), Error>;

	/// Gives up ownership that was claimed at `time`.
	fn relinquish(&mut self, time: Timestamp) -> Result<(), Error>;

	/// A handle that makes [`SelectionBackend::next_event`] return
	/// [`SelectionEvent::Wakeup`] from another thread.
	fn waker(&self) -> Self::Waker;
}
