/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2024 The Clipowner contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

//! Owning an X11 selection, following the ICCCM.
//!
//! A hidden window is created to own the selection. Peers send it
//! `SelectionRequest` events; each one is answered by writing a property on
//! the requestor's window (unless the conversion is refused) and sending a
//! `SelectionNotify` back. A `SelectionClear` means somebody else took over.
//!
//! INCR transfers are not implemented, so payloads have to fit into a single
//! request.

use std::sync::Arc;

use x11rb::{
	connection::{Connection, RequestConnection},
	errors::{ConnectionError, ReplyOrIdError},
	protocol::{
		xproto::{
			Atom, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConnectionExt as _,
			CreateWindowAux, EventMask, PropMode, SelectionNotifyEvent, SelectionRequestEvent,
			Window, WindowClass, SELECTION_NOTIFY_EVENT,
		},
		Event,
	},
	rust_connection::RustConnection,
	wrapper::ConnectionExt as _,
	COPY_DEPTH_FROM_PARENT, CURRENT_TIME, NONE,
};

use super::into_unknown;
use crate::{
	backend::{
		Request, RequestContext, Response, SelectionBackend, SelectionEvent, Target, Timestamp,
		Wake,
	},
	common::Error,
	ContentFormat, LinuxClipboardKind,
};

type Result<T, E = ReplyOrIdError> = std::result::Result<T, E>;

/// Size of a `ChangeProperty` request without its data.
const CHANGE_PROPERTY_HEADER: usize = 24;

x11rb::atom_manager! {
	Atoms: AtomCookies {
		CLIPBOARD,
		PRIMARY,
		SECONDARY,
		TARGETS,
		STRING,
		TIMESTAMP,
		CLIPOWNER_DATA,
		CLIPOWNER_WAKE,
		HTML: b"text/html",
		URI_LIST: b"text/uri-list",
		GNOME_COPIED_FILES: b"x-special/gnome-copied-files",
	}
}

impl Atoms {
	/// The target a format is offered as.
	fn target(&self, format: ContentFormat) -> Atom {
		match format {
			ContentFormat::PlainText => self.STRING,
			ContentFormat::FormattedText => self.HTML,
			ContentFormat::Timestamp => self.TIMESTAMP,
			ContentFormat::UriList => self.URI_LIST,
			ContentFormat::GnomeCopiedFiles => self.GNOME_COPIED_FILES,
		}
	}
}

/// The property written on the requestor's window to deliver a response.
#[derive(Debug, PartialEq, Eq)]
struct PropertyWrite {
	property: Atom,
	type_: Atom,
	width: u8,
	data: Vec<u8>,
}

impl PropertyWrite {
	/// Builds the write for `response`, or `None` if it is a refusal.
	///
	/// The target list is sent as `ATOM` with `TARGETS` itself first, data as
	/// bytes typed with the requested target.
	fn for_response(response: Response, property: Atom, atoms: &Atoms) -> Option<Self> {
		let width = response.unit_width()?;
		match response {
			Response::Formats(formats) => {
				let data = std::iter::once(atoms.TARGETS)
					.chain(formats.into_iter().map(|format| atoms.target(format)))
					.flat_map(u32::to_ne_bytes)
					.collect();
				Some(Self { property, type_: AtomEnum::ATOM.into(), width, data })
			}
			Response::Data { format, bytes } => {
				Some(Self { property, type_: atoms.target(format), width, data: bytes })
			}
			Response::Refused => None,
		}
	}

	fn units(&self) -> Result<u32, ConnectionError> {
		(self.data.len() / usize::from(self.width / 8))
			.try_into()
			.map_err(|_| ConnectionError::MaximumRequestLengthExceeded)
	}

	/// Whether the write fits into one request of at most `maximum_bytes`.
	fn fits(&self, maximum_bytes: usize) -> bool {
		CHANGE_PROPERTY_HEADER + self.data.len().next_multiple_of(4) <= maximum_bytes
	}
}

/// The property a requestor wants its answer in.
///
/// Obsolete clients send `NONE` and expect a property named after the target.
fn destination_property(property: Atom, target: Atom) -> Atom {
	if property == NONE {
		target
	} else {
		property
	}
}

/// An X11 selection owned through its own hidden window.
pub struct X11Selection {
	conn: Arc<RustConnection>,
	window: Window,
	atoms: Atoms,
	kind: LinuxClipboardKind,
	selection: Atom,
}

impl X11Selection {
	/// Connects to `display`, or to `$DISPLAY` if that is `None`.
	///
	/// Every atom that will ever be needed is interned here, once.
	pub fn connect(display: Option<&str>, kind: LinuxClipboardKind) -> Result<Self, Error> {
		let (conn, screen_num) = x11rb::connect(display)
			.map_err(|e| into_unknown("failed to connect to the X11 server", e))?;
		Self::setup(conn, screen_num, kind)
			.map_err(|e| into_unknown("failed to set up the selection window", e))
	}

	fn setup(conn: RustConnection, screen_num: usize, kind: LinuxClipboardKind) -> Result<Self> {
		let window = conn.generate_id()?;
		let (root, visual) = {
			let screen = &conn.setup().roots[screen_num];
			(screen.root, screen.root_visual)
		};
		conn.create_window(
			COPY_DEPTH_FROM_PARENT,
			window,
			root,
			0,
			0,
			1,
			1,
			0,
			WindowClass::INPUT_OUTPUT,
			visual,
			&CreateWindowAux::new(),
		)?;
		let atoms = Atoms::new(&conn)?.reply()?;
		conn.flush()?;

		let selection = match kind {
			LinuxClipboardKind::Clipboard => atoms.CLIPBOARD,
			LinuxClipboardKind::Primary => atoms.PRIMARY,
			LinuxClipboardKind::Secondary => atoms.SECONDARY,
		};
		log::trace!("created selection window 0x{:x}", window);

		Ok(Self { conn: Arc::new(conn), window, atoms, kind, selection })
	}

	fn atom_name(&self, atom: Atom) -> Result<String> {
		let name = self.conn.get_atom_name(atom)?.reply()?.name;
		Ok(String::from_utf8_lossy(&name).into_owned())
	}

	fn target_of(&self, atom: Atom) -> Target {
		if atom == self.atoms.TARGETS {
			return Target::Formats;
		}
		match ContentFormat::ALL.into_iter().find(|format| self.atoms.target(*format) == atom) {
			Some(format) => Target::Content(format),
			None => Target::Other(self.atom_name(atom).unwrap_or_else(|_| format!("#{atom}"))),
		}
	}

	fn request_from(&self, event: &SelectionRequestEvent) -> Request {
		if event.property == NONE {
			log::warn!("request from obsolete client 0x{:x}", event.requestor);
		}
		let property = destination_property(event.property, event.target);
		let target = self.target_of(event.target);
		log::info!("got request for {:?} from 0x{:x}", target, event.requestor);

		Request {
			target,
			context: RequestContext {
				requestor: event.requestor,
				property,
				target: event.target,
				selection: event.selection,
				time: event.time,
			},
		}
	}

	fn read_timestamp(&self) -> Result<Timestamp> {
		self.conn.change_window_attributes(
			self.window,
			&ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
		)?;
		// Appending nothing still generates a PropertyNotify carrying the server time.
		self.conn.change_property8(
			PropMode::APPEND,
			self.window,
			AtomEnum::WM_NAME,
			AtomEnum::STRING,
			&[],
		)?;
		self.conn.flush()?;

		let time = loop {
			match self.conn.wait_for_event()? {
				Event::PropertyNotify(event) if event.window == self.window => break event.time,
				event => log::trace!("ignoring {:?} while waiting for a timestamp", event),
			}
		};

		self.conn.change_window_attributes(
			self.window,
			&ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT),
		)?;
		self.conn.flush()?;
		Ok(time)
	}

	fn wait_for_event(&self) -> Result<SelectionEvent> {
		loop {
			match self.conn.wait_for_event()? {
				Event::SelectionRequest(event) => {
					let request = self.request_from(&event);
					if event.owner == self.window && event.selection == self.selection {
						return Ok(SelectionEvent::Request(request));
					}
					log::debug!("refusing request for a selection we do not own");
					self.send_response(&request, Response::Refused)?;
				}
				Event::SelectionClear(event)
					if event.owner == self.window && event.selection == self.selection =>
				{
					return Ok(SelectionEvent::OwnershipLost);
				}
				Event::ClientMessage(event)
					if event.window == self.window && event.type_ == self.atoms.CLIPOWNER_WAKE =>
				{
					return Ok(SelectionEvent::Wakeup);
				}
				// Usually a requestor that went away before its answer arrived.
				Event::Error(error) => log::warn!("X11 error: {:?}", error),
				event => log::trace!("ignoring {:?}", event),
			}
		}
	}

	fn send_response(&self, request: &Request, response: Response) -> Result<()> {
		let context = request.context;
		log::debug!(
			"answering 0x{:x} with {:?} bit units",
			context.requestor,
			response.unit_width()
		);

		let property = match PropertyWrite::for_response(response, context.property, &self.atoms) {
			Some(write) if !write.fits(self.conn.maximum_request_bytes()) => {
				// Without INCR the only honest answer is a refusal.
				log::warn!(
					"refusing to send {} bytes to 0x{:x}: larger than the maximum request size",
					write.data.len(),
					context.requestor
				);
				NONE
			}
			Some(write) => {
				self.conn.change_property(
					PropMode::REPLACE,
					context.requestor,
					write.property,
					write.type_,
					write.width,
					write.units()?,
					&write.data,
				)?;
				write.property
			}
			None => NONE,
		};

		let notify = SelectionNotifyEvent {
			response_type: SELECTION_NOTIFY_EVENT,
			sequence: 0,
			time: context.time,
			requestor: context.requestor,
			selection: context.selection,
			target: context.target,
			property,
		};
		self.conn.send_event(false, context.requestor, EventMask::NO_EVENT, notify)?;
		self.conn.flush()?;
		Ok(())
	}

	/// Lists the target names the current owner of the selection offers.
	///
	/// Returns an empty list if the selection has no owner.
	pub fn query_targets(&mut self) -> Result<Vec<String>, Error> {
		self.read_targets().map_err(|e| into_unknown("failed to query the selection targets", e))
	}

	fn read_targets(&self) -> Result<Vec<String>> {
		// Ideally this would use the time of the event that triggered the
		// query, but there is none.
		self.conn.convert_selection(
			self.window,
			self.selection,
			self.atoms.TARGETS,
			self.atoms.CLIPOWNER_DATA,
			CURRENT_TIME,
		)?;
		self.conn.flush()?;

		let property = loop {
			match self.conn.wait_for_event()? {
				Event::SelectionNotify(event) if event.requestor == self.window => {
					break event.property
				}
				event => log::trace!("ignoring {:?} while querying targets", event),
			}
		};
		if property == NONE {
			return Ok(Vec::new());
		}

		let reply = self
			.conn
			.get_property(true, self.window, property, AtomEnum::ANY, 0, u32::MAX / 4)?
			.reply()?;
		let Some(atoms) = reply.value32() else {
			log::warn!("selection owner answered TARGETS with {}-bit data", reply.format);
			return Ok(Vec::new());
		};
		atoms.map(|atom| self.atom_name(atom)).collect()
	}
}

impl SelectionBackend for X11Selection {
	type Waker = X11Waker;

	fn selection(&self) -> &str {
		self.kind.atom_name()
	}

	fn timestamp(&mut self) -> Result<Timestamp, Error> {
		self.read_timestamp().map_err(|e| into_unknown("failed to obtain a server timestamp", e))
	}

	fn claim(&mut self, time: Timestamp) -> Result<(), Error> {
		self.conn
			.set_selection_owner(self.window, self.selection, time)
			.and_then(|_| self.conn.flush())
			.map_err(|e| into_unknown("failed to set the selection owner", e))
	}

	fn is_owner(&mut self) -> Result<bool, Error> {
		let owner = self
			.conn
			.get_selection_owner(self.selection)
			.map_err(|e| into_unknown("failed to query the selection owner", e))?
			.reply()
			.map_err(|e| into_unknown("failed to query the selection owner", e))?
			.owner;
		Ok(owner == self.window)
	}

	fn next_event(&mut self) -> Result<SelectionEvent, Error> {
		self.wait_for_event().map_err(|e| into_unknown("failed to receive an X11 event", e))
	}

	fn respond(&mut self, request: &Request, response: Response) -> Result<(), Error> {
		self.send_response(request, response)
			.map_err(|e| into_unknown("failed to answer a selection request", e))
	}

	fn relinquish(&mut self, time: Timestamp) -> Result<(), Error> {
		self.conn
			.set_selection_owner(NONE, self.selection, time)
			.and_then(|_| self.conn.flush())
			.map_err(|e| into_unknown("failed to give up the selection", e))
	}

	fn waker(&self) -> Self::Waker {
		X11Waker {
			conn: Arc::clone(&self.conn),
			window: self.window,
			message: self.atoms.CLIPOWNER_WAKE,
		}
	}
}

/// Wakes an [`X11Selection`] by sending a client message to its window.
pub struct X11Waker {
	conn: Arc<RustConnection>,
	window: Window,
	message: Atom,
}

impl Wake for X11Waker {
	fn wake(&self) -> Result<(), Error> {
		let event = ClientMessageEvent::new(32, self.window, self.message, [0u32; 5]);
		self.conn
			.send_event(false, self.window, EventMask::NO_EVENT, event)
			.and_then(|_| self.conn.flush())
			.map_err(|e| into_unknown("failed to wake the selection owner", e))
	}
}
