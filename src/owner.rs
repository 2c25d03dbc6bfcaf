/*
SPDX-License-Identifier: Apache-2.0 OR MIT

Copyright 2024 The Clipowner contributors

The project to which this file belongs is licensed under either of
the Apache 2.0 or the MIT license at the licensee's choice. The terms
and conditions of the chosen license apply to this file.
*/

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

use crate::{
	backend::{Response, SelectionBackend, SelectionEvent, Target, Timestamp, Wake},
	common::Error,
	ResolvedOffer,
};

/// Where an ownership session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	/// Nothing has been claimed yet, or the last claim failed.
	Idle,
	/// Waiting for the timestamp needed to claim the selection.
	OwnershipPending,
	/// The selection is owned and requests are being served.
	Owning,
	/// Ownership was given up on request.
	Released,
	/// Another client took the selection.
	Lost,
}

/// Why [`SelectionOwner::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
	/// Another client took the selection. This is how a copy normally ends.
	Lost,
	/// A [`ShutdownHandle`] released the selection.
	Released,
}

/// Claims a selection and serves the formats of a [`ResolvedOffer`] until
/// ownership ends.
///
/// Content is rendered only when a peer asks for it, and every request is
/// answered exactly once.
pub struct SelectionOwner<B: SelectionBackend> {
	backend: B,
	offer: ResolvedOffer,
	state: SessionState,
	claimed_at: Option<Timestamp>,
	shutdown: Arc<AtomicBool>,
}

impl<B: SelectionBackend> SelectionOwner<B> {
	pub fn new(backend: B, offer: ResolvedOffer) -> Self {
		Self {
			backend,
			offer,
			state: SessionState::Idle,
			claimed_at: None,
			shutdown: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn offer(&self) -> &ResolvedOffer {
		&self.offer
	}

	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Returns a handle that can end [`SelectionOwner::serve`] from another
	/// thread.
	pub fn shutdown_handle(&self) -> ShutdownHandle<B::Waker> {
		ShutdownHandle { flag: Arc::clone(&self.shutdown), waker: self.backend.waker() }
	}

	/// Takes ownership of the selection.
	///
	/// The claim uses a fresh server timestamp rather than "current time" so
	/// that it is ordered correctly against concurrent claims. If the
	/// windowing system names another owner afterwards, this fails with
	/// [`Error::OwnershipClaim`] and nothing is retried.
	///
	/// Only an [`SessionState::Idle`] owner can claim; any other state fails
	/// with [`Error::AlreadyClaimed`] and is left unchanged.
	pub fn claim(&mut self) -> Result<(), Error> {
		if self.state != SessionState::Idle {
			return Err(Error::AlreadyClaimed);
		}
		self.state = SessionState::OwnershipPending;
		match self.try_claim() {
			Ok(time) => {
				self.claimed_at = Some(time);
				self.state = SessionState::Owning;
				log::info!("took ownership of the {} selection", self.backend.selection());
				Ok(())
			}
			Err(e) => {
				self.state = SessionState::Idle;
				Err(e)
			}
		}
	}

	fn try_claim(&mut self) -> Result<Timestamp, Error> {
		let time = self.backend.timestamp()?;
		log::trace!("claiming the {} selection at {}", self.backend.selection(), time);
		self.backend.claim(time)?;
		if !self.backend.is_owner()? {
			let selection = self.backend.selection().to_owned();
			log::error!("could not take ownership of the {} selection", selection);
			return Err(Error::OwnershipClaim { selection });
		}
		Ok(time)
	}

	/// Answers requests until ownership is lost or released.
	///
	/// Blocks indefinitely between requests. Failing to render or deliver a
	/// single response does not end the loop; failing to receive events does.
	pub fn serve(&mut self) -> Result<SessionEnd, Error> {
		if self.state != SessionState::Owning {
			return Err(Error::NotOwning);
		}

		loop {
			match self.backend.next_event()? {
				SelectionEvent::Request(request) => {
					let response = self.respond_to(&request.target);
					if let Err(e) = self.backend.respond(&request, response) {
						log::error!("failed to answer the request for {:?}: {}", request.target, e);
					}
				}
				SelectionEvent::OwnershipLost => {
					log::info!("lost ownership of the {} selection", self.backend.selection());
					self.state = SessionState::Lost;
					return Ok(SessionEnd::Lost);
				}
				SelectionEvent::Wakeup => {
					if !self.shutdown.load(Ordering::Acquire) {
						log::trace!("spurious wakeup");
						continue;
					}
					self.release()?;
					return Ok(SessionEnd::Released);
				}
			}
		}
	}

	/// Claims the selection, then serves it.
	pub fn run(&mut self) -> Result<SessionEnd, Error> {
		self.claim()?;
		self.serve()
	}

	fn release(&mut self) -> Result<(), Error> {
		if let Some(time) = self.claimed_at.take() {
			self.backend.relinquish(time)?;
		}
		log::info!("released the {} selection", self.backend.selection());
		self.state = SessionState::Released;
		Ok(())
	}

	/// Builds the answer to a request for `target`.
	///
	/// Content is rendered here, on every call, never ahead of time.
	pub fn respond_to(&self, target: &Target) -> Response {
		match target {
			Target::Formats => Response::Formats(self.offer.formats().collect()),
			Target::Content(format) if self.offer.contains(*format) => {
				match self.offer.render(*format) {
					Ok(bytes) => Response::Data { format: *format, bytes },
					Err(e) => {
						log::error!("failed to render {}: {}", format, e);
						Response::Refused
					}
				}
			}
			Target::Content(format) => {
				log::warn!("refusing conversion to {}", format.target_name());
				Response::Refused
			}
			Target::Other(name) => {
				log::warn!("refusing conversion to {}", name);
				Response::Refused
			}
		}
	}
}

/// Ends a [`SelectionOwner::serve`] loop from another thread.
pub struct ShutdownHandle<W> {
	flag: Arc<AtomicBool>,
	waker: W,
}

impl<W: Wake> ShutdownHandle<W> {
	/// Asks the owner to give up the selection.
	///
	/// Returns once the request is delivered; the owner relinquishes the
	/// selection the next time its loop wakes up.
	pub fn release(&self) -> Result<(), Error> {
		self.flag.store(true, Ordering::Release);
		self.waker.wake()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;

	use super::*;
	use crate::{backend::Request, platform::MockSelection, resolve, ContentFormat, ContentSource};

	fn counting_offer(calls: &Arc<AtomicUsize>) -> ResolvedOffer {
		let counter = Arc::clone(calls);
		let source = ContentSource::new("counter").with(ContentFormat::PlainText, move || {
			counter.fetch_add(1, Ordering::SeqCst);
			b"hello".to_vec()
		});
		resolve(&[], vec![source]).unwrap()
	}

	#[test]
	fn claim_then_serve_until_lost() {
		let calls = Arc::new(AtomicUsize::new(0));
		let mock = MockSelection::new();
		let mut owner = SelectionOwner::new(mock.clone(), counting_offer(&calls));
		assert_eq!(owner.state(), SessionState::Idle);

		owner.claim().unwrap();
		assert_eq!(owner.state(), SessionState::Owning);
		assert_eq!(mock.claimed_at(), Some(mock.current_time()));

		mock.push_request(1, Target::Content(ContentFormat::PlainText));
		mock.push_ownership_lost();
		assert_eq!(owner.serve().unwrap(), SessionEnd::Lost);
		assert_eq!(owner.state(), SessionState::Lost);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn rendering_is_lazy() {
		let calls = Arc::new(AtomicUsize::new(0));
		let owner = SelectionOwner::new(MockSelection::new(), counting_offer(&calls));
		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert_eq!(
			owner.respond_to(&Target::Formats),
			Response::Formats(vec![ContentFormat::PlainText])
		);
		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert_eq!(
			owner.respond_to(&Target::Content(ContentFormat::PlainText)),
			Response::Data { format: ContentFormat::PlainText, bytes: b"hello".to_vec() }
		);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn refused_claim() {
		let calls = Arc::new(AtomicUsize::new(0));
		let mock = MockSelection::new().refuse_claims();
		let mut owner = SelectionOwner::new(mock.clone(), counting_offer(&calls));
		match owner.run() {
			Err(Error::OwnershipClaim { selection }) => assert_eq!(selection, "CLIPBOARD"),
			other => panic!("unexpected result: {other:?}"),
		}
		assert_eq!(owner.state(), SessionState::Idle);
		assert!(mock.responses().is_empty());
	}

	#[test]
	fn serve_requires_ownership() {
		let calls = Arc::new(AtomicUsize::new(0));
		let mut owner = SelectionOwner::new(MockSelection::new(), counting_offer(&calls));
		assert!(matches!(owner.serve(), Err(Error::NotOwning)));
	}

	#[test]
	fn spurious_wakeups_are_ignored() {
		let calls = Arc::new(AtomicUsize::new(0));
		let mock = MockSelection::new();
		let mut owner = SelectionOwner::new(mock.clone(), counting_offer(&calls));
		owner.claim().unwrap();

		owner.backend().waker().wake().unwrap();
		mock.push_request(2, Target::Formats);
		mock.push_ownership_lost();
		assert_eq!(owner.serve().unwrap(), SessionEnd::Lost);
		assert_eq!(mock.responses().len(), 1);
		assert_eq!(mock.relinquished_at(), None);
	}

	#[test]
	fn second_claim_is_rejected() {
		let calls = Arc::new(AtomicUsize::new(0));
		let mock = MockSelection::new();
		let mut owner = SelectionOwner::new(mock.clone(), counting_offer(&calls));
		owner.claim().unwrap();
		let first = mock.claimed_at();

		assert!(matches!(owner.claim(), Err(Error::AlreadyClaimed)));
		assert_eq!(owner.state(), SessionState::Owning);
		assert_eq!(mock.claimed_at(), first);
		assert_eq!(mock.current_time(), 1);
	}

	#[test]
	fn ended_session_cannot_claim_again() {
		let calls = Arc::new(AtomicUsize::new(0));
		let mock = MockSelection::new();
		let mut owner = SelectionOwner::new(mock.clone(), counting_offer(&calls));
		mock.push_ownership_lost();
		assert_eq!(owner.run().unwrap(), SessionEnd::Lost);

		assert!(matches!(owner.claim(), Err(Error::AlreadyClaimed)));
		assert_eq!(owner.state(), SessionState::Lost);
	}

	/// Fails to deliver any data larger than `limit` bytes, the way a
	/// connection rejects requests over its maximum length.
	struct Limited {
		inner: MockSelection,
		limit: usize,
	}

	impl SelectionBackend for Limited {
		type Waker = MockSelection;

		fn selection(&self) -> &str {
			self.inner.selection()
		}

		fn timestamp(&mut self) -> Result<Timestamp, Error> {
			self.inner.timestamp()
		}

		fn claim(&mut self, time: Timestamp) -> Result<(), Error> {
			self.inner.claim(time)
		}

		fn is_owner(&mut self) -> Result<bool, Error> {
			self.inner.is_owner()
		}

		fn next_event(&mut self) -> Result<SelectionEvent, Error> {
			self.inner.next_event()
		}

		fn respond(&mut self, request: &Request, response: Response) -> Result<(), Error> {
			let too_long = matches!(&response, Response::Data { bytes, .. } if bytes.len() > self.limit);
			if too_long {
				return Err(Error::Unknown { description: "maximum request length exceeded".into() });
			}
			self.inner.respond(request, response)
		}

		fn relinquish(&mut self, time: Timestamp) -> Result<(), Error> {
			self.inner.relinquish(time)
		}

		fn waker(&self) -> Self::Waker {
			self.inner.waker()
		}
	}

	#[test]
	fn failed_response_does_not_end_the_loop() {
		let calls = Arc::new(AtomicUsize::new(0));
		let mock = MockSelection::new();
		let backend = Limited { inner: mock.clone(), limit: 4 };
		let mut owner = SelectionOwner::new(backend, counting_offer(&calls));

		mock.push_request(1, Target::Content(ContentFormat::PlainText));
		mock.push_request(2, Target::Formats);
		mock.push_ownership_lost();
		assert_eq!(owner.run().unwrap(), SessionEnd::Lost);

		let responses = mock.responses();
		assert_eq!(responses.len(), 1);
		assert_eq!(responses[0].0.context.requestor, 2);
		assert_eq!(responses[0].1, Response::Formats(vec![ContentFormat::PlainText]));
		assert_eq!(mock.pending_events(), 0);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
