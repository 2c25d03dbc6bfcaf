use std::{collections::VecDeque, sync::Arc};

use parking_lot::{Condvar, Mutex};

use crate::{
	backend::{
		Request, RequestContext, Response, SelectionBackend, SelectionEvent, Target, Timestamp,
		Wake,
	},
	common::Error,
};

const SELECTION: &str = "CLIPBOARD";

/// An in-memory selection for tests.
///
/// Clones share the same state, so a test can keep one handle to script
/// events and inspect responses while the owner drives another.
/// [`SelectionBackend::next_event`] blocks until an event is pushed.
#[derive(Clone, Default)]
pub struct MockSelection {
	inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
	state: Mutex<State>,
	pushed: Condvar,
}

#[derive(Default)]
struct State {
	time: Timestamp,
	refuse_claims: bool,
	owned: bool,
	claimed_at: Option<Timestamp>,
	relinquished_at: Option<Timestamp>,
	events: VecDeque<SelectionEvent>,
	responses: Vec<(Request, Response)>,
}

impl MockSelection {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every claim look like it lost a race against another client.
	pub fn refuse_claims(self) -> Self {
		self.inner.state.lock().refuse_claims = true;
		self
	}

	/// The last timestamp handed out.
	pub fn current_time(&self) -> Timestamp {
		self.inner.state.lock().time
	}

	pub fn claimed_at(&self) -> Option<Timestamp> {
		self.inner.state.lock().claimed_at
	}

	pub fn relinquished_at(&self) -> Option<Timestamp> {
		self.inner.state.lock().relinquished_at
	}

	/// Queues a request from the peer `requestor`.
	///
	/// The peer asks for the answer to be stored in a property with the same
	/// id as the requestor.
	pub fn push_request(&self, requestor: u32, target: Target) {
		let time = self.current_time();
		let context = RequestContext { requestor, property: requestor, target: 0, selection: 0, time };
		self.push_event(SelectionEvent::Request(Request { target, context }));
	}

	pub fn push_ownership_lost(&self) {
		self.push_event(SelectionEvent::OwnershipLost);
	}

	pub fn push_event(&self, event: SelectionEvent) {
		let mut state = self.inner.state.lock();
		if event == SelectionEvent::OwnershipLost {
			state.owned = false;
		}
		state.events.push_back(event);
		self.inner.pushed.notify_all();
	}

	/// Events that were pushed but never consumed.
	pub fn pending_events(&self) -> usize {
		self.inner.state.lock().events.len()
	}

	/// Every response sent so far, with the request it answered.
	pub fn responses(&self) -> Vec<(Request, Response)> {
		self.inner.state.lock().responses.clone()
	}
}

impl SelectionBackend for MockSelection {
	type Waker = MockSelection;

	fn selection(&self) -> &str {
		SELECTION
	}

	fn timestamp(&mut self) -> Result<Timestamp, Error> {
		let mut state = self.inner.state.lock();
		state.time += 1;
		Ok(state.time)
	}

	fn claim(&mut self, time: Timestamp) -> Result<(), Error> {
		let mut state = self.inner.state.lock();
		if !state.refuse_claims {
			state.owned = true;
			state.claimed_at = Some(time);
		}
		Ok(())
	}

	fn is_owner(&mut self) -> Result<bool, Error> {
		Ok(self.inner.state.lock().owned)
	}

	fn next_event(&mut self) -> Result<SelectionEvent, Error> {
		let mut state = self.inner.state.lock();
		loop {
			if let Some(event) = state.events.pop_front() {
				return Ok(event);
			}
			self.inner.pushed.wait(&mut state);
		}
	}

	fn respond(&mut self, request: &Request, response: Response) -> Result<(), Error> {
		self.inner.state.lock().responses.push((request.clone(), response));
		Ok(())
	}

	fn relinquish(&mut self, time: Timestamp) -> Result<(), Error> {
		let mut state = self.inner.state.lock();
		state.owned = false;
		state.relinquished_at = Some(time);
		Ok(())
	}

	fn waker(&self) -> Self::Waker {
		self.clone()
	}
}

impl Wake for MockSelection {
	fn wake(&self) -> Result<(), Error> {
		self.push_event(SelectionEvent::Wakeup);
		Ok(())
	}
}
