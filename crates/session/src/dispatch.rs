//! Tag to ordered handler list.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use torchat_primitives::OnionId;

use crate::error::SessionError;
use crate::event::{Event, EventTag};
use crate::orchestrator::Orchestrator;

/// Reacts to one dispatched event.
///
/// Implemented for every `FnMut(&mut Orchestrator, &Event) -> Result<(), SessionError>`.
pub trait Handler {
    fn handle(&mut self, orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError>;
}

impl<F> Handler for F
where
    F: FnMut(&mut Orchestrator, &Event) -> Result<(), SessionError>,
{
    fn handle(&mut self, orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
        self(orchestrator, event)
    }
}

/// Runs the wrapped handler only for events concerning one peer.
pub(crate) struct PeerFilter<H> {
    pub(crate) peer: OnionId,
    pub(crate) inner: H,
}

impl<H: Handler> Handler for PeerFilter<H> {
    fn handle(&mut self, orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
        if event.peer() != Some(&self.peer) {
            return Ok(());
        }
        self.inner.handle(orchestrator, event)
    }
}

pub(crate) type SharedHandler = Rc<RefCell<dyn Handler>>;

/// Handlers per tag, invoked in registration order. Duplicates are kept.
#[derive(Default)]
pub(crate) struct HandlerTable {
    handlers: HashMap<EventTag, Vec<SharedHandler>>,
}

impl HandlerTable {
    pub(crate) fn on(&mut self, tag: EventTag, handler: SharedHandler) {
        self.handlers.entry(tag).or_default().push(handler);
    }

    /// The handlers registered for `tag` right now.
    ///
    /// The table keeps its entries, so a nested dispatch of the same tag sees
    /// every handler that is not itself running.
    pub(crate) fn snapshot(&self, tag: EventTag) -> Vec<SharedHandler> {
        self.handlers.get(&tag).cloned().unwrap_or_default()
    }

    pub(crate) fn count(&self, tag: EventTag) -> usize {
        self.handlers.get(&tag).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (tag, list) in &self.handlers {
            map.entry(&tag.to_string(), &list.len());
        }
        map.finish()
    }
}
