//! One-shot and periodic timers.
//!
//! Scheduling and cancellation are queued as commands and applied on the next
//! reactor tick, never on the caller's stack.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use crate::error::SessionError;
use crate::orchestrator::Orchestrator;

/// Handle returned by `set_timeout` and `set_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

pub(crate) type TimerCallback = Box<dyn FnMut(&mut Orchestrator) -> Result<(), SessionError>>;

enum Command {
    Schedule {
        id: TimerId,
        delay: Duration,
        period: Option<Duration>,
        callback: TimerCallback,
    },
    Cancel(TimerId),
}

struct Armed {
    deadline: Instant,
    period: Option<Duration>,
    /// `None` while the callback is running.
    callback: Option<TimerCallback>,
}

#[derive(Default)]
pub(crate) struct Timers {
    next_id: u64,
    commands: VecDeque<Command>,
    armed: BTreeMap<TimerId, Armed>,
}

impl Timers {
    pub(crate) fn schedule(
        &mut self,
        delay: Duration,
        period: Option<Duration>,
        callback: TimerCallback,
    ) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.commands.push_back(Command::Schedule {
            id,
            delay,
            period,
            callback,
        });
        id
    }

    pub(crate) fn cancel(&mut self, id: TimerId) {
        self.commands.push_back(Command::Cancel(id));
    }

    /// Drop every queued command and armed timer.
    pub(crate) fn cancel_all(&mut self) {
        self.commands.clear();
        self.armed.clear();
    }

    /// Apply queued commands, arming new timers relative to `now`.
    pub(crate) fn apply_commands(&mut self, now: Instant) {
        while let Some(command) = self.commands.pop_front() {
            match command {
                Command::Schedule {
                    id,
                    delay,
                    period,
                    callback,
                } => {
                    self.armed.insert(
                        id,
                        Armed {
                            deadline: now + delay,
                            period,
                            callback: Some(callback),
                        },
                    );
                }
                Command::Cancel(id) => {
                    self.armed.remove(&id);
                }
            }
        }
    }

    /// Timers due at `now`, earliest first.
    pub(crate) fn due(&self, now: Instant) -> Vec<TimerId> {
        let mut due: Vec<_> = self
            .armed
            .iter()
            .filter(|(_, armed)| armed.deadline <= now)
            .map(|(id, armed)| (armed.deadline, *id))
            .collect();
        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }

    pub(crate) fn take_callback(&mut self, id: TimerId) -> Option<TimerCallback> {
        self.armed.get_mut(&id).and_then(|armed| armed.callback.take())
    }

    /// Re-arm a periodic timer or retire a one-shot after it fired.
    ///
    /// A timer cancelled while its callback ran is not re-armed.
    pub(crate) fn finish(&mut self, id: TimerId, callback: TimerCallback, now: Instant) {
        let Some(armed) = self.armed.get_mut(&id) else {
            return;
        };
        match armed.period {
            Some(period) => {
                armed.deadline = now + period;
                armed.callback = Some(callback);
            }
            None => {
                self.armed.remove(&id);
            }
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.armed.values().map(|armed| armed.deadline).min()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.commands.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.armed.len()
    }
}

impl std::fmt::Debug for Timers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timers")
            .field("armed", &self.armed.len())
            .field("queued", &self.commands.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TimerCallback {
        Box::new(|_| Ok(()))
    }

    #[test]
    fn test_schedule_is_deferred() {
        let mut timers = Timers::default();
        let now = Instant::now();

        timers.schedule(Duration::from_secs(1), None, noop());
        assert_eq!(timers.len(), 0);
        assert!(timers.has_pending());

        timers.apply_commands(now);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_due_in_deadline_order() {
        let mut timers = Timers::default();
        let now = Instant::now();

        let late = timers.schedule(Duration::from_millis(20), None, noop());
        let early = timers.schedule(Duration::from_millis(10), None, noop());
        let _future = timers.schedule(Duration::from_secs(60), None, noop());
        timers.apply_commands(now);

        assert!(timers.due(now).is_empty());
        assert_eq!(timers.due(now + Duration::from_millis(30)), vec![early, late]);
    }

    #[test]
    fn test_cancel_before_arming() {
        let mut timers = Timers::default();
        let id = timers.schedule(Duration::ZERO, None, noop());
        timers.cancel(id);
        timers.apply_commands(Instant::now());

        assert_eq!(timers.len(), 0);
    }

    #[test]
    fn test_finish_rearms_periodic_only() {
        let mut timers = Timers::default();
        let now = Instant::now();
        let once = timers.schedule(Duration::ZERO, None, noop());
        let every = timers.schedule(Duration::ZERO, Some(Duration::from_secs(5)), noop());
        timers.apply_commands(now);

        for id in timers.due(now) {
            let callback = timers.take_callback(id).unwrap();
            timers.finish(id, callback, now);
        }

        assert!(timers.take_callback(once).is_none());
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_secs(5)));
        assert!(timers.due(now).is_empty());
        assert!(timers.due(now + Duration::from_secs(5)).contains(&every));
    }

    #[test]
    fn test_cancel_all() {
        let mut timers = Timers::default();
        timers.schedule(Duration::ZERO, None, noop());
        timers.apply_commands(Instant::now());
        timers.schedule(Duration::ZERO, None, noop());

        timers.cancel_all();
        timers.apply_commands(Instant::now());
        assert_eq!(timers.len(), 0);
        assert!(timers.next_deadline().is_none());
    }
}
