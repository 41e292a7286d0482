//! Exclusivity coordinator
//!
//! One coordinator per page decides which single player may be audible.
//! It holds the current holder weakly: a player that goes away without
//! releasing simply stops counting as a holder.
//!
//! All calls happen on the page's event loop. `acquire` never holds its own
//! borrow while telling the previous holder to pause, so the previous
//! holder's `release` during that pause is safe (and finds itself stale).

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::engine::events::PlayerId;
use crate::error::ChirpError;

/// Something that can be told to give up the audible slot
pub trait SlotHolder {
    /// Pause because another player took the slot
    fn yield_slot(&self);
}

/// Proof of holding the audible slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExclusivityToken {
    serial: u64,
    player: PlayerId,
}

impl ExclusivityToken {
    /// Player the token was granted to
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Grant number, unique per coordinator
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

struct Slot {
    token: ExclusivityToken,
    holder: Weak<dyn SlotHolder>,
}

#[derive(Default)]
struct Inner {
    slot: RefCell<Option<Slot>>,
    next_serial: Cell<u64>,
}

/// Page-wide arbiter of the single audible player
///
/// Cloning yields another handle to the same coordinator.
#[derive(Clone, Default)]
pub struct ExclusivityCoordinator {
    inner: Rc<Inner>,
}

impl ExclusivityCoordinator {
    /// Create a coordinator with an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the audible slot for `player`
    ///
    /// A different live holder is told to pause before the new token is
    /// granted. Acquiring again for the current holder returns its token.
    pub fn acquire(&self, player: PlayerId, holder: Weak<dyn SlotHolder>) -> ExclusivityToken {
        let previous = {
            let mut slot = self.inner.slot.borrow_mut();
            if let Some(current) = slot.as_ref() {
                if current.token.player == player {
                    return current.token;
                }
            }
            slot.take()
        };

        if let Some(previous) = previous {
            match previous.holder.upgrade() {
                Some(holder) => {
                    debug!(
                        from = %previous.token.player,
                        to = %player,
                        "audible slot handed over"
                    );
                    holder.yield_slot();
                }
                None => debug!(from = %previous.token.player, "previous holder already gone"),
            }
        }

        let serial = self.inner.next_serial.get() + 1;
        self.inner.next_serial.set(serial);
        let token = ExclusivityToken { serial, player };

        *self.inner.slot.borrow_mut() = Some(Slot { token, holder });
        token
    }

    /// Give the slot back
    ///
    /// Only clears the slot if `token` is still the current one; returns
    /// whether it did. A stale token is logged and otherwise ignored.
    pub fn release(&self, token: ExclusivityToken) -> bool {
        let mut slot = self.inner.slot.borrow_mut();
        match slot.as_ref() {
            Some(current) if current.token == token => {
                *slot = None;
                true
            }
            _ => {
                let stale = ChirpError::StaleTokenRelease {
                    serial: token.serial,
                };
                debug!(player = %token.player, "{}", stale);
                false
            }
        }
    }

    /// Player currently holding the slot, if it is still alive
    pub fn holder(&self) -> Option<PlayerId> {
        self.inner
            .slot
            .borrow()
            .as_ref()
            .filter(|slot| slot.holder.strong_count() > 0)
            .map(|slot| slot.token.player)
    }

    /// Whether `token` is the current grant
    pub fn is_current(&self, token: ExclusivityToken) -> bool {
        self.inner
            .slot
            .borrow()
            .as_ref()
            .is_some_and(|slot| slot.token == token)
    }
}

impl std::fmt::Debug for ExclusivityCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusivityCoordinator")
            .field("holder", &self.holder())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Holder that releases its own token when told to yield, like a player
    struct Probe {
        coordinator: ExclusivityCoordinator,
        token: Cell<Option<ExclusivityToken>>,
        yielded: Cell<u32>,
    }

    impl SlotHolder for Probe {
        fn yield_slot(&self) {
            self.yielded.set(self.yielded.get() + 1);
            if let Some(token) = self.token.take() {
                self.coordinator.release(token);
            }
        }
    }

    fn probe(coordinator: &ExclusivityCoordinator) -> Rc<Probe> {
        Rc::new(Probe {
            coordinator: coordinator.clone(),
            token: Cell::new(None),
            yielded: Cell::new(0),
        })
    }

    fn acquire(coordinator: &ExclusivityCoordinator, id: PlayerId, p: &Rc<Probe>) {
        let weak: Weak<Probe> = Rc::downgrade(p);
        let token = coordinator.acquire(id, weak);
        p.token.set(Some(token));
    }

    #[test]
    fn test_acquire_pauses_previous_holder() {
        let coordinator = ExclusivityCoordinator::new();
        let (a, b) = (PlayerId::new(), PlayerId::new());
        let (pa, pb) = (probe(&coordinator), probe(&coordinator));

        acquire(&coordinator, a, &pa);
        assert_eq!(coordinator.holder(), Some(a));

        acquire(&coordinator, b, &pb);
        assert_eq!(pa.yielded.get(), 1);
        assert_eq!(pb.yielded.get(), 0);
        assert_eq!(coordinator.holder(), Some(b));
    }

    #[test]
    fn test_reacquire_by_holder_is_noop() {
        let coordinator = ExclusivityCoordinator::new();
        let a = PlayerId::new();
        let pa = probe(&coordinator);

        let first = coordinator.acquire(a, Rc::downgrade(&pa) as Weak<dyn SlotHolder>);
        let second = coordinator.acquire(a, Rc::downgrade(&pa) as Weak<dyn SlotHolder>);
        assert_eq!(first, second);
        assert_eq!(pa.yielded.get(), 0);
    }

    #[test]
    fn test_stale_release_is_ignored() {
        let coordinator = ExclusivityCoordinator::new();
        let (a, b) = (PlayerId::new(), PlayerId::new());
        let (pa, pb) = (probe(&coordinator), probe(&coordinator));

        let stale = coordinator.acquire(a, Rc::downgrade(&pa) as Weak<dyn SlotHolder>);
        acquire(&coordinator, b, &pb);

        assert!(!coordinator.release(stale));
        assert_eq!(coordinator.holder(), Some(b));
    }

    #[test]
    fn test_release_clears_slot_once() {
        let coordinator = ExclusivityCoordinator::new();
        let a = PlayerId::new();
        let pa = probe(&coordinator);

        let token = coordinator.acquire(a, Rc::downgrade(&pa) as Weak<dyn SlotHolder>);
        assert!(coordinator.is_current(token));
        assert!(coordinator.release(token));
        assert!(!coordinator.release(token));
        assert_eq!(coordinator.holder(), None);
    }

    #[test]
    fn test_dropped_holder_does_not_count() {
        let coordinator = ExclusivityCoordinator::new();
        let (a, b) = (PlayerId::new(), PlayerId::new());
        let pa = probe(&coordinator);
        acquire(&coordinator, a, &pa);
        drop(pa);
        assert_eq!(coordinator.holder(), None);

        // handing over from a dead holder must not panic
        let pb = probe(&coordinator);
        acquire(&coordinator, b, &pb);
        assert_eq!(coordinator.holder(), Some(b));
    }

    #[test]
    fn test_serials_increase() {
        let coordinator = ExclusivityCoordinator::new();
        let a = PlayerId::new();
        let pa = probe(&coordinator);
        let first = coordinator.acquire(a, Rc::downgrade(&pa) as Weak<dyn SlotHolder>);
        coordinator.release(first);
        let second = coordinator.acquire(a, Rc::downgrade(&pa) as Weak<dyn SlotHolder>);
        assert!(second.serial() > first.serial());
    }
}
