//! Which split families show their children.
//!
//! A global [`ExpansionMode`] plus a set of parent ids decide the effective
//! expansion of every parent: in `Collapse` mode the listed parents are
//! collapsed and all others expanded, in `Expand` mode only the listed
//! parents are expanded. Flipping the mode starts a
//! transition anchored at a parent row: until the settle delay elapses, rows
//! above the anchor keep the old layout and rows from the anchor down use the
//! new one, so the view can animate a wavefront instead of re-laying out the
//! whole table at once.

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    rc::Rc,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{EngineError, Transaction, TxId};

/// Wait after a mode switch before the transition is considered finished.
pub const SETTLE_DELAY: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionMode {
    Expand,
    #[default]
    Collapse,
}

impl ExpansionMode {
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Expand => Self::Collapse,
            Self::Collapse => Self::Expand,
        }
    }
}

/// Persisted part of the state: mode and overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionSnapshot {
    pub mode: ExpansionMode,
    #[serde(default)]
    pub override_ids: BTreeSet<TxId>,
}

impl ExpansionSnapshot {
    #[must_use]
    pub fn is_expanded(&self, id: &TxId) -> bool {
        effective(self.mode, &self.override_ids, id)
    }
}

fn effective(mode: ExpansionMode, override_ids: &BTreeSet<TxId>, id: &TxId) -> bool {
    match mode {
        ExpansionMode::Collapse => !override_ids.contains(id),
        ExpansionMode::Expand => override_ids.contains(id),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitExpansionState {
    pub mode: ExpansionMode,
    pub override_ids: BTreeSet<TxId>,
    pub transitioning_id: Option<TxId>,
    /// Layout before the in-flight mode switch; only set while transitioning.
    previous: Option<ExpansionSnapshot>,
}

impl SplitExpansionState {
    #[must_use]
    pub fn from_snapshot(snapshot: ExpansionSnapshot) -> Self {
        Self {
            mode: snapshot.mode,
            override_ids: snapshot.override_ids,
            transitioning_id: None,
            previous: None,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ExpansionSnapshot {
        ExpansionSnapshot {
            mode: self.mode,
            override_ids: self.override_ids.clone(),
        }
    }

    /// Effective expansion under the current mode.
    #[must_use]
    pub fn is_expanded(&self, id: &TxId) -> bool {
        effective(self.mode, &self.override_ids, id)
    }

    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.transitioning_id.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpansionAction {
    /// Flip the override of one parent.
    Toggle(TxId),
    /// Make sure a freshly split parent shows its children.
    OpenOnSplit(TxId),
    /// Flip the global mode, anchored at the topmost visible parent. Without
    /// an anchor there is nothing to animate and the switch settles at once.
    SwitchMode { anchor: Option<TxId> },
    FinishTransition,
}

/// Pure transition function.
#[must_use]
pub fn reduce(state: &SplitExpansionState, action: &ExpansionAction) -> SplitExpansionState {
    let mut next = state.clone();
    match action {
        ExpansionAction::Toggle(id) => {
            if !next.override_ids.remove(id) {
                next.override_ids.insert(id.clone());
            }
        }
        ExpansionAction::OpenOnSplit(id) => match next.mode {
            ExpansionMode::Collapse => {
                next.override_ids.remove(id);
            }
            ExpansionMode::Expand => {
                next.override_ids.insert(id.clone());
            }
        },
        ExpansionAction::SwitchMode { anchor } => {
            // One switch at a time; later requests are dropped.
            if state.transitioning_id.is_some() {
                return next;
            }
            next.mode = state.mode.flipped();
            next.override_ids.clear();
            if anchor.is_some() {
                next.previous = Some(state.snapshot());
                next.transitioning_id.clone_from(anchor);
            }
        }
        ExpansionAction::FinishTransition => {
            next.transitioning_id = None;
            next.previous = None;
        }
    }
    next
}

/// External store of the expansion layout, read once at creation.
pub trait ExpansionCache {
    fn read(&self) -> Option<ExpansionSnapshot>;
    fn write(&mut self, snapshot: &ExpansionSnapshot) -> Result<(), EngineError>;
}

/// In-process cache; clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    slot: Rc<RefCell<Option<ExpansionSnapshot>>>,
    writes: Rc<RefCell<usize>>,
}

impl MemoryCache {
    #[must_use]
    pub fn with_snapshot(snapshot: ExpansionSnapshot) -> Self {
        let cache = Self::default();
        *cache.slot.borrow_mut() = Some(snapshot);
        cache
    }

    #[must_use]
    pub fn stored(&self) -> Option<ExpansionSnapshot> {
        self.slot.borrow().clone()
    }

    #[must_use]
    pub fn writes(&self) -> usize {
        *self.writes.borrow()
    }
}

impl ExpansionCache for MemoryCache {
    fn read(&self) -> Option<ExpansionSnapshot> {
        self.stored()
    }

    fn write(&mut self, snapshot: &ExpansionSnapshot) -> Result<(), EngineError> {
        *self.slot.borrow_mut() = Some(snapshot.clone());
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}

/// Expansion state bound to its cache and settle timer.
pub struct SplitExpansion {
    state: SplitExpansionState,
    cache: Box<dyn ExpansionCache>,
    settle_delay: Duration,
    settle_at: Option<Instant>,
    last_written: ExpansionSnapshot,
    torn_down: bool,
}

impl std::fmt::Debug for SplitExpansion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitExpansion")
            .field("state", &self.state)
            .field("settle_at", &self.settle_at)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl SplitExpansion {
    /// Restores the cached layout, or the default (everything expanded).
    pub fn new(cache: Box<dyn ExpansionCache>, settle_delay: Duration) -> Self {
        let snapshot = cache.read().unwrap_or_default();
        Self {
            state: SplitExpansionState::from_snapshot(snapshot.clone()),
            cache,
            settle_delay,
            settle_at: None,
            last_written: snapshot,
            torn_down: false,
        }
    }

    pub fn state(&self) -> &SplitExpansionState {
        &self.state
    }

    pub fn is_expanded(&self, id: &TxId) -> bool {
        self.state.is_expanded(id)
    }

    /// Deadline of the pending settle, if a transition is in flight.
    pub fn settle_deadline(&self) -> Option<Instant> {
        self.settle_at
    }

    pub fn dispatch(&mut self, action: ExpansionAction) {
        if self.torn_down {
            return;
        }
        self.state = reduce(&self.state, &action);
        self.persist();
    }

    pub fn toggle(&mut self, id: &TxId) {
        self.dispatch(ExpansionAction::Toggle(id.clone()));
    }

    pub fn open_on_split(&mut self, id: &TxId) {
        self.dispatch(ExpansionAction::OpenOnSplit(id.clone()));
    }

    /// Starts a mode switch; returns `false` when one is already in flight.
    ///
    /// With no anchor the new mode applies and persists immediately.
    pub fn switch_mode(&mut self, anchor: Option<&TxId>, now: Instant) -> bool {
        if self.torn_down || self.state.is_transitioning() {
            debug!(?anchor, "mode switch dropped, transition in flight");
            return false;
        }
        self.dispatch(ExpansionAction::SwitchMode {
            anchor: anchor.cloned(),
        });
        if anchor.is_some() {
            self.settle_at = Some(now + self.settle_delay);
        }
        true
    }

    /// Fires the settle timer once due. Returns `true` when it fired.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.torn_down {
            return false;
        }
        match self.settle_at {
            Some(due) if due <= now => {
                self.settle_at = None;
                self.dispatch(ExpansionAction::FinishTransition);
                true
            }
            _ => false,
        }
    }

    /// Stops persisting; a timer firing later is ignored.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.settle_at = None;
    }

    /// Filters `rows` (display order, children right after their parent)
    /// down to the visible ones.
    pub fn visible<'a>(&self, rows: &'a [Transaction]) -> Vec<&'a Transaction> {
        let parent_order: HashMap<&TxId, usize> = rows
            .iter()
            .filter(|tx| tx.is_parent)
            .enumerate()
            .map(|(index, tx)| (&tx.id, index))
            .collect();
        let wavefront = self
            .state
            .transitioning_id
            .as_ref()
            .and_then(|anchor| parent_order.get(anchor).copied())
            .zip(self.state.previous.as_ref());

        rows.iter()
            .filter(|tx| {
                let Some(parent_id) = &tx.parent_id else {
                    return true;
                };
                match (wavefront, parent_order.get(parent_id)) {
                    (Some((anchor, previous)), Some(index)) if *index < anchor => {
                        previous.is_expanded(parent_id)
                    }
                    _ => self.state.is_expanded(parent_id),
                }
            })
            .collect()
    }

    fn persist(&mut self) {
        if self.state.is_transitioning() {
            return;
        }
        let snapshot = self.state.snapshot();
        if snapshot == self.last_written {
            return;
        }
        match self.cache.write(&snapshot) {
            Ok(()) => self.last_written = snapshot,
            Err(err) => warn!("failed to persist expansion state: {err}"),
        }
    }
}
