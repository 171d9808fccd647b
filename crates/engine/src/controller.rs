//! Coordinates the draft buffer, split expansion and focus for one table.
//!
//! The controller is a single logical actor: user intents and timer ticks are
//! processed one at a time. The only asynchronous boundary is the store; a
//! draft commit holds an in-progress token for its duration and any further
//! commit request is parked as a single after-save continuation.

use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{
    Codec, Currency, DisplayTransaction, EngineError, ExpansionCache, ResultEngine, SplitExpansion,
    Transaction, TransactionPatch, TxId,
    expansion::SETTLE_DELAY,
    navigator::{Columns, Field, Focus, Navigator},
    reference::ReferenceData,
    staging::{Diff, StagingBuffer, recalculate_family},
    store::TransactionStore,
};

const ACCOUNT_REQUIRED: &str = "Account is a required field";
const SPLIT_UNBALANCED: &str = "Split amounts do not add up to the total";

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub columns: Columns,
    pub currency: Currency,
    /// Where a zero amount is shown on top-level rows.
    pub show_zero_in_deposit: bool,
    pub settle_delay: Duration,
    /// Account given to fresh drafts when nothing was entered before.
    pub default_account: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            columns: Columns::default(),
            currency: Currency::default(),
            show_zero_in_deposit: false,
            settle_delay: SETTLE_DELAY,
            default_account: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    Draft,
    Committed,
}

/// Work deferred until the in-flight draft commit settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AfterSave {
    Enter { force: bool },
    CommitDraft { force: bool },
}

/// A draft family handed to the store; returned to
/// [`TableController::complete_commit`] once the store answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitTicket {
    family: TxId,
    pub rows: Vec<Transaction>,
}

pub struct TableController<S> {
    store: S,
    config: ControllerConfig,
    codec: Codec,
    reference: ReferenceData,
    committed: Vec<Transaction>,
    draft: StagingBuffer,
    expansion: SplitExpansion,
    navigator: Navigator,
    selected: BTreeSet<TxId>,
    pending: Option<TxId>,
    after_save: Option<AfterSave>,
    notifications: Vec<Notification>,
    last_date: Option<NaiveDate>,
}

impl<S: TransactionStore> TableController<S> {
    pub fn new(store: S, cache: Box<dyn ExpansionCache>, config: ControllerConfig) -> Self {
        let draft = StagingBuffer::new(Transaction::draft(config.default_account.clone(), None));
        Self {
            store,
            codec: Codec::new(config.currency),
            reference: ReferenceData::default(),
            committed: Vec::new(),
            draft,
            expansion: SplitExpansion::new(cache, config.settle_delay),
            navigator: Navigator::new(config.columns),
            selected: BTreeSet::new(),
            pending: None,
            after_save: None,
            notifications: Vec::new(),
            last_date: None,
            config,
        }
    }

    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceData) -> Self {
        self.reference = reference;
        self
    }

    /// Starts the first draft on `date` instead of leaving it empty.
    #[must_use]
    pub fn with_draft_date(mut self, date: NaiveDate) -> Self {
        self.last_date = Some(date);
        self.draft = StagingBuffer::new(Transaction::draft(
            self.config.default_account.clone(),
            Some(date),
        ));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn draft(&self) -> &StagingBuffer {
        &self.draft
    }

    pub fn committed(&self) -> &[Transaction] {
        &self.committed
    }

    pub fn expansion(&self) -> &SplitExpansion {
        &self.expansion
    }

    pub fn focus(&self) -> Option<&Focus> {
        self.navigator.focus()
    }

    pub fn columns(&self) -> Columns {
        self.navigator.columns()
    }

    pub fn is_selected(&self, id: &TxId) -> bool {
        self.selected.contains(id)
    }

    /// `true` while a draft commit is waiting on the store.
    pub fn is_save_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn after_save(&self) -> Option<&AfterSave> {
        self.after_save.as_ref()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Replaces the committed list with the store's current view.
    pub fn reconcile(&mut self, committed: Vec<Transaction>) {
        self.committed = committed;
        let rows = visible_rows(&self.draft, &self.expansion, &self.committed);
        self.navigator.retain(&rows);
        let known: BTreeSet<&TxId> = self.committed.iter().map(|tx| &tx.id).collect();
        self.selected.retain(|id| known.contains(id));
    }

    /// Draft rows first, then the committed rows whose family is expanded.
    pub fn rows(&self) -> Vec<&Transaction> {
        visible_rows(&self.draft, &self.expansion, &self.committed)
    }

    pub fn get(&self, id: &TxId) -> Option<&Transaction> {
        find(&self.draft, &self.committed, id)
    }

    pub fn region(&self, id: &TxId) -> Option<Region> {
        if self.draft.contains(id) {
            Some(Region::Draft)
        } else if self.committed.iter().any(|tx| &tx.id == id) {
            Some(Region::Committed)
        } else {
            None
        }
    }

    /// Display form of a row with the zero-placement rule applied.
    pub fn display(&self, id: &TxId) -> Option<DisplayTransaction> {
        let tx = self.get(id)?;
        Some(self.codec.serialize(tx, self.show_zero_in_deposit(tx)))
    }

    /// Children follow their parent's direction; other rows use the table
    /// setting.
    fn show_zero_in_deposit(&self, tx: &Transaction) -> bool {
        tx.parent_id
            .as_ref()
            .and_then(|parent_id| self.get(parent_id))
            .map_or(self.config.show_zero_in_deposit, |parent| {
                parent.amount.is_some_and(|amount| amount.is_positive())
            })
    }

    // --- focus -----------------------------------------------------------

    pub fn edit(&mut self, id: &TxId, field: Field) -> bool {
        match find(&self.draft, &self.committed, id) {
            Some(tx) => self.navigator.edit(tx, field),
            None => false,
        }
    }

    pub fn edit_first(&mut self, id: &TxId) -> bool {
        match find(&self.draft, &self.committed, id) {
            Some(tx) => self.navigator.edit_first(tx),
            None => false,
        }
    }

    /// Editable fields of `tx` in traversal order.
    pub fn fields(&self, tx: &Transaction) -> Vec<Field> {
        self.navigator.fields(tx)
    }

    pub fn stop_editing(&mut self) {
        self.navigator.stop();
    }

    pub fn next_field(&mut self) -> bool {
        let rows = visible_rows(&self.draft, &self.expansion, &self.committed);
        self.navigator.next_field(&rows)
    }

    pub fn prev_field(&mut self) -> bool {
        let rows = visible_rows(&self.draft, &self.expansion, &self.committed);
        self.navigator.prev_field(&rows)
    }

    pub fn move_row(&mut self, delta: isize) -> bool {
        let rows = visible_rows(&self.draft, &self.expansion, &self.committed);
        self.navigator.move_row(&rows, delta)
    }

    // --- field edits -----------------------------------------------------

    /// Writes `text` into one cell of row `id`.
    ///
    /// Draft rows are updated in the staging buffer. Committed rows are
    /// updated locally and saved; a rejected save restores the previous rows,
    /// surfaces the fault and sends focus to the offending field.
    pub async fn set_field(&mut self, id: &TxId, field: Field, text: &str) {
        let Some(original) = self.get(id).cloned() else {
            return;
        };
        if !self.navigator.fields(&original).contains(&field) || !field.is_text() {
            return;
        }
        let text = match field {
            Field::Payee | Field::Account | Field::Category => {
                self.reference.resolve(field, text)
            }
            _ => text.to_string(),
        };
        let mut display = self
            .codec
            .serialize(&original, self.show_zero_in_deposit(&original));
        display.set_field(field, &text);
        let updated = self.codec.deserialize(&display, &original);
        let patch = TransactionPatch::diff(&original, &updated);
        self.apply_patch(id, &patch).await;
    }

    pub async fn toggle_cleared(&mut self, id: &TxId) {
        let Some(tx) = self.get(id) else {
            return;
        };
        if !self.navigator.fields(tx).contains(&Field::Cleared) {
            return;
        }
        let patch = TransactionPatch::new().cleared(!tx.cleared);
        self.apply_patch(id, &patch).await;
    }

    pub async fn apply_patch(&mut self, id: &TxId, patch: &TransactionPatch) {
        if patch.is_empty() {
            return;
        }
        match self.region(id) {
            Some(Region::Draft) => {
                self.draft = self.draft.update(id, patch).data;
            }
            Some(Region::Committed) => self.save_committed(id, patch).await,
            None => {}
        }
    }

    async fn save_committed(&mut self, id: &TxId, patch: &TransactionPatch) {
        let before = self.committed.clone();
        let Some(index) = self.committed.iter().position(|tx| &tx.id == id) else {
            return;
        };
        self.committed[index].apply(patch);
        let updated = self.committed[index].clone();
        if updated.is_parent {
            let inherited = patch.inherited();
            if !inherited.is_empty() {
                for child in self
                    .committed
                    .iter_mut()
                    .filter(|tx| tx.parent_id.as_ref() == Some(id))
                {
                    child.apply(&inherited);
                }
            }
        }
        if patch.touches_amount() {
            let family = if updated.is_parent {
                Some(updated.id.clone())
            } else {
                updated.parent_id.clone()
            };
            if let Some(parent_id) = family {
                recalculate_family(&mut self.committed, &parent_id);
            }
        }

        if let Err(err) = self.store.save(&updated).await {
            warn!(id = %id, "save rejected: {err}");
            self.committed = before;
            self.report(&err, id);
        }
    }

    // --- structural operations --------------------------------------------

    /// Splits row `id` and moves focus onto the result.
    pub fn split(&mut self, id: &TxId) {
        match self.region(id) {
            Some(Region::Draft) => {
                let result = self.draft.split(id);
                self.apply_draft_result(id, result.data, &result.diff);
            }
            Some(Region::Committed) => match self.store.split(id) {
                Ok(child_id) => self.insert_committed_child(id, child_id),
                Err(err) => self.report(&err, id),
            },
            None => {}
        }
    }

    /// Adds one more child to parent `parent_id`.
    pub fn add_split(&mut self, parent_id: &TxId) {
        match self.region(parent_id) {
            Some(Region::Draft) => {
                let result = self.draft.add_split(parent_id);
                self.apply_draft_result(parent_id, result.data, &result.diff);
            }
            Some(Region::Committed) => match self.store.add_split(parent_id) {
                Ok(child_id) => self.insert_committed_child(parent_id, child_id),
                Err(err) => self.report(&err, parent_id),
            },
            None => {}
        }
    }

    fn apply_draft_result(&mut self, anchor_id: &TxId, data: StagingBuffer, diff: &Diff) {
        if diff.added.is_empty() {
            return;
        }
        // Draft rows are always shown; the realized id is opened on commit.
        self.draft = data;
        if let Some(anchor) = self.draft.get(anchor_id) {
            self.navigator.commit_and_advance(anchor, diff);
        }
    }

    /// Mirrors a store-side split locally until the next reconcile.
    fn insert_committed_child(&mut self, parent_id: &TxId, child_id: TxId) {
        let Some(index) = self.committed.iter().position(|tx| &tx.id == parent_id) else {
            return;
        };
        let parent = &mut self.committed[index];
        if !parent.is_parent {
            parent.is_parent = true;
            parent.category_id = None;
        }
        let child = Transaction::child_of(parent, child_id);
        let insert_at = self
            .committed
            .iter()
            .rposition(|tx| tx.parent_id.as_ref() == Some(parent_id))
            .unwrap_or(index)
            + 1;
        self.committed.insert(insert_at, child.clone());
        recalculate_family(&mut self.committed, parent_id);
        self.expansion.open_on_split(parent_id);

        if let Some(anchor) = self.committed.get(index) {
            let diff = Diff { added: vec![child] };
            self.navigator.commit_and_advance(anchor, &diff);
        }
        debug!(parent = %parent_id, "split committed transaction");
    }

    /// Deletes row `id`; the draft anchor is never removed.
    pub fn delete(&mut self, id: &TxId) {
        match self.region(id) {
            Some(Region::Draft) => {
                let parent = self.draft.get(id).and_then(|tx| tx.parent_id.clone());
                let result = self.draft.delete(id);
                if result.data != self.draft {
                    self.draft = result.data;
                    self.refocus_after_delete(id, parent);
                }
            }
            Some(Region::Committed) => match self.store.delete(id) {
                Ok(()) => {
                    let parent = self
                        .committed
                        .iter()
                        .find(|tx| &tx.id == id)
                        .and_then(|tx| tx.parent_id.clone());
                    remove_committed(&mut self.committed, id);
                    self.selected.remove(id);
                    self.refocus_after_delete(id, parent);
                }
                Err(err) => self.report(&err, id),
            },
            None => {}
        }
    }

    /// Deletes every selected committed row.
    pub fn delete_selected(&mut self) {
        let ids: Vec<TxId> = self.selected.iter().cloned().collect();
        for id in ids {
            self.delete(&id);
        }
    }

    pub fn toggle_select(&mut self, id: &TxId) -> bool {
        if self.region(id) != Some(Region::Committed) {
            return false;
        }
        if !self.selected.remove(id) {
            self.selected.insert(id.clone());
        }
        true
    }

    fn refocus_after_delete(&mut self, id: &TxId, parent: Option<TxId>) {
        if self.navigator.editing_id() != Some(id) {
            return;
        }
        let field = self.navigator.focused_field();
        self.navigator.stop();
        let target = parent.and_then(|parent_id| find(&self.draft, &self.committed, &parent_id));
        if let (Some(target), Some(field)) = (target, field)
            && !self.navigator.edit(target, field)
        {
            self.navigator.edit_first(target);
        }
    }

    // --- expansion --------------------------------------------------------

    pub fn toggle_expansion(&mut self, id: &TxId) {
        if !id.is_draft() && self.get(id).is_some_and(|tx| tx.is_parent) {
            self.expansion.toggle(id);
        }
    }

    /// Flips the global mode, anchored at the topmost visible parent.
    ///
    /// With no committed parent on screen the switch settles immediately.
    pub fn switch_mode(&mut self, now: Instant) -> bool {
        let anchor = self
            .rows()
            .into_iter()
            .find(|tx| tx.is_parent && !tx.id.is_draft())
            .map(|tx| tx.id.clone());
        self.expansion.switch_mode(anchor.as_ref(), now)
    }

    /// Timer entry point; returns `true` when a transition settled.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.expansion.tick(now)
    }

    pub fn settle_deadline(&self) -> Option<Instant> {
        self.expansion.settle_deadline()
    }

    pub fn teardown(&mut self) {
        self.expansion.teardown();
    }

    // --- keyboard commit protocol -----------------------------------------

    /// Handles Enter on the focused row.
    pub async fn enter(&mut self, force: bool) {
        self.resume(AfterSave::Enter { force }).await;
    }

    /// Commits the draft family and starts a fresh one.
    pub async fn commit_draft(&mut self, force: bool) {
        self.resume(AfterSave::CommitDraft { force }).await;
    }

    /// Runs `action`, then any continuation queued while it was saving.
    pub async fn resume(&mut self, action: AfterSave) {
        let mut next = Some(action);
        while let Some(action) = next.take() {
            next = match action {
                AfterSave::Enter { force } => self.enter_once(force).await,
                AfterSave::CommitDraft { force } => self.commit_once(force).await,
            };
        }
    }

    async fn enter_once(&mut self, force: bool) -> Option<AfterSave> {
        let focus = self.navigator.focus()?.clone();
        match self.region(&focus.id)? {
            Region::Draft => {
                if self.pending.is_some() {
                    self.after_save = Some(AfterSave::Enter { force });
                    return None;
                }
                if force {
                    return self.commit_once(true).await;
                }
                if focus.id != self.draft.last().id {
                    self.move_row(1);
                    return None;
                }
                if self.draft.error().is_some() {
                    let root = self.draft.root().id.clone();
                    debug!("split unbalanced, adding a split instead of committing");
                    self.add_split(&root);
                    return None;
                }
                self.commit_once(false).await
            }
            Region::Committed => {
                if let Some(parent_id) = self.unbalanced_family_of_last_child(&focus.id) {
                    self.add_split(&parent_id);
                } else {
                    self.move_row(1);
                }
                None
            }
        }
    }

    /// Parent id when `id` is the last child of a committed family that does
    /// not balance.
    fn unbalanced_family_of_last_child(&self, id: &TxId) -> Option<TxId> {
        let tx = self.committed.iter().find(|tx| &tx.id == id)?;
        let parent_id = tx.parent_id.clone()?;
        let last_child = self
            .committed
            .iter()
            .rfind(|tx| tx.parent_id.as_ref() == Some(&parent_id))?;
        if &last_child.id != id {
            return None;
        }
        let parent = self.committed.iter().find(|tx| tx.id == parent_id)?;
        parent.error.is_some().then_some(parent_id)
    }

    async fn commit_once(&mut self, force: bool) -> Option<AfterSave> {
        let ticket = self.begin_commit(force)?;
        let mut rows = Vec::with_capacity(ticket.rows.len());
        for tx in ticket.rows.iter().cloned() {
            rows.push(self.store.apply_rules(tx).await);
        }
        let result = self.store.add(&rows).await;
        self.complete_commit(CommitTicket { rows, ..ticket }, result)
    }

    /// Takes the in-progress token and hands out the realized draft family.
    ///
    /// While a commit is already pending the request is parked as the
    /// after-save continuation (replacing any older one) and `None` is
    /// returned. Validation failures also return `None`.
    pub fn begin_commit(&mut self, force: bool) -> Option<CommitTicket> {
        if self.pending.is_some() {
            self.after_save = Some(AfterSave::CommitDraft { force });
            return None;
        }
        if is_pristine(&self.draft) {
            return None;
        }
        let root = self.draft.root().clone();
        if root.account_id.is_none() {
            let field = if self.config.columns.show_account {
                Field::Account
            } else {
                Field::Payee
            };
            self.report(
                &EngineError::MissingField {
                    field,
                    message: ACCOUNT_REQUIRED.to_string(),
                },
                &root.id,
            );
            return None;
        }
        if !force && self.draft.error().is_some() {
            self.notify(NotificationLevel::Error, SPLIT_UNBALANCED);
            return None;
        }

        self.pending = Some(root.id.clone());
        Some(CommitTicket {
            family: root.id,
            rows: self.draft.realize(),
        })
    }

    /// Releases the token after the store answered for `ticket`.
    ///
    /// On success the family joins the committed list and a fresh draft is
    /// started with the same account and category, carrying the date forward.
    /// On failure the draft is kept and the fault surfaced. Returns the
    /// continuation parked meanwhile, if any.
    pub fn complete_commit(
        &mut self,
        ticket: CommitTicket,
        result: ResultEngine<()>,
    ) -> Option<AfterSave> {
        if self.pending.as_ref() != Some(&ticket.family) {
            return None;
        }
        self.pending = None;

        match result {
            Ok(()) => {
                info!(rows = ticket.rows.len(), "committed draft family");
                let root = self.draft.root().clone();
                self.last_date = root.date.or(self.last_date);
                let mut fresh = Transaction::draft(
                    root.account_id.or_else(|| self.config.default_account.clone()),
                    self.last_date,
                );
                fresh.category_id = root.category_id;
                if let Some(parent) = ticket.rows.first().filter(|tx| tx.is_parent) {
                    self.expansion.open_on_split(&parent.id);
                }
                self.committed.splice(0..0, ticket.rows);
                self.draft = StagingBuffer::new(fresh);
                let draft_root = self.draft.root().clone();
                self.navigator.stop();
                self.navigator.edit_first(&draft_root);
            }
            Err(err) => {
                warn!("draft commit rejected: {err}");
                self.report(&err, &ticket.family);
            }
        }
        self.after_save.take()
    }

    fn report(&mut self, err: &EngineError, id: &TxId) {
        let message = match err {
            EngineError::MissingField { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.notify(NotificationLevel::Error, &message);
        if let Some(field) = err.field()
            && let Some(tx) = find(&self.draft, &self.committed, id)
        {
            self.navigator.edit(tx, field);
        }
    }

    fn notify(&mut self, level: NotificationLevel, message: &str) {
        self.notifications.push(Notification {
            level,
            message: message.to_string(),
        });
    }
}

fn find<'a>(
    draft: &'a StagingBuffer,
    committed: &'a [Transaction],
    id: &TxId,
) -> Option<&'a Transaction> {
    draft
        .get(id)
        .or_else(|| committed.iter().find(|tx| &tx.id == id))
}

fn visible_rows<'a>(
    draft: &'a StagingBuffer,
    expansion: &SplitExpansion,
    committed: &'a [Transaction],
) -> Vec<&'a Transaction> {
    let mut rows: Vec<&Transaction> = draft.rows().iter().collect();
    rows.extend(expansion.visible(committed));
    rows
}

/// Nothing typed yet: committing would create an empty transaction.
fn is_pristine(draft: &StagingBuffer) -> bool {
    let root = draft.root();
    draft.len() == 1
        && root.amount.is_none()
        && root.payee_id.is_none()
        && root.notes.is_none()
        && root.category_id.is_none()
}

fn remove_committed(committed: &mut Vec<Transaction>, id: &TxId) {
    let parent_id = committed
        .iter()
        .find(|tx| &tx.id == id)
        .and_then(|tx| tx.parent_id.clone());
    committed.retain(|tx| &tx.id != id && tx.parent_id.as_ref() != Some(id));

    let Some(parent_id) = parent_id else {
        return;
    };
    if committed
        .iter()
        .any(|tx| tx.parent_id.as_ref() == Some(&parent_id))
    {
        recalculate_family(committed, &parent_id);
    } else if let Some(parent) = committed.iter_mut().find(|tx| tx.id == parent_id) {
        parent.is_parent = false;
        parent.error = None;
    }
}
