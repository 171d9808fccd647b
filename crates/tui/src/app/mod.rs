use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{self, Event, KeyEventKind};
use tracing::{debug, info};

use grid_engine::{
    ExpansionCache, Field, Focus, NotificationLevel, TableController, Transaction, TxId,
};

use crate::{
    config::AppConfig,
    error::{AppError, Result},
    ledger::Ledger,
    local_state::FileCache,
    ui::{self, keymap::AppAction},
};

const TICK_RATE: Duration = Duration::from_millis(200);
const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct ToastState {
    pub level: ToastLevel,
    pub message: String,
    pub expires_at: Instant,
}

/// Text being typed into the focused cell, written back on navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellInput {
    pub focus: Focus,
    pub text: String,
    pub dirty: bool,
}

pub struct AppState {
    pub controller: TableController<Ledger>,
    pub input: Option<CellInput>,
    /// Highlighted row while no cell is focused.
    pub cursor: usize,
    pub toast: Option<ToastState>,
}

pub struct App {
    pub state: AppState,
    should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let ledger = Ledger::open(config.ledger_path.as_deref())?;
        let cache = FileCache::new(&config.state_path);
        let state = AppState::new(ledger, Box::new(cache), &config)?;
        Ok(Self {
            state,
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = ui::setup_terminal()?;
        let result = self.event_loop(&mut terminal).await;
        self.state.controller.teardown();
        ui::restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut ui::Terminal) -> Result<()> {
        while !self.should_quit {
            terminal
                .draw(|frame| ui::render(frame, &self.state))
                .map_err(|err| AppError::Terminal(err.to_string()))?;

            if event::poll(self.poll_timeout())?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                let action = ui::keymap::map_key(key);
                if self.state.handle_action(action).await {
                    self.should_quit = true;
                }
            }

            self.state.on_tick(Instant::now());
        }
        info!("grid closed");
        Ok(())
    }

    /// Wakes up early when a mode switch is due to settle.
    fn poll_timeout(&self) -> Duration {
        self.state
            .controller
            .settle_deadline()
            .map_or(TICK_RATE, |due| {
                due.saturating_duration_since(Instant::now()).min(TICK_RATE)
            })
    }
}

impl AppState {
    pub fn new(
        ledger: Ledger,
        cache: Box<dyn ExpansionCache>,
        config: &AppConfig,
    ) -> Result<Self> {
        let reference = ledger.reference();
        let committed = ledger.transactions();
        let mut controller = TableController::new(ledger, cache, config.controller_config()?)
            .with_reference(reference)
            .with_draft_date(Local::now().date_naive());
        controller.reconcile(committed);
        Ok(Self {
            controller,
            input: None,
            cursor: 0,
            toast: None,
        })
    }

    /// Applies one key action; returns `true` when the app should quit.
    pub async fn handle_action(&mut self, action: AppAction) -> bool {
        match action {
            AppAction::Quit => return true,
            AppAction::Cancel => self.cancel(),
            AppAction::Enter | AppAction::ForceEnter => {
                self.commit_input().await;
                if self.controller.focus().is_none() {
                    self.focus_cursor_row();
                } else {
                    self.controller
                        .enter(action == AppAction::ForceEnter)
                        .await;
                }
            }
            AppAction::NextField | AppAction::PrevField => {
                self.commit_input().await;
                if self.controller.focus().is_none() {
                    self.focus_cursor_row();
                } else if action == AppAction::NextField {
                    self.controller.next_field();
                } else {
                    self.controller.prev_field();
                }
            }
            AppAction::Up | AppAction::Down => {
                let delta = if action == AppAction::Up { -1 } else { 1 };
                if self.controller.focus().is_some() {
                    self.commit_input().await;
                    self.controller.move_row(delta);
                } else {
                    self.move_cursor(delta);
                }
            }
            AppAction::Split => {
                self.commit_input().await;
                if let Some(id) = self.current_id() {
                    self.controller.split(&id);
                }
            }
            AppAction::AddSplit => {
                self.commit_input().await;
                if let Some(parent_id) = self.current_family() {
                    self.controller.add_split(&parent_id);
                }
            }
            AppAction::SwitchMode => {
                if !self.controller.switch_mode(Instant::now()) {
                    debug!("mode switch ignored");
                }
            }
            AppAction::Delete => {
                self.input = None;
                if self.has_selection() {
                    self.controller.delete_selected();
                } else if let Some(id) = self.current_id() {
                    self.controller.delete(&id);
                }
            }
            AppAction::ToggleCleared => {
                self.commit_input().await;
                if let Some(id) = self.current_id() {
                    self.controller.toggle_cleared(&id).await;
                }
            }
            AppAction::Refresh => {
                self.commit_input().await;
                let committed = self.controller.store().transactions();
                self.controller.reconcile(committed);
                self.show(ToastLevel::Info, "Reloaded");
            }
            AppAction::Backspace => {
                if let Some(input) = self.input.as_mut() {
                    input.text.pop();
                    input.dirty = true;
                }
            }
            AppAction::Input(ch) => {
                if self.type_char(ch).await {
                    return true;
                }
            }
            AppAction::None => {}
        }
        self.sync();
        false
    }

    /// Fires due timers, surfaces notifications and expires the toast.
    pub fn on_tick(&mut self, now: Instant) {
        self.controller.tick(now);
        if let Some(notification) = self.controller.take_notifications().pop() {
            let level = match notification.level {
                NotificationLevel::Info => ToastLevel::Info,
                NotificationLevel::Error => ToastLevel::Error,
            };
            self.toast = Some(ToastState {
                level,
                message: notification.message,
                expires_at: now + TOAST_TTL,
            });
        }
        if self.toast.as_ref().is_some_and(|toast| toast.expires_at <= now) {
            self.toast = None;
        }
    }

    /// Display text of a cell with reference ids mapped to names.
    pub fn cell_text(&self, id: &TxId, field: Field) -> String {
        let Some(display) = self.controller.display(id) else {
            return String::new();
        };
        let raw = display.field_text(field);
        match field {
            Field::Payee | Field::Account | Field::Category => self
                .controller
                .reference()
                .name(field, &raw)
                .to_string(),
            _ => raw,
        }
    }

    async fn type_char(&mut self, ch: char) -> bool {
        let Some(focus) = self.controller.focus().cloned() else {
            match ch {
                'q' => return true,
                ' ' => {
                    if let Some(id) = self.current_id() {
                        self.controller.toggle_expansion(&id);
                    }
                }
                _ => {}
            }
            return false;
        };
        match focus.field {
            Field::Select if ch == ' ' => {
                let is_parent = self
                    .controller
                    .get(&focus.id)
                    .is_some_and(|tx| tx.is_parent);
                if is_parent {
                    self.controller.toggle_expansion(&focus.id);
                } else {
                    self.controller.toggle_select(&focus.id);
                }
            }
            Field::Cleared if ch == ' ' => self.controller.toggle_cleared(&focus.id).await,
            _ => {
                if let Some(input) = self.input.as_mut() {
                    if !input.dirty {
                        input.text.clear();
                    }
                    input.text.push(ch);
                    input.dirty = true;
                }
            }
        }
        false
    }

    /// First Esc drops typed text, the second one leaves the cell.
    fn cancel(&mut self) {
        let dirty = self.input.take().is_some_and(|input| input.dirty);
        if !dirty {
            self.controller.stop_editing();
        }
    }

    /// Writes a dirty cell buffer through the controller.
    async fn commit_input(&mut self) {
        let Some(input) = self.input.take() else {
            return;
        };
        if input.dirty {
            self.controller
                .set_field(&input.focus.id, input.focus.field, &input.text)
                .await;
        }
    }

    /// Re-aligns the cell buffer and the row cursor with the focus.
    fn sync(&mut self) {
        let rows: Vec<TxId> = self
            .controller
            .rows()
            .into_iter()
            .map(|tx| tx.id.clone())
            .collect();
        match self.controller.focus().cloned() {
            Some(focus) => {
                if let Some(index) = rows.iter().position(|id| id == &focus.id) {
                    self.cursor = index;
                }
                if !focus.field.is_text() {
                    self.input = None;
                } else if self.input.as_ref().is_none_or(|input| input.focus != focus) {
                    let text = self.cell_text(&focus.id, focus.field);
                    self.input = Some(CellInput {
                        focus,
                        text,
                        dirty: false,
                    });
                }
            }
            None => {
                self.input = None;
                self.cursor = self.cursor.min(rows.len().saturating_sub(1));
            }
        }
    }

    fn cursor_row(&self) -> Option<&Transaction> {
        self.controller.rows().get(self.cursor).copied()
    }

    fn current_id(&self) -> Option<TxId> {
        match self.controller.focus() {
            Some(focus) => Some(focus.id.clone()),
            None => self.cursor_row().map(|tx| tx.id.clone()),
        }
    }

    /// Parent of the current row's split family.
    fn current_family(&self) -> Option<TxId> {
        let id = self.current_id()?;
        let tx = self.controller.get(&id)?;
        if tx.is_parent {
            Some(tx.id.clone())
        } else {
            tx.parent_id.clone()
        }
    }

    fn has_selection(&self) -> bool {
        self.controller
            .committed()
            .iter()
            .any(|tx| self.controller.is_selected(&tx.id))
    }

    fn focus_cursor_row(&mut self) {
        if let Some(id) = self.cursor_row().map(|tx| tx.id.clone()) {
            self.controller.edit_first(&id);
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.controller.rows().len();
        if len == 0 {
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
    }

    fn show(&mut self, level: ToastLevel, message: &str) {
        self.toast = Some(ToastState {
            level,
            message: message.to_string(),
            expires_at: Instant::now() + TOAST_TTL,
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use grid_engine::{MemoryCache, Money};

    use super::*;
    use crate::ledger::demo;

    fn state() -> AppState {
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let config = AppConfig {
            default_account: Some("checking".to_string()),
            ..AppConfig::default()
        };
        AppState::new(
            Ledger::in_memory(demo(today)),
            Box::new(MemoryCache::default()),
            &config,
        )
        .unwrap()
    }

    async fn type_text(state: &mut AppState, text: &str) {
        for ch in text.chars() {
            state.handle_action(AppAction::Input(ch)).await;
        }
    }

    #[tokio::test]
    async fn typing_an_amount_and_enter_commits_draft() {
        let mut state = state();
        let before = state.controller.committed().len();
        let root = state.controller.draft().root().id.clone();
        state.controller.edit(&root, Field::Debit);
        state.sync();

        type_text(&mut state, "12").await;
        state.handle_action(AppAction::Enter).await;

        let committed = state.controller.committed();
        assert_eq!(committed.len(), before + 1);
        assert_eq!(committed[0].amount, Some(Money::new(-1200)));
        assert_eq!(state.controller.store().transactions()[0].id, committed[0].id);
    }

    #[tokio::test]
    async fn expressions_are_evaluated_on_tab() {
        let mut state = state();
        let root = state.controller.draft().root().id.clone();
        state.controller.edit(&root, Field::Credit);
        state.sync();

        type_text(&mut state, "2+3").await;
        state.handle_action(AppAction::PrevField).await;

        assert_eq!(state.cell_text(&root, Field::Credit), "5.00");
        assert_eq!(
            state.controller.focus(),
            Some(&Focus::new(root.clone(), Field::Debit))
        );
    }

    #[tokio::test]
    async fn payee_names_resolve_to_ids() {
        let mut state = state();
        let root = state.controller.draft().root().id.clone();
        state.controller.edit(&root, Field::Payee);
        state.sync();

        type_text(&mut state, "landlord").await;
        state.handle_action(AppAction::NextField).await;

        let draft = state.controller.draft().root();
        assert_eq!(draft.payee_id.as_deref(), Some("landlord"));
        assert_eq!(state.cell_text(&root, Field::Payee), "Landlord");
    }

    #[tokio::test]
    async fn escape_discards_then_stops_editing() {
        let mut state = state();
        let root = state.controller.draft().root().id.clone();
        state.controller.edit(&root, Field::Notes);
        state.sync();

        type_text(&mut state, "lunch").await;
        state.handle_action(AppAction::Cancel).await;
        assert_eq!(state.input.as_ref().map(|input| input.text.as_str()), Some(""));
        assert!(state.controller.focus().is_some());

        state.handle_action(AppAction::Cancel).await;
        assert!(state.controller.focus().is_none());
        assert_eq!(state.controller.draft().root().notes, None);
    }

    #[tokio::test]
    async fn q_quits_only_outside_a_cell() {
        let mut state = state();
        let root = state.controller.draft().root().id.clone();
        state.controller.edit(&root, Field::Notes);
        state.sync();
        assert!(!state.handle_action(AppAction::Input('q')).await);

        state.handle_action(AppAction::Cancel).await;
        state.handle_action(AppAction::Cancel).await;
        assert!(state.handle_action(AppAction::Input('q')).await);
    }

    #[tokio::test]
    async fn split_shortcut_opens_child_row() {
        let mut state = state();
        let root = state.controller.draft().root().id.clone();
        state.controller.edit(&root, Field::Debit);
        state.sync();
        type_text(&mut state, "10").await;

        state.handle_action(AppAction::Split).await;

        assert_eq!(state.controller.draft().len(), 2);
        let child = state.controller.draft().last().id.clone();
        assert_eq!(
            state.controller.focus(),
            Some(&Focus::new(child, Field::Debit))
        );
        assert_eq!(state.controller.draft().root().amount, Some(Money::new(-1000)));
    }

    #[tokio::test]
    async fn notifications_become_toasts() {
        let mut state = state();
        let root = state.controller.draft().root().id.clone();
        state.controller.edit(&root, Field::Account);
        state.sync();
        state.handle_action(AppAction::Backspace).await;
        for _ in 0.."checking".len() {
            state.handle_action(AppAction::Backspace).await;
        }
        state.handle_action(AppAction::NextField).await;
        state.controller.edit(&root, Field::Debit);
        state.sync();
        type_text(&mut state, "5").await;
        state.handle_action(AppAction::ForceEnter).await;

        let now = Instant::now();
        state.on_tick(now);
        let toast = state.toast.clone().unwrap();
        assert_eq!(toast.level, ToastLevel::Error);
        assert_eq!(toast.message, "Account is a required field");

        state.on_tick(now + TOAST_TTL);
        assert!(state.toast.is_none());
    }
}
