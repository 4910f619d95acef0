use crate::config::AppConfig;
use crate::dashboard::{self, DashboardSnapshot};
use crate::data::CachedProvider;
use crate::lead::LeadForm;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::io;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppState {
    Select,
    Loading,
    Dashboard,
    LeadForm,
}

/// What the event loop must do after a key press.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Analyze,
}

pub const LEAD_FIELDS: [&str; 3] = ["Name", "E-mail", "Phone"];

pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub config: AppConfig,
    provider: Arc<CachedProvider>,
    pub cursor: usize,
    /// Chosen symbols in the order they were picked.
    pub selection: Vec<String>,
    pub snapshot: Option<DashboardSnapshot>,
    pub error_msg: Option<String>,
    pub lead: LeadForm,
    pub lead_field: usize,
    pub lead_ack: Option<String>,
}

impl App {
    pub fn new(config: AppConfig, provider: Arc<CachedProvider>) -> Self {
        Self {
            should_quit: false,
            state: AppState::Select,
            config,
            provider,
            cursor: 0,
            selection: Vec::new(),
            snapshot: None,
            error_msg: None,
            lead: LeadForm::default(),
            lead_field: 0,
            lead_ack: None,
        }
    }

    pub fn preselect<S: AsRef<str>>(&mut self, symbols: &[S]) {
        self.selection = dashboard::normalize_selection(&self.config, symbols);
    }

    pub fn is_selected(&self, symbol: &str) -> bool {
        self.selection.iter().any(|s| s == symbol)
    }

    fn toggle_current(&mut self) {
        let Some(symbol) = self.config.universe.get(self.cursor).cloned() else {
            return;
        };
        if let Some(pos) = self.selection.iter().position(|s| *s == symbol) {
            self.selection.remove(pos);
        } else {
            self.selection.push(symbol);
        }
    }

    fn lead_field_mut(&mut self) -> &mut String {
        match self.lead_field {
            0 => &mut self.lead.name,
            1 => &mut self.lead.email,
            _ => &mut self.lead.phone,
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Option<Action> {
        match self.state {
            AppState::Select => match code {
                KeyCode::Up | KeyCode::Char('k') => {
                    self.cursor = self.cursor.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.cursor + 1 < self.config.universe.len() {
                        self.cursor += 1;
                    }
                }
                KeyCode::Char(' ') => self.toggle_current(),
                KeyCode::Enter => {
                    if self.selection.is_empty() {
                        self.error_msg = Some("Select at least one stock".to_string());
                    } else {
                        self.error_msg = None;
                        return Some(Action::Analyze);
                    }
                }
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                _ => {}
            },
            AppState::Loading => {}
            AppState::Dashboard => match code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('r') => {
                    self.state = AppState::Select;
                    self.snapshot = None;
                    self.error_msg = None;
                }
                KeyCode::Char('f') => {
                    self.state = AppState::LeadForm;
                    self.lead_ack = None;
                    self.error_msg = None;
                }
                _ => {}
            },
            AppState::LeadForm => match code {
                KeyCode::Esc => self.state = AppState::Dashboard,
                KeyCode::Tab | KeyCode::Down => self.lead_field = (self.lead_field + 1) % LEAD_FIELDS.len(),
                KeyCode::BackTab | KeyCode::Up => {
                    self.lead_field = (self.lead_field + LEAD_FIELDS.len() - 1) % LEAD_FIELDS.len();
                }
                KeyCode::Char(c) => self.lead_field_mut().push(c),
                KeyCode::Backspace => {
                    self.lead_field_mut().pop();
                }
                KeyCode::Enter => match self.lead.submit() {
                    Ok(ack) => {
                        self.lead_ack = Some(ack.message);
                        self.error_msg = None;
                        self.lead = LeadForm::default();
                        self.lead_field = 0;
                    }
                    Err(e) => self.error_msg = Some(e.to_string()),
                },
                _ => {}
            },
        }
        None
    }

    pub async fn analyze(&mut self) {
        let today = self.config.today();
        self.snapshot =
            dashboard::analyze_selection(self.provider.as_ref(), &self.config, self.selection.as_slice(), today).await;
        self.error_msg = match &self.snapshot {
            Some(s) if !s.has_data() => Some("No price data available for this selection".to_string()),
            _ => None,
        };
        self.state = AppState::Dashboard;
    }

    pub async fn run(&mut self, terminal: &mut crate::tui::Tui) -> io::Result<()> {
        while !self.should_quit {
            terminal.draw(|f| crate::ui::render(f, self))?;

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        if let Some(Action::Analyze) = self.handle_key(key.code) {
                            self.state = AppState::Loading;
                            terminal.draw(|f| crate::ui::render(f, self))?;
                            self.analyze().await;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FixtureProvider;
    use crate::prices::PriceTable;

    fn app() -> App {
        let provider = CachedProvider::new(Box::new(FixtureProvider::new(PriceTable::empty())));
        App::new(AppConfig::default(), Arc::new(provider))
    }

    #[test]
    fn test_enter_requires_a_selection() {
        let mut app = app();
        assert_eq!(app.handle_key(KeyCode::Enter), None);
        assert!(app.error_msg.is_some());

        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Char(' '));
        assert_eq!(app.selection, vec!["ASELS.IS"]);
        assert_eq!(app.handle_key(KeyCode::Enter), Some(Action::Analyze));
        assert!(app.error_msg.is_none());
    }

    #[test]
    fn test_toggle_removes_and_cursor_is_bounded() {
        let mut app = app();
        app.handle_key(KeyCode::Up);
        assert_eq!(app.cursor, 0);
        app.handle_key(KeyCode::Char(' '));
        app.handle_key(KeyCode::Char(' '));
        assert!(app.selection.is_empty());

        for _ in 0..100 {
            app.handle_key(KeyCode::Down);
        }
        assert_eq!(app.cursor, app.config.universe.len() - 1);
    }

    #[test]
    fn test_lead_form_flow() {
        let mut app = app();
        app.state = AppState::Dashboard;
        app.handle_key(KeyCode::Char('f'));
        assert_eq!(app.state, AppState::LeadForm);

        for c in "Ali".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        app.handle_key(KeyCode::Tab);
        for c in "ali@example.com".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        app.handle_key(KeyCode::Enter);
        assert!(app.lead_ack.as_deref().unwrap().contains("Ali"));
        assert_eq!(app.lead, LeadForm::default());

        app.handle_key(KeyCode::Esc);
        assert_eq!(app.state, AppState::Dashboard);
    }

    #[tokio::test]
    async fn test_analyze_without_data_reports_blank_dashboard() {
        let mut app = app();
        app.preselect(&["thyao.is"]);
        app.analyze().await;
        assert_eq!(app.state, AppState::Dashboard);
        assert!(app.snapshot.as_ref().is_some_and(|s| !s.has_data()));
        assert!(app.error_msg.is_some());
    }
}
