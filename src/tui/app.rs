//! Main TUI application state machine.
//!
//! Handles:
//! - Screen navigation
//! - Input event handling
//! - Prediction and health calls via background workers

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use crate::adapters::HttpPredictionClient;
use crate::config::ClientConfig;
use crate::ports::PredictionApi;

use super::ui::{
    form::{render_trial_form, TrialFormState},
    render_about, render_disclaimer, render_header,
    results::{render_results, ResultsState},
};
use super::worker::{ApiStatus, PredictionProgress, PredictionWorker, WorkerHandle};

/// Current screen/view in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Form,
    About,
}

/// Main application state
pub struct App {
    screen: Screen,
    should_quit: bool,

    /// Remote inference service
    api: Arc<dyn PredictionApi>,
    api_url: String,
    request_timeout: Duration,

    form_state: TrialFormState,
    results_state: ResultsState,
    api_status: ApiStatus,

    /// Pending prediction worker (if running)
    pending_prediction: Option<WorkerHandle<PredictionProgress>>,
    /// Pending health probe (if running)
    pending_health: Option<WorkerHandle<ApiStatus>>,
}

impl App {
    /// Create an application talking to the configured service.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = HttpPredictionClient::new(&config.api_url, config.request_timeout)?;
        Ok(Self::with_api(
            Arc::new(client),
            &config.api_url,
            config.request_timeout,
        ))
    }

    /// Create application with an injected API (Composition Root pattern).
    pub fn with_api(api: Arc<dyn PredictionApi>, api_url: &str, request_timeout: Duration) -> Self {
        Self {
            screen: Screen::Form,
            should_quit: false,
            api,
            api_url: api_url.to_string(),
            request_timeout,
            form_state: TrialFormState::default(),
            results_state: ResultsState::default(),
            api_status: ApiStatus::Unknown,
            pending_prediction: None,
            pending_health: None,
        }
    }

    /// Run the main application loop.
    ///
    /// # Errors
    /// Returns error if terminal operations fail.
    pub fn run(&mut self) -> Result<()> {
        self.refresh_health();

        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            self.poll_workers();

            terminal.draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Min(0),
                        Constraint::Length(2),
                    ])
                    .split(f.area());

                render_header(f, chunks[0], &self.api_url, &self.api_status);

                match self.screen {
                    Screen::Form => {
                        let body = Layout::default()
                            .direction(Direction::Vertical)
                            .constraints([Constraint::Min(19), Constraint::Length(7)])
                            .split(chunks[1]);
                        render_trial_form(f, body[0], &self.form_state);
                        render_results(f, body[1], &self.results_state);
                    }
                    Screen::About => render_about(f, chunks[1]),
                }

                render_disclaimer(f, chunks[2]);
            })?;

            // Handle input (short poll to stay responsive)
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Drain progress from both background workers.
    fn poll_workers(&mut self) {
        // Do not hold a borrow of `pending_prediction` while mutating `self`.
        loop {
            let Some(progress) = self
                .pending_prediction
                .as_ref()
                .and_then(WorkerHandle::try_recv)
            else {
                break;
            };

            match progress {
                PredictionProgress::Submitting => {}
                PredictionProgress::Complete(outcome) => {
                    self.results_state = ResultsState::Complete(outcome);
                    self.pending_prediction = None;
                }
                PredictionProgress::Error(message) => {
                    self.results_state = ResultsState::Error {
                        message,
                        at: Local::now(),
                    };
                    self.pending_prediction = None;
                }
            }
        }

        if let Some(status) = self.pending_health.as_ref().and_then(WorkerHandle::try_recv) {
            self.api_status = status;
            self.pending_health = None;
        }
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        // Global quit handling
        if key == KeyCode::Char('q') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.screen {
            Screen::Form => self.handle_form_key(key),
            Screen::About => self.handle_about_key(key),
        }
    }

    fn handle_form_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::BackTab => self.form_state.prev_field(),
            KeyCode::Down | KeyCode::Tab => self.form_state.next_field(),
            KeyCode::Left => self.form_state.cycle(false),
            KeyCode::Right => self.form_state.cycle(true),
            KeyCode::Char(' ') => self.form_state.toggle(),
            KeyCode::Char('+') => self.form_state.step(1),
            KeyCode::Char('-') => self.form_state.step(-1),
            KeyCode::Char(c) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.form_state.input_digit(digit);
                }
            }
            KeyCode::Backspace => self.form_state.delete_digit(),
            KeyCode::Enter => self.submit_form(),
            KeyCode::Char('h') | KeyCode::Char('H') => self.refresh_health(),
            KeyCode::Char('a') | KeyCode::Char('A') => self.screen = Screen::About,
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.form_state = TrialFormState::default();
                if !self.results_state.is_pending() {
                    self.results_state = ResultsState::Idle;
                }
            }
            KeyCode::Char('q') | KeyCode::Char('Q') => self.should_quit = true,
            _ => {}
        }
    }

    fn handle_about_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('a') | KeyCode::Char('A') => {
                self.screen = Screen::Form;
            }
            KeyCode::Char('q') | KeyCode::Char('Q') => self.should_quit = true,
            _ => {}
        }
    }

    /// One request per submission; Enter is ignored while one is in flight.
    fn submit_form(&mut self) {
        if self.pending_prediction.is_some() {
            return;
        }

        match self.form_state.to_record() {
            Ok(record) => {
                tracing::info!(api_url = %self.api_url, "Submitting trial record");
                self.results_state = ResultsState::Pending {
                    started: Instant::now(),
                    timeout: self.request_timeout,
                };
                self.pending_prediction =
                    Some(PredictionWorker::spawn(Arc::clone(&self.api), record));
            }
            Err(message) => {
                self.results_state = ResultsState::Error {
                    message,
                    at: Local::now(),
                };
            }
        }
    }

    fn refresh_health(&mut self) {
        if self.pending_health.is_some() {
            return;
        }
        self.api_status = ApiStatus::Checking;
        self.pending_health = Some(PredictionWorker::check_health(Arc::clone(&self.api)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Feature;
    use crate::ports::ApiError;
    use crate::tui::worker::tests::ScriptedApi;
    use std::thread;

    fn app_with(api: ScriptedApi) -> (App, Arc<ScriptedApi>) {
        let api = Arc::new(api);
        let app = App::with_api(
            Arc::clone(&api) as Arc<dyn PredictionApi>,
            "http://127.0.0.1:8080",
            Duration::from_secs(30),
        );
        (app, api)
    }

    fn press(app: &mut App, key: KeyCode) {
        app.handle_key(key, KeyModifiers::NONE);
    }

    /// Poll until no worker is pending, as the main loop would.
    fn settle(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            app.poll_workers();
            if app.pending_prediction.is_none() && app.pending_health.is_none() {
                return;
            }
            assert!(Instant::now() < deadline, "Workers did not finish");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_submit_sends_form_values_and_shows_rates() {
        let (mut app, api) = app_with(ScriptedApi::answering([0.022, 0.25, 0.8]));

        // Masking is the fourth field; pick DOUBLE.
        for _ in 0..3 {
            press(&mut app, KeyCode::Down);
        }
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);
        assert!(app.results_state.is_pending());

        settle(&mut app);
        match &app.results_state {
            ResultsState::Complete(outcome) => {
                assert_eq!(outcome.prediction.rate_deaths_calc, 0.022);
            }
            other => panic!("Expected results, got {other:?}"),
        }

        let received = api.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].masking_trials.label(), "DOUBLE");
        assert_eq!(received[0].min_age_yr_calc, 18.0);
    }

    #[test]
    fn test_failure_is_shown_inline_without_retry() {
        let (mut app, api) = app_with(ScriptedApi::failing(ApiError::Transport(
            "connection refused".to_string(),
        )));

        press(&mut app, KeyCode::Enter);
        settle(&mut app);

        match &app.results_state {
            ResultsState::Error { message, .. } => {
                assert_eq!(message, "API call failed: connection refused");
            }
            other => panic!("Expected error, got {other:?}"),
        }
        assert_eq!(api.received.lock().unwrap().len(), 1);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_health_refresh_updates_status() {
        let (mut app, _) = app_with(ScriptedApi::answering([0.0; 3]));
        assert_eq!(app.api_status, ApiStatus::Unknown);

        press(&mut app, KeyCode::Char('h'));
        assert_eq!(app.api_status, ApiStatus::Checking);
        settle(&mut app);
        assert_eq!(app.api_status, ApiStatus::Healthy);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let (mut app, _) = app_with(ScriptedApi::answering([0.0; 3]));
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Down);
        assert_ne!(app.form_state, TrialFormState::default());

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.form_state, TrialFormState::default());
        assert_eq!(app.results_state, ResultsState::Idle);
    }

    #[test]
    fn test_age_keys_edit_focused_number() {
        let (mut app, _) = app_with(ScriptedApi::answering([0.0; 3]));
        app.form_state.selected_field = Feature::ALL
            .iter()
            .position(|&f| f == Feature::MinAge)
            .expect("MinAge field");

        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Char('4'));
        press(&mut app, KeyCode::Char('+'));
        assert_eq!(app.form_state.to_payload()["min_age_yr_calc"], 15);
    }

    #[test]
    fn test_screens_and_quit() {
        let (mut app, _) = app_with(ScriptedApi::answering([0.0; 3]));

        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.screen, Screen::About);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.screen, Screen::Form);

        app.handle_key(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(app.should_quit);

        let (mut app, _) = app_with(ScriptedApi::answering([0.0; 3]));
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
