use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::charts;
use crate::client::{ClientError, RequestSequencer, RequestToken, StockClient, StockForm};
use crate::config::AppConfig;
use crate::render::{self, Region, SubmissionResult};

/// Longest symbol accepted in the input box
const MAX_SYMBOL_LEN: usize = 16;

/// Seconds before a status message clears itself
const STATUS_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
}

/// A finished submission, reported back from its task
#[derive(Debug)]
pub struct SubmissionEvent {
    pub token: RequestToken,
    pub symbol: String,
    pub outcome: Result<SubmissionResult, ClientError>,
}

/// Ctrl-C and Ctrl-Q quit. Plain letters always belong to the symbol input.
pub fn is_quit_key(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q'))
}

pub struct App {
    pub popup: Popup,
    pub config: AppConfig,

    // Form
    pub input: String,
    recent_index: Option<usize>,

    // Display region and the symbol it currently shows
    pub region: Region,
    pub region_symbol: Option<String>,

    // Symbol of the latest request still in flight
    pub pending: Option<String>,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    client: StockClient,
    sequencer: RequestSequencer,
    events_tx: UnboundedSender<SubmissionEvent>,
    events_rx: UnboundedReceiver<SubmissionEvent>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = StockClient::new(&config.endpoint, config.timeout())?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            popup: Popup::None,
            config,

            input: String::new(),
            recent_index: None,

            region: Region::new(),
            region_symbol: None,
            pending: None,

            status_message: None,
            status_message_time: None,

            client,
            sequencer: RequestSequencer::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.client.url()
    }

    /// Set a status message (auto-clears after a few seconds)
    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.popup == Popup::Help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter | KeyCode::Char('q')) {
                self.popup = Popup::None;
            }
            return Ok(());
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('s') {
                self.save_charts()?;
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Esc => {
                self.input.clear();
                self.recent_index = None;
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.recent_index = None;
            }
            KeyCode::Up => self.recall_older(),
            KeyCode::Down => self.recall_newer(),

            // '?' can never be part of a symbol
            KeyCode::Char('?') => self.popup = Popup::Help,

            KeyCode::Char(c) => self.push_char(c),
            _ => {}
        }
        Ok(())
    }

    fn push_char(&mut self, c: char) {
        let allowed = c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=');
        if allowed && self.input.len() < MAX_SYMBOL_LEN {
            self.input.push(c.to_ascii_uppercase());
            self.recent_index = None;
        }
    }

    fn recall_older(&mut self) {
        if self.config.recent_symbols.is_empty() {
            return;
        }
        let next = match self.recent_index {
            None => 0,
            Some(i) => (i + 1).min(self.config.recent_symbols.len() - 1),
        };
        self.recent_index = Some(next);
        self.input = self.config.recent_symbols[next].clone();
    }

    fn recall_newer(&mut self) {
        match self.recent_index {
            Some(0) | None => {
                self.recent_index = None;
                self.input.clear();
            }
            Some(i) => {
                self.recent_index = Some(i - 1);
                self.input = self.config.recent_symbols[i - 1].clone();
            }
        }
    }

    /// Submit the form. The request runs on its own task; its outcome comes
    /// back through [`App::tick`].
    pub fn submit(&mut self) {
        let form = StockForm::new(&self.input);
        let token = self.sequencer.issue();

        if form.symbol.is_empty() {
            // Rendered like any other outcome so the region reflects it
            self.pending = None;
            self.apply_event(SubmissionEvent {
                token,
                symbol: String::new(),
                outcome: Err(ClientError::EmptySymbol),
            });
            return;
        }

        self.config.remember_symbol(&form.symbol);
        if let Err(e) = self.config.save() {
            tracing::warn!("Failed to save config: {}", e);
        }
        self.recent_index = None;
        self.pending = Some(form.symbol.clone());

        let client = self.client.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = client.submit(&form).await;
            let _ = tx.send(SubmissionEvent {
                token,
                symbol: form.symbol,
                outcome,
            });
        });
    }

    /// Render a finished submission unless a newer one has been issued since
    pub fn apply_event(&mut self, event: SubmissionEvent) -> bool {
        if !self.sequencer.is_current(event.token) {
            tracing::debug!(
                "Discarding stale response for {} (request {})",
                event.symbol,
                event.token.id()
            );
            return false;
        }

        self.pending = None;
        render::render_outcome(&mut self.region, &event.outcome);
        self.region_symbol = (!event.symbol.is_empty()).then(|| event.symbol.clone());

        if self.config.notifications && !event.symbol.is_empty() {
            let body = match &event.outcome {
                Ok(SubmissionResult::Success { images, .. }) => format!("{} charts", images.len()),
                _ => self.region.error().unwrap_or(render::UNKNOWN_ERROR).to_string(),
            };
            if let Err(e) = crate::notify(&event.symbol, &body) {
                tracing::warn!("Notification failed: {}", e);
            }
        }

        true
    }

    /// Export the charts currently shown
    fn save_charts(&mut self) -> Result<()> {
        let Some(symbol) = self.region_symbol.clone() else {
            self.set_status("No charts to save");
            return Ok(());
        };
        if self.region.images().next().is_none() {
            self.set_status("No charts to save");
            return Ok(());
        }

        let dir = self.config.chart_dir();
        let written = charts::save_charts(&self.region, &dir, &symbol)?;
        if written.is_empty() {
            self.set_status("No embedded charts to save");
        } else {
            self.set_status(format!("Saved {} charts to {}", written.len(), dir.display()));
        }
        Ok(())
    }

    pub async fn tick(&mut self) -> Result<()> {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }

        // Clear status message after a few seconds
        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_TIMEOUT_SECS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }

        Ok(())
    }

    #[cfg(test)]
    fn issue_token(&self) -> RequestToken {
        self.sequencer.issue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Element, Stats, StatValue};

    fn test_app() -> App {
        let config = AppConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            ..AppConfig::default()
        };
        App::new(config).unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn success_event(token: RequestToken, symbol: &str, image: &str) -> SubmissionEvent {
        SubmissionEvent {
            token,
            symbol: symbol.to_string(),
            outcome: Ok(SubmissionResult::Success {
                stats: Some(Stats {
                    latest: Some(StatValue::Number(10.0)),
                    ..Stats::default()
                }),
                images: vec![image.to_string()],
            }),
        }
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut app = test_app();
        let first = app.issue_token();
        let second = app.issue_token();

        assert!(app.apply_event(success_event(second, "MSFT", "new.png")));
        assert!(!app.apply_event(success_event(first, "AAPL", "old.png")));

        assert_eq!(app.region_symbol.as_deref(), Some("MSFT"));
        assert_eq!(app.region.images().collect::<Vec<_>>(), vec!["new.png"]);
    }

    #[test]
    fn test_late_older_response_does_not_clear_pending() {
        let mut app = test_app();
        let first = app.issue_token();
        let _second = app.issue_token();
        app.pending = Some("MSFT".to_string());

        app.apply_event(success_event(first, "AAPL", "old.png"));
        assert_eq!(app.pending.as_deref(), Some("MSFT"));
        assert!(app.region.is_empty());
    }

    #[test]
    fn test_error_outcome_replaces_previous_result() {
        let mut app = test_app();
        let t = app.issue_token();
        app.apply_event(success_event(t, "AAPL", "a.png"));

        let t = app.issue_token();
        app.apply_event(SubmissionEvent {
            token: t,
            symbol: "ZZZZ".to_string(),
            outcome: Ok(SubmissionResult::Failure {
                message: Some("bad ticker".to_string()),
            }),
        });

        assert_eq!(
            app.region.elements(),
            &[Element::Error { message: "bad ticker".to_string() }]
        );
    }

    #[tokio::test]
    async fn test_input_editing() {
        let mut app = test_app();
        for c in ['b', 'r', 'k', '.', 'b', ' ', '!'] {
            app.handle_key(key(KeyCode::Char(c))).await.unwrap();
        }
        assert_eq!(app.input, "BRK.B");

        app.handle_key(key(KeyCode::Backspace)).await.unwrap();
        assert_eq!(app.input, "BRK.");

        app.handle_key(key(KeyCode::Esc)).await.unwrap();
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_empty_submit_renders_error() {
        let mut app = test_app();
        app.handle_key(key(KeyCode::Enter)).await.unwrap();

        assert!(app.pending.is_none());
        assert_eq!(app.region.error(), Some("Enter a ticker symbol"));
        assert!(app.region_symbol.is_none());
    }

    #[tokio::test]
    async fn test_help_popup_toggles() {
        let mut app = test_app();
        app.handle_key(key(KeyCode::Char('?'))).await.unwrap();
        assert_eq!(app.popup, Popup::Help);

        app.handle_key(key(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.popup, Popup::None);

        app.input = "AB".to_string();
        app.handle_key(key(KeyCode::Char('?'))).await.unwrap();
        assert_eq!(app.popup, Popup::Help);
        assert_eq!(app.input, "AB");
    }

    #[tokio::test]
    async fn test_symbols_starting_with_s_and_q_can_be_typed() {
        let mut app = test_app();
        for c in ['s', 'p', 'y'] {
            app.handle_key(key(KeyCode::Char(c))).await.unwrap();
        }
        assert_eq!(app.input, "SPY");
        assert!(app.status_message.is_none());

        app.handle_key(key(KeyCode::Esc)).await.unwrap();
        for c in ['q', 'q', 'q'] {
            let k = key(KeyCode::Char(c));
            assert!(!is_quit_key(&k));
            app.handle_key(k).await.unwrap();
        }
        assert_eq!(app.input, "QQQ");
    }

    #[test]
    fn test_quit_keys_need_control() {
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(is_quit_key(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL)));
        assert!(!is_quit_key(&key(KeyCode::Char('q'))));
        assert!(!is_quit_key(&key(KeyCode::Esc)));
    }

    #[tokio::test]
    async fn test_recent_symbol_recall() {
        let mut app = test_app();
        app.config.recent_symbols = vec!["MSFT".to_string(), "AAPL".to_string()];

        app.handle_key(key(KeyCode::Up)).await.unwrap();
        assert_eq!(app.input, "MSFT");
        app.handle_key(key(KeyCode::Up)).await.unwrap();
        assert_eq!(app.input, "AAPL");
        app.handle_key(key(KeyCode::Up)).await.unwrap();
        assert_eq!(app.input, "AAPL");

        app.handle_key(key(KeyCode::Down)).await.unwrap();
        assert_eq!(app.input, "MSFT");
        app.handle_key(key(KeyCode::Down)).await.unwrap();
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_save_without_charts_sets_status() {
        let mut app = test_app();
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL))
            .await
            .unwrap();
        assert_eq!(app.status_message.as_deref(), Some("No charts to save"));
    }

    #[tokio::test]
    async fn test_save_charts_to_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app();
        app.config.chart_dir = Some(dir.path().to_path_buf());

        let t = app.issue_token();
        app.apply_event(success_event(t, "AAPL", "data:image/png;base64,aGVsbG8="));

        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL))
            .await
            .unwrap();

        assert!(dir.path().join("AAPL-1.png").exists());
        assert!(app.status_message.unwrap().starts_with("Saved 1 charts"));
    }

    #[tokio::test]
    async fn test_tick_applies_channel_events() {
        let mut app = test_app();
        let t = app.issue_token();
        app.events_tx.send(success_event(t, "IBM", "i.png")).unwrap();

        app.tick().await.unwrap();
        assert_eq!(app.region_symbol.as_deref(), Some("IBM"));
    }
}
