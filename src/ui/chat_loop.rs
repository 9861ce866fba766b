//! The interactive full-screen chat loop.
//!
//! One logical thread of control: the loop draws, polls input, and drains
//! generation outcomes from the service channel. All session mutation goes
//! through the session manager; this module only holds transient view state
//! (input line, scroll position, status).

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::warn;
use unicode_width::UnicodeWidthStr;

use crate::core::catalog::DEFAULT_MODEL_ID;
use crate::core::config::Config;
use crate::core::manager::{SessionManager, SessionPatch, SubmitOutcome};
use crate::core::params::{ParameterStore, ParameterUpdate};
use crate::core::session::IdSource;
use crate::core::templates::{PromptTemplate, TemplateStore};
use crate::generation::{ExchangeOutcome, GenerationClient, GenerationService, DEFAULT_BASE_URL};
use crate::persistence::{HistoryStore, ThemeMode, ThemePreference};
use crate::ui::commands::{self, Command, HELP_TEXT};
use crate::ui::theme::Theme;

const THINKING_INDICATOR: &str = "Assistant is thinking...";
const INPUT_HINT: &str = "Type your message (Enter to send, Ctrl+C to quit, /help for commands)";

pub(crate) struct ChatApp {
    manager: SessionManager,
    params: ParameterStore,
    templates: TemplateStore,
    service: GenerationService,
    history: HistoryStore,
    theme_pref: ThemePreference,
    theme: Theme,
    template_ids: IdSource,
    input: String,
    scroll_offset: u16,
    auto_scroll: bool,
    status: Option<String>,
    should_quit: bool,
}

impl ChatApp {
    fn new(
        manager: SessionManager,
        params: ParameterStore,
        templates: TemplateStore,
        service: GenerationService,
        history: HistoryStore,
    ) -> Self {
        let theme_pref = history.load_theme();
        let theme = Theme::from_preference(theme_pref);
        ChatApp {
            manager,
            params,
            templates,
            service,
            history,
            theme_pref,
            theme,
            template_ids: IdSource::new(),
            input: String::new(),
            scroll_offset: 0,
            auto_scroll: true,
            status: None,
            should_quit: false,
        }
    }

    fn handle_enter(&mut self) {
        match commands::parse(&self.input) {
            Some(Ok(command)) => {
                self.input.clear();
                let status = self.execute_command(command);
                self.status = Some(status);
            }
            // Keep the malformed command in the input so it can be fixed.
            Some(Err(usage)) => self.status = Some(usage),
            None => self.submit_input(),
        }
    }

    fn submit_input(&mut self) {
        if self.input.trim().is_empty() {
            return;
        }

        let session_id = match self.manager.active_session_id() {
            Some(id) => id.to_string(),
            None => self.start_session(),
        };

        let text = std::mem::take(&mut self.input);
        match self.manager.submit(&session_id, &text) {
            SubmitOutcome::Started(request) => {
                self.service.spawn_exchange(request);
                self.auto_scroll = true;
                self.status = None;
            }
            SubmitOutcome::Busy => {
                self.input = text;
                self.status = Some("Still waiting for the previous reply...".to_string());
            }
            SubmitOutcome::Ignored => {
                self.input = text;
            }
        }
    }

    fn start_session(&mut self) -> String {
        let model = self.params.model().to_string();
        let parameters = self.params.get();
        self.manager.create_session(&model, parameters).id.clone()
    }

    fn cycle_session(&mut self) {
        let ids: Vec<String> = self.manager.sessions().iter().map(|s| s.id.clone()).collect();
        if ids.is_empty() {
            return;
        }
        let current = self
            .manager
            .active_session_id()
            .and_then(|id| ids.iter().position(|candidate| candidate == id))
            .unwrap_or(0);
        let next = (current + 1) % ids.len();
        self.manager.set_active(&ids[next]);
        self.auto_scroll = true;
    }

    /// Apply a parameter change to the store and mirror it into the active
    /// session's snapshot so subsequent exchanges in it use the new values.
    fn apply_parameters(&mut self, update: ParameterUpdate) {
        let merged = self.params.apply(update);
        if let Some(id) = self.manager.active_session_id().map(str::to_string) {
            self.manager.update_session(
                &id,
                SessionPatch {
                    parameters: Some(merged),
                    ..Default::default()
                },
            );
        }
    }

    fn execute_command(&mut self, command: Command) -> String {
        match command {
            Command::Help => HELP_TEXT.to_string(),
            Command::New => {
                self.start_session();
                self.auto_scroll = true;
                format!("Started a new chat with {}", self.params.model())
            }
            Command::Model(id) => {
                self.params.set_model(&id);
                if let Some(session_id) = self.manager.active_session_id().map(str::to_string) {
                    self.manager.update_session(
                        &session_id,
                        SessionPatch {
                            model: Some(id.clone()),
                            ..Default::default()
                        },
                    );
                }
                format!("Model set to {id}")
            }
            Command::Temperature(value) => {
                self.apply_parameters(ParameterUpdate {
                    temperature: Some(value),
                    ..Default::default()
                });
                format!("temperature = {value}")
            }
            Command::MaxTokens(value) => {
                self.apply_parameters(ParameterUpdate {
                    max_tokens: Some(value),
                    ..Default::default()
                });
                format!("maxTokens = {value}")
            }
            Command::TopP(value) => {
                self.apply_parameters(ParameterUpdate {
                    top_p: Some(value),
                    ..Default::default()
                });
                format!("topP = {value}")
            }
            Command::ResetParams => {
                let defaults = self.params.reset();
                if let Some(session_id) = self.manager.active_session_id().map(str::to_string) {
                    self.manager.update_session(
                        &session_id,
                        SessionPatch {
                            parameters: Some(defaults),
                            ..Default::default()
                        },
                    );
                }
                "Parameters reset to defaults".to_string()
            }
            Command::TemplateList => {
                if self.templates.list().is_empty() {
                    "No templates".to_string()
                } else {
                    self.templates
                        .list()
                        .iter()
                        .map(|t| format!("{}: {}", t.id, t.name))
                        .collect::<Vec<_>>()
                        .join("  |  ")
                }
            }
            Command::TemplateAdd { name, content } => {
                let now = Utc::now();
                let id = self.template_ids.next(now);
                self.templates.add(PromptTemplate {
                    id: id.clone(),
                    name: name.clone(),
                    content,
                    category: "Custom".to_string(),
                    created_at: now,
                });
                format!("Template \"{name}\" added as {id}")
            }
            Command::TemplateRemove(id) => {
                if self.templates.remove(&id) {
                    format!("Template {id} removed")
                } else {
                    format!("No template with id {id}")
                }
            }
            Command::TemplateUse(id) => match self.templates.get(&id) {
                Some(template) => {
                    let name = template.name.clone();
                    self.input = template.content.clone();
                    format!("Template \"{name}\" loaded into the input")
                }
                None => format!("No template with id {id}"),
            },
            Command::Theme(mode) => {
                self.theme_pref.mode = mode.unwrap_or_else(|| self.theme_pref.mode.toggled());
                self.theme = Theme::from_preference(self.theme_pref);
                if let Err(e) = self.history.save_theme(&self.theme_pref) {
                    warn!(error = %e, "failed to persist theme preference");
                }
                let label = match self.theme_pref.mode {
                    ThemeMode::Dark => "dark",
                    ThemeMode::Light => "light",
                };
                format!("Theme: {label}")
            }
        }
    }

    fn drain_outcomes(&mut self, rx: &mut mpsc::UnboundedReceiver<ExchangeOutcome>) -> bool {
        let mut received = false;
        while let Ok(outcome) = rx.try_recv() {
            self.manager.complete(&outcome.session_id, outcome.reply);
            received = true;
        }
        if received {
            self.auto_scroll = true;
        }
        received
    }

    fn title_line(&self) -> String {
        match self.manager.active_session() {
            Some(session) => {
                let position = self
                    .manager
                    .sessions()
                    .iter()
                    .position(|s| s.id == session.id)
                    .map(|i| i + 1)
                    .unwrap_or(1);
                format!(
                    "Causerie | {} | {} | temp {} ({}/{})",
                    session.title,
                    session.model,
                    session.parameters.temperature,
                    position,
                    self.manager.sessions().len()
                )
            }
            None => "Causerie".to_string(),
        }
    }

    // Owned lines so the caller can keep mutating view state while they are
    // rendered.
    fn build_display_lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let Some(session) = self.manager.active_session() else {
            lines.push(Line::from(Span::styled(
                "No conversation yet.",
                self.theme.system_text_style,
            )));
            lines.push(Line::from(Span::styled(
                "Type a message to start chatting, or press Ctrl+N for a fresh session.",
                self.theme.system_text_style,
            )));
            return lines;
        };

        for msg in &session.messages {
            if msg.is_user() {
                let mut content_lines = msg.content.lines();
                let first = content_lines.next().unwrap_or_default().to_string();
                lines.push(Line::from(vec![
                    Span::styled("You: ", self.theme.user_prefix_style),
                    Span::styled(first, self.theme.user_text_style),
                ]));
                for content_line in content_lines {
                    lines.push(Line::from(Span::styled(
                        content_line.to_string(),
                        self.theme.user_text_style,
                    )));
                }
            } else {
                for content_line in msg.content.lines() {
                    if content_line.trim().is_empty() {
                        lines.push(Line::from(""));
                    } else {
                        lines.push(Line::from(Span::styled(
                            content_line.to_string(),
                            self.theme.assistant_text_style,
                        )));
                    }
                }
            }
            lines.push(Line::from(""));
        }

        if self.manager.is_awaiting(&session.id) {
            lines.push(Line::from(Span::styled(
                THINKING_INDICATOR,
                self.theme.thinking_indicator_style,
            )));
        }

        lines
    }
}

fn ui(f: &mut Frame, app: &mut ChatApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    let lines = app.build_display_lines();

    // Account for the title line only; the chat area has no borders.
    let available_height = chunks[0].height.saturating_sub(1);
    let total_lines = lines.len() as u16;
    let max_offset = total_lines.saturating_sub(available_height);

    if app.auto_scroll {
        app.scroll_offset = max_offset;
    } else {
        app.scroll_offset = app.scroll_offset.min(max_offset);
    }

    let messages = Paragraph::new(lines)
        .style(Style::default().bg(app.theme.background_color))
        .block(
            Block::default()
                .title(app.title_line())
                .title_style(app.theme.title_style),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.scroll_offset, 0));
    f.render_widget(messages, chunks[0]);

    let input_title = app.status.clone().unwrap_or_else(|| INPUT_HINT.to_string());
    let input = Paragraph::new(app.input.as_str())
        .style(app.theme.input_text_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.theme.input_border_style)
                .title(input_title)
                .title_style(app.theme.input_title_style),
        );
    f.render_widget(input, chunks[1]);

    f.set_cursor_position((
        chunks[1].x + app.input.as_str().width() as u16 + 1,
        chunks[1].y + 1,
    ));
}

/// Run the interactive chat until the user quits.
pub async fn run_chat(
    cli_model: Option<String>,
    cli_base_url: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let base_url = cli_base_url
        .or(config.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let model = cli_model
        .or(config.default_model)
        .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

    let history = HistoryStore::open();
    let manager = SessionManager::hydrate(history.clone());
    let params = ParameterStore::new(model);
    let templates = TemplateStore::with_builtins(Utc::now());
    let client = GenerationClient::new(base_url);
    let (service, mut rx) = GenerationService::new(Arc::new(client));

    let mut app = ChatApp::new(manager, params, templates, service, history);

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &mut app, &mut rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut ChatApp,
    rx: &mut mpsc::UnboundedReceiver<ExchangeOutcome>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.should_quit = true;
                    }
                    KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        let status = app.execute_command(Command::New);
                        app.status = Some(status);
                    }
                    KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.cycle_session();
                    }
                    KeyCode::Char('t') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        let status = app.execute_command(Command::Theme(None));
                        app.status = Some(status);
                    }
                    KeyCode::Enter => app.handle_enter(),
                    KeyCode::Char(c) => app.input.push(c),
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Up => {
                        app.auto_scroll = false;
                        app.scroll_offset = app.scroll_offset.saturating_sub(1);
                    }
                    KeyCode::Down => {
                        app.scroll_offset = app.scroll_offset.saturating_add(1);
                    }
                    KeyCode::PageUp => {
                        app.auto_scroll = false;
                        app.scroll_offset = app.scroll_offset.saturating_sub(10);
                    }
                    KeyCode::PageDown => {
                        app.scroll_offset = app.scroll_offset.saturating_add(10);
                    }
                    _ => {}
                },
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => {
                        app.auto_scroll = false;
                        app.scroll_offset = app.scroll_offset.saturating_sub(3);
                    }
                    MouseEventKind::ScrollDown => {
                        app.scroll_offset = app.scroll_offset.saturating_add(3);
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        if app.drain_outcomes(rx) {
            continue;
        }

        if app.should_quit {
            break Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::ModelParameters;
    use crate::generation::{ExchangeRequest, GenerationBackend, GenerationError};
    use crate::persistence::ThemeMode;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct CannedBackend(Result<String, GenerationError>);

    #[async_trait]
    impl GenerationBackend for CannedBackend {
        async fn generate(&self, _request: &ExchangeRequest) -> Result<String, GenerationError> {
            self.0.clone()
        }
    }

    fn test_app(
        reply: Result<String, GenerationError>,
    ) -> (ChatApp, mpsc::UnboundedReceiver<ExchangeOutcome>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let history = HistoryStore::at(temp_dir.path());
        let manager = SessionManager::hydrate(history.clone());
        let params = ParameterStore::new(DEFAULT_MODEL_ID);
        let templates = TemplateStore::with_builtins(Utc::now());
        let (service, rx) = GenerationService::new(Arc::new(CannedBackend(reply)));
        let app = ChatApp::new(manager, params, templates, service, history);
        (app, rx, temp_dir)
    }

    #[tokio::test]
    async fn enter_submits_and_the_drained_outcome_completes_the_exchange() {
        let (mut app, mut rx, _temp_dir) = test_app(Ok("Hi there!".to_string()));

        app.input = "Hello".to_string();
        app.handle_enter();

        let session_id = app.manager.active_session_id().unwrap().to_string();
        assert!(app.manager.is_awaiting(&session_id));
        assert_eq!(app.manager.session(&session_id).unwrap().messages.len(), 1);

        // Wait for the spawned exchange, then drain like the loop would.
        let outcome = rx.recv().await.expect("outcome");
        app.manager.complete(&outcome.session_id, outcome.reply);

        let session = app.manager.session(&session_id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "Hi there!");
        assert!(!app.manager.is_awaiting(&session_id));
    }

    #[tokio::test]
    async fn empty_input_never_submits() {
        let (mut app, _rx, _temp_dir) = test_app(Ok("unused".to_string()));

        app.input = "   ".to_string();
        app.handle_enter();

        assert!(app.manager.sessions().is_empty());
        assert_eq!(app.input, "   ");
    }

    #[tokio::test]
    async fn zero_temperature_command_is_not_treated_as_missing() {
        let (mut app, _rx, _temp_dir) = test_app(Ok("unused".to_string()));

        app.input = "/temp 0".to_string();
        app.handle_enter();

        assert_eq!(app.params.get().temperature, 0.0);
    }

    #[tokio::test]
    async fn template_add_use_and_remove_round_trip() {
        let (mut app, _rx, _temp_dir) = test_app(Ok("unused".to_string()));
        let before = app.templates.list().len();

        app.execute_command(Command::TemplateAdd {
            name: "Bug Report".to_string(),
            content: "Describe the bug in {area}".to_string(),
        });
        assert_eq!(app.templates.list().len(), before + 1);

        let id = app.templates.list()[0].id.clone();
        app.execute_command(Command::TemplateUse(id.clone()));
        assert_eq!(app.input, "Describe the bug in {area}");

        app.execute_command(Command::TemplateRemove(id));
        assert_eq!(app.templates.list().len(), before);

        // Removing again is a harmless no-op.
        let status = app.execute_command(Command::TemplateRemove("absent".to_string()));
        assert!(status.contains("No template"));
    }

    #[tokio::test]
    async fn theme_toggle_persists_through_the_bridge() {
        let (mut app, _rx, temp_dir) = test_app(Ok("unused".to_string()));
        assert_eq!(app.theme_pref.mode, ThemeMode::Dark);

        app.execute_command(Command::Theme(None));
        assert_eq!(app.theme_pref.mode, ThemeMode::Light);

        let reloaded = HistoryStore::at(temp_dir.path()).load_theme();
        assert_eq!(reloaded.mode, ThemeMode::Light);
    }

    #[tokio::test]
    async fn model_command_updates_store_and_active_session() {
        let (mut app, _rx, _temp_dir) = test_app(Ok("unused".to_string()));
        app.start_session();

        app.execute_command(Command::Model("gemini-pro".to_string()));

        assert_eq!(app.params.model(), "gemini-pro");
        assert_eq!(app.manager.active_session().unwrap().model, "gemini-pro");
    }

    #[tokio::test]
    async fn busy_session_keeps_the_typed_text() {
        let (mut app, _rx, _temp_dir) = test_app(Ok("slow".to_string()));

        app.input = "first".to_string();
        app.handle_enter();
        app.input = "second".to_string();
        app.handle_enter();

        assert_eq!(app.input, "second");
        let session = app.manager.active_session().unwrap();
        assert_eq!(session.messages.len(), 1);
    }

    #[tokio::test]
    async fn parameter_snapshot_follows_commands_into_new_sessions() {
        let (mut app, _rx, _temp_dir) = test_app(Ok("unused".to_string()));

        app.execute_command(Command::Temperature(1.5));
        app.start_session();

        assert_eq!(
            app.manager.active_session().unwrap().parameters,
            ModelParameters {
                temperature: 1.5,
                ..ModelParameters::default()
            }
        );
    }
}
