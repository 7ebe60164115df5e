use crate::config::{AppConfig, bright_data_api_key};
use crate::core::{
    AnalysisSession, CurlRunner, FileEntry, OpenAiModel, PipelineEvent, StorageService,
    TrendService, format_date, parse_date,
};
use crate::error::Result;
use crate::tui::components::{FileFilter, FileList, InputField, ProgressBar, Viewer};
use crate::tui::events::AppEvent;
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, MouseEvent};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Home,
    NewAnalysis,
    Processing { finished: bool },
    Browser,
    Viewer { from_processing: bool },
    Settings,
}

pub const HOME_OPTIONS: [&str; 4] = [
    "New Analysis",
    "View Transcripts",
    "View Reports",
    "Settings",
];

const FIELD_CHANNELS: usize = 0;
const FIELD_START: usize = 1;
const FIELD_END: usize = 2;
const FIELD_ANALYZE: usize = 3;
const FIELD_COUNT: usize = 4;

pub struct App {
    pub state: AppState,
    pub should_quit: bool,

    // Home screen
    pub selected_option: usize,

    // New analysis screen
    pub channels_input: InputField,
    pub start_input: InputField,
    pub end_input: InputField,
    pub run_analysis: bool,
    pub input_focus: usize,
    pub form_error: Option<String>,

    // Browser screen
    pub file_list: FileList,
    pub search_input: InputField,

    // Viewer screen
    pub content_viewer: Option<Viewer>,
    pub viewer_height: u16,

    // Processing screen
    pub progress_bar: ProgressBar,

    pub config: Option<AppConfig>,
    pub config_error: Option<String>,
    pub storage: StorageService,

    /// Inputs and results of the most recent run.
    pub session: Option<AnalysisSession>,

    events_rx: Option<mpsc::UnboundedReceiver<PipelineEvent>>,
    pending: Option<oneshot::Receiver<AnalysisSession>>,
}

impl App {
    pub fn new(config: Result<AppConfig>) -> Self {
        let storage = StorageService::new(
            &config
                .as_ref()
                .map(|c| c.storage.clone())
                .unwrap_or_default(),
        );
        Self::with_storage(config, storage)
    }

    fn with_storage(config: Result<AppConfig>, storage: StorageService) -> Self {
        let (config, config_error) = match config {
            Ok(config) => (Some(config), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let files = storage.list_files().unwrap_or_default();

        let today = format_date(Local::now().date_naive());
        let mut start_input = InputField::new("Start Date", "YYYY-MM-DD");
        start_input.set_value(today.clone());
        let mut end_input = InputField::new("End Date", "YYYY-MM-DD");
        end_input.set_value(today);

        Self {
            state: AppState::Home,
            should_quit: false,

            selected_option: 0,

            channels_input: InputField::new(
                "Channel URLs (comma separated)",
                "https://www.youtube.com/@channel",
            ),
            start_input,
            end_input,
            run_analysis: true,
            input_focus: FIELD_CHANNELS,
            form_error: None,

            file_list: FileList::new(files),
            search_input: InputField::new("Search", "Filter files..."),

            content_viewer: None,
            viewer_height: 0,

            progress_bar: ProgressBar::new(),

            config,
            config_error,
            storage,

            session: None,
            events_rx: None,
            pending: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Quit => self.should_quit = true,
            AppEvent::Key(key) => self.handle_key(key)?,
            AppEvent::Mouse(mouse) => self.handle_mouse(mouse),
            AppEvent::Tick => self.handle_tick()?,
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.state {
            AppState::Home => self.handle_home_key(key),
            AppState::NewAnalysis => self.handle_new_analysis_key(key),
            AppState::Browser => self.handle_browser_key(key),
            AppState::Viewer { .. } => self.handle_viewer_key(key),
            AppState::Processing { .. } => self.handle_processing_key(key),
            AppState::Settings => self.handle_settings_key(key),
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match self.state {
            AppState::Browser => {
                self.file_list.handle_mouse(mouse);
            }
            AppState::Viewer { .. } => {
                if let Some(viewer) = &mut self.content_viewer {
                    viewer.handle_mouse(mouse, self.viewer_height);
                }
            }
            _ => {}
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) -> Result<()> {
        let last = HOME_OPTIONS.len() - 1;
        match key.code {
            KeyCode::Up => self.selected_option = self.selected_option.saturating_sub(1),
            KeyCode::Down => self.selected_option = (self.selected_option + 1).min(last),
            KeyCode::Char(c @ '1'..='4') => self.selected_option = (c as usize) - ('1' as usize),
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => match self.selected_option {
                0 => self.open_new_analysis(),
                1 => self.open_browser(FileFilter::Transcripts)?,
                2 => self.open_browser(FileFilter::Reports)?,
                3 => self.state = AppState::Settings,
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    fn open_new_analysis(&mut self) {
        if self.is_running() {
            self.state = AppState::Processing { finished: false };
            return;
        }

        if let Some(session) = &self.session {
            self.channels_input.set_value(session.channel_urls.join(", "));
            self.start_input.set_value(format_date(session.start_date));
            self.end_input.set_value(format_date(session.end_date));
            self.run_analysis = session.run_analysis;
        }

        self.form_error = None;
        self.input_focus = FIELD_CHANNELS;
        self.sync_focus();
        self.state = AppState::NewAnalysis;
    }

    fn open_browser(&mut self, filter: FileFilter) -> Result<()> {
        self.refresh_file_list()?;
        self.file_list.set_filter(filter);
        self.search_input.focused = false;
        self.search_input.clear();
        self.file_list.set_search("");
        self.state = AppState::Browser;
        Ok(())
    }

    fn handle_new_analysis_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => self.state = AppState::Home,
            KeyCode::Tab | KeyCode::Down => self.move_focus(1),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(FIELD_COUNT - 1),
            KeyCode::Enter => {
                if self.input_focus < FIELD_ANALYZE {
                    self.move_focus(1);
                } else {
                    self.start_processing();
                }
            }
            KeyCode::Char(' ') if self.input_focus == FIELD_ANALYZE => {
                self.run_analysis = !self.run_analysis;
            }
            _ => {
                if let Some(input) = self.focused_input() {
                    input.handle_key(key);
                }
            }
        }
        Ok(())
    }

    fn focused_input(&mut self) -> Option<&mut InputField> {
        match self.input_focus {
            FIELD_CHANNELS => Some(&mut self.channels_input),
            FIELD_START => Some(&mut self.start_input),
            FIELD_END => Some(&mut self.end_input),
            _ => None,
        }
    }

    fn move_focus(&mut self, step: usize) {
        self.input_focus = (self.input_focus + step) % FIELD_COUNT;
        self.sync_focus();
    }

    fn sync_focus(&mut self) {
        self.channels_input.focused = self.input_focus == FIELD_CHANNELS;
        self.start_input.focused = self.input_focus == FIELD_START;
        self.end_input.focused = self.input_focus == FIELD_END;
    }

    fn handle_browser_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.search_input.focused {
            match key.code {
                KeyCode::Esc => {
                    self.search_input.focused = false;
                    self.search_input.clear();
                    self.file_list.set_search("");
                }
                KeyCode::Enter => self.search_input.focused = false,
                _ => {
                    self.search_input.handle_key(key);
                    self.file_list.set_search(&self.search_input.value);
                }
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Esc => self.state = AppState::Home,
            KeyCode::Enter => {
                if let Some(file) = self.file_list.get_selected().cloned() {
                    self.open_file(file, false)?;
                }
            }
            KeyCode::Delete => self.delete_selected_files()?,
            KeyCode::Char('/') => self.search_input.focused = true,
            KeyCode::Char('1') => self.file_list.set_filter(FileFilter::All),
            KeyCode::Char('2') => self.file_list.set_filter(FileFilter::Transcripts),
            KeyCode::Char('3') => self.file_list.set_filter(FileFilter::Reports),
            _ => {
                self.file_list.handle_key(key);
            }
        }
        Ok(())
    }

    fn handle_viewer_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.state = match self.state {
                    AppState::Viewer {
                        from_processing: true,
                        ..
                    } => AppState::Processing { finished: true },
                    _ => AppState::Browser,
                };
                self.content_viewer = None;
            }
            _ => {
                if let Some(viewer) = &mut self.content_viewer {
                    viewer.handle_key(key, self.viewer_height);
                }
            }
        }
        Ok(())
    }

    fn handle_processing_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            // The run keeps going in the background; its results land in the session.
            KeyCode::Esc => self.state = AppState::Home,
            KeyCode::Enter if !self.is_running() => {
                let report = self
                    .session
                    .as_ref()
                    .and_then(|session| session.report_path.clone());
                if let Some(path) = report {
                    let entry = self
                        .storage
                        .list_files()?
                        .into_iter()
                        .find(|file| file.path == path);
                    if let Some(entry) = entry {
                        self.open_file(entry, true)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_settings_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Esc {
            self.state = AppState::Home;
        }
        Ok(())
    }

    fn handle_tick(&mut self) -> Result<()> {
        // Poll the session first so events sent just before it are still drained.
        let received = self.pending.as_mut().map(|pending| pending.try_recv());
        self.drain_events();

        match received {
            Some(Ok(session)) => {
                self.pending = None;
                self.events_rx = None;
                self.finish_run(session)?;
            }
            Some(Err(oneshot::error::TryRecvError::Closed)) => {
                self.pending = None;
                self.events_rx = None;
                self.progress_bar
                    .set_message("The analysis task stopped unexpectedly".to_string());
                self.mark_finished();
            }
            Some(Err(oneshot::error::TryRecvError::Empty)) | None => {}
        }

        Ok(())
    }

    fn drain_events(&mut self) {
        let mut events = Vec::new();
        if let Some(rx) = &mut self.events_rx {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }

        for event in events {
            match event {
                PipelineEvent::Status(status) => {
                    self.progress_bar.add_log(status.clone());
                    self.progress_bar.set_message(status);
                }
                PipelineEvent::Log(log) => self.progress_bar.add_log(log),
                PipelineEvent::Progress(progress) => self.progress_bar.set_progress(progress),
                PipelineEvent::Videos(videos) => self.progress_bar.videos = videos,
                PipelineEvent::Finished => {}
            }
        }
    }

    fn finish_run(&mut self, session: AnalysisSession) -> Result<()> {
        if !session.transcript_files.is_empty() {
            self.progress_bar
                .add_log(format!("Transcripts: {}", session.file_paths()));
        }
        match (&session.error, &session.report_path) {
            (Some(error), _) => self.progress_bar.set_message(error.clone()),
            (None, Some(path)) => {
                self.progress_bar
                    .add_log(format!("Report saved to {}", path.display()));
                self.progress_bar
                    .set_message("Done. Press Enter to open the report.".to_string());
            }
            (None, None) => self.progress_bar.set_message(session.status.clone()),
        }

        self.session = Some(session);
        self.refresh_file_list()?;
        self.mark_finished();
        Ok(())
    }

    fn mark_finished(&mut self) {
        if let AppState::Processing { finished } = &mut self.state {
            *finished = true;
        }
    }

    /// Validates the form and builds the session for a new run.
    fn build_session(&self) -> std::result::Result<(AnalysisSession, AppConfig), String> {
        let config = match (&self.config, &self.config_error) {
            (Some(config), _) => config.clone(),
            (None, Some(error)) => return Err(error.clone()),
            (None, None) => return Err("No configuration loaded".to_string()),
        };

        let channels = self.channels_input.entries();
        if channels.is_empty() {
            return Err("Add at least one channel URL".to_string());
        }

        let start = parse_date(&self.start_input.value)
            .ok_or_else(|| "Start date must be YYYY-MM-DD".to_string())?;
        let end = parse_date(&self.end_input.value)
            .ok_or_else(|| "End date must be YYYY-MM-DD".to_string())?;

        let session = AnalysisSession::new(channels, start, end).with_analysis(self.run_analysis);
        Ok((session, config))
    }

    fn start_processing(&mut self) {
        if self.is_running() {
            self.form_error = Some("An analysis is already running".to_string());
            return;
        }

        let (session, config) = match self.build_session() {
            Ok(built) => built,
            Err(message) => {
                self.form_error = Some(message);
                return;
            }
        };

        let runner = CurlRunner::new(config.scraper.curl_path.clone());
        let model = OpenAiModel::new(&config.model);
        let service = match TrendService::new(config, runner, model) {
            Ok(service) => service,
            Err(e) => {
                self.form_error = Some(e.to_string());
                return;
            }
        };

        let api_key = bright_data_api_key().ok();
        let (tx, rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let session = service.run_session(api_key.as_deref(), session, Some(&tx)).await;
            let _ = done_tx.send(session);
        });

        self.form_error = None;
        self.events_rx = Some(rx);
        self.pending = Some(done_rx);
        self.progress_bar.reset();
        self.progress_bar.set_message("Starting...".to_string());
        self.state = AppState::Processing { finished: false };
    }

    fn refresh_file_list(&mut self) -> Result<()> {
        let files = self.storage.list_files()?;
        self.file_list.update_items(files);
        Ok(())
    }

    fn open_file(&mut self, file: FileEntry, from_processing: bool) -> Result<()> {
        let content = self.storage.load(&file.path)?;
        let viewer = Viewer::new(content, file.path.to_string_lossy().to_string());
        self.content_viewer = Some(viewer);
        self.state = AppState::Viewer { from_processing };
        Ok(())
    }

    fn delete_selected_files(&mut self) -> Result<()> {
        let targets: Vec<PathBuf> = self
            .file_list
            .get_selected_items()
            .into_iter()
            .map(|file| file.path.clone())
            .collect();
        for path in targets {
            self.storage.delete_file(&path)?;
        }
        self.refresh_file_list()?;
        Ok(())
    }

    pub fn browser_filter(&self) -> FileFilter {
        self.file_list.filter()
    }
}
