use crate::tui::app::{App, AppState, HOME_OPTIONS};
use crate::tui::components::FileFilter;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

pub fn draw(f: &mut Frame, app: &mut App) {
    match app.state {
        AppState::Home => draw_home(f, app),
        AppState::NewAnalysis => draw_new_analysis(f, app),
        AppState::Processing { finished } => draw_processing(f, app, finished),
        AppState::Browser => draw_browser(f, app),
        AppState::Viewer { .. } => draw_viewer(f, app),
        AppState::Settings => draw_settings(f, app),
    }
}

fn title_bar(f: &mut Frame, area: Rect, text: &str) {
    let title = Paragraph::new(text.to_string())
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn help_bar(f: &mut Frame, area: Rect, text: &str) {
    let help = Paragraph::new(text.to_string())
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, area);
}

fn radio_items<'a>(options: &[&'a str], selected: usize) -> Vec<ListItem<'a>> {
    options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let (marker, style) = if i == selected {
                (
                    "●",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                ("○", Style::default().fg(Color::White))
            };
            ListItem::new(Line::from(Span::styled(format!("{marker} {option}"), style)))
        })
        .collect()
}

fn draw_home(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(1),    // Menu
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    title_bar(f, chunks[0], "YouTube Trend Analyzer");

    let mut items = radio_items(&HOME_OPTIONS, app.selected_option);
    if app.is_running() {
        items.push(ListItem::new(Line::from(Span::styled(
            "  (an analysis is running, open New Analysis to follow it)",
            Style::default().fg(Color::DarkGray),
        ))));
    }
    let menu = List::new(items).block(Block::default().borders(Borders::ALL).title("Mode"));
    f.render_widget(menu, chunks[1]);

    help_bar(f, chunks[2], "[↑↓] Navigate  [1-4] Jump  [Enter] Select  [q] Exit");
}

fn draw_new_analysis(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Channels
            Constraint::Length(3), // Dates
            Constraint::Length(3), // Options
            Constraint::Length(3), // Error
            Constraint::Min(0),
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    title_bar(f, chunks[0], "New Analysis");

    app.channels_input.render(f, chunks[1]);

    let dates = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);
    app.start_input.render(f, dates[0]);
    app.end_input.render(f, dates[1]);

    let checkbox = if app.run_analysis { "☑" } else { "☐" };
    let option_style = if app.input_focus == 3 {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };
    let option = Paragraph::new(format!("{checkbox} Run AI trend analysis after scraping"))
        .style(option_style)
        .block(Block::default().borders(Borders::ALL).title("Options"));
    f.render_widget(option, chunks[3]);

    if let Some(error) = &app.form_error {
        let error = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Error"));
        f.render_widget(error, chunks[4]);
    }

    help_bar(
        f,
        chunks[6],
        "[Enter] Next/Start  [Tab] Next  [Space] Toggle  [Esc] Back",
    );
}

fn draw_processing(f: &mut Frame, app: &App, finished: bool) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(1),    // Progress area
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    title_bar(f, chunks[0], if finished { "Finished" } else { "Processing..." });

    let heading = app
        .session
        .as_ref()
        .filter(|_| !app.is_running())
        .map(|session| session.channel_urls.join(", "))
        .unwrap_or_else(|| app.channels_input.entries().join(", "));
    app.progress_bar.render(f, chunks[1], &heading);

    let help = if finished {
        "[Enter] Open report  [Esc] Home"
    } else {
        "[Esc] Home (keeps running)"
    };
    help_bar(f, chunks[2], help);
}

fn draw_browser(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(22), Constraint::Min(1)])
        .split(f.area());

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Filters
            Constraint::Length(3), // Search
        ])
        .split(chunks[0]);

    let selected = match app.browser_filter() {
        FileFilter::All => 0,
        FileFilter::Transcripts => 1,
        FileFilter::Reports => 2,
    };
    let filters = List::new(radio_items(&["All", "Transcripts", "Reports"], selected))
        .block(Block::default().borders(Borders::ALL).title("Filters"));
    f.render_widget(filters, left_chunks[0]);

    app.search_input.render(f, left_chunks[1]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(chunks[1]);

    app.file_list.render(f, right_chunks[0], "Files");

    help_bar(
        f,
        right_chunks[1],
        "[Enter] Open  [Del] Delete  [Space] Select  [/] Search  [1-3] Filters  [Esc] Back",
    );
}

fn draw_viewer(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(f.area());

    app.viewer_height = chunks[0].height;
    if let Some(viewer) = &app.content_viewer {
        viewer.render(f, chunks[0]);
    }

    help_bar(
        f,
        chunks[1],
        "[↑↓] Scroll  [PgUp/PgDn] Page  [Home/End] Top/Bottom  [Esc] Back",
    );
}

fn settings_lines(app: &App) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::Cyan);
    let row = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name:<22}"), label),
            Span::raw(value),
        ])
    };

    let Some(config) = &app.config else {
        let error = app
            .config_error
            .clone()
            .unwrap_or_else(|| "No configuration loaded".to_string());
        return vec![
            Line::from(Span::styled(error, Style::default().fg(Color::Red))),
            Line::default(),
            row("Transcripts", app.storage.transcripts_dir().display().to_string()),
        ];
    };

    let scraper = &config.scraper;
    let mut lines = vec![
        row("Provider", scraper.api_base.clone()),
        row("Dataset", scraper.dataset_id.clone()),
        row("Posts per channel", scraper.post_limit.to_string()),
        row("Order by", scraper.order_by.clone()),
        row("Country", scraper.country.clone()),
        row("Poll interval", format!("{}s", scraper.poll_interval_secs)),
        row(
            "Max progress checks",
            scraper
                .max_poll_attempts
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unbounded".to_string()),
        ),
        row("Transcripts", config.storage.transcripts_dir.display().to_string()),
        row("Reports", config.storage.reports_dir.display().to_string()),
        row("Model", config.model.name.clone()),
        Line::default(),
        Line::from(Span::styled("Stages", label.add_modifier(Modifier::BOLD))),
    ];
    lines.extend(config.stages.iter().enumerate().map(|(i, stage)| {
        Line::from(format!("  {}. {} ({:?}): {}", i + 1, stage.name, stage.kind, stage.role))
    }));
    lines
}

fn draw_settings(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(1),    // Settings content
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    title_bar(f, chunks[0], "Settings");

    let content = Paragraph::new(settings_lines(app))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Effective configuration"));
    f.render_widget(content, chunks[1]);

    help_bar(f, chunks[2], "[Esc] Back");
}
