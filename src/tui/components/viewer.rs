use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use std::path::Path;

pub struct Viewer {
    lines: Vec<Line<'static>>,
    pub scroll: usize,
    pub file_path: String,
}

impl Viewer {
    pub fn new(content: String, file_path: String) -> Self {
        let lines = if file_path.ends_with(".md") {
            markdown_lines(&content)
        } else {
            content
                .lines()
                .map(|line| Line::from(Span::raw(line.to_string())))
                .collect()
        };

        Self {
            lines,
            scroll: 0,
            file_path,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, area_height: u16) -> bool {
        let page_size = (area_height as usize).saturating_sub(2).max(1);
        let max_scroll = self.lines.len().saturating_sub(page_size);

        match key.code {
            KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down => self.scroll = (self.scroll + 1).min(max_scroll),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(page_size),
            KeyCode::PageDown => self.scroll = (self.scroll + page_size).min(max_scroll),
            KeyCode::Home => self.scroll = 0,
            KeyCode::End => self.scroll = max_scroll,
            _ => return false,
        }
        true
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, area_height: u16) -> bool {
        let code = match mouse.kind {
            MouseEventKind::ScrollUp => KeyCode::Up,
            MouseEventKind::ScrollDown => KeyCode::Down,
            _ => return false,
        };
        self.handle_key(KeyEvent::from(code), area_height)
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let title = Path::new(&self.file_path)
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let visible_lines = area.height.saturating_sub(2) as usize;
        let lines: Vec<Line> = self
            .lines
            .iter()
            .skip(self.scroll)
            .take(visible_lines)
            .cloned()
            .collect();

        let total_lines = self.lines.len();
        let scroll_info = if total_lines > visible_lines {
            format!(
                " (lines {}-{} of {})",
                self.scroll + 1,
                (self.scroll + visible_lines).min(total_lines),
                total_lines
            )
        } else {
            String::new()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{title}{scroll_info}"));

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });

        f.render_widget(paragraph, area);
    }
}

/// Renders markdown into styled terminal lines.
pub fn markdown_lines(source: &str) -> Vec<Line<'static>> {
    let mut renderer = MarkdownRenderer::default();
    let parser = Parser::new_ext(source, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);

    for event in parser {
        renderer.handle(event);
    }

    renderer.finish()
}

#[derive(Default)]
struct MarkdownRenderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    list_depth: usize,
}

impl MarkdownRenderer {
    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, patch: Style) {
        let style = self.style().patch(patch);
        self.styles.push(style);
    }

    fn push_text(&mut self, text: &str) {
        let style = self.style();
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.flush();
            }
            if !part.is_empty() {
                self.current.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.lines.push(Line::from(spans));
        }
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|line| !line.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush();
                self.push_style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                );
                self.push_text(&format!("{} ", "#".repeat(level as usize)));
            }
            Event::End(TagEnd::Heading(_)) => {
                self.styles.pop();
                self.blank();
            }
            Event::Start(Tag::Strong) => {
                self.push_style(Style::default().add_modifier(Modifier::BOLD))
            }
            Event::Start(Tag::Emphasis) => {
                self.push_style(Style::default().add_modifier(Modifier::ITALIC))
            }
            Event::Start(Tag::Strikethrough) => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Event::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough) => {
                self.styles.pop();
            }
            Event::Start(Tag::List(_)) => {
                self.flush();
                self.list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    self.blank();
                }
            }
            Event::Start(Tag::Item) => {
                self.flush();
                let indent = "  ".repeat(self.list_depth.saturating_sub(1));
                self.current
                    .push(Span::styled(format!("{indent}• "), Style::default().fg(Color::Green)));
            }
            Event::End(TagEnd::Item) => self.flush(),
            Event::End(TagEnd::Paragraph) => {
                if self.list_depth == 0 {
                    self.blank();
                } else {
                    self.flush();
                }
            }
            Event::Start(Tag::Table(_)) => {
                self.flush();
                self.push_style(Style::default().fg(Color::Cyan));
            }
            Event::End(TagEnd::Table) => {
                self.styles.pop();
                self.blank();
            }
            Event::Start(Tag::TableHead | Tag::TableRow) => {
                self.flush();
                self.push_text("| ");
            }
            Event::End(TagEnd::TableCell) => self.push_text(" | "),
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => self.flush(),
            Event::Start(Tag::CodeBlock(_)) => {
                self.flush();
                self.push_style(Style::default().fg(Color::Magenta));
            }
            Event::End(TagEnd::CodeBlock) => {
                self.styles.pop();
                self.blank();
            }
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => {
                let style = self.style().fg(Color::Magenta);
                self.current.push(Span::styled(code.to_string(), style));
            }
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(40),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|line| line.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'static>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn renders_headings_lists_and_tables() {
        let md = "# Trends\n\nIntro text.\n\n- first\n- second\n\n\
                  | Topic | Videos |\n|---|---|\n| AI | 3 |\n";
        let rendered = plain(&markdown_lines(md));

        assert_eq!(rendered[0], "# Trends");
        assert!(rendered.contains(&"Intro text.".to_string()));
        assert!(rendered.contains(&"• first".to_string()));
        assert!(rendered.contains(&"• second".to_string()));
        assert!(rendered.contains(&"| Topic | Videos | ".to_string()));
        assert!(rendered.contains(&"| AI | 3 | ".to_string()));
    }

    #[test]
    fn transcripts_are_shown_verbatim() {
        let viewer = Viewer::new(
            "(0-1): # not a heading\n(1-2): bye".to_string(),
            "t/a.txt".to_string(),
        );
        assert_eq!(viewer.lines.len(), 2);
        assert_eq!(plain(&viewer.lines)[0], "(0-1): # not a heading");
    }

    #[test]
    fn scrolling_stays_in_bounds() {
        let content = (0..50).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let mut viewer = Viewer::new(content, "a.txt".to_string());
        viewer.handle_key(KeyEvent::from(KeyCode::End), 12);
        assert_eq!(viewer.scroll, 40);
        viewer.handle_key(KeyEvent::from(KeyCode::Down), 12);
        assert_eq!(viewer.scroll, 40);
        viewer.handle_key(KeyEvent::from(KeyCode::PageUp), 12);
        assert_eq!(viewer.scroll, 30);
    }
}
