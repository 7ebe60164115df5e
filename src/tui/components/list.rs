use crate::core::{FileEntry, FileType};
use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFilter {
    All,
    Transcripts,
    Reports,
}

impl FileFilter {
    fn accepts(self, file: &FileEntry) -> bool {
        match self {
            FileFilter::All => true,
            FileFilter::Transcripts => file.file_type == FileType::Transcript,
            FileFilter::Reports => file.file_type == FileType::Report,
        }
    }
}

/// Browsable list of stored files with a type filter and a name search.
pub struct FileList {
    all_items: Vec<FileEntry>,
    pub items: Vec<FileEntry>,
    pub state: ListState,
    pub selected_items: Vec<bool>,
    filter: FileFilter,
    search: String,
    viewport_size: usize,
}

impl FileList {
    pub fn new(items: Vec<FileEntry>) -> Self {
        let mut list = Self {
            all_items: items,
            items: Vec::new(),
            state: ListState::default(),
            selected_items: Vec::new(),
            filter: FileFilter::All,
            search: String::new(),
            viewport_size: 0,
        };
        list.rebuild();
        list
    }

    pub fn filter(&self) -> FileFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: FileFilter) {
        self.filter = filter;
        self.rebuild();
    }

    pub fn set_search(&mut self, search: &str) {
        self.search = search.to_lowercase();
        self.rebuild();
    }

    pub fn update_items(&mut self, new_items: Vec<FileEntry>) {
        self.all_items = new_items;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let current_selected = self.state.selected();
        self.items = self
            .all_items
            .iter()
            .filter(|file| self.filter.accepts(file))
            .filter(|file| {
                self.search.is_empty() || file.name.to_lowercase().contains(&self.search)
            })
            .cloned()
            .collect();
        self.selected_items = vec![false; self.items.len()];

        if self.items.is_empty() {
            self.state.select(None);
        } else {
            let selected = current_selected.unwrap_or(0).min(self.items.len() - 1);
            self.state.select(Some(selected));
        }
        self.adjust_offset();
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => self.move_by(-1, true),
            KeyCode::Down => self.move_by(1, true),
            KeyCode::PageDown => self.move_by(self.viewport_size.max(1) as isize, false),
            KeyCode::PageUp => self.move_by(-(self.viewport_size.max(1) as isize), false),
            KeyCode::Home => self.select_index(0),
            KeyCode::End => self.select_index(usize::MAX),
            KeyCode::Char(' ') => {
                self.toggle_selected();
                true
            }
            _ => false,
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> bool {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.move_by(-1, false),
            MouseEventKind::ScrollDown => self.move_by(1, false),
            _ => false,
        }
    }

    /// Moves the selection; `wrap` makes the ends of the list meet.
    fn move_by(&mut self, delta: isize, wrap: bool) -> bool {
        if self.items.is_empty() {
            return false;
        }

        let len = self.items.len() as isize;
        let current = self.state.selected().unwrap_or(0) as isize;
        let target = if wrap {
            (current + delta).rem_euclid(len)
        } else {
            (current + delta).clamp(0, len - 1)
        };
        self.select_index(target as usize)
    }

    fn select_index(&mut self, index: usize) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.state.select(Some(index.min(self.items.len() - 1)));
        self.adjust_offset();
        true
    }

    pub fn toggle_selected(&mut self) {
        if let Some(i) = self.state.selected()
            && i < self.selected_items.len()
        {
            self.selected_items[i] = !self.selected_items[i];
        }
    }

    pub fn get_selected(&self) -> Option<&FileEntry> {
        self.state.selected().and_then(|i| self.items.get(i))
    }

    /// Checked files, or the highlighted one when nothing is checked.
    pub fn get_selected_items(&self) -> Vec<&FileEntry> {
        let checked: Vec<&FileEntry> = self
            .selected_items
            .iter()
            .zip(&self.items)
            .filter_map(|(&selected, file)| selected.then_some(file))
            .collect();

        if checked.is_empty() {
            self.get_selected().into_iter().collect()
        } else {
            checked
        }
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, title: &str) {
        self.viewport_size = (area.height.saturating_sub(2) as usize).max(1);
        self.adjust_offset();

        let items: Vec<ListItem> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let checkbox = if self.selected_items.get(i).copied().unwrap_or(false) {
                    "☑ "
                } else {
                    "☐ "
                };

                let icon = match file.file_type {
                    FileType::Transcript => "📄",
                    FileType::Report => "📊",
                };

                let line = Line::from(vec![
                    Span::raw(checkbox),
                    Span::raw(icon),
                    Span::raw(" "),
                    Span::styled(&file.name, Style::default().fg(Color::White)),
                    Span::raw(format!(" ({})", format_size(file.size))),
                ]);

                ListItem::new(line)
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{title} ({})", self.items.len())),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            );

        f.render_stateful_widget(list, area, &mut self.state);
    }

    fn adjust_offset(&mut self) {
        let Some(selected) = self.state.selected() else {
            *self.state.offset_mut() = 0;
            return;
        };

        let viewport = self.viewport_size.max(1);
        let max_offset = self.items.len().saturating_sub(viewport);
        let mut offset = self.state.offset().min(max_offset);

        if selected < offset {
            offset = selected;
        } else if selected >= offset + viewport {
            offset = selected + 1 - viewport;
        }
        *self.state.offset_mut() = offset;
    }
}

pub fn format_size(bytes: u64) -> String {
    let size_kb = bytes / 1024;
    if size_kb < 1024 {
        format!("{size_kb}KB")
    } else {
        format!("{:.1}MB", size_kb as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn entry(name: &str, file_type: FileType) -> FileEntry {
        FileEntry {
            path: PathBuf::from(name),
            name: name.to_string(),
            file_type,
            size: 2048,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    fn sample() -> FileList {
        FileList::new(vec![
            entry("abc.txt", FileType::Transcript),
            entry("xyz.txt", FileType::Transcript),
            entry("youtube_trend_analysis_1.md", FileType::Report),
        ])
    }

    #[test]
    fn filters_by_type_and_search() {
        let mut list = sample();
        assert_eq!(list.items.len(), 3);

        list.set_filter(FileFilter::Transcripts);
        assert_eq!(list.items.len(), 2);

        list.set_search("XY");
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.get_selected().unwrap().name, "xyz.txt");

        list.set_search("");
        list.set_filter(FileFilter::Reports);
        assert_eq!(list.items.len(), 1);
    }

    #[test]
    fn arrow_keys_wrap_around() {
        let mut list = sample();
        list.handle_key(KeyEvent::new(KeyCode::Up, KeyModifiers::NONE));
        assert_eq!(list.state.selected(), Some(2));
        list.handle_key(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE));
        assert_eq!(list.state.selected(), Some(0));
    }

    #[test]
    fn selection_falls_back_to_highlighted() {
        let mut list = sample();
        assert_eq!(list.get_selected_items().len(), 1);

        list.toggle_selected();
        list.handle_key(KeyEvent::new(KeyCode::End, KeyModifiers::NONE));
        list.toggle_selected();
        let names: Vec<&str> = list.get_selected_items().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["abc.txt", "youtube_trend_analysis_1.md"]);
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_size(2048), "2KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0MB");
    }
}
