use ratatui::crossterm::event::KeyEvent;
use std::io::Error;
use thiserror::Error;

use crate::listview::{DEFAULT_FIELD, DEFAULT_PAGE_SIZE, ListViewConfig};

#[derive(Debug, Error)]
pub enum LVError {
    #[error("io error: {0}")]
    IoError(#[from] Error),
}

#[derive(Debug, Clone)]
pub struct LVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub page_size: usize,
    pub search_field: String,
    pub sort_field: String,
    /// Columns to display. Empty means all columns of the loaded records.
    pub columns: Vec<String>,
}

impl Default for LVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            page_size: DEFAULT_PAGE_SIZE,
            search_field: DEFAULT_FIELD.to_string(),
            sort_field: DEFAULT_FIELD.to_string(),
            columns: Vec::new(),
        }
    }
}

impl LVConfig {
    pub fn list_view_config(&self) -> ListViewConfig {
        ListViewConfig::default()
            .page_size(self.page_size)
            .search_field(self.search_field.as_str())
            .sort_field(self.sort_field.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    AddRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    Sort,
    Search,
    AddRecord,
    DeleteRecord,
    Reload,
    Enter,
    Exit,
    Help,
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
  q        quit
  ↑ ↓      select row
  ← →      select column
  n p      next / previous page
  s        sort by selected column (repeat to toggle)
  /        search
  Enter    show record
  a        add record
  d        delete selected record
  r        reload
  Esc      close view or popup
  ?        this help";
