use ratatui::crossterm::event::{KeyCode, KeyEvent};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use lv::domain::{CMDMode, HELP_TEXT, LVConfig, LVError, Message};
use lv::fetch::{FetchOutcome, Fetcher, RecordSource};
use lv::listview::{ListView, SortDirection};
use lv::record::{Record, Value};
use lv::validate::validate_name;

use crate::inputter::{InputResult, Inputter};

const COLUMN_WIDTH_MARGIN: usize = 1;

#[derive(Debug, PartialEq)]
pub enum Status {
    LOADING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

#[derive(Clone, Debug)]
pub struct HeaderView {
    pub name: String,
    pub width: usize,
    pub sort: Option<SortDirection>,
}

/// Everything the ui needs to draw one frame.
#[derive(Clone, Debug)]
pub struct UIData {
    pub name: String,
    pub header: Vec<HeaderView>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub page: usize,
    pub total_pages: usize,
    pub filtered: usize,
    pub total: usize,
    pub search_term: String,
    pub record: Option<Vec<(String, String)>>,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub loading: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            header: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            page: 1,
            total_pages: 1,
            filtered: 0,
            total: 0,
            search_term: String::new(),
            record: None,
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            loading: false,
            status_message: String::new(),
        }
    }
}

pub struct Model {
    config: LVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    source: Arc<dyn RecordSource>,
    fetcher: Fetcher,
    columns: Vec<String>,
    view: ListView,
    curser_row: usize,
    curser_column: usize,
    record_idx: Option<usize>, // Index into view.records() shown in the record view
    added_records: usize,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    search_input: String, // Search as typed, the view keeps it lower-cased
    active_cmdinput: bool,
    status_message: String,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &LVConfig, source: Arc<dyn RecordSource>) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            source,
            fetcher: Fetcher::new(),
            columns: config.columns.clone(),
            view: ListView::new(config.list_view_config()),
            curser_row: 0,
            curser_column: 0,
            record_idx: None,
            added_records: 0,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            search_input: String::new(),
            active_cmdinput: false,
            status_message: "Started lv!".to_string(),
            uidata: UIData::empty(),
        };
        model.reload();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// Picks up a finished fetch, if any.
    pub fn tick(&mut self) {
        if let Some(outcome) = self.fetcher.poll() {
            self.apply_fetch(outcome);
        }
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), LVError> {
        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::NextPage => self.next_page(),
                    Message::PreviousPage => self.previous_page(),
                    Message::Sort => self.sort_current_column(),
                    Message::Search => self.enter_cmd_mode(CMDMode::Search),
                    Message::AddRecord => self.enter_cmd_mode(CMDMode::AddRecord),
                    Message::DeleteRecord => self.delete_selected_record(),
                    Message::Reload => self.reload(),
                    Message::Enter => self.enter(),
                    Message::Exit => self.exit(),
                    Message::Help => self.show_help(),
                    _ => (),
                },
                Modus::RECORD => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter => self.exit(),
                    Message::Help => self.show_help(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }
        self.update_uidata();
        Ok(())
    }

    // -------------------- Loading ---------------------- //

    fn reload(&mut self) {
        let generation = self.fetcher.request(Arc::clone(&self.source));
        info!("Requested fetch {generation} from {}", self.source.name());
        self.status = Status::LOADING;
        self.set_status_message(format!("Loading {} ...", self.source.name()));
    }

    fn apply_fetch(&mut self, outcome: FetchOutcome) {
        if self.status != Status::QUITTING {
            self.status = Status::READY;
        }
        match outcome.result {
            Ok(set) => {
                if self.config.columns.is_empty() {
                    self.columns = set.columns;
                }
                let n = set.records.len();
                self.view.set_records(set.records);
                // Indices from before the reload point into the old records
                self.record_idx = None;
                if self.modus == Modus::RECORD {
                    self.modus = Modus::TABLE;
                }
                if self.previous_modus == Modus::RECORD {
                    self.previous_modus = Modus::TABLE;
                }
                self.clamp_selection();
                self.set_status_message(format!(
                    "Loaded {n} records in {}ms ...",
                    outcome.duration.as_millis()
                ));
            }
            Err(e) => {
                error!("Error retrieving records from {}: {e}", outcome.source);
                self.set_status_message(format!("Error: {e}"));
            }
        }
        self.update_uidata();
    }

    #[cfg(test)]
    fn wait_for_fetch(&mut self) {
        if let Some(outcome) = self.fetcher.wait(std::time::Duration::from_secs(5)) {
            self.apply_fetch(outcome);
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn enter(&mut self) {
        if let Some(&idx) = self.view.current_page_indices().get(self.curser_row) {
            self.record_idx = Some(idx);
            self.previous_modus = self.modus;
            self.modus = Modus::RECORD;
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                // A search is the only thing to leave from the table
                if !self.view.search_term().is_empty() {
                    self.search("");
                    self.clamp_selection();
                    self.set_status_message("Search cleared");
                }
            }
            Modus::RECORD => {
                self.record_idx = None;
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;

        self.input.clear();
        if mode == CMDMode::Search {
            // Continue editing the active search
            for chr in self.search_input.clone().chars() {
                self.input.read(KeyEvent::from(KeyCode::Char(chr)));
            }
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);

        // Searching filters while typing
        if self.cmd_mode == Some(CMDMode::Search) && self.last_input.changed {
            self.search(&self.last_input.input.clone());
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode {
            Some(CMDMode::Search) => {
                if self.last_input.canceled {
                    self.search("");
                }
                self.set_status_message(format!(
                    "Found {} results",
                    self.view.total_filtered_count()
                ));
            }
            Some(CMDMode::AddRecord) if !self.last_input.canceled => self.add_record(&cmd_input),
            Some(CMDMode::AddRecord) => {}
            None => {
                info!("Cmd mode is none!")
            }
        }
        self.cmd_mode = None;
    }

    fn search(&mut self, term: &str) {
        trace!("Starting search for {term:?} ...");
        self.search_input = term.to_string();
        self.view.set_search_term(term);
        self.curser_row = 0;
    }

    fn sort_current_column(&mut self) {
        let Some(field) = self.columns.get(self.curser_column).cloned() else {
            return;
        };
        self.view.set_sort(&field, None);
        self.set_status_message(format!(
            "Sorted by {field} {:?}",
            self.view.sort_direction()
        ));
    }

    fn next_page(&mut self) {
        self.view.next_page();
        self.clamp_selection();
    }

    fn previous_page(&mut self) {
        self.view.previous_page();
        self.clamp_selection();
    }

    fn add_record(&mut self, name: &str) {
        if let Err(e) = validate_name(name) {
            warn!("Rejected new record: {e}");
            self.set_status_message(format!("Error: {e}"));
            return;
        }
        self.added_records += 1;
        let mut record = Record::new().with("Id", format!("new-{}", self.added_records));
        record.insert_path(self.view.search_field(), Value::from(name));

        let mut records = self.view.records().to_vec();
        records.push(record);
        self.view.set_records(records);
        self.set_status_message(format!("Created record {name}"));
    }

    fn delete_selected_record(&mut self) {
        let Some(&idx) = self.view.current_page_indices().get(self.curser_row) else {
            return;
        };
        let mut records = self.view.records().to_vec();
        let removed = records.remove(idx);
        debug!("Deleting record {idx}: {removed:?}");
        self.view.set_records(records);
        self.clamp_selection();
        self.set_status_message(format!(
            "Deleted record {}",
            removed.text(self.view.search_field())
        ));
    }

    fn move_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.view.has_previous() {
            self.view.previous_page();
            self.curser_row = self.view.current_page_indices().len().saturating_sub(1);
        }
    }

    fn move_selection_down(&mut self) {
        let rows = self.view.current_page_indices().len();
        if self.curser_row + 1 < rows {
            self.curser_row += 1;
        } else if self.view.has_next() {
            self.view.next_page();
            self.curser_row = 0;
        }
    }

    fn move_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
    }

    fn move_selection_right(&mut self) {
        if self.curser_column + 1 < self.columns.len() {
            self.curser_column += 1;
        }
    }

    fn clamp_selection(&mut self) {
        let rows = self.view.current_page_indices().len();
        self.curser_row = std::cmp::min(self.curser_row, rows.saturating_sub(1));
        self.curser_column = std::cmp::min(self.curser_column, self.columns.len().saturating_sub(1));
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.update_uidata();
    }

    // -------------------- UI data ---------------------- //

    fn column_width(&self, column: &str, page: &[&Record]) -> usize {
        let header = column.chars().count() + 2; // Room for the sort arrow
        let widest = page
            .iter()
            .map(|r| r.text(column).chars().count())
            .max()
            .unwrap_or(0);
        std::cmp::min(
            std::cmp::max(header, widest) + COLUMN_WIDTH_MARGIN,
            self.config.max_column_width,
        )
    }

    fn update_uidata(&mut self) {
        let page = self.view.current_page_records();
        let header = self
            .columns
            .iter()
            .map(|c| HeaderView {
                name: c.clone(),
                width: self.column_width(c, &page),
                sort: self.view.sort_indicator(c),
            })
            .collect();
        let rows = page
            .iter()
            .map(|r| {
                self.columns
                    .iter()
                    .map(|c| r.text(c).replace("\r\n", " ↵ ").replace('\n', " ↵ "))
                    .collect()
            })
            .collect();

        let record = match (self.modus, self.record_idx) {
            (Modus::RECORD, Some(idx)) => self.view.records().get(idx).map(|r| {
                r.leaf_paths()
                    .into_iter()
                    .map(|p| {
                        let value = r.text(&p);
                        (p, value)
                    })
                    .collect()
            }),
            _ => None,
        };

        self.uidata = UIData {
            name: self.source.name(),
            header,
            rows,
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            page: self.view.current_page(),
            total_pages: self.view.total_pages(),
            filtered: self.view.total_filtered_count(),
            total: self.view.records().len(),
            search_term: self.view.search_term().to_string(),
            record,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            loading: self.status == Status::LOADING,
            status_message: self.status_message.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv::fetch::{FetchError, RecordSet};
    use ratatui::crossterm::event::KeyModifiers;

    struct StaticSource(Result<RecordSet, FetchError>);

    impl RecordSource for StaticSource {
        fn name(&self) -> String {
            "static".to_string()
        }

        fn fetch(&self) -> Result<RecordSet, FetchError> {
            self.0.clone()
        }
    }

    fn templates(n: usize) -> RecordSet {
        RecordSet::from_records(
            (0..n)
                .map(|i| {
                    Record::new()
                        .with("Name", format!("Template {i:02}"))
                        .with("Description", if i % 2 == 0 { "even" } else { "odd" })
                })
                .collect(),
        )
    }

    fn loaded(n: usize, page_size: usize) -> Model {
        let config = LVConfig {
            page_size,
            ..LVConfig::default()
        };
        let mut model = Model::init(&config, Arc::new(StaticSource(Ok(templates(n)))));
        model.wait_for_fetch();
        model
    }

    fn type_text(model: &mut Model, text: &str) {
        for c in text.chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            model.update(Some(Message::RawKey(key))).unwrap();
        }
    }

    fn press(model: &mut Model, code: KeyCode) {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(key))).unwrap();
    }

    #[test]
    fn loads_records_into_pages() {
        let model = loaded(5, 2);
        assert_eq!(model.status, Status::READY);
        let ui = model.get_uidata();
        assert_eq!(ui.total, 5);
        assert_eq!(ui.total_pages, 3);
        assert_eq!(ui.rows.len(), 2);
        assert_eq!(ui.header[1].name, "Name");
        assert_eq!(ui.header[1].sort, Some(SortDirection::Ascending));
    }

    #[test]
    fn fetch_errors_do_not_touch_the_view() {
        let source = StaticSource(Err(FetchError::NotFound("x.json".into())));
        let mut model = Model::init(&LVConfig::default(), Arc::new(source));
        model.wait_for_fetch();
        let ui = model.get_uidata();
        assert_eq!(ui.total, 0);
        assert_eq!(ui.total_pages, 1);
        assert_eq!(ui.status_message, "Error: not found: x.json");
    }

    #[test]
    fn search_filters_while_typing_and_escape_clears() {
        let mut model = loaded(12, 5);
        model.update(Some(Message::NextPage)).unwrap();
        model.update(Some(Message::Search)).unwrap();
        type_text(&mut model, "1");
        assert_eq!(model.get_uidata().page, 1);
        assert_eq!(model.get_uidata().filtered, 3); // 01, 10, 11
        press(&mut model, KeyCode::Esc);
        assert_eq!(model.get_uidata().filtered, 12);
        assert!(!model.raw_keyevents());
    }

    #[test]
    fn sort_toggles_on_selected_column() {
        let mut model = loaded(3, 10);
        let names = |m: &Model| -> Vec<String> {
            m.get_uidata().rows.iter().map(|r| r[1].clone()).collect()
        };
        // Column 0 is Description: even, odd, even
        model.update(Some(Message::Sort)).unwrap();
        assert_eq!(model.get_uidata().header[0].sort, Some(SortDirection::Ascending));
        assert_eq!(names(&model), vec!["Template 00", "Template 02", "Template 01"]);

        model.update(Some(Message::Sort)).unwrap();
        assert_eq!(model.get_uidata().header[0].sort, Some(SortDirection::Descending));
        assert_eq!(names(&model), vec!["Template 01", "Template 00", "Template 02"]);

        // A newly selected column starts ascending
        model.update(Some(Message::MoveRight)).unwrap();
        model.update(Some(Message::Sort)).unwrap();
        assert_eq!(model.get_uidata().header[1].sort, Some(SortDirection::Ascending));
    }

    #[test]
    fn add_record_validates_name() {
        let mut model = loaded(1, 10);
        model.update(Some(Message::AddRecord)).unwrap();
        type_text(&mut model, "9 lives");
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.get_uidata().total, 1);
        assert!(model.get_uidata().status_message.starts_with("Error"));

        model.update(Some(Message::AddRecord)).unwrap();
        type_text(&mut model, "Reminder");
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.get_uidata().total, 2);
    }

    #[test]
    fn delete_removes_selected_record() {
        let mut model = loaded(3, 10);
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::DeleteRecord)).unwrap();
        let ui = model.get_uidata();
        assert_eq!(ui.total, 2);
        assert_eq!(ui.status_message, "Deleted record Template 01");
    }

    #[test]
    fn record_view_lists_fields() {
        let mut model = loaded(2, 10);
        model.update(Some(Message::Enter)).unwrap();
        let record = model.get_uidata().record.clone().unwrap();
        assert_eq!(
            record,
            vec![
                ("Description".to_string(), "even".to_string()),
                ("Name".to_string(), "Template 00".to_string()),
            ]
        );
        model.update(Some(Message::Exit)).unwrap();
        assert!(model.get_uidata().record.is_none());
    }

    #[test]
    fn reopened_search_keeps_typed_case() {
        let mut model = loaded(3, 10);
        model.update(Some(Message::Search)).unwrap();
        type_text(&mut model, "Tem");
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.get_uidata().search_term, "tem");

        model.update(Some(Message::Search)).unwrap();
        assert_eq!(model.get_uidata().cmdinput.input, "Tem");
        press(&mut model, KeyCode::Esc);

        model.update(Some(Message::Search)).unwrap();
        assert_eq!(model.get_uidata().cmdinput.input, "");
    }

    #[test]
    fn reload_leaves_the_record_view() {
        let mut model = loaded(2, 10);
        model.update(Some(Message::Reload)).unwrap();
        model.update(Some(Message::Enter)).unwrap();
        assert!(model.get_uidata().record.is_some());

        model.wait_for_fetch();
        assert!(model.get_uidata().record.is_none());
        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.get_uidata().selected_row, 1);
    }

    #[test]
    fn moving_down_past_the_page_turns_it() {
        let mut model = loaded(3, 2);
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        let ui = model.get_uidata();
        assert_eq!(ui.page, 2);
        assert_eq!(ui.selected_row, 0);
    }
}
