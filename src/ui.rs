use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState},
};

use lv::domain::CMDMode;

use crate::model::UIData;

pub const STATUSLINE_HEIGHT: u16 = 1;

pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        TableUI
    }

    pub fn draw(&self, data: &UIData, frame: &mut Frame) {
        let [table_area, status_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(frame.area());

        match &data.record {
            Some(fields) => self.draw_record(data, fields, frame, table_area),
            None => self.draw_table(data, frame, table_area),
        }
        self.draw_statusline(data, frame, status_area);

        if data.show_popup {
            self.draw_popup(&data.popup_message, frame);
        }
    }

    fn draw_table(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(data.header.iter().enumerate().map(|(idx, h)| {
            let label = match h.sort {
                Some(direction) => format!("{} {}", h.name, direction.arrow()),
                None => h.name.clone(),
            };
            let mut style = Style::default().add_modifier(Modifier::BOLD);
            if idx == data.selected_column {
                style = style.fg(Color::Yellow);
            }
            Cell::from(label).style(style)
        }))
        .style(Style::default().bg(Color::DarkGray));

        let rows: Vec<Row> = data
            .rows
            .iter()
            .enumerate()
            .map(|(ridx, row)| {
                Row::new(row.iter().enumerate().map(|(cidx, value)| {
                    let cell = Cell::from(value.as_str());
                    if ridx == data.selected_row && cidx == data.selected_column {
                        cell.style(Style::default().bg(Color::Yellow).fg(Color::Black))
                    } else {
                        cell
                    }
                }))
            })
            .collect();

        let widths: Vec<Constraint> = data
            .header
            .iter()
            .map(|h| Constraint::Length(h.width as u16))
            .collect();

        let title = Line::from(format!(" {} ", data.name).bold());
        let table = Table::new(rows, widths)
            .header(header)
            .block(
                Block::bordered()
                    .title(title.centered())
                    .border_set(border::PLAIN),
            )
            .row_highlight_style(Style::default().bg(Color::Blue));

        let mut state = TableState::default().with_selected(Some(data.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_record(&self, data: &UIData, fields: &[(String, String)], frame: &mut Frame, area: Rect) {
        let key_width = fields
            .iter()
            .map(|(k, _)| k.chars().count())
            .max()
            .unwrap_or(0) as u16
            + 1;
        let rows: Vec<Row> = fields
            .iter()
            .map(|(k, v)| Row::new(vec![Cell::from(k.as_str().bold()), Cell::from(v.as_str())]))
            .collect();
        let title = Line::from(format!(" R[{}] ", data.name).bold());
        let table = Table::new(rows, [Constraint::Length(key_width), Constraint::Fill(1)])
            .block(Block::bordered().title(title.centered()));
        frame.render_widget(table, area);
    }

    fn draw_statusline(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let line = if data.active_cmdinput {
            let prompt = match data.cmd_mode {
                Some(CMDMode::Search) => "/",
                Some(CMDMode::AddRecord) => "New name: ",
                None => ":",
            };
            let x = area.x + (prompt.chars().count() + data.cmdinput.cursor_pos) as u16;
            frame.set_cursor_position((x, area.y));
            Line::from(vec![Span::raw(prompt), Span::raw(data.cmdinput.input.clone())])
        } else {
            let mut spans = vec![
                format!(" Page {}/{} ", data.page, data.total_pages).black().on_cyan(),
                Span::raw(format!(" {} of {} records ", data.filtered, data.total)),
            ];
            if !data.search_term.is_empty() {
                spans.push(format!("/{} ", data.search_term).yellow());
            }
            if data.loading {
                spans.push("loading ".blue().bold());
            }
            spans.push(Span::raw(data.status_message.clone()));
            spans.push(" <?> help".dark_gray());
            Line::from(spans)
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let area = Self::popup_area(frame.area(), 60, 60);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(message.to_string()).block(block), area);
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
            .flex(Flex::Center)
            .areas(area);
        let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
            .flex(Flex::Center)
            .areas(area);
        area
    }
}
