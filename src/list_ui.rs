use std::path::PathBuf;

use chrono::Local;
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use log::warn;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{DefaultTerminal, Frame};

use crate::store::TaskStore;
use crate::tasklet::{Task, TaskFilter, TaskSummary};
use crate::theme::{Palette, Theme};

pub struct TaskWidget<'a> {
    store: &'a TaskStore,
    theme: Theme,
    theme_path: PathBuf,
    filter: TaskFilter,
    task_list: TaskList,
    summary: TaskSummary,
    status: Option<String>,
    exit: bool,
}

#[derive(Default)]
pub struct TaskList {
    items: Vec<Task>,
    list_state: ListState,
}

impl TaskList {
    fn selected(&self) -> Option<&Task> {
        self.list_state.selected().and_then(|i| self.items.get(i))
    }
}

/// Runs the list view until the user quits. The theme is saved to
/// `theme_path` whenever it is toggled.
pub async fn run(store: &TaskStore, theme: Theme, theme_path: PathBuf) -> Result<()> {
    let mut terminal = ratatui::init();
    let mut widget = TaskWidget::new(store, theme, theme_path);
    let res = widget.run(&mut terminal).await;
    ratatui::restore();
    res
}

impl<'a> TaskWidget<'a> {
    pub fn new(store: &'a TaskStore, theme: Theme, theme_path: PathBuf) -> Self {
        TaskWidget {
            store,
            theme,
            theme_path,
            filter: TaskFilter::All,
            task_list: TaskList::default(),
            summary: TaskSummary::default(),
            status: None,
            exit: false,
        }
    }

    async fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        self.refresh().await;
        while !self.exit {
            terminal.draw(|frame| self.render(frame))?;
            if let Event::Key(key) = event::read()? {
                self.handle_key(key).await;
            }
        }
        Ok(())
    }

    /// Re-reads the current filter's tasks and the summary from the store.
    async fn refresh(&mut self) {
        self.task_list.items = self.store.get_tasks(self.filter).await;
        self.summary = self.store.get_task_summary().await;

        let len = self.task_list.items.len();
        match self.task_list.list_state.selected() {
            _ if len == 0 => self.task_list.list_state.select(None),
            Some(i) if i >= len => self.task_list.list_state.select(Some(len - 1)),
            None => self.task_list.list_state.select(Some(0)),
            Some(_) => {}
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.exit = true,
            KeyCode::Down | KeyCode::Char('j') => self.task_list.list_state.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.task_list.list_state.select_previous(),
            KeyCode::Tab => {
                self.filter = self.filter.next();
                self.task_list.list_state.select(None);
                self.status = None;
                self.refresh().await;
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected().await,
            KeyCode::Char('d') => self.delete_selected().await,
            KeyCode::Char('t') => self.toggle_theme(),
            _ => {}
        }
    }

    async fn toggle_selected(&mut self) {
        let Some((id, done)) = self.task_list.selected().map(|t| (t.id, t.done)) else {
            return;
        };
        if !self.store.mark_done(id, !done).await {
            self.status = Some(format!("Couldn't update task {id}"));
        }
        self.refresh().await;
    }

    async fn delete_selected(&mut self) {
        let Some((id, title)) = self
            .task_list
            .selected()
            .map(|t| (t.id, t.title.clone()))
        else {
            return;
        };
        self.status = if self.store.delete_task(id).await {
            Some(format!("Deleted \"{title}\""))
        } else {
            Some(format!("Couldn't delete task {id}"))
        };
        self.refresh().await;
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Err(e) = self.theme.save(&self.theme_path) {
            warn!("Error saving theme: {e}");
            self.status = Some("Couldn't save theme".to_string());
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let palette = self.theme.palette();
        let [list_area, footer_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).areas(frame.area());

        let items: Vec<ListItem> = self
            .task_list
            .items
            .iter()
            .map(|task| task_item(task, &palette))
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Tasks ({}) ", self.filter))
                    .border_style(Style::default().fg(palette.primary)),
            )
            .style(Style::default().fg(palette.text).bg(palette.background))
            .highlight_style(
                Style::default()
                    .bg(palette.surface)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, list_area, &mut self.task_list.list_state);

        let mut footer = vec![
            Span::styled(
                format!("Total {} ", self.summary.total),
                Style::default().fg(palette.primary),
            ),
            Span::styled(
                format!("Completed {} ", self.summary.completed),
                Style::default().fg(palette.success),
            ),
            Span::styled(
                format!("Pending {} ", self.summary.pending),
                Style::default().fg(palette.warning),
            ),
            Span::styled(
                " tab filter  space done  d delete  t theme  q quit",
                Style::default().fg(palette.disabled),
            ),
        ];
        if let Some(status) = &self.status {
            footer.insert(0, Span::styled(format!("{status}  "), Style::default().fg(palette.danger)));
        }
        let footer = Paragraph::new(Line::from(footer)).block(
            Block::default()
                .borders(Borders::ALL)
                .style(Style::default().fg(palette.text).bg(palette.surface)),
        );
        frame.render_widget(footer, footer_area);
    }
}

fn task_item<'t>(task: &'t Task, palette: &Palette) -> ListItem<'t> {
    let mut spans = vec![];
    if task.done {
        spans.push(Span::styled("[x] ", Style::default().fg(palette.success)));
        spans.push(Span::styled(
            task.title.as_str(),
            Style::default()
                .fg(palette.disabled)
                .add_modifier(Modifier::CROSSED_OUT),
        ));
    } else {
        spans.push(Span::raw("[ ] "));
        spans.push(Span::raw(task.title.as_str()));
    }

    if let Some(category) = &task.category {
        spans.push(Span::styled(
            format!("  ({category})"),
            Style::default().fg(palette.primary),
        ));
    }
    if let Some(deadline) = task.deadline {
        let overdue = !task.done && deadline.instant() < Local::now().naive_local();
        let color = if overdue { palette.danger } else { palette.warning };
        spans.push(Span::styled(format!("  due {deadline}"), Style::default().fg(color)));
    }
    if let Some(priority) = task.priority {
        spans.push(Span::styled(
            format!("  !{priority}"),
            Style::default().fg(palette.danger),
        ));
    }
    for tag in &task.tags {
        spans.push(Span::styled(format!(" #{tag}"), Style::default().fg(palette.disabled)));
    }
    ListItem::new(Line::from(spans))
}
