use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use std::io::stdout;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;
use crate::analysis::{GENERAL_TIPS, JobType, ResumeAnalysis};
use crate::dashboard::{Dashboard, Field, Tab};
use crate::db::Database;
use crate::models::{CredentialField, JobStatus, LogKind};
use crate::runner::RunController;

const READY_LINE: &str = "JobHunter Pro v1.0 - Pronto para iniciar...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Start,
    Stop,
    SaveSearch,
    AnalyzeResume,
}

struct AppState {
    dashboard: Dashboard,
    cursor: usize,
    editing: Option<String>,
    notice: Option<String>,
}

impl AppState {
    fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            cursor: 0,
            editing: None,
            notice: None,
        }
    }

    fn fields(&self) -> Vec<Field> {
        Dashboard::fields(self.dashboard.active_tab)
    }

    fn current_field(&self) -> Option<Field> {
        self.fields().get(self.cursor).copied()
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.dashboard.active_tab = tab;
        self.cursor = 0;
    }

    fn next(&mut self) {
        let len = self.fields().len();
        if len > 0 && self.cursor < len - 1 {
            self.cursor += 1;
        }
    }

    fn prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn handle_key(&mut self, code: KeyCode) -> Action {
        if let Some(buffer) = self.editing.as_mut() {
            match code {
                KeyCode::Char(c) => buffer.push(c),
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Enter => {
                    let text = self.editing.take().unwrap_or_default();
                    if let Some(field) = self.current_field() {
                        self.dashboard.edit_field(field, &text);
                        if field == Field::ResumeFile {
                            return Action::AnalyzeResume;
                        }
                    }
                }
                KeyCode::Esc => self.editing = None,
                _ => {}
            }
            return Action::None;
        }

        self.notice = None;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Char('s') => return Action::Start,
            KeyCode::Char('x') => return Action::Stop,
            KeyCode::Char('w') => return Action::SaveSearch,
            KeyCode::Char(c @ '1'..='5') => {
                let index = c as usize - '1' as usize;
                self.switch_tab(Tab::ALL[index]);
            }
            KeyCode::Tab => self.switch_tab(self.dashboard.active_tab.next()),
            KeyCode::BackTab => self.switch_tab(self.dashboard.active_tab.prev()),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.prev(),
            KeyCode::Enter => {
                if let Some(field) = self.current_field() {
                    if field.is_text() {
                        self.editing = Some(self.dashboard.field_value(field));
                    } else {
                        self.dashboard.activate_field(field);
                    }
                }
            }
            KeyCode::Char(' ') => {
                if let Some(field) = self.current_field().filter(|f| !f.is_text()) {
                    self.dashboard.activate_field(field);
                }
            }
            _ => {}
        }
        Action::None
    }
}

pub fn run_dashboard(config: &Config, config_path: &Path, db: &Database) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let (mut controller, mut events) = RunController::new(runtime.handle().clone(), config.run.clone());
    let mut state = AppState::new(Dashboard::new(config.search.clone()));

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = (|| -> Result<()> {
        let mut list_state = ListState::default();
        loop {
            while let Ok(event) = events.try_recv() {
                if let Some(summary) = state.dashboard.apply(event) {
                    match db.record_run(&summary) {
                        Ok(id) => info!(run = id, outcome = summary.outcome.as_str(), "run recorded"),
                        Err(e) => error!("Failed to record run: {:#}", e),
                    }
                }
            }

            list_state.select(Some(state.cursor));
            terminal.draw(|frame| draw(frame, &state, &mut list_state))?;

            if !event::poll(Duration::from_millis(100))? {
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match state.handle_key(key.code) {
                    Action::Quit => break,
                    Action::Start => controller.start(&mut state.dashboard),
                    Action::Stop => controller.stop(&mut state.dashboard),
                    Action::SaveSearch => {
                        let mut updated = config.clone();
                        updated.search = state.dashboard.search.clone();
                        state.notice = Some(match updated.save_to(config_path) {
                            Ok(()) => format!("Search settings saved to {}", config_path.display()),
                            Err(e) => format!("Save failed: {:#}", e),
                        });
                    }
                    Action::AnalyzeResume => {
                        state.notice = Some(match state.dashboard.load_resume() {
                            Ok(analysis) => format!("Resume analyzed: {:.1}/5", analysis.overall_rating),
                            Err(e) => format!("Analysis failed: {:#}", e),
                        });
                    }
                    Action::None => {}
                }
            }
        }
        let abandoned = controller.in_flight();
        if abandoned > 0 {
            info!(abandoned, "leaving dashboard with runs in flight");
        }
        Ok(())
    })();

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let d = &state.dashboard;
    let mut constraints = vec![
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(8),
    ];
    if d.running {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Length(10));
    constraints.push(Constraint::Length(1));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    draw_header(frame, d, chunks[0]);

    let titles: Vec<String> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{} {}", i + 1, t.title()))
        .collect();
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL))
        .select(d.active_tab.index())
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, chunks[1]);

    match d.active_tab {
        Tab::Config | Tab::Search => draw_form(frame, state, list_state, chunks[2]),
        Tab::Results => draw_results(frame, d, chunks[2]),
        Tab::Whatsapp => draw_placeholder(
            frame,
            " WhatsApp contact ",
            "Automatic contact with companies (in development). This feature will ship in the next version.",
            chunks[2],
        ),
        Tab::Resume => draw_resume(frame, state, list_state, chunks[2]),
    }

    let mut next = 3;
    if d.running {
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(" Automation progress "))
            .gauge_style(Style::default().fg(Color::Green))
            .percent(u16::from(d.progress.min(100)))
            .label(format!("{}% complete", d.progress));
        frame.render_widget(gauge, chunks[next]);
        next += 1;
    }

    draw_logs(frame, d, chunks[next]);

    let help = match (&state.editing, &state.notice) {
        (Some(_), _) => " typing...  Enter:save  Esc:cancel".to_string(),
        (None, Some(notice)) => format!(" {}", notice),
        (None, None) => {
            " 1-5/Tab:tabs  j/k:move  Enter:edit  Space:toggle  s:start x:stop  w:save search  q:quit"
                .to_string()
        }
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        chunks[next + 1],
    );
}

fn draw_header(frame: &mut Frame, d: &Dashboard, area: Rect) {
    let button = if d.running {
        Span::styled(" [x] Stop ", Style::default().fg(Color::White).bg(Color::Red))
    } else {
        Span::styled(" [s] Start ", Style::default().fg(Color::Black).bg(Color::Green))
    };
    let line = Line::from(vec![
        Span::styled("JobHunter Pro", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled("  Intelligent job automation   ", Style::default().fg(Color::DarkGray)),
        button,
    ]);
    frame.render_widget(
        Paragraph::new(line).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn field_display(state: &AppState, field: Field, selected: bool) -> String {
    if selected {
        if let Some(buffer) = &state.editing {
            return format!("{}_", mask(field, buffer));
        }
    }
    let value = state.dashboard.field_value(field);
    if value.is_empty() && field.is_text() {
        return "-".to_string();
    }
    mask(field, &value)
}

fn mask(field: Field, value: &str) -> String {
    match field {
        Field::Credential(_, CredentialField::Password) => "*".repeat(value.chars().count()),
        _ => value.to_string(),
    }
}

fn draw_form(frame: &mut Frame, state: &AppState, list_state: &mut ListState, area: Rect) {
    let d = &state.dashboard;
    let (form_area, side_area) = if d.active_tab == Tab::Search {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);
        (cols[0], Some(cols[1]))
    } else {
        (area, None)
    };

    let items: Vec<ListItem> = Dashboard::fields(d.active_tab)
        .into_iter()
        .enumerate()
        .map(|(i, field)| {
            let value = field_display(state, field, i == state.cursor);
            ListItem::new(format!("{:<28} {}", field.label(), value))
        })
        .collect();

    let title = match d.active_tab {
        Tab::Config => " Platform credentials ",
        Tab::Resume => " Resume ",
        _ => " Search criteria ",
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, form_area, list_state);

    if let Some(side) = side_area {
        let width = side.width.saturating_sub(4).max(10) as usize;
        let lines: Vec<Line> = textwrap::wrap(&d.search.job_types.join(" | "), width)
            .into_iter()
            .map(|l| Line::from(l.into_owned()))
            .collect();
        let job_types = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(" Job types "))
            .wrap(Wrap { trim: false });
        frame.render_widget(job_types, side);
    }
}

fn draw_results(frame: &mut Frame, d: &Dashboard, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(rows[0]);

    let stats = [
        (" Jobs found ", d.results.total_jobs.to_string(), "Total jobs located"),
        (" Applications sent ", d.results.total_applications.to_string(), "Applications made"),
        (" Success rate ", format!("{}%", d.success_rate()), "Applications vs jobs found"),
    ];
    for ((title, value, caption), card) in stats.into_iter().zip(cards.iter()) {
        let text = vec![
            Line::from(Span::styled(value, Style::default().add_modifier(Modifier::BOLD))),
            Line::from(Span::styled(caption, Style::default().fg(Color::DarkGray))),
        ];
        frame.render_widget(
            Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(title)),
            *card,
        );
    }

    if d.results.jobs.is_empty() {
        return;
    }
    let items: Vec<ListItem> = d
        .results
        .jobs
        .iter()
        .map(|job| {
            let status = match job.status {
                JobStatus::Applied => Span::styled(" Applied ", Style::default().fg(Color::Black).bg(Color::Green)),
                JobStatus::Found => Span::styled(" Found ", Style::default().fg(Color::Yellow)),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<28}", job.title), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(format!(" {:<16} ", job.company)),
                Span::styled(format!("[{}] ", job.platform), Style::default().fg(Color::Cyan)),
                status,
            ]))
        })
        .collect();
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Processed jobs ({}) ", d.results.jobs.len())),
    );
    frame.render_widget(list, rows[1]);
}

fn draw_resume(frame: &mut Frame, state: &AppState, list_state: &mut ListState, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    draw_form(frame, state, list_state, rows[0]);

    let width = rows[1].width.saturating_sub(4).max(20) as usize;
    let Some(analysis) = &state.dashboard.resume else {
        let mut lines = vec![Line::from(Span::styled(
            "Enter a .txt or .pdf path above and press Enter to analyze it.",
            Style::default().fg(Color::DarkGray),
        ))];
        for tip in GENERAL_TIPS {
            lines.extend(bullet(tip, width));
        }
        frame.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Tips ")),
            rows[1],
        );
        return;
    };

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);
    frame.render_widget(
        Paragraph::new(score_lines(analysis)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Scores ({:.1}/5) ", analysis.overall_rating)),
        ),
        cols[0],
    );

    let width = cols[1].width.saturating_sub(4).max(20) as usize;
    let lines: Vec<Line> = analysis
        .recommendations
        .iter()
        .flat_map(|r| bullet(r, width))
        .collect();
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Recommendations ")),
        cols[1],
    );
}

fn score_lines(analysis: &ResumeAnalysis) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = JobType::ALL
        .into_iter()
        .map(|job| {
            let stars = analysis.stars(job);
            let filled = stars.round() as usize;
            Line::from(vec![
                Span::raw(format!("{:<26}", job.label())),
                Span::styled(
                    format!("{}{}", "*".repeat(filled), ".".repeat(5 - filled.min(5))),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw(format!(" {:>5.1}%", analysis.job_scores.get(&job).copied().unwrap_or(0.0))),
            ])
        })
        .collect();

    let edu = &analysis.education;
    let flag = |on: bool| if on { "yes" } else { "no" };
    lines.push(Line::from(""));
    lines.push(Line::from(format!("Technical skills  {:.1}%", analysis.technical_score)));
    lines.push(Line::from(format!("Soft skills       {:.1}%", analysis.soft_skills_score)));
    lines.push(Line::from(format!(
        "Experience        {} years ({})",
        analysis.experience_years,
        analysis.experience_level.label()
    )));
    lines.push(Line::from(format!(
        "Degree {}  Postgrad {}  MBA {}  Relevant area {}",
        flag(edu.degree),
        flag(edu.postgraduate),
        flag(edu.mba),
        flag(edu.relevant_area)
    )));
    lines
}

fn bullet(text: &str, width: usize) -> Vec<Line<'static>> {
    textwrap::wrap(text, width.saturating_sub(2))
        .into_iter()
        .enumerate()
        .map(|(i, l)| Line::from(format!("{} {}", if i == 0 { "-" } else { " " }, l)))
        .collect()
}

fn draw_placeholder(frame: &mut Frame, title: &str, message: &str, area: Rect) {
    let width = area.width.saturating_sub(6).max(20) as usize;
    let mut lines = vec![Line::from("")];
    for line in textwrap::fill(message, width).lines() {
        lines.push(Line::from(Span::styled(line.to_string(), Style::default().fg(Color::DarkGray))));
    }
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    frame.render_widget(widget, area);
}

fn log_style(kind: LogKind) -> Style {
    match kind {
        LogKind::Error => Style::default().fg(Color::Red),
        LogKind::Success => Style::default().fg(Color::Green),
        LogKind::Warning => Style::default().fg(Color::Yellow),
        LogKind::Info => Style::default().fg(Color::Gray),
    }
}

fn draw_logs(frame: &mut Frame, d: &Dashboard, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Terminal ");
    if d.logs.is_empty() {
        let ready = Paragraph::new(Span::styled(READY_LINE, Style::default().fg(Color::Green)));
        frame.render_widget(ready.block(block), area);
        return;
    }

    // Keep the newest lines in view
    let visible = area.height.saturating_sub(2) as usize;
    let skip = d.logs.len().saturating_sub(visible);
    let items: Vec<ListItem> = d.logs[skip..]
        .iter()
        .map(|log| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", log.timestamp), Style::default().fg(Color::DarkGray)),
                Span::styled(log.message.clone(), log_style(log.kind)),
            ]))
        })
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use ratatui::backend::TestBackend;

    fn app() -> AppState {
        AppState::new(Dashboard::default())
    }

    fn type_text(state: &mut AppState, text: &str) {
        for c in text.chars() {
            state.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_edit_credential_via_keys() {
        let mut state = app();
        state.handle_key(KeyCode::Char('j')); // linkedin password
        state.handle_key(KeyCode::Enter);
        type_text(&mut state, "pw1");
        assert_eq!(state.handle_key(KeyCode::Enter), Action::None);

        assert_eq!(state.dashboard.credentials.get(Platform::Linkedin).password, "pw1");
        assert_eq!(state.dashboard.credentials.get(Platform::Linkedin).username, "");
        assert!(state.editing.is_none());
    }

    #[test]
    fn test_escape_discards_edit() {
        let mut state = app();
        state.handle_key(KeyCode::Enter);
        type_text(&mut state, "nobody");
        state.handle_key(KeyCode::Esc);
        assert_eq!(state.dashboard.credentials.get(Platform::Linkedin).username, "");
    }

    #[test]
    fn test_typing_run_keys_while_editing_does_not_trigger_actions() {
        let mut state = app();
        state.handle_key(KeyCode::Enter);
        for c in ['s', 'x', 'q'] {
            assert_eq!(state.handle_key(KeyCode::Char(c)), Action::None);
        }
        state.handle_key(KeyCode::Enter);
        assert_eq!(state.dashboard.credentials.get(Platform::Linkedin).username, "sxq");
    }

    #[test]
    fn test_space_toggles_platform_checkbox() {
        let mut state = app();
        state.handle_key(KeyCode::Char('2'));
        assert_eq!(state.dashboard.active_tab, Tab::Search);
        for _ in 0..5 {
            state.handle_key(KeyCode::Down);
        }
        assert_eq!(state.current_field(), Some(Field::Platform(Platform::Catho)));
        state.handle_key(KeyCode::Char(' '));
        assert!(state.dashboard.search.is_selected(Platform::Catho));
        state.handle_key(KeyCode::Char(' '));
        assert!(!state.dashboard.search.is_selected(Platform::Catho));
    }

    #[test]
    fn test_run_keys_map_to_actions() {
        let mut state = app();
        assert_eq!(state.handle_key(KeyCode::Char('s')), Action::Start);
        assert_eq!(state.handle_key(KeyCode::Char('x')), Action::Stop);
        assert_eq!(state.handle_key(KeyCode::Char('w')), Action::SaveSearch);
        assert_eq!(state.handle_key(KeyCode::Char('q')), Action::Quit);
    }

    #[test]
    fn test_cursor_resets_on_tab_switch() {
        let mut state = app();
        state.handle_key(KeyCode::Char('j'));
        state.handle_key(KeyCode::Char('j'));
        assert_eq!(state.cursor, 2);
        state.handle_key(KeyCode::Tab);
        assert_eq!(state.cursor, 0);
        state.handle_key(KeyCode::Char('3'));
        state.handle_key(KeyCode::Char('j'));
        assert_eq!(state.cursor, 0);
        assert_eq!(state.current_field(), None);
    }

    #[test]
    fn test_draw_idle_and_results() {
        let mut state = app();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let mut list_state = ListState::default();
        terminal.draw(|f| draw(f, &state, &mut list_state)).unwrap();
        let screen = format!("{:?}", terminal.backend().buffer());
        assert!(screen.contains("Pronto para iniciar"));

        state.dashboard.begin_run();
        state.dashboard.results = crate::models::RunResults::simulated();
        state.switch_tab(Tab::Results);
        terminal.draw(|f| draw(f, &state, &mut list_state)).unwrap();
        let screen = format!("{:?}", terminal.backend().buffer());
        assert!(screen.contains("53%"));
        assert!(screen.contains("Tech Corp"));
        assert!(screen.contains("JobHunter Pro..."));
        assert!(screen.contains("Iniciando autom"));
    }

    #[test]
    fn test_committing_resume_path_requests_analysis() {
        let mut state = app();
        state.handle_key(KeyCode::Char('5'));
        assert_eq!(state.current_field(), Some(Field::ResumeFile));
        state.handle_key(KeyCode::Enter);
        type_text(&mut state, "cv.txt");
        assert_eq!(state.handle_key(KeyCode::Enter), Action::AnalyzeResume);
        assert_eq!(state.dashboard.resume_path, "cv.txt");

        state.handle_key(KeyCode::Char('1'));
        state.handle_key(KeyCode::Enter);
        assert_eq!(state.handle_key(KeyCode::Enter), Action::None);
    }

    #[test]
    fn test_draw_resume_tab() {
        let mut state = app();
        state.switch_tab(Tab::Resume);
        let mut terminal = Terminal::new(TestBackend::new(140, 45)).unwrap();
        let mut list_state = ListState::default();
        terminal.draw(|f| draw(f, &state, &mut list_state)).unwrap();
        let screen = format!("{:?}", terminal.backend().buffer());
        assert!(screen.contains("Tips"));
        assert!(screen.contains("Quantifique"));

        state.dashboard.resume =
            Some(crate::analysis::analyze_text("Bacharel em Economia, 3 anos atuando com Excel").unwrap());
        terminal.draw(|f| draw(f, &state, &mut list_state)).unwrap();
        let screen = format!("{:?}", terminal.backend().buffer());
        assert!(screen.contains("Recommendations"));
        assert!(screen.contains("Contas a Pagar"));
        assert!(screen.contains("3 years (Pleno)"));
    }
}
