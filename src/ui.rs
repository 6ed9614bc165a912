use std::sync::Arc;

use chrono::NaiveDate;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind};
use futures::StreamExt;
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::{
    api::AttendanceApi,
    config::resolve_date,
    error::Error,
    session::{send_records, AttendanceSession, Notifier, Outcome, SessionState},
    subject::Subject,
};

pub type LoadResult = Result<Vec<Subject>, Error>;

/// A finished subject fetch, tagged with the reload that issued it.
#[derive(Debug)]
pub struct Loaded {
    pub seq: u64,
    pub result: LoadResult,
}

pub struct App<A> {
    pub session: AttendanceSession,
    fixed_date: Option<NaiveDate>,
    api: Arc<A>,
    notifier: Notifier,
    loads: UnboundedSender<Loaded>,
    load_seq: u64,
}

impl<A: AttendanceApi + 'static> App<A> {
    pub fn new(
        session: AttendanceSession,
        api: Arc<A>,
        fixed_date: Option<NaiveDate>,
        notifier: Notifier,
        loads: UnboundedSender<Loaded>,
    ) -> Self {
        Self {
            session,
            fixed_date,
            api,
            notifier,
            loads,
            load_seq: 0,
        }
    }

    /// Day the next submission is recorded for.
    pub fn date(&self) -> NaiveDate {
        resolve_date(self.fixed_date)
    }

    /// Returns `false` when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Up | KeyCode::Char('k') => self.session.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.session.select_next(),
            KeyCode::Char(' ') => {
                self.session.toggle_selected();
            }
            KeyCode::Char('s') => self.submit(),
            KeyCode::Char('r') => self.reload(),
            _ => {}
        }
        true
    }

    fn submit(&mut self) {
        let date = self.date();
        let records = match self.session.begin_submit(date) {
            Ok(records) => records,
            Err(err) => {
                warn!("{err}");
                return;
            }
        };
        info!("Submitting attendance for {date}");

        let api = Arc::clone(&self.api);
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            send_records(api.as_ref(), &records, &notifier).await;
        });
    }

    fn reload(&mut self) {
        self.load_seq += 1;
        let seq = self.load_seq;
        let api = Arc::clone(&self.api);
        let loads = self.loads.clone();
        tokio::spawn(async move {
            let result = api.fetch_subjects().await;
            // receiver gone means the UI already exited
            let _ = loads.send(Loaded { seq, result });
        });
    }

    pub fn on_outcome(&mut self, outcome: Outcome) {
        self.session.finish_submit(outcome);
    }

    /// Applies a fetch only if no later reload was issued since.
    pub fn on_loaded(&mut self, loaded: Loaded) {
        if loaded.seq != self.load_seq {
            debug!("Dropping stale subject list from reload {}", loaded.seq);
            return;
        }
        // failures are logged by the session
        let _ = self.session.apply_loaded(loaded.result);
    }
}

pub async fn run_app<B: Backend, A: AttendanceApi + 'static>(
    terminal: &mut Terminal<B>,
    app: &mut App<A>,
    mut outcomes: UnboundedReceiver<Outcome>,
    mut loads: UnboundedReceiver<Loaded>,
) -> Result<(), Error> {
    let mut events = EventStream::new();
    loop {
        let date = app.date();
        terminal.draw(|f| draw(f, &app.session, date))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if !app.handle_key(key.code) {
                        return Ok(());
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => return Ok(()),
            },
            Some(outcome) = outcomes.recv() => app.on_outcome(outcome),
            Some(loaded) = loads.recv() => app.on_loaded(loaded),
        }
    }
}

pub fn draw(f: &mut Frame, session: &AttendanceSession, date: NaiveDate) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let title = Paragraph::new(Line::from(Span::styled(
        "Academic Planner - Attendance",
        Style::default().add_modifier(Modifier::BOLD),
    )))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    let header = Row::new(vec!["Course Code", "Course Title", "Attended Today"])
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let rows: Vec<Row> = session
        .subjects
        .iter()
        .map(|s| {
            let mark = if session.is_attended(s.id) { "[x]" } else { "[ ]" };
            Row::new(vec![
                Cell::from(s.course_code.as_str()),
                Cell::from(s.course_title.as_str()),
                Cell::from(mark),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Min(20),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(Block::default().title("Subjects").borders(Borders::ALL))
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default();
    if !session.subjects.is_empty() {
        state.select(Some(session.selected));
    }
    f.render_stateful_widget(table, chunks[1], &mut state);

    let (status, color) = match session.state() {
        SessionState::Idle => ("Ready".to_string(), Color::White),
        SessionState::Submitting => ("Submitting...".to_string(), Color::Yellow),
        SessionState::Settled(outcome) if outcome.is_success() => {
            (outcome.message().to_string(), Color::Green)
        }
        SessionState::Settled(outcome) => (outcome.message().to_string(), Color::Red),
    };
    let banner = Paragraph::new(Line::from(vec![
        Span::raw(format!("{date}  ")),
        Span::styled(status, Style::default().fg(color)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(banner, chunks[2]);

    let help = Paragraph::new("↑/↓ move  space toggle  s submit  r reload  q quit")
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[3]);
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Local;
    use ratatui::backend::TestBackend;
    use tokio::sync::mpsc;

    use super::*;
    use crate::subject::AttendanceRecord;

    #[derive(Default)]
    struct AcceptAll {
        posted: Mutex<Vec<AttendanceRecord>>,
    }

    #[async_trait]
    impl AttendanceApi for AcceptAll {
        async fn fetch_subjects(&self) -> Result<Vec<Subject>, Error> {
            Ok(vec![subject(9, "PH110", "Physics")])
        }

        async fn post_attendance(&self, record: &AttendanceRecord) -> Result<(), Error> {
            self.posted.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn subject(id: i64, code: &str, title: &str) -> Subject {
        Subject {
            id,
            course_code: code.to_string(),
            course_title: title.to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn rendered(session: &AttendanceSession) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 14)).unwrap();
        terminal.draw(|f| draw(f, session, date())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    struct Harness {
        app: App<AcceptAll>,
        api: Arc<AcceptAll>,
        outcomes: UnboundedReceiver<Outcome>,
        loads: UnboundedReceiver<Loaded>,
    }

    fn harness(subjects: Vec<Subject>, fixed_date: Option<NaiveDate>) -> Harness {
        let mut session = AttendanceSession::new();
        session.replace_subjects(subjects);
        let api = Arc::new(AcceptAll::default());
        let (notifier, outcomes) = Notifier::channel();
        let (loads_tx, loads) = mpsc::unbounded_channel();
        let app = App::new(session, Arc::clone(&api), fixed_date, notifier, loads_tx);
        Harness {
            app,
            api,
            outcomes,
            loads,
        }
    }

    #[test]
    fn table_shows_subjects_and_marks() {
        let mut session = AttendanceSession::new();
        session.replace_subjects(vec![
            subject(1, "CS101", "Programming"),
            subject(2, "MA201", "Calculus"),
        ]);
        session.toggle(2).unwrap();

        let screen = rendered(&session);

        assert!(screen.contains("Academic Planner - Attendance"));
        assert!(screen.contains("Course Code"));
        assert!(screen.contains("CS101"));
        assert!(screen.contains("Calculus"));
        assert!(screen.contains("[ ]"));
        assert!(screen.contains("[x]"));
        assert!(screen.contains("2024-05-01"));
    }

    #[test]
    fn banner_reports_failed_submission() {
        let mut session = AttendanceSession::new();
        session.replace_subjects(vec![subject(1, "CS101", "Programming")]);
        session.begin_submit(date()).unwrap();
        session.finish_submit(Outcome::Failed {
            sent: 0,
            reason: "500".to_string(),
        });

        assert!(rendered(&session).contains("Failed to submit attendance."));
    }

    #[test]
    fn keys_move_and_toggle() {
        let Harness { mut app, .. } = harness(
            vec![
                subject(1, "CS101", "Programming"),
                subject(2, "MA201", "Calculus"),
            ],
            Some(date()),
        );

        assert!(app.handle_key(KeyCode::Down));
        assert!(app.handle_key(KeyCode::Char(' ')));

        assert!(!app.session.is_attended(1));
        assert!(app.session.is_attended(2));
        assert!(!app.handle_key(KeyCode::Char('q')));
    }

    #[tokio::test]
    async fn submit_key_settles_through_notification() {
        let mut h = harness(vec![subject(1, "CS101", "Programming")], Some(date()));

        h.app.handle_key(KeyCode::Char('s'));
        assert_eq!(h.app.session.state(), &SessionState::Submitting);

        let outcome = h.outcomes.recv().await.unwrap();
        h.app.on_outcome(outcome);

        assert_eq!(
            h.app.session.state(),
            &SessionState::Settled(Outcome::Submitted { count: 1 })
        );
        assert_eq!(
            *h.api.posted.lock().unwrap(),
            vec![AttendanceRecord::new(1, date(), false)]
        );
    }

    #[tokio::test]
    async fn submit_without_fixed_date_uses_today_at_submit_time() {
        let mut h = harness(vec![subject(1, "CS101", "Programming")], None);

        let before = Local::now().date_naive();
        h.app.handle_key(KeyCode::Char('s'));
        h.outcomes.recv().await.unwrap();
        let after = Local::now().date_naive();

        let posted = h.api.posted.lock().unwrap().clone();
        assert_eq!(posted.len(), 1);
        assert!(before <= posted[0].date && posted[0].date <= after);
        assert_ne!(posted[0].date, date());
    }

    #[tokio::test]
    async fn reload_key_replaces_subjects() {
        let mut h = harness(vec![subject(1, "CS101", "Programming")], Some(date()));
        h.app.session.toggle(1).unwrap();

        h.app.handle_key(KeyCode::Char('r'));
        let loaded = h.loads.recv().await.unwrap();
        h.app.on_loaded(loaded);

        assert_eq!(h.app.session.subjects.len(), 1);
        assert_eq!(h.app.session.subjects[0].id, 9);
        assert!(!h.app.session.is_attended(9));
    }

    #[tokio::test]
    async fn older_reload_finishing_last_is_dropped() {
        let mut h = harness(vec![subject(1, "CS101", "Programming")], Some(date()));

        h.app.handle_key(KeyCode::Char('r'));
        h.app.handle_key(KeyCode::Char('r'));
        let first = h.loads.recv().await.unwrap();
        let second = h.loads.recv().await.unwrap();
        let (older, newer) = if first.seq < second.seq {
            (first, second)
        } else {
            (second, first)
        };

        h.app.on_loaded(newer);
        h.app.session.toggle(9).unwrap();
        h.app.on_loaded(Loaded {
            seq: older.seq,
            result: Ok(vec![subject(1, "CS101", "Programming")]),
        });

        assert_eq!(h.app.session.subjects[0].id, 9);
        assert!(h.app.session.is_attended(9));
    }
}
