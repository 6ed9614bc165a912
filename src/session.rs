use std::collections::BTreeMap;

use chrono::NaiveDate;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::{
    api::AttendanceApi,
    error::Error,
    subject::{AttendanceRecord, Subject, SubjectId},
};

/// Terminal result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Submitted { count: usize },
    Failed { sent: usize, reason: String },
}

impl Outcome {
    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Submitted { .. } => "Attendance submitted successfully!",
            Outcome::Failed { .. } => "Failed to submit attendance.",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Submitted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Submitting,
    Settled(Outcome),
}

/// Sending half of the notification channel the view listens on.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: UnboundedSender<Outcome>,
}

impl Notifier {
    pub fn channel() -> (Self, UnboundedReceiver<Outcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn notify(&self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            warn!("Notification dropped, no view is listening");
        }
    }
}

/// Subjects and per-subject attendance flags for the current day.
#[derive(Debug, Default)]
pub struct AttendanceSession {
    pub subjects: Vec<Subject>,
    pub selected: usize,
    attendance: BTreeMap<SubjectId, bool>,
    state: SessionState,
}

impl AttendanceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn attendance(&self) -> &BTreeMap<SubjectId, bool> {
        &self.attendance
    }

    pub fn is_attended(&self, id: SubjectId) -> bool {
        self.attendance.get(&id).copied().unwrap_or(false)
    }

    pub async fn load<A: AttendanceApi + ?Sized>(&mut self, api: &A) -> Result<(), Error> {
        self.apply_loaded(api.fetch_subjects().await)
    }

    /// Second half of `load`, for fetches run off the session's task. A
    /// failure is logged and leaves the session untouched.
    pub fn apply_loaded(&mut self, result: Result<Vec<Subject>, Error>) -> Result<(), Error> {
        match result {
            Ok(subjects) => {
                self.replace_subjects(subjects);
                Ok(())
            }
            Err(err) => {
                error!("{err}");
                Err(err)
            }
        }
    }

    /// Installs a freshly fetched subject list, discarding unsaved toggles.
    pub fn replace_subjects(&mut self, subjects: Vec<Subject>) {
        self.attendance = subjects.iter().map(|s| (s.id, false)).collect();
        self.subjects = subjects;
        self.selected = self.selected.min(self.subjects.len().saturating_sub(1));
        if self.state != SessionState::Submitting {
            self.state = SessionState::Idle;
        }
        info!("Loaded {} subjects", self.subjects.len());
    }

    pub fn toggle(&mut self, id: SubjectId) -> Result<bool, Error> {
        let Some(flag) = self.attendance.get_mut(&id) else {
            warn!("Toggle ignored for unknown subject {id}");
            return Err(Error::UnknownSubject(id));
        };
        *flag = !*flag;
        let attended = *flag;

        if matches!(self.state, SessionState::Settled(_)) {
            self.state = SessionState::Idle;
        }
        Ok(attended)
    }

    pub fn toggle_selected(&mut self) -> Option<bool> {
        let id = self.subjects.get(self.selected)?.id;
        self.toggle(id).ok()
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.subjects.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Moves to `Submitting` and snapshots one record per subject.
    pub fn begin_submit(&mut self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, Error> {
        if self.state == SessionState::Submitting {
            return Err(Error::SubmissionInProgress);
        }
        self.state = SessionState::Submitting;

        Ok(self
            .attendance
            .iter()
            .map(|(&id, &attended)| AttendanceRecord::new(id, date, attended))
            .collect())
    }

    pub fn finish_submit(&mut self, outcome: Outcome) {
        self.state = SessionState::Settled(outcome);
    }

    pub async fn submit<A: AttendanceApi + ?Sized>(
        &mut self,
        api: &A,
        date: NaiveDate,
        notifier: &Notifier,
    ) -> Result<Outcome, Error> {
        let records = self.begin_submit(date)?;
        let outcome = send_records(api, &records, notifier).await;
        self.finish_submit(outcome.clone());
        Ok(outcome)
    }
}

/// Posts records one at a time, stopping at the first failure. Records
/// already accepted by the service stay accepted. Exactly one outcome is
/// sent to `notifier`.
pub async fn send_records<A: AttendanceApi + ?Sized>(
    api: &A,
    records: &[AttendanceRecord],
    notifier: &Notifier,
) -> Outcome {
    let mut sent = 0;
    for record in records {
        if let Err(err) = api.post_attendance(record).await {
            error!("{err}");
            let outcome = Outcome::Failed {
                sent,
                reason: err.to_string(),
            };
            notifier.notify(outcome.clone());
            return outcome;
        }
        debug!("Attendance sent for subject {}", record.subject_id);
        sent += 1;
    }

    info!("Attendance submitted for {sent} subjects");
    let outcome = Outcome::Submitted { count: sent };
    notifier.notify(outcome.clone());
    outcome
}
