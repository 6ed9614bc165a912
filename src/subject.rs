use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type SubjectId = i64;

/// A course as served by the remote attendance service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub course_code: String,
    pub course_title: String,
}

/// One attendance entry posted for a subject on a given day.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub subject_id: SubjectId,
    pub date: NaiveDate, // serialized as "YYYY-MM-DD"
    pub attended: bool,
}

impl AttendanceRecord {
    pub fn new(subject_id: SubjectId, date: NaiveDate, attended: bool) -> Self {
        Self {
            subject_id,
            date,
            attended,
        }
    }
}
