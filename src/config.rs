use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::Parser;

use crate::api::DEFAULT_API_URL;

#[derive(Parser, Debug, Clone)]
#[command(name = "attendance", version, about = "Mark today's attendance per subject")]
pub struct Config {
    /// Base URL of the attendance service
    #[arg(long, env = "ATTENDANCE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Record attendance for this day (YYYY-MM-DD) instead of today
    #[arg(long, env = "ATTENDANCE_DATE")]
    pub date: Option<NaiveDate>,

    /// File receiving diagnostics; RUST_LOG sets the level
    #[arg(long, env = "ATTENDANCE_LOG_FILE", default_value = "attendance.log")]
    pub log_file: PathBuf,
}

impl Config {
    pub fn attendance_date(&self) -> NaiveDate {
        resolve_date(self.date)
    }
}

/// The fixed day when one was configured, otherwise today's local date at
/// the moment of the call.
pub fn resolve_date(fixed: Option<NaiveDate>) -> NaiveDate {
    fixed.unwrap_or_else(|| Local::now().date_naive())
}
