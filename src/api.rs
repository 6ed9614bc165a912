use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::{
    error::Error,
    subject::{AttendanceRecord, Subject},
};

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// The remote attendance service.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn fetch_subjects(&self) -> Result<Vec<Subject>, Error>;
    async fn post_attendance(&self, record: &AttendanceRecord) -> Result<(), Error>;
}

#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl AttendanceApi for HttpApi {
    async fn fetch_subjects(&self) -> Result<Vec<Subject>, Error> {
        let url = self.url("subjects");
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| Error::Load(e.into()))?;

        response.json().await.map_err(|e| Error::Load(e.into()))
    }

    async fn post_attendance(&self, record: &AttendanceRecord) -> Result<(), Error> {
        let url = self.url("attendance");
        debug!("POST {url} subject_id={}", record.subject_id);

        self.client
            .post(url)
            .json(record)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map(|_| ())
            .map_err(|source| Error::Submit {
                subject_id: record.subject_id,
                source: source.into(),
            })
    }
}
