use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use quizgate_core::config::SourceConfig;
use quizgate_core::question::{self, Question};
use reqwest::Client;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Where course questions come from.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Questions for a course, sorted by timestamp.
    async fn fetch(&self, course_id: &str) -> Result<Vec<Question>>;
}

/// Course API over HTTP: `GET {base}/courses/{id}/questions` with a bearer token.
pub struct HttpQuestionSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpQuestionSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token(),
        })
    }

    fn questions_url(&self, course_id: &str) -> String {
        format!("{}/courses/{}/questions", self.base_url, course_id)
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn fetch(&self, course_id: &str) -> Result<Vec<Question>> {
        check_course_id(course_id)?;
        let Some(token) = &self.token else {
            info!(course = %course_id, "no API token, course has no questions");
            return Ok(Vec::new());
        };

        let url = self.questions_url(course_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("question request for course {course_id} failed: {status}");
        }
        let body: Value = resp.json().await.context("decoding question response")?;
        Ok(question::parse_question_list(&body))
    }
}

/// Offline source: `<dir>/<course_id>.json` holding the API body or a bare array.
pub struct FileQuestionSource {
    dir: PathBuf,
}

impl FileQuestionSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl QuestionSource for FileQuestionSource {
    async fn fetch(&self, course_id: &str) -> Result<Vec<Question>> {
        check_course_id(course_id)?;
        let path = self.dir.join(format!("{course_id}.json"));
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading questions from {}", path.display()))?;
        let body: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(question::parse_question_list(&body))
    }
}

/// Course ids end up in URLs and file names; keep them to a safe alphabet.
fn check_course_id(course_id: &str) -> Result<()> {
    let ok = !course_id.is_empty()
        && course_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        bail!("invalid course id '{course_id}'");
    }
    Ok(())
}

pub fn from_config(config: &SourceConfig) -> Result<Arc<dyn QuestionSource>> {
    if !config.questions_dir.trim().is_empty() {
        info!(dir = %config.questions_dir, "using file question source");
        return Ok(Arc::new(FileQuestionSource::new(config.questions_dir.trim())));
    }
    info!(base_url = %config.base_url, "using HTTP question source");
    Ok(Arc::new(HttpQuestionSource::new(config)?))
}

/// Fetch once; any failure degrades to an empty list so playback is never blocked.
pub async fn load_or_empty(source: &dyn QuestionSource, course_id: &str) -> Vec<Question> {
    match source.fetch(course_id).await {
        Ok(questions) => questions,
        Err(e) => {
            warn!(course = %course_id, error = %format!("{e:#}"), "failed to load questions");
            Vec::new()
        }
    }
}
