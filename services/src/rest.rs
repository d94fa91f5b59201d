//! REST implementation of the collaborator traits.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, multipart};
use serde_json::{Value, json};

use crate::backend::{NotificationBackend, SubmissionBackend};
use crate::error::{ClientError, Result};
use crate::model::{
    AssignmentId, GradeRecord, Notification, NotificationId, SubmissionEntry, SubmissionRecord,
    Upload, UserId,
};
use crate::normalize;
use crate::session::Session;

#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    session: Session,
}

impl RestBackend {
    pub fn new(client: Client, base_url: impl Into<String>, session: Session) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Builds a backend from the global [`common::config::AppConfig`].
    pub fn from_config(session: Session) -> Result<Self> {
        let (base, timeout) = {
            let cfg = common::config::AppConfig::global();
            (cfg.api_base_url.clone(), cfg.http_timeout_secs)
        };
        let client = util::http::build_client(timeout)?;
        Ok(Self::new(client, base, session))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let rb = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match self.session.token() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn send(&self, rb: RequestBuilder) -> Result<Value> {
        let resp = rb.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let message = error_message(&text);
            tracing::debug!(status = status.as_u16(), "Backend rejected request: {message}");
            return Err(ClientError::from_status(status.as_u16(), message));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let body: Value = serde_json::from_str(&text)?;
        // Some endpoints answer 200 with {"success": false, ...}
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(ClientError::from_status(
                status.as_u16(),
                error_message(&text),
            ));
        }
        Ok(body)
    }

    fn upload_form(upload: &Upload) -> Result<multipart::Form> {
        let part = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type())?;
        Ok(multipart::Form::new().part("file", part))
    }
}

/// Pulls the human message out of an error body, whatever its shape.
fn error_message(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => ["message", "error", "msg"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        _ => text.trim().to_string(),
    }
}

fn join_ids(ids: &[AssignmentId]) -> String {
    ids.iter().map(AssignmentId::as_str).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl SubmissionBackend for RestBackend {
    async fn fetch_submissions(
        &self,
        user: &UserId,
        assignments: &[AssignmentId],
    ) -> Result<Vec<SubmissionRecord>> {
        let ids = join_ids(assignments);
        let rb = self
            .request(Method::GET, "/submissions")
            .query(&[("student", user.as_str()), ("assignments", ids.as_str())]);
        let body = self.send(rb).await?;
        Ok(normalize::submissions(&body))
    }

    async fn fetch_grades(
        &self,
        user: &UserId,
        assignments: &[AssignmentId],
    ) -> Result<Vec<GradeRecord>> {
        let ids = join_ids(assignments);
        let rb = self
            .request(Method::GET, "/grades")
            .query(&[("student", user.as_str()), ("assignments", ids.as_str())]);
        let body = self.send(rb).await?;
        Ok(normalize::grades(&body, user))
    }

    async fn fetch_assignment_submissions(
        &self,
        assignment: &AssignmentId,
    ) -> Result<Vec<SubmissionEntry>> {
        let rb = self.request(Method::GET, &format!("/assignments/{assignment}/submissions"));
        let body = self.send(rb).await?;
        Ok(normalize::submission_entries(&body, assignment))
    }

    async fn submit(&self, assignment: &AssignmentId, upload: &Upload) -> Result<()> {
        let rb = self
            .request(Method::POST, &format!("/assignments/{assignment}/submit"))
            .multipart(Self::upload_form(upload)?);
        self.send(rb).await.map(drop)
    }

    async fn replace_submission(&self, assignment: &AssignmentId, upload: &Upload) -> Result<()> {
        let rb = self
            .request(Method::PUT, &format!("/assignments/{assignment}/submission"))
            .multipart(Self::upload_form(upload)?);
        self.send(rb).await.map(drop)
    }

    async fn delete_submission(&self, assignment: &AssignmentId) -> Result<()> {
        let rb = self.request(Method::DELETE, &format!("/assignments/{assignment}/submission"));
        self.send(rb).await.map(drop)
    }

    async fn grade(
        &self,
        assignment: &AssignmentId,
        student: &UserId,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<GradeRecord> {
        let rb = self
            .request(
                Method::PUT,
                &format!("/assignments/{assignment}/submissions/{student}/grade"),
            )
            .json(&json!({ "grade": score, "feedback": feedback }));
        let body = self.send(rb).await?;

        let echoed = normalize::grade_record(normalize::single(&body, "grade"), Some(student))
            .filter(|g| &g.assignment_id == assignment);
        Ok(echoed.unwrap_or_else(|| GradeRecord {
            assignment_id: assignment.clone(),
            student_id: student.clone(),
            grade: Some(score),
            feedback: feedback.map(str::to_string),
            graded_at: Some(Utc::now()),
        }))
    }
}

#[async_trait]
impl NotificationBackend for RestBackend {
    async fn fetch_notifications(&self, user: &UserId) -> Result<Vec<Notification>> {
        let body = self
            .send(self.request(Method::GET, &format!("/notifications/{user}")))
            .await?;
        Ok(normalize::notifications(&body))
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<()> {
        self.send(self.request(Method::PUT, &format!("/notifications/{id}/read")))
            .await
            .map(drop)
    }

    async fn mark_all_read(&self, user: &UserId) -> Result<()> {
        self.send(self.request(Method::PUT, &format!("/notifications/read-all/{user}")))
            .await
            .map(drop)
    }

    async fn delete(&self, id: &NotificationId) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/notifications/{id}")))
            .await
            .map(drop)
    }

    async fn delete_all(&self, user: &UserId) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/notifications/all/{user}")))
            .await
            .map(drop)
    }
}
