//! In-memory collaborators with switchable failures.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use services::backend::{NotificationBackend, SubmissionBackend};
use services::error::{ClientError, Result};
use services::model::{
    AssignmentId, GradeRecord, Notification, NotificationId, SubmissionEntry, SubmissionRecord,
    Upload, UserId,
};

pub type Failure = fn() -> ClientError;

pub fn network() -> ClientError {
    ClientError::Network("connection reset".into())
}

pub fn conflict() -> ClientError {
    ClientError::AlreadySubmitted
}

#[derive(Default)]
pub struct MockSubmissions {
    pub records: Mutex<HashMap<AssignmentId, SubmissionRecord>>,
    pub lists: Mutex<HashMap<AssignmentId, Vec<SubmissionEntry>>>,
    pub grades: Mutex<Vec<GradeRecord>>,
    pub fail_write: Mutex<Option<Failure>>,
    pub fail_fetch: Mutex<Option<Failure>>,
    pub fail_delete: Mutex<Option<Failure>>,
    pub writes: AtomicUsize,
    pub grade_calls: AtomicUsize,
}

impl MockSubmissions {
    pub fn put_record(&self, record: SubmissionRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.assignment_id.clone(), record);
    }

    pub fn fail_writes_with(&self, f: Option<Failure>) {
        *self.fail_write.lock().unwrap() = f;
    }

    pub fn fail_fetches_with(&self, f: Option<Failure>) {
        *self.fail_fetch.lock().unwrap() = f;
    }

    pub fn fail_deletes_with(&self, f: Option<Failure>) {
        *self.fail_delete.lock().unwrap() = f;
    }

    fn check(slot: &Mutex<Option<Failure>>) -> Result<()> {
        match *slot.lock().unwrap() {
            Some(f) => Err(f()),
            None => Ok(()),
        }
    }

    fn store_upload(&self, assignment: &AssignmentId, upload: &Upload) {
        let mut rec = SubmissionRecord::submitted(assignment.clone(), Some(&upload.file_name));
        rec.submitted_at = Some(Utc::now());
        self.put_record(rec);
    }
}

#[async_trait]
impl SubmissionBackend for MockSubmissions {
    async fn fetch_submissions(
        &self,
        _user: &UserId,
        assignments: &[AssignmentId],
    ) -> Result<Vec<SubmissionRecord>> {
        Self::check(&self.fail_fetch)?;
        let records = self.records.lock().unwrap();
        Ok(assignments
            .iter()
            .filter_map(|a| records.get(a).cloned())
            .collect())
    }

    async fn fetch_grades(
        &self,
        user: &UserId,
        assignments: &[AssignmentId],
    ) -> Result<Vec<GradeRecord>> {
        Self::check(&self.fail_fetch)?;
        Ok(self
            .grades
            .lock()
            .unwrap()
            .iter()
            .filter(|g| &g.student_id == user && assignments.contains(&g.assignment_id))
            .cloned()
            .collect())
    }

    async fn fetch_assignment_submissions(
        &self,
        assignment: &AssignmentId,
    ) -> Result<Vec<SubmissionEntry>> {
        Self::check(&self.fail_fetch)?;
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(assignment)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit(&self, assignment: &AssignmentId, upload: &Upload) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_write)?;
        if self.records.lock().unwrap().contains_key(assignment) {
            return Err(ClientError::AlreadySubmitted);
        }
        self.store_upload(assignment, upload);
        Ok(())
    }

    async fn replace_submission(&self, assignment: &AssignmentId, upload: &Upload) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_write)?;
        self.store_upload(assignment, upload);
        Ok(())
    }

    async fn delete_submission(&self, assignment: &AssignmentId) -> Result<()> {
        Self::check(&self.fail_delete)?;
        self.records.lock().unwrap().remove(assignment);
        Ok(())
    }

    async fn grade(
        &self,
        assignment: &AssignmentId,
        student: &UserId,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<GradeRecord> {
        self.grade_calls.fetch_add(1, Ordering::SeqCst);
        let record = GradeRecord {
            assignment_id: assignment.clone(),
            student_id: student.clone(),
            grade: Some(score),
            feedback: feedback.map(str::to_string),
            graded_at: Some(Utc::now()),
        };
        self.grades.lock().unwrap().push(record.clone());
        Ok(record)
    }
}

#[derive(Default)]
pub struct MockNotifications {
    pub server: Mutex<Vec<Notification>>,
    pub fail_fetch: Mutex<Option<Failure>>,
    pub fail_mutation: Mutex<Option<Failure>>,
    pub fetches: AtomicUsize,
    pub read_calls: Mutex<Vec<String>>,
}

impl MockNotifications {
    pub fn with(items: Vec<Notification>) -> Self {
        Self {
            server: Mutex::new(items),
            ..Default::default()
        }
    }

    pub fn fail_fetches_with(&self, f: Option<Failure>) {
        *self.fail_fetch.lock().unwrap() = f;
    }

    pub fn fail_mutations_with(&self, f: Option<Failure>) {
        *self.fail_mutation.lock().unwrap() = f;
    }

    fn check(slot: &Mutex<Option<Failure>>) -> Result<()> {
        match *slot.lock().unwrap() {
            Some(f) => Err(f()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NotificationBackend for MockNotifications {
    async fn fetch_notifications(&self, user: &UserId) -> Result<Vec<Notification>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_fetch)?;
        Ok(self
            .server
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id.as_ref().is_none_or(|u| u == user))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<()> {
        self.read_calls.lock().unwrap().push(id.to_string());
        Self::check(&self.fail_mutation)?;
        for n in self.server.lock().unwrap().iter_mut().filter(|n| &n.id == id) {
            n.read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self, _user: &UserId) -> Result<()> {
        self.read_calls.lock().unwrap().push("*".into());
        Self::check(&self.fail_mutation)?;
        for n in self.server.lock().unwrap().iter_mut() {
            n.read = true;
        }
        Ok(())
    }

    async fn delete(&self, id: &NotificationId) -> Result<()> {
        Self::check(&self.fail_mutation)?;
        self.server.lock().unwrap().retain(|n| &n.id != id);
        Ok(())
    }

    async fn delete_all(&self, _user: &UserId) -> Result<()> {
        Self::check(&self.fail_mutation)?;
        self.server.lock().unwrap().clear();
        Ok(())
    }
}

pub fn notification(id: &str, user: &str, minutes_ago: i64, read: bool) -> Notification {
    Notification {
        id: NotificationId::from(id),
        user_id: Some(UserId::from(user)),
        message: format!("message {id}"),
        created_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
        read,
    }
}
