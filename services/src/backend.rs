//! Collaborator interfaces consumed by the client core.
//!
//! Implementations own transport details; everything they return is already
//! normalized. [`crate::rest::RestBackend`] is the HTTP implementation.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    AssignmentId, GradeRecord, Notification, NotificationId, SubmissionEntry, SubmissionRecord,
    Upload, UserId,
};

#[async_trait]
pub trait SubmissionBackend: Send + Sync {
    /// Authoritative submission records of `user` for the given assignments.
    async fn fetch_submissions(
        &self,
        user: &UserId,
        assignments: &[AssignmentId],
    ) -> Result<Vec<SubmissionRecord>>;

    async fn fetch_grades(
        &self,
        user: &UserId,
        assignments: &[AssignmentId],
    ) -> Result<Vec<GradeRecord>>;

    /// Every student's submission for one assignment.
    async fn fetch_assignment_submissions(
        &self,
        assignment: &AssignmentId,
    ) -> Result<Vec<SubmissionEntry>>;

    /// Fails with [`crate::error::ClientError::AlreadySubmitted`] when a
    /// submission exists.
    async fn submit(&self, assignment: &AssignmentId, upload: &Upload) -> Result<()>;

    async fn replace_submission(&self, assignment: &AssignmentId, upload: &Upload) -> Result<()>;

    async fn delete_submission(&self, assignment: &AssignmentId) -> Result<()>;

    async fn grade(
        &self,
        assignment: &AssignmentId,
        student: &UserId,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<GradeRecord>;
}

#[async_trait]
pub trait NotificationBackend: Send + Sync {
    async fn fetch_notifications(&self, user: &UserId) -> Result<Vec<Notification>>;

    async fn mark_read(&self, id: &NotificationId) -> Result<()>;

    async fn mark_all_read(&self, user: &UserId) -> Result<()>;

    async fn delete(&self, id: &NotificationId) -> Result<()>;

    async fn delete_all(&self, user: &UserId) -> Result<()>;
}
