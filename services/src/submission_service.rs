//! Submission writes wrapped around the reconciling store.
//!
//! Every write follows the same shape: validate locally, record an
//! optimistic overlay entry, call the backend, then either reconcile from a
//! fresh authoritative read (success or "already submitted") or put the
//! overlay back the way it was (any other failure).

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::backend::SubmissionBackend;
use crate::error::{ClientError, Result};
use crate::model::{AssignmentId, GradeRecord, PartialSubmission, SubmissionEntry, Upload, UserId};
use crate::session::Session;
use crate::submission_store::{SubmissionStatus, SubmissionStore};
use crate::validation::{UploadPolicy, validate_grade, validate_upload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    /// The backend already had a submission; state was reconciled instead.
    AlreadySubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Submit,
    Replace,
}

pub struct SubmissionService {
    session: Session,
    backend: Arc<dyn SubmissionBackend>,
    store: RwLock<SubmissionStore>,
    policy: UploadPolicy,
    max_score: f64,
}

impl SubmissionService {
    pub fn new(
        session: Session,
        backend: Arc<dyn SubmissionBackend>,
        policy: UploadPolicy,
        max_score: f64,
    ) -> Self {
        let store = SubmissionStore::new(session.user_id().clone());
        Self {
            session,
            backend,
            store: RwLock::new(store),
            policy,
            max_score,
        }
    }

    /// Uses upload limits and the grade ceiling from the global config.
    pub fn from_config(session: Session, backend: Arc<dyn SubmissionBackend>) -> Self {
        let max_score = common::config::AppConfig::global().max_score;
        Self::new(session, backend, UploadPolicy::from_config(), max_score)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn status_for(&self, assignment: &AssignmentId) -> SubmissionStatus {
        self.store.read().await.status_for(assignment)
    }

    pub async fn student_status(
        &self,
        assignment: &AssignmentId,
        student: &UserId,
    ) -> SubmissionStatus {
        self.store.read().await.student_status(assignment, student)
    }

    /// Assignments whose optimistic entries are still unconfirmed.
    pub async fn pending(&self) -> Vec<AssignmentId> {
        self.store.read().await.pending()
    }

    /// Pulls the current user's authoritative submissions and grades for
    /// `assignments` and reconciles them into the store.
    pub async fn refresh(&self, assignments: &[AssignmentId]) -> Result<()> {
        let user = self.session.user_id();
        let (records, grades) = tokio::try_join!(
            self.backend.fetch_submissions(user, assignments),
            self.backend.fetch_grades(user, assignments),
        )?;

        let mut store = self.store.write().await;
        let written = store.reconcile(records);
        store.load_grades(grades);
        tracing::debug!(user = %user, written, "Reconciled submissions");
        Ok(())
    }

    /// Loads every student's submission for one assignment (evaluator view).
    pub async fn load_assignment(&self, assignment: &AssignmentId) -> Result<Vec<SubmissionEntry>> {
        let entries = self.backend.fetch_assignment_submissions(assignment).await?;
        let mut store = self.store.write().await;
        store.load_assignment_submissions(assignment, entries);
        Ok(store.submissions_for(assignment).to_vec())
    }

    pub async fn submit(&self, assignment: &AssignmentId, upload: &Upload) -> Result<SubmitOutcome> {
        self.write(WriteKind::Submit, assignment, upload).await
    }

    pub async fn replace(&self, assignment: &AssignmentId, upload: &Upload) -> Result<SubmitOutcome> {
        self.write(WriteKind::Replace, assignment, upload).await
    }

    async fn write(
        &self,
        kind: WriteKind,
        assignment: &AssignmentId,
        upload: &Upload,
    ) -> Result<SubmitOutcome> {
        validate_upload(upload, &self.policy)?;

        let pending = self
            .store
            .write()
            .await
            .record_optimistic(assignment, PartialSubmission::file(upload.file_name.trim()));

        let result = match kind {
            WriteKind::Submit => self.backend.submit(assignment, upload).await,
            WriteKind::Replace => self.backend.replace_submission(assignment, upload).await,
        };

        let outcome = match result {
            Ok(()) => SubmitOutcome::Submitted,
            Err(ClientError::AlreadySubmitted) => {
                tracing::info!(assignment = %assignment, "Submission already exists, reconciling");
                SubmitOutcome::AlreadySubmitted
            }
            Err(err) => {
                // A reconcile or a later write that landed meanwhile is kept.
                self.store.write().await.restore(assignment, pending);
                tracing::warn!(assignment = %assignment, ?kind, "Submission write failed: {err}");
                return Err(err);
            }
        };

        if let Err(err) = self.refresh(std::slice::from_ref(assignment)).await {
            // The write went through, so the optimistic entry is accurate
            // until the next successful refresh confirms it.
            tracing::warn!(assignment = %assignment, "Refresh after write failed: {err}");
        }
        Ok(outcome)
    }

    /// Deletes the current user's submission; local state changes only after
    /// the backend confirms.
    pub async fn delete(&self, assignment: &AssignmentId) -> Result<()> {
        if let Err(err) = self.backend.delete_submission(assignment).await {
            tracing::warn!(assignment = %assignment, "Submission delete failed: {err}");
            return Err(err);
        }
        let mut store = self.store.write().await;
        store.clear(assignment);
        store.forget_submission(assignment);
        Ok(())
    }

    /// Grades a student's submission. Teachers and admins only.
    pub async fn grade(
        &self,
        assignment: &AssignmentId,
        student: &UserId,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<GradeRecord> {
        if !self.session.role().can_grade() {
            return Err(ClientError::Unauthorized(
                "only teachers and admins can grade".into(),
            ));
        }
        validate_grade(score, self.max_score, feedback)?;

        let record = self
            .backend
            .grade(assignment, student, score, feedback)
            .await?;
        self.store.write().await.upsert_grade(record.clone());
        tracing::info!(assignment = %assignment, student = %student, score, "Grade saved");
        Ok(record)
    }
}
