//! Reconciling submission store.
//!
//! A local overlay keyed by assignment sits on top of authoritative data
//! (per-assignment submission lists and separately fetched grade records).
//! Optimistic writes land in the overlay immediately; [`SubmissionStore::reconcile`]
//! overwrites them once the server confirms, and never erases an entry the
//! server has not reported on yet.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::model::{
    AssignmentId, GradeRecord, PartialSubmission, SubmissionEntry, SubmissionRecord, UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Written locally, not yet seen in server data.
    Optimistic,
    /// Written by a reconcile from authoritative data.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayEntry {
    pub record: SubmissionRecord,
    pub origin: Origin,
    /// Write that produced an optimistic entry; `None` once confirmed.
    pub token: Option<u64>,
}

/// Handle for one optimistic write, needed to undo it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub token: u64,
    pub previous: Option<OverlayEntry>,
}

/// Which tier of the read path produced a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    Optimistic,
    Confirmed,
    SubmissionList,
    GradeOnly,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionStatus {
    pub submitted: bool,
    pub record: Option<SubmissionRecord>,
    pub source: StatusSource,
}

impl SubmissionStatus {
    fn not_submitted() -> Self {
        Self {
            submitted: false,
            record: None,
            source: StatusSource::Unknown,
        }
    }

    fn from_record(record: SubmissionRecord, source: StatusSource) -> Self {
        let record = record.normalized();
        Self {
            submitted: record.submitted,
            record: Some(record),
            source,
        }
    }

    pub fn grade(&self) -> Option<f64> {
        self.record.as_ref().and_then(|r| r.grade)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.file_name.as_deref())
    }

    pub fn feedback(&self) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.feedback.as_deref())
    }
}

fn is_newer(candidate: Option<DateTime<Utc>>, current: Option<DateTime<Utc>>) -> bool {
    match (candidate, current) {
        (Some(c), Some(cur)) => c > cur,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Folds a separately fetched grade into a submission record when the grade
/// record is more complete (record ungraded) or more recent.
fn augment(mut record: SubmissionRecord, grade: Option<&GradeRecord>) -> SubmissionRecord {
    let Some(g) = grade else {
        return record;
    };
    if g.grade.is_some() && (record.grade.is_none() || is_newer(g.graded_at, record.graded_at)) {
        record.grade = g.grade;
        record.graded_at = g.graded_at.or(record.graded_at);
        if g.feedback.is_some() {
            record.feedback = g.feedback.clone();
        }
    } else if record.feedback.is_none() {
        record.feedback = g.feedback.clone();
    }
    record.normalized()
}

#[derive(Debug, Clone)]
pub struct SubmissionStore {
    user: UserId,
    overlay: HashMap<AssignmentId, OverlayEntry>,
    lists: HashMap<AssignmentId, Vec<SubmissionEntry>>,
    grades: HashMap<(AssignmentId, UserId), GradeRecord>,
    next_token: u64,
    /// Failed writes that were already overwritten by a later write, with the
    /// entry each of them replaced.
    superseded: HashMap<u64, (AssignmentId, Option<OverlayEntry>)>,
}

impl SubmissionStore {
    /// Creates an empty store scoped to `user`.
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            overlay: HashMap::new(),
            lists: HashMap::new(),
            grades: HashMap::new(),
            next_token: 0,
            superseded: HashMap::new(),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Writes an optimistic overlay entry. The returned handle carries
    /// whatever it replaced, so a failed write can be undone with
    /// [`SubmissionStore::restore`].
    pub fn record_optimistic(
        &mut self,
        assignment: &AssignmentId,
        partial: PartialSubmission,
    ) -> PendingWrite {
        self.next_token += 1;
        let token = self.next_token;
        let record = SubmissionRecord {
            assignment_id: assignment.clone(),
            submitted: true,
            submitted_at: Some(partial.submitted_at.unwrap_or_else(Utc::now)),
            grade: None,
            feedback: None,
            file_name: partial.file_name,
            graded_at: None,
        };
        let previous = self.overlay.insert(
            assignment.clone(),
            OverlayEntry {
                record,
                origin: Origin::Optimistic,
                token: Some(token),
            },
        );
        PendingWrite { token, previous }
    }

    /// Merges the authoritative records of the current user into the overlay.
    ///
    /// Keys present in `authoritative` overwrite (or add) overlay entries and
    /// become [`Origin::Confirmed`]; overlay keys the server did not report
    /// are left alone. Returns how many assignments were written.
    pub fn reconcile<I>(&mut self, authoritative: I) -> usize
    where
        I: IntoIterator<Item = SubmissionRecord>,
    {
        let mut confirmed = HashSet::new();
        for record in authoritative {
            confirmed.insert(record.assignment_id.clone());
            self.overlay.insert(
                record.assignment_id.clone(),
                OverlayEntry {
                    record: record.normalized(),
                    origin: Origin::Confirmed,
                    token: None,
                },
            );
        }
        self.superseded.retain(|_, (a, _)| !confirmed.contains(a));
        confirmed.len()
    }

    /// Removes the overlay entry for `assignment`.
    pub fn clear(&mut self, assignment: &AssignmentId) -> Option<OverlayEntry> {
        self.overlay.remove(assignment)
    }

    /// Undoes a failed optimistic write.
    ///
    /// Only applies while the overlay still holds that write. A failed write
    /// already overwritten by a later one is remembered instead, so undoing
    /// the later write skips past it. Returns whether the overlay changed.
    pub fn restore(&mut self, assignment: &AssignmentId, write: PendingWrite) -> bool {
        let current = self.overlay.get(assignment).and_then(|e| e.token);
        if current != Some(write.token) {
            if current.is_some() {
                self.superseded
                    .insert(write.token, (assignment.clone(), write.previous));
            }
            return false;
        }

        let mut previous = write.previous;
        while let Some(token) = previous.as_ref().and_then(|e| e.token) {
            match self.superseded.remove(&token) {
                Some((_, earlier)) => previous = earlier,
                None => break,
            }
        }
        match previous {
            Some(entry) => {
                self.overlay.insert(assignment.clone(), entry);
            }
            None => {
                self.overlay.remove(assignment);
            }
        }
        true
    }

    /// Replaces the authoritative submission list of one assignment.
    pub fn load_assignment_submissions(
        &mut self,
        assignment: &AssignmentId,
        entries: Vec<SubmissionEntry>,
    ) {
        let entries = entries
            .into_iter()
            .map(|mut e| {
                e.record = e.record.normalized();
                e
            })
            .collect();
        self.lists.insert(assignment.clone(), entries);
    }

    pub fn load_grades<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = GradeRecord>,
    {
        for g in records {
            self.grades
                .insert((g.assignment_id.clone(), g.student_id.clone()), g);
        }
    }

    /// Stores a grade just written by an evaluator and mirrors it into the
    /// assignment's submission list.
    pub fn upsert_grade(&mut self, grade: GradeRecord) {
        if let Some(entry) = self
            .lists
            .get_mut(&grade.assignment_id)
            .and_then(|list| list.iter_mut().find(|e| e.student_id == grade.student_id))
        {
            entry.record.grade = grade.grade;
            entry.record.feedback = grade.feedback.clone();
            entry.record.graded_at = grade.graded_at;
            entry.record = entry.record.clone().normalized();
        }
        self.load_grades([grade]);
    }

    /// Drops the current user's authoritative traces for `assignment` after a
    /// confirmed delete.
    pub fn forget_submission(&mut self, assignment: &AssignmentId) {
        let user = self.user.clone();
        if let Some(list) = self.lists.get_mut(assignment) {
            list.retain(|e| e.student_id != user);
        }
        self.grades.remove(&(assignment.clone(), self.user.clone()));
    }

    /// Assignments holding optimistic entries the server has not confirmed.
    pub fn pending(&self) -> Vec<AssignmentId> {
        let mut out: Vec<_> = self
            .overlay
            .iter()
            .filter(|(_, e)| e.origin == Origin::Optimistic)
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        out
    }

    pub fn overlay_entry(&self, assignment: &AssignmentId) -> Option<&OverlayEntry> {
        self.overlay.get(assignment)
    }

    /// Authoritative submission list of one assignment (evaluator view).
    pub fn submissions_for(&self, assignment: &AssignmentId) -> &[SubmissionEntry] {
        self.lists.get(assignment).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Status of `student`'s submission from authoritative data only.
    pub fn student_status(&self, assignment: &AssignmentId, student: &UserId) -> SubmissionStatus {
        let grade = self.grades.get(&(assignment.clone(), student.clone()));

        if let Some(entry) = self
            .submissions_for(assignment)
            .iter()
            .find(|e| &e.student_id == student)
        {
            return SubmissionStatus::from_record(
                augment(entry.record.clone(), grade),
                StatusSource::SubmissionList,
            );
        }

        if let Some(g) = grade {
            let record = SubmissionRecord {
                assignment_id: assignment.clone(),
                submitted: true,
                submitted_at: None,
                grade: g.grade,
                feedback: g.feedback.clone(),
                file_name: None,
                graded_at: g.graded_at,
            };
            return SubmissionStatus::from_record(record, StatusSource::GradeOnly);
        }

        SubmissionStatus::not_submitted()
    }

    /// Read path for the current user: overlay, then submission list (with
    /// grade augmentation), then grade record alone, then not submitted.
    pub fn status_for(&self, assignment: &AssignmentId) -> SubmissionStatus {
        if let Some(entry) = self.overlay.get(assignment) {
            return match entry.origin {
                Origin::Optimistic => {
                    SubmissionStatus::from_record(entry.record.clone(), StatusSource::Optimistic)
                }
                Origin::Confirmed => {
                    let grade = self.grades.get(&(assignment.clone(), self.user.clone()));
                    SubmissionStatus::from_record(
                        augment(entry.record.clone(), grade),
                        StatusSource::Confirmed,
                    )
                }
            };
        }
        self.student_status(assignment, &self.user)
    }
}
