//! Canonical client-side records.
//!
//! Everything here is the *normalized* shape; the aliases the backend uses on
//! the wire are resolved in [`crate::normalize`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a gradable item (assignment or exam).
    AssignmentId
);
opaque_id!(UserId);
opaque_id!(NotificationId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn can_grade(self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" | "lecturer" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// One user's submission state for one assignment.
///
/// `grade.is_some()` implies `submitted`; [`SubmissionRecord::normalized`]
/// restores that invariant for records built by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub assignment_id: AssignmentId,
    pub submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub file_name: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl SubmissionRecord {
    /// A submitted record with no grade yet.
    pub fn submitted(assignment_id: impl Into<AssignmentId>, file_name: Option<&str>) -> Self {
        Self {
            assignment_id: assignment_id.into(),
            submitted: true,
            submitted_at: None,
            grade: None,
            feedback: None,
            file_name: file_name.map(str::to_string),
            graded_at: None,
        }
    }

    pub fn with_grade(mut self, grade: f64, feedback: Option<&str>) -> Self {
        self.grade = Some(grade);
        self.feedback = feedback.map(str::to_string);
        self.normalized()
    }

    pub fn normalized(mut self) -> Self {
        if self.grade.is_some() {
            self.submitted = true;
        }
        self
    }
}

/// Fields the caller knows at the moment of an optimistic write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSubmission {
    pub file_name: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl PartialSubmission {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            file_name: Some(name.into()),
            submitted_at: None,
        }
    }
}

/// One row of an assignment's authoritative submission list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionEntry {
    pub student_id: UserId,
    pub record: SubmissionRecord,
}

/// Grade data fetched independently of the submission list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub assignment_id: AssignmentId,
    pub student_id: UserId,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    /// Target user; pushes addressed elsewhere are discarded.
    pub user_id: Option<UserId>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// File picked for upload.
#[derive(Clone, PartialEq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
