//! Boundary normalization of backend records.
//!
//! The backend is not consistent about field names (`_id` vs `id`,
//! `fileName` vs `originalName`, `score` vs `grade`, populated references
//! instead of plain ids, numbers as strings, ...). Every payload is mapped
//! here onto the canonical types in [`crate::model`]; nothing past this module
//! looks at raw JSON.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::model::{
    AssignmentId, GradeRecord, Notification, NotificationId, SubmissionEntry, SubmissionRecord,
    UserId,
};

const ID_KEYS: &[&str] = &["_id", "id"];
const ASSIGNMENT_KEYS: &[&str] = &["assignmentId", "assignment_id", "assignment", "examId", "exam"];
const STUDENT_KEYS: &[&str] = &["studentId", "student_id", "student", "userId", "user_id", "user"];
const SUBMITTED_KEYS: &[&str] = &["submitted", "isSubmitted", "is_submitted"];
const SUBMITTED_AT_KEYS: &[&str] = &["submittedAt", "submitted_at", "createdAt", "created_at"];
const FILE_NAME_KEYS: &[&str] = &["fileName", "file_name", "filename", "originalName"];
const GRADE_KEYS: &[&str] = &["grade", "score", "marks"];
const FEEDBACK_KEYS: &[&str] = &["feedback", "comment", "remarks"];
const GRADED_AT_KEYS: &[&str] = &["gradedAt", "graded_at", "updatedAt", "updated_at"];
const RECIPIENT_KEYS: &[&str] = &["userId", "user_id", "user", "recipient"];
const MESSAGE_KEYS: &[&str] = &["message", "text", "body", "title"];
const CREATED_AT_KEYS: &[&str] = &["createdAt", "created_at", "timestamp"];
const READ_KEYS: &[&str] = &["read", "isRead", "is_read"];

/// First alias present with a non-null value.
fn pick<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// Plain id, number id, or a populated reference carrying `_id`/`id`.
fn as_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => pick(obj, &["$oid", "_id", "id"]).and_then(as_id),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|f: &f64| f.is_finite())
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339 strings, epoch milliseconds, or `{"$date": ...}`.
fn as_datetime(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(obj) => obj.get("$date").and_then(as_datetime),
        _ => None,
    }
}

/// Extracts the list of records from any of the envelope shapes the backend
/// uses: a bare array, `{data: ...}`, or `{<collection>: [...]}`.
pub fn collection<'a>(body: &'a Value, key: &str) -> Vec<&'a Value> {
    match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => {
            if let Some(inner) = obj.get(key) {
                return collection(inner, key);
            }
            if let Some(inner) = obj.get("data") {
                return collection(inner, key);
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Unwraps a single-record envelope (`{data: {...}}` or `{<key>: {...}}`).
pub fn single<'a>(body: &'a Value, key: &str) -> &'a Value {
    match body {
        Value::Object(obj) => match obj.get(key).or_else(|| obj.get("data")) {
            Some(inner @ Value::Object(_)) => single(inner, key),
            _ => body,
        },
        _ => body,
    }
}

/// Normalizes one submission record. `assignment` is used when the record
/// does not name its assignment (lists fetched per assignment).
pub fn submission_record(v: &Value, assignment: Option<&AssignmentId>) -> Option<SubmissionRecord> {
    let obj = v.as_object()?;
    let assignment_id = pick(obj, ASSIGNMENT_KEYS)
        .and_then(as_id)
        .map(AssignmentId)
        .or_else(|| assignment.cloned())?;

    let record = SubmissionRecord {
        assignment_id,
        submitted: pick(obj, SUBMITTED_KEYS).and_then(as_bool).unwrap_or(true),
        submitted_at: pick(obj, SUBMITTED_AT_KEYS).and_then(as_datetime),
        grade: pick(obj, GRADE_KEYS).and_then(as_f64),
        feedback: pick(obj, FEEDBACK_KEYS).and_then(as_text),
        file_name: pick(obj, FILE_NAME_KEYS).and_then(as_text),
        graded_at: pick(obj, GRADED_AT_KEYS).and_then(as_datetime),
    };
    Some(record.normalized())
}

pub fn submission_entry(v: &Value, assignment: &AssignmentId) -> Option<SubmissionEntry> {
    let obj = v.as_object()?;
    let student_id = pick(obj, STUDENT_KEYS).and_then(as_id).map(UserId)?;
    let record = submission_record(v, Some(assignment))?;
    Some(SubmissionEntry { student_id, record })
}

pub fn grade_record(v: &Value, student: Option<&UserId>) -> Option<GradeRecord> {
    let obj = v.as_object()?;
    Some(GradeRecord {
        assignment_id: pick(obj, ASSIGNMENT_KEYS).and_then(as_id).map(AssignmentId)?,
        student_id: pick(obj, STUDENT_KEYS)
            .and_then(as_id)
            .map(UserId)
            .or_else(|| student.cloned())?,
        grade: pick(obj, GRADE_KEYS).and_then(as_f64),
        feedback: pick(obj, FEEDBACK_KEYS).and_then(as_text),
        graded_at: pick(obj, GRADED_AT_KEYS).and_then(as_datetime),
    })
}

/// Normalizes one notification. A missing timestamp is taken as "now" so a
/// freshly pushed item sorts first.
pub fn notification(v: &Value) -> Option<Notification> {
    let obj = v.as_object()?;
    Some(Notification {
        id: pick(obj, ID_KEYS).and_then(as_id).map(NotificationId)?,
        user_id: pick(obj, RECIPIENT_KEYS).and_then(as_id).map(UserId),
        message: pick(obj, MESSAGE_KEYS).and_then(as_text).unwrap_or_default(),
        created_at: pick(obj, CREATED_AT_KEYS)
            .and_then(as_datetime)
            .unwrap_or_else(Utc::now),
        read: pick(obj, READ_KEYS).and_then(as_bool).unwrap_or(false),
    })
}

fn normalize_all<T>(items: Vec<&Value>, kind: &str, f: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|v| {
            let out = f(v);
            if out.is_none() {
                tracing::warn!("Dropping {kind} record without a usable id: {v}");
            }
            out
        })
        .collect()
}

pub fn submissions(body: &Value) -> Vec<SubmissionRecord> {
    normalize_all(collection(body, "submissions"), "submission", |v| {
        submission_record(v, None)
    })
}

pub fn submission_entries(body: &Value, assignment: &AssignmentId) -> Vec<SubmissionEntry> {
    normalize_all(collection(body, "submissions"), "submission", |v| {
        submission_entry(v, assignment)
    })
}

pub fn grades(body: &Value, student: &UserId) -> Vec<GradeRecord> {
    normalize_all(collection(body, "grades"), "grade", |v| {
        grade_record(v, Some(student))
    })
}

pub fn notifications(body: &Value) -> Vec<Notification> {
    normalize_all(collection(body, "notifications"), "notification", notification)
}
