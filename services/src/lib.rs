//! Client core of the EduNex school portal: optimistic submission state
//! reconciled against the backend, and a push-fed notification relay.

pub mod backend;
pub mod error;
pub mod model;
pub mod normalize;
pub mod notification_relay;
pub mod poller;
pub mod push;
pub mod rest;
pub mod session;
pub mod submission_service;
pub mod submission_store;
pub mod validation;

pub use error::{ClientError, Result};
pub use notification_relay::{NotificationRelay, RelayEvent};
pub use session::Session;
pub use submission_service::{SubmissionService, SubmitOutcome};
pub use submission_store::{SubmissionStatus, SubmissionStore};
