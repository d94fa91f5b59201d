/// Per-user notification stream: `notifications:user:{user_id}`.
pub fn notifications_topic(user_id: &str) -> String {
    format!("notifications:user:{user_id}")
}

/// User id of a per-user notification topic, if `topic` is one.
pub fn notifications_topic_user(topic: &str) -> Option<&str> {
    topic
        .strip_prefix("notifications:user:")
        .filter(|user| !user.is_empty())
}

/// In-process topic on which the relay announces list changes.
pub fn relay_state_topic(user_id: &str) -> String {
    format!("relay:{user_id}")
}
