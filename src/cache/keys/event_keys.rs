/// Dedup key for an inbound event as seen from one actor.
///
/// The first part is length-prefixed so ids containing `:` cannot collide.
pub fn processed_key(event_id: &str, actor_id: &str) -> String {
    format!("{}:{}:{}", event_id.len(), event_id, actor_id)
}

/// Dedup key for a feedback click; one vote per actor per response.
pub fn feedback_vote_key(response_id: &str, actor_id: &str) -> String {
    format!("feedback:{}:{}:{}", response_id.len(), response_id, actor_id)
}
