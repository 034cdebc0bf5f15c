//! Domain operations over the API client, plus the pure derived-state
//! helpers the command layer renders from. No function here touches
//! headers, the session, or the unauthorized hook.

use chrono::{DateTime, Utc};

use crate::api::{ApiClient, ApiError};
use crate::types::{Attendee, Event, EventInput, User};

pub fn list_events(api: &ApiClient) -> Result<Vec<Event>, ApiError> {
    api.get("/events")
}

pub fn get_event(api: &ApiClient, id: i64) -> Result<Event, ApiError> {
    api.get(&format!("/events/{id}"))
}

pub fn create_event(api: &ApiClient, input: &EventInput) -> Result<Event, ApiError> {
    api.post("/events", input)
}

pub fn update_event(api: &ApiClient, id: i64, input: &EventInput) -> Result<Event, ApiError> {
    api.put(&format!("/events/{id}"), input)
}

pub fn delete_event(api: &ApiClient, id: i64) -> Result<(), ApiError> {
    api.delete(&format!("/events/{id}"))
}

/// The attendee list comes back user-shaped for display.
pub fn list_attendees(api: &ApiClient, event_id: i64) -> Result<Vec<User>, ApiError> {
    api.get(&format!("/events/{event_id}/attendees"))
}

/// Duplicate-join prevention is the server's job; the command loop runs
/// serially so the same control cannot fire twice while in flight.
pub fn join_event(api: &ApiClient, event_id: i64, user_id: i64) -> Result<Attendee, ApiError> {
    api.post_empty(&format!("/events/{event_id}/attendees/{user_id}"))
}

pub fn leave_event(api: &ApiClient, event_id: i64, user_id: i64) -> Result<(), ApiError> {
    api.delete(&format!("/events/{event_id}/attendees/{user_id}"))
}

pub fn events_for_attendee(api: &ApiClient, user_id: i64) -> Result<Vec<Event>, ApiError> {
    api.get(&format!("/attendees/{user_id}/events"))
}

/// Case-insensitive substring match against name, description, and
/// location. A blank query keeps everything; source order is preserved.
pub fn filter_events<'a>(events: &'a [Event], query: &str) -> Vec<&'a Event> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return events.iter().collect();
    }
    events
        .iter()
        .filter(|e| {
            e.name.to_lowercase().contains(&needle)
                || e.description.to_lowercase().contains(&needle)
                || e.location.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Split into (upcoming, past) relative to `now`. Events at exactly `now`
/// count as upcoming, so every event lands in exactly one half.
pub fn partition_by_time<'a>(
    events: &'a [Event],
    now: DateTime<Utc>,
) -> (Vec<&'a Event>, Vec<&'a Event>) {
    events.iter().partition(|e| e.date_time >= now)
}
