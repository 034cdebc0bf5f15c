//! In-process stand-in for the event service backend. Serves the same
//! routes under /api/v1 with an in-memory store, mints opaque bearer
//! tokens at login, and records the Authorization header seen on the
//! listing route so tests can assert on header injection. Tests keep the
//! shared `Db` handle to inspect or mutate state directly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use gather::types::{Attendee, Event, EventInput, LoginRequest, RegisterRequest, User};

#[derive(Clone)]
pub struct StoredUser {
    pub user: User,
    pub password: String,
}

#[derive(Default)]
pub struct Backend {
    pub users: Vec<StoredUser>,
    pub tokens: HashMap<String, i64>,
    pub events: HashMap<i64, Event>,
    pub attendees: Vec<Attendee>,
    /// Authorization header seen on the most recent GET /events call;
    /// outer None until the route is hit.
    pub last_auth_header: Option<Option<String>>,
    next_user_id: i64,
    next_event_id: i64,
    next_attendee_id: i64,
    next_token: i64,
}

pub type Db = Arc<RwLock<Backend>>;

/// Bind on a random port, serve from a background thread, return the
/// client-facing base URL (with the API prefix) and the state handle.
pub fn spawn() -> (String, Db) {
    let db: Db = Arc::new(RwLock::new(Backend::default()));

    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let app_db = db.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            axum::serve(listener, app(app_db)).await
        })
        .unwrap();
    });

    (format!("http://{addr}/api/v1"), db)
}

fn app(db: Db) -> Router {
    let api = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/{id}/attendees", get(list_attendees))
        .route(
            "/events/{id}/attendees/{user_id}",
            post(add_attendee).delete(remove_attendee),
        )
        .route("/attendees/{user_id}/events", get(events_for_attendee))
        .with_state(db);
    Router::new().nest("/api/v1", api)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn authenticate(db: &Backend, headers: &HeaderMap) -> Option<i64> {
    bearer(headers).and_then(|token| db.tokens.get(&token).copied())
}

async fn register(State(db): State<Db>, Json(req): Json<RegisterRequest>) -> Response {
    let mut db = db.write().unwrap();
    if db.users.iter().any(|u| u.user.email == req.email) {
        return error(StatusCode::CONFLICT, "Email already registered");
    }
    db.next_user_id += 1;
    let user = User {
        id: db.next_user_id,
        name: req.name,
        email: req.email,
    };
    db.users.push(StoredUser {
        user: user.clone(),
        password: req.password,
    });
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn login(State(db): State<Db>, Json(req): Json<LoginRequest>) -> Response {
    let mut db = db.write().unwrap();
    let Some(stored) = db
        .users
        .iter()
        .find(|u| u.user.email == req.email && u.password == req.password)
        .cloned()
    else {
        return error(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };
    db.next_token += 1;
    let token = format!("tok-{}", db.next_token);
    db.tokens.insert(token.clone(), stored.user.id);
    Json(json!({ "token": token, "user": stored.user })).into_response()
}

async fn list_events(State(db): State<Db>, headers: HeaderMap) -> Response {
    let mut db = db.write().unwrap();
    db.last_auth_header = Some(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    let mut events: Vec<Event> = db.events.values().cloned().collect();
    events.sort_by_key(|e| e.id);
    Json(events).into_response()
}

async fn create_event(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<EventInput>,
) -> Response {
    let mut db = db.write().unwrap();
    let Some(user_id) = authenticate(&db, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    db.next_event_id += 1;
    let event = Event {
        id: db.next_event_id,
        user_id,
        name: input.name,
        description: input.description,
        location: input.location,
        date_time: input.date_time,
    };
    db.events.insert(event.id, event.clone());
    (StatusCode::CREATED, Json(event)).into_response()
}

async fn get_event(State(db): State<Db>, Path(id): Path<i64>) -> Response {
    let db = db.read().unwrap();
    match db.events.get(&id) {
        Some(event) => Json(event.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Event not found"),
    }
}

async fn update_event(
    State(db): State<Db>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(input): Json<EventInput>,
) -> Response {
    let mut db = db.write().unwrap();
    let Some(user_id) = authenticate(&db, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let Some(event) = db.events.get_mut(&id) else {
        return error(StatusCode::NOT_FOUND, "Event not found");
    };
    if event.user_id != user_id {
        return error(StatusCode::FORBIDDEN, "You can only update your own events");
    }
    event.name = input.name;
    event.description = input.description;
    event.location = input.location;
    event.date_time = input.date_time;
    Json(event.clone()).into_response()
}

async fn delete_event(
    State(db): State<Db>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let mut db = db.write().unwrap();
    let Some(user_id) = authenticate(&db, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let Some(event) = db.events.get(&id) else {
        return error(StatusCode::NOT_FOUND, "Event not found");
    };
    if event.user_id != user_id {
        return error(StatusCode::FORBIDDEN, "You can only delete your own events");
    }
    db.events.remove(&id);
    db.attendees.retain(|a| a.event_id != id);
    StatusCode::NO_CONTENT.into_response()
}

async fn list_attendees(State(db): State<Db>, Path(id): Path<i64>) -> Response {
    let db = db.read().unwrap();
    if !db.events.contains_key(&id) {
        return error(StatusCode::NOT_FOUND, "Event not found");
    }
    let users: Vec<User> = db
        .attendees
        .iter()
        .filter(|a| a.event_id == id)
        .filter_map(|a| db.users.iter().find(|u| u.user.id == a.user_id))
        .map(|stored| stored.user.clone())
        .collect();
    Json(users).into_response()
}

async fn add_attendee(
    State(db): State<Db>,
    Path((id, user_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Response {
    let mut db = db.write().unwrap();
    if authenticate(&db, &headers).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    if !db.events.contains_key(&id) {
        return error(StatusCode::NOT_FOUND, "Event not found");
    }
    // At most one record per (user, event) pair.
    if let Some(existing) = db
        .attendees
        .iter()
        .find(|a| a.event_id == id && a.user_id == user_id)
    {
        return Json(existing.clone()).into_response();
    }
    db.next_attendee_id += 1;
    let attendee = Attendee {
        id: db.next_attendee_id,
        user_id,
        event_id: id,
    };
    db.attendees.push(attendee.clone());
    (StatusCode::CREATED, Json(attendee)).into_response()
}

async fn remove_attendee(
    State(db): State<Db>,
    Path((id, user_id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Response {
    let mut db = db.write().unwrap();
    if authenticate(&db, &headers).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    db.attendees
        .retain(|a| !(a.event_id == id && a.user_id == user_id));
    StatusCode::NO_CONTENT.into_response()
}

async fn events_for_attendee(
    State(db): State<Db>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let db = db.read().unwrap();
    if authenticate(&db, &headers).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let mut events: Vec<Event> = db
        .attendees
        .iter()
        .filter(|a| a.user_id == user_id)
        .filter_map(|a| db.events.get(&a.event_id))
        .cloned()
        .collect();
    events.sort_by_key(|e| e.id);
    Json(events).into_response()
}
