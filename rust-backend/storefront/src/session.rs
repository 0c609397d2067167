use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{HttpRequest, HttpResponse};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::models::{CartOwner, User};

pub const SESSION_HEADER: &str = "x-session-id";
const SESSION_ID_LEN: usize = 40;

/// Guest session id sent by the client, if well formed.
pub fn session_id(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| is_valid(id))
        .map(str::to_string)
}

fn is_valid(id: &str) -> bool {
    (16..=128).contains(&id.len()) && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn new_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Resolves whose cart a request works on. The second value is a freshly
/// issued session id the response must hand back to the client.
pub fn cart_owner(user: Option<&User>, req: &HttpRequest) -> (CartOwner, Option<String>) {
    if let Some(user) = user {
        return (CartOwner::User(user.id), None);
    }
    match session_id(req) {
        Some(id) => (CartOwner::Session(id), None),
        None => {
            let id = new_session_id();
            (CartOwner::Session(id.clone()), Some(id))
        }
    }
}

pub fn attach(mut resp: HttpResponse, issued: Option<String>) -> HttpResponse {
    if let Some(id) = issued {
        if let Ok(value) = HeaderValue::from_str(&id) {
            resp.headers_mut().insert(HeaderName::from_static(SESSION_HEADER), value);
        }
    }
    resp
}
