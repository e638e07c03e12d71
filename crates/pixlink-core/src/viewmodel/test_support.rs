//! Local backends and signed-in users for view-model tests.

use tempfile::TempDir;

use crate::auth::{SignUpOutcome, SignUpRequest};
use crate::backend::Backend;
use crate::models::NewProfile;
use crate::session::SessionContext;

pub fn sign_up_request(username: &str) -> SignUpRequest {
    SignUpRequest {
        email: format!("{username}@example.com"),
        password: "correct horse".to_string(),
        username: username.to_string(),
        full_name: String::new(),
    }
}

/// In-memory records with objects under a temporary directory.
pub async fn local_backend() -> (Backend, TempDir) {
    let dir = TempDir::new().unwrap();
    let backend = Backend::open_local_in_memory(dir.path().join("objects"), "images")
        .await
        .unwrap();
    (backend, dir)
}

/// A view of `backend` signed in as a new account with a profile row.
pub async fn signed_in(backend: &Backend, username: &str) -> Backend {
    let SignUpOutcome::SignedIn(session) = backend
        .auth
        .sign_up(&sign_up_request(username))
        .await
        .unwrap()
    else {
        panic!("local sign-up signs in");
    };
    backend
        .store
        .insert_profile(&NewProfile {
            id: session.user.id,
            username: username.to_string(),
            full_name: None,
        })
        .await
        .unwrap();
    backend.with_session(SessionContext::with_session(session))
}

/// A view of `backend` with nobody signed in.
pub fn signed_out(backend: &Backend) -> Backend {
    backend.with_session(SessionContext::new())
}

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
