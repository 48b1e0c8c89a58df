// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential resolution middleware.
//!
//! Runs before any handler and attaches the request's canonical
//! [`Credential`] as an extension. It never rejects: a request without a
//! credential continues unauthenticated, and the `Auth` extractor decides
//! whether that is acceptable for the route.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), resolve_credential));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::credential::{self, Credential, Provenance};
use crate::state::AppState;

pub async fn resolve_credential(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = credential::resolve(request.headers(), &state.cookies().access_cookie_name);
    if resolved.provenance() == Provenance::Cookie {
        debug!("using access token cookie as bearer credential");
    }
    request.extensions_mut().insert::<Credential>(resolved);
    next.run(request).await
}
