use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::warn;

use backend_application::rooms::{AdmissionDecision, AdmissionRequest};
use backend_application::AppState;

use super::cookies::{membership_cookie, membership_token};
use crate::error::HttpError;

/// Gate in front of room pages: admits, issues a seat cookie, or redirects
/// to `/?error=<reason>`.
pub async fn admit_room(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let admission = AdmissionRequest {
        path: request.uri().path().to_string(),
        user_agent: request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string),
        token: membership_token(request.headers(), &state.config.cookie_name),
    };

    match state.admission.admit(&admission).await {
        Ok(AdmissionDecision::Allow { issued, .. }) => {
            let mut response = next.run(request).await;
            if let Some(token) = issued {
                let cookie = membership_cookie(&state.config.cookie_name, &token, state.config.secure_cookies);
                match HeaderValue::from_str(&cookie) {
                    Ok(value) => {
                        response.headers_mut().append(header::SET_COOKIE, value);
                    }
                    Err(err) => warn!("membership cookie not representable as header: {}", err),
                }
            }
            response
        }
        Ok(AdmissionDecision::Deny(reason)) => {
            Redirect::temporary(&format!("/?error={}", reason.as_str())).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}
