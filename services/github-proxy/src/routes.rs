//! Route handlers for the five GitHub proxy endpoints
//!
//! Each handler maps its path parameter onto a fixed upstream URL template,
//! delegates to the rotation wrapper, and converts the result into the
//! client-facing contract: 200 + verbatim JSON on success, or the
//! `{error, details}` envelope on failure. Usernames are path-escaped but
//! not otherwise validated; garbage is forwarded and rejected upstream.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::error;
use url::Url;
use uuid::Uuid;

use crate::AppState;
use crate::error::FetchError;
use crate::stats::RouteKind;

pub async fn user_details(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Response {
    proxy(&state, RouteKind::UserDetails, &username).await
}

pub async fn user_repos(State(state): State<AppState>, Path(username): Path<String>) -> Response {
    proxy(&state, RouteKind::UserRepos, &username).await
}

pub async fn user_events(State(state): State<AppState>, Path(username): Path<String>) -> Response {
    proxy(&state, RouteKind::UserEvents, &username).await
}

pub async fn user_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Response {
    proxy(&state, RouteKind::UserFollowers, &username).await
}

pub async fn user_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Response {
    proxy(&state, RouteKind::UserFollowing, &username).await
}

/// JSON error envelope the front-end depends on: `{error, details}`.
fn error_response(status: StatusCode, error: &str, details: &str) -> Response {
    let body = serde_json::json!({
        "error": error,
        "details": details,
    });
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Kind-specific message for upstream failures, matching the contract the
/// front-end's toasts key off.
fn upstream_error_message(route: RouteKind) -> &'static str {
    match route {
        RouteKind::UserDetails => "User not found",
        RouteKind::UserRepos => "Repos not found",
        RouteKind::UserEvents => "Events not found",
        RouteKind::UserFollowers => "Followers not found",
        RouteKind::UserFollowing => "Following not found",
    }
}

/// Build the upstream URL for a route. The username becomes a single escaped
/// path segment, so `a/b` cannot smuggle an extra segment into the path.
fn upstream_url(base: &Url, route: RouteKind, username: &str) -> Result<Url, FetchError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| FetchError::Internal("upstream base URL cannot carry a path".into()))?;
        segments.pop_if_empty().push("users").push(username);
        match route {
            RouteKind::UserDetails => {}
            RouteKind::UserRepos => {
                segments.push("repos");
            }
            RouteKind::UserEvents => {
                segments.push("events");
            }
            RouteKind::UserFollowers => {
                segments.push("followers");
            }
            RouteKind::UserFollowing => {
                segments.push("following");
            }
        }
    }
    match route {
        RouteKind::UserDetails => {}
        RouteKind::UserRepos => url.set_query(Some("sort=updated&per_page=100")),
        RouteKind::UserEvents | RouteKind::UserFollowers | RouteKind::UserFollowing => {
            url.set_query(Some("per_page=30"))
        }
    }
    Ok(url)
}

async fn proxy(state: &AppState, route: RouteKind, username: &str) -> Response {
    let request_id = format!("req_{}", Uuid::new_v4().as_simple());

    let url = match upstream_url(&state.base_url, route, username) {
        Ok(url) => url,
        Err(e) => {
            state.stats.record_error(route);
            error!(request_id = %request_id, route = route.as_str(), error = %e, "failed to build upstream URL");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &e.to_string(),
            );
        }
    };

    match state
        .fetcher
        .fetch_with_rotation(url.as_str(), route, &state.stats)
        .await
    {
        // Normalize every upstream success to 200 so the client contract is
        // decoupled from upstream status nuances
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(FetchError::Upstream { status, body }) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            error_response(status, upstream_error_message(route), &body)
        }
        Err(FetchError::Internal(msg)) => {
            error!(request_id = %request_id, route = route.as_str(), error = %msg, "upstream fetch failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &msg,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.github.com").unwrap()
    }

    #[test]
    fn user_details_url_matches_template() {
        let url = upstream_url(&base(), RouteKind::UserDetails, "octocat").unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/users/octocat");
    }

    #[test]
    fn user_repos_url_includes_sort_and_page_size() {
        let url = upstream_url(&base(), RouteKind::UserRepos, "octocat").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/users/octocat/repos?sort=updated&per_page=100"
        );
    }

    #[test]
    fn user_events_url_matches_template() {
        let url = upstream_url(&base(), RouteKind::UserEvents, "octocat").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/users/octocat/events?per_page=30"
        );
    }

    #[test]
    fn followers_and_following_urls_match_templates() {
        assert_eq!(
            upstream_url(&base(), RouteKind::UserFollowers, "octocat")
                .unwrap()
                .as_str(),
            "https://api.github.com/users/octocat/followers?per_page=30"
        );
        assert_eq!(
            upstream_url(&base(), RouteKind::UserFollowing, "octocat")
                .unwrap()
                .as_str(),
            "https://api.github.com/users/octocat/following?per_page=30"
        );
    }

    #[test]
    fn username_is_path_escaped() {
        let url = upstream_url(&base(), RouteKind::UserDetails, "we ird").unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/users/we%20ird");
    }

    #[test]
    fn username_with_slash_stays_one_segment() {
        let url = upstream_url(&base(), RouteKind::UserRepos, "a/b").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/users/a%2Fb/repos?sort=updated&per_page=100"
        );
    }

    #[test]
    fn base_url_with_trailing_slash_produces_clean_path() {
        let base = Url::parse("http://127.0.0.1:9999/").unwrap();
        let url = upstream_url(&base, RouteKind::UserDetails, "octocat").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9999/users/octocat");
    }

    #[test]
    fn upstream_error_messages_are_kind_specific() {
        assert_eq!(
            upstream_error_message(RouteKind::UserDetails),
            "User not found"
        );
        assert_eq!(upstream_error_message(RouteKind::UserRepos), "Repos not found");
        assert_eq!(
            upstream_error_message(RouteKind::UserEvents),
            "Events not found"
        );
        assert_eq!(
            upstream_error_message(RouteKind::UserFollowers),
            "Followers not found"
        );
        assert_eq!(
            upstream_error_message(RouteKind::UserFollowing),
            "Following not found"
        );
    }

    #[test]
    fn error_response_carries_envelope_shape() {
        let resp = error_response(StatusCode::NOT_FOUND, "User not found", "{}");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
