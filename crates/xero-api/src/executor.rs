//! Authenticated request executor
//!
//! Every API call runs its own instance of a small state machine:
//!
//! - `Attempt` sends the request with the current bearer token
//! - a 200 goes to `Done`
//! - a 401 carrying the `TokenExpired:` marker goes to `Refresh`, once
//! - `Refresh` goes back to `Attempt` on success, so the new token is used
//! - everything else, including a second expiry, goes to `Fatal`
//!
//! `handle_event` is pure: it receives events and returns (new_state, action).
//! `Executor::execute` performs the I/O each action implies.

use std::fmt;

use tracing::{debug, info, warn};
use xero_auth::{TokenCache, TokenClient};

use crate::error::{Error, Result};
use crate::expiry::{ResponseClass, classify_response};
use crate::session::Session;

/// Executor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Send the request. `refreshed` records whether the one refresh is spent.
    Attempt { refreshed: bool },
    /// Trade the refresh token for a new access token
    Refresh,
    /// Terminal: payload delivered
    Done,
    /// Terminal: call failed
    Fatal,
}

impl RequestState {
    pub fn start() -> Self {
        RequestState::Attempt { refreshed: false }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Done | RequestState::Fatal)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestState::Attempt { .. } => "ATTEMPT",
            RequestState::Refresh => "REFRESH",
            RequestState::Done => "DONE",
            RequestState::Fatal => "FATAL",
        };
        f.write_str(label)
    }
}

/// Events that drive transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    /// The API answered; carries its classification
    Responded(ResponseClass),
    RefreshSucceeded,
    RefreshFailed,
}

/// Why a call ended in `Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    /// Non-200 that is not an expiry signal
    Rejected,
    /// Expiry signal after the refresh was already spent
    ExpiredAfterRefresh,
    RefreshFailed,
}

/// Actions the driver should execute after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Send,
    Refresh,
    Deliver,
    Fail(FailReason),
    /// Event not valid in this state
    None,
}

/// Pure transition function.
pub fn handle_event(state: RequestState, event: RequestEvent) -> (RequestState, RequestAction) {
    match (state, event) {
        (RequestState::Attempt { .. }, RequestEvent::Responded(ResponseClass::Success)) => {
            (RequestState::Done, RequestAction::Deliver)
        }
        (
            RequestState::Attempt { refreshed: false },
            RequestEvent::Responded(ResponseClass::Expired),
        ) => (RequestState::Refresh, RequestAction::Refresh),
        (
            RequestState::Attempt { refreshed: true },
            RequestEvent::Responded(ResponseClass::Expired),
        ) => (
            RequestState::Fatal,
            RequestAction::Fail(FailReason::ExpiredAfterRefresh),
        ),
        (RequestState::Attempt { .. }, RequestEvent::Responded(ResponseClass::Rejected)) => (
            RequestState::Fatal,
            RequestAction::Fail(FailReason::Rejected),
        ),
        (RequestState::Refresh, RequestEvent::RefreshSucceeded) => (
            RequestState::Attempt { refreshed: true },
            RequestAction::Send,
        ),
        (RequestState::Refresh, RequestEvent::RefreshFailed) => (
            RequestState::Fatal,
            RequestAction::Fail(FailReason::RefreshFailed),
        ),
        (state, _) => (state, RequestAction::None),
    }
}

/// Runs API calls under the refresh-once policy.
#[derive(Debug, Clone)]
pub struct Executor {
    http: reqwest::Client,
    tokens: TokenClient,
    cache: TokenCache,
    api_url: String,
}

impl Executor {
    pub fn new(
        http: reqwest::Client,
        tokens: TokenClient,
        cache: TokenCache,
        api_url: impl Into<String>,
    ) -> Self {
        let api_url: String = api_url.into();
        Self {
            http,
            tokens,
            cache,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Execute one API call and return the 200 body.
    ///
    /// `build` creates the request without authorization; the bearer token
    /// is attached on each attempt so a retry after refresh uses the new one.
    /// On a successful refresh the session token is replaced and the cache
    /// rewritten.
    pub async fn execute<F>(
        &self,
        session: &mut Session,
        endpoint: &'static str,
        build: F,
    ) -> Result<String>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut state = RequestState::start();
        let mut action = RequestAction::Send;
        let mut last_response: Option<(u16, String)> = None;
        let mut refresh_error: Option<xero_auth::Error> = None;

        loop {
            let event = match action {
                RequestAction::Send => {
                    let (status, body) = self.send(session, endpoint, &build).await?;
                    let class = classify_response(status, &body);
                    debug!(endpoint, status, ?class, "response received");
                    last_response = Some((status, body));
                    RequestEvent::Responded(class)
                }
                RequestAction::Refresh => {
                    info!(endpoint, "access token expired, refreshing");
                    let refreshed = self
                        .tokens
                        .refresh(&self.cache, session.refresh_token())
                        .await;
                    match refreshed {
                        Ok(token) => {
                            session.set_token(token);
                            RequestEvent::RefreshSucceeded
                        }
                        Err(e) => {
                            warn!(endpoint, error = %e, "token refresh failed");
                            refresh_error = Some(e);
                            RequestEvent::RefreshFailed
                        }
                    }
                }
                RequestAction::Deliver => {
                    let (_, body) = last_response.unwrap_or_default();
                    return Ok(body);
                }
                RequestAction::Fail(reason) => {
                    return Err(fail(endpoint, reason, last_response, refresh_error));
                }
                RequestAction::None => {
                    return Err(Error::Stalled {
                        endpoint,
                        state: state.to_string(),
                    });
                }
            };

            let (next, next_action) = handle_event(state, event);
            debug!(endpoint, from = %state, to = %next, "request state");
            state = next;
            action = next_action;
        }
    }

    async fn send<F>(
        &self,
        session: &Session,
        endpoint: &'static str,
        build: &F,
    ) -> Result<(u16, String)>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let access_token = session.access_token()?;
        let response = build(&self.http)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Http {
                endpoint,
                message: e.to_string(),
            })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| Error::Http {
            endpoint,
            message: format!("reading body: {e}"),
        })?;
        Ok((status, body))
    }
}

fn fail(
    endpoint: &'static str,
    reason: FailReason,
    last_response: Option<(u16, String)>,
    refresh_error: Option<xero_auth::Error>,
) -> Error {
    match reason {
        FailReason::ExpiredAfterRefresh => Error::Expired { endpoint },
        FailReason::RefreshFailed => match refresh_error {
            Some(e) => Error::Auth(e),
            None => Error::Expired { endpoint },
        },
        FailReason::Rejected => {
            let (status, body) = last_response.unwrap_or_default();
            Error::Rejected {
                endpoint,
                status,
                body,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use xero_auth::TokenRecord;

    const EXPIRED: &str = r#"{"Title":"Unauthorized","Status":401,"Detail":"TokenExpired: token expired at 10/06/2022 21:10:41"}"#;
    const NEW_TOKEN: &str = r#"{"access_token":"at_new","refresh_token":"rt_new","expires_in":1800,"token_type":"Bearer","scope":"openid"}"#;

    /// Drive the pure machine with a scripted sequence and record states.
    fn run(events: &[RequestEvent]) -> (Vec<RequestState>, RequestAction) {
        let mut state = RequestState::start();
        let mut states = vec![state];
        let mut action = RequestAction::Send;
        for event in events {
            let (next, next_action) = handle_event(state, *event);
            state = next;
            action = next_action;
            states.push(state);
        }
        (states, action)
    }

    #[test]
    fn success_first_try() {
        let (states, action) = run(&[RequestEvent::Responded(ResponseClass::Success)]);
        assert_eq!(states, vec![RequestState::start(), RequestState::Done]);
        assert_eq!(action, RequestAction::Deliver);
    }

    #[test]
    fn expiry_refresh_then_success() {
        let (states, action) = run(&[
            RequestEvent::Responded(ResponseClass::Expired),
            RequestEvent::RefreshSucceeded,
            RequestEvent::Responded(ResponseClass::Success),
        ]);
        let labels: Vec<String> = states.iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["ATTEMPT", "REFRESH", "ATTEMPT", "DONE"]);
        assert_eq!(action, RequestAction::Deliver);
    }

    #[test]
    fn second_expiry_is_fatal_without_refresh() {
        let (states, action) = run(&[
            RequestEvent::Responded(ResponseClass::Expired),
            RequestEvent::RefreshSucceeded,
            RequestEvent::Responded(ResponseClass::Expired),
        ]);
        assert_eq!(*states.last().unwrap(), RequestState::Fatal);
        assert_eq!(action, RequestAction::Fail(FailReason::ExpiredAfterRefresh));
        let refreshes = states
            .iter()
            .filter(|s| **s == RequestState::Refresh)
            .count();
        assert_eq!(refreshes, 1);
    }

    #[test]
    fn rejection_is_fatal_without_refresh() {
        let (states, action) = run(&[RequestEvent::Responded(ResponseClass::Rejected)]);
        assert_eq!(states, vec![RequestState::start(), RequestState::Fatal]);
        assert_eq!(action, RequestAction::Fail(FailReason::Rejected));
    }

    #[test]
    fn refresh_failure_is_fatal() {
        let (states, action) = run(&[
            RequestEvent::Responded(ResponseClass::Expired),
            RequestEvent::RefreshFailed,
        ]);
        assert_eq!(*states.last().unwrap(), RequestState::Fatal);
        assert_eq!(action, RequestAction::Fail(FailReason::RefreshFailed));
    }

    #[test]
    fn terminal_states_ignore_events() {
        for state in [RequestState::Done, RequestState::Fatal] {
            assert!(state.is_terminal());
            let (next, action) =
                handle_event(state, RequestEvent::Responded(ResponseClass::Success));
            assert_eq!(next, state);
            assert_eq!(action, RequestAction::None);
        }
    }

    #[test]
    fn attempt_ignores_refresh_events() {
        let (next, action) = handle_event(RequestState::start(), RequestEvent::RefreshSucceeded);
        assert_eq!(next, RequestState::start());
        assert_eq!(action, RequestAction::None);
    }

    struct Fixture {
        executor: Executor,
        session: Session,
        cache: TokenCache,
        _dir: tempfile::TempDir,
    }

    fn fixture(server: &mockito::Server) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        let tokens = TokenClient::new(
            reqwest::Client::new(),
            format!("{}/connect/token", server.url()),
            "client-123",
        );
        let executor = Executor::new(reqwest::Client::new(), tokens, cache.clone(), server.url());
        let session = Session::with_token(TokenRecord {
            access_token: "at_old".into(),
            refresh_token: "rt_old".into(),
            ..Default::default()
        });
        Fixture {
            executor,
            session,
            cache,
            _dir: dir,
        }
    }

    async fn refresh_mock(server: &mut mockito::Server, hits: usize) -> mockito::Mock {
        server
            .mock("POST", "/connect/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "rt_old".into()),
            ]))
            .with_status(200)
            .with_body(NEW_TOKEN)
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn execute_returns_body_on_first_success() {
        let mut server = mockito::Server::new_async().await;
        let api = server
            .mock("GET", "/connections")
            .match_header("authorization", "Bearer at_old")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        let refresh = refresh_mock(&mut server, 0).await;

        let mut fx = fixture(&server);
        let url = fx.executor.url("/connections");
        let body = fx
            .executor
            .execute(&mut fx.session, "connections", |http| http.get(&url))
            .await
            .unwrap();

        assert_eq!(body, "[]");
        api.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn execute_refreshes_once_and_retries_with_new_token() {
        let mut server = mockito::Server::new_async().await;
        let expired = server
            .mock("GET", "/connections")
            .match_header("authorization", "Bearer at_old")
            .with_status(401)
            .with_body(EXPIRED)
            .expect(1)
            .create_async()
            .await;
        let retried = server
            .mock("GET", "/connections")
            .match_header("authorization", "Bearer at_new")
            .with_status(200)
            .with_body(r#"[{"tenantId":"t1"}]"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = refresh_mock(&mut server, 1).await;

        let mut fx = fixture(&server);
        let url = fx.executor.url("/connections");
        let body = fx
            .executor
            .execute(&mut fx.session, "connections", |http| http.get(&url))
            .await
            .unwrap();

        assert_eq!(body, r#"[{"tenantId":"t1"}]"#);
        expired.assert_async().await;
        retried.assert_async().await;
        refresh.assert_async().await;
        assert_eq!(fx.session.access_token().unwrap(), "at_new");
        assert_eq!(fx.session.refresh_token(), "rt_new");
        let cached = fx.cache.load().await.unwrap().unwrap();
        assert_eq!(cached.access_token, "at_new");
    }

    #[tokio::test]
    async fn execute_second_expiry_is_fatal_after_one_refresh() {
        let mut server = mockito::Server::new_async().await;
        let _old = server
            .mock("GET", "/connections")
            .match_header("authorization", "Bearer at_old")
            .with_status(401)
            .with_body(EXPIRED)
            .create_async()
            .await;
        let still_expired = server
            .mock("GET", "/connections")
            .match_header("authorization", "Bearer at_new")
            .with_status(401)
            .with_body(EXPIRED)
            .expect(1)
            .create_async()
            .await;
        let refresh = refresh_mock(&mut server, 1).await;

        let mut fx = fixture(&server);
        let url = fx.executor.url("/connections");
        let result = fx
            .executor
            .execute(&mut fx.session, "connections", |http| http.get(&url))
            .await;

        assert!(
            matches!(
                result,
                Err(Error::Expired {
                    endpoint: "connections"
                })
            ),
            "got {result:?}"
        );
        still_expired.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn execute_unmarked_401_is_fatal_without_refresh() {
        let mut server = mockito::Server::new_async().await;
        let _api = server
            .mock("GET", "/connections")
            .with_status(401)
            .with_body(r#"{"Title":"Unauthorized","Detail":"AuthenticationUnsuccessful"}"#)
            .create_async()
            .await;
        let refresh = refresh_mock(&mut server, 0).await;

        let mut fx = fixture(&server);
        let url = fx.executor.url("/connections");
        let result = fx
            .executor
            .execute(&mut fx.session, "connections", |http| http.get(&url))
            .await;

        match result {
            Err(Error::Rejected { status, body, .. }) => {
                assert_eq!(status, 401);
                assert!(body.contains("AuthenticationUnsuccessful"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        refresh.assert_async().await;
        assert_eq!(fx.session.access_token().unwrap(), "at_old");
    }

    #[tokio::test]
    async fn execute_server_error_is_fatal_without_refresh() {
        let mut server = mockito::Server::new_async().await;
        let _api = server
            .mock("GET", "/connections")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        let refresh = refresh_mock(&mut server, 0).await;

        let mut fx = fixture(&server);
        let url = fx.executor.url("/connections");
        let result = fx
            .executor
            .execute(&mut fx.session, "connections", |http| http.get(&url))
            .await;

        assert!(
            matches!(result, Err(Error::Rejected { status: 500, .. })),
            "got {result:?}"
        );
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn execute_refresh_rejection_surfaces_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _api = server
            .mock("GET", "/connections")
            .with_status(401)
            .with_body(EXPIRED)
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/connect/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let mut fx = fixture(&server);
        let url = fx.executor.url("/connections");
        let result = fx
            .executor
            .execute(&mut fx.session, "connections", |http| http.get(&url))
            .await;

        assert!(
            matches!(
                result,
                Err(Error::Auth(xero_auth::Error::AuthRejected { status: 400, .. }))
            ),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn execute_without_token_is_not_authenticated() {
        let server = mockito::Server::new_async().await;
        let fx = fixture(&server);
        let mut session = Session::new();
        let url = fx.executor.url("/connections");
        let result = fx
            .executor
            .execute(&mut session, "connections", |http| http.get(&url))
            .await;
        assert!(matches!(result, Err(Error::NotAuthenticated)));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let tokens = TokenClient::new(reqwest::Client::new(), "http://t", "c");
        let executor = Executor::new(
            reqwest::Client::new(),
            tokens,
            TokenCache::new("unused.json"),
            "https://api.xero.com/",
        );
        assert_eq!(
            executor.url("/connections"),
            "https://api.xero.com/connections"
        );
    }
}
