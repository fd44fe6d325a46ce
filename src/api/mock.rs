//! Scripted in-memory GitHub API for testing
//!
//! Responses are matched against the exact [`ApiRequest`], or against an
//! operation name for blanket rules. One-shot responses are consumed before
//! persistent ones. Every dispatch is logged together with the token it used.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{ApiError, ApiRequest, Credential, GithubApi};

type Reply = Result<serde_json::Value, ApiError>;

#[derive(Debug, Clone)]
enum Matcher {
    Exact(ApiRequest),
    Operation(&'static str),
}

impl Matcher {
    fn matches(&self, request: &ApiRequest) -> bool {
        match self {
            Matcher::Exact(expected) => expected == request,
            Matcher::Operation(name) => *name == request.name(),
        }
    }
}

#[derive(Debug)]
struct Route {
    matcher: Matcher,
    once: VecDeque<Reply>,
    always: Option<Reply>,
}

#[derive(Debug, Default)]
struct MockState {
    routes: Vec<Route>,
    calls: Vec<ApiRequest>,
    tokens: Vec<String>,
    delay: Option<Duration>,
}

/// Mock GitHub transport
///
/// # Example
///
/// ```rust
/// use scm_github::api::{ApiRequest, Credential, GithubApi, MockApi};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() {
///     let api = MockApi::new();
///     api.on(ApiRequest::GetUser { username: "octocat".into() }, json!({ "login": "octocat" }));
///
///     let user = api
///         .dispatch(&Credential::new("t"), &ApiRequest::GetUser { username: "octocat".into() })
///         .await
///         .unwrap();
///     assert_eq!(user["login"], "octocat");
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    /// Create a mock with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `request` with `body`
    pub fn on(&self, request: ApiRequest, body: serde_json::Value) {
        self.set_always(Matcher::Exact(request), Ok(body));
    }

    /// Always fail `request` with `error`
    pub fn fail(&self, request: ApiRequest, error: ApiError) {
        self.set_always(Matcher::Exact(request), Err(error));
    }

    /// Answer the next matching dispatch only
    pub fn once(&self, request: ApiRequest, reply: Result<serde_json::Value, ApiError>) {
        let matcher = Matcher::Exact(request);
        self.route(matcher).once.push_back(reply);
    }

    /// Always fail every request of an operation, e.g. `"repos.get"`
    pub fn fail_operation(&self, operation: &'static str, error: ApiError) {
        self.set_always(Matcher::Operation(operation), Err(error));
    }

    /// Fail the next dispatch of an operation only
    pub fn fail_operation_once(&self, operation: &'static str, error: ApiError) {
        self.route(Matcher::Operation(operation))
            .once
            .push_back(Err(error));
    }

    /// Sleep this long before answering each dispatch
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// Requests dispatched so far, in order
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Dispatches of a given operation
    pub fn calls_to(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.name() == operation)
            .count()
    }

    /// Tokens used by each dispatch, in order
    pub fn tokens(&self) -> Vec<String> {
        self.lock().tokens.clone()
    }

    /// Forget the call log, keeping scripted responses
    pub fn clear_calls(&self) {
        let mut state = self.lock();
        state.calls.clear();
        state.tokens.clear();
    }

    fn set_always(&self, matcher: Matcher, reply: Reply) {
        self.route(matcher).always = Some(reply);
    }

    fn route(&self, matcher: Matcher) -> RouteGuard<'_> {
        let mut state = self.lock();
        let index = state
            .routes
            .iter()
            .position(|route| same_matcher(&route.matcher, &matcher));
        let index = match index {
            Some(index) => index,
            None => {
                state.routes.push(Route {
                    matcher,
                    once: VecDeque::new(),
                    always: None,
                });
                state.routes.len() - 1
            }
        };
        RouteGuard { state, index }
    }

    fn reply(&self, credential: &Credential, request: &ApiRequest) -> (Reply, Option<Duration>) {
        let mut state = self.lock();
        state.calls.push(request.clone());
        state.tokens.push(credential.expose().to_string());
        let delay = state.delay;

        // Exact routes take precedence over operation-wide ones
        let mut ordered: Vec<usize> = (0..state.routes.len()).collect();
        ordered.sort_by_key(|&i| matches!(state.routes[i].matcher, Matcher::Operation(_)));

        for i in ordered {
            let route = &mut state.routes[i];
            if !route.matcher.matches(request) {
                continue;
            }
            if let Some(reply) = route.once.pop_front() {
                return (reply, delay);
            }
            if let Some(reply) = &route.always {
                return (reply.clone(), delay);
            }
        }

        let missing = Err(ApiError::Status {
            status: 404,
            message: format!("no mock response for {:?}", request),
        });
        (missing, delay)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn same_matcher(a: &Matcher, b: &Matcher) -> bool {
    match (a, b) {
        (Matcher::Exact(x), Matcher::Exact(y)) => x == y,
        (Matcher::Operation(x), Matcher::Operation(y)) => x == y,
        _ => false,
    }
}

struct RouteGuard<'a> {
    state: MutexGuard<'a, MockState>,
    index: usize,
}

impl std::ops::Deref for RouteGuard<'_> {
    type Target = Route;

    fn deref(&self) -> &Route {
        &self.state.routes[self.index]
    }
}

impl std::ops::DerefMut for RouteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Route {
        &mut self.state.routes[self.index]
    }
}

#[async_trait]
impl GithubApi for MockApi {
    async fn dispatch(
        &self,
        credential: &Credential,
        request: &ApiRequest,
    ) -> Result<serde_json::Value, ApiError> {
        let (reply, delay) = self.reply(credential, request);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}
