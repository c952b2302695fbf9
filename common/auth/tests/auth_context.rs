use std::sync::Arc;

use axum::body::Body;
use axum::extract::FromRef;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use common_auth::{AuthContext, JwtConfig, JwtVerifier, PhoneOwner};
use tower::ServiceExt;

#[derive(Clone)]
struct TestState {
    verifier: Arc<JwtVerifier>,
}

impl FromRef<TestState> for Arc<JwtVerifier> {
    fn from_ref(state: &TestState) -> Self {
        state.verifier.clone()
    }
}

async fn whoami(auth: AuthContext) -> String {
    auth.phone().to_string()
}

async fn owner(PhoneOwner(phone): PhoneOwner) -> String {
    phone
}

fn app(verifier: Arc<JwtVerifier>) -> Router {
    Router::new()
        .route("/whoami", get(whoami))
        .route("/owner/:phone", get(owner))
        .with_state(TestState { verifier })
}

#[tokio::test]
async fn bearer_token_resolves_phone() {
    let verifier = Arc::new(JwtVerifier::new(JwtConfig::new("s3cret", "issuer")));
    let issued = verifier.issue("9000000001").unwrap();

    let resp = app(verifier)
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header("authorization", format!("Bearer {}", issued.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"9000000001");
}

#[tokio::test]
async fn missing_header_is_unauthorized() {
    let verifier = Arc::new(JwtVerifier::new(JwtConfig::new("s3cret", "issuer")));
    let resp = app(verifier)
        .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "AUTH_HEADER");
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let verifier = Arc::new(JwtVerifier::new(JwtConfig::new("s3cret", "issuer")));
    let resp = app(verifier)
        .oneshot(
            Request::builder()
                .uri("/whoami")
                .header("authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "AUTH_TOKEN");
}

async fn get_owner(verifier: Arc<JwtVerifier>, uri: &str, token: &str) -> axum::response::Response {
    app(verifier)
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn path_phone_must_match_token() {
    let verifier = Arc::new(JwtVerifier::new(JwtConfig::new("s3cret", "issuer")));
    let token = verifier.issue("9000000001").unwrap().token;

    let resp = get_owner(verifier.clone(), "/owner/90000%2000001", &token).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"9000000001");

    let resp = get_owner(verifier, "/owner/9000000002", &token).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "phone_mismatch");
}

#[tokio::test]
async fn path_phone_needs_a_token_first() {
    let verifier = Arc::new(JwtVerifier::new(JwtConfig::new("s3cret", "issuer")));
    let resp = app(verifier)
        .oneshot(Request::builder().uri("/owner/9000000001").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
