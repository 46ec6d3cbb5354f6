//! HTTP 网关集成测试：在本地端口上启动 axum 假后端

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use vidtube_sdk::{
    ApiHttpClient, AuthSession, CommentId, EventManager, HttpClientConfig, HttpInteractionGateway,
    InteractionGateway, PollConfig, SDKEvent, SessionContext, UserProfile, VidtubeConfig,
    VidtubeSDK, VidtubeSDKError, VideoQuery, VideoReaction,
};

const GOOD_TOKEN: &str = "good-token";

#[derive(Clone)]
struct FakeBackend {
    comments: Arc<Mutex<Vec<Value>>>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            comments: Arc::new(Mutex::new(vec![
                json!({
                    "_id": "c1",
                    "text": "First",
                    "videoId": "v1",
                    "author": { "_id": "u2", "username": "bob" },
                    "createdAt": "2024-01-01T00:00:00Z",
                    "likes": ["u3"]
                }),
                json!({
                    "id": "c2",
                    "content": "Second",
                    "author": "u3",
                    "username": "carol",
                    "timestamp": 1_704_067_300_000_i64,
                    "likeCount": 4
                }),
            ])),
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", GOOD_TOKEN))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "success": false, "message": "Token expired" })))
        .into_response()
}

async fn list_comments(State(backend): State<FakeBackend>, Path(video_id): Path<String>) -> Response {
    if video_id == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream down").into_response();
    }
    let data = backend.comments.lock().clone();
    Json(json!({ "success": true, "data": data })).into_response()
}

async fn create_comment(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let comment = json!({
        "_id": "c9",
        "text": body["text"],
        "videoId": body["videoId"],
        "author": { "_id": "u1", "username": "alice" },
        "createdAt": "2024-06-01T12:00:00Z",
        "likes": []
    });
    backend.comments.lock().insert(0, comment.clone());
    (StatusCode::CREATED, Json(json!({ "success": true, "data": comment }))).into_response()
}

async fn update_comment(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "Comment not found" })))
            .into_response();
    }
    Json(json!({
        "success": true,
        "data": {
            "_id": id,
            "text": body["text"],
            "videoId": "v1",
            "author": { "_id": "u1", "username": "alice" },
            "isEdited": true
        }
    }))
    .into_response()
}

async fn delete_comment(headers: HeaderMap, Path(_id): Path<String>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    StatusCode::OK.into_response()
}

async fn like_comment(headers: HeaderMap, Path(_id): Path<String>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "success": true, "data": { "likeCount": 5, "isLiked": true } })).into_response()
}

async fn like_video(headers: HeaderMap, Path(_id): Path<String>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "success": true,
        "data": { "likes": 10, "dislikes": 1, "isLiked": true, "isDisliked": false }
    }))
    .into_response()
}

async fn video_detail(Path(id): Path<String>) -> Response {
    if id == "gone" {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "Video not found" }))).into_response();
    }
    Json(json!({
        "success": true,
        "data": {
            "_id": id,
            "title": "Demo",
            "views": 99,
            "likes": ["u1", "u2", "u3"],
            "dislikes": 2
        }
    }))
    .into_response()
}

async fn list_videos(Query(params): Query<HashMap<String, String>>) -> Response {
    let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    Json(json!({
        "videos": [
            { "_id": format!("p{}-a", page), "title": "A", "uploader": { "username": "ferris" }, "views": 10 },
            { "_id": format!("p{}-b", page), "uploader": "crabby" }
        ],
        "hasMore": page < 2
    }))
    .into_response()
}

async fn search_videos(Query(params): Query<HashMap<String, String>>) -> Response {
    let keyword = params.get("q").cloned().unwrap_or_default();
    Json(json!({
        "success": true,
        "data": {
            "videos": [
                { "_id": "s1", "title": format!("Result for {}", keyword), "category": params.get("category") }
            ],
            "hasMore": true
        }
    }))
    .into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] != "secret123" {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": "Invalid credentials" })))
            .into_response();
    }
    Json(json!({
        "token": GOOD_TOKEN,
        "user": { "_id": "u1", "username": "alice", "email": body["email"] }
    }))
    .into_response()
}

async fn spawn_backend(backend: FakeBackend) -> String {
    let api = Router::new()
        .route("/comments/video/:video_id", get(list_comments))
        .route("/comments", post(create_comment))
        .route("/comments/:id", put(update_comment).delete(delete_comment))
        .route("/comments/:id/like", post(like_comment))
        .route("/videos", get(list_videos))
        .route("/videos/search", get(search_videos))
        .route("/videos/:id", get(video_detail))
        .route("/videos/:id/like", post(like_video))
        .route("/auth/login", post(login))
        .with_state(backend);
    let app = Router::new().nest("/api", api);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

async fn gateway_with_token(
    base_url: &str,
    token: Option<&str>,
) -> (HttpInteractionGateway, Arc<SessionContext>, Arc<EventManager>) {
    let events = Arc::new(EventManager::new(32));
    let session = Arc::new(SessionContext::ephemeral(events.clone()));
    if let Some(token) = token {
        session
            .establish(AuthSession {
                user: UserProfile {
                    id: "u1".into(),
                    username: "alice".into(),
                    email: "alice@example.com".into(),
                    avatar: None,
                },
                token: token.into(),
            })
            .await
            .unwrap();
    }
    let http = ApiHttpClient::new(&HttpClientConfig::default(), base_url, session.clone()).unwrap();
    (HttpInteractionGateway::new(http), session, events)
}

#[tokio::test]
async fn test_fetch_normalizes_mixed_shapes() {
    let base = spawn_backend(FakeBackend::new()).await;
    let (gateway, _, _) = gateway_with_token(&base, None).await;

    let comments = gateway.fetch_comments("v1").await;
    assert_eq!(comments.len(), 2);

    assert_eq!(comments[0].id, CommentId::permanent("c1"));
    assert_eq!(comments[0].body, "First");
    assert_eq!(comments[0].author.display_name, "bob");
    assert_eq!(comments[0].like_count, 1);

    assert_eq!(comments[1].id, CommentId::permanent("c2"));
    assert_eq!(comments[1].body, "Second");
    assert_eq!(comments[1].video_id, "v1");
    assert_eq!(comments[1].author.id, "u3");
    assert_eq!(comments[1].author.display_name, "carol");
    assert_eq!(comments[1].like_count, 4);
    assert_eq!(comments[1].created_at.timestamp_millis(), 1_704_067_300_000);
}

#[tokio::test]
async fn test_fetch_degrades_to_empty() {
    let base = spawn_backend(FakeBackend::new()).await;
    let (gateway, _, _) = gateway_with_token(&base, None).await;
    assert!(gateway.fetch_comments("broken").await.is_empty());

    let (offline, _, _) = gateway_with_token("http://127.0.0.1:9/api", None).await;
    assert!(offline.fetch_comments("v1").await.is_empty());
}

#[tokio::test]
async fn test_write_operations() {
    let base = spawn_backend(FakeBackend::new()).await;
    let (gateway, _, _) = gateway_with_token(&base, Some(GOOD_TOKEN)).await;

    let created = gateway.create_comment("v1", "Hello").await.unwrap();
    assert_eq!(created.id, CommentId::permanent("c9"));
    assert_eq!(created.body, "Hello");
    assert_eq!(created.video_id, "v1");
    assert_eq!(gateway.fetch_comments("v1").await.len(), 3);

    let updated = gateway.update_comment("c9", "Updated").await.unwrap();
    assert_eq!(updated.body, "Updated");
    assert!(updated.edited);

    let like = gateway.like_comment("c1").await.unwrap();
    assert_eq!(like.like_count, 5);
    assert!(like.is_liked);

    gateway.delete_comment("c9").await.unwrap();

    let reactions = gateway
        .react_to_video("v1", VideoReaction::Like)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reactions.like_count, 10);
    assert_eq!(reactions.dislike_count, 1);
    assert!(reactions.liked);
}

#[tokio::test]
async fn test_not_found_is_classified() {
    let base = spawn_backend(FakeBackend::new()).await;
    let (gateway, _, _) = gateway_with_token(&base, Some(GOOD_TOKEN)).await;

    let result = gateway.update_comment("missing", "x").await;
    assert!(matches!(result, Err(VidtubeSDKError::NotFound(_))));
}

#[tokio::test]
async fn test_ids_are_sent_as_single_path_segment() {
    let base = spawn_backend(FakeBackend::new()).await;
    let (gateway, _, _) = gateway_with_token(&base, Some(GOOD_TOKEN)).await;

    let updated = gateway.update_comment("odd/id?x=1", "Updated").await.unwrap();
    assert_eq!(updated.id, CommentId::permanent("odd/id?x=1"));
    assert_eq!(updated.body, "Updated");
}

#[tokio::test]
async fn test_video_detail_and_browse() {
    let base = spawn_backend(FakeBackend::new()).await;
    let (gateway, _, _) = gateway_with_token(&base, Some(GOOD_TOKEN)).await;

    let reactions = gateway.fetch_video_reactions("v1").await.unwrap();
    assert!(reactions.liked);
    assert!(!reactions.disliked);
    assert_eq!(reactions.like_count, 3);
    assert_eq!(reactions.dislike_count, 2);
    assert_eq!(gateway.fetch_video_reactions("gone").await, None);

    let first = gateway.list_videos(&VideoQuery::page(1)).await.unwrap();
    assert!(first.has_more);
    assert_eq!(first.videos.len(), 2);
    assert_eq!(first.videos[0].id, "p1-a");
    assert_eq!(first.videos[0].uploader, "ferris");
    assert_eq!(first.videos[1].uploader, "crabby");

    let second = gateway.list_videos(&VideoQuery::page(2)).await.unwrap();
    assert!(!second.has_more);
    assert_eq!(second.videos[0].id, "p2-a");

    let filters = VideoQuery {
        category: Some("tech".into()),
        ..VideoQuery::default()
    };
    let found = gateway.search_videos("rust & tokio", &filters).await.unwrap();
    assert!(!found.has_more);
    assert_eq!(found.videos.len(), 1);
    assert_eq!(found.videos[0].title, "Result for rust & tokio");
    assert_eq!(found.videos[0].category.as_deref(), Some("tech"));

    assert!(matches!(
        gateway.search_videos("  ", &filters).await,
        Err(VidtubeSDKError::Validation(_))
    ));
}

#[tokio::test]
async fn test_unauthorized_forces_logout() {
    let base = spawn_backend(FakeBackend::new()).await;
    let (gateway, session, events) = gateway_with_token(&base, Some("expired-token")).await;
    let mut rx = events.subscribe();

    let result = gateway.create_comment("v1", "Hello").await;
    match result {
        Err(VidtubeSDKError::Auth(message)) => assert_eq!(message, "Token expired"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!session.is_authenticated());
    assert!(matches!(rx.recv().await.unwrap(), SDKEvent::ForcedLogout { status: 401, .. }));

    // 会话已清空，后续写操作在本地直接失败
    assert!(matches!(
        gateway.like_comment("c1").await,
        Err(VidtubeSDKError::Auth(_))
    ));
}

#[tokio::test]
async fn test_sdk_end_to_end() {
    let base = spawn_backend(FakeBackend::new()).await;
    let config = VidtubeConfig::builder()
        .api_base_url(base)
        .persist_session(false)
        .poll_config(PollConfig {
            enabled: false,
            ..PollConfig::default()
        })
        .build();
    let sdk = VidtubeSDK::initialize(config).await.unwrap();

    let wrong = sdk.login("alice@example.com", "wrong-password").await;
    match wrong {
        Err(VidtubeSDKError::Validation(message)) => assert_eq!(message, "Invalid credentials"),
        other => panic!("unexpected result: {:?}", other),
    }

    let session = sdk.login("alice@example.com", "secret123").await.unwrap();
    assert_eq!(session.user.id, "u1");
    assert!(sdk.is_authenticated());

    let view = sdk.open_video("v1").await.unwrap();
    assert_eq!(view.comment_count(), 2);
    assert_eq!(view.reactions().like_count, 3);
    assert!(view.reactions().liked);

    let page = sdk.list_videos(&VideoQuery::default()).await.unwrap();
    assert_eq!(page.videos.len(), 2);

    let outcome = view.submit_comment("Hello").await.unwrap();
    let confirmed = outcome.committed().unwrap();
    assert_eq!(confirmed.id, CommentId::permanent("c9"));
    assert_eq!(view.comment_count(), 3);
    assert_eq!(view.comments()[0].body, "Hello");

    assert_eq!(view.refresh_now().await, Some(3));
    assert!(view.comments().iter().all(|c| !c.id.is_temporary()));

    view.unmount();
    sdk.logout().await.unwrap();
    assert!(!sdk.is_authenticated());
    sdk.shutdown().await.unwrap();
}
