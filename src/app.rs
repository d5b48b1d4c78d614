use std::net::SocketAddr;
use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::state::AppState;
use crate::{auth, invitations, likes, matches, toasts, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest("/api",
              Router::new()
                  .merge(auth::router())
                  .merge(users::router())
                  .merge(invitations::router())
                  .merge(likes::router())
                  .merge(matches::router())
                  .merge(toasts::router())
                  .route("/health", get(|| async { "ok" }))
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use crate::store::{MatchStore, MemoryStore};
    use crate::users::repo_types::{Profile, Role};
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct Harness {
        app: Router,
        keys: JwtKeys,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let state = AppState::fake_with_store(store.clone());
            let keys = JwtKeys::from_ref(&state);
            Self {
                app: build_app(state),
                keys,
                store,
            }
        }

        fn token(&self, user_id: Uuid, role: Role) -> String {
            self.keys.sign_access(user_id, role).unwrap()
        }

        async fn call(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<serde_json::Value>,
        ) -> (StatusCode, serde_json::Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(t) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
            }
            let req = match body {
                Some(json) => req
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
                None => req.body(Body::empty()).unwrap(),
            };

            let res = self.app.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let bytes = res.into_body().collect().await.unwrap().to_bytes();
            let json = if bytes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
            };
            (status, json)
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = Harness::new();
        let (status, _) = h.call("GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn like_requires_a_token() {
        let h = Harness::new();
        let body = serde_json::json!({ "target_user_id": Uuid::new_v4() });
        let (status, json) = h.call("POST", "/api/matches/like", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn mutual_like_then_toast_flow() {
        let h = Harness::new();
        let a = h.store.add_user(Profile::default()).unwrap().id;
        let b = h
            .store
            .add_user(Profile {
                name: Some("Meera".into()),
                ..Profile::default()
            })
            .unwrap()
            .id;
        let (ta, tb) = (h.token(a, Role::User), h.token(b, Role::User));

        let (status, json) = h
            .call(
                "POST",
                "/api/matches/like",
                Some(&ta),
                Some(serde_json::json!({ "target_user_id": b })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["is_mutual_match"], false);

        let (status, json) = h
            .call(
                "POST",
                "/api/matches/like",
                Some(&tb),
                Some(serde_json::json!({ "target_user_id": a, "action": "like" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["is_mutual_match"], true);
        let conn_id = json["connection_id"].as_str().unwrap().to_string();

        let (status, json) = h.call("GET", "/api/matches/mutual", Some(&ta), None).await;
        assert_eq!(status, StatusCode::OK);
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["user_id"], b.to_string());
        assert_eq!(items[0]["name"], "Meera");
        assert_eq!(items[0]["toast_pending"], true);

        let toast_uri = format!("/api/connections/{conn_id}/toast");
        let seen_uri = format!("/api/connections/{conn_id}/toast-seen");

        let (_, json) = h.call("GET", &toast_uri, Some(&ta), None).await;
        assert_eq!(json["should_show"], true);

        let (status, _) = h.call("POST", &seen_uri, Some(&ta), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = h.call("POST", &seen_uri, Some(&ta), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, json) = h.call("GET", &toast_uri, Some(&ta), None).await;
        assert_eq!(json["should_show"], false);
        // the other side still has its toast pending
        let (_, json) = h.call("GET", &toast_uri, Some(&tb), None).await;
        assert_eq!(json["should_show"], true);
    }

    #[tokio::test]
    async fn self_like_and_unknown_target_are_rejected() {
        let h = Harness::new();
        let a = h.store.add_user(Profile::default()).unwrap().id;
        let ta = h.token(a, Role::User);

        let (status, _) = h
            .call(
                "POST",
                "/api/matches/like",
                Some(&ta),
                Some(serde_json::json!({ "target_user_id": a })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = h
            .call(
                "POST",
                "/api/matches/like",
                Some(&ta),
                Some(serde_json::json!({ "target_user_id": Uuid::new_v4() })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "profile not found");
    }

    #[tokio::test]
    async fn stranger_cannot_touch_a_connection_toast() {
        let h = Harness::new();
        let a = h.store.add_user(Profile::default()).unwrap().id;
        let b = h.store.add_user(Profile::default()).unwrap().id;
        let pair = crate::matches::repo_types::UserPair::new(a, b).unwrap();
        h.store.upsert_connection(&pair, a).await.unwrap();

        let stranger = h.token(Uuid::new_v4(), Role::User);
        let uri = format!("/api/connections/{}/toast-seen", pair.connection_id());
        let (status, _) = h.call("POST", &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reconcile_is_admin_only() {
        let h = Harness::new();
        let user = h.token(Uuid::new_v4(), Role::User);
        let admin = h.token(Uuid::new_v4(), Role::Admin);

        let (status, _) = h.call("POST", "/api/admin/reconcile", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = h.call("POST", "/api/admin/reconcile", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["pairs_fixed"], 0);
        assert_eq!(json["connections_created"], 0);
        assert_eq!(json["fallbacks_purged"], 0);
    }

    #[tokio::test]
    async fn paused_user_is_locked_out_of_liking() {
        let h = Harness::new();
        let a = h.store.add_user(Profile::default()).unwrap().id;
        let b = h.store.add_user(Profile::default()).unwrap().id;
        let admin = h.token(Uuid::new_v4(), Role::Admin);

        let uri = format!("/api/admin/users/{a}/pause");
        let (status, json) = h.call("POST", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "paused");
        // already paused
        let (status, _) = h.call("POST", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = h
            .call(
                "POST",
                "/api/matches/like",
                Some(&h.token(a, Role::User)),
                Some(serde_json::json!({ "target_user_id": b })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
