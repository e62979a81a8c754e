//! API router.
//!
//! Returns a composable `Router` with every endpoint nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Session resolver → 3. Access log
//!
//! Routes that store guest state also carry the `ensure_session` route
//! layer, which issues a guest session on first use.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::Config;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected outside the session layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let session_header = HeaderName::from_static("x-session-token");
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, session_header.clone()])
        .expose_headers([session_header])
}

fn build_router(ctx: ApiContext) -> Router {
    let ensure_session = || axum::middleware::from_fn(middleware::session::ensure_session);
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    // Static segments such as `/news/categories` win over `/news/:id`.
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/hello", get(endpoints::health::hello))
        // Accounts
        .route("/auth/register", post(endpoints::auth::register))
        .route("/auth/login", post(endpoints::auth::login))
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/profile", get(endpoints::auth::profile))
        .route("/auth/proxy-image", get(endpoints::auth::proxy_image))
        // News
        .route("/news", get(endpoints::news::list).post(endpoints::news::create))
        .route(
            "/news/categories",
            get(endpoints::news::categories).post(endpoints::news::add_category),
        )
        .route(
            "/news/comments/:id",
            axum::routing::delete(endpoints::news::delete_comment),
        )
        .route(
            "/news/:id",
            get(endpoints::news::detail)
                .put(endpoints::news::update)
                .delete(endpoints::news::delete),
        )
        .route(
            "/news/:id/comments",
            get(endpoints::news::comments).post(endpoints::news::add_comment),
        )
        .route("/news/:id/react", post(endpoints::news::react))
        // Shop
        .route(
            "/shop/products",
            get(endpoints::shop::list_products).post(endpoints::shop::create_product),
        )
        .route(
            "/shop/products/:key",
            get(endpoints::shop::product_detail)
                .put(endpoints::shop::update_product)
                .delete(endpoints::shop::delete_product),
        )
        .route(
            "/shop/products/:key/reviews",
            get(endpoints::shop::list_reviews).post(endpoints::shop::create_review),
        )
        .route(
            "/shop/reviews/:id",
            axum::routing::delete(endpoints::shop::delete_review),
        )
        .route(
            "/shop/categories",
            get(endpoints::shop::list_categories).post(endpoints::shop::create_category),
        )
        .route(
            "/shop/categories/:id",
            put(endpoints::shop::update_category).delete(endpoints::shop::delete_category),
        )
        .route(
            "/shop/brands",
            get(endpoints::shop::list_brands).post(endpoints::shop::create_brand),
        )
        .route(
            "/shop/brands/:id",
            put(endpoints::shop::update_brand).delete(endpoints::shop::delete_brand),
        )
        // Cart & orders
        .route("/cart", get(endpoints::cart::summary))
        .route("/cart/add", post(endpoints::cart::add).route_layer(ensure_session()))
        .route("/cart/update", post(endpoints::cart::update))
        .route("/cart/remove", post(endpoints::cart::remove))
        .route("/cart/clear", post(endpoints::cart::clear))
        .route(
            "/cart/checkout",
            get(endpoints::cart::summary).post(endpoints::cart::checkout),
        )
        .route("/orders", get(endpoints::cart::orders))
        // Scoreboard
        .route(
            "/scoreboard",
            get(endpoints::scoreboard::list).post(endpoints::scoreboard::create),
        )
        .route("/scoreboard/board", get(endpoints::scoreboard::board))
        .route(
            "/scoreboard/:id",
            put(endpoints::scoreboard::update).delete(endpoints::scoreboard::delete),
        )
        // Search
        .route(
            "/search/results",
            get(endpoints::search::results).route_layer(ensure_session()),
        )
        .route("/search/recent", get(endpoints::search::recent))
        .route("/search/filter-options", get(endpoints::search::filter_options))
        .route("/search/overview", get(endpoints::search::overview))
        .route(
            "/search/preferences",
            get(endpoints::search::presets).post(endpoints::search::create_preset),
        )
        .route(
            "/search/preferences/:id",
            put(endpoints::search::update_preset).delete(endpoints::search::delete_preset),
        )
        .route("/search/analytics", get(endpoints::search::analytics))
        .with_state(ctx.clone());

    // Layers are applied from bottom (innermost) to top (outermost):
    //   CORS (outermost) → Extension → Session → Audit (innermost) → Handler
    // Extension must wrap the session layer so it can reach ApiContext.
    let cors = cors_layer(&ctx.core.config);
    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::session::resolve_session))
        .layer(axum::Extension(ctx))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::accounts::{self, PasswordHasher};
    use crate::api::types::SESSION_HEADER;
    use crate::db::repository::fixtures;

    fn test_core_state() -> Arc<CoreState> {
        let config = Config {
            password_iterations: 1_000,
            ..Config::default()
        };
        Arc::new(CoreState::in_memory(config).unwrap())
    }

    fn make_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri).header("Host", "api.test");
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(core: &Arc<CoreState>, req: Request<Body>) -> Response {
        api_router(core.clone()).oneshot(req).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_header(response: &Response) -> Option<String> {
        response
            .headers()
            .get(SESSION_HEADER)
            .map(|v| v.to_str().unwrap().to_string())
    }

    /// Register + login; returns the bearer token.
    async fn sign_in(core: &Arc<CoreState>, username: &str) -> String {
        let register = send(
            core,
            make_request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({"username": username, "password": "pw12345!", "password_confirm": "pw12345!"})),
            ),
        )
        .await;
        assert_eq!(register.status(), StatusCode::CREATED);

        let login = send(
            core,
            make_request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"username": username, "password": "pw12345!"})),
            ),
        )
        .await;
        assert_eq!(login.status(), StatusCode::OK);
        body_json(login).await["token"].as_str().unwrap().to_string()
    }

    fn promote(core: &Arc<CoreState>, username: &str) {
        let conn = core.db().unwrap();
        conn.execute("UPDATE users SET is_staff = 1 WHERE username = ?1", [username])
            .unwrap();
    }

    fn session_rows(core: &Arc<CoreState>) -> i64 {
        let conn = core.db().unwrap();
        conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0)).unwrap()
    }

    /// A guest token, obtained the way a client would: by running a search.
    async fn guest_token(core: &Arc<CoreState>) -> String {
        let response = send(core, make_request("GET", "/api/search/results?q=warmup", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        session_header(&response).expect("guest token")
    }

    #[tokio::test]
    async fn tokenless_reads_store_no_sessions() {
        let core = test_core_state();
        for _ in 0..50 {
            let response = send(&core, make_request("GET", "/api/health", None, None)).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(session_header(&response).is_none());
        }
        let cart = send(&core, make_request("GET", "/api/cart", Some("bogus"), None)).await;
        assert_eq!(cart.status(), StatusCode::OK);
        assert!(session_header(&cart).is_none());
        assert_eq!(body_json(cart).await["cart_count"], 0);
        let recent = send(&core, make_request("GET", "/api/search/recent", None, None)).await;
        assert_eq!(body_json(recent).await, json!([]));

        assert_eq!(session_rows(&core), 0);
    }

    #[tokio::test]
    async fn guest_session_issued_once_on_first_write() {
        let core = test_core_state();
        let token = guest_token(&core).await;
        assert_eq!(session_rows(&core), 1);

        // Reusing the guest token keeps the same session: no new header.
        let again = send(
            &core,
            make_request("GET", "/api/search/results?q=again", Some(&token), None),
        )
        .await;
        assert_eq!(again.status(), StatusCode::OK);
        assert!(session_header(&again).is_none());
        assert_eq!(session_rows(&core), 1);

        // A stale token is replaced by a fresh guest session.
        let stale = send(
            &core,
            make_request("GET", "/api/search/results?q=stale", Some("bogus"), None),
        )
        .await;
        assert!(session_header(&stale).is_some());
        assert_eq!(session_rows(&core), 2);
    }

    #[tokio::test]
    async fn hello_requires_login() {
        let core = test_core_state();
        let response = send(&core, make_request("GET", "/api/hello", None, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "AUTH_REQUIRED");

        let token = sign_in(&core, "ana").await;
        let response = send(&core, make_request("GET", "/api/hello", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Hello, ana!");
    }

    #[tokio::test]
    async fn register_validates_input() {
        let core = test_core_state();
        let mismatch = send(
            &core,
            make_request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({"username": "bo", "password": "a", "password_confirm": "b"})),
            ),
        )
        .await;
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(mismatch).await["error"]["message"], "Passwords do not match");

        sign_in(&core, "bo").await;
        let taken = send(
            &core,
            make_request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({"username": "bo", "password": "x", "password_confirm": "x"})),
            ),
        )
        .await;
        assert_eq!(taken.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_accepts_form_bodies() {
        let core = test_core_state();
        sign_in(&core, "cy").await;

        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from("username=cy&password=wrong"))
            .unwrap();
        let response = send(&core, req).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from("username=cy&password=pw12345%21"))
            .unwrap();
        let response = send(&core, req).await;
        assert_eq!(response.status(), StatusCode::OK);
        let token = session_header(&response).expect("login token header");
        assert_eq!(body_json(response).await["token"], token.as_str());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn password_checks_leave_the_database_free() {
        let core = test_core_state();
        {
            let conn = core.db().unwrap();
            let slow = PasswordHasher::new(crate::config::DEFAULT_PASSWORD_ITERATIONS);
            accounts::create_user(&conn, &slow, "slow", "pw12345!", "", false).unwrap();
        }

        let login_core = core.clone();
        let login = tokio::spawn(async move {
            send(
                &login_core,
                make_request(
                    "POST",
                    "/api/auth/login",
                    None,
                    Some(json!({"username": "slow", "password": "pw12345!"})),
                ),
            )
            .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let health = send(&core, make_request("GET", "/api/health", None, None)).await;
        assert_eq!(health.status(), StatusCode::OK);
        assert!(!login.is_finished(), "health check waited for the password check");
        assert_eq!(login.await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_invalidates_token() {
        let core = test_core_state();
        let token = sign_in(&core, "dee").await;

        let response = send(&core, make_request("POST", "/api/auth/logout", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["username"], "dee");

        let response = send(&core, make_request("GET", "/api/auth/profile", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn guest_cart_merges_on_login_and_checks_out() {
        let core = test_core_state();
        let product_id = {
            let conn = core.db().unwrap();
            let seller = fixtures::user(&conn, "seller", false);
            let category = fixtures::category(&conn, "Jerseys");
            fixtures::product(&conn, category.id, "Home Jersey", 45_000, 3, Some(seller.id)).id
        };
        sign_in(&core, "eve").await;

        // Guest adds two jerseys; the first write issues the session.
        let added = send(
            &core,
            make_request(
                "POST",
                "/api/cart/add",
                None,
                Some(json!({"product_id": product_id.to_string(), "qty": 2})),
            ),
        )
        .await;
        assert_eq!(added.status(), StatusCode::OK);
        let guest = session_header(&added).expect("guest token");
        assert_eq!(body_json(added).await["cart_count"], 2);

        // Logging in from the guest session carries the cart over.
        let login = send(
            &core,
            make_request(
                "POST",
                "/api/auth/login",
                Some(&guest),
                Some(json!({"username": "eve", "password": "pw12345!"})),
            ),
        )
        .await;
        let token = body_json(login).await["token"].as_str().unwrap().to_string();
        let cart = body_json(send(&core, make_request("GET", "/api/cart", Some(&token), None)).await).await;
        assert_eq!(cart["cart_count"], 2);
        assert_eq!(cart["total"], 900.0);

        let order = send(&core, make_request("POST", "/api/cart/checkout", Some(&token), None)).await;
        assert_eq!(order.status(), StatusCode::CREATED);
        let order = body_json(order).await;
        assert_eq!(order["status"], "PAID");
        assert_eq!(order["payment"]["provider"], "DUMMY");

        let orders = body_json(send(&core, make_request("GET", "/api/orders", Some(&token), None)).await).await;
        assert_eq!(orders.as_array().unwrap().len(), 1);

        let empty = send(&core, make_request("POST", "/api/cart/checkout", Some(&token), None)).await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cart_rejects_bad_product_ids() {
        let core = test_core_state();
        let response = send(
            &core,
            make_request("POST", "/api/cart/add", None, Some(json!({"product_id": "nope", "qty": 1}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let missing = uuid::Uuid::new_v4().to_string();
        let response = send(
            &core,
            make_request("POST", "/api/cart/add", None, Some(json!({"product_id": missing}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn news_writes_are_staff_only() {
        let core = test_core_state();
        let token = sign_in(&core, "fay").await;
        let article = json!({
            "title": "Derby day",
            "content": "Full report",
            "category_name": "Football",
            "is_published": true
        });

        let forbidden = send(&core, make_request("POST", "/api/news", Some(&token), Some(article.clone()))).await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        promote(&core, "fay");
        let created = send(&core, make_request("POST", "/api/news", Some(&token), Some(article))).await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let id = body_json(created).await["id"].as_str().unwrap().to_string();

        let detail = body_json(send(&core, make_request("GET", &format!("/api/news/{id}"), None, None)).await).await;
        assert_eq!(detail["title"], "Derby day");
        assert_eq!(detail["views"], 1);

        let categories = body_json(send(&core, make_request("GET", "/api/news/categories", None, None)).await).await;
        assert_eq!(categories[0]["name"], "Football");

        let reacted = send(
            &core,
            make_request("POST", &format!("/api/news/{id}/react"), Some(&token), Some(json!({"reaction": "like"}))),
        )
        .await;
        assert_eq!(body_json(reacted).await["user_reaction"], "like");

        let missing = send(&core, make_request("GET", "/api/news/not-a-uuid", None, None)).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scoreboard_board_and_staff_writes() {
        let core = test_core_state();
        let token = sign_in(&core, "gus").await;
        promote(&core, "gus");

        let created = send(
            &core,
            make_request(
                "POST",
                "/api/scoreboard",
                Some(&token),
                Some(json!({
                    "team1": "LAL", "team2": "BOS", "score1": 101, "score2": 99,
                    "sport": "NBA", "status": "live", "match_date": "2025-03-01T19:30"
                })),
            ),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let board = body_json(send(&core, make_request("GET", "/api/scoreboard/board", None, None)).await).await;
        assert_eq!(board["live"].as_array().unwrap().len(), 1);
        assert!(board["finished"].as_array().unwrap().is_empty());

        let filtered =
            body_json(send(&core, make_request("GET", "/api/scoreboard?sport=nfl", None, None)).await).await;
        assert!(filtered.as_array().unwrap().is_empty());

        let missing = send(&core, make_request("DELETE", "/api/scoreboard/999", Some(&token), None)).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_records_recent_queries_per_session() {
        let core = test_core_state();
        let guest = guest_token(&core).await;

        let results = send(
            &core,
            make_request("GET", "/api/search/results?q=jersey&search_in=products", Some(&guest), None),
        )
        .await;
        assert_eq!(results.status(), StatusCode::OK);

        let recent = body_json(send(&core, make_request("GET", "/api/search/recent", Some(&guest), None)).await).await;
        assert_eq!(recent[0]["query"], "jersey");

        let analytics = send(&core, make_request("GET", "/api/search/analytics", Some(&guest), None)).await;
        assert_eq!(analytics.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let core = test_core_state();
        let response = send(&core, make_request("GET", "/api/nowhere", None, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn cors_lists_configured_origins() {
        let config = Config {
            cors_origins: vec!["http://app.test".into(), "bad\norigin".into()],
            ..Config::default()
        };
        // Building must not panic on the invalid entry.
        let _ = cors_layer(&config);
        let _ = cors_layer(&Config::default());
    }
}
