use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bookstore_app::modules::books::{models::NewBook, store};
use bookstore_app::Prepared;
use bookstore_authz::users::{self, NewUser};
use bookstore_kernel::settings::{DatabaseSettings, Settings};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tower::ServiceExt;

struct TestApp {
    prepared: Prepared,
    router: Router,
    book_id: i64,
}

impl TestApp {
    /// Two users, one book, and one review of that book by `testuser`.
    async fn new() -> Self {
        Self::with_settings(Settings {
            database: DatabaseSettings::in_memory(),
            ..Settings::default()
        })
        .await
    }

    async fn with_settings(settings: Settings) -> Self {
        let prepared = bookstore_app::prepare(settings).await.unwrap();
        let db = &prepared.state.db;

        let user = users::create_user(db, new_user("testuser", "testpassword"))
            .await
            .unwrap();
        users::create_user(db, new_user("testuser2", "testpassword2"))
            .await
            .unwrap();

        let book = store::create_book(
            db,
            &NewBook {
                title: "Test Book".to_string(),
                author: "Author".to_string(),
                description: "Description".to_string(),
                file: None,
                publish_date: OffsetDateTime::now_utc(),
            },
        )
        .await
        .unwrap();
        store::insert_review(db, user.id, book.id, "Great book!", 5)
            .await
            .unwrap();

        let router = prepared.router();
        Self {
            prepared,
            router,
            book_id: book.id,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::get(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn access_token(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/user/login/",
                json!({"username": username, "password": password}),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["access"].as_str().unwrap().to_string()
    }

    async fn review_count(&self) -> i64 {
        store::count_reviews(&self.prepared.state.db).await.unwrap()
    }
}

fn new_user(username: &str, password: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: String::new(),
        password: password.to_string(),
    }
}

fn error_fields(body: &Value) -> Vec<String> {
    body["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|detail| detail["field"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn register_creates_exactly_one_user() {
    let app = TestApp::new().await;
    let before = users::count_users(&app.prepared.state.db).await.unwrap();

    let (status, body) = app
        .post(
            "/user/register/",
            json!({
                "username": "Abdelawal",
                "email": "abd.elawal@example.com",
                "password": "testpassw0rd"
            }),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "Abdelawal");
    assert_eq!(body["email"], "abd.elawal@example.com");
    assert!(body.get("password").is_none());
    assert_eq!(
        users::count_users(&app.prepared.state.db).await.unwrap(),
        before + 1
    );
    assert!(users::find_by_username(&app.prepared.state.db, "Abdelawal")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn register_with_missing_fields_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post("/user/register/", json!({"username": "Abdelawal"}), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["password".to_string()]);
}

#[tokio::test]
async fn register_without_email() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/user/register/",
            json!({"username": "Mohammed", "password": "passw0rd"}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "");

    let (status, _) = app
        .post(
            "/user/register/",
            json!({"username": "Mohammed2", "email": "", "password": "passw0rd"}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(
            "/user/register/",
            json!({"username": "Mohammed3", "email": "nope", "password": "passw0rd"}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["email".to_string()]);
}

#[tokio::test]
async fn register_with_taken_username_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/user/register/",
            json!({"username": "testuser", "email": "t@example.com", "password": "x"}),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["username".to_string()]);
}

#[tokio::test]
async fn login_with_invalid_credentials_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, _) = app
        .post(
            "/user/login/",
            json!({"username": "testuser", "password": "wr0ng"}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refreshed_access_token_can_browse_books() {
    let app = TestApp::new().await;
    let (_, pair) = app
        .post(
            "/user/login/",
            json!({"username": "testuser", "password": "testpassword"}),
            None,
        )
        .await;

    let (status, body) = app
        .post(
            "/user/token/refresh/",
            json!({"refresh": pair["refresh"]}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/books/", body["access"].as_str()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn view_books_unauthenticated() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/books/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "not_authenticated");

    let (status, _) = app.get(&format!("/books/{}/", app.book_id), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post(
            &format!("/books/{}/add_review/", app.book_id),
            json!({"review_text": "x", "rating": 3}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/books/", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "token_not_valid");
}

#[tokio::test]
async fn view_books_authenticated() {
    let app = TestApp::new().await;
    let token = app.access_token("testuser", "testpassword").await;

    let (status, body) = app.get("/books/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let books = body.as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["title"], "Test Book");
    assert!(books[0]["file"].is_null());
    assert_eq!(books[0]["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(books[0]["reviews"][0]["review_text"], "Great book!");
}

#[tokio::test]
async fn view_book_detail_authenticated() {
    let app = TestApp::new().await;
    let token = app.access_token("testuser", "testpassword").await;

    let (status, body) = app
        .get(&format!("/books/{}/", app.book_id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Test Book");
    assert_eq!(body["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(body["reviews"][0]["review_text"], "Great book!");
}

#[tokio::test]
async fn missing_book_is_not_found() {
    let app = TestApp::new().await;
    let token = app.access_token("testuser", "testpassword").await;

    let (status, _) = app.get("/books/999/", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/books/abc/", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/books/999/add_review/",
            json!({"review_text": "x", "rating": 9}),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn add_review() {
    let app = TestApp::new().await;
    let token = app.access_token("testuser2", "testpassword2").await;
    let caller = users::find_by_username(&app.prepared.state.db, "testuser2")
        .await
        .unwrap()
        .unwrap();

    let (status, body) = app
        .post(
            &format!("/books/{}/add_review/", app.book_id),
            json!({"review_text": "Awesome book!", "rating": 4, "user": 1}),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["review_text"], "Awesome book!");
    assert_eq!(body["rating"], 4);
    assert_eq!(body["user"], caller.id);
    assert_eq!(body["book"], app.book_id);
    assert_eq!(app.review_count().await, 2);

    let reviews = store::reviews_for_book(&app.prepared.state.db, app.book_id)
        .await
        .unwrap();
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[1].rating, 4);
}

#[tokio::test]
async fn duplicate_review() {
    let app = TestApp::new().await;
    let token = app.access_token("testuser", "testpassword").await;

    let (status, body) = app
        .post(
            &format!("/books/{}/add_review/", app.book_id),
            json!({"review_text": "Duplicate review", "rating": 3}),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["non_field_errors".to_string()]);
    assert_eq!(app.review_count().await, 1);
}

#[tokio::test]
async fn duplicate_review_is_rejected_by_storage() {
    let app = TestApp::new().await;
    let user = users::find_by_username(&app.prepared.state.db, "testuser")
        .await
        .unwrap()
        .unwrap();

    let result =
        store::insert_review(&app.prepared.state.db, user.id, app.book_id, "again", 2).await;
    assert!(matches!(result, Err(store::ReviewInsertError::Duplicate)));
    assert_eq!(app.review_count().await, 1);
}

#[tokio::test]
async fn review_rating_validation() {
    let app = TestApp::new().await;
    let token = app.access_token("testuser2", "testpassword2").await;

    for rating in [
        json!(6),
        json!(-1),
        json!(6.0),
        json!(1e20),
        json!(4.5),
        json!("seven"),
    ] {
        let (status, body) = app
            .post(
                &format!("/books/{}/add_review/", app.book_id),
                json!({"review_text": "Invalid rating", "rating": rating}),
                Some(&token),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_fields(&body), vec!["rating".to_string()]);
    }
    assert_eq!(app.review_count().await, 1);
}

#[tokio::test]
async fn integral_rating_forms_are_accepted() {
    let app = TestApp::new().await;
    let token = app.access_token("testuser2", "testpassword2").await;

    let (status, body) = app
        .post(
            &format!("/books/{}/add_review/", app.book_id),
            json!({"review_text": "  Solid read  ", "rating": "4.0"}),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["rating"], 4);
    assert_eq!(body["review_text"], "Solid read");
}

#[tokio::test]
async fn blank_review_text_is_rejected() {
    let app = TestApp::new().await;
    let token = app.access_token("testuser2", "testpassword2").await;

    let (status, body) = app
        .post(
            &format!("/books/{}/add_review/", app.book_id),
            json!({"review_text": "   ", "rating": 3}),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["review_text".to_string()]);
    assert_eq!(app.review_count().await, 1);
}

#[tokio::test]
async fn book_file_is_served_read_only_from_media() {
    let media_root = std::env::temp_dir().join(format!("bookstore-media-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(media_root.join("books")).unwrap();
    std::fs::write(media_root.join("books/x.pdf"), b"%PDF-1.4 test").unwrap();

    let mut settings = Settings {
        database: DatabaseSettings::in_memory(),
        ..Settings::default()
    };
    settings.media.root = media_root.clone();
    let app = TestApp::with_settings(settings).await;

    store::create_book(
        &app.prepared.state.db,
        &NewBook {
            title: "Downloadable".to_string(),
            author: "Author".to_string(),
            description: String::new(),
            file: Some("books/x.pdf".to_string()),
            publish_date: OffsetDateTime::now_utc(),
        },
    )
    .await
    .unwrap();

    let token = app.access_token("testuser", "testpassword").await;
    let (_, books) = app.get("/books/", Some(&token)).await;
    let url = books[1]["file"].as_str().unwrap().to_string();
    assert_eq!(url, "/media/books/x.pdf");

    let response = app
        .router
        .clone()
        .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"%PDF-1.4 test");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::put(url.as_str())
                .body(Body::from("overwritten"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
    assert_eq!(
        std::fs::read(media_root.join("books/x.pdf")).unwrap(),
        b"%PDF-1.4 test"
    );

    std::fs::remove_dir_all(media_root).unwrap();
}

#[tokio::test]
async fn reviews_are_readable_without_auth() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/reviews/", None).await;
    assert_eq!(status, StatusCode::OK);
    let id = body[0]["id"].as_i64().unwrap();

    let (status, body) = app.get(&format!("/reviews/{id}/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review_text"], "Great book!");

    let (status, _) = app.get("/reviews/999/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_book_cascades_to_reviews() {
    let app = TestApp::new().await;
    sqlx::query("DELETE FROM book WHERE id = ?")
        .bind(app.book_id)
        .execute(&app.prepared.state.db)
        .await
        .unwrap();
    assert_eq!(app.review_count().await, 0);
}

#[tokio::test]
async fn health_and_openapi_are_served() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (status, doc) = app.get("/docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/books/{id}/add_review/"]["post"].is_object());
    assert!(doc["paths"]["/user/login/"]["post"].is_object());
    assert!(doc["paths"]["/user/register/"]["post"].is_object());
}
