use axum::{
    body::{Body, Bytes},
    http::{Method, Request, StatusCode},
    Router,
};
use club_registry::{
    auth::Keys,
    media::MediaStore,
    models::Role,
    store::{MemoryStore, Store},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const UPLOAD_HEAD: &[u8] = b"--XBOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"logo.png\"\r\nContent-Type: image/png\r\n\r\n";

const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    media_dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::with_categories([
            "Technical",
            "Cultural",
            "Sports",
        ]));
        let media = tempfile::tempdir().unwrap();
        let router = club_registry::app(
            store.clone(),
            Keys::from_secret(b"integration secret"),
            MediaStore::new(media.path(), "http://localhost:8080"),
        );
        Self {
            router,
            store,
            media_dir: media,
        }
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.call(builder.body(body).unwrap()).await
    }

    /// Posts `file` as the only multipart field to a club media slot.
    async fn upload(&self, token: &str, club_id: i64, slot: &str, file: &[u8]) -> (StatusCode, Value) {
        let mut body = UPLOAD_HEAD.to_vec();
        body.extend_from_slice(file);
        body.extend_from_slice(b"\r\n--XBOUNDARY--\r\n");
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/manage/{club_id}/media/{slot}"))
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();
        self.call(request).await
    }

    /// Where a `/media` URL issued by the app lives on disk.
    fn media_path(&self, url: &str) -> std::path::PathBuf {
        let relative = url
            .strip_prefix("http://localhost:8080/media/")
            .unwrap();
        self.media_dir.path().join(relative)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Signs a new user up and returns their token and user id.
    async fn signup(&self, email: &str, name: &str) -> (String, i64) {
        let (status, body) = self
            .post(
                "/api/auth/signup",
                None,
                json!({ "email": email, "password": "hunter2hunter2", "fullName": name }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["profile"]["userId"].as_i64().unwrap(),
        )
    }

    async fn operator(&self) -> String {
        let (token, user_id) = self.signup("registrar@gecp.ac.in", "Registrar").await;
        self.store
            .set_role(user_id as i32, Role::Moderator)
            .await
            .unwrap();
        token
    }

    async fn submit(&self, token: &str, club_name: &str, category: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/request",
                Some(token),
                json!({
                    "clubName": club_name,
                    "category": category,
                    "description": "Hands-on projects every weekend",
                    "contactName": "Asha Kumari",
                    "contactEmail": "asha@gecp.ac.in",
                    "websiteUrl": "https://example.org",
                    "socialInstagram": "",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "pending");
        body["id"].as_i64().unwrap()
    }

    /// Signs up a student, submits a request and approves it. Returns the new
    /// admin's token, user id and club id.
    async fn provisioned_club(&self, operator: &str, club_name: &str) -> (String, i64, i64) {
        let email = format!("{}@gecp.ac.in", club_name.to_lowercase().replace(' ', "."));
        let (token, user_id) = self.signup(&email, "Founder").await;
        let request = self.submit(&token, club_name, "Technical").await;
        let (status, body) = self
            .post(
                &format!("/api/admin/requests/{request}/approve"),
                Some(operator),
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (token, user_id, body["club"]["id"].as_i64().unwrap())
    }
}

#[tokio::test]
async fn approval_provisions_a_managed_club() {
    let app = TestApp::new();
    let operator = app.operator().await;
    let (student, _) = app.signup("asha@gecp.ac.in", "Asha Kumari").await;
    let request = app.submit(&student, "AI & Data Club", "Technical").await;

    let (status, body) = app
        .post(
            &format!("/api/admin/requests/{request}/approve"),
            Some(&operator),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["club"]["slug"], "ai-data-club");
    assert_eq!(body["club"]["isVerified"], true);
    assert_eq!(body["admin"]["isAdmin"], true);
    assert_eq!(body["notified"], true);

    let (_, me) = app.get("/api/auth/me", Some(&student)).await;
    assert_eq!(me["role"], "club_admin");

    let (status, info) = app.get("/api/club/info/ai-data-club", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["club"]["name"], "AI & Data Club");

    let (status, managed) = app.get("/api/manage/club", Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(managed["slug"], "ai-data-club");

    let (_, unread) = app
        .get("/api/notifications/unread-count", Some(&student))
        .await;
    assert_eq!(unread["unread"], 1);
    let (_, inbox) = app.get("/api/notifications", Some(&student)).await;
    assert_eq!(inbox[0]["kind"], "notification_club_approved");

    let (status, body) = app
        .post(
            &format!("/api/admin/requests/{request}/approve"),
            Some(&operator),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn rejection_keeps_the_registry_untouched() {
    let app = TestApp::new();
    let operator = app.operator().await;
    let (student, _) = app.signup("ravi@gecp.ac.in", "Ravi").await;
    let request = app.submit(&student, "Film Club", "Cultural").await;

    let (status, body) = app
        .post(
            &format!("/api/admin/requests/{request}/reject"),
            Some(&operator),
            json!({ "notes": "Insufficient documentation" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["request"]["status"], "rejected");
    assert_eq!(body["request"]["reviewNotes"], "Insufficient documentation");

    let (_, clubs) = app.get("/api/club/list", None).await;
    assert_eq!(clubs, json!([]));
    let (_, me) = app.get("/api/auth/me", Some(&student)).await;
    assert_eq!(me["role"], "student");
    let (_, mine) = app.get("/api/request/mine", Some(&student)).await;
    assert_eq!(mine[0]["status"], "rejected");

    let (_, inbox) = app.get("/api/notifications", Some(&student)).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["kind"], "notification_club_rejected");

    let (status, body) = app
        .post(
            &format!("/api/admin/requests/{request}/reset"),
            Some(&operator),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["request"]["status"], "pending");
    assert_eq!(body["request"]["reviewNotes"], Value::Null);
}

#[tokio::test]
async fn reset_removes_the_provisioned_club() {
    let app = TestApp::new();
    let operator = app.operator().await;
    let (_, _, club_id) = app.provisioned_club(&operator, "Chess Club").await;
    let (_, requests) = app.get("/api/admin/requests", Some(&operator)).await;
    let request = requests[0]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            &format!("/api/admin/requests/{request}/reset"),
            Some(&operator),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["removedClub"], club_id);

    let (status, _) = app.get("/api/club/info/chess-club", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sessions_and_roles_are_enforced() {
    let app = TestApp::new();
    let (student, _) = app.signup("meera@gecp.ac.in", "Meera").await;

    let (status, _) = app.get("/api/admin/requests", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/api/auth/me", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/admin/requests", Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/manage/club", Some(&student)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "no club to manage");

    let operator = app.operator().await;
    let (status, _) = app
        .send(
            Method::PUT,
            "/api/admin/users/1/role",
            Some(&operator),
            Some(json!({ "role": "moderator" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn login_issues_a_token_for_the_right_password() {
    let app = TestApp::new();
    app.signup("kiran@gecp.ac.in", "Kiran").await;

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "Kiran@gecp.ac.in", "password": "hunter2hunter2" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "student");

    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "kiran@gecp.ac.in", "password": "wrong password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post(
            "/api/auth/signup",
            None,
            json!({ "email": "kiran@gecp.ac.in", "password": "hunter2hunter2" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn requests_need_a_usable_name_and_known_category() {
    let app = TestApp::new();
    let (student, _) = app.signup("dev@gecp.ac.in", "Dev").await;

    for (name, category) in [("!!!", "Technical"), ("Space Club", "Astrology")] {
        let (status, _) = app
            .post(
                "/api/request",
                Some(&student),
                json!({
                    "clubName": name,
                    "category": category,
                    "description": "d",
                    "contactName": "Dev",
                    "contactEmail": "dev@gecp.ac.in",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn join_requests_are_decided_by_the_club_admin() {
    let app = TestApp::new();
    let operator = app.operator().await;
    let (admin, admin_id, club_id) = app.provisioned_club(&operator, "Robotics Society").await;
    let (student, student_id) = app.signup("neha@gecp.ac.in", "Neha").await;

    let (status, body) = app
        .post(&format!("/api/club/{club_id}/join"), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "pending");
    let (status, _) = app
        .post(&format!("/api/club/{club_id}/join"), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // students cannot decide on their own request
    let (status, _) = app
        .post(
            &format!("/api/manage/{club_id}/members/{student_id}/approve"),
            Some(&student),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &format!("/api/manage/{club_id}/members/{student_id}/approve"),
            Some(&admin),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "active");
    assert_eq!(body["notified"], true);

    let (_, inbox) = app.get("/api/notifications", Some(&student)).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["kind"], "notification_join_approved");

    let (_, memberships) = app.get("/api/me/memberships", Some(&student)).await;
    assert_eq!(memberships[0]["club"]["slug"], "robotics-society");
    assert_eq!(memberships[0]["status"], "active");

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/manage/{club_id}/members/{admin_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, members) = app
        .get(&format!("/api/manage/{club_id}/members"), Some(&admin))
        .await;
    assert_eq!(members.as_array().unwrap().len(), 2);

    let (_, read) = app
        .post("/api/notifications/read-all", Some(&student), json!({}))
        .await;
    assert_eq!(read["marked"], 1);
    let (_, unread) = app
        .get("/api/notifications/unread-count", Some(&student))
        .await;
    assert_eq!(unread["unread"], 0);
}

#[tokio::test]
async fn directory_filters_by_search_and_category() {
    let app = TestApp::new();
    let operator = app.operator().await;
    app.provisioned_club(&operator, "Robotics Society").await;
    let (founder, _, _) = app.provisioned_club(&operator, "Drama Club").await;
    let (_, clubs) = app.get("/api/club/list", None).await;
    assert_eq!(clubs.as_array().unwrap().len(), 2);

    let drama = app
        .store
        .find_club_by_slug("drama-club")
        .await
        .unwrap()
        .unwrap();
    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/manage/{}", drama.id),
            Some(&founder),
            Some(json!({ "category": "Cultural" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, clubs) = app.get("/api/club/list?search=ROBOT", None).await;
    assert_eq!(clubs.as_array().unwrap().len(), 1);
    assert_eq!(clubs[0]["slug"], "robotics-society");

    let (_, clubs) = app.get("/api/club/list?category=Cultural", None).await;
    assert_eq!(clubs.as_array().unwrap().len(), 1);
    assert_eq!(clubs[0]["slug"], "drama-club");

    let (_, clubs) = app
        .get("/api/club/list?search=weekend&category=All", None)
        .await;
    assert_eq!(clubs.as_array().unwrap().len(), 2);

    let (_, featured) = app.get("/api/club/featured", None).await;
    assert_eq!(featured[0]["slug"], "drama-club");

    let (_, categories) = app.get("/api/club/categories/list", None).await;
    assert_eq!(categories, json!(["Technical", "Cultural", "Sports"]));
}

#[tokio::test]
async fn notices_and_events_reach_the_public_boards() {
    let app = TestApp::new();
    let operator = app.operator().await;
    let (admin, _, club_id) = app.provisioned_club(&operator, "Music Club").await;
    let (student, _) = app.signup("tara@gecp.ac.in", "Tara").await;
    let (status, _) = app
        .post(
            &format!("/api/club/{club_id}/subscribe"),
            Some(&student),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            &format!("/api/manage/{club_id}/updates"),
            Some(&admin),
            json!({ "title": "Hi", "body": "b", "type": "notification_spoof" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (title, kind) in [("Auditions open", "Announcement"), ("Room change", "Urgent")] {
        let (status, body) = app
            .post(
                &format!("/api/manage/{club_id}/updates"),
                Some(&admin),
                json!({ "title": title, "body": "Details inside", "type": kind }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    let (_, notices) = app.get("/api/notices?type=Urgent", None).await;
    assert_eq!(notices.as_array().unwrap().len(), 1);
    assert_eq!(notices[0]["title"], "Room change");
    let (_, notices) = app.get("/api/notices?type=All", None).await;
    assert_eq!(notices.as_array().unwrap().len(), 2);

    let (status, body) = app
        .post(
            &format!("/api/manage/{club_id}/events"),
            Some(&admin),
            json!({
                "title": "Open Mic",
                "startTime": "2099-01-15T18:00:00Z",
                "location": "Auditorium",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, events) = app.get("/api/notices/events?upcoming=true", None).await;
    assert_eq!(events[0]["title"], "Open Mic");
    let (_, stats) = app.get("/api/club/stats", None).await;
    assert_eq!(stats, json!({ "clubs": 1, "events": 1 }));

    let (_, inbox) = app.get("/api/notifications", Some(&student)).await;
    assert_eq!(inbox[0]["kind"], "notification_event_created");

    let (_, clubs) = app
        .post(&format!("/api/club/{club_id}/click"), None, json!({}))
        .await;
    assert_eq!(clubs["websiteClicks"], 1);
    let (_, stats) = app
        .get(&format!("/api/manage/{club_id}/stats"), Some(&admin))
        .await;
    assert_eq!(stats["websiteClicks"], 1);
    assert_eq!(stats["updates"], 2);
    assert_eq!(stats["events"], 1);
}

#[tokio::test]
async fn logo_uploads_are_stored_and_served() {
    let app = TestApp::new();
    let operator = app.operator().await;
    let (admin, _, club_id) = app.provisioned_club(&operator, "Art Club").await;

    let (status, club) = app.upload(&admin, club_id, "logo", PNG).await;
    assert_eq!(status, StatusCode::OK, "{club}");
    let url = club["logoUrl"].as_str().unwrap();
    let path = url.strip_prefix("http://localhost:8080").unwrap();
    assert!(path.starts_with(&format!("/media/clubs/{club_id}/")));

    let response = app
        .router
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let served = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&served[..], PNG);
}

#[tokio::test]
async fn replacing_a_logo_deletes_the_old_file() {
    let app = TestApp::new();
    let operator = app.operator().await;
    let (admin, _, club_id) = app.provisioned_club(&operator, "Chess Club").await;

    let (_, first) = app.upload(&admin, club_id, "logo", PNG).await;
    let first = app.media_path(first["logoUrl"].as_str().unwrap());
    assert!(first.exists());

    let (status, second) = app.upload(&admin, club_id, "logo", PNG).await;
    assert_eq!(status, StatusCode::OK, "{second}");
    let second = app.media_path(second["logoUrl"].as_str().unwrap());

    assert!(second.exists());
    assert!(!first.exists());
}

#[tokio::test]
async fn oversized_uploads_are_refused_while_streaming() {
    const TOTAL: usize = 64 * 1024 * 1024;
    const CHUNK: usize = 64 * 1024;
    let app = TestApp::new();
    let operator = app.operator().await;
    let (admin, _, club_id) = app.provisioned_club(&operator, "Film Club").await;

    let (mut sender, body) = Body::channel();
    let feeder = tokio::spawn(async move {
        let mut sent = 0;
        if sender.send_data(Bytes::from_static(UPLOAD_HEAD)).await.is_err() {
            return sent;
        }
        while sent < TOTAL {
            if sender.send_data(Bytes::from(vec![0u8; CHUNK])).await.is_err() {
                break;
            }
            sent += CHUNK;
        }
        sent
    });
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/manage/{club_id}/media/logo"))
        .header("authorization", format!("Bearer {admin}"))
        .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .body(body)
        .unwrap();

    let (status, _) = app.call(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let sent = feeder.await.unwrap();
    assert!(sent < TOTAL, "the whole body was consumed ({sent} bytes)");
    assert!(!app.media_dir.path().join("clubs").exists());
}
