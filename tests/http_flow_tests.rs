// End-to-end runs of the HTTP server on the in-memory backend, driven by a cookie-keeping
// reqwest client the way a browser would.

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Response, StatusCode};

use moodjournal::config::{BackendConfig, Config};
use moodjournal::server::{router, AppState};
use moodjournal::workflow::WorkflowOptions;

struct Browser {
    base: String,
    client: Client,
}

async fn spawn_app(workflow: WorkflowOptions) -> String {
    let config = Config {
        backend: BackendConfig::Memory { auto_confirm: true },
        workflow,
        // plain http in tests
        secure_cookies: false,
        ..Config::default()
    };
    let state = AppState::from_config(&config).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

fn set_cookie(resp: &Response) -> Option<String> {
    resp.headers().get(SET_COOKIE).and_then(|v| v.to_str().ok()).map(str::to_string)
}

impl Browser {
    fn new(base: &str) -> Self {
        let client = Client::builder().cookie_store(true).build().unwrap();
        Self { base: base.to_string(), client }
    }

    async fn get(&self, path: &str) -> Response {
        self.client.get(format!("{}{}", self.base, path)).send().await.unwrap()
    }

    async fn post(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client.post(format!("{}{}", self.base, path)).form(form).send().await.unwrap()
    }

    async fn csrf(&self) -> Option<String> {
        let resp = self.get("/csrf").await;
        if resp.status() != StatusCode::OK {
            return None;
        }
        let v: serde_json::Value = resp.json().await.unwrap();
        v["csrf"].as_str().map(str::to_string)
    }

    async fn sign_up_and_login(&self, email: &str) -> String {
        let resp = self.post("/signup", &[("email", email), ("password", "hunter22")]).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = self.post("/login", &[("email", email), ("password", "hunter22")]).await;
        assert_eq!(resp.status(), StatusCode::OK);
        self.csrf().await.expect("csrf after login")
    }
}

#[tokio::test]
async fn health_and_login_page() {
    let base = spawn_app(WorkflowOptions::classic()).await;
    let b = Browser::new(&base);
    assert_eq!(b.get("/health").await.text().await.unwrap(), "ok");

    let page = b.get("/").await.text().await.unwrap();
    assert!(page.contains("action=\"/login\""));
    let page = b.get("/?tab=signup").await.text().await.unwrap();
    assert!(page.contains("action=\"/signup\""));
}

#[tokio::test]
async fn journal_round_trip_with_confirmation_and_toggle_edit() {
    let base = spawn_app(WorkflowOptions::classic()).await;
    let b = Browser::new(&base);

    let resp = b.post("/signup", &[("email", "u@example.com"), ("password", "hunter22")]).await;
    assert!(set_cookie(&resp).is_none(), "signup must not log in");
    assert!(resp.text().await.unwrap().contains("Account created"));

    let resp = b.post("/login", &[("email", "u@example.com"), ("password", "wrong-one")]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.text().await.unwrap().contains("Login failed"));
    assert!(b.csrf().await.is_none());

    let resp = b.post("/login", &[("email", "u@example.com"), ("password", "hunter22")]).await;
    let cookie = set_cookie(&resp).expect("session cookie");
    assert!(cookie.starts_with("journal_session=") && cookie.contains("HttpOnly") && cookie.contains("SameSite=Strict"));
    assert!(resp.text().await.unwrap().contains("Logged in successfully"));
    let csrf = b.csrf().await.expect("csrf");

    let resp = b.post("/entries", &[("csrf", csrf.as_str()), ("title", "Day 1"), ("content", "ok"), ("mood", "😊 Happy")]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = resp.text().await.unwrap();
    assert!(page.contains("Entry saved!") && page.contains("Day 1"));

    // toggle style: the edit form only appears after Edit
    assert!(!page.contains("action=\"/entries/1\""));
    let page = b.post("/entries/1/edit", &[("csrf", csrf.as_str())]).await.text().await.unwrap();
    assert!(page.contains("action=\"/entries/1\""));

    let page = b.post("/entries/1", &[("csrf", csrf.as_str()), ("title", "Day 1 revised")]).await.text().await.unwrap();
    assert!(page.contains("Entry updated!"));
    assert!(page.contains("Day 1 revised"));
    assert!(page.contains("<p>ok</p>"), "content must survive a title-only edit");

    let page = b.post("/entries/1/delete", &[("csrf", csrf.as_str())]).await.text().await.unwrap();
    assert!(page.contains("Yes, delete"));
    let page = b.post("/entries/1/delete/confirm", &[("csrf", csrf.as_str())]).await.text().await.unwrap();
    assert!(page.contains("Entry deleted."));
    assert!(page.contains("No entries yet"));

    let resp = b.post("/logout", &[]).await;
    assert!(set_cookie(&resp).unwrap().contains("Max-Age=0"));
    assert!(resp.text().await.unwrap().contains("You have been logged out."));
    assert!(b.csrf().await.is_none());

    let resp = b.post("/entries", &[("csrf", csrf.as_str()), ("title", "late"), ("content", ""), ("mood", "happy")]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.text().await.unwrap().contains("Please log in to continue."));
}

#[tokio::test]
async fn streamlined_flow_deletes_at_once() {
    let base = spawn_app(WorkflowOptions::streamlined()).await;
    let b = Browser::new(&base);
    let csrf = b.sign_up_and_login("s@example.com").await;

    let page = b.post("/entries", &[("csrf", csrf.as_str()), ("title", "quick"), ("content", "x"), ("mood", "sad")]).await.text().await.unwrap();
    // inline style: the edit form is always there
    assert!(page.contains("action=\"/entries/1\""));

    let page = b.post("/entries/1/delete", &[("csrf", csrf.as_str())]).await.text().await.unwrap();
    assert!(page.contains("Entry deleted."));
}

#[tokio::test]
async fn csrf_mismatch_is_forbidden_and_keeps_session() {
    let base = spawn_app(WorkflowOptions::classic()).await;
    let b = Browser::new(&base);
    b.sign_up_and_login("c@example.com").await;

    let resp = b.post("/entries", &[("csrf", "forged"), ("title", "nope"), ("content", ""), ("mood", "happy")]).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let page = resp.text().await.unwrap();
    assert!(page.contains("Request blocked"));
    assert!(!page.contains("nope"));
    assert!(b.csrf().await.is_some());
}

#[tokio::test]
async fn entries_are_visible_to_their_owner_only() {
    let base = spawn_app(WorkflowOptions::classic()).await;
    let alice = Browser::new(&base);
    let bob = Browser::new(&base);
    let a_csrf = alice.sign_up_and_login("alice@example.com").await;
    let b_csrf = bob.sign_up_and_login("bob@example.com").await;

    alice.post("/entries", &[("csrf", a_csrf.as_str()), ("title", "alice private"), ("content", ""), ("mood", "happy")]).await;
    let page = bob.get("/").await.text().await.unwrap();
    assert!(!page.contains("alice private"));

    // Bob cannot touch Alice's entry by guessing its id
    let resp = bob.post("/entries/1/delete/confirm", &[("csrf", b_csrf.as_str())]).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(alice.get("/").await.text().await.unwrap().contains("alice private"));
}

#[tokio::test]
async fn unknown_session_cookie_is_cleared() {
    let base = spawn_app(WorkflowOptions::classic()).await;
    let resp = Client::new()
        .get(format!("{}/", base))
        .header(COOKIE, "journal_session=not-a-session")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(set_cookie(&resp).unwrap().contains("Max-Age=0"));
}
