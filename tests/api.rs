use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use polls_backend::{
    app,
    config::Config,
    models::QuestionDetail,
    state::AppState,
    store::{MemoryStore, PollStore},
};
use serde_json::Value;
use tower::ServiceExt;

const FORM: &str = "application/x-www-form-urlencoded";

fn setup() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = Config {
        password_hash_iterations: 1_000,
        ..Config::default()
    };
    let state = AppState::new(store.clone(), store.clone(), config);
    (app(state), store)
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, FORM);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// The `name=value` part of the session cookie set by `response`.
fn session_cookie(response: &Response<Body>) -> String {
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn votes(store: &MemoryStore, poll: &QuestionDetail) -> Vec<i32> {
    store
        .choices_for(poll.question.id)
        .await
        .unwrap()
        .iter()
        .map(|c| c.votes)
        .collect()
}

async fn register(app: &Router, username: &str) -> String {
    let response = send(
        app,
        post_form(
            "/polls/register/",
            &format!("username={username}&password1=hunter2hunter2&password2=hunter2hunter2"),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    session_cookie(&response)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = setup();
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_index_lists_latest_five_published() {
    let (app, store) = setup();
    let now = Utc::now();
    for day in 1..=6 {
        store.seed_question(&format!("q{day}"), now - Duration::days(day), &[]);
    }
    store.seed_question("future", now + Duration::days(1), &[]);

    let body = json_body(send(&app, get("/polls/")).await).await;
    let texts: Vec<&str> = body["latest_question_list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["question_text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["q1", "q2", "q3", "q4", "q5"]);
}

#[tokio::test]
async fn test_detail_and_missing_question() {
    let (app, store) = setup();
    let poll = store.seed_question("Tea?", Utc::now(), &[("Yes", 0), ("No", 0)]);

    let response = send(&app, get(&format!("/polls/{}/", poll.question.id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["question"]["question_text"], "Tea?");
    assert_eq!(body["question"]["choices"].as_array().unwrap().len(), 2);
    assert!(body.get("error_message").is_none());

    let response = send(&app, get("/polls/999/results/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_vote_redirects_to_results_and_counts_once() {
    let (app, store) = setup();
    let poll = store.seed_question("Tea?", Utc::now(), &[("Yes", 2), ("No", 5)]);
    let yes = poll.choices[0].id;

    let response = send(
        &app,
        post_form(
            &format!("/polls/{}/vote/", poll.question.id),
            &format!("choice={yes}"),
            None,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/polls/{}/results/", poll.question.id)
    );
    assert_eq!(votes(&store, &poll).await, vec![3, 5]);
}

#[tokio::test]
async fn test_vote_without_valid_choice_rerenders_detail() {
    let (app, store) = setup();
    let poll = store.seed_question("Tea?", Utc::now(), &[("Yes", 1), ("No", 1)]);
    let other = store.seed_question("Coffee?", Utc::now(), &[("Yes", 0)]);
    let uri = format!("/polls/{}/vote/", poll.question.id);

    let foreign = format!("choice={}", other.choices[0].id);

    for body in ["", "choice=", "choice=abc", foreign.as_str()] {
        let response = send(&app, post_form(&uri, body, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = json_body(response).await;
        assert_eq!(page["error_message"], "You didn't select a choice.");
        assert_eq!(page["question"]["id"], poll.question.id);
    }

    let bare = Request::builder()
        .method("POST")
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    let response = send(&app, bare).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["error_message"],
        "You didn't select a choice."
    );

    assert_eq!(votes(&store, &poll).await, vec![1, 1]);
    assert_eq!(votes(&store, &other).await, vec![0]);
}

#[tokio::test]
async fn test_vote_on_missing_question_is_not_found() {
    let (app, _) = setup();
    let response = send(&app, post_form("/polls/41/vote/", "choice=1", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_poll_requires_login() {
    let (app, store) = setup();

    let response = send(&app, get("/polls/create/")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/polls/login/?next=/polls/create/");

    let response = send(
        &app,
        post_form("/polls/create/", "question_text=Hi&choices=a", None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(store.export_rows().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_registered_user_creates_poll() {
    let (app, store) = setup();
    let cookie = register(&app, "alice").await;

    let response = send(&app, {
        let mut request = get("/polls/create/");
        request
            .headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        request
    })
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        post_form(
            "/polls/create/",
            "question_text=Favorite+color%3F&choices=Red%0AGreen%0A%0ABlue",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/polls/");

    let rows = store.export_rows().await.unwrap();
    let created: Vec<(&str, &str, i32)> = rows
        .iter()
        .map(|r| (r.question_text.as_str(), r.choice_text.as_str(), r.votes))
        .collect();
    assert_eq!(
        created,
        vec![
            ("Favorite color?", "Red", 0),
            ("Favorite color?", "Green", 0),
            ("Favorite color?", "Blue", 0),
        ]
    );
}

#[tokio::test]
async fn test_invalid_poll_form_is_redisplayed() {
    let (app, store) = setup();
    let cookie = register(&app, "bob").await;

    let response = send(
        &app,
        post_form("/polls/create/", "question_text=&choices=+%0A+", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = json_body(response).await;
    assert_eq!(page["errors"]["question_text"][0], "This field is required.");
    assert_eq!(page["errors"]["choices"][0], "This field is required.");
    assert!(store.export_rows().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_login_and_logout() {
    let (app, _) = setup();
    register(&app, "carol").await;

    let response = send(
        &app,
        post_form("/polls/login/", "username=carol&password=wrong", None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(
        &app,
        post_form(
            "/polls/login/",
            "username=carol&password=hunter2hunter2&next=%2Fpolls%2Fcreate%2F",
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/polls/create/");
    let cookie = session_cookie(&response);

    let response = send(&app, post_form("/polls/logout/", "", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    // the old session no longer authenticates
    let response = send(
        &app,
        post_form("/polls/create/", "question_text=Hi&choices=a", Some(&cookie)),
    )
    .await;
    assert_eq!(location(&response), "/polls/login/?next=/polls/create/");
}

#[tokio::test]
async fn test_question_stats_endpoint() {
    let (app, store) = setup();
    let poll = store.seed_question("Pick", Utc::now(), &[("A", 3), ("B", 1)]);
    let empty = store.seed_question("Nothing", Utc::now(), &[]);

    let response = send(
        &app,
        get(&format!("/polls/statistics/question-stats/{}/", poll.question.id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = json_body(response).await;
    assert_eq!(stats["total_votes"], 4);
    assert_eq!(stats["choices"][0]["percentage"], 75.0);
    assert_eq!(stats["choices"][1]["percentage"], 25.0);
    assert_eq!(stats["most_popular_choice"], "A");
    assert_eq!(stats["least_popular_choice"], "B");
    assert!(stats["histogram_svg"].as_str().unwrap().contains("<svg"));

    let response = send(
        &app,
        get(&format!("/polls/statistics/question-stats/{}/", empty.question.id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(&app, get("/polls/statistics/question-stats/9999/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_question_list_filters() {
    let (app, store) = setup();
    let now = Utc::now();
    store.seed_question("busy", now - Duration::days(2), &[("a", 4), ("b", 3)]);
    store.seed_question("quiet", now - Duration::days(1), &[("a", 1)]);
    store.seed_question("old", now - Duration::days(61), &[("a", 9)]);

    let response = send(&app, post_json("/polls/statistics-question-list", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["questions"].as_array().unwrap().len(), 2);
    assert!(body["publication-dates"]["from"].is_string());
    assert!(body["votes-range"]["max"].is_null());

    let response = send(
        &app,
        post_json(
            "/polls/statistics-question-list",
            r#"{"votes-range": {"min": 5}}"#,
        ),
    )
    .await;
    let body = json_body(response).await;
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["question_text"], "busy");
    assert_eq!(questions[0]["total_votes"], 7);

    let response = send(
        &app,
        post_json(
            "/polls/statistics-question-list",
            r#"{"votes-range": {"min": 5.0}}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["questions"].as_array().unwrap().len(), 1);

    let response = send(
        &app,
        post_json(
            "/polls/statistics-question-list",
            r#"{"publication-dates": {"from": "yesterday", "to": "today"}}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_csv() {
    let (app, store) = setup();
    let now = Utc::now();
    store.seed_question("One", now, &[("a", 1), ("b", 2)]);
    store.seed_question("Two", now, &[("c", 3)]);

    let response = send(&app, get("/polls/export/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"polls_data.csv\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Question,Choice,Votes");
    assert_eq!(lines[3], "Two,c,3");
}
