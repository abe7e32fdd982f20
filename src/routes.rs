// src/routes.rs
use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, state::AppState};

pub const INDEX_PATH: &str = "/polls/";
pub const LOGIN_PATH: &str = "/polls/login/";

pub fn results_path(question_id: i64) -> String {
    format!("/polls/{question_id}/results/")
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/polls/", get(handlers::index))
        .route("/polls/{question_id}/", get(handlers::detail))
        .route("/polls/{question_id}/results/", get(handlers::results))
        .route("/polls/{question_id}/vote/", post(handlers::vote))
        .route(
            "/polls/create/",
            get(handlers::create_poll_form).post(handlers::create_poll),
        )
        .route(
            "/polls/login/",
            get(handlers::login_form).post(handlers::login),
        )
        .route(
            "/polls/logout/",
            get(handlers::logout).post(handlers::logout),
        )
        .route(
            "/polls/register/",
            get(handlers::register_form).post(handlers::register),
        )
        .route(
            "/polls/statistics-question-list",
            post(handlers::question_list),
        )
        .route(
            "/polls/statistics/question-stats/{question_id}/",
            get(handlers::question_stats),
        )
        .route("/polls/export/", get(handlers::export_data))
        .with_state(state)
}
