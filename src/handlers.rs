// src/handlers.rs
use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{self, CurrentUser},
    error::AppError,
    export::{export_csv, EXPORT_FILENAME},
    forms::{FieldErrors, LoginForm, PollForm, RegisterForm, VoteForm},
    models::{Question, QuestionDetail},
    poll,
    query::{filter_questions, QuestionQuery, QuestionQueryResponse},
    routes::{results_path, INDEX_PATH, LOGIN_PATH},
    state::AppState,
    stats::{question_stats as compute_question_stats, QuestionStats},
};

const CREATE_PATH: &str = "/polls/create/";

#[derive(Debug, Serialize)]
pub struct IndexPage {
    pub latest_question_list: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct DetailPage {
    pub question: QuestionDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A form echoed back to the client together with its validation errors.
#[derive(Debug, Serialize)]
pub struct FormPage<T> {
    pub form: T,
    pub errors: FieldErrors,
}

#[derive(Debug, Default, Serialize)]
pub struct LoginPage {
    pub username: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct RegisterPage {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// The five most recently published questions
pub async fn index(State(state): State<AppState>) -> Result<Json<IndexPage>, AppError> {
    let latest_question_list = poll::latest_questions(state.polls.as_ref(), Utc::now()).await?;
    Ok(Json(IndexPage {
        latest_question_list,
    }))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Json<DetailPage>, AppError> {
    let question = poll::question_detail(state.polls.as_ref(), question_id).await?;
    Ok(Json(DetailPage {
        question,
        error_message: None,
    }))
}

pub async fn results(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Json<DetailPage>, AppError> {
    detail(State(state), Path(question_id)).await
}

/// Vote for a choice, then go to the results page
pub async fn vote(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    form: Result<Form<VoteForm>, FormRejection>,
) -> Result<Response, AppError> {
    // A bare or unreadable POST counts as no choice selected
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!(question_id, %rejection, "Vote without a readable form");
            VoteForm::default()
        }
    };

    match poll::vote(state.polls.as_ref(), question_id, &form).await {
        Ok(_) => Ok(Redirect::to(&results_path(question_id)).into_response()),
        Err(AppError::InvalidSelection) => {
            let question = poll::question_detail(state.polls.as_ref(), question_id).await?;
            Ok(Json(DetailPage {
                question,
                error_message: Some(AppError::InvalidSelection.to_string()),
            })
            .into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn create_poll_form(CurrentUser(user): CurrentUser) -> Response {
    if user.is_none() {
        return login_redirect(CREATE_PATH);
    }
    Json(FormPage {
        form: PollForm::default(),
        errors: FieldErrors::new(),
    })
    .into_response()
}

/// Create a poll (signed-in users only)
pub async fn create_poll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<PollForm>,
) -> Result<Response, AppError> {
    match poll::create_poll(state.polls.as_ref(), user.as_ref(), &form, Utc::now()).await {
        Ok(_) => Ok(Redirect::to(INDEX_PATH).into_response()),
        Err(AppError::AuthenticationRequired) => Ok(login_redirect(CREATE_PATH)),
        Err(AppError::Validation(errors)) => Ok(form_page(form, errors)),
        Err(e) => Err(e),
    }
}

pub async fn login_form(Query(params): Query<NextParam>) -> Json<FormPage<LoginPage>> {
    Json(FormPage {
        form: LoginPage {
            username: String::new(),
            next: params.next,
        },
        errors: FieldErrors::new(),
    })
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let ttl_days = state.config.session_ttl_days;
    match auth::login(state.accounts.as_ref(), &form, ttl_days).await {
        Ok((_, token)) => Ok(signed_in(
            token,
            ttl_days,
            form.safe_next().unwrap_or(INDEX_PATH),
        )),
        Err(AppError::Validation(errors)) => Ok(form_page(
            LoginPage {
                username: form.username,
                next: form.next,
            },
            errors,
        )),
        Err(e) => Err(e),
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    auth::logout(state.accounts.as_ref(), auth::session_token(&headers)).await?;
    Ok((
        [(header::SET_COOKIE, auth::expired_session_cookie())],
        Redirect::to(INDEX_PATH),
    )
        .into_response())
}

pub async fn register_form() -> Json<FormPage<RegisterPage>> {
    Json(FormPage {
        form: RegisterPage::default(),
        errors: FieldErrors::new(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let config = &state.config;
    match auth::register(
        state.accounts.as_ref(),
        &form,
        config.password_hash_iterations,
        config.session_ttl_days,
    )
    .await
    {
        Ok((_, token)) => Ok(signed_in(token, config.session_ttl_days, INDEX_PATH)),
        Err(AppError::Validation(errors)) => Ok(form_page(
            RegisterPage {
                username: form.username,
            },
            errors,
        )),
        Err(e) => Err(e),
    }
}

/// Questions filtered by publication dates and vote totals
pub async fn question_list(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<QuestionQueryResponse>, AppError> {
    let query = QuestionQuery::from_body(&body)?;
    let response = filter_questions(
        state.polls.as_ref(),
        &query,
        Utc::now(),
        state.config.query_default_days,
    )
    .await?;
    Ok(Json(response))
}

pub async fn question_stats(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> Result<Json<QuestionStats>, AppError> {
    let stats = compute_question_stats(state.polls.as_ref(), question_id).await?;
    Ok(Json(stats))
}

/// Download every question/choice/votes row as CSV
pub async fn export_data(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = export_csv(state.polls.as_ref()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}

fn form_page<T: Serialize>(form: T, errors: FieldErrors) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(FormPage { form, errors }),
    )
        .into_response()
}

fn login_redirect(next: &str) -> Response {
    Redirect::to(&format!("{LOGIN_PATH}?next={next}")).into_response()
}

fn signed_in(token: Uuid, ttl_days: i64, location: &str) -> Response {
    (
        [(header::SET_COOKIE, auth::session_cookie(token, ttl_days))],
        Redirect::to(location),
    )
        .into_response()
}
