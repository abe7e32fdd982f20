// src/poll.rs
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    error::AppError,
    forms::{PollForm, VoteForm},
    models::{Question, QuestionDetail, User},
    store::PollStore,
};

/// How many questions the index shows.
pub const INDEX_SIZE: usize = 5;

pub async fn latest_questions(
    store: &dyn PollStore,
    now: DateTime<Utc>,
) -> Result<Vec<Question>, AppError> {
    Ok(store.latest_questions(now, INDEX_SIZE).await?)
}

pub async fn question_detail(
    store: &dyn PollStore,
    question_id: i64,
) -> Result<QuestionDetail, AppError> {
    let question = store
        .get_question(question_id)
        .await?
        .ok_or(AppError::NotFound("Question"))?;
    let choices = store.choices_for(question_id).await?;

    Ok(QuestionDetail { question, choices })
}

/// Records one vote for the submitted choice of `question_id`.
///
/// A missing, malformed or foreign choice id yields `InvalidSelection` and
/// leaves every counter untouched.
pub async fn vote(
    store: &dyn PollStore,
    question_id: i64,
    form: &VoteForm,
) -> Result<Question, AppError> {
    let question = store
        .get_question(question_id)
        .await?
        .ok_or(AppError::NotFound("Question"))?;

    let Some(choice_id) = form.choice_id() else {
        debug!(question_id, choice = ?form.choice, "Vote without a usable choice");
        return Err(AppError::InvalidSelection);
    };

    if !store.increment_vote(question_id, choice_id).await? {
        debug!(question_id, choice_id, "Vote for a choice outside the question");
        return Err(AppError::InvalidSelection);
    }

    info!(question_id, choice_id, "Vote recorded");
    Ok(question)
}

/// Creates a question and one zero-vote choice per non-blank line.
pub async fn create_poll(
    store: &dyn PollStore,
    user: Option<&User>,
    form: &PollForm,
    now: DateTime<Utc>,
) -> Result<QuestionDetail, AppError> {
    let user = user.ok_or(AppError::AuthenticationRequired)?;
    let poll = form.validate().map_err(AppError::Validation)?;

    let created = store.create_poll(&poll, now).await?;
    info!(
        question_id = created.question.id,
        choices = created.choices.len(),
        created_by = %user.username,
        "Poll created"
    );

    Ok(created)
}
