// src/stats.rs
use serde::Serialize;

use crate::{
    chart::votes_histogram,
    error::AppError,
    models::{Choice, QuestionDetail},
    poll::question_detail,
    store::PollStore,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceShare {
    pub choice_text: String,
    pub votes: i32,
    pub percentage: f64,
}

/// The numeric part of the statistics, without the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteSummary {
    pub total_votes: i64,
    pub choices: Vec<ChoiceShare>,
    pub most_popular_choice: String,
    pub least_popular_choice: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionStats {
    pub question: String,
    pub total_votes: i64,
    pub choices: Vec<ChoiceShare>,
    pub most_popular_choice: String,
    pub least_popular_choice: String,
    pub histogram_svg: String,
}

pub async fn question_stats(
    store: &dyn PollStore,
    question_id: i64,
) -> Result<QuestionStats, AppError> {
    let QuestionDetail { question, choices } = question_detail(store, question_id).await?;
    let summary = summarize(&choices)?;
    let histogram_svg = votes_histogram(&choices)?;

    Ok(QuestionStats {
        question: question.question_text,
        total_votes: summary.total_votes,
        choices: summary.choices,
        most_popular_choice: summary.most_popular_choice,
        least_popular_choice: summary.least_popular_choice,
        histogram_svg,
    })
}

/// Totals, shares and extremal choices for `choices` (in id order).
pub fn summarize(choices: &[Choice]) -> Result<VoteSummary, AppError> {
    let (Some(most), Some(least)) = (most_popular(choices), least_popular(choices)) else {
        return Err(AppError::NoChoices);
    };

    let total_votes: i64 = choices.iter().map(|c| i64::from(c.votes)).sum();
    let shares = choices
        .iter()
        .map(|c| ChoiceShare {
            choice_text: c.choice_text.clone(),
            votes: c.votes,
            percentage: percentage(c.votes, total_votes),
        })
        .collect();

    Ok(VoteSummary {
        total_votes,
        choices: shares,
        most_popular_choice: most.choice_text.clone(),
        least_popular_choice: least.choice_text.clone(),
    })
}

/// Share of `total` in percent, rounded to two decimals; 0 when nobody voted.
pub fn percentage(votes: i32, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let share = f64::from(votes) / total as f64 * 100.0;
    (share * 100.0).round() / 100.0
}

/// Highest vote count; ties go to the earliest choice.
pub fn most_popular(choices: &[Choice]) -> Option<&Choice> {
    choices
        .iter()
        .fold(None, |best: Option<&Choice>, c| match best {
            Some(b) if b.votes >= c.votes => Some(b),
            _ => Some(c),
        })
}

/// Lowest vote count; ties go to the earliest choice.
pub fn least_popular(choices: &[Choice]) -> Option<&Choice> {
    choices
        .iter()
        .fold(None, |best: Option<&Choice>, c| match best {
            Some(b) if b.votes <= c.votes => Some(b),
            _ => Some(c),
        })
}
