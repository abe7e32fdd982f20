// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub votes: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

/// A question together with its choices, ordered by choice id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    pub choices: Vec<Choice>,
}

impl QuestionDetail {
    pub fn total_votes(&self) -> i64 {
        self.choices.iter().map(|c| i64::from(c.votes)).sum()
    }
}

/// A validated poll ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPoll {
    pub question_text: String,
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ExportRow {
    pub question_text: String,
    pub choice_text: String,
    pub votes: i32,
}
