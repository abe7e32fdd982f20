// src/store.rs
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Choice, ExportRow, NewPoll, Question, QuestionDetail, User};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Username already taken: {0}")]
    DuplicateUsername(String),
}

/// Questions, choices and vote counters.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Questions published at or before `now`, newest first.
    async fn latest_questions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Question>, StoreError>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>, StoreError>;

    /// Choices of a question, ordered by id.
    async fn choices_for(&self, question_id: i64) -> Result<Vec<Choice>, StoreError>;

    /// Adds one vote to `choice_id` if it belongs to `question_id`.
    ///
    /// Returns `false` when no such choice exists. The increment happens in a
    /// single storage operation so concurrent votes are never lost.
    async fn increment_vote(&self, question_id: i64, choice_id: i64) -> Result<bool, StoreError>;

    /// Persists a question and all of its choices with zero votes.
    async fn create_poll(
        &self,
        poll: &NewPoll,
        pub_date: DateTime<Utc>,
    ) -> Result<QuestionDetail, StoreError>;

    /// Questions with `from <= pub_date <= to`, ordered by id, with their choices.
    async fn questions_published_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<QuestionDetail>, StoreError>;

    /// Every (question, choice, votes) triple, ordered by question then choice id.
    async fn export_rows(&self) -> Result<Vec<ExportRow>, StoreError>;
}

/// User accounts and login sessions.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Starts a session and drops sessions that have already expired.
    async fn create_session(
        &self,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError>;

    /// The user owning `token`, unless the session is unknown or expired.
    async fn session_user(&self, token: Uuid, now: DateTime<Utc>)
        -> Result<Option<User>, StoreError>;

    async fn delete_session(&self, token: Uuid) -> Result<(), StoreError>;
}

#[derive(Debug)]
struct Session {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    questions: BTreeMap<i64, Question>,
    choices: BTreeMap<i64, Choice>,
    users: BTreeMap<i64, User>,
    sessions: HashMap<Uuid, Session>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn choices_of(&self, question_id: i64) -> Vec<Choice> {
        self.choices
            .values()
            .filter(|c| c.question_id == question_id)
            .cloned()
            .collect()
    }

    fn insert_question(
        &mut self,
        question_text: &str,
        pub_date: DateTime<Utc>,
        choices: &[(&str, i32)],
    ) -> QuestionDetail {
        let question = Question {
            id: self.next_id(),
            question_text: question_text.to_string(),
            pub_date,
        };
        self.questions.insert(question.id, question.clone());

        let mut created = Vec::with_capacity(choices.len());
        for (text, votes) in choices {
            let choice = Choice {
                id: self.next_id(),
                question_id: question.id,
                choice_text: text.to_string(),
                votes: *votes,
            };
            self.choices.insert(choice.id, choice.clone());
            created.push(choice);
        }

        QuestionDetail {
            question,
            choices: created,
        }
    }
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a question with preset vote counts, bypassing validation.
    pub fn seed_question(
        &self,
        question_text: &str,
        pub_date: DateTime<Utc>,
        choices: &[(&str, i32)],
    ) -> QuestionDetail {
        self.state
            .write()
            .insert_question(question_text, pub_date, choices)
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn latest_questions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Question>, StoreError> {
        let state = self.state.read();
        let mut questions: Vec<Question> = state
            .questions
            .values()
            .filter(|q| q.pub_date <= now)
            .cloned()
            .collect();
        questions.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
        questions.truncate(limit);
        Ok(questions)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, StoreError> {
        Ok(self.state.read().questions.get(&id).cloned())
    }

    async fn choices_for(&self, question_id: i64) -> Result<Vec<Choice>, StoreError> {
        Ok(self.state.read().choices_of(question_id))
    }

    async fn increment_vote(&self, question_id: i64, choice_id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.write();
        match state.choices.get_mut(&choice_id) {
            Some(choice) if choice.question_id == question_id => {
                choice.votes = choice.votes.saturating_add(1);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_poll(
        &self,
        poll: &NewPoll,
        pub_date: DateTime<Utc>,
    ) -> Result<QuestionDetail, StoreError> {
        let choices: Vec<(&str, i32)> = poll.choices.iter().map(|c| (c.as_str(), 0)).collect();
        Ok(self
            .state
            .write()
            .insert_question(&poll.question_text, pub_date, &choices))
    }

    async fn questions_published_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<QuestionDetail>, StoreError> {
        let state = self.state.read();
        Ok(state
            .questions
            .values()
            .filter(|q| q.pub_date >= from && q.pub_date <= to)
            .map(|q| QuestionDetail {
                question: q.clone(),
                choices: state.choices_of(q.id),
            })
            .collect())
    }

    async fn export_rows(&self) -> Result<Vec<ExportRow>, StoreError> {
        let state = self.state.read();
        let mut rows = Vec::new();
        for question in state.questions.values() {
            for choice in state.choices_of(question.id) {
                rows.push(ExportRow {
                    question_text: question.question_text.clone(),
                    choice_text: choice.choice_text,
                    votes: choice.votes,
                });
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut state = self.state.write();
        if state.users.values().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }

        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            date_joined: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read();
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_session(
        &self,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let token = Uuid::new_v4();
        let now = Utc::now();
        let mut state = self.state.write();
        state.sessions.retain(|_, s| s.expires_at > now);
        state.sessions.insert(
            token,
            Session {
                user_id,
                expires_at,
            },
        );
        Ok(token)
    }

    async fn session_user(
        &self,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let state = self.state.read();
        Ok(state
            .sessions
            .get(&token)
            .filter(|s| s.expires_at > now)
            .and_then(|s| state.users.get(&s.user_id))
            .cloned())
    }

    async fn delete_session(&self, token: Uuid) -> Result<(), StoreError> {
        self.state.write().sessions.remove(&token);
        Ok(())
    }
}
