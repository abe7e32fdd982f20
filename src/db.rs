// src/db.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::{Choice, ExportRow, NewPoll, Question, QuestionDetail, User};
use crate::store::{AccountStore, PollStore, StoreError};

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn latest_questions(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Question>, StoreError> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, question_text, pub_date
            FROM questions
            WHERE pub_date <= $1
            ORDER BY pub_date DESC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, StoreError> {
        let question = sqlx::query_as::<_, Question>(
            "SELECT id, question_text, pub_date FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(question)
    }

    async fn choices_for(&self, question_id: i64) -> Result<Vec<Choice>, StoreError> {
        let choices = sqlx::query_as::<_, Choice>(
            r#"
            SELECT id, question_id, choice_text, votes
            FROM choices
            WHERE question_id = $1
            ORDER BY id
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(choices)
    }

    async fn increment_vote(&self, question_id: i64, choice_id: i64) -> Result<bool, StoreError> {
        // Evaluated server-side so two concurrent votes cannot overwrite each other
        let result = sqlx::query(
            r#"
            UPDATE choices
            SET votes = votes + 1
            WHERE id = $1 AND question_id = $2
            "#,
        )
        .bind(choice_id)
        .bind(question_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_poll(
        &self,
        poll: &NewPoll,
        pub_date: DateTime<Utc>,
    ) -> Result<QuestionDetail, StoreError> {
        let mut tx = self.pool.begin().await?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (question_text, pub_date)
            VALUES ($1, $2)
            RETURNING id, question_text, pub_date
            "#,
        )
        .bind(&poll.question_text)
        .bind(pub_date)
        .fetch_one(&mut *tx)
        .await?;

        let mut choices = Vec::with_capacity(poll.choices.len());
        for choice_text in &poll.choices {
            let choice = sqlx::query_as::<_, Choice>(
                r#"
                INSERT INTO choices (question_id, choice_text, votes)
                VALUES ($1, $2, 0)
                RETURNING id, question_id, choice_text, votes
                "#,
            )
            .bind(question.id)
            .bind(choice_text)
            .fetch_one(&mut *tx)
            .await?;
            choices.push(choice);
        }

        tx.commit().await?;

        Ok(QuestionDetail { question, choices })
    }

    async fn questions_published_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<QuestionDetail>, StoreError> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, question_text, pub_date
            FROM questions
            WHERE pub_date BETWEEN $1 AND $2
            ORDER BY id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let choices = sqlx::query_as::<_, Choice>(
            r#"
            SELECT id, question_id, choice_text, votes
            FROM choices
            WHERE question_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<Choice>> = HashMap::new();
        for choice in choices {
            by_question.entry(choice.question_id).or_default().push(choice);
        }

        Ok(questions
            .into_iter()
            .map(|question| QuestionDetail {
                choices: by_question.remove(&question.id).unwrap_or_default(),
                question,
            })
            .collect())
    }

    async fn export_rows(&self) -> Result<Vec<ExportRow>, StoreError> {
        let rows = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT q.question_text, c.choice_text, c.votes
            FROM questions q
            JOIN choices c ON c.question_id = q.id
            ORDER BY q.id, c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash, date_joined
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateUsername(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, date_joined FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_session(
        &self,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let token = Uuid::new_v4();
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        Ok(token)
    }

    async fn session_user(
        &self,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.password_hash, u.date_joined
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_session(&self, token: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
