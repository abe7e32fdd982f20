// src/query.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::AppError, models::Choice, store::PollStore};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionQuery {
    #[serde(rename = "publication-dates")]
    pub publication_dates: Option<DateRangeInput>,
    #[serde(rename = "votes-range")]
    pub votes_range: Option<VotesRangeInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeInput {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VotesRangeInput {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PublicationDates {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Inclusive vote bounds; no `max` means unbounded. Any JSON number is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VotesRange {
    pub min: f64,
    pub max: Option<f64>,
}

impl VotesRange {
    pub fn contains(&self, total: i64) -> bool {
        let total = total as f64;
        total >= self.min && self.max.map_or(true, |max| total <= max)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionSummary {
    pub id: i64,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub total_votes: i64,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionQueryResponse {
    #[serde(rename = "publication-dates")]
    pub publication_dates: PublicationDates,
    #[serde(rename = "votes-range")]
    pub votes_range: VotesRange,
    pub questions: Vec<QuestionSummary>,
}

impl QuestionQuery {
    /// Parses a request body, treating an empty body as "no filters".
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| AppError::MalformedPayload(e.to_string()))
    }

    /// Both dates given: their whole days. Otherwise the last `default_days` days up to the end of today.
    pub fn resolve_dates(
        &self,
        now: DateTime<Utc>,
        default_days: i64,
    ) -> Result<PublicationDates, AppError> {
        let given = self
            .publication_dates
            .as_ref()
            .and_then(|range| Some((range.from.as_deref()?, range.to.as_deref()?)));

        let (from, to) = match given {
            Some((from, to)) => (parse_date(from)?, parse_date(to)?),
            None => ((now - Duration::days(default_days)).date_naive(), now.date_naive()),
        };

        Ok(PublicationDates {
            from: start_of_day(from),
            to: end_of_day(to),
        })
    }

    pub fn resolve_votes(&self) -> VotesRange {
        let input = self.votes_range.clone().unwrap_or_default();
        VotesRange {
            min: input.min.unwrap_or(0.0),
            max: input.max,
        }
    }
}

pub async fn filter_questions(
    store: &dyn PollStore,
    query: &QuestionQuery,
    now: DateTime<Utc>,
    default_days: i64,
) -> Result<QuestionQueryResponse, AppError> {
    let dates = query.resolve_dates(now, default_days)?;
    let votes = query.resolve_votes();

    let questions: Vec<QuestionSummary> = store
        .questions_published_between(dates.from, dates.to)
        .await?
        .into_iter()
        .map(|detail| QuestionSummary {
            total_votes: detail.total_votes(),
            id: detail.question.id,
            question_text: detail.question.question_text,
            pub_date: detail.question.pub_date,
            choices: detail.choices,
        })
        .filter(|summary| votes.contains(summary.total_votes))
        .collect();

    debug!(
        from = %dates.from,
        to = %dates.to,
        min = votes.min,
        max = ?votes.max,
        matched = questions.len(),
        "Filtered questions"
    );

    Ok(QuestionQueryResponse {
        publication_dates: dates,
        votes_range: votes,
        questions,
    })
}

fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| AppError::MalformedPayload(format!("invalid date {value:?}: {e}")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    // 23:59:59 always exists
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    date.and_time(last_second).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_default_window_is_sixty_days_of_whole_days() {
        let now = at(2024, 5, 31, 13, 45, 0);
        let dates = QuestionQuery::default().resolve_dates(now, 60).unwrap();
        assert_eq!(dates.from, at(2024, 4, 1, 0, 0, 0));
        assert_eq!(dates.to, at(2024, 5, 31, 23, 59, 59));
    }

    #[test]
    fn test_explicit_dates_cover_whole_days() {
        let query = QuestionQuery::from_body(
            br#"{"publication-dates": {"from": "2024-01-10", "to": "2024-01-12"}}"#,
        )
        .unwrap();
        let dates = query.resolve_dates(Utc::now(), 60).unwrap();
        assert_eq!(dates.from, at(2024, 1, 10, 0, 0, 0));
        assert_eq!(dates.to, at(2024, 1, 12, 23, 59, 59));
    }

    #[test]
    fn test_half_a_date_range_falls_back_to_default() {
        let now = at(2024, 5, 31, 8, 0, 0);
        let query =
            QuestionQuery::from_body(br#"{"publication-dates": {"from": "2020-01-01"}}"#).unwrap();
        let dates = query.resolve_dates(now, 60).unwrap();
        assert_eq!(dates.from, at(2024, 4, 1, 0, 0, 0));
    }

    #[test]
    fn test_malformed_input() {
        let query = QuestionQuery::from_body(
            br#"{"publication-dates": {"from": "10/01/2024", "to": "2024-01-12"}}"#,
        )
        .unwrap();
        assert!(matches!(
            query.resolve_dates(Utc::now(), 60),
            Err(AppError::MalformedPayload(_))
        ));
        assert!(matches!(
            QuestionQuery::from_body(b"{not json"),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_votes_range_defaults() {
        let empty = QuestionQuery::from_body(b"").unwrap().resolve_votes();
        assert_eq!(empty, VotesRange { min: 0.0, max: None });
        assert!(empty.contains(0));
        assert!(empty.contains(i64::MAX));

        let min_only = QuestionQuery::from_body(br#"{"votes-range": {"min": 5}}"#)
            .unwrap()
            .resolve_votes();
        assert!(!min_only.contains(4));
        assert!(min_only.contains(5));

        let bounded = VotesRange {
            min: 2.0,
            max: Some(3.0),
        };
        assert!(bounded.contains(3));
        assert!(!bounded.contains(4));
    }

    #[test]
    fn test_votes_range_accepts_fractional_bounds() {
        let range = QuestionQuery::from_body(br#"{"votes-range": {"min": 5.0, "max": 7.5}}"#)
            .unwrap()
            .resolve_votes();
        assert_eq!(range.min, 5.0);
        assert!(!range.contains(4));
        assert!(range.contains(5));
        assert!(range.contains(7));
        assert!(!range.contains(8));
    }

    #[tokio::test]
    async fn test_filter_by_dates_and_votes() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.seed_question("popular", now - Duration::days(1), &[("a", 4), ("b", 2)]);
        store.seed_question("quiet", now - Duration::days(2), &[("a", 1)]);
        store.seed_question("empty", now - Duration::days(3), &[]);
        store.seed_question("ancient", now - Duration::days(90), &[("a", 50)]);

        let all = filter_questions(&store, &QuestionQuery::default(), now, 60)
            .await
            .unwrap();
        let texts: Vec<&str> = all.questions.iter().map(|q| q.question_text.as_str()).collect();
        assert_eq!(texts, vec!["popular", "quiet", "empty"]);
        assert_eq!(all.questions[0].total_votes, 6);
        assert_eq!(all.questions[2].total_votes, 0);

        let query = QuestionQuery::from_body(br#"{"votes-range": {"min": 5}}"#).unwrap();
        let busy = filter_questions(&store, &query, now, 60).await.unwrap();
        assert_eq!(busy.questions.len(), 1);
        assert_eq!(busy.questions[0].question_text, "popular");
    }
}
