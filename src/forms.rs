// src/forms.rs
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::NewPoll;

pub const REQUIRED: &str = "This field is required.";
pub const MAX_TEXT_LENGTH: usize = 200;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Key used for errors that are not tied to one field.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PollForm {
    #[serde(default)]
    pub question_text: String,
    /// One choice per line.
    #[serde(default)]
    pub choices: String,
}

impl PollForm {
    pub fn validate(&self) -> Result<NewPoll, FieldErrors> {
        let mut errors = FieldErrors::new();

        let question_text = self.question_text.trim();
        if question_text.is_empty() {
            errors.add("question_text", REQUIRED);
        } else if question_text.chars().count() > MAX_TEXT_LENGTH {
            errors.add(
                "question_text",
                format!(
                    "Ensure this value has at most {MAX_TEXT_LENGTH} characters (it has {}).",
                    question_text.chars().count()
                ),
            );
        }

        let choices = parse_choices(&self.choices);
        if choices.is_empty() {
            errors.add("choices", REQUIRED);
        }
        for choice in &choices {
            let length = choice.chars().count();
            if length > MAX_TEXT_LENGTH {
                errors.add(
                    "choices",
                    format!("Ensure each choice has at most {MAX_TEXT_LENGTH} characters (one has {length})."),
                );
            }
        }

        errors.into_result(NewPoll {
            question_text: question_text.to_string(),
            choices,
        })
    }
}

/// Splits a choices block into trimmed, non-blank lines.
pub fn parse_choices(block: &str) -> Vec<String> {
    block
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

impl VoteForm {
    /// The submitted choice id, if present and numeric.
    pub fn choice_id(&self) -> Option<i64> {
        self.choice.as_deref()?.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

/// Username and password that passed form validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if username.chars().count() > MAX_USERNAME_LENGTH {
            errors.add(
                "username",
                format!("Ensure this value has at most {MAX_USERNAME_LENGTH} characters."),
            );
        } else if !username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        } else {
            if self.password1.chars().count() < MIN_PASSWORD_LENGTH {
                errors.add(
                    "password2",
                    format!("This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."),
                );
            }
            if self.password1.chars().all(|c| c.is_ascii_digit()) {
                errors.add("password2", "This password is entirely numeric.");
            }
        }

        errors.into_result(Credentials {
            username: username.to_string(),
            password: self.password1.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<Credentials, FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }

        errors.into_result(Credentials {
            username: username.to_string(),
            password: self.password.clone(),
        })
    }

    /// `next` if it points back into this site, never to another host.
    pub fn safe_next(&self) -> Option<&str> {
        self.next
            .as_deref()
            .filter(|next| next.starts_with('/') && !next.starts_with("//"))
    }
}
