// src/export.rs
use tracing::info;

use crate::{error::AppError, models::ExportRow, store::PollStore};

pub const EXPORT_FILENAME: &str = "polls_data.csv";
const HEADER: [&str; 3] = ["Question", "Choice", "Votes"];

/// Every (question, choice, votes) triple as CSV, header first.
pub async fn export_csv(store: &dyn PollStore) -> Result<Vec<u8>, AppError> {
    let rows = store.export_rows().await?;
    info!(rows = rows.len(), "Exporting poll data");
    write_csv(&rows)
}

pub fn write_csv(rows: &[ExportRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record([
            row.question_text.as_str(),
            row.choice_text.as_str(),
            row.votes.to_string().as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Export(csv::Error::from(e.into_error())))
}
