use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::RequestConfig;
use crate::error::{SubmissionError, SubmissionResult};
use crate::submission::SubmissionRecord;

/// Columns A..R of the results sheet.
const SHEET_RANGE: &str = "Sheet1!A:R";

/// Separator between several strongest-dimension labels in one cell.
const LABEL_SEPARATOR: &str = "、";

/// Flatten a record into one spreadsheet row: name, date, time, eight scores,
/// total, four abilities with two decimals, strongest labels, weakest label.
pub fn sheet_row(record: &SubmissionRecord) -> Vec<Value> {
    let mut row = vec![
        json!(record.name),
        json!(record.test_date),
        json!(record.test_time),
    ];
    row.extend((1..=8).map(|id| json!(record.scores.problem(id))));
    row.push(json!(record.scores.total));
    row.extend(
        record
            .ability_values()
            .iter()
            .map(|(_, value)| json!(format!("{:.2}", value))),
    );
    row.push(json!(record.analysis.strongest.join(LABEL_SEPARATOR)));
    row.push(json!(record.analysis.weakest));
    row
}

/// Minimal client for the spreadsheet values-append API
#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    base_url: String,
}

impl SheetsClient {
    /// Create a new spreadsheet client
    pub fn new(base_url: &str, request_config: &RequestConfig) -> SubmissionResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(SubmissionError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Append one row to the sheet
    pub async fn append_row(
        &self,
        sheet_id: &str,
        api_key: &str,
        row: Vec<Value>,
    ) -> SubmissionResult<()> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append",
            self.base_url, sheet_id, SHEET_RANGE
        );
        debug!(sheet_id = %sheet_id, columns = row.len(), "Appending spreadsheet row");

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .query(&[("valueInputOption", "RAW"), ("key", api_key)])
            .json(&json!({ "values": [row] }))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        info!(
            sheet_id = %sheet_id,
            latency_ms = start.elapsed().as_millis(),
            "Spreadsheet row appended"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::sample_record;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sheet_row_layout() {
        let row = sheet_row(&sample_record());

        assert_eq!(row.len(), 18);
        assert_eq!(row[0], json!("山田太郎"));
        assert_eq!(row[1], json!("2024-06-01"));
        assert_eq!(row[2], json!("09:12:05"));
        assert_eq!(row[3], json!(2.5));
        assert_eq!(row[8], json!(2.5));
        assert_eq!(row[11], json!(5.0));
        assert_eq!(row[12], json!("2.50"));
        assert_eq!(row[13], json!("0.00"));
        assert_eq!(row[16], json!("読解、認知"));
        assert_eq!(row[17], json!("集中・注意"));
    }
}
