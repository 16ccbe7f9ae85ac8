use anyhow::{Context, Result};
use async_trait::async_trait;
use avrobq_core::{BigQuerySinkSpec, ErrorDetail, Row, RowError, RowSink, TableRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Streams rows into a BigQuery table through the `tabledata.insertAll` API
///
/// One call per batch. Rejected rows come back as [`RowError`]s; only
/// transport failures and non-success statuses fail the call.
pub struct BigQuerySink {
    table: TableRef,
    url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct InsertAllRequest<'a> {
    kind: &'static str,
    rows: Vec<InsertRow<'a>>,
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    #[serde(rename = "insertId")]
    insert_id: String,
    json: &'a Row,
}

#[derive(Debug, Default, Deserialize)]
struct InsertAllResponse {
    #[serde(default, rename = "insertErrors")]
    insert_errors: Vec<InsertErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct InsertErrorEntry {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

impl BigQuerySink {
    pub fn new(spec: &BigQuerySinkSpec) -> Self {
        let access_token = spec.access_token_env.as_ref().and_then(|var| match std::env::var(var) {
            Ok(token) => Some(token),
            Err(_) => {
                warn!("Access token variable {} is not set, sending unauthenticated requests", var);
                None
            }
        });
        Self {
            table: spec.table_ref(),
            url: insert_all_url(spec),
            access_token,
            client: reqwest::Client::new(),
        }
    }
}

fn insert_all_url(spec: &BigQuerySinkSpec) -> String {
    format!(
        "{}/bigquery/v2/projects/{}/datasets/{}/tables/{}/insertAll",
        spec.endpoint.trim_end_matches('/'),
        spec.project,
        spec.dataset,
        spec.table
    )
}

fn request_body(rows: &[Row]) -> InsertAllRequest<'_> {
    InsertAllRequest {
        kind: "bigquery#tableDataInsertAllRequest",
        rows: rows
            .iter()
            .map(|row| InsertRow {
                insert_id: Uuid::new_v4().to_string(),
                json: row,
            })
            .collect(),
    }
}

fn row_errors(response: InsertAllResponse) -> Vec<RowError> {
    response
        .insert_errors
        .into_iter()
        .map(|entry| RowError {
            index: entry.index,
            errors: entry.errors,
        })
        .collect()
}

#[async_trait]
impl RowSink for BigQuerySink {
    fn table(&self) -> &TableRef {
        &self.table
    }

    async fn insert_rows(&self, rows: &[Row]) -> Result<Vec<RowError>> {
        info!("Inserting {} rows into {}", rows.len(), self.table);
        let mut request = self.client.post(&self.url).json(&request_body(rows));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("insertAll request to {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("insertAll into {} returned {}: {}", self.table, status, body);
        }

        let parsed: InsertAllResponse = response
            .json()
            .await
            .context("decoding insertAll response")?;
        debug!(rejected = parsed.insert_errors.len(), "insertAll response");
        Ok(row_errors(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> BigQuerySinkSpec {
        BigQuerySinkSpec {
            project: "proj".into(),
            dataset: "airline".into(),
            table: "airline_details".into(),
            endpoint: "http://localhost:9050/".into(),
            access_token_env: None,
        }
    }

    #[test]
    fn url_targets_table() {
        assert_eq!(
            insert_all_url(&spec()),
            "http://localhost:9050/bigquery/v2/projects/proj/datasets/airline/tables/airline_details/insertAll"
        );
    }

    #[test]
    fn body_wraps_rows_with_insert_ids() {
        let rows = vec![
            Row {
                id: 1.into(),
                ..Row::default()
            },
            Row {
                id: 2.into(),
                ..Row::default()
            },
        ];
        let body = serde_json::to_value(request_body(&rows)).unwrap();
        assert_eq!(body["kind"], json!("bigquery#tableDataInsertAllRequest"));
        let sent = body["rows"].as_array().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1]["json"]["id"], json!(2));
        assert_eq!(sent[1]["json"].as_object().unwrap().len(), 13);
        assert_ne!(sent[0]["insertId"], sent[1]["insertId"]);
    }

    #[test]
    fn insert_errors_become_row_errors() {
        let response: InsertAllResponse = serde_json::from_value(json!({
            "kind": "bigquery#tableDataInsertAllResponse",
            "insertErrors": [
                {"index": 1, "errors": [
                    {"reason": "invalid", "location": "distance", "debugInfo": "", "message": "Cannot convert value to integer"}
                ]},
                {"index": 4, "errors": [{"reason": "stopped", "location": "", "message": ""}]}
            ]
        }))
        .unwrap();
        let errors = row_errors(response);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].index, 1);
        assert_eq!(errors[0].errors[0].location, "distance");
        assert_eq!(errors[1].errors[0].reason, "stopped");
    }

    #[test]
    fn success_response_has_no_errors() {
        let response: InsertAllResponse =
            serde_json::from_value(json!({"kind": "bigquery#tableDataInsertAllResponse"})).unwrap();
        assert!(row_errors(response).is_empty());
    }
}
