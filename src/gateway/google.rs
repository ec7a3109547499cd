//! Google Sheets API v4 クライアント
//!
//! `spreadsheets.values` の get / update / append / clear だけを使う。
//! 認証はBearerトークン（取得・更新は外部で行う）。

use super::api::SheetsApi;
use crate::config::Config;
use crate::error::{Result, SheetError};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::{json, Value};
use sheetdesk_common::SheetRange;
use std::time::Duration;

/// `values.get` のレスポンス
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
    value_input_option: String,
}

impl GoogleSheetsClient {
    pub fn new(
        base_url: &str,
        spreadsheet_id: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SheetError::transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: access_token.to_string(),
            value_input_option: "USER_ENTERED".into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut client = Self::new(
            &config.api_base_url,
            &config.spreadsheet_id()?,
            &config.access_token()?,
            Duration::from_secs(config.timeout_seconds),
        )?;
        client.value_input_option = config.value_input_option.clone();
        Ok(client)
    }

    fn values_url(&self, range: &SheetRange, suffix: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}{}",
            self.base_url,
            utf8_percent_encode(&self.spreadsheet_id, NON_ALPHANUMERIC),
            utf8_percent_encode(&range.to_string(), NON_ALPHANUMERIC),
            suffix
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SheetError::transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SheetError::Transport {
            message: api_error_message(&body),
            status: Some(status.as_u16()),
        })
    }
}

/// エラーレスポンスから `error.message` を取り出す（取れなければ本文そのまま）
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ => body.trim().to_string(),
    }
}

/// 数値・真偽値のセルも文字列として扱う
fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Bool(true) => "TRUE".into(),
        Value::Bool(false) => "FALSE".into(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn get_values(&self, range: &SheetRange) -> Result<Vec<Vec<String>>> {
        log::debug!("GET {}", range);
        let response = self.send(self.http.get(self.values_url(range, ""))).await?;
        let payload: ValueRange = response
            .json()
            .await
            .map_err(|e| SheetError::transport(format!("レスポンスの解析に失敗: {}", e)))?;

        Ok(payload
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn update_values(&self, range: &SheetRange, rows: Vec<Vec<String>>) -> Result<()> {
        log::debug!("UPDATE {} ({}行)", range, rows.len());
        let request = self
            .http
            .put(self.values_url(range, ""))
            .query(&[("valueInputOption", self.value_input_option.as_str())])
            .json(&json!({ "range": range.to_string(), "majorDimension": "ROWS", "values": rows }));
        self.send(request).await?;
        Ok(())
    }

    async fn append_values(&self, range: &SheetRange, rows: Vec<Vec<String>>) -> Result<()> {
        log::debug!("APPEND {} ({}行)", range, rows.len());
        let request = self
            .http
            .post(self.values_url(range, ":append"))
            .query(&[
                ("valueInputOption", self.value_input_option.as_str()),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "majorDimension": "ROWS", "values": rows }));
        self.send(request).await?;
        Ok(())
    }

    async fn clear_values(&self, range: &SheetRange) -> Result<()> {
        log::debug!("CLEAR {}", range);
        let request = self
            .http
            .post(self.values_url(range, ":clear"))
            .json(&json!({}));
        self.send(request).await?;
        Ok(())
    }
}
