/// Minimal read-only client for a PostgREST endpoint (the Supabase REST API).
///
/// Only `select` queries are issued. Filters use PostgREST's operator syntax, built with
/// [`eq`] and [`in_list`].
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::CommonError;
use crate::openai::read_limited_text;

const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

#[derive(Clone, Debug)]
pub struct PostgrestConfig {
    /// Project URL, e.g. "https://xyz.supabase.co". `/rest/v1` is appended.
    pub url: String,
    /// Anonymous (publishable) API key.
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct PostgrestClient {
    rest_url: String,
    api_key: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl PostgrestClient {
    pub fn new(config: PostgrestConfig) -> Result<Self, CommonError> {
        let url = config.url.trim().trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CommonError::Config(format!(
                "supabase url must be http(s): {url}"
            )));
        }
        let http = reqwest::Client::builder()
            .user_agent("vitalcol/triage-server")
            .build()?;
        Ok(Self {
            rest_url: format!("{url}/rest/v1"),
            api_key: config.api_key,
            timeout: config.timeout,
            http,
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    /// `GET /rest/v1/{table}?select={columns}&{filters}` decoded as a JSON array.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, CommonError> {
        let url = self.table_url(table);
        let mut query: Vec<(&str, &str)> = vec![("select", columns)];
        query.extend(filters.iter().map(|(k, v)| (*k, v.as_str())));
        debug!(table, filters = filters.len(), "postgrest select");

        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = read_limited_text(resp, MAX_ERROR_BODY_BYTES).await;
            return Err(CommonError::Upstream { status, body });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// `eq.{value}` filter.
pub fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// `in.("a","b")` filter. Values are double-quoted so commas inside them stay literal.
pub fn in_list<S: AsRef<str>>(values: &[S]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.as_ref().replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> PostgrestConfig {
        PostgrestConfig {
            url: url.to_string(),
            api_key: "anon".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn builds_rest_table_urls() {
        let client = PostgrestClient::new(config("https://demo.supabase.co/")).unwrap();
        assert_eq!(
            client.table_url("medical_facilities"),
            "https://demo.supabase.co/rest/v1/medical_facilities"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        let err = PostgrestClient::new(config("demo.supabase.co")).err().unwrap();
        assert!(matches!(err, CommonError::Config(_)));
    }

    #[test]
    fn formats_filters() {
        assert_eq!(eq("abc"), "eq.abc");
        assert_eq!(in_list(&["a", "b"]), r#"in.("a","b")"#);
        assert_eq!(in_list(&[r#"x"y"#]), r#"in.("x\"y")"#);
        assert_eq!(in_list::<&str>(&[]), "in.()");
    }
}
