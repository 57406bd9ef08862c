//! Blocking HTTP client for the JianDaoYun open API.
//!
//! Every endpoint is a JSON `POST` authenticated with `Authorization: Bearer
//! <api key>`. A 2xx response whose body carries a non-zero `code` is
//! reported as [`ApiError::Api`].

use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::source::{FormApi, MetadataSource};
use crate::types::{
    ApplicationSummary, DataIds, FieldDescriptor, FormSummary, FormTarget, QueryOptions,
    SubmitOptions, UpdateOptions, DEFAULT_QUERY_LIMIT,
};

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://api.jiandaoyun.com";

/// Default timeout for HTTP requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`FormApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the underlying client can't be built.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str, body: &Value, credential: &str) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");
        trace!(body = %body, "request body");

        let response = self
            .http
            .post(&url)
            .bearer_auth(credential)
            .json(body)
            .send()
            .map_err(transport)?;

        let status = response.status();
        let text = response.text().map_err(transport)?;
        let parsed: Option<Value> = serde_json::from_str(&text).ok();
        trace!(status = status.as_u16(), body = %text, "response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                code: parsed.as_ref().and_then(body_code),
                message: parsed.as_ref().and_then(body_message),
            });
        }

        let parsed = parsed.ok_or_else(|| ApiError::InvalidResponse {
            message: format!("response from {path} is not valid JSON"),
        })?;

        match body_code(&parsed) {
            Some(code) if code != 0 => Err(ApiError::Api {
                code,
                message: body_message(&parsed).unwrap_or_else(|| "unknown error".to_string()),
            }),
            _ => Ok(parsed),
        }
    }

    // Data endpoints wrap their payload in `data`; return that when present.
    fn post_data(&self, path: &str, body: &Value, credential: &str) -> Result<Value, ApiError> {
        let mut response = self.post(path, body, credential)?;
        match response.get_mut("data").map(Value::take) {
            Some(data) => Ok(data),
            None => Ok(response),
        }
    }
}

impl MetadataSource for HttpClient {
    fn list_applications(&self, credential: &str) -> Result<Vec<ApplicationSummary>, ApiError> {
        let body = self.post("/api/v5/app/list", &json!({}), credential)?;
        let items = extract_list(&body, &["apps", "data"], "application list")?;
        Ok(items.iter().filter_map(ApplicationSummary::from_json).collect())
    }

    fn list_forms(&self, app_id: &str, credential: &str) -> Result<Vec<FormSummary>, ApiError> {
        let path = format!("/api/v1/app/{app_id}/entry/list");
        let body = self.post(&path, &json!({}), credential)?;
        let items = extract_list(&body, &["forms", "data"], "form list")?;
        Ok(items.iter().filter_map(FormSummary::from_json).collect())
    }

    fn list_fields(
        &self,
        form_id: &str,
        app_id: Option<&str>,
        credential: &str,
    ) -> Result<Vec<FieldDescriptor>, ApiError> {
        let mut request = Map::new();
        if let Some(app_id) = app_id {
            request.insert("app_id".into(), json!(app_id));
        }
        request.insert("entry_id".into(), json!(form_id));

        let body = self.post(
            "/api/v5/app/entry/widget/list",
            &Value::Object(request),
            credential,
        )?;
        let items = extract_list(&body, &["widgets"], "widget list")?;
        Ok(items.iter().filter_map(FieldDescriptor::from_widget).collect())
    }
}

impl FormApi for HttpClient {
    fn create_records(
        &self,
        target: FormTarget<'_>,
        records: Vec<Map<String, Value>>,
        options: &SubmitOptions,
        credential: &str,
    ) -> Result<Value, ApiError> {
        let mut request = target_body(target);
        let path = if records.len() == 1 {
            let record = records.into_iter().next().unwrap_or_default();
            request.insert("data".into(), Value::Object(record));
            "/api/v5/app/entry/data/create"
        } else {
            let list = records.into_iter().map(Value::Object).collect();
            request.insert("data_list".into(), Value::Array(list));
            "/api/v5/app/entry/data/batch_create"
        };

        insert_opt(&mut request, "transaction_id", options.transaction_id.as_deref());
        insert_opt(&mut request, "data_creator", options.data_creator.as_deref());
        insert_opt(&mut request, "is_start_workflow", options.is_start_workflow);
        insert_opt(&mut request, "is_start_trigger", options.is_start_trigger);

        self.post_data(path, &Value::Object(request), credential)
    }

    fn get_record(
        &self,
        target: FormTarget<'_>,
        data_id: &str,
        credential: &str,
    ) -> Result<Value, ApiError> {
        let mut request = target_body(target);
        request.insert("data_id".into(), json!(data_id));
        self.post_data("/api/v5/app/entry/data/get", &Value::Object(request), credential)
    }

    fn query_records(
        &self,
        target: FormTarget<'_>,
        query: &QueryOptions,
        credential: &str,
    ) -> Result<Value, ApiError> {
        let mut request = target_body(target);
        request.insert(
            "limit".into(),
            json!(query.limit.unwrap_or(DEFAULT_QUERY_LIMIT)),
        );
        insert_opt(&mut request, "data_id", query.data_id.as_deref());
        if !query.fields.is_empty() {
            request.insert("fields".into(), json!(query.fields));
        }
        if let Some(filter) = &query.filter {
            request.insert("filter".into(), filter.clone());
        }
        self.post_data("/api/v5/app/entry/data/list", &Value::Object(request), credential)
    }

    fn update_record(
        &self,
        target: FormTarget<'_>,
        data_id: &str,
        record: Map<String, Value>,
        options: &UpdateOptions,
        credential: &str,
    ) -> Result<Value, ApiError> {
        let mut request = target_body(target);
        request.insert("data_id".into(), json!(data_id));
        request.insert("data".into(), Value::Object(record));
        insert_opt(&mut request, "transaction_id", options.transaction_id.as_deref());
        insert_opt(&mut request, "is_start_trigger", options.is_start_trigger);
        self.post_data(
            "/api/v5/app/entry/data/update",
            &Value::Object(request),
            credential,
        )
    }

    fn delete_records(
        &self,
        target: FormTarget<'_>,
        ids: &DataIds,
        is_start_trigger: Option<bool>,
        credential: &str,
    ) -> Result<Value, ApiError> {
        let mut request = target_body(target);
        let path = match ids {
            DataIds::One(id) => {
                request.insert("data_id".into(), json!(id));
                "/api/v5/app/entry/data/delete"
            }
            DataIds::Many(ids) => {
                request.insert("data_ids".into(), json!(ids));
                "/api/v5/app/entry/data/batch_delete"
            }
        };
        insert_opt(&mut request, "is_start_trigger", is_start_trigger);
        self.post_data(path, &Value::Object(request), credential)
    }

    fn upload_token(
        &self,
        target: FormTarget<'_>,
        transaction_id: &str,
        credential: &str,
    ) -> Result<Value, ApiError> {
        let mut request = target_body(target);
        request.insert("transaction_id".into(), json!(transaction_id));
        self.post_data(
            "/api/v5/app/entry/file/get_upload_token",
            &Value::Object(request),
            credential,
        )
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport {
        message: err.to_string(),
    }
}

fn body_code(body: &Value) -> Option<i64> {
    body.get("code").and_then(Value::as_i64)
}

fn body_message(body: &Value) -> Option<String> {
    body.get("msg")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(String::from)
}

fn target_body(target: FormTarget<'_>) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("app_id".into(), json!(target.app_id));
    body.insert("entry_id".into(), json!(target.form_id));
    body
}

fn insert_opt<T: Into<Value>>(body: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        body.insert(key.to_string(), value.into());
    }
}

/// Find the listing array in a response: a bare array, or the first of
/// `keys` that holds one.
fn extract_list<'a>(body: &'a Value, keys: &[&str], what: &str) -> Result<&'a [Value], ApiError> {
    if let Value::Array(items) = body {
        return Ok(items);
    }
    keys.iter()
        .find_map(|key| body.get(*key).and_then(Value::as_array))
        .map(Vec::as_slice)
        .ok_or_else(|| ApiError::InvalidResponse {
            message: format!("{what} not found in response"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> HttpClient {
        HttpClient::new(ClientConfig::default().base_url(server.url())).unwrap()
    }

    #[test]
    fn extract_list_shapes() {
        let bare = json!([{ "a": 1 }]);
        assert_eq!(extract_list(&bare, &["apps"], "x").unwrap().len(), 1);

        let keyed = json!({ "data": [1, 2] });
        assert_eq!(extract_list(&keyed, &["apps", "data"], "x").unwrap().len(), 2);

        let missing = json!({ "code": 0 });
        assert!(matches!(
            extract_list(&missing, &["apps"], "app list"),
            Err(ApiError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client =
            HttpClient::new(ClientConfig::default().base_url("http://localhost:1/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1");
    }

    #[test]
    fn list_applications_sends_bearer_key() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v5/app/list")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"apps":[{"app_id":"app1","name":"CRM"},{"name":"no id"}]}"#)
            .create();

        let apps = client(&server).list_applications("secret").unwrap();
        mock.assert();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].id, "app1");
    }

    #[test]
    fn list_fields_sends_app_and_entry() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v5/app/entry/widget/list")
            .match_body(Matcher::Json(json!({ "app_id": "app1", "entry_id": "f1" })))
            .with_status(200)
            .with_body(
                r#"{"widgets":[{"name":"_widget_1","label":"Name","type":"text","required":true}],"sysWidgets":[]}"#,
            )
            .create();

        let fields = client(&server).list_fields("f1", Some("app1"), "k").unwrap();
        mock.assert();
        assert_eq!(fields[0].key, "_widget_1");
        assert!(fields[0].required);
    }

    #[test]
    fn non_zero_code_is_api_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/api/v1/app/app1/entry/list")
            .with_status(200)
            .with_body(r#"{"code":3000,"msg":"The form does not exist."}"#)
            .create();

        let err = client(&server).list_forms("app1", "k").unwrap_err();
        assert!(matches!(err, ApiError::Api { code: 3000, .. }));
    }

    #[test]
    fn error_status_keeps_body_fields() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/api/v5/app/entry/data/get")
            .with_status(400)
            .with_body(r#"{"code":3005,"msg":"Invalid param"}"#)
            .create();

        let target = FormTarget {
            app_id: "app1",
            form_id: "f1",
        };
        let err = client(&server).get_record(target, "d1", "k").unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.api_code(), Some(3005));
        assert_eq!(err.api_message(), Some("Invalid param"));
    }

    #[test]
    fn error_status_without_json_body() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/api/v5/app/list")
            .with_status(502)
            .with_body("Bad Gateway")
            .create();

        let err = client(&server).list_applications("k").unwrap_err();
        assert!(matches!(
            err,
            ApiError::Status {
                status: 502,
                code: None,
                message: None
            }
        ));
    }

    #[test]
    fn single_record_uses_create_endpoint() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v5/app/entry/data/create")
            .match_body(Matcher::PartialJson(json!({
                "app_id": "app1",
                "entry_id": "f1",
                "data": { "_widget_1": { "value": "Ada" } },
                "transaction_id": "tx-1"
            })))
            .with_status(200)
            .with_body(r#"{"data":{"_id":"d1"}}"#)
            .create();

        let mut record = Map::new();
        record.insert("_widget_1".into(), json!({ "value": "Ada" }));
        let target = FormTarget {
            app_id: "app1",
            form_id: "f1",
        };
        let result = client(&server)
            .create_records(
                target,
                vec![record],
                &SubmitOptions::new().transaction_id("tx-1"),
                "k",
            )
            .unwrap();

        mock.assert();
        assert_eq!(result, json!({ "_id": "d1" }));
    }

    #[test]
    fn many_ids_use_batch_delete() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v5/app/entry/data/batch_delete")
            .match_body(Matcher::PartialJson(json!({ "data_ids": ["d1", "d2"] })))
            .with_status(200)
            .with_body(r#"{"success_count":2}"#)
            .create();

        let target = FormTarget {
            app_id: "app1",
            form_id: "f1",
        };
        let ids = DataIds::Many(vec!["d1".into(), "d2".into()]);
        let result = client(&server)
            .delete_records(target, &ids, None, "k")
            .unwrap();

        mock.assert();
        assert_eq!(result["success_count"], 2);
    }
}
