use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use super::{AgileApi, QueryPage, QueryRequest};
use crate::config::{ConnectionSettings, Credentials};
use crate::error::{AgileError, Result};
use crate::model::payload::Payload;
use crate::model::work_item::Record;

const API_KEY_HEADER: &str = "ZSESSIONID";

/// REST client for the work-item service.
pub struct RallyClient {
    endpoint: String,
    credentials: Credentials,
    client: reqwest::Client,
    security_token: OnceCell<String>,
}

impl RallyClient {
    pub fn new(settings: &ConnectionSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.skip_cert_validation)
            .build()
            .map_err(|e| AgileError::transport("Failed to create HTTP client", e))?;

        Ok(Self {
            endpoint: settings.endpoint(),
            credentials: settings.credentials.clone(),
            client,
            security_token: OnceCell::new(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.credentials {
            Credentials::ApiKey(key) => request.header(API_KEY_HEADER, key),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }

    /// Basic-auth sessions must send a security token with every write.
    async fn write_params(&self) -> Result<Vec<(&'static str, String)>> {
        if let Credentials::ApiKey(_) = self.credentials {
            return Ok(Vec::new());
        }
        let token = self
            .security_token
            .get_or_try_init(|| async {
                let url = format!("{}/security/authorize", self.endpoint);
                let envelope: OperationEnvelope = self
                    .send(self.authorize(self.client.get(&url)), "Authorization request failed")
                    .await?;
                let result = envelope.operation_result;
                check_errors(&result.errors, &result.warnings)?;
                result
                    .security_token
                    .ok_or_else(|| AgileError::Remote("No security token in response".into()))
            })
            .await?;
        Ok(vec![("key", token.clone())])
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, context: &str) -> Result<T> {
        let resp = request
            .send()
            .await
            .map_err(|e| AgileError::transport(context, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.trim().chars().take(200).collect();
            return Err(AgileError::transport(
                context,
                format!("HTTP {status} {snippet}").trim_end(),
            ));
        }

        resp.json()
            .await
            .map_err(|e| AgileError::transport(context, format!("Failed to parse response: {e}")))
    }

    fn ref_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else {
            format!("{}/{}", self.endpoint, reference.trim_start_matches('/'))
        }
    }
}

/// Object type segment of a reference such as `.../hierarchicalrequirement/1234`.
pub fn type_from_ref(reference: &str) -> Option<&str> {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let mut segments = path.rsplit('/').filter(|s| !s.is_empty());
    let id = segments.next()?;
    let id = id.strip_suffix(".js").unwrap_or(id);
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return None;
    }
    segments.next()
}

fn check_errors(errors: &[String], warnings: &[String]) -> Result<()> {
    for warning in warnings {
        tracing::warn!(%warning, "service reported a warning");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AgileError::remote(errors))
    }
}

fn query_params(request: &QueryRequest) -> Vec<(String, String)> {
    let fetch = if request.fetch.is_empty() {
        "true".to_string()
    } else {
        request.fetch.join(",")
    };

    let mut params = vec![
        ("fetch".to_string(), fetch),
        ("start".to_string(), request.start.to_string()),
        ("pagesize".to_string(), request.page_size.to_string()),
        ("order".to_string(), "ObjectID".to_string()),
    ];
    if let Some(filter) = &request.filter {
        params.push(("query".to_string(), filter.to_string()));
    }
    if let Some(workspace) = &request.workspace {
        params.push(("workspace".to_string(), workspace.clone()));
    }
    params
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryEnvelope {
    query_result: QueryResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryResult {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    total_result_count: usize,
    #[serde(default)]
    results: Vec<Record>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateEnvelope {
    create_result: OperationResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OperationEnvelope {
    operation_result: OperationResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OperationResult {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    object: Option<Value>,
    security_token: Option<String>,
}

#[async_trait]
impl AgileApi for RallyClient {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        let url = format!("{}/{}", self.endpoint, request.work_type.to_lowercase());
        let params = query_params(request);
        tracing::debug!(%url, ?params, "query");

        let envelope: QueryEnvelope = self
            .send(
                self.authorize(self.client.get(&url).query(&params)),
                "Query request failed",
            )
            .await?;

        let result = envelope.query_result;
        check_errors(&result.errors, &result.warnings)?;
        Ok(QueryPage {
            total_result_count: result.total_result_count,
            results: result.results,
        })
    }

    async fn create(&self, work_type: &str, payload: &Payload) -> Result<Value> {
        let url = format!("{}/{}/create", self.endpoint, work_type.to_lowercase());
        let body = payload.envelope(work_type);
        tracing::debug!(%url, request = %body, "create");

        let key = self.write_params().await?;
        let envelope: CreateEnvelope = self
            .send(
                self.authorize(self.client.post(&url).query(&key).json(&body)),
                "Create request failed",
            )
            .await?;

        let result = envelope.create_result;
        tracing::debug!(response = ?result.object, "create");
        check_errors(&result.errors, &result.warnings)?;
        result
            .object
            .ok_or_else(|| AgileError::Remote("No object in create response".into()))
    }

    async fn update(&self, reference: &str, payload: &Payload) -> Result<Value> {
        let work_type = type_from_ref(reference).ok_or_else(|| {
            AgileError::Validation(format!("Invalid work item reference [{reference}]"))
        })?;
        let url = self.ref_url(reference);
        let body = payload.envelope(work_type);
        tracing::debug!(%url, request = %body, "update");

        let key = self.write_params().await?;
        let envelope: OperationEnvelope = self
            .send(
                self.authorize(self.client.post(&url).query(&key).json(&body)),
                "Update request failed",
            )
            .await?;

        let result = envelope.operation_result;
        tracing::debug!(response = ?result.object, "update");
        check_errors(&result.errors, &result.warnings)?;
        Ok(result.object.unwrap_or(Value::Null))
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        let url = self.ref_url(reference);
        tracing::debug!(%url, "delete");

        let key = self.write_params().await?;
        let envelope: OperationEnvelope = self
            .send(
                self.authorize(self.client.delete(&url).query(&key)),
                "Delete request failed",
            )
            .await?;

        let result = envelope.operation_result;
        check_errors(&result.errors, &result.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionSettings;
    use crate::rally::QueryFilter;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    const ROOT: &str = "/slm/webservice/v2.0";

    fn settings(url: &str, credentials: Credentials) -> ConnectionSettings {
        ConnectionSettings {
            base_url: reqwest::Url::parse(url).unwrap(),
            api_version: "v2.0".into(),
            credentials,
            skip_cert_validation: false,
            timeout: Duration::from_secs(5),
        }
    }

    fn api_key_client(url: &str) -> RallyClient {
        RallyClient::new(&settings(url, Credentials::ApiKey("_key".into()))).unwrap()
    }

    #[test]
    fn type_is_read_from_reference() {
        assert_eq!(
            type_from_ref("https://rally1.rallydev.com/slm/webservice/v2.0/hierarchicalrequirement/1234"),
            Some("hierarchicalrequirement")
        );
        assert_eq!(type_from_ref("/defect/77.js"), Some("defect"));
        assert_eq!(type_from_ref("/defect/"), None);
        assert_eq!(type_from_ref("1234"), None);
    }

    #[test]
    fn query_params_are_limited_to_paging_fetch_filter_and_workspace() {
        let request = QueryRequest::new("Defect")
            .workspace(Some("/workspace/1"))
            .page(1, 15);
        let keys: Vec<String> = query_params(&request).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["fetch", "start", "pagesize", "order", "workspace"]);

        let unscoped = query_params(&QueryRequest::new("Defect"));
        assert!(unscoped.iter().all(|(key, _)| key != "workspace"));
        assert_eq!(unscoped[0], ("fetch".to_string(), "true".to_string()));
    }

    #[tokio::test]
    async fn query_sends_filter_and_paging() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", format!("{ROOT}/defect").as_str())
            .match_header("ZSESSIONID", "_key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "(FormattedID = DE9)".into()),
                Matcher::UrlEncoded("fetch".into(), "_ref,FormattedID".into()),
                Matcher::UrlEncoded("start".into(), "201".into()),
                Matcher::UrlEncoded("pagesize".into(), "50".into()),
                Matcher::UrlEncoded("workspace".into(), "/workspace/1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "QueryResult": {
                        "Errors": [],
                        "Warnings": [],
                        "TotalResultCount": 1,
                        "Results": [{ "_ref": "/defect/9", "FormattedID": "DE9" }]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = api_key_client(&server.url());
        let request = QueryRequest::new("Defect")
            .filter(Some(QueryFilter::equals("FormattedID", "DE9")))
            .fetch(["_ref", "FormattedID"])
            .workspace(Some("/workspace/1"))
            .page(201, 50);
        let page = client.query(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.total_result_count, 1);
        assert_eq!(page.results[0]["FormattedID"], json!("DE9"));
    }

    #[tokio::test]
    async fn query_errors_are_joined() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", format!("{ROOT}/hierarchicalrequirement").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "QueryResult": {
                        "Errors": ["Could not parse: bad query", "Try again"],
                        "TotalResultCount": 0,
                        "Results": []
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = api_key_client(&server.url());
        let err = client
            .query(&QueryRequest::new("HierarchicalRequirement"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Could not parse: bad query; Try again");
    }

    #[tokio::test]
    async fn http_failure_is_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", format!("{ROOT}/task").as_str())
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let client = api_key_client(&server.url());
        let err = client.query(&QueryRequest::new("Task")).await.unwrap_err();
        assert!(matches!(err, AgileError::Transport { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn create_wraps_payload_and_returns_object() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", format!("{ROOT}/hierarchicalrequirement/create").as_str())
            .match_body(Matcher::Json(json!({
                "HierarchicalRequirement": { "Name": "Checkout flow" }
            })))
            .with_status(200)
            .with_body(
                json!({
                    "CreateResult": {
                        "Errors": [],
                        "Object": { "FormattedID": "US7", "ObjectID": 77 }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = api_key_client(&server.url());
        let created = client
            .create(
                "HierarchicalRequirement",
                &Payload::new().with("Name", "Checkout flow"),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(created["FormattedID"], json!("US7"));
    }

    #[tokio::test]
    async fn update_posts_to_reference() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", format!("{ROOT}/defect/42").as_str())
            .match_body(Matcher::Json(json!({ "defect": { "ScheduleState": "Completed" } })))
            .with_status(200)
            .with_body(
                json!({
                    "OperationResult": {
                        "Errors": [],
                        "Object": { "FormattedID": "DE42" }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = api_key_client(&server.url());
        let reference = format!("{}{ROOT}/defect/42", server.url());
        let updated = client
            .update(&reference, &Payload::new().with("ScheduleState", "Completed"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(updated["FormattedID"], json!("DE42"));
    }

    #[tokio::test]
    async fn basic_auth_writes_fetch_security_token_once() {
        let mut server = mockito::Server::new_async().await;
        let auth = server
            .mock("GET", format!("{ROOT}/security/authorize").as_str())
            .with_status(200)
            .with_body(
                json!({ "OperationResult": { "Errors": [], "SecurityToken": "tok-1" } })
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", format!("{ROOT}/task/5").as_str())
            .match_query(Matcher::UrlEncoded("key".into(), "tok-1".into()))
            .with_status(200)
            .with_body(json!({ "OperationResult": { "Errors": [] } }).to_string())
            .expect(2)
            .create_async()
            .await;

        let client = RallyClient::new(&settings(
            &server.url(),
            Credentials::Basic {
                username: "ops".into(),
                password: "pw".into(),
            },
        ))
        .unwrap();
        client.delete("/task/5").await.unwrap();
        client.delete("/task/5").await.unwrap();

        auth.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn delete_failure_carries_server_message() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("DELETE", format!("{ROOT}/task/5").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({ "OperationResult": { "Errors": ["Object not found"] } }).to_string(),
            )
            .create_async()
            .await;

        let client = api_key_client(&server.url());
        let err = client.delete("/task/5").await.unwrap_err();
        assert_eq!(err.to_string(), "Object not found");
    }
}
