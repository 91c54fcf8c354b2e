//! Cloudflare account IP-list gateway.
//!
//! Item writes on Cloudflare lists are asynchronous bulk operations: the write
//! call returns an operation ID which is polled until it completes.

use super::ListGateway;
use crate::config::{CloudflareConfig, RuleAction};
use crate::decision::{ItemCreateRequest, ItemDeleteRequest, ListItem};
use crate::error::RemoteError;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const OPERATION_POLL_INTERVAL_MS: u64 = 500;
const MAX_OPERATION_POLLS: u32 = 120;
const RULES_PER_PAGE: u32 = 100;

/// Cloudflare v4 response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
    #[serde(default)]
    cursors: Option<Cursors>,
}

#[derive(Debug, Deserialize)]
struct Cursors {
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationRef {
    operation_id: String,
}

#[derive(Debug, Deserialize)]
struct BulkOperation {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// An account-level IP list.
#[derive(Debug, Clone, Deserialize)]
pub struct IpList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub num_items: u64,
}

/// A zone firewall rule and its filter.
#[derive(Debug, Clone, Deserialize)]
pub struct FirewallRule {
    pub id: String,
    pub filter: Filter,
    pub action: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Filter {
    pub id: String,
    pub expression: String,
}

#[derive(Debug, Serialize)]
struct ItemIds<'a> {
    items: &'a [ItemDeleteRequest],
}

/// Expression matching requests whose source IP is on `list_name`.
pub fn rule_expression(list_name: &str) -> String {
    format!("ip.src in ${}", list_name)
}

/// Whether `expression` references the list `list_name`.
fn references_list(expression: &str, list_name: &str) -> bool {
    let reference = format!("${}", list_name);
    expression
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .any(|token| token == reference)
}

/// Cloudflare API client.
pub struct CloudflareClient {
    client: Client,
    base_url: String,
    api_token: String,
    account_id: String,
    zone_id: Option<String>,
    poll_interval: Duration,
    max_polls: u32,
}

impl CloudflareClient {
    /// Create a new client from configuration.
    pub fn new(config: &CloudflareConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!(
                "crowdsec-cloudflare-bouncer/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            account_id: config.account_id.clone(),
            zone_id: config.zone_id.clone(),
            poll_interval: Duration::from_millis(OPERATION_POLL_INTERVAL_MS),
            max_polls: MAX_OPERATION_POLLS,
        })
    }

    /// Override how bulk operations are polled.
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}/accounts/{}/{}", self.base_url, self.account_id, path)
    }

    fn zone_url(&self, zone_id: &str, path: &str) -> String {
        format!("{}/zones/{}/{}", self.base_url, zone_id, path)
    }

    /// Send a request and unwrap the response envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<(T, ResultInfo), RemoteError> {
        let response = request.bearer_auth(&self.api_token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RemoteError::from_status(status.as_u16(), error_message(&body)));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            RemoteError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        if !envelope.success {
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message: join_errors(&envelope.errors),
            });
        }

        let result = envelope
            .result
            .ok_or_else(|| RemoteError::InvalidResponse("Response has no result".to_string()))?;
        Ok((result, envelope.result_info.unwrap_or_default()))
    }

    /// Poll a bulk operation until it completes.
    async fn wait_for_operation(&self, operation_id: &str) -> Result<(), RemoteError> {
        let url = self.account_url(&format!("rules/lists/bulk_operations/{}", operation_id));

        for poll in 0..self.max_polls {
            if poll > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }

            let (operation, _): (BulkOperation, _) = self.send(self.client.get(&url)).await?;
            match operation.status.as_str() {
                "completed" => {
                    debug!(operation_id, polls = poll + 1, "Bulk operation completed");
                    return Ok(());
                }
                "failed" => {
                    return Err(RemoteError::OperationFailed {
                        id: operation_id.to_string(),
                        message: operation.error.unwrap_or_default(),
                    });
                }
                status => debug!(operation_id, status, "Bulk operation pending"),
            }
        }

        Err(RemoteError::OperationTimeout {
            id: operation_id.to_string(),
            polls: self.max_polls,
        })
    }

    /// All items on a list, following pagination cursors.
    async fn fetch_items(&self, list_id: &str) -> Result<Vec<ListItem>, RemoteError> {
        let url = self.account_url(&format!("rules/lists/{}/items", list_id));
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.client.get(&url);
            if let Some(ref after) = cursor {
                request = request.query(&[("cursor", after.as_str())]);
            }

            let (page, info): (Vec<ListItem>, _) = self.send(request).await?;
            items.extend(page);

            cursor = info.cursors.and_then(|c| c.after).filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        Ok(items)
    }

    /// All IP lists on the account.
    pub async fn list_ip_lists(&self) -> Result<Vec<IpList>, RemoteError> {
        let (lists, _) = self
            .send(self.client.get(self.account_url("rules/lists")))
            .await?;
        Ok(lists)
    }

    /// Create an empty IP list.
    pub async fn create_ip_list(
        &self,
        name: &str,
        description: &str,
    ) -> Result<IpList, RemoteError> {
        let body = json!({ "name": name, "kind": "ip", "description": description });
        let (list, _) = self
            .send(self.client.post(self.account_url("rules/lists")).json(&body))
            .await?;
        Ok(list)
    }

    /// Delete an IP list and its items.
    pub async fn delete_ip_list(&self, list_id: &str) -> Result<(), RemoteError> {
        let url = self.account_url(&format!("rules/lists/{}", list_id));
        let _: (serde_json::Value, _) = self.send(self.client.delete(url)).await?;
        Ok(())
    }

    /// All firewall rules in a zone, across pages.
    pub async fn firewall_rules(&self, zone_id: &str) -> Result<Vec<FirewallRule>, RemoteError> {
        let url = self.zone_url(zone_id, "firewall/rules");
        let mut rules = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self.client.get(&url).query(&[
                ("page", page.to_string()),
                ("per_page", RULES_PER_PAGE.to_string()),
            ]);
            let (batch, info): (Vec<FirewallRule>, _) = self.send(request).await?;
            let empty = batch.is_empty();
            rules.extend(batch);

            let total_pages = info.total_pages.unwrap_or(1);
            if empty || page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(rules)
    }

    /// Create a rule applying `action` to IPs on `list_name`.
    pub async fn create_firewall_rule(
        &self,
        zone_id: &str,
        list_name: &str,
        action: RuleAction,
        description: &str,
    ) -> Result<FirewallRule, RemoteError> {
        let body = json!([{
            "filter": { "expression": rule_expression(list_name) },
            "action": action.as_str(),
            "description": description,
        }]);
        let (rules, _): (Vec<FirewallRule>, _) = self
            .send(
                self.client
                    .post(self.zone_url(zone_id, "firewall/rules"))
                    .json(&body),
            )
            .await?;

        rules
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::InvalidResponse("No firewall rule created".to_string()))
    }

    pub async fn delete_firewall_rule(&self, zone_id: &str, rule_id: &str) -> Result<(), RemoteError> {
        let url = self.zone_url(zone_id, &format!("firewall/rules/{}", rule_id));
        let _: (serde_json::Value, _) = self.send(self.client.delete(url)).await?;
        Ok(())
    }

    pub async fn delete_filter(&self, zone_id: &str, filter_id: &str) -> Result<(), RemoteError> {
        let url = self.zone_url(zone_id, &format!("filters/{}", filter_id));
        let _: (serde_json::Value, _) = self.send(self.client.delete(url)).await?;
        Ok(())
    }

    /// Recreate the IP list (and its firewall rule when a zone is configured)
    /// so the remote list starts empty. Returns the new list ID.
    pub async fn prepare_list(
        &self,
        list_name: &str,
        description: &str,
        action: RuleAction,
    ) -> Result<String, RemoteError> {
        if let Some(ref zone_id) = self.zone_id {
            for rule in self.firewall_rules(zone_id).await? {
                if references_list(&rule.filter.expression, list_name) {
                    self.delete_firewall_rule(zone_id, &rule.id).await?;
                    self.delete_filter(zone_id, &rule.filter.id).await?;
                    info!(rule_id = %rule.id, "Deleted existing firewall rule");
                }
            }
        }

        for list in self.list_ip_lists().await? {
            if list.name == list_name {
                self.delete_ip_list(&list.id).await?;
                info!(list_id = %list.id, items = list.num_items, "Deleted existing IP list");
            }
        }

        let list = self.create_ip_list(list_name, description).await?;
        info!(list_id = %list.id, name = %list.name, "Created IP list");

        if let Some(ref zone_id) = self.zone_id {
            let rule = self
                .create_firewall_rule(zone_id, list_name, action, description)
                .await?;
            info!(rule_id = %rule.id, action = %rule.action, "Created firewall rule");
        }

        Ok(list.id)
    }
}

#[async_trait]
impl ListGateway for CloudflareClient {
    async fn create_items(
        &self,
        list_id: &str,
        items: &[ItemCreateRequest],
    ) -> Result<Vec<ListItem>, RemoteError> {
        let url = self.account_url(&format!("rules/lists/{}/items", list_id));
        let (operation, _): (OperationRef, _) =
            self.send(self.client.post(url).json(items)).await?;
        self.wait_for_operation(&operation.operation_id).await?;
        self.fetch_items(list_id).await
    }

    async fn delete_items(
        &self,
        list_id: &str,
        items: &[ItemDeleteRequest],
    ) -> Result<(), RemoteError> {
        let url = self.account_url(&format!("rules/lists/{}/items", list_id));
        let (operation, _): (OperationRef, _) = self
            .send(self.client.delete(url).json(&ItemIds { items }))
            .await?;
        self.wait_for_operation(&operation.operation_id).await
    }

    async fn list_items(&self, list_id: &str) -> Result<Vec<ListItem>, RemoteError> {
        self.fetch_items(list_id).await
    }

    fn name(&self) -> &str {
        "cloudflare"
    }
}

fn join_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "unknown error".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Best-effort message from an error response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Envelope<serde_json::Value>>(body) {
        Ok(envelope) if !envelope.errors.is_empty() => join_errors(&envelope.errors),
        _ => body.chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn test_config(base_url: &str, zone_id: Option<&str>) -> CloudflareConfig {
        CloudflareConfig {
            api_token: "token".to_string(),
            account_id: "acct".to_string(),
            zone_id: zone_id.map(str::to_string),
            api_base_url: base_url.to_string(),
            ..CloudflareConfig::default()
        }
    }

    fn client(server: &MockServer, zone_id: Option<&str>) -> CloudflareClient {
        CloudflareClient::new(&test_config(&server.base_url(), zone_id))
            .unwrap()
            .with_polling(Duration::from_millis(1), 3)
    }

    #[test]
    fn test_rule_expression() {
        assert_eq!(rule_expression("crowdsec"), "ip.src in $crowdsec");
    }

    #[test]
    fn test_references_list() {
        assert!(references_list("ip.src in $crowdsec", "crowdsec"));
        assert!(references_list("(ip.src in $crowdsec)", "crowdsec"));
        assert!(!references_list("ip.src in $crowdsec_v2", "crowdsec"));
        assert!(!references_list("http.host eq \"x\"", "crowdsec"));
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"success":false,"errors":[{"code":10000,"message":"Authentication error"}]}"#;
        assert_eq!(error_message(body), "Authentication error (code 10000)");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_create_items_polls_and_lists() {
        let server = MockServer::start_async().await;

        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts/acct/rules/lists/list-1/items")
                    .header("authorization", "Bearer token")
                    .json_body(json!([{ "ip": "10.0.0.1", "comment": "crowdsec" }]));
                then.status(200).json_body(json!({
                    "success": true,
                    "errors": [],
                    "result": { "operation_id": "op-1" }
                }));
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/accounts/acct/rules/lists/bulk_operations/op-1");
                then.status(200).json_body(json!({
                    "success": true,
                    "errors": [],
                    "result": { "id": "op-1", "status": "completed" }
                }));
            })
            .await;
        let listing = server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/acct/rules/lists/list-1/items");
                then.status(200).json_body(json!({
                    "success": true,
                    "errors": [],
                    "result": [
                        { "id": "R1", "ip": "10.0.0.1", "comment": "crowdsec" }
                    ],
                    "result_info": { "cursors": {} }
                }));
            })
            .await;

        let client = client(&server, None);
        let items = client
            .create_items(
                "list-1",
                &[ItemCreateRequest {
                    ip: "10.0.0.1".to_string(),
                    comment: "crowdsec".to_string(),
                }],
            )
            .await
            .unwrap();

        create.assert_async().await;
        poll.assert_async().await;
        listing.assert_async().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "R1");
        assert_eq!(items[0].ip, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_list_items_reads_listing() {
        let server = MockServer::start_async().await;
        let listing = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/accounts/acct/rules/lists/list-1/items")
                    .header("authorization", "Bearer token");
                then.status(200).json_body(json!({
                    "success": true,
                    "errors": [],
                    "result": [
                        { "id": "R1", "ip": "10.0.0.1" },
                        { "id": "R2", "ip": "2001:db8::/64", "comment": "crowdsec" }
                    ],
                    "result_info": { "cursors": { "after": "" } }
                }));
            })
            .await;

        let client = client(&server, None);
        let items = ListGateway::list_items(&client, "list-1").await.unwrap();

        listing.assert_async().await;
        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R2"]);
    }

    #[tokio::test]
    async fn test_delete_items_sends_ids() {
        let server = MockServer::start_async().await;

        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/accounts/acct/rules/lists/list-1/items")
                    .json_body(json!({ "items": [{ "id": "R1" }] }));
                then.status(200).json_body(json!({
                    "success": true,
                    "result": { "operation_id": "op-2" }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/accounts/acct/rules/lists/bulk_operations/op-2");
                then.status(200).json_body(json!({
                    "success": true,
                    "result": { "id": "op-2", "status": "completed" }
                }));
            })
            .await;

        let client = client(&server, None);
        client
            .delete_items(
                "list-1",
                &[ItemDeleteRequest {
                    id: "R1".to_string(),
                }],
            )
            .await
            .unwrap();

        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_operation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/accounts/acct/rules/lists/bulk_operations/op-3");
                then.status(200).json_body(json!({
                    "success": true,
                    "result": { "id": "op-3", "status": "failed", "error": "invalid ip" }
                }));
            })
            .await;

        let err = client(&server, None)
            .wait_for_operation("op-3")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::OperationFailed { ref message, .. } if message == "invalid ip"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_pending_operation_times_out() {
        let server = MockServer::start_async().await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/accounts/acct/rules/lists/bulk_operations/op-4");
                then.status(200).json_body(json!({
                    "success": true,
                    "result": { "id": "op-4", "status": "running" }
                }));
            })
            .await;

        let err = client(&server, None)
            .wait_for_operation("op-4")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::OperationTimeout { polls: 3, .. }));
        assert!(err.is_retryable());
        poll.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_http_status_mapping() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/accounts/acct/rules/lists/limited/items");
                then.status(429).body("too many requests");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/accounts/acct/rules/lists/forbidden/items");
                then.status(403).json_body(json!({
                    "success": false,
                    "errors": [{ "code": 10000, "message": "Authentication error" }]
                }));
            })
            .await;

        let client = client(&server, None);
        let err = client.create_items("limited", &[]).await.unwrap_err();
        assert!(matches!(err, RemoteError::RateLimited));

        let err = client.create_items("forbidden", &[]).await.unwrap_err();
        match err {
            RemoteError::Auth { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Authentication error (code 10000)");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/acct/rules/lists");
                then.status(200).json_body(json!({
                    "success": false,
                    "errors": [{ "code": 7003, "message": "Could not route" }],
                    "result": null
                }));
            })
            .await;

        let err = client(&server, None).list_ip_lists().await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_firewall_rules_pagination() {
        let server = MockServer::start_async().await;
        let page1 = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/zones/zone-1/firewall/rules")
                    .query_param("page", "1");
                then.status(200).json_body(json!({
                    "success": true,
                    "result": [{
                        "id": "rule-1",
                        "action": "block",
                        "filter": { "id": "f-1", "expression": "ip.src in $crowdsec" }
                    }],
                    "result_info": { "page": 1, "total_pages": 2 }
                }));
            })
            .await;
        let page2 = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/zones/zone-1/firewall/rules")
                    .query_param("page", "2");
                then.status(200).json_body(json!({
                    "success": true,
                    "result": [{
                        "id": "rule-2",
                        "action": "challenge",
                        "filter": { "id": "f-2", "expression": "http.host eq \"a\"" }
                    }],
                    "result_info": { "page": 2, "total_pages": 2 }
                }));
            })
            .await;

        let rules = client(&server, Some("zone-1"))
            .firewall_rules("zone-1")
            .await
            .unwrap();

        page1.assert_async().await;
        page2.assert_async().await;
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rule-1", "rule-2"]);
    }

    #[tokio::test]
    async fn test_prepare_list_recreates_list_and_rule() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/zones/zone-1/firewall/rules");
                then.status(200).json_body(json!({
                    "success": true,
                    "result": [{
                        "id": "rule-old",
                        "action": "block",
                        "filter": { "id": "f-old", "expression": "ip.src in $crowdsec" }
                    }],
                    "result_info": { "page": 1, "total_pages": 1 }
                }));
            })
            .await;
        let delete_rule = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/zones/zone-1/firewall/rules/rule-old");
                then.status(200)
                    .json_body(json!({ "success": true, "result": { "id": "rule-old" } }));
            })
            .await;
        let delete_filter = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/zones/zone-1/filters/f-old");
                then.status(200)
                    .json_body(json!({ "success": true, "result": { "id": "f-old" } }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/accounts/acct/rules/lists");
                then.status(200).json_body(json!({
                    "success": true,
                    "result": [
                        { "id": "list-old", "name": "crowdsec", "kind": "ip", "num_items": 4 },
                        { "id": "list-other", "name": "other", "kind": "ip", "num_items": 1 }
                    ]
                }));
            })
            .await;
        let delete_list = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/accounts/acct/rules/lists/list-old");
                then.status(200)
                    .json_body(json!({ "success": true, "result": { "id": "list-old" } }));
            })
            .await;
        let create_list = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/accounts/acct/rules/lists")
                    .json_body(json!({
                        "name": "crowdsec",
                        "kind": "ip",
                        "description": "managed by bouncer"
                    }));
                then.status(200).json_body(json!({
                    "success": true,
                    "result": { "id": "list-new", "name": "crowdsec", "kind": "ip", "num_items": 0 }
                }));
            })
            .await;
        let create_rule = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/zones/zone-1/firewall/rules")
                    .json_body(json!([{
                        "filter": { "expression": "ip.src in $crowdsec" },
                        "action": "managed_challenge",
                        "description": "managed by bouncer"
                    }]));
                then.status(200).json_body(json!({
                    "success": true,
                    "result": [{
                        "id": "rule-new",
                        "action": "managed_challenge",
                        "filter": { "id": "f-new", "expression": "ip.src in $crowdsec" }
                    }]
                }));
            })
            .await;

        let list_id = client(&server, Some("zone-1"))
            .prepare_list("crowdsec", "managed by bouncer", RuleAction::ManagedChallenge)
            .await
            .unwrap();

        assert_eq!(list_id, "list-new");
        delete_rule.assert_async().await;
        delete_filter.assert_async().await;
        delete_list.assert_async().await;
        create_list.assert_async().await;
        create_rule.assert_async().await;
    }
}
