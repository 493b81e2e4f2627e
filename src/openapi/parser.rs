use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Paths that serve the raw document directly, no UI scraping needed.
const DIRECT_SPEC_PATHS: &[&str] = &[
    "/v2/api-docs",
    "/v3/api-docs",
    "/swagger.json",
    "/openapi.json",
    "/api-docs.json",
];

const EXCLUDED_SPEC_HOSTS: &[&str] = &["petstore.swagger.io", "example.com"];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOpenApi {
    pub title: String,
    pub version: String,
    pub base_url: String,
    pub endpoints: Vec<ParsedEndpoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEndpoint {
    pub path: String,
    pub method: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tag_name: Option<String>,
    pub tag_description: Option<String>,
    pub parameters: Vec<ParsedParameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedParameter {
    /// `path`, `query` or `requestBody`.
    pub param_type: String,
    pub name: String,
    pub required: bool,
    pub value_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// For `requestBody`: the fully `$ref`-resolved JSON schema.
    pub value: Option<Value>,
}

/// Parses an OpenAPI document from a URL, going through the Swagger UI page
/// when the URL does not serve the document directly.
pub struct OpenApiParser {
    http: reqwest::Client,
}

impl Default for OpenApiParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenApiParser {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
        }
    }

    pub async fn parse(&self, url: &str) -> Result<ParsedOpenApi> {
        if self.is_direct_url(url).await {
            self.parse_direct(url).await
        } else {
            self.parse_via_ui(url).await
        }
    }

    async fn is_direct_url(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            let path = parsed.path().to_lowercase();
            if DIRECT_SPEC_PATHS.iter().any(|p| path.ends_with(p)) {
                return true;
            }
        }
        // A HEAD answering json/yaml also qualifies as a direct document.
        match self.http.head(url).send().await {
            Ok(response) => response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|ct| ct.contains("json") || ct.contains("yaml"))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn parse_direct(&self, url: &str) -> Result<ParsedOpenApi> {
        let document: Value = self
            .http
            .get(url)
            .send()
            .await
            .context("Error fetching OpenAPI document")?
            .error_for_status()
            .context("OpenAPI document URL returned an error status")?
            .json()
            .await
            .map_err(|e| anyhow!("Spec not found: unparseable document at {url}: {e}"))?;

        extract_document(&[document], url)
    }

    async fn parse_via_ui(&self, ui_url: &str) -> Result<ParsedOpenApi> {
        let html = self
            .http
            .get(ui_url)
            .send()
            .await
            .context("Error fetching Swagger UI page")?
            .error_for_status()
            .context("Swagger UI URL returned an error status")?
            .text()
            .await
            .context("Error reading Swagger UI page body")?;

        let mut candidates = extract_spec_candidates(&html, ui_url);

        if candidates.is_empty() {
            if let Some(initializer_url) = find_initializer_script(&html, ui_url) {
                match self.http.get(initializer_url.clone()).send().await {
                    Ok(response) => {
                        if let Ok(js) = response.text().await {
                            candidates =
                                extract_bundle_urls(&js, initializer_url.as_str());
                        }
                    }
                    Err(e) => debug!("Swagger initializer fetch failed: {e}"),
                }
            }
        }

        let mut ranked = rank_candidates(candidates, ui_url);
        if ranked.is_empty() {
            if let Ok(parsed) = Url::parse(ui_url) {
                if let Some(host) = parsed.host_str() {
                    let port = parsed
                        .port()
                        .map(|p| format!(":{p}"))
                        .unwrap_or_default();
                    ranked.push(format!("{}://{host}{port}/v3/api-docs", parsed.scheme()));
                }
            }
        }

        let mut documents = Vec::new();
        for candidate in &ranked {
            match self.fetch_spec_json(candidate).await {
                Ok(Some(document)) => documents.push(document),
                Ok(None) => debug!("Candidate {candidate} is not an OpenAPI document"),
                Err(e) => {
                    // Connection errors on individual candidates are expected;
                    // the next candidate may still work.
                    debug!("Candidate {candidate} failed: {e}");
                }
            }
        }

        if documents.is_empty() {
            return Err(anyhow!(
                "Spec not found: no valid OpenAPI document behind {ui_url} (tried {})",
                ranked.join(", ")
            ));
        }

        let fallback = ranked.first().map(String::as_str).unwrap_or(ui_url);
        extract_document(&documents, fallback)
    }

    async fn fetch_spec_json(&self, url: &str) -> Result<Option<Value>> {
        let document: Value = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let valid = document.get("openapi").is_some() || document.get("swagger").is_some();
        Ok(valid.then_some(document))
    }
}

/// Candidate spec URLs from the UI page: `data-url` on `#swagger-ui` plus
/// every `url:` inside `SwaggerUIBundle({...})`.
fn extract_spec_candidates(html: &str, page_url: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    let data_url =
        Regex::new(r#"id=["']swagger-ui["'][^>]*\bdata-url=["']([^"']+)["']"#).unwrap();
    if let Some(captures) = data_url.captures(html) {
        if let Some(resolved) = resolve_relative(page_url, &captures[1]) {
            candidates.push(resolved);
        }
    }

    candidates.extend(extract_bundle_urls(html, page_url));
    candidates
}

fn extract_bundle_urls(source: &str, base_url: &str) -> Vec<String> {
    let bundle = Regex::new(r"(?s)SwaggerUIBundle\(\s*\{(.*?)\}\s*\)").unwrap();
    let single_url = Regex::new(r#"\burl\s*:\s*["']([^"']+)["']"#).unwrap();

    let mut urls = Vec::new();
    for block in bundle.captures_iter(source) {
        for capture in single_url.captures_iter(&block[1]) {
            if let Some(resolved) = resolve_relative(base_url, &capture[1]) {
                urls.push(resolved);
            }
        }
    }
    urls
}

fn find_initializer_script(html: &str, page_url: &str) -> Option<Url> {
    let script =
        Regex::new(r#"<script[^>]+src=["']([^"']*swagger[^"']*initializer[^"']*)["']"#).unwrap();
    let captures = script.captures(html)?;
    let base = Url::parse(page_url).ok()?;
    base.join(&captures[1]).ok()
}

fn resolve_relative(base: &str, candidate: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(candidate).ok().map(|u| u.to_string())
}

/// Same origin +10, `/v3/api-docs` +5, `swagger.json`/`openapi.json` +5;
/// well-known example hosts are dropped entirely.
fn rank_candidates(candidates: Vec<String>, ui_url: &str) -> Vec<String> {
    let ui = Url::parse(ui_url).ok();

    let score = |candidate: &str| -> i32 {
        let Ok(parsed) = Url::parse(candidate) else {
            return 0;
        };
        let mut score = 0;
        if let Some(ui) = &ui {
            if ui.scheme() == parsed.scheme()
                && ui.host_str() == parsed.host_str()
                && ui.port_or_known_default() == parsed.port_or_known_default()
            {
                score += 10;
            }
        }
        let path = parsed.path().to_lowercase();
        if path.contains("/v3/api-docs") {
            score += 5;
        }
        if path.ends_with("swagger.json") || path.ends_with("openapi.json") {
            score += 5;
        }
        score
    };

    let mut unique: Vec<String> = candidates
        .into_iter()
        .filter(|candidate| {
            Url::parse(candidate)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .map(|host| !EXCLUDED_SPEC_HOSTS.contains(&host.as_str()))
                .unwrap_or(false)
        })
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    unique.sort_by(|a, b| score(b).cmp(&score(a)).then_with(|| a.cmp(b)));
    unique
}

/// Extracts the endpoint/parameter set from one or more validated documents.
/// Title, version and base URL come from the first document; endpoints from
/// all of them.
pub fn extract_document(documents: &[Value], fetched_url: &str) -> Result<ParsedOpenApi> {
    let primary = documents
        .first()
        .ok_or_else(|| anyhow!("Spec not found: no document to extract"))?;

    let info = primary.get("info");
    let title = info
        .and_then(|i| i.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("Untitled")
        .to_string();
    let version = info
        .and_then(|i| i.get("version"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let base_url = pick_base_url(primary, fetched_url);

    let mut endpoints = Vec::new();
    for document in documents {
        let tag_descriptions: Vec<(String, String)> = document
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(|tag| {
                        Some((
                            tag.get("name")?.as_str()?.to_string(),
                            tag.get("description")
                                .and_then(Value::as_str)
                                .unwrap_or("")
                                .to_string(),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let components = document.get("components").cloned().unwrap_or(Value::Null);
        let Some(paths) = document.get("paths").and_then(Value::as_object) else {
            continue;
        };

        for (path, methods) in paths {
            let Some(methods) = methods.as_object() else {
                continue;
            };
            for (method, details) in methods {
                let Some(details) = details.as_object() else {
                    continue;
                };

                let tag_name = details
                    .get("tags")
                    .and_then(Value::as_array)
                    .and_then(|tags| tags.first())
                    .and_then(Value::as_str)
                    .unwrap_or("Default")
                    .to_string();
                let tag_description = tag_descriptions
                    .iter()
                    .find(|(name, _)| *name == tag_name)
                    .map(|(_, description)| description.clone());

                let mut parameters = Vec::new();
                for param in details
                    .get("parameters")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    let kind = param.get("in").and_then(Value::as_str).unwrap_or("");
                    if kind != "path" && kind != "query" {
                        continue;
                    }
                    let schema = param.get("schema").cloned().unwrap_or(Value::Null);
                    parameters.push(ParsedParameter {
                        param_type: kind.to_string(),
                        name: param
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        required: param
                            .get("required")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                        value_type: schema
                            .get("type")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        title: schema
                            .get("title")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        description: param
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        value: schema.get("default").cloned(),
                    });
                }

                if let Some(request_body) = details.get("requestBody") {
                    let json_schema = request_body
                        .get("content")
                        .and_then(|content| content.get("application/json"))
                        .and_then(|json| json.get("schema"));
                    if let Some(schema) = json_schema {
                        let mut visited = Vec::new();
                        let resolved =
                            resolve_schema_references(schema, &components, &mut visited);
                        parameters.push(ParsedParameter {
                            param_type: "requestBody".to_string(),
                            name: "requestBody".to_string(),
                            required: request_body
                                .get("required")
                                .and_then(Value::as_bool)
                                .unwrap_or(false),
                            value_type: Some("object".to_string()),
                            title: Some("Request Body".to_string()),
                            description: request_body
                                .get("description")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            value: Some(resolved),
                        });
                    }
                }

                endpoints.push(ParsedEndpoint {
                    path: path.clone(),
                    method: method.to_uppercase(),
                    summary: details
                        .get("summary")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    description: details
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    tag_name: Some(tag_name),
                    tag_description,
                    parameters,
                });
            }
        }
    }

    Ok(ParsedOpenApi {
        title,
        version,
        base_url,
        endpoints,
    })
}

fn pick_base_url(document: &Value, fetched_url: &str) -> String {
    if let Some(url) = document
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
    {
        return url.to_string();
    }
    match Url::parse(fetched_url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
            format!("{}://{host}{port}", parsed.scheme())
        }
        Err(_) => {
            warn!("Could not parse fetched URL {fetched_url} for base_url fallback");
            fetched_url.to_string()
        }
    }
}

/// Recursively inlines `#/components/schemas/*` references. A reference that
/// points back into the path currently being resolved becomes a stub object
/// instead of recursing forever.
pub fn resolve_schema_references(
    schema: &Value,
    components: &Value,
    visited: &mut Vec<String>,
) -> Value {
    let Some(object) = schema.as_object() else {
        return schema.clone();
    };

    if let Some(reference) = object.get("$ref").and_then(Value::as_str) {
        if visited.iter().any(|seen| seen == reference) {
            return serde_json::json!({
                "type": "object",
                "description": format!("Circular reference to {reference}"),
            });
        }

        if let Some(schema_name) = reference.strip_prefix("#/components/schemas/") {
            if let Some(referenced) = components
                .get("schemas")
                .and_then(|schemas| schemas.get(schema_name))
            {
                visited.push(reference.to_string());
                let resolved = resolve_schema_references(referenced, components, visited);
                visited.pop();
                return resolved;
            }
        }
        return serde_json::json!({
            "type": "object",
            "description": format!("Unresolved reference: {reference}"),
        });
    }

    let mut resolved = serde_json::Map::new();
    for (key, value) in object {
        let value = match value {
            Value::Object(_) => resolve_schema_references(value, components, visited),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| {
                        if item.is_object() {
                            resolve_schema_references(item, components, visited)
                        } else {
                            item.clone()
                        }
                    })
                    .collect(),
            ),
            other => other.clone(),
        };
        resolved.insert(key.clone(), value);
    }
    Value::Object(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_data_url_candidate() {
        let html = r#"<div id="swagger-ui" data-url="/spec/openapi.json"></div>"#;
        let candidates = extract_spec_candidates(html, "http://api.example.org/docs");
        assert_eq!(candidates, vec!["http://api.example.org/spec/openapi.json"]);
    }

    #[test]
    fn extracts_bundle_url_and_urls_array() {
        let html = r#"
            <script>
            SwaggerUIBundle({
                url: "/v3/api-docs",
                urls: [{url: "/v3/api-docs/group-a", name: "a"}],
                dom_id: '#swagger-ui'
            })
            </script>
        "#;
        let candidates = extract_spec_candidates(html, "http://api.example.org/swagger-ui");
        assert!(candidates.contains(&"http://api.example.org/v3/api-docs".to_string()));
        assert!(candidates.contains(&"http://api.example.org/v3/api-docs/group-a".to_string()));
    }

    #[test]
    fn ranking_prefers_same_origin_and_spec_paths() {
        let candidates = vec![
            "http://other.example.org/spec.json".to_string(),
            "http://api.example.org/v3/api-docs".to_string(),
            "http://petstore.swagger.io/v2/swagger.json".to_string(),
        ];
        let ranked = rank_candidates(candidates, "http://api.example.org/swagger-ui");
        assert_eq!(ranked[0], "http://api.example.org/v3/api-docs");
        assert!(!ranked.iter().any(|c| c.contains("petstore")));
    }

    #[test]
    fn base_url_prefers_servers_entry() {
        let document = json!({"servers": [{"url": "http://svc.test:8080"}]});
        assert_eq!(
            pick_base_url(&document, "http://fallback:9000/v3/api-docs"),
            "http://svc.test:8080"
        );
    }

    #[test]
    fn base_url_falls_back_to_fetched_origin() {
        let document = json!({});
        assert_eq!(
            pick_base_url(&document, "http://fallback:9000/v3/api-docs"),
            "http://fallback:9000"
        );
    }

    #[test]
    fn resolves_nested_references() {
        let components = json!({
            "schemas": {
                "Order": {
                    "type": "object",
                    "properties": {
                        "item": {"$ref": "#/components/schemas/Item"}
                    }
                },
                "Item": {"type": "string"}
            }
        });
        let schema = json!({"$ref": "#/components/schemas/Order"});
        let mut visited = Vec::new();
        let resolved = resolve_schema_references(&schema, &components, &mut visited);
        assert_eq!(resolved["properties"]["item"], json!({"type": "string"}));
        assert!(visited.is_empty());
    }

    #[test]
    fn circular_reference_becomes_stub() {
        let components = json!({
            "schemas": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "next": {"$ref": "#/components/schemas/Node"}
                    }
                }
            }
        });
        let schema = json!({"$ref": "#/components/schemas/Node"});
        let mut visited = Vec::new();
        let resolved = resolve_schema_references(&schema, &components, &mut visited);
        let stub = &resolved["properties"]["next"];
        assert_eq!(stub["type"], "object");
        assert!(stub["description"]
            .as_str()
            .unwrap()
            .contains("Circular reference"));
    }

    #[test]
    fn extracts_endpoints_with_parameters() {
        let document = json!({
            "openapi": "3.0.1",
            "info": {"title": "Orders", "version": "1.2"},
            "servers": [{"url": "http://orders.test"}],
            "tags": [{"name": "orders", "description": "Order operations"}],
            "components": {
                "schemas": {
                    "CreateOrder": {
                        "type": "object",
                        "properties": {"name": {"type": "string"}}
                    }
                }
            },
            "paths": {
                "/orders/{id}": {
                    "get": {
                        "tags": ["orders"],
                        "summary": "Fetch one order",
                        "parameters": [
                            {"name": "id", "in": "path", "required": true,
                             "schema": {"type": "integer"}},
                            {"name": "expand", "in": "query",
                             "schema": {"type": "string"}}
                        ]
                    },
                    "post": {
                        "tags": ["orders"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/CreateOrder"}
                                }
                            }
                        }
                    }
                }
            }
        });

        let parsed = extract_document(&[document], "http://orders.test/v3/api-docs").unwrap();
        assert_eq!(parsed.title, "Orders");
        assert_eq!(parsed.base_url, "http://orders.test");
        assert_eq!(parsed.endpoints.len(), 2);

        let get = parsed
            .endpoints
            .iter()
            .find(|e| e.method == "GET")
            .unwrap();
        assert_eq!(get.parameters.len(), 2);
        assert_eq!(get.tag_description.as_deref(), Some("Order operations"));

        let post = parsed
            .endpoints
            .iter()
            .find(|e| e.method == "POST")
            .unwrap();
        let body = &post.parameters[0];
        assert_eq!(body.param_type, "requestBody");
        assert!(body.required);
        assert_eq!(
            body.value.as_ref().unwrap()["properties"]["name"]["type"],
            "string"
        );
    }

    #[test]
    fn endpoints_merge_across_documents() {
        let doc_a = json!({
            "openapi": "3.0.1",
            "info": {"title": "A", "version": "1"},
            "paths": {"/a": {"get": {}}}
        });
        let doc_b = json!({
            "openapi": "3.0.1",
            "info": {"title": "B", "version": "2"},
            "paths": {"/b": {"get": {}}}
        });
        let parsed = extract_document(&[doc_a, doc_b], "http://merged.test/docs").unwrap();
        assert_eq!(parsed.title, "A");
        assert_eq!(parsed.endpoints.len(), 2);
    }
}
