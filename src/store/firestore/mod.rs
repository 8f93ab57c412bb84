pub mod dto;

use std::env;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::identity::TokenSlot;
use crate::remediation;
use crate::store::{
    Collection, Direction, Document, Fields, FilterOp, Query, RecordStore, Write, WriteBatch,
};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: &str = "300";

#[derive(Clone, Debug)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub base_url: String,
}

impl FirestoreConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let project_id = env::var("FIREBASE_PROJECT_ID")
            .map_err(|_| AppError::BadRequest("FIREBASE_PROJECT_ID is not set".to_string()))?;
        let base_url = env::var("FIRESTORE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            project_id,
            base_url,
        })
    }

    /// `projects/{p}/databases/(default)/documents`, the parent of every collection.
    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    fn document_name(&self, collection: Collection, id: &str) -> String {
        format!("{}/{}/{}", self.database_path(), collection.as_str(), id)
    }

    fn url(&self, path: &str) -> Result<Url, AppError> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| AppError::BadRequest(format!("Invalid store url {}: {}", raw, e)))
    }
}

/// Hosted document database reached over its REST API. Requests carry the
/// signed-in user's ID token so the store's access rules apply.
pub struct FirestoreStore {
    client: Client,
    config: FirestoreConfig,
    token: TokenSlot,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig, token: TokenSlot) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            config,
            token,
        })
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.get().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, AppError> {
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(|e| AppError::Unavailable(format!("Store request failed: {}", e)))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(map_error(&self.config.project_id, status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        let response = self.send(request).await?;
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<T>(&body).map_err(|e| {
            tracing::error!("Failed to parse store response: {}", e);
            AppError::Unavailable(format!("Failed to parse store response: {}", e))
        })
    }

    fn collection_url(&self, collection: Collection) -> Result<Url, AppError> {
        self.config
            .url(&format!("{}/{}", self.config.database_path(), collection.as_str()))
    }

    fn document_url(&self, collection: Collection, id: &str) -> Result<Url, AppError> {
        self.config.url(&self.config.document_name(collection, id))
    }

    fn structured_query(&self, collection: Collection, query: &Query) -> serde_json::Value {
        let mut structured = serde_json::json!({
            "from": [{ "collectionId": collection.as_str() }],
        });

        let filters: Vec<serde_json::Value> = query
            .filters
            .iter()
            .map(|f| {
                let op = match f.op {
                    FilterOp::Equal => "EQUAL",
                    FilterOp::GreaterOrEqual => "GREATER_THAN_OR_EQUAL",
                    FilterOp::LessOrEqual => "LESS_THAN_OR_EQUAL",
                };
                serde_json::json!({
                    "fieldFilter": {
                        "field": { "fieldPath": f.field },
                        "op": op,
                        "value": dto::WireValue::from(&f.value),
                    }
                })
            })
            .collect();

        match filters.len() {
            0 => {}
            1 => structured["where"] = filters[0].clone(),
            _ => {
                structured["where"] = serde_json::json!({
                    "compositeFilter": { "op": "AND", "filters": filters }
                })
            }
        }

        if let Some((field, direction)) = &query.order_by {
            let direction = match direction {
                Direction::Ascending => "ASCENDING",
                Direction::Descending => "DESCENDING",
            };
            structured["orderBy"] = serde_json::json!([{
                "field": { "fieldPath": field },
                "direction": direction,
            }]);
        }

        if let Some(limit) = query.limit {
            structured["limit"] = serde_json::json!(limit);
        }

        structured
    }

    fn encode_write(&self, write: &Write) -> serde_json::Value {
        match write {
            Write::Create { collection, id, fields } => serde_json::json!({
                "update": {
                    "name": self.config.document_name(*collection, id),
                    "fields": dto::encode_fields(fields),
                },
                "currentDocument": { "exists": false },
            }),
            Write::Set { collection, id, fields } => serde_json::json!({
                "update": {
                    "name": self.config.document_name(*collection, id),
                    "fields": dto::encode_fields(fields),
                },
            }),
            Write::Update { collection, id, fields } => serde_json::json!({
                "update": {
                    "name": self.config.document_name(*collection, id),
                    "fields": dto::encode_fields(fields),
                },
                "updateMask": { "fieldPaths": fields.keys().collect::<Vec<_>>() },
                "currentDocument": { "exists": true },
            }),
        }
    }
}

/// Classifies a REST failure into the crate's error kinds.
fn map_error(project_id: &str, status: StatusCode, body: &str) -> AppError {
    let (message, code) = match serde_json::from_str::<dto::ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status.unwrap_or_default()),
        Err(_) => (body.to_string(), String::new()),
    };

    match (status, code.as_str()) {
        (_, "PERMISSION_DENIED") | (StatusCode::FORBIDDEN, _) => AppError::PermissionDenied {
            message,
            project_id: project_id.to_string(),
        },
        (_, "UNAUTHENTICATED") | (StatusCode::UNAUTHORIZED, _) => AppError::Unauthenticated,
        (_, "FAILED_PRECONDITION") => {
            let remediation = remediation::extract_link(&message);
            AppError::FailedPrecondition {
                message,
                remediation,
            }
        }
        (_, "NOT_FOUND") | (StatusCode::NOT_FOUND, _) => AppError::NotFound,
        (_, "ALREADY_EXISTS") | (StatusCode::CONFLICT, _) => AppError::Conflict(message),
        _ => AppError::Unavailable(format!("Store error {}: {}", status, message)),
    }
}

fn into_document(wire: dto::WireDocument) -> Document {
    let id = wire.id().to_string();
    Document::new(id, dto::decode_fields(wire.fields))
}

#[async_trait]
impl RecordStore for FirestoreStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, AppError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.collection_url(collection)?;
            url.query_pairs_mut().append_pair("pageSize", PAGE_SIZE);
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let page: dto::ListDocumentsResponse = self.send_json(self.client.get(url)).await?;
            documents.extend(page.documents.into_iter().map(into_document));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} documents from {}", documents.len(), collection.as_str());
        Ok(documents)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, AppError> {
        let url = self.document_url(collection, id)?;
        match self.send_json::<dto::WireDocument>(self.client.get(url)).await {
            Ok(doc) => Ok(Some(into_document(doc))),
            Err(AppError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, collection: Collection, fields: Fields) -> Result<String, AppError> {
        let url = self.collection_url(collection)?;
        let body = serde_json::json!({ "fields": dto::encode_fields(&fields) });
        let doc: dto::WireDocument = self.send_json(self.client.post(url).json(&body)).await?;
        Ok(doc.id().to_string())
    }

    async fn set(&self, collection: Collection, id: &str, fields: Fields) -> Result<(), AppError> {
        let url = self.document_url(collection, id)?;
        let body = serde_json::json!({ "fields": dto::encode_fields(&fields) });
        self.send(self.client.patch(url).json(&body)).await?;
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> Result<(), AppError> {
        let mut url = self.document_url(collection, id)?;
        {
            let mut pairs = url.query_pairs_mut();
            for key in fields.keys() {
                pairs.append_pair("updateMask.fieldPaths", key);
            }
            pairs.append_pair("currentDocument.exists", "true");
        }
        let body = serde_json::json!({ "fields": dto::encode_fields(&fields) });
        self.send(self.client.patch(url).json(&body)).await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        let url = self.document_url(collection, id)?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Document>, AppError> {
        let url = self
            .config
            .url(&format!("{}:runQuery", self.config.database_path()))?;
        let body = serde_json::json!({
            "structuredQuery": self.structured_query(collection, query),
        });

        let items: Vec<dto::RunQueryItem> = self.send_json(self.client.post(url).json(&body)).await?;
        let documents: Vec<Document> = items
            .into_iter()
            .filter_map(|item| item.document)
            .map(into_document)
            .collect();

        debug!("Query on {} returned {} documents", collection.as_str(), documents.len());
        Ok(documents)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError> {
        if batch.is_empty() {
            warn!("Skipping commit of an empty batch");
            return Ok(());
        }

        let url = self
            .config
            .url(&format!("{}:commit", self.config.database_path()))?;
        let writes: Vec<serde_json::Value> = batch.writes().iter().map(|w| self.encode_write(w)).collect();
        let body = serde_json::json!({ "writes": writes });

        self.send(self.client.post(url).json(&body)).await?;
        debug!("Committed batch of {} writes", batch.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;

    fn store() -> FirestoreStore {
        let config = FirestoreConfig {
            project_id: "quranic".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        };
        FirestoreStore::new(config, TokenSlot::default()).expect("client")
    }

    #[test]
    fn test_error_mapping_by_status_code() {
        let denied = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        match map_error("quranic", StatusCode::FORBIDDEN, denied) {
            AppError::PermissionDenied { project_id, .. } => assert_eq!(project_id, "quranic"),
            other => panic!("expected permission denied, got {:?}", other),
        }

        let index = r#"{"error":{"code":400,"message":"The query requires an index. You can create it here: https://console.firebase.google.com/v1/r/project/quranic/firestore/indexes?create_composite=xyz","status":"FAILED_PRECONDITION"}}"#;
        match map_error("quranic", StatusCode::BAD_REQUEST, index) {
            AppError::FailedPrecondition { remediation, .. } => {
                assert!(remediation.unwrap().contains("create_composite=xyz"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(map_error("quranic", StatusCode::NOT_FOUND, ""), AppError::NotFound));
        assert!(matches!(
            map_error("quranic", StatusCode::BAD_GATEWAY, "upstream"),
            AppError::Unavailable(_)
        ));
    }

    #[test]
    fn test_structured_query_with_range_and_limit() {
        let query = Query::new()
            .where_gte("date", Value::Integer(1))
            .where_lte("date", Value::Integer(2))
            .order_by("date", Direction::Descending)
            .limit(5);
        let json = store().structured_query(Collection::DailyAttendance, &query);

        assert_eq!(json["from"][0]["collectionId"], "daily_attendance");
        assert_eq!(json["where"]["compositeFilter"]["op"], "AND");
        assert_eq!(
            json["where"]["compositeFilter"]["filters"][0]["fieldFilter"]["op"],
            "GREATER_THAN_OR_EQUAL"
        );
        assert_eq!(json["orderBy"][0]["direction"], "DESCENDING");
        assert_eq!(json["limit"], 5);
    }

    #[test]
    fn test_update_write_carries_mask_and_precondition() {
        let mut fields = Fields::new();
        fields.insert("teacherId".to_string(), Value::from("t2"));
        let write = Write::Update {
            collection: Collection::Students,
            id: "s1".to_string(),
            fields,
        };
        let json = store().encode_write(&write);
        assert_eq!(
            json["update"]["name"],
            "projects/quranic/databases/(default)/documents/students/s1"
        );
        assert_eq!(json["updateMask"]["fieldPaths"][0], "teacherId");
        assert_eq!(json["currentDocument"]["exists"], true);
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored (needs FIREBASE_PROJECT_ID and a signed-in token)
    async fn test_list_students_from_hosted_store() {
        dotenvy::dotenv().ok();
        let config = FirestoreConfig::new_from_env().expect("Failed to load store config");
        let store = FirestoreStore::new(config, TokenSlot::default()).expect("client");
        let result = store.list(Collection::Students).await;
        println!("List result: {:?}", result.as_ref().map(Vec::len));
        assert!(result.is_ok() || result.unwrap_err().is_permission_denied());
    }
}
