//! # store: remote store clients
//!
//! [`DriveStore`] publishes files into Google Drive folders named after the session, using the
//! Drive v3 REST API over `reqwest`. It authenticates with a service-account key (RS256 JWT
//! exchanged for a bearer token, cached until shortly before expiry) or with a fixed bearer
//! token.
//!
//! [`DisabledStore`] stands in when no usable credentials were configured. It keeps the reason
//! so every attempted publication logs why it produced no URL.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::contract::{FolderHandle, RemoteStore, StoreError};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const JWT_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Viewable URL for an uploaded Drive file.
pub fn view_url(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{file_id}/view")
}

/// Base URLs of the Drive API; overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    pub api_base: String,
    pub upload_base: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
        }
    }
}

/// The fields of a Google service-account key file that token exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

enum TokenSource {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
        cache: Mutex<Option<CachedToken>>,
    },
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileId>,
}

#[derive(Deserialize)]
struct FileId {
    id: String,
}

pub struct DriveStore {
    client: reqwest::Client,
    endpoints: DriveEndpoints,
    tokens: TokenSource,
}

impl DriveStore {
    /// Build a client from the JSON text of a service-account key.
    ///
    /// Fails when the JSON is malformed or the private key is not a valid RSA PEM.
    pub fn from_service_account_json(
        client: reqwest::Client,
        key_json: &str,
        endpoints: DriveEndpoints,
    ) -> Result<Self, StoreError> {
        let key: ServiceAccountKey = serde_json::from_str(key_json)
            .map_err(|e| StoreError::Credentials(format!("invalid service account json: {e}")))?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StoreError::Credentials(format!("invalid private key: {e}")))?;
        info!(client_email = %key.client_email, "Initialized Drive store from service account");
        Ok(Self {
            client,
            endpoints,
            tokens: TokenSource::ServiceAccount {
                key,
                signing_key,
                cache: Mutex::new(None),
            },
        })
    }

    /// Build a client that sends a fixed bearer token.
    pub fn with_bearer_token(
        client: reqwest::Client,
        token: impl Into<String>,
        endpoints: DriveEndpoints,
    ) -> Self {
        Self {
            client,
            endpoints,
            tokens: TokenSource::Static(token.into()),
        }
    }

    async fn access_token(&self) -> Result<String, StoreError> {
        let (key, signing_key, cache) = match &self.tokens {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount {
                key,
                signing_key,
                cache,
            } => (key, signing_key, cache),
        };

        let mut cached = cache.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at > now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) {
                return Ok(token.value.clone());
            }
        }

        let claims = Claims {
            iss: &key.client_email,
            scope: DRIVE_SCOPE,
            aud: &key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, signing_key)
            .map_err(|e| StoreError::Credentials(format!("failed to sign token request: {e}")))?;

        let response: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Bounded by the assertion lifetime.
        let lifetime = response
            .expires_in
            .unwrap_or(TOKEN_LIFETIME_SECS)
            .clamp(0, TOKEN_LIFETIME_SECS);
        debug!(expires_in = lifetime, "Obtained Drive access token");
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: now + Duration::seconds(lifetime),
        });
        Ok(response.access_token)
    }

    async fn find_folder(&self, token: &str, name: &str) -> Result<Option<String>, StoreError> {
        let query = format!(
            "name='{}' and mimeType='{FOLDER_MIME}' and trashed=false",
            escape_query(name)
        );
        let list: FileList = self
            .client
            .get(format!("{}/files", self.endpoints.api_base))
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id)")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(&self, token: &str, name: &str) -> Result<String, StoreError> {
        let created: FileId = self
            .client
            .post(format!("{}/files", self.endpoints.api_base))
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .json(&json!({ "name": name, "mimeType": FOLDER_MIME }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(created.id)
    }

    async fn try_upload(&self, local_path: &Path, folder: &FolderHandle) -> Result<String, StoreError> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                StoreError::UnexpectedResponse(format!("{} has no file name", local_path.display()))
            })?;
        let content = tokio::fs::read(local_path).await?;
        let digest = format!("{:x}", Sha256::digest(&content));

        let metadata = json!({
            "name": name,
            "parents": [folder.id],
            "appProperties": { "sha256": digest },
        });
        let boundary = format!("roadmap-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata.to_string(), mime_for(&name), &content);

        let token = self.access_token().await?;
        let uploaded: FileId = self
            .client
            .post(format!("{}/files", self.endpoints.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(
            file = %name,
            folder_id = %folder.id,
            file_id = %uploaded.id,
            size = content.len(),
            "Uploaded file to Drive"
        );
        Ok(view_url(&uploaded.id))
    }
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn ensure_folder(&self, session_id: &str) -> Result<FolderHandle, StoreError> {
        let token = self.access_token().await?;
        let id = match self.find_folder(&token, session_id).await? {
            Some(id) => {
                debug!(session_id, folder_id = %id, "Found existing Drive folder");
                id
            }
            None => {
                let id = self.create_folder(&token, session_id).await?;
                info!(session_id, folder_id = %id, "Created Drive folder");
                id
            }
        };
        Ok(FolderHandle {
            id,
            name: session_id.to_string(),
        })
    }

    async fn upload(&self, local_path: &Path, folder: &FolderHandle) -> Option<String> {
        match self.try_upload(local_path, folder).await {
            Ok(url) => Some(url),
            Err(e) => {
                error!(path = %local_path.display(), error = ?e, "Upload failed");
                None
            }
        }
    }
}

/// Store used when no credentials could be loaded: every publication yields no URL.
#[derive(Debug, Clone)]
pub struct DisabledStore {
    reason: String,
}

impl DisabledStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl RemoteStore for DisabledStore {
    async fn ensure_folder(&self, session_id: &str) -> Result<FolderHandle, StoreError> {
        warn!(session_id, reason = %self.reason, "Remote store disabled; cannot create folder");
        Err(StoreError::Unavailable(self.reason.clone()))
    }

    async fn upload(&self, local_path: &Path, _folder: &FolderHandle) -> Option<String> {
        warn!(path = %local_path.display(), reason = %self.reason, "Remote store disabled; skipping upload");
        None
    }
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn multipart_related(boundary: &str, metadata: &str, mime: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{boundary}\r\nContent-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> DriveStore {
        DriveStore::with_bearer_token(
            reqwest::Client::new(),
            "test-token",
            DriveEndpoints {
                api_base: format!("{}/drive/v3", server.uri()),
                upload_base: format!("{}/upload/drive/v3", server.uri()),
            },
        )
    }

    #[test]
    fn query_values_are_escaped() {
        assert_eq!(escape_query("o'brien"), "o\\'brien");
        assert_eq!(escape_query("a\\b"), "a\\\\b");
    }

    #[test]
    fn mime_types_follow_extension() {
        assert!(mime_for("IT_Transformation_Roadmap.docx").contains("wordprocessingml"));
        assert!(mime_for("deck.PPTX").contains("presentationml"));
        assert_eq!(mime_for("README"), "application/octet-stream");
    }

    #[test]
    fn invalid_service_account_is_reported() {
        let err = DriveStore::from_service_account_json(
            reqwest::Client::new(),
            "{\"client_email\":\"x@y\",\"private_key\":\"not a key\"}",
            DriveEndpoints::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, StoreError::Credentials(_)));

        let err = DriveStore::from_service_account_json(
            reqwest::Client::new(),
            "not json",
            DriveEndpoints::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, StoreError::Credentials(_)));
    }

    #[tokio::test]
    async fn reuses_existing_folder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "files": [{ "id": "folder-1" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "unexpected" })))
            .expect(0)
            .mount(&server)
            .await;

        let folder = store_for(&server).ensure_folder("sess").await.unwrap();
        assert_eq!(folder.id, "folder-1");
        assert_eq!(folder.name, "sess");
    }

    #[tokio::test]
    async fn creates_folder_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .and(body_string_contains(FOLDER_MIME))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new-folder" })))
            .expect(1)
            .mount(&server)
            .await;

        let folder = store_for(&server).ensure_folder("sess").await.unwrap();
        assert_eq!(folder.id, "new-folder");
    }

    #[tokio::test]
    async fn upload_returns_view_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "multipart"))
            .and(body_string_contains("\"parents\":[\"folder-9\"]"))
            .and(body_string_contains("hello drive"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-42" })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "hello drive").unwrap();
        let folder = FolderHandle {
            id: "folder-9".into(),
            name: "sess".into(),
        };

        let url = store_for(&server).upload(&file, &folder).await;
        assert_eq!(url.as_deref(), Some("https://drive.google.com/file/d/file-42/view"));
    }

    #[tokio::test]
    async fn upload_failure_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.xlsx");
        std::fs::write(&file, "x").unwrap();
        let folder = FolderHandle {
            id: "f".into(),
            name: "s".into(),
        };
        let store = store_for(&server);
        assert_eq!(store.upload(&file, &folder).await, None);
        assert_eq!(store.upload(&dir.path().join("missing.xlsx"), &folder).await, None);
    }

    #[tokio::test]
    async fn disabled_store_never_publishes() {
        let store = DisabledStore::new("GOOGLE_SERVICE_ACCOUNT_JSON not set");
        assert!(matches!(
            store.ensure_folder("s").await,
            Err(StoreError::Unavailable(_))
        ));
        let folder = FolderHandle {
            id: "f".into(),
            name: "s".into(),
        };
        assert_eq!(store.upload(Path::new("/tmp/x"), &folder).await, None);
    }

    const TEST_RSA_KEY: &str = include_str!("../tests/fixtures/service_account_rsa.pem");

    fn service_account_store(server: &MockServer) -> DriveStore {
        let key = json!({
            "client_email": "roadmap@test-project.iam.gserviceaccount.com",
            "private_key": TEST_RSA_KEY,
            "token_uri": format!("{}/token", server.uri()),
        });
        DriveStore::from_service_account_json(
            reqwest::Client::new(),
            &key.to_string(),
            DriveEndpoints {
                api_base: format!("{}/drive/v3", server.uri()),
                upload_base: format!("{}/upload/drive/v3", server.uri()),
            },
        )
        .unwrap()
    }

    async fn mount_folder_lookup(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(header("authorization", "Bearer sa-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "files": [{ "id": "folder-1" }] })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn service_account_token_is_exchanged_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
            ))
            .and(body_string_contains("assertion="))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "sa-token", "expires_in": 3599 })),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_folder_lookup(&server).await;

        let store = service_account_store(&server);
        assert_eq!(store.ensure_folder("sess").await.unwrap().id, "folder-1");
        assert_eq!(store.ensure_folder("sess").await.unwrap().id, "folder-1");
    }

    #[tokio::test]
    async fn expired_token_is_exchanged_again() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "sa-token", "expires_in": 0 })),
            )
            .expect(2)
            .mount(&server)
            .await;
        mount_folder_lookup(&server).await;

        let store = service_account_store(&server);
        store.ensure_folder("sess").await.unwrap();
        store.ensure_folder("sess").await.unwrap();
    }

    #[tokio::test]
    async fn oversized_token_lifetime_is_clamped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "access_token": "sa-token", "expires_in": i64::MAX }),
            ))
            .expect(1)
            .mount(&server)
            .await;
        mount_folder_lookup(&server).await;

        let store = service_account_store(&server);
        store.ensure_folder("sess").await.unwrap();
        store.ensure_folder("sess").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_token_exchange_fails_folder_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let store = service_account_store(&server);
        assert!(matches!(
            store.ensure_folder("sess").await,
            Err(StoreError::Http(_))
        ));
    }
}
