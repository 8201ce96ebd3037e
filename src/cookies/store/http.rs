//! Network document store over HTTP.
//!
//! `HttpDocumentStore` talks to a managed key/value document service. Documents are
//! addressed by project, collection and partition key:
//!
//! ```text
//! GET {endpoint}/projects/{project}/collections/{collection}/documents/{key}
//! PUT {endpoint}/projects/{project}/collections/{collection}/documents/{key}
//! ```
//!
//! Bodies are the JSON form of a [`PartitionDocument`]. A `404` on `GET` is a missing
//! partition; every other failure (connection, timeout, `401`/`403`, `5xx`, bad body)
//! is reported as [`PersistenceError::StoreUnavailable`].
//!
//! The client is blocking. The jar performs at most one round trip per cookie call,
//! on the caller's thread.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use url::Url;

use crate::cookies::store::RemoteStore;
use crate::cookies::PartitionDocument;
use crate::errors::PersistenceError;

const USER_AGENT: &str = concat!("persistent-cookie-jar/", env!("CARGO_PKG_VERSION"));

/// HTTP-backed remote store.
pub struct HttpDocumentStore {
    client: Client,
    endpoint: Url,
    project: String,
    collection: String,
    auth_token: Option<String>,
}

impl HttpDocumentStore {
    /// Creates a store for `project`/`collection` at `endpoint`.
    ///
    /// `timeout` bounds each request; `None` leaves requests unbounded.
    pub fn new(
        endpoint: &str,
        project: &str,
        collection: &str,
        auth_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, PersistenceError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| PersistenceError::Config(format!("cannot build HTTP client: {e}")))?;

        Self::with_client(client, endpoint, project, collection, auth_token)
    }

    /// Creates a store that reuses an existing `reqwest` blocking client.
    pub fn with_client(
        client: Client,
        endpoint: &str,
        project: &str,
        collection: &str,
        auth_token: Option<String>,
    ) -> Result<Self, PersistenceError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PersistenceError::Config(format!("invalid store endpoint {endpoint:?}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(PersistenceError::Config(format!("store endpoint {endpoint} cannot be a base URL")));
        }
        if project.is_empty() || collection.is_empty() {
            return Err(PersistenceError::Config("project and collection must not be empty".to_string()));
        }

        Ok(Self {
            client,
            endpoint,
            project: project.to_string(),
            collection: collection.to_string(),
            auth_token: auth_token.filter(|t| !t.is_empty()),
        })
    }

    /// URL of the document holding partition `key`. Path segments are percent-encoded.
    pub fn document_url(&self, key: &str) -> Result<Url, PersistenceError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| PersistenceError::Config(format!("store endpoint {} cannot be a base URL", self.endpoint)))?
            .pop_if_empty()
            .extend(["projects", &self.project, "collections", &self.collection, "documents", key]);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Maps a non-success status into the store error taxonomy.
fn status_error(key: &str, status: StatusCode) -> PersistenceError {
    match status {
        StatusCode::NOT_FOUND => PersistenceError::NotFound(key.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PersistenceError::StoreUnavailable(format!("store rejected credentials ({status})"))
        }
        _ => PersistenceError::StoreUnavailable(format!("store returned {status} for {key}")),
    }
}

impl RemoteStore for HttpDocumentStore {
    fn load(&self, key: &str) -> Result<PartitionDocument, PersistenceError> {
        let url = self.document_url(key)?;
        let response = self.authorize(self.client.get(url)).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(key, status));
        }

        Ok(response.json::<PartitionDocument>()?)
    }

    fn save(&self, key: &str, document: &PartitionDocument) -> Result<(), PersistenceError> {
        let url = self.document_url(key)?;
        let response = self.authorize(self.client.put(url).json(document)).send()?;

        let status = response.status();
        if !status.is_success() {
            // A 404 on write means the project or collection is gone, not a cache miss.
            return Err(match status_error(key, status) {
                PersistenceError::NotFound(_) => {
                    PersistenceError::StoreUnavailable(format!("collection {} not found", self.collection))
                }
                other => other,
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "http store {} (project {}, collection {})",
            self.endpoint, self.project, self.collection
        )
    }
}
