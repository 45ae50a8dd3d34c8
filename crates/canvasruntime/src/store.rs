use async_trait::async_trait;
use canvascore::PipelineRecord;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Pipeline not found: {0}")]
    NotFound(String),
}

/// Where pipeline records are listed from and saved to
#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn list(&self) -> Result<Vec<PipelineRecord>, StoreError>;

    /// Create the record when it has no id, update it otherwise
    async fn save(&self, record: &PipelineRecord) -> Result<PipelineRecord, StoreError>;
}

/// List pipelines, logging and swallowing any failure
pub async fn list_or_empty(store: &dyn PipelineStore) -> Vec<PipelineRecord> {
    match store.list().await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("Failed to list pipelines: {}", e);
            Vec::new()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PipelineList {
    Bare(Vec<PipelineRecord>),
    Wrapped { pipelines: Vec<PipelineRecord> },
}

/// Pipeline store backed by the orchestrator REST API
pub struct HttpPipelineStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPipelineStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/orchestrator/pipelines", self.base_url)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/orchestrator/pipelines/{}", self.base_url, id)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PipelineStore for HttpPipelineStore {
    async fn list(&self) -> Result<Vec<PipelineRecord>, StoreError> {
        let url = self.collection_url();
        tracing::debug!("GET {}", url);

        let response = Self::check(self.client.get(&url).send().await?).await?;
        let records = match response.json::<PipelineList>().await? {
            PipelineList::Bare(records) => records,
            PipelineList::Wrapped { pipelines } => pipelines,
        };
        Ok(records)
    }

    async fn save(&self, record: &PipelineRecord) -> Result<PipelineRecord, StoreError> {
        let request = match &record.id {
            Some(id) => {
                let url = self.record_url(id);
                tracing::debug!("PUT {}", url);
                self.client.put(url)
            }
            None => {
                let url = self.collection_url();
                tracing::debug!("POST {}", url);
                self.client.post(url)
            }
        };

        let response = Self::check(request.json(record).send().await?).await?;
        Ok(response.json::<PipelineRecord>().await?)
    }
}

/// In-process pipeline store
#[derive(Default)]
pub struct MemoryPipelineStore {
    records: RwLock<Vec<PipelineRecord>>,
}

impl MemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PipelineRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl PipelineStore for MemoryPipelineStore {
    async fn list(&self) -> Result<Vec<PipelineRecord>, StoreError> {
        Ok(self.records.read().await.clone())
    }

    async fn save(&self, record: &PipelineRecord) -> Result<PipelineRecord, StoreError> {
        let mut records = self.records.write().await;
        match &record.id {
            Some(id) => {
                let existing = records
                    .iter_mut()
                    .find(|r| r.id.as_deref() == Some(id.as_str()))
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                *existing = record.clone();
                Ok(record.clone())
            }
            None => {
                let mut saved = record.clone();
                saved.id = Some(uuid::Uuid::new_v4().to_string());
                records.push(saved.clone());
                Ok(saved)
            }
        }
    }
}
