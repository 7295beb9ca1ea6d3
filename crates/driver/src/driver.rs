use std::future::Future;
use std::sync::Arc;

use panbridge_auth::{Credentials, TokenManager};
use panbridge_protocol::ProviderError;
use panbridge_provider::ProviderClient;
use panbridge_transfer::{ProgressSink, StreamSource, validate_file_name};
use panbridge_upload::{UploadOutcome, UploadPipeline};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::object::RemoteObject;

/// Storage driver for one provider account.
///
/// Every call obtains a valid access token first and is retried once
/// after renewing the session if the provider rejects the token.
pub struct PanDriver {
    config: DriverConfig,
    client: Arc<ProviderClient>,
    tokens: Arc<TokenManager>,
    pipeline: UploadPipeline,
}

impl PanDriver {
    pub fn new(config: DriverConfig) -> Result<Self, DriverError> {
        config.validate()?;
        let client = Arc::new(ProviderClient::new(&config.provider)?);
        let credentials = Credentials::new(config.api_key.clone(), config.api_secret.clone());
        let tokens = Arc::new(TokenManager::new(client.clone(), Some(credentials)));
        let pipeline = UploadPipeline::new(client.clone(), tokens.clone(), config.upload.clone());

        Ok(Self {
            config,
            client,
            tokens,
            pipeline,
        })
    }

    /// Aborts uploads when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.pipeline = self.pipeline.with_cancel(cancel);
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn root_folder_id(&self) -> &str {
        &self.config.root_folder_id
    }

    /// Authenticates with the configured credentials.
    pub async fn init(&self) -> Result<(), DriverError> {
        self.tokens.authenticate().await?;
        info!(api = %self.client.base_url(), "driver initialised");
        Ok(())
    }

    pub async fn list(&self, folder_id: &str) -> Result<Vec<RemoteObject>, DriverError> {
        let client = &self.client;
        let items = self
            .call(|token| async move { client.list_files(&token, folder_id).await })
            .await?;
        Ok(items.into_iter().map(RemoteObject::from).collect())
    }

    /// Resolves a download URL for a file.
    pub async fn link(&self, file: &RemoteObject) -> Result<String, DriverError> {
        if file.is_dir {
            return Err(DriverError::InvalidInput(format!(
                "{} is a folder and has no download link",
                file.id
            )));
        }
        let client = &self.client;
        let id = file.id.as_str();
        self.call(|token| async move { client.download_url(&token, id).await })
            .await
    }

    pub async fn make_dir(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<RemoteObject, DriverError> {
        validate_file_name(name)?;
        let client = &self.client;
        let id = self
            .call(|token| async move { client.create_folder(&token, parent_id, name).await })
            .await?;
        Ok(RemoteObject {
            id,
            name: name.to_string(),
            size: 0,
            is_dir: true,
            modified: None,
        })
    }

    pub async fn rename(
        &self,
        obj: &RemoteObject,
        new_name: &str,
    ) -> Result<RemoteObject, DriverError> {
        validate_file_name(new_name)?;
        let client = &self.client;
        let (id, kind) = (obj.id.as_str(), obj.kind());
        self.call(|token| async move { client.rename_item(&token, id, kind, new_name).await })
            .await?;
        Ok(RemoteObject {
            name: new_name.to_string(),
            ..obj.clone()
        })
    }

    pub async fn move_to(
        &self,
        obj: &RemoteObject,
        dst_folder_id: &str,
    ) -> Result<(), DriverError> {
        let client = &self.client;
        let (id, kind) = (obj.id.as_str(), obj.kind());
        self.call(|token| async move { client.move_item(&token, id, kind, dst_folder_id).await })
            .await
    }

    pub async fn remove(&self, obj: &RemoteObject) -> Result<(), DriverError> {
        let client = &self.client;
        let (id, kind) = (obj.id.as_str(), obj.kind());
        self.call(|token| async move { client.delete_item(&token, id, kind).await })
            .await
    }

    /// Uploads `source` into `folder_id`.
    ///
    /// Returns the new object when the provider reports its id.
    pub async fn put(
        &self,
        folder_id: &str,
        source: StreamSource,
        progress: &dyn ProgressSink,
    ) -> Result<Option<RemoteObject>, DriverError> {
        let outcome = self.pipeline.put(folder_id, source, progress).await?;
        Ok(uploaded_object(outcome))
    }

    async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, DriverError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.tokens
            .authorized(|token| {
                let fut = op(token);
                async move { fut.await.map_err(DriverError::from) }
            })
            .await
    }
}

fn uploaded_object(outcome: UploadOutcome) -> Option<RemoteObject> {
    let UploadOutcome {
        file_name,
        size,
        object_id,
        ..
    } = outcome;
    object_id.map(|id| RemoteObject {
        id,
        name: file_name,
        size,
        is_dir: false,
        modified: None,
    })
}
