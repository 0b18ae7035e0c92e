use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::storage::{
    applicant_folder, check_pdf, unique_object_name, FolderDeletion, ResumeStorage, ResumeUpload,
    StorageError, StoredResume,
};

/// Resume storage backed by an S3-compatible bucket (MinIO locally, S3 in production).
#[derive(Clone)]
pub struct S3ResumeStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
    root_folder: String,
    max_bytes: usize,
}

impl S3ResumeStorage {
    pub fn new(client: Client, config: &StorageConfig, max_bytes: usize) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
            root_folder: config.root_folder.clone(),
            max_bytes,
        }
    }

    /// Builds the S3 client from static credentials and wraps it.
    pub async fn from_config(config: &StorageConfig, max_bytes: usize) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "careers-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        // MinIO and most self-hosted gateways only speak path-style addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self::new(Client::from_conf(s3_config), config, max_bytes)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    StorageError::Backend(format!("list failed: {}", DisplayErrorContext(&e)))
                })?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl ResumeStorage for S3ResumeStorage {
    async fn upload(&self, upload: ResumeUpload) -> Result<StoredResume, StorageError> {
        check_pdf(&upload.bytes, &upload.file_name, self.max_bytes)?;

        let folder = applicant_folder(&self.root_folder, &upload.applicant_name);
        let key = format!("{folder}/{}", unique_object_name(&upload.file_name));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(upload.bytes))
            .content_type("application/pdf")
            .if_none_match("*")
            .send()
            .await
            .map_err(|e| {
                if e.code() == Some("PreconditionFailed") {
                    StorageError::AlreadyExists(key.clone())
                } else {
                    StorageError::Backend(format!("upload failed: {}", DisplayErrorContext(&e)))
                }
            })?;

        info!("Uploaded resume to s3://{}/{}", self.bucket, key);

        Ok(StoredResume {
            url: self.object_url(&key),
            storage_id: key,
            file_name: upload.file_name,
            folder,
        })
    }

    async fn delete_one(&self, storage_id: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(storage_id)
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!(
                    "delete of {storage_id} failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        info!("Deleted s3://{}/{}", self.bucket, storage_id);
        Ok(())
    }

    async fn delete_folder(&self, folder: &str) -> Result<FolderDeletion, StorageError> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        let keys = self.list_keys(&prefix).await?;

        let mut summary = FolderDeletion {
            total_files: keys.len(),
            ..Default::default()
        };

        for key in keys {
            match self.delete_one(&key).await {
                Ok(()) => summary.deleted_count += 1,
                Err(e) => {
                    warn!("Could not delete {key}: {e}");
                    summary.failed_deletions.push(key);
                }
            }
        }

        info!(
            "Folder {prefix} cleanup: {}/{} deleted",
            summary.deleted_count, summary.total_files
        );
        Ok(summary)
    }
}
