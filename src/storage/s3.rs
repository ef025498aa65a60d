//! S3 storage backend implementation using AWS SDK
//!
//! The production backend: every gateway request maps to exactly one S3
//! call (HeadObject, GetObject) or one upload (PutObject, or a multipart
//! upload for large bodies). Downloads are streamed chunk-by-chunk from the
//! response body, uploads are streamed part-by-part from the request body.

use super::traits::{ChunkStream, ObjectHead, StorageBackend, StorageError};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::BytesMut;
use futures::StreamExt;
use futures::TryStreamExt;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// S3 storage backend
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Part size for streamed uploads. Bodies that fit in a single part go
    /// through plain PutObject; larger bodies are uploaded as sequential
    /// multipart parts so the request body is never held in memory at once.
    /// S3 requires at least 5 MiB per part (except the last).
    const PART_SIZE: usize = 8 * 1024 * 1024;

    /// Build an S3 client from a StorageConfig without creating an S3Backend.
    pub fn build_client(config: &StorageConfig) -> Result<Client, StorageError> {
        let (endpoint, region, force_path_style, access_key_id, secret_access_key) = match config {
            StorageConfig::S3 {
                endpoint,
                region,
                force_path_style,
                access_key_id,
                secret_access_key,
                ..
            } => (
                endpoint.clone(),
                region.clone(),
                *force_path_style,
                access_key_id.clone(),
                secret_access_key.clone(),
            ),
            _ => {
                return Err(StorageError::Other(
                    "S3Backend requires S3 configuration".to_string(),
                ))
            }
        };

        // Require explicit credentials — never fall back to the default AWS credential chain
        // (env vars, ~/.aws/credentials, instance metadata, etc.)
        let credentials = match (access_key_id, secret_access_key) {
            (Some(ref key_id), Some(ref secret)) => {
                Credentials::new(key_id, secret, None, None, "cachegate-config")
            }
            _ => {
                return Err(StorageError::Other(
                    "S3 storage requires explicit credentials: set CACHEGATE_AWS_ACCESS_KEY_ID and CACHEGATE_AWS_SECRET_ACCESS_KEY".to_string(),
                ));
            }
        };

        // Build S3 client directly — no aws-config needed since we use static credentials
        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(force_path_style);

        if let Some(ref ep) = endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(ep);
        }

        Ok(Client::from_conf(s3_config_builder.build()))
    }

    /// Create a new S3 backend from configuration
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let bucket = match config {
            StorageConfig::S3 { bucket, .. } => bucket.clone(),
            _ => {
                return Err(StorageError::Other(
                    "S3Backend requires S3 configuration".to_string(),
                ))
            }
        };
        let client = Self::build_client(config)?;
        debug!("S3Backend initialized for bucket {}", bucket);
        Ok(Self { client, bucket })
    }

    /// Classify an S3 SDK error as a generic backend failure with context.
    /// Not-found cases are handled per-operation before reaching here.
    fn classify_error(e: &SdkError<impl std::fmt::Debug>, context: &str) -> StorageError {
        StorageError::Backend(format!("{} failed: {}", context, e))
    }

    /// Upload the remaining body as sequential multipart parts.
    ///
    /// `first` holds the bytes already pulled off the stream while deciding
    /// between PutObject and multipart. Parts are uploaded one at a time —
    /// the destination key is written in order and memory stays bounded at
    /// one part.
    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        mut buf: BytesMut,
        mut body: ChunkStream,
    ) -> Result<Vec<CompletedPart>, StorageError> {
        let mut parts = Vec::new();
        let mut part_number = 1i32;
        let mut done = false;

        while !done || !buf.is_empty() {
            while buf.len() < Self::PART_SIZE && !done {
                match body.try_next().await? {
                    Some(chunk) => buf.extend_from_slice(&chunk),
                    None => done = true,
                }
            }

            let take = buf.len().min(Self::PART_SIZE);
            let part_body = buf.split_to(take).freeze();

            let response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(part_body))
                .send()
                .await
                .map_err(|e| Self::classify_error(&e, "upload_part"))?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(response.e_tag().map(str::to_string))
                    .build(),
            );
            part_number += 1;
        }

        Ok(parts)
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    #[instrument(skip(self))]
    async fn head(&self, key: &str) -> Result<ObjectHead, StorageError> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if let SdkError::ServiceError(service_error) = &e {
                    if matches!(
                        service_error.err(),
                        aws_sdk_s3::operation::head_object::HeadObjectError::NotFound(_)
                    ) {
                        return StorageError::NotFound(key.to_string());
                    }
                }
                Self::classify_error(&e, "head_object")
            })?;

        debug!("S3 HEAD {}/{}", self.bucket, key);

        Ok(ObjectHead {
            content_length: response.content_length().map(|len| len as u64),
            content_type: response.content_type().map(str::to_string),
            metadata: response.metadata().cloned().unwrap_or_default(),
        })
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<(ObjectHead, ChunkStream), StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if let SdkError::ServiceError(service_error) = &e {
                    if matches!(
                        service_error.err(),
                        aws_sdk_s3::operation::get_object::GetObjectError::NoSuchKey(_)
                    ) {
                        return StorageError::NotFound(key.to_string());
                    }
                }
                Self::classify_error(&e, "get_object")
            })?;

        debug!("S3 GET stream {}/{}", self.bucket, key);

        let head = ObjectHead {
            content_length: response.content_length().map(|len| len as u64),
            content_type: response.content_type().map(str::to_string),
            metadata: response.metadata().cloned().unwrap_or_default(),
        };

        // Stream chunks directly from the S3 response body without buffering.
        // The body is a single sequential stream, so bytes reach the caller
        // in content order.
        let stream = futures::stream::unfold(response.body, |mut body| async {
            match body.try_next().await {
                Ok(Some(chunk)) => Some((Ok(chunk), body)),
                Ok(None) => None,
                Err(e) => Some((
                    Err(StorageError::Backend(format!(
                        "Failed to read response body: {}",
                        e
                    ))),
                    body,
                )),
            }
        });

        Ok((head, stream.boxed()))
    }

    #[instrument(skip(self, metadata, body))]
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
        mut body: ChunkStream,
    ) -> Result<(), StorageError> {
        // Pull chunks until the body either ends (single PutObject) or
        // outgrows one part (multipart upload).
        let mut buf = BytesMut::new();
        let mut done = false;
        while buf.len() < Self::PART_SIZE {
            match body.try_next().await? {
                Some(chunk) => buf.extend_from_slice(&chunk),
                None => {
                    done = true;
                    break;
                }
            }
        }

        if done {
            let size = buf.len();
            let mut request = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .content_type(content_type)
                .body(ByteStream::from(buf.freeze()));

            for (name, value) in &metadata {
                request = request.metadata(name, value);
            }

            request
                .send()
                .await
                .map_err(|e| Self::classify_error(&e, "put_object"))?;

            debug!("S3 PUT {}/{} ({} bytes)", self.bucket, key, size);
            return Ok(());
        }

        let mut request = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type);

        for (name, value) in &metadata {
            request = request.metadata(name, value);
        }

        let created = request
            .send()
            .await
            .map_err(|e| Self::classify_error(&e, "create_multipart_upload"))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::Backend("create_multipart_upload returned no upload id".to_string()))?
            .to_string();

        match self.upload_parts(key, &upload_id, buf, body).await {
            Ok(parts) => {
                let part_count = parts.len();
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| Self::classify_error(&e, "complete_multipart_upload"))?;

                debug!(
                    "S3 multipart PUT {}/{} ({} parts)",
                    self.bucket, key, part_count
                );
                Ok(())
            }
            Err(e) => {
                // Leave no dangling multipart upload behind on failure.
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        "Failed to abort multipart upload {} for {}/{}: {}",
                        upload_id, self.bucket, key, abort_err
                    );
                }
                Err(e)
            }
        }
    }
}
