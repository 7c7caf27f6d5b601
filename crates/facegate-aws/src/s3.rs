//! Amazon S3 as the image store.

use crate::error::AwsBackendError;
use async_trait::async_trait;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use facegate_core::{FacegateError, ImageKey, ImageStore, Result};

pub struct S3ImageStore {
    client: Client,
    bucket: String,
}

impl S3ImageStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn get_object(&self, key: &ImageKey) -> Result<Vec<u8>> {
        let response = match self
            .client
            .get_object()
            .bucket(self.bucket.as_str())
            .key(key.as_str())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                if err.as_service_error().is_some_and(is_missing_object) {
                    return Err(FacegateError::ImageNotFound(key.to_string()));
                }
                return Err(AwsBackendError::service("GetObject", err).into());
            }
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| AwsBackendError::Body(e.to_string()))?;

        let bytes = body.into_bytes().to_vec();
        tracing::debug!(key = %key, size = bytes.len(), "object fetched");
        Ok(bytes)
    }
}

/// Only a missing key is "not found"; every other store failure is an outage.
fn is_missing_object(err: &GetObjectError) -> bool {
    err.is_no_such_key()
}
