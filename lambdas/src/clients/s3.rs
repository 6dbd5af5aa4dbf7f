use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use crate::clients::SnapshotArchive;
use crate::common::errors::Error;

#[derive(Debug, Clone)]
pub struct S3Archive {
    client: aws_sdk_s3::Client,
    bucket_name: String,
}

impl S3Archive {
    pub fn new(client: aws_sdk_s3::Client, bucket_name: impl Into<String>) -> Self {
        Self {
            client,
            bucket_name: bucket_name.into(),
        }
    }
}

#[async_trait]
impl SnapshotArchive for S3Archive {
    async fn put_snapshot(&self, key: &str, body: Vec<u8>) -> Result<(), Error> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await?;

        Ok(())
    }
}
