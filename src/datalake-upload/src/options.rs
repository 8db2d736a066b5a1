// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::access_conditions::AccessConditions;
use crate::error::UploadError;
use crate::model::PathHttpHeaders;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The default size for each chunk: 100 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Chunks smaller than this size are always uploaded from in-memory buffers.
pub const DEFAULT_MIN_LARGE_CHUNK_UPLOAD_THRESHOLD: u64 = 100 * 1024 * 1024 + 1;

/// Configuration shared by all the uploads from one
/// [Uploader][crate::client::Uploader].
///
/// # Example
/// ```
/// # use datalake_upload::client::UploadConfig;
/// let config = UploadConfig::new()
///     .with_chunk_size(8 * 1024 * 1024_u64)
///     .with_max_concurrency(4_usize);
/// assert_eq!(config.chunk_size(), 8 * 1024 * 1024);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct UploadConfig {
    chunk_size: u64,
    max_concurrency: usize,
    min_large_chunk_upload_threshold: u64,
    use_byte_buffer: bool,
}

impl UploadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the size of each chunk, except possibly the last one.
    ///
    /// Each chunk is uploaded with a separate request.
    pub fn with_chunk_size<V: Into<u64>>(mut self, v: V) -> Self {
        self.chunk_size = v.into();
        self
    }

    /// Sets the maximum number of chunks uploaded at the same time.
    ///
    /// With sequential uploads each chunk in flight holds a buffer of
    /// [chunk_size][UploadConfig::chunk_size] bytes.
    pub fn with_max_concurrency<V: Into<usize>>(mut self, v: V) -> Self {
        self.max_concurrency = v.into();
        self
    }

    /// Sets the minimum chunk size for uploads from positional reads.
    ///
    /// With smaller chunk sizes the upload reads the source sequentially.
    pub fn with_min_large_chunk_upload_threshold<V: Into<u64>>(mut self, v: V) -> Self {
        self.min_large_chunk_upload_threshold = v.into();
        self
    }

    /// If true, always read the source sequentially into memory buffers.
    pub fn with_use_byte_buffer(mut self, v: bool) -> Self {
        self.use_byte_buffer = v;
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn min_large_chunk_upload_threshold(&self) -> u64 {
        self.min_large_chunk_upload_threshold
    }

    pub fn use_byte_buffer(&self) -> bool {
        self.use_byte_buffer
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrency: 1,
            min_large_chunk_upload_threshold: DEFAULT_MIN_LARGE_CHUNK_UPLOAD_THRESHOLD,
            use_byte_buffer: false,
        }
    }
}

/// Receives progress notifications for an upload.
///
/// The upload calls this hook each time a chunk is confirmed, with the total
/// number of bytes confirmed so far and the length of the upload, if known.
/// The values are non-decreasing. The hook is never called after the upload
/// fails.
///
/// # Example
/// ```
/// # use datalake_upload::client::ProgressHook;
/// fn check<H: ProgressHook>(_h: H) {}
/// check(|current: u64, total: Option<u64>| println!("{current} of {total:?}"));
/// ```
pub trait ProgressHook: Send + Sync {
    fn on_progress(&self, current: u64, total: Option<u64>);
}

impl<F> ProgressHook for F
where
    F: Fn(u64, Option<u64>) + Send + Sync,
{
    fn on_progress(&self, current: u64, total: Option<u64>) {
        self(current, total)
    }
}

/// The options for one upload, initialized from [UploadConfig].
#[derive(Clone)]
pub(crate) struct UploadOptions {
    pub length: Option<u64>,
    pub overwrite: bool,
    pub chunk_size: u64,
    pub max_concurrency: usize,
    pub min_large_chunk_upload_threshold: u64,
    pub use_byte_buffer: bool,
    pub validate_content: bool,
    pub properties: BTreeMap<String, String>,
    pub umask: Option<String>,
    pub permissions: Option<String>,
    pub path_http_headers: PathHttpHeaders,
    pub conditions: AccessConditions,
    pub encryption_context: Option<String>,
    pub lease_id: Option<String>,
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
    pub progress: Option<Arc<dyn ProgressHook>>,
}

impl UploadOptions {
    /// Rejects options that can never succeed.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_configuration(UploadError::InvalidChunkSize));
        }
        if self.max_concurrency == 0 {
            return Err(Error::invalid_configuration(
                UploadError::InvalidConcurrency,
            ));
        }
        Ok(())
    }

    /// Returns true if any option only meaningful on creation is set.
    pub fn has_create_options(&self) -> bool {
        !self.properties.is_empty() || self.umask.is_some() || self.permissions.is_some()
    }
}

impl From<&UploadConfig> for UploadOptions {
    fn from(config: &UploadConfig) -> Self {
        Self {
            length: None,
            overwrite: false,
            chunk_size: config.chunk_size,
            max_concurrency: config.max_concurrency,
            min_large_chunk_upload_threshold: config.min_large_chunk_upload_threshold,
            use_byte_buffer: config.use_byte_buffer,
            validate_content: false,
            properties: BTreeMap::new(),
            umask: None,
            permissions: None,
            path_http_headers: PathHttpHeaders::default(),
            conditions: AccessConditions::default(),
            encryption_context: None,
            lease_id: None,
            timeout: None,
            cancellation: None,
            progress: None,
        }
    }
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("length", &self.length)
            .field("overwrite", &self.overwrite)
            .field("chunk_size", &self.chunk_size)
            .field("max_concurrency", &self.max_concurrency)
            .field(
                "min_large_chunk_upload_threshold",
                &self.min_large_chunk_upload_threshold,
            )
            .field("use_byte_buffer", &self.use_byte_buffer)
            .field("validate_content", &self.validate_content)
            .field("properties", &self.properties)
            .field("umask", &self.umask)
            .field("permissions", &self.permissions)
            .field("path_http_headers", &self.path_http_headers)
            .field("conditions", &self.conditions)
            .field("encryption_context", &self.encryption_context)
            .field("lease_id", &self.lease_id)
            .field("timeout", &self.timeout)
            .field("cancellation", &self.cancellation)
            .field("progress", &self.progress.as_ref().map(|_| "..."))
            .finish()
    }
}
