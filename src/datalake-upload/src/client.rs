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

use crate::Result;
use crate::access_conditions::AccessConditions;
use crate::model::{PathHttpHeaders, PathResponse};
use crate::options::UploadOptions;
use crate::stub::PathClient;
use crate::upload::AtomicFileSession;
use crate::upload_source::{Payload, StreamingSource};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use crate::options::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MIN_LARGE_CHUNK_UPLOAD_THRESHOLD, ProgressHook, UploadConfig,
};

/// Uploads files to a hierarchical data lake store.
///
/// Each upload creates (or truncates) the file, appends the data in one or
/// more chunks, and then commits the data with a single flush. Readers never
/// observe a partially uploaded file, the flush makes all the data visible at
/// once.
///
/// The uploader does not send any requests directly. Applications provide
/// the transport as an implementation of [PathClient].
///
/// # Example
/// ```
/// # use datalake_upload::client::{UploadConfig, Uploader};
/// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(transport: C) -> anyhow::Result<()> {
/// let uploader = Uploader::with_config(
///     transport,
///     UploadConfig::new().with_max_concurrency(8_usize),
/// );
/// let response = uploader
///     .upload_file("my-filesystem/my-dir/my-file", "hello world")
///     .send()
///     .await?;
/// println!("response details={response:?}");
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Uploader<C> {
    inner: Arc<C>,
    config: UploadConfig,
}

impl<C> Clone for Uploader<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C> Uploader<C>
where
    C: PathClient + 'static,
{
    /// Creates an uploader with the default configuration.
    pub fn new(client: C) -> Self {
        Self::with_config(client, UploadConfig::default())
    }

    /// Creates an uploader with a custom configuration.
    pub fn with_config(client: C, config: UploadConfig) -> Self {
        Self {
            inner: Arc::new(client),
            config,
        }
    }

    /// The configuration used as defaults for each upload.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Uploads a file.
    ///
    /// Seekable sources of known length, such as [Bytes][bytes::Bytes] and
    /// [FileSource][crate::upload_source::FileSource], can be split into
    /// several chunks that are read and uploaded concurrently. Other sources
    /// are read sequentially, each chunk is buffered in memory until it is
    /// uploaded.
    ///
    /// # Example
    /// ```
    /// # use datalake_upload::client::Uploader;
    /// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
    /// let response = uploader
    ///     .upload_file("my-filesystem/my-file", "hello world")
    ///     .with_overwrite(true)
    ///     .send()
    ///     .await?;
    /// println!("response details={response:?}");
    /// # Ok(()) }
    /// ```
    ///
    /// # Parameters
    /// * `path` - the path of the file, including the file system name.
    /// * `payload` - the file data.
    pub fn upload_file<P, T, S>(&self, path: P, payload: T) -> UploadFile<C, S>
    where
        P: Into<String>,
        T: Into<Payload<S>>,
        S: StreamingSource + Send + Sync + 'static,
    {
        UploadFile::new(
            self.inner.clone(),
            path.into(),
            payload.into(),
            UploadOptions::from(&self.config),
        )
    }
}

/// A request builder for [Uploader::upload_file].
pub struct UploadFile<C, S> {
    inner: Arc<C>,
    path: String,
    payload: Payload<S>,
    options: UploadOptions,
}

impl<C, S> UploadFile<C, S>
where
    C: PathClient + 'static,
    S: StreamingSource + Send + Sync + 'static,
{
    pub(crate) fn new(
        inner: Arc<C>,
        path: String,
        payload: Payload<S>,
        options: UploadOptions,
    ) -> Self {
        Self {
            inner,
            path,
            payload,
            options,
        }
    }

    /// Sets the number of bytes to upload.
    ///
    /// If not set, the upload uses the size reported by the source, if
    /// exact. Otherwise the upload reads the source until it is exhausted.
    /// Extra bytes in the source are ignored. The upload fails if the source
    /// ends before producing this many bytes.
    ///
    /// # Example
    /// ```
    /// # use datalake_upload::client::Uploader;
    /// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
    /// let file = tokio::fs::File::open("my-data").await?;
    /// let length = file.metadata().await?.len();
    /// let response = uploader
    ///     .upload_file("my-filesystem/my-file", file)
    ///     .with_length(length)
    ///     .send()
    ///     .await?;
    /// println!("response details={response:?}");
    /// # Ok(()) }
    /// ```
    pub fn with_length<V: Into<u64>>(mut self, v: V) -> Self {
        self.options.length = Some(v.into());
        self
    }

    /// Replaces any existing file.
    ///
    /// By default the upload fails if the file already exists, unless the
    /// application sets its own preconditions.
    pub fn with_overwrite(mut self, v: bool) -> Self {
        self.options.overwrite = v;
        self
    }

    /// Overrides the [chunk size][UploadConfig::with_chunk_size].
    pub fn with_chunk_size<V: Into<u64>>(mut self, v: V) -> Self {
        self.options.chunk_size = v.into();
        self
    }

    /// Overrides the [maximum concurrency][UploadConfig::with_max_concurrency].
    pub fn with_max_concurrency<V: Into<usize>>(mut self, v: V) -> Self {
        self.options.max_concurrency = v.into();
        self
    }

    /// Overrides the [threshold][UploadConfig::with_min_large_chunk_upload_threshold]
    /// for concurrent reads.
    pub fn with_min_large_chunk_upload_threshold<V: Into<u64>>(mut self, v: V) -> Self {
        self.options.min_large_chunk_upload_threshold = v.into();
        self
    }

    /// Always read the source sequentially into buffers.
    pub fn with_use_byte_buffer(mut self, v: bool) -> Self {
        self.options.use_byte_buffer = v;
        self
    }

    /// Sends the MD5 hash of each chunk, the store rejects corrupted chunks.
    ///
    /// Hashing requires the data in memory, the source is always read
    /// sequentially into buffers.
    ///
    /// # Example
    /// ```
    /// # use datalake_upload::client::Uploader;
    /// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
    /// let response = uploader
    ///     .upload_file("my-filesystem/my-file", "hello world")
    ///     .with_validate_content(true)
    ///     .send()
    ///     .await?;
    /// println!("response details={response:?}");
    /// # Ok(()) }
    /// ```
    pub fn with_validate_content(mut self, v: bool) -> Self {
        self.options.validate_content = v;
        self
    }

    /// Sets user-defined properties for the new file.
    ///
    /// Properties are set when the file is created. Combine with
    /// [with_overwrite][UploadFile::with_overwrite], or with explicit
    /// preconditions.
    ///
    /// # Example
    /// ```
    /// # use datalake_upload::client::Uploader;
    /// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
    /// let response = uploader
    ///     .upload_file("my-filesystem/my-file", "hello world")
    ///     .with_overwrite(true)
    ///     .with_properties([("owner", "data-team"), ("source", "ingest")])
    ///     .send()
    ///     .await?;
    /// println!("response details={response:?}");
    /// # Ok(()) }
    /// ```
    pub fn with_properties<I, K, V>(mut self, i: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options.properties = i.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Restricts the permissions of the new file, in 4-digit octal notation.
    pub fn with_umask<V: Into<String>>(mut self, v: V) -> Self {
        self.options.umask = Some(v.into());
        self
    }

    /// Sets the POSIX permissions of the new file.
    ///
    /// Symbolic (`rwxr-x---`) and 4-digit octal (`0750`) notations are
    /// supported.
    pub fn with_permissions<V: Into<String>>(mut self, v: V) -> Self {
        self.options.permissions = Some(v.into());
        self
    }

    /// Sets the HTTP headers stored with the file.
    ///
    /// # Example
    /// ```
    /// # use datalake_upload::client::Uploader;
    /// # use datalake_upload::model::PathHttpHeaders;
    /// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
    /// let response = uploader
    ///     .upload_file("my-filesystem/my-file", "hello world")
    ///     .with_path_http_headers(PathHttpHeaders::new().set_content_type("text/plain"))
    ///     .send()
    ///     .await?;
    /// println!("response details={response:?}");
    /// # Ok(()) }
    /// ```
    pub fn with_path_http_headers<V: Into<PathHttpHeaders>>(mut self, v: V) -> Self {
        self.options.path_http_headers = v.into();
        self
    }

    /// Sets the preconditions for the create request.
    ///
    /// Setting any precondition disables the default `If-None-Match: *`
    /// condition.
    ///
    /// # Example
    /// ```
    /// # use datalake_upload::client::Uploader;
    /// # use datalake_upload::access_conditions::AccessConditions;
    /// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
    /// let response = uploader
    ///     .upload_file("my-filesystem/my-file", "hello world")
    ///     .with_conditions(AccessConditions::new().set_if_match("0x8DB1A2B3C4D5E6F"))
    ///     .send()
    ///     .await?;
    /// println!("response details={response:?}");
    /// # Ok(()) }
    /// ```
    pub fn with_conditions<V: Into<AccessConditions>>(mut self, v: V) -> Self {
        self.options.conditions = v.into();
        self
    }

    /// Sets an opaque value stored with the file.
    pub fn with_encryption_context<V: Into<String>>(mut self, v: V) -> Self {
        self.options.encryption_context = Some(v.into());
        self
    }

    /// Sends all requests with this lease id.
    pub fn with_lease_id<V: Into<String>>(mut self, v: V) -> Self {
        self.options.lease_id = Some(v.into());
        self
    }

    /// Limits the total time for the upload.
    ///
    /// The upload fails with a [cancelled][crate::Error::is_cancelled] error
    /// if it does not complete in time. The file is not committed.
    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.options.timeout = Some(v.into());
        self
    }

    /// Cancels the upload when the token is cancelled.
    ///
    /// # Example
    /// ```
    /// # use datalake_upload::client::Uploader;
    /// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
    /// let token = tokio_util::sync::CancellationToken::new();
    /// let upload = uploader
    ///     .upload_file("my-filesystem/my-file", "hello world")
    ///     .with_cancellation_token(token.clone())
    ///     .send();
    /// token.cancel();
    /// let err = upload.await.unwrap_err();
    /// assert!(err.is_cancelled(), "{err:?}");
    /// # Ok(()) }
    /// ```
    pub fn with_cancellation_token(mut self, v: CancellationToken) -> Self {
        self.options.cancellation = Some(v);
        self
    }

    /// Receives notifications as the chunks are confirmed.
    ///
    /// # Example
    /// ```
    /// # use datalake_upload::client::Uploader;
    /// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
    /// let response = uploader
    ///     .upload_file("my-filesystem/my-file", "hello world")
    ///     .with_progress_hook(|current: u64, total: Option<u64>| {
    ///         println!("uploaded {current} of {total:?} bytes");
    ///     })
    ///     .send()
    ///     .await?;
    /// println!("response details={response:?}");
    /// # Ok(()) }
    /// ```
    pub fn with_progress_hook<H>(mut self, v: H) -> Self
    where
        H: ProgressHook + 'static,
    {
        self.options.progress = Some(Arc::new(v));
        self
    }

    /// Runs the upload.
    ///
    /// Returns the response of the final flush request.
    pub async fn send(self) -> Result<PathResponse> {
        AtomicFileSession::new(self.inner, self.path, self.payload, self.options)
            .upload()
            .await
    }
}
