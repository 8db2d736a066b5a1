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

//! Implements the upload protocol.
//!
//! An upload creates (or truncates) the file, appends the data in chunks,
//! and then flushes at the final length. The data is visible to readers only
//! after the flush. The chunks are appended at explicit offsets, the store
//! accepts them in any order.

mod range_uploader;
mod scheduler;
mod sequential;
mod strategy;
mod substream;

use crate::access_conditions::AccessConditions;
use crate::error::{Operation, UploadError};
use crate::model::{CreateRequest, FlushRequest, PathResponse, ResourceType};
use crate::options::UploadOptions;
use crate::stub::PathClient;
use crate::upload_source::{Payload, StreamingSource};
use crate::{Error, Result};
use range_uploader::RangeUploader;
use scheduler::ConcurrencyScheduler;
use sequential::SequentialChunkFeeder;
use std::sync::Arc;
use strategy::{ChunkProducer, StrategyInputs, use_sequential};
use substream::SubstreamSplitter;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Uploads one file, either all the data is committed or none of it is.
pub(crate) struct AtomicFileSession<C, S> {
    client: Arc<C>,
    path: String,
    payload: Payload<S>,
    options: UploadOptions,
    client_request_id: String,
}

impl<C, S> AtomicFileSession<C, S>
where
    C: PathClient + 'static,
    S: StreamingSource + Send + Sync + 'static,
{
    pub fn new(client: Arc<C>, path: String, payload: Payload<S>, options: UploadOptions) -> Self {
        Self {
            client,
            path,
            payload,
            options,
            client_request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Runs the upload, returns the response of the final flush.
    pub async fn upload(self) -> Result<PathResponse> {
        let span = tracing::info_span!(
            "upload",
            path = %self.path,
            client_request_id = %self.client_request_id
        );
        let timeout = self.options.timeout;
        let run = self.run().instrument(span);
        match timeout {
            None => run.await,
            // Dropping the upload aborts any in-flight chunks.
            Some(t) => tokio::time::timeout(t, run)
                .await
                .unwrap_or_else(|_| Err(Error::cancelled(UploadError::DeadlineExceeded(t)))),
        }
    }

    async fn run(self) -> Result<PathResponse> {
        let Self {
            client,
            path,
            payload,
            mut options,
            client_request_id,
        } = self;
        options.validate()?;
        let length = match options.length {
            Some(l) => Some(l),
            None => payload.size_hint().await.map_err(Error::read)?.exact(),
        };
        tracing::info!(
            length = ?length,
            overwrite = options.overwrite,
            chunk_size = options.chunk_size,
            max_concurrency = options.max_concurrency,
            "starting upload"
        );
        // Only a known zero length skips the requests. An empty source of
        // unknown length still creates and flushes an empty file.
        if length == Some(0) {
            tracing::info!("empty upload, no requests sent");
            return Ok(PathResponse::default());
        }
        let conditions = create_conditions(&options)?;
        let cancel = options.cancellation.clone().unwrap_or_default();

        let request = CreateRequest {
            path: path.clone(),
            resource: ResourceType::File,
            path_http_headers: options.path_http_headers.clone(),
            properties: std::mem::take(&mut options.properties),
            permissions: options.permissions.take(),
            umask: options.umask.take(),
            encryption_context: options.encryption_context.take(),
            conditions,
            lease_id: options.lease_id.clone(),
            client_request_id: client_request_id.clone(),
        };
        tracing::debug!(conditions = ?request.conditions, "creating file");
        let created = cancellable(&cancel, Operation::Create, client.create(request)).await?;
        let etag = created.etag.ok_or_else(|| {
            Error::transport("the create response is missing the etag")
                .with_operation(Operation::Create)
        })?;
        tracing::debug!(%etag, "file created");

        let reader = payload.positional_reader();
        let inputs = StrategyInputs {
            use_byte_buffer: options.use_byte_buffer,
            validate_content: options.validate_content,
            chunk_size: options.chunk_size,
            min_large_chunk_upload_threshold: options.min_large_chunk_upload_threshold,
            seekable: payload.is_seekable(),
            random_access: reader.is_some() && length.is_some(),
        };
        let mut producer = match (use_sequential(&inputs), reader, length) {
            (false, Some(reader), Some(total)) => ChunkProducer::Substreams(
                SubstreamSplitter::new(reader, total, options.chunk_size),
            ),
            _ => ChunkProducer::Sequential(SequentialChunkFeeder::new(
                payload,
                options.chunk_size,
                length,
            )),
        };
        tracing::debug!(
            strategy = producer.name(),
            use_byte_buffer = inputs.use_byte_buffer,
            validate_content = inputs.validate_content,
            chunk_size = inputs.chunk_size,
            min_large_chunk_upload_threshold = inputs.min_large_chunk_upload_threshold,
            seekable = inputs.seekable,
            random_access = inputs.random_access,
            max_concurrency = options.max_concurrency,
            length = ?length,
            "uploading chunks"
        );

        let uploader = Arc::new(RangeUploader::new(
            client.clone(),
            path.clone(),
            options.lease_id.clone(),
            client_request_id.clone(),
            options.validate_content,
        ));
        let scheduler = ConcurrencyScheduler::new(
            options.max_concurrency,
            length,
            options.progress.clone(),
            cancel.clone(),
        );
        let uploaded = scheduler.run(&mut producer, uploader).await?;
        if let Some(declared) = length {
            if declared != uploaded {
                return Err(Error::internal(UploadError::LengthMismatch {
                    declared,
                    uploaded,
                }));
            }
        }

        let request = FlushRequest {
            path,
            position: uploaded,
            path_http_headers: options.path_http_headers,
            conditions: AccessConditions::pinned_to(etag),
            close: true,
            lease_id: options.lease_id,
            client_request_id,
        };
        tracing::debug!(position = uploaded, "flushing file");
        let response = cancellable(&cancel, Operation::Flush, client.flush_data(request)).await?;
        tracing::info!(position = uploaded, etag = ?response.etag, "upload committed");
        Ok(response)
    }
}

/// Returns the preconditions for the create request.
///
/// Without overwrite, and without any application preconditions, the create
/// request fails if the file exists.
fn create_conditions(options: &UploadOptions) -> Result<AccessConditions> {
    if options.overwrite || options.conditions.any() {
        return Ok(options.conditions.clone());
    }
    if options.has_create_options() {
        return Err(Error::invalid_configuration(
            UploadError::ConflictingCreateOptions,
        ));
    }
    Ok(AccessConditions::create_only())
}

async fn cancellable<F, T>(cancel: &CancellationToken, operation: Operation, f: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(?operation, "upload cancelled");
            Err(Error::cancelled(UploadError::CancelledByCaller))
        }
        r = f => r,
    };
    result.map_err(|e| e.with_operation(operation))
}
