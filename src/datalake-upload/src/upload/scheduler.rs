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

use super::range_uploader::{Chunk, ChunkResult, RangeUploader};
use super::strategy::ChunkProducer;
use crate::error::{Operation, UploadError};
use crate::options::ProgressHook;
use crate::stub::PathClient;
use crate::upload_source::StreamingSource;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Runs chunk uploads with bounded concurrency.
///
/// The scheduler is the only writer of the progress counter. It stops
/// dispatching chunks on the first error, and stops updating the progress
/// counter too.
pub(crate) struct ConcurrencyScheduler {
    max_concurrency: usize,
    total: Option<u64>,
    progress: Option<Arc<dyn ProgressHook>>,
    // Cancelled by the application.
    cancel: CancellationToken,
    // Cancelled by the scheduler to stop the in-flight chunks.
    abort: CancellationToken,
    confirmed: u64,
}

impl ConcurrencyScheduler {
    pub fn new(
        max_concurrency: usize,
        total: Option<u64>,
        progress: Option<Arc<dyn ProgressHook>>,
        cancel: CancellationToken,
    ) -> Self {
        let abort = cancel.child_token();
        Self {
            max_concurrency: max_concurrency.max(1),
            total,
            progress,
            cancel,
            abort,
            confirmed: 0,
        }
    }

    /// Uploads all the chunks, returns the number of bytes confirmed.
    pub async fn run<C, S>(
        mut self,
        producer: &mut ChunkProducer<S>,
        uploader: Arc<RangeUploader<C>>,
    ) -> Result<u64>
    where
        C: PathClient + 'static,
        S: StreamingSource + Send,
    {
        let mut inflight = JoinSet::new();
        if let Err(e) = self.drive(producer, &uploader, &mut inflight).await {
            tracing::warn!(
                error = %e,
                inflight = inflight.len(),
                confirmed = self.confirmed,
                "stopping upload after the first error"
            );
            self.abort.cancel();
            // The results of in-flight chunks are discarded.
            while inflight.join_next().await.is_some() {}
            return Err(e);
        }
        Ok(self.confirmed)
    }

    async fn drive<C, S>(
        &mut self,
        producer: &mut ChunkProducer<S>,
        uploader: &Arc<RangeUploader<C>>,
        inflight: &mut JoinSet<Result<ChunkResult>>,
    ) -> Result<()>
    where
        C: PathClient + 'static,
        S: StreamingSource + Send,
    {
        let cancel = self.cancel.clone();
        let mut exhausted = false;
        loop {
            while let Some(join) = inflight.try_join_next() {
                self.handle_inflight_join(join)?;
            }
            if exhausted && inflight.is_empty() {
                return Ok(());
            }
            if exhausted || inflight.len() >= self.max_concurrency {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    Some(join) = inflight.join_next() => self.handle_inflight_join(join)?,
                }
                continue;
            }
            // Reading the next chunk is never raced against completions, the
            // sequential feeder cannot lose a partially read buffer.
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                next = producer.next_chunk() => next,
            };
            match next {
                None => exhausted = true,
                Some(chunk) => self.dispatch(chunk?, uploader, inflight),
            }
        }
    }

    fn dispatch<C>(
        &self,
        chunk: Chunk,
        uploader: &Arc<RangeUploader<C>>,
        inflight: &mut JoinSet<Result<ChunkResult>>,
    ) where
        C: PathClient + 'static,
    {
        let (offset, length) = (chunk.offset, chunk.length);
        tracing::debug!(offset, length, inflight = inflight.len(), "dispatching chunk");
        let uploader = uploader.clone();
        let abort = self.abort.clone();
        let task = async move {
            tokio::select! {
                biased;
                _ = abort.cancelled() => {
                    let error = Error::cancelled("the upload stopped before this chunk completed");
                    Err(error.with_operation(Operation::Append { offset, length }))
                }
                r = uploader.upload(chunk) => r,
            }
        };
        inflight.spawn(task.in_current_span());
    }

    fn handle_inflight_join(
        &mut self,
        join: std::result::Result<Result<ChunkResult>, JoinError>,
    ) -> Result<()> {
        let result = join.map_err(Error::internal)??;
        self.confirmed += result.length;
        tracing::debug!(
            offset = result.offset,
            length = result.length,
            confirmed = self.confirmed,
            "chunk confirmed"
        );
        if let Some(hook) = &self.progress {
            hook.on_progress(self.confirmed, self.total);
        }
        Ok(())
    }
}

fn cancelled() -> Error {
    Error::cancelled(UploadError::CancelledByCaller)
}
