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

use super::substream::Substream;
use crate::Result;
use crate::error::Operation;
use crate::model::AppendRequest;
use crate::stub::PathClient;
use std::sync::Arc;

/// One unit of upload work.
#[derive(Debug)]
pub(crate) struct Chunk {
    pub offset: u64,
    pub length: u64,
    pub payload: ChunkPayload,
}

#[derive(Debug)]
pub(crate) enum ChunkPayload {
    /// The data, already read from the source.
    Buffer(bytes::Bytes),
    /// A window into the source, read when the chunk is uploaded.
    View(Substream),
}

/// The outcome of a successful chunk upload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ChunkResult {
    pub offset: u64,
    pub length: u64,
}

/// Uploads single chunks to the file created by the session.
#[derive(Debug)]
pub(crate) struct RangeUploader<C> {
    client: Arc<C>,
    path: String,
    lease_id: Option<String>,
    client_request_id: String,
    validate_content: bool,
}

impl<C> RangeUploader<C>
where
    C: PathClient,
{
    pub fn new(
        client: Arc<C>,
        path: String,
        lease_id: Option<String>,
        client_request_id: String,
        validate_content: bool,
    ) -> Self {
        Self {
            client,
            path,
            lease_id,
            client_request_id,
            validate_content,
        }
    }

    pub async fn upload(&self, chunk: Chunk) -> Result<ChunkResult> {
        let Chunk {
            offset,
            length,
            payload,
        } = chunk;
        let operation = Operation::Append { offset, length };
        let data = match payload {
            ChunkPayload::Buffer(b) => b,
            ChunkPayload::View(view) => view
                .read()
                .await
                .map_err(|e| e.with_operation(operation))?,
        };
        let content_md5 = self
            .validate_content
            .then(|| bytes::Bytes::copy_from_slice(&md5::compute(&data).0));
        let request = AppendRequest {
            path: self.path.clone(),
            offset,
            data,
            content_md5,
            lease_id: self.lease_id.clone(),
            client_request_id: self.client_request_id.clone(),
        };
        self.client
            .append_data(request)
            .await
            .map_err(|e| e.with_operation(operation))?;
        Ok(ChunkResult { offset, length })
    }
}
