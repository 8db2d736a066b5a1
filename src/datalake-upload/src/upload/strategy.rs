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

use super::range_uploader::Chunk;
use super::sequential::SequentialChunkFeeder;
use super::substream::SubstreamSplitter;
use crate::Result;
use crate::upload_source::StreamingSource;

/// The inputs to choose how the source is split into chunks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct StrategyInputs {
    pub use_byte_buffer: bool,
    pub validate_content: bool,
    pub chunk_size: u64,
    pub min_large_chunk_upload_threshold: u64,
    pub seekable: bool,
    pub random_access: bool,
}

/// Returns true if the source must be read sequentially into buffers.
pub(crate) fn use_sequential(inputs: &StrategyInputs) -> bool {
    inputs.use_byte_buffer
        || inputs.validate_content
        || inputs.chunk_size < inputs.min_large_chunk_upload_threshold
        || !inputs.seekable
        || !inputs.random_access
}

/// Produces the chunks for an upload.
///
/// The variant is selected once per upload and never changes.
#[derive(Debug)]
pub(crate) enum ChunkProducer<S> {
    Sequential(SequentialChunkFeeder<S>),
    Substreams(SubstreamSplitter),
}

impl<S> ChunkProducer<S>
where
    S: StreamingSource + Send,
{
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequential(_) => "sequential",
            Self::Substreams(_) => "substreams",
        }
    }

    /// Returns the next chunk, or `None` when the source is exhausted.
    ///
    /// Errors are final, the producer returns `None` after an error.
    pub async fn next_chunk(&mut self) -> Option<Result<Chunk>> {
        match self {
            Self::Sequential(feeder) => feeder.next_chunk().await,
            Self::Substreams(splitter) => splitter.next_chunk().map(Ok),
        }
    }
}
