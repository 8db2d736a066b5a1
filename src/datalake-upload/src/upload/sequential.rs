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

use super::range_uploader::{Chunk, ChunkPayload};
use crate::upload_source::StreamingSource;
use crate::{Error, Result};

/// Reads the source in order, assembling fixed-size buffers.
///
/// Sources return buffers of any size. The feeder splits and joins them to
/// produce chunks of exactly `chunk_size` bytes, except for the last chunk.
#[derive(Debug)]
pub(crate) struct SequentialChunkFeeder<S> {
    source: S,
    chunk_size: u64,
    total: Option<u64>,
    offset: u64,
    // Data received from the source but not yet part of any chunk.
    remainder: Option<bytes::Bytes>,
    done: bool,
}

impl<S> SequentialChunkFeeder<S>
where
    S: StreamingSource + Send,
{
    pub fn new(source: S, chunk_size: u64, total: Option<u64>) -> Self {
        Self {
            source,
            chunk_size: chunk_size.max(1),
            total,
            offset: 0,
            remainder: None,
            done: false,
        }
    }

    pub async fn next_chunk(&mut self) -> Option<Result<Chunk>> {
        if self.done {
            return None;
        }
        let want = match self.total {
            Some(total) => self.chunk_size.min(total - self.offset),
            None => self.chunk_size,
        };
        if want == 0 {
            self.done = true;
            return None;
        }
        let (parts, size) = match self.fill(want).await {
            Ok(p) => p,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if size < want {
            // The source is exhausted.
            self.done = true;
            if let Some(total) = self.total {
                return Some(Err(Error::short_read(total, self.offset + size)));
            }
            if size == 0 {
                return None;
            }
        }
        let offset = self.offset;
        self.offset += size;
        Some(Ok(Chunk {
            offset,
            length: size,
            payload: ChunkPayload::Buffer(concat(parts, size)),
        }))
    }

    async fn fill(&mut self, want: u64) -> Result<(Vec<bytes::Bytes>, u64)> {
        let mut parts = Vec::new();
        let mut size = 0_u64;
        while size < want {
            let mut next = match self.remainder.take() {
                Some(b) => b,
                None => match self.source.next().await.transpose().map_err(Error::read)? {
                    None => break,
                    Some(b) => b,
                },
            };
            let need = (want - size) as usize;
            if next.len() > need {
                self.remainder = Some(next.split_off(need));
            }
            size += next.len() as u64;
            if !next.is_empty() {
                parts.push(next);
            }
        }
        Ok((parts, size))
    }
}

fn concat(mut parts: Vec<bytes::Bytes>, size: u64) -> bytes::Bytes {
    if parts.len() <= 1 {
        return parts.pop().unwrap_or_default();
    }
    let mut buffer = bytes::BytesMut::with_capacity(size as usize);
    for p in parts {
        buffer.extend_from_slice(&p);
    }
    buffer.freeze()
}
