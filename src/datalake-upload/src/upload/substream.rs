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

//! Splits seekable sources into independent views.
//!
//! Each view holds a handle to the positional reader, and a window into the
//! source. The data is read only when the chunk is uploaded, in the task
//! performing the upload. Views never share a read cursor.

use super::range_uploader::{Chunk, ChunkPayload};
use crate::upload_source::PositionalRead;
use crate::{Error, Result};
use std::sync::Arc;

/// Returns the `(offset, length)` pairs covering `[0, total)`.
///
/// All pairs have `chunk_size` bytes except the last one.
pub(crate) fn partition(total: u64, chunk_size: u64) -> impl Iterator<Item = (u64, u64)> {
    let step = chunk_size.max(1);
    (0..total.div_ceil(step)).map(move |i| {
        let offset = i * step;
        (offset, step.min(total - offset))
    })
}

#[derive(Debug)]
pub(crate) struct SubstreamSplitter {
    reader: Arc<dyn PositionalRead>,
    ranges: std::vec::IntoIter<(u64, u64)>,
}

impl SubstreamSplitter {
    pub fn new(reader: Arc<dyn PositionalRead>, total: u64, chunk_size: u64) -> Self {
        let ranges = partition(total, chunk_size).collect::<Vec<_>>().into_iter();
        Self { reader, ranges }
    }

    pub fn next_chunk(&mut self) -> Option<Chunk> {
        let (offset, length) = self.ranges.next()?;
        Some(Chunk {
            offset,
            length,
            payload: ChunkPayload::View(Substream::new(self.reader.clone(), offset, length)),
        })
    }
}

/// A window into a seekable source.
#[derive(Debug)]
pub(crate) struct Substream {
    reader: Arc<dyn PositionalRead>,
    offset: u64,
    length: u64,
}

impl Substream {
    pub fn new(reader: Arc<dyn PositionalRead>, offset: u64, length: u64) -> Self {
        Self {
            reader,
            offset,
            length,
        }
    }

    /// Reads the full window.
    pub async fn read(&self) -> Result<bytes::Bytes> {
        let data = self
            .reader
            .read_at(self.offset, self.length)
            .await
            .map_err(Error::read)?;
        let got = data.len() as u64;
        if got < self.length {
            return Err(Error::short_read(
                self.offset + self.length,
                self.offset + got,
            ));
        }
        // Extra data is ignored, the window is authoritative.
        Ok(data.slice(0..self.length as usize))
    }
}
