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

//! Atomic uploads of large files to hierarchical data lake stores.
//!
//! This crate uploads files to stores that expose a create, append, and
//! flush protocol. The data is appended in chunks, possibly concurrently,
//! and only becomes visible after the final flush. Most applications will
//! use the [Uploader][client::Uploader] client, together with an
//! implementation of [PathClient][stub::PathClient] for their transport.
//!
//! The uploader chooses between two strategies:
//!
//! * Seekable sources of known length, with large chunks, are split into
//!   independent views. Each view is read in the task uploading it.
//! * All other sources are read sequentially into buffers of the chunk size.
//!
//! In both cases at most `max_concurrency` chunks are in flight.

pub mod access_conditions;
pub mod client;
pub mod error;
pub mod model;
pub mod stub;
pub mod upload_source;

mod options;
mod upload;

pub use error::Error;

/// The result type returned by all the functions in this crate.
pub type Result<T> = std::result::Result<T, Error>;
