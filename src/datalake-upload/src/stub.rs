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

//! Traits to plug in the transport for [Uploader][crate::client::Uploader].
//!
//! The upload engine does not send any requests by itself. Applications
//! provide an implementation of [PathClient] that maps each request to the
//! wire protocol of the remote store, including authentication and any retry
//! loops. Tests can implement the trait to mock the remote store.

use crate::Result;
use crate::model::{AppendRequest, CreateRequest, FlushRequest, PathResponse};

/// Defines the requests used by [crate::client::Uploader].
///
/// Implementations must be safe to call from multiple tasks at the same time,
/// the upload issues several [append_data][PathClient::append_data] requests
/// concurrently.
///
/// Implementations should return errors created with
/// [Error::http][crate::Error::http] for unsuccessful HTTP responses, the
/// upload relies on the status code to detect precondition failures.
/// Use [Error::transport][crate::Error::transport] for any other failure.
pub trait PathClient: std::fmt::Debug + Send + Sync {
    /// Creates, or replaces, the file.
    ///
    /// The response must include the etag of the new file.
    fn create(
        &self,
        req: CreateRequest,
    ) -> impl std::future::Future<Output = Result<PathResponse>> + Send;

    /// Appends one chunk to the file, the data is not committed.
    fn append_data(
        &self,
        req: AppendRequest,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Commits all the appended data up to the request position.
    fn flush_data(
        &self,
        req: FlushRequest,
    ) -> impl std::future::Future<Output = Result<PathResponse>> + Send;
}
