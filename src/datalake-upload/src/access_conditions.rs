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

//! Conditional request headers.
//!
//! Uploads use [request preconditions] to behave as a single optimistic
//! transaction. The application may provide its own preconditions, the
//! upload replaces them as the upload progresses.
//!
//! [request preconditions]: https://developer.mozilla.org/en-US/docs/Web/HTTP/Conditional_requests

use serde::{Deserialize, Serialize};

/// The wildcard value for `If-None-Match`, the request succeeds only if the
/// file does not exist.
pub const ANY_ETAG: &str = "*";

/// The conditional state for a request.
///
/// The values are sent verbatim, as the `If-Match`, `If-None-Match`,
/// `If-Modified-Since` and `If-Unmodified-Since` headers.
///
/// # Example
/// ```
/// # use datalake_upload::access_conditions::AccessConditions;
/// let conditions = AccessConditions::new().set_if_match("0x8DB1A2B3C4D5E6F");
/// assert!(conditions.any());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct AccessConditions {
    /// Succeed only if the file etag matches this value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_match: Option<String>,

    /// Succeed only if the file etag does not match this value, [ANY_ETAG]
    /// matches any existing file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_none_match: Option<String>,

    /// Succeed only if the file changed after this time, in HTTP date format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_modified_since: Option<String>,

    /// Succeed only if the file has not changed since this time, in HTTP date
    /// format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_unmodified_since: Option<String>,
}

impl AccessConditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [if_match][AccessConditions::if_match].
    pub fn set_if_match<T: Into<String>>(mut self, v: T) -> Self {
        self.if_match = Some(v.into());
        self
    }

    /// Sets the value of [if_none_match][AccessConditions::if_none_match].
    pub fn set_if_none_match<T: Into<String>>(mut self, v: T) -> Self {
        self.if_none_match = Some(v.into());
        self
    }

    /// Sets the value of [if_modified_since][AccessConditions::if_modified_since].
    pub fn set_if_modified_since<T: Into<String>>(mut self, v: T) -> Self {
        self.if_modified_since = Some(v.into());
        self
    }

    /// Sets the value of [if_unmodified_since][AccessConditions::if_unmodified_since].
    pub fn set_if_unmodified_since<T: Into<String>>(mut self, v: T) -> Self {
        self.if_unmodified_since = Some(v.into());
        self
    }

    /// Returns true if any precondition is set.
    pub fn any(&self) -> bool {
        [
            &self.if_match,
            &self.if_none_match,
            &self.if_modified_since,
            &self.if_unmodified_since,
        ]
        .into_iter()
        .any(Option::is_some)
    }

    /// Only succeed if the file does not exist.
    pub fn create_only() -> Self {
        Self::new().set_if_none_match(ANY_ETAG)
    }

    /// Only succeed if the file etag is `etag`, all other preconditions are
    /// cleared.
    pub fn pinned_to<T: Into<String>>(etag: T) -> Self {
        Self::new().set_if_match(etag)
    }
}
