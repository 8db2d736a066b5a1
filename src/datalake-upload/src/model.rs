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

//! The messages exchanged with the [PathClient][crate::stub::PathClient].
//!
//! The upload creates these requests, the implementation of `PathClient`
//! maps them to the wire protocol of the remote store.

use crate::access_conditions::AccessConditions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The HTTP headers stored with a file and returned on reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct PathHttpHeaders {
    /// Cache-Control directive, matching [RFC 7234 §5.2].
    ///
    /// [rfc 7234 §5.2]: https://tools.ietf.org/html/rfc7234#section-5.2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,

    /// Content-Disposition of the file data, matching [RFC 6266].
    ///
    /// [rfc 6266]: https://tools.ietf.org/html/rfc6266
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,

    /// Content-Encoding of the file data, matching [RFC 7231 §3.1.2.2].
    ///
    /// [rfc 7231 §3.1.2.2]: https://tools.ietf.org/html/rfc7231#section-3.1.2.2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,

    /// Content-Language of the file data, matching [RFC 7231 §3.1.3.2].
    ///
    /// [rfc 7231 §3.1.3.2]: https://tools.ietf.org/html/rfc7231#section-3.1.3.2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,

    /// Content-Type of the file data, matching [RFC 7231 §3.1.1.5].
    ///
    /// [rfc 7231 §3.1.1.5]: https://tools.ietf.org/html/rfc7231#section-3.1.1.5
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// The MD5 hash of the complete file, stored with the file.
    ///
    /// The store does not validate this value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_md5: Option<bytes::Bytes>,
}

impl PathHttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [cache_control][PathHttpHeaders::cache_control].
    pub fn set_cache_control<T: Into<String>>(mut self, v: T) -> Self {
        self.cache_control = Some(v.into());
        self
    }

    /// Sets the value of [content_disposition][PathHttpHeaders::content_disposition].
    pub fn set_content_disposition<T: Into<String>>(mut self, v: T) -> Self {
        self.content_disposition = Some(v.into());
        self
    }

    /// Sets the value of [content_encoding][PathHttpHeaders::content_encoding].
    pub fn set_content_encoding<T: Into<String>>(mut self, v: T) -> Self {
        self.content_encoding = Some(v.into());
        self
    }

    /// Sets the value of [content_language][PathHttpHeaders::content_language].
    pub fn set_content_language<T: Into<String>>(mut self, v: T) -> Self {
        self.content_language = Some(v.into());
        self
    }

    /// Sets the value of [content_type][PathHttpHeaders::content_type].
    pub fn set_content_type<T: Into<String>>(mut self, v: T) -> Self {
        self.content_type = Some(v.into());
        self
    }

    /// Sets the value of [content_md5][PathHttpHeaders::content_md5].
    pub fn set_content_md5<T: Into<bytes::Bytes>>(mut self, v: T) -> Self {
        self.content_md5 = Some(v.into());
        self
    }
}

/// The kind of resource created by [CreateRequest].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ResourceType {
    #[default]
    File,
    Directory,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// Creates, or replaces, a file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateRequest {
    /// The path of the file, relative to the file system.
    pub path: String,
    pub resource: ResourceType,
    pub path_http_headers: PathHttpHeaders,
    /// User-defined properties stored with the file.
    pub properties: BTreeMap<String, String>,
    /// The POSIX access permissions for the file owner, group, and others.
    ///
    /// Symbolic (`rwxr-x---`) and 4-digit octal (`0750`) notations are
    /// supported.
    pub permissions: Option<String>,
    /// The umask restricts the permissions of the file, in 4-digit octal
    /// notation.
    pub umask: Option<String>,
    /// An opaque value stored with the file and returned on reads.
    pub encryption_context: Option<String>,
    pub conditions: AccessConditions,
    pub lease_id: Option<String>,
    /// Correlates all the requests in one upload.
    pub client_request_id: String,
}

/// Uploads one chunk of data, the data remains uncommitted until flushed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct AppendRequest {
    pub path: String,
    /// The position of the first byte of `data` in the file.
    pub offset: u64,
    #[serde(skip)]
    pub data: bytes::Bytes,
    /// The MD5 hash of `data`, the store validates the data with this hash.
    pub content_md5: Option<bytes::Bytes>,
    pub lease_id: Option<String>,
    pub client_request_id: String,
}

impl AppendRequest {
    /// The number of bytes in the chunk.
    pub fn length(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Commits the uploaded data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct FlushRequest {
    pub path: String,
    /// The length of the file after the flush.
    pub position: u64,
    pub path_http_headers: PathHttpHeaders,
    pub conditions: AccessConditions,
    /// If true, the store raises a file-closed event for the file.
    pub close: bool,
    pub lease_id: Option<String>,
    pub client_request_id: String,
}

/// The metadata returned by the store on create and flush requests.
///
/// A successful upload returns the response of the final flush, unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct PathResponse {
    /// The file etag, used in preconditions.
    pub etag: Option<String>,
    /// The last modification time, in HTTP date format.
    pub last_modified: Option<String>,
    /// The length of the file, if reported.
    pub content_length: Option<u64>,
    pub request_id: Option<String>,
    pub client_request_id: Option<String>,
    pub version: Option<String>,
    pub request_server_encrypted: Option<bool>,
    pub encryption_key_sha256: Option<String>,
    /// Any other response headers.
    pub headers: BTreeMap<String, String>,
}

impl PathResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [etag][PathResponse::etag].
    pub fn set_etag<T: Into<String>>(mut self, v: T) -> Self {
        self.etag = Some(v.into());
        self
    }

    /// Sets the value of [last_modified][PathResponse::last_modified].
    pub fn set_last_modified<T: Into<String>>(mut self, v: T) -> Self {
        self.last_modified = Some(v.into());
        self
    }

    /// Sets the value of [content_length][PathResponse::content_length].
    pub fn set_content_length<T: Into<u64>>(mut self, v: T) -> Self {
        self.content_length = Some(v.into());
        self
    }

    /// Sets the value of [request_id][PathResponse::request_id].
    pub fn set_request_id<T: Into<String>>(mut self, v: T) -> Self {
        self.request_id = Some(v.into());
        self
    }

    /// Sets the value of [client_request_id][PathResponse::client_request_id].
    pub fn set_client_request_id<T: Into<String>>(mut self, v: T) -> Self {
        self.client_request_id = Some(v.into());
        self
    }

    /// Sets the value of [version][PathResponse::version].
    pub fn set_version<T: Into<String>>(mut self, v: T) -> Self {
        self.version = Some(v.into());
        self
    }

    /// Sets the value of [request_server_encrypted][PathResponse::request_server_encrypted].
    pub fn set_request_server_encrypted<T: Into<bool>>(mut self, v: T) -> Self {
        self.request_server_encrypted = Some(v.into());
        self
    }

    /// Sets the value of [encryption_key_sha256][PathResponse::encryption_key_sha256].
    pub fn set_encryption_key_sha256<T: Into<String>>(mut self, v: T) -> Self {
        self.encryption_key_sha256 = Some(v.into());
        self
    }

    /// Sets the value of [headers][PathResponse::headers].
    pub fn set_headers<I, K, V>(mut self, i: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = i.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }
}
