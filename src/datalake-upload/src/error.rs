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

//! Errors returned by the upload engine.
//!
//! All the public functions in this crate return [Error]. The error offers a
//! series of predicates to classify the failure, and accessors for the most
//! common details. More specific information is available via the
//! [source][std::error::Error::source], which is often an [UploadError].

use http::HeaderMap;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The error returned by uploads.
///
/// An upload involves several requests to the remote store, and reads from
/// the upload source. Any of these may fail. This type classifies the failure
/// and, when the failure is associated with a request, records which request
/// failed via [operation()][Error::operation].
///
/// # Example
/// ```
/// use datalake_upload::error::{Error, Operation};
/// match example_function() {
///     Err(e) if e.is_precondition_failed() => {
///         println!("the file changed (or exists) {e}");
///     },
///     Err(e) if matches!(e.operation(), Some(Operation::Append { .. })) => {
///         println!("a chunk failed to upload {e}");
///     },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<(), Error> {
///     // ... details omitted ...
///     # Err(Error::precondition_failed("file exists").with_operation(Operation::Create))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    operation: Option<Operation>,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error representing contradictory or invalid upload options.
    ///
    /// # Example
    /// ```
    /// use datalake_upload::error::Error;
    /// let error = Error::invalid_configuration("chunk size cannot be zero");
    /// assert!(error.is_invalid_configuration());
    /// ```
    pub fn invalid_configuration<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::InvalidConfiguration, source)
    }

    /// The upload options are invalid or contradict each other.
    ///
    /// This is always detected before any request is sent to the remote
    /// store. Retrying the upload with the same options fails again.
    ///
    /// # Troubleshooting
    ///
    /// Without overwrite the upload cannot change the properties, umask, or
    /// permissions of the file, as the file may already exist. Either enable
    /// overwrite or remove those options.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidConfiguration)
    }

    /// Creates an error representing a source that ended before the declared
    /// length.
    ///
    /// # Example
    /// ```
    /// use datalake_upload::error::Error;
    /// let error = Error::short_read(1024, 512);
    /// assert!(error.is_short_read());
    /// ```
    pub fn short_read(expected: u64, got: u64) -> Self {
        Self::new(ErrorKind::ShortRead, UploadError::ShortRead { expected, got })
    }

    /// The upload source returned fewer bytes than the declared length.
    ///
    /// The file is not flushed, any appended data remains uncommitted.
    pub fn is_short_read(&self) -> bool {
        matches!(self.kind, ErrorKind::ShortRead)
    }

    /// Creates an error representing a conditional request rejected by the
    /// remote store.
    pub fn precondition_failed<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::PreconditionFailed(None), source)
    }

    /// The remote store rejected a request because a precondition did not
    /// hold.
    ///
    /// Without overwrite, uploads are conditional on the file not existing
    /// (unless the application provides its own preconditions). With
    /// overwrite, the final flush is conditional on the file being unchanged
    /// since it was created by this upload. The upload layer never retries
    /// these errors.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self.kind, ErrorKind::PreconditionFailed(_))
    }

    /// Creates an error representing a network or service failure.
    pub fn transport<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Transport(None), source)
    }

    /// The request failed in the transport layer or in the service.
    ///
    /// The transport layer is responsible for any retries, this error is
    /// final for the upload.
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport(_))
    }

    /// Creates an error from an unsuccessful HTTP response.
    ///
    /// The status code `412 Precondition Failed` maps to
    /// [is_precondition_failed()][Error::is_precondition_failed], every other
    /// status code maps to [is_transport()][Error::is_transport].
    ///
    /// # Example
    /// ```
    /// use datalake_upload::error::Error;
    /// let error = Error::http(412, http::HeaderMap::new(), bytes::Bytes::from_static(b"ConditionNotMet"));
    /// assert!(error.is_precondition_failed());
    /// assert_eq!(error.http_status_code(), Some(412));
    /// ```
    pub fn http(status_code: u16, headers: HeaderMap, payload: bytes::Bytes) -> Self {
        let details = Some(Box::new(HttpDetails {
            status_code,
            headers,
            payload,
        }));
        let kind = match status_code {
            PRECONDITION_FAILED => ErrorKind::PreconditionFailed(details),
            _ => ErrorKind::Transport(details),
        };
        Self {
            kind,
            operation: None,
            source: None,
        }
    }

    /// Creates an error representing a cancelled upload.
    ///
    /// # Example
    /// ```
    /// use datalake_upload::error::Error;
    /// let error = Error::cancelled("shutting down");
    /// assert!(error.is_cancelled());
    /// ```
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Cancelled, source)
    }

    /// The upload was cancelled, or did not complete before its deadline.
    ///
    /// The file is not flushed. Some chunks may have been appended, but the
    /// data is not committed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error representing a failed read from the upload source.
    pub fn read<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Read, source)
    }

    /// The upload source returned an error.
    ///
    /// The [source][std::error::Error::source] contains the error returned by
    /// the upload source.
    pub fn is_read(&self) -> bool {
        matches!(self.kind, ErrorKind::Read)
    }

    pub(crate) fn internal<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Internal, source)
    }

    /// The upload detected an inconsistency in its own bookkeeping.
    ///
    /// # Troubleshooting
    ///
    /// This indicates a bug in the upload engine or in the upload source,
    /// for example, a source returning different data lengths from
    /// sequential and positional reads. The file is never flushed when this
    /// happens.
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::Internal)
    }

    /// Records the request that failed.
    ///
    /// If the error already has an operation this function has no effect,
    /// the innermost context is the most precise.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation.get_or_insert(operation);
        self
    }

    /// The request associated with this error, if any.
    ///
    /// Errors detected before any request, such as invalid options, or
    /// errors reading from the upload source, have no associated request.
    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    /// The HTTP status code, if any, associated with this error.
    pub fn http_status_code(&self) -> Option<u16> {
        self.http_details().map(|d| d.status_code)
    }

    /// The HTTP headers, if any, associated with this error.
    ///
    /// Services often include request ids in the response headers. These
    /// are useful when troubleshooting with the service operators.
    pub fn http_headers(&self) -> Option<&HeaderMap> {
        self.http_details().map(|d| &d.headers)
    }

    /// The HTTP payload, if any, associated with this error.
    pub fn http_payload(&self) -> Option<&bytes::Bytes> {
        self.http_details().map(|d| &d.payload)
    }

    fn new<T: Into<BoxError>>(kind: ErrorKind, source: T) -> Self {
        Self {
            kind,
            operation: None,
            source: Some(source.into()),
        }
    }

    fn http_details(&self) -> Option<&HttpDetails> {
        match &self.kind {
            ErrorKind::PreconditionFailed(d) | ErrorKind::Transport(d) => d.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::InvalidConfiguration, Some(e)) => {
                write!(f, "invalid upload configuration: {e}")?
            }
            (ErrorKind::ShortRead, Some(e)) => write!(f, "the upload source ended early: {e}")?,
            (ErrorKind::PreconditionFailed(Some(d)), _) => {
                write!(f, "a precondition did not hold, ")?;
                d.display(f)?
            }
            (ErrorKind::PreconditionFailed(None), Some(e)) => {
                write!(f, "a precondition did not hold: {e}")?
            }
            (ErrorKind::Transport(Some(d)), _) => d.display(f)?,
            (ErrorKind::Transport(None), Some(e)) => {
                write!(f, "the transport reports an error: {e}")?
            }
            (ErrorKind::Cancelled, Some(e)) => write!(f, "the upload was cancelled: {e}")?,
            (ErrorKind::Read, Some(e)) => write!(f, "cannot read from the upload source: {e}")?,
            (ErrorKind::Internal, Some(e)) => {
                write!(f, "the upload detected an internal inconsistency: {e}")?
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
        if let Some(op) = &self.operation {
            write!(f, " (during {op})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

/// The request associated with an [Error].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Operation {
    /// The request creating (or truncating) the file.
    Create,
    /// The request appending a single chunk.
    Append { offset: u64, length: u64 },
    /// The request committing the appended data.
    Flush,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Append { offset, length } => {
                write!(f, "append at offset {offset} with length {length}")
            }
            Self::Flush => write!(f, "flush"),
        }
    }
}

/// Detailed problems in the upload protocol.
///
/// These are returned as the [source][std::error::Error::source] of an
/// [Error].
///
/// # Example
/// ```
/// # use datalake_upload::{client::Uploader, error::UploadError};
/// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
/// use std::error::Error as _;
/// let upload = uploader
///     .upload_file("my-filesystem/my-file", "hello world")
///     .with_length(1024_u64);
/// match upload.send().await {
///     Ok(response) => println!("Successfully uploaded {response:?}"),
///     Err(error) if error.is_short_read() => {
///         if let Some(e) = error.source().and_then(|e| e.downcast_ref::<UploadError>()) {
///             println!("{e}");
///         }
///     },
///     Err(e) => return Err(e.into()), // not handled in this example
/// }
/// # Ok(()) }
/// ```
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum UploadError {
    /// The source ended before producing the declared number of bytes.
    #[error("expected {expected} bytes from the source, but it ended after {got} bytes")]
    ShortRead { expected: u64, got: u64 },

    /// The confirmed chunks do not add up to the flush position.
    ///
    /// # Troubleshoot
    ///
    /// All of these conditions indicate a bug. In Rust it is idiomatic to
    /// `panic!()` when a bug is detected, but flushing at the wrong position
    /// would corrupt the file, and the upload layer cannot determine the
    /// location of the bug. The upload reports the problem and skips the
    /// flush.
    #[error("the confirmed chunks add up to {uploaded} bytes, but the flush position is {declared}")]
    LengthMismatch { declared: u64, uploaded: u64 },

    /// Creation options were provided for a file that may already exist.
    #[error("properties, umask and permissions can be set only when overwrite is enabled")]
    ConflictingCreateOptions,

    /// The chunk size must be positive.
    #[error("the chunk size must be greater than zero")]
    InvalidChunkSize,

    /// The maximum concurrency must be positive.
    #[error("the maximum concurrency must be greater than zero")]
    InvalidConcurrency,

    /// The upload did not complete before its deadline.
    #[error("the upload did not complete within {0:?}")]
    DeadlineExceeded(std::time::Duration),

    /// The application cancelled the upload.
    #[error("the application cancelled the upload")]
    CancelledByCaller,
}

const PRECONDITION_FAILED: u16 = 412;

#[derive(Debug)]
enum ErrorKind {
    InvalidConfiguration,
    ShortRead,
    PreconditionFailed(Option<Box<HttpDetails>>),
    Transport(Option<Box<HttpDetails>>),
    Cancelled,
    Read,
    Internal,
}

#[derive(Debug)]
struct HttpDetails {
    status_code: u16,
    headers: HeaderMap,
    payload: bytes::Bytes,
}

impl HttpDetails {
    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.status_code;
        match std::str::from_utf8(self.payload.as_ref()) {
            Ok(message) => write!(f, "the service reports a [{code}] error: {message}"),
            Err(_) => write!(f, "the service reports a [{code}] error: {:?}", self.payload),
        }
    }
}
