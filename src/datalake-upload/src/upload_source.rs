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

//! Defines upload data sources.
//!
//! Uploads consume any type implementing [StreamingSource]. Sources that
//! also offer independent positional reads, via [PositionalRead], can be
//! uploaded with several concurrent reads, without buffering the chunks in
//! memory.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// The *total* number of bytes expected in a [StreamingSource].
pub type SizeHint = http_body::SizeHint;

/// The payload for uploads via the [Uploader][crate::client::Uploader]
/// client.
///
/// The upload functions consume any type that can be converted to this type.
/// That includes simple buffers, files, and any type implementing
/// [StreamingSource].
///
/// # Example
/// ```
/// # tokio_test::block_on(async {
/// # use datalake_upload::upload_source::Payload;
/// use datalake_upload::upload_source::StreamingSource;
/// let buffer : &[u8] = b"the quick brown fox jumps over the lazy dog";
/// let mut size = 0_usize;
/// let mut payload = Payload::from(bytes::Bytes::from_static(buffer));
/// while let Some(bytes) = payload.next().await.transpose()? {
///     size += bytes.len();
/// }
/// assert_eq!(size, buffer.len());
/// # anyhow::Result::<()>::Ok(()) });
/// ```
pub struct Payload<T> {
    payload: T,
}

impl<T> Payload<T>
where
    T: StreamingSource,
{
    pub fn from_stream(payload: T) -> Self {
        Self { payload }
    }
}

impl<T> StreamingSource for Payload<T>
where
    T: StreamingSource + Send + Sync,
{
    type Error = T::Error;

    async fn next(&mut self) -> Option<Result<bytes::Bytes, Self::Error>> {
        self.payload.next().await
    }

    async fn size_hint(&self) -> Result<SizeHint, Self::Error> {
        self.payload.size_hint().await
    }

    fn is_seekable(&self) -> bool {
        self.payload.is_seekable()
    }

    fn positional_reader(&self) -> Option<Arc<dyn PositionalRead>> {
        self.payload.positional_reader()
    }
}

impl From<bytes::Bytes> for Payload<BytesSource> {
    fn from(value: bytes::Bytes) -> Self {
        let payload = BytesSource::new(value);
        Self { payload }
    }
}

impl From<&'static str> for Payload<BytesSource> {
    fn from(value: &'static str) -> Self {
        let b = bytes::Bytes::from_static(value.as_bytes());
        Payload::from(b)
    }
}

impl From<Vec<u8>> for Payload<BytesSource> {
    fn from(value: Vec<u8>) -> Self {
        Payload::from(bytes::Bytes::from(value))
    }
}

impl From<Vec<bytes::Bytes>> for Payload<IterSource> {
    fn from(value: Vec<bytes::Bytes>) -> Self {
        let payload = IterSource::new(value);
        Self { payload }
    }
}

impl From<tokio::fs::File> for Payload<FileSource> {
    fn from(value: tokio::fs::File) -> Self {
        Self {
            payload: FileSource::new(value),
        }
    }
}

impl<S> From<S> for Payload<S>
where
    S: StreamingSource,
{
    fn from(value: S) -> Self {
        Self { payload: value }
    }
}

/// Provides bytes for an upload from single-pass sources.
pub trait StreamingSource {
    /// The error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Gets the next set of data to upload.
    ///
    /// The buffers may have any size, the upload assembles them into chunks.
    fn next(&mut self) -> impl Future<Output = Option<Result<bytes::Bytes, Self::Error>>> + Send;

    /// An estimate of the upload size.
    ///
    /// Returns the expected size as a [min, max) range. Where `None` represents
    /// an unknown limit for the upload.
    ///
    /// If the application does not provide the upload length, the upload
    /// uses the exact size, if known. Otherwise the upload reads the source
    /// sequentially until it is exhausted.
    fn size_hint(&self) -> impl Future<Output = Result<SizeHint, Self::Error>> + Send {
        std::future::ready(Ok(SizeHint::new()))
    }

    /// Returns true if the source can be repositioned.
    fn is_seekable(&self) -> bool {
        false
    }

    /// Returns a reader supporting independent positional reads, if any.
    ///
    /// Seekable sources of known length that return a reader can be split
    /// into several chunks, each read and uploaded concurrently.
    fn positional_reader(&self) -> Option<Arc<dyn PositionalRead>> {
        None
    }
}

/// Reads a byte range from an upload source.
///
/// Each call must be independent of any other call, and independent of any
/// sequential reads via [StreamingSource::next]. The upload calls this
/// function from multiple tasks at the same time.
#[async_trait::async_trait]
pub trait PositionalRead: std::fmt::Debug + Send + Sync {
    /// Reads up to `length` bytes starting at `offset`.
    ///
    /// Returning fewer bytes than requested means the source ended early.
    async fn read_at(&self, offset: u64, length: u64) -> std::io::Result<bytes::Bytes>;
}

const READ_SIZE: usize = 256 * 1024;

/// Implements [StreamingSource] for a [tokio::fs::File].
///
/// Files are seekable. Files opened via [FileSource::open] also support
/// positional reads, each read opens a new handle for the file.
///
/// # Example
/// ```
/// # use datalake_upload::client::Uploader;
/// # use datalake_upload::upload_source::FileSource;
/// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
/// let payload = FileSource::open("my-data").await?;
/// let response = uploader
///     .upload_file("my-filesystem/my-file", payload)
///     .send()
///     .await?;
/// println!("response details={response:?}");
/// # Ok(()) }
/// ```
pub struct FileSource {
    inner: tokio::fs::File,
    path: Option<PathBuf>,
}

impl FileSource {
    fn new(inner: tokio::fs::File) -> Self {
        Self { inner, path: None }
    }

    /// Opens the file at `path`.
    pub async fn open<P: Into<PathBuf>>(path: P) -> std::io::Result<Self> {
        let path = path.into();
        let inner = tokio::fs::File::open(&path).await?;
        Ok(Self {
            inner,
            path: Some(path),
        })
    }
}

impl StreamingSource for FileSource {
    type Error = std::io::Error;

    async fn next(&mut self) -> Option<Result<bytes::Bytes, Self::Error>> {
        let mut buffer = vec![0_u8; READ_SIZE];
        match tokio::io::AsyncReadExt::read(&mut self.inner, &mut buffer).await {
            Err(e) => Some(Err(e)),
            Ok(0) => None,
            Ok(n) => {
                buffer.resize(n, 0_u8);
                Some(Ok(bytes::Bytes::from_owner(buffer)))
            }
        }
    }

    async fn size_hint(&self) -> Result<SizeHint, Self::Error> {
        let m = self.inner.metadata().await?;
        Ok(SizeHint::with_exact(m.len()))
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn positional_reader(&self) -> Option<Arc<dyn PositionalRead>> {
        self.path
            .clone()
            .map(|path| Arc::new(FileRangeReader { path }) as Arc<dyn PositionalRead>)
    }
}

#[derive(Debug)]
struct FileRangeReader {
    path: PathBuf,
}

#[async_trait::async_trait]
impl PositionalRead for FileRangeReader {
    async fn read_at(&self, offset: u64, length: u64) -> std::io::Result<bytes::Bytes> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};
        let mut file = tokio::fs::File::open(&self.path).await?;
        let _ = file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buffer = Vec::with_capacity(length as usize);
        let _ = file.take(length).read_to_end(&mut buffer).await?;
        Ok(bytes::Bytes::from_owner(buffer))
    }
}

/// Implements [StreamingSource] for [bytes::Bytes].
///
/// Positional reads return slices of the original buffer, no data is copied.
///
/// # Example
/// ```
/// # use datalake_upload::client::Uploader;
/// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
/// let payload = bytes::Bytes::from_static(b"Hello World!");
/// let response = uploader
///     .upload_file("my-filesystem/my-file", payload)
///     .send()
///     .await?;
/// println!("response details={response:?}");
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct BytesSource {
    contents: bytes::Bytes,
    current: Option<bytes::Bytes>,
}

impl BytesSource {
    pub(crate) fn new(contents: bytes::Bytes) -> Self {
        let current = Some(contents.clone());
        Self { contents, current }
    }
}

impl StreamingSource for BytesSource {
    type Error = std::io::Error;

    async fn next(&mut self) -> Option<Result<bytes::Bytes, Self::Error>> {
        self.current.take().filter(|b| !b.is_empty()).map(Result::Ok)
    }

    async fn size_hint(&self) -> Result<SizeHint, Self::Error> {
        let s = self.contents.len() as u64;
        Ok(SizeHint::with_exact(s))
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn positional_reader(&self) -> Option<Arc<dyn PositionalRead>> {
        Some(Arc::new(BytesRangeReader {
            contents: self.contents.clone(),
        }))
    }
}

#[derive(Debug)]
struct BytesRangeReader {
    contents: bytes::Bytes,
}

#[async_trait::async_trait]
impl PositionalRead for BytesRangeReader {
    async fn read_at(&self, offset: u64, length: u64) -> std::io::Result<bytes::Bytes> {
        let len = self.contents.len();
        let start = std::cmp::min(offset, len as u64) as usize;
        let end = std::cmp::min(offset.saturating_add(length), len as u64) as usize;
        Ok(self.contents.slice(start..end))
    }
}

/// Implements [StreamingSource] for a sequence of [bytes::Bytes].
#[derive(Debug)]
pub struct IterSource {
    size: u64,
    current: VecDeque<bytes::Bytes>,
}

impl IterSource {
    pub(crate) fn new<I>(iterator: I) -> Self
    where
        I: IntoIterator<Item = bytes::Bytes>,
    {
        let current: VecDeque<bytes::Bytes> = iterator.into_iter().collect();
        let size = current.iter().fold(0_u64, |a, i| a + i.len() as u64);
        Self { size, current }
    }
}

impl StreamingSource for IterSource {
    type Error = std::io::Error;

    async fn next(&mut self) -> Option<std::result::Result<bytes::Bytes, Self::Error>> {
        self.current.pop_front().map(Ok)
    }

    async fn size_hint(&self) -> Result<SizeHint, Self::Error> {
        Ok(SizeHint::with_exact(self.size))
    }
}

/// Implements [StreamingSource] for any [tokio::io::AsyncRead].
///
/// The source is read sequentially, its length is unknown unless the
/// application provides it.
///
/// # Example
/// ```
/// # use datalake_upload::client::Uploader;
/// # use datalake_upload::upload_source::ReaderSource;
/// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
/// let reader = std::io::Cursor::new(vec![0_u8; 1024]);
/// let response = uploader
///     .upload_file("my-filesystem/my-file", ReaderSource::new(reader))
///     .send()
///     .await?;
/// println!("response details={response:?}");
/// # Ok(()) }
/// ```
pub struct ReaderSource<R> {
    inner: R,
}

impl<R> ReaderSource<R>
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R> StreamingSource for ReaderSource<R>
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    type Error = std::io::Error;

    async fn next(&mut self) -> Option<Result<bytes::Bytes, Self::Error>> {
        let mut buffer = vec![0_u8; READ_SIZE];
        match tokio::io::AsyncReadExt::read(&mut self.inner, &mut buffer).await {
            Err(e) => Some(Err(e)),
            Ok(0) => None,
            Ok(n) => {
                buffer.resize(n, 0_u8);
                Some(Ok(bytes::Bytes::from_owner(buffer)))
            }
        }
    }
}

/// Implements [StreamingSource] for any [Stream][futures::Stream] of buffers.
///
/// # Example
/// ```
/// # use datalake_upload::client::Uploader;
/// # use datalake_upload::upload_source::StreamSource;
/// # async fn sample<C: datalake_upload::stub::PathClient + 'static>(uploader: &Uploader<C>) -> anyhow::Result<()> {
/// let stream = futures::stream::iter(["hello ", "world"].map(|s| {
///     Ok::<_, std::io::Error>(bytes::Bytes::from_static(s.as_bytes()))
/// }));
/// let response = uploader
///     .upload_file("my-filesystem/my-file", StreamSource::new(stream))
///     .with_length(11_u64)
///     .send()
///     .await?;
/// println!("response details={response:?}");
/// # Ok(()) }
/// ```
pub struct StreamSource<S> {
    inner: S,
}

impl<S, E> StreamSource<S>
where
    S: futures::Stream<Item = Result<bytes::Bytes, E>> + Unpin + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, E> StreamingSource for StreamSource<S>
where
    S: futures::Stream<Item = Result<bytes::Bytes, E>> + Unpin + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    async fn next(&mut self) -> Option<Result<bytes::Bytes, Self::Error>> {
        futures::StreamExt::next(&mut self.inner).await
    }

    fn size_hint(&self) -> impl Future<Output = Result<SizeHint, Self::Error>> + Send {
        // The stream reports a number of buffers, not bytes. Only an empty
        // stream has a known size.
        let hint = match self.inner.size_hint() {
            (_, Some(0)) => SizeHint::with_exact(0),
            _ => SizeHint::new(),
        };
        std::future::ready(Ok(hint))
    }
}
