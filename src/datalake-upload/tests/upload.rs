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

use bytes::Bytes;
use datalake_upload::Error;
use datalake_upload::access_conditions::{ANY_ETAG, AccessConditions};
use datalake_upload::client::{UploadConfig, Uploader};
use datalake_upload::error::Operation;
use datalake_upload::model::{AppendRequest, CreateRequest, FlushRequest, PathResponse};
use datalake_upload::stub::PathClient;
use datalake_upload::upload_source::{
    FileSource, PositionalRead, ReaderSource, SizeHint, StreamSource, StreamingSource,
};
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type Result = anyhow::Result<()>;

const KIB: usize = 1024;
const PATH: &str = "my-filesystem/dir/file";

/// Changes how the fake store handles append requests.
#[derive(Clone, Debug, Default)]
struct Behavior {
    append_delay: Duration,
    fail_append_at: Option<u64>,
    // Simulates a second writer replacing the file while chunks upload.
    replace_on_append: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum Call {
    Create(CreateRequest),
    Append(AppendRequest),
    Flush(FlushRequest),
}

#[derive(Debug, Default)]
struct File {
    etag: String,
    committed: Bytes,
    pending: BTreeMap<u64, Bytes>,
    properties: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<String, File>,
    calls: Vec<Call>,
    generation: u64,
}

impl State {
    fn new_etag(&mut self) -> String {
        self.generation += 1;
        format!("0x8DC{:012X}", self.generation)
    }
}

/// An in-memory implementation of the create, append, flush protocol.
#[derive(Clone, Debug, Default)]
struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    behavior: Behavior,
    state: Mutex<State>,
    inflight: AtomicUsize,
    max_inflight: AtomicUsize,
}

impl Store {
    fn new() -> Self {
        Self::default()
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                behavior,
                ..Default::default()
            }),
        }
    }

    /// Adds a committed file, returns its etag.
    fn seed(&self, path: &str, contents: &'static [u8]) -> String {
        let mut state = self.inner.state.lock().unwrap();
        let etag = state.new_etag();
        let file = File {
            etag: etag.clone(),
            committed: Bytes::from_static(contents),
            ..Default::default()
        };
        state.files.insert(path.to_string(), file);
        etag
    }

    fn calls(&self) -> Vec<Call> {
        self.inner.state.lock().unwrap().calls.clone()
    }

    fn appends(&self) -> Vec<(u64, u64)> {
        let mut appends = self
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Append(r) => Some((r.offset, r.length())),
                _ => None,
            })
            .collect::<Vec<_>>();
        appends.sort();
        appends
    }

    fn flushes(&self) -> Vec<FlushRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Flush(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn creates(&self) -> Vec<CreateRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn committed(&self, path: &str) -> Option<Bytes> {
        let state = self.inner.state.lock().unwrap();
        state.files.get(path).map(|f| f.committed.clone())
    }

    fn properties(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let state = self.inner.state.lock().unwrap();
        state.files.get(path).map(|f| f.properties.clone())
    }

    fn max_inflight(&self) -> usize {
        self.inner.max_inflight.load(Ordering::SeqCst)
    }

    async fn append(&self, req: AppendRequest) -> datalake_upload::Result<()> {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.calls.push(Call::Append(req.clone()));
            let etag = state.new_etag();
            let file = state
                .files
                .get_mut(&req.path)
                .ok_or_else(|| http_error(404, "PathNotFound"))?;
            if self.inner.behavior.replace_on_append {
                file.etag = etag;
            }
        }
        if self.inner.behavior.fail_append_at == Some(req.offset) {
            return Err(http_error(503, "ServerBusy"));
        }
        if let Some(hash) = &req.content_md5 {
            if hash[..] != md5::compute(&req.data).0[..] {
                return Err(http_error(400, "Md5Mismatch"));
            }
        }
        if !self.inner.behavior.append_delay.is_zero() {
            tokio::time::sleep(self.inner.behavior.append_delay).await;
        }
        let mut state = self.inner.state.lock().unwrap();
        let file = state
            .files
            .get_mut(&req.path)
            .ok_or_else(|| http_error(404, "PathNotFound"))?;
        file.pending.insert(req.offset, req.data);
        Ok(())
    }
}

fn http_error(code: u16, message: &'static str) -> Error {
    Error::http(code, http::HeaderMap::new(), Bytes::from_static(message.as_bytes()))
}

fn check_conditions(
    file: Option<&File>,
    conditions: &AccessConditions,
) -> datalake_upload::Result<()> {
    if conditions.if_none_match.as_deref() == Some(ANY_ETAG) && file.is_some() {
        return Err(http_error(412, "PathAlreadyExists"));
    }
    if let Some(want) = &conditions.if_match {
        match file {
            Some(f) if f.etag == *want => {}
            _ => return Err(http_error(412, "ConditionNotMet")),
        }
    }
    Ok(())
}

impl PathClient for Store {
    async fn create(&self, req: CreateRequest) -> datalake_upload::Result<PathResponse> {
        let mut state = self.inner.state.lock().unwrap();
        state.calls.push(Call::Create(req.clone()));
        check_conditions(state.files.get(&req.path), &req.conditions)?;
        let etag = state.new_etag();
        let file = File {
            etag: etag.clone(),
            properties: req.properties,
            ..Default::default()
        };
        state.files.insert(req.path, file);
        Ok(PathResponse::new()
            .set_etag(etag)
            .set_request_id("create-request"))
    }

    async fn append_data(&self, req: AppendRequest) -> datalake_upload::Result<()> {
        let n = self.inner.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_inflight.fetch_max(n, Ordering::SeqCst);
        let result = self.append(req).await;
        self.inner.inflight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn flush_data(&self, req: FlushRequest) -> datalake_upload::Result<PathResponse> {
        let mut state = self.inner.state.lock().unwrap();
        state.calls.push(Call::Flush(req.clone()));
        let etag = state.new_etag();
        let file = state.files.get_mut(&req.path);
        check_conditions(file.as_deref(), &req.conditions)?;
        let file = file.ok_or_else(|| http_error(404, "PathNotFound"))?;
        let mut data = bytes::BytesMut::new();
        for (offset, chunk) in file.pending.iter() {
            if *offset != data.len() as u64 {
                return Err(http_error(400, "InvalidFlushPosition"));
            }
            data.extend_from_slice(chunk);
        }
        if (data.len() as u64) < req.position {
            return Err(http_error(400, "InvalidFlushPosition"));
        }
        data.truncate(req.position as usize);
        file.committed = data.freeze();
        file.pending.clear();
        file.etag = etag.clone();
        Ok(PathResponse::new()
            .set_etag(etag)
            .set_content_length(req.position)
            .set_request_id("flush-request")
            .set_client_request_id(req.client_request_id)
            .set_request_server_encrypted(true))
    }
}

fn contents(n: usize) -> Bytes {
    (0..n).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

/// A seekable source that only supports positional reads.
#[derive(Debug)]
struct PositionalOnly {
    data: Bytes,
    reads: Arc<Mutex<Vec<(u64, u64)>>>,
}

#[derive(Debug)]
struct RecordingReader {
    data: Bytes,
    reads: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl StreamingSource for PositionalOnly {
    type Error = std::io::Error;

    async fn next(&mut self) -> Option<std::result::Result<Bytes, Self::Error>> {
        Some(Err(std::io::Error::other("sequential reads are not expected")))
    }

    async fn size_hint(&self) -> std::result::Result<SizeHint, Self::Error> {
        Ok(SizeHint::with_exact(self.data.len() as u64))
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn positional_reader(&self) -> Option<Arc<dyn PositionalRead>> {
        Some(Arc::new(RecordingReader {
            data: self.data.clone(),
            reads: self.reads.clone(),
        }))
    }
}

#[async_trait::async_trait]
impl PositionalRead for RecordingReader {
    async fn read_at(&self, offset: u64, length: u64) -> std::io::Result<Bytes> {
        self.reads.lock().unwrap().push((offset, length));
        let start = offset as usize;
        let end = (offset + length) as usize;
        Ok(self.data.slice(start..end.min(self.data.len())))
    }
}

type BufferStream = futures::stream::Iter<std::vec::IntoIter<std::io::Result<Bytes>>>;

/// A sequential source of unknown length.
fn stream_of(data: &Bytes, size: usize) -> StreamSource<BufferStream> {
    let buffers = data
        .chunks(size)
        .map(|b| Ok(Bytes::copy_from_slice(b)))
        .collect::<Vec<std::io::Result<Bytes>>>();
    StreamSource::new(futures::stream::iter(buffers))
}

fn large_chunks(chunk_size: usize, max_concurrency: usize) -> UploadConfig {
    UploadConfig::new()
        .with_chunk_size(chunk_size as u64)
        .with_min_large_chunk_upload_threshold(chunk_size as u64)
        .with_max_concurrency(max_concurrency)
}

#[tokio::test]
async fn scenario_a_seekable_uses_substreams() -> Result {
    let store = Store::new();
    let uploader = Uploader::with_config(store.clone(), large_chunks(100 * KIB, 3));
    let data = contents(250 * KIB);
    let reads = Arc::new(Mutex::new(Vec::new()));
    let source = PositionalOnly {
        data: data.clone(),
        reads: reads.clone(),
    };
    let response = uploader.upload_file(PATH, source).send().await?;
    assert_eq!(response.content_length, Some(250 * KIB as u64));
    assert_eq!(response.request_server_encrypted, Some(true));

    let want = vec![
        (0, 100 * KIB as u64),
        (100 * KIB as u64, 100 * KIB as u64),
        (200 * KIB as u64, 50 * KIB as u64),
    ];
    assert_eq!(store.appends(), want);
    let mut got_reads = reads.lock().unwrap().clone();
    got_reads.sort();
    assert_eq!(got_reads, want);

    let flushes = store.flushes();
    assert_eq!(flushes.len(), 1, "{flushes:?}");
    assert_eq!(flushes[0].position, 250 * KIB as u64);
    assert!(flushes[0].close);
    assert_eq!(store.committed(PATH), Some(data));
    Ok(())
}

#[tokio::test]
async fn scenario_b_non_seekable_uses_buffers() -> Result {
    let store = Store::new();
    let uploader = Uploader::with_config(store.clone(), large_chunks(100 * KIB, 3));
    let data = contents(250 * KIB);
    let response = uploader
        .upload_file(PATH, stream_of(&data, 7 * KIB))
        .with_length(250 * KIB as u64)
        .send()
        .await?;
    assert_eq!(response.content_length, Some(250 * KIB as u64));

    let want = vec![
        (0, 100 * KIB as u64),
        (100 * KIB as u64, 100 * KIB as u64),
        (200 * KIB as u64, 50 * KIB as u64),
    ];
    assert_eq!(store.appends(), want);
    // Each chunk carries the data read at its offset.
    assert_eq!(store.committed(PATH), Some(data));
    Ok(())
}

#[tokio::test]
async fn scenario_b_single_worker_preserves_read_order() -> Result {
    let store = Store::new();
    let uploader = Uploader::with_config(store.clone(), large_chunks(100 * KIB, 1));
    let data = contents(250 * KIB);
    uploader
        .upload_file(PATH, stream_of(&data, 7 * KIB))
        .with_length(250 * KIB as u64)
        .send()
        .await?;
    let order = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Append(r) => Some(r.offset),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(order, vec![0, 100 * KIB as u64, 200 * KIB as u64]);
    Ok(())
}

#[tokio::test]
async fn scenario_c_existing_file() -> Result {
    let store = Store::new();
    store.seed(PATH, b"previous contents");
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 2));
    let err = uploader
        .upload_file(PATH, contents(10 * KIB))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed(), "{err:?}");
    assert_eq!(err.http_status_code(), Some(412));
    assert_eq!(err.operation(), Some(Operation::Create));

    let calls = store.calls();
    assert_eq!(calls.len(), 1, "{calls:?}");
    let creates = store.creates();
    assert_eq!(creates[0].conditions, AccessConditions::create_only());
    assert_eq!(
        store.committed(PATH),
        Some(Bytes::from_static(b"previous contents"))
    );
    Ok(())
}

#[tokio::test]
async fn scenario_d_chunk_failure() -> Result {
    let chunk = 4 * KIB as u64;
    let store = Store::with_behavior(Behavior {
        fail_append_at: Some(chunk),
        ..Default::default()
    });
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 4));
    let err = uploader
        .upload_file(PATH, contents(16 * KIB))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_transport(), "{err:?}");
    assert_eq!(err.http_status_code(), Some(503));
    assert_eq!(
        err.operation(),
        Some(Operation::Append {
            offset: chunk,
            length: chunk
        })
    );
    assert!(store.flushes().is_empty(), "{:?}", store.calls());
    assert_eq!(store.committed(PATH), Some(Bytes::new()));
    Ok(())
}

#[tokio::test]
async fn empty_source() -> Result {
    let store = Store::new();
    let uploader = Uploader::new(store.clone());
    let response = uploader.upload_file(PATH, "").send().await?;
    assert_eq!(response, PathResponse::default());
    assert!(store.calls().is_empty(), "{:?}", store.calls());

    let response = uploader
        .upload_file(PATH, "ignored")
        .with_length(0_u64)
        .send()
        .await?;
    assert_eq!(response, PathResponse::default());
    assert!(store.calls().is_empty(), "{:?}", store.calls());
    Ok(())
}

#[tokio::test]
async fn overwrite_pins_flush_to_created_etag() -> Result {
    let store = Store::new();
    let previous = store.seed(PATH, b"previous contents");
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 2));
    let data = contents(10 * KIB);
    let response = uploader
        .upload_file(PATH, data.clone())
        .with_overwrite(true)
        .with_properties([("owner", "data-team")])
        .with_permissions("rwxr-x---")
        .send()
        .await?;

    let creates = store.creates();
    assert_eq!(creates.len(), 1, "{creates:?}");
    assert!(!creates[0].conditions.any(), "{creates:?}");
    assert_eq!(creates[0].permissions.as_deref(), Some("rwxr-x---"));

    let flushes = store.flushes();
    assert_eq!(flushes.len(), 1, "{flushes:?}");
    let pinned = flushes[0]
        .conditions
        .if_match
        .clone()
        .ok_or_else(|| anyhow::anyhow!("missing if-match in {flushes:?}"))?;
    assert_ne!(pinned, previous);
    assert_eq!(
        flushes[0].conditions,
        AccessConditions::new().set_if_match(pinned)
    );
    assert_eq!(store.committed(PATH), Some(data));
    assert_eq!(
        store.properties(PATH),
        Some(BTreeMap::from([("owner".to_string(), "data-team".to_string())]))
    );
    assert!(response.etag.is_some(), "{response:?}");
    Ok(())
}

#[tokio::test]
async fn concurrent_writer_fails_flush() -> Result {
    let store = Store::with_behavior(Behavior {
        replace_on_append: true,
        ..Default::default()
    });
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 2));
    let err = uploader
        .upload_file(PATH, contents(10 * KIB))
        .with_overwrite(true)
        .send()
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed(), "{err:?}");
    assert_eq!(err.operation(), Some(Operation::Flush));
    assert_eq!(store.committed(PATH), Some(Bytes::new()));
    Ok(())
}

#[tokio::test]
async fn create_only_injected() -> Result {
    let store = Store::new();
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 2));
    uploader.upload_file(PATH, contents(10 * KIB)).send().await?;
    let creates = store.creates();
    assert_eq!(creates.len(), 1, "{creates:?}");
    assert_eq!(creates[0].conditions, AccessConditions::create_only());
    Ok(())
}

#[tokio::test]
async fn caller_preconditions_replace_injected() -> Result {
    let store = Store::new();
    let etag = store.seed(PATH, b"previous contents");
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 2));
    let data = contents(10 * KIB);
    uploader
        .upload_file(PATH, data.clone())
        .with_conditions(AccessConditions::new().set_if_match(etag.clone()))
        .send()
        .await?;
    let creates = store.creates();
    assert_eq!(
        creates[0].conditions,
        AccessConditions::new().set_if_match(etag)
    );
    assert_eq!(store.committed(PATH), Some(data));
    Ok(())
}

#[tokio::test]
async fn create_options_require_overwrite() -> Result {
    let store = Store::new();
    let uploader = Uploader::new(store.clone());
    let err = uploader
        .upload_file(PATH, "hello world")
        .with_umask("0027")
        .send()
        .await
        .unwrap_err();
    assert!(err.is_invalid_configuration(), "{err:?}");
    assert!(store.calls().is_empty(), "{:?}", store.calls());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn concurrency_is_bounded() -> Result {
    let store = Store::with_behavior(Behavior {
        append_delay: Duration::from_millis(10),
        ..Default::default()
    });
    let uploader = Uploader::with_config(store.clone(), large_chunks(KIB, 4));
    let data = contents(20 * KIB);
    uploader.upload_file(PATH, data.clone()).send().await?;
    assert_eq!(store.max_inflight(), 4);
    assert_eq!(store.appends().len(), 20);
    assert_eq!(store.committed(PATH), Some(data));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn sequential_concurrency_is_bounded() -> Result {
    let store = Store::with_behavior(Behavior {
        append_delay: Duration::from_millis(10),
        ..Default::default()
    });
    let uploader = Uploader::with_config(store.clone(), large_chunks(KIB, 3));
    let data = contents(20 * KIB);
    uploader
        .upload_file(PATH, data.clone())
        .with_use_byte_buffer(true)
        .send()
        .await?;
    assert_eq!(store.max_inflight(), 3);
    assert_eq!(store.committed(PATH), Some(data));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn progress_is_monotonic() -> Result {
    let store = Store::with_behavior(Behavior {
        append_delay: Duration::from_millis(10),
        ..Default::default()
    });
    let uploader = Uploader::with_config(store.clone(), large_chunks(KIB, 3));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let captured = calls.clone();
    uploader
        .upload_file(PATH, contents(10 * KIB + 17))
        .with_progress_hook(move |current: u64, total: Option<u64>| {
            captured.lock().unwrap().push((current, total));
        })
        .send()
        .await?;

    let calls = calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 11, "{calls:?}");
    assert!(
        calls.windows(2).all(|w| w[0].0 <= w[1].0),
        "{calls:?}"
    );
    assert!(
        calls.iter().all(|(_, total)| *total == Some(10 * KIB as u64 + 17)),
        "{calls:?}"
    );
    assert_eq!(calls.last().map(|c| c.0), Some(10 * KIB as u64 + 17));
    Ok(())
}

#[tokio::test]
async fn validate_content_sends_md5() -> Result {
    let store = Store::new();
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 2));
    let data = contents(10 * KIB);
    uploader
        .upload_file(PATH, data.clone())
        .with_validate_content(true)
        .send()
        .await?;
    let hashes = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Append(r) => Some(r.content_md5.is_some()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(hashes, vec![true; 3]);
    assert_eq!(store.committed(PATH), Some(data));
    Ok(())
}

#[tokio::test]
async fn unknown_length_flushes_bytes_read() -> Result {
    let store = Store::new();
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 2));
    let data = contents(10 * KIB + 3);
    let response = uploader
        .upload_file(PATH, stream_of(&data, KIB))
        .send()
        .await?;
    assert_eq!(response.content_length, Some(10 * KIB as u64 + 3));
    assert_eq!(store.flushes()[0].position, 10 * KIB as u64 + 3);
    assert_eq!(store.committed(PATH), Some(data));
    Ok(())
}

#[tokio::test]
async fn empty_reader_creates_empty_file() -> Result {
    let store = Store::new();
    let uploader = Uploader::new(store.clone());
    let response = uploader
        .upload_file(PATH, ReaderSource::new(&b""[..]))
        .send()
        .await?;
    assert_eq!(response.content_length, Some(0));
    let calls = store.calls();
    assert!(
        matches!(calls.as_slice(), [Call::Create(_), Call::Flush(f)] if f.position == 0 && f.close),
        "{calls:?}"
    );
    assert_eq!(store.committed(PATH), Some(Bytes::new()));
    Ok(())
}

#[tokio::test]
async fn short_source() -> Result {
    let store = Store::new();
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 2));
    let err = uploader
        .upload_file(PATH, stream_of(&contents(10 * KIB), KIB))
        .with_length(16 * KIB as u64)
        .send()
        .await
        .unwrap_err();
    assert!(err.is_short_read(), "{err:?}");
    assert!(store.flushes().is_empty(), "{:?}", store.calls());
    Ok(())
}

#[tokio::test]
async fn file_source() -> Result {
    let data = contents(10 * KIB + 5);
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&data)?;
    file.flush()?;

    let store = Store::new();
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 3));
    let source = FileSource::open(file.path()).await?;
    let response = uploader.upload_file(PATH, source).send().await?;
    assert_eq!(response.content_length, Some(10 * KIB as u64 + 5));
    assert_eq!(store.appends().len(), 3);
    assert_eq!(store.committed(PATH), Some(data));
    Ok(())
}

#[tokio::test]
async fn same_client_request_id() -> Result {
    let store = Store::new();
    let uploader = Uploader::with_config(store.clone(), large_chunks(4 * KIB, 2));
    let response = uploader
        .upload_file(PATH, contents(10 * KIB))
        .with_lease_id("lease-1")
        .send()
        .await?;
    let ids = store
        .calls()
        .into_iter()
        .map(|c| match c {
            Call::Create(r) => (r.client_request_id, r.lease_id),
            Call::Append(r) => (r.client_request_id, r.lease_id),
            Call::Flush(r) => (r.client_request_id, r.lease_id),
        })
        .collect::<Vec<_>>();
    assert_eq!(ids.len(), 5, "{ids:?}");
    let want = (
        response.client_request_id.clone().unwrap_or_default(),
        Some("lease-1".to_string()),
    );
    assert!(ids.iter().all(|id| *id == want), "{ids:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation() -> Result {
    let store = Store::with_behavior(Behavior {
        append_delay: Duration::from_millis(10),
        ..Default::default()
    });
    let uploader = Uploader::with_config(store.clone(), large_chunks(KIB, 2));
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(25)).await;
            token.cancel();
        })
    };
    let err = uploader
        .upload_file(PATH, contents(20 * KIB))
        .with_cancellation_token(token)
        .send()
        .await
        .unwrap_err();
    canceller.await?;
    assert!(err.is_cancelled(), "{err:?}");
    assert!(store.flushes().is_empty(), "{:?}", store.calls());
    assert!(store.appends().len() < 20, "{:?}", store.appends());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn deadline() -> Result {
    let store = Store::with_behavior(Behavior {
        append_delay: Duration::from_millis(10),
        ..Default::default()
    });
    let uploader = Uploader::with_config(store.clone(), large_chunks(KIB, 2));
    let err = uploader
        .upload_file(PATH, contents(20 * KIB))
        .with_timeout(Duration::from_millis(25))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_cancelled(), "{err:?}");
    assert!(store.flushes().is_empty(), "{:?}", store.calls());
    Ok(())
}
