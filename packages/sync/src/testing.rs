//! In-memory [`ObjectStore`] for unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::StorageError;
use crate::progress::ProgressCallback;
use crate::store::{ListPage, ListRequest, ListedObject, ObjectStore};

/// A backend request, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List {
        prefix: Option<String>,
        delimiter: Option<String>,
        continuation_token: Option<String>,
    },
    Put { key: String, content_type: String },
    Delete { keys: Vec<String> },
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Option<String>>,
    calls: Vec<Call>,
    list_calls: usize,
    fail_list_on_call: Option<usize>,
    fail_put_key: Option<String>,
    fail_delete: bool,
}

/// Bucket held in a `BTreeMap`, paginated by index.
///
/// Uploaded objects get a quoted lowercase MD5 `ETag`, like S3.
pub struct MemoryStore {
    page_size: usize,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            state: Mutex::new(State::default()),
        }
    }

    pub fn put_remote(&self, key: &str, etag: &str) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), Some(etag.to_string()));
    }

    pub fn put_remote_content(&self, key: &str, content: &[u8]) {
        self.put_remote(key, &quoted_md5(content));
    }

    pub fn put_remote_without_etag(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), None);
    }

    /// Fails the `n`th list request (1-based).
    pub fn fail_list_on_call(&self, n: usize) {
        self.state.lock().unwrap().fail_list_on_call = Some(n);
    }

    pub fn fail_put_for(&self, key: &str) {
        self.state.lock().unwrap().fail_put_key = Some(key.to_string());
    }

    pub fn fail_delete(&self) {
        self.state.lock().unwrap().fail_delete = true;
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn list_requests(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::List { .. }))
            .collect()
    }

    pub fn put_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Put { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn delete_batches(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete { keys } => Some(keys),
                _ => None,
            })
            .collect()
    }

    pub fn remote_keys(&self) -> Vec<String> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ListPage, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        state.calls.push(Call::List {
            prefix: request.prefix.map(str::to_string),
            delimiter: request.delimiter.map(str::to_string),
            continuation_token: request.continuation_token.map(str::to_string),
        });

        if state.fail_list_on_call == Some(state.list_calls) {
            return Err(StorageError::List {
                bucket: request.bucket.to_string(),
                prefix: request.prefix.unwrap_or_default().to_string(),
                source: "list failed".into(),
            });
        }

        let start = request
            .continuation_token
            .map_or(0, |token| token.parse::<usize>().unwrap());
        let matching: Vec<_> = state
            .objects
            .iter()
            .filter(|(key, _)| request.prefix.is_none_or(|p| key.starts_with(p)))
            .collect();
        let end = (start + self.page_size).min(matching.len());

        let objects = matching[start..end]
            .iter()
            .map(|(key, etag)| ListedObject {
                key: (*key).clone(),
                etag: (*etag).clone(),
            })
            .collect();

        Ok(ListPage {
            objects,
            next_continuation_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Put {
            key: key.to_string(),
            content_type: content_type.to_string(),
        });

        if state.fail_put_key.as_deref() == Some(key) {
            return Err(StorageError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: "put failed".into(),
            });
        }

        state
            .objects
            .insert(key.to_string(), Some(quoted_md5(&body)));
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            keys: keys.to_vec(),
        });

        if state.fail_delete {
            return Err(StorageError::Delete {
                bucket: bucket.to_string(),
                count: keys.len(),
                source: "delete failed".into(),
            });
        }

        for key in keys {
            state.objects.remove(key);
        }
        Ok(())
    }
}

fn quoted_md5(content: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(content))
}

/// Progress sink that remembers every `finish` message.
#[derive(Default)]
pub struct RecordingProgress {
    finished: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

impl ProgressCallback for RecordingProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, msg: String) {
        self.finished.lock().unwrap().push(msg);
    }
    fn finish_and_clear(&self) {}
}
