use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::error::TransportError;
use crate::session::SessionId;

macro_rules! debug_eprintln {
    ($($arg:tt)*) => {
        if std::env::var("RAGDESK_DEBUG").is_ok() {
            eprintln!($($arg)*);
        }
    };
}

pub const SESSION_HEADER: &str = "X-Session-ID";

/// Decoded text fragments of one streamed answer, in arrival order.
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens the streamed answer for a query.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn ask(&self, query: &str) -> Result<FragmentStream, TransportError>;
}

/// Incremental UTF-8 decoding across arbitrary chunk boundaries.
///
/// Incomplete trailing sequences are held until the next chunk; invalid
/// bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let data = std::mem::take(&mut self.pending);
        let mut out = String::new();
        let mut rest = &data[..];

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + bad..];
                        }
                        None => {
                            rest = &rest[valid..];
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Flushes whatever is left once the stream has ended.
    pub fn finish(&mut self) -> String {
        let tail = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&tail).into_owned()
    }
}

struct DecodeState<S> {
    inner: Pin<Box<S>>,
    utf8: Utf8Decoder,
    finished: bool,
}

/// Turns a raw byte stream into text fragments. Empty fragments are skipped
/// and the stream stops after the first error.
pub fn decode_fragments<S, B, E>(inner: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TransportError> + Send + 'static,
{
    let state = DecodeState {
        inner: Box::pin(inner),
        utf8: Utf8Decoder::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    let text = st.utf8.push(chunk.as_ref());
                    if !text.is_empty() {
                        return Some((Ok(text), st));
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.finished = true;
                    let tail = st.utf8.finish();
                    if !tail.is_empty() {
                        return Some((Ok(tail), st));
                    }
                }
            }
        }
    })
    .boxed()
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: Option<String>,
}

/// Builds the error for a non-2xx response, preferring the JSON `detail` field.
async fn status_error(response: Response) -> TransportError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .map(|d| d.as_str().map(str::to_string).unwrap_or_else(|| d.to_string()))
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() || trimmed.starts_with('{') {
                status.canonical_reason().unwrap_or("API Error").to_string()
            } else {
                trimmed.to_string()
            }
        });
    TransportError::Status { status, detail }
}

/// HTTP client for the RAG server. Every request carries the session header.
#[derive(Clone)]
pub struct RagClient {
    base_url: String,
    session: SessionId,
    client: reqwest::Client,
}

impl RagClient {
    pub fn new(base_url: impl Into<String>, session: SessionId) -> Self {
        RagClient {
            base_url: base_url.into(),
            session,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TransportError::Rejected(format!("invalid server url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::Rejected(format!("server url {} cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Uploads a local file as multipart field `file`; returns its filename.
    pub async fn upload(&self, path: &Path) -> Result<String, TransportError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let data = tokio::fs::read(path).await.map_err(|source| TransportError::File {
            path: path.display().to_string(),
            source,
        })?;

        let form = Form::new().part("file", Part::bytes(data).file_name(filename.clone()));
        let url = self.endpoint(&["ingest", ""])?;
        debug_eprintln!("[upload] POST {} ({})", url, filename);

        let response = self
            .client
            .post(url)
            .header(SESSION_HEADER, self.session.as_str())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(filename)
    }

    pub async fn delete_document(&self, filename: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&["documents", filename])?;
        debug_eprintln!("[documents] DELETE {}", url);

        let response = self
            .client
            .delete(url)
            .header(SESSION_HEADER, self.session.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    /// Clears every document; succeeds only on 2xx with `"status": "success"`.
    pub async fn clear_documents(&self) -> Result<(), TransportError> {
        let url = self.endpoint(&["documents", "clear"])?;
        debug_eprintln!("[documents] POST {}", url);

        let response = self
            .client
            .post(url)
            .header(SESSION_HEADER, self.session.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: StatusBody = response.json().await?;
        match body.status.as_deref() {
            Some("success") => Ok(()),
            other => Err(TransportError::Rejected(format!(
                "clear returned status {:?}",
                other.unwrap_or("none")
            ))),
        }
    }

    pub async fn set_model(&self, model: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&["set_model", ""])?;
        debug_eprintln!("[model] POST {} model={}", url, model);

        let response = self
            .client
            .post(url)
            .query(&[("model", model)])
            .header(SESSION_HEADER, self.session.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl QueryTransport for RagClient {
    async fn ask(&self, query: &str) -> Result<FragmentStream, TransportError> {
        let url = self.endpoint(&["ask", ""])?;
        debug_eprintln!("[ask] GET {} query={:?}", url, query);

        let response = self
            .client
            .get(url)
            .query(&[("query", query)])
            .header(SESSION_HEADER, self.session.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        Ok(decode_fragments(response.bytes_stream()))
    }
}
