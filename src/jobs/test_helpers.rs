//! Scripted media fetcher shared by the job tests.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use crate::media::{MediaFetchError, MediaFetcher, MediaInfo, MediaStream};

#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Deliver the chunks and finish cleanly.
    Body(Vec<&'static str>),
    /// Deliver the chunks, then fail with a broken connection.
    BrokenAfter(Vec<&'static str>),
    /// Fail before any bytes are delivered.
    Unavailable,
}

/// Returns a scripted stream per video id and records every fetch.
#[derive(Debug)]
pub(crate) struct FakeFetcher {
    default: Script,
    videos: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub(crate) fn new(default: Script) -> Self {
        Self {
            default,
            videos: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_video(mut self, video_id: &str, script: Script) -> Self {
        self.videos.insert(video_id.to_string(), script);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn chunks(body: Vec<&'static str>) -> impl futures::Stream<Item = Result<Bytes, MediaFetchError>> {
    stream::iter(body.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))))
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, video_id: &str) -> Result<MediaStream, MediaFetchError> {
        self.calls.lock().unwrap().push(video_id.to_string());
        let script = self
            .videos
            .get(video_id)
            .unwrap_or(&self.default)
            .clone();
        let info = Some(MediaInfo {
            size: Some(3_000_000),
        });
        match script {
            Script::Body(body) => Ok(MediaStream {
                info,
                body: chunks(body).boxed(),
            }),
            Script::BrokenAfter(body) => Ok(MediaStream {
                info,
                body: chunks(body)
                    .chain(stream::once(async {
                        Err(MediaFetchError::Io(io::Error::new(
                            io::ErrorKind::ConnectionReset,
                            "connection reset",
                        )))
                    }))
                    .boxed(),
            }),
            Script::Unavailable => Err(MediaFetchError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "video unavailable",
            ))),
        }
    }
}
