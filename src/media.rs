use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum MediaFetchError {
    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("media fetch exited with {status}: {stderr}")]
    Exit { status: ExitStatus, stderr: String },
    #[error("failed to parse media info: {0}")]
    Info(#[from] serde_json::Error),
    #[error("download was cancelled")]
    Cancelled,
}

/// Metadata reported before the bytes start flowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaInfo {
    pub size: Option<u64>,
}

pub type ByteStream = BoxStream<'static, Result<Bytes, MediaFetchError>>;

/// The media bytes of a single video, ending either with `None` (success) or an error.
pub struct MediaStream {
    pub info: Option<MediaInfo>,
    pub body: ByteStream,
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<MediaStream, MediaFetchError>;
}

#[must_use]
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Fetches media by running the `yt-dlp` binary and reading the video from its stdout.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    format: String,
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["--no-warnings", "--format", &self.format])
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    fn spawn_error(&self, source: io::Error) -> MediaFetchError {
        MediaFetchError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    async fn info(&self, url: &str) -> Result<MediaInfo, MediaFetchError> {
        let output = self
            .command()
            .arg("--dump-json")
            .arg(url)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(MediaFetchError::Exit {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let info: YtDlpInfo = serde_json::from_slice(&output.stdout)?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let size = info
            .filesize
            .or(info.filesize_approx)
            .map(|s| s.max(0.0) as u64);
        Ok(MediaInfo { size })
    }
}

#[async_trait]
impl MediaFetcher for YtDlp {
    async fn fetch(&self, video_id: &str) -> Result<MediaStream, MediaFetchError> {
        let url = watch_url(video_id);
        let info = match self.info(&url).await {
            Ok(info) => Some(info),
            Err(err) => {
                warn!(video_id, "failed to read media info: {err}");
                None
            }
        };

        let mut child = self
            .command()
            .args(["--quiet", "--output", "-"])
            .arg(&url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        debug!(video_id, pid = child.id(), "started media fetch");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout of the media fetch was not captured"))?;
        let stderr = child.stderr.take();
        let stderr = tokio::spawn(async move {
            let mut buffer = Vec::new();
            if let Some(mut stderr) = stderr {
                if let Err(err) = stderr.read_to_end(&mut buffer).await {
                    debug!("failed to read media fetch stderr: {err}");
                }
            }
            String::from_utf8_lossy(&buffer).into_owned()
        });

        Ok(MediaStream {
            info,
            body: child_output(child, stdout, stderr).boxed(),
        })
    }
}

/// Stream the child's stdout, then fail if the process did not exit cleanly.
fn child_output(
    mut child: Child,
    stdout: ChildStdout,
    stderr: JoinHandle<String>,
) -> impl Stream<Item = Result<Bytes, MediaFetchError>> + Send + 'static {
    try_stream! {
        let mut chunks = ReaderStream::new(stdout);
        while let Some(chunk) = chunks.next().await {
            yield chunk?;
        }
        let status = child.wait().await?;
        if !status.success() {
            let stderr = stderr.await.unwrap_or_default().trim().to_string();
            Err::<(), _>(MediaFetchError::Exit { status, stderr })?;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use futures::TryStreamExt;

    use super::*;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_fetch_streams_stdout_and_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            r#"case "$*" in
  *--dump-json*) echo '{"filesize": 2500000}' ;;
  *) printf 'hello world' ;;
esac"#,
        );

        let fetcher = YtDlp::new(script, "18");
        let stream = fetcher.fetch("abc").await.unwrap();
        assert_eq!(
            stream.info,
            Some(MediaInfo {
                size: Some(2_500_000)
            })
        );
        let chunks: Vec<Bytes> = stream.body.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"hello world");
    }

    #[tokio::test]
    async fn test_fetch_fails_on_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo 'video unavailable' >&2\nexit 3");

        let fetcher = YtDlp::new(script, "18");
        let stream = fetcher.fetch("abc").await.unwrap();
        assert_eq!(stream.info, None);
        let result: Result<Vec<Bytes>, _> = stream.body.try_collect().await;
        match result {
            Err(MediaFetchError::Exit { status, stderr }) => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "video unavailable");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exit_message_survives_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "printf 'bad \\377 byte' >&2\nexit 1");

        let fetcher = YtDlp::new(script, "18");
        let stream = fetcher.fetch("abc").await.unwrap();
        let result: Result<Vec<Bytes>, _> = stream.body.try_collect().await;
        match result {
            Err(MediaFetchError::Exit { stderr, .. }) => {
                assert!(stderr.starts_with("bad "));
                assert!(stderr.ends_with(" byte"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let fetcher = YtDlp::new("/nonexistent/yt-dlp", "18");
        let result = fetcher.fetch("abc").await;
        assert!(matches!(result, Err(MediaFetchError::Spawn { .. })));
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(watch_url("v1"), "https://www.youtube.com/watch?v=v1");
    }
}
