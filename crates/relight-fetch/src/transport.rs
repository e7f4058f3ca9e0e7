//! Blocking byte transports used by fetch workers.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FetchError;

/// Fetches the bytes behind a URL into a caller-provided buffer.
///
/// Implementations block; they run on fetch worker threads.
pub trait Transport: Send + Sync {
    /// Replace the contents of `buffer` with the resource at `url`.
    fn fetch(&self, url: &str, buffer: &mut Vec<u8>) -> Result<(), FetchError>;
}

/// HTTP(S) transport backed by a shared `ureq` agent.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Transport with a per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str, buffer: &mut Vec<u8>) -> Result<(), FetchError> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => FetchError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(t) => FetchError::Transport {
                url: url.to_string(),
                reason: t.to_string(),
            },
        })?;
        buffer.clear();
        response
            .into_reader()
            .read_to_end(buffer)
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Local filesystem transport. Accepts plain paths and `file://` URLs.
#[derive(Debug, Clone, Default)]
pub struct FileTransport {
    root: Option<PathBuf>,
}

impl FileTransport {
    /// Resolve relative paths against `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Transport for FileTransport {
    fn fetch(&self, url: &str, buffer: &mut Vec<u8>) -> Result<(), FetchError> {
        let path = self.resolve(url);
        let io_error = |source| FetchError::Io {
            path: path.display().to_string(),
            source,
        };
        let mut file = std::fs::File::open(&path).map_err(io_error)?;
        buffer.clear();
        file.read_to_end(buffer).map_err(io_error)?;
        Ok(())
    }
}

/// Picks HTTP for `http://` and `https://` URLs and the filesystem otherwise.
#[derive(Clone, Default)]
pub struct AutoTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl AutoTransport {
    /// Auto transport with the given HTTP timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: HttpTransport::new(timeout),
            file: FileTransport::default(),
        }
    }
}

impl Transport for AutoTransport {
    fn fetch(&self, url: &str, buffer: &mut Vec<u8>) -> Result<(), FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.http.fetch(url, buffer)
        } else {
            self.file.fetch(url, buffer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tiny_http::{Response, Server};

    /// Serve `routes` on an ephemeral port from a detached thread.
    fn serve(routes: Vec<(&'static str, &'static [u8])>) -> u16 {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        thread::spawn(move || {
            for request in server.incoming_requests() {
                let body = routes
                    .iter()
                    .find(|(path, _)| *path == request.url())
                    .map(|(_, body)| *body);
                let _ = match body {
                    Some(body) => request.respond(Response::from_data(body)),
                    None => request.respond(Response::from_string("missing").with_status_code(404)),
                };
            }
        });
        port
    }

    #[test]
    fn test_http_fetch_body() {
        let port = serve(vec![("/rti/info.json", b"{\"type\":\"img\"}")]);
        let transport = HttpTransport::new(Duration::from_secs(5));
        let mut buffer = vec![1, 2, 3];
        transport
            .fetch(&format!("http://127.0.0.1:{port}/rti/info.json"), &mut buffer)
            .unwrap();
        assert_eq!(buffer, b"{\"type\":\"img\"}");
    }

    #[test]
    fn test_http_status_error() {
        let port = serve(vec![]);
        let transport = HttpTransport::new(Duration::from_secs(5));
        let mut buffer = Vec::new();
        let err = transport
            .fetch(&format!("http://127.0.0.1:{port}/nope"), &mut buffer)
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[test]
    fn test_file_fetch_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plane_0.jpg"), [0xFF, 0xD8]).unwrap();

        let transport = FileTransport::with_root(dir.path());
        let mut buffer = Vec::new();
        transport.fetch("plane_0.jpg", &mut buffer).unwrap();
        assert_eq!(buffer, [0xFF, 0xD8]);

        let err = transport.fetch("plane_9.jpg", &mut buffer).unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[test]
    fn test_file_url_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.json");
        std::fs::write(&path, "{}").unwrap();
        let mut buffer = Vec::new();
        AutoTransport::default()
            .fetch(&format!("file://{}", path.display()), &mut buffer)
            .unwrap();
        assert_eq!(buffer, b"{}");
    }
}
