use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query, as sent on the request line.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[allow(dead_code)]
impl RecordedRequest {
    pub fn path(&self) -> String {
        self.parsed_url().path().to_owned()
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.parsed_url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn parsed_url(&self) -> url::Url {
        url::Url::parse(&format!("http://stub{}", self.url)).expect("parse recorded url")
    }
}

/// A tiny_http server on an ephemeral port that answers every request with
/// whatever `handler` returns and keeps a log of what it received.
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StubServer {
    pub fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let recorded = RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.as_str().to_string(), h.value.as_str().to_string()))
                        .collect(),
                    body,
                };
                let (status, response_body) = handler(&recorded);
                log.lock().expect("lock request log").push(recorded);

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(response_body)
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock request log").clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[allow(dead_code)]
pub fn feed_body(events: &[(&str, &str, Option<&str>, String)]) -> String {
    let data = events
        .iter()
        .map(|(id, chapter, title, created_at)| {
            serde_json::json!({
                "id": id,
                "type": "chapter",
                "attributes": {
                    "volume": null,
                    "chapter": chapter,
                    "title": title,
                    "translatedLanguage": "en",
                    "externalUrl": null,
                    "publishAt": created_at,
                    "readableAt": created_at,
                    "createdAt": created_at,
                    "updatedAt": created_at,
                    "pages": 18,
                    "version": 1
                },
                "relationships": [{"id": "g-1", "type": "scanlation_group"}]
            })
        })
        .collect::<Vec<_>>();

    serde_json::json!({
        "result": "ok",
        "response": "collection",
        "data": data,
        "limit": 10,
        "offset": 0,
        "total": events.len(),
    })
    .to_string()
}

#[allow(dead_code)]
pub fn manga_body(id: &str, en_title: &str) -> String {
    serde_json::json!({
        "result": "ok",
        "response": "entity",
        "data": {
            "id": id,
            "type": "manga",
            "attributes": {
                "title": {"en": en_title},
                "altTitles": [],
                "description": {"en": "A story."},
                "isLocked": false,
                "originalLanguage": "ja",
                "lastVolume": "",
                "lastChapter": "",
                "publicationDemographic": "shounen",
                "status": "ongoing",
                "year": 2020,
                "contentRating": "safe",
                "state": "published",
                "chapterNumbersResetOnNewVolume": false,
                "createdAt": "2020-01-01T00:00:00+00:00",
                "updatedAt": "2026-01-01T00:00:00+00:00",
                "version": 3,
                "availableTranslatedLanguages": ["en"],
                "latestUploadedChapter": "c-latest"
            },
            "relationships": []
        }
    })
    .to_string()
}
