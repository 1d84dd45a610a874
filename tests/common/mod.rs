//! Test origin serving a small, predictable set of resources.
//!
//! - `/A.html`: never changes, has `Last-Modified`.
//! - `/B.html`: changes on [`Origin::update_b`], each version with a new `Last-Modified`.
//! - `/C`: live content; sends `Last-Modified` but never answers 304.
//! - `/D.html`: no `Last-Modified`.
//! - `/E.jpg`: binary body with `Last-Modified`.
//! - `/F`: always 500 (with `Last-Modified`, so only the status keeps it out of the cache).
//! - `/T.txt`: chunked body followed by a trailer.
//! - anything else: 404.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use revalidate::http::{Request, Response, StatusCode};
use revalidate::server::Server;

pub const EARLIER: &str = "Fri, 22 May 2015 16:00:00 GMT";
pub const BASELINE: &str = "Fri, 22 May 2015 17:00:00 GMT";
pub const LATER: &str = "Fri, 22 May 2015 18:00:00 GMT";

pub const A_HTML: &str =
    "<html><head><title>File A.html</title><body>This is A.html. It never changes.</body></html>";

/// What the origin saw for one request.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub if_modified_since: Option<String>,
}

#[derive(Debug)]
struct BState {
    version: u32,
    modified: &'static str,
}

#[derive(Debug)]
pub struct Origin {
    pub addr: SocketAddr,
    b: Mutex<BState>,
    seen: Mutex<Vec<Seen>>,
}

impl Origin {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Publishes a new version of `/B.html` with a later `Last-Modified`.
    pub fn update_b(&self) {
        let mut b = self.b.lock().unwrap();
        b.version += 1;
        b.modified = LATER;
    }

    pub fn b_html(&self) -> String {
        b_content(self.b.lock().unwrap().version)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last_seen(&self) -> Seen {
        self.seen().pop().expect("origin saw no request")
    }

    fn respond(&self, req: &Request) -> Response {
        let ims = req.if_modified_since().map(str::to_owned);
        self.seen.lock().unwrap().push(Seen {
            method: req.method().to_string(),
            path: req.path().to_owned(),
            if_modified_since: ims.clone(),
        });

        let (modified, content_type, body, live): (Option<String>, &str, Vec<u8>, bool) =
            match req.path() {
                "/A.html" => (Some(BASELINE.into()), "text/html", A_HTML.into(), false),
                "/B.html" => {
                    let b = self.b.lock().unwrap();
                    (
                        Some(b.modified.into()),
                        "text/html",
                        b_content(b.version).into_bytes(),
                        false,
                    )
                }
                "/C" => (
                    Some(BASELINE.into()),
                    "text/html",
                    b"<html><body>This is C. It is live.</body></html>".to_vec(),
                    true,
                ),
                "/D.html" => (
                    None,
                    "text/html",
                    b"<html><body>This is D.html.</body></html>".to_vec(),
                    false,
                ),
                "/E.jpg" => (Some(BASELINE.into()), "image/jpeg", jpeg_bytes(), false),
                "/F" => {
                    return Response::new(StatusCode::InternalServerError)
                        .header("Last-Modified", BASELINE)
                        .body("boom");
                }
                "/T.txt" => {
                    if ims.as_deref() == Some(BASELINE) {
                        return Response::new(StatusCode::NotModified)
                            .header("Last-Modified", BASELINE)
                            .trailer("X-Checksum", "abc123");
                    }
                    return Response::new(StatusCode::Ok)
                        .header("Last-Modified", BASELINE)
                        .header("Content-Type", "text/plain")
                        .body("chunked text")
                        .trailer("X-Checksum", "abc123");
                }
                _ => return Response::new(StatusCode::NotFound).body("Not Found"),
            };

        if let Some(modified) = &modified {
            if !live && ims.as_deref() == Some(modified.as_str()) {
                return Response::new(StatusCode::NotModified).header("Last-Modified", modified);
            }
        }

        let mut response = Response::new(StatusCode::Ok)
            .header("Content-Type", content_type)
            .body_bytes(body);
        if let Some(modified) = modified {
            response = response.header("Last-Modified", modified);
        }
        response
    }
}

fn b_content(version: u32) -> String {
    format!("<html><head><title>File B.html ver.{version}</title><body>This is B.html version {version}.</body></html>")
}

/// A JPEG-looking body that is not valid UTF-8 and contains every byte value.
pub fn jpeg_bytes() -> Vec<u8> {
    let mut data = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
    data.extend((0..=255u8).cycle().take(8 * 1024));
    data.extend([0xff, 0xd9]);
    data
}

/// Spawns an origin on a free local port.
pub async fn spawn_origin() -> Arc<Origin> {
    init_tracing();

    let server = Server::bind("127.0.0.1:0").await.expect("bind origin");
    let origin = Arc::new(Origin {
        addr: server.local_addr(),
        b: Mutex::new(BState {
            version: 0,
            modified: EARLIER,
        }),
        seen: Mutex::new(Vec::new()),
    });

    let state = Arc::clone(&origin);
    tokio::spawn(server.run(move |req: Request| {
        let response = state.respond(&req);
        async move { response }
    }));

    origin
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
