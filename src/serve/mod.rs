//! Live preview server.
//!
//! Serves a folder over HTTP on `localhost`, compiling markdown on every
//! request so the browser always shows the current source:
//!
//! | Request                       | Response                                      |
//! |-------------------------------|-----------------------------------------------|
//! | `/favicon.ico`, `/live.js`    | embedded assets, cached for a day             |
//! | `x.html` with `x.md` present  | `x.md` compiled, not cached                   |
//! | `x.md`                        | compiled, not cached                          |
//! | `HEAD` on either of the above | `Last-Modified` of the source, no compilation |
//! | folder                        | its `index.html`, else a listing              |
//! | anything else                 | the file as-is, not cached                    |
//! | methods other than GET/HEAD   | `405 Method Not Allowed`                      |
//!
//! A page that fails to compile is logged and the requested path is served
//! as a plain file instead; one bad document never stops the server.
//!
//! Each request runs on its own thread. With live updates on, pages load
//! `/live.js`, which polls the page with `HEAD` requests and reloads when
//! the source changes. Once every poller is gone the idle timer (see
//! [`idle`]) stops the server.

pub mod idle;
pub mod response;
pub mod route;

use crate::compile::Compiler;
use idle::{Activity, ServerState};
use route::Route;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Method, Request, Server};

static LIVE_JS: &[u8] = include_bytes!("../../static/live.js");
static FAVICON: &[u8] = include_bytes!("../../static/favicon.svg");

/// Ports tried after the first one before giving up.
pub const PORT_SPAN: u16 = 100;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("nothing to serve at {}", .0.display())]
    Target(PathBuf),
    #[error("no free port in {first}..={last}: {reason}")]
    Bind { first: u16, last: u16, reason: String },
}

#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Folder mapped onto `/`.
    pub root: PathBuf,
    /// First port to try.
    pub port: u16,
    /// Idle timer interval; `None` keeps the server running until interrupted.
    pub idle_interval: Option<Duration>,
    /// Embed the reload client in compiled pages.
    pub live_update: bool,
}

/// How a request was answered, for the request log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    Page,
    Head,
    Asset,
    File,
    Listing,
    Redirect,
    NotFound,
    MethodNotAllowed,
}

impl Served {
    /// Live content keeps the idle timer armed: compiled pages, the reload
    /// client's polls and the embedded assets those pages load.
    pub fn is_live(self) -> bool {
        matches!(self, Served::Page | Served::Head | Served::Asset)
    }
}

#[derive(Debug)]
pub enum ServeEvent {
    Listening { url: String, root: PathBuf },
    /// The requested port was busy and another one was taken.
    PortChanged { requested: u16, used: u16 },
    Request {
        method: String,
        path: String,
        served: Served,
    },
    CompileFailed { source: PathBuf, error: String },
    ResponseFailed { path: String, error: String },
    IdleShutdown { interval: Duration },
}

impl ServeEvent {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ServeEvent::CompileFailed { .. } | ServeEvent::ResponseFailed { .. }
        )
    }
}

/// Split a serve target into the folder to serve and the page to open.
///
/// A folder is served as-is and opened at `/`. A file is opened inside its
/// parent folder.
pub fn serve_target(target: &Path) -> Result<(PathBuf, String), ServeError> {
    if target.is_dir() {
        return Ok((target.to_path_buf(), String::new()));
    }
    if target.is_file() {
        let root = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let page = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok((root, page));
    }
    Err(ServeError::Target(target.to_path_buf()))
}

/// Bound listener, ready to run.
pub struct PreviewServer {
    server: Arc<Server>,
    port: u16,
    options: ServeOptions,
}

/// Stops a running [`PreviewServer`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<Server>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.unblock();
    }
}

impl PreviewServer {
    /// Bind the first free port from `options.port` upward.
    pub fn bind(options: ServeOptions) -> Result<Self, ServeError> {
        let first = options.port;
        let last = first.saturating_add(PORT_SPAN);
        let mut reason = String::new();

        for port in first..=last {
            match Server::http(("127.0.0.1", port)) {
                Ok(server) => {
                    let port = server
                        .server_addr()
                        .to_ip()
                        .map_or(port, |addr| addr.port());
                    return Ok(Self {
                        server: Arc::new(server),
                        port,
                        options,
                    });
                }
                Err(e) => reason = e.to_string(),
            }
        }
        Err(ServeError::Bind {
            first,
            last,
            reason,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Browser URL for `page` (relative to the served folder).
    pub fn url(&self, page: &str) -> String {
        format!("http://localhost:{}/{}", self.port, page)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.server))
    }

    /// Serve until the idle timer fires or [`ShutdownHandle::shutdown`] is called.
    pub fn run(self, compiler: Arc<Compiler>, events: Option<Sender<ServeEvent>>) {
        let emit = |event| {
            if let Some(tx) = &events {
                tx.send(event).ok();
            }
        };
        if self.port != self.options.port && self.options.port != 0 {
            emit(ServeEvent::PortChanged {
                requested: self.options.port,
                used: self.port,
            });
        }
        emit(ServeEvent::Listening {
            url: self.url(""),
            root: self.options.root.clone(),
        });

        let activity = Arc::new(Activity::new());
        if let Some(interval) = self.options.idle_interval {
            spawn_idle_timer(
                interval,
                Arc::clone(&activity),
                self.shutdown_handle(),
                events.clone(),
            );
        }

        let handler = Arc::new(Handler {
            root: self.options.root.clone(),
            live_update: self.options.live_update,
            compiler,
            activity,
            events,
        });

        for request in self.server.incoming_requests() {
            let handler = Arc::clone(&handler);
            thread::spawn(move || handler.handle(request));
        }
    }
}

fn spawn_idle_timer(
    interval: Duration,
    activity: Arc<Activity>,
    shutdown: ShutdownHandle,
    events: Option<Sender<ServeEvent>>,
) {
    thread::spawn(move || {
        loop {
            thread::sleep(interval);
            if activity.tick() == ServerState::ShuttingDown {
                if let Some(tx) = &events {
                    tx.send(ServeEvent::IdleShutdown { interval }).ok();
                }
                shutdown.shutdown();
                return;
            }
        }
    });
}

struct Handler {
    root: PathBuf,
    live_update: bool,
    compiler: Arc<Compiler>,
    activity: Arc<Activity>,
    events: Option<Sender<ServeEvent>>,
}

impl Handler {
    fn emit(&self, event: ServeEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    fn handle(&self, request: Request) {
        let method = request.method().clone();
        let path = request.url().to_string();

        let (served, result) = match method {
            Method::Get => self.respond(request, &path, false),
            Method::Head => self.respond(request, &path, true),
            _ => (
                Served::MethodNotAllowed,
                response::send_method_not_allowed(request),
            ),
        };
        self.activity.record_request(served.is_live());

        self.emit(ServeEvent::Request {
            method: method.to_string(),
            path: path.clone(),
            served,
        });
        if let Err(e) = result {
            self.emit(ServeEvent::ResponseFailed {
                path,
                error: e.to_string(),
            });
        }
    }

    fn respond(&self, request: Request, path: &str, head: bool) -> (Served, io::Result<()>) {
        match route::route(path, &self.root) {
            Route::Favicon => (
                Served::Asset,
                response::send_asset(request, response::SVG, FAVICON),
            ),
            Route::LiveScript => (
                Served::Asset,
                response::send_asset(request, response::JAVASCRIPT, LIVE_JS),
            ),
            Route::Document { source, .. } if head => (
                Served::Head,
                response::send_document_head(request, &source),
            ),
            Route::Document { source, requested } => match self.compile(&source) {
                Some(page) => (Served::Page, response::send_page(request, page)),
                None if requested.is_file() => {
                    (Served::File, response::send_file(request, &requested))
                }
                None => (Served::File, response::send_file(request, &source)),
            },
            Route::File(file) => (Served::File, response::send_file(request, &file)),
            Route::Listing(dir) => (
                Served::Listing,
                response::send_listing(request, &dir, path),
            ),
            Route::Redirect(location) => (
                Served::Redirect,
                response::send_redirect(request, &location),
            ),
            Route::NotFound => (
                Served::NotFound,
                response::send_status(request, 404, "404 Not Found"),
            ),
        }
    }

    /// Compile a document, logging failures.
    fn compile(&self, source: &Path) -> Option<Vec<u8>> {
        let result = std::fs::read(source)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                let dir = source.parent().unwrap_or(&self.root);
                self.compiler
                    .compile(&bytes, dir, self.live_update)
                    .map_err(|e| e.to_string())
            });
        match result {
            Ok(page) => Some(page),
            Err(error) => {
                self.emit(ServeEvent::CompileFailed {
                    source: source.to_path_buf(),
                    error,
                });
                None
            }
        }
    }
}
