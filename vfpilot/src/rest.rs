//! # Inspection endpoint
//!
//! Serves a read-only HTTP/1 API over a unix socket:
//!
//! - `GET /vm/inspect`: the runtime view of the virtual machine document
//! - `GET /vm/state`: `{"state": "Running"}`
//!
//! ```ignore
//! let view = machine.inspect_view()?;
//! let server = vfpilot::rest::serve(Path::new("/run/vfpilot.sock"), view, async {
//!     tokio::signal::ctrl_c().await.ok();
//! })?;
//! server.await?;
//! ```
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use hyperlocal::UnixServerExt;
use serde::Serialize;
use tracing::{debug, error, info, instrument};
use vfpilot_models::models::VirtualMachine;

use crate::backend::{StateMonitor, VmState};

#[derive(thiserror::Error, Debug)]
pub enum RestError {
    #[error("Could not bind inspection socket {path:?}, reason: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("inspection server failed: {0}")]
    Server(#[from] hyper::Error),
}

/// What the endpoint exposes: a snapshot of the runtime document and the
/// machine state, read from `state` on every request
#[derive(Clone)]
pub struct InspectView {
    runtime: Arc<VirtualMachine>,
    state: Arc<dyn StateMonitor>,
}

impl InspectView {
    pub fn new<M: StateMonitor>(runtime: VirtualMachine, state: M) -> Self {
        InspectView {
            runtime: Arc::new(runtime),
            state: Arc::new(state),
        }
    }
}

impl fmt::Debug for InspectView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InspectView")
            .field("runtime", &self.runtime)
            .field("state", &self.state.state())
            .finish()
    }
}

#[derive(Serialize)]
struct StateReply {
    state: VmState,
}

fn empty(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn json<T: Serialize>(value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Body::from(body));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("Could not encode response: {}", e);
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn handle(view: InspectView, request: Request<Body>) -> Result<Response<Body>, Infallible> {
    debug!("{} {}", request.method(), request.uri().path());
    let response = match (request.method(), request.uri().path()) {
        (&Method::GET, "/vm/inspect") => json(view.runtime.as_ref()),
        (&Method::GET, "/vm/state") => json(&StateReply {
            state: view.state.state(),
        }),
        (_, "/vm/inspect") | (_, "/vm/state") => empty(StatusCode::METHOD_NOT_ALLOWED),
        _ => empty(StatusCode::NOT_FOUND),
    };
    Ok(response)
}

/// Binds `path` right away and returns the server future. The server stops
/// accepting connections once `shutdown` resolves.
#[instrument(skip(path, view, shutdown), fields(path = %path.display()))]
pub fn serve<F>(
    path: &Path,
    view: InspectView,
    shutdown: F,
) -> Result<impl Future<Output = Result<(), RestError>> + Send, RestError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let path = path.to_path_buf();
    let builder = Server::bind_unix(&path).map_err(|source| RestError::Bind {
        path: path.clone(),
        source,
    })?;
    info!("Serving inspection API on {}", path.display());

    let make_service = make_service_fn(move |_| {
        let view = view.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |request| handle(view.clone(), request)))
        }
    });
    let server = builder
        .serve(make_service)
        .with_graceful_shutdown(shutdown);
    Ok(async move {
        server.await?;
        debug!("Inspection API stopped");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Client;
    use hyperlocal::{UnixClientExt, Uri};
    use pretty_assertions::assert_eq;
    use tokio::sync::{oneshot, watch};
    use vfpilot_models::models::{Bootloader, LinuxBootloader, VirtioSerial};

    fn runtime() -> VirtualMachine {
        let mut serial = VirtioSerial::pty();
        serial.pty_name = Some("/dev/ttys003".into());
        VirtualMachine::new(
            2,
            1 << 30,
            Bootloader::from(LinuxBootloader::new(
                "/vm/vmlinuz".into(),
                "console=hvc0".to_string(),
            )),
        )
        .with_device(serial)
    }

    async fn request(path: &Path, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let client = Client::unix();
        let request = Request::builder()
            .method(method)
            .uri(hyper::Uri::from(Uri::new(path, uri)))
            .body(Body::empty())
            .unwrap();
        let response = client.request(request).await.unwrap();
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn inspection_routes() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("inspect.sock");
        let (state_tx, state_rx) = watch::channel(VmState::Running);
        let (stop, shutdown) = oneshot::channel::<()>();

        let server = serve(&socket, InspectView::new(runtime(), state_rx), async {
            shutdown.await.ok();
        })
        .unwrap();
        let server = tokio::spawn(server);

        let (status, body) = request(&socket, Method::GET, "/vm/state").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, br#"{"state":"Running"}"#.to_vec());

        state_tx.send_replace(VmState::Stopped);
        let (_, body) = request(&socket, Method::GET, "/vm/state").await;
        assert_eq!(body, br#"{"state":"Stopped"}"#.to_vec());

        let (status, body) = request(&socket, Method::GET, "/vm/inspect").await;
        assert_eq!(status, StatusCode::OK);
        let view: VirtualMachine = serde_json::from_slice(&body).unwrap();
        assert_eq!(view, runtime());

        let (status, _) = request(&socket, Method::POST, "/vm/state").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = request(&socket, Method::GET, "/vm/pause").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_names_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("missing").join("inspect.sock");
        let (_tx, rx) = watch::channel(VmState::Stopped);
        let err = serve(&socket, InspectView::new(runtime(), rx), async {})
            .err()
            .unwrap();
        assert!(matches!(err, RestError::Bind { ref path, .. } if *path == socket));
    }
}
