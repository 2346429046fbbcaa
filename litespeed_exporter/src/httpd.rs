//! HTTP endpoint serving the landing page and the exposition text.

use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode, header};
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::{Request, Response, body::Incoming, service::service_fn};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use litespeed_signal::Watcher;
use tokio::{net::TcpListener, pin, task::JoinSet};
use tracing::{debug, error, info};

use crate::exporter::Exporter;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`run`]
pub enum Error {
    /// Wrapper for [`std::io::Error`].
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn landing_page(telemetry_path: &str) -> Bytes {
    Bytes::from(format!(
        "<html>
<head><title>LiteSpeed exporter</title></head>
<body>
<h1>LiteSpeed exporter</h1>
<p><a href='{telemetry_path}'>Metrics</a></p>
</body>
</html>
"
    ))
}

fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

fn build_response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

struct Routes {
    exporter: Arc<Exporter>,
    telemetry_path: String,
    landing_page: Bytes,
}

async fn srv(
    req: Request<Incoming>,
    routes: Arc<Routes>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Ok(build_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain",
            "Method not allowed\n",
        ));
    }

    let path = req.uri().path();
    if path == routes.telemetry_path {
        let text = routes.exporter.scrape().await;
        Ok(build_response(StatusCode::OK, EXPOSITION_CONTENT_TYPE, text))
    } else if path == "/" {
        Ok(build_response(
            StatusCode::OK,
            "text/html",
            routes.landing_page.clone(),
        ))
    } else {
        debug!("No route for {path}");
        Ok(build_response(StatusCode::NOT_FOUND, "text/plain", "Not found\n"))
    }
}

/// Bind `addr` and serve until `shutdown` is signalled.
///
/// # Errors
///
/// Returns an error if `addr` cannot be bound.
pub async fn run(
    addr: SocketAddr,
    telemetry_path: &str,
    exporter: Arc<Exporter>,
    shutdown: Watcher,
) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {addr}");
    serve(listener, telemetry_path.to_string(), exporter, shutdown).await;
    Ok(())
}

/// Accept connections on `listener` until `shutdown` is signalled.
///
/// `GET <telemetry_path>` scrapes, `GET /` returns a landing page linking the
/// telemetry path and every other path is not found.
pub async fn serve(
    listener: TcpListener,
    telemetry_path: String,
    exporter: Arc<Exporter>,
    shutdown: Watcher,
) {
    let routes = Arc::new(Routes {
        exporter,
        landing_page: landing_page(&telemetry_path),
        telemetry_path,
    });
    let mut join_set = JoinSet::new();

    let shutdown_fut = shutdown.recv();
    pin!(shutdown_fut);
    loop {
        tokio::select! {
            () = &mut shutdown_fut => {
                info!("Shutdown signal received, stopping accept loop.");
                break;
            }

            incoming = listener.accept() => {
                let (stream, addr) = match incoming {
                    Ok(sa) => sa,
                    Err(e) => {
                        error!("Error accepting connection: {e}");
                        continue;
                    }
                };
                debug!("Accepted connection from {addr}");

                let routes = Arc::clone(&routes);
                join_set.spawn(async move {
                    let service = service_fn(move |req| srv(req, Arc::clone(&routes)));
                    let builder = auto::Builder::new(TokioExecutor::new());
                    if let Err(e) = builder
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        error!("Error serving {addr}: {e}");
                    }
                });
            }

            Some(_) = join_set.join_next(), if !join_set.is_empty() => {}
        }
    }

    drop(listener);
    // Idle keep-alive connections would hold shutdown open indefinitely.
    join_set.shutdown().await;
}
