//! Upstream HTTP clients.
//!
//! Every backend owns one pooled client. TCP backends use the stock
//! [`HttpConnector`]; Unix socket backends use [`UnixConnector`], which
//! ignores the request URI and always dials the configured socket path.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, Uri};
use hyper::body::Incoming;
use hyper::rt::{Read as _, Write as _};
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::client::legacy::{Client, Error as ClientError};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::UnixStream;

use crate::load_balancer::backend::Transport;

/// Connector dialing a fixed Unix domain socket.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: Arc<PathBuf>,
}

impl UnixConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }
}

impl tower::Service<Uri> for UnixConnector {
    type Response = UnixConnection;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        let path = Arc::clone(&self.path);
        Box::pin(async move {
            let stream = UnixStream::connect(path.as_path()).await?;
            Ok(UnixConnection {
                io: TokioIo::new(stream),
            })
        })
    }
}

/// An established Unix socket connection usable by the pooled client.
#[derive(Debug)]
pub struct UnixConnection {
    io: TokioIo<UnixStream>,
}

impl Connection for UnixConnection {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl hyper::rt::Read for UnixConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl hyper::rt::Write for UnixConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.io.is_write_vectored()
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write_vectored(cx, bufs)
    }
}

/// Pooled client bound to one backend's transport.
#[derive(Debug, Clone)]
pub enum UpstreamClient {
    Http(Client<HttpConnector, Body>),
    Unix(Client<UnixConnector, Body>),
}

impl UpstreamClient {
    pub fn for_transport(transport: &Transport) -> Self {
        match transport {
            Transport::Http(_) => {
                UpstreamClient::Http(Client::builder(TokioExecutor::new()).build(HttpConnector::new()))
            }
            Transport::UnixSocket(path) => UpstreamClient::Unix(
                Client::builder(TokioExecutor::new()).build(UnixConnector::new(path.clone())),
            ),
        }
    }

    /// Send a fully rewritten request.
    pub async fn request(&self, request: Request<Body>) -> Result<Response<Incoming>, ClientError> {
        match self {
            UpstreamClient::Http(client) => client.request(request).await,
            UpstreamClient::Unix(client) => client.request(request).await,
        }
    }
}
