use crate::prelude::*;
use crate::samil::decoder::FrameDecoder;

use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Decoder;

const WRITE_TIMEOUT_SECS: u64 = 5;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const MAX_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("line timeout")]
    Timeout,

    #[error("line closed by peer")]
    Closed,

    #[error("line offline")]
    Offline,

    #[error("line i/o error: {0}")]
    Io(String),
}

/// A half-duplex serial link: one request frame out, at most one response
/// frame back, never reentrant. Timeouts are handled here; callers only see
/// the error result.
#[async_trait]
pub trait HalfDuplexLine: Send {
    /// Send one request frame and wait for the peer's response frame.
    async fn send_receive(&mut self, request: &[u8], op: &str) -> Result<Vec<u8>, LineError>;

    /// Send a frame for which no response is expected.
    async fn send(&mut self, request: &[u8], op: &str) -> Result<(), LineError>;
}

/// Half-duplex line over a serial-to-TCP bridge. The connection is kept open
/// across exchanges; after a hard error the next call reconnects.
pub struct TcpLine {
    host: String,
    port: u16,
    read_timeout: Duration,
    stream: Option<TcpStream>,
    buf: BytesMut,
    decoder: FrameDecoder,
}

impl TcpLine {
    pub fn new(host: String, port: u16, read_timeout: Duration) -> Self {
        Self {
            host,
            port,
            read_timeout,
            stream: None,
            buf: BytesMut::with_capacity(MAX_BUFFER_SIZE),
            decoder: FrameDecoder::new(),
        }
    }

    async fn ensure_connected(&mut self) -> Result<(), LineError> {
        if self.stream.is_some() {
            return Ok(());
        }

        info!("connecting to {}:{}", self.host, self.port);
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = match tokio::time::timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), connect)
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(LineError::Io(err.to_string())),
            Err(_) => return Err(LineError::Timeout),
        };
        if let Err(err) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {}", err);
        }
        info!("connected to {}:{}", self.host, self.port);
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            info!("line to {}:{} dropped", self.host, self.port);
        }
    }

    async fn write_frame(&mut self, request: &[u8], op: &str) -> Result<(), LineError> {
        self.ensure_connected().await?;
        debug!("{}: tx {}", op, Utils::hex_string(request));

        let stream = self.stream.as_mut().ok_or(LineError::Offline)?;
        let write = async {
            stream.write_all(request).await?;
            stream.flush().await
        };
        match tokio::time::timeout(Duration::from_secs(WRITE_TIMEOUT_SECS), write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(LineError::Io(err.to_string())),
            Err(_) => Err(LineError::Timeout),
        }
    }

    async fn read_frame(&mut self, op: &str) -> Result<Vec<u8>, LineError> {
        let deadline = tokio::time::Instant::now() + self.read_timeout;
        loop {
            if let Some(frame) = self
                .decoder
                .decode(&mut self.buf)
                .map_err(|err| LineError::Io(err.to_string()))?
            {
                debug!("{}: rx {}", op, Utils::hex_string(&frame));
                return Ok(frame.to_vec());
            }
            if self.buf.len() >= MAX_BUFFER_SIZE {
                return Err(LineError::Io("receive buffer overflow".to_string()));
            }

            let stream = self.stream.as_mut().ok_or(LineError::Offline)?;
            match tokio::time::timeout_at(deadline, stream.read_buf(&mut self.buf)).await {
                Ok(Ok(0)) => return Err(LineError::Closed),
                Ok(Ok(_)) => {}
                Ok(Err(err)) => return Err(LineError::Io(err.to_string())),
                Err(_) => return Err(LineError::Timeout),
            }
        }
    }
}

#[async_trait]
impl HalfDuplexLine for TcpLine {
    async fn send_receive(&mut self, request: &[u8], op: &str) -> Result<Vec<u8>, LineError> {
        // Half-duplex: anything still buffered belongs to a dead exchange.
        self.buf.clear();

        if let Err(err) = self.write_frame(request, op).await {
            self.disconnect();
            return Err(err);
        }
        match self.read_frame(op).await {
            Ok(frame) => Ok(frame),
            Err(LineError::Timeout) => Err(LineError::Timeout),
            Err(err) => {
                self.disconnect();
                Err(err)
            }
        }
    }

    async fn send(&mut self, request: &[u8], op: &str) -> Result<(), LineError> {
        self.buf.clear();
        if let Err(err) = self.write_frame(request, op).await {
            self.disconnect();
            return Err(err);
        }
        Ok(())
    }
}
