use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::CycleConfig;
use crate::cycle::{CycleState, RequestCycle};
use crate::message::parse::{ParseError, parse_line};
use crate::message::request::Request;
use crate::message::response::{Response, SharedResponse};
use crate::server::handler::{self, TimeoutFlag};
use crate::timer::{TimerKey, TimerQueue};
use crate::transport::{ExpireFn, Transport};

/// Transport for the demo container: non-blocking, with pipeline re-entry
/// delivered to the connection task over a channel and timeouts on a
/// per-connection timer queue.
struct ConnTransport {
    timers: TimerQueue,
    redispatch: mpsc::UnboundedSender<()>,
}

impl Transport for ConnTransport {
    fn is_blocking(&self) -> bool {
        false
    }

    fn schedule_dispatch(&self) {
        let _ = self.redispatch.send(());
    }

    fn schedule_timeout(&self, key: TimerKey, after: Duration, expire: ExpireFn) {
        self.timers.schedule(key, after, expire);
    }

    fn cancel_timeout(&self, key: TimerKey) {
        self.timers.cancel(key);
    }
}

pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    cycle: Arc<RequestCycle>,
    redispatch: mpsc::UnboundedReceiver<()>,
    shared: Arc<SharedResponse>,
    timed_out: Arc<TimeoutFlag>,
}

impl Connection {
    pub fn new(stream: TcpStream, config: CycleConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(ConnTransport {
            timers: TimerQueue::new(),
            redispatch: tx,
        });

        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            cycle: RequestCycle::new(transport, config),
            redispatch: rx,
            shared: Arc::new(SharedResponse::new()),
            timed_out: Arc::new(TimeoutFlag::new()),
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match self.read_request().await? {
                Some(request) => {
                    let response = self.drive(Arc::new(request)).await?;
                    self.write_response(&response).await?;
                }
                None => break,
            }
        }

        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<Option<Request>> {
        loop {
            // Try parsing whatever we already have
            match parse_line(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => {
                    return Err(anyhow::anyhow!("Command parse error: {:?}", e));
                }
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;

            if n == 0 {
                // Client closed connection
                return Ok(None);
            }
        }
    }

    /// One logical request: drives `handling()`/`unhandle()` around each
    /// handler pass, waits out suspensions, then completes and recycles.
    async fn drive(&mut self, request: Arc<Request>) -> anyhow::Result<Response> {
        self.timed_out.reset();
        // A task that lost a timeout race may have filled the slot after
        // the previous request completed; its output belongs to no one.
        self.shared.take();
        self.cycle.handling()?;

        'pipeline: loop {
            handler::handle(&self.cycle, &request, &self.shared, &self.timed_out).await?;

            if !self.cycle.unhandle()? {
                // A resume beat the suspension; run the pipeline again.
                continue 'pipeline;
            }

            loop {
                match self.cycle.state() {
                    CycleState::Suspended => {
                        if self.redispatch.recv().await.is_none() {
                            anyhow::bail!("Transport closed while suspended");
                        }
                    }
                    CycleState::Unsuspending => {
                        self.cycle.handling()?;
                        continue 'pipeline;
                    }
                    CycleState::Completing => {
                        self.cycle.unhandle()?;
                        break 'pipeline;
                    }
                    _ => break 'pipeline,
                }
            }
        }

        self.cycle.do_complete()?;

        let response = if self.timed_out.take() {
            Response::gateway_timeout()
        } else {
            self.shared.take().unwrap_or_else(Response::internal_error)
        };

        self.cycle.recycle()?;
        Ok(response)
    }

    async fn write_response(&mut self, response: &Response) -> anyhow::Result<()> {
        let line = format!("{} {}\n", response.status.as_u16(), response.body_text());
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
