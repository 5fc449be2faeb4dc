use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::{LogAccessor, LogLines, LogRequest};
use crate::error::StreamError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogOutcome {
    Completed,
    Cancelled,
    TimedOut,
    ReceiverGone,
}

#[derive(Clone)]
pub struct LogStreamer {
    accessor: Arc<dyn LogAccessor>,
}

impl LogStreamer {
    pub fn new(accessor: Arc<dyn LogAccessor>) -> Self {
        Self { accessor }
    }

    pub fn logs(&self, sink: mpsc::Sender<String>, request: LogRequest) -> LogHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(run(
            self.accessor.clone(),
            sink,
            request,
            token.child_token(),
        ));

        LogHandle { token, task }
    }
}

#[derive(Debug, Clone)]
pub struct LogCanceller(CancellationToken);

impl LogCanceller {
    pub fn cancel(&self) {
        self.0.cancel();
    }
}

#[derive(Debug)]
pub struct LogHandle {
    token: CancellationToken,
    task: JoinHandle<Result<LogOutcome, StreamError>>,
}

impl LogHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn canceller(&self) -> LogCanceller {
        LogCanceller(self.token.clone())
    }

    pub async fn wait(self) -> Result<LogOutcome, StreamError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(error) => Err(StreamError::Aborted(error.to_string())),
        }
    }
}

async fn run(
    accessor: Arc<dyn LogAccessor>,
    sink: mpsc::Sender<String>,
    request: LogRequest,
    token: CancellationToken,
) -> Result<LogOutcome, StreamError> {
    let target = request.target();

    let lines = tokio::select! {
        biased;
        () = token.cancelled() => {
            debug!(stream = %target, "log stream cancelled before open");
            return Ok(LogOutcome::Cancelled);
        }
        opened = accessor.open_log_stream(&request) => opened.map_err(|error| {
            warn!(stream = %target, error = %error, "failed to open log stream");
            StreamError::Open(error)
        })?,
        () = tokio::time::sleep(request.open_timeout) => {
            warn!(
                stream = %target,
                timeout = ?request.open_timeout,
                "log stream did not open in time"
            );
            return Ok(LogOutcome::TimedOut);
        }
    };
    info!(stream = %target, "log stream opened");

    let outcome = forward(lines, &sink, &token).await;
    match &outcome {
        Ok(outcome) => debug!(stream = %target, ?outcome, "log stream closed"),
        Err(error) => warn!(stream = %target, error = %error, "log stream read failed"),
    }
    outcome
}

async fn forward(
    mut lines: LogLines,
    sink: &mpsc::Sender<String>,
    token: &CancellationToken,
) -> Result<LogOutcome, StreamError> {
    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => return Ok(LogOutcome::Cancelled),
            next = lines.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(error)) => return Err(StreamError::Read(error)),
            None => return Ok(LogOutcome::Completed),
        };

        tokio::select! {
            biased;
            () = token.cancelled() => return Ok(LogOutcome::Cancelled),
            sent = sink.send(line) => {
                if sent.is_err() {
                    return Ok(LogOutcome::ReceiverGone);
                }
            }
        }
    }
}
