use crossbeam::channel::{unbounded, Receiver, RecvError, SendError, Sender, TryRecvError};
use std::io::{Error, ErrorKind, Read, Result, Write};

/// Writing half of an in-process byte pipe. Every `write` is forwarded as one chunk.
pub struct CrossbeamSender(Sender<Vec<u8>>);

/// Reading half of an in-process byte pipe.
///
/// `read` blocks until at least one byte is available and then drains whatever else is already
/// queued. A dropped sender surfaces as [ErrorKind::BrokenPipe].
pub struct CrossbeamReceiver {
    inner: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl Write for CrossbeamSender {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if let Err(SendError(_)) = self.0.send(buf.to_vec()) {
            return Err(Error::new(ErrorKind::BrokenPipe, "crossbeam receiver dropped"));
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl CrossbeamReceiver {
    fn take_pending(&mut self, buf: &mut [u8]) -> usize {
        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        n
    }

    fn refill(&mut self, chunk: Vec<u8>) {
        self.pending = chunk;
        self.offset = 0;
    }
}

impl Read for CrossbeamReceiver {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.offset == self.pending.len() {
            match self.inner.recv() {
                Ok(chunk) => self.refill(chunk),
                Err(RecvError) => {
                    return Err(Error::new(ErrorKind::BrokenPipe, RecvError));
                }
            }
        }

        let mut n = self.take_pending(buf);
        while n < buf.len() {
            match self.inner.try_recv() {
                Ok(chunk) => {
                    self.refill(chunk);
                    n += self.take_pending(&mut buf[n..]);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        Ok(n)
    }
}

/// Create one direction of an in-process byte pipe.
pub fn cbch_pair() -> (CrossbeamSender, CrossbeamReceiver) {
    let (s, r) = unbounded();
    (
        CrossbeamSender(s),
        CrossbeamReceiver {
            inner: r,
            pending: Vec::new(),
            offset: 0,
        },
    )
}
