//! Wire format for message framing.
//!
//! Messages are length-prefixed: [4 bytes big-endian u32][payload]

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{DaemonError, DaemonResult, ProtocolErrorKind};

/// Maximum message size (1 MB by default, can be overridden).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Frame limits shared by both directions of a connection.
#[derive(Debug, Clone, Copy)]
pub struct Framing {
    max_size: usize,
    io_timeout: Duration,
}

impl Framing {
    pub fn new(max_size: usize, io_timeout: Duration) -> Self {
        Self {
            max_size,
            io_timeout,
        }
    }

    /// Read one frame and return its payload.
    ///
    /// A clean EOF before the length prefix reports `ConnectionClosed`.
    pub async fn read<R>(&self, reader: &mut R) -> DaemonResult<Vec<u8>>
    where
        R: AsyncRead + Unpin,
    {
        self.bounded(async {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(DaemonError::Protocol {
                        kind: ProtocolErrorKind::ConnectionClosed,
                    });
                }
                Err(e) => return Err(DaemonError::Io(e)),
            }

            let len = u32::from_be_bytes(len_buf) as usize;
            self.check_size(len)?;

            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            Ok(buf)
        })
        .await
    }

    /// Write one frame.
    pub async fn write<W>(&self, writer: &mut W, data: &[u8]) -> DaemonResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.check_size(data.len())?;
        let len = u32::try_from(data.len()).map_err(|_| DaemonError::Protocol {
            kind: ProtocolErrorKind::MessageTooLarge {
                size: data.len(),
                max: u32::MAX as usize,
            },
        })?;

        self.bounded(async {
            writer.write_all(&len.to_be_bytes()).await?;
            writer.write_all(data).await?;
            writer.flush().await?;
            Ok(())
        })
        .await
    }

    fn check_size(&self, size: usize) -> Result<(), DaemonError> {
        if size > self.max_size {
            return Err(DaemonError::Protocol {
                kind: ProtocolErrorKind::MessageTooLarge {
                    size,
                    max: self.max_size,
                },
            });
        }
        Ok(())
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, DaemonError>>,
    ) -> Result<T, DaemonError> {
        timeout(self.io_timeout, fut)
            .await
            .map_err(|_| DaemonError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            })?
    }
}

impl Default for Framing {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE, Duration::from_secs(30))
    }
}
