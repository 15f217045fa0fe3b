//! Laser-array control link.
//!
//! Carries the fixed four-byte frames of [`harp_ipc`] over a UART (115200
//! 8N1). As with the MIDI link, the transport is any async byte stream; the
//! split halves go to whoever owns each direction (the laser array writes,
//! the control-ingress task reads).

use crate::{Error, Result};
use harp_ipc::packet::{IPC_PKT_LEN, IpcPkt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Remaining frame bytes must arrive within this window once the command
/// byte has been seen.
const BYTE_TIMEOUT: Duration = Duration::from_millis(30);

/// Split a byte stream into the two halves of the control link.
pub fn ipc_link<S: AsyncRead + AsyncWrite>(stream: S) -> (IpcTx<S>, IpcRx<S>) {
    let (reader, writer) = tokio::io::split(stream);
    (
        IpcTx { writer },
        IpcRx {
            reader,
            timeout: harp_globals::TIMEOUT,
        },
    )
}

/// One request/reply round-trip: send `pkt`, then wait for the frame that
/// echoes its command byte. Unrelated traffic read in the meantime is
/// dropped, so this is only for use before the ingress task owns the
/// reading half (probing, demos, tests).
pub async fn request<S: AsyncRead + AsyncWrite>(
    tx: &mut IpcTx<S>,
    rx: &mut IpcRx<S>,
    pkt: IpcPkt,
) -> Result<Option<IpcPkt>> {
    let cmd = pkt.cmd();
    tx.send(pkt).await?;
    loop {
        match rx.read().await? {
            Some(reply) if reply.cmd() == cmd => return Ok(Some(reply)),
            Some(other) => log::debug!("dropping unrelated frame {other}"),
            None => return Ok(None),
        }
    }
}

pub struct IpcTx<S> {
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite> IpcTx<S> {
    pub async fn send(&mut self, pkt: IpcPkt) -> Result<()> {
        log::debug!("RPI -> STM: {pkt}");
        self.writer
            .write_all(pkt.as_bytes())
            .await
            .map_err(|_| Error::LaserArrayUnavailable)?;
        self.writer
            .flush()
            .await
            .map_err(|_| Error::LaserArrayUnavailable)?;
        Ok(())
    }
}

pub struct IpcRx<S> {
    reader: ReadHalf<S>,
    timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite> IpcRx<S> {
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Read one frame. `Ok(None)` on a quiet line or after dropping a
    /// truncated frame; `Err(LaserArrayUnavailable)` once the stream is
    /// gone.
    pub async fn read(&mut self) -> Result<Option<IpcPkt>> {
        let mut cmd = [0u8; 1];
        match tokio::time::timeout(self.timeout, self.reader.read_exact(&mut cmd)).await {
            Err(_) => return Ok(None),
            Ok(Err(_)) => return Err(Error::LaserArrayUnavailable),
            Ok(Ok(_)) => {}
        }

        let mut rest = [0u8; IPC_PKT_LEN - 1];
        match tokio::time::timeout(BYTE_TIMEOUT, self.reader.read_exact(&mut rest)).await {
            Err(_) => {
                log::warn!("timeout while reading control frame");
                return Ok(None);
            }
            Ok(Err(_)) => return Err(Error::LaserArrayUnavailable),
            Ok(Ok(_)) => {}
        }

        let pkt = IpcPkt::new(cmd[0], rest[0], rest[1], rest[2]);
        log::debug!("STM -> RPI: {pkt}");
        Ok(Some(pkt))
    }
}
