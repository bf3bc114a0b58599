use super::*;

/// One framed peer connection. The stream is split into a read task and a
/// write task bridged by bounded channels; senders wait when a channel is
/// full, which is the backpressure. Any framing failure on either side
/// cancels the whole connection.
pub(crate) struct Connection {
    pub(crate) outgoing: mpsc::Sender<Message>,
    pub(crate) incoming: mpsc::Receiver<Message>,
    cancel: CancellationToken,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, network: Network, peer: SocketAddr) -> Self {
        let (reader, writer) = stream.into_split();
        let (incoming_tx, incoming_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        tokio::spawn(Self::read_loop(
            reader,
            incoming_tx,
            network.clone(),
            peer,
            cancel.clone(),
        ));
        tokio::spawn(Self::write_loop(
            writer,
            outgoing_rx,
            network,
            peer,
            cancel.clone(),
        ));

        Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            cancel,
        }
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn close(&self) {
        self.cancel.cancel();
    }

    async fn read_loop(
        mut reader: OwnedReadHalf,
        incoming: mpsc::Sender<Message>,
        network: Network,
        peer: SocketAddr,
        cancel: CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = Self::read_message(&mut reader, &network) => message,
            };

            match message {
                Ok(Some(message)) => {
                    if incoming.send(message).await.is_err() {
                        break;
                    }
                }
                // undecodable payload inside an intact frame: skip it
                Ok(None) => continue,
                Err(err) => {
                    debug!("Read from {peer} failed: {err}");
                    break;
                }
            }
        }

        cancel.cancel();
    }

    /// Reads one frame. Framing problems (bad prefix, bad checksum, short
    /// read, oversized length) are connection-fatal; a payload that fails to
    /// decode only loses that message.
    async fn read_message(reader: &mut OwnedReadHalf, network: &Network) -> Result<Option<Message>> {
        let mut prefix = [0u8; 8];
        reader.read_exact(&mut prefix).await?;
        ensure!(
            prefix == network.message_prefix,
            "message prefix mismatch: expected {}, got {}",
            hex::encode(network.message_prefix),
            hex::encode(prefix),
        );

        let mut command = [0u8; sharewire::COMMAND_SIZE];
        reader.read_exact(&mut command).await?;
        let command = sharewire::decode_command(command)?;

        let length = reader.read_u32_le().await? as usize;
        ensure!(
            length <= sharewire::MAX_PAYLOAD_SIZE,
            "refusing {length} byte payload for {command}",
        );

        let mut checksum = [0u8; 4];
        reader.read_exact(&mut checksum).await?;

        let mut payload = vec![0u8; length];
        reader.read_exact(&mut payload).await?;

        sharewire::verify_checksum(&payload, checksum)
            .with_context(|| format!("unreadable {command} frame"))?;

        match Message::decode_payload(&command, &payload, network) {
            Ok(message) => {
                debug!("Received {command} ({length} bytes)");
                Ok(Some(message))
            }
            Err(err) => {
                warn!("Dropping undecodable {command} payload: {err}");
                Ok(None)
            }
        }
    }

    async fn write_loop(
        mut writer: OwnedWriteHalf,
        mut outgoing: mpsc::Receiver<Message>,
        network: Network,
        peer: SocketAddr,
        cancel: CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = outgoing.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let frame = match message.encode_frame(&network) {
                Ok(frame) => frame,
                Err(err) => {
                    error!("Failed to encode {}: {err}", message.command());
                    continue;
                }
            };

            debug!("Sending {} ({} bytes)", message.command(), frame.len());

            if let Err(err) = writer.write_all(&frame).await {
                debug!("Write to {peer} failed: {err}");
                break;
            }
        }

        cancel.cancel();
    }
}
