use crate::common::NetAddress;
use crate::errors::ProtocolError;
use crate::wire::{Message, MessageCommand, MAX_MESSAGE_SIZE};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use uuid::Uuid;

/// Default capacity of a per-flow incoming route; reaching it indicates the
/// consuming flow has stalled
pub const ROUTE_CAPACITY: usize = 100;

/// Capacity of the outgoing message queue
const OUTGOING_CAPACITY: usize = 128;

/// A typed bounded queue carrying the messages a single flow consumes
pub struct IncomingRoute {
    receiver: async_channel::Receiver<Message>,
}

impl IncomingRoute {
    /// Suspends until the next message arrives; `ConnectionClosed` signals a
    /// clean shutdown and flows treat it as normal termination
    pub async fn dequeue(&self) -> Result<Message, ProtocolError> {
        self.receiver.recv().await.map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Dequeues with the given timeout; inter-peer exchanges are expected to
    /// respond within [`crate::common::DEFAULT_TIMEOUT`]
    pub async fn dequeue_with_timeout(&self, timeout: Duration) -> Result<Message, ProtocolError> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(ProtocolError::ConnectionClosed),
            Err(_) => Err(ProtocolError::Timeout(timeout)),
        }
    }

    pub fn try_dequeue(&self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}

/// Demultiplexes a peer connection: incoming messages are dispatched by
/// command into per-flow bounded routes, outgoing messages are funneled into
/// the connection writer. One router exists per connected peer.
pub struct Router {
    key: Uuid,
    net_address: NetAddress,
    is_outbound: bool,
    routes: Mutex<HashMap<MessageCommand, async_channel::Sender<Message>>>,
    outgoing_sender: async_channel::Sender<Message>,
    outgoing_receiver: async_channel::Receiver<Message>,
    stream: Mutex<Option<TcpStream>>,
    close_signal: Mutex<Option<triggered::Trigger>>,
    close_listener: triggered::Listener,
}

impl Router {
    pub fn new(stream: TcpStream, is_outbound: bool) -> Arc<Self> {
        let net_address = stream.peer_addr().map(NetAddress::from).expect("a connected stream has a peer address");
        let (outgoing_sender, outgoing_receiver) = async_channel::bounded(OUTGOING_CAPACITY);
        let (trigger, listener) = triggered::trigger();
        Arc::new(Self {
            key: Uuid::new_v4(),
            net_address,
            is_outbound,
            routes: Mutex::new(HashMap::new()),
            outgoing_sender,
            outgoing_receiver,
            stream: Mutex::new(Some(stream)),
            close_signal: Mutex::new(Some(trigger)),
            close_listener: listener,
        })
    }

    pub fn key(&self) -> Uuid {
        self.key
    }

    pub fn net_address(&self) -> NetAddress {
        self.net_address
    }

    pub fn is_outbound(&self) -> bool {
        self.is_outbound
    }

    /// Registers a new route consuming the given message commands. Must be
    /// called before [`Router::start`]; messages arriving for an unsubscribed
    /// command are a protocol violation and close the connection.
    pub fn subscribe(&self, commands: &[MessageCommand]) -> IncomingRoute {
        let (sender, receiver) = async_channel::bounded(ROUTE_CAPACITY);
        let mut routes = self.routes.lock();
        for command in commands {
            let previous = routes.insert(*command, sender.clone());
            assert!(previous.is_none(), "command {command} is already subscribed");
        }
        IncomingRoute { receiver }
    }

    /// Launches the connection I/O loops. Incoming messages flow into the
    /// subscribed routes; the loops exit on close or on any I/O error.
    pub fn start(self: &Arc<Self>) {
        let stream = self.stream.lock().take().expect("start is called exactly once");
        let (read_half, write_half) = stream.into_split();

        let router = self.clone();
        tokio::spawn(async move {
            if let Err(err) = router.incoming_loop(read_half).await {
                log::debug!("P2P, incoming loop of peer {} exited: {}", router.net_address, err);
            }
            router.close();
        });

        let router = self.clone();
        tokio::spawn(async move {
            router.outgoing_loop(write_half).await;
        });
    }

    /// Enqueues a message towards the peer, suspending while the outgoing
    /// queue is at capacity
    pub async fn enqueue(&self, message: Message) -> Result<(), ProtocolError> {
        self.outgoing_sender.send(message).await.map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Fire-and-forget enqueue used on teardown paths (e.g. a final `Reject`)
    pub fn try_enqueue(&self, message: Message) {
        let _ = self.outgoing_sender.try_send(message);
    }

    /// Closes the connection: all routes and the outgoing queue are closed,
    /// pending dequeues resolve to `ConnectionClosed`
    pub fn close(&self) {
        if let Some(trigger) = self.close_signal.lock().take() {
            trigger.trigger();
        }
        self.outgoing_sender.close();
        let routes = std::mem::take(&mut *self.routes.lock());
        for (_, sender) in routes {
            sender.close();
        }
    }

    pub async fn closed(&self) {
        self.close_listener.clone().await
    }

    pub fn is_closed(&self) -> bool {
        self.outgoing_sender.is_closed()
    }

    async fn incoming_loop(self: &Arc<Self>, mut read_half: OwnedReadHalf) -> Result<(), ProtocolError> {
        loop {
            let mut frame_header = [0u8; 8];
            read_half.read_exact(&mut frame_header).await.map_err(|_| ProtocolError::ConnectionClosed)?;
            let payload_len = u32::from_le_bytes(frame_header[0..4].try_into().unwrap()) as usize;
            let command_code = u32::from_le_bytes(frame_header[4..8].try_into().unwrap());
            if payload_len > MAX_MESSAGE_SIZE {
                return Err(ProtocolError::SerializationError(crate::wire::SerError::TooLargeRead(
                    payload_len as u64,
                    MAX_MESSAGE_SIZE as u64,
                )));
            }
            let command = MessageCommand::from_u32(command_code)?;
            let mut payload = vec![0u8; payload_len];
            read_half.read_exact(&mut payload).await.map_err(|_| ProtocolError::ConnectionClosed)?;
            let message = Message::deserialize_payload(command, &payload)?;
            self.route_incoming(command, message)?;
        }
    }

    /// Dispatches an incoming message to its subscribed route. Messages are
    /// delivered per route in arrival (FIFO) order. A full route indicates the
    /// consumer stalled beyond the allowed backpressure and fails the connection.
    fn route_incoming(&self, command: MessageCommand, message: Message) -> Result<(), ProtocolError> {
        let sender = match self.routes.lock().get(&command) {
            Some(sender) => sender.clone(),
            None => return Err(ProtocolError::UnexpectedMessage { expected: "a subscribed command", got: command }),
        };
        match sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(async_channel::TrySendError::Full(_)) => {
                self.on_capacity_reached(command);
                Err(ProtocolError::RouteCapacityReached(command))
            }
            Err(async_channel::TrySendError::Closed(_)) => Err(ProtocolError::ConnectionClosed),
        }
    }

    fn on_capacity_reached(&self, command: MessageCommand) {
        log::warn!("P2P, route {} of peer {} is full, disconnecting", command, self.net_address);
    }

    async fn outgoing_loop(self: &Arc<Self>, mut write_half: OwnedWriteHalf) {
        while let Ok(message) = self.outgoing_receiver.recv().await {
            let command = message.command();
            let payload = match message.serialize_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    log::error!("P2P, failed serializing outgoing {} message: {}", command, err);
                    break;
                }
            };
            let mut frame = Vec::with_capacity(8 + payload.len());
            frame.extend((payload.len() as u32).to_le_bytes());
            frame.extend((command as u32).to_le_bytes());
            frame.extend(payload);
            if write_half.write_all(&frame).await.is_err() {
                break;
            }
        }
        self.close();
    }
}
