//! Demo peers driven by the signaling client
//!
//! `listen` only logs what arrives. `offer` and `answer` run a `str0m` peer
//! that negotiates a data channel through the relay: the offerer sends its
//! offer and host candidate whenever the relay connection opens, the answerer
//! replies to any offer it receives. A drive task services the UDP socket and
//! the `Rtc` timers, so once both sides have the other's description ICE runs,
//! the channel opens, the offerer says hello and the answerer echoes it.

use std::{
    net::UdpSocket as StdUdpSocket,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    time::Instant,
};

use anyhow::{anyhow, Context, Result};
use rover_signal::{
    IceCandidate, SdpKind, SessionDescription, SignalingClient, SignalingConfig,
    SignalingConsumer,
};
use str0m::{
    change::SdpPendingOffer,
    net::{Protocol, Receive},
    Candidate, Event, Input, Output, Rtc,
};
use tokio::{
    net::UdpSocket,
    sync::{mpsc, Notify},
};
use tracing::{debug, info, warn};

use crate::util::{bind_host_socket, select_host_address};

const CHANNEL: &str = "rover";
const GREETING: &str = "Hello from the rover offerer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Listener,
    Offerer,
    Answerer,
}

/// Consumer that logs every notification and negotiates when it has a role.
pub struct DemoPeer {
    role: Role,
    rtc: Arc<Mutex<Rtc>>,
    /// Wakes the drive task after signaling changed the `Rtc`.
    wake: Arc<Notify>,
    offer: Option<SessionDescription>,
    pending: Mutex<Option<SdpPendingOffer>>,
    local_candidates: Vec<Candidate>,
    client: OnceLock<SignalingClient>,
}

impl DemoPeer {
    /// Build the peer. Negotiating roles also get the bound UDP socket their
    /// host candidate points at, to hand to [`drive`].
    pub fn new(role: Role) -> Result<(Self, Option<StdUdpSocket>)> {
        let mut rtc = Rtc::new();
        let mut offer = None;
        let mut pending = None;
        let mut local_candidates = vec![];
        let mut socket = None;

        if role != Role::Listener {
            let ip = select_host_address()?;
            let (udp, candidate) = bind_host_socket(ip).context("binding a UDP socket")?;
            rtc.add_local_candidate(candidate.clone());
            local_candidates.push(candidate);
            socket = Some(udp);
        }

        if role == Role::Offerer {
            let mut change = rtc.sdp_api();
            let cid = change.add_channel(CHANNEL.to_string());
            let (sdp, p) = change
                .apply()
                .ok_or_else(|| anyhow!("Failed to apply sdp change"))?;
            info!("Requested data channel '{}' with ID: {:?}", CHANNEL, cid);
            offer = Some(SessionDescription::from(&sdp));
            pending = Some(p);
        }

        let peer = Self {
            role,
            rtc: Arc::new(Mutex::new(rtc)),
            wake: Arc::new(Notify::new()),
            offer,
            pending: Mutex::new(pending),
            local_candidates,
            client: OnceLock::new(),
        };
        Ok((peer, socket))
    }

    pub fn attach(&self, client: SignalingClient) {
        if self.client.set(client).is_err() {
            warn!("Signaling client already attached");
        }
    }

    fn client(&self) -> Result<&SignalingClient> {
        self.client
            .get()
            .ok_or_else(|| anyhow!("no signaling client attached"))
    }

    fn send_offer(&self) -> Result<()> {
        let Some(offer) = &self.offer else {
            return Ok(());
        };
        let client = self.client()?;

        client.send_description(offer)?;
        info!("Sent offer");

        let mid = first_mid(&offer.sdp).unwrap_or("0");
        for candidate in &self.local_candidates {
            client.send_candidate(&IceCandidate::from_str0m(candidate, mid, 0))?;
        }
        info!("Sent {} host candidates", self.local_candidates.len());
        Ok(())
    }

    fn handle_description(&self, description: SessionDescription) -> Result<()> {
        let mut rtc = lock(&self.rtc)?;

        match (self.role, description.kind) {
            (Role::Answerer, SdpKind::Offer) => {
                let answer = rtc.sdp_api().accept_offer(description.to_offer()?)?;
                self.client()?
                    .send_description(&SessionDescription::from(&answer))?;
                info!("Sent answer");
            }
            (Role::Offerer, SdpKind::Answer) => {
                let pending = self
                    .pending
                    .lock()
                    .map_err(|_| anyhow!("pending lock poisoned"))?
                    .take();
                match pending {
                    Some(pending) => {
                        rtc.sdp_api()
                            .accept_answer(pending, description.to_answer()?)?;
                        info!("Answer accepted");
                    }
                    None => info!("Ignoring answer, offer already settled"),
                }
            }
            (role, kind) => info!("{:?} ignoring remote {:?}", role, kind),
        }
        drop(rtc);

        self.wake.notify_one();
        Ok(())
    }

    fn handle_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let candidate = candidate.to_str0m()?;
        lock(&self.rtc)?.add_remote_candidate(candidate);
        self.wake.notify_one();
        Ok(())
    }
}

impl SignalingConsumer for DemoPeer {
    fn on_connected(&self) {
        info!("Connected to signaling server");
        if let Err(e) = self.send_offer() {
            warn!("Failed to send offer: {:#}", e);
        }
    }

    fn on_disconnected(&self) {
        info!("Disconnected from signaling server");
    }

    fn on_remote_description(&self, description: SessionDescription) {
        info!("Received remote {:?}", description.kind);
        if self.role == Role::Listener {
            info!("{}", description.sdp);
            return;
        }
        if let Err(e) = self.handle_description(description) {
            warn!("Failed to handle remote description: {:#}", e);
        }
    }

    fn on_remote_candidate(&self, candidate: IceCandidate) {
        info!(
            "Received remote candidate {} (mid {}, index {})",
            candidate.candidate, candidate.sdp_mid, candidate.sdp_m_line_index
        );
        if self.role == Role::Listener {
            return;
        }
        if let Err(e) = self.handle_candidate(candidate) {
            warn!("Failed to add remote candidate: {:#}", e);
        }
    }
}

fn first_mid(sdp: &str) -> Option<&str> {
    sdp.lines().find_map(|l| l.trim().strip_prefix("a=mid:"))
}

fn lock(rtc: &Mutex<Rtc>) -> Result<MutexGuard<'_, Rtc>> {
    rtc.lock().map_err(|_| anyhow!("rtc lock poisoned"))
}

/// Drive the `Rtc` until it dies: feed it datagrams and timeouts, transmit
/// what it outputs and react to channel events.
///
/// Text received on the data channel is also forwarded to `received`.
pub async fn drive(
    rtc: Arc<Mutex<Rtc>>,
    socket: UdpSocket,
    wake: Arc<Notify>,
    role: Role,
    received: Option<mpsc::UnboundedSender<String>>,
) -> Result<()> {
    let local = socket.local_addr()?;
    let mut buf = vec![0; 2000];

    loop {
        let Some(timeout) = poll_until_timeout(&rtc, &socket, role, received.as_ref())? else {
            info!("Peer connection closed");
            return Ok(());
        };
        let duration = timeout.saturating_duration_since(Instant::now());

        tokio::select! {
            res = socket.recv_from(&mut buf) => {
                let (n, source) = res?;
                handle_datagram(&rtc, &buf[..n], source, local)?;
            }
            _ = tokio::time::sleep(duration) => {
                lock(&rtc)?.handle_input(Input::Timeout(Instant::now()))?;
            }
            _ = wake.notified() => {}
        }
    }
}

fn handle_datagram(
    rtc: &Mutex<Rtc>,
    data: &[u8],
    source: std::net::SocketAddr,
    destination: std::net::SocketAddr,
) -> Result<()> {
    // Parse data to a DatagramRecv, which demultiplexes STUN/DTLS/RTP.
    let Ok(contents) = data.try_into() else {
        debug!("Ignoring unrecognised datagram from {}", source);
        return Ok(());
    };

    let input = Input::Receive(
        Instant::now(),
        Receive {
            proto: Protocol::Udp,
            source,
            destination,
            contents,
        },
    );
    lock(rtc)?.handle_input(input)?;
    Ok(())
}

/// Poll all output until the `Rtc` asks for a timeout. `None` once it is dead.
fn poll_until_timeout(
    rtc: &Mutex<Rtc>,
    socket: &UdpSocket,
    role: Role,
    received: Option<&mpsc::UnboundedSender<String>>,
) -> Result<Option<Instant>> {
    let mut rtc = lock(rtc)?;

    loop {
        if !rtc.is_alive() {
            return Ok(None);
        }

        match rtc.poll_output()? {
            Output::Timeout(t) => return Ok(Some(t)),
            Output::Transmit(transmit) => {
                if let Err(e) = socket.try_send_to(&transmit.contents, transmit.destination) {
                    debug!("UDP send to {} failed: {}", transmit.destination, e);
                }
            }
            Output::Event(event) => handle_event(&mut rtc, event, role, received),
        }
    }
}

fn handle_event(
    rtc: &mut Rtc,
    event: Event,
    role: Role,
    received: Option<&mpsc::UnboundedSender<String>>,
) {
    match event {
        Event::IceConnectionStateChange(state) => {
            info!("ICE Connection State: {:?}", state);
        }
        Event::ChannelOpen(id, label) => {
            info!("Data channel '{}' ({:?}) is open", label, id);
            if role == Role::Offerer {
                if let Some(mut channel) = rtc.channel(id) {
                    if let Err(e) = channel.write(false, GREETING.as_bytes()) {
                        warn!("Failed to greet on channel {:?}: {:?}", id, e);
                    }
                }
            }
        }
        Event::ChannelData(data) => {
            let text = String::from_utf8_lossy(&data.data).to_string();
            info!("Received data on channel {:?}: {}", data.id, text);

            if role == Role::Answerer {
                if let Some(mut channel) = rtc.channel(data.id) {
                    let response = format!("Echo: {}", text);
                    if let Err(e) = channel.write(false, response.as_bytes()) {
                        warn!("Failed to echo on channel {:?}: {:?}", data.id, e);
                    }
                }
            }

            if let Some(received) = received {
                let _ = received.send(text);
            }
        }
        _ => {}
    }
}

/// Run a peer against the relay until Ctrl-C.
pub fn main(role: Role, config: SignalingConfig) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(run(role, config))
}

async fn run(role: Role, config: SignalingConfig) -> Result<()> {
    info!("Running as {:?} against {}", role, config.address());

    let (peer, socket) = DemoPeer::new(role)?;
    let peer = Arc::new(peer);

    let driver = match socket {
        Some(socket) => {
            socket.set_nonblocking(true)?;
            let socket = UdpSocket::from_std(socket)?;
            let task = tokio::spawn(drive(
                peer.rtc.clone(),
                socket,
                peer.wake.clone(),
                role,
                None,
            ));
            Some(task)
        }
        None => None,
    };

    let client = SignalingClient::websocket(config, &peer);
    peer.attach(client.clone());
    client.connect()?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    client.shutdown();

    if let Some(driver) = driver {
        if driver.is_finished() {
            match driver.await {
                Ok(Err(e)) => warn!("Peer drive loop failed: {:#}", e),
                Err(e) => warn!("Peer drive task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        } else {
            driver.abort();
        }
    }

    Ok(())
}
