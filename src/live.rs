//! Real-time delivery of layer updates to an external sound engine.
//!
//! Messages are fire-and-forget: a [`LiveSender`] never reports failure to
//! its caller. Each message is a JSON datagram `{address, payload}` where the
//! address is `/liveMelody/update/{layer}`.

use crate::error::{MelodyError, Result};
use crate::midi::EventSequence;
use crate::timing::realtime_timing;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::str::FromStr;
use std::sync::Mutex;

/// Address prefix for layer updates.
pub const LIVE_ADDRESS_PREFIX: &str = "/liveMelody/update";

/// Default sound-engine endpoint (SuperCollider's language port).
pub const DEFAULT_LIVE_TARGET: &str = "127.0.0.1:57120";

/// The three editable layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerName {
    Layer1,
    Layer2,
    Layer3,
}

impl LayerName {
    pub const ALL: [LayerName; 3] = [LayerName::Layer1, LayerName::Layer2, LayerName::Layer3];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerName::Layer1 => "layer1",
            LayerName::Layer2 => "layer2",
            LayerName::Layer3 => "layer3",
        }
    }

    /// The live update address for this layer.
    pub fn address(self) -> String {
        format!("{}/{}", LIVE_ADDRESS_PREFIX, self.as_str())
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerName {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        LayerName::ALL
            .into_iter()
            .find(|l| l.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                MelodyError::validation("layer", format!("expected layer1, layer2 or layer3, got '{}'", s))
            })
    }
}

/// Parameters sent for one layer, in playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveUpdate {
    pub pitches: Vec<u8>,
    pub velocities: Vec<f32>,
    pub durations: Vec<f64>,
    /// Normalized gaps, one more than there are notes.
    pub timing: Vec<f64>,
    pub total_duration: f64,
}

impl LiveUpdate {
    pub fn from_sequence(sequence: &EventSequence) -> Self {
        let sorted = sequence.sorted();
        Self {
            pitches: sorted.iter().map(|e| e.pitch()).collect(),
            velocities: sorted.iter().map(|e| e.velocity()).collect(),
            durations: sorted.iter().map(|e| e.duration()).collect(),
            timing: realtime_timing(&sorted),
            total_duration: sorted.end(),
        }
    }
}

/// Sends a named payload somewhere. Implementations swallow and log errors.
pub trait LiveSender: Send + Sync {
    fn send(&self, address: &str, payload: &Value);
}

/// Sends a layer update to its address.
pub fn push_layer(sender: &dyn LiveSender, layer: LayerName, sequence: &EventSequence) {
    let update = LiveUpdate::from_sequence(sequence);
    match serde_json::to_value(&update) {
        Ok(payload) => sender.send(&layer.address(), &payload),
        Err(e) => tracing::warn!("Could not encode live update for {}: {}", layer, e),
    }
}

#[derive(Serialize)]
struct Datagram<'a> {
    address: &'a str,
    payload: &'a Value,
}

/// Sends JSON datagrams over UDP.
#[derive(Debug)]
pub struct UdpLiveSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpLiveSender {
    /// Binds an ephemeral local socket aimed at `target`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the target does not resolve or the socket
    /// cannot be bound.
    pub fn connect(target: &str) -> Result<Self> {
        let target = target.to_socket_addrs()?.next().ok_or_else(|| {
            MelodyError::validation("target", format!("'{}' did not resolve to an address", target))
        })?;
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)?;
        tracing::debug!("Live sender bound to {:?}, target {}", socket.local_addr().ok(), target);
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl LiveSender for UdpLiveSender {
    fn send(&self, address: &str, payload: &Value) {
        let bytes = match serde_json::to_vec(&Datagram { address, payload }) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Could not encode message for {}: {}", address, e);
                return;
            }
        };
        match self.socket.send_to(&bytes, self.target) {
            Ok(n) => tracing::debug!("Sent {} bytes to {} ({})", n, self.target, address),
            Err(e) => tracing::warn!("Live send to {} failed: {}", self.target, e),
        }
    }
}

/// Keeps every message in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySender {
    messages: Mutex<Vec<(String, Value)>>,
}

impl MemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, in order.
    pub fn messages(&self) -> Vec<(String, Value)> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LiveSender for MemorySender {
    fn send(&self, address: &str, payload: &Value) {
        let mut messages = match self.messages.lock() {
            Ok(messages) => messages,
            Err(poisoned) => poisoned.into_inner(),
        };
        messages.push((address.to_string(), payload.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MelodicEvent;

    fn melody() -> EventSequence {
        EventSequence::from_events(vec![
            MelodicEvent::new(64, 1.0, 0.5, 0.5).unwrap(),
            MelodicEvent::new(60, 0.0, 0.5, 1.0).unwrap(),
        ])
    }

    #[test]
    fn test_addresses() {
        assert_eq!(LayerName::Layer2.address(), "/liveMelody/update/layer2");
        assert_eq!("Layer3".parse::<LayerName>().unwrap(), LayerName::Layer3);
        assert!("layer4".parse::<LayerName>().is_err());
    }

    #[test]
    fn test_update_payload() {
        let update = LiveUpdate::from_sequence(&melody());
        assert_eq!(update.pitches, vec![60, 64]);
        assert_eq!(update.velocities, vec![1.0, 0.5]);
        assert_eq!(update.timing.len(), 3);
        assert_eq!(update.total_duration, 1.5);
    }

    #[test]
    fn test_push_layer_records_message() {
        let sender = MemorySender::new();
        push_layer(&sender, LayerName::Layer1, &melody());
        let messages = sender.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "/liveMelody/update/layer1");
        assert_eq!(messages[0].1["pitches"][1], 64);
        assert_eq!(messages[0].1["totalDuration"], 1.5);
    }

    #[test]
    fn test_udp_send_is_delivered() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let target = receiver.local_addr().unwrap().to_string();

        let sender = UdpLiveSender::connect(&target).unwrap();
        push_layer(&sender, LayerName::Layer3, &melody());

        let mut buf = [0u8; 2048];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        let message: Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(message["address"], "/liveMelody/update/layer3");
        assert_eq!(message["payload"]["pitches"][0], 60);
    }

    #[test]
    fn test_unresolvable_target() {
        assert!(UdpLiveSender::connect("not an address").is_err());
    }
}
