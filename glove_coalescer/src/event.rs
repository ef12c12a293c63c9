//! Raw per-device events as delivered by the transport layer.

use glove_data::{Entity, GestureInstance, Hand, SensorSample};

/// Which physical device produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    LeftGlove,
    RightGlove,
    /// Auxiliary head-mounted sensor; carried through the protocol but not
    /// used for gesture classification.
    Headset,
}

impl DeviceKind {
    pub fn glove(hand: Hand) -> Self {
        match hand {
            Hand::Left  => DeviceKind::LeftGlove,
            Hand::Right => DeviceKind::RightGlove,
        }
    }

    pub fn hand(self) -> Option<Hand> {
        match self {
            DeviceKind::LeftGlove  => Some(Hand::Left),
            DeviceKind::RightGlove => Some(Hand::Right),
            DeviceKind::Headset    => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    ButtonDown,
    ButtonUp,
    Data(SensorSample),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceEvent {
    pub source:       Entity,
    pub device:       DeviceKind,
    pub kind:         EventKind,
    /// Monotonic device timestamp in milliseconds.
    pub timestamp_ms: u64,
}

impl DeviceEvent {
    pub fn new(source: Entity, device: DeviceKind, kind: EventKind, timestamp_ms: u64) -> Self {
        DeviceEvent { source, device, kind, timestamp_ms }
    }

    pub fn button_down(source: Entity, device: DeviceKind, timestamp_ms: u64) -> Self {
        Self::new(source, device, EventKind::ButtonDown, timestamp_ms)
    }

    pub fn button_up(source: Entity, device: DeviceKind, timestamp_ms: u64) -> Self {
        Self::new(source, device, EventKind::ButtonUp, timestamp_ms)
    }

    pub fn data(source: Entity, device: DeviceKind, sample: SensorSample, timestamp_ms: u64) -> Self {
        Self::new(source, device, EventKind::Data(sample), timestamp_ms)
    }

    /// Data event from the raw 9-value glove payload (gyro, accel, mag).
    pub fn from_payload(source: Entity, device: DeviceKind, payload: [f64; 9], timestamp_ms: u64) -> Self {
        Self::data(source, device, SensorSample::from_payload(payload), timestamp_ms)
    }
}

/// The events `source`'s gloves would send while performing `inst`: button
/// down on every glove used, the samples in time order, then button up on
/// each glove. The first sample is stamped `start_ms`.
pub fn replay(source: Entity, inst: &GestureInstance, start_ms: u64) -> Vec<DeviceEvent> {
    let hands: Vec<(DeviceKind, &[SensorSample])> = [Hand::Left, Hand::Right]
        .into_iter()
        .filter_map(|h| inst.hand(h).map(|s| (DeviceKind::glove(h), s)))
        .collect();
    let t0 = inst.time_pts().first().copied().unwrap_or(0.0);
    let stamp = |t: f64| start_ms + ((t - t0) * 1000.0).round().max(0.0) as u64;

    let mut out = Vec::with_capacity(hands.len() * (inst.num_samples() + 2));
    for (device, _) in &hands {
        out.push(DeviceEvent::button_down(source, *device, start_ms));
    }
    for (i, t) in inst.time_pts().iter().enumerate() {
        for (device, samples) in &hands {
            out.push(DeviceEvent::data(source, *device, samples[i], stamp(*t)));
        }
    }
    let end = stamp(inst.time_pts().last().copied().unwrap_or(t0)) + 1;
    for (device, _) in &hands {
        out.push(DeviceEvent::button_up(source, *device, end));
    }
    out
}
