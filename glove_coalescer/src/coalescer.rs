//! Per-player glove buffers and the flush rules that turn them into
//! [`GestureInstance`]s.
//!
//! [`Coalescer`] is a plain state machine: feed it events, it returns the
//! instances produced by that event. The thread wrapper lives in
//! [`crate::spawn_coalescer`].

use std::time::{Duration, Instant};

use glove_data::{Entity, GestureInstance, Hand, InvalidGesture, PlayerGestureInstance, SensorSample};
use tracing::{debug, trace, warn};

use crate::config::CoalescerConfig;
use crate::event::{DeviceEvent, EventKind};

// ════════════════════════════════════════════════════════════════════════════
// Buffers
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct GloveBuffer {
    pressed:   bool,
    samples:   Vec<(SensorSample, u64)>,
    last_seen: Option<Instant>,
}

#[derive(Debug, Default)]
struct PlayerBuffers {
    left:  GloveBuffer,
    right: GloveBuffer,
}

impl PlayerBuffers {
    fn glove(&self, hand: Hand) -> &GloveBuffer {
        match hand {
            Hand::Left  => &self.left,
            Hand::Right => &self.right,
        }
    }

    fn glove_mut(&mut self, hand: Hand) -> &mut GloveBuffer {
        match hand {
            Hand::Left  => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }
}

const PLAYERS: [Entity; 2] = [Entity::Player1, Entity::Player2];

fn player_slot(entity: Entity) -> Option<usize> {
    match entity {
        Entity::Player1    => Some(0),
        Entity::Player2    => Some(1),
        Entity::Ringmaster => None,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Coalescer
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Coalescer {
    config:           CoalescerConfig,
    session_start_ms: u64,
    players:          [PlayerBuffers; 2],
}

impl Coalescer {
    /// `session_start_ms` is the device-clock origin; instance time points
    /// are seconds elapsed since it.
    pub fn new(config: CoalescerConfig, session_start_ms: u64) -> Self {
        Coalescer {
            config,
            session_start_ms,
            players: Default::default(),
        }
    }

    pub fn config(&self) -> &CoalescerConfig { &self.config }

    /// Samples currently buffered for one glove (0 for non-players).
    pub fn pending(&self, player: Entity, hand: Hand) -> usize {
        player_slot(player).map_or(0, |s| self.players[s].glove(hand).samples.len())
    }

    pub fn is_pressed(&self, player: Entity, hand: Hand) -> bool {
        player_slot(player).map_or(false, |s| self.players[s].glove(hand).pressed)
    }

    pub fn handle_event(&mut self, event: DeviceEvent) -> Vec<PlayerGestureInstance> {
        self.handle_event_at(event, Instant::now())
    }

    /// As [`Coalescer::handle_event`] with an explicit wall-clock reading,
    /// used for the release timeout.
    pub fn handle_event_at(&mut self, event: DeviceEvent, now: Instant) -> Vec<PlayerGestureInstance> {
        let Some(hand) = event.device.hand() else {
            trace!(source = event.source.name(), "ignoring headset event");
            return Vec::new();
        };
        let Some(slot) = player_slot(event.source) else {
            warn!(source = event.source.name(), device = ?event.device, "dropping unroutable glove event");
            return Vec::new();
        };

        let capacity = self.config.buffer_capacity;
        let buffers = &mut self.players[slot];
        let glove = buffers.glove_mut(hand);
        glove.last_seen = Some(now);

        let flush = match event.kind {
            EventKind::ButtonDown => {
                glove.pressed = true;
                false
            }
            EventKind::Data(sample) => {
                if !glove.pressed {
                    trace!(source = event.source.name(), ?hand, "data without button down, dropped");
                    return Vec::new();
                }
                glove.samples.push((sample, event.timestamp_ms));
                if glove.samples.len() >= capacity {
                    debug!(source = event.source.name(), ?hand, capacity, "glove buffer full, forcing flush");
                    true
                } else {
                    false
                }
            }
            EventKind::ButtonUp => {
                glove.pressed = false;
                !buffers.glove(hand.other()).pressed
            }
        };

        if flush { self.flush(event.source) } else { Vec::new() }
    }

    /// Release any pressed glove whose last event is older than the
    /// configured release timeout, flushing as a button-up would.
    pub fn release_stale(&mut self, now: Instant) -> Vec<PlayerGestureInstance> {
        if self.config.release_timeout_ms == 0 {
            return Vec::new();
        }
        let limit = Duration::from_millis(self.config.release_timeout_ms);
        let mut out = Vec::new();

        for (slot, player) in PLAYERS.into_iter().enumerate() {
            for hand in [Hand::Left, Hand::Right] {
                let buffers = &mut self.players[slot];
                let glove = buffers.glove_mut(hand);
                let stale = glove.pressed
                    && glove.last_seen.map_or(false, |t| now.saturating_duration_since(t) >= limit);
                if !stale {
                    continue;
                }
                debug!(player = player.name(), ?hand, "no button-up within release timeout");
                glove.pressed = false;
                let other = buffers.glove(hand.other());
                let buffered = !buffers.left.samples.is_empty() || !buffers.right.samples.is_empty();
                if !other.pressed && buffered {
                    out.extend(self.flush(player));
                }
            }
        }
        out
    }

    /// Turn a player's buffers into zero, one or two instances and empty
    /// both buffers.
    pub fn flush(&mut self, player: Entity) -> Vec<PlayerGestureInstance> {
        let Some(slot) = player_slot(player) else {
            return Vec::new();
        };
        let start = self.session_start_ms;
        let threshold_ms = self.config.coactivation_threshold_ms();

        let buffers = &mut self.players[slot];
        let left = std::mem::take(&mut buffers.left.samples);
        let right = std::mem::take(&mut buffers.right.samples);

        let built = match (left.first(), right.first()) {
            (None, None) => {
                warn!(player = player.name(), "flush with no glove data");
                return Vec::new();
            }
            (Some(_), None) => vec![one_handed(Hand::Left, &left, start)],
            (None, Some(_)) => vec![one_handed(Hand::Right, &right, start)],
            (Some(&(_, l0)), Some(&(_, r0))) => {
                let skew = (l0 as f64 - r0 as f64).abs();
                if skew > threshold_ms {
                    debug!(player = player.name(), skew_ms = skew, "gloves started apart, splitting");
                    vec![one_handed(Hand::Left, &left, start), one_handed(Hand::Right, &right, start)]
                } else {
                    vec![two_handed(&left, &right, start)]
                }
            }
        };

        built
            .into_iter()
            .filter_map(|r| match r {
                Ok(instance) => {
                    debug!(
                        player = player.name(),
                        samples = instance.num_samples(),
                        hands = ?instance.handedness(),
                        "coalesced gesture"
                    );
                    Some(PlayerGestureInstance { player, instance })
                }
                Err(e) => {
                    warn!(player = player.name(), error = %e, "discarding malformed gesture");
                    None
                }
            })
            .collect()
    }
}

// ── instance builders ─────────────────────────────────────────────────────

fn elapsed_secs(timestamp_ms: u64, start_ms: u64) -> f64 {
    (timestamp_ms as f64 - start_ms as f64) / 1000.0
}

fn one_handed(hand: Hand, buf: &[(SensorSample, u64)], start: u64) -> Result<GestureInstance, InvalidGesture> {
    let samples = buf.iter().map(|(s, _)| *s).collect();
    let times = buf.iter().map(|(_, ts)| elapsed_secs(*ts, start)).collect();
    match hand {
        Hand::Left  => GestureInstance::left_handed(samples, times),
        Hand::Right => GestureInstance::right_handed(samples, times),
    }
}

// The shorter buffer (left on a tie) sets the length and the time points;
// the longer one's extra samples are dropped.
fn two_handed(
    left:  &[(SensorSample, u64)],
    right: &[(SensorSample, u64)],
    start: u64,
) -> Result<GestureInstance, InvalidGesture> {
    let main = if right.len() < left.len() { right } else { left };
    let n = main.len();
    let times = main.iter().map(|(_, ts)| elapsed_secs(*ts, start)).collect();
    let l = left[..n].iter().map(|(s, _)| *s).collect();
    let r = right[..n].iter().map(|(s, _)| *s).collect();
    GestureInstance::two_handed(l, r, times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DeviceKind;

    const P1: Entity = Entity::Player1;
    const P2: Entity = Entity::Player2;
    const L: DeviceKind = DeviceKind::LeftGlove;
    const R: DeviceKind = DeviceKind::RightGlove;

    fn sample(v: f64) -> SensorSample {
        SensorSample::from_accel(v, 0.0, 0.0)
    }

    fn coalescer(threshold_secs: f64, capacity: usize) -> Coalescer {
        let cfg = CoalescerConfig::default()
            .coactivation_threshold_secs(threshold_secs)
            .buffer_capacity(capacity)
            .release_timeout_ms(0);
        Coalescer::new(cfg, 1_000)
    }

    fn feed(c: &mut Coalescer, events: Vec<DeviceEvent>) -> Vec<PlayerGestureInstance> {
        events.into_iter().flat_map(|e| c.handle_event(e)).collect()
    }

    // ── one-handed ────────────────────────────────────────────────────────
    #[test]
    fn single_glove_press_data_release() {
        let mut c = coalescer(0.5, 128);
        let out = feed(&mut c, vec![
            DeviceEvent::button_down(P1, L, 1_000),
            DeviceEvent::data(P1, L, sample(1.0), 1_100),
            DeviceEvent::data(P1, L, sample(2.0), 1_200),
            DeviceEvent::data(P1, L, sample(3.0), 1_350),
            DeviceEvent::button_up(P1, L, 1_400),
        ]);
        assert_eq!(out.len(), 1);
        let g = &out[0];
        assert_eq!(g.player, P1);
        assert!(g.instance.has_left() && !g.instance.has_right());
        assert_eq!(g.instance.left().unwrap(), &[sample(1.0), sample(2.0), sample(3.0)]);
        assert_eq!(g.instance.time_pts(), &[0.1, 0.2, 0.35]);
        assert_eq!(c.pending(P1, Hand::Left), 0);
    }

    #[test]
    fn data_without_button_is_dropped() {
        let mut c = coalescer(0.5, 128);
        let out = feed(&mut c, vec![
            DeviceEvent::data(P1, R, sample(1.0), 1_100),
            DeviceEvent::button_up(P1, R, 1_200),
        ]);
        assert!(out.is_empty());
        assert_eq!(c.pending(P1, Hand::Right), 0);
    }

    #[test]
    fn release_without_data_emits_nothing() {
        let mut c = coalescer(0.5, 128);
        let out = feed(&mut c, vec![
            DeviceEvent::button_down(P2, R, 1_000),
            DeviceEvent::button_up(P2, R, 1_200),
        ]);
        assert!(out.is_empty());
    }

    // ── two-handed ────────────────────────────────────────────────────────
    #[test]
    fn close_starts_merge_into_one_gesture() {
        let mut c = coalescer(0.05, 128);
        let mut out = feed(&mut c, vec![
            DeviceEvent::button_down(P1, L, 1_000),
            DeviceEvent::button_down(P1, R, 1_000),
            DeviceEvent::data(P1, L, sample(1.0), 1_000),
            DeviceEvent::data(P1, R, sample(10.0), 1_005),
            DeviceEvent::data(P1, L, sample(2.0), 1_010),
            DeviceEvent::data(P1, R, sample(20.0), 1_015),
            DeviceEvent::data(P1, L, sample(3.0), 1_020),
            DeviceEvent::button_up(P1, L, 1_030),
        ]);
        // Right still held: nothing yet.
        assert!(out.is_empty());
        assert!(c.is_pressed(P1, Hand::Right));

        out.extend(c.handle_event(DeviceEvent::button_up(P1, R, 1_040)));
        assert_eq!(out.len(), 1);
        let inst = &out[0].instance;
        assert_eq!(inst.num_samples(), 2);
        assert_eq!(inst.left().unwrap(), &[sample(1.0), sample(2.0)]);
        assert_eq!(inst.right().unwrap(), &[sample(10.0), sample(20.0)]);
        // Right was the shorter buffer, so its timestamps are used.
        assert_eq!(inst.time_pts(), &[0.005, 0.015]);
        assert_eq!(c.pending(P1, Hand::Left), 0);
        assert_eq!(c.pending(P1, Hand::Right), 0);
    }

    #[test]
    fn equal_lengths_take_left_times() {
        let mut c = coalescer(0.05, 128);
        let out = feed(&mut c, vec![
            DeviceEvent::button_down(P1, L, 1_000),
            DeviceEvent::button_down(P1, R, 1_000),
            DeviceEvent::data(P1, L, sample(1.0), 1_000),
            DeviceEvent::data(P1, R, sample(2.0), 1_004),
            DeviceEvent::button_up(P1, R, 1_010),
            DeviceEvent::button_up(P1, L, 1_010),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].instance.time_pts(), &[0.0]);
    }

    #[test]
    fn distant_starts_split_left_then_right() {
        let mut c = coalescer(0.05, 128);
        let out = feed(&mut c, vec![
            DeviceEvent::button_down(P1, L, 1_000),
            DeviceEvent::data(P1, L, sample(1.0), 1_000),
            DeviceEvent::button_down(P1, R, 1_400),
            DeviceEvent::data(P1, L, sample(2.0), 1_450),
            DeviceEvent::data(P1, R, sample(9.0), 1_500),
            DeviceEvent::button_up(P1, R, 1_550),
            DeviceEvent::button_up(P1, L, 1_560),
        ]);
        assert_eq!(out.len(), 2);
        assert!(out[0].instance.has_left() && !out[0].instance.has_right());
        assert!(out[1].instance.has_right() && !out[1].instance.has_left());
        assert_eq!(out[0].instance.num_samples(), 2);
        assert_eq!(out[1].instance.time_pts(), &[0.5]);
    }

    fn both_gloves(left_start: u64, left_n: u64, right_start: u64, right_n: u64) -> Vec<DeviceEvent> {
        let mut events = vec![DeviceEvent::button_down(P1, L, left_start), DeviceEvent::button_down(P1, R, right_start)];
        events.extend((0..left_n).map(|i| DeviceEvent::data(P1, L, sample(i as f64), left_start + i * 10)));
        events.extend((0..right_n).map(|i| DeviceEvent::data(P1, R, sample(100.0 + i as f64), right_start + i * 10)));
        events.push(DeviceEvent::button_up(P1, L, 2_000));
        events.push(DeviceEvent::button_up(P1, R, 2_000));
        events
    }

    #[test]
    fn ten_and_twelve_samples_merge_to_ten() {
        let mut c = coalescer(0.05, 128);
        let out = feed(&mut c, both_gloves(1_000, 10, 1_005, 12));
        assert_eq!(out.len(), 1);
        let inst = &out[0].instance;
        assert_eq!(inst.num_samples(), 10);
        let expected_right: Vec<_> = (0..10).map(|i| sample(100.0 + i as f64)).collect();
        assert_eq!(inst.right().unwrap(), expected_right.as_slice());
        // Left is the shorter glove, so its stamps are kept.
        let expected_times: Vec<f64> = (0..10).map(|i| (i * 10) as f64 / 1000.0).collect();
        assert_eq!(inst.time_pts(), expected_times.as_slice());
    }

    #[test]
    fn twelve_and_ten_samples_take_right_times() {
        let mut c = coalescer(0.05, 128);
        let out = feed(&mut c, both_gloves(1_005, 12, 1_000, 10));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].instance.num_samples(), 10);
        assert_eq!(out[0].instance.time_pts()[1], 0.01);
    }

    #[test]
    fn start_gap_over_threshold_splits() {
        let mut c = coalescer(0.05, 128);
        let out = feed(&mut c, both_gloves(1_000, 10, 1_500, 12));
        assert_eq!(out.len(), 2);
        assert!(out[0].instance.has_left() && !out[0].instance.has_right());
        assert!(out[1].instance.has_right() && !out[1].instance.has_left());
        assert_eq!(out[0].instance.num_samples(), 10);
        assert_eq!(out[1].instance.num_samples(), 12);
        assert_eq!(out[1].instance.time_pts()[0], 0.5);
    }

    // ── overflow ──────────────────────────────────────────────────────────
    #[test]
    fn full_buffer_flushes_exactly_capacity() {
        let mut c = coalescer(0.5, 4);
        let mut events = vec![DeviceEvent::button_down(P2, L, 1_000)];
        events.extend((0..6).map(|i| DeviceEvent::data(P2, L, sample(i as f64), 1_000 + i * 10)));
        let out = feed(&mut c, events);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].player, P2);
        assert_eq!(out[0].instance.num_samples(), 4);
        // Button still down; the remainder keeps accumulating.
        assert_eq!(c.pending(P2, Hand::Left), 2);

        let rest = c.handle_event(DeviceEvent::button_up(P2, L, 1_100));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].instance.left().unwrap(), &[sample(4.0), sample(5.0)]);
    }

    // ── routing ───────────────────────────────────────────────────────────
    #[test]
    fn players_are_independent() {
        let mut c = coalescer(0.5, 128);
        let out = feed(&mut c, vec![
            DeviceEvent::button_down(P1, L, 1_000),
            DeviceEvent::button_down(P2, L, 1_000),
            DeviceEvent::data(P1, L, sample(1.0), 1_010),
            DeviceEvent::data(P2, L, sample(2.0), 1_010),
            DeviceEvent::button_up(P2, L, 1_020),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].player, P2);
        assert_eq!(c.pending(P1, Hand::Left), 1);
    }

    #[test]
    fn headset_and_ringmaster_are_dropped() {
        let mut c = coalescer(0.5, 128);
        let out = feed(&mut c, vec![
            DeviceEvent::button_down(Entity::Ringmaster, L, 1_000),
            DeviceEvent::data(Entity::Ringmaster, L, sample(1.0), 1_010),
            DeviceEvent::data(P1, DeviceKind::Headset, sample(1.0), 1_010),
            DeviceEvent::button_up(Entity::Ringmaster, L, 1_020),
        ]);
        assert!(out.is_empty());
    }

    // ── release timeout ───────────────────────────────────────────────────
    #[test]
    fn stale_glove_is_released() {
        let cfg = CoalescerConfig::default().release_timeout_ms(800);
        let mut c = Coalescer::new(cfg, 0);
        let t0 = Instant::now();
        c.handle_event_at(DeviceEvent::button_down(P1, R, 0), t0);
        c.handle_event_at(DeviceEvent::data(P1, R, sample(1.0), 10), t0);

        assert!(c.release_stale(t0 + Duration::from_millis(500)).is_empty());
        let out = c.release_stale(t0 + Duration::from_millis(900));
        assert_eq!(out.len(), 1);
        assert!(!c.is_pressed(P1, Hand::Right));
    }

    #[test]
    fn stale_glove_waits_for_pressed_partner() {
        let cfg = CoalescerConfig::default().release_timeout_ms(800);
        let mut c = Coalescer::new(cfg, 0);
        let t0 = Instant::now();
        c.handle_event_at(DeviceEvent::button_down(P1, L, 0), t0);
        c.handle_event_at(DeviceEvent::data(P1, L, sample(1.0), 0), t0);
        c.handle_event_at(DeviceEvent::button_down(P1, R, 0), t0 + Duration::from_millis(850));

        assert!(c.release_stale(t0 + Duration::from_millis(900)).is_empty());
        assert!(!c.is_pressed(P1, Hand::Left));
        assert_eq!(c.pending(P1, Hand::Left), 1);

        // Held samples go out with the partner's release; the released
        // glove is not timed out again meanwhile.
        assert!(c.release_stale(t0 + Duration::from_millis(1_600)).is_empty());
        c.handle_event_at(DeviceEvent::data(P1, R, sample(2.0), 5), t0 + Duration::from_millis(1_600));
        let out = c.handle_event_at(DeviceEvent::button_up(P1, R, 20), t0 + Duration::from_millis(1_700));
        assert_eq!(out.len(), 1);
        assert!(out[0].instance.has_left() && out[0].instance.has_right());
    }

    #[test]
    fn stuck_glove_without_data_is_released() {
        let cfg = CoalescerConfig::default().release_timeout_ms(800);
        let mut c = Coalescer::new(cfg, 0);
        let t0 = Instant::now();
        let at = |ms: u64| t0 + Duration::from_millis(ms);
        c.handle_event_at(DeviceEvent::button_down(P1, L, 0), t0);

        assert!(c.release_stale(at(2_000)).is_empty());
        assert!(!c.is_pressed(P1, Hand::Left));

        let out: Vec<_> = [
            DeviceEvent::button_down(P1, R, 3_000),
            DeviceEvent::data(P1, R, sample(1.0), 3_010),
            DeviceEvent::data(P1, R, sample(2.0), 3_020),
            DeviceEvent::button_up(P1, R, 3_030),
        ]
        .into_iter()
        .flat_map(|e| c.handle_event_at(e, at(2_100)))
        .collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].instance.right().unwrap(), &[sample(1.0), sample(2.0)]);
        assert_eq!(c.pending(P1, Hand::Right), 0);
    }

    #[test]
    fn glove_held_past_overflow_still_times_out() {
        let cfg = CoalescerConfig::default().buffer_capacity(2).release_timeout_ms(800);
        let mut c = Coalescer::new(cfg, 0);
        let t0 = Instant::now();
        c.handle_event_at(DeviceEvent::button_down(P2, L, 0), t0);
        c.handle_event_at(DeviceEvent::data(P2, L, sample(1.0), 10), t0);
        let full = c.handle_event_at(DeviceEvent::data(P2, L, sample(2.0), 20), t0);
        assert_eq!(full.len(), 1);
        c.handle_event_at(DeviceEvent::data(P2, L, sample(3.0), 30), t0);

        let out = c.release_stale(t0 + Duration::from_millis(900));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].instance.left().unwrap(), &[sample(3.0)]);
        assert!(!c.is_pressed(P2, Hand::Left));
    }
}
