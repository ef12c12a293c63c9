//! # glove_coalescer
//!
//! Turns the interleaved per-device event stream coming off the gloves into
//! discrete [`PlayerGestureInstance`]s.
//!
//! Each player has one buffer and one button flag per glove. Pressing a
//! glove's button starts recording it; releasing it flushes the player's
//! buffers once the other glove is also released. Two gloves whose first
//! samples lie within the co-activation threshold become one two-handed
//! gesture, otherwise each glove yields its own one-handed gesture.
//!
//! ```rust
//! use glove_coalescer::{Coalescer, CoalescerConfig, DeviceEvent, DeviceKind};
//! use glove_data::{Entity, SensorSample};
//!
//! let mut c = Coalescer::new(CoalescerConfig::default(), 0);
//! let p1 = Entity::Player1;
//! c.handle_event(DeviceEvent::button_down(p1, DeviceKind::RightGlove, 0));
//! c.handle_event(DeviceEvent::data(p1, DeviceKind::RightGlove, SensorSample::from_accel(1.0, 0.0, 0.0), 20));
//! let out = c.handle_event(DeviceEvent::button_up(p1, DeviceKind::RightGlove, 40));
//! assert_eq!(out.len(), 1);
//! assert!(out[0].instance.has_right());
//! ```

pub mod config;
pub mod event;
pub mod coalescer;

pub use coalescer::Coalescer;
pub use config::CoalescerConfig;
pub use event::{replay, DeviceEvent, DeviceKind, EventKind};
pub use glove_data::PlayerGestureInstance;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

// ════════════════════════════════════════════════════════════════════════════
// Coalescer thread
// ════════════════════════════════════════════════════════════════════════════

/// Handle to a running coalescer thread.
pub struct CoalescerHandle {
    pub output: Receiver<PlayerGestureInstance>,
    pub stop:   Arc<AtomicBool>,
    pub thread: JoinHandle<()>,
}

impl CoalescerHandle {
    /// Ask the thread to exit; it notices within one poll interval.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Spawn the coalescer on its own thread.
///
/// The thread exits when the stop flag is set, when every sender of
/// `events` has been dropped, or when the output receiver is dropped.
pub fn spawn_coalescer(
    config:           CoalescerConfig,
    session_start_ms: u64,
    events:           Receiver<DeviceEvent>,
) -> io::Result<CoalescerHandle> {
    let (tx, output) = mpsc::sync_channel(config.output_capacity.max(1));
    let stop = Arc::new(AtomicBool::new(false));
    let poll = Duration::from_millis(config.poll_interval_ms.max(1));
    let coalescer = Coalescer::new(config, session_start_ms);

    let flag = Arc::clone(&stop);
    let thread = thread::Builder::new()
        .name("glove-coalescer".into())
        .spawn(move || coalescer_thread(coalescer, events, tx, flag, poll))?;

    Ok(CoalescerHandle { output, stop, thread })
}

fn coalescer_thread(
    mut coalescer: Coalescer,
    events:        Receiver<DeviceEvent>,
    output:        SyncSender<PlayerGestureInstance>,
    stop:          Arc<AtomicBool>,
    poll:          Duration,
) {
    info!("coalescer running");

    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        let produced = match events.recv_timeout(poll) {
            Ok(event) => {
                let mut out = coalescer.release_stale(now);
                out.extend(coalescer.handle_event_at(event, now));
                out
            }
            Err(RecvTimeoutError::Timeout) => coalescer.release_stale(now),
            Err(RecvTimeoutError::Disconnected) => {
                debug!("device event channel closed");
                break;
            }
        };

        for item in produced {
            match output.try_send(item) {
                Ok(()) => {}
                Err(TrySendError::Full(item)) => {
                    warn!(player = item.player.name(), "gesture queue full, dropping instance");
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!("gesture consumer disconnected, coalescer exiting");
                    return;
                }
            }
        }
    }

    info!("coalescer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use glove_data::{Entity, SensorSample};

    fn press_and_release(tx: &mpsc::Sender<DeviceEvent>, player: Entity, device: DeviceKind, t0: u64, n: u64) {
        tx.send(DeviceEvent::button_down(player, device, t0)).unwrap();
        for i in 0..n {
            let s = SensorSample::from_accel(i as f64, 0.0, 0.0);
            tx.send(DeviceEvent::data(player, device, s, t0 + i * 10)).unwrap();
        }
        tx.send(DeviceEvent::button_up(player, device, t0 + n * 10)).unwrap();
    }

    #[test]
    fn thread_emits_in_order_and_exits_on_disconnect() {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_coalescer(CoalescerConfig::default(), 0, rx).unwrap();

        press_and_release(&tx, Entity::Player1, DeviceKind::LeftGlove, 0, 5);
        press_and_release(&tx, Entity::Player2, DeviceKind::RightGlove, 100, 3);
        drop(tx);

        handle.thread.join().unwrap();
        let out: Vec<_> = handle.output.try_iter().collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].player, Entity::Player1);
        assert_eq!(out[0].instance.num_samples(), 5);
        assert_eq!(out[1].player, Entity::Player2);
        assert_eq!(out[1].instance.num_samples(), 3);
    }

    #[test]
    fn full_output_drops_instead_of_blocking() {
        let (tx, rx) = mpsc::channel();
        let cfg = CoalescerConfig::default().output_capacity(1);
        let handle = spawn_coalescer(cfg, 0, rx).unwrap();

        for k in 0..3 {
            press_and_release(&tx, Entity::Player1, DeviceKind::LeftGlove, k * 1_000, 2);
        }
        drop(tx);

        handle.thread.join().unwrap();
        assert_eq!(handle.output.try_iter().count(), 1);
    }

    #[test]
    fn stop_flag_ends_thread() {
        let (_tx, rx) = mpsc::channel::<DeviceEvent>();
        let cfg = CoalescerConfig::default().poll_interval_ms(5);
        let handle = spawn_coalescer(cfg, 0, rx).unwrap();
        handle.request_stop();
        handle.thread.join().unwrap();
    }
}
