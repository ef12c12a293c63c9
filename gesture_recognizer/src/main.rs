//! Demo: train a handful of gestures from synthetic motion, persist and
//! reload the engine, then replay recorded moves through the coalescer and
//! recognizer threads.
//!
//! Usage: `gesture_demo [config.toml]`

use std::sync::mpsc;
use std::sync::Arc;

use anyhow::Context;
use gesture_recognizer::{Pipeline, PipelineConfig, RecognizerManager};
use glove_coalescer::replay;
use glove_data::synthetic::{Stroke, SyntheticMotion};
use glove_data::{Entity, GestureType, Handedness};
use tracing::{info, warn};

const TRAINING_REPETITIONS: usize = 10;

fn catalogue() -> Vec<(GestureType, SyntheticMotion)> {
    vec![
        (GestureType::LeftJab,      SyntheticMotion::new(Stroke::Jab, Handedness::Left)),
        (GestureType::RightJab,     SyntheticMotion::new(Stroke::Jab, Handedness::Right)),
        (GestureType::LeftUppercut, SyntheticMotion::new(Stroke::Uppercut, Handedness::Left).peak(30_000.0)),
        (GestureType::RightChop,    SyntheticMotion::new(Stroke::Chop, Handedness::Right)),
        (GestureType::Hadouken,     SyntheticMotion::new(Stroke::Jab, Handedness::Both)),
        (GestureType::SonicBoom,    SyntheticMotion::new(Stroke::Chop, Handedness::Both)),
    ]
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::load(&path).with_context(|| format!("loading config {path}"))?,
        None => PipelineConfig::default(),
    };

    // ── train ─────────────────────────────────────────────────────────────
    let trainer = RecognizerManager::new(config.recognizer.clone());
    for (seed, (gesture, motion)) in catalogue().into_iter().enumerate() {
        let data = motion
            .data_set(TRAINING_REPETITIONS, seed as u64 * 100)
            .with_context(|| format!("synthesising {gesture}"))?;
        if let Err(e) = trainer.train(gesture, &data) {
            warn!("{e}");
        }
    }

    // ── persist and reload ────────────────────────────────────────────────
    let path = std::env::temp_dir().join("gesture_demo_engine.bin");
    trainer.save_to_path(&path).with_context(|| format!("saving {}", path.display()))?;
    let manager = RecognizerManager::new(config.recognizer.clone());
    manager.load_from_path(&path).with_context(|| format!("loading {}", path.display()))?;
    let manager = Arc::new(manager);

    let jab = SyntheticMotion::new(Stroke::Jab, Handedness::Left).instance(9_999)?;
    println!("{}", manager.recognize_with_full_result(&jab));

    // ── replay ────────────────────────────────────────────────────────────
    let (tx, rx) = mpsc::channel();
    let pipeline = Pipeline::spawn(config.coalescer.clone(), 0, Arc::clone(&manager), rx)
        .context("starting pipeline")?;

    let moves = [
        (Entity::Player1, SyntheticMotion::new(Stroke::Jab, Handedness::Left)),
        (Entity::Player2, SyntheticMotion::new(Stroke::Chop, Handedness::Right)),
        (Entity::Player1, SyntheticMotion::new(Stroke::Jab, Handedness::Both)),
        (Entity::Player2, SyntheticMotion::new(Stroke::Uppercut, Handedness::Left).peak(30_000.0)),
        // Too gentle to count as a jab.
        (Entity::Player1, SyntheticMotion::new(Stroke::Jab, Handedness::Left).peak(3_000.0)),
    ];
    let mut start_ms = 1_000;
    for (i, (player, motion)) in moves.iter().enumerate() {
        let inst = motion.instance(10_000 + i as u64)?;
        for event in replay(*player, &inst, start_ms) {
            tx.send(event).context("coalescer stopped early")?;
        }
        start_ms += 2_000;
    }
    drop(tx);

    let recognized = pipeline.join();
    info!(sent = moves.len(), recognized = recognized.len(), "replay finished");
    for r in &recognized {
        println!("  {:<8} {:<16} {:?}", r.player.name(), r.gesture.name(), r.action);
    }
    Ok(())
}
