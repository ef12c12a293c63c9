//! Engine persistence.
//!
//! ```text
//! engine  := "GENG" version:u16 count:u32 entry*count
//! entry   := "GMOD" len:u32 payload[len]
//! payload := name_len:u16 name:utf8 trained:u8 [model]
//! ```
//!
//! All integers are big-endian. `model` is present only when `trained` is
//! 1 and uses the layout of [`gesture_hmm::encode_hmm`]. Entries are
//! identified by gesture name, so registry reordering does not invalidate a
//! saved engine.
//!
//! Loading parses and validates the whole stream before touching the
//! engine; a rejected stream leaves every model as it was.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use gesture_hmm::{decode_hmm, encode_hmm, ByteReader, DecodeError, GestureModel, ShapeMismatch};
use glove_data::GestureType;
use thiserror::Error;
use tracing::{debug, info};

use crate::engine::Engine;

pub const ENGINE_MAGIC: [u8; 4] = *b"GENG";
pub const ENTRY_MAGIC:  [u8; 4] = *b"GMOD";
pub const ENGINE_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum EngineFormatError {
    #[error("{context}: bad magic {found:?}, expected {expected:?}")]
    BadMagic { context: String, expected: [u8; 4], found: [u8; 4] },
    #[error("unsupported engine version {0}")]
    UnsupportedVersion(u16),
    #[error("{context}: {source}")]
    Truncated { context: String, source: DecodeError },
    #[error("entry {index}: gesture name is not UTF-8")]
    NameEncoding { index: usize },
    #[error("entry {index}: unknown gesture {name:?}")]
    UnknownGesture { index: usize, name: String },
    #[error("entry {index}: {gesture} already appeared in this file")]
    DuplicateGesture { index: usize, gesture: GestureType },
    #[error("entry {index} ({gesture}): trained flag is {flag}, expected 0 or 1")]
    InvalidFlag { index: usize, gesture: GestureType, flag: u8 },
    #[error("entry {index} ({gesture}): {source}")]
    Model { index: usize, gesture: GestureType, source: DecodeError },
    #[error("entry {index}: {source}")]
    Shape { index: usize, source: ShapeMismatch },
    #[error("entry {index} ({gesture}): {extra} unread bytes at end of entry")]
    TrailingEntryBytes { index: usize, gesture: GestureType, extra: usize },
    #[error("{0} bytes after the last entry")]
    TrailingData(usize),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine I/O: {0}")]
    Io(#[from] io::Error),
    #[error("engine format: {0}")]
    Format(#[from] EngineFormatError),
}

// ════════════════════════════════════════════════════════════════════════════
// Write
// ════════════════════════════════════════════════════════════════════════════

fn entry_payload(gesture: GestureType, model: &GestureModel) -> Vec<u8> {
    let name = gesture.name().as_bytes();
    let mut out = Vec::with_capacity(2 + name.len() + 1);
    out.extend_from_slice(&(name.len() as u16).to_be_bytes());
    out.extend_from_slice(name);
    match model.hmm() {
        Some(hmm) => {
            out.push(1);
            encode_hmm(hmm, &mut out);
        }
        None => out.push(0),
    }
    out
}

/// Serialise every model of `engine`, trained or not.
pub fn engine_to_bytes(engine: &Engine) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&ENGINE_MAGIC);
    out.extend_from_slice(&ENGINE_VERSION.to_be_bytes());
    out.extend_from_slice(&(GestureType::ALL.len() as u32).to_be_bytes());

    for gesture in GestureType::ALL {
        let payload = engine.with_model(gesture, |m| entry_payload(gesture, m));
        out.extend_from_slice(&ENTRY_MAGIC);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&payload);
    }
    out
}

pub fn write_engine<W: Write>(engine: &Engine, mut w: W) -> Result<(), EngineError> {
    w.write_all(&engine_to_bytes(engine))?;
    w.flush()?;
    Ok(())
}

pub fn save_to_path(engine: &Engine, path: impl AsRef<Path>) -> Result<(), EngineError> {
    let path = path.as_ref();
    write_engine(engine, BufWriter::new(File::create(path)?))?;
    info!(path = %path.display(), "engine saved");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Read
// ════════════════════════════════════════════════════════════════════════════

fn magic(r: &mut ByteReader<'_>, expected: [u8; 4], context: impl Fn() -> String) -> Result<(), EngineFormatError> {
    let raw = r
        .take(4, "magic")
        .map_err(|source| EngineFormatError::Truncated { context: context(), source })?;
    let mut found = [0u8; 4];
    found.copy_from_slice(raw);
    if found != expected {
        return Err(EngineFormatError::BadMagic { context: context(), expected, found });
    }
    Ok(())
}

fn parse_entry(index: usize, payload: &[u8]) -> Result<GestureModel, EngineFormatError> {
    let truncated = |source| EngineFormatError::Truncated { context: format!("entry {index}"), source };
    let mut r = ByteReader::new(payload);

    let name_len = r.u16("name length").map_err(truncated)? as usize;
    let raw_name = r.take(name_len, "name").map_err(truncated)?;
    let name = std::str::from_utf8(raw_name).map_err(|_| EngineFormatError::NameEncoding { index })?;
    let gesture = GestureType::from_name(name)
        .ok_or_else(|| EngineFormatError::UnknownGesture { index, name: name.to_string() })?;

    let model = match r.u8("trained flag").map_err(truncated)? {
        0 => GestureModel::new(gesture),
        1 => {
            let hmm = decode_hmm(&mut r).map_err(|source| EngineFormatError::Model { index, gesture, source })?;
            GestureModel::with_hmm(gesture, hmm).map_err(|source| EngineFormatError::Shape { index, source })?
        }
        flag => return Err(EngineFormatError::InvalidFlag { index, gesture, flag }),
    };

    if !r.is_empty() {
        return Err(EngineFormatError::TrailingEntryBytes { index, gesture, extra: r.remaining() });
    }
    Ok(model)
}

/// Parse a complete engine stream into models, in file order, without
/// touching any engine.
pub fn parse_engine(bytes: &[u8]) -> Result<Vec<GestureModel>, EngineFormatError> {
    let header = |source| EngineFormatError::Truncated { context: "engine header".into(), source };
    let mut r = ByteReader::new(bytes);

    magic(&mut r, ENGINE_MAGIC, || "engine header".into())?;
    let version = r.u16("version").map_err(header)?;
    if version != ENGINE_VERSION {
        return Err(EngineFormatError::UnsupportedVersion(version));
    }
    let count = r.u32("entry count").map_err(header)? as usize;

    let mut models: Vec<GestureModel> = Vec::with_capacity(count.min(GestureType::ALL.len()));
    for index in 0..count {
        let truncated = |source| EngineFormatError::Truncated { context: format!("entry {index}"), source };
        magic(&mut r, ENTRY_MAGIC, || format!("entry {index}"))?;
        let len = r.u32("entry length").map_err(truncated)? as usize;
        let payload = r.take(len, "entry payload").map_err(truncated)?;

        let model = parse_entry(index, payload)?;
        if models.iter().any(|m| m.gesture() == model.gesture()) {
            return Err(EngineFormatError::DuplicateGesture { index, gesture: model.gesture() });
        }
        debug!(index, gesture = %model.gesture(), trained = model.is_trained(), "engine entry parsed");
        models.push(model);
    }

    if !r.is_empty() {
        return Err(EngineFormatError::TrailingData(r.remaining()));
    }
    Ok(models)
}

/// Load a saved engine into `engine`. Types absent from the stream keep
/// their current model.
pub fn read_engine<R: Read>(engine: &Engine, mut r: R) -> Result<(), EngineError> {
    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes)?;
    let models = parse_engine(&bytes)?;

    let count = models.len();
    for model in models {
        engine.install(model);
    }
    info!(entries = count, "engine loaded");
    Ok(())
}

pub fn load_from_path(engine: &Engine, path: impl AsRef<Path>) -> Result<(), EngineError> {
    read_engine(engine, BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::RecognizerManager;
    use glove_data::synthetic::{Stroke, SyntheticMotion};
    use glove_data::Handedness;

    fn trained_manager() -> RecognizerManager {
        let m = RecognizerManager::default();
        let jabs = SyntheticMotion::new(Stroke::Jab, Handedness::Left).data_set(6, 1).unwrap();
        let booms = SyntheticMotion::new(Stroke::Chop, Handedness::Both).data_set(6, 2).unwrap();
        m.train(GestureType::LeftJab, &jabs).unwrap();
        m.train(GestureType::SonicBoom, &booms).unwrap();
        m
    }

    // Offset of entry `n`'s "GMOD" tag.
    fn entry_offset(bytes: &[u8], n: usize) -> usize {
        let mut pos = 10;
        for _ in 0..n {
            let len = u32::from_be_bytes(bytes[pos + 4..pos + 8].try_into().unwrap()) as usize;
            pos += 8 + len;
        }
        pos
    }

    // ── layout ────────────────────────────────────────────────────────────
    #[test]
    fn header_layout() {
        let bytes = engine_to_bytes(&Engine::new());
        assert_eq!(&bytes[0..4], b"GENG");
        assert_eq!(&bytes[4..6], &1u16.to_be_bytes());
        assert_eq!(&bytes[6..10], &(GestureType::ALL.len() as u32).to_be_bytes());
        assert_eq!(&bytes[10..14], b"GMOD");

        // First entry: "LEFT_BLOCK", untrained.
        let name = b"LEFT_BLOCK";
        assert_eq!(&bytes[14..18], &(2 + name.len() as u32 + 1).to_be_bytes());
        assert_eq!(&bytes[18..20], &(name.len() as u16).to_be_bytes());
        assert_eq!(&bytes[20..30], name);
        assert_eq!(bytes[30], 0);
    }

    // ── round trip ────────────────────────────────────────────────────────
    #[test]
    fn round_trip_preserves_scores() {
        let original = trained_manager();
        let mut buf = Vec::new();
        original.save(&mut buf).unwrap();

        let restored = RecognizerManager::default();
        restored.load(buf.as_slice()).unwrap();

        for g in GestureType::ALL {
            assert_eq!(restored.is_trained(g), original.is_trained(g), "{g}");
        }
        let unseen = SyntheticMotion::new(Stroke::Jab, Handedness::Left).instance(300).unwrap();
        let a = original.engine().with_model(GestureType::LeftJab, |m| m.log_score(&unseen));
        let b = restored.engine().with_model(GestureType::LeftJab, |m| m.log_score(&unseen));
        assert_eq!(a, b);
        assert_eq!(original.recognize(&unseen), restored.recognize(&unseen));
    }

    #[test]
    fn untrained_entries_overwrite_trained_models() {
        let blank = engine_to_bytes(&Engine::new());
        let m = trained_manager();
        m.load(blank.as_slice()).unwrap();
        assert!(!m.is_trained(GestureType::LeftJab));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.bin");
        trained_manager().save_to_path(&path).unwrap();

        let restored = RecognizerManager::default();
        restored.load_from_path(&path).unwrap();
        assert!(restored.is_trained(GestureType::SonicBoom));
    }

    // ── rejection leaves the engine alone ─────────────────────────────────
    fn assert_rejected_untouched(bytes: &[u8]) -> EngineFormatError {
        let m = trained_manager();
        let err = match m.load(bytes) {
            Err(EngineError::Format(e)) => e,
            other => panic!("expected a format error, got {other:?}"),
        };
        assert!(m.is_trained(GestureType::LeftJab));
        assert!(m.is_trained(GestureType::SonicBoom));
        assert!(!m.is_trained(GestureType::Hadouken));
        err
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = engine_to_bytes(&Engine::new());
        bytes[0] = b'X';
        assert!(matches!(assert_rejected_untouched(&bytes), EngineFormatError::BadMagic { .. }));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut bytes = engine_to_bytes(&Engine::new());
        bytes[4..6].copy_from_slice(&2u16.to_be_bytes());
        assert!(matches!(assert_rejected_untouched(&bytes), EngineFormatError::UnsupportedVersion(2)));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let mut buf = Vec::new();
        trained_manager().save(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(assert_rejected_untouched(&buf), EngineFormatError::Truncated { .. }));
    }

    #[test]
    fn unknown_gesture_name_is_rejected() {
        let mut bytes = engine_to_bytes(&Engine::new());
        // Same length as LEFT_BLOCK.
        bytes[20..30].copy_from_slice(b"LEFT_PUNCH");
        match assert_rejected_untouched(&bytes) {
            EngineFormatError::UnknownGesture { index: 0, name } => assert_eq!(name, "LEFT_PUNCH"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let mut bytes = engine_to_bytes(&Engine::new());
        bytes[30] = 7;
        assert!(matches!(
            assert_rejected_untouched(&bytes),
            EngineFormatError::InvalidFlag { index: 0, gesture: GestureType::LeftBlock, flag: 7 }
        ));
    }

    #[test]
    fn corrupt_model_is_rejected_with_entry_name() {
        let mut buf = Vec::new();
        trained_manager().save(&mut buf).unwrap();
        let at = entry_offset(&buf, GestureType::LeftJab as usize);
        // tag, len, name_len, name, flag, then the state count.
        let states_at = at + 8 + 2 + "LEFT_JAB".len() + 1;
        buf[states_at..states_at + 4].copy_from_slice(&9u32.to_be_bytes());
        match assert_rejected_untouched(&buf) {
            EngineFormatError::Model { gesture, .. } | EngineFormatError::Shape { source: ShapeMismatch { gesture, .. }, .. } => {
                assert_eq!(gesture, GestureType::LeftJab)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = engine_to_bytes(&Engine::new());
        bytes.push(0);
        assert!(matches!(assert_rejected_untouched(&bytes), EngineFormatError::TrailingData(1)));
    }

    #[test]
    fn duplicate_entry_is_rejected() {
        let bytes = engine_to_bytes(&Engine::new());
        let first_end = entry_offset(&bytes, 1);
        let mut doubled = bytes[..first_end].to_vec();
        doubled.extend_from_slice(&bytes[10..first_end]);
        doubled[6..10].copy_from_slice(&2u32.to_be_bytes());
        assert!(matches!(
            assert_rejected_untouched(&doubled),
            EngineFormatError::DuplicateGesture { index: 1, gesture: GestureType::LeftBlock }
        ));
    }

    #[test]
    fn partial_engine_only_replaces_listed_types() {
        let bytes = engine_to_bytes(&Engine::new());
        let first_end = entry_offset(&bytes, 1);
        let mut one = bytes[..first_end].to_vec();
        one[6..10].copy_from_slice(&1u32.to_be_bytes());

        let m = trained_manager();
        m.load(one.as_slice()).unwrap();
        assert!(m.is_trained(GestureType::LeftJab));
    }
}
