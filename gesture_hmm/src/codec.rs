//! Big-endian byte encoding of a [`GaussianHmm`].
//!
//! ```text
//! model := states:u32 width:u32
//!          initial:f64*states
//!          transition:f64*(states*states)      row-major
//!          (mean:f64*width covariance:f64*(width*width))*states
//! ```
//!
//! `f64`s are written as their IEEE-754 bit pattern, so a decoded model is
//! bit-for-bit the encoded one.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::gaussian::Gaussian;
use crate::hmm::GaussianHmm;

/// Upper bound on either dimension accepted by the decoder.
pub const MAX_DIMENSION: usize = 64;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum DecodeError {
    #[error("truncated reading {field}: need {needed} bytes, {remaining} left")]
    Truncated { field: &'static str, needed: usize, remaining: usize },
    #[error("{field} = {value} is out of range")]
    InvalidDimension { field: &'static str, value: u32 },
    #[error("{field} entry {index} is not a probability ({value})")]
    InvalidProbability { field: &'static str, index: usize, value: f64 },
    #[error("state {state} emission is not a valid Gaussian")]
    InvalidEmission { state: usize },
}

// ════════════════════════════════════════════════════════════════════════════
// Reader
// ════════════════════════════════════════════════════════════════════════════

/// Cursor over a byte slice with big-endian primitive reads.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize { self.buf.len() - self.pos }
    pub fn is_empty(&self) -> bool { self.remaining() == 0 }
    pub fn position(&self) -> usize { self.pos }

    pub fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated { field, needed: n, remaining: self.remaining() });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.array::<1>(field)?[0])
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array(field)?))
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    pub fn f64(&mut self, field: &'static str) -> Result<f64, DecodeError> {
        Ok(f64::from_be_bytes(self.array(field)?))
    }

    fn f64s(&mut self, n: usize, field: &'static str) -> Result<Vec<f64>, DecodeError> {
        (0..n).map(|_| self.f64(field)).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Encode / decode
// ════════════════════════════════════════════════════════════════════════════

pub fn encode_hmm(hmm: &GaussianHmm, out: &mut Vec<u8>) {
    let n = hmm.num_states();
    out.extend_from_slice(&(n as u32).to_be_bytes());
    out.extend_from_slice(&(hmm.width() as u32).to_be_bytes());

    for p in hmm.initial().iter() {
        out.extend_from_slice(&p.to_be_bytes());
    }
    // nalgebra is column-major; write rows.
    for i in 0..n {
        for j in 0..n {
            out.extend_from_slice(&hmm.transition()[(i, j)].to_be_bytes());
        }
    }
    for g in hmm.states() {
        for v in g.mean().iter() {
            out.extend_from_slice(&v.to_be_bytes());
        }
        let cov = g.covariance();
        for i in 0..cov.nrows() {
            for j in 0..cov.ncols() {
                out.extend_from_slice(&cov[(i, j)].to_be_bytes());
            }
        }
    }
}

fn dimension(r: &mut ByteReader<'_>, field: &'static str) -> Result<usize, DecodeError> {
    let value = r.u32(field)?;
    if value == 0 || value as usize > MAX_DIMENSION {
        return Err(DecodeError::InvalidDimension { field, value });
    }
    Ok(value as usize)
}

fn check_probabilities(values: &[f64], field: &'static str) -> Result<(), DecodeError> {
    match values.iter().position(|p| !(0.0..=1.0).contains(p)) {
        Some(index) => Err(DecodeError::InvalidProbability { field, index, value: values[index] }),
        None => Ok(()),
    }
}

pub fn decode_hmm(r: &mut ByteReader<'_>) -> Result<GaussianHmm, DecodeError> {
    let n = dimension(r, "states")?;
    let w = dimension(r, "width")?;

    let body = 8 * (n + n * n + n * (w + w * w));
    if body > r.remaining() {
        return Err(DecodeError::Truncated { field: "model body", needed: body, remaining: r.remaining() });
    }

    let initial = r.f64s(n, "initial")?;
    check_probabilities(&initial, "initial")?;
    let transition = r.f64s(n * n, "transition")?;
    check_probabilities(&transition, "transition")?;

    let mut states = Vec::with_capacity(n);
    for state in 0..n {
        let mean = DVector::from_vec(r.f64s(w, "mean")?);
        let cov = DMatrix::from_row_slice(w, w, &r.f64s(w * w, "covariance")?);
        states.push(Gaussian::new(mean, cov).ok_or(DecodeError::InvalidEmission { state })?);
    }

    GaussianHmm::new(
        DVector::from_vec(initial),
        DMatrix::from_row_slice(n, n, &transition),
        states,
    )
    .ok_or(DecodeError::InvalidDimension { field: "states", value: n as u32 })
}
