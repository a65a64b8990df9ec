/* ------------------------------------------------------------------ */
/* Autoregressive sampler: temperature + unknown-token mask           */
/* ------------------------------------------------------------------ */
//
// One generation run is an explicit state machine:
//
//   Idle ──start──▶ Stepping ──(step × step_count)──▶ Done
//
// Stepping owns the carried hidden state and the accumulated output.
// The hidden state is replaced, never merged, after every step, so
// step k+1 cannot begin before step k finishes. The only source of
// nondeterminism is the categorical draw, which consumes the single
// injected RandomSource — a fixed seed reproduces a run bit-for-bit.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::model::SequenceModel;
use crate::rng::RandomSource;
use crate::vocab::Vocabulary;

/// Additive mask: -inf at the unknown id, 0 elsewhere. Added to raw
/// scores before the softmax so the unknown token can never be drawn —
/// it can still be *consumed* as input, encoding handles that.
pub fn prediction_mask(vocab: &Vocabulary) -> Vec<f32> {
    let mut mask = vec![0.0f32; vocab.len()];
    mask[vocab.unk_id()] = f32::NEG_INFINITY;
    mask
}

/// Temperature-scaled, masked softmax. Temperature < 1 sharpens toward
/// the top score, > 1 flattens; masked entries come out exactly 0.
pub fn masked_distribution(scores: &[f32], temperature: f32, mask: &[f32]) -> Vec<f32> {
    let z: Vec<f32> = scores
        .iter()
        .zip(mask.iter())
        .map(|(&s, &m)| s / temperature + m)
        .collect();
    let mx = z.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut probs: Vec<f32> = z.iter().map(|&v| (v - mx).exp()).collect();
    let sum: f32 = probs.iter().sum();
    let inv = 1.0 / sum;
    for p in probs.iter_mut() {
        *p *= inv;
    }
    probs
}

/// One categorical draw: walk the cumulative distribution, falling
/// back to the mode if rounding leaves the draw unconsumed.
fn draw<R: RandomSource>(probs: &[f32], rng: &mut R) -> usize {
    let mut mode = 0usize;
    for (i, &p) in probs.iter().enumerate() {
        if p > probs[mode] {
            mode = i;
        }
    }
    let mut r = rng.uniform() as f32;
    for (i, &p) in probs.iter().enumerate() {
        if p > 0.0 {
            r -= p;
            if r <= 0.0 {
                return i;
            }
        }
    }
    mode
}

enum Phase<S> {
    Idle,
    Stepping {
        hidden: Option<S>,
        /// Ids not yet fed to the model: the whole seed before the
        /// first step, the single newest token afterwards.
        pending: Vec<usize>,
        output: String,
        remaining: usize,
        temperature: f32,
    },
    Done {
        output: String,
    },
}

pub struct Sampler<'m, M: SequenceModel, R: RandomSource> {
    model: &'m M,
    vocab: &'m Vocabulary,
    mask: Vec<f32>,
    rng: R,
    phase: Phase<M::State>,
}

impl<'m, M: SequenceModel, R: RandomSource> Sampler<'m, M, R> {
    pub fn new(model: &'m M, vocab: &'m Vocabulary, rng: R) -> Self {
        Self { model, vocab, mask: prediction_mask(vocab), rng, phase: Phase::Idle }
    }

    /// Idle → Stepping (or straight to Done when step_count is zero).
    /// Fails fast on a non-positive or NaN temperature; no state is
    /// created on failure.
    pub fn start(&mut self, seed_text: &str, step_count: usize, temperature: f32) -> Result<()> {
        if matches!(self.phase, Phase::Stepping { .. }) {
            return Err(Error::Phase("start() while a run is in progress"));
        }
        if !(temperature > 0.0) || !temperature.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "temperature must be a positive finite number, got {temperature}"
            )));
        }

        let mut pending = self.vocab.encode(seed_text);
        if pending.is_empty() {
            // an empty seed still has to feed the model something
            pending.push(self.vocab.unk_id());
        }
        let output = seed_text.to_string();

        self.phase = if step_count == 0 {
            Phase::Done { output }
        } else {
            Phase::Stepping { hidden: None, pending, output, remaining: step_count, temperature }
        };
        Ok(())
    }

    /// One generation step: forward the pending fragment with the
    /// carried state, scale and mask the last position's scores, draw
    /// one token, append it, carry the new state.
    pub fn step(&mut self) -> Result<()> {
        let (hidden, pending, mut output, remaining, temperature) =
            match std::mem::replace(&mut self.phase, Phase::Idle) {
                Phase::Stepping { hidden, pending, output, remaining, temperature } => {
                    (hidden, pending, output, remaining, temperature)
                }
                other => {
                    self.phase = other;
                    return Err(Error::Phase("step() outside a run"));
                }
            };

        // a model failure leaves the machine Idle; the run is unrecoverable
        let (scores, new_state) = self.model.forward(&pending, hidden.as_ref())?;
        let last = scores
            .last()
            .ok_or(Error::Phase("model returned no scores for a non-empty input"))?;

        let probs = masked_distribution(last, temperature, &self.mask);
        let token = draw(&probs, &mut self.rng);
        self.vocab.append_token(&mut output, token);

        self.phase = if remaining == 1 {
            Phase::Done { output }
        } else {
            Phase::Stepping {
                hidden: Some(new_state),
                pending: vec![token],
                output,
                remaining: remaining - 1,
                temperature,
            }
        };
        Ok(())
    }

    /// Stop a run early, keeping whatever has been generated so far.
    pub fn cancel(&mut self) {
        if let Phase::Stepping { output, .. } = std::mem::replace(&mut self.phase, Phase::Idle) {
            self.phase = Phase::Done { output };
        }
    }

    pub fn is_stepping(&self) -> bool {
        matches!(self.phase, Phase::Stepping { .. })
    }

    /// Valid only in Done: the seed plus every generated token, joined
    /// by the granularity's own rule.
    pub fn result(&self) -> Result<&str> {
        match &self.phase {
            Phase::Done { output } => Ok(output),
            _ => Err(Error::Phase("result() before the run finished")),
        }
    }

    /// start + step loop + result. `stop` is checked between steps —
    /// steps are the only suspension points a run has.
    pub fn run(
        &mut self,
        seed_text: &str,
        step_count: usize,
        temperature: f32,
        stop: Option<&AtomicBool>,
    ) -> Result<String> {
        self.start(seed_text, step_count, temperature)?;
        while self.is_stepping() {
            if stop.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                self.cancel();
                break;
            }
            self.step()?;
        }
        self.result().map(str::to_string)
    }
}
