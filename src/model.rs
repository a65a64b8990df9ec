/* ------------------------------------------------------------------ */
/* Sequence model: embedding → GRU → vocab projection (candle)        */
/* ------------------------------------------------------------------ */
//
// The sampler and training loop only ever see the SequenceModel
// contract below. Tensor math, autograd and the optimizer belong to
// candle; nothing numeric is hand-rolled here.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::rnn::{gru, GRUConfig, GRUState, GRU, RNN};
use candle_nn::{embedding, linear, AdamW, Embedding, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};

use crate::data::Batch;
use crate::error::{Error, Result};

/// The two operations the core consumes from a trained (or trainable)
/// recurrent model. `State` is the carried hidden memory; `forward`
/// replaces it wholesale on every call.
pub trait SequenceModel {
    type State;

    /// Run one batch-of-one forward pass over `ids`, starting from
    /// `state` (or the zero state when `None`). Returns one score
    /// vector per input position, plus the state after consuming the
    /// whole input.
    fn forward(&self, ids: &[usize], state: Option<&Self::State>) -> Result<(Vec<Vec<f32>>, Self::State)>;

    /// One optimizer step on a batch; returns the mean cross-entropy.
    fn train_step(&mut self, batch: &Batch<'_>) -> Result<f32>;
}

pub struct GruModel {
    device: Device,
    varmap: VarMap,
    embed: Embedding,
    gru: GRU,
    proj: Linear,
    opt: AdamW,
    vocab_size: usize,
    rnn_units: usize,
}

impl GruModel {
    pub fn new(vocab_size: usize, embed_dim: usize, rnn_units: usize, lr: f64, device: Device) -> Result<Self> {
        if vocab_size == 0 || embed_dim == 0 || rnn_units == 0 {
            return Err(Error::InvalidConfig("model dimensions must be positive".into()));
        }
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let embed = embedding(vocab_size, embed_dim, vb.pp("embed"))?;
        let gru = gru(embed_dim, rnn_units, GRUConfig::default(), vb.pp("gru"))?;
        let proj = linear(rnn_units, vocab_size, vb.pp("proj"))?;
        let opt = AdamW::new(varmap.all_vars(), ParamsAdamW { lr, ..Default::default() })?;
        Ok(Self { device, varmap, embed, gru, proj, opt, vocab_size, rnn_units })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn param_count(&self) -> usize {
        self.varmap
            .all_vars()
            .iter()
            .map(|v| v.as_tensor().elem_count())
            .sum()
    }

    /// Mean cross-entropy on a batch, without touching the weights.
    pub fn evaluate(&self, batch: &Batch<'_>) -> Result<f32> {
        let (logits, targets) = self.batch_logits(batch)?;
        let loss = candle_nn::loss::cross_entropy(&logits, &targets)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    // ── Checkpointing (safetensors via candle's VarMap) ──────────────

    pub fn save(&self, path: &Path) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path)?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn ids_tensor(&self, rows: &[&[usize]]) -> Result<Tensor> {
        let b = rows.len();
        let t = rows.first().map_or(0, |r| r.len());
        let flat: Vec<u32> = rows.iter().flat_map(|r| r.iter().map(|&id| id as u32)).collect();
        Ok(Tensor::from_vec(flat, (b, t), &self.device)?)
    }

    /// Embed → GRU over the sequence → flatten positions → project.
    fn batch_logits(&self, batch: &Batch<'_>) -> Result<(Tensor, Tensor)> {
        let b = batch.len();
        let t = batch.window_len();
        let inputs = self.ids_tensor(&batch.inputs)?;
        let flat_targets: Vec<u32> = batch
            .targets
            .iter()
            .flat_map(|r| r.iter().map(|&id| id as u32))
            .collect();
        let targets = Tensor::from_vec(flat_targets, b * t, &self.device)?;

        let emb = self.embed.forward(&inputs)?; // (b, t, e)
        let init = self.gru.zero_state(b)?;
        let states = self.gru.seq_init(&emb, &init)?;
        let hidden = self.gru.states_to_tensor(&states)?; // (b, t, h)
        let logits = self.proj.forward(&hidden.reshape((b * t, self.rnn_units))?)?;
        Ok((logits, targets))
    }
}

impl SequenceModel for GruModel {
    type State = GRUState;

    fn forward(&self, ids: &[usize], state: Option<&GRUState>) -> Result<(Vec<Vec<f32>>, GRUState)> {
        if ids.is_empty() {
            return Err(Error::InvalidConfig("forward needs at least one input id".into()));
        }
        let t = ids.len();
        let flat: Vec<u32> = ids.iter().map(|&id| id as u32).collect();
        let input = Tensor::from_vec(flat, (1, t), &self.device)?;
        let emb = self.embed.forward(&input)?; // (1, t, e)

        let init = match state {
            Some(s) => s.clone(),
            None => self.gru.zero_state(1)?,
        };
        let states = self.gru.seq_init(&emb, &init)?;
        let last = match states.last() {
            Some(s) => s.clone(),
            None => init,
        };

        let hidden = self.gru.states_to_tensor(&states)?; // (1, t, h)
        let logits = self.proj.forward(&hidden.reshape((t, self.rnn_units))?)?;
        let scores = logits.to_vec2::<f32>()?;
        Ok((scores, last))
    }

    fn train_step(&mut self, batch: &Batch<'_>) -> Result<f32> {
        let (logits, targets) = self.batch_logits(batch)?;
        let loss = candle_nn::loss::cross_entropy(&logits, &targets)?;
        self.opt.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_model() -> GruModel {
        GruModel::new(5, 4, 8, 1e-2, Device::Cpu).unwrap()
    }

    #[test]
    fn forward_returns_one_score_row_per_position() {
        let model = tiny_model();
        let (scores, _state) = model.forward(&[1, 2, 3], None).unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores.iter().all(|row| row.len() == 5));
    }

    #[test]
    fn hidden_state_carries_between_calls() {
        let model = tiny_model();
        // one call over [1, 2] must match [1] then [2] with carried state
        let (full, _) = model.forward(&[1, 2], None).unwrap();
        let (_, state) = model.forward(&[1], None).unwrap();
        let (cont, _) = model.forward(&[2], Some(&state)).unwrap();
        for (a, b) in full[1].iter().zip(cont[0].iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn train_step_returns_finite_loss() {
        let mut model = tiny_model();
        let input: Vec<usize> = vec![0, 1, 2, 3];
        let target: Vec<usize> = vec![1, 2, 3, 4];
        let batch = Batch {
            inputs: vec![&input[..], &input[..]],
            targets: vec![&target[..], &target[..]],
        };
        let loss = model.train_step(&batch).unwrap();
        assert!(loss.is_finite());
        assert!(model.evaluate(&batch).unwrap().is_finite());
    }

    #[test]
    fn empty_input_is_rejected() {
        let model = tiny_model();
        assert!(model.forward(&[], None).is_err());
    }
}
