/* ------------------------------------------------------------------ */
/* Training loop and loss estimation                                  */
/* ------------------------------------------------------------------ */

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::*;
use crate::data::{shuffled_batches, Batch, Windows};
use crate::error::Result;
use crate::model::{GruModel, SequenceModel};
use crate::rng::Rng;

/* ------------------------------------------------------------------ */
/* Estimate loss on a held-out token stream                           */
/* ------------------------------------------------------------------ */
pub fn estimate_loss(model: &GruModel, data: &[usize], eval_iters: usize, rng: &mut Rng) -> Result<f32> {
    let mut total = 0.0f32;
    let mut count = 0usize;

    for _ in 0..eval_iters {
        if data.len() <= WINDOW_SIZE + 1 {
            continue;
        }
        let start = rng.choice(data.len() - WINDOW_SIZE - 1);
        let batch = Batch {
            inputs: vec![&data[start..start + WINDOW_SIZE]],
            targets: vec![&data[start + 1..start + WINDOW_SIZE + 1]],
        };
        total += model.evaluate(&batch)?;
        count += 1;
    }

    Ok(if count > 0 { total / count as f32 } else { 0.0 })
}

/* ------------------------------------------------------------------ */
/* Main training loop                                                 */
/* ------------------------------------------------------------------ */
pub fn train(
    model: &mut GruModel,
    data: &[usize],
    val_data: &[usize],
    epochs: usize,
    rng: &mut Rng,
    stop: &AtomicBool,
) -> Result<()> {
    let n_windows = Windows::new(data, WINDOW_SIZE)?.count();
    let n_batches = n_windows / BATCH_SIZE;
    if n_batches == 0 {
        println!(
            "Nothing to train on: {} windows of {} ids, batch size {}.",
            n_windows,
            WINDOW_SIZE,
            BATCH_SIZE
        );
        return Ok(());
    }

    println!("=== Starting Training ===");
    println!("Epochs: {}", epochs);
    println!("Windows per epoch: {} ({} batches of {})", n_windows, n_batches, BATCH_SIZE);
    println!("Window length: {}, shuffle buffer: {}", WINDOW_SIZE, SHUFFLE_BUFFER);
    println!("Learning rate: {}", LEARNING_RATE);
    println!();

    let mut best_loss = f32::INFINITY;
    let mut best_at = (0usize, 0usize);
    let mut iter = 0usize;

    'epochs: for epoch in 0..epochs {
        // fresh shuffle order per pass
        let batches = shuffled_batches(data, WINDOW_SIZE, BATCH_SIZE, SHUFFLE_BUFFER, rng.next())?;

        for batch in batches {
            let loss = model.train_step(&batch)?;
            if loss < best_loss {
                best_loss = loss;
                best_at = (epoch, iter);
            }

            if iter % EVAL_INTERVAL == 0 {
                if !val_data.is_empty() {
                    let val_loss = estimate_loss(model, val_data, EVAL_ITERS, rng)?;
                    println!(
                        "Epoch {:2} | Iter {:5} | Loss: {:.4} | Val: {:.4} (ppl {:.1}) | Best: {:.4} @{}/{}",
                        epoch, iter, loss, val_loss, val_loss.exp(), best_loss, best_at.0, best_at.1
                    );
                } else {
                    println!(
                        "Epoch {:2} | Iter {:5} | Loss: {:.4} | Best: {:.4} @{}/{}",
                        epoch, iter, loss, best_loss, best_at.0, best_at.1
                    );
                }
            }
            iter += 1;

            if stop.load(Ordering::Relaxed) {
                println!();
                println!("Interrupted at epoch {}, iteration {}.", epoch, iter);
                break 'epochs;
            }
        }
    }

    println!();
    println!("Training complete!");
    println!("Best loss: {:.4} at epoch {}, iteration {}", best_loss, best_at.0, best_at.1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn short_corpus_trains_nothing_without_error() {
        let mut model = GruModel::new(4, 4, 8, 1e-2, Device::Cpu).unwrap();
        let data: Vec<usize> = vec![0, 1, 2, 3]; // far shorter than one window
        let mut rng = Rng::new(1);
        let stop = AtomicBool::new(false);
        train(&mut model, &data, &[], 2, &mut rng, &stop).unwrap();
    }

    #[test]
    fn estimate_loss_on_short_data_is_zero() {
        let model = GruModel::new(4, 4, 8, 1e-2, Device::Cpu).unwrap();
        let mut rng = Rng::new(1);
        let loss = estimate_loss(&model, &[0, 1, 2], 5, &mut rng).unwrap();
        assert_eq!(loss, 0.0);
    }
}
