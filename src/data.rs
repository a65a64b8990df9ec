/* ------------------------------------------------------------------ */
/* Windowing pipeline: chunk → shift → shuffle → batch                */
/* ------------------------------------------------------------------ */
//
// The token stream is chunked into consecutive blocks of W+1 ids; each
// block yields W input ids and the same W ids shifted left by one as
// targets. The trailing partial block is dropped, never padded — every
// window has exactly the same shape. Windows are drawn through a
// bounded shuffle buffer (memory proportional to the buffer, not the
// corpus) and grouped into fixed-size batches; a final partial batch
// is dropped too, so tensor shapes stay uniform.

use crate::error::{Error, Result};
use crate::rng::Rng;

/// One training example: `target[i] == input[i + 1]`, and the last
/// target id is the token that follows the window in the stream.
#[derive(Clone, Copy, Debug)]
pub struct Window<'a> {
    pub input: &'a [usize],
    pub target: &'a [usize],
}

/// Lazy iterator over non-overlapping windows. Restartable by calling
/// `Windows::new` again on the same stream.
pub struct Windows<'a> {
    stream: &'a [usize],
    width: usize,
    pos: usize,
}

impl<'a> Windows<'a> {
    pub fn new(stream: &'a [usize], width: usize) -> Result<Self> {
        if width == 0 {
            return Err(Error::InvalidConfig("window length must be positive".into()));
        }
        Ok(Self { stream, width, pos: 0 })
    }
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Window<'a>> {
        let end = self.pos.checked_add(self.width + 1)?;
        if end > self.stream.len() {
            return None; // trailing remainder shorter than W+1: dropped
        }
        let block = &self.stream[self.pos..end];
        self.pos = end;
        Some(Window { input: &block[..self.width], target: &block[1..] })
    }
}

/// A fixed-size group of windows, ready for tensor assembly.
/// All rows have the same length; `len() == batch_size` always.
pub struct Batch<'a> {
    pub inputs: Vec<&'a [usize]>,
    pub targets: Vec<&'a [usize]>,
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn window_len(&self) -> usize {
        self.inputs.first().map_or(0, |row| row.len())
    }
}

/// Shuffled, batched view over a window iterator.
///
/// The shuffle keeps a buffer of at most `buffer_size` windows and
/// yields a uniformly chosen occupant each time, refilling from the
/// source — the approximate-uniform bounded-memory reordering used by
/// streaming data pipelines.
pub struct Batches<'a, I: Iterator<Item = Window<'a>>> {
    source: I,
    buffer: Vec<Window<'a>>,
    buffer_size: usize,
    batch_size: usize,
    rng: Rng,
}

impl<'a, I: Iterator<Item = Window<'a>>> Batches<'a, I> {
    pub fn new(source: I, batch_size: usize, buffer_size: usize, seed: u64) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".into()));
        }
        if buffer_size == 0 {
            return Err(Error::InvalidConfig("shuffle buffer size must be positive".into()));
        }
        Ok(Self {
            source,
            buffer: Vec::with_capacity(buffer_size),
            buffer_size,
            batch_size,
            rng: Rng::new(seed),
        })
    }

    fn next_window(&mut self) -> Option<Window<'a>> {
        while self.buffer.len() < self.buffer_size {
            match self.source.next() {
                Some(w) => self.buffer.push(w),
                None => break,
            }
        }
        if self.buffer.is_empty() {
            return None;
        }
        let slot = self.rng.choice(self.buffer.len());
        Some(self.buffer.swap_remove(slot))
    }
}

impl<'a, I: Iterator<Item = Window<'a>>> Iterator for Batches<'a, I> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Batch<'a>> {
        let mut inputs = Vec::with_capacity(self.batch_size);
        let mut targets = Vec::with_capacity(self.batch_size);
        while inputs.len() < self.batch_size {
            match self.next_window() {
                Some(w) => {
                    inputs.push(w.input);
                    targets.push(w.target);
                }
                // fewer than batch_size windows remain: drop them
                None => return None,
            }
        }
        Some(Batch { inputs, targets })
    }
}

/// One training pass over the stream: chunk, shuffle, batch.
pub fn shuffled_batches(
    stream: &[usize],
    window: usize,
    batch_size: usize,
    buffer_size: usize,
    seed: u64,
) -> Result<Batches<'_, Windows<'_>>> {
    Batches::new(Windows::new(stream, window)?, batch_size, buffer_size, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::Vocabulary;

    #[test]
    fn epic_sample_yields_two_windows() {
        // corpus "|ab\n|cd\n", char mode, W = 3: eight tokens, exactly
        // two non-overlapping windows of length 4
        let v = Vocabulary::chars("|ab\n|cd\n");
        let stream = v.encode("|ab\n|cd\n");
        assert_eq!(stream.len(), 8);

        let windows: Vec<Window> = Windows::new(&stream, 3).unwrap().collect();
        assert_eq!(windows.len(), 2);
        assert_eq!(v.decode(windows[0].input), "|ab");
        assert_eq!(v.decode(windows[0].target), "ab\n");
        assert_eq!(v.decode(windows[1].input), "|cd");
        assert_eq!(v.decode(windows[1].target), "cd\n");
    }

    #[test]
    fn target_is_input_shifted_by_one() {
        let stream: Vec<usize> = (0..100).collect();
        for w in Windows::new(&stream, 7).unwrap() {
            assert_eq!(w.input.len(), 7);
            assert_eq!(w.target.len(), 7);
            for i in 0..6 {
                assert_eq!(w.target[i], w.input[i + 1]);
            }
            // last target is the stream token right after the last input
            assert_eq!(w.target[6], w.input[6] + 1);
        }
    }

    #[test]
    fn windows_reconstruct_the_stream_minus_remainder() {
        let stream: Vec<usize> = (0..25).collect();
        let w = 3; // blocks of 4: six windows, one token dropped
        let mut rebuilt = Vec::new();
        for win in Windows::new(&stream, w).unwrap() {
            rebuilt.extend_from_slice(win.input);
            rebuilt.push(*win.target.last().unwrap());
        }
        assert_eq!(rebuilt, &stream[..25 - 25 % (w + 1)]);
    }

    #[test]
    fn short_stream_yields_zero_windows() {
        let stream = vec![1, 2, 3];
        assert_eq!(Windows::new(&stream, 3).unwrap().count(), 0);
        assert_eq!(Windows::new(&[], 3).unwrap().count(), 0);
    }

    #[test]
    fn zero_sizes_are_rejected_up_front() {
        let stream = vec![1, 2, 3, 4];
        assert!(Windows::new(&stream, 0).is_err());
        assert!(shuffled_batches(&stream, 1, 0, 8, 1).is_err());
        assert!(shuffled_batches(&stream, 1, 2, 0, 1).is_err());
    }

    #[test]
    fn shuffle_is_a_permutation_of_all_windows() {
        let stream: Vec<usize> = (0..120).collect();
        // 30 windows of W=3, batches of 5, tiny shuffle buffer
        let mut seen: Vec<usize> = Vec::new();
        for batch in shuffled_batches(&stream, 3, 5, 4, 99).unwrap() {
            assert_eq!(batch.len(), 5);
            assert_eq!(batch.window_len(), 3);
            seen.extend(batch.inputs.iter().map(|row| row[0]));
        }
        seen.sort_unstable();
        let expected: Vec<usize> = (0..30).map(|i| i * 4).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn shuffle_actually_reorders() {
        let stream: Vec<usize> = (0..400).collect();
        let firsts: Vec<usize> = shuffled_batches(&stream, 3, 4, 64, 7)
            .unwrap()
            .flat_map(|b| b.inputs.into_iter().map(|row| row[0]).collect::<Vec<_>>())
            .collect();
        let mut ordered = firsts.clone();
        ordered.sort_unstable();
        assert_ne!(firsts, ordered);
    }

    #[test]
    fn partial_batch_is_dropped() {
        let stream: Vec<usize> = (0..28).collect(); // 7 windows of W=3
        let batches: Vec<Batch> = shuffled_batches(&stream, 3, 4, 8, 1).unwrap().collect();
        assert_eq!(batches.len(), 1); // 7 windows → one batch of 4, 3 dropped
    }

    #[test]
    fn fewer_windows_than_one_batch_yields_nothing() {
        let stream: Vec<usize> = (0..8).collect(); // 2 windows of W=3
        assert_eq!(shuffled_batches(&stream, 3, 4, 8, 1).unwrap().count(), 0);
    }
}
