/* ------------------------------------------------------------------ */
/* Hyperparameters and global defaults                                */
/* ------------------------------------------------------------------ */

// ── Data pipeline ──────────────────────────────────────────────────────────

/// Window length W: each training example is W input ids and the same
/// W ids shifted left by one as targets.
pub const WINDOW_SIZE: usize = 100;
pub const BATCH_SIZE: usize = 64;
/// Bounded shuffle buffer — memory cost is proportional to this, never
/// to the corpus.
pub const SHUFFLE_BUFFER: usize = 10_000;
/// Tail fraction of the token stream held out for validation loss.
pub const VAL_FRACTION: f64 = 0.1;

// ── Vocabulary ─────────────────────────────────────────────────────────────

/// Word-level vocabulary cap, reserved ids included.
pub const MAX_WORD_VOCAB: usize = 8192;

// ── Model ──────────────────────────────────────────────────────────────────

pub const EMBED_DIM: usize = 256;
pub const RNN_UNITS: usize = 1024;
pub const LEARNING_RATE: f64 = 1e-3;

// ── Training ───────────────────────────────────────────────────────────────

pub const EPOCHS: usize = 20;
/// Log (and compute validation loss) every this many batches.
pub const EVAL_INTERVAL: usize = 25;
pub const EVAL_ITERS: usize = 10;

// ── Generation ─────────────────────────────────────────────────────────────

pub const GEN_STEPS: usize = 300;
pub const GEN_TEMPERATURE: f32 = 0.8;

// ── Persistence ────────────────────────────────────────────────────────────

pub const WEIGHTS_PATH: &str = "shahgen.safetensors";
pub const VOCAB_PATH: &str = "vocab.json";
