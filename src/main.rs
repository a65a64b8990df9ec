/* ------------------------------------------------------------------ */
/* shahgen: recurrent text generator for classical Persian verse      */
/* ------------------------------------------------------------------ */
//
// Pipeline: corpus → vocabulary → token stream → shuffled windows →
// GRU training → autoregressive sampling with temperature and an
// unknown-token mask. Run with no arguments to train on divan.txt and
// drop into an interactive seed prompt.

mod config;
mod corpus;
mod data;
mod error;
mod model;
mod rng;
mod sample;
mod train;
mod vocab;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use candle_core::Device;

use crate::config::*;
use crate::error::{Error, Result};
use crate::model::GruModel;
use crate::rng::Rng;
use crate::sample::Sampler;
use crate::train::{estimate_loss, train};
use crate::vocab::Vocabulary;

// A few opening lines of the Shahnameh, used when no corpus file is
// present so the program still demonstrates the full pipeline.
const SAMPLE_CORPUS: &str = "\
به نام خداوند جان و خرد | کزین برتر اندیشه برنگذرد
خداوند نام و خداوند جای | خداوند روزی ده رهنمای
خداوند کیوان و گردان سپهر | فروزنده ماه و ناهید و مهر
ز نام و نشان و گمان برترست | نگارندهٔ بر شده پیکرست
";

struct Args {
    corpus_path: PathBuf,
    word_level: bool,
    epochs: usize,
    steps: usize,
    temperature: f32,
    rng_seed: u64,
    prompt: Option<String>,
    load: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        corpus_path: PathBuf::from("divan.txt"),
        word_level: false,
        epochs: EPOCHS,
        steps: GEN_STEPS,
        temperature: GEN_TEMPERATURE,
        rng_seed: 1337,
        prompt: None,
        load: false,
    };

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    let value = |i: &mut usize, flag: &str| -> Result<String> {
        *i += 1;
        argv.get(*i)
            .cloned()
            .ok_or_else(|| Error::InvalidConfig(format!("{flag} needs a value")))
    };

    while i < argv.len() {
        match argv[i].as_str() {
            "--word" => args.word_level = true,
            "--load" => args.load = true,
            "--epochs" => {
                let v = value(&mut i, "--epochs")?;
                args.epochs = v
                    .parse()
                    .map_err(|_| Error::InvalidConfig(format!("bad epoch count {v:?}")))?;
            }
            "--steps" => {
                let v = value(&mut i, "--steps")?;
                args.steps = v
                    .parse()
                    .map_err(|_| Error::InvalidConfig(format!("bad step count {v:?}")))?;
            }
            "--temp" => {
                let v = value(&mut i, "--temp")?;
                args.temperature = v
                    .parse()
                    .map_err(|_| Error::InvalidConfig(format!("bad temperature {v:?}")))?;
            }
            "--seed" => {
                let v = value(&mut i, "--seed")?;
                args.rng_seed = v
                    .parse()
                    .map_err(|_| Error::InvalidConfig(format!("bad RNG seed {v:?}")))?;
            }
            "--prompt" => args.prompt = Some(value(&mut i, "--prompt")?),
            flag if flag.starts_with("--") => {
                return Err(Error::InvalidConfig(format!("unknown flag {flag}")));
            }
            path => args.corpus_path = PathBuf::from(path),
        }
        i += 1;
    }
    Ok(args)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let device = Device::Cpu;
    let mut rng = Rng::new(args.rng_seed);

    println!("=== shahgen ===");

    // ── Corpus & vocabulary ─────────────────────────────────────────
    let text = if args.corpus_path.exists() {
        println!("Loading corpus from {}...", args.corpus_path.display());
        corpus::load(&args.corpus_path)?
    } else {
        println!("No {} found. Using the built-in sample verses.", args.corpus_path.display());
        SAMPLE_CORPUS.to_string()
    };
    println!("Corpus size: {} characters", text.chars().count());

    let vocabulary = if args.load {
        println!("Loading vocabulary from {VOCAB_PATH}...");
        Vocabulary::load(Path::new(VOCAB_PATH))?
    } else if args.word_level {
        Vocabulary::words(&text, MAX_WORD_VOCAB)?
    } else {
        Vocabulary::chars(&text)
    };
    println!("Vocabulary: {} tokens ({}-level)", vocabulary.len(), vocabulary.granularity());
    println!("Sample tokens: {:?}", vocabulary.sample_tokens(10));

    let stream = vocabulary.encode_corpus(&text);
    println!("Tokenized to {} ids", stream.len());

    let val_len = (stream.len() as f64 * VAL_FRACTION) as usize;
    let (train_data, val_data) = stream.split_at(stream.len() - val_len);

    // ── Model ───────────────────────────────────────────────────────
    let mut gru = GruModel::new(vocabulary.len(), EMBED_DIM, RNN_UNITS, LEARNING_RATE, device)?;
    println!("Parameters: ~{:.2}M", gru.param_count() as f32 / 1_000_000.0);
    println!();

    let stop = AtomicBool::new(false);

    if args.load {
        println!("Loading weights from {WEIGHTS_PATH}...");
        gru.load(Path::new(WEIGHTS_PATH))?;
    } else {
        let initial = estimate_loss(&gru, val_data, EVAL_ITERS, &mut rng)?;
        println!("Initial val loss: {:.4}", initial);

        train(&mut gru, train_data, val_data, args.epochs, &mut rng, &stop)?;

        vocabulary.save(Path::new(VOCAB_PATH))?;
        gru.save(Path::new(WEIGHTS_PATH))?;
        println!("Saved {WEIGHTS_PATH} and {VOCAB_PATH}");
        println!();
    }

    // ── Generation ──────────────────────────────────────────────────
    let mut sampler = Sampler::new(&gru, &vocabulary, Rng::new(rng.next()));

    if let Some(prompt) = &args.prompt {
        let out = sampler.run(prompt, args.steps, args.temperature, Some(&stop))?;
        println!("{out}");
        return Ok(());
    }

    println!("Interactive mode: type a seed line, empty line to quit.");
    println!("(steps: {}, temperature: {})", args.steps, args.temperature);
    let stdin = std::io::stdin();
    loop {
        print!("seed> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let seed = line.trim_end_matches('\n');
        if seed.is_empty() {
            break;
        }
        let out = sampler.run(seed, args.steps, args.temperature, Some(&stop))?;
        println!("{out}");
        println!();
    }

    Ok(())
}
