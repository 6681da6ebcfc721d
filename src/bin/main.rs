use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use log::{info, warn};
use solver_core::core::grouper::{prepare_tokens, read_ciphertext, tokenize};
use solver_core::core::hooks::{Boundary, BoundaryHook};
use solver_core::core::report::CoverageReport;
use solver_core::core::types::LengthPolicy;
use solver_core::persistence::{load_checkpoint, load_session, Checkpointer};
use solver_core::{MappingStore, ReferenceIndex, SolverConfig, SolverEngine, Vocabulary};
use std::io::{stdin, stdout, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;

/// Recovers a monoalphabetic substitution key from ranked word lists.
#[derive(Debug, Parser)]
#[command(name = "monoalpha")]
pub struct Cli {
    /// Ciphertext file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Ranked vocabulary (JSON object or word list), highest priority first
    #[arg(short, long = "vocab")]
    pub vocabularies: Vec<PathBuf>,

    /// Count every printable non-space character toward token Length
    #[arg(long)]
    pub all_printable: bool,

    /// Run the threshold sweep once the rounds stall
    #[arg(long)]
    pub sweep: bool,

    #[arg(long)]
    pub sweep_start: Option<u8>,

    #[arg(long)]
    pub sweep_floor: Option<u8>,

    #[arg(long)]
    pub sweep_step: Option<u8>,

    /// Re-run the rounds over unresolved tokens after a productive threshold
    #[arg(long)]
    pub revisit_exhausted: bool,

    /// Directory for mapping.json, consumed_words.json and session.bin
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Continue from the checkpoint directory
    #[arg(long, requires = "checkpoint_dir")]
    pub resume: bool,

    /// JSON solver configuration; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Wait for Enter after each productive round and each threshold ("q" stops)
    #[arg(long)]
    pub pause: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    fn solver_config(&self) -> Result<SolverConfig> {
        let mut config = match &self.config {
            Some(path) => SolverConfig::from_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => SolverConfig::default(),
        };
        if self.all_printable {
            config.policy = LengthPolicy::AllPrintable;
        }

        let wants_sweep = self.sweep
            || self.revisit_exhausted
            || self.sweep_start.is_some()
            || self.sweep_floor.is_some()
            || self.sweep_step.is_some();
        if wants_sweep {
            let mut sweep = config.sweep.take().unwrap_or_default();
            sweep.start = self.sweep_start.unwrap_or(sweep.start);
            sweep.floor = self.sweep_floor.unwrap_or(sweep.floor);
            sweep.step = self.sweep_step.unwrap_or(sweep.step);
            sweep.revisit_exhausted |= self.revisit_exhausted;
            config.sweep = Some(sweep);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Waits on stdin between boundaries.
struct InteractivePause;

impl BoundaryHook for InteractivePause {
    fn at_boundary(&mut self, boundary: Boundary<'_>, mapping: &MappingStore) -> ControlFlow<()> {
        let label = match boundary {
            Boundary::Round(round) if round.accepted() == 0 => return ControlFlow::Continue(()),
            Boundary::Round(round) => format!("round {}: {} accepted", round.round, round.accepted()),
            Boundary::Threshold(pass) => {
                format!("threshold {}%: {} accepted", pass.threshold, pass.accepted())
            }
        };
        println!("\n{}\n[{}] {} pairs. Enter to continue, q to stop.", mapping, label, mapping.len());
        let _ = stdout().flush();

        let mut input = String::new();
        if stdin().read_line(&mut input).is_err() {
            return ControlFlow::Continue(());
        }
        if input.trim().eq_ignore_ascii_case("q") {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    let ciphertext = read_ciphertext(&cli.input)?;
    let config = cli.solver_config()?;
    info!("Configuration: {:?}", config);

    if cli.vocabularies.is_empty() {
        warn!("No vocabularies given, nothing can be matched");
    }
    let vocabularies: Vec<Vocabulary> = cli
        .vocabularies
        .iter()
        .map(|path| Vocabulary::load_or_empty(path))
        .collect();
    let index = ReferenceIndex::new(vocabularies, config.policy);
    let tokens = prepare_tokens(&ciphertext, config.policy);

    let mut engine = SolverEngine::new(index, config);
    if let Some(dir) = &cli.checkpoint_dir {
        match Checkpointer::new(dir) {
            Ok(checkpointer) => engine = engine.with_checkpoints(checkpointer),
            Err(e) => warn!("Checkpoints disabled, {:?} unusable: {}", dir, e),
        }
    }
    if cli.pause {
        engine = engine.with_hook(InteractivePause);
    }

    let report = match (&cli.checkpoint_dir, cli.resume) {
        (Some(dir), true) => match load_session(dir) {
            Ok(session) => engine.resume(&tokens, session),
            Err(e) => {
                warn!("No resumable session ({}), falling back to mapping checkpoint", e);
                match load_checkpoint(dir) {
                    Ok((mapping, consumed)) => {
                        engine = engine.with_state(mapping, consumed);
                    }
                    Err(e) => warn!("No checkpoint to resume from ({}), starting fresh", e),
                }
                engine.solve(&tokens)
            }
        },
        _ => engine.solve(&tokens),
    };
    info!("Run finished: {:?}", report);
    if report.stopped_early {
        println!("Stopped early after {} rounds.", report.rounds);
    }

    println!("\n{}", engine.mapping);
    println!("\n{}", highlighted(&engine.mapping, &ciphertext));

    println!("\nPredicted substitutions:");
    for (symbol, count) in engine.mapping.occurrences(&ciphertext) {
        if let Some(plain) = engine.mapping.get(symbol) {
            println!("  {} -> {}: {}", symbol, plain, count);
        }
    }

    let unused: String = ('a'..='z')
        .filter(|&plain| engine.mapping.origin_of(plain).is_none())
        .collect();
    if !unused.is_empty() {
        println!("Unassigned plain letters: {}", unused);
    }

    let rendered = tokenize(&engine.render(&ciphertext));
    println!("\nCoverage: {}", CoverageReport::measure(&rendered, &engine.index));
    Ok(())
}

/// The decode with resolved symbols picked out.
fn highlighted(mapping: &MappingStore, text: &str) -> String {
    text.chars()
        .map(|c| match mapping.get(c) {
            Some(plain) => plain.to_string().green().bold().to_string(),
            None => c.to_string(),
        })
        .collect()
}
