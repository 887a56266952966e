//! Sekai Score Reader
//!
//! Command-line front end: reads result screenshots, or scores typed input,
//! and prints the rating each play is worth.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use score_reader::charts::{self, ChartSource, Difficulty, SheetCharts, StaticCharts};
use score_reader::history::{self, HistoryRecord};
use score_reader::pipeline::{CoopOutcome, LocalOutcome, ScorePipeline, ScreenshotOutcome};
use score_reader::score::tourney::{self, MAX_PLAYERS};
use score_reader::score::{ResolvedScore, TourneyPlayer, TourneyStore};
use score_reader::{config, logging, paths, screenshot};

/// Below this accuracy-reading confidence a coop line is flagged for a manual check.
const COOP_CHECK_CONFIDENCE: f32 = 90.0;

#[derive(Parser, Debug)]
#[command(name = "score-reader", version, about = "Reads rhythm-game result screens and rates them")]
struct Cli {
    /// Chart list as a JSON file, instead of the spreadsheet
    #[arg(long, global = true)]
    charts: Option<PathBuf>,

    /// Server whose chart table to use
    #[arg(long, global = true)]
    server: Option<String>,

    /// Player name written to the history file
    #[arg(long, global = true, default_value = "me")]
    player: String,

    /// Append each rated play to the history CSV
    #[arg(long, global = true)]
    record: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct HintArgs {
    /// Candidate song names, `;`-separated
    #[arg(long)]
    hints: Option<String>,
}

impl HintArgs {
    fn list(&self) -> Vec<String> {
        self.hints.as_deref().map(charts::parse_hints).unwrap_or_default()
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a solo screenshot with cloud OCR
    Cloud {
        /// File path or http(s) URL
        source: String,
    },
    /// Read a screenshot with the local engines
    Local {
        source: String,
        #[command(flatten)]
        hints: HintArgs,
    },
    /// Read a coop screenshot with the local engines
    Coop {
        source: String,
        #[command(flatten)]
        hints: HintArgs,
    },
    /// Rate a typed score against a chart
    Calc {
        #[arg(long)]
        song: String,
        /// Full name or prefix, e.g. `mas`
        #[arg(long)]
        difficulty: String,
        /// `perfect/great/good/bad/miss`, or 1-4 counts starting at great
        #[arg(long)]
        score: String,
    },
    /// Rate a typed score against any constant
    Custom {
        #[arg(long)]
        constant: f64,
        #[arg(long)]
        score: String,
    },
    /// List song names (and aliases), optionally filtered
    Songs {
        query: Option<String>,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Tourney lobby kept under `--player`
    Tourney {
        #[command(subcommand)]
        action: TourneyAction,
    },
}

#[derive(Subcommand, Debug)]
enum TourneyAction {
    /// Open a lobby for up to five players
    Start {
        /// Player names, `;`-separated
        #[arg(long)]
        players: String,
    },
    /// Add one round; each entry is `<difficulty> <score>`, e.g. `mas 950/2/0/0/1`
    Calc {
        #[arg(long)]
        song: String,
        #[arg(long)]
        p1: Option<String>,
        #[arg(long)]
        p2: Option<String>,
        #[arg(long)]
        p3: Option<String>,
        #[arg(long)]
        p4: Option<String>,
        #[arg(long)]
        p5: Option<String>,
    },
    /// Close the lobby and print every player's scores
    Finish,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    paths::ensure_directories().context("failed to create output directories")?;
    logging::init(cli.verbose)?;
    config::init_config();

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn chart_source(cli: &Cli) -> Result<Box<dyn ChartSource>> {
    match &cli.charts {
        Some(path) => Ok(Box::new(StaticCharts::load(path)?)),
        None => {
            let config = config::get_config();
            let client = screenshot::http_client(config.http_timeout())?;
            Ok(Box::new(SheetCharts::from_config(config, client)))
        }
    }
}

fn parse_difficulty(text: &str) -> Result<Difficulty> {
    text.parse::<Difficulty>()
        .ok()
        .or_else(|| Difficulty::from_prefix(text))
        .ok_or_else(|| anyhow!("unknown difficulty '{}'", text))
}

fn run(cli: &Cli) -> Result<()> {
    let server = cli.server.as_deref();
    let pipeline = ScorePipeline::new(config::get_config().clone(), chart_source(cli)?)?;

    match &cli.command {
        Command::Cloud { source } => {
            let outcome = pipeline.read_solo_cloud(source, server)?;
            print_solo(cli, &outcome)?;
        }
        Command::Local { source, hints } => match pipeline.read_local(source, server, &hints.list())? {
            LocalOutcome::Solo(outcome) => print_solo(cli, &outcome)?,
            LocalOutcome::Coop(outcome) => print_coop(cli, &outcome)?,
        },
        Command::Coop { source, hints } => {
            let outcome = pipeline.read_coop(source, server, &hints.list())?;
            print_coop(cli, &outcome)?;
        }
        Command::Calc {
            song,
            difficulty,
            score,
        } => {
            let resolved = pipeline.calculate_manual(server, song, parse_difficulty(difficulty)?, score)?;
            print_resolved(&resolved);
            record(cli, &cli.player, &resolved)?;
        }
        Command::Custom { constant, score } => {
            let calc = score_reader::calculate_custom(*constant, score)?;
            println!(
                "Custom {:.1}: {} {} -> {:.2} ({}) acc {:.2}%",
                calc.rating_constant,
                calc.judgements,
                calc.delta_label,
                calc.rating,
                calc.rank,
                calc.accuracy * 100.0
            );
            if cli.record {
                let row = HistoryRecord::new(&cli.player, "custom", None, &calc);
                history::append_record(&paths::get_history_path(), &row)?;
            }
        }
        Command::Songs { query, limit } => {
            let snapshot = pipeline.charts(server);
            let names = match query {
                Some(q) => charts::search_names(&snapshot, q, *limit).unwrap_or_default(),
                None => charts::song_names(&snapshot).into_iter().take(*limit).collect(),
            };
            for name in names {
                println!("{}", name);
            }
        }
        Command::Tourney { action } => run_tourney(cli, &pipeline, action)?,
    }
    Ok(())
}

fn run_tourney(cli: &Cli, pipeline: &ScorePipeline, action: &TourneyAction) -> Result<()> {
    let store = TourneyStore::new(paths::get_tourney_dir());
    match action {
        TourneyAction::Start { players } => {
            let session = store.start(&cli.player, players)?;
            let names: Vec<&str> = session.players().iter().map(|p| p.name.as_str()).collect();
            println!("Tourney started: {}", names.join(", "));
        }
        TourneyAction::Calc {
            song,
            p1,
            p2,
            p3,
            p4,
            p5,
        } => {
            let snapshot = pipeline.charts(cli.server.as_deref());
            let entries: [Option<String>; MAX_PLAYERS] =
                [p1.clone(), p2.clone(), p3.clone(), p4.clone(), p5.clone()];
            let round = tourney::parse_round(&snapshot, song, &entries);
            let counted = store.add_round(&cli.player, &round)?;
            for (slot, score) in round.iter().enumerate() {
                if let Some(score) = score {
                    let calc = &score.calculation;
                    println!(
                        "P{}: {} [{}] {} {} -> {:.2}",
                        slot + 1,
                        score.song,
                        score.difficulty,
                        calc.judgements,
                        calc.delta_label,
                        calc.rating
                    );
                }
            }
            println!("Counted {} scores", counted);
        }
        TourneyAction::Finish => {
            let players = store.finish(&cli.player)?;
            for player in &players {
                print_tourney_player(player);
            }
        }
    }
    Ok(())
}

fn print_tourney_player(player: &TourneyPlayer) {
    println!("{}:", player.name);
    if player.scores.is_empty() {
        println!("  no scores");
    }
    for score in &player.scores {
        let calc = &score.calculation;
        println!(
            "  {} {:.2} ({}) [{} {:.1}] {} (-{}) acc {:.2}%",
            score.song,
            calc.rating,
            calc.rank,
            score.difficulty,
            calc.rating_constant,
            calc.judgements,
            score.to_all_perfect(),
            calc.accuracy * 100.0
        );
    }
}

fn print_resolved(resolved: &ResolvedScore) {
    let calc = &resolved.score;
    println!(
        "{} [{}] {:.1}: {} {} -> {:.2} ({}) acc {:.2}%",
        resolved.chart.name,
        resolved.chart.difficulty,
        calc.rating_constant,
        calc.judgements,
        calc.delta_label,
        calc.rating,
        calc.rank,
        calc.accuracy * 100.0
    );
}

fn print_solo(cli: &Cli, outcome: &ScreenshotOutcome) -> Result<()> {
    match outcome {
        ScreenshotOutcome::Resolved(resolved) => {
            print_resolved(resolved);
            record(cli, &cli.player, resolved)?;
        }
        ScreenshotOutcome::Unresolved(reading) => {
            println!(
                "Chart not found for {:?}: {} acc {:.2}%",
                reading.title.as_deref().unwrap_or("?"),
                reading.judgements,
                reading.accuracy * 100.0
            );
        }
    }
    Ok(())
}

fn print_coop(cli: &Cli, outcome: &CoopOutcome) -> Result<()> {
    println!("Song: {}", outcome.song.as_deref().unwrap_or("not found"));
    for entry in &outcome.players {
        let name = entry.player.player.as_deref().unwrap_or("?");
        let check = if entry.player.confidence < COOP_CHECK_CONFIDENCE {
            " (low conf, check)"
        } else {
            ""
        };
        match &entry.resolved {
            Some(resolved) => {
                let calc = &resolved.score;
                println!(
                    "{}. {} [{}]: {} {} -> {:.2}{}",
                    entry.player.slot + 1,
                    name,
                    resolved.chart.difficulty,
                    calc.judgements,
                    calc.delta_label,
                    calc.rating,
                    check
                );
                record(cli, name, resolved)?;
            }
            None => {
                let accuracy = entry
                    .accuracy
                    .map(|a| format!("{:.2}%", a * 100.0))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}. {}: {:?} acc {}{}",
                    entry.player.slot + 1,
                    name,
                    entry.player.counts,
                    accuracy,
                    check
                );
            }
        }
    }
    Ok(())
}

fn record(cli: &Cli, player: &str, resolved: &ResolvedScore) -> Result<()> {
    if !cli.record {
        return Ok(());
    }
    let path = paths::get_history_path();
    history::append_record(&path, &HistoryRecord::resolved(player, resolved))?;
    info!("Recorded {} to {}", resolved.chart.name, path.display());
    Ok(())
}
