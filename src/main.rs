mod db;
mod engine;
mod error;
mod models;
mod tui;

use clap::{Parser, Subcommand};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use db::Database;
use engine::router::parse_mode;
use engine::ExplicitSession;
use models::{Flashcard, JsonOutput, StudyMode, StudySession};

const DEFAULT_DB_NAME: &str = "studydeck.db";
const DB_ENV: &str = "STUDYDECK_DB";
const LOG_ENV: &str = "STUDYDECK_LOG";

#[derive(Parser)]
#[command(name = "studydeck")]
#[command(about = "Flashcard study sessions in recognition, multiple-choice and timed modes")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log engine decisions to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage flashcards
    #[command(subcommand)]
    Card(CardCommands),

    /// Manage study sessions
    #[command(subcommand)]
    Session(SessionCommands),

    /// Study a session in the terminal UI
    Study {
        /// Study mode: recognition, forced_choice or timed_forced_choice
        mode: String,

        /// Comma-separated card IDs to study right away
        #[arg(long, short)]
        cards: Option<String>,
    },

    /// Show study statistics
    Stats,
}

#[derive(Subcommand)]
enum CardCommands {
    /// Add a new flashcard
    Add {
        /// Question side
        front: String,

        /// Answer side
        back: String,

        /// Difficulty level (1-5)
        #[arg(long, short, value_parser = clap::value_parser!(i32).range(1..=5))]
        difficulty: Option<i32>,
    },

    /// List all flashcards
    List,

    /// Show flashcard details
    Show {
        /// Card ID
        id: i64,
    },

    /// Delete a flashcard
    Delete {
        /// Card ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Create a session to study later
    New {
        /// Study mode: recognition, forced_choice or timed_forced_choice
        mode: String,

        /// Comma-separated card IDs (defaults to every card)
        #[arg(long, short)]
        cards: Option<String>,

        /// Maximum number of cards in the session
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// List sessions, newest first
    List {
        /// Filter by study mode
        #[arg(long, short)]
        mode: Option<String>,

        /// Only show sessions not yet completed
        #[arg(long, short)]
        pending: bool,
    },

    /// Show session details
    Show {
        /// Session ID
        id: i64,
    },
}

fn get_db_path() -> PathBuf {
    let path = resolve_db_path(std::env::var(DB_ENV).ok(), dirs::config_dir());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    path
}

fn resolve_db_path(env_path: Option<String>, config_dir: Option<PathBuf>) -> PathBuf {
    if let Some(path) = env_path {
        return PathBuf::from(path);
    }

    config_dir
        .unwrap_or_else(|| PathBuf::from("."))
        .join("studydeck")
        .join(DEFAULT_DB_NAME)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout is reserved for command output and the terminal UI
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = get_db_path();
    tracing::debug!(path = %db_path.display(), "opening database");
    let db = Database::open(&db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Card(card_cmd) => match card_cmd {
            CardCommands::Add {
                front,
                back,
                difficulty,
            } => {
                let id = db.add_card(&front, &back, difficulty)?;

                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "front_content": front
                        })))?
                    );
                } else {
                    println!("Added card '{}' with ID: {}", truncate(&front, 40), id);
                }
            }

            CardCommands::List => {
                let cards = db.list_cards()?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&cards))?);
                } else if cards.is_empty() {
                    println!("No cards found.");
                } else {
                    println!("{:<5} {:<32} {:<26} REVIEWS", "ID", "FRONT", "BACK");
                    println!("{}", "-".repeat(75));
                    for card in cards {
                        println!(
                            "{:<5} {:<32} {:<26} {}",
                            card.id,
                            truncate(&card.front_content, 30),
                            truncate(&card.back_content, 24),
                            card.times_reviewed
                        );
                    }
                }
            }

            CardCommands::Show { id } => {
                if let Some(card) = db.get_card(id)? {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&card))?);
                    } else {
                        print_card(&card);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Card not found"))?
                    );
                } else {
                    println!("Card not found.");
                }
            }

            CardCommands::Delete { id } => {
                if db.delete_card(id)? {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                    } else {
                        println!("Card {} deleted.", id);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Card not found"))?
                    );
                } else {
                    println!("Card not found.");
                }
            }
        },

        Commands::Session(session_cmd) => match session_cmd {
            SessionCommands::New { mode, cards, limit } => {
                let mode = parse_mode(&mode)?;
                let requested = cards.as_deref().map(parse_card_ids).transpose()?;
                let available: Vec<i64> = db.list_cards()?.iter().map(|c| c.id).collect();

                let card_ids =
                    select_session_cards(&available, requested, limit, &mut rand::thread_rng())?;
                let id = db.create_session(mode, &card_ids)?;

                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "session_type": mode,
                            "card_ids": card_ids
                        })))?
                    );
                } else {
                    println!(
                        "Created {} session {} with {} card(s).",
                        mode.label(),
                        id,
                        card_ids.len()
                    );
                    println!("Start it with: studydeck study {}", mode.as_str());
                }
            }

            SessionCommands::List { mode, pending } => {
                let mode = mode.as_deref().map(parse_mode).transpose()?;
                let sessions = db.list_sessions(mode, pending)?;

                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&sessions))?);
                } else if sessions.is_empty() {
                    println!("No sessions found.");
                } else {
                    println!(
                        "{:<5} {:<22} {:<7} {:<10} CREATED",
                        "ID", "MODE", "CARDS", "RESULT"
                    );
                    println!("{}", "-".repeat(75));
                    for session in sessions {
                        println!(
                            "{:<5} {:<22} {:<7} {:<10} {}",
                            session.id,
                            session.session_type.as_str(),
                            session.total_cards,
                            session_result(&session),
                            session.created_at
                        );
                    }
                }
            }

            SessionCommands::Show { id } => {
                if let Some(session) = db.get_session(id)? {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&session))?);
                    } else {
                        print_session(&session);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Session not found"))?
                    );
                } else {
                    println!("Session not found.");
                }
            }
        },

        Commands::Study { mode, cards } => {
            // An unknown mode is left for the study screen to report
            let explicit = match (StudyMode::from_str(&mode), cards) {
                (Some(study_mode), Some(ids)) => {
                    let ids = parse_card_ids(&ids)?;
                    Some(explicit_session(&db, study_mode, &ids)?)
                }
                _ => None,
            };

            tui::run(db, mode, explicit)?;
        }

        Commands::Stats => {
            let stats = db.get_stats()?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "total_cards": stats.total_cards,
                        "total_sessions": stats.total_sessions,
                        "completed_sessions": stats.completed_sessions,
                        "pending_sessions": stats.pending_sessions,
                        "correct_answers": stats.correct_answers,
                        "incorrect_answers": stats.incorrect_answers,
                        "accuracy": stats.accuracy(),
                        "total_study_seconds": stats.total_study_seconds
                    })))?
                );
            } else {
                println!("=== Study Statistics ===");
                println!("Total cards: {}", stats.total_cards);
                println!(
                    "Sessions: {} ({} completed, {} pending)",
                    stats.total_sessions, stats.completed_sessions, stats.pending_sessions
                );
                println!(
                    "Answers: {} correct, {} incorrect",
                    stats.correct_answers, stats.incorrect_answers
                );
                println!("Accuracy: {:.0}%", stats.accuracy());
                println!(
                    "Total study time: {}",
                    format_duration(stats.total_study_seconds)
                );
            }
        }
    }

    Ok(())
}

/// Stores a fresh session over `ids` and pairs it with its cards, in the
/// order given.
fn explicit_session(
    db: &Database,
    mode: StudyMode,
    ids: &[i64],
) -> Result<ExplicitSession, Box<dyn std::error::Error>> {
    let mut cards = Vec::with_capacity(ids.len());
    for &id in ids {
        let card = db
            .get_card(id)?
            .ok_or_else(|| format!("Card {} not found", id))?;
        cards.push(card);
    }

    let session_id = db.create_session(mode, ids)?;
    let session = db
        .get_session(session_id)?
        .ok_or_else(|| format!("Session {} not found", session_id))?;

    Ok(ExplicitSession { session, cards })
}

fn parse_card_ids(input: &str) -> Result<Vec<i64>, String> {
    let ids = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| format!("Invalid card ID '{}'", s))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err("No card IDs given".to_string());
    }
    Ok(ids)
}

/// Picks the cards for a new session: the requested ids (all of which must
/// exist) or every available card, shuffled and capped at `limit`.
fn select_session_cards<R: Rng + ?Sized>(
    available: &[i64],
    requested: Option<Vec<i64>>,
    limit: Option<usize>,
    rng: &mut R,
) -> Result<Vec<i64>, String> {
    let mut ids = match requested {
        Some(ids) => {
            if let Some(missing) = ids.iter().find(|id| !available.contains(id)) {
                return Err(format!("Card {} not found", missing));
            }
            ids
        }
        None => available.to_vec(),
    };

    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));
    ids.shuffle(rng);
    if let Some(limit) = limit {
        ids.truncate(limit);
    }

    if ids.is_empty() {
        return Err("A session needs at least one card. Add some cards first!".to_string());
    }
    Ok(ids)
}

fn print_card(card: &Flashcard) {
    println!("Card {}", card.id);
    println!("Front: {}", card.front_content);
    println!("Back: {}", card.back_content);
    if let Some(level) = card.difficulty_level {
        println!("Difficulty: {}", level);
    }
    println!(
        "Reviews: {} ({:.0}% correct)",
        card.times_reviewed,
        card.success_rate()
    );
    if let Some(last) = &card.last_reviewed_at {
        println!("Last reviewed: {}", last);
    }
    println!("Created: {}", card.created_at);
}

fn print_session(session: &StudySession) {
    println!("Session {}", session.id);
    println!(
        "Mode: {} ({})",
        session.session_type.label(),
        session.session_type.as_str()
    );
    println!("{}", session.session_type.description());
    println!(
        "Cards: {}",
        session
            .card_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Created: {}", session.created_at);

    match &session.completed_at {
        Some(completed) => {
            println!();
            println!("--- Result ---");
            println!(
                "Correct: {}  Incorrect: {}",
                session.correct_answers.unwrap_or(0),
                session.incorrect_answers.unwrap_or(0)
            );
            if let Some(accuracy) = session.accuracy() {
                println!("Accuracy: {:.0}%", accuracy);
            }
            if let Some(seconds) = session.session_duration_seconds {
                println!("Duration: {}", format_duration(seconds));
            }
            println!("Completed: {}", completed);
        }
        None => println!("Status: pending"),
    }
}

fn session_result(session: &StudySession) -> String {
    match (session.correct_answers, session.incorrect_answers) {
        (Some(correct), Some(incorrect)) if session.is_complete() => {
            format!("{}/{}", correct, correct + incorrect)
        }
        _ => "pending".to_string(),
    }
}

fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds >= 3600 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else if seconds >= 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    mod truncate_tests {
        use super::*;

        #[test]
        fn truncate_short_string() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn truncate_exact_length() {
            assert_eq!(truncate("hello", 5), "hello");
        }

        #[test]
        fn truncate_long_string() {
            assert_eq!(truncate("hello world", 8), "hello...");
        }

        #[test]
        fn truncate_multibyte() {
            assert_eq!(truncate("ĉu vi parolas", 6), "ĉu ...");
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn format_duration_units() {
            assert_eq!(format_duration(42), "42s");
            assert_eq!(format_duration(125), "2m 5s");
            assert_eq!(format_duration(7260), "2h 1m");
            assert_eq!(format_duration(-3), "0s");
        }

        #[test]
        fn session_result_pending_and_complete() {
            let mut session = StudySession {
                id: 1,
                session_type: StudyMode::Recognition,
                card_ids: vec![1, 2],
                total_cards: 2,
                correct_answers: None,
                incorrect_answers: None,
                session_duration_seconds: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
                completed_at: None,
            };
            assert_eq!(session_result(&session), "pending");

            session.correct_answers = Some(1);
            session.incorrect_answers = Some(1);
            session.completed_at = Some("2026-01-01T00:05:00Z".to_string());
            assert_eq!(session_result(&session), "1/2");
        }
    }

    mod card_selection_tests {
        use super::*;
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        #[test]
        fn parse_card_ids_trims_and_skips_blanks() {
            assert_eq!(parse_card_ids("1, 2,,3 "), Ok(vec![1, 2, 3]));
        }

        #[test]
        fn parse_card_ids_rejects_garbage() {
            assert!(parse_card_ids("1,two").is_err());
            assert!(parse_card_ids(" , ").is_err());
        }

        #[test]
        fn selects_every_card_by_default() {
            let mut rng = StdRng::seed_from_u64(3);
            let mut ids = select_session_cards(&[1, 2, 3, 4], None, None, &mut rng).unwrap();
            ids.sort();
            assert_eq!(ids, vec![1, 2, 3, 4]);
        }

        #[test]
        fn limit_caps_selection() {
            let mut rng = StdRng::seed_from_u64(3);
            let ids = select_session_cards(&[1, 2, 3, 4], None, Some(2), &mut rng).unwrap();
            assert_eq!(ids.len(), 2);
            assert!(ids.iter().all(|id| (1..=4).contains(id)));
        }

        #[test]
        fn requested_ids_must_exist() {
            let mut rng = StdRng::seed_from_u64(3);
            let result = select_session_cards(&[1, 2], Some(vec![2, 9]), None, &mut rng);
            assert_eq!(result, Err("Card 9 not found".to_string()));
        }

        #[test]
        fn empty_selection_fails() {
            let mut rng = StdRng::seed_from_u64(3);
            assert!(select_session_cards(&[], None, None, &mut rng).is_err());
            assert!(select_session_cards(&[1], None, Some(0), &mut rng).is_err());
        }

        #[test]
        fn explicit_session_keeps_given_order() {
            let db = Database::open(":memory:").unwrap();
            db.init().unwrap();
            let a = db.add_card("qa", "aa", None).unwrap();
            let b = db.add_card("qb", "ab", None).unwrap();

            let payload = explicit_session(&db, StudyMode::ForcedChoice, &[b, a]).unwrap();
            let ids: Vec<i64> = payload.cards.iter().map(|c| c.id).collect();
            assert_eq!(ids, vec![b, a]);
            assert_eq!(payload.session.session_type, StudyMode::ForcedChoice);
            assert_eq!(payload.session.card_ids, vec![b, a]);
        }

        #[test]
        fn explicit_session_rejects_unknown_card() {
            let db = Database::open(":memory:").unwrap();
            db.init().unwrap();
            assert!(explicit_session(&db, StudyMode::Recognition, &[5]).is_err());
            assert!(db.list_sessions(None, false).unwrap().is_empty());
        }
    }

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn parse_init_command() {
            let cli = Cli::try_parse_from(["studydeck", "init"]).unwrap();
            assert!(!cli.json);
            assert!(!cli.verbose);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_global_flags() {
            let cli = Cli::try_parse_from(["studydeck", "--json", "stats"]).unwrap();
            assert!(cli.json);

            let cli = Cli::try_parse_from(["studydeck", "stats", "--json", "-v"]).unwrap();
            assert!(cli.json);
            assert!(cli.verbose);
        }

        #[test]
        fn parse_card_add() {
            let cli = Cli::try_parse_from(["studydeck", "card", "add", "2+2", "4"]).unwrap();
            match cli.command {
                Commands::Card(CardCommands::Add {
                    front,
                    back,
                    difficulty,
                }) => {
                    assert_eq!(front, "2+2");
                    assert_eq!(back, "4");
                    assert!(difficulty.is_none());
                }
                _ => panic!("Expected Card Add command"),
            }
        }

        #[test]
        fn parse_card_add_with_difficulty() {
            let cli = Cli::try_parse_from(["studydeck", "card", "add", "q", "a", "-d", "3"])
                .unwrap();
            match cli.command {
                Commands::Card(CardCommands::Add { difficulty, .. }) => {
                    assert_eq!(difficulty, Some(3));
                }
                _ => panic!("Expected Card Add command"),
            }
        }

        #[test]
        fn parse_card_add_rejects_out_of_range_difficulty() {
            let result =
                Cli::try_parse_from(["studydeck", "card", "add", "q", "a", "--difficulty", "9"]);
            assert!(result.is_err());
        }

        #[test]
        fn parse_card_show_and_delete() {
            let cli = Cli::try_parse_from(["studydeck", "card", "show", "42"]).unwrap();
            assert!(matches!(
                cli.command,
                Commands::Card(CardCommands::Show { id: 42 })
            ));

            let cli = Cli::try_parse_from(["studydeck", "card", "delete", "5"]).unwrap();
            assert!(matches!(
                cli.command,
                Commands::Card(CardCommands::Delete { id: 5 })
            ));
        }

        #[test]
        fn parse_session_new() {
            let cli = Cli::try_parse_from([
                "studydeck",
                "session",
                "new",
                "forced_choice",
                "--cards",
                "1,2,3",
                "--limit",
                "2",
            ])
            .unwrap();
            match cli.command {
                Commands::Session(SessionCommands::New { mode, cards, limit }) => {
                    assert_eq!(mode, "forced_choice");
                    assert_eq!(cards, Some("1,2,3".to_string()));
                    assert_eq!(limit, Some(2));
                }
                _ => panic!("Expected Session New command"),
            }
        }

        #[test]
        fn parse_session_list_filters() {
            let cli = Cli::try_parse_from([
                "studydeck",
                "session",
                "list",
                "--mode",
                "recognition",
                "--pending",
            ])
            .unwrap();
            match cli.command {
                Commands::Session(SessionCommands::List { mode, pending }) => {
                    assert_eq!(mode, Some("recognition".to_string()));
                    assert!(pending);
                }
                _ => panic!("Expected Session List command"),
            }
        }

        #[test]
        fn parse_study_command() {
            let cli = Cli::try_parse_from(["studydeck", "study", "timed_forced_choice"]).unwrap();
            match cli.command {
                Commands::Study { mode, cards } => {
                    assert_eq!(mode, "timed_forced_choice");
                    assert!(cards.is_none());
                }
                _ => panic!("Expected Study command"),
            }
        }

        #[test]
        fn parse_study_accepts_unknown_mode() {
            // Rejected later by the study screen, not by argument parsing
            let cli = Cli::try_parse_from(["studydeck", "study", "unknown-mode"]).unwrap();
            assert!(matches!(cli.command, Commands::Study { .. }));
        }

        #[test]
        fn parse_missing_required_arg_fails() {
            assert!(Cli::try_parse_from(["studydeck", "card", "add", "front"]).is_err());
            assert!(Cli::try_parse_from(["studydeck", "study"]).is_err());
            assert!(Cli::try_parse_from(["studydeck", "session", "show"]).is_err());
        }

        #[test]
        fn parse_invalid_command_fails() {
            assert!(Cli::try_parse_from(["studydeck", "invalid"]).is_err());
        }
    }

    mod db_path_tests {
        use super::*;

        #[test]
        fn env_path_wins() {
            let path = resolve_db_path(
                Some("/tmp/test_studydeck.db".to_string()),
                Some(PathBuf::from("/home/me/.config")),
            );
            assert_eq!(path, PathBuf::from("/tmp/test_studydeck.db"));
        }

        #[test]
        fn default_lives_under_config_dir() {
            let path = resolve_db_path(None, Some(PathBuf::from("/home/me/.config")));
            assert_eq!(
                path,
                PathBuf::from("/home/me/.config/studydeck/studydeck.db")
            );
        }

        #[test]
        fn missing_config_dir_falls_back_to_cwd() {
            let path = resolve_db_path(None, None);
            assert_eq!(path, PathBuf::from("./studydeck/studydeck.db"));
        }
    }
}
