use anyhow::{Context, Result};
use baasha::{
    assistants::AssistantClient,
    configs::AppConfig,
    languages::Language,
    models::{DryRunBackend, ModelBackend, OpenAiBackend},
    sessions::{SessionController, SessionState, TranslationOutcome},
};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::{fmt::Write as _, path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinSet,
};
use tokio_stream::wrappers::LinesStream;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "baasha")]
#[command(about = "Predict what you mean and learn how to say it", long_about = None)]
struct Args {
    #[arg(value_parser = check_file_exists, help = "Path to TOML configuration file")]
    config_path: Option<PathBuf>,

    #[arg(short, long, help = "Dry run mode (no model calls)")]
    dry_run: bool,

    #[arg(long, help = "Language you type in")]
    source: Option<Language>,

    #[arg(long, help = "Language to translate into")]
    target: Option<Language>,
}

fn check_file_exists(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("File '{}' not found", s))
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Text(String),
    Pick(usize),
    Translate,
    Clear,
    Source(Language),
    Target(Language),
    Languages,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Text(line.to_string()));
    };

    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    let arg = arg.trim();
    let language = || arg.parse::<Language>().map_err(|e| e.to_string());

    match name {
        "pick" => arg
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Command::Pick)
            .ok_or_else(|| format!("'/pick' needs a suggestion number, got '{}'", arg)),
        "translate" => Ok(Command::Translate),
        "clear" => Ok(Command::Clear),
        "source" => language().map(Command::Source),
        "target" => language().map(Command::Target),
        "langs" => Ok(Command::Languages),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command '/{}'", other)),
    }
}

fn render(state: &SessionState) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "🌐 {} → {}",
        state.source_language, state.target_language
    );

    if state.is_predicting {
        let _ = writeln!(out, "   … predicting");
    }
    for (i, s) in state.suggestions.iter().enumerate() {
        let _ = writeln!(out, "   [{}] {}  ({})", i + 1, s.native_script, s.anglicised_script);
        let _ = writeln!(out, "       {}", s.english_intent);
    }

    if let Some(t) = state.translation.as_ref().filter(|_| !state.is_translating) {
        let _ = writeln!(out, "\n⭐ The Super Star Version");
        let _ = writeln!(out, "   {}", t.native_script);
        let _ = writeln!(out, "   {}", t.anglicised_script);
        let _ = writeln!(out, "   Nuance & meaning: {}", t.meaning);
        let _ = writeln!(out, "   Super Star tip:   {}", t.learning_note);
    }

    out
}

fn print_help() {
    println!("Type what you want to say. Each line replaces the current text.");
    println!("  /pick N          translate suggestion N");
    println!("  /translate       translate the current text as typed");
    println!("  /clear           start over");
    println!("  /source LANG     change the language you type in");
    println!("  /target LANG     change the language to translate into");
    println!("  /langs           list supported languages");
    println!("  /quit            leave\n");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("baasha=info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    println!("🌟 BAASHA AI · For Super Stars");

    let mut config = match &args.config_path {
        Some(path) => {
            println!("📋 Config: {}", path.display());
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    if let Some(source) = args.source {
        config.session.source_language = source;
    }
    if let Some(target) = args.target {
        config.session.target_language = target;
    }

    if args.dry_run {
        println!("🔍 Mode: DRY RUN\n");
        run(DryRunBackend, &config).await
    } else {
        println!("🤖 Model: {}\n", config.llm.model);
        let backend = OpenAiBackend::from_config(&config.llm)
            .context("Cannot start without model credentials")?;
        run(backend, &config).await
    }
}

fn log_translation(done: Result<TranslationOutcome, tokio::task::JoinError>) {
    match done {
        Ok(outcome) => tracing::debug!(?outcome, "translation finished"),
        Err(e) => tracing::warn!(error = %e, "translation task failed"),
    }
}

/// Waits for translations still in flight so their results are not lost on exit.
async fn finish_translations(translations: &mut JoinSet<TranslationOutcome>) {
    while let Some(done) = translations.join_next().await {
        log_translation(done);
    }
}

async fn run<B: ModelBackend + 'static>(backend: B, config: &AppConfig) -> Result<()> {
    let client = Arc::new(AssistantClient::new(backend, config.llm.timeout()));
    let session = Arc::new(SessionController::new(client, config));
    let mut state_rx = session.subscribe();
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    print_help();

    let mut translations: JoinSet<TranslationOutcome> = JoinSet::new();
    let mut spinner: Option<ProgressBar> = None;
    let mut last_view = String::new();

    loop {
        tokio::select! {
            line = lines.next() => {
                let Some(line) = line else { break };
                let line = line.context("Failed to read input")?;

                let command = match parse_command(line.trim_end()) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("⚠️  {}", e);
                        continue;
                    }
                };

                match command {
                    Command::Text(text) => {
                        session.set_input_text(text);
                    }
                    Command::Pick(n) => {
                        let Some(pick) = session.state().suggestions.get(n - 1).cloned() else {
                            println!("⚠️  No suggestion #{}", n);
                            continue;
                        };
                        let session = Arc::clone(&session);
                        translations.spawn(async move { session.select_suggestion(&pick).await });
                    }
                    Command::Translate => {
                        let session = Arc::clone(&session);
                        translations.spawn(async move { session.manual_translate().await });
                    }
                    Command::Clear => session.clear(),
                    Command::Source(language) => session.set_source_language(language),
                    Command::Target(language) => session.set_target_language(language),
                    Command::Languages => {
                        let names: Vec<_> = Language::ALL.iter().map(Language::as_str).collect();
                        println!("{}", names.join(", "));
                    }
                    Command::Help => print_help(),
                    Command::Quit => break,
                }
            }
            Some(done) = translations.join_next(), if !translations.is_empty() => {
                log_translation(done);
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();

                match (&spinner, state.is_translating) {
                    (None, true) => {
                        let pb = ProgressBar::new_spinner();
                        pb.set_style(
                            ProgressStyle::default_spinner()
                                .template("{spinner:.yellow} {msg}")
                                .context("Invalid spinner template")?,
                        );
                        pb.set_message("Crafting excellence...");
                        pb.enable_steady_tick(Duration::from_millis(100));
                        spinner = Some(pb);
                    }
                    (Some(pb), false) => {
                        pb.finish_and_clear();
                        spinner = None;
                    }
                    _ => {}
                }

                let view = render(&state);
                if view != last_view {
                    match &spinner {
                        Some(pb) => pb.suspend(|| println!("{}", view)),
                        None => println!("{}", view),
                    }
                    last_view = view;
                }
            }
        }
    }

    finish_translations(&mut translations).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let view = render(&session.state());
    if view != last_view {
        println!("{}", view);
    }
    println!("👋 Bye");

    Ok(())
}
