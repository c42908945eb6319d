// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use srtvocab::app_config::{LogLevel, Settings, Theme};
use srtvocab::database::{Repository, SubtitleFileRecord};
use srtvocab::errors::VocabError;
use srtvocab::export::export_words;
use srtvocab::file_utils::FileManager;
use srtvocab::language_utils::is_valid_locale;
use srtvocab::providers::create_provider;
use srtvocab::settings_manager::SettingsManager;
use srtvocab::vocabulary::{ReviewBatch, VocabularyPipeline};
use srtvocab::worker::{JobId, PipelineEvent, PipelineWorker, ReviewDecision};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}

/// CLI Wrapper for Theme to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTheme {
    Light,
    Dark,
}

impl From<CliTheme> for Theme {
    fn from(cli_theme: CliTheme) -> Self {
        match cli_theme {
            CliTheme::Light => Theme::Light,
            CliTheme::Dark => Theme::Dark,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract vocabulary from subtitle files or directories
    Process(ProcessArgs),

    /// Manage API keys
    #[command(subcommand)]
    Keys(KeysCommand),

    /// Manage known words
    #[command(subcommand)]
    Known(KnownCommand),

    /// Browse and maintain the stored vocabulary
    #[command(subcommand)]
    Library(LibraryCommand),

    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Generate shell completions for srtvocab
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct ProcessArgs {
    /// Subtitle files or directories to process
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Accept every review batch without marking words known
    #[arg(short, long)]
    yes: bool,

    /// Stop after showing the review batch; nothing is stored
    #[arg(long, conflicts_with = "yes")]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Add an API key to the rotation
    Add { key: String },
    /// Remove an API key
    Remove { key: String },
    /// List configured keys, masked
    List,
}

#[derive(Subcommand, Debug)]
enum KnownCommand {
    /// Mark words as known
    Add {
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Forget a known word
    Remove { word: String },
    /// List known words
    List {
        /// Only show words containing this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Check whether a word is known
    Check { word: String },
}

#[derive(Subcommand, Debug)]
enum LibraryCommand {
    /// List stored subtitle files
    List,
    /// Show the words of a subtitle file
    Words {
        id: i64,
        /// Include words that have since been marked known
        #[arg(long)]
        all: bool,
    },
    /// Delete a subtitle file and its words
    Delete { id: i64 },
    /// Search words across all files
    Search { query: String },
    /// Export a file's words as tab-separated values
    Export {
        id: i64,
        /// Directory to write into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Look up missing meanings of a file's words again
    Refetch { id: i64 },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Set the UI theme
    Theme {
        #[arg(value_enum)]
        theme: CliTheme,
    },
    /// Set the UI language (locale such as `en` or `fa`)
    Language { language: String },
    /// Set the language of the subtitle files
    SrtLanguage { language: String },
    /// Set the language meanings are written in
    TranslateLanguage { language: String },
}

/// srtvocab - vocabulary lists from subtitle files
///
/// Extracts the words worth learning from .srt files with a language model,
/// looks up their meanings and keeps them in a local library.
#[derive(Parser, Debug)]
#[command(name = "srtvocab")]
#[command(version)]
#[command(about = "Build vocabulary lists from subtitle files")]
#[command(long_about = "srtvocab cleans subtitle files, asks a language model for the words worth learning,
skips the words you already know and stores meanings with example sentences.

EXAMPLES:
    srtvocab keys add <KEY>                     # Add an API key to the rotation
    srtvocab process movie.srt                  # Extract, review and store words
    srtvocab process -y season1/                # Process a directory without review
    srtvocab process --dry-run movie.srt        # Only show what would be reviewed
    srtvocab library list                       # List stored subtitle files
    srtvocab library words 3                    # Show the words of file #3
    srtvocab library export 3 -o ~/anki         # Export file #3 as TSV
    srtvocab known add hello world              # Mark words as known
    srtvocab completions bash > srtvocab.bash   # Generate bash completions

CONFIGURATION:
    Settings are stored in the user configuration directory by default. Use
    --settings to point at a different file. A missing file is created with
    defaults on first use.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Settings file path
    #[arg(long, global = true, env = "SRTVOCAB_SETTINGS")]
    settings: Option<PathBuf>,

    /// Database file path
    #[arg(long, global = true, env = "SRTVOCAB_DATABASE")]
    database: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌",
            Level::Warn => "🚧",
            Level::Info => "✨",
            Level::Debug => "🔍",
            Level::Trace => "📋",
        }
    }

    // @returns: ANSI color code for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the settings file says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "srtvocab", &mut std::io::stdout());
        return Ok(());
    }

    let settings_path = cli.settings.clone().unwrap_or_else(Settings::default_path);
    let settings = Arc::new(SettingsManager::open(&settings_path)?);
    let snapshot = settings.settings();

    let log_level = cli.log_level.map(LogLevel::from).unwrap_or(snapshot.log_level);
    log::set_max_level(level_filter(log_level));
    debug!("Using settings file {:?}", settings_path);

    if let Err(e) = snapshot.validate() {
        return Err(e.context(format!("Invalid settings in {:?}", settings_path)));
    }

    match cli.command {
        Commands::Keys(command) => run_keys(&settings, command),
        Commands::Settings(command) => run_settings(&settings, command),
        command => {
            let database_path = cli.database.or(snapshot.database_path);
            let repository = match database_path {
                Some(path) => Repository::open(path)?,
                None => Repository::new_default()?,
            };
            match command {
                Commands::Process(args) => run_process(settings, repository, args).await,
                Commands::Known(command) => run_known(&repository, command).await,
                Commands::Library(command) => run_library(settings, repository, command).await,
                Commands::Keys(_) | Commands::Settings(_) | Commands::Completions { .. } => Ok(()),
            }
        }
    }
}

// =========================================================================
// process
// =========================================================================

/// Expand the given paths into the subtitle files to process
fn collect_subtitle_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();
    for path in paths {
        if FileManager::dir_exists(path) {
            let found = FileManager::find_files(path, "srt")?;
            info!("Found {} subtitle files in {:?}", found.len(), path);
            candidates.extend(found);
        } else if FileManager::is_srt_file(path) {
            candidates.push(path.clone());
        } else {
            warn!("Skipping {:?}: not an existing .srt file or directory", path);
        }
    }

    // A file named directly and again through its directory is processed once
    let mut seen = HashSet::new();
    let files = candidates
        .into_iter()
        .filter(|path| seen.insert(std::fs::canonicalize(path).unwrap_or_else(|_| path.clone())))
        .collect();
    Ok(files)
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[derive(Debug, Default)]
struct ProcessTally {
    completed: usize,
    skipped: usize,
    failed: usize,
    words_stored: usize,
}

async fn run_process(settings: Arc<SettingsManager>, repository: Repository, args: ProcessArgs) -> Result<()> {
    let files = collect_subtitle_files(&args.paths)?;
    if files.is_empty() {
        warn!("No subtitle files to process");
        return Ok(());
    }
    if !settings.has_api_keys() {
        return Err(VocabError::NoCredential.into());
    }

    let provider = create_provider(&settings.settings());
    info!("Processing {} files with {}", files.len(), provider.name());

    let (worker, mut events) = PipelineWorker::new(provider, settings, repository);
    let cancel = worker.cancellation_token();
    let handles: Vec<_> = files.into_iter().map(|path| worker.spawn(path).1).collect();
    // Runs hold their own senders; the channel closes once the last one ends
    drop(worker);

    let multi_progress = MultiProgress::new();
    let mut bars: HashMap<JobId, ProgressBar> = HashMap::new();
    let mut tally = ProcessTally::default();

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                warn!("Interrupted, cancelling all runs");
                cancel.cancel();
                continue;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let job = event.job();
        match event {
            PipelineEvent::Started { file, .. } => {
                let bar = multi_progress.add(ProgressBar::new_spinner());
                bar.set_style(spinner_style());
                bar.set_prefix(file);
                bar.set_message("extracting words");
                bar.enable_steady_tick(Duration::from_millis(120));
                bars.insert(job, bar);
            }
            PipelineEvent::ReviewReady { batch, reply, .. } => {
                if let Some(bar) = bars.get(&job) {
                    bar.set_message(format!("{} words to review", batch.words.len()));
                }
                let decision = if args.dry_run {
                    multi_progress.suspend(|| print_review_batch(&batch));
                    ReviewDecision::Skip
                } else if args.yes {
                    ReviewDecision::Continue { mark_known: Vec::new() }
                } else {
                    match review_interactively(&multi_progress, &batch, &cancel).await? {
                        Some(decision) => decision,
                        // Dropping the reply ends the run as cancelled
                        None => continue,
                    }
                };
                answer_review(reply, decision);
            }
            PipelineEvent::FetchingMeanings { words, .. } => {
                if let Some(bar) = bars.get(&job) {
                    bar.set_message(format!("fetching meanings for {} words", words));
                }
            }
            PipelineEvent::Completed { summary, .. } => {
                tally.completed += 1;
                tally.words_stored += summary.words_stored;
                let message = match summary.subtitle_id {
                    Some(id) if summary.meanings_missing > 0 => format!(
                        "stored {} words as #{} ({} without meaning)",
                        summary.words_stored, id, summary.meanings_missing
                    ),
                    Some(id) => format!("stored {} words as #{}", summary.words_stored, id),
                    None => "every word marked known, nothing stored".to_string(),
                };
                finish_bar(bars.remove(&job), message);
            }
            PipelineEvent::Skipped { .. } => {
                tally.skipped += 1;
                finish_bar(bars.remove(&job), "skipped".to_string());
            }
            PipelineEvent::Failed { error, .. } => {
                tally.failed += 1;
                finish_bar(bars.remove(&job), format!("failed: {}", error));
            }
        }
    }

    for handle in futures::future::join_all(handles).await {
        if let Err(e) = handle {
            error!("Pipeline task ended abnormally: {}", e);
        }
    }

    info!(
        "Done: {} completed, {} skipped, {} failed, {} words stored",
        tally.completed, tally.skipped, tally.failed, tally.words_stored
    );
    if tally.failed > 0 && tally.completed == 0 && tally.skipped == 0 {
        return Err(anyhow!("No subtitle file was processed successfully"));
    }
    Ok(())
}

fn answer_review(reply: oneshot::Sender<ReviewDecision>, decision: ReviewDecision) {
    if reply.send(decision).is_err() {
        debug!("Run ended before its review was answered");
    }
}

fn finish_bar(bar: Option<ProgressBar>, message: String) {
    if let Some(bar) = bar {
        bar.finish_with_message(message);
    }
}

fn print_review_batch(batch: &ReviewBatch) {
    println!();
    println!("{} ({} dialogue lines)", batch.file_name, batch.line_count);
    for (index, word) in batch.words.iter().enumerate() {
        println!("  {:>3}. {}", index + 1, word);
    }
}

/// Show a batch and ask which words are already known.
///
/// Returns `None` when the prompt was interrupted.
async fn review_interactively(
    multi_progress: &MultiProgress,
    batch: &ReviewBatch,
    cancel: &CancellationToken,
) -> Result<Option<ReviewDecision>> {
    multi_progress.suspend(|| {
        print_review_batch(batch);
        print!("Numbers of words you already know (e.g. 1 4 7), `s` to skip, Enter for none: ");
        let _ = std::io::stdout().flush();
    });

    let read_line = read_line_detached(|line| std::io::stdin().read_line(line));

    let line = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling all runs");
            cancel.cancel();
            return Ok(None);
        }
        line = read_line => line.context("Review prompt failed")?.context("Failed to read from stdin")?,
    };

    let decision = parse_review_answer(&line, &batch.words);
    debug!("Review of {} answered with {:?}", batch.file_name, decision);
    Ok(Some(decision))
}

/// Run a blocking line read on a detached thread.
///
/// Dropping the receiver abandons the read; the thread never holds up runtime
/// shutdown the way a blocking-pool task would.
fn read_line_detached<F>(read: F) -> oneshot::Receiver<std::io::Result<String>>
where
    F: FnOnce(&mut String) -> std::io::Result<usize> + Send + 'static,
{
    let (line_tx, line_rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = line_tx.send(read(&mut line).map(|_| line));
    });
    line_rx
}

/// Turn a review answer into a decision. Numbers outside the batch are ignored.
fn parse_review_answer(answer: &str, words: &[String]) -> ReviewDecision {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("s") || answer.eq_ignore_ascii_case("skip") {
        return ReviewDecision::Skip;
    }

    let mut mark_known: Vec<String> = Vec::new();
    for token in answer.split(|c: char| c == ',' || c.is_whitespace()) {
        let Ok(number) = token.parse::<usize>() else {
            continue;
        };
        if let Some(word) = number.checked_sub(1).and_then(|i| words.get(i)) {
            if !mark_known.contains(word) {
                mark_known.push(word.clone());
            }
        }
    }
    ReviewDecision::Continue { mark_known }
}

// =========================================================================
// keys / settings
// =========================================================================

fn run_keys(settings: &SettingsManager, command: KeysCommand) -> Result<()> {
    match command {
        KeysCommand::Add { key } => {
            if settings.add_api_key(&key)? {
                println!("Key added ({} configured)", settings.api_key_count());
            } else {
                println!("Key is empty or already configured");
            }
        }
        KeysCommand::Remove { key } => {
            if settings.remove_api_key(&key)? {
                println!("Key removed ({} left)", settings.api_key_count());
            } else {
                println!("Key not found");
            }
        }
        KeysCommand::List => {
            let keys = settings.masked_api_keys();
            if keys.is_empty() {
                println!("No API keys configured");
            }
            for (index, key) in keys.iter().enumerate() {
                println!("{:>3}. {}", index + 1, key);
            }
        }
    }
    Ok(())
}

fn run_settings(settings: &SettingsManager, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let current = settings.settings();
            println!("Settings file:      {}", settings.path().display());
            println!("Theme:              {}", current.theme);
            println!("Language:           {}", current.language);
            println!("Subtitle language:  {}", current.srt_language);
            println!("Meaning language:   {}", current.translate_language);
            println!("Provider:           {}", current.provider);
            println!("Model:              {}", current.get_model());
            println!("Endpoint:           {}", current.get_endpoint());
            println!("Meaning batch size: {}", current.meaning_batch_size);
            println!("API keys:           {}", settings.masked_api_keys().join(", "));
        }
        SettingsCommand::Theme { theme } => {
            settings.set_theme(theme.into())?;
            println!("Theme set to {}", settings.theme());
        }
        SettingsCommand::Language { language } => {
            if !is_valid_locale(&language) {
                return Err(anyhow!("Unsupported locale: {}", language));
            }
            settings.set_language(&language)?;
            println!("Language set to {}", language);
        }
        SettingsCommand::SrtLanguage { language } => {
            settings.set_srt_language(&language)?;
            println!("Subtitle language set to {}", language);
        }
        SettingsCommand::TranslateLanguage { language } => {
            settings.set_translate_language(&language)?;
            println!("Meaning language set to {}", language);
        }
    }
    Ok(())
}

// =========================================================================
// known / library
// =========================================================================

async fn run_known(repository: &Repository, command: KnownCommand) -> Result<()> {
    match command {
        KnownCommand::Add { words } => {
            let added = repository.add_known_words(words).await?;
            println!("{} new known words", added);
        }
        KnownCommand::Remove { word } => {
            if repository.remove_known_word(&word).await? {
                println!("Removed {}", word);
            } else {
                println!("{} was not known", word);
            }
        }
        KnownCommand::List { filter } => {
            let words = match filter {
                Some(query) => repository.filter_known_words(&query).await?,
                None => repository.list_known_words().await?,
            };
            for word in &words {
                println!("{}", word);
            }
            info!("{} known words", words.len());
        }
        KnownCommand::Check { word } => {
            let known = repository.is_word_known(&word).await?;
            println!("{} is {}", word, if known { "known" } else { "not known" });
        }
    }
    Ok(())
}

async fn run_library(settings: Arc<SettingsManager>, repository: Repository, command: LibraryCommand) -> Result<()> {
    match command {
        LibraryCommand::List => {
            let files = repository.list_subtitle_files().await?;
            if files.is_empty() {
                println!("The library is empty");
            }
            for file in files {
                let count = repository.count_words(file.id).await?;
                println!("{:>5}  {} ({} words)", file.id, file.name, count);
            }
        }
        LibraryCommand::Words { id, all } => {
            let file = require_subtitle(&repository, id).await?;
            let mut words = repository.words_by_subtitle(id).await?;
            if !all {
                let known = repository.list_known_words().await?;
                words.retain(|w| !known.contains(&w.word.to_lowercase()));
            }
            println!("{} ({} words)", file.name, words.len());
            for word in &words {
                let meaning = word.decoded();
                println!("  {}: {}", word.word, meaning.meaning);
                if !meaning.examples.is_empty() {
                    println!("      {}", meaning.examples);
                }
            }
        }
        LibraryCommand::Delete { id } => {
            if repository.delete_subtitle_file(id).await? {
                println!("Deleted subtitle file #{}", id);
            } else {
                return Err(anyhow!("No subtitle file with id {}", id));
            }
        }
        LibraryCommand::Search { query } => {
            let words = repository.search_words(&query).await?;
            for word in &words {
                println!("{}: {}", word.word, word.decoded().meaning);
            }
            info!("{} matches for {:?}", words.len(), query);
        }
        LibraryCommand::Export { id, output } => {
            let file = require_subtitle(&repository, id).await?;
            let words = repository.words_by_subtitle(id).await?;
            FileManager::ensure_dir(&output)?;
            let path = export_words(&output, &file.name, &words)?;
            println!("Exported {} words to {}", words.len(), path.display());
        }
        LibraryCommand::Refetch { id } => {
            require_subtitle(&repository, id).await?;
            let provider = create_provider(&settings.settings());
            let pipeline = VocabularyPipeline::new(provider, settings, repository);
            let summary = pipeline.refetch_missing(id).await?;
            println!("Updated {} of {} missing meanings", summary.updated, summary.requested);
        }
    }
    Ok(())
}

async fn require_subtitle(repository: &Repository, id: i64) -> Result<SubtitleFileRecord> {
    repository
        .get_subtitle_file(id)
        .await?
        .ok_or_else(|| anyhow!("No subtitle file with id {}", id))
}
