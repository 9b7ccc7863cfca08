use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use voxlate::playback::{self, PlaybackController, PlaybackSettings};
use voxlate::recognition::{
    self, AdapterEvent, Generation, RecognitionAdapter, RecognitionEvent,
};
use voxlate::session::{SessionController, SessionSnapshot, SessionState, format_elapsed};
use voxlate::{Config, Intent, LanguageTag, RemoteTranslator, SUPPORTED_LANGUAGES, TranslationResolver};

/// Voxlate - speak, translate, and hear the translation
#[derive(Parser)]
#[command(name = "voxlate", version, about)]
struct Cli {
    /// Spoken language (e.g. "en-US")
    #[arg(long, global = true)]
    from: Option<String>,

    /// Language to translate into (e.g. "es-ES")
    #[arg(long, global = true)]
    to: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable microphone and speaker (translation still works)
    #[arg(long, env = "VOXLATE_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List supported languages
    Languages,
    /// Translate text once and exit
    Translate {
        /// Text to translate
        text: String,
    },
    /// Capture one utterance and print the transcript
    TestMic {
        /// Stop listening after this many seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },
    /// Speak text in the target language
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hola, ¿cómo estás?")]
        text: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,voxlate=info",
        1 => "info,voxlate=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_with_options(cli.disable_voice)?;
    if let Some(from) = cli.from.as_deref() {
        config.languages.source = LanguageTag::parse(from)?;
    }
    if let Some(to) = cli.to.as_deref() {
        config.languages.target = LanguageTag::parse(to)?;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::Languages) => {
            print_languages();
            Ok(())
        }
        Some(Command::Translate { text }) => translate_once(&config, &text).await,
        Some(Command::TestMic { duration }) => test_mic(&config, duration).await,
        Some(Command::TestTts { text }) => test_tts(&config, &text).await,
        None => interactive(&config).await,
    }
}

fn print_languages() {
    for language in SUPPORTED_LANGUAGES {
        println!("{:<6} {}", language.code, language.name);
    }
}

fn resolver(config: &Config) -> anyhow::Result<TranslationResolver> {
    let translator = RemoteTranslator::new(config.translate.url.clone(), config.translate.timeout)?;
    Ok(TranslationResolver::new(Arc::new(translator)))
}

/// One-shot translation
async fn translate_once(config: &Config, text: &str) -> anyhow::Result<()> {
    let outcome = resolver(config)?
        .resolve(text, &config.languages.source, &config.languages.target)
        .await;

    if outcome.was_fallback {
        println!("{} (offline fallback)", outcome.text);
    } else {
        println!("{}", outcome.text);
    }
    Ok(())
}

/// Capture a single utterance through the recognition adapter
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    let capability = recognition::probe(config);
    let Some(recognizer) = capability.recognizer() else {
        anyhow::bail!(
            "speech recognition unavailable: {}",
            capability.unavailable_reason().unwrap_or("unknown")
        );
    };

    let generation = Generation::default().next();
    let mut adapter =
        RecognitionAdapter::configure(&**recognizer, config.languages.source.clone(), generation)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<AdapterEvent>();
    adapter.start(
        generation,
        Arc::new(move |event| {
            let _ = tx.send(event);
        }),
    )?;

    println!(
        "Listening in {} for up to {duration}s, speak now...",
        config.languages.source.display_name()
    );

    let deadline = tokio::time::sleep(Duration::from_secs(duration));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline, if adapter.is_active() => {
                println!("Time's up, transcribing...");
                adapter.stop();
            }
            event = rx.recv() => match event.map(|e| e.event) {
                Some(RecognitionEvent::Result(result)) => {
                    println!("Heard: {} ({:.0}%)", result.text, result.confidence * 100.0);
                }
                Some(RecognitionEvent::Error(code)) => println!("Recognition error: {code}"),
                Some(RecognitionEvent::End) | None => break,
            },
        }
    }

    adapter.mark_ended();
    Ok(())
}

/// Speak text through the playback controller
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    let synthesizer = playback::probe(config);
    if synthesizer.is_none() {
        println!("No speech synthesis available, playback will be simulated");
    }

    let controller =
        PlaybackController::new(synthesizer, PlaybackSettings::from_config(config));
    let job = controller.begin(text, &config.languages.target)?;
    println!(
        "Speaking in {} (voice: {})...",
        config.languages.target.display_name(),
        job.utterance().voice.as_deref().unwrap_or("default")
    );
    job.run().await?;
    println!("Done");
    Ok(())
}

/// Interactive session reading intents from stdin
async fn interactive(config: &Config) -> anyhow::Result<()> {
    let player = PlaybackController::new(
        playback::probe(config),
        PlaybackSettings::from_config(config),
    );
    let mut controller = SessionController::new(
        config.languages.source.clone(),
        config.languages.target.clone(),
        resolver(config)?,
        player,
    );
    controller.set_capability(recognition::probe(config));

    let view = controller.subscribe();
    let render_task = tokio::spawn(render(controller.subscribe()));
    let (intents, intent_rx) = mpsc::channel(16);
    let controller_task = tokio::spawn(controller.run(intent_rx));

    print_help();
    render_snapshot(None, &view.borrow().clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(ReplCommand::Intent(intent)) => {
                if intents.send(intent).await.is_err() {
                    break;
                }
            }
            Ok(ReplCommand::History) => print_history(&view.borrow()),
            Ok(ReplCommand::Languages) => print_languages(),
            Ok(ReplCommand::Help) => print_help(),
            Ok(ReplCommand::Nothing) => {}
            Ok(ReplCommand::Quit) => break,
            Err(msg) => println!("{msg}"),
        }
    }

    drop(intents);
    controller_task.await?;
    render_task.abort();
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Intent(Intent),
    History,
    Languages,
    Help,
    Nothing,
    Quit,
}

fn parse_line(line: &str) -> Result<ReplCommand, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(ReplCommand::Nothing);
    };
    let arg = words.next();

    let language = |arg: Option<&str>| {
        let tag = arg.ok_or_else(|| format!("usage: {command} <language tag>"))?;
        LanguageTag::parse(tag).map_err(|e| e.to_string())
    };

    Ok(match command.to_ascii_lowercase().as_str() {
        "start" | "s" => ReplCommand::Intent(Intent::Start),
        "stop" | "x" => ReplCommand::Intent(Intent::Stop),
        "swap" => ReplCommand::Intent(Intent::SwapLanguages),
        "from" => ReplCommand::Intent(Intent::SetSourceLanguage(language(arg)?)),
        "to" => ReplCommand::Intent(Intent::SetTargetLanguage(language(arg)?)),
        "play" | "p" => ReplCommand::Intent(Intent::Play),
        "reset" => ReplCommand::Intent(Intent::Reset),
        "history" | "h" => ReplCommand::History,
        "languages" => ReplCommand::Languages,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => return Err(format!("unknown command {other:?}, try \"help\"")),
    })
}

fn print_help() {
    println!("Commands:");
    println!("  start | stop          begin or cancel listening");
    println!("  play                  speak the translation");
    println!("  swap                  exchange languages");
    println!("  from <tag> | to <tag> change a language (e.g. \"to fr-FR\")");
    println!("  history | reset       show or clear recent translations");
    println!("  languages | quit");
}

fn print_history(snapshot: &SessionSnapshot) {
    if snapshot.history.is_empty() {
        println!("No translations yet");
        return;
    }
    for entry in &snapshot.history {
        println!(
            "#{} {} [{} -> {}] {} => {}",
            entry.id,
            entry.timestamp.format("%H:%M:%S"),
            entry.source_language,
            entry.target_language,
            entry.original_text,
            entry.translated_text
        );
    }
}

async fn render(mut snapshots: watch::Receiver<SessionSnapshot>) {
    let mut previous = snapshots.borrow_and_update().clone();
    while snapshots.changed().await.is_ok() {
        let current = snapshots.borrow_and_update().clone();
        render_snapshot(Some(&previous), &current);
        previous = current;
    }
}

fn render_snapshot(previous: Option<&SessionSnapshot>, current: &SessionSnapshot) {
    let session = &current.session;
    let languages_changed = previous.is_none_or(|p| {
        p.session.source_language != session.source_language
            || p.session.target_language != session.target_language
    });
    if languages_changed {
        println!(
            "[{} -> {}]",
            session.source_language.display_name(),
            session.target_language.display_name()
        );
    }

    if previous.is_some_and(|p| p.session.elapsed_seconds != session.elapsed_seconds)
        && session.state == SessionState::Listening
        && session.elapsed_seconds > 0
    {
        println!("  recording {}", format_elapsed(session.elapsed_seconds));
    }

    let state_changed = previous.is_none_or(|p| p.session.state != session.state);
    if !state_changed {
        if previous.is_some_and(|p| p.fault != current.fault)
            && let Some(fault) = &current.fault
        {
            println!("! {fault}");
        }
        return;
    }

    match session.state {
        SessionState::Listening => println!("● listening..."),
        SessionState::Translating => println!(
            "You said: {} ({}%)",
            session.original_text,
            session.confidence.unwrap_or(0)
        ),
        SessionState::Ready if previous.is_some_and(|p| p.session.state == SessionState::Speaking) => {
            println!("  done speaking");
        }
        SessionState::Ready => {
            let note = if current.was_fallback { " (offline fallback)" } else { "" };
            println!("Translation: {}{note}", session.translated_text);
        }
        SessionState::Speaking => println!("  speaking..."),
        SessionState::Idle | SessionState::Error | SessionState::Unsupported => {
            if let Some(fault) = &current.fault {
                println!("! {fault}");
            } else if previous.is_some() {
                println!("○ {}", session.state);
            }
        }
        SessionState::Recognized => {}
    }
}
