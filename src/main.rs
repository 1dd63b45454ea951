use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use vocab_drill::drill::{
    ExtrasOutcome, FollowUpOutcome, PronunciationOutcome, SharedCapture, SubmitOutcome,
    Transition,
};
use vocab_drill::voice::{
    AudioClip, CpalInput, CpalOutput, PlaybackController, SampleBuffer, SpeechCapture, Speaker,
};
use vocab_drill::word::load_word_list;
use vocab_drill::{
    Config, DrillEngine, DrillServices, DrillStep, HttpContentService, SessionController,
    SqliteStore, Stage,
};

/// Drill - guided vocabulary practice with speech
#[derive(Parser)]
#[command(name = "drill", version, about)]
struct Cli {
    /// Learner name (overrides config)
    #[arg(short, long, env = "DRILL_USERNAME")]
    user: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable speech playback and recording
    #[arg(long)]
    disable_voice: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record one utterance and report what was captured
    TestMic,
    /// Play a test tone
    TestSpeaker,
    /// Synthesize text through the content service and play it
    Say {
        /// Text to speak
        text: String,
    },
    /// Practice a word list in the terminal
    Practice {
        /// JSON array of words
        words: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,vocab_drill=info",
        1 => "info,vocab_drill=debug",
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
    let mut config = Config::load()?;
    if let Some(user) = cli.user {
        config.username = user;
    }
    if cli.disable_voice {
        config.voice.enabled = false;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::TestMic => test_mic(&config).await,
        Command::TestSpeaker => test_speaker().await,
        Command::Say { text } => say(&config, &text).await,
        Command::Practice { words } => practice(&config, &words).await,
    }
}

/// Record until the learner stops speaking
async fn test_mic(config: &Config) -> anyhow::Result<()> {
    println!("Speak into your microphone, recording stops after a pause.\n");

    let mut capture = SpeechCapture::new(Box::new(CpalInput::new()?), config.voice.vad);
    let (tx, rx) = oneshot::channel();
    capture.start(Box::new(move |clip: AudioClip| {
        let _ = tx.send(clip);
    }))?;

    let limit = config.voice.vad.no_speech_timeout + Duration::from_secs(30);
    match tokio::time::timeout(limit, rx).await {
        Ok(Ok(clip)) => {
            println!(
                "Captured {:.1}s ({} samples at {} Hz, {} bytes of {})",
                clip.duration().as_secs_f32(),
                clip.samples,
                clip.sample_rate,
                clip.bytes.len(),
                clip.mime_type,
            );
        }
        Ok(Err(_)) => {
            println!("No speech detected.");
            println!("Check that your mic is plugged in and not muted.");
        }
        Err(_) => {
            capture.stop(true);
            println!("Timed out waiting for the end of speech.");
        }
    }

    Ok(())
}

/// Play a 440Hz tone for 2 seconds
async fn test_speaker() -> anyhow::Result<()> {
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    let mut playback = PlaybackController::new(Box::new(CpalOutput::new()?));
    let (tx, rx) = oneshot::channel();
    playback.play(
        SampleBuffer::mono(samples, sample_rate),
        Box::new(move || {
            let _ = tx.send(());
        }),
    )?;

    let _ = rx.await;
    println!("If you heard the tone, your speakers are working!");
    Ok(())
}

/// Synthesize and play `text`
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let content = Arc::new(HttpContentService::new(&config.content)?);
    let playback = PlaybackController::new(Box::new(CpalOutput::new()?));
    let speaker = Speaker::with_format(content, playback, config.voice.speech);

    let outcome = speaker.speak(text).await?;
    tracing::debug!(?outcome, "speech started");

    while speaker.is_playing() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}

/// Terminal host for a practice session
async fn practice(config: &Config, words: &Path) -> anyhow::Result<()> {
    let words = load_word_list(words)?;
    let store = Arc::new(SqliteStore::open(config.database_path())?);
    let content = Arc::new(HttpContentService::new(&config.content)?);

    let mut services = DrillServices::new(content.clone(), store);
    if config.voice.enabled {
        match CpalOutput::new() {
            Ok(output) => {
                let playback = PlaybackController::new(Box::new(output));
                services = services.with_speaker(Speaker::with_format(
                    content.clone(),
                    playback,
                    config.voice.speech,
                ));
            }
            Err(e) => tracing::warn!(error = %e, "speaker unavailable, continuing without audio"),
        }
        match CpalInput::new() {
            Ok(input) => {
                let capture: SharedCapture = Arc::new(Mutex::new(SpeechCapture::new(
                    Box::new(input),
                    config.voice.vad,
                )));
                services = services.with_capture(capture);
            }
            Err(e) => tracing::warn!(error = %e, "microphone unavailable"),
        }
    }

    let mut session = SessionController::new(
        words,
        config.session.batch_size,
        config.username.clone(),
        services,
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while !session.is_complete() {
        let progress = session.progress();
        println!(
            "\n== Batch {}/{}: {} ({} words) ==",
            progress.batch + 1,
            progress.batches,
            progress.stage,
            progress.words_in_batch,
        );

        match session.stage() {
            Stage::Vocabulary => {
                let engine = session.drill_engine()?;
                if !drill_batch(&engine, &mut lines).await? {
                    return Ok(());
                }
                println!("Batch points: {}", engine.session_points());
            }
            Stage::ArticleStudy | Stage::FreeWriting => {
                println!("Press enter when done, or :quit");
                match lines.next_line().await? {
                    Some(line) if line.trim() == ":quit" => return Ok(()),
                    Some(_) => {}
                    None => return Ok(()),
                }
            }
            Stage::Complete => break,
        }

        session.complete_stage();
    }

    println!("\nSession complete.");
    Ok(())
}

/// Run one batch through the drill engine; false if the learner quit
async fn drill_batch<R>(
    engine: &DrillEngine,
    lines: &mut tokio::io::Lines<R>,
) -> anyhow::Result<bool>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    tracing::info!(user = engine.username(), words = engine.words().len(), "batch started");
    report_transition(&engine.start().await);
    render(engine);

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            ":quit" => return Ok(false),
            ":next" => {
                let transition = engine.advance().await;
                report_transition(&transition);
                if transition == Transition::Completed {
                    return Ok(true);
                }
            }
            ":back" => report_transition(&engine.back().await),
            ":jump" => match arg.trim().parse::<usize>() {
                Ok(n) if n > 0 => match engine.jump_to(n - 1).await {
                    Ok(transition) => report_transition(&transition),
                    Err(e) => println!("{e}"),
                },
                _ => println!("usage: :jump N"),
            },
            ":say" => {
                if let Some(notice) = engine.replay_audio().await {
                    println!("{notice}");
                }
            }
            ":rec" => report_pronunciation(&engine.practice_pronunciation().await),
            ":retry" => {
                if !engine.retry_sentence() {
                    println!("Nothing to retry here.");
                }
            }
            ":ask" => match engine.ask_follow_up(arg).await {
                FollowUpOutcome::Answered(answer) => println!("{}", answer.content),
                FollowUpOutcome::NoFeedback => println!("Submit a sentence first."),
                FollowUpOutcome::Failed(notice) => println!("{notice}"),
                FollowUpOutcome::Stale => {}
            },
            ":extras" => match engine.load_extras().await {
                ExtrasOutcome::Loaded(extras) => {
                    println!("synonyms: {}", extras.synonyms.join(", "));
                    println!("antonyms: {}", extras.antonyms.join(", "));
                    for root in &extras.roots {
                        println!("root: {} ({})", root.root, root.meaning);
                    }
                }
                ExtrasOutcome::Failed(notice) => println!("{notice}"),
                ExtrasOutcome::Stale => {}
            },
            ":split" | ":stress" => match arg.trim().parse::<usize>() {
                Ok(n) => {
                    let changed = if command == ":split" {
                        engine.toggle_syllable_split(n)
                    } else {
                        engine.toggle_stress(n)
                    };
                    if !changed {
                        println!("No such position.");
                    }
                }
                Err(_) => println!("usage: {command} N"),
            },
            _ => report_submission(&submit(engine, line).await),
        }

        render(engine);
    }

    Ok(false)
}

async fn submit(engine: &DrillEngine, input: &str) -> SubmitOutcome {
    match engine.snapshot().step {
        DrillStep::Drill => engine.submit_word(input).await,
        DrillStep::CopySentence => engine.submit_copy(input),
        DrillStep::MakeSentence => engine.submit_sentence(input).await,
        DrillStep::Learn => SubmitOutcome::WrongStep(DrillStep::Learn),
    }
}

fn render(engine: &DrillEngine) {
    let view = engine.snapshot();
    let word = if view.word_hidden {
        "?".repeat(view.word.word.chars().count())
    } else if view.annotations.splits.is_empty() {
        view.word.word.clone()
    } else {
        view.annotations.render(&view.word.word)
    };

    println!(
        "\n[{}/{}] {} | {} | points {}",
        view.index + 1,
        view.total,
        word,
        view.step,
        view.session_points,
    );

    match view.step {
        DrillStep::Learn => {
            println!(
                "  {} {} {}",
                view.word.syllables().join("·"),
                view.word.phonetic,
                view.word.part_of_speech
            );
            println!("  {}", view.word.definition);
            println!("  (:next to start typing)");
        }
        DrillStep::Drill => println!("  type the word ({}/3)", view.repetition_count),
        DrillStep::CopySentence => {
            println!("  copy: {}", view.word.example_sentence);
            if let Some(hint) = &view.copy_hint {
                println!("  hint: {hint}");
            }
        }
        DrillStep::MakeSentence => {
            if let Some(feedback) = &view.sentence_feedback {
                println!("  {}", if feedback.is_correct { "correct" } else { "incorrect" });
                if let Some(corrected) = &feedback.corrected_sentence {
                    println!("  corrected: {corrected}");
                }
                println!("  {}", feedback.explanation);
                println!("  (:next, :retry or :ask a question)");
            } else {
                println!("  write a sentence using \"{}\"", view.word.word);
            }
        }
    }
}

fn report_transition(transition: &Transition) {
    match transition {
        Transition::Moved {
            notice: Some(notice),
            ..
        } => println!("{notice}"),
        Transition::Completed => println!("All words done."),
        Transition::Moved { .. } | Transition::Stayed => {}
    }
}

fn report_submission(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Correct {
            awarded, notice, ..
        } => {
            println!("Correct! +{awarded}");
            if let Some(notice) = notice {
                println!("{notice}");
            }
        }
        SubmitOutcome::Incorrect { notice, audio } => {
            println!("{notice}");
            if let Some(audio) = audio {
                println!("{audio}");
            }
        }
        SubmitOutcome::Failed(notice) => println!("{notice}"),
        SubmitOutcome::Graded { awarded, .. } if *awarded > 0 => println!("+{awarded}"),
        SubmitOutcome::WrongStep(DrillStep::Learn) => println!("Use :next to start typing."),
        SubmitOutcome::Graded { .. } | SubmitOutcome::Stale | SubmitOutcome::WrongStep(_) => {}
    }
}

fn report_pronunciation(outcome: &PronunciationOutcome) {
    match outcome {
        PronunciationOutcome::Graded { grade, awarded } => {
            println!("Score {}/100: {}", grade.score(), grade.feedback);
            if *awarded > 0 {
                println!("+{awarded}");
            }
        }
        PronunciationOutcome::Stale => {}
        other => {
            if let Some(notice) = other.notice() {
                println!("{notice}");
            }
        }
    }
}
