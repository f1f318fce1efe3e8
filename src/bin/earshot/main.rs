use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use earshot::alert::{Urgency, alert_for_label, alert_table};
use earshot::config::Config;
use earshot::error::EarshotError;
use earshot::events::SoundEvent;
use earshot::monitor::SoundMonitor;

/// How many past events the listen summary keeps.
const RECENT_EVENTS: usize = 5;

#[derive(Parser)]
#[command(
    name = "earshot",
    about = "Hear with your eyes",
    long_about = "Earshot continuously listens to a stereo microphone, recognizes ambient \
        sound events (sirens, knocking, a crying baby) with a pretrained YAMNet \
        classifier, and estimates which direction each sound came from. Recognized \
        events are printed as they happen, with an urgency rating for the \
        categories an alerting surface cares about. Built for hearing-impaired \
        users; the event stream is also consumable as a library."
)]
struct Cli {
    /// Path to config file
    ///
    /// Defaults to ~/.config/earshot/config.yaml if not specified.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    ///
    /// Sets the log level to debug for the earshot crate, showing per-tick
    /// detail about capture, decimation, and classification.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for ambient sound events (foreground)
    ///
    /// Opens the configured input device at stereo 48 kHz, classifies the
    /// feed about once a second, and prints each recognized event with its
    /// estimated direction and urgency. Runs until interrupted with Ctrl+C.
    Listen,

    /// List available audio input devices
    ///
    /// Shows all audio input devices recognized by the system. Use --pick
    /// to interactively select one and save it to your config file, or
    /// use --set to write a device name directly.
    Devices {
        /// Write the chosen device name to the config file
        #[arg(long, conflicts_with = "pick")]
        set: Option<String>,

        /// Interactively pick a device and save it to the config file
        #[arg(long, conflicts_with = "set")]
        pick: bool,
    },

    /// Show the alertable sound categories
    ///
    /// Prints the classifier labels the alerting surface recognizes, the
    /// category each folds into, and its urgency. Sounds outside this
    /// taxonomy are still reported, without an urgency rating.
    Labels,

    /// Create a new configuration file
    ///
    /// Walks through an interactive setup to pick an input device and a
    /// score threshold, then writes the result to the config file.
    Init,

    /// Generate shell completions
    ///
    /// Prints a completion script for the given shell to stdout.
    /// Source or install the output to enable tab completion.
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, elvish, powershell)
        shell: Shell,
    },
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Config::default_path)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("earshot=debug,info")
    } else {
        EnvFilter::new("earshot=info,warn")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    install_completions_if_missing();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

/// Auto-install shell completions for `$SHELL` if the completion file does not
/// already exist.  Runs silently — errors are ignored so that missing dirs or
/// unsupported shells never block normal operation.
fn install_completions_if_missing() {
    let Ok(shell_env) = std::env::var("SHELL") else {
        return;
    };

    let Some(home) = dirs::home_dir() else {
        return;
    };

    // Map $SHELL to a clap_complete Shell variant and a destination path.
    let (shell, path) = if shell_env.ends_with("/bash") {
        let dir = home.join(".local/share/bash-completion/completions");
        (Shell::Bash, dir.join("earshot"))
    } else if shell_env.ends_with("/zsh") {
        (Shell::Zsh, home.join(".zfunc/_earshot"))
    } else if shell_env.ends_with("/fish") {
        (Shell::Fish, home.join(".config/fish/completions/earshot.fish"))
    } else {
        return;
    };

    if path.exists() {
        return;
    }

    if let Some(parent) = path.parent()
        && std::fs::create_dir_all(parent).is_err()
    {
        return;
    }

    let mut buf = Vec::new();
    generate(shell, &mut Cli::command(), "earshot", &mut buf);

    let _ = std::fs::write(&path, buf);
}

fn run(cli: Cli) -> Result<(), EarshotError> {
    match cli.command {
        Command::Listen => {
            let config = Config::load_or_default(&config_path(&cli))?;
            run_listen(config)
        }
        Command::Devices { ref set, pick } => run_devices(&cli, set.as_deref(), pick),
        Command::Labels => {
            run_labels();
            Ok(())
        }
        Command::Init => run_init(&cli),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "earshot", &mut std::io::stdout());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// earshot listen
// ---------------------------------------------------------------------------

fn run_listen(config: Config) -> Result<(), EarshotError> {
    let monitor = SoundMonitor::new(config);
    let mut events = monitor.subscribe();

    monitor.start();

    let rt = tokio::runtime::Runtime::new()?;
    let recent = rt.block_on(async move {
        use tokio::sync::broadcast::error::RecvError;

        println!("Listening for ambient sounds. Press Ctrl+C to stop.");

        let mut recent: VecDeque<SoundEvent> = VecDeque::with_capacity(RECENT_EVENTS);
        loop {
            tokio::select! {
                result = events.recv() => match result {
                    Ok(event) => {
                        print_event(&event);
                        if recent.len() == RECENT_EVENTS {
                            recent.pop_back();
                        }
                        recent.push_front(event);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!("display fell behind, {missed} events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received Ctrl+C, shutting down...");
                    break;
                }
            }
        }

        recent
    });

    monitor.stop();

    if !recent.is_empty() {
        println!();
        println!("Last {} event(s):", recent.len());
        for event in &recent {
            print_event(event);
        }
    }

    Ok(())
}

fn print_event(event: &SoundEvent) {
    let time = event.observed_at.format("%H:%M:%S");
    let bearing = describe_bearing(event.direction_degrees);

    match alert_for_label(&event.label) {
        Some(alert) => println!(
            "[{time}] {} ({}) — {bearing}, {:+.0}°",
            alert.category, alert.urgency, event.direction_degrees
        ),
        None => println!(
            "[{time}] {} — {bearing}, {:+.0}°",
            event.label, event.direction_degrees
        ),
    }
}

/// Rough verbal rendering of the bearing estimate for the terminal surface.
fn describe_bearing(degrees: f32) -> &'static str {
    if degrees > 15.0 {
        "to the left"
    } else if degrees < -15.0 {
        "to the right"
    } else {
        "ahead"
    }
}

// ---------------------------------------------------------------------------
// earshot devices
// ---------------------------------------------------------------------------

fn list_devices() -> Result<(Vec<String>, Option<String>), EarshotError> {
    let devices = earshot::audio::capture::list_input_devices()?;
    let default_name = earshot::audio::capture::default_input_device_name();
    Ok((devices, default_name))
}

fn print_device_list(devices: &[String], default_name: Option<&str>) {
    for (i, name) in devices.iter().enumerate() {
        let marker = if default_name == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!("  {}: {name}{marker}", i + 1);
    }
}

fn run_devices(cli: &Cli, set: Option<&str>, pick: bool) -> Result<(), EarshotError> {
    if let Some(device_name) = set {
        let path = config_path(cli);
        Config::set_audio_device(&path, device_name)?;
        println!("Set audio device to: {device_name}");
        return Ok(());
    }

    let (devices, default_name) = list_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    if pick {
        println!("Available audio input devices:");
        print_device_list(&devices, default_name.as_deref());
        println!();

        let choice = prompt_number(&format!("Select device [1-{}]: ", devices.len()))?;
        if choice < 1 || choice > devices.len() {
            return Err(EarshotError::Other(format!(
                "selection out of range: pick 1-{}",
                devices.len()
            )));
        }

        let selected = &devices[choice - 1];
        let path = config_path(cli);
        Config::set_audio_device(&path, selected)?;
        println!("Set audio device to: {selected}");
    } else {
        print_device_list(&devices, default_name.as_deref());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// earshot labels
// ---------------------------------------------------------------------------

fn run_labels() {
    println!("Alertable sound categories:");
    println!();
    for urgency in [Urgency::High, Urgency::Medium, Urgency::Low] {
        for (label, category, u) in alert_table() {
            if *u == urgency {
                println!("  {category:<12} {urgency:<8} (classifier label: {label})");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt helpers
// ---------------------------------------------------------------------------

fn prompt(msg: &str) -> Result<String, EarshotError> {
    print!("{msg}");
    std::io::stdout()
        .flush()
        .map_err(|e| EarshotError::Other(format!("failed to flush stdout: {e}")))?;
    let mut buf = String::new();
    std::io::stdin()
        .read_line(&mut buf)
        .map_err(|e| EarshotError::Other(format!("failed to read input: {e}")))?;
    Ok(buf.trim().to_string())
}

fn prompt_number(msg: &str) -> Result<usize, EarshotError> {
    prompt(msg)?
        .parse()
        .map_err(|_| EarshotError::Other("invalid selection: enter a number".to_string()))
}

fn prompt_default(msg: &str, default: &str) -> Result<String, EarshotError> {
    let input = prompt(&format!("{msg} [{default}]: "))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

// ---------------------------------------------------------------------------
// earshot init
// ---------------------------------------------------------------------------

fn run_init(cli: &Cli) -> Result<(), EarshotError> {
    use serde_yaml_ng::{Mapping, Value};

    let path = config_path(cli);

    if path.exists() {
        let overwrite = prompt_default(
            &format!("Config file already exists at {}. Overwrite? (y/N)", path.display()),
            "n",
        )?;
        if !overwrite.eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut root = Mapping::new();

    // 1. Audio device
    println!();
    let (devices, default_name) = list_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found; the default device will be used.");
    } else {
        println!("Available audio input devices:");
        print_device_list(&devices, default_name.as_deref());
        println!();
        let input = prompt(&format!(
            "Select device [1-{}] (Enter for default): ",
            devices.len()
        ))?;
        if let Ok(choice) = input.parse::<usize>()
            && choice >= 1
            && choice <= devices.len()
        {
            let mut audio = Mapping::new();
            audio.insert(
                Value::String("device".to_string()),
                Value::String(devices[choice - 1].clone()),
            );
            root.insert(Value::String("audio".to_string()), Value::Mapping(audio));
        }
    }

    // 2. Score threshold
    println!();
    let threshold = prompt_default("Score threshold (0.0-1.0, higher = fewer alerts)", "0.3")?;
    if threshold != "0.3" {
        let value: f64 = threshold
            .parse()
            .map_err(|_| EarshotError::Other("invalid threshold: enter a number".to_string()))?;
        let mut classifier = Mapping::new();
        classifier.insert(
            Value::String("score_threshold".to_string()),
            Value::Number(value.into()),
        );
        root.insert(
            Value::String("classifier".to_string()),
            Value::Mapping(classifier),
        );
    }

    // 3. Write config
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            EarshotError::Config(format!(
                "failed to create config directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let yaml = serde_yaml_ng::to_string(&Value::Mapping(root))
        .map_err(|e| EarshotError::Config(format!("failed to serialize config: {e}")))?;

    std::fs::write(&path, &yaml).map_err(|e| {
        EarshotError::Config(format!(
            "failed to write config file {}: {e}",
            path.display()
        ))
    })?;

    println!();
    println!("Config written to {}", path.display());
    println!("Run `earshot listen` to start listening.");

    Ok(())
}
