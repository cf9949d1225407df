use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use crossbeam_channel::{unbounded, Sender};
use secrecy::ExposeSecret;
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ts3_deck::config::load_config;
use ts3_deck::{
    Action, ActionRuntime, AwayFeature, AwaySettings, ChannelSettings, ChannelSwitchAction,
    ConsoleHost, Host, HostEvent, MuteFeature, MuteSettings, NicknameAction, NicknameSettings,
    ToggleAction, ToggleFeature, ToggleOutcome,
};
use ts3_query::{MuteKind, QueryConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// ClientQuery address (defaults to TS3_CLIENTQUERY_ADDR or 127.0.0.1:25639)
    #[arg(long)]
    address: Option<String>,

    /// ClientQuery API key (defaults to TS3_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror a toggle on the console; reads `press`, `press on`, `press off`, `quit` from stdin
    Watch {
        #[command(flatten)]
        toggle: ToggleArgs,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Flip a toggle once, or force it with --state
    Toggle {
        #[command(flatten)]
        toggle: ToggleArgs,

        #[arg(long, value_enum)]
        state: Option<State>,
    },
    /// Change the nickname
    Nickname { name: String },
    /// Join the first channel whose name contains TARGET, or the channel with id TARGET
    Channel { target: String },
}

#[derive(ClapArgs, Debug)]
struct ToggleArgs {
    #[arg(value_enum)]
    feature: Feature,

    /// Away message (away only)
    #[arg(long)]
    message: Option<String>,

    /// Apply away to every server tab (away only)
    #[arg(long)]
    all_servers: bool,

    /// Leave microphone and speakers alone when going away (away only)
    #[arg(long)]
    keep_audio: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Feature {
    InputMute,
    OutputMute,
    InputMuteLocal,
    Away,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum State {
    On,
    Off,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = load_config().context("Failed to load configuration")?;
    if let Some(address) = &args.address {
        config.query.address = address.clone();
    }
    if let Some(key) = &args.api_key {
        config.override_api_key(key).context("Invalid --api-key")?;
    }
    let api_key = config
        .api_key()
        .context("No API key: pass --api-key or set TS3_API_KEY")?
        .expose_secret()
        .clone();
    let query = config.query;
    let host: Arc<dyn Host> = Arc::new(ConsoleHost::default());

    match args.command {
        Command::Watch { toggle, interval_ms } => {
            let mode = Mode::Watch(Duration::from_millis(interval_ms.max(50)));
            dispatch_toggle(toggle, api_key, query, host, mode)
        }
        Command::Toggle { toggle, state } => {
            let desired = state.map(|s| matches!(s, State::On));
            dispatch_toggle(toggle, api_key, query, host, Mode::Once(desired))
        }
        Command::Nickname { name } => {
            let settings = NicknameSettings {
                api_key,
                nick_name: name,
            };
            NicknameAction::new(settings, query, host)
                .press()
                .context("Failed to change nickname")?;
            println!("✅ Nickname changed");
            Ok(())
        }
        Command::Channel { target } => {
            let settings = ChannelSettings {
                api_key,
                channel_name: target,
            };
            let channel_id = ChannelSwitchAction::new(settings, query, host)
                .press()
                .context("Failed to switch channel")?;
            println!("✅ Joined channel {}", channel_id);
            Ok(())
        }
    }
}

enum Mode {
    Watch(Duration),
    Once(Option<bool>),
}

fn dispatch_toggle(
    args: ToggleArgs,
    api_key: String,
    query: QueryConfig,
    host: Arc<dyn Host>,
    mode: Mode,
) -> Result<()> {
    let kind = match args.feature {
        Feature::InputMute => MuteKind::Input,
        Feature::OutputMute => MuteKind::Output,
        Feature::InputMuteLocal => MuteKind::InputLocal,
        Feature::Away => {
            let settings = AwaySettings {
                api_key,
                away_status_message: args.message.unwrap_or_default(),
                mute_while_away: !args.keep_audio,
                all_servers: args.all_servers,
            };
            return run_toggle(ToggleAction::new(AwayFeature, settings, query, host), mode);
        }
    };
    let settings = MuteSettings { api_key };
    run_toggle(ToggleAction::new(MuteFeature::new(kind), settings, query, host), mode)
}

fn run_toggle<F: ToggleFeature + 'static>(action: ToggleAction<F>, mode: Mode) -> Result<()> {
    match mode {
        Mode::Once(desired) => match action.press(desired) {
            ToggleOutcome::Applied(state) => {
                println!("✅ {}", if state { "ON" } else { "OFF" });
                Ok(())
            }
            ToggleOutcome::Offline => bail!("TeamSpeak ClientQuery is not reachable"),
            ToggleOutcome::Reset => bail!("Connection to TeamSpeak was lost"),
            ToggleOutcome::Failed => bail!("TeamSpeak rejected the change"),
        },
        Mode::Watch(interval) => {
            let action: Arc<dyn Action> = Arc::new(action);
            let (tx, rx) = unbounded();
            spawn_stdin_reader(tx);
            // Show the current state right away instead of after the first tick
            action.on_tick();
            ActionRuntime::new(action, Some(interval)).run(rx);
            Ok(())
        }
    }
}

fn spawn_stdin_reader(events: Sender<HostEvent>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let event = match line.trim() {
                "press" => HostEvent::KeyPressed {
                    desired_state: None,
                },
                "press on" => HostEvent::KeyPressed {
                    desired_state: Some(true),
                },
                "press off" => HostEvent::KeyPressed {
                    desired_state: Some(false),
                },
                "quit" | "exit" => break,
                "" => continue,
                other => {
                    eprintln!("Unknown command {:?}; use press, press on, press off or quit", other);
                    continue;
                }
            };
            if events.send(event).is_err() {
                return;
            }
        }
        let _ = events.send(HostEvent::Dispose);
    });
}
