use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use ledble_lib::led::color::{NamedColor, RGB};
use ledble_lib::led::effect::Effect;
use ledble_lib::util::btle::BtleTransport;
use ledble_lib::util::discovery::Discovery;
use ledble_lib::util::simulator::{SimulatedBulb, SimulatedTransport};
use ledble_lib::util::traits::Transport;
use ledble_lib::{Bulb, SessionConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "ledble",
    about = "Controls Bluetooth LE LED bulbs",
    version
)]
pub struct Cli {
    /// YAML file with session settings
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Scan timeout in milliseconds
    #[clap(short = 't', long = "timeout", global = true)]
    pub timeout: Option<u64>,

    /// Ask the bulb to acknowledge every command
    #[clap(long, global = true)]
    pub ack: bool,

    /// Talk to simulated bulbs instead of the Bluetooth adapter
    #[clap(long, global = true)]
    pub simulate: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats for the `discover` command.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Sends a command to one or more bulbs
    #[clap(name = "device-call")]
    DeviceCall {
        /// Address of a bulb, e.g. e8:eb:11:0f:8a:4c (repeat for several bulbs)
        #[clap(short = 'a', long = "address", required = true)]
        addresses: Vec<String>,

        #[clap(subcommand)]
        action: DeviceAction,
    },
    /// Lists the devices advertising nearby
    #[clap(name = "discover")]
    Discover {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
    /// Lists the built-in effects and their codes
    #[clap(name = "list-effects")]
    ListEffects,
}

/// Actions available under the `device-call` subcommand
#[derive(Subcommand)]
pub enum DeviceAction {
    #[clap(name = "turn-on")]
    TurnOn,
    #[clap(name = "turn-off")]
    TurnOff,
    /// Sets a solid color.
    #[clap(name = "set-color")]
    SetColor {
        /// The color to display by name
        #[clap(value_enum)]
        color: Option<NamedColor>,

        /// The color as #rrggbb
        #[clap(long)]
        hex: Option<String>,

        /// Red component of the color (0-255)
        #[clap(short = 'r', long = "red", value_parser = clap::value_parser!(u8))]
        red: Option<u8>,

        /// Green component of the color (0-255)
        #[clap(short = 'g', long = "green", value_parser = clap::value_parser!(u8))]
        green: Option<u8>,

        /// Blue component of the color (0-255)
        #[clap(short = 'b', long = "blue", value_parser = clap::value_parser!(u8))]
        blue: Option<u8>,
    },
    /// Sets the brightness (0-255).
    #[clap(name = "set-brightness")]
    SetBrightness {
        #[clap(value_parser = clap::value_parser!(u8))]
        brightness: u8,
    },
    /// Starts a built-in effect.
    #[clap(name = "set-effect")]
    SetEffect {
        #[clap(value_enum)]
        effect: Effect,

        /// Effect speed byte, passed to the bulb as is
        #[clap(short, long, default_value_t = 10)]
        speed: u8,
    },
}

impl DeviceAction {
    async fn apply<T: Transport>(&self, bulb: &Bulb<T::Peripheral>) -> Result<()> {
        match self {
            DeviceAction::TurnOn => bulb.turn_on().await?,
            DeviceAction::TurnOff => bulb.turn_off().await?,
            DeviceAction::SetColor {
                color,
                hex,
                red,
                green,
                blue,
            } => {
                let rgb = match (color, hex, red, green, blue) {
                    (Some(color), None, None, None, None) => RGB::from(*color),
                    (None, Some(hex), None, None, None) => RGB::from_hex(hex)?,
                    (None, None, Some(r), Some(g), Some(b)) => RGB::new(*r, *g, *b),
                    _ => return Err(anyhow!("Invalid color specification")),
                };
                bulb.set_rgb(rgb).await?;
                println!("{}: color set to {}", bulb.address(), rgb);
                return Ok(());
            }
            DeviceAction::SetBrightness { brightness } => bulb.set_brightness(*brightness).await?,
            DeviceAction::SetEffect { effect, speed } => bulb.set_effect(*effect, *speed).await?,
        }
        println!("{}: done", bulb.address());
        Ok(())
    }
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_yaml::from_str::<SessionConfig>(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        }
        None => SessionConfig::default(),
    };
    if let Some(timeout) = cli.timeout {
        config = config.with_locate_timeout(Duration::from_millis(timeout));
    }
    if cli.ack {
        config = config.with_acknowledged_writes(true);
    }
    Ok(config)
}

/// Builds a simulator holding a bulb for every address named on the command
/// line, next to a couple of unrelated devices.
fn simulated_transport(command: &Commands) -> SimulatedTransport {
    let mut transport = SimulatedTransport::new()
        .with_bulb(SimulatedBulb::new("c4:7c:8d:6a:12:01").with_name(Some("Flower care")))
        .with_bulb(SimulatedBulb::new("ff:ff:97:02:3a:c8").with_name(Some("LEDBLE-023AC8")));
    if let Commands::DeviceCall { addresses, .. } = command {
        for address in addresses {
            transport = transport.with_bulb(SimulatedBulb::new(address));
        }
    }
    transport.repeating()
}

async fn run<T: Transport>(transport: &T, command: Commands, config: &SessionConfig) -> Result<()> {
    match command {
        Commands::Discover { output } => {
            let devices = Discovery::find_devices(transport, config.locate_timeout()).await?;
            match output {
                OutputFormat::Plaintext => {
                    Discovery::pretty_print_devices(&devices);
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&devices)?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&devices)?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::DeviceCall { addresses, action } => {
            // One at a time: most adapters only run a single scan.
            let bulbs = Bulb::open_all(transport, addresses.as_slice(), config)
                .await
                .context("Failed to open bulbs")?;
            info!("Opened {} bulb(s)", bulbs.len());
            for bulb in &bulbs {
                action.apply::<T>(bulb).await?;
            }
        }
        Commands::ListEffects => print_effects(),
    }
    Ok(())
}

fn print_effects() {
    for effect in Effect::ALL {
        println!("0x{:02X}  {}", effect.code(), effect);
    }
}

async fn handle_cli(cli: Cli) -> Result<()> {
    if let Commands::ListEffects = cli.command {
        print_effects();
        return Ok(());
    }

    let config = load_config(&cli)?;

    if cli.simulate {
        let transport = simulated_transport(&cli.command);
        run(&transport, cli.command, &config).await?;
        for write in transport.writes() {
            let frame: Vec<String> = write.data.iter().map(|b| format!("{:02X}", b)).collect();
            println!("simulated write to {}: {}", write.address, frame.join(" "));
        }
        return Ok(());
    }

    let transport = BtleTransport::new().await?;
    run(&transport, cli.command, &config).await
}
