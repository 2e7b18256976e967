use clap::{Args, CommandFactory, Parser, Subcommand};
use colored::*;
use midimon::{
    device::{list_input_ports, HostMidiDevice},
    logger,
    midi::EventLine,
    monitor::{Monitor, MonitorConfig},
};
use std::{io::Write, path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    opts: CommonOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct CommonOptions {
    /// Log verbosity level
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Path to log file to write to. Defaults
    /// to system log file at ~/.midimon/log/midimon.log
    #[arg(long)]
    log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available MIDI input ports
    List,
    /// Print incoming MIDI messages
    Monitor(MonitorOptions),
    /// `midimon completions --generate=zsh > midimon.zsh`
    Completions(Completions),
}

#[derive(Debug, Parser)]
struct MonitorOptions {
    /// Input port to open, by index or by name. Defaults to the first port
    #[arg(long)]
    port: Option<String>,

    /// Milliseconds to wait between two polls of the device
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,

    /// Maximum number of messages read per poll
    #[arg(long, default_value_t = 10)]
    batch: usize,

    /// Number of consecutive read errors tolerated before giving up
    #[arg(long, default_value_t = 100)]
    max_errors: u32,
}

impl From<&MonitorOptions> for MonitorConfig {
    fn from(opts: &MonitorOptions) -> Self {
        Self {
            poll_interval: Duration::from_millis(opts.poll_interval),
            batch_size: opts.batch.max(1),
            max_consecutive_errors: opts.max_errors.max(1),
        }
    }
}

#[derive(Debug, Parser)]
#[command(arg_required_else_help(true))]
struct Completions {
    /// shell to generate the completion script for
    #[arg(long = "generate", value_enum)]
    shell: Option<clap_complete::Shell>,
}

impl Completions {
    fn generate(&self) -> anyhow::Result<()> {
        let Some(shell) = self.shell else {
            anyhow::bail!("no shell specified for autocompletion generation");
        };

        let mut stdout = std::io::stdout();
        stdout.flush()?;

        let mut cli = Cli::command();
        clap_complete::generate(shell, &mut cli, "midimon", &mut stdout);

        Ok(())
    }
}

fn list() -> anyhow::Result<()> {
    let ports = list_input_ports()?;

    if ports.is_empty() {
        println!("No MIDI input devices found");
    }

    for (index, name) in ports.iter().enumerate() {
        println!("{index}: {name}");
    }

    Ok(())
}

fn open_device(port: Option<&str>) -> anyhow::Result<HostMidiDevice> {
    match port {
        Some(port) => match port.parse::<usize>() {
            Ok(index) => HostMidiDevice::open_by_index(index),
            Err(_) => HostMidiDevice::open_by_name(port),
        },
        None => {
            if list_input_ports()?.is_empty() {
                anyhow::bail!("no MIDI input devices found");
            }
            HostMidiDevice::open_by_index(0)
        }
    }
}

fn monitor(opts: MonitorOptions) -> anyhow::Result<()> {
    let device = open_device(opts.port.as_deref())?;
    let port_name = device.port_name().to_owned();
    let config = MonitorConfig::from(&opts);

    log::info!("monitoring {port_name} with {config:?}");
    eprintln!(
        "{} {} (press Enter to stop)",
        "Monitoring".green().bold(),
        port_name.bold()
    );

    let mut monitor = Monitor::default();
    monitor.start(
        device,
        config,
        |event| println!("{}", EventLine::now(event)),
        |error| eprintln!("{} {}", "Error:".red().bold(), error),
    )?;

    let (stop_tx, stop_rx) = crossbeam::channel::bounded::<()>(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = stop_tx.send(());
    });

    loop {
        match stop_rx.recv_timeout(Duration::from_millis(100)) {
            Err(crossbeam::channel::RecvTimeoutError::Timeout) if monitor.is_running() => continue,
            _ => break,
        }
    }

    monitor.shutdown();
    log::info!("stopped monitoring {port_name}");
    eprintln!("{}", "Monitoring stopped".green().bold());

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    if let Commands::Completions(ref c) = args.command {
        return c.generate();
    }

    if let Some(log_file) = args.opts.log.or(midimon::locations::log_file("midimon")) {
        logger::start("midimon", log_file, args.opts.verbose)?;
    }

    let app_result = match args.command {
        Commands::List => list(),
        Commands::Monitor(opts) => monitor(opts),
        Commands::Completions(_) => Ok(()),
    };

    if let Err(e) = app_result {
        if logger::is_active() {
            log::error!("{e}");
        }
        eprintln!("{} {}", "Error:".red().bold(), format!("{e}").bold());
    }

    Ok(())
}
