//! rbzk - manage ZK attendance terminals from the command line

mod config;
mod filters;
mod output;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use rbzk::{Device, DeviceOptions, Encoding, NewUser};

use config::CliConfig;
use filters::LogFilter;

#[derive(Parser)]
#[command(name = "rbzk", version, about = "Manage ZK attendance terminals")]
struct Cli {
    /// Device IP address
    #[arg(short, long, global = true)]
    ip: Option<String>,

    /// Device port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Operation timeout in seconds
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Communication password
    #[arg(long, global = true)]
    password: Option<u32>,

    /// Log protocol traffic
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use UDP instead of TCP
    #[arg(long, global = true)]
    udp: bool,

    /// Skip the reachability probe
    #[arg(long, global = true)]
    no_ping: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show device identity and counters
    Info,

    /// Tell the device to reload its internal caches
    Refresh,

    /// List users
    Users,

    /// Download attendance logs, with optional date filtering
    Logs {
        #[command(flatten)]
        filter: LogFilter,
    },

    /// Download every attendance log
    LogsAll,

    /// Erase all attendance logs on the device
    ClearLogs,

    /// Pulse the door relay open
    Unlock {
        /// Seconds to hold the door open
        #[arg(long, default_value_t = 3)]
        time: u32,
    },

    /// Report whether the door sensor reads open
    DoorState,

    /// Write a line of text to the LCD
    WriteLcd { line: u16, text: String },

    /// Restore the default LCD contents
    ClearLcd,

    /// Create or overwrite a user
    AddUser {
        #[arg(long)]
        uid: Option<u16>,
        #[arg(long)]
        name: String,
        /// 0=User, 2=Enroller, 6=Manager, 14=Admin
        #[arg(long, default_value_t = 0)]
        privilege: u8,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, default_value = "")]
        group_id: String,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long, default_value_t = 0)]
        card: u32,
    },

    /// Delete a user by device slot
    DeleteUser {
        #[arg(long)]
        uid: u16,
    },

    /// Download every fingerprint template
    GetTemplates,

    /// Fetch one fingerprint template
    GetUserTemplate {
        #[arg(long)]
        uid: u16,
        #[arg(long)]
        finger_id: u16,
    },

    /// Play a built-in voice prompt
    TestVoice {
        /// Prompt index, 0-51
        #[arg(long, default_value_t = 0)]
        index: u32,
    },

    /// Resume accepting punches
    EnableDevice,

    /// Stop accepting punches
    DisableDevice,

    /// Restart the device
    Restart,

    /// Power the device off
    Poweroff,

    /// Show the resolved configuration
    Config,

    /// Set one configuration key
    ConfigSet { key: String, value: String },

    /// Write a default configuration file
    ConfigReset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut cfg, cfg_path) = CliConfig::load()?;

    apply_overrides(&mut cfg, &cli);
    init_logging(cfg.verbose);

    // Config commands never touch the network
    match &cli.command {
        Cmd::Config => {
            match &cfg_path {
                Some(path) => println!("# {}", path.display()),
                None => println!("# no config file, showing defaults"),
            }
            print!("{}", serde_yaml::to_string(&cfg)?);
            return Ok(());
        }
        Cmd::ConfigSet { key, value } => {
            let path = cfg_path.unwrap_or_else(CliConfig::default_path);
            let mut on_disk = if path.exists() {
                CliConfig::load_from(&path)?
            } else {
                CliConfig::default()
            };
            on_disk.set(key, value)?;
            on_disk.save(&path)?;
            println!("{} = {} ({})", key, value, path.display());
            return Ok(());
        }
        Cmd::ConfigReset => {
            let path = cfg_path.unwrap_or_else(CliConfig::default_path);
            CliConfig::default().save(&path)?;
            println!("Wrote defaults to {}", path.display());
            return Ok(());
        }
        _ => {}
    }

    let mut device = Device::new(device_options(&cfg)?);
    device
        .connect()
        .await
        .with_context(|| format!("connecting to {}:{}", cfg.ip, cfg.port))?;

    let result = run(&mut device, cli.command).await;

    // Restart/poweroff take the connection down themselves
    if device.is_connected() {
        if let Err(e) = device.disconnect().await {
            warn!("disconnect failed: {e}");
        }
    }

    result
}

fn apply_overrides(cfg: &mut CliConfig, cli: &Cli) {
    if let Some(ip) = &cli.ip {
        cfg.ip = ip.clone();
    }
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if let Some(timeout) = cli.timeout {
        cfg.timeout = timeout;
    }
    if let Some(password) = cli.password {
        cfg.password = password;
    }
    cfg.verbose |= cli.verbose;
    cfg.force_udp |= cli.udp;
    cfg.no_ping |= cli.no_ping;
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}

fn device_options(cfg: &CliConfig) -> Result<DeviceOptions> {
    let encoding = Encoding::from_name(&cfg.encoding)
        .with_context(|| format!("config key 'encoding' = '{}'", cfg.encoding))?;

    Ok(DeviceOptions::new(cfg.ip.clone())
        .port(cfg.port)
        .timeout(Duration::from_secs(cfg.timeout))
        .password(cfg.password)
        .force_udp(cfg.force_udp)
        .omit_ping(cfg.no_ping)
        .verbose(cfg.verbose)
        .encoding(encoding))
}

async fn run(device: &mut Device, command: Cmd) -> Result<()> {
    match command {
        Cmd::Info => {
            let info = device.device_info().await?;
            let sizes = device.read_sizes().await?;
            output::print_info(&info, &sizes);
        }

        Cmd::Refresh => {
            device.refresh_data().await?;
            println!("Device data refreshed.");
        }

        Cmd::Users => {
            let users = device.get_users().await?;
            output::print_users(&users);
        }

        Cmd::Logs { filter } => {
            let logs = device.get_attendance().await?;
            let today = chrono::Local::now().date_naive();
            output::print_logs(&filter.apply(logs, today));
        }

        Cmd::LogsAll => {
            let logs = device.get_attendance().await?;
            output::print_logs(&logs);
        }

        Cmd::ClearLogs => {
            device.disable_device().await?;
            let result = device.clear_attendance().await;
            reenable(device).await;
            result?;
            println!("Attendance logs cleared.");
        }

        Cmd::Unlock { time } => {
            device.unlock(time).await?;
            println!("Door unlocked for {time} second(s).");
        }

        Cmd::DoorState => {
            let open = device.door_state().await?;
            println!("Door is {}.", if open { "open" } else { "closed" });
        }

        Cmd::WriteLcd { line, text } => {
            device.write_lcd(line, &text).await?;
        }

        Cmd::ClearLcd => {
            device.clear_lcd().await?;
        }

        Cmd::AddUser {
            uid,
            name,
            privilege,
            password,
            group_id,
            user_id,
            card,
        } => {
            device.disable_device().await?;
            let result = device
                .set_user(NewUser {
                    uid,
                    user_id,
                    name,
                    privilege,
                    password,
                    group_id,
                    card,
                })
                .await;
            reenable(device).await;
            let saved = result?;
            println!(
                "Saved user uid={} user_id={} ({})",
                saved.uid,
                saved.user_id,
                output::privilege_name(saved.privilege)
            );
        }

        Cmd::DeleteUser { uid } => {
            device.disable_device().await?;
            let result = device.delete_user(uid).await;
            reenable(device).await;
            result?;
            println!("Deleted user uid={uid}.");
        }

        Cmd::GetTemplates => {
            let templates = device.get_templates().await?;
            output::print_templates(&templates);
        }

        Cmd::GetUserTemplate { uid, finger_id } => {
            let template = device.get_user_template(uid, finger_id).await?;
            println!("{template}");
        }

        Cmd::TestVoice { index } => {
            device.test_voice(index).await?;
        }

        Cmd::EnableDevice => {
            device.enable_device().await?;
            println!("Device enabled.");
        }

        Cmd::DisableDevice => {
            device.disable_device().await?;
            println!("Device disabled.");
        }

        Cmd::Restart => {
            device.restart().await?;
            println!("Restart sent; the device is rebooting.");
        }

        Cmd::Poweroff => {
            device.power_off().await?;
            println!("Power-off sent.");
        }

        Cmd::Config | Cmd::ConfigSet { .. } | Cmd::ConfigReset => unreachable!(),
    }

    Ok(())
}

/// Release half of the disable/enable bracket around modifications.
/// A failing enable is only a warning; the primary result wins.
async fn reenable(device: &mut Device) {
    if let Err(e) = device.enable_device().await {
        warn!("re-enable after modification failed: {e}");
    }
}
