use anyhow::{Context, Result, bail};
use env_logger::{Builder, Env, Target};
use hue_bridge_settings::{
    ActionOutcome, HueBridgeClient, SettingsSynchronizer, clock::UpdateTicker,
    config::AppConfig,
};
use log::{debug, error, info, warn};
use std::io::{self, BufRead, Write};

#[derive(Debug, Default)]
struct Options {
    check_update: bool,
    install: bool,
}

impl Options {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        for arg in args {
            match arg.as_str() {
                "--check-update" => options.check_update = true,
                "--install" => options.install = true,
                other => bail!("unknown argument: {other}"),
            }
        }
        Ok(options)
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let options = Options::parse(std::env::args().skip(1))?;
    let config = AppConfig::get();
    let client =
        HueBridgeClient::new(&config.bridge).context("failed to create bridge client")?;

    let mut session = SettingsSynchronizer::new(client);
    if let ActionOutcome::Failed(msg) = session.initialize().await {
        bail!("{msg}");
    }
    log_session(&session);

    if options.check_update {
        session.check_for_update().await;
    }

    if options.install
        && session.install_firmware(&confirm_on_stdin).await == ActionOutcome::Completed
    {
        wait_for_update(&mut session).await;
    }

    debug!("good bye");
    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

fn log_session(session: &SettingsSynchronizer<HueBridgeClient>) {
    let general = session.general().current();
    info!(
        "bridge {:?}: software {}, api {}, zigbee channel {}, {}",
        general.name,
        general.sw_version,
        general.api_version,
        general.zigbee_channel,
        general.link_state
    );
    if general.version_info().mismatch {
        warn!("bridge api version is not supported");
    }

    let network = session.network().current();
    info!(
        "network: mac {}, ip {}, dhcp {}, proxy {}:{}",
        network.mac, network.ip, network.dhcp, network.proxy, network.proxy_port
    );

    let portal = session.portal().current();
    info!(
        "portal: services {}, connection {}, signed on {}",
        portal.portal_services, portal.connection, portal.signed_on
    );

    let software = session.software().current();
    info!(
        "firmware: {} (auto install {} at {}), last change {}, last update {}",
        software.update_state,
        software.auto_update,
        software.update_time,
        software.last_change,
        software.last_update
    );

    info!("commands: {:?}", session.commands());
}

fn confirm_on_stdin(question: &str) -> bool {
    print!("{question} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
        Err(e) => {
            warn!("failed to read confirmation: {e}");
            false
        }
    }
}

/// Keep the session alive until the update window closes or ctrl-c
async fn wait_for_update(session: &mut SettingsSynchronizer<HueBridgeClient>) {
    let mut ticker = UpdateTicker::start();

    loop {
        tokio::select! {
            event = ticker.next() => {
                let Some(event) = event else { break };
                session.handle_clock_event(event);
                debug!("update progress: {}s", session.progress_seconds());
                if session.can_close() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("ctrl-c");
                session.cancel_update();
                break;
            }
        }
    }

    info!("update window closed after {}s", session.progress_seconds());
}
