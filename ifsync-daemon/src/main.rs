//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod config;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use config::{Config, LoggingFileRotation, LoggingFmtStyle};
use ifsync_northbound::change::{ChangeSet, ChangeSource};
use ifsync_northbound::configuration::{
    self, CommitPhase, CommitReport, InstanceReport,
};
use ifsync_southbound::Southbound;
use ifsync_southbound::netlink::NetlinkSouthbound;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

// Reconciliation plugins driven by the daemon.
enum Plugin {
    Bridging(ifsync_bridging::Master),
    Interfaces(ifsync_interface::Master),
    Routing(ifsync_routing::Master),
}

// ===== impl Plugin =====

impl Plugin {
    fn name(&self) -> &'static str {
        match self {
            Plugin::Bridging(..) => "bridging",
            Plugin::Interfaces(..) => "interfaces",
            Plugin::Routing(..) => "routing",
        }
    }

    fn commit(
        &mut self,
        phase: CommitPhase,
        changes: &dyn ChangeSource,
    ) -> CommitReport {
        match self {
            Plugin::Bridging(master) => {
                configuration::process_commit(master, phase, changes)
            }
            Plugin::Interfaces(master) => {
                configuration::process_commit(master, phase, changes)
            }
            Plugin::Routing(master) => {
                configuration::process_commit(master, phase, changes)
            }
        }
    }

    fn show(&mut self) -> Result<serde_json::Value, String> {
        let value = match self {
            Plugin::Bridging(master) => {
                let components = ifsync_bridging::state_cb(master, None)
                    .map_err(|error| error.to_string())?;
                serde_json::to_value(components)
            }
            Plugin::Interfaces(master) => {
                let interfaces = ifsync_interface::state_cb(master, None)
                    .map_err(|error| error.to_string())?;
                serde_json::to_value(interfaces)
            }
            Plugin::Routing(master) => {
                let ribs = ifsync_routing::state_cb(master, None)
                    .map_err(|error| error.to_string())?;
                serde_json::to_value(ribs)
            }
        };
        value.map_err(|error| error.to_string())
    }
}

// ===== helper functions =====

fn init_tracing(config: &config::Logging) {
    // Enable logging to journald.
    let journald = config.journald.enabled.then(|| {
        tracing_journald::layer()
            .inspect_err(|error| {
                eprintln!("couldn't connect to journald: {error}");
            })
            .ok()
    });

    // Enable logging to a file.
    let file = config.file.enabled.then(|| {
        let file_appender = match config.file.rotation {
            LoggingFileRotation::Never => {
                rolling::never(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Hourly => {
                rolling::hourly(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Daily => {
                rolling::daily(&config.file.dir, &config.file.name)
            }
        };

        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(false)
            .with_thread_ids(config.file.fmt.show_thread_id)
            .with_file(config.file.fmt.show_source)
            .with_line_number(config.file.fmt.show_source)
            .with_ansi(config.file.fmt.colors);
        let layer = match config.file.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    // Enable logging to stderr, keeping stdout for command output.
    let stdout = config.stdout.enabled.then(|| {
        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(config.stdout.fmt.show_thread_id)
            .with_file(config.stdout.fmt.show_source)
            .with_line_number(config.stdout.fmt.show_source)
            .with_ansi(config.stdout.fmt.colors);
        let layer = match config.stdout.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("ifsync=debug".parse().unwrap())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(journald.flatten())
        .with(file)
        .with(stdout)
        .init();
}

fn build_version() -> String {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    match rustc_tools_util::get_version_info!().commit_hash {
        Some(hash) => format!("{VERSION} ({hash})"),
        None => VERSION.to_owned(),
    }
}

// Instantiates the enabled plugins in commit order.
//
// Bridges come first so that interfaces of the same transaction can be
// attached to them. Routes come last since they may point to interfaces
// created by the transaction.
fn load_plugins<F>(config: &Config, southbound: F) -> Vec<Plugin>
where
    F: Fn() -> Box<dyn Southbound>,
{
    let mut plugins = vec![];
    if config.plugins.bridging.enabled {
        plugins.push(Plugin::Bridging(ifsync_bridging::Master::new(
            southbound(),
        )));
    }
    if config.plugins.interfaces.enabled {
        plugins.push(Plugin::Interfaces(ifsync_interface::Master::new(
            southbound(),
        )));
    }
    if config.plugins.routing.enabled {
        plugins.push(Plugin::Routing(ifsync_routing::Master::new(
            southbound(),
        )));
    }
    plugins
}

fn netlink_southbound() -> Box<dyn Southbound> {
    Box::new(NetlinkSouthbound::init())
}

fn load_changes(path: &str) -> Result<ChangeSet, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|error| format!("failed to read {path}: {error}"))?;
    serde_json::from_str(&data)
        .map_err(|error| format!("failed to parse {path}: {error}"))
}

fn print_instance(plugin: &str, instance: &InstanceReport) {
    println!("[{plugin}] {}", instance.instance);
    for record in &instance.records {
        println!("  {} {}: {}", record.operation, record.path, record.outcome);
    }
    if let Some(error) = &instance.fatal {
        println!("  aborted: {} ({})", error, error.reason());
    }
}

// Delivers one commit phase to every plugin. Returns whether all of them
// succeeded.
fn commit(
    plugins: &mut [Plugin],
    phase: CommitPhase,
    changes: &ChangeSet,
) -> bool {
    let mut success = true;
    for plugin in plugins.iter_mut() {
        let report = plugin.commit(phase, changes);
        for instance in &report.instances {
            print_instance(plugin.name(), instance);
        }
        if let Some(error) = report.first_failure() {
            error!(plugin = %plugin.name(), ?phase, %error, "commit failed");
            success = false;
        }
    }
    success
}

fn process_changes(config: &Config, matches: &ArgMatches<'_>, apply: bool) {
    let Some(path) = matches.value_of("changes") else {
        eprintln!("{}", matches.usage());
        std::process::exit(1);
    };
    let changes = match load_changes(path) {
        Ok(changes) => changes,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };
    info!(%path, changes = changes.len(), "processing changes");

    let mut plugins = load_plugins(config, netlink_southbound);
    if !commit(&mut plugins, CommitPhase::Verify, &changes) {
        std::process::exit(1);
    }
    if apply && !commit(&mut plugins, CommitPhase::Apply, &changes) {
        commit(&mut plugins, CommitPhase::Abort, &changes);
        std::process::exit(1);
    }
}

fn show(config: &Config, matches: &ArgMatches<'_>) {
    let model = matches.value_of("model");
    let mut output = serde_json::Map::new();
    for mut plugin in load_plugins(config, netlink_southbound) {
        if model.is_some_and(|model| model != plugin.name()) {
            continue;
        }
        match plugin.show() {
            Ok(value) => {
                output.insert(plugin.name().to_owned(), value);
            }
            Err(error) => {
                eprintln!("{}: {error}", plugin.name());
                std::process::exit(1);
            }
        }
    }

    match serde_json::to_string_pretty(&output) {
        Ok(output) => println!("{output}"),
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let changes = Arg::with_name("changes")
        .value_name("CHANGES")
        .required(true)
        .help("JSON file holding the change records of one transaction.");
    let matches = App::new("Interface configuration sync daemon")
        .version(build_version().as_str())
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .subcommand(
            SubCommand::with_name("verify")
                .about("Validate a transaction without touching the kernel.")
                .arg(changes.clone()),
        )
        .subcommand(
            SubCommand::with_name("apply")
                .about("Validate and apply a transaction to the kernel.")
                .arg(changes),
        )
        .subcommand(
            SubCommand::with_name("show")
                .about("Print the operational state as JSON.")
                .arg(Arg::with_name("model").possible_values(&[
                    "bridging",
                    "interfaces",
                    "routing",
                ])),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = Config::load(config_file);

    // Initialize tracing.
    init_tracing(&config.logging);

    match matches.subcommand() {
        ("verify", Some(matches)) => process_changes(&config, matches, false),
        ("apply", Some(matches)) => process_changes(&config, matches, true),
        ("show", Some(matches)) => show(&config, matches),
        _ => {
            eprintln!("{}", matches.usage());
            std::process::exit(1);
        }
    }
}

// ===== unit tests =====
