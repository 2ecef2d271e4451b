pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod palette;
pub mod render;
pub mod seed;
pub mod session;
pub mod shell;
pub mod stats;
pub mod store;
pub mod task;
pub mod user;

use std::ffi::OsString;
use std::io::{
  self,
  IsTerminal
};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::cli::{
  Command,
  ShellLine
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting maxtask"
  );
  debug!(
    rc_overrides = ?pre.rc_overrides,
    "preprocessed rc overrides"
  );

  let mut cfg = config::Config::load(
    cli.maxtaskrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let seed_path = cli.seed.or_else(|| {
    cfg.get("seed.file").map(|raw| {
      config::expand_tilde(
        std::path::Path::new(&raw)
      )
    })
  });
  let seed = match &seed_path {
    | Some(path) => {
      seed::Seed::load(path)
        .with_context(|| {
          format!(
            "failed to load seed {}",
            path.display()
          )
        })?
    }
    | None => seed::Seed::builtin()?
  };
  let mut session =
    session::Session::from_seed(seed)?;

  let renderer =
    render::Renderer::new(&cfg);
  let now = Utc::now();
  let today = datetime::today_in(
    datetime::resolve_timezone(&cfg),
    now
  );
  let ctx =
    commands::CommandContext::from_config(
      &cfg, now, today
    )?;

  let command = match cli.command {
    | Some(command) => command,
    | None => default_command(&cfg)?
  };

  let stdout = io::stdout();
  let mut out = stdout.lock();
  if command == Command::Shell {
    let stdin = io::stdin();
    let prompt =
      stdin.is_terminal();
    shell::run_shell(
      &mut session,
      &ctx,
      &renderer,
      stdin.lock(),
      &mut out,
      prompt
    )?;
  } else {
    commands::dispatch(
      &mut session,
      &ctx,
      &renderer,
      command,
      &mut out
    )?;
  }

  info!("done");
  Ok(())
}

fn default_command(
  cfg: &config::Config
) -> anyhow::Result<Command> {
  let raw = cfg
    .get("default.command")
    .unwrap_or_else(|| {
      "dashboard".to_string()
    });
  let words = cli::split_words(&raw)?;
  debug!(command = %raw, "no explicit command, using default");
  ShellLine::try_parse_from(&words)
    .map(|line| line.command)
    .with_context(|| {
      format!(
        "invalid default.command: {raw}"
      )
    })
}
