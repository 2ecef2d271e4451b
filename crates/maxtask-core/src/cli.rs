use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "maxtask",
    version,
    about = "MaxTask: in-memory task board",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "maxtaskrc")]
    pub maxtaskrc: Option<PathBuf>,

    /// TOML or JSON file to start the session from instead of the built-in data.
    #[arg(long = "seed")]
    pub seed: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// One line typed into `maxtask shell`.
#[derive(Parser, Debug, Clone)]
#[command(name = "maxtask", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Counts, per-project totals, recent tasks and upcoming deadlines.
    Dashboard,
    /// List tasks, optionally filtered.
    List(ListArgs),
    /// Show one task with subtasks and attachments.
    Show { id: u64 },
    Add(AddArgs),
    Modify(ModifyArgs),
    /// Mark a task as done.
    Done { id: u64 },
    Delete { id: u64 },
    /// Flip the completion flag of a subtask.
    Toggle { task: u64, subtask: u64 },
    Projects,
    ProjectAdd(ProjectAddArgs),
    ProjectEdit(ProjectEditArgs),
    ProjectDelete { id: u64 },
    Tags,
    TagAdd(TagAddArgs),
    TagEdit(TagEditArgs),
    TagDelete { id: u64 },
    /// Show or edit the signed-in user.
    Profile(ProfileArgs),
    /// Dump the session as JSON.
    Export {
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Read commands from stdin against one session.
    Shell,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    /// Status to keep, or "all".
    #[arg(long)]
    pub status: Option<String>,

    /// Project name to keep, or "all".
    #[arg(long)]
    pub project: Option<String>,

    /// Keep tasks carrying any of these tags.
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,

    /// Extra terms: `status:<s>`, `project:<name>`, `+<tag>`.
    pub terms: Vec<String>,
}

impl ListArgs {
    pub fn filter_terms(&self) -> Vec<String> {
        let mut terms = Vec::new();
        if let Some(status) = &self.status {
            terms.push(format!("status:{status}"));
        }
        if let Some(project) = &self.project {
            terms.push(format!("project:{project}"));
        }
        terms.extend(self.tags.iter().map(|tag| format!("+{tag}")));
        terms.extend(self.terms.iter().cloned());
        terms
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,

    /// `YYYY-MM-DD`, `today`, `tomorrow`, `yesterday`, `+3d`, `-1w`.
    #[arg(long, default_value = "today")]
    pub deadline: String,

    #[arg(long = "subtask", action = ArgAction::Append)]
    pub subtasks: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ModifyArgs {
    pub id: u64,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long, conflicts_with = "no_project")]
    pub project: Option<String>,

    #[arg(long)]
    pub no_project: bool,

    /// Replaces the task's tags.
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,

    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,

    #[arg(long)]
    pub deadline: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ProjectAddArgs {
    pub name: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, default_value = "blue")]
    pub color: String,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ProjectEditArgs {
    pub id: u64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TagAddArgs {
    pub name: String,

    #[arg(long, default_value = "blue")]
    pub color: String,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TagEditArgs {
    pub id: u64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileArgs {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub clear_avatar: bool,

    /// Sign out of the session.
    #[arg(long, conflicts_with_all = ["name", "email", "phone", "clear_avatar"])]
    pub sign_out: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.KEY=VALUE` / `rc.KEY:VALUE` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

/// Splits a shell line into words. Double or single quotes group words and
/// are removed; there are no escapes inside quotes.
pub fn split_words(line: &str) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    out.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(anyhow!("unterminated {q} quote"));
    }
    if in_word {
        out.push(current);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, ShellLine, preprocess_args, split_words};

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let raw: Vec<OsString> = ["maxtask", "rc.color=off", "list", "rc.timezone:UTC"]
            .into_iter()
            .map(OsString::from)
            .collect();
        let pre = preprocess_args(&raw).unwrap();

        assert_eq!(pre.cleaned_args, vec![OsString::from("maxtask"), OsString::from("list")]);
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.timezone".to_string(), "UTC".to_string()),
            ]
        );
    }

    #[test]
    fn global_flags_and_subcommand() {
        let cli = GlobalCli::parse_from([
            "maxtask",
            "-vv",
            "--rc",
            "color=off",
            "list",
            "--status",
            "todo",
            "--tag",
            "Backend",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides[0].key, "color");
        let Some(Command::List(args)) = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(args.filter_terms(), ["status:todo", "+Backend"]);
    }

    #[test]
    fn shell_words_respect_quotes() {
        assert_eq!(
            split_words(r#"add Write docs --project "Mobile App" --tag 'Back end'"#).unwrap(),
            ["add", "Write", "docs", "--project", "Mobile App", "--tag", "Back end"]
        );
        assert_eq!(split_words(r#"add """#).unwrap(), ["add", ""]);
        assert!(split_words("add \"open").is_err());
    }

    #[test]
    fn shell_line_parses_without_binary_name() {
        let line = ShellLine::try_parse_from(["toggle", "2", "4"]).unwrap();
        assert_eq!(line.command, Command::Toggle { task: 2, subtask: 4 });
    }
}
