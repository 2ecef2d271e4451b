use std::io::Write;

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::catalog::{ProjectPatch, TagPatch};
use crate::cli::{
    AddArgs, Command, ListArgs, ModifyArgs, ProfileArgs, ProjectAddArgs, ProjectEditArgs,
    TagAddArgs, TagEditArgs,
};
use crate::config::Config;
use crate::datetime::parse_deadline_expr;
use crate::filter::TaskFilter;
use crate::palette::Color;
use crate::render::{DashboardLimits, Renderer};
use crate::session::Session;
use crate::task::{NewTask, Status, TaskPatch};
use crate::user::UserPatch;

/// Per-invocation inputs that are not part of the session state.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
    pub limits: DashboardLimits,
}

impl CommandContext {
    pub fn from_config(
        cfg: &Config,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> anyhow::Result<Self> {
        let limits = DashboardLimits {
            recent: cfg.get_usize("dashboard.recent.limit")?.unwrap_or(5),
            upcoming: cfg.get_usize("dashboard.upcoming.limit")?.unwrap_or(5),
        };
        Ok(Self { now, today, limits })
    }
}

#[instrument(skip(session, ctx, renderer, out))]
pub fn dispatch<W: Write>(
    session: &mut Session,
    ctx: &CommandContext,
    renderer: &Renderer,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Dashboard => renderer.print_dashboard(
            out,
            session.tasks.tasks(),
            &session.catalog,
            ctx.today,
            ctx.limits,
        ),
        Command::List(args) => cmd_list(session, ctx, renderer, &args, out),
        Command::Show { id } => cmd_show(session, ctx, renderer, id, out),
        Command::Add(args) => cmd_add(session, ctx, args, out),
        Command::Modify(args) => cmd_modify(session, ctx, args, out),
        Command::Done { id } => {
            let applied = session.tasks.complete_task(id);
            report(out, applied, &format!("Task {id} marked as done."), "task", id)
        }
        Command::Delete { id } => {
            let applied = session.tasks.delete_task(id);
            report(out, applied, &format!("Deleted task {id}."), "task", id)
        }
        Command::Toggle { task, subtask } => cmd_toggle(session, task, subtask, out),
        Command::Projects => {
            renderer.print_projects(out, session.tasks.tasks(), &session.catalog)
        }
        Command::ProjectAdd(args) => cmd_project_add(session, args, out),
        Command::ProjectEdit(args) => cmd_project_edit(session, args, out),
        Command::ProjectDelete { id } => {
            let applied = session.catalog.delete_project(id);
            report(out, applied, &format!("Deleted project {id}."), "project", id)
        }
        Command::Tags => renderer.print_tags(out, session.tasks.tasks(), &session.catalog),
        Command::TagAdd(args) => cmd_tag_add(session, args, out),
        Command::TagEdit(args) => cmd_tag_edit(session, args, out),
        Command::TagDelete { id } => {
            let applied = session.catalog.delete_tag(id);
            report(out, applied, &format!("Deleted tag {id}."), "tag", id)
        }
        Command::Profile(args) => cmd_profile(session, renderer, args, out),
        Command::Export { output } => {
            let seed = session.export();
            match output {
                Some(path) => {
                    seed.write_json_atomic(&path)?;
                    writeln!(out, "Exported session to {}.", path.display())?;
                }
                None => writeln!(out, "{}", seed.to_json()?)?,
            }
            Ok(())
        }
        Command::Shell => Err(anyhow!("already running a shell")),
    }
}

fn report<W: Write>(
    out: &mut W,
    applied: bool,
    message: &str,
    kind: &str,
    id: u64,
) -> anyhow::Result<()> {
    if applied {
        writeln!(out, "{message}")?;
    } else {
        writeln!(out, "No {kind} with id {id}.")?;
    }
    Ok(())
}

#[instrument(skip(session, ctx, renderer, args, out))]
fn cmd_list<W: Write>(
    session: &Session,
    ctx: &CommandContext,
    renderer: &Renderer,
    args: &ListArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let filter = TaskFilter::parse(&args.filter_terms(), &session.catalog)?;
    let snapshot = session.tasks.snapshot();
    let matching = filter.apply(&snapshot);
    info!(
        matched = matching.len(),
        total = snapshot.len(),
        "command list"
    );
    renderer.print_task_table(out, &matching, &session.catalog, ctx.today)
}

fn cmd_show<W: Write>(
    session: &Session,
    ctx: &CommandContext,
    renderer: &Renderer,
    id: u64,
    out: &mut W,
) -> anyhow::Result<()> {
    match session.tasks.get(id) {
        Some(task) => renderer.print_task_info(out, task, &session.catalog, ctx.today),
        None => {
            writeln!(out, "No task with id {id}.")?;
            Ok(())
        }
    }
}

#[instrument(skip(session, ctx, args, out))]
fn cmd_add<W: Write>(
    session: &mut Session,
    ctx: &CommandContext,
    args: AddArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let deadline = parse_deadline_expr(&args.deadline, ctx.today)?;
    let mut task = NewTask::new(args.title.join(" "), deadline, ctx.now);
    task.description = args.description.filter(|d| !d.trim().is_empty());
    if let Some(status) = args.status {
        task.status = status.parse::<Status>()?;
    }
    if let Some(project) = args.project {
        task.project_id = Some(session.catalog.require_project(&project)?);
    }
    task.tag_ids = resolve_tags(session, &args.tags)?;
    let task = task.with_subtasks(
        args.subtasks
            .into_iter()
            .filter(|title| !title.trim().is_empty()),
    );

    let id = session.tasks.add_task(task)?;
    writeln!(out, "Created task {id}.")?;
    Ok(())
}

#[instrument(skip(session, ctx, args, out), fields(id = args.id))]
fn cmd_modify<W: Write>(
    session: &mut Session,
    ctx: &CommandContext,
    args: ModifyArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut patch = TaskPatch {
        title: args.title,
        ..TaskPatch::default()
    };

    if args.clear_description {
        patch.description = Some(None);
    } else if let Some(description) = args.description {
        patch.description = Some(Some(description));
    }
    if let Some(status) = args.status {
        patch.status = Some(status.parse::<Status>()?);
    }
    if args.no_project {
        patch.project_id = Some(None);
    } else if let Some(project) = args.project {
        patch.project_id = Some(Some(session.catalog.require_project(&project)?));
    }
    if args.clear_tags {
        patch.tag_ids = Some(vec![]);
    } else if !args.tags.is_empty() {
        patch.tag_ids = Some(resolve_tags(session, &args.tags)?);
    }
    if let Some(deadline) = args.deadline {
        patch.deadline = Some(parse_deadline_expr(&deadline, ctx.today)?);
    }

    if patch.is_empty() {
        bail!("nothing to modify; pass at least one field");
    }

    let applied = session.tasks.update_task(args.id, patch)?;
    report(out, applied, &format!("Modified task {}.", args.id), "task", args.id)
}

fn cmd_toggle<W: Write>(
    session: &mut Session,
    task_id: u64,
    subtask_id: u64,
    out: &mut W,
) -> anyhow::Result<()> {
    if !session.tasks.toggle_subtask(task_id, subtask_id) {
        writeln!(out, "No subtask {subtask_id} on task {task_id}.")?;
        return Ok(());
    }

    if let Some(task) = session.tasks.get(task_id) {
        let progress = task.progress();
        writeln!(
            out,
            "Task {task_id}: {progress} subtasks done ({}%).",
            progress.percent()
        )?;
    }
    Ok(())
}

fn cmd_project_add<W: Write>(
    session: &mut Session,
    args: ProjectAddArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let color: Color = args.color.parse()?;
    let id = session
        .catalog
        .add_project(&args.name, args.description, color)?;
    writeln!(out, "Created project {id}.")?;
    Ok(())
}

fn cmd_project_edit<W: Write>(
    session: &mut Session,
    args: ProjectEditArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let patch = ProjectPatch {
        name: args.name,
        description: args.description.map(Some),
        color: args.color.map(|c| c.parse::<Color>()).transpose()?,
    };
    if patch == ProjectPatch::default() {
        bail!("nothing to modify; pass at least one field");
    }
    let applied = session.catalog.update_project(args.id, patch)?;
    report(out, applied, &format!("Modified project {}.", args.id), "project", args.id)
}

fn cmd_tag_add<W: Write>(
    session: &mut Session,
    args: TagAddArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let color: Color = args.color.parse()?;
    let id = session.catalog.add_tag(&args.name, color)?;
    writeln!(out, "Created tag {id}.")?;
    Ok(())
}

fn cmd_tag_edit<W: Write>(
    session: &mut Session,
    args: TagEditArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let patch = TagPatch {
        name: args.name,
        color: args.color.map(|c| c.parse::<Color>()).transpose()?,
    };
    if patch == TagPatch::default() {
        bail!("nothing to modify; pass at least one field");
    }
    let applied = session.catalog.update_tag(args.id, patch)?;
    report(out, applied, &format!("Modified tag {}.", args.id), "tag", args.id)
}

#[instrument(skip(session, renderer, args, out))]
fn cmd_profile<W: Write>(
    session: &mut Session,
    renderer: &Renderer,
    args: ProfileArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    if args.sign_out {
        session.user.set_user(None);
        writeln!(out, "Signed out.")?;
        return Ok(());
    }

    let patch = UserPatch {
        name: args.name,
        email: args.email,
        phone: args.phone,
        avatar: args.clear_avatar.then_some(None),
    };

    if patch != UserPatch::default() {
        patch.validate().context("invalid profile update")?;
        if !session.user.update_user(patch) {
            writeln!(out, "No user signed in.")?;
            return Ok(());
        }
        writeln!(out, "Profile updated.")?;
    }

    renderer.print_profile(out, session.user.user())
}

fn resolve_tags(session: &Session, names: &[String]) -> anyhow::Result<Vec<u64>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id = session.catalog.require_tag(name)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
