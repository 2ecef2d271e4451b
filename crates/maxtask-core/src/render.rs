use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::palette::Color;
use crate::stats::{self, StatusCounts};
use crate::task::{Status, Task};
use crate::user::User;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

/// Section sizes for the dashboard.
#[derive(Debug, Clone, Copy)]
pub struct DashboardLimits {
    pub recent: usize,
    pub upcoming: usize,
}

impl Renderer {
    /// Color follows the `color` setting and is only used on a terminal.
    pub fn new(cfg: &Config) -> Self {
        Self::with_color(cfg, io::stdout().is_terminal())
    }

    fn with_color(cfg: &Config, terminal: bool) -> Self {
        Self {
            color: cfg.get_bool("color").unwrap_or(true) && terminal,
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn print_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[&Task],
        catalog: &Catalog,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks found.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Status".to_string(),
            "Deadline".to_string(),
            "Project".to_string(),
            "Title".to_string(),
            "Tags".to_string(),
            "Subtasks".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&task.id.to_string(), "33");
            let deadline = task.deadline.format("%Y-%m-%d").to_string();
            let deadline = if task.is_overdue(today) {
                self.paint(&deadline, "31")
            } else {
                deadline
            };

            rows.push(vec![
                id,
                self.status_label(task.status),
                deadline,
                self.project_label(task, catalog),
                task.title.clone(),
                self.tag_labels(task, catalog),
                task.progress().to_string(),
            ]);
        }

        write_table(out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(id = task.id))]
    pub fn print_task_info<W: Write>(
        &self,
        out: &mut W,
        task: &Task,
        catalog: &Catalog,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "status      {}", self.status_label(task.status))?;
        writeln!(out, "project     {}", self.project_label(task, catalog))?;
        writeln!(out, "tags        {}", self.tag_labels(task, catalog))?;
        if let Some(description) = &task.description {
            writeln!(out, "description {description}")?;
        }
        writeln!(out, "created     {}", task.created_at.format("%Y-%m-%d %H:%M"))?;

        let days = task.days_until_deadline(today);
        let relative = if task.is_overdue(today) {
            self.paint(&format!("overdue by {} day(s)", -days), "31")
        } else if days == 0 {
            "due today".to_string()
        } else if days > 0 {
            format!("in {days} day(s)")
        } else {
            format!("{} day(s) ago", -days)
        };
        writeln!(out, "deadline    {} ({relative})", task.deadline.format("%Y-%m-%d"))?;

        let progress = task.progress();
        writeln!(out, "progress    {progress} ({}%)", progress.percent())?;
        for subtask in &task.subtasks {
            let mark = if subtask.completed { "x" } else { " " };
            writeln!(out, "  [{mark}] {:>2} {}", subtask.id, subtask.title)?;
        }

        if !task.attachments.is_empty() {
            writeln!(out, "attachments ({})", task.attachments.len())?;
            for attachment in &task.attachments {
                writeln!(
                    out,
                    "  {:>2} {} [{:?}] {}",
                    attachment.id,
                    attachment.name,
                    attachment.kind,
                    human_size(attachment.size_bytes)
                )?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_dashboard<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        catalog: &Catalog,
        today: NaiveDate,
        limits: DashboardLimits,
    ) -> anyhow::Result<()> {
        let counts = stats::aggregate_counts(tasks, today);
        let status = counts.status;

        writeln!(out, "Total tasks   {}", status.total)?;
        writeln!(
            out,
            "Completed     {} ({}% completion)",
            status.done,
            status.completion_rate()
        )?;
        writeln!(out, "In progress   {}", status.in_progress)?;
        writeln!(out, "To do         {}", status.todo)?;
        let overdue = counts.overdue.to_string();
        let overdue = if counts.overdue > 0 {
            self.paint(&overdue, "31")
        } else {
            overdue
        };
        writeln!(out, "Overdue       {overdue}")?;

        writeln!(out)?;
        writeln!(out, "Tasks by project")?;
        for (project_id, count) in stats::tasks_per_project(tasks) {
            let label = match project_id {
                Some(_) => self.swatch(
                    catalog.project_name(project_id).unwrap_or_default(),
                    catalog.project_color(project_id),
                ),
                None => "(no project)".to_string(),
            };
            writeln!(out, "  {label}: {count}")?;
        }

        writeln!(out)?;
        writeln!(out, "Recent tasks")?;
        let recent = stats::recent(tasks, limits.recent);
        self.print_task_table(out, &recent, catalog, today)?;

        writeln!(out)?;
        writeln!(out, "Upcoming deadlines")?;
        let upcoming = stats::upcoming(tasks, limits.upcoming);
        self.print_task_table(out, &upcoming, catalog, today)?;

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_projects<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        catalog: &Catalog,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Project".to_string(),
            "Color".to_string(),
            "Tasks".to_string(),
            "To Do".to_string(),
            "In Progress".to_string(),
            "Done".to_string(),
            "Progress".to_string(),
        ];

        let rows = catalog
            .projects()
            .iter()
            .map(|project| {
                let counts: StatusCounts = stats::project_stats(tasks, project.id);
                vec![
                    project.id.to_string(),
                    self.swatch(&project.name, project.color),
                    project.color.to_string(),
                    counts.total.to_string(),
                    counts.todo.to_string(),
                    counts.in_progress.to_string(),
                    counts.done.to_string(),
                    format!("{}%", counts.completion_rate()),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all)]
    pub fn print_tags<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        catalog: &Catalog,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Tag".to_string(),
            "Color".to_string(),
            "Used by".to_string(),
        ];

        let rows = catalog
            .tags()
            .iter()
            .map(|tag| {
                vec![
                    tag.id.to_string(),
                    self.swatch(&tag.name, tag.color),
                    tag.color.to_string(),
                    stats::tag_usage(tasks, tag.id).to_string(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn print_profile<W: Write>(&self, out: &mut W, user: Option<&User>) -> anyhow::Result<()> {
        let Some(user) = user else {
            writeln!(out, "No user signed in.")?;
            return Ok(());
        };

        writeln!(out, "id        {}", user.id)?;
        writeln!(out, "name      {} ({})", user.name, user.initials())?;
        writeln!(out, "email     {}", user.email)?;
        writeln!(out, "phone     {}", user.phone)?;
        let avatar = if user.avatar.as_deref().is_some_and(|a| !a.is_empty()) {
            "set"
        } else {
            "none"
        };
        writeln!(out, "avatar    {avatar}")?;
        writeln!(out, "member    since {}", user.created_at.format("%Y-%m-%d"))?;
        Ok(())
    }

    fn status_label(&self, status: Status) -> String {
        let code = match status {
            Status::ToDo => "37",
            Status::InProgress => "34",
            Status::Done => "32",
        };
        self.paint(status.label(), code)
    }

    fn project_label(&self, task: &Task, catalog: &Catalog) -> String {
        match catalog.project_name(task.project_id) {
            Some(name) => self.swatch(name, catalog.project_color(task.project_id)),
            None => String::new(),
        }
    }

    fn tag_labels(&self, task: &Task, catalog: &Catalog) -> String {
        task.tag_ids
            .iter()
            .map(|id| self.swatch(&format!("+{}", catalog.tag_name(*id)), catalog.tag_color(*id)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn swatch(&self, text: &str, color: Color) -> String {
        self.paint(text, color.ansi())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let value = bytes as f64;
    if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.0} KB", value / KB)
    } else {
        format!("{bytes} B")
    }
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Renderer, human_size, strip_ansi, write_table};
    use crate::config::Config;

    #[test]
    fn table_pads_by_visible_width() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            vec!["ID".to_string(), "Title".to_string()],
            vec![
                vec!["\x1b[33m1\x1b[0m".to_string(), "Ação".to_string()],
                vec!["12".to_string(), "x".to_string()],
            ],
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID Title ");
        assert_eq!(lines[1], "-- ----- ");
        assert_eq!(strip_ansi(lines[2]), "1  Ação  ");
        assert_eq!(lines[3], "12 x     ");
    }

    #[test]
    fn color_setting_uses_config_booleans() {
        let mut cfg = Config::default();
        assert!(Renderer::with_color(&cfg, true).color);
        assert!(!Renderer::with_color(&cfg, false).color);

        cfg.apply_overrides([("color".to_string(), "no".to_string())]);
        assert!(!Renderer::with_color(&cfg, true).color);

        cfg.apply_overrides([("rc.color".to_string(), "y".to_string())]);
        assert!(Renderer::with_color(&cfg, true).color);
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(human_size(2_411_724), "2.3 MB");
        assert_eq!(human_size(876_544), "856 KB");
        assert_eq!(human_size(12), "12 B");
    }
}
