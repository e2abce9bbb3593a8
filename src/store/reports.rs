//! Markdown report store.
//!
//! One file per report named `<date>-<slug>.md`: a `---` header block
//! (title, summary, tags, originating task, timestamps) followed by a
//! free-text body.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::fs::{ensure_dir, write_atomic};

/// A parsed report. `name` is the filename without the `.md` extension.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub body: String,
}

/// Fields accepted when creating a report.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub body: String,
}

/// Store for markdown reports under a single directory.
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    /// Write a new report. The filename is today's date plus a slug of the
    /// title; a collision gets a numeric suffix rather than overwriting.
    pub async fn create(&self, new: NewReport) -> Result<Report, StoreError> {
        let date = Utc::now().format("%Y-%m-%d");
        let slug = slugify(&new.title);

        let mut name = format!("{date}-{slug}");
        let mut n = 2;
        while fs::try_exists(self.dir.join(format!("{name}.md"))).await? {
            name = format!("{date}-{slug}-{n}");
            n += 1;
        }

        let now = Utc::now();
        let report = Report {
            name: name.clone(),
            title: new.title,
            summary: new.summary,
            tags: new.tags,
            task_id: new.task_id,
            created_at: Some(now),
            updated_at: Some(now),
            body: new.body,
        };
        write_atomic(&self.dir.join(format!("{name}.md")), render(&report).as_bytes()).await?;
        Ok(report)
    }

    /// Read and parse a report by name (filename without `.md`).
    pub async fn get(&self, name: &str) -> Result<Report, StoreError> {
        let not_found = || StoreError::NotFound {
            entity: "report".to_string(),
            id: name.to_string(),
        };
        // The name comes from a URL path; never let it escape the directory.
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(not_found());
        }
        match fs::read_to_string(self.dir.join(format!("{name}.md"))).await {
            Ok(raw) => Ok(parse(name, &raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }

    /// Report names, newest first. The date prefix makes lexicographic
    /// order chronological.
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort_by(|a, b| b.cmp(a));
        Ok(names)
    }
}

fn render(report: &Report) -> String {
    // Header values live one per line; newlines in them would break parsing.
    let one_line = |s: &str| s.replace('\n', " ");

    let mut out = String::from("---\n");
    out.push_str(&format!("title: {}\n", one_line(&report.title)));
    if let Some(summary) = &report.summary {
        out.push_str(&format!("summary: {}\n", one_line(summary)));
    }
    if !report.tags.is_empty() {
        out.push_str(&format!("tags: {}\n", report.tags.join(", ")));
    }
    if let Some(task_id) = report.task_id {
        out.push_str(&format!("task: {task_id}\n"));
    }
    if let Some(created) = report.created_at {
        out.push_str(&format!("created: {}\n", created.to_rfc3339()));
    }
    if let Some(updated) = report.updated_at {
        out.push_str(&format!("updated: {}\n", updated.to_rfc3339()));
    }
    out.push_str("---\n\n");
    out.push_str(&report.body);
    if !report.body.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Tolerant parse: a file without a header block is all body, with the
/// title falling back to the name.
fn parse(name: &str, raw: &str) -> Report {
    let mut report = Report {
        name: name.to_string(),
        title: name.to_string(),
        summary: None,
        tags: Vec::new(),
        task_id: None,
        created_at: None,
        updated_at: None,
        body: raw.to_string(),
    };

    let Some(rest) = raw.strip_prefix("---\n") else {
        return report;
    };
    let Some((header, body)) = rest.split_once("\n---\n") else {
        return report;
    };

    for line in header.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "title" => report.title = value.to_string(),
            "summary" => report.summary = Some(value.to_string()),
            "tags" => {
                report.tags = value
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            }
            "task" => report.task_id = value.parse().ok(),
            "created" => {
                report.created_at = DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|t| t.with_timezone(&Utc))
            }
            "updated" => {
                report.updated_at = DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|t| t.with_timezone(&Utc))
            }
            _ => {}
        }
    }
    report.body = body.trim_start_matches('\n').to_string();
    report
}

/// Lowercase the title and collapse anything non-alphanumeric to `-`.
fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "report".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    async fn test_store() -> (ReportStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::open(dir.path().join("reports")).await.unwrap();
        (store, dir)
    }

    fn new_report(title: &str) -> NewReport {
        NewReport {
            title: title.to_string(),
            summary: None,
            tags: Vec::new(),
            task_id: None,
            body: String::new(),
        }
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Fix the bug!"), "fix-the-bug");
        assert_eq!(slugify("  Weekly   update  "), "weekly-update");
        assert_eq!(slugify("v2.0 release"), "v2-0-release");
        assert_eq!(slugify("???"), "report");
    }

    #[test]
    fn render_parse_round_trips_header() {
        let task_id = Uuid::new_v4();
        let report = Report {
            name: "2026-08-25-weekly".into(),
            title: "Weekly".into(),
            summary: Some("What happened".into()),
            tags: vec!["ops".into(), "infra".into()],
            task_id: Some(task_id),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            body: "All quiet.\n".into(),
        };
        let parsed = parse(&report.name, &render(&report));
        assert_eq!(parsed.title, "Weekly");
        assert_eq!(parsed.summary.as_deref(), Some("What happened"));
        assert_eq!(parsed.tags, vec!["ops", "infra"]);
        assert_eq!(parsed.task_id, Some(task_id));
        assert!(parsed.created_at.is_some());
        assert_eq!(parsed.body, "All quiet.\n");
    }

    #[test]
    fn parse_without_header_is_all_body() {
        let parsed = parse("notes", "just some text\n");
        assert_eq!(parsed.title, "notes");
        assert_eq!(parsed.body, "just some text\n");
        assert!(parsed.created_at.is_none());
    }

    #[tokio::test]
    async fn create_names_by_date_and_slug() {
        let (store, _dir) = test_store().await;
        let report = store.create(new_report("Fix the bug!")).await.unwrap();

        let date = Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(report.name, format!("{date}-fix-the-bug"));

        let loaded = store.get(&report.name).await.unwrap();
        assert_eq!(loaded.title, "Fix the bug!");
    }

    #[tokio::test]
    async fn same_title_same_day_gets_a_suffix() {
        let (store, _dir) = test_store().await;
        let first = store.create(new_report("Standup")).await.unwrap();
        let second = store.create(new_report("Standup")).await.unwrap();

        assert_ne!(first.name, second.name);
        assert!(second.name.ends_with("-2"));
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.get("2026-01-01-nope").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn get_rejects_path_escapes() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.get("../secrets").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (store, _dir) = test_store().await;
        // Two reports created today sort by suffix; hand-plant an older one.
        write_atomic(
            &store.dir.join("2020-01-01-ancient.md"),
            b"---\ntitle: Ancient\n---\n\nold\n",
        )
        .await
        .unwrap();
        store.create(new_report("Recent")).await.unwrap();

        let names = store.list().await.unwrap();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("-recent"));
        assert_eq!(names[1], "2020-01-01-ancient");
    }
}
