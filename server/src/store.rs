//! SQLite-backed stores for generation records and templates.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Generation, GenerationMode, NewGeneration, NewTemplate, Template};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_CONNECTIONS: u32 = 5;

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    // In-memory databases exist per connection; a pool larger than one
    // would hand out empty databases.
    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        MAX_CONNECTIONS
    };
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS generations (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            mode TEXT NOT NULL,
            voice TEXT NOT NULL,
            speed REAL NOT NULL,
            instructions TEXT,
            format TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_url TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS templates (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            content TEXT NOT NULL,
            variables TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn row_to_generation(row: &SqliteRow) -> Result<Generation, sqlx::Error> {
    let mode_text: String = row.try_get("mode")?;
    let mode = GenerationMode::from_str(&mode_text)
        .map_err(|e| sqlx::Error::Decode(e.into()))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(Generation {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        mode,
        voice: row.try_get("voice")?,
        speed: row.try_get("speed")?,
        instructions: row.try_get("instructions")?,
        format: row.try_get("format")?,
        file_name: row.try_get("file_name")?,
        file_url: row.try_get("file_url")?,
        created_at,
    })
}

/// Create/list/count/delete over generation records.
#[derive(Debug, Clone)]
pub struct GenerationStore {
    pool: SqlitePool,
}

impl GenerationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewGeneration) -> Result<Generation, sqlx::Error> {
        let generation = Generation {
            id: Uuid::new_v4().to_string(),
            text: new.text,
            mode: new.mode,
            voice: new.voice,
            speed: new.speed,
            instructions: new.instructions,
            format: new.format,
            file_name: new.file_name,
            file_url: new.file_url,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO generations
             (id, text, mode, voice, speed, instructions, format, file_name, file_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&generation.id)
        .bind(&generation.text)
        .bind(generation.mode.as_str())
        .bind(&generation.voice)
        .bind(generation.speed)
        .bind(&generation.instructions)
        .bind(&generation.format)
        .bind(&generation.file_name)
        .bind(&generation.file_url)
        .bind(generation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(generation)
    }

    /// Newest first, offset/limit paginated.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Generation>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, text, mode, voice, speed, instructions, format, file_name, file_url, created_at
             FROM generations
             ORDER BY created_at DESC
             LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_generation).collect()
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM generations")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }

    pub async fn get(&self, id: &str) -> Result<Option<Generation>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, text, mode, voice, speed, instructions, format, file_name, file_url, created_at
             FROM generations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_generation).transpose()
    }

    /// Delete the row, then best-effort remove the backing file. The file
    /// may live under a session folder or the legacy flat directory; either
    /// way a missing or stubborn file is logged, never escalated, so a
    /// record can be deleted even when its file is already gone.
    pub async fn delete(&self, id: &str, audio_root: &Path) -> Result<bool, sqlx::Error> {
        let Some(generation) = self.get(id).await? else {
            return Ok(false);
        };

        let affected = sqlx::query("DELETE FROM generations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Ok(false);
        }

        if let Some(relative) = resolve_audio_relative_path(&generation.file_url) {
            let path = audio_root.join(relative);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!("removed audio file {}", path.display()),
                Err(e) => warn!(
                    "could not remove audio file {} for generation {id}: {e}",
                    path.display()
                ),
            }
        } else {
            warn!("generation {id} has an unexpected file_url: {}", generation.file_url);
        }

        Ok(true)
    }
}

/// Turn a public `/audio/...` URL into a path relative to the audio root.
/// Covers both session-scoped (`/audio/sessions/<id>/<file>`) and legacy
/// flat (`/audio/<file>`) layouts. Rejects anything that could escape the
/// root.
pub(crate) fn resolve_audio_relative_path(file_url: &str) -> Option<&str> {
    let relative = file_url.strip_prefix("/audio/")?;
    if relative.is_empty()
        || relative.split('/').any(|part| {
            part.is_empty() || part == "." || part == ".." || part.contains('\\')
        })
    {
        return None;
    }
    Some(relative)
}

fn row_to_template(row: &SqliteRow) -> Result<Template, sqlx::Error> {
    let variables_json: String = row.try_get("variables")?;
    let variables: Vec<String> = serde_json::from_str(&variables_json).unwrap_or_default();
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(Template {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        content: row.try_get("content")?,
        variables,
        is_default: row.try_get("is_default")?,
        created_at,
    })
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    pool: SqlitePool,
}

impl TemplateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List all templates, defaults first, then by category and name.
    /// Seeds the built-in templates on the first empty read.
    pub async fn list(&self) -> Result<Vec<Template>, sqlx::Error> {
        let templates = self.list_inner().await?;
        if !templates.is_empty() {
            return Ok(templates);
        }
        for template in default_templates() {
            self.create(template).await?;
        }
        self.list_inner().await
    }

    async fn list_inner(&self) -> Result<Vec<Template>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, category, content, variables, is_default, created_at
             FROM templates
             ORDER BY is_default DESC, category ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_template).collect()
    }

    pub async fn create(&self, new: NewTemplate) -> Result<Template, sqlx::Error> {
        let template = Template {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            category: new.category,
            content: new.content,
            variables: new.variables,
            is_default: new.is_default,
            created_at: Utc::now(),
        };
        let variables_json =
            serde_json::to_string(&template.variables).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            "INSERT INTO templates (id, name, category, content, variables, is_default, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.category)
        .bind(&template.content)
        .bind(&variables_json)
        .bind(template.is_default)
        .bind(template.created_at)
        .execute(&self.pool)
        .await?;
        Ok(template)
    }

    pub async fn update(
        &self,
        id: &str,
        name: &str,
        category: &str,
        content: &str,
        variables: &[String],
    ) -> Result<Option<Template>, sqlx::Error> {
        let variables_json =
            serde_json::to_string(variables).unwrap_or_else(|_| "[]".to_string());
        let affected = sqlx::query(
            "UPDATE templates SET name = ?1, category = ?2, content = ?3, variables = ?4
             WHERE id = ?5",
        )
        .bind(name)
        .bind(category)
        .bind(content)
        .bind(&variables_json)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Template>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, name, category, content, variables, is_default, created_at
             FROM templates WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_template).transpose()
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let affected = sqlx::query("DELETE FROM templates WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

/// The built-in phone-system templates seeded on first read.
fn default_templates() -> Vec<NewTemplate> {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    vec![
        NewTemplate {
            name: "Voicemail Greeting".to_string(),
            category: "voicemail".to_string(),
            content: "Hello, you've reached {company_name}. {agent_name} is unavailable at the \
                      moment. Please leave your name, number, and a brief message after the tone, \
                      and we'll return your call as soon as possible."
                .to_string(),
            variables: strings(&["company_name", "agent_name"]),
            is_default: true,
        },
        NewTemplate {
            name: "IVR Main Menu".to_string(),
            category: "ivr".to_string(),
            content: "Welcome to {company_name}. For {department_1}, press 1. For {department_2}, \
                      press 2. For {department_3}, press 3. To speak with an operator, press 0."
                .to_string(),
            variables: strings(&["company_name", "department_1", "department_2", "department_3"]),
            is_default: true,
        },
        NewTemplate {
            name: "Hold Message".to_string(),
            category: "hold".to_string(),
            content: "Thank you for holding. Your call is important to {company_name}. A \
                      representative will be with you shortly. Your estimated wait time is \
                      {wait_time}."
                .to_string(),
            variables: strings(&["company_name", "wait_time"]),
            is_default: true,
        },
        NewTemplate {
            name: "After Hours".to_string(),
            category: "after_hours".to_string(),
            content: "{company_name} is currently closed. Our business hours are {hours}. If this \
                      is an emergency, please {emergency_action}. Otherwise, please call back \
                      during business hours or leave a message after the tone."
                .to_string(),
            variables: strings(&["company_name", "hours", "emergency_action"]),
            is_default: true,
        },
        NewTemplate {
            name: "Holiday Greeting".to_string(),
            category: "holiday".to_string(),
            content: "Thank you for calling {company_name}. We are currently closed for {holiday}. \
                      We will reopen on {return_date}. We wish you a happy {holiday}!"
                .to_string(),
            variables: strings(&["company_name", "holiday", "return_date"]),
            is_default: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_stores() -> (GenerationStore, TemplateStore) {
        let pool = connect("sqlite::memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        (GenerationStore::new(pool.clone()), TemplateStore::new(pool))
    }

    fn sample_generation(text: &str) -> NewGeneration {
        NewGeneration {
            text: text.to_string(),
            mode: GenerationMode::Basic,
            voice: "alloy".to_string(),
            speed: 1.0,
            instructions: None,
            format: "wav".to_string(),
            file_name: "greeting.wav".to_string(),
            file_url: "/audio/sessions/session_1_ab/greeting.wav".to_string(),
        }
    }

    #[tokio::test]
    async fn create_list_count_paginate() {
        let (generations, _) = memory_stores().await;
        for i in 0..3 {
            generations.create(sample_generation(&format!("prompt {i}"))).await.unwrap();
            // Distinct created_at values so the ordering is deterministic.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert_eq!(generations.count().await.unwrap(), 3);

        let page = generations.list(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].text, "prompt 2"); // newest first

        let rest = generations.list(2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].text, "prompt 0");
    }

    #[tokio::test]
    async fn delete_is_idempotent_with_missing_file() {
        let (generations, _) = memory_stores().await;
        let tmp = tempfile::tempdir().unwrap();
        let created = generations.create(sample_generation("hello")).await.unwrap();

        // The backing file never existed; the row must still go away.
        assert!(generations.delete(&created.id, tmp.path()).await.unwrap());
        assert_eq!(generations.count().await.unwrap(), 0);
        // Second delete of the same id reports nothing to remove.
        assert!(!generations.delete(&created.id, tmp.path()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_backing_file_when_present() {
        let (generations, _) = memory_stores().await;
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("sessions/session_1_ab");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("greeting.wav");
        std::fs::write(&file, b"RIFF").unwrap();

        let created = generations.create(sample_generation("hello")).await.unwrap();
        assert!(generations.delete(&created.id, tmp.path()).await.unwrap());
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn first_template_read_seeds_defaults() {
        let (_, templates) = memory_stores().await;
        let listed = templates.list().await.unwrap();
        assert_eq!(listed.len(), 5);
        assert!(listed.iter().all(|t| t.is_default));
        assert!(listed
            .iter()
            .any(|t| t.name == "IVR Main Menu" && t.variables.contains(&"company_name".to_string())));
        // Second read does not duplicate the seeds.
        assert_eq!(templates.list().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn template_crud() {
        let (_, templates) = memory_stores().await;
        templates.list().await.unwrap(); // seed
        let created = templates
            .create(NewTemplate {
                name: "Callback".to_string(),
                category: "queue".to_string(),
                content: "We will call you back at {number}.".to_string(),
                variables: vec!["number".to_string()],
                is_default: false,
            })
            .await
            .unwrap();

        let updated = templates
            .update(&created.id, "Callback", "queue", "Updated {number}.", &["number".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.content, "Updated {number}.");

        assert!(templates.delete(&created.id).await.unwrap());
        assert!(!templates.delete(&created.id).await.unwrap());
    }

    #[test]
    fn audio_urls_resolve_safely() {
        assert_eq!(
            resolve_audio_relative_path("/audio/sessions/s1/a.wav"),
            Some("sessions/s1/a.wav")
        );
        assert_eq!(resolve_audio_relative_path("/audio/a.wav"), Some("a.wav"));
        assert_eq!(resolve_audio_relative_path("/audio/../secrets"), None);
        assert_eq!(resolve_audio_relative_path("/elsewhere/a.wav"), None);
        assert_eq!(resolve_audio_relative_path("/audio/"), None);
    }
}
