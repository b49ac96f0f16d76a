use std::collections::HashMap;

use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Course, Post, PostProgress, PostStatus, ProgressPatch, Visibility};
use crate::store::CareerStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store for curricula and learner progress.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_post(&self, career: &str, course_slug: &str, post_slug: &str) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            r#"
            SELECT p.id
            FROM career_progress.posts p
            JOIN career_progress.courses c ON c.id = p.course_id
            WHERE c.career = $1 AND c.slug = $2 AND p.slug = $3
            "#,
        )
        .bind(career)
        .bind(course_slug)
        .bind(post_slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("id")))
    }
}

#[async_trait]
impl CareerStore for PgStore {
    async fn list_courses_for_career(&self, career: &str) -> Result<Vec<Course>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, slug, position, contribution, learning_hours
            FROM career_progress.courses
            WHERE career = $1
            ORDER BY position
            "#,
        )
        .bind(career)
        .fetch_all(&self.pool)
        .await?;

        let courses = rows
            .into_iter()
            .map(|row| Course {
                id: row.get("id"),
                name: row.get("name"),
                slug: row.get("slug"),
                position: row.get("position"),
                contribution: row.get("contribution"),
                hours: row.get("learning_hours"),
            })
            .collect();

        Ok(courses)
    }

    async fn list_posts(&self, course_id: Uuid, visibility: Visibility) -> Result<Vec<Post>> {
        let mut query = String::from(
            "SELECT id, slug, course_id, position, lesson_id, status \
             FROM career_progress.posts \
             WHERE course_id = $1",
        );
        if visibility == Visibility::Learner {
            query.push_str(" AND status = 'published'");
        }
        query.push_str(" ORDER BY position");

        let rows = sqlx::query(&query).bind(course_id).fetch_all(&self.pool).await?;
        let mut posts = Vec::with_capacity(rows.len());

        for row in rows {
            let status: String = row.get("status");
            let Some(status) = PostStatus::parse(&status) else {
                warn!(course = %course_id, status = %status, "skipping post with unknown status");
                continue;
            };
            posts.push(Post {
                id: row.get("id"),
                slug: row.get("slug"),
                course_id: row.get("course_id"),
                position: row.get("position"),
                lesson_id: row.get("lesson_id"),
                status,
            });
        }

        Ok(posts)
    }

    async fn read_progress(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<HashMap<Uuid, PostProgress>> {
        let rows = sqlx::query(
            r#"
            SELECT pp.post_id, pp.viewed_at, pp.completed
            FROM career_progress.post_progress pp
            JOIN career_progress.posts p ON p.id = pp.post_id
            WHERE pp.learner_id = $1 AND p.course_id = $2
            "#,
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| {
                (
                    row.get("post_id"),
                    PostProgress {
                        viewed_at: row.get("viewed_at"),
                        completed: row.get("completed"),
                    },
                )
            })
            .collect();

        Ok(entries)
    }

    async fn write_progress(
        &self,
        learner_id: Uuid,
        post_id: Uuid,
        patch: ProgressPatch,
    ) -> Result<PostProgress> {
        let row = sqlx::query(
            r#"
            INSERT INTO career_progress.post_progress AS pp
            (learner_id, post_id, viewed_at, completed, updated_at)
            VALUES ($1, $2, $3, COALESCE($4, FALSE), NOW())
            ON CONFLICT (learner_id, post_id) DO UPDATE
            SET viewed_at = COALESCE(pp.viewed_at, EXCLUDED.viewed_at),
                completed = COALESCE($4, pp.completed),
                updated_at = NOW()
            RETURNING viewed_at, completed
            "#,
        )
        .bind(learner_id)
        .bind(post_id)
        .bind(patch.viewed_at)
        .bind(patch.completed)
        .fetch_one(&self.pool)
        .await?;

        Ok(PostProgress {
            viewed_at: row.get("viewed_at"),
            completed: row.get("completed"),
        })
    }

    async fn reset_course_progress(&self, learner_id: Uuid, course_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let completed: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS completed
            FROM career_progress.post_progress pp
            JOIN career_progress.posts p ON p.id = pp.post_id
            WHERE pp.learner_id = $1 AND p.course_id = $2 AND pp.completed
            "#,
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?
        .get("completed");

        sqlx::query(
            r#"
            INSERT INTO career_progress.progress_history
            (id, learner_id, course_id, completed_count, reset_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(learner_id)
        .bind(course_id)
        .bind(completed)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM career_progress.post_progress pp
            USING career_progress.posts p
            WHERE pp.post_id = p.id AND pp.learner_id = $1 AND p.course_id = $2
            "#,
        )
        .bind(learner_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

pub const SEED_CAREER: &str = "data-analyst";

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let courses = vec![
        (
            "sql-foundations",
            "SQL Foundations",
            1,
            40.0,
            Some(48.0),
            vec!["select-basics", "filtering", "joins", "aggregation", "window-functions"],
        ),
        (
            "python-for-analysis",
            "Python for Analysis",
            2,
            35.0,
            Some(42.0),
            vec!["notebooks", "pandas-frames", "cleaning-data", "plotting"],
        ),
        (
            "dashboards-storytelling",
            "Dashboards & Storytelling",
            3,
            25.0,
            None,
            vec!["chart-choice", "dashboard-layout", "presenting-findings"],
        ),
    ];

    for (slug, name, position, contribution, hours, posts) in courses {
        let course_id: Uuid = sqlx::query(
            r#"
            INSERT INTO career_progress.courses
            (id, career, slug, name, position, contribution, learning_hours)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (career, slug) DO UPDATE
            SET name = EXCLUDED.name,
                position = EXCLUDED.position,
                contribution = EXCLUDED.contribution,
                learning_hours = EXCLUDED.learning_hours
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(SEED_CAREER)
        .bind(slug)
        .bind(name)
        .bind(position)
        .bind(contribution)
        .bind(hours)
        .fetch_one(pool)
        .await?
        .get("id");

        for (index, post_slug) in posts.into_iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO career_progress.posts
                (id, course_id, slug, position, lesson_id, status)
                VALUES ($1, $2, $3, $4, NULL, 'published')
                ON CONFLICT (course_id, slug) DO UPDATE
                SET position = EXCLUDED.position, status = EXCLUDED.status
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(course_id)
            .bind(post_slug)
            .bind(index as i32 + 1)
            .execute(pool)
            .await?;
        }
    }

    info!(career = SEED_CAREER, "seeded sample curriculum");
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
struct ProgressEventRow {
    learner_id: Uuid,
    career: String,
    course_slug: String,
    post_slug: String,
    event: String,
    occurred_at: DateTime<Utc>,
}

fn event_patch(event: &str, occurred_at: DateTime<Utc>) -> anyhow::Result<ProgressPatch> {
    let patch = match event {
        "viewed" => ProgressPatch {
            viewed_at: Some(occurred_at),
            completed: None,
        },
        "completed" => ProgressPatch {
            viewed_at: Some(occurred_at),
            completed: Some(true),
        },
        "uncompleted" => ProgressPatch {
            viewed_at: None,
            completed: Some(false),
        },
        other => bail!("unknown progress event '{other}'"),
    };
    Ok(patch)
}

/// Applies progress events from a CSV file in file order. Returns the number applied.
pub async fn import_csv(store: &PgStore, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("cannot open {}", csv_path.display()))?;
    let mut applied = 0usize;

    for (line, result) in reader.deserialize::<ProgressEventRow>().enumerate() {
        let row = result.with_context(|| format!("invalid row {}", line + 1))?;
        let patch = event_patch(&row.event, row.occurred_at)?;

        let Some(post_id) = store
            .find_post(&row.career, &row.course_slug, &row.post_slug)
            .await?
        else {
            warn!(
                career = %row.career,
                course = %row.course_slug,
                post = %row.post_slug,
                "skipping event for unknown post"
            );
            continue;
        };

        store.write_progress(row.learner_id, post_id, patch).await?;
        applied += 1;
    }

    Ok(applied)
}
