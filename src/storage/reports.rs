use anyhow::Result;
use chrono::{TimeZone, Utc};

use super::schema::Database;
use crate::catalog::BrokenSourceReport;

impl Database {
    // ========================================================================
    // Broken Source Reports
    // ========================================================================

    /// Record that a playback source for a content item does not work.
    pub async fn report_broken_source(&self, report: &BrokenSourceReport) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO broken_sources (content_id, content_title, server_name, reported_url, reported_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&report.content_id)
        .bind(&report.content_title)
        .bind(&report.server_name)
        .bind(&report.reported_url)
        .bind(report.timestamp.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            content_id = %report.content_id,
            server = %report.server_name,
            "Broken source reported"
        );
        Ok(row.0)
    }

    /// Most recent reports first.
    pub async fn get_broken_source_reports(&self, limit: u32) -> Result<Vec<BrokenSourceReport>> {
        let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT content_id, content_title, server_name, reported_url, reported_at
            FROM broken_sources
            ORDER BY reported_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(content_id, content_title, server_name, reported_url, reported_at)| {
                    BrokenSourceReport {
                        content_id,
                        content_title,
                        server_name,
                        reported_url,
                        timestamp: Utc
                            .timestamp_millis_opt(reported_at)
                            .single()
                            .unwrap_or_default(),
                    }
                },
            )
            .collect())
    }
}
