use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    helpers::{custom_from_json, custom_to_json, format_datetime, parse_datetime},
    models::Visit,
    Database,
};
use crate::config::FootprintsConfig;
use crate::jobs::VisitRecorder;
use crate::models::UserId;

const VISIT_COLUMNS: &str = "id, user_id, footprint, ip, landing_domain, landing_page, landing_params,
    referral, gclid, utm_source, utm_campaign, utm_medium, utm_term, utm_content,
    referrer_url, referrer_domain, custom_json, created_at, updated_at";

fn row_to_visit(row: &Row) -> Result<Visit> {
    let custom_json: String = row.get("custom_json")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Visit {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        footprint: row.get("footprint")?,
        ip: row.get("ip")?,
        landing_domain: row.get("landing_domain")?,
        landing_page: row.get("landing_page")?,
        landing_params: row.get("landing_params")?,
        referral: row.get("referral")?,
        gclid: row.get("gclid")?,
        utm_source: row.get("utm_source")?,
        utm_campaign: row.get("utm_campaign")?,
        utm_medium: row.get("utm_medium")?,
        utm_term: row.get("utm_term")?,
        utm_content: row.get("utm_content")?,
        referrer_url: row.get("referrer_url")?,
        referrer_domain: row.get("referrer_domain")?,
        custom: custom_from_json(&custom_json)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_visit(&self, visit: &Visit) -> Result<()> {
        let record = visit.clone();
        self.execute(move |conn| {
            let custom_json = custom_to_json(&record.custom)?;
            conn.execute(
                "INSERT INTO visits (
                    id, user_id, footprint, ip, landing_domain, landing_page, landing_params,
                    referral, gclid, utm_source, utm_campaign, utm_medium, utm_term, utm_content,
                    referrer_url, referrer_domain, custom_json, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                params![
                    record.id,
                    record.user_id,
                    record.footprint,
                    record.ip,
                    record.landing_domain,
                    record.landing_page,
                    record.landing_params,
                    record.referral,
                    record.gclid,
                    record.utm_source,
                    record.utm_campaign,
                    record.utm_medium,
                    record.utm_term,
                    record.utm_content,
                    record.referrer_url,
                    record.referrer_domain,
                    custom_json,
                    format_datetime(&record.created_at),
                    format_datetime(&record.updated_at),
                ],
            )
            .with_context(|| "failed to insert visit")?;
            Ok(())
        })
        .await
    }

    /// All visits sharing a footprint, oldest first.
    pub async fn get_visits_for_footprint(&self, footprint: &str) -> Result<Vec<Visit>> {
        let footprint = footprint.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VISIT_COLUMNS} FROM visits
                 WHERE footprint = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;

            let mut rows = stmt.query(params![footprint])?;
            let mut visits = Vec::new();
            while let Some(row) = rows.next()? {
                visits.push(row_to_visit(row)?);
            }
            Ok(visits)
        })
        .await
    }

    pub async fn get_visits_for_user(&self, user_id: UserId) -> Result<Vec<Visit>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VISIT_COLUMNS} FROM visits
                 WHERE user_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;

            let mut rows = stmt.query(params![user_id])?;
            let mut visits = Vec::new();
            while let Some(row) = rows.next()? {
                visits.push(row_to_visit(row)?);
            }
            Ok(visits)
        })
        .await
    }

    /// First-touch visit for a footprint.
    pub async fn initial_visit(&self, footprint: &str) -> Result<Option<Visit>> {
        self.edge_visit(footprint, "ASC").await
    }

    /// Last-touch visit for a footprint.
    pub async fn final_visit(&self, footprint: &str) -> Result<Option<Visit>> {
        self.edge_visit(footprint, "DESC").await
    }

    async fn edge_visit(&self, footprint: &str, direction: &'static str) -> Result<Option<Visit>> {
        let footprint = footprint.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VISIT_COLUMNS} FROM visits
                 WHERE footprint = ?1
                 ORDER BY created_at {direction}, rowid {direction}
                 LIMIT 1"
            ))?;

            let mut rows = stmt.query(params![footprint])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_visit(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Credit earlier anonymous visits from a footprint to a user, typically
    /// right after the user signs up or logs in. Returns the number of visits
    /// claimed.
    pub async fn assign_user_to_footprint(&self, footprint: &str, user_id: UserId) -> Result<usize> {
        let footprint = footprint.to_string();
        self.execute(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE visits
                     SET user_id = ?1,
                         updated_at = ?2
                     WHERE footprint = ?3 AND user_id IS NULL",
                    params![user_id, format_datetime(&Utc::now()), footprint],
                )
                .with_context(|| "failed to assign visits to user")?;
            Ok(updated)
        })
        .await
    }

    /// Delete visits created before `cutoff`. Returns the number removed.
    pub async fn prune_visits(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM visits WHERE created_at < ?1",
                    params![format_datetime(&cutoff)],
                )
                .with_context(|| "failed to prune visits")?;
            Ok(removed)
        })
        .await
    }

    /// Delete visits that have aged out of the configured attribution window.
    pub async fn prune_expired(&self, config: &FootprintsConfig) -> Result<usize> {
        match Utc::now().checked_sub_signed(config.attribution_window()) {
            Some(cutoff) => self.prune_visits(cutoff).await,
            None => Ok(0),
        }
    }
}

impl VisitRecorder for Database {
    async fn record(&self, visit: Visit) -> Result<()> {
        self.insert_visit(&visit).await
    }
}
