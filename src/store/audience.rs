//! libSQL `AudienceSource`: a local mirror of the CRM's subscriber list and
//! house representative table.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::campaign::model::{CampaignTarget, RepInfo, Representatives};
use crate::error::SourceError;
use crate::phone::normalize_phone;
use crate::store::libsql_backend::{open_local, open_memory};
use crate::store::migrations;
use crate::store::traits::AudienceSource;

/// Subscriber and representative data read from a libSQL database.
pub struct LibSqlAudienceSource {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn query_err(op: &str, e: libsql::Error) -> SourceError {
    SourceError::Query(format!("{op}: {e}"))
}

impl LibSqlAudienceSource {
    pub async fn new_local(path: &Path) -> Result<Self, SourceError> {
        let (db, conn) = open_local(path).await?;
        migrations::run_audience_migrations(&conn).await?;
        info!(path = %path.display(), "Audience source opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory mirror (for tests).
    pub async fn new_memory() -> Result<Self, SourceError> {
        let (db, conn) = open_memory().await?;
        migrations::run_audience_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Add or replace a subscriber row.
    pub async fn upsert_subscriber(
        &self,
        target: &CampaignTarget,
        email: &str,
        subscribed: bool,
    ) -> Result<(), SourceError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO subscribers
                    (id, phone_number, email, postal_code, plus4, district, state_district, county, subscribed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    target.id,
                    normalize_phone(&target.phone_number),
                    email,
                    target.postal_code.as_str(),
                    opt_text(target.plus4.as_deref()),
                    target.district.as_str(),
                    opt_text(target.state_district.as_deref()),
                    opt_text(target.county.as_deref()),
                    subscribed as i64,
                ],
            )
            .await
            .map_err(|e| query_err("upsert_subscriber", e))?;
        Ok(())
    }

    /// Add or replace the representative for `rep.district`.
    pub async fn upsert_representative(&self, rep: &RepInfo) -> Result<(), SourceError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO representatives
                    (district, title, long_title, official_name, first_name, last_name, phone_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rep.district.as_str(),
                    rep.title.as_str(),
                    rep.long_title.as_str(),
                    rep.official_name.as_str(),
                    rep.first_name.as_str(),
                    rep.last_name.as_str(),
                    rep.phone_number.as_str(),
                ],
            )
            .await
            .map_err(|e| query_err("upsert_representative", e))?;
        Ok(())
    }
}

fn row_to_target(row: &libsql::Row) -> Result<CampaignTarget, libsql::Error> {
    let phone: String = row.get(1)?;
    Ok(CampaignTarget {
        id: row.get(0)?,
        phone_number: normalize_phone(&phone),
        postal_code: row.get(2)?,
        plus4: row.get(3).ok(),
        district: row.get(4)?,
        state_district: row.get(5).ok(),
        county: row.get(6).ok(),
    })
}

fn row_to_rep(row: &libsql::Row) -> Result<RepInfo, libsql::Error> {
    let phone: String = row.get(6)?;
    Ok(RepInfo {
        district: row.get(0)?,
        title: row.get(1)?,
        long_title: row.get(2)?,
        official_name: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        phone_number: normalize_phone(&phone),
    })
}

#[async_trait]
impl AudienceSource for LibSqlAudienceSource {
    async fn current_subscribers(&self) -> Result<Vec<CampaignTarget>, SourceError> {
        let mut rows = self
            .conn
            .query(
                "SELECT MIN(id), phone_number, postal_code, plus4, district, state_district, county
                 FROM subscribers
                 WHERE subscribed = 1 AND phone_number != ''
                 GROUP BY phone_number
                 ORDER BY MIN(id)",
                (),
            )
            .await
            .map_err(|e| query_err("current_subscribers", e))?;

        let mut targets = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| query_err("current_subscribers", e))?
        {
            match row_to_target(&row) {
                Ok(target) => targets.push(target),
                Err(e) => warn!(error = %e, "Skipping unreadable subscriber row"),
            }
        }
        debug!(count = targets.len(), "Fetched current subscribers");
        Ok(targets)
    }

    async fn representatives(&self) -> Result<Representatives, SourceError> {
        let mut rows = self
            .conn
            .query(
                "SELECT district, title, long_title, official_name, first_name, last_name, phone_number
                 FROM representatives WHERE hidden = 0",
                (),
            )
            .await
            .map_err(|e| query_err("representatives", e))?;

        let mut reps = Representatives::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| query_err("representatives", e))?
        {
            match row_to_rep(&row) {
                Ok(rep) => {
                    reps.insert(rep.district.clone(), rep);
                }
                Err(e) => warn!(error = %e, "Skipping unreadable representative row"),
            }
        }
        Ok(reps)
    }

    async fn district_for_postal_code(
        &self,
        postal_code: &str,
    ) -> Result<Option<String>, SourceError> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT district FROM subscribers
                 WHERE postal_code = ?1 AND district != '' LIMIT 1",
                params![postal_code],
            )
            .await
            .map_err(|e| query_err("district_for_postal_code", e))?;

        match rows
            .next()
            .await
            .map_err(|e| query_err("district_for_postal_code", e))?
        {
            Some(row) => Ok(Some(
                row.get(0).map_err(|e| query_err("district_for_postal_code", e))?,
            )),
            None => Ok(None),
        }
    }

    async fn emails_for_phone(&self, phone: &str) -> Result<Vec<String>, SourceError> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT email FROM subscribers
                 WHERE phone_number = ?1 AND email != '' ORDER BY email",
                params![normalize_phone(phone)],
            )
            .await
            .map_err(|e| query_err("emails_for_phone", e))?;

        let mut emails = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| query_err("emails_for_phone", e))?
        {
            emails.push(row.get(0).map_err(|e| query_err("emails_for_phone", e))?);
        }
        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> LibSqlAudienceSource {
        let source = LibSqlAudienceSource::new_memory().await.unwrap();
        let rows = [
            (1, "+1 (706) 555-0001", "a@example.com", "30601", "GA-10", true),
            (2, "7065550002", "b@example.com", "30602", "GA-09", true),
            (3, "7065550001", "a2@example.com", "30601", "GA-10", true),
            (4, "7065550004", "gone@example.com", "30601", "GA-10", false),
        ];
        for (id, phone, email, zip, district, subscribed) in rows {
            let mut target = CampaignTarget::new(phone, zip, district);
            target.id = id;
            source
                .upsert_subscriber(&target, email, subscribed)
                .await
                .unwrap();
        }
        source
            .upsert_representative(&RepInfo {
                district: "GA-10".into(),
                title: "Rep.".into(),
                long_title: "Representative".into(),
                last_name: "Hice".into(),
                phone_number: "202-225-4101".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        source
    }

    #[tokio::test]
    async fn subscribers_deduplicated_in_source_order() {
        let source = seeded().await;
        let subs = source.current_subscribers().await.unwrap();
        assert_eq!(
            subs.iter().map(|t| t.phone_number.as_str()).collect::<Vec<_>>(),
            vec!["7065550001", "7065550002"]
        );
        assert_eq!(subs[0].id, 1);
    }

    #[tokio::test]
    async fn representatives_keyed_by_district() {
        let source = seeded().await;
        let reps = source.representatives().await.unwrap();
        assert_eq!(reps.len(), 1);
        assert_eq!(reps["GA-10"].last_name, "Hice");
        assert_eq!(reps["GA-10"].phone_number, "2022254101");
    }

    #[tokio::test]
    async fn guesses_district_for_zip() {
        let source = seeded().await;
        assert_eq!(
            source.district_for_postal_code("30602").await.unwrap(),
            Some("GA-09".to_string())
        );
        assert_eq!(source.district_for_postal_code("99999").await.unwrap(), None);
    }

    #[tokio::test]
    async fn emails_for_formatted_phone() {
        let source = seeded().await;
        let emails = source.emails_for_phone("1-706-555-0001").await.unwrap();
        assert_eq!(emails, vec!["a2@example.com", "a@example.com"]);
    }
}
