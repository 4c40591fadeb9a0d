// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only reference data: the daily route plan.
//!
//! A pull replaces the whole day in one transaction. Clients and
//! recommendations are also written as individual records tagged with
//! `plan_date` so the UI can query them by segment or client.

use std::sync::Arc;

use chrono::NaiveDate;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use fieldsync_core::types::{Client, Recommendation, RoutePlan};
use fieldsync_core::{AuthErrorKind, Clock, FieldsyncError, ReferenceSource, TransportError};
use fieldsync_storage::queries::records;
use fieldsync_storage::{Database, Partition};

use crate::network::NetworkGatekeeper;
use crate::session::SessionManager;

const LAST_PULL_KEY: &str = "last_route_pull";
const PLAN_DATE_INDEX: &str = "plan_date";

/// A reference entity stored with the day it belongs to.
#[derive(Serialize)]
struct Dated<'a, T> {
    plan_date: &'a str,
    #[serde(flatten)]
    entity: &'a T,
}

/// Pulls route plans into the local store.
#[derive(Clone)]
pub struct ReferenceSync {
    db: Database,
    source: Arc<dyn ReferenceSource>,
    session: SessionManager,
    network: NetworkGatekeeper,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ReferenceSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceSync")
            .field("source", &self.source.name())
            .finish_non_exhaustive()
    }
}

impl ReferenceSync {
    pub fn new(
        db: Database,
        source: Arc<dyn ReferenceSource>,
        session: SessionManager,
        network: NetworkGatekeeper,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            source,
            session,
            network,
            clock,
        }
    }

    /// Local calendar day of the injected clock, `YYYY-MM-DD`.
    pub fn today(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.clock.now_ms())
            .map(|utc| utc.with_timezone(&chrono::Local).date_naive().to_string())
            .unwrap_or_default()
    }

    /// Fetch the plan for `date` and replace the cached day with it.
    ///
    /// Nothing local changes unless the whole plan was fetched and written.
    pub async fn pull_route_plan(&self, date: &str) -> Result<RoutePlan, FieldsyncError> {
        validate_date(date)?;
        if !self.network.is_online() {
            return Err(FieldsyncError::TransientNetwork {
                message: "device is offline".into(),
            });
        }

        let token = self.session.get_token().await?.ok_or_else(|| {
            FieldsyncError::auth(AuthErrorKind::NotAuthenticated, "login required to pull route plan")
        })?;

        let plan = match self
            .source
            .fetch_route_plan(date, token.expose_secret())
            .await
        {
            Err(TransportError::Unauthorized) => {
                debug!(date, "route plan fetch unauthorized, refreshing");
                let fresh = self.session.refresh().await?;
                self.source
                    .fetch_route_plan(date, fresh.expose_secret())
                    .await?
            }
            other => other?,
        };

        self.store(date, &plan).await?;
        info!(
            date,
            clients = plan.clients.len(),
            recommendations = plan.recommendations.len(),
            "route plan pulled"
        );
        Ok(plan)
    }

    /// The cached plan for `date`, if one was pulled.
    pub async fn cached_route_plan(&self, date: &str) -> Result<Option<RoutePlan>, FieldsyncError> {
        records::get_as(&self.db, Partition::RoutePlans, date).await
    }

    /// Cached clients of `date` in one commercial segment.
    pub async fn clients_in_segment(
        &self,
        date: &str,
        segment: &str,
    ) -> Result<Vec<Client>, FieldsyncError> {
        let rows = records::query(&self.db, Partition::Clients, "segment", segment).await?;
        decode_for_date(rows, date)
    }

    /// Cached recommendations for one client on `date`.
    pub async fn recommendations_for(
        &self,
        date: &str,
        client_id: &str,
    ) -> Result<Vec<Recommendation>, FieldsyncError> {
        let rows =
            records::query(&self.db, Partition::Recommendations, "client_id", client_id).await?;
        decode_for_date(rows, date)
    }

    async fn store(&self, date: &str, plan: &RoutePlan) -> Result<(), FieldsyncError> {
        let date = date.to_string();
        let pulled_at = self.clock.now_ms();

        let mut clients = Vec::with_capacity(plan.clients.len());
        for client in &plan.clients {
            let value = serde_json::to_value(Dated {
                plan_date: &date,
                entity: client,
            })
            .map_err(FieldsyncError::storage)?;
            clients.push((format!("{date}:{}", client.id), value));
        }
        let mut recommendations = Vec::with_capacity(plan.recommendations.len());
        for rec in &plan.recommendations {
            let value = serde_json::to_value(Dated {
                plan_date: &date,
                entity: rec,
            })
            .map_err(FieldsyncError::storage)?;
            recommendations.push((format!("{date}:{}", rec.id), value));
        }
        let plan_value = serde_json::to_value(plan).map_err(FieldsyncError::storage)?;

        records::run_in_transaction(
            &self.db,
            &[
                Partition::RoutePlans,
                Partition::Clients,
                Partition::Recommendations,
                Partition::Meta,
            ],
            move |tx| {
                let dropped_clients =
                    tx.delete_by_index(Partition::Clients, PLAN_DATE_INDEX, &date)?;
                let dropped_recs =
                    tx.delete_by_index(Partition::Recommendations, PLAN_DATE_INDEX, &date)?;
                debug!(date, dropped_clients, dropped_recs, "replacing cached day");

                for (key, value) in &clients {
                    tx.put(Partition::Clients, key, value)?;
                }
                for (key, value) in &recommendations {
                    tx.put(Partition::Recommendations, key, value)?;
                }
                tx.put(Partition::RoutePlans, &date, &plan_value)?;
                tx.put(
                    Partition::Meta,
                    LAST_PULL_KEY,
                    &json!({ "date": date, "at": pulled_at }),
                )?;
                Ok(())
            },
        )
        .await
    }
}

fn validate_date(date: &str) -> Result<(), FieldsyncError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|e| FieldsyncError::Validation {
            message: format!("invalid date `{date}`: {e}"),
        })
}

fn decode_for_date<T: serde::de::DeserializeOwned>(
    rows: Vec<(String, serde_json::Value)>,
    date: &str,
) -> Result<Vec<T>, FieldsyncError> {
    rows.into_iter()
        .filter(|(_, value)| value.get(PLAN_DATE_INDEX).and_then(|d| d.as_str()) == Some(date))
        .map(|(_, value)| serde_json::from_value(value).map_err(FieldsyncError::storage))
        .collect()
}
