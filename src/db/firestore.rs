// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed remote store.
//!
//! Each record kind has its own collection and the client-generated record
//! ID is the document ID, so pushing the same record twice overwrites the
//! same document.

use crate::db::{collections, RemoteStore};
use crate::error::{Result, SyncError};
use crate::models::{Record, RecordKind, Route, Workout};
use async_trait::async_trait;

/// Firestore remote client.
#[derive(Clone)]
pub struct FirestoreRemote {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreRemote {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            SyncError::RemoteUnavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            SyncError::RemoteUnavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client (offline mode).
    ///
    /// All remote operations fail with `RemoteUnavailable`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client.as_ref().ok_or_else(|| {
            SyncError::RemoteUnavailable("Firestore not connected (offline mode)".to_string())
        })
    }

    /// Fetch the remote copy of a workout.
    pub async fn get_workout(&self, id: &str) -> Result<Option<Workout>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WORKOUTS)
            .obj()
            .one(id)
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))
    }

    /// Fetch the remote copy of a route.
    pub async fn get_route(&self, id: &str) -> Result<Option<Route>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ROUTES)
            .obj()
            .one(id)
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for FirestoreRemote {
    async fn upsert(&self, record: &Record) -> Result<()> {
        let client = self.get_client()?;
        let collection = collections::for_kind(record.kind());

        let _: () = match record {
            Record::Workout(workout) => {
                client
                    .fluent()
                    .update()
                    .in_col(collection)
                    .document_id(&workout.id)
                    .object(workout)
                    .execute()
                    .await
            }
            Record::Route(route) => {
                client
                    .fluent()
                    .update()
                    .in_col(collection)
                    .document_id(&route.id)
                    .object(route)
                    .execute()
                    .await
            }
        }
        .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;

        tracing::debug!(record_id = record.id(), kind = %record.kind(), "Upserted remote document");
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<()> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::for_kind(kind))
            .document_id(id)
            .execute()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;

        tracing::debug!(record_id = id, kind = %kind, "Deleted remote document");
        Ok(())
    }
}
