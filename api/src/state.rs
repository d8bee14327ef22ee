//! Application state container shared across Axum route handlers and services.

use crate::services::certificate::CertificateIssuer;
use sea_orm::DatabaseConnection;

/// Central application state shared across the server.
///
/// Holds the database connection and the certificate issuer (which carries
/// the renderer, object store, and notifier collaborators).
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    issuer: CertificateIssuer,
}

impl AppState {
    pub fn new(db: DatabaseConnection, issuer: CertificateIssuer) -> Self {
        Self { db, issuer }
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Returns a cloned copy of the database connection, for spawned tasks
    /// that require ownership.
    pub fn db_clone(&self) -> DatabaseConnection {
        self.db.clone()
    }

    pub fn issuer(&self) -> &CertificateIssuer {
        &self.issuer
    }
}
