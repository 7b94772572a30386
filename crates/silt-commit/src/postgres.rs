use std::sync::Arc;

use async_trait::async_trait;
use silt_fileset::{FilesetStorage, Ttl};
use silt_types::{CommitRef, FilesetId};
use sqlx::PgPool;

use crate::error::{CommitError, CommitResult};
use crate::traits::{CommitStore, UpdateFn};

/// Create the commit store schema.
///
/// `num` is a global sequence; ordering staging rows by it per commit
/// reproduces append order.
pub async fn setup_commit_store(pool: &PgPool) -> CommitResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS commit_diffs (
            repo_name VARCHAR(250) NOT NULL,
            commit_id VARCHAR(64) NOT NULL,
            num BIGSERIAL NOT NULL,
            fileset_id VARCHAR(64) NOT NULL,
            PRIMARY KEY(repo_name, commit_id, num)
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS commit_totals (
            repo_name VARCHAR(250) NOT NULL,
            commit_id VARCHAR(64) NOT NULL,
            fileset_id VARCHAR(64) NOT NULL,
            PRIMARY KEY(repo_name, commit_id)
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Transactional commit store backed by Postgres.
///
/// Staging lives in `commit_diffs` ordered by `num`; the finished total is
/// the at-most-one `commit_totals` row. Each call runs its SQL in one
/// transaction; fileset reference bookkeeping happens outside the
/// database, so a crash between the two can strand references. The
/// tracker's sweep is the backstop.
pub struct PostgresCommitStore {
    pool: PgPool,
    storage: Arc<FilesetStorage>,
}

impl PostgresCommitStore {
    pub fn new(pool: PgPool, storage: Arc<FilesetStorage>) -> Self {
        Self { pool, storage }
    }

    async fn get_total(
        &self,
        tx: &mut sqlx::PgConnection,
        commit: &CommitRef,
    ) -> CommitResult<Option<FilesetId>> {
        let row: Option<String> = sqlx::query_scalar(
            "SELECT fileset_id FROM commit_totals
             WHERE repo_name = $1 AND commit_id = $2",
        )
        .bind(&commit.repo)
        .bind(&commit.id)
        .fetch_optional(tx)
        .await?;
        row.map(|hex| parse_id(&hex)).transpose()
    }

    async fn get_diffs(
        &self,
        tx: &mut sqlx::PgConnection,
        commit: &CommitRef,
    ) -> CommitResult<Vec<FilesetId>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT fileset_id FROM commit_diffs
             WHERE repo_name = $1 AND commit_id = $2
             ORDER BY num",
        )
        .bind(&commit.repo)
        .bind(&commit.id)
        .fetch_all(tx)
        .await?;
        rows.iter().map(|hex| parse_id(hex)).collect()
    }
}

fn parse_id(hex: &str) -> CommitResult<FilesetId> {
    FilesetId::from_hex(hex).map_err(|e| CommitError::Corrupt(format!("fileset id {hex:?}: {e}")))
}

#[async_trait]
impl CommitStore for PostgresCommitStore {
    async fn add_fileset(&self, commit: &CommitRef, id: FilesetId) -> CommitResult<()> {
        // Clone first so the row never references a lease the caller can
        // expire out from under us.
        let pinned = self.storage.clone_ref(&id, Ttl::None).await?;
        let mut tx = self.pool.begin().await?;
        let num: i64 = sqlx::query_scalar(
            "INSERT INTO commit_diffs (repo_name, commit_id, fileset_id)
             VALUES ($1, $2, $3)
             RETURNING num",
        )
        .bind(&commit.repo)
        .bind(&commit.id)
        .bind(pinned.to_hex())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::debug!(%commit, num, fileset = %pinned.short_hex(), "staged fileset");
        Ok(())
    }

    async fn get_fileset(&self, commit: &CommitRef) -> CommitResult<FilesetId> {
        let mut tx = self.pool.begin().await?;
        let total = self.get_total(&mut tx, commit).await?;
        let staged = match total {
            Some(_) => Vec::new(),
            None => self.get_diffs(&mut tx, commit).await?,
        };
        tx.commit().await?;

        match total {
            Some(id) => Ok(self.storage.clone_ref(&id, Ttl::default_lease()).await?),
            None => Ok(self.storage.compose(&staged, Ttl::default_lease()).await?),
        }
    }

    async fn set_fileset(&self, commit: &CommitRef, id: FilesetId) -> CommitResult<()> {
        let pinned = self.storage.clone_ref(&id, Ttl::None).await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO commit_totals (repo_name, commit_id, fileset_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (repo_name, commit_id)
             DO UPDATE SET fileset_id = EXCLUDED.fileset_id",
        )
        .bind(&commit.repo)
        .bind(&commit.id)
        .bind(pinned.to_hex())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_fileset(&self, commit: &CommitRef, apply: UpdateFn) -> CommitResult<()> {
        let mut tx = self.pool.begin().await?;
        let total = self.get_total(&mut tx, commit).await?;
        let staged = match total {
            Some(_) => Vec::new(),
            None => self.get_diffs(&mut tx, commit).await?,
        };
        tx.commit().await?;

        let (current, composed) = match total {
            Some(id) => (id, false),
            None => (
                self.storage.compose(&staged, Ttl::default_lease()).await?,
                true,
            ),
        };
        let replacement = match apply(current) {
            Ok(replacement) => replacement,
            Err(err) => {
                // The on-the-fly compose holds its own lease; a rejected
                // modifier must not strand it. The finished total keeps
                // its stored reference.
                if composed {
                    let _ = self.storage.drop_ref(&current).await;
                }
                return Err(err);
            }
        };
        self.set_fileset(commit, replacement).await?;
        self.storage.drop_ref(&current).await?;
        Ok(())
    }

    async fn drop_filesets(&self, commit: &CommitRef) -> CommitResult<()> {
        let mut tx = self.pool.begin().await?;
        let staged = self.get_diffs(&mut tx, commit).await?;
        let total = self.get_total(&mut tx, commit).await?;
        sqlx::query("DELETE FROM commit_diffs WHERE repo_name = $1 AND commit_id = $2")
            .bind(&commit.repo)
            .bind(&commit.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM commit_totals WHERE repo_name = $1 AND commit_id = $2")
            .bind(&commit.repo)
            .bind(&commit.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        for id in staged {
            self.storage.drop_ref(&id).await?;
        }
        if let Some(id) = total {
            self.storage.drop_ref(&id).await?;
        }
        Ok(())
    }
}
