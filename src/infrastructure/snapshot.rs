//! JSON snapshot files.

use std::path::Path;
use tracing::info;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::services::SessionSnapshot;

const STORE: &str = "snapshot file";

fn unreachable(path: &Path, err: &std::io::Error) -> OrchestrationError {
    OrchestrationError::StoreUnreachable {
        store: STORE.to_string(),
        reason: format!("{}: {err}", path.display()),
    }
}

/// Write `snapshot` to `path` as pretty JSON. The file is replaced
/// atomically through a sibling temp file.
pub async fn save_snapshot(path: impl AsRef<Path>, snapshot: &SessionSnapshot) -> DomainResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(snapshot)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| unreachable(parent, &e))?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await.map_err(|e| unreachable(&tmp, &e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| unreachable(path, &e))?;
    info!(
        path = %path.display(),
        session_id = %snapshot.session.id,
        version = snapshot.version,
        "snapshot saved"
    );
    Ok(())
}

/// Read a snapshot. Unparseable content is a corrupted snapshot; the
/// consistency checks run on resume.
pub async fn load_snapshot(path: impl AsRef<Path>) -> DomainResult<SessionSnapshot> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| unreachable(path, &e))?;
    Ok(serde_json::from_str(&json)?)
}
