use crate::errors::BackendError;
use crate::models::{CompletionRecord, HabitRecord, UserId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHabit {
    pub user_id: UserId,
    #[serde(flatten)]
    pub record: HabitRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCompletion {
    pub user_id: UserId,
    #[serde(flatten)]
    pub record: CompletionRecord,
}

/// On-disk document holding every user's habits and completion records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendData {
    pub habits: Vec<StoredHabit>,
    pub completions: Vec<StoredCompletion>,
}

/// Loads the data file. A missing file is empty data; a file that does not
/// parse is moved aside to `<name>.corrupt` so the next write cannot overwrite it.
pub async fn load_data(path: &Path) -> Result<BackendData, BackendError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(BackendData::default());
        }
        Err(err) => {
            error!("failed to read data file {}: {err}", path.display());
            return Err(err.into());
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(data) => Ok(data),
        Err(err) => {
            let aside = sibling_path(path, "corrupt");
            error!(
                "failed to parse data file {}: {err}; moving it to {}",
                path.display(),
                aside.display()
            );
            fs::rename(path, &aside).await?;
            warn!("starting with empty data, previous contents kept in {}", aside.display());
            Ok(BackendData::default())
        }
    }
}

/// Writes to a temporary sibling first and renames it over `path`, so the data
/// file is either the old or the new document, never a partial one.
pub async fn persist_data(path: &Path, data: &BackendData) -> Result<(), BackendError> {
    let payload = serde_json::to_vec_pretty(data)?;
    let tmp = sibling_path(path, "tmp");

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(&payload).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
