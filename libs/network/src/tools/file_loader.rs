//! Loading and saving execution data files

use crate::{Result, TransportError};
use codec::{encode_data_set, read_data_set};
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use types::ExecutionDataSet;

/// Accumulates the contents of any number of exec files
///
/// Each load is all-or-nothing: a file that fails to decode or conflicts
/// with data already loaded leaves the loader unchanged.
#[derive(Debug, Default)]
pub struct ExecFileLoader {
    data: ExecutionDataSet,
}

impl ExecFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let set = read_data_set(bytes)?;
        self.data.merge_set(&set)?;
        Ok(())
    }

    pub async fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .await
            .map_err(|e| TransportError::io(format!("Failed to read {}", path.display()), e))?;
        self.load_bytes(&bytes)?;
        debug!(
            file = %path.display(),
            bytes = bytes.len(),
            classes = self.data.len(),
            "Loaded execution data"
        );
        Ok(())
    }

    /// Write everything loaded so far as one stream
    ///
    /// Missing parent directories are created. With `append` the stream is
    /// added after the existing contents, which still reads back as one file.
    pub async fn save(&self, path: impl AsRef<Path>, append: bool) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                TransportError::io(format!("Failed to create {}", parent.display()), e)
            })?;
        }

        let bytes = encode_data_set(&self.data)?;
        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options
            .open(path)
            .await
            .map_err(|e| TransportError::io(format!("Failed to open {}", path.display()), e))?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    pub fn data(&self) -> &ExecutionDataSet {
        &self.data
    }

    pub fn into_data(self) -> ExecutionDataSet {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use types::{ClassId, ExecutionData, SessionInfo};

    fn sample(session: &str, probes: Vec<bool>) -> ExecutionDataSet {
        let mut set = ExecutionDataSet::new();
        set.add_session(SessionInfo::new(session, 10, 20));
        set.merge_in(ExecutionData::new(ClassId::new(0xabc), "Sample", probes))
            .unwrap();
        set
    }

    #[tokio::test]
    async fn test_load_merges_files() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.exec");
        let second = dir.path().join("b.exec");
        std::fs::write(&first, encode_data_set(&sample("a", vec![true, false])).unwrap()).unwrap();
        std::fs::write(&second, encode_data_set(&sample("b", vec![false, true])).unwrap())
            .unwrap();

        let mut loader = ExecFileLoader::new();
        loader.load_file(&first).await.unwrap();
        loader.load_file(&second).await.unwrap();

        let data = loader.into_data();
        assert_eq!(data.sessions().len(), 2);
        assert_eq!(data.get(ClassId::new(0xabc)).unwrap().probes(), &[true, true]);
    }

    #[tokio::test]
    async fn test_conflicting_file_leaves_loader_unchanged() {
        let mut loader = ExecFileLoader::new();
        loader
            .load_bytes(&encode_data_set(&sample("a", vec![true, false])).unwrap())
            .unwrap();

        let conflicting = encode_data_set(&sample("b", vec![true, true, true])).unwrap();
        let err = loader.load_bytes(&conflicting).unwrap_err();
        assert_eq!(err.category(), "data");
        assert_eq!(loader.data().sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_save_append_reads_back_merged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/merged.exec");

        let mut loader = ExecFileLoader::new();
        loader
            .load_bytes(&encode_data_set(&sample("a", vec![true, false])).unwrap())
            .unwrap();
        loader.save(&path, false).await.unwrap();
        loader.save(&path, true).await.unwrap();

        let mut reloaded = ExecFileLoader::new();
        reloaded.load_file(&path).await.unwrap();
        assert_eq!(reloaded.data().sessions().len(), 2);
        assert_eq!(
            reloaded.data().get(ClassId::new(0xabc)).unwrap().probes(),
            &[true, false]
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let mut loader = ExecFileLoader::new();
        let err = loader
            .load_file(dir.path().join("absent.exec"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "io");
    }
}
