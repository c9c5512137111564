use crate::state_machine::ClosureRecord;
use crate::storage::traits::ArchiveStore;
use ron::ser::PrettyConfig;
use std::fs;
use std::path::PathBuf;

/// A file-based archive of closed trades.
///
/// Each trade is saved in a file named after the trade id, e.g. `buyer-trade-0.ron`
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a new file store in `path`, creating the directory if needed.
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn file_for(&self, trade_id: &str) -> PathBuf {
        // Trade ids are caller supplied, so keep them from escaping the archive directory
        let name: String =
            trade_id.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();
        self.path.join(format!("{name}.ron"))
    }
}

impl ArchiveStore for FileStore {
    fn archive(&mut self, record: &ClosureRecord) -> Result<(), anyhow::Error> {
        let config = PrettyConfig::new().compact_arrays(true).compact_maps(true);
        let val = ron::ser::to_string_pretty(record, config)?;
        fs::write(self.file_for(&record.trade_id), val)?;
        Ok(())
    }

    fn load_record(&self, trade_id: &str) -> Result<ClosureRecord, anyhow::Error> {
        let val = fs::read_to_string(self.file_for(trade_id))?;
        let record: ClosureRecord = ron::de::from_str(&val)?;
        Ok(record)
    }
}
