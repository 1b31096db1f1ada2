use bincode;
use cadastre_core::error::LedgerError;
use cadastre_core::id::{AccountId, AssetId};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A registry event worth keeping an operational record of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEvent {
    /// A mint completed: the title exists and the registry holds its unit
    Minted { title: AssetId, label: String },

    /// A mint was left half-done: the asset was created but its unit was
    /// never claimed. These entries are what an operator sweeps for.
    MintOrphaned { title: AssetId, reason: String },

    /// A title moved between holders
    Transferred {
        title: AssetId,
        from: AccountId,
        to: AccountId,
    },
}

/// One journal record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Timestamp when the event was recorded (seconds)
    pub timestamp: u64,

    /// The recorded event
    pub event: JournalEvent,
}

/// A basic file-based journal of registry outcomes.
///
/// Entries are appended as length-prefixed bincode records and flushed per
/// append, so the journal survives the process. The registry writes one
/// entry per confirmed operation and one per orphaned mint.
pub struct FileJournal {
    /// Path to the journal file
    path: PathBuf,

    /// File handle for writing
    writer: Mutex<BufWriter<File>>,
}

impl FileJournal {
    /// Open a journal at the given path, creating the file if needed.
    /// Existing entries are preserved; new entries are appended.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .map_err(|e| LedgerError::Journal(format!("Failed to open journal file: {}", e)))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Path of the underlying journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn current_timestamp() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    /// Append an event to the journal and flush it to disk
    pub fn append(&self, event: JournalEvent) -> Result<(), LedgerError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| LedgerError::Journal(format!("Failed to acquire lock: {}", e)))?;

        let entry = JournalEntry {
            timestamp: Self::current_timestamp(),
            event,
        };
        let serialized = bincode::serialize(&entry)?;

        // Write the entry length and data
        let entry_len = serialized.len() as u64;
        writer.write_all(&entry_len.to_le_bytes())?;
        writer.write_all(&serialized)?;
        writer.flush()?;

        Ok(())
    }

    /// Iterate over every entry recorded so far, oldest first
    pub fn iter_entries(&self) -> Box<dyn Iterator<Item = Result<JournalEntry, LedgerError>>> {
        match File::open(&self.path) {
            Ok(file) => Box::new(JournalEntryIterator {
                reader: BufReader::new(file),
            }),
            Err(_) => {
                // Return an empty iterator if we can't open the file
                Box::new(std::iter::empty())
            }
        }
    }
}

/// Iterator over journal entries
struct JournalEntryIterator {
    reader: BufReader<File>,
}

impl Iterator for JournalEntryIterator {
    type Item = Result<JournalEntry, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Read the entry length
        let mut len_buf = [0u8; 8];
        match self.reader.read_exact(&mut len_buf) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of file
                return None;
            }
            Err(e) => {
                return Some(Err(LedgerError::from(e)));
            }
        }

        let entry_len = u64::from_le_bytes(len_buf);

        // Read the entry data
        let mut entry_data = vec![0u8; entry_len as usize];
        if let Err(e) = self.reader.read_exact(&mut entry_data) {
            return Some(Err(LedgerError::from(e)));
        }

        // Deserialize the entry
        match bincode::deserialize(&entry_data) {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => Some(Err(LedgerError::from(e))),
        }
    }
}
