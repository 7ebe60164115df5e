use crate::config::StorageConfig;
use crate::core::sanitize::{CleanRecord, render_transcript};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs as std_fs;
use std::path::{Path, PathBuf};

use tokio::fs;

const TRANSCRIPT_SUFFIX: &str = ".txt";
const REPORT_PREFIX: &str = "youtube_trend_analysis_";
const REPORT_SUFFIX: &str = ".md";
const MAX_SHORTCODE_LEN: usize = 128;
const HARDENED_SEPARATOR: char = '~';

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub name: String,
    pub file_type: FileType,
    pub size: u64,
    pub modified: std::time::SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FileType {
    Transcript,
    Report,
}

#[derive(Debug, Clone)]
pub struct StorageService {
    transcripts_dir: PathBuf,
    reports_dir: PathBuf,
}

impl StorageService {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            transcripts_dir: config.transcripts_dir.clone(),
            reports_dir: config.reports_dir.clone(),
        }
    }

    pub fn transcripts_dir(&self) -> &Path {
        &self.transcripts_dir
    }

    fn ensure_directories(&self) -> Result<()> {
        ensure_directory(&self.transcripts_dir)?;
        ensure_directory(&self.reports_dir)?;
        Ok(())
    }

    pub fn transcript_path(&self, shortcode: &str) -> PathBuf {
        self.transcripts_dir
            .join(format!("{}{TRANSCRIPT_SUFFIX}", file_stem_for(shortcode)))
    }

    /// Writes one transcript file per record, one file at a time.
    pub async fn save_transcripts(&self, records: &[CleanRecord]) -> Result<Vec<PathBuf>> {
        self.ensure_directories()?;

        let mut paths = Vec::with_capacity(records.len());
        for record in records {
            let path = self.transcript_path(record.shortcode());
            let mut content = render_transcript(record).join("\n");
            content.push('\n');
            fs::write(&path, content).await?;
            tracing::debug!(
                shortcode = record.shortcode(),
                path = %path.display(),
                "transcript written"
            );
            paths.push(path);
        }

        tracing::info!(
            count = paths.len(),
            dir = %self.transcripts_dir.display(),
            "transcripts saved"
        );
        Ok(paths)
    }

    pub async fn save_report(&self, content: &str) -> Result<PathBuf> {
        self.ensure_directories()?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .reports_dir
            .join(format!("{REPORT_PREFIX}{stamp}{REPORT_SUFFIX}"));

        fs::write(&path, content).await?;
        tracing::info!(path = %path.display(), "report saved");

        Ok(path)
    }

    /// Paths of stored transcripts, optionally limited to the given shortcodes.
    pub fn stored_transcripts(&self, shortcodes: &[String]) -> Result<Vec<PathBuf>> {
        if shortcodes.is_empty() {
            let mut paths: Vec<PathBuf> = self
                .list_files()?
                .into_iter()
                .filter(|file| file.file_type == FileType::Transcript)
                .map(|file| file.path)
                .collect();
            paths.sort();
            return Ok(paths);
        }

        shortcodes
            .iter()
            .map(|code| {
                let path = self.transcript_path(code);
                if path.exists() {
                    Ok(path)
                } else {
                    Err(Error::custom(format!("No stored transcript for '{code}'")))
                }
            })
            .collect()
    }

    pub fn load(&self, path: &Path) -> Result<String> {
        self.ensure_managed_path(path)?;
        let content = std_fs::read_to_string(path)?;
        Ok(content)
    }

    pub fn list_files(&self) -> Result<Vec<FileEntry>> {
        self.ensure_directories()?;
        let mut files = Vec::new();

        collect_entries(&self.transcripts_dir, FileType::Transcript, &mut files)?;
        collect_entries(&self.reports_dir, FileType::Report, &mut files)?;

        // Newest first
        files.sort_by(|a, b| b.modified.cmp(&a.modified));

        Ok(files)
    }

    pub fn delete_file(&self, path: &Path) -> Result<()> {
        self.ensure_directories()?;
        self.ensure_managed_path(path)?;
        std_fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "deleted file");
        Ok(())
    }

    fn ensure_managed_path(&self, path: &Path) -> Result<()> {
        let canonical = path
            .canonicalize()
            .map_err(|_| Error::custom("Target file does not exist or cannot be resolved"))?;

        let allowed = [&self.transcripts_dir, &self.reports_dir]
            .into_iter()
            .filter_map(|base| base.canonicalize().ok())
            .any(|base| canonical.starts_with(base));

        if !allowed {
            return Err(Error::custom(
                "Refusing to operate on files outside managed transcript/report directories",
            ));
        }

        Ok(())
    }
}

fn collect_entries(dir: &Path, file_type: FileType, files: &mut Vec<FileEntry>) -> Result<()> {
    let suffix = match file_type {
        FileType::Transcript => TRANSCRIPT_SUFFIX,
        FileType::Report => REPORT_SUFFIX,
    };

    let Ok(entries) = std_fs::read_dir(dir) else {
        return Ok(());
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.ends_with(suffix)
        {
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            files.push(FileEntry {
                path: path.clone(),
                name: name.to_string(),
                file_type: file_type.clone(),
                size: metadata.len(),
                modified: metadata.modified()?,
            });
        }
    }

    Ok(())
}

/// Maps a provider shortcode onto a file stem that cannot leave the transcripts directory.
///
/// Safe shortcodes are used verbatim. Anything else keeps its safe characters and gains a
/// `~` plus a short SHA-256 suffix so that distinct shortcodes never share a file.
pub fn file_stem_for(shortcode: &str) -> String {
    let is_safe = !shortcode.is_empty()
        && shortcode.len() <= MAX_SHORTCODE_LEN
        && shortcode
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));

    if is_safe {
        return shortcode.to_string();
    }

    let digest = Sha256::digest(shortcode.as_bytes());
    let suffix = &hex::encode(digest)[..12];
    let kept: String = shortcode
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(64)
        .collect();

    // `~` never appears in a verbatim stem, so the two forms cannot meet.
    format!("{kept}{HARDENED_SEPARATOR}{suffix}")
}

impl FileEntry {
    pub fn shortcode(&self) -> Option<&str> {
        match self.file_type {
            FileType::Transcript => self.name.strip_suffix(TRANSCRIPT_SUFFIX),
            FileType::Report => None,
        }
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    std_fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = std_fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        if permissions.mode() & 0o777 != 0o700 {
            permissions.set_mode(0o700);
            std_fs::set_permissions(path, permissions)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sanitize::{NO_TRANSCRIPT_LINE, clean};
    use serde_json::json;

    fn storage(root: &Path) -> StorageService {
        StorageService::new(&StorageConfig {
            transcripts_dir: root.join("transcripts"),
            reports_dir: root.join("reports"),
        })
    }

    #[test]
    fn safe_shortcodes_are_used_verbatim() {
        assert_eq!(file_stem_for("abcDEF123-_x"), "abcDEF123-_x");
    }

    #[test]
    fn unsafe_shortcodes_are_hardened() {
        let stem = file_stem_for("../../etc/passwd");
        assert!(!stem.contains('/'));
        assert!(!stem.contains(".."));
        assert!(stem.starts_with("etcpasswd~"));
        assert_ne!(file_stem_for("a/b"), file_stem_for("a\\b"));
        assert_eq!(file_stem_for("///").len(), 13);
        assert!(file_stem_for("///").starts_with('~'));
        assert!(file_stem_for(&"a".repeat(MAX_SHORTCODE_LEN + 1)).len() < MAX_SHORTCODE_LEN);
    }

    #[tokio::test]
    async fn hardened_stem_never_matches_a_verbatim_shortcode() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        // A safe shortcode shaped like the safe chars of "a/b" plus its hash.
        let digest = hex::encode(Sha256::digest(b"a/b"));
        let lookalike = format!("ab-{}", &digest[..12]);
        assert_eq!(file_stem_for(&lookalike), lookalike);
        assert_ne!(file_stem_for("a/b"), lookalike);

        let records = clean(vec![
            json!({"url": "u1", "shortcode": "a/b",
                   "formatted_transcript": [{"text": "first", "start_time": 1, "end_time": 2}]}),
            json!({"url": "u2", "shortcode": lookalike,
                   "formatted_transcript": [{"text": "second", "start_time": 3, "end_time": 4}]}),
        ]);
        let paths = storage.save_transcripts(&records).await.unwrap();

        assert_ne!(paths[0], paths[1]);
        assert_eq!(std::fs::read_dir(storage.transcripts_dir()).unwrap().count(), 2);
        assert_eq!(std::fs::read_to_string(&paths[0]).unwrap(), "(1-2): first\n");
        assert_eq!(std::fs::read_to_string(&paths[1]).unwrap(), "(3-4): second\n");
    }

    #[tokio::test]
    async fn writes_one_file_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let records = clean(vec![
            json!({"url": "u1", "shortcode": "vid1",
                   "formatted_transcript": [{"text": "hello", "start_time": 0, "end_time": 4}]}),
            json!({"url": "u2", "shortcode": "vid2"}),
        ]);

        let paths = storage.save_transcripts(&records).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], dir.path().join("transcripts").join("vid1.txt"));

        let first = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(first, "(0-4): hello\n");
        let second = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(second.trim_end(), NO_TRANSCRIPT_LINE);
    }

    #[tokio::test]
    async fn lists_and_deletes_managed_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let records = clean(vec![json!({"url": "u", "shortcode": "abc"})]);
        storage.save_transcripts(&records).await.unwrap();
        let report = storage.save_report("# Trends").await.unwrap();

        let files = storage.list_files().unwrap();
        assert_eq!(files.len(), 2);
        let transcript = files
            .iter()
            .find(|f| f.file_type == FileType::Transcript)
            .unwrap();
        assert_eq!(transcript.shortcode(), Some("abc"));

        assert_eq!(storage.load(&report).unwrap(), "# Trends");
        storage.delete_file(&report).unwrap();
        assert_eq!(storage.list_files().unwrap().len(), 1);
    }

    #[test]
    fn refuses_to_delete_outside_managed_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let outside = dir.path().join("outside.txt");
        std::fs::write(&outside, "x").unwrap();

        assert!(storage.delete_file(&outside).is_err());
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn stored_transcripts_by_shortcode() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let records = clean(vec![
            json!({"url": "u", "shortcode": "b"}),
            json!({"url": "u", "shortcode": "a"}),
        ]);
        storage.save_transcripts(&records).await.unwrap();

        let all = storage.stored_transcripts(&[]).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].ends_with("a.txt"));

        let one = storage.stored_transcripts(&["b".to_string()]).unwrap();
        assert_eq!(one.len(), 1);
        assert!(storage.stored_transcripts(&["zzz".to_string()]).is_err());
    }
}
