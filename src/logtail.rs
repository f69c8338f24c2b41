//! Reading only the lines appended to a log file since the last run

use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use crate::cookie::Cookie;
use crate::error::Result;

/// Where reading stopped last time, stored in the cookie
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
struct Position {
    inode: u64,
    pos: u64,
}

/// Incremental reader for a growing file
///
/// The position reached is stored in a cookie under the absolute path of
/// the log file, so several tails can share one cookie. If the file was
/// rotated or truncated since the last run, reading starts over.
pub struct LogTail<'c> {
    path: PathBuf,
    cookie: &'c mut Cookie,
}

impl<'c> LogTail<'c> {
    pub fn new<P: AsRef<Path>>(path: P, cookie: &'c mut Cookie) -> Result<LogTail<'c>> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            env::current_dir()?.join(path)
        };
        Ok(LogTail { path, cookie })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand every new line, including its line break, to `f`
    ///
    /// The new position is committed only if `f` accepted every line;
    /// otherwise the same lines are offered again next time.
    pub fn for_each_new_line<F>(&mut self, f: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let mut file = File::open(&self.path)?;
        self.cookie.open()?;
        let outcome = self.read_from_last_position(&mut file, f).and_then(|position| {
            let key = self.path.to_string_lossy().into_owned();
            self.cookie.insert_as(key, &position)?;
            self.cookie.commit()
        });
        self.cookie.close();
        outcome
    }

    fn read_from_last_position<F>(&self, file: &mut File, mut f: F) -> Result<Position>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let meta = file.metadata()?;
        let key = self.path.to_string_lossy();
        // an unreadable entry counts as no entry
        let last: Option<Position> = self.cookie.get_as(&key).unwrap_or(None);

        let mut pos = 0;
        match last {
            Some(last) if last.inode == meta.ino() && meta.len() >= last.pos => {
                pos = file.seek(SeekFrom::Start(last.pos))?;
            }
            _ => {
                debug!(
                    "{} is new or was rotated, reading from the start",
                    self.path.display()
                );
            }
        }

        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }
            f(&line)?;
            pos += read as u64;
        }
        Ok(Position {
            inode: meta.ino(),
            pos,
        })
    }
}
