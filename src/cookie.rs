//! Persistent state between plugin runs
//!
//! A cookie is a JSON object stored in a file. It is locked exclusively
//! while open, so concurrent invocations of the same plugin take turns.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::fcntl::{flock, FlockArg};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A JSON object that survives between plugin invocations
///
/// A cookie without a path is *oblivious*: it is backed by an anonymous
/// temporary file and forgets everything when closed. That makes it easy
/// to throw state away, e.g. from a command line switch.
#[derive(Debug)]
pub struct Cookie {
    path: Option<PathBuf>,
    file: Option<File>,
    data: Map<String, Value>,
}

impl Cookie {
    /// A cookie stored at `path`, oblivious if `path` is `None` or empty
    pub fn new<P: AsRef<Path>>(path: Option<P>) -> Cookie {
        let path = path
            .map(|p| p.as_ref().to_path_buf())
            .filter(|p| !p.as_os_str().is_empty());
        Cookie {
            path,
            file: None,
            data: Map::new(),
        }
    }

    pub fn oblivious() -> Cookie {
        Cookie::new(None::<PathBuf>)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref().map(|p| p.as_path())
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Open and lock the state file, creating it if necessary, and load it
    ///
    /// A state file that cannot be parsed is truncated before the error is
    /// returned, so a damaged file breaks one run at most.
    pub fn open(&mut self) -> Result<()> {
        let mut file = match self.path {
            Some(ref path) => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)?,
            None => tempfile::tempfile()?,
        };
        flock(file.as_raw_fd(), FlockArg::LockExclusive)?;
        self.data = Map::new();
        if file.metadata()?.len() > 0 {
            match self.load(&mut file) {
                Ok(data) => self.data = data,
                Err(e) => {
                    file.set_len(0)?;
                    return Err(e);
                }
            }
        }
        self.file = Some(file);
        Ok(())
    }

    fn load(&self, file: &mut File) -> Result<Map<String, Value>> {
        file.seek(SeekFrom::Start(0))?;
        match serde_json::from_reader(file)? {
            Value::Object(data) => Ok(data),
            other => Err(Error::Cookie(format!(
                "format error: cookie {} does not contain an object but {}",
                self.describe_path(),
                other
            ))),
        }
    }

    fn describe_path(&self) -> String {
        match self.path {
            Some(ref p) => p.display().to_string(),
            None => "(oblivious)".to_owned(),
        }
    }

    /// Write the current contents to the state file and sync it to disk
    pub fn commit(&mut self) -> Result<()> {
        let path = self.describe_path();
        let file = self.file.as_mut().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("cannot commit closed cookie {}", path),
            ))
        })?;
        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;
        serde_json::to_writer(&mut *file, &self.data)?;
        file.write_all(b"\n")?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Release the lock and close the file, does nothing if already closed
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Open the cookie at `path`, run `f` and commit if `f` succeeds
    ///
    /// The cookie is closed in any case.
    pub fn transaction<P, F, T>(path: Option<P>, f: F) -> Result<T>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut Cookie) -> Result<T>,
    {
        let mut cookie = Cookie::new(path);
        cookie.open()?;
        let outcome = f(&mut cookie).and_then(|value| cookie.commit().map(|()| value));
        cookie.close();
        outcome
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    /// Deserialize the value stored under `key`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Serialize `value` and store it under `key`
    pub fn insert_as<K, T>(&mut self, key: K, value: &T) -> Result<Option<Value>>
    where
        K: Into<String>,
        T: Serialize,
    {
        let value = serde_json::to_value(value)?;
        Ok(self.data.insert(key.into(), value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::Cookie;
    use crate::error::Error;
    use crate::ServiceState;

    #[test]
    fn missing_file_is_created_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        let mut cookie = Cookie::new(Some(&path));
        cookie.open().unwrap();
        assert!(cookie.data().is_empty());
        assert!(path.exists());
        cookie.close();
    }

    #[test]
    fn commit_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        Cookie::transaction(Some(&path), |cookie| {
            cookie.insert("hello", "world");
            cookie.insert("count", 3);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"count\":3,\"hello\":\"world\"}\n"
        );

        let count = Cookie::transaction(Some(&path), |cookie| {
            Ok(cookie.get("count").and_then(|v| v.as_i64()))
        })
        .unwrap();
        assert_eq!(count, Some(3));
    }

    #[test]
    fn failed_transaction_is_not_committed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        fs::write(&path, "{\"a\": 1}").unwrap();
        let outcome: Result<(), _> = Cookie::transaction(Some(&path), |cookie| {
            cookie.insert("a", 2);
            Err(Error::abort("nope"))
        });
        assert!(outcome.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn corrupt_file_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        fs::write(&path, "{{{").unwrap();
        let mut cookie = Cookie::new(Some(&path));
        match cookie.open() {
            Err(Error::Json(_)) => {}
            other => panic!("Unexpected open: {:?}", other),
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        cookie.open().unwrap();
        assert!(cookie.data().is_empty());
    }

    #[test]
    fn non_object_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        fs::write(&path, "[1, 2]").unwrap();
        match Cookie::new(Some(&path)).open() {
            Err(Error::Cookie(msg)) => assert!(msg.contains("does not contain an object")),
            other => panic!("Unexpected open: {:?}", other),
        }
    }

    #[test]
    fn oblivious_cookie_forgets() {
        let mut cookie = Cookie::new(Some(""));
        assert!(cookie.path().is_none());
        cookie.open().unwrap();
        cookie.insert("key", json!({"nested": true}));
        cookie.commit().unwrap();
        cookie.close();
        cookie.close();
        assert!(!cookie.is_open());

        let mut fresh = Cookie::oblivious();
        fresh.open().unwrap();
        assert!(fresh.get("key").is_none());
    }

    #[test]
    fn typed_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        Cookie::transaction(Some(&path), |cookie| {
            cookie.insert_as("last", &ServiceState::Warning)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"last\":\"warning\"}\n");

        let mut cookie = Cookie::new(Some(&path));
        cookie.open().unwrap();
        assert_eq!(
            cookie.get_as::<ServiceState>("last").unwrap(),
            Some(ServiceState::Warning)
        );
        assert_eq!(cookie.get_as::<ServiceState>("missing").unwrap(), None);
        cookie.insert("last", "sideways");
        match cookie.get_as::<ServiceState>("last") {
            Err(Error::Json(_)) => {}
            other => panic!("Unexpected value: {:?}", other),
        }
    }

    #[test]
    fn commit_needs_open_cookie() {
        match Cookie::oblivious().commit() {
            Err(Error::Io(_)) => {}
            other => panic!("Unexpected commit: {:?}", other),
        }
    }
}
