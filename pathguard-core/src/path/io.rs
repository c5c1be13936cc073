//! Operations that read or change what is on disk.
//!
//! Every mutation invalidates the stat cache of the paths it touches.
//! Handles are dropped (and so closed) before an error is returned.

use std::io::{self, Read, Write};
use std::time::SystemTime;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use super::{resolver, FilePath};
use crate::error::{is_cross_device, not_found_error, PathError, Result};
use crate::traits::FileHandle;
use crate::types::{OpenFlags, PathString};

impl FilePath {
    /// Opens the file. Opening with flags that can modify it invalidates the
    /// cache.
    pub fn open(&self, flags: OpenFlags) -> Result<Box<dyn FileHandle>> {
        if flags.modifies() {
            self.changed();
        }
        self.provider()
            .open(&self.to_path_buf(), flags)
            .map_err(|e| self.io_error(e))
    }

    /// Creates the file, failing with `AlreadyExists` if anything is there.
    pub fn create(&self) -> Result<Box<dyn FileHandle>> {
        self.open(OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::EXCLUSIVE)
    }

    /// Creates the file if it is missing and sets its access and
    /// modification times to now.
    pub fn touch(&self) -> Result<()> {
        let handle = self.open(OpenFlags::WRITE | OpenFlags::APPEND | OpenFlags::CREATE)?;
        drop(handle);
        let now = SystemTime::now();
        let result = self
            .provider()
            .set_times(&self.to_path_buf(), now, now)
            .map_err(|e| self.io_error(e));
        self.changed();
        result
    }

    /// Reads the whole file.
    pub fn get_content(&self) -> Result<Bytes> {
        let mut handle = self.open(OpenFlags::READ)?;
        let mut content = Vec::new();
        let read = handle.read_to_end(&mut content);
        drop(handle);
        read.map_err(|e| self.io_error(e))?;
        Ok(Bytes::from(content))
    }

    /// Replaces the file's content atomically, staging it in a temporary
    /// sibling that ends with the configured extension.
    pub fn set_content(&self, content: impl AsRef<[u8]>) -> Result<()> {
        let extension = self.config().temp_extension.clone();
        self.set_content_with_extension(content, extension)
    }

    /// Like [`set_content`](Self::set_content) with an explicit temporary
    /// extension.
    ///
    /// A failed write or rename leaves the temporary file behind.
    pub fn set_content_with_extension(
        &self,
        content: impl AsRef<[u8]>,
        extension: impl Into<PathString>,
    ) -> Result<()> {
        let content = content.as_ref();
        let staging = self.temporary_sibling_with_extension(extension)?;
        trace!("Staging {} bytes for {} in {}", content.len(), self, staging);

        let mut handle =
            staging.open(OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::EXCLUSIVE)?;
        let written = handle.write_all(content).and_then(|_| handle.flush());
        drop(handle);
        written.map_err(|e| staging.io_error(e))?;

        let renamed = self
            .provider()
            .rename(&staging.to_path_buf(), &self.to_path_buf())
            .map_err(|e| self.io_error(e));
        self.changed();
        renamed?;
        debug!("Wrote {} bytes to {}", content.len(), self);
        Ok(())
    }

    /// Copies this file, link or directory tree to `destination`.
    ///
    /// With `follow_links` a symbolic link is copied as what it points to;
    /// otherwise an equivalent link is created. Directories are copied
    /// recursively into `destination`, which is created if missing.
    pub fn copy_to(&self, destination: &FilePath, follow_links: bool) -> Result<()> {
        let result = self.copy_entry(destination, follow_links);
        destination.changed();
        result
    }

    fn copy_entry(&self, destination: &FilePath, follow_links: bool) -> Result<()> {
        if !follow_links && self.is_symbolic_link()? {
            let target = self
                .provider()
                .read_link(&self.to_path_buf())
                .map_err(|e| self.io_error(e))?;
            trace!("Recreating link {} at {}", self, destination);
            return destination
                .provider()
                .symlink(&target, &destination.to_path_buf())
                .map_err(|e| destination.io_error(e));
        }

        if self.is_dir()? {
            self.reject_copy_into_self(destination)?;
            if !destination.exists()? {
                destination.create_directory()?;
            }
            debug!("Copying directory {} to {}", self, destination);
            for child in self.entries()? {
                let target = destination.counterpart(&child)?;
                child.copy_to(&target, follow_links)?;
            }
            return Ok(());
        }

        if self.is_file()? {
            return self.copy_file(destination);
        }

        if !self.exists()? {
            return Err(self.io_error(not_found_error()));
        }
        Err(PathError::Unsupported { operation: "copy of special file" })
    }

    fn reject_copy_into_self(&self, destination: &FilePath) -> Result<()> {
        let source = self.realpath()?;
        let target = destination.realpath()?;
        let target = source.coerce(target.path())?;
        if resolver::is_same_or_descendant(self.style(), source.repr.as_bytes(), target.as_bytes()) {
            return Err(destination.io_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot copy {} into itself", self),
            )));
        }
        Ok(())
    }

    /// Opens the destination, then the source, and streams one into the
    /// other.
    fn copy_file(&self, destination: &FilePath) -> Result<()> {
        let mut writer =
            destination.open(OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE)?;
        let mut reader = match self.open(OpenFlags::READ) {
            Ok(reader) => reader,
            Err(e) => {
                drop(writer);
                return Err(e);
            }
        };

        let copied = io::copy(&mut reader, &mut writer).and_then(|n| writer.flush().map(|_| n));
        drop(reader);
        drop(writer);
        let copied = copied.map_err(|e| self.io_error(e))?;
        trace!("Copied {} bytes from {} to {}", copied, self, destination);
        Ok(())
    }

    /// Moves this entry to `destination`.
    ///
    /// Tries a rename first. When source and destination are on different
    /// devices the entry is copied next to `destination`, renamed into
    /// place, and the source is removed. The caches of both paths are
    /// invalidated whatever the outcome.
    pub fn move_to(&self, destination: &FilePath, follow_links: bool) -> Result<()> {
        let result = self.move_entry(destination, follow_links);
        self.changed();
        destination.changed();
        result
    }

    fn move_entry(&self, destination: &FilePath, follow_links: bool) -> Result<()> {
        let renamed = self
            .provider()
            .rename(&self.to_path_buf(), &destination.to_path_buf());
        match renamed {
            Ok(()) => {
                debug!("Renamed {} to {}", self, destination);
                Ok(())
            }
            Err(e) if is_cross_device(&e) => {
                warn!("Moving {} to {} across devices, copying instead", self, destination);
                let staging = destination.temporary_sibling()?;
                self.copy_to(&staging, follow_links)?;
                self.provider()
                    .rename(&staging.to_path_buf(), &destination.to_path_buf())
                    .map_err(|e| destination.io_error(e))?;

                let aside = self.temporary_sibling()?;
                self.provider()
                    .rename(&self.to_path_buf(), &aside.to_path_buf())
                    .map_err(|e| self.io_error(e))?;
                aside.remove()
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Creates this directory. Its parent must exist.
    pub fn create_directory(&self) -> Result<()> {
        let result = self
            .provider()
            .create_dir(&self.to_path_buf())
            .map_err(|e| self.io_error(e));
        self.changed();
        result
    }

    /// Creates this directory along with any missing ancestors.
    ///
    /// Fails with `AlreadyExists` if something is already here, unless
    /// `ignore_existing_directory` is set and that something is a directory.
    pub fn create_directory_path(&self, ignore_existing_directory: bool) -> Result<()> {
        let result = self.create_directory_chain(false);
        self.changed();
        match result {
            Err(e) if e.is_already_exists() && ignore_existing_directory && self.is_dir()? => Ok(()),
            other => other,
        }
    }

    fn create_directory_chain(&self, existing_ok: bool) -> Result<()> {
        let path = self.to_path_buf();
        match self.provider().create_dir(&path) {
            Ok(()) => {
                trace!("Created directory {}", self);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && existing_ok => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound && !self.is_root() => {
                self.parent().create_directory_chain(true)?;
                self.provider()
                    .create_dir(&path)
                    .map_err(|e| self.io_error(e))
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Deletes this entry. Directories are emptied first; a symbolic link
    /// is removed without touching what it points to.
    pub fn remove(&self) -> Result<()> {
        let result = self.remove_entry();
        self.changed();
        result
    }

    fn remove_entry(&self) -> Result<()> {
        let path = self.to_path_buf();
        let stat = self.provider().lstat(&path).map_err(|e| self.io_error(e))?;
        if stat.is_dir() {
            for child in self.entries()? {
                child.remove()?;
            }
            self.provider().remove_dir(&path).map_err(|e| self.io_error(e))?;
        } else {
            self.provider().remove_file(&path).map_err(|e| self.io_error(e))?;
        }
        debug!("Removed {}", self);
        Ok(())
    }

    /// Creates a symbolic link here that points to `target`.
    ///
    /// Fails with `NotFound` if the directory that should contain `target`
    /// is missing, and with `AlreadyExists` if this path is taken.
    pub fn link_to(&self, target: &FilePath) -> Result<()> {
        let target_dir = target.parent();
        if !target_dir.is_dir()? {
            return Err(target_dir.io_error(not_found_error()));
        }
        let result = self
            .provider()
            .symlink(&target.to_path_buf(), &self.to_path_buf())
            .map_err(|e| self.io_error(e));
        self.changed();
        result
    }

    /// Sets the permission bits.
    pub fn chmod(&self, mode: u32) -> Result<()> {
        let result = self
            .provider()
            .set_permissions(&self.to_path_buf(), mode)
            .map_err(|e| self.io_error(e));
        self.changed();
        result
    }
}
