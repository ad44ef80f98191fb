//! Per-open file sessions and the callback table a character driver provides.
//!
//! The host owns the [File]; a driver only ever sees `&File` inside its callbacks. [OpenFile]
//! is the host's dispatcher: it checks the access mode, feeds the file position to the driver
//! and calls `release` exactly once when the session is dropped. A session on a module's device
//! keeps that module loaded until `release` has returned.
use alloc::{boxed::Box, sync::Arc};
use bitflags::bitflags;
use spin::Mutex;

use crate::{
    debug_ex,
    dev::DevNum,
    error::{Errno, KResult},
    module::ModuleRef,
};

bitflags! {
    pub struct OpenFlags: u32 {
        const O_RDONLY = 0o0;
        const O_WRONLY = 0o1;
        const O_RDWR = 0o2;
        const O_CREAT = 0o100;
        const O_EXCL = 0o200;
        const O_NOCTTY = 0o400;
        const O_TRUNC = 0o1000;
        const O_APPEND = 0o2000;
        const O_NONBLOCK = 0o4000;
        const O_CLOEXEC = 0o2000000;
    }
}

impl OpenFlags {
    pub const O_ACCMODE: u32 = 0o3;

    /// Access rights requested by these flags. The access mode `3` is rejected.
    pub fn fmode(self) -> KResult<FMode> {
        match self.bits() & Self::O_ACCMODE {
            0 => Ok(FMode::FMODE_READ),
            1 => Ok(FMode::FMODE_WRITE),
            2 => Ok(FMode::FMODE_READ | FMode::FMODE_WRITE),
            _ => Err(Errno::EINVAL),
        }
    }
}

bitflags! {
    pub struct FMode: u32 {
        const FMODE_READ = 0x1;
        const FMODE_WRITE = 0x2;
    }
}

/// Origin of an `llseek` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// An open session on a device node.
#[derive(Debug)]
pub struct File {
    id: u64,
    path: Box<str>,
    devnum: DevNum,
    mode: FMode,
    pos: Mutex<u64>,
}

impl File {
    /// Sessions are normally created by [Kernel::open](crate::Kernel::open); building one
    /// directly is for driving callbacks in isolation.
    pub fn new(id: u64, path: &str, devnum: DevNum, flags: OpenFlags) -> KResult<File> {
        Ok(File {
            id,
            path: Box::from(path),
            devnum,
            mode: flags.fmode()?,
            pos: Mutex::new(0),
        })
    }

    /// Session id, unique for the lifetime of the kernel.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn devnum(&self) -> DevNum {
        self.devnum
    }

    pub fn mode(&self) -> FMode {
        self.mode
    }

    pub fn pos(&self) -> u64 {
        *self.pos.lock()
    }

    fn set_pos(&self, pos: u64) {
        *self.pos.lock() = pos;
    }
}

/// Callbacks of a character driver.
///
/// Every method has the host's default, so a driver only overrides what it supports:
/// - `open`, `release` and `flush` succeed.
/// - `read` and `write` fail with [Errno::EINVAL].
/// - `llseek` fails with [Errno::ESPIPE] and `unlocked_ioctl` with [Errno::ENOTTY].
///
/// Callbacks may run concurrently from several sessions and must not rely on any ordering
/// between them.
pub trait FileOperations: Send + Sync {
    fn open(&self, _file: &File) -> KResult<()> {
        Ok(())
    }

    /// Last reference to the session is gone. The result is only reported in diagnostics.
    fn release(&self, _file: &File) -> KResult<()> {
        Ok(())
    }

    /// Fill `buf` from `*offset` on and return the number of bytes produced; `0` means end of
    /// stream. The driver advances `*offset` itself.
    fn read(&self, _file: &File, _buf: &mut [u8], _offset: &mut u64) -> KResult<usize> {
        Err(Errno::EINVAL)
    }

    /// Consume bytes of `buf` at `*offset` and return how many were taken.
    fn write(&self, _file: &File, _buf: &[u8], _offset: &mut u64) -> KResult<usize> {
        Err(Errno::EINVAL)
    }

    fn llseek(&self, _file: &File, _offset: i64, _whence: Whence) -> KResult<u64> {
        Err(Errno::ESPIPE)
    }

    fn unlocked_ioctl(&self, _file: &File, _cmd: u32, _arg: usize) -> KResult<isize> {
        Err(Errno::ENOTTY)
    }

    fn flush(&self, _file: &File) -> KResult<()> {
        Ok(())
    }
}

/// A [File] bound to the driver callbacks it was opened through.
pub struct OpenFile {
    file: File,
    fops: Arc<dyn FileOperations>,
    // Dropped after `release` has run.
    _owner: Option<ModuleRef>,
}

impl OpenFile {
    /// Run the driver's `open`. A failed open yields no session and no `release`.
    pub(crate) fn open(
        file: File,
        fops: Arc<dyn FileOperations>,
        owner: Option<ModuleRef>,
    ) -> KResult<OpenFile> {
        fops.open(&file)?;
        debug_ex!("\tOpened {} ({}) as file #{}.", file.path, file.devnum, file.id);
        Ok(OpenFile {
            file,
            fops,
            _owner: owner,
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn read(&self, buf: &mut [u8]) -> KResult<usize> {
        if !self.file.mode.contains(FMode::FMODE_READ) {
            return Err(Errno::EBADF);
        }
        let mut pos = self.file.pos();
        let res = self.fops.read(&self.file, buf, &mut pos)?;
        self.file.set_pos(pos);
        Ok(res)
    }

    pub fn write(&self, buf: &[u8]) -> KResult<usize> {
        if !self.file.mode.contains(FMode::FMODE_WRITE) {
            return Err(Errno::EBADF);
        }
        let mut pos = self.file.pos();
        let res = self.fops.write(&self.file, buf, &mut pos)?;
        self.file.set_pos(pos);
        Ok(res)
    }

    pub fn llseek(&self, offset: i64, whence: Whence) -> KResult<u64> {
        let pos = self.fops.llseek(&self.file, offset, whence)?;
        self.file.set_pos(pos);
        Ok(pos)
    }

    pub fn ioctl(&self, cmd: u32, arg: usize) -> KResult<isize> {
        self.fops.unlocked_ioctl(&self.file, cmd, arg)
    }

    /// Flush and release the session, reporting the flush result.
    pub fn close(self) -> KResult<()> {
        self.fops.flush(&self.file)
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        if let Err(_err) = self.fops.release(&self.file) {
            debug_ex!("\tRelease of file #{} failed: {}", self.file.id, _err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        opens: AtomicUsize,
        releases: AtomicUsize,
    }

    impl FileOperations for Counting {
        fn open(&self, _file: &File) -> KResult<()> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn release(&self, _file: &File) -> KResult<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn read(&self, _file: &File, buf: &mut [u8], offset: &mut u64) -> KResult<usize> {
            buf.fill(b'x');
            *offset += buf.len() as u64;
            Ok(buf.len())
        }
    }

    struct Refusing;

    impl FileOperations for Refusing {
        fn open(&self, _file: &File) -> KResult<()> {
            Err(Errno::EBUSY)
        }

        fn release(&self, _file: &File) -> KResult<()> {
            panic!("release after failed open");
        }
    }

    fn file(flags: OpenFlags) -> File {
        File::new(1, "/dev/test", DevNum::new(240, 0), flags).unwrap()
    }

    #[test]
    fn access_mode_maps_to_fmode() {
        assert_eq!(OpenFlags::O_RDONLY.fmode(), Ok(FMode::FMODE_READ));
        assert_eq!(OpenFlags::O_WRONLY.fmode(), Ok(FMode::FMODE_WRITE));
        assert_eq!(
            (OpenFlags::O_RDWR | OpenFlags::O_APPEND).fmode(),
            Ok(FMode::FMODE_READ | FMode::FMODE_WRITE)
        );
        assert_eq!(
            (OpenFlags::O_WRONLY | OpenFlags::O_RDWR).fmode(),
            Err(Errno::EINVAL)
        );
    }

    #[test]
    fn drop_releases_exactly_once() {
        let fops = Arc::new(Counting::default());
        let opened = OpenFile::open(file(OpenFlags::O_RDONLY), fops.clone(), None).unwrap();
        assert_eq!(fops.opens.load(Ordering::SeqCst), 1);
        assert_eq!(fops.releases.load(Ordering::SeqCst), 0);
        drop(opened);
        assert_eq!(fops.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_open_is_not_released() {
        let res = OpenFile::open(file(OpenFlags::O_RDONLY), Arc::new(Refusing), None);
        assert_eq!(res.err(), Some(Errno::EBUSY));
    }

    #[test]
    fn position_is_stored_back() {
        let opened = OpenFile::open(file(OpenFlags::O_RDONLY), Arc::new(Counting::default()), None).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(opened.read(&mut buf), Ok(3));
        assert_eq!(opened.read(&mut buf), Ok(3));
        assert_eq!(opened.file().pos(), 6);
        assert_eq!(&buf, b"xxx");
    }

    #[test]
    fn unset_callbacks_use_host_defaults() {
        let opened = OpenFile::open(file(OpenFlags::O_RDWR), Arc::new(Counting::default()), None).unwrap();
        assert_eq!(opened.write(b"2\n"), Err(Errno::EINVAL));
        assert_eq!(opened.llseek(0, Whence::Set), Err(Errno::ESPIPE));
        assert_eq!(opened.ioctl(0x5401, 0), Err(Errno::ENOTTY));
        assert_eq!(opened.close(), Ok(()));
    }

    #[test]
    fn access_mode_is_enforced() {
        let reader = OpenFile::open(file(OpenFlags::O_RDONLY), Arc::new(Counting::default()), None).unwrap();
        assert_eq!(reader.write(b"2"), Err(Errno::EBADF));
        let writer = OpenFile::open(file(OpenFlags::O_WRONLY), Arc::new(Counting::default()), None).unwrap();
        assert_eq!(writer.read(&mut [0u8; 1]), Err(Errno::EBADF));
    }
}
