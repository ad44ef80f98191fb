#![allow(dead_code)]

use std::{
    cell::RefCell,
    sync::{Arc, Mutex, Once},
};

use log::{LevelFilter, Log, Metadata, Record};
use os::{Errno, KResult, dev::chrdev::ChrdevHost, fs::FileOperations};

thread_local! {
    static CAPTURED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Records every line on the thread that logged it, so parallel tests stay apart.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = format!("[{}] {}", record.level(), record.args());
        CAPTURED.with(|captured| captured.borrow_mut().push(line));
    }

    fn flush(&self) {}
}

/// Run `f` and return its result with the lines it logged.
pub fn captured<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    static INIT: Once = Once::new();
    static LOGGER: CaptureLogger = CaptureLogger;
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("another logger is installed");
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURED.with(|captured| captured.borrow_mut().clear());
    let res = f();
    let lines = CAPTURED.with(|captured| captured.borrow_mut().drain(..).collect());
    (res, lines)
}

pub fn contains(lines: &[String], needle: &str) -> bool {
    lines.iter().any(|line| line.contains(needle))
}

/// A host answering every registration with a fixed reply and recording all calls.
pub struct FakeHost {
    reply: KResult<u32>,
    pub registered: Mutex<Vec<(u32, String)>>,
    pub unregistered: Mutex<Vec<(u32, String)>>,
}

impl FakeHost {
    /// `raw` is the C-style return code: a major, or a negated errno.
    pub fn replying(raw: isize) -> Arc<FakeHost> {
        Arc::new(FakeHost {
            reply: Errno::from_ret(raw).map(|major| major as u32),
            registered: Mutex::new(Vec::new()),
            unregistered: Mutex::new(Vec::new()),
        })
    }

    pub fn unregistered(&self) -> Vec<(u32, String)> {
        self.unregistered.lock().unwrap().clone()
    }

    pub fn registered(&self) -> Vec<(u32, String)> {
        self.registered.lock().unwrap().clone()
    }
}

impl ChrdevHost for FakeHost {
    fn register_chrdev(
        &self,
        major: u32,
        name: &str,
        _fops: Arc<dyn FileOperations>,
    ) -> KResult<u32> {
        self.registered.lock().unwrap().push((major, name.to_string()));
        self.reply
    }

    fn unregister_chrdev(&self, major: u32, name: &str) {
        self.unregistered.lock().unwrap().push((major, name.to_string()));
    }
}
