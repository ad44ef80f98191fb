//! Boot the host, load `my_char`, poke its device node like a shell would and unload it.

use std::{
    fmt::Error,
    io::{self, Write},
    process::ExitCode,
    sync::Arc,
};

use log::LevelFilter;
use os::{
    KResult, Kernel,
    console::{Console, set_console},
    dev::DevNum,
    fs::OpenFlags,
    kserial_println, logging,
};

struct Stdout;

impl Console for Stdout {
    fn put_str(&self, s: &str) -> Result<(), Error> {
        io::stdout().write_all(s.as_bytes()).map_err(|_| Error)
    }
}

/// `echo <text> > <path>`
fn echo(kernel: &Arc<Kernel>, path: &str, text: &str) -> KResult<usize> {
    let file = kernel.open(path, OpenFlags::O_WRONLY | OpenFlags::O_TRUNC)?;
    let mut line = String::from(text);
    line.push('\n');
    file.write(line.as_bytes())
}

/// `cat <path>`, returning everything read until end of stream.
fn cat(kernel: &Arc<Kernel>, path: &str) -> KResult<Vec<u8>> {
    let file = kernel.open(path, OpenFlags::O_RDONLY)?;
    let mut res = Vec::new();
    let mut buf = [0u8; 128];
    loop {
        match file.read(&mut buf)? {
            0 => return Ok(res),
            n => res.extend_from_slice(&buf[..n]),
        }
    }
}

fn run(kernel: &Arc<Kernel>) -> KResult<()> {
    kernel.insmod(&my_char::__MODULE)?;

    // What `mknod` would learn from /proc/devices.
    let major = kernel
        .proc_devices()
        .into_iter()
        .find(|(_, name)| name == my_char::DEVICE_NAME)
        .map(|(major, _)| major)
        .ok_or(os::Errno::ENODEV)?;
    let node = format!("/dev/{}", my_char::DEVICE_NAME);
    kernel.mknod(&node, DevNum::new(major, 0))?;
    kserial_println!("$ mknod {} c {} 0", node, major);
    kserial_println!("$ ls -l /dev");
    for entry in kernel.devfs().list() {
        kserial_println!("crw-rw-rw- {:>4}, {:>3} {}", entry.devnum.major, entry.devnum.minor, entry.name);
    }

    kserial_println!("$ echo 2 > {}", node);
    let written = echo(kernel, &node, "2")?;
    kserial_println!("wrote {} bytes", written);

    kserial_println!("$ cat {}", node);
    let read = cat(kernel, &node)?;
    kserial_println!("read {} bytes", read.len());

    let file = kernel.open(&node, OpenFlags::O_RDONLY)?;
    if let Err(err) = file.ioctl(0x5401, 0) {
        kserial_println!("ioctl(TCGETS): {}", err);
    }
    drop(file);

    kserial_println!("$ rmmod my_char");
    kernel.rmmod("my_char")?;
    kernel.unlink(&node)?;
    Ok(())
}

fn main() -> ExitCode {
    static STDOUT: Stdout = Stdout;
    set_console(&STDOUT);
    if let Err(err) = logging::init(LevelFilter::Info) {
        eprintln!("Error initializing logger: {:?}", err);
        return ExitCode::FAILURE;
    }

    let kernel = Kernel::new();
    let res = run(&kernel);
    kernel.shutdown();

    kserial_println!("$ dmesg");
    let dropped = logging::dmesg_dropped();
    if dropped > 0 {
        kserial_println!("({} older lines dropped)", dropped);
    }
    for line in logging::dmesg() {
        kserial_println!("{}", line);
    }
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("init: {}", err);
            ExitCode::FAILURE
        }
    }
}
