mod common;

use std::sync::Arc;

use common::{captured, contains};
use my_char::{DEVICE_NAME, MyCharModule, __MODULE};
use os::{
    Errno, KResult, Kernel,
    dev::{DevNum, chrdev::ChrdevHost},
    fs::{FileOperations, OpenFlags},
};

const NODE: &str = "/dev/MY_CHAR_Device";

fn registered_major(kernel: &Kernel) -> Option<u32> {
    kernel.with_module::<MyCharModule, _>("my_char", |module| module.registration().major)
}

#[test]
fn insmod_announces_the_dynamic_major() {
    let kernel = Kernel::new();
    let (res, lines) = captured(|| kernel.insmod(&__MODULE));
    res.unwrap();

    let major = registered_major(&kernel).unwrap();
    assert_eq!(major, 254);
    assert_eq!(kernel.proc_devices(), vec![(254, DEVICE_NAME.to_string())]);
    assert!(contains(&lines, "[INFO] Entering Test Character Driver"));
    assert!(contains(&lines, "[INFO] Major Number = 254"));
    assert!(contains(&lines, "[INFO] Name = MY_CHAR_Device"));
    assert!(contains(
        &lines,
        "[INFO] Generate the device file with mknod /dev/MY_CHAR_Device c 254 0"
    ));
    kernel.shutdown();
}

#[test]
fn echo_into_the_node_runs_open_write_release() {
    let kernel = Kernel::new();
    kernel.insmod(&__MODULE).unwrap();
    let major = registered_major(&kernel).unwrap();
    kernel.mknod(NODE, DevNum::new(major, 0)).unwrap();

    // echo 2 > /dev/MY_CHAR_Device
    let (res, lines) = captured(|| -> KResult<usize> {
        let file = kernel.open(NODE, OpenFlags::O_WRONLY | OpenFlags::O_TRUNC)?;
        file.write(b"2\n")
    });
    assert_eq!(res, Ok(2));
    let calls: Vec<_> = lines.iter().filter(|line| line.contains(" called")).collect();
    assert_eq!(
        calls,
        vec![
            "[INFO] MY_CHAR_open called",
            "[INFO] MY_CHAR_write called",
            "[INFO] MY_CHAR_release called",
        ]
    );
    kernel.shutdown();
}

#[test]
fn cat_of_the_node_reads_nothing() {
    let kernel = Kernel::new();
    kernel.insmod(&__MODULE).unwrap();
    let major = registered_major(&kernel).unwrap();
    kernel.mknod(NODE, DevNum::new(major, 0)).unwrap();

    let file = kernel.open(NODE, OpenFlags::O_RDONLY).unwrap();
    let mut buf = [0xa5u8; 128];
    assert_eq!(file.read(&mut buf), Ok(0));
    assert_eq!(buf, [0xa5u8; 128]);
    assert_eq!(file.file().pos(), 0);
    assert_eq!(file.ioctl(0x5401, 0), Err(Errno::ENOTTY));
    assert_eq!(file.write(b"x"), Err(Errno::EBADF));
    drop(file);
    kernel.shutdown();
}

#[test]
fn rmmod_unregisters_after_many_sessions() {
    let kernel = Kernel::new();
    kernel.insmod(&__MODULE).unwrap();
    let major = registered_major(&kernel).unwrap();
    kernel.mknod(NODE, DevNum::new(major, 0)).unwrap();
    for _ in 0..5 {
        let file = kernel.open(NODE, OpenFlags::O_RDWR).unwrap();
        assert_eq!(file.write(b"abc"), Ok(3));
    }
    assert_eq!(registered_major(&kernel), Some(major));

    let (res, lines) = captured(|| kernel.rmmod("my_char"));
    res.unwrap();
    assert!(contains(&lines, "[INFO] Exiting Test Character Driver"));
    assert!(kernel.proc_devices().is_empty());
    assert_eq!(kernel.open(NODE, OpenFlags::O_RDONLY).err(), Some(Errno::ENXIO));
}

#[test]
fn rmmod_waits_for_the_last_open_file() {
    let kernel = Kernel::new();
    kernel.insmod(&__MODULE).unwrap();
    let major = registered_major(&kernel).unwrap();
    kernel.mknod(NODE, DevNum::new(major, 0)).unwrap();

    let ((), lines) = captured(|| {
        let file = kernel.open(NODE, OpenFlags::O_RDWR).unwrap();
        assert_eq!(kernel.rmmod("my_char"), Err(Errno::EBUSY));
        assert_eq!(file.write(b"2\n"), Ok(2));
        drop(file);
        kernel.rmmod("my_char").unwrap();
    });
    let exit = lines
        .iter()
        .position(|line| line.contains("Exiting Test Character Driver"))
        .unwrap();
    assert!(contains(&lines[..exit], "[INFO] MY_CHAR_release called"));
    assert!(!contains(&lines[exit..], " called"));
    assert!(!kernel.is_loaded("my_char"));
    assert_eq!(kernel.open(NODE, OpenFlags::O_RDONLY).err(), Some(Errno::ENXIO));
}

#[test]
fn dropping_the_kernel_tears_the_device_down() {
    let ((), lines) = captured(|| {
        let kernel = Kernel::new();
        kernel.insmod(&__MODULE).unwrap();
        drop(kernel);
    });
    assert_eq!(lines.last().map(String::as_str), Some("[INFO] Exiting Test Character Driver"));
    assert_eq!(
        lines.iter().filter(|line| line.contains("Exiting")).count(),
        1
    );
}

#[test]
fn busy_major_range_fails_insmod() {
    struct Squatter;
    impl FileOperations for Squatter {}

    let kernel = Kernel::new();
    for major in (234..=254).chain(384..=511) {
        kernel.register_chrdev(major, "squatter", Arc::new(Squatter)).unwrap();
    }

    let (res, lines) = captured(|| kernel.insmod(&__MODULE));
    assert_eq!(res, Err(Errno::EBUSY));
    assert!(!kernel.is_loaded("my_char"));
    assert!(contains(&lines, "[ERROR] registering \"MY_CHAR_Device\""));
    assert!(!contains(&lines, "Major Number"));
    assert!(!contains(&lines, "mknod"));
}

#[test]
fn concurrent_sessions_share_the_stateless_callbacks() {
    let kernel = Kernel::new();
    kernel.insmod(&__MODULE).unwrap();
    let major = registered_major(&kernel).unwrap();
    kernel.mknod(NODE, DevNum::new(major, 0)).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let file = kernel.open(NODE, OpenFlags::O_RDWR).unwrap();
                    assert_eq!(file.write(&[0u8; 16]), Ok(16));
                    assert_eq!(file.read(&mut [0u8; 16]), Ok(0));
                }
            });
        }
    });
    assert_eq!(registered_major(&kernel), Some(major));
    kernel.shutdown();
}
