use core::fmt::{Arguments, Error, Write};

use spin::Once;

/// Output device the kernel prints to.
pub trait Console: Sync {
    fn put_str(&self, s: &str) -> Result<(), Error>;
}

static CONSOLE: Once<&'static dyn Console> = Once::new();

/// Install the console. Only the first call wins; return whether this one did.
pub fn set_console(console: &'static dyn Console) -> bool {
    let mut installed = false;
    CONSOLE.call_once(|| {
        installed = true;
        console
    });
    installed
}

struct SerialOut(&'static dyn Console);

impl Write for SerialOut {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.put_str(s)
    }
}

/// Print to the installed console; output is dropped before one is installed.
pub fn serial_print(args: Arguments) {
    if let Some(console) = CONSOLE.get() {
        // Nothing sensible to report a console failure to.
        let _ = SerialOut(*console).write_fmt(args);
    }
}

#[macro_export]
/// print line macro
macro_rules! kserial_println {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::serial_print(format_args!(concat!($fmt, "\n") $(, $($arg)+)?));   // Use LF instead of CR-LF
    }
}
