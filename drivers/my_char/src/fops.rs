use log::{debug, info};
use os::{
    KResult,
    fs::{File, FileOperations},
};

/// Callbacks of `MY_CHAR_Device`. Stateless: every call logs and returns.
pub struct MyCharOps;

impl FileOperations for MyCharOps {
    fn open(&self, file: &File) -> KResult<()> {
        info!("MY_CHAR_open called");
        debug!("MY_CHAR_open: file #{} on {}", file.id(), file.devnum());
        Ok(())
    }

    fn release(&self, _file: &File) -> KResult<()> {
        info!("MY_CHAR_release called");
        Ok(())
    }

    /// End of stream, always. `buf` is not touched.
    fn read(&self, _file: &File, buf: &mut [u8], offset: &mut u64) -> KResult<usize> {
        info!("MY_CHAR_read called");
        debug!("MY_CHAR_read: {} bytes requested at {}", buf.len(), offset);
        Ok(0)
    }

    /// Report the whole buffer as written without looking at it.
    fn write(&self, _file: &File, buf: &[u8], _offset: &mut u64) -> KResult<usize> {
        info!("MY_CHAR_write called");
        Ok(buf.len())
    }
}
