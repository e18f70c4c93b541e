use core::cell::RefCell;

use super::{DiskIo, DiskStatus, Error, IoctlCommand, IoctlResponse};

/// Lets a drive be shared between the filesystem and code that still needs to
/// reach the backend (for example to reset it after a detach). Borrowing
/// panics if the two overlap, which is the integrator's problem to prevent.
impl<T> DiskIo for RefCell<T>
where
    T: DiskIo,
{
    fn status(&self) -> DiskStatus {
        self.borrow().status()
    }

    fn initialize(&mut self) -> DiskStatus {
        self.get_mut().initialize()
    }

    fn read(&mut self, buffer: &mut [u8], sector: u32, count: u32) -> Result<(), Error> {
        self.get_mut().read(buffer, sector, count)
    }

    fn write(&mut self, buffer: &[u8], sector: u32, count: u32) -> Result<(), Error> {
        self.get_mut().write(buffer, sector, count)
    }

    fn ioctl(&mut self, command: IoctlCommand) -> Result<IoctlResponse, Error> {
        self.get_mut().ioctl(command)
    }
}

impl<T> DiskIo for &RefCell<T>
where
    T: DiskIo,
{
    fn status(&self) -> DiskStatus {
        self.borrow().status()
    }

    fn initialize(&mut self) -> DiskStatus {
        self.borrow_mut().initialize()
    }

    fn read(&mut self, buffer: &mut [u8], sector: u32, count: u32) -> Result<(), Error> {
        self.borrow_mut().read(buffer, sector, count)
    }

    fn write(&mut self, buffer: &[u8], sector: u32, count: u32) -> Result<(), Error> {
        self.borrow_mut().write(buffer, sector, count)
    }

    fn ioctl(&mut self, command: IoctlCommand) -> Result<IoctlResponse, Error> {
        self.borrow_mut().ioctl(command)
    }
}
