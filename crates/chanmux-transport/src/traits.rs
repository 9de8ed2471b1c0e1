use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// A connected, bidirectional byte stream a multiplexer can run over.
///
/// The multiplexer reads and writes on two different threads and must be able
/// to unblock both when it is torn down. Beyond `Read + Write`, a connection
/// therefore hands out independent handles to itself and can shut itself down.
pub trait Connection: Read + Write + Send + 'static {
    /// Create another handle to the same underlying connection.
    fn try_clone_box(&self) -> io::Result<Box<dyn Connection>>;

    /// Shut down both directions, waking any thread blocked in `read` or `write`.
    fn shutdown(&self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn try_clone_box(&self) -> io::Result<Box<dyn Connection>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[cfg(unix)]
impl Connection for std::os::unix::net::UnixStream {
    fn try_clone_box(&self) -> io::Result<Box<dyn Connection>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn shutdown(&self) -> io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, Shutdown::Both)
    }
}

impl Connection for Box<dyn Connection> {
    fn try_clone_box(&self) -> io::Result<Box<dyn Connection>> {
        (**self).try_clone_box()
    }

    fn shutdown(&self) -> io::Result<()> {
        (**self).shutdown()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn cloned_handle_shares_the_socket() {
        let (left, mut right) = UnixStream::pair().unwrap();
        let mut clone = left.try_clone_box().unwrap();

        clone.write_all(b"via-clone").unwrap();
        let mut buf = [0u8; 9];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"via-clone");
    }

    #[test]
    fn shutdown_unblocks_reader_on_clone() {
        let (left, _right) = UnixStream::pair().unwrap();
        let mut reader = left.try_clone_box().unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            reader.read(&mut buf)
        });

        Connection::shutdown(&left).unwrap();
        let read = handle.join().unwrap().unwrap();
        assert_eq!(read, 0, "shutdown should surface as EOF");
    }

    #[test]
    fn boxed_connection_delegates() {
        let (left, mut right) = UnixStream::pair().unwrap();
        let boxed: Box<dyn Connection> = Box::new(left);
        let mut again = boxed.try_clone_box().unwrap();

        again.write_all(b"x").unwrap();
        let mut buf = [0u8; 1];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");

        boxed.shutdown().unwrap();
    }
}
