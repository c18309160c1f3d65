//! In-memory stand-ins for the I2C bus and a network client.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    io::{self, Read, Write},
    rc::Rc,
};

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

use crate::responder::Connections;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Write(u8, Vec<u8>),
    Read(u8, u8, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeBusError;

impl embedded_hal::i2c::Error for FakeBusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Serves fixed byte blocks per register and records every transfer.
#[derive(Debug, Default)]
pub struct FakeBus {
    pub transfers: Vec<Transfer>,
    pub blocks: HashMap<u8, Vec<u8>>,
    pub fail_reads: bool,
}

impl FakeBus {
    pub fn set_block(&mut self, register: u8, bytes: &[u8]) {
        self.blocks.insert(register, bytes.to_vec());
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.transfers
            .iter()
            .filter_map(|t| match t {
                Transfer::Write(_, bytes) => Some(bytes.clone()),
                Transfer::Read(..) => None,
            })
            .collect()
    }
}

impl ErrorType for FakeBus {
    type Error = FakeBusError;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut pending: Option<Vec<u8>> = None;

        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    if let Some(previous) = pending.replace(bytes.to_vec()) {
                        self.transfers.push(Transfer::Write(address, previous));
                    }
                }
                Operation::Read(buf) => {
                    if self.fail_reads {
                        return Err(FakeBusError);
                    }
                    let register = pending
                        .take()
                        .and_then(|written| written.first().copied())
                        .unwrap_or_default();
                    let block = self.blocks.get(&register);
                    for (index, byte) in buf.iter_mut().enumerate() {
                        *byte = block.and_then(|b| b.get(index).copied()).unwrap_or(0);
                    }
                    self.transfers
                        .push(Transfer::Read(address, register, buf.len()));
                }
            }
        }

        if let Some(previous) = pending {
            self.transfers.push(Transfer::Write(address, previous));
        }
        Ok(())
    }
}

/// A client connection: scripted request bytes in, response bytes captured.
#[derive(Debug, Default)]
pub struct FakeClient {
    pub request: io::Cursor<Vec<u8>>,
    pub response: Vec<u8>,
    pub chunk: Option<usize>,
}

impl FakeClient {
    pub fn new(request: &[u8]) -> Self {
        Self {
            request: io::Cursor::new(request.to_vec()),
            response: Vec::new(),
            chunk: None,
        }
    }

    /// Delivers the request a few bytes per read call.
    pub fn chunked(request: &[u8], chunk: usize) -> Self {
        Self {
            chunk: Some(chunk),
            ..Self::new(request)
        }
    }
}

impl Read for FakeClient {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = self.chunk.unwrap_or(buf.len()).min(buf.len());
        self.request.read(&mut buf[..limit])
    }
}

impl Write for FakeClient {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.response.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A client handed out by [`FakeConnections`] that the test can still inspect.
#[derive(Debug, Clone)]
pub struct SharedClient(pub Rc<RefCell<FakeClient>>);

impl Read for SharedClient {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.borrow_mut().read(buf)
    }
}

impl Write for SharedClient {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Queue of clients waiting to be accepted.
#[derive(Debug, Default)]
pub struct FakeConnections {
    pub pending: VecDeque<SharedClient>,
    /// Returned once by the next `poll_accept`.
    pub accept_error: Option<io::ErrorKind>,
}

impl FakeConnections {
    pub fn connect(&mut self, request: &[u8]) -> Rc<RefCell<FakeClient>> {
        let client = Rc::new(RefCell::new(FakeClient::new(request)));
        self.pending.push_back(SharedClient(Rc::clone(&client)));
        client
    }
}

impl Connections for FakeConnections {
    type Stream = SharedClient;

    fn poll_accept(&mut self) -> io::Result<Option<SharedClient>> {
        if let Some(kind) = self.accept_error.take() {
            return Err(io::Error::from(kind));
        }
        Ok(self.pending.pop_front())
    }
}
