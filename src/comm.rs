//! Process identity for reporting.
//!
//! The solver itself runs on a single process. The communicator only decides which process
//! accumulates inner iteration counts and how timing reports are labelled.

pub trait Communicator {
    /// The rank of the calling process.
    fn rank(&self) -> usize;

    /// The number of processes.
    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// A communicator containing only the calling process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }
}

impl<C: ?Sized + Communicator> Communicator for &C {
    fn rank(&self) -> usize {
        C::rank(self)
    }

    fn size(&self) -> usize {
        C::size(self)
    }
}
