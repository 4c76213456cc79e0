/// Identifier of a rendered marker.
///
/// Allocated monotonically by [`IdAllocator`]; never reused within a session,
/// so a stale id held by the surface can't alias a newer marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(pub u64);

#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_marker(&mut self) -> MarkerId {
        self.next += 1;
        MarkerId(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::{IdAllocator, MarkerId};

    #[test]
    fn ids_are_monotonic() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_marker(), MarkerId(1));
        assert_eq!(ids.next_marker(), MarkerId(2));
    }
}
