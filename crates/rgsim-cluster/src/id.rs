/// Shared counter for store, region and peer ids. The first id handed out is 1;
/// 0 is reserved to mean "none" (e.g. no leader).
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    pub(crate) fn alloc(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    pub(crate) fn alloc_n(&mut self, n: usize) -> Vec<u64> {
        (0..n).map(|_| self.alloc()).collect()
    }
}
