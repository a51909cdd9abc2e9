/// Binding of a channel pair to one participant until its locked phase completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lock {
    #[default]
    Idle,
    LockedOn(usize),
}

impl Lock {
    pub fn is_idle(&self) -> bool {
        matches!(self, Lock::Idle)
    }

    pub fn holder(&self) -> Option<usize> {
        match *self {
            Lock::Idle => None,
            Lock::LockedOn(idx) => Some(idx),
        }
    }

    pub fn lock(&mut self, idx: usize) {
        assert!(self.is_idle(), "lock already held by {:?}", self.holder());
        *self = Lock::LockedOn(idx);
    }

    pub fn release(&mut self) {
        assert!(!self.is_idle(), "releasing an idle lock");
        *self = Lock::Idle;
    }
}
