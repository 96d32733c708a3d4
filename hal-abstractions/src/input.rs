//! User input traits

/// Edge-triggered input
///
/// `triggered` reports whether the input fired since the previous call and
/// clears the latch, so one physical press is observed exactly once.
pub trait Trigger {
    fn triggered(&mut self) -> bool;
}

impl<T: Trigger + ?Sized> Trigger for &mut T {
    fn triggered(&mut self) -> bool {
        T::triggered(self)
    }
}
