//! Buffer pool collaborator.

/// Pool of retained packet copies, addressed by buffer id.
///
/// A packet whose buffer id names a live entry shares its bytes with the
/// pool; only the pool may release them.
#[cfg_attr(test, mockall::automock)]
pub trait BufferPool {
    fn is_alive(&self, buffer_id: u32) -> bool;

    /// Drops the entry. With `keep_contents` the bytes stay available to
    /// a packet still holding them.
    fn discard(&mut self, buffer_id: u32, keep_contents: bool);
}
